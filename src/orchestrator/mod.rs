//! Query orchestration: validate a chat request, bind it to a project database, then drive the
//! model/tool loop while streaming events.

mod prompt;
mod run;

pub use prompt::system_prompt;
pub use run::{PreparedRun, RunOutcome};

use crate::connection::{ConnectionResolver, ManagementClient, base_connection_string, redact};
use crate::credentials::CredentialStore;
use crate::error::ChatError;
use crate::gateway::{GatewayBinding, GatewayLauncher};
use crate::llm::LanguageModel;
use sqlito_schema::{ChatRequestBody, MessageParam};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared, request-independent collaborators of every chat run.
#[derive(Clone)]
pub struct Orchestrator {
    pub store: Arc<dyn CredentialStore>,
    pub launcher: Arc<dyn GatewayLauncher>,
    pub model: Arc<dyn LanguageModel>,
    pub resolver: ConnectionResolver,
    pub management: Option<ManagementClient>,
    pub max_steps: u32,
}

impl Orchestrator {
    /// Everything that can fail with an HTTP status happens here, before the stream starts.
    ///
    /// Order: validation, user message, session, connection string, tool server. Nothing is
    /// opened when an earlier step fails.
    pub async fn prepare(
        &self,
        body: ChatRequestBody,
        access_token: Option<String>,
    ) -> Result<PreparedRun, ChatError> {
        // A stored key stands in for one omitted from the request.
        let api_key = match body.api_key.trim() {
            "" => self.store.api_key().await,
            key => Some(key.to_string()),
        };
        let project_ref = Some(body.project_ref.trim()).filter(|r| !r.is_empty());

        let mut issues = Vec::new();
        if body.messages.is_empty() {
            issues.push("At least one message is required");
        }
        if api_key.is_none() {
            issues.push("API key is required");
        }
        if project_ref.is_none() {
            issues.push("Project reference is required");
        }
        let (Some(api_key), Some(project_ref)) = (api_key, project_ref) else {
            return Err(ChatError::Validation(issues.join(", ")));
        };
        if !issues.is_empty() {
            return Err(ChatError::Validation(issues.join(", ")));
        }

        let query = body
            .last_user_message()
            .map(|m| m.content.clone())
            .ok_or(ChatError::NoUserMessage)?;

        let access_token = access_token
            .filter(|t| !t.is_empty())
            .ok_or(ChatError::NotAuthenticated)?;

        let base = base_connection_string(
            body.connection_string.as_deref(),
            self.management.as_ref(),
            &access_token,
            project_ref,
        )
        .await;
        let connection_string = self
            .resolver
            .resolve(project_ref, &base, self.store.as_ref())
            .await?;
        debug!(
            project_ref,
            connection = %redact(&connection_string),
            "Connection string resolved"
        );

        let binding = GatewayBinding {
            instance_ref: project_ref.to_string(),
            connection_string,
            access_token,
        };
        let gateway = self.launcher.open(&binding).await?;
        info!(project_ref, query_chars = query.len(), "Chat run prepared");

        Ok(PreparedRun::new(
            gateway,
            self.model.clone(),
            api_key,
            system_prompt(project_ref),
            vec![MessageParam::user_text(query)],
            self.max_steps,
        ))
    }
}
