use crate::config::ManagementConfig;
use crate::error::{IsRetryable, ManagementError};
use backon::{ExponentialBuilder, Retryable};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

type CacheKey = u64;

/// A project as listed by the management API. Unknown fields are kept in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "ref", default)]
    pub project_ref: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// An organization visible to the access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Organization {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ConnectionStringResponse {
    db_url: String,
}

/// Client for the hosting provider's management API.
///
/// Requests from every chat share one rate limiter and one TTL cache, keyed by access token and
/// path so users never see each other's results.
#[derive(Clone)]
pub struct ManagementClient {
    client: reqwest::Client,
    base: Url,
    limiter: Arc<DefaultDirectRateLimiter>,
    cache: Cache<CacheKey, Arc<Value>>,
    hasher: ahash::RandomState,
    retry_policy: ExponentialBuilder,
}

impl ManagementClient {
    pub fn new(cfg: &ManagementConfig, client: reqwest::Client) -> Self {
        let per_minute = NonZeroU32::new(cfg.requests_per_minute.max(1)).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(cfg.cache_ttl_secs.max(1)))
            .max_capacity(1024)
            .build();
        let retry_policy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(2)
            .with_jitter();

        let mut base = cfg.api_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        info!(
            api_url = %base,
            requests_per_minute = per_minute.get(),
            cache_ttl_secs = cfg.cache_ttl_secs,
            "ManagementClient configured"
        );

        Self {
            client,
            base,
            limiter,
            cache,
            hasher: ahash::RandomState::new(),
            retry_policy,
        }
    }

    /// `GET /projects`
    pub async fn list_projects(&self, access_token: &str) -> Result<Vec<Project>, ManagementError> {
        let value = self.get_json(access_token, "projects").await?;
        Ok(serde_json::from_value(value.as_ref().clone())?)
    }

    /// `GET /organizations`
    pub async fn list_organizations(&self, access_token: &str) -> Result<Vec<Organization>, ManagementError> {
        let value = self.get_json(access_token, "organizations").await?;
        Ok(serde_json::from_value(value.as_ref().clone())?)
    }

    /// Projects of one organization, filtered from the cached `GET /projects` listing.
    pub async fn list_projects_in(
        &self,
        access_token: &str,
        organization_id: &str,
    ) -> Result<Vec<Project>, ManagementError> {
        let projects = self.list_projects(access_token).await?;
        Ok(filter_by_organization(projects, organization_id))
    }

    /// `GET /projects/{ref}/connection-string`, returning the templated `db_url`.
    pub async fn connection_string(
        &self,
        access_token: &str,
        project_ref: &str,
    ) -> Result<String, ManagementError> {
        let path = format!("projects/{project_ref}/connection-string");
        let value = self.get_json(access_token, &path).await?;
        let parsed: ConnectionStringResponse = serde_json::from_value(value.as_ref().clone())?;
        Ok(parsed.db_url)
    }

    /// Forget every cached response.
    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }

    async fn get_json(&self, access_token: &str, path: &str) -> Result<Arc<Value>, ManagementError> {
        let key = self.hasher.hash_one((access_token, path));
        if let Some(hit) = self.cache.get(&key) {
            debug!(path, "Management API cache hit");
            return Ok(hit);
        }

        let url = self.base.join(path)?;
        let op = || {
            let client = self.client.clone();
            let url = url.clone();
            let limiter = self.limiter.clone();
            async move {
                limiter.until_ready().await;
                let resp = client.get(url).bearer_auth(access_token).send().await?;
                let status = resp.status();
                if !status.is_success() {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(ManagementError::UpstreamStatus { status, body });
                }
                Ok(resp.json::<Value>().await?)
            }
        };

        let value = op
            .retry(self.retry_policy)
            .when(|err: &ManagementError| err.is_retryable())
            .notify(|err, dur: Duration| {
                tracing::warn!("Management API retrying after error {} in {:?}", err, dur);
            })
            .await?;

        let value = Arc::new(value);
        self.cache.insert(key, value.clone());
        Ok(value)
    }
}

fn filter_by_organization(projects: Vec<Project>, organization_id: &str) -> Vec<Project> {
    projects
        .into_iter()
        .filter(|p| p.organization_id.as_deref() == Some(organization_id))
        .collect()
}
