use crate::connection::{ManagementClient, Organization, Project};
use crate::error::ChatError;
use crate::server::guards::session::SessionToken;
use crate::server::router::SqlitoState;
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use serde::Serialize;

pub fn router() -> Router<SqlitoState> {
    Router::new()
        .route("/api/supabase/organizations", get(list_organizations))
        .route("/api/supabase/projects", get(list_projects))
        .route("/api/supabase/projects/{org_id}", get(list_org_projects))
        .route(
            "/api/supabase/project/connection-string/{project_ref}",
            get(connection_string),
        )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionStringBody {
    connection_string: String,
}

fn management(state: &SqlitoState) -> Result<&ManagementClient, ChatError> {
    state
        .management
        .as_ref()
        .ok_or_else(|| ChatError::Internal("management API client is not configured".to_string()))
}

/// GET /api/supabase/organizations
async fn list_organizations(
    State(state): State<SqlitoState>,
    session: SessionToken,
) -> Result<Json<Vec<Organization>>, ChatError> {
    let access_token = session.require()?;
    let organizations = management(&state)?.list_organizations(&access_token).await?;
    Ok(Json(organizations))
}

/// GET /api/supabase/projects
async fn list_projects(
    State(state): State<SqlitoState>,
    session: SessionToken,
) -> Result<Json<Vec<Project>>, ChatError> {
    let access_token = session.require()?;
    let projects = management(&state)?.list_projects(&access_token).await?;
    Ok(Json(projects))
}

/// GET /api/supabase/projects/{org_id}
async fn list_org_projects(
    State(state): State<SqlitoState>,
    session: SessionToken,
    Path(org_id): Path<String>,
) -> Result<Json<Vec<Project>>, ChatError> {
    let access_token = session.require()?;
    let projects = management(&state)?
        .list_projects_in(&access_token, &org_id)
        .await?;
    Ok(Json(projects))
}

/// GET /api/supabase/project/connection-string/{project_ref}
///
/// Returns the provider's templated string; the password placeholder is left in place.
async fn connection_string(
    State(state): State<SqlitoState>,
    session: SessionToken,
    Path(project_ref): Path<String>,
) -> Result<Json<ConnectionStringBody>, ChatError> {
    let access_token = session.require()?;
    let connection_string = management(&state)?
        .connection_string(&access_token, &project_ref)
        .await?;
    Ok(Json(ConnectionStringBody { connection_string }))
}
