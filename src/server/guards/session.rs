use crate::error::ChatError;
use axum::{
    extract::FromRequestParts,
    http::{HeaderName, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use std::convert::Infallible;

pub const SESSION_COOKIE: &str = "supabase_access_token";
const X_SUPABASE_ACCESS_TOKEN: HeaderName = HeaderName::from_static("x-supabase-access-token");

/// Supabase session access token, if the caller sent one.
///
/// Absence is not a rejection: the chat route reports it only after validating the body.
#[derive(Clone, Default)]
pub struct SessionToken(pub Option<String>);

impl SessionToken {
    pub fn require(self) -> Result<String, ChatError> {
        self.0.ok_or(ChatError::NotAuthenticated)
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = if self.0.is_some() { "<redacted>" } else { "<none>" };
        f.debug_tuple("SessionToken").field(&shown).finish()
    }
}

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let from_cookie = CookieJar::from_headers(&parts.headers)
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string());
        let token = from_cookie
            .or_else(|| {
                parts
                    .headers
                    .get(X_SUPABASE_ACCESS_TOKEN)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Ok(SessionToken(token))
    }
}
