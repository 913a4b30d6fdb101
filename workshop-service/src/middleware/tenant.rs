//! Organization context for multi-tenancy.
//!
//! Every workshop record belongs to one organization. The caller names it in
//! the `X-Org-ID` header, which is set upstream after authentication.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

pub const ORG_ID_HEADER: &str = "X-Org-ID";

/// Organization the request acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrgContext {
    pub org_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for OrgContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ORG_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Missing X-Org-ID header")))?;

        let org_id = Uuid::parse_str(raw.trim()).map_err(|_| {
            AppError::AuthError(anyhow::anyhow!("X-Org-ID header is not a valid UUID"))
        })?;

        tracing::Span::current().record("org_id", raw);

        Ok(OrgContext { org_id })
    }
}
