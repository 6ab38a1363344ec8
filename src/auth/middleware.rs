use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use tracing::{debug, warn};

use crate::controller::ErrorResponse;
use crate::member::model::MemberId;

/// Header carrying the caller's member id, set by the upstream auth layer.
pub const MEMBER_HEADER: &str = "x-member-id";

/// The member making the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentMember {
    pub member_id: MemberId,
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(message, "UNAUTHORIZED")),
    )
        .into_response()
}

fn member_from_parts(parts: &Parts) -> Result<CurrentMember, Response> {
    if let Some(member) = parts.extensions.get::<CurrentMember>() {
        return Ok(member.clone());
    }

    let value = parts
        .headers
        .get(MEMBER_HEADER)
        .ok_or_else(|| unauthorized("Missing X-Member-Id header"))?;

    let member_id = value
        .to_str()
        .map(str::trim)
        .map_err(|_| unauthorized("Invalid X-Member-Id header"))?;

    if member_id.is_empty() {
        return Err(unauthorized("Invalid X-Member-Id header"));
    }

    Ok(CurrentMember {
        member_id: member_id.to_string(),
    })
}

/// Rejects requests without a caller identity and records it for the handlers.
pub async fn member_middleware<B>(req: Request<B>, next: Next<B>) -> Result<Response, Response> {
    let (mut parts, body) = req.into_parts();

    let member = member_from_parts(&parts).map_err(|rejection| {
        warn!("Rejected request to {} without member identity", parts.uri.path());
        rejection
    })?;

    debug!("Request from member {}", member.member_id);
    parts.extensions.insert(member);

    let req = Request::from_parts(parts, body);
    Ok(next.run(req).await)
}

/// Extractor for the calling member
#[async_trait]
impl<S> FromRequestParts<S> for CurrentMember
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        member_from_parts(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/notifications");
        if let Some(value) = header {
            builder = builder.header(MEMBER_HEADER, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_extracts_member_from_header() {
        let mut parts = parts_with(Some(" m1 "));
        let member = CurrentMember::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(member.member_id, "m1");
    }

    #[tokio::test]
    async fn test_missing_or_blank_header_is_unauthorized() {
        for header in [None, Some("   ")] {
            let mut parts = parts_with(header);
            let rejection = CurrentMember::from_request_parts(&mut parts, &())
                .await
                .unwrap_err();
            assert_eq!(rejection.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn test_prefers_identity_recorded_by_middleware() {
        let mut parts = parts_with(Some("m1"));
        parts.extensions.insert(CurrentMember {
            member_id: "m2".to_string(),
        });
        let member = CurrentMember::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(member.member_id, "m2");
    }
}
