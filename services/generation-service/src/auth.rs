use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};

use crate::models::ErrorResponse;

/// Caller identity forwarded by the edge proxy. The proxy terminates the
/// session; this service only trusts its headers.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        match (header("x-user-id"), header("x-user-email")) {
            (Some(id), Some(email)) if !id.is_empty() && !email.is_empty() => Ok(AuthUser {
                id,
                email,
                name: header("x-user-name"),
            }),
            _ => Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Missing identity headers".to_string(),
                    code: "UNAUTHORIZED",
                    details: None,
                }),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn extracts_identity_headers() {
        let request = Request::builder()
            .header("x-user-id", "user-1")
            .header("x-user-email", "dev@example.com")
            .header("x-user-name", "Dev")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let user = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.id, "user-1");
        assert_eq!(user.email, "dev@example.com");
        assert_eq!(user.name.as_deref(), Some("Dev"));
    }

    #[tokio::test]
    async fn missing_headers_are_unauthorized() {
        let request = Request::builder().body(()).unwrap();
        let (mut parts, _) = request.into_parts();
        let (status, body) = AuthUser::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.code, "UNAUTHORIZED");
    }
}
