use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use tracing::warn;

use crate::auth::jwt::JwtKeys;

/// Authenticated principal: the email carried in a valid bearer token.
///
/// Handlers that must answer unauthenticated calls themselves take
/// `Option<AuthUser>`; a rejection then becomes `None`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Missing Authorization header".to_string(),
            ))?;

        // Expect "Bearer <token>"
        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Invalid Authorization header".to_string(),
            ))?;

        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired token");
                return Err((
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired token".to_string(),
                ));
            }
        };

        Ok(AuthUser(claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use axum::http::Request;

    #[derive(Clone)]
    struct KeysOnly(JwtKeys);

    impl FromRef<KeysOnly> for JwtKeys {
        fn from_ref(state: &KeysOnly) -> Self {
            state.0.clone()
        }
    }

    fn keys(secret: &str) -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: secret.into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes: 5,
        })
    }

    async fn extract(state: &KeysOnly, auth: Option<&str>) -> Result<AuthUser, (StatusCode, String)> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthUser::from_request_parts(&mut parts, state).await
    }

    #[tokio::test]
    async fn accepts_valid_bearer_token() {
        let state = KeysOnly(keys("secret"));
        let token = state.0.sign("a@x.com").unwrap();
        let user = extract(&state, Some(&format!("Bearer {token}"))).await.unwrap();
        assert_eq!(user.0, "a@x.com");
    }

    #[tokio::test]
    async fn rejects_missing_header() {
        let state = KeysOnly(keys("secret"));
        let (status, _) = extract(&state, None).await.unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_other_scheme() {
        let state = KeysOnly(keys("secret"));
        let (status, msg) = extract(&state, Some("Basic Zm9vOmJhcg==")).await.unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(msg, "Invalid Authorization header");
    }

    #[tokio::test]
    async fn rejects_token_signed_elsewhere() {
        let state = KeysOnly(keys("secret"));
        let token = keys("other").sign("a@x.com").unwrap();
        let (status, _) = extract(&state, Some(&format!("Bearer {token}")))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
