use async_trait::async_trait;
use auxcord_core::UserId;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use uuid::Uuid;

use crate::ServerContext;

/// Cookie checked when no Authorization header is present
const AUTH_COOKIE: &str = "auth_token";
/// Query parameter checked last, mainly for WebSocket clients that
/// cannot set headers
const TOKEN_QUERY: &str = "token";

/// Represents a type that resolves a bearer credential into a participant id
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    async fn resolve(&self, credential: &str) -> Option<UserId>;
}

/// Accepts credentials that already are participant ids, the way a
/// gateway-terminated deployment hands them over
pub struct PassthroughIdentity;

#[async_trait]
impl IdentityProvider for PassthroughIdentity {
    async fn resolve(&self, credential: &str) -> Option<UserId> {
        Uuid::parse_str(credential).ok()
    }
}

/// The authenticated participant behind a request.
///
/// Identity always comes from the credential, never from request bodies.
pub struct Identity(pub UserId);

#[async_trait]
impl FromRequestParts<ServerContext> for Identity {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let credential =
            credential_from_parts(parts).ok_or((StatusCode::UNAUTHORIZED, "Missing credentials"))?;

        let user_id = state
            .identity
            .resolve(&credential)
            .await
            .ok_or((StatusCode::UNAUTHORIZED, "Credentials could not be resolved"))?;

        Ok(Self(user_id))
    }
}

/// Looks for a credential in order: Authorization header, then the
/// auth_token cookie, then the token query parameter. The first present
/// source wins
fn credential_from_parts(parts: &Parts) -> Option<String> {
    bearer_token(parts)
        .or_else(|| cookie_token(parts))
        .or_else(|| query_token(parts))
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let header = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;

    header
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

fn cookie_token(parts: &Parts) -> Option<String> {
    let cookies = parts.headers.get(header::COOKIE)?.to_str().ok()?;

    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == AUTH_COOKIE).then(|| value.to_string())
    })
}

fn query_token(parts: &Parts) -> Option<String> {
    let query = parts.uri.query()?;

    query.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name == TOKEN_QUERY).then(|| value.to_string())
    })
}

#[cfg(test)]
mod test {
    use axum::http::Request;

    use super::*;

    fn parts_for(uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut request = Request::builder().uri(uri);

        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        request.body(()).unwrap().into_parts().0
    }

    #[test]
    fn the_authorization_header_wins() {
        let parts = parts_for(
            "/api/v1/rooms?token=from-query",
            &[
                ("authorization", "Bearer from-header"),
                ("cookie", "auth_token=from-cookie"),
            ],
        );

        assert_eq!(
            credential_from_parts(&parts),
            Some("from-header".to_string())
        );
    }

    #[test]
    fn the_cookie_beats_the_query_parameter() {
        let parts = parts_for(
            "/api/v1/rooms?token=from-query",
            &[("cookie", "theme=dark; auth_token=from-cookie")],
        );

        assert_eq!(
            credential_from_parts(&parts),
            Some("from-cookie".to_string())
        );
    }

    #[test]
    fn the_query_parameter_works_alone() {
        let parts = parts_for("/api/v1/ws/123?token=from-query", &[]);

        assert_eq!(credential_from_parts(&parts), Some("from-query".to_string()));
    }

    #[test]
    fn a_non_bearer_header_falls_through() {
        let parts = parts_for(
            "/api/v1/rooms",
            &[
                ("authorization", "Basic dXNlcjpwYXNz"),
                ("cookie", "auth_token=from-cookie"),
            ],
        );

        assert_eq!(
            credential_from_parts(&parts),
            Some("from-cookie".to_string())
        );
    }

    #[test]
    fn no_source_means_no_credential() {
        let parts = parts_for("/api/v1/rooms", &[]);

        assert_eq!(credential_from_parts(&parts), None);
    }

    #[tokio::test]
    async fn passthrough_identity_accepts_only_uuids() {
        let provider = PassthroughIdentity;
        let id = Uuid::new_v4();

        assert_eq!(provider.resolve(&id.to_string()).await, Some(id));
        assert_eq!(provider.resolve("not-a-uuid").await, None);
    }
}
