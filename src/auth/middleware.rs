use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::auth::{challenge, AuthError, Principal, TokenVerifier};
use crate::config::AuthConfig;

/// Turns `Authorization` headers into principals.
pub struct Authenticator {
    prefix: String,
    realm: String,
    verifier: Arc<dyn TokenVerifier>,
}

impl Authenticator {
    pub fn new(config: &AuthConfig, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            prefix: config.header_prefix.clone(),
            realm: config.realm.clone(),
            verifier,
        }
    }

    /// Pull the token out of the `Authorization` header.
    ///
    /// `Ok(None)` means the request carries no credentials for this scheme.
    pub fn extract_token(&self, headers: &HeaderMap) -> Result<Option<String>, AuthError> {
        let Some(value) = headers.get(header::AUTHORIZATION) else {
            return Ok(None);
        };
        let value = value.to_str().map_err(|_| AuthError::InvalidHeader)?;
        let parts: Vec<&str> = value.split_whitespace().collect();

        let Some((prefix, rest)) = parts.split_first() else {
            return Ok(None);
        };
        if !prefix.eq_ignore_ascii_case(&self.prefix) {
            return Ok(None);
        }
        match rest {
            [token] => Ok(Some(token.to_string())),
            _ => Err(AuthError::InvalidHeader),
        }
    }

    pub async fn principal_for(&self, headers: &HeaderMap) -> Result<Option<Principal>, AuthError> {
        match self.extract_token(headers)? {
            Some(token) => self.verifier.verify(&token).await.map(Some),
            None => Ok(None),
        }
    }
}

/// Middleware attaching the caller's principal to the request.
pub async fn authenticate(
    State(auth): State<Arc<Authenticator>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if request.extensions().get::<Principal>().is_some() {
        return next.run(request).await;
    }

    match auth.principal_for(request.headers()).await {
        Ok(Some(principal)) => {
            tracing::debug!(user_id = %principal.user_id, "Request authenticated");
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Ok(None) => next.run(request).await,
        Err(e) => {
            tracing::info!(error = %e, path = %request.uri().path(), "Authentication failed");
            challenge(e, &auth.prefix, &auth.realm)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenVerifier;
    use axum::http::HeaderValue;

    fn authenticator() -> Authenticator {
        let verifier = StaticTokenVerifier::default().with_token("secret", Principal::new("7"));
        Authenticator::new(&AuthConfig::default(), Arc::new(verifier))
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_token() {
        let auth = authenticator();
        assert_eq!(auth.extract_token(&HeaderMap::new()), Ok(None));
        assert_eq!(auth.extract_token(&headers("JWT abc")), Ok(Some("abc".into())));
        assert_eq!(auth.extract_token(&headers("jwt abc")), Ok(Some("abc".into())));
        assert_eq!(auth.extract_token(&headers("Bearer abc")), Ok(None));
        assert_eq!(auth.extract_token(&headers("JWT")), Err(AuthError::InvalidHeader));
        assert_eq!(auth.extract_token(&headers("JWT a b")), Err(AuthError::InvalidHeader));
    }

    #[tokio::test]
    async fn test_principal_for() {
        let auth = authenticator();
        let principal = auth.principal_for(&headers("JWT secret")).await.unwrap();
        assert_eq!(principal, Some(Principal::new("7")));
        assert_eq!(
            auth.principal_for(&headers("JWT wrong")).await,
            Err(AuthError::InvalidToken)
        );
    }
}
