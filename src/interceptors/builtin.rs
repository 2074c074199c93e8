//! Built-in interceptors for bearer credentials and session expiry.

use super::Interceptor;
use crate::client::RequestConfig;
use crate::credentials::CredentialStore;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Attaches `Authorization: Bearer <token>` to every outgoing request when
/// the credential store holds a token. An explicit caller-set header wins.
pub struct BearerAuth {
    credentials: Arc<dyn CredentialStore>,
}

impl BearerAuth {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl Interceptor for BearerAuth {
    async fn on_request(&self, mut config: RequestConfig) -> Result<RequestConfig> {
        if !config.headers.contains_key("Authorization") {
            if let Some(token) = self.credentials.token() {
                config
                    .headers
                    .insert("Authorization".to_string(), format!("Bearer {}", token));
            }
        }
        Ok(config)
    }
}

/// Reacts to HTTP 401 by clearing the stored credential and firing a
/// session-expired hook (typically a redirect to a login flow). The error
/// itself passes through unchanged.
pub struct SessionExpiry {
    credentials: Arc<dyn CredentialStore>,
    on_expired: Box<dyn Fn() + Send + Sync>,
}

impl SessionExpiry {
    pub fn new(credentials: Arc<dyn CredentialStore>, on_expired: Box<dyn Fn() + Send + Sync>) -> Self {
        Self {
            credentials,
            on_expired,
        }
    }
}

#[async_trait]
impl Interceptor for SessionExpiry {
    async fn on_error(&self, error: Error) -> Error {
        if error.status() == Some(401) {
            warn!("received 401, clearing stored credential");
            self.credentials.clear();
            (self.on_expired)();
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Method;
    use crate::credentials::MemoryCredentials;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn config() -> RequestConfig {
        RequestConfig {
            method: Method::Get,
            url: "http://localhost/api/projects".into(),
            headers: HashMap::new(),
            body: None,
            cache: true,
            cache_ttl: Duration::from_secs(300),
            long_term_cache: false,
            timeout: Duration::from_secs(10),
            retries: 3,
            retry_delay: Duration::from_secs(1),
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn bearer_auth_attaches_the_stored_token() {
        let credentials = Arc::new(MemoryCredentials::new());
        credentials.store("sekrit");
        let auth = BearerAuth::new(credentials);

        let out = auth.on_request(config()).await.unwrap();
        assert_eq!(out.headers["Authorization"], "Bearer sekrit");
    }

    #[tokio::test]
    async fn bearer_auth_leaves_requests_alone_without_a_token() {
        let auth = BearerAuth::new(Arc::new(MemoryCredentials::new()));
        let out = auth.on_request(config()).await.unwrap();
        assert!(!out.headers.contains_key("Authorization"));
    }

    #[tokio::test]
    async fn session_expiry_clears_credential_on_401() {
        let credentials = Arc::new(MemoryCredentials::new());
        credentials.store("sekrit");
        let fired = Arc::new(AtomicBool::new(false));
        let hook_fired = Arc::clone(&fired);
        let guard = SessionExpiry::new(
            Arc::clone(&credentials) as Arc<dyn CredentialStore>,
            Box::new(move || hook_fired.store(true, Ordering::SeqCst)),
        );

        let err = Error::HttpStatus {
            status: 401,
            status_text: "Unauthorized".into(),
            body: None,
        };
        let out = guard.on_error(err.clone()).await;
        assert_eq!(out, err);
        assert_eq!(credentials.token(), None);
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn session_expiry_ignores_other_failures() {
        let credentials = Arc::new(MemoryCredentials::new());
        credentials.store("sekrit");
        let guard = SessionExpiry::new(
            Arc::clone(&credentials) as Arc<dyn CredentialStore>,
            Box::new(|| {}),
        );

        guard
            .on_error(Error::HttpStatus {
                status: 500,
                status_text: "Internal Server Error".into(),
                body: None,
            })
            .await;
        assert_eq!(credentials.token(), Some("sekrit".to_string()));
    }
}
