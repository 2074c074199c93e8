//! Credential storage consumed by the built-in auth interceptors.
//!
//! The client only attaches a bearer credential and reacts to 401; where the
//! token comes from (keychain, config file, login flow) is the application's
//! business, expressed through this trait.

use std::sync::RwLock;

pub trait CredentialStore: Send + Sync {
    fn token(&self) -> Option<String>;
    fn store(&self, token: &str);
    fn clear(&self);
}

/// Process-local credential store.
#[derive(Default)]
pub struct MemoryCredentials {
    token: RwLock<Option<String>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentials {
    fn token(&self) -> Option<String> {
        self.token.read().unwrap().clone()
    }

    fn store(&self, token: &str) {
        *self.token.write().unwrap() = Some(token.to_string());
    }

    fn clear(&self) {
        *self.token.write().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_clear_round_trip() {
        let creds = MemoryCredentials::new();
        assert_eq!(creds.token(), None);
        creds.store("abc");
        assert_eq!(creds.token(), Some("abc".to_string()));
        creds.clear();
        assert_eq!(creds.token(), None);
    }
}
