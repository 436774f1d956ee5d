use std::sync::{Arc, PoisonError, RwLock};

/// Holds the credential the API client presents on every request.
///
/// Login is handled elsewhere; this store only keeps whatever token that
/// flow produced so the client can attach it and drop it on `401`.
#[derive(Clone, Debug, Default)]
pub struct SessionStore {
    access_token: Arc<RwLock<Option<String>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store.set_access_token(token);
        store
    }

    pub fn access_token(&self) -> Option<String> {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_access_token(&self, token: impl Into<String>) {
        *self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    pub fn clear(&self) {
        *self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }
}
