//! The single current credential and its projections onto call shapes.

use std::sync::{Arc, PoisonError, RwLock};

use idra_core::{Credential, CredentialSource};

/// Holds the one current [`Credential`].
///
/// Readers clone the inner `Arc` under a read lock; the refresher swaps the
/// whole `Arc` under the write lock. A reader therefore sees either the old
/// or the new credential, never a partially written one. `current()` never
/// touches the network: the first mint happens eagerly at startup, before
/// the store is constructed.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    inner: Arc<RwLock<Arc<Credential>>>,
}

impl CredentialStore {
    /// Create a store seeded with an already-minted credential.
    pub fn new(initial: Credential) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    /// The current credential. Synchronous and lock-held only for the clone.
    pub fn current(&self) -> Arc<Credential> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Atomically replace the current credential. Writer side is the
    /// refresher only.
    pub fn replace(&self, next: Credential) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(next);
    }

    /// Capture the credential once for a single outbound call. Both header
    /// shapes derived from the snapshot carry the same token value; a
    /// refresh landing mid-flight does not retroactively mutate it.
    pub fn snapshot(&self) -> CredentialSnapshot {
        CredentialSnapshot(self.current())
    }
}

/// Point-in-time capture of the current credential.
#[derive(Clone)]
pub struct CredentialSnapshot(Arc<Credential>);

impl CredentialSnapshot {
    /// The raw bearer token value.
    pub fn token(&self) -> &str {
        &self.0.token
    }

    pub fn source(&self) -> CredentialSource {
        self.0.source
    }

    /// REST header pair carried on outbound provider calls. The provider
    /// reads both fields, so they always carry the same token.
    pub fn rest_headers(&self) -> [(&'static str, String); 2] {
        [
            ("Authorization", format!("Bearer {}", self.0.token)),
            ("X-Goog-Vertex-Api-Key", self.0.token.clone()),
        ]
    }

    /// The same credential as RPC connection metadata (lowercase keys, as
    /// gRPC metadata requires).
    pub fn rpc_metadata(&self) -> [(&'static str, String); 2] {
        [
            ("authorization", format!("Bearer {}", self.0.token)),
            ("x-goog-vertex-api-key", self.0.token.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn cred(token: &str) -> Credential {
        Credential::non_expiring(token, CredentialSource::SuppliedBearer, Utc::now())
    }

    #[test]
    fn test_replace_swaps_whole_credential() {
        let store = CredentialStore::new(cred("first"));
        assert_eq!(store.current().token, "first");

        store.replace(cred("second"));
        assert_eq!(store.current().token, "second");
    }

    #[test]
    fn test_snapshot_header_shapes_agree() {
        let store = CredentialStore::new(cred("tok-abc"));
        let snap = store.snapshot();

        let [auth, api_key] = snap.rest_headers();
        assert_eq!(auth, ("Authorization", "Bearer tok-abc".to_string()));
        assert_eq!(api_key, ("X-Goog-Vertex-Api-Key", "tok-abc".to_string()));

        let [rpc_auth, rpc_key] = snap.rpc_metadata();
        assert_eq!(rpc_auth.0, "authorization");
        assert_eq!(rpc_auth.1, "Bearer tok-abc");
        assert_eq!(rpc_key.1, "tok-abc");
    }

    #[test]
    fn test_snapshot_survives_refresh_mid_flight() {
        let store = CredentialStore::new(cred("before"));
        let snap = store.snapshot();

        store.replace(cred("after"));

        // In-flight calls keep the token they captured.
        assert_eq!(snap.token(), "before");
        assert_eq!(store.snapshot().token(), "after");
    }

    #[test]
    fn test_concurrent_readers_never_observe_torn_state() {
        // Two credentials whose token and issued_at are paired; a torn read
        // would mix fields from different credentials.
        let a = cred("aaaa");
        let b = cred("bbbb");
        let store = CredentialStore::new(a.clone());

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let a = a.clone();
                let b = b.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let seen = store.current();
                        assert!(*seen == a || *seen == b, "observed mixed credential");
                    }
                })
            })
            .collect();

        for i in 0..1000 {
            store.replace(if i % 2 == 0 { b.clone() } else { a.clone() });
        }

        for r in readers {
            r.join().unwrap();
        }
    }
}
