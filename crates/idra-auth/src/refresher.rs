//! Background task that keeps the credential store valid.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use idra_core::{defaults, Error, Result};

use crate::mint::CredentialMinter;
use crate::store::CredentialStore;

/// Timing configuration for the refresh task.
#[derive(Debug, Clone)]
pub struct RefresherConfig {
    /// Interval between scheduled mints. Must be shorter than the token
    /// lifetime so a fresh credential always lands before expiry.
    pub interval: Duration,
    /// Upper bound on a single mint attempt.
    pub mint_timeout: Duration,
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(defaults::REFRESH_INTERVAL_SECS as u64),
            mint_timeout: Duration::from_secs(defaults::MINT_TIMEOUT_SECS),
        }
    }
}

impl RefresherConfig {
    /// Set a custom refresh interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set a custom mint timeout.
    pub fn with_mint_timeout(mut self, timeout: Duration) -> Self {
        self.mint_timeout = timeout;
        self
    }
}

/// Handle for the running refresh task, owned by the process lifecycle.
pub struct RefresherHandle {
    shutdown_tx: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

impl RefresherHandle {
    /// Signal the task to stop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.join.await;
    }
}

/// Scheduled re-mint of the outbound credential.
///
/// One refresher runs for the lifetime of the process. On a failed tick the
/// previous credential stays in place and the next attempt waits for the
/// next scheduled tick; there is no immediate-retry storm.
pub struct TokenRefresher {
    store: CredentialStore,
    minter: Arc<dyn CredentialMinter>,
    config: RefresherConfig,
}

impl TokenRefresher {
    pub fn new(
        store: CredentialStore,
        minter: Arc<dyn CredentialMinter>,
        config: RefresherConfig,
    ) -> Self {
        Self {
            store,
            minter,
            config,
        }
    }

    /// Spawn the background refresh loop.
    pub fn spawn(self) -> RefresherHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let join = tokio::spawn(self.run(shutdown_rx));
        RefresherHandle { shutdown_tx, join }
    }

    async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval completes immediately; the initial
        // credential was already minted eagerly at startup.
        ticker.tick().await;

        info!(
            subsystem = "auth",
            credential_source = %self.minter.source(),
            interval_secs = self.config.interval.as_secs(),
            "token refresher started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(subsystem = "auth", "token refresher stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match tokio::time::timeout(self.config.mint_timeout, self.minter.mint()).await {
                        Ok(Ok(credential)) => {
                            info!(
                                subsystem = "auth",
                                credential_source = %credential.source,
                                expires_at = ?credential.expires_at,
                                "credential refreshed"
                            );
                            self.store.replace(credential);
                        }
                        Ok(Err(e)) => {
                            warn!(
                                subsystem = "auth",
                                error = %e,
                                "credential refresh failed; serving previous token until next tick"
                            );
                        }
                        Err(_) => {
                            warn!(
                                subsystem = "auth",
                                timeout_secs = self.config.mint_timeout.as_secs(),
                                "credential refresh timed out; serving previous token until next tick"
                            );
                        }
                    }
                }
            }
        }
    }
}

/// Mint the initial credential and seed a store with it.
///
/// Runs before the server accepts traffic so [`CredentialStore::current`]
/// never blocks after startup. Mint failures here abort startup.
pub async fn seed_store(
    minter: &Arc<dyn CredentialMinter>,
    mint_timeout: Duration,
) -> Result<CredentialStore> {
    let credential = tokio::time::timeout(mint_timeout, minter.mint())
        .await
        .map_err(|_| Error::CredentialMint("initial mint timed out".to_string()))??;

    info!(
        subsystem = "auth",
        credential_source = %credential.source,
        "initial credential minted"
    );
    Ok(CredentialStore::new(credential))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use idra_core::{Credential, CredentialSource};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Minter that numbers its tokens and can fail on chosen attempts.
    struct ScriptedMinter {
        count: AtomicU32,
        fail_on: Vec<u32>,
    }

    impl ScriptedMinter {
        fn new(fail_on: Vec<u32>) -> Self {
            Self {
                count: AtomicU32::new(0),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl CredentialMinter for ScriptedMinter {
        async fn mint(&self) -> Result<Credential> {
            let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on.contains(&n) {
                return Err(Error::CredentialMint(format!("scripted failure on mint {}", n)));
            }
            Ok(Credential::with_lifetime(
                format!("tok-{}", n),
                Utc::now(),
                ChronoDuration::seconds(defaults::TOKEN_LIFETIME_SECS),
            ))
        }

        fn source(&self) -> CredentialSource {
            CredentialSource::OauthServiceAccount
        }
    }

    async fn let_refresher_catch_up() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_credential_replaced_before_lifetime_elapses() {
        let minter: Arc<dyn CredentialMinter> = Arc::new(ScriptedMinter::new(vec![]));
        let store = seed_store(&minter, Duration::from_secs(5)).await.unwrap();
        assert_eq!(store.current().token, "tok-1");

        let config = RefresherConfig::default();
        assert!(
            config.interval < Duration::from_secs(defaults::TOKEN_LIFETIME_SECS as u64),
            "refresh interval must undercut the token lifetime"
        );

        let handle = TokenRefresher::new(store.clone(), minter, config.clone()).spawn();

        // Advance simulated time past the 55-minute lifetime: the tick at
        // lifetime-minus-margin must already have replaced the credential.
        tokio::time::sleep(Duration::from_secs(defaults::TOKEN_LIFETIME_SECS as u64 + 1)).await;
        let_refresher_catch_up().await;

        let current = store.current();
        assert_ne!(current.token, "tok-1", "credential was never refreshed");
        assert!(!current.is_expired(Utc::now()));

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_old_token_until_next_tick() {
        // Mint 1 seeds the store, mint 2 fails, mint 3 succeeds.
        let minter: Arc<dyn CredentialMinter> = Arc::new(ScriptedMinter::new(vec![2]));
        let store = seed_store(&minter, Duration::from_secs(5)).await.unwrap();

        let interval = Duration::from_secs(60);
        let handle = TokenRefresher::new(
            store.clone(),
            minter,
            RefresherConfig::default().with_interval(interval),
        )
        .spawn();

        tokio::time::sleep(interval + Duration::from_secs(1)).await;
        let_refresher_catch_up().await;
        assert_eq!(
            store.current().token,
            "tok-1",
            "stale token must be retained after a failed mint"
        );

        tokio::time::sleep(interval).await;
        let_refresher_catch_up().await;
        assert_eq!(store.current().token, "tok-3");

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_the_loop() {
        let minter: Arc<dyn CredentialMinter> = Arc::new(ScriptedMinter::new(vec![]));
        let store = seed_store(&minter, Duration::from_secs(5)).await.unwrap();

        let handle = TokenRefresher::new(store, minter, RefresherConfig::default()).spawn();
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_seed_store_propagates_mint_failure() {
        let minter: Arc<dyn CredentialMinter> = Arc::new(ScriptedMinter::new(vec![1]));
        let err = seed_store(&minter, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, Error::CredentialMint(_)));
    }
}
