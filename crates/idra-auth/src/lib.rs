//! # idra-auth
//!
//! Keeps the outbound Vertex-style bearer credential valid for the lifetime
//! of the process, with no stalls on the request path.
//!
//! This crate provides:
//! - [`CredentialStore`] — the single current credential, atomically
//!   replaced, read synchronously by every outbound call site
//! - [`CredentialSnapshot`] — a point-in-time capture projected as REST
//!   headers or RPC metadata, both reflecting the same token value
//! - Credential minters for the three configured sources (static key,
//!   supplied bearer, service-account OAuth exchange)
//! - [`TokenRefresher`] — the background task that re-mints on a fixed
//!   interval shorter than the token lifetime

pub mod config;
pub mod mint;
pub mod refresher;
pub mod store;

pub use config::{AuthConfig, ServiceAccountMaterial};
pub use mint::{
    minter_for, CredentialMinter, ServiceAccountKey, ServiceAccountMinter, StaticMinter,
};
pub use refresher::{seed_store, RefresherConfig, RefresherHandle, TokenRefresher};
pub use store::{CredentialSnapshot, CredentialStore};
