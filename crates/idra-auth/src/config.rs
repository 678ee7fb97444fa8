//! Credential source selection from the environment.

use std::path::PathBuf;

use idra_core::{defaults, Error, Result};

/// Which credential source the deployment uses, resolved once at startup.
///
/// Resolution order:
/// 1. `VERTEX_APIKEY` — static provider API key
/// 2. `VERTEX_BEARER_TOKEN` — pre-obtained bearer
/// 3. `VERTEX_USE_OAUTH=1` — service-account OAuth exchange, with material
///    from `GOOGLE_APPLICATION_CREDENTIALS_JSON` (inline), then
///    `GOOGLE_APPLICATION_CREDENTIALS` (path), then the fixed default path.
///
/// Missing or unreadable service-account material in OAuth mode is a fatal
/// configuration error; the process must not start without a mintable
/// credential.
#[derive(Debug, Clone)]
pub enum AuthConfig {
    StaticKey { api_key: String },
    SuppliedBearer { token: String },
    ServiceAccount { material: ServiceAccountMaterial },
}

/// Where the service-account JSON comes from.
#[derive(Debug, Clone)]
pub enum ServiceAccountMaterial {
    InlineJson(String),
    Path(PathBuf),
}

impl AuthConfig {
    /// Resolve the credential source from environment variables.
    pub fn from_env() -> Result<Self> {
        if let Some(api_key) = non_empty_var("VERTEX_APIKEY") {
            return Ok(Self::StaticKey { api_key });
        }

        if let Some(token) = non_empty_var("VERTEX_BEARER_TOKEN") {
            return Ok(Self::SuppliedBearer { token });
        }

        let use_oauth = std::env::var("VERTEX_USE_OAUTH")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        if use_oauth {
            if let Some(json) = non_empty_var("GOOGLE_APPLICATION_CREDENTIALS_JSON") {
                return Ok(Self::ServiceAccount {
                    material: ServiceAccountMaterial::InlineJson(json),
                });
            }

            let path = non_empty_var("GOOGLE_APPLICATION_CREDENTIALS")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(defaults::SERVICE_ACCOUNT_PATH));

            if !path.exists() {
                return Err(Error::Config(format!(
                    "VERTEX_USE_OAUTH is set but service account file not found: {}",
                    path.display()
                )));
            }

            return Ok(Self::ServiceAccount {
                material: ServiceAccountMaterial::Path(path),
            });
        }

        Err(Error::Config(
            "no credential source configured; set VERTEX_APIKEY, VERTEX_BEARER_TOKEN, \
             or VERTEX_USE_OAUTH=1 with service account material"
                .to_string(),
        ))
    }

    /// Short label for config echo endpoints; never exposes secret values.
    pub fn source_label(&self) -> &'static str {
        match self {
            Self::StaticKey { .. } => "static_key",
            Self::SuppliedBearer { .. } => "supplied_bearer",
            Self::ServiceAccount { .. } => "oauth_service_account",
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
