//! Backend selection.
//!
//! Configuration is resolved once at startup into an explicit
//! [`StorageConfig`] value and passed to [`connect`]; the caller owns the
//! resulting adapter for the process lifetime. Switching backends means
//! building a new config and reconnecting, never a live swap.

use std::env;
use std::path::PathBuf;

use log::info;

use crate::error::Result;
use crate::storage::local::LocalStore;
use crate::storage::remote::RemoteStore;
use crate::storage::StorageAdapter;

pub const MODE_ENV: &str = "GUARDRAILS_STORAGE_MODE";
pub const DB_PATH_ENV: &str = "GUARDRAILS_DB_PATH";
pub const API_URL_ENV: &str = "GUARDRAILS_API_URL";

const DEFAULT_DB_PATH: &str = "guardrails.db";
const DEFAULT_API_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Local { path: PathBuf },
    Remote { base_url: String },
}

impl StorageConfig {
    /// Resolve configuration from the environment, read exactly once.
    /// Unset or unrecognized mode defaults to the local store; "remote"
    /// (legacy alias "hosted") selects the hosted backend.
    pub fn from_env() -> Self {
        let mode = env::var(MODE_ENV).unwrap_or_default().to_lowercase();
        match mode.as_str() {
            "remote" | "hosted" => StorageConfig::Remote {
                base_url: env::var(API_URL_ENV).unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            },
            _ => StorageConfig::Local {
                path: env::var(DB_PATH_ENV)
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB_PATH)),
            },
        }
    }
}

/// Construct the adapter described by `config`. Opening a local store runs
/// any pending schema migrations before returning.
pub async fn connect(config: &StorageConfig) -> Result<Box<dyn StorageAdapter>> {
    match config {
        StorageConfig::Local { path } => {
            info!("storage backend: local ({})", path.display());
            Ok(Box::new(LocalStore::open(path.clone()).await?))
        }
        StorageConfig::Remote { base_url } => {
            info!("storage backend: remote ({base_url})");
            Ok(Box::new(RemoteStore::new(base_url.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var reads are process-global, so these tests set and clear the
    // variables they inspect within a single test body.
    #[test]
    fn test_mode_resolution() {
        env::remove_var(MODE_ENV);
        env::remove_var(DB_PATH_ENV);
        env::remove_var(API_URL_ENV);
        assert_eq!(
            StorageConfig::from_env(),
            StorageConfig::Local {
                path: PathBuf::from(DEFAULT_DB_PATH)
            }
        );

        env::set_var(MODE_ENV, "remote");
        env::set_var(API_URL_ENV, "https://plan.example.com");
        assert_eq!(
            StorageConfig::from_env(),
            StorageConfig::Remote {
                base_url: "https://plan.example.com".to_string()
            }
        );

        // Legacy alias still selects the hosted backend.
        env::set_var(MODE_ENV, "hosted");
        assert!(matches!(
            StorageConfig::from_env(),
            StorageConfig::Remote { .. }
        ));

        // Unrecognized values fall back to local.
        env::set_var(MODE_ENV, "cloud");
        assert!(matches!(
            StorageConfig::from_env(),
            StorageConfig::Local { .. }
        ));

        env::remove_var(MODE_ENV);
        env::remove_var(API_URL_ENV);
    }
}
