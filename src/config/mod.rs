use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};

use crate::units::{UnitsError, Wei};

/// Environment variable overriding the minimum deposit, in ether.
pub const MINIMUM_DEPOSIT_ENV: &str = "BANK_MINIMUM_DEPOSIT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Read { path: String, source: io::Error },
    #[error("failed to parse config {path}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("invalid BANK_MINIMUM_DEPOSIT")]
    Override(#[from] UnitsError),
}

/// Deployment parameters. Fixed into a bank when it is deployed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BankConfig {
    /// Smallest value a single deposit may attach, in wei.
    pub minimum_deposit: Wei,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            // 0.1 ether
            minimum_deposit: Wei::from_wei(100_000_000_000_000_000),
        }
    }
}

impl BankConfig {
    /// Reads a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Applies `BANK_MINIMUM_DEPOSIT` from the process environment, if set.
    /// The variable is read in ether, like the CLI amounts.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        let value = std::env::var(MINIMUM_DEPOSIT_ENV).ok();
        self.with_minimum_deposit_override(value.as_deref())
    }

    pub fn with_minimum_deposit_override(
        mut self,
        ether: Option<&str>,
    ) -> Result<Self, ConfigError> {
        if let Some(ether) = ether {
            self.minimum_deposit = Wei::parse_ether(ether)?;
        }
        Ok(self)
    }
}
