//! On-disk deployment state for the `bank` binary.
//!
//! A deployment is one JSON document holding the bank snapshot, the external
//! account balances, the named signers' secret keys and the ids of calls that
//! were already applied.

use std::collections::{BTreeMap, BTreeSet};
use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};

use crate::accounts::Accounts;
use crate::contracts::{CallId, Transactor};
use crate::identity::{IdentityError, Signer};
use crate::ledger::{Bank, BankSnapshot, SnapshotError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access state file {path}")]
    Io { path: String, source: io::Error },
    #[error("state file {path} is not valid")]
    Format {
        path: String,
        source: serde_json::Error,
    },
    #[error("bank snapshot rejected")]
    Snapshot(#[from] SnapshotError),
    #[error("signer {name:?} is unknown")]
    UnknownSigner { name: String },
    #[error("signer {name:?} already exists")]
    DuplicateSigner { name: String },
    #[error("signer {name:?} has an unusable key")]
    Signer {
        name: String,
        source: IdentityError,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Deployment {
    pub bank: BankSnapshot,
    #[serde(default)]
    pub accounts: Accounts,
    /// name -> ed25519 secret key, hex
    #[serde(default)]
    pub signers: BTreeMap<String, String>,
    #[serde(default)]
    pub applied_calls: BTreeSet<CallId>,
}

impl Deployment {
    pub fn new(bank: &Bank, accounts: Accounts) -> Self {
        Self {
            bank: bank.snapshot(),
            accounts,
            signers: BTreeMap::new(),
            applied_calls: BTreeSet::new(),
        }
    }

    /// Replaces the stored bank, accounts and applied calls with the
    /// transactor's current state. Signers are kept.
    pub fn record(&mut self, transactor: &Transactor) {
        self.bank = transactor.bank().snapshot();
        self.accounts = transactor.accounts().clone();
        self.applied_calls = transactor.applied_calls().clone();
    }

    pub fn add_signer(&mut self, name: &str, signer: &Signer) -> Result<(), StoreError> {
        if self.signers.contains_key(name) {
            return Err(StoreError::DuplicateSigner {
                name: name.to_string(),
            });
        }
        self.signers.insert(name.to_string(), signer.secret_hex());
        Ok(())
    }

    pub fn signer(&self, name: &str) -> Result<Signer, StoreError> {
        let secret = self
            .signers
            .get(name)
            .ok_or_else(|| StoreError::UnknownSigner {
                name: name.to_string(),
            })?;
        Signer::from_secret_hex(secret).map_err(|source| StoreError::Signer {
            name: name.to_string(),
            source,
        })
    }

    /// Rebuilds the live bank and accounts, re-checking the snapshot.
    pub fn transactor(&self) -> Result<Transactor, StoreError> {
        let bank = Bank::restore(self.bank.clone())?;
        Ok(Transactor::with_applied_calls(
            bank,
            self.accounts.clone(),
            self.applied_calls.clone(),
        ))
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let raw = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| StoreError::Format {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| StoreError::Format {
            path: path.display().to_string(),
            source,
        })?;
        // Written beside the target, then renamed into place.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        if let Err(source) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(source));
        }
        tracing::debug!(path = %path.display(), "deployment saved");
        Ok(())
    }
}
