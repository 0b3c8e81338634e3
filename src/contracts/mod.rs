use std::collections::BTreeSet;
use std::fmt;

use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::accounts::{Accounts, AccountsError};
use crate::identity::{recover_signer, Address, IdentityError, Signer};
use crate::ledger::{Bank, EventRecord, LedgerError};
use crate::units::Wei;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallAction {
    Deposit { value: Wei },
    Withdraw { amount: Wei },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Call {
    pub action: CallAction,
    pub nonce: u64,
}

impl Call {
    pub fn deposit(value: Wei, nonce: u64) -> Self {
        Self {
            action: CallAction::Deposit { value },
            nonce,
        }
    }

    pub fn withdraw(amount: Wei, nonce: u64) -> Self {
        Self {
            action: CallAction::Withdraw { amount },
            nonce,
        }
    }

    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"bank-call");
        match &self.action {
            CallAction::Deposit { value } => {
                hasher.update(b"deposit");
                hasher.update(value.as_wei().to_le_bytes());
            }
            CallAction::Withdraw { amount } => {
                hasher.update(b"withdraw");
                hasher.update(amount.as_wei().to_le_bytes());
            }
        }
        hasher.update(self.nonce.to_le_bytes());
        hasher.finalize().into()
    }

    pub fn sign(self, signer: &Signer) -> SignedCall {
        let signature = signer.sign_digest(&self.digest()).to_vec();
        SignedCall {
            call: self,
            public_key: signer.public_key().to_vec(),
            signature,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedCall {
    pub call: Call,
    #[serde(with = "crate::identity::serde_bytes")]
    pub public_key: Vec<u8>,
    #[serde(with = "crate::identity::serde_bytes")]
    pub signature: Vec<u8>,
}

impl SignedCall {
    /// Returns the address that authorized this call.
    pub fn verify(&self) -> Result<Address, IdentityError> {
        recover_signer(&self.public_key, &self.call.digest(), &self.signature)
    }

    /// Identifies the call for replay protection: the same signer sending the
    /// same action and nonce twice yields the same id.
    pub fn id(&self) -> CallId {
        let mut hasher = Sha256::new();
        hasher.update(b"call-id");
        hasher.update(&self.public_key);
        hasher.update(self.call.digest());
        CallId(hasher.finalize().into())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallId([u8; 32]);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallId({self})")
    }
}

impl Serialize for CallId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CallId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| D::Error::custom("call id must be 32 bytes"))?;
        Ok(CallId(bytes))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("call signature rejected")]
    Identity(#[from] IdentityError),
    #[error("call {0} was already applied")]
    Replayed(CallId),
    #[error(transparent)]
    Accounts(#[from] AccountsError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Executes signed calls against the bank, moving attached and withdrawn
/// value between the bank and the external accounts.
///
/// Each call is one transaction: on any error the bank, the accounts and the
/// set of applied calls are left as they were.
#[derive(Debug)]
pub struct Transactor {
    bank: Bank,
    accounts: Accounts,
    applied_calls: BTreeSet<CallId>,
}

impl Transactor {
    pub fn new(bank: Bank, accounts: Accounts) -> Self {
        Self::with_applied_calls(bank, accounts, BTreeSet::new())
    }

    pub fn with_applied_calls(
        bank: Bank,
        accounts: Accounts,
        applied_calls: BTreeSet<CallId>,
    ) -> Self {
        Self {
            bank,
            accounts,
            applied_calls,
        }
    }

    pub fn bank(&self) -> &Bank {
        &self.bank
    }

    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    pub fn accounts_mut(&mut self) -> &mut Accounts {
        &mut self.accounts
    }

    pub fn applied_calls(&self) -> &BTreeSet<CallId> {
        &self.applied_calls
    }

    pub fn execute(&mut self, signed: &SignedCall) -> Result<EventRecord, TransactionError> {
        let caller = signed.verify()?;
        let call_id = signed.id();
        if self.applied_calls.contains(&call_id) {
            warn!(caller = %caller, call = %call_id, "replayed call rejected");
            return Err(TransactionError::Replayed(call_id));
        }

        let record = match &signed.call.action {
            CallAction::Deposit { value } => self.deposit(&caller, *value)?,
            CallAction::Withdraw { amount } => {
                self.bank.withdraw(&caller, *amount, &mut self.accounts)?
            }
        };

        self.applied_calls.insert(call_id);
        info!(caller = %caller, call = %call_id, sequence = record.sequence, "call applied");
        Ok(record)
    }

    fn deposit(&mut self, caller: &Address, value: Wei) -> Result<EventRecord, TransactionError> {
        // A deposit the bank would reject must not touch the caller's account.
        self.bank.check_deposit(caller, value)?;
        self.accounts.debit(caller, value)?;
        match self.bank.deposit(caller, value) {
            Ok(record) => Ok(record),
            Err(err) => {
                self.accounts.credit(caller, value)?;
                Err(err.into())
            }
        }
    }
}
