//! Owner-gated custodial ledger.
//!
//! A [`Bank`](ledger::Bank) holds one pooled balance that only its owner may
//! deposit into or withdraw from. Signed calls are executed against it by a
//! [`Transactor`](contracts::Transactor), which moves value between the bank
//! and the external [`Accounts`](accounts::Accounts).

pub mod accounts;
pub mod config;
pub mod contracts;
pub mod identity;
pub mod ledger;
pub mod store;
pub mod units;

pub use accounts::{Accounts, AccountsError};
pub use config::BankConfig;
pub use contracts::{Call, CallAction, SignedCall, TransactionError, Transactor};
pub use identity::{Address, Signer};
pub use ledger::{
    Bank, BankSnapshot, EventListener, EventRecord, LedgerError, LedgerEvent, TransferSink,
};
pub use units::Wei;
