use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identity::Address;
use crate::ledger::TransferSink;
use crate::units::Wei;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AccountsError {
    #[error("insufficient funds in account {account}")]
    InsufficientFunds { account: Address },
    #[error("unknown account {account}")]
    UnknownAccount { account: Address },
    #[error("balance of account {account} would overflow")]
    Overflow { account: Address },
}

/// Balances held outside the bank: where attached value comes from and
/// where withdrawals land.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Accounts {
    balances: BTreeMap<Address, Wei>,
}

impl Accounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: &Address) -> Wei {
        self.balances.get(account).copied().unwrap_or(Wei::ZERO)
    }

    pub fn credit(&mut self, account: &Address, amount: Wei) -> Result<(), AccountsError> {
        let balance = self.balances.entry(*account).or_insert(Wei::ZERO);
        *balance = balance
            .checked_add(amount)
            .ok_or(AccountsError::Overflow { account: *account })?;
        Ok(())
    }

    pub fn debit(&mut self, account: &Address, amount: Wei) -> Result<(), AccountsError> {
        let balance = self
            .balances
            .get_mut(account)
            .ok_or(AccountsError::UnknownAccount { account: *account })?;
        *balance = balance
            .checked_sub(amount)
            .ok_or(AccountsError::InsufficientFunds { account: *account })?;
        Ok(())
    }
}

impl TransferSink for Accounts {
    type Error = AccountsError;

    fn transfer(&mut self, to: &Address, amount: Wei) -> Result<(), AccountsError> {
        self.credit(to, amount)
    }
}
