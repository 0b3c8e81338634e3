use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::BankConfig;
use crate::identity::Address;
use crate::units::Wei;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("account {account} is not authorized to operate this bank")]
    Unauthorized { account: Address },
    #[error("Not enough funds provided")]
    InsufficientFunds,
    #[error("you cannot withdraw this much")]
    InsufficientBalance,
    #[error("transfer of {amount} wei to {to} failed: {reason}")]
    TransferFailed {
        to: Address,
        amount: Wei,
        reason: String,
    },
    #[error("balance overflow")]
    Overflow,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("state root mismatch")]
    RootMismatch,
    #[error("event {sequence} is out of order")]
    OutOfOrder { sequence: u64 },
    #[error("event {sequence} names {account}, not the owner")]
    ForeignAccount { sequence: u64, account: Address },
    #[error("event log does not add up to the recorded balance")]
    BalanceMismatch,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum LedgerEvent {
    Deposit { from: Address, amount: Wei },
    Withdraw { to: Address, amount: Wei },
}

impl LedgerEvent {
    fn account(&self) -> &Address {
        match self {
            LedgerEvent::Deposit { from, .. } => from,
            LedgerEvent::Withdraw { to, .. } => to,
        }
    }
}

/// A committed event and its 1-based position in the bank's log.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventRecord {
    pub sequence: u64,
    pub event: LedgerEvent,
}

/// Receives value leaving the bank on withdrawal.
pub trait TransferSink {
    type Error: fmt::Display;

    fn transfer(&mut self, to: &Address, amount: Wei) -> Result<(), Self::Error>;
}

/// Observes events after they are committed.
pub trait EventListener: Send + Sync {
    fn on_event(&self, record: &EventRecord);
}

/// The custodial ledger: one owner, one pooled balance.
pub struct Bank {
    owner: Address,
    balance: Wei,
    config: BankConfig,
    events: Vec<EventRecord>,
    listeners: Vec<Box<dyn EventListener>>,
}

impl Bank {
    pub fn deploy(creator: Address, config: BankConfig) -> Self {
        info!(
            owner = %creator,
            minimum_deposit = %config.minimum_deposit,
            "bank deployed"
        );
        Self {
            owner: creator,
            balance: Wei::ZERO,
            config,
            events: Vec::new(),
            listeners: Vec::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn balance(&self) -> Wei {
        self.balance
    }

    pub fn minimum_deposit(&self) -> Wei {
        self.config.minimum_deposit
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn subscribe(&mut self, listener: Box<dyn EventListener>) {
        self.listeners.push(listener);
    }

    fn ensure_owner(&self, caller: &Address) -> Result<(), LedgerError> {
        if *caller != self.owner {
            return Err(LedgerError::Unauthorized { account: *caller });
        }
        Ok(())
    }

    /// Checks the deposit preconditions without touching state.
    pub fn check_deposit(&self, caller: &Address, value: Wei) -> Result<Wei, LedgerError> {
        self.ensure_owner(caller)?;
        if value < self.config.minimum_deposit {
            return Err(LedgerError::InsufficientFunds);
        }
        self.balance.checked_add(value).ok_or(LedgerError::Overflow)
    }

    /// Credits the pooled balance with the value attached by `caller`.
    pub fn deposit(&mut self, caller: &Address, value: Wei) -> Result<EventRecord, LedgerError> {
        let balance = self.check_deposit(caller, value).map_err(|err| {
            warn!(caller = %caller, value = %value, error = %err, "deposit rejected");
            err
        })?;
        self.balance = balance;
        Ok(self.commit(LedgerEvent::Deposit {
            from: *caller,
            amount: value,
        }))
    }

    /// Debits `amount` and hands it to `sink` for delivery to `caller`.
    ///
    /// Nothing is committed unless the sink accepts the transfer.
    pub fn withdraw<S: TransferSink + ?Sized>(
        &mut self,
        caller: &Address,
        amount: Wei,
        sink: &mut S,
    ) -> Result<EventRecord, LedgerError> {
        let balance = self.check_withdraw(caller, amount).map_err(|err| {
            warn!(caller = %caller, amount = %amount, error = %err, "withdraw rejected");
            err
        })?;
        if let Err(err) = sink.transfer(caller, amount) {
            warn!(caller = %caller, amount = %amount, error = %err, "withdraw transfer failed");
            return Err(LedgerError::TransferFailed {
                to: *caller,
                amount,
                reason: err.to_string(),
            });
        }
        self.balance = balance;
        Ok(self.commit(LedgerEvent::Withdraw {
            to: *caller,
            amount,
        }))
    }

    fn check_withdraw(&self, caller: &Address, amount: Wei) -> Result<Wei, LedgerError> {
        self.ensure_owner(caller)?;
        self.balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance)
    }

    fn commit(&mut self, event: LedgerEvent) -> EventRecord {
        let record = EventRecord {
            sequence: self.events.len() as u64 + 1,
            event,
        };
        info!(
            sequence = record.sequence,
            event = ?record.event,
            balance = %self.balance,
            "bank event committed"
        );
        self.events.push(record.clone());
        for listener in &self.listeners {
            debug!(sequence = record.sequence, "notifying listener");
            listener.on_event(&record);
        }
        record
    }

    pub fn snapshot(&self) -> BankSnapshot {
        BankSnapshot {
            owner: self.owner,
            balance: self.balance,
            minimum_deposit: self.config.minimum_deposit,
            events: self.events.clone(),
            state_root: compute_state_root(
                &self.owner,
                self.balance,
                self.config.minimum_deposit,
                &self.events,
            ),
        }
    }

    /// Rebuilds a bank from a snapshot after checking its root and event log.
    pub fn restore(snapshot: BankSnapshot) -> Result<Self, SnapshotError> {
        let root = compute_state_root(
            &snapshot.owner,
            snapshot.balance,
            snapshot.minimum_deposit,
            &snapshot.events,
        );
        if root != snapshot.state_root {
            return Err(SnapshotError::RootMismatch);
        }

        let mut replayed = Wei::ZERO;
        for (idx, record) in snapshot.events.iter().enumerate() {
            if record.sequence != idx as u64 + 1 {
                return Err(SnapshotError::OutOfOrder {
                    sequence: record.sequence,
                });
            }
            if *record.event.account() != snapshot.owner {
                return Err(SnapshotError::ForeignAccount {
                    sequence: record.sequence,
                    account: *record.event.account(),
                });
            }
            replayed = match &record.event {
                LedgerEvent::Deposit { amount, .. } => replayed.checked_add(*amount),
                LedgerEvent::Withdraw { amount, .. } => replayed.checked_sub(*amount),
            }
            .ok_or(SnapshotError::BalanceMismatch)?;
        }
        if replayed != snapshot.balance {
            return Err(SnapshotError::BalanceMismatch);
        }

        Ok(Self {
            owner: snapshot.owner,
            balance: snapshot.balance,
            config: BankConfig {
                minimum_deposit: snapshot.minimum_deposit,
            },
            events: snapshot.events,
            listeners: Vec::new(),
        })
    }
}

impl fmt::Debug for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bank")
            .field("owner", &self.owner)
            .field("balance", &self.balance)
            .field("config", &self.config)
            .field("events", &self.events.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BankSnapshot {
    pub owner: Address,
    pub balance: Wei,
    pub minimum_deposit: Wei,
    pub events: Vec<EventRecord>,
    #[serde(with = "hex_root")]
    pub state_root: [u8; 32],
}

fn compute_state_root(
    owner: &Address,
    balance: Wei,
    minimum_deposit: Wei,
    events: &[EventRecord],
) -> [u8; 32] {
    let mut leaves: Vec<[u8; 32]> = Vec::with_capacity(events.len() + 1);

    let mut hasher = Sha256::new();
    hasher.update(b"bank");
    hasher.update(owner.as_bytes());
    hasher.update(balance.as_wei().to_le_bytes());
    hasher.update(minimum_deposit.as_wei().to_le_bytes());
    leaves.push(hasher.finalize().into());

    for record in events {
        let mut hasher = Sha256::new();
        hasher.update(b"event");
        hasher.update(record.sequence.to_le_bytes());
        match &record.event {
            LedgerEvent::Deposit { from, amount } => {
                hasher.update(b"deposit");
                hasher.update(from.as_bytes());
                hasher.update(amount.as_wei().to_le_bytes());
            }
            LedgerEvent::Withdraw { to, amount } => {
                hasher.update(b"withdraw");
                hasher.update(to.as_bytes());
                hasher.update(amount.as_wei().to_le_bytes());
            }
        }
        leaves.push(hasher.finalize().into());
    }
    build_merkle(leaves)
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"bank-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            if chunk.len() == 2 {
                hasher.update(chunk[1]);
            } else {
                hasher.update(chunk[0]);
            }
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

mod hex_root {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom("state root must be 32 bytes"))
    }
}
