//! Shared setup for the integration suites.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use bank_ledger::{
    Accounts, Address, Bank, BankConfig, Call, EventListener, EventRecord, LedgerEvent,
    SignedCall, Signer, TransactionError, Transactor, Wei,
};

pub fn ether(s: &str) -> Wei {
    Wei::parse_ether(s).expect("valid ether amount")
}

/// Collects every event the bank commits.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<EventRecord>>>);

impl EventLog {
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|record| record.event.clone())
            .collect()
    }
}

impl EventListener for EventLog {
    fn on_event(&self, record: &EventRecord) {
        self.0.lock().unwrap().push(record.clone());
    }
}

/// A deployed bank with an owner and two other signers, each funded with
/// 100 ether in their external accounts.
pub struct TestContext {
    pub owner: Signer,
    pub user1: Signer,
    pub user2: Signer,
    pub transactor: Transactor,
    pub log: EventLog,
    nonce: u64,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(BankConfig::default())
    }

    pub fn with_config(config: BankConfig) -> Self {
        let owner = Signer::generate();
        let user1 = Signer::generate();
        let user2 = Signer::generate();

        let mut accounts = Accounts::new();
        for signer in [&owner, &user1, &user2] {
            accounts
                .credit(&signer.address(), ether("100"))
                .expect("fund account");
        }

        let log = EventLog::default();
        let mut bank = Bank::deploy(owner.address(), config);
        bank.subscribe(Box::new(log.clone()));

        Self {
            owner,
            user1,
            user2,
            transactor: Transactor::new(bank, accounts),
            log,
            nonce: 0,
        }
    }

    fn next_nonce(&mut self) -> u64 {
        self.nonce += 1;
        self.nonce
    }

    pub fn sign_deposit(&mut self, signer: &Signer, value: Wei) -> SignedCall {
        Call::deposit(value, self.next_nonce()).sign(signer)
    }

    pub fn sign_withdraw(&mut self, signer: &Signer, amount: Wei) -> SignedCall {
        Call::withdraw(amount, self.next_nonce()).sign(signer)
    }

    pub fn deposit(
        &mut self,
        signer: &Signer,
        value: Wei,
    ) -> Result<EventRecord, TransactionError> {
        let call = self.sign_deposit(signer, value);
        self.transactor.execute(&call)
    }

    pub fn withdraw(
        &mut self,
        signer: &Signer,
        amount: Wei,
    ) -> Result<EventRecord, TransactionError> {
        let call = self.sign_withdraw(signer, amount);
        self.transactor.execute(&call)
    }

    pub fn bank_balance(&self) -> Wei {
        self.transactor.bank().balance()
    }

    pub fn wallet(&self, address: &Address) -> Wei {
        self.transactor.accounts().balance_of(address)
    }
}
