//! Ledger: the system of record for accounts, balances and cards
//!
//! The dialogue core only touches accounts through this trait. The
//! in-memory implementation is the reference collaborator; a database
//! backend can replace it without touching the state machine.

use crate::error::BankBotError;
use crate::models::{Account, Card, CardStatus, TransactionRecord};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Hash a plaintext password for storage.
pub fn hash_password(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}

/// Check a plaintext password against a stored hash.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    hash_password(plain) == hash
}

/// Business outcome of a transfer attempt. Password verification happens
/// before this call, in the secure action executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed,
    InsufficientFunds,
    UnknownSender,
    UnknownRecipient,
}

/// Trait for account, card and transaction persistence
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn create_account(&self, account: Account) -> Result<()>;
    async fn get_account(&self, account_number: &str) -> Result<Option<Account>>;
    async fn list_accounts(&self) -> Result<Vec<(String, String)>>;

    /// Debit sender and credit recipient as one atomic unit; never
    /// partially applied.
    async fn transfer(&self, from: &str, to: &str, amount: f64) -> Result<TransferOutcome>;

    async fn add_card(&self, card: Card) -> Result<()>;
    async fn find_card_by_last6(
        &self,
        account_number: &str,
        last6: &str,
        required_status: CardStatus,
    ) -> Result<Option<Card>>;
    async fn set_card_status(
        &self,
        account_number: &str,
        card_number: &str,
        status: CardStatus,
    ) -> Result<()>;

    async fn transaction_history(&self, account_number: &str) -> Result<Vec<TransactionRecord>>;
}

/// In-memory ledger for development and tests
pub struct InMemoryLedger {
    accounts: Arc<RwLock<HashMap<String, Account>>>,
    cards: Arc<RwLock<Vec<Card>>>,
    transactions: Arc<RwLock<Vec<TransactionRecord>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            cards: Arc::new(RwLock::new(Vec::new())),
            transactions: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn create_account(&self, account: Account) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        accounts.insert(account.account_number.clone(), account);
        Ok(())
    }

    async fn get_account(&self, account_number: &str) -> Result<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(account_number).cloned())
    }

    async fn list_accounts(&self) -> Result<Vec<(String, String)>> {
        let accounts = self.accounts.read().await;
        let mut listed: Vec<_> = accounts
            .values()
            .map(|a| (a.account_number.clone(), a.holder_name.clone()))
            .collect();
        listed.sort();
        Ok(listed)
    }

    async fn transfer(&self, from: &str, to: &str, amount: f64) -> Result<TransferOutcome> {
        // One write lock spans the debit and the credit: the pair is
        // atomic and never partially applied.
        let mut accounts = self.accounts.write().await;

        let Some(sender) = accounts.get(from) else {
            return Ok(TransferOutcome::UnknownSender);
        };
        if sender.balance < amount {
            return Ok(TransferOutcome::InsufficientFunds);
        }
        if !accounts.contains_key(to) {
            return Ok(TransferOutcome::UnknownRecipient);
        }

        if let Some(sender) = accounts.get_mut(from) {
            sender.balance -= amount;
        }
        if let Some(recipient) = accounts.get_mut(to) {
            recipient.balance += amount;
        }

        drop(accounts);

        let record = TransactionRecord {
            transaction_id: Uuid::new_v4(),
            from_account: from.to_string(),
            to_account: to.to_string(),
            amount,
            timestamp: Utc::now(),
        };

        let mut transactions = self.transactions.write().await;
        transactions.push(record);

        info!(from = %from, to = %to, amount, "Transfer completed");

        Ok(TransferOutcome::Completed)
    }

    async fn add_card(&self, card: Card) -> Result<()> {
        let mut cards = self.cards.write().await;
        cards.push(card);
        Ok(())
    }

    async fn find_card_by_last6(
        &self,
        account_number: &str,
        last6: &str,
        required_status: CardStatus,
    ) -> Result<Option<Card>> {
        let cards = self.cards.read().await;
        Ok(cards
            .iter()
            .find(|c| {
                c.account_number == account_number
                    && c.status == required_status
                    && c.last6() == last6
            })
            .cloned())
    }

    async fn set_card_status(
        &self,
        account_number: &str,
        card_number: &str,
        status: CardStatus,
    ) -> Result<()> {
        let mut cards = self.cards.write().await;

        let card = cards
            .iter_mut()
            .find(|c| c.account_number == account_number && c.card_number == card_number)
            .ok_or_else(|| {
                BankBotError::LedgerError(format!(
                    "No card {} on account {}",
                    card_number, account_number
                ))
            })?;

        card.status = status;
        info!(account = %account_number, card = %card.last6(), status = %status, "Card status updated");

        Ok(())
    }

    async fn transaction_history(&self, account_number: &str) -> Result<Vec<TransactionRecord>> {
        let transactions = self.transactions.read().await;

        let mut history: Vec<_> = transactions
            .iter()
            .filter(|t| t.from_account == account_number || t.to_account == account_number)
            .cloned()
            .collect();

        // Most recent first
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(history)
    }
}
