//! Secure action executor
//!
//! Every mutating banking action funnels through here: exactly one password
//! verification followed by exactly one ledger mutation. Outcomes are mapped
//! to user-facing text at this boundary, so the dialogue loop never sees a
//! panic or a raw error from an action.

use crate::ledger::{verify_password, Ledger, TransferOutcome};
use crate::models::CardStatus;
use crate::Result;
use std::sync::Arc;
use tracing::{info, warn};

const INTERNAL_ERROR_REPLY: &str = "Something went wrong on our side. Please try again.";

pub struct ActionExecutor {
    ledger: Arc<dyn Ledger>,
}

impl ActionExecutor {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Transfer money out of `from`. The password authenticates the sender.
    pub async fn transfer(&self, from: &str, to: &str, amount: f64, password: &str) -> String {
        match self.try_transfer(from, to, amount, password).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Transfer execution failed");
                INTERNAL_ERROR_REPLY.to_string()
            }
        }
    }

    async fn try_transfer(
        &self,
        from: &str,
        to: &str,
        amount: f64,
        password: &str,
    ) -> Result<String> {
        let Some(sender) = self.ledger.get_account(from).await? else {
            return Ok("Invalid sender account.".to_string());
        };

        if !verify_password(password, &sender.password_hash) {
            warn!(account = %from, "Transfer rejected: incorrect password");
            return Ok("Incorrect password.".to_string());
        }

        let reply = match self.ledger.transfer(from, to, amount).await? {
            TransferOutcome::Completed => {
                info!(from = %from, to = %to, amount, "Transfer executed");
                format!("Transfer successful. ₹{:.2} sent to account {}.", amount, to)
            }
            TransferOutcome::InsufficientFunds => "Insufficient balance.".to_string(),
            TransferOutcome::UnknownRecipient => "Invalid recipient account.".to_string(),
            TransferOutcome::UnknownSender => "Invalid sender account.".to_string(),
        };

        Ok(reply)
    }

    /// Block the active card ending in `last6` on `account`.
    pub async fn block_card(&self, account: &str, last6: &str, password: &str) -> String {
        match self
            .try_card_action(account, last6, password, CardStatus::Active, CardStatus::Blocked)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Card block execution failed");
                INTERNAL_ERROR_REPLY.to_string()
            }
        }
    }

    /// Unblock the blocked card ending in `last6` on `account`.
    pub async fn unblock_card(&self, account: &str, last6: &str, password: &str) -> String {
        match self
            .try_card_action(account, last6, password, CardStatus::Blocked, CardStatus::Active)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Card unblock execution failed");
                INTERNAL_ERROR_REPLY.to_string()
            }
        }
    }

    async fn try_card_action(
        &self,
        account: &str,
        last6: &str,
        password: &str,
        required_status: CardStatus,
        new_status: CardStatus,
    ) -> Result<String> {
        let Some(card) = self
            .ledger
            .find_card_by_last6(account, last6, required_status)
            .await?
        else {
            let reply = match required_status {
                CardStatus::Active => "No active card found with those last 6 digits.",
                CardStatus::Blocked => "No blocked card found with those last 6 digits.",
            };
            return Ok(reply.to_string());
        };

        let Some(holder) = self.ledger.get_account(account).await? else {
            return Ok("Invalid sender account.".to_string());
        };

        if !verify_password(password, &holder.password_hash) {
            warn!(account = %account, "Card action rejected: incorrect password");
            let reply = match new_status {
                CardStatus::Blocked => "Incorrect password. Card block failed.",
                CardStatus::Active => "Incorrect password. Unblock failed.",
            };
            return Ok(reply.to_string());
        }

        self.ledger
            .set_card_status(account, &card.card_number, new_status)
            .await?;

        let reply = match new_status {
            CardStatus::Blocked => {
                format!("Card ending with {} has been blocked successfully.", last6)
            }
            CardStatus::Active => {
                format!("Card ending with {} has been successfully unblocked.", last6)
            }
        };

        Ok(reply)
    }
}
