//! Core data models for the banking assistant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//
// ================= Intent =================
//

/// Closed set of intents the assistant understands.
///
/// Wire names (`greet`, `check_balance`, ...) match the vocabulary the
/// oracle is trained on; anything it emits outside this set maps to
/// `OutOfScope`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greet,
    CheckBalance,
    AccountDetails,
    TransferMoney,
    AtmInfo,
    BlockCard,
    UnblockCard,
    Support,
    Goodbye,
    LoanInfo,
    InterestRate,
    OutOfScope,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greet => "greet",
            Intent::CheckBalance => "check_balance",
            Intent::AccountDetails => "account_details",
            Intent::TransferMoney => "transfer_money",
            Intent::AtmInfo => "atm_info",
            Intent::BlockCard => "block_card",
            Intent::UnblockCard => "unblock_card",
            Intent::Support => "support",
            Intent::Goodbye => "goodbye",
            Intent::LoanInfo => "loan_info",
            Intent::InterestRate => "interest_rate",
            Intent::OutOfScope => "out_of_scope",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Intent {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let intent = match s {
            "greet" => Intent::Greet,
            "check_balance" => Intent::CheckBalance,
            "account_details" => Intent::AccountDetails,
            "transfer_money" => Intent::TransferMoney,
            "atm_info" => Intent::AtmInfo,
            "block_card" => Intent::BlockCard,
            "unblock_card" => Intent::UnblockCard,
            "support" => Intent::Support,
            "goodbye" => Intent::Goodbye,
            "loan_info" => Intent::LoanInfo,
            "interest_rate" => Intent::InterestRate,
            _ => return Err(()),
        };
        Ok(intent)
    }
}

//
// ================= Resolution =================
//

/// Structured values pulled out of free text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Entities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
}

impl Entities {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none() && self.account_number.is_none()
    }
}

/// Where a resolution came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    Oracle,
    Fallback,
}

/// Ephemeral result of resolving one user utterance.
/// Not persisted beyond the turn that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedUtterance {
    pub intent: Intent,
    pub confidence: f32,
    pub entities: Entities,
    pub source: ResolutionSource,
}

//
// ================= Pending Action =================
//

/// Step of a two-turn card flow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CardFlowStep {
    AwaitingLast6,
    AwaitingPassword,
}

/// The in-progress multi-turn flow a session is inside.
///
/// A single tagged variant replaces independent per-flow flags so that at
/// most one flow can ever be active. Re-entry only advances `step`; slot
/// values captured validly are never overwritten. The state returns to
/// `None` exactly when a flow reaches a terminal outcome or the session is
/// reset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingAction {
    None,
    BalanceQuery,
    Transfer { amount: f64, to_account: String },
    BlockCard { step: CardFlowStep, last6: Option<String> },
    UnblockCard { step: CardFlowStep, last6: Option<String> },
}

impl PendingAction {
    pub fn is_none(&self) -> bool {
        matches!(self, PendingAction::None)
    }
}

impl Default for PendingAction {
    fn default() -> Self {
        PendingAction::None
    }
}

//
// ================= Chat Transcript =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Bot,
}

/// One (speaker, text) pair in a session transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Bot,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

//
// ================= Audit =================
//

/// One audited resolution: who asked what, and how it was classified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatLogEntry {
    pub log_id: Uuid,
    pub account_number: String,
    pub query: String,
    pub intent: Intent,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

//
// ================= Ledger Records =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum CardStatus {
    Active,
    Blocked,
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CardStatus::Active => "ACTIVE",
            CardStatus::Blocked => "BLOCKED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub account_number: String,
    pub holder_name: String,
    pub account_type: String,
    pub balance: f64,
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub card_number: String,
    pub account_number: String,
    pub holder_name: String,
    pub card_type: String,
    pub category: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub status: CardStatus,
    pub created_at: DateTime<Utc>,
}

impl Card {
    /// Last six digits of the card number, the user-facing selector.
    pub fn last6(&self) -> &str {
        let n = self.card_number.len();
        if n >= 6 {
            &self.card_number[n - 6..]
        } else {
            &self.card_number
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: Uuid,
    pub from_account: String,
    pub to_account: String,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}
