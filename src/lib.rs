//! BankBot Dialogue Engine
//!
//! A conversational banking assistant that:
//! - Resolves free text to a closed intent set (oracle + local fallback)
//! - Extracts amounts and account numbers deterministically
//! - Drives multi-turn, password-gated flows (balance, transfer, cards)
//! - Mutates the ledger only through the secure action executor
//! - Audits every resolved query and queues unanswered ones for review
//!
//! TURN LOOP:
//! MESSAGE → PENDING FLOW? → RESOLVE → AUDIT → DISPATCH → REPLY

pub mod api;
pub mod audit;
pub mod dialogue;
pub mod error;
pub mod executor;
pub mod extractor;
pub mod faq;
pub mod ledger;
pub mod models;
pub mod oracle;
pub mod resolver;
pub mod responder;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use dialogue::{DialogueEngine, Session};
