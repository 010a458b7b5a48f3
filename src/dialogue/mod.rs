//! Multi-turn dialogue state machine
//!
//! One `Session` per logged-in user; `DialogueEngine::handle_turn` consumes
//! a user message, advances at most one pending flow, and produces exactly
//! one reply. Password-gated actions (balance, transfer, card block/unblock)
//! are driven by `PendingAction` and finish in the secure executor.

use crate::audit::ChatAuditLog;
use crate::executor::ActionExecutor;
use crate::extractor;
use crate::faq::{worth_suggesting, FaqStore};
use crate::ledger::{verify_password, Ledger};
use crate::models::{
    CardFlowStep, ChatLogEntry, ChatTurn, Intent, PendingAction, ResolvedUtterance,
};
use crate::oracle::IntentOracle;
use crate::resolver;
use crate::responder::GenericResponder;
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const WELCOME: &str = "Hello! Welcome to BankBot. How can I help you today?";
const APOLOGY: &str =
    "Sorry, I couldn't process that right now. Please try again in a moment.";

//
// ================= Session =================
//

/// Per-user conversation state. Turn-synchronous: one message in flight at
/// a time, so all access goes through `&mut`.
#[derive(Debug, Clone)]
pub struct Session {
    pub account_id: String,
    pub turn_log: Vec<ChatTurn>,
    pub pending_action: PendingAction,
    pub greeted: bool,
}

impl Session {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            turn_log: Vec::new(),
            pending_action: PendingAction::None,
            greeted: false,
        }
    }

    /// Clear transcript, pending flow and greeting. The account binding
    /// survives; a reset session behaves exactly like a fresh one.
    pub fn reset(&mut self) {
        self.turn_log.clear();
        self.pending_action = PendingAction::None;
        self.greeted = false;
    }
}

//
// ================= Engine =================
//

pub struct DialogueEngine {
    oracle: Option<Box<dyn IntentOracle>>,
    ledger: Arc<dyn Ledger>,
    executor: ActionExecutor,
    faq: Arc<FaqStore>,
    responder: Box<dyn GenericResponder>,
    audit: Arc<ChatAuditLog>,
    trust_threshold: f32,
}

impl DialogueEngine {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        faq: Arc<FaqStore>,
        responder: Box<dyn GenericResponder>,
        audit: Arc<ChatAuditLog>,
    ) -> Self {
        Self {
            oracle: None,
            executor: ActionExecutor::new(ledger.clone()),
            ledger,
            faq,
            responder,
            audit,
            trust_threshold: 0.6,
        }
    }

    pub fn with_oracle(mut self, oracle: Box<dyn IntentOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_trust_threshold(mut self, threshold: f32) -> Self {
        self.trust_threshold = threshold;
        self
    }

    /// Process one user message and return the bot reply.
    ///
    /// Both the user message and the reply are appended to the session's
    /// turn log. A fresh session gets a one-time welcome turn first.
    pub async fn handle_turn(&self, session: &mut Session, text: &str) -> Result<String> {
        if !session.greeted {
            session.turn_log.push(ChatTurn::bot(WELCOME));
            session.greeted = true;
        }

        session.turn_log.push(ChatTurn::user(text));

        let pending = std::mem::take(&mut session.pending_action);
        let reply = match pending {
            PendingAction::None => self.resolve_and_dispatch(session, text).await?,
            PendingAction::BalanceQuery => self.continue_balance(session, text).await?,
            PendingAction::Transfer { amount, to_account } => {
                // Terminal on any outcome; state already cleared.
                self.executor
                    .transfer(&session.account_id, &to_account, amount, text)
                    .await
            }
            PendingAction::BlockCard { step, last6 } => {
                self.continue_card_flow(session, text, Intent::BlockCard, step, last6)
                    .await
            }
            PendingAction::UnblockCard { step, last6 } => {
                self.continue_card_flow(session, text, Intent::UnblockCard, step, last6)
                    .await
            }
        };

        session.turn_log.push(ChatTurn::bot(reply.clone()));
        Ok(reply)
    }

    //
    // ================= Pending Flows =================
    //

    /// Balance flow: the message is a password attempt. A wrong password
    /// reprompts; the flow only ends on success.
    async fn continue_balance(&self, session: &mut Session, password: &str) -> Result<String> {
        let Some(account) = self.ledger.get_account(&session.account_id).await? else {
            warn!(account = %session.account_id, "Balance flow for unknown account");
            return Ok("Account not found. Please log in again.".to_string());
        };

        if !verify_password(password, &account.password_hash) {
            session.pending_action = PendingAction::BalanceQuery;
            return Ok("Incorrect password. Please try again.".to_string());
        }

        info!(account = %session.account_id, "Balance disclosed");

        Ok(format!(
            "Account Balance\nAccount Type: {}\nAvailable Balance: ₹{}\nAs of {}",
            account.account_type,
            format_money(account.balance),
            Utc::now().format("%d %b %Y, %H:%M"),
        ))
    }

    /// Card flows share one shape: collect exactly 6 digits, then a
    /// password, then hand off to the executor. The password step is
    /// terminal on any outcome.
    async fn continue_card_flow(
        &self,
        session: &mut Session,
        text: &str,
        intent: Intent,
        step: CardFlowStep,
        last6: Option<String>,
    ) -> String {
        match step {
            CardFlowStep::AwaitingLast6 => {
                let candidate = text.trim();
                if !is_valid_last6(candidate) {
                    session.pending_action = card_pending(intent, step, last6);
                    return "Please enter a valid 6-digit number.".to_string();
                }

                let verb = if intent == Intent::BlockCard { "block" } else { "unblock" };
                session.pending_action = card_pending(
                    intent,
                    CardFlowStep::AwaitingPassword,
                    Some(candidate.to_string()),
                );
                format!("Please enter your account password to {} the card.", verb)
            }
            CardFlowStep::AwaitingPassword => {
                let Some(last6) = last6 else {
                    // Unreachable through handle_turn; recover by restarting.
                    session.pending_action =
                        card_pending(intent, CardFlowStep::AwaitingLast6, None);
                    return "Please enter the last 6 digits of your card number.".to_string();
                };

                if intent == Intent::BlockCard {
                    self.executor
                        .block_card(&session.account_id, &last6, text)
                        .await
                } else {
                    self.executor
                        .unblock_card(&session.account_id, &last6, text)
                        .await
                }
            }
        }
    }

    //
    // ================= Resolution and Dispatch =================
    //

    /// No flow active: classify the message, audit it, and either answer
    /// directly or open a flow.
    async fn resolve_and_dispatch(&self, session: &mut Session, text: &str) -> Result<String> {
        let resolution = self.resolve(text).await;

        debug!(
            intent = %resolution.intent,
            confidence = resolution.confidence,
            source = ?resolution.source,
            "Utterance resolved"
        );

        self.audit
            .record(ChatLogEntry {
                log_id: Uuid::new_v4(),
                account_number: session.account_id.clone(),
                query: text.to_string(),
                intent: resolution.intent,
                confidence: resolution.confidence,
                timestamp: Utc::now(),
            })
            .await?;

        let reply = match resolution.intent {
            Intent::CheckBalance => {
                session.pending_action = PendingAction::BalanceQuery;
                "Balance enquiry: please enter your account password to view your balance."
                    .to_string()
            }
            Intent::AccountDetails => match self.ledger.get_account(&session.account_id).await? {
                Some(account) => format!(
                    "Account Details\nAccount Holder: {}\nAccount Number: {}\nAccount Type: {}",
                    account.holder_name, account.account_number, account.account_type,
                ),
                None => "Account not found. Please log in again.".to_string(),
            },
            Intent::TransferMoney => {
                match (resolution.entities.amount, resolution.entities.account_number) {
                    (Some(amount), Some(to_account)) if amount > 0.0 => {
                        session.pending_action = PendingAction::Transfer {
                            amount,
                            to_account: to_account.clone(),
                        };
                        format!(
                            "Transfer request: ₹{} to account {}. \
                             Please enter your account password to confirm.",
                            format_money(amount),
                            to_account,
                        )
                    }
                    _ => "Please specify amount and receiver account.\n\
                          Example: Transfer 5000 to account 12345"
                        .to_string(),
                }
            }
            Intent::BlockCard => {
                session.pending_action = PendingAction::BlockCard {
                    step: CardFlowStep::AwaitingLast6,
                    last6: None,
                };
                "Card block request: please enter the last 6 digits of your card number."
                    .to_string()
            }
            Intent::UnblockCard => {
                session.pending_action = PendingAction::UnblockCard {
                    step: CardFlowStep::AwaitingLast6,
                    last6: None,
                };
                "Card unblock request: please enter the last 6 digits of your card number."
                    .to_string()
            }
            Intent::AtmInfo => {
                "You can locate ATMs through the bank mobile app or by searching \
                 \"ATM near me\" in Google Maps. ATMs are available 24/7."
                    .to_string()
            }
            Intent::Support => "Customer care: 1800-123-456, available 24/7.".to_string(),
            Intent::Goodbye => "Thank you for banking with us. Have a great day!".to_string(),
            // Everything without a dedicated flow or canned reply goes to
            // the knowledge base, then the generic responder. Greetings are
            // already covered by the one-time welcome turn.
            Intent::Greet | Intent::LoanInfo | Intent::InterestRate | Intent::OutOfScope => {
                self.answer_unrouted(text, &resolution).await
            }
        };

        Ok(reply)
    }

    /// Oracle gate: trust the oracle when it answers with confidence at or
    /// above the threshold; otherwise fall back to the local resolver.
    async fn resolve(&self, text: &str) -> ResolvedUtterance {
        if let Some(oracle) = &self.oracle {
            match oracle.predict(text).await {
                Ok(prediction) if prediction.confidence >= self.trust_threshold => {
                    let mut resolved = prediction.into_resolved();
                    // Fill entity gaps deterministically for entity-bearing
                    // intents.
                    if resolved.intent == Intent::TransferMoney {
                        let extracted = extractor::extract(text);
                        if resolved.entities.amount.is_none() {
                            resolved.entities.amount = extracted.amount;
                        }
                        if resolved.entities.account_number.is_none() {
                            resolved.entities.account_number = extracted.account_number;
                        }
                    }
                    return resolved;
                }
                Ok(prediction) => {
                    debug!(
                        confidence = prediction.confidence,
                        "Oracle below trust threshold, using fallback resolver"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Oracle unavailable, using fallback resolver");
                }
            }
        }

        resolver::resolve(text)
    }

    /// FAQ first, then the generic responder. Low-confidence misses feed
    /// the FAQ suggestion queue.
    async fn answer_unrouted(&self, text: &str, resolution: &ResolvedUtterance) -> String {
        if let Some(answer) = self.faq.lookup(text).await {
            return answer;
        }

        if worth_suggesting(resolution.intent, resolution.confidence, self.trust_threshold) {
            self.faq.record_suggestion(text, resolution.confidence).await;
        }

        match self.responder.respond(text).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "Generic responder failed");
                APOLOGY.to_string()
            }
        }
    }
}

fn card_pending(intent: Intent, step: CardFlowStep, last6: Option<String>) -> PendingAction {
    if intent == Intent::BlockCard {
        PendingAction::BlockCard { step, last6 }
    } else {
        PendingAction::UnblockCard { step, last6 }
    }
}

/// Card selector: exactly six ASCII digits.
fn is_valid_last6(text: &str) -> bool {
    text.len() == 6 && text.chars().all(|c| c.is_ascii_digit())
}

/// Two decimal places with thousands separators.
fn format_money(amount: f64) -> String {
    let raw = format!("{:.2}", amount);
    let (int_part, frac_part) = match raw.split_once('.') {
        Some(parts) => parts,
        None => (raw.as_str(), "00"),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(raw.len() + 4);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    format!("{}.{}", grouped, frac_part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{hash_password, InMemoryLedger};
    use crate::models::{Account, Card, CardStatus};
    use crate::oracle::{FixedOracle, UnavailableOracle};
    use crate::responder::{CannedResponder, FailingResponder};

    async fn seeded_ledger() -> Arc<InMemoryLedger> {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger
            .create_account(Account {
                account_number: "1001".to_string(),
                holder_name: "Asha".to_string(),
                account_type: "Savings".to_string(),
                balance: 5000.0,
                password_hash: hash_password("secret123"),
            })
            .await
            .unwrap();
        ledger
            .create_account(Account {
                account_number: "9988776655".to_string(),
                holder_name: "Ravi".to_string(),
                account_type: "Current".to_string(),
                balance: 100.0,
                password_hash: hash_password("other456"),
            })
            .await
            .unwrap();
        ledger
            .add_card(Card {
                card_number: "4567891234123456".to_string(),
                account_number: "1001".to_string(),
                holder_name: "Asha".to_string(),
                card_type: "Debit".to_string(),
                category: "VISA".to_string(),
                expiry_month: "04".to_string(),
                expiry_year: "2029".to_string(),
                status: CardStatus::Active,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        ledger
    }

    async fn engine() -> (DialogueEngine, Arc<FaqStore>, Arc<ChatAuditLog>) {
        let faq = Arc::new(FaqStore::new());
        let audit = Arc::new(ChatAuditLog::new());
        let engine = DialogueEngine::new(
            seeded_ledger().await,
            faq.clone(),
            Box::new(CannedResponder::default()),
            audit.clone(),
        );
        (engine, faq, audit)
    }

    #[tokio::test]
    async fn test_first_turn_gets_one_time_welcome() {
        let (engine, _, _) = engine().await;
        let mut session = Session::new("1001");

        engine.handle_turn(&mut session, "hi").await.unwrap();
        engine.handle_turn(&mut session, "hello again").await.unwrap();

        let welcomes = session
            .turn_log
            .iter()
            .filter(|t| t.text == WELCOME)
            .count();
        assert_eq!(welcomes, 1);
        // welcome + 2 user + 2 bot
        assert_eq!(session.turn_log.len(), 5);
    }

    #[tokio::test]
    async fn test_balance_flow_retries_until_success() {
        let (engine, _, _) = engine().await;
        let mut session = Session::new("1001");

        let reply = engine.handle_turn(&mut session, "what is my balance").await.unwrap();
        assert!(reply.contains("password"));
        assert_eq!(session.pending_action, PendingAction::BalanceQuery);

        // Wrong password keeps the flow open.
        let reply = engine.handle_turn(&mut session, "wrong").await.unwrap();
        assert_eq!(reply, "Incorrect password. Please try again.");
        assert_eq!(session.pending_action, PendingAction::BalanceQuery);

        let reply = engine.handle_turn(&mut session, "wrong again").await.unwrap();
        assert_eq!(reply, "Incorrect password. Please try again.");

        let reply = engine.handle_turn(&mut session, "secret123").await.unwrap();
        assert!(reply.contains("5,000.00"));
        assert!(reply.contains("Savings"));
        assert!(session.pending_action.is_none());
    }

    #[tokio::test]
    async fn test_block_card_full_scenario() {
        let (engine, _, _) = engine().await;
        let mut session = Session::new("1001");

        let reply = engine.handle_turn(&mut session, "i lost my card").await.unwrap();
        assert!(reply.contains("last 6 digits"));

        // Not a valid selector: stay on the same step.
        let reply = engine.handle_turn(&mut session, "12ab56").await.unwrap();
        assert_eq!(reply, "Please enter a valid 6-digit number.");
        assert_eq!(
            session.pending_action,
            PendingAction::BlockCard {
                step: CardFlowStep::AwaitingLast6,
                last6: None
            }
        );

        let reply = engine.handle_turn(&mut session, "123456").await.unwrap();
        assert!(reply.contains("password"));

        let reply = engine.handle_turn(&mut session, "secret123").await.unwrap();
        assert_eq!(reply, "Card ending with 123456 has been blocked successfully.");
        assert!(session.pending_action.is_none());
    }

    #[tokio::test]
    async fn test_card_flow_wrong_password_is_terminal() {
        let (engine, _, _) = engine().await;
        let mut session = Session::new("1001");

        engine.handle_turn(&mut session, "block my card").await.unwrap();
        engine.handle_turn(&mut session, "123456").await.unwrap();

        let reply = engine.handle_turn(&mut session, "wrong").await.unwrap();
        assert_eq!(reply, "Incorrect password. Card block failed.");
        // Unlike the balance flow, the card flow ends on any outcome.
        assert!(session.pending_action.is_none());
    }

    #[tokio::test]
    async fn test_transfer_end_to_end() {
        let (engine, _, _) = engine().await;
        let mut session = Session::new("1001");

        let reply = engine
            .handle_turn(&mut session, "Transfer ₹2,500 to account 9988776655")
            .await
            .unwrap();
        assert!(reply.contains("9988776655"));
        assert!(reply.contains("password"));
        assert_eq!(
            session.pending_action,
            PendingAction::Transfer {
                amount: 2500.0,
                to_account: "9988776655".to_string()
            }
        );

        let reply = engine.handle_turn(&mut session, "secret123").await.unwrap();
        assert!(reply.starts_with("Transfer successful"));
        assert!(session.pending_action.is_none());
    }

    #[tokio::test]
    async fn test_transfer_without_entities_gives_usage_hint() {
        let (engine, _, _) = engine().await;
        let mut session = Session::new("1001");

        let reply = engine.handle_turn(&mut session, "transfer 500").await.unwrap();
        assert!(reply.contains("Example"));
        assert!(session.pending_action.is_none());
    }

    #[tokio::test]
    async fn test_reset_allows_clean_restart() {
        let (engine, _, _) = engine().await;
        let mut session = Session::new("1001");

        engine.handle_turn(&mut session, "block my card").await.unwrap();
        assert!(!session.pending_action.is_none());

        session.reset();
        assert!(session.pending_action.is_none());
        assert!(session.turn_log.is_empty());
        assert!(!session.greeted);

        // Restarting the same flow works from scratch.
        let reply = engine.handle_turn(&mut session, "block my card").await.unwrap();
        assert!(reply.contains("last 6 digits"));
    }

    #[tokio::test]
    async fn test_oracle_trusted_when_confident() {
        let faq = Arc::new(FaqStore::new());
        let audit = Arc::new(ChatAuditLog::new());
        let engine = DialogueEngine::new(
            seeded_ledger().await,
            faq,
            Box::new(CannedResponder::default()),
            audit,
        )
        .with_oracle(Box::new(FixedOracle {
            intent: "atm_info",
            confidence: 0.9,
        }));

        let mut session = Session::new("1001");
        // The fallback resolver would say check_balance; the confident
        // oracle wins.
        let reply = engine.handle_turn(&mut session, "balance machines nearby").await.unwrap();
        assert!(reply.contains("ATM"));
    }

    #[tokio::test]
    async fn test_low_confidence_oracle_falls_back() {
        let faq = Arc::new(FaqStore::new());
        let audit = Arc::new(ChatAuditLog::new());
        let engine = DialogueEngine::new(
            seeded_ledger().await,
            faq,
            Box::new(CannedResponder::default()),
            audit,
        )
        .with_oracle(Box::new(FixedOracle {
            intent: "atm_info",
            confidence: 0.3,
        }));

        let mut session = Session::new("1001");
        let reply = engine.handle_turn(&mut session, "what is my balance").await.unwrap();
        assert!(reply.contains("password"));
        assert_eq!(session.pending_action, PendingAction::BalanceQuery);
    }

    #[tokio::test]
    async fn test_oracle_error_falls_back() {
        let faq = Arc::new(FaqStore::new());
        let audit = Arc::new(ChatAuditLog::new());
        let engine = DialogueEngine::new(
            seeded_ledger().await,
            faq,
            Box::new(CannedResponder::default()),
            audit,
        )
        .with_oracle(Box::new(UnavailableOracle));

        let mut session = Session::new("1001");
        let reply = engine.handle_turn(&mut session, "what is my balance").await.unwrap();
        assert!(reply.contains("password"));
        assert_eq!(session.pending_action, PendingAction::BalanceQuery);
    }

    #[tokio::test]
    async fn test_loan_query_consults_faq() {
        let (engine, faq, _) = engine().await;
        faq.add_faq("loan", "Home loans start at 8.4% p.a.").await;

        let mut session = Session::new("1001");
        let reply = engine.handle_turn(&mut session, "home loan options").await.unwrap();
        assert_eq!(reply, "Home loans start at 8.4% p.a.");
        assert!(session.pending_action.is_none());
    }

    #[tokio::test]
    async fn test_info_intents_fall_through_to_responder_without_suggestion() {
        let (engine, faq, _) = engine().await;
        let mut session = Session::new("1001");

        // No FAQ seeded: the generic responder answers.
        let reply = engine
            .handle_turn(&mut session, "current interest rate please")
            .await
            .unwrap();
        assert!(reply.contains("rephrase"));

        // Resolved well above the threshold, so nothing is queued for
        // review.
        assert!(faq.pending().await.is_empty());
    }

    #[tokio::test]
    async fn test_unrouted_query_hits_faq_then_suggestions() {
        let (engine, faq, _) = engine().await;
        faq.add_faq("ifsc code", "The IFSC code is printed on your chequebook.").await;

        let mut session = Session::new("1001");

        let reply = engine
            .handle_turn(&mut session, "where do i find my IFSC code")
            .await
            .unwrap();
        assert_eq!(reply, "The IFSC code is printed on your chequebook.");

        // FAQ miss at low confidence: canned responder answers and the
        // query lands in the suggestion queue.
        let reply = engine
            .handle_turn(&mut session, "do you sell insurance")
            .await
            .unwrap();
        assert!(reply.contains("rephrase"));

        let pending = faq.pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].question, "do you sell insurance");
    }

    #[tokio::test]
    async fn test_responder_failure_becomes_apology() {
        let faq = Arc::new(FaqStore::new());
        let audit = Arc::new(ChatAuditLog::new());
        let engine = DialogueEngine::new(
            seeded_ledger().await,
            faq,
            Box::new(FailingResponder),
            audit,
        );

        let mut session = Session::new("1001");
        let reply = engine.handle_turn(&mut session, "xyzzy plugh").await.unwrap();
        assert_eq!(reply, APOLOGY);
    }

    #[tokio::test]
    async fn test_every_resolution_is_audited() {
        let (engine, _, audit) = engine().await;
        let mut session = Session::new("1001");

        engine.handle_turn(&mut session, "what is my balance").await.unwrap();
        // Password turn belongs to the flow, not to resolution.
        engine.handle_turn(&mut session, "secret123").await.unwrap();
        engine.handle_turn(&mut session, "nearest atm").await.unwrap();

        assert_eq!(audit.len().await, 2);
        let mine = audit.for_account("1001").await.unwrap();
        assert_eq!(mine[0].intent, Intent::CheckBalance);
        assert_eq!(mine[1].intent, Intent::AtmInfo);
    }

    #[test]
    fn test_last6_validator() {
        assert!(is_valid_last6("123456"));
        assert!(!is_valid_last6("12345"));
        assert!(!is_valid_last6("1234567"));
        assert!(!is_valid_last6("12a456"));
        assert!(!is_valid_last6(""));
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(5000.0), "5,000.00");
        assert_eq!(format_money(999.5), "999.50");
        assert_eq!(format_money(1234567.89), "1,234,567.89");
        assert_eq!(format_money(0.0), "0.00");
    }
}
