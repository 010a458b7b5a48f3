//! Fallback intent resolver
//!
//! Deterministic resolver of last resort, used when the intent oracle is
//! unavailable or below the trust threshold. A fixed, ordered decision list
//! of substring rules is evaluated against the lowercased text; the first
//! rule whose trigger set intersects the text wins, and the list always
//! terminates at the out-of-scope rule.

use crate::extractor;
use crate::models::{Entities, Intent, ResolutionSource, ResolvedUtterance};

/// Static keyword lists — zero allocation
const GREETING_WORDS: &[&str] = &[
    "hi", "hello", "hey",
    "good morning", "good afternoon", "good evening",
    "thanks", "thank you", "thanks alot", "nice work",
];

const UNBLOCK_PHRASES: &[&str] = &[
    "unblock card", "unblock my card", "unblock atm card",
    "unblock debit card", "unblock credit card", "unblock my credit card",
    "activate card", "activate atm card", "activate debit card", "activate credit card",
    "reactivate card", "reactivate my card", "reactivate debit card", "reactivate credit card",
    "enable my card", "enable card", "enable debit card", "enable credit card",
];

const ACCOUNT_DETAILS_PHRASES: &[&str] = &[
    "account details", "account info", "account information",
    "my account details", "show my account details", "view account details",
];

const BLOCK_PHRASES: &[&str] = &[
    "block my card", "block card", "block atm card",
    "lost my card", "lost card",
    "stolen my card", "stolen card",
];

const GOODBYE_PHRASES: &[&str] = &[
    "bye", "goodbye", "exit", "quit", "see you", "have a nice day",
];

/// How a rule decides it applies to the (lowercased) text.
enum Trigger {
    /// Any phrase from the set appears as a substring.
    AnyOf(&'static [&'static str]),
    /// A single keyword appears as a substring.
    Keyword(&'static str),
    /// Keyword present and the text contains at least one ASCII digit.
    KeywordWithDigit(&'static str),
}

impl Trigger {
    fn matches(&self, text: &str) -> bool {
        match self {
            Trigger::AnyOf(phrases) => phrases.iter().any(|p| text.contains(p)),
            Trigger::Keyword(kw) => text.contains(kw),
            Trigger::KeywordWithDigit(kw) => {
                text.contains(kw) && text.chars().any(|c| c.is_ascii_digit())
            }
        }
    }
}

struct Rule {
    trigger: Trigger,
    intent: Intent,
    confidence: f32,
    /// Run the entity extractor on the original text when this rule fires.
    wants_entities: bool,
}

/// The decision list, highest priority first. Ties between rules are
/// resolved purely by position in this table.
const RULES: &[Rule] = &[
    Rule {
        trigger: Trigger::AnyOf(GREETING_WORDS),
        intent: Intent::Greet,
        confidence: 0.95,
        wants_entities: false,
    },
    Rule {
        trigger: Trigger::Keyword("balance"),
        intent: Intent::CheckBalance,
        confidence: 0.92,
        wants_entities: false,
    },
    Rule {
        trigger: Trigger::KeywordWithDigit("transfer"),
        intent: Intent::TransferMoney,
        confidence: 0.90,
        wants_entities: true,
    },
    Rule {
        trigger: Trigger::AnyOf(UNBLOCK_PHRASES),
        intent: Intent::UnblockCard,
        confidence: 0.95,
        wants_entities: false,
    },
    Rule {
        trigger: Trigger::Keyword("atm"),
        intent: Intent::AtmInfo,
        confidence: 0.90,
        wants_entities: false,
    },
    Rule {
        trigger: Trigger::Keyword("loan"),
        intent: Intent::LoanInfo,
        confidence: 0.88,
        wants_entities: false,
    },
    Rule {
        trigger: Trigger::Keyword("interest rate"),
        intent: Intent::InterestRate,
        confidence: 0.85,
        wants_entities: false,
    },
    Rule {
        trigger: Trigger::AnyOf(ACCOUNT_DETAILS_PHRASES),
        intent: Intent::AccountDetails,
        confidence: 0.90,
        wants_entities: false,
    },
    Rule {
        trigger: Trigger::AnyOf(BLOCK_PHRASES),
        intent: Intent::BlockCard,
        confidence: 0.95,
        wants_entities: false,
    },
    Rule {
        trigger: Trigger::AnyOf(GOODBYE_PHRASES),
        intent: Intent::Goodbye,
        confidence: 0.93,
        wants_entities: false,
    },
];

/// Resolve free text to (intent, confidence, entities). Side-effect free;
/// always terminates at the out-of-scope rule.
pub fn resolve(text: &str) -> ResolvedUtterance {
    let normalized = text.to_lowercase();

    for rule in RULES {
        if rule.trigger.matches(&normalized) {
            let entities = if rule.wants_entities {
                extractor::extract(text)
            } else {
                Entities::default()
            };

            return ResolvedUtterance {
                intent: rule.intent,
                confidence: rule.confidence,
                entities,
                source: ResolutionSource::Fallback,
            };
        }
    }

    ResolvedUtterance {
        intent: Intent::OutOfScope,
        confidence: 0.50,
        entities: Entities::default(),
        source: ResolutionSource::Fallback,
    }
}
