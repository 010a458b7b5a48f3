//! FAQ knowledge base and suggestion queue
//!
//! Lookup is a case-insensitive "stored question is a substring of the
//! query" scan. Queries the assistant could not route with confidence are
//! recorded as suggestions for a human reviewer to promote into FAQs.

use crate::models::Intent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Faq {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SuggestionStatus {
    Pending,
    Approved,
    Rejected,
}

/// A query the assistant could not answer, queued for human review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqSuggestion {
    pub question: String,
    pub frequency: u32,
    pub avg_confidence: f32,
    pub last_asked: DateTime<Utc>,
    pub status: SuggestionStatus,
}

pub struct FaqStore {
    faqs: Arc<RwLock<Vec<Faq>>>,
    suggestions: Arc<RwLock<Vec<FaqSuggestion>>>,
}

impl FaqStore {
    pub fn new() -> Self {
        Self {
            faqs: Arc::new(RwLock::new(Vec::new())),
            suggestions: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn add_faq(&self, question: impl Into<String>, answer: impl Into<String>) {
        let mut faqs = self.faqs.write().await;
        faqs.push(Faq {
            question: question.into(),
            answer: answer.into(),
        });
    }

    /// Answer a query if any stored question appears inside it.
    /// First stored match wins.
    pub async fn lookup(&self, query: &str) -> Option<String> {
        let query = query.to_lowercase();
        let faqs = self.faqs.read().await;
        faqs.iter()
            .find(|f| query.contains(&f.question.to_lowercase()))
            .map(|f| f.answer.clone())
    }

    /// Queue a query for review. Repeat questions bump frequency and fold
    /// the new confidence into the running average.
    pub async fn record_suggestion(&self, question: &str, confidence: f32) {
        let mut suggestions = self.suggestions.write().await;

        if let Some(existing) = suggestions.iter_mut().find(|s| s.question == question) {
            let total = existing.avg_confidence * existing.frequency as f32 + confidence;
            existing.frequency += 1;
            existing.avg_confidence = total / existing.frequency as f32;
            existing.last_asked = Utc::now();
            return;
        }

        info!(question = %question, confidence, "New FAQ suggestion queued");

        suggestions.push(FaqSuggestion {
            question: question.to_string(),
            frequency: 1,
            avg_confidence: confidence,
            last_asked: Utc::now(),
            status: SuggestionStatus::Pending,
        });
    }

    /// Pending suggestions, most frequently asked first.
    pub async fn pending(&self) -> Vec<FaqSuggestion> {
        let suggestions = self.suggestions.read().await;
        let mut pending: Vec<_> = suggestions
            .iter()
            .filter(|s| s.status == SuggestionStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        pending
    }

    /// Reviewer accepts a suggestion and publishes it as an FAQ.
    pub async fn approve(&self, question: &str, answer: impl Into<String>) -> bool {
        let mut suggestions = self.suggestions.write().await;
        let Some(suggestion) = suggestions
            .iter_mut()
            .find(|s| s.question == question && s.status == SuggestionStatus::Pending)
        else {
            return false;
        };
        suggestion.status = SuggestionStatus::Approved;
        drop(suggestions);

        self.add_faq(question, answer).await;
        true
    }

    /// Reviewer discards a suggestion.
    pub async fn reject(&self, question: &str) -> bool {
        let mut suggestions = self.suggestions.write().await;
        let Some(suggestion) = suggestions
            .iter_mut()
            .find(|s| s.question == question && s.status == SuggestionStatus::Pending)
        else {
            return false;
        };
        suggestion.status = SuggestionStatus::Rejected;
        true
    }
}

impl Default for FaqStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolutions below the routing threshold are suggestion material,
/// except explicit greetings and goodbyes.
pub fn worth_suggesting(intent: Intent, confidence: f32, threshold: f32) -> bool {
    confidence < threshold && !matches!(intent, Intent::Greet | Intent::Goodbye)
}
