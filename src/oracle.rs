//! Intent oracle client
//!
//! The oracle is an external statistical classifier consulted before the
//! deterministic fallback resolver. Failures are ordinary `Err` values so
//! the fallback path stays a visible branch in the dialogue engine, never a
//! swallowed exception.

use crate::error::BankBotError;
use crate::models::{Entities, Intent, ResolutionSource, ResolvedUtterance};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Raw prediction as returned by the oracle service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OraclePrediction {
    pub intent: String,
    pub confidence: f32,
    #[serde(default)]
    pub entities: Entities,
}

impl OraclePrediction {
    /// Map the wire prediction into the closed intent set. Labels outside
    /// the vocabulary resolve to `OutOfScope`.
    pub fn into_resolved(self) -> ResolvedUtterance {
        let intent = Intent::from_str(&self.intent).unwrap_or(Intent::OutOfScope);

        ResolvedUtterance {
            intent,
            confidence: self.confidence.clamp(0.0, 1.0),
            entities: self.entities,
            source: ResolutionSource::Oracle,
        }
    }
}

/// Trait for the external intent classifier.
#[async_trait]
pub trait IntentOracle: Send + Sync {
    async fn predict(&self, text: &str) -> Result<OraclePrediction>;
}

//
// ================= HTTP Oracle =================
//

/// Oracle backed by the NLU service's `/parse` endpoint.
pub struct HttpIntentOracle {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ParseRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    intents: IntentBlock,
    #[serde(default)]
    slots: Value,
}

#[derive(Debug, Deserialize)]
struct IntentBlock {
    #[serde(default)]
    predictions: Vec<WirePrediction>,
}

#[derive(Debug, Deserialize)]
struct WirePrediction {
    intent: String,
    confidence: f32,
}

impl HttpIntentOracle {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build from `ORACLE_URL` if configured.
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("ORACLE_URL").ok()?;
        Some(Self::new(base_url))
    }
}

#[async_trait]
impl IntentOracle for HttpIntentOracle {
    async fn predict(&self, text: &str) -> Result<OraclePrediction> {
        let url = format!("{}/parse", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ParseRequest { text })
            .send()
            .await
            .map_err(|e| BankBotError::OracleError(format!("Oracle request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BankBotError::OracleError(format!(
                "Oracle returned {} for {}",
                status, url
            )));
        }

        let parsed: ParseResponse = response
            .json()
            .await
            .map_err(|e| BankBotError::OracleError(format!("Invalid oracle response: {}", e)))?;

        let top = parsed.intents.predictions.into_iter().next().ok_or_else(|| {
            BankBotError::OracleError("Oracle returned no predictions".to_string())
        })?;

        debug!(
            intent = %top.intent,
            confidence = top.confidence,
            "Oracle prediction"
        );

        Ok(OraclePrediction {
            intent: top.intent,
            confidence: top.confidence,
            entities: slots_to_entities(&parsed.slots),
        })
    }
}

fn slots_to_entities(slots: &Value) -> Entities {
    let amount = slots.get("amount").and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    });
    let account_number = slots
        .get("account_number")
        .and_then(Value::as_str)
        .map(|s| s.to_string());

    Entities {
        amount,
        account_number,
    }
}

//
// ================= Test Doubles =================
//

/// Oracle that always answers with a fixed prediction.
pub struct FixedOracle {
    pub intent: &'static str,
    pub confidence: f32,
}

#[async_trait]
impl IntentOracle for FixedOracle {
    async fn predict(&self, _text: &str) -> Result<OraclePrediction> {
        Ok(OraclePrediction {
            intent: self.intent.to_string(),
            confidence: self.confidence,
            entities: Entities::default(),
        })
    }
}

/// Oracle that always fails, for exercising the fallback path.
pub struct UnavailableOracle;

#[async_trait]
impl IntentOracle for UnavailableOracle {
    async fn predict(&self, _text: &str) -> Result<OraclePrediction> {
        Err(BankBotError::OracleError("oracle offline".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_maps_known_label() {
        let prediction = OraclePrediction {
            intent: "check_balance".to_string(),
            confidence: 0.87,
            entities: Entities::default(),
        };
        let resolved = prediction.into_resolved();
        assert_eq!(resolved.intent, Intent::CheckBalance);
        assert_eq!(resolved.source, ResolutionSource::Oracle);
    }

    #[test]
    fn test_prediction_maps_unknown_label_to_out_of_scope() {
        let prediction = OraclePrediction {
            intent: "order_pizza".to_string(),
            confidence: 0.99,
            entities: Entities::default(),
        };
        assert_eq!(prediction.into_resolved().intent, Intent::OutOfScope);
    }

    #[test]
    fn test_confidence_clamped() {
        let prediction = OraclePrediction {
            intent: "greet".to_string(),
            confidence: 1.7,
            entities: Entities::default(),
        };
        assert_eq!(prediction.into_resolved().confidence, 1.0);
    }

    #[test]
    fn test_slots_to_entities() {
        let slots = serde_json::json!({
            "amount": 2500.0,
            "account_number": "9988776655",
        });
        let entities = slots_to_entities(&slots);
        assert_eq!(entities.amount, Some(2500.0));
        assert_eq!(entities.account_number.as_deref(), Some("9988776655"));

        let entities = slots_to_entities(&serde_json::json!({ "amount": "1500" }));
        assert_eq!(entities.amount, Some(1500.0));
    }
}
