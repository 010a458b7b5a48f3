use bankbot::{
    audit::ChatAuditLog,
    api::start_server,
    dialogue::DialogueEngine,
    faq::FaqStore,
    ledger::{hash_password, InMemoryLedger, Ledger},
    models::{Account, Card, CardStatus},
    oracle::HttpIntentOracle,
    responder::{CannedResponder, GenericResponder, LlmResponder},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("BankBot - API Server");
    info!("Port: {}", api_port);

    let ledger = seeded_ledger().await?;
    let faq = Arc::new(FaqStore::new());
    faq.add_faq(
        "minimum balance",
        "The minimum balance for savings accounts is ₹1,000.",
    )
    .await;

    let responder: Box<dyn GenericResponder> = match LlmResponder::from_env() {
        Some(llm) => Box::new(llm),
        None => {
            info!("LLM_API_KEY not set, using canned responder");
            Box::new(CannedResponder::default())
        }
    };

    let audit = Arc::new(ChatAuditLog::new());
    let mut engine = DialogueEngine::new(ledger, faq, responder, audit);

    if let Some(oracle) = HttpIntentOracle::from_env() {
        info!("Intent oracle configured from ORACLE_URL");
        engine = engine.with_oracle(Box::new(oracle));
    } else {
        info!("ORACLE_URL not set, using fallback resolver only");
    }

    info!("Dialogue engine initialized");
    info!("Starting API server...");

    start_server(Arc::new(engine), api_port).await?;

    Ok(())
}

/// Demo ledger so the server answers out of the box.
async fn seeded_ledger() -> Result<Arc<InMemoryLedger>, Box<dyn std::error::Error>> {
    let ledger = Arc::new(InMemoryLedger::new());

    ledger
        .create_account(Account {
            account_number: "1001".to_string(),
            holder_name: "Asha Verma".to_string(),
            account_type: "Savings".to_string(),
            balance: 54_250.75,
            password_hash: hash_password("secret123"),
        })
        .await?;

    ledger
        .create_account(Account {
            account_number: "9988776655".to_string(),
            holder_name: "Ravi Kumar".to_string(),
            account_type: "Current".to_string(),
            balance: 12_000.00,
            password_hash: hash_password("other456"),
        })
        .await?;

    ledger
        .add_card(Card {
            card_number: "4567891234123456".to_string(),
            account_number: "1001".to_string(),
            holder_name: "Asha Verma".to_string(),
            card_type: "Debit".to_string(),
            category: "VISA".to_string(),
            expiry_month: "04".to_string(),
            expiry_year: "2029".to_string(),
            status: CardStatus::Active,
            created_at: Utc::now(),
        })
        .await?;

    Ok(ledger)
}
