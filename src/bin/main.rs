use bankbot::{
    audit::ChatAuditLog,
    dialogue::{DialogueEngine, Session},
    faq::FaqStore,
    ledger::{hash_password, InMemoryLedger, Ledger},
    models::{Account, Card, CardStatus},
    responder::CannedResponder,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    dotenv::dotenv().ok();

    info!("BankBot CLI starting");

    let ledger = seeded_ledger().await?;
    let faq = Arc::new(FaqStore::new());
    faq.add_faq(
        "minimum balance",
        "The minimum balance for savings accounts is ₹1,000.",
    )
    .await;
    faq.add_faq(
        "ifsc",
        "You can find the IFSC code on your chequebook or in the mobile app under Account Details.",
    )
    .await;

    let audit = Arc::new(ChatAuditLog::new());
    let engine = DialogueEngine::new(
        ledger,
        faq,
        Box::new(CannedResponder::default()),
        audit,
    );

    let mut session = Session::new("1001");

    println!("=== BankBot CLI ===");
    println!("Demo account 1001 (password: secret123). Type 'exit' to quit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"you> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
            println!("bot> Thank you for banking with us. Have a great day!");
            break;
        }

        match engine.handle_turn(&mut session, text).await {
            Ok(reply) => println!("bot> {}\n", reply),
            Err(e) => eprintln!("error: {}\n", e),
        }
    }

    Ok(())
}

/// Demo ledger: two accounts and two cards on the primary one.
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

    ledger
        .add_card(Card {
            card_number: "5105105105654321".to_string(),
            account_number: "1001".to_string(),
            holder_name: "Asha Verma".to_string(),
            card_type: "Credit".to_string(),
            category: "Mastercard".to_string(),
            expiry_month: "11".to_string(),
            expiry_year: "2027".to_string(),
            status: CardStatus::Blocked,
            created_at: Utc::now(),
        })
        .await?;

    Ok(ledger)
}
