//! `slotflow chat`: interactive or single-message conversation.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use slotflow_agent::{Orchestrator, TurnError, TurnOutcome};
use slotflow_config::AppConfig;
use slotflow_core::ledger::CollectionLedger;
use slotflow_core::session::ConversationSession;
use slotflow_providers::ProviderCompletionPort;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

pub async fn run(
    message: Option<String>,
    documents_dir: Option<PathBuf>,
    snapshot: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(dir) = documents_dir {
        config.documents.base_dir = dir;
    }

    // Local endpoints run without a key
    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    SLOTFLOW_API_KEY     (generic)");
        eprintln!("    OPENROUTER_API_KEY   (for OpenRouter)");
        eprintln!("    OPENAI_API_KEY       (for OpenAI direct)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let router = slotflow_providers::build_from_config(&config);
    let provider = router.default().ok_or("No default provider configured")?;
    let port = Arc::new(ProviderCompletionPort::from_config(provider, &config));
    let orchestrator = Orchestrator::new(port, &config);
    spawn_event_logger(&orchestrator);

    let mut session = ConversationSession::new();

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let result = orchestrator.handle_turn(&mut session, &msg).await;
        eprint!("\r              \r");
        print_result(&result, &session.ledger);
    } else {
        println!();
        println!("  ╔══════════════════════════════════════════════╗");
        println!("  ║        Slotflow : Interactive Mode           ║");
        println!("  ╚══════════════════════════════════════════════╝");
        println!();
        println!("  Provider:   {}", config.default_provider);
        println!("  Model:      {}", config.effective_model());
        println!("  Extraction: {}", config.extraction.strategy);
        println!("  Documents:  {}", config.documents.base_dir.display());
        println!();
        println!("  Type your message and press Enter.");
        println!("  Type 'exit' or Ctrl+C to quit.");
        println!();

        let mut rx = spawn_stdin_reader();

        print!("  You > ");
        std::io::stdout().flush()?;

        while let Some(line) = rx.recv().await {
            eprint!("  ...");
            let result = orchestrator.handle_turn(&mut session, &line).await;
            eprint!("\r     \r");
            println!();
            print_result(&result, &session.ledger);
            println!();

            print!("  You > ");
            std::io::stdout().flush()?;
        }

        println!();
        println!("  Goodbye!");
        println!();
    }

    if let Some(path) = snapshot {
        write_snapshot(&session, &path).await?;
        println!("  Snapshot written to {}", path.display());
    }

    Ok(())
}

/// Read non-blank stdin lines until EOF or an exit command.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        let mut lines = BufReader::new(io::stdin()).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    if is_exit(&line) {
                        break;
                    }
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break, // EOF (Ctrl+D)
                Err(e) => {
                    eprintln!("  [Input Error] {e}");
                    break;
                }
            }
        }
    });

    rx
}

fn spawn_event_logger(orchestrator: &Orchestrator) {
    let mut events = orchestrator.events().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!(?event, "Conversation event"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn is_exit(line: &str) -> bool {
    matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q")
}

fn print_result(result: &Result<TurnOutcome, TurnError>, ledger: &CollectionLedger) {
    match result {
        Ok(outcome) => {
            if let Some(reply) = &outcome.reply {
                for line in reply.lines() {
                    println!("  Assistant > {line}");
                }
            }
            if let Some(reason) = &outcome.routing_error {
                eprintln!("  [Routing] {reason}");
            }
            for line in status_lines(ledger) {
                println!("    {line}");
            }
        }
        Err(TurnError::EmptyInput) => {}
        Err(e) => eprintln!("  [Error] {e}"),
    }
}

/// One `✓`/`✗` line per ledger slot.
pub(crate) fn status_lines(ledger: &CollectionLedger) -> Vec<String> {
    ledger
        .iter()
        .map(|(id, entry)| {
            let mark = if entry.is_complete() { '✓' } else { '✗' };
            format!("{mark} {id}: {} fields", entry.value_count())
        })
        .collect()
}

async fn write_snapshot(
    session: &ConversationSession,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = session.snapshot().to_json()?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotflow_core::ledger::{DocumentEntry, FieldEntry, FieldValue};
    use slotflow_core::schema::{CollectorId, SchemaRegistry};

    #[test]
    fn exit_commands() {
        assert!(is_exit("exit"));
        assert!(is_exit("quit"));
        assert!(is_exit(":q"));
        assert!(!is_exit("exit please"));
    }

    #[test]
    fn status_lines_mark_progress() {
        let registry = SchemaRegistry::standard();
        let mut ledger = CollectionLedger::new();

        let mut alpha = FieldEntry::new();
        alpha.merge(
            registry.lookup(CollectorId::Alpha).unwrap(),
            &[FieldValue::new("field_a", "7")],
        );
        ledger.put_fields(CollectorId::Alpha, alpha);

        let mut beta = FieldEntry::new();
        beta.merge(
            registry.lookup(CollectorId::Beta).unwrap(),
            &[FieldValue::new("field_d", "x"), FieldValue::new("field_e", "y")],
        );
        ledger.put_fields(CollectorId::Beta, beta);
        ledger.put_document(DocumentEntry::failed("missing"));

        assert_eq!(
            status_lines(&ledger),
            vec!["✗ alpha: 1 fields", "✓ beta: 2 fields", "✗ document: 0 fields"]
        );
    }

    #[tokio::test]
    async fn snapshot_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let session = ConversationSession::new();

        write_snapshot(&session, &path).await.unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["id"], session.id.to_string());
    }
}
