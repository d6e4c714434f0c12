//! `nimbus chat` — one-shot message from the terminal.
//!
//! Runs a full turn against a fresh in-process session and prints the
//! streamed answer tokens to stdout as they arrive.

use nimbus_agent::{ChatAgent, ChatStreamEvent, ToolExecutor};
use nimbus_config::AppConfig;
use nimbus_core::event::EventBus;
use nimbus_core::message::SessionKey;
use nimbus_core::session::SessionStore;
use nimbus_session::InMemorySessionStore;
use std::io::Write;
use std::sync::Arc;

pub async fn run(message: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;

    let provider = nimbus_providers::build_from_config(&config);
    let registry = Arc::new(nimbus_tools::default_registry(&config.cloud));
    let event_bus = Arc::new(EventBus::default());
    let executor = Arc::new(ToolExecutor::new(registry, event_bus.clone()));
    let agent = Arc::new(ChatAgent::from_config(
        provider, executor, event_bus, &config,
    ));

    let store = InMemorySessionStore::new();
    let session = store.open(&SessionKey::generate()).await;

    let mut rx = agent.run_turn(session, message);
    let mut stdout = std::io::stdout();

    while let Some(event) = rx.recv().await {
        match event {
            ChatStreamEvent::Status { status } if !status.is_empty() => {
                eprintln!("[tools: {status}]");
            }
            ChatStreamEvent::Status { .. } => {}
            ChatStreamEvent::Content { content } => {
                print!("{content}");
                stdout.flush()?;
            }
            ChatStreamEvent::Done { .. } => {
                println!();
                break;
            }
            ChatStreamEvent::Error { kind, message } => {
                eprintln!("error ({kind}): {message}");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
