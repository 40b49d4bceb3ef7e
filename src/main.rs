use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use corporate_profiler::cli::{Args, Command, SessionAction};
use corporate_profiler::generator::context::GeneratorContext;
use corporate_profiler::generator::outlet::{SessionDriver, save_report};
use corporate_profiler::generator::state::TraceEntry;
use corporate_profiler::generator::workflow::{Orchestrator, StageDelta};
use corporate_profiler::store::{FileSessionStore, SessionStore};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.into_config()?;
    init_tracing(config.verbose);

    let store = Arc::new(FileSessionStore::new(&config.store));

    match args.command {
        Command::Ask {
            prompt,
            session,
            urls,
            output,
        } => {
            let context = GeneratorContext::new(config)?;
            let driver = SessionDriver::new(Arc::new(Orchestrator::new(context)), store);
            let session_id = driver.resolve_session(session.as_deref()).await?;

            let outcome = driver.ask(&session_id, &prompt, urls, print_delta).await?;

            println!("\n{}\n", outcome.state.final_report);
            println!("session: {}", outcome.session_id);
            if let Some(path) = output {
                save_report(&path, &outcome.state.final_report)?;
            }
        }
        Command::Sessions { action } => manage_sessions(store.as_ref(), action).await?,
    }

    Ok(())
}

/// 默认info级别，--verbose时为debug，RUST_LOG优先
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_delta(delta: &StageDelta) {
    eprintln!("▶ {}", delta.stage);
    for entry in &delta.update.thought_trace {
        match entry {
            TraceEntry::ToolExecution { tool, input, .. } => {
                eprintln!("   🔧 {} {}", tool, input)
            }
            TraceEntry::Supervisor { status, .. } => eprintln!("   🧐 supervisor: {}", status),
            TraceEntry::Error { content, .. } => eprintln!("   ❌ {}", content),
            TraceEntry::Diagnostic { content, .. } => eprintln!("   ⚠️ {}", content),
        }
    }
}

async fn manage_sessions(store: &dyn SessionStore, action: SessionAction) -> Result<()> {
    match action {
        SessionAction::List => {
            for session in store.list_sessions().await? {
                println!(
                    "{}  {}  {}",
                    session.id,
                    session.timestamp.format("%Y-%m-%d %H:%M"),
                    session.name
                );
            }
        }
        SessionAction::New { name } => println!("{}", store.create_session(&name).await?),
        SessionAction::Delete { id } => store.delete_session(&id).await?,
        SessionAction::Rename { id, name } => store.rename_session(&id, &name).await?,
        SessionAction::Show { id } => {
            for message in store.get_messages(&id).await? {
                println!("[{}]\n{}\n", message.role, message.content);
            }
        }
    }
    Ok(())
}
