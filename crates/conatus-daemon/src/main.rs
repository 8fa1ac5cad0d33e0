//! Conatus daemon — processual state engine launcher
//!
//! Usage:
//!   conatus-daemon --config ./conatus.toml
//!
//! Runs the three loops (conversation, autonomous, vigilance) over an
//! in-memory boundary stack and reads user messages from stdin. Lines go
//! through the conversation path; `/stats`, `/state` and `/quit` are
//! handled locally.

use clap::Parser;
use conatus_core::tensor::StateTensor;
use conatus_daemon::stores::{
    HashEmbedder, LogNotifier, MemoryCorpus, MemoryImpactStore, MemoryStateStore,
    MemoryThoughtStore, TemplateTranslator,
};
use conatus_daemon::{Boundaries, Daemon};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "conatus-daemon", about = "Processual state engine daemon")]
struct Cli {
    /// Path to config file (TOML).
    #[arg(long, default_value = "./conatus.toml")]
    config: PathBuf,

    /// Dump default config as TOML and exit.
    #[arg(long)]
    dump_config: bool,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.dump_config {
        println!(
            "{}",
            conatus_daemon::config::to_toml(&conatus_core::Config::default())
        );
        return Ok(());
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "conatus=info".into());
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let config = conatus_daemon::config::load(&cli.config);

    println!("╔══════════════════════════════════════════════════╗");
    println!(
        "║     CONATUS PROCESSUAL STATE ENGINE v{}       ║",
        env!("CARGO_PKG_VERSION")
    );
    println!("╠══════════════════════════════════════════════════╣");
    println!("║  conversation loop  ← stdin                      ║");
    println!("║  autonomous loop    ← trigger generator          ║");
    println!("║  vigilance loop     ← drift monitor              ║");
    println!("╚══════════════════════════════════════════════════╝");

    let boundaries = Boundaries {
        embedder: Arc::new(HashEmbedder::new()),
        corpus: Arc::new(MemoryCorpus::new()),
        translator: Arc::new(TemplateTranslator::new()),
        notifier: Arc::new(LogNotifier::new()),
        states: Arc::new(MemoryStateStore::new()),
        impacts: Arc::new(MemoryImpactStore::new()),
        thoughts: Arc::new(MemoryThoughtStore::new()),
        detector: None,
    };

    let daemon = Arc::new(Daemon::new(config, StateTensor::zeroed(), boundaries)?);
    daemon.start().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match line {
                    "/quit" | "/exit" => break,
                    "/stats" => {
                        let stats = daemon.stats();
                        println!(
                            "mode={} conversation={} autonomous={} silent={} total={}",
                            stats.mode.as_str(),
                            stats.conversation_cycles,
                            stats.autonomous_cycles,
                            stats.silent_cycles,
                            stats.cycles_run,
                        );
                    }
                    "/state" => {
                        let state = daemon.current_state().await;
                        println!(
                            "seq={} origin={} written_channels={}",
                            state.sequence,
                            state.origin,
                            conatus_core::tensor::Channel::ALL
                                .iter()
                                .filter(|c| state.is_written(**c))
                                .count(),
                        );
                    }
                    message => match daemon.send_user(message).await {
                        Ok(reply) => println!("{}", reply.text),
                        Err(e) => eprintln!("error: {e}"),
                    },
                }
            }
        }
    }

    daemon.stop().await;
    Ok(())
}
