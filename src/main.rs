use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scribe_core::config::{AppConfig, ModelConfig};
use scribe_core::event::EventBus;
use scribe_core::types::WorkflowEvent;
use scribe_workflows::WorkflowService;

#[derive(Parser)]
#[command(name = "scribe", version, about = "Content-generation workflow engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "scribe.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve,
    /// Run one workflow and print its response as JSON
    Run {
        /// Workflow name (see `scribe workflows`)
        workflow: String,
        /// JSON object of initial fields; `-` reads stdin
        #[arg(short, long, default_value = "-")]
        input: String,
        /// Include the execution trace in the response
        #[arg(long)]
        trace: bool,
        /// Print node progress to stderr
        #[arg(short, long)]
        verbose: bool,
    },
    /// List registered workflows
    Workflows,
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scribe=info,warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "scribe", &mut io::stdout());
        return Ok(());
    }

    let config = if cli.config.exists() {
        AppConfig::load(&cli.config)?
    } else {
        eprintln!(
            "Warning: No config file found. Set GROQ_API_KEY or create {}",
            cli.config.display()
        );
        create_env_config()
    };

    if let Commands::Config = &cli.command {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let generation = scribe_llm::build_service(&config)?;
    let config = Arc::new(config);
    let service = WorkflowService::new(generation, config.clone())?;

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Interrupted, shutting down...");
        cancel_clone.cancel();
    });

    match cli.command {
        Commands::Serve => {
            let gateway_config = config.gateway.clone().unwrap_or_default();
            info!(bind = %gateway_config.bind, "Starting HTTP gateway");
            let server = scribe_gateway::GatewayServer::new(gateway_config, Arc::new(service));
            server.run(cancel).await?;
        }
        Commands::Run {
            workflow,
            input,
            trace,
            verbose,
        } => {
            let fields = read_input(&input)?;
            let progress = verbose.then(|| tokio::spawn(print_progress(service.events().clone())));

            let response = service
                .run_with_cancel(&workflow, fields, trace, cancel)
                .await;

            if let Some(handle) = progress {
                handle.abort();
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Workflows => {
            for info in service.list() {
                println!("{:<14} {}", info.name, info.description);
                if !info.required_inputs.is_empty() {
                    println!("{:<14} requires: {}", "", info.required_inputs.join(", "));
                }
                println!("{:<14} nodes: {}", "", info.nodes.join(" "));
            }
        }
        Commands::Config | Commands::Completions { .. } => {
            unreachable!("handled before service setup")
        }
    }

    Ok(())
}

/// Read the initial fields from a file or stdin. Empty input means no fields.
fn read_input(source: &str) -> anyhow::Result<Value> {
    let text = if source == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading {}", source))?
    };

    if text.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(&text).context("input must be a JSON object")
}

async fn print_progress(event_bus: Arc<EventBus>) {
    let mut rx = event_bus.subscribe();
    while let Ok(event) = rx.recv().await {
        match event {
            WorkflowEvent::NodeStarted {
                node, invocation, ..
            } => {
                eprintln!("[{} #{}] started", node, invocation);
            }
            WorkflowEvent::NodeCompleted {
                node,
                invocation,
                elapsed_ms,
                ..
            } => {
                eprintln!("[{} #{}] done in {}ms", node, invocation, elapsed_ms);
            }
            WorkflowEvent::NodeFailed {
                node,
                invocation,
                error,
                ..
            } => {
                eprintln!("[{} #{}: ERROR] {}", node, invocation, error);
            }
            WorkflowEvent::RoundCompleted {
                round,
                score,
                approved,
                ..
            } => {
                eprintln!("[round {}] score {} approved={}", round, score, approved);
            }
            WorkflowEvent::RunStarted { .. } | WorkflowEvent::RunFinished { .. } => {}
        }
    }
}

/// Minimal config from the environment: Groq, then OpenAI, then a local Ollama.
fn create_env_config() -> AppConfig {
    let model = if let Ok(key) = std::env::var("GROQ_API_KEY") {
        let mut model = ModelConfig::new("groq", "llama-3.3-70b-versatile");
        model.api_key = Some(key);
        model
    } else if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        let mut model = ModelConfig::new("openai", "gpt-4o-mini");
        model.api_key = Some(key);
        model
    } else {
        ModelConfig::new("ollama", "llama3.2")
    };
    AppConfig::with_model(model)
}
