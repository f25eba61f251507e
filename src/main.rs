use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use legal_research_agent::{
    agent::{LegalResearchAgent, RunOptions, TracingProgress},
    config::{Config, LogFormat},
    llm::LangbaseClient,
    server::{AppState, McpServer},
    sources::SourceAdapters,
};

/// Multi-source legal research agent.
#[derive(Debug, Parser)]
#[command(name = "legal-research-agent", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the agent as MCP tools over stdio (default).
    Serve,
    /// Answer one question and print the result as JSON.
    Ask {
        /// The legal question.
        query: String,
        #[arg(long, default_value = "cli")]
        user_id: String,
        #[arg(long)]
        collection_id: Option<String>,
        #[arg(long)]
        max_iterations: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Legal research agent starting..."
    );

    let langbase = match LangbaseClient::new(&config.langbase, config.request.clone()) {
        Ok(c) => {
            info!(base_url = %config.langbase.base_url, pipe = %config.langbase.pipe, "Langbase client initialized");
            c
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize Langbase client");
            return Err(e.into());
        }
    };

    if let Err(e) = langbase.ensure_agent_pipe().await {
        if e.is_fatal() {
            error!(error = %e, "Failed to ensure agent pipe exists");
            return Err(e.into());
        }
        warn!(error = %e, "Could not verify agent pipe, continuing");
    }

    let sources = match SourceAdapters::from_config(&config.sources) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to initialize source adapters");
            return Err(e.into());
        }
    };

    let agent = LegalResearchAgent::new(Arc::new(langbase), sources, config.agent.clone());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let server = McpServer::new(Arc::new(AppState::new(config, agent)));

            info!("Server ready, waiting for requests on stdin...");
            if let Err(e) = server.run().await {
                error!(error = %e, "Server error");
                return Err(e.into());
            }
            info!("Server shutdown complete");
        }
        Command::Ask {
            query,
            user_id,
            collection_id,
            max_iterations,
        } => {
            let options = RunOptions {
                collection_id,
                session_id: None,
                max_iterations,
            };
            let output = agent
                .run(&query, &user_id, options, Some(&TracingProgress))
                .await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Initialize tracing/logging. `RUST_LOG` takes precedence over `LOG_LEVEL`.
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
