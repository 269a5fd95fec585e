// sql-assistant/crates/sql-assistant/src/main.rs

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use sql_assistant::{
    config::Config,
    query_engine::{sanitize, QueryValidator},
    run_server,
    shared_state::UnifiedAppState,
    telemetry,
};

/// Ask questions about a SQL database in plain language
#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "sql-assistant", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API (default)
    Serve,
    /// Run one question through the pipeline and print the answer
    Ask {
        question: String,
        #[arg(long, default_value = "cli")]
        session: String,
    },
    /// Check a query against the safety rules without running it
    Validate { sql: String },
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = Config::from_env()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(cfg).await,
        Commands::Ask { question, session } => {
            telemetry::init_tracing(&cfg.log_level);
            let state = UnifiedAppState::from_config(&cfg)?;
            let response = state.orchestrator.handle_message(&session, &question).await;

            println!("{}", response.response);
            if let Some(query) = response.query {
                println!("\nSQL: {}", query);
            }
            if let Some(confidence) = response.confidence {
                println!("Confidence: {}", confidence);
            }
            if let Some(error) = response.error {
                eprintln!("\nError: {}", error);
            }
            Ok(())
        }
        Commands::Validate { sql } => {
            let verdict = QueryValidator::new(cfg.validation_policy()).is_safe(&sql);
            println!("{}", verdict.reason);
            if !verdict.is_safe {
                std::process::exit(1);
            }
            println!("{}", sanitize(&sql));
            Ok(())
        }
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    println!("CLI feature not enabled. Enable with --features cli");
}
