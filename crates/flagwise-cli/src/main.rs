//! Flagwise CLI
//!
//! Classifies relationship journal entries from the command line.
//!
//! Remote providers are enabled by exporting their API keys
//! (`GEMINI_API_KEY`, `GROQ_API_KEY`, ...); without any, every entry is
//! classified by the local keyword heuristic.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flagwise_classifiers::ClassificationOrchestrator;
use flagwise_core::{ClassificationMode, Entry};
use serde::Serialize;
use std::io::Read;
use tracing::info;

mod config;

#[derive(Parser, Debug)]
#[command(name = "flagwise")]
#[command(about = "Classify relationship journal entries as green, red or neutral flags", long_about = None)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "flagwise.yaml", env = "FLAGWISE_CONFIG")]
    config: String,

    /// Classification mode (remote-only, remote-with-local-validation, local-only)
    #[arg(short, long, env = "FLAGWISE_MODE")]
    mode: Option<ClassificationMode>,

    /// Attach the debug trace to every classification
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify one entry, read from stdin when TEXT is omitted
    Classify {
        /// Entry text
        text: Option<String>,
    },

    /// List configured providers and their roles
    Providers,

    /// Send a sample entry to one provider
    TestProvider {
        /// Provider name as configured
        name: String,
    },
}

#[derive(Serialize)]
struct ProviderReport {
    providers: Vec<flagwise_classifiers::ProviderInfo>,
    status: flagwise_classifiers::ProviderStatus,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.json_logs);

    let config = config::load(&cli.config, &cli)?;
    info!(
        mode = %config.mode,
        providers = config.providers.iter().filter(|p| p.enabled()).count(),
        "Configuration loaded"
    );

    let orchestrator = ClassificationOrchestrator::from_config(&config)
        .context("failed to build classification pipeline")?;

    match cli.command {
        Command::Classify { text } => {
            let text = match text {
                Some(text) => text,
                None => read_stdin()?,
            };
            let entry = Entry::new(text);
            let mode = orchestrator.default_mode();
            let classification = orchestrator.classify_entry(&entry, mode).await;
            print_json(&classification)?;
        }
        Command::Providers => {
            print_json(&ProviderReport {
                providers: orchestrator.providers(),
                status: orchestrator.provider_status(),
            })?;
        }
        Command::TestProvider { name } => {
            let probe = orchestrator.test_provider(&name).await;
            print_json(&probe)?;
            if !probe.success {
                anyhow::bail!("provider {} failed its probe", name);
            }
        }
    }

    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("failed to read entry from stdin")?;
    Ok(text.trim_end().to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("flagwise=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flagwise=info"))
    };

    // Logs go to stderr so stdout stays machine-readable
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_classify() {
        let cli = Cli::parse_from(["flagwise", "--mode", "local-only", "classify", "he hit me"]);
        assert_eq!(cli.mode, Some(ClassificationMode::LocalOnly));
        assert!(matches!(cli.command, Command::Classify { text: Some(ref t) } if t == "he hit me"));
    }

    #[test]
    fn test_cli_accepts_mode_aliases() {
        let cli = Cli::parse_from(["flagwise", "-m", "enhanced", "providers"]);
        assert_eq!(cli.mode, Some(ClassificationMode::RemoteWithLocalValidation));
    }

    #[test]
    fn test_cli_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["flagwise", "--mode", "psychic", "providers"]).is_err());
    }

    #[test]
    fn test_cli_test_provider() {
        let cli = Cli::parse_from(["flagwise", "test-provider", "groq"]);
        assert!(matches!(cli.command, Command::TestProvider { ref name } if name == "groq"));
    }
}
