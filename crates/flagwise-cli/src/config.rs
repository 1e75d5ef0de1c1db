//! Configuration loading for the CLI

use crate::Cli;
use flagwise_classifiers::OrchestratorConfig;
use std::path::Path;

/// Load configuration from file, apply CLI overrides and resolve credentials
pub fn load(config_path: &str, cli: &Cli) -> anyhow::Result<OrchestratorConfig> {
    let mut config = read(config_path)?;

    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if cli.debug {
        config.debug = true;
    }

    config.resolve_from_env();
    Ok(config)
}

/// Read the YAML file, or fall back to defaults when it does not exist
fn read(config_path: &str) -> anyhow::Result<OrchestratorConfig> {
    if Path::new(config_path).exists() {
        Ok(OrchestratorConfig::from_file(config_path)?)
    } else {
        tracing::debug!(path = config_path, "No config file, using defaults");
        Ok(OrchestratorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use flagwise_core::ClassificationMode;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = read("/nonexistent/flagwise.yaml").unwrap();
        assert_eq!(config.mode, ClassificationMode::RemoteOnly);
        assert_eq!(config.providers.len(), 4);
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mode: remote-only\nlocal_fallback_delay_ms: 5").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::parse_from(["flagwise", "--mode", "local-only", "--debug", "providers"]);
        let config = load(&path, &cli).unwrap();
        assert_eq!(config.mode, ClassificationMode::LocalOnly);
        assert!(config.debug);
        assert_eq!(config.local_fallback_delay_ms, 5);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mode: [not, a, mode]").unwrap();
        assert!(read(file.path().to_str().unwrap()).is_err());
    }
}
