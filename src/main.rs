use anyhow::Context;
use service_rules::cli::{Cli, Commands, ConfigAction};
use service_rules::config::{expand_path, Config};
use service_rules::error::{Result, ServiceRulesError};
use service_rules::ruler::{RuleEngine, Ruler};
use service_rules::services::Instance;
use service_rules::signatures;
use service_rules::RuleFilter;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Classify { entities, json } => {
            cmd_classify(cli.config, &entities, json)?;
        }
        Commands::Check { files } => {
            cmd_check(cli.config, files)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose {
        "service_rules=debug"
    } else {
        "service_rules=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_classify(config_path: Option<PathBuf>, entities: &Path, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let filter = RuleFilter::new(config.rules.name.clone(), &config.rules)?;

    let instances = read_instances(entities)?;
    let (mapped, stats) = filter.map_with_stats(instances)?;

    tracing::info!(
        input = stats.input_instances,
        matched = stats.matched,
        dropped = stats.dropped,
        rulesets_evaluated = stats.rulesets_evaluated,
        elapsed_ms = stats.processing_time_ms,
        "classification finished"
    );

    if json {
        let output = serde_json::to_string_pretty(&mapped).map_err(|e| ServiceRulesError::Json {
            source: e,
            context: "Failed to serialize classified instances".to_string(),
        })?;
        println!("{}", output);
        return Ok(());
    }

    if mapped.is_empty() {
        println!("No instances matched ({} checked)", stats.input_instances);
        return Ok(());
    }

    println!("{:<24} {:<20} {:<32} {:>6}", "INSTANCE", "TYPE", "IMAGE", "PORT");
    for instance in &mapped {
        println!(
            "{:<24} {:<20} {:<32} {:>6}",
            instance.id,
            instance.service_type(),
            instance.container.image,
            instance.port.private_port
        );
    }
    println!(
        "\n✓ {} of {} instances classified",
        stats.matched, stats.input_instances
    );

    Ok(())
}

fn cmd_check(config_path: Option<PathBuf>, files: Vec<PathBuf>) -> Result<()> {
    let files = if files.is_empty() {
        load_config(config_path)?.rules.services_files
    } else {
        files
            .iter()
            .map(|f| expand_path(f))
            .collect::<Result<Vec<_>>>()?
    };

    let loaded = signatures::load_all(&files)?;

    // Compiling surfaces unknown comparators and bad patterns up front
    let engine = Ruler::new();
    for (path, source) in files.iter().zip(&loaded) {
        for ruleset in &source.signatures {
            engine.compile(ruleset)?;
        }
        println!(
            "✓ {} ({}): {} rulesets, {} rules",
            source.name,
            path.display(),
            source.signatures.len(),
            source.rule_count()
        );
    }

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let output = toml::to_string_pretty(&config)?;
            println!("{}", output);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
            println!("  Signature files: {}", config.rules.services_files.len());
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            let config_dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));

            std::fs::create_dir_all(&config_dir).map_err(|e| ServiceRulesError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", config_dir),
            })?;

            let services_path = config_dir.join("services.json");
            let mut config = Config::default();
            config.rules.services_files = vec![services_path.clone()];
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());

            if force || !services_path.exists() {
                let template = include_str!("../config-templates/services.json");
                std::fs::write(&services_path, template).map_err(|e| ServiceRulesError::Io {
                    source: e,
                    context: format!("Failed to write services.json: {:?}", services_path),
                })?;
                println!("✓ Service signatures installed at: {}", services_path.display());
            }
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'service-rules config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        config.resolve_paths(None)?;
        return Ok(config);
    }

    Config::load(&path)
}

fn read_instances(path: &Path) -> Result<Vec<Instance>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read instances file: {:?}", path))?;

    let instances: Vec<Instance> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse instances file: {:?}", path))?;

    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("instances.json");
        std::fs::write(
            &path,
            r#"[{"id": "cache", "container": {"image": "redis:6"}, "port": {"private_port": 6379}}]"#,
        )
        .unwrap();

        let instances = read_instances(&path).unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].container.image, "redis:6");
    }

    #[test]
    fn test_read_instances_errors_carry_context() {
        let dir = TempDir::new().unwrap();

        let missing = dir.path().join("missing.json");
        match read_instances(&missing) {
            Err(ServiceRulesError::Other(e)) => {
                assert!(e.to_string().contains("Failed to read instances file"));
                assert!(e.root_cause().downcast_ref::<std::io::Error>().is_some());
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let malformed = dir.path().join("malformed.json");
        std::fs::write(&malformed, "{\"id\": ").unwrap();
        match read_instances(&malformed) {
            Err(ServiceRulesError::Other(e)) => {
                assert!(e.to_string().contains("Failed to parse instances file"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
