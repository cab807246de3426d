mod batch;
mod display;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use visionsense_ai::Pipeline;
use visionsense_core::ClassifierConfig;

#[derive(Parser, Debug)]
#[command(name = "visionsense")]
#[command(version)]
#[command(about = "VisionSense - ResNet-18 image classification", long_about = None)]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long, global = true, env = "VISIONSENSE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the ONNX weight sets and label files
    #[arg(long, global = true, env = "VISIONSENSE_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// Number of recent predictions kept in the ledger
    #[arg(long, global = true, env = "VISIONSENSE_LEDGER_CAPACITY")]
    ledger_capacity: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify one or more image files
    Classify {
        /// Image files to classify
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Number of labels to return per image
        #[arg(short = 'k', long, env = "VISIONSENSE_TOP_K")]
        top_k: Option<usize>,

        /// Images classified at once
        #[arg(short = 'j', long, default_value = "4")]
        concurrency: usize,

        /// Print the N newest ledger entries afterwards
        #[arg(long, value_name = "N")]
        recent: Option<usize>,

        /// Emit one JSON object per file instead of cards
        #[arg(long)]
        json: bool,
    },

    /// Report whether a model is loaded
    Health,

    /// Show the loaded model and effective configuration
    Info,
}

impl Cli {
    /// File config (or defaults) with flag and environment overrides applied.
    fn resolve_config(&self) -> anyhow::Result<ClassifierConfig> {
        let mut config = match &self.config {
            Some(path) => ClassifierConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => ClassifierConfig::default(),
        };
        if let Some(dir) = &self.model_dir {
            config.model_dir = dir.clone();
        }
        if let Some(capacity) = self.ledger_capacity {
            config.ledger_capacity = capacity;
        }
        if let Commands::Classify {
            top_k: Some(k), ..
        } = &self.command
        {
            config.top_k = *k;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    info!(
        model_dir = %config.model_dir.display(),
        top_k = config.top_k,
        ledger_capacity = config.ledger_capacity,
        "visionsense v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pipeline = Arc::new(Pipeline::new(&config)?);
    {
        let pipeline = pipeline.clone();
        let config = config.clone();
        tokio::task::spawn_blocking(move || pipeline.initialize_from_config(&config))
            .await
            .context("loading model")?;
    }

    match cli.command {
        Commands::Classify {
            files,
            concurrency,
            recent,
            json,
            ..
        } => {
            let (outcomes, stats) =
                batch::classify_files(pipeline.clone(), &files, None, concurrency).await;
            for outcome in &outcomes {
                if json {
                    println!("{}", display::outcome_json(outcome));
                } else {
                    display::print_outcome(outcome);
                }
            }
            if !json {
                display::print_stats(&stats);
            }
            if let Some(limit) = recent {
                display::print_ledger(&pipeline.recent_predictions(limit))?;
            }
            anyhow::ensure!(
                stats.failed == 0,
                "{} of {} files failed",
                stats.failed,
                stats.total
            );
        }
        Commands::Health => {
            println!("{}", serde_json::to_string_pretty(&pipeline.health())?);
        }
        Commands::Info => {
            display::print_info(pipeline.model_info().as_ref(), &config)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn classify_args() {
        let cli = Cli::try_parse_from([
            "visionsense",
            "classify",
            "-k",
            "3",
            "--json",
            "a.png",
            "b.jpg",
        ])
        .unwrap();
        match cli.command {
            Commands::Classify {
                files,
                top_k,
                concurrency,
                json,
                recent,
            } => {
                assert_eq!(files, vec![PathBuf::from("a.png"), PathBuf::from("b.jpg")]);
                assert_eq!(top_k, Some(3));
                assert_eq!(concurrency, 4);
                assert!(json);
                assert_eq!(recent, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn classify_requires_files() {
        assert!(Cli::try_parse_from(["visionsense", "classify"]).is_err());
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "visionsense",
            "--model-dir",
            "/srv/weights",
            "--ledger-capacity",
            "7",
            "classify",
            "--top-k",
            "2",
            "x.png",
        ])
        .unwrap();
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.model_dir, PathBuf::from("/srv/weights"));
        assert_eq!(config.ledger_capacity, 7);
        assert_eq!(config.top_k, 2);
    }

    #[test]
    fn zero_top_k_rejected() {
        let cli =
            Cli::try_parse_from(["visionsense", "classify", "--top-k", "0", "x.png"]).unwrap();
        assert!(cli.resolve_config().is_err());
    }

    #[test]
    fn config_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("visionsense.json");
        std::fs::write(&path, r#"{"top_k": 3, "model_dir": "weights"}"#).unwrap();

        let cli = Cli::try_parse_from([
            "visionsense",
            "--config",
            path.to_str().unwrap(),
            "health",
        ])
        .unwrap();
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.top_k, 3);
        assert_eq!(config.model_dir, PathBuf::from("weights"));
        assert_eq!(config.ledger_capacity, 50);
    }
}
