//! navsim-agents: run and train driving agents.
//!
//! - `info`    -- Show the configured agent and its capabilities
//! - `predict` -- Predict a trajectory for every scene in a file
//! - `train`   -- Fit the configured agent on a scene file

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::backend::{Autodiff, NdArray};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use navsim_agents::agent::{Agent, AnyAgent, InferenceAgent, StyleTable};
use navsim_agents::common::Trajectory;
use navsim_agents::config::NavsimConfig;
use navsim_agents::training::{SceneDataset, Trainer};

/// Backend for inference.
type InferenceBackend = NdArray;
/// Backend for training.
type TrainBackend = Autodiff<NdArray>;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// navsim-agents: run and train driving agents
#[derive(Parser)]
#[command(name = "navsim-agents", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the configured agent and its capabilities.
    Info,

    /// Predict a trajectory for every scene in a file.
    Predict {
        /// JSON array of scenes.
        #[arg(long)]
        scenes: PathBuf,

        /// JSON object mapping scene tokens to style labels (A, N, C).
        #[arg(long)]
        styles: Option<PathBuf>,

        /// Where to write the predictions (prints to stdout if not provided).
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Fit the configured agent on a scene file.
    Train {
        /// JSON array of scenes; the tail is held out for validation.
        #[arg(long)]
        scenes: PathBuf,

        /// JSON object mapping scene tokens to style labels (A, N, C).
        #[arg(long)]
        styles: Option<PathBuf>,
    },
}

/// One line of `predict` output.
#[derive(Serialize)]
struct Prediction {
    token: String,
    trajectory: Trajectory,
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // Initialise tracing (reads RUST_LOG env var, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => NavsimConfig::from_file(path)?,
        None => NavsimConfig::default(),
    };

    match cli.command {
        Commands::Info => cmd_info(&config),
        Commands::Predict {
            scenes,
            styles,
            output,
        } => cmd_predict(&config, &scenes, styles.as_deref(), output.as_deref()),
        Commands::Train { scenes, styles } => cmd_train(&config, &scenes, styles.as_deref()),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_info(config: &NavsimConfig) -> Result<()> {
    let agent = AnyAgent::<InferenceBackend>::from_config(&config.agent, &Default::default());
    let sampling = agent.trajectory_sampling();
    let sensors = agent.sensor_config();

    println!("Agent: {}", agent.name());
    println!("  Trainable: {}", agent.is_trainable());
    println!("  Requires scene: {}", agent.requires_scene());
    println!(
        "  Trajectory: {} poses every {:.2}s ({:.1}s horizon)",
        sampling.num_poses,
        sampling.interval_length,
        sampling.time_horizon()
    );
    if sensors.is_empty() {
        println!("  Sensors: none");
    } else {
        println!("  Sensors:");
        for channel in sensors.enabled_channels() {
            println!("    {channel}: frames {:?}", sensors.frames(channel));
        }
    }
    println!();
    println!("Training:");
    println!("  Epochs: {}", config.training.max_epochs);
    println!("  Batch size: {}", config.training.batch_size);
    println!("  Validation fraction: {}", config.training.val_fraction);
    Ok(())
}

fn cmd_predict(
    config: &NavsimConfig,
    scenes_path: &Path,
    styles_path: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let dataset = SceneDataset::load_json(scenes_path)?;
    let style = styles_path.map(StyleTable::load_from_file).transpose()?;

    let mut agent = AnyAgent::<InferenceBackend>::from_config(&config.agent, &Default::default());
    agent
        .initialize()
        .with_context(|| format!("Failed to initialize {}", agent.name()))?;
    tracing::info!(agent = %agent.name(), scenes = dataset.len(), "Predicting trajectories");

    let sensor_config = agent.sensor_config();
    let predictions = dataset
        .scenes()
        .iter()
        .map(|scene| {
            let input = scene.agent_input.filtered(&sensor_config);
            let trajectory = agent
                .compute_trajectory(&input, &scene.token, style.as_ref())
                .with_context(|| format!("Prediction failed for scene {}", scene.token))?;
            Ok(Prediction {
                token: scene.token.clone(),
                trajectory,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let json = serde_json::to_string_pretty(&predictions)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), count = predictions.len(), "Saved predictions");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_train(config: &NavsimConfig, scenes_path: &Path, styles_path: Option<&Path>) -> Result<()> {
    let dataset = SceneDataset::load_json(scenes_path)?;
    let style = styles_path.map(StyleTable::load_from_file).transpose()?;
    let (train, val) = dataset.split(config.training.val_fraction);

    let mut agent =
        AnyAgent::<TrainBackend>::from_config(&config.agent, &Default::default()).into_trainable()?;
    agent
        .initialize()
        .with_context(|| format!("Failed to initialize {}", agent.name()))?;

    let trainer = Trainer::new(config.training.clone());
    let (_agent, summary) = trainer.fit::<TrainBackend, _>(agent, &train, &val, style.as_ref())?;

    if let Some(last) = summary.epochs.last() {
        tracing::info!(
            run_id = %summary.run_id,
            epochs = summary.epochs.len(),
            train_loss = last.train.get("train/loss").copied(),
            val_loss = last.val.get("val/loss").copied(),
            checkpoint = ?summary.checkpoint,
            "Training complete"
        );
    }
    Ok(())
}
