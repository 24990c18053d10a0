//! FluxForge Spin Demo
//!
//! Replays one server spin payload against a headless reel view and prints
//! every milestone fact as a JSON line on stdout.
//!
//! Usage:
//!   rf-spin-demo fixtures/cascade_spin.json
//!   rf-spin-demo spin.json --profile turbo --policy feature-end
//!   rf-spin-demo spin.json --config presentation.toml
//!
//! Logs go to stderr; set `RUST_LOG=debug` to follow the phases.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rf_cascade::{GridSize, HeadlessGridView, SpinPayload, parse_payload_with_size};
use rf_presentation::{FactBus, PresentationConfig, ResultPresentationController, TriggerPolicy};

#[derive(Parser)]
#[command(name = "rf-spin-demo", about = "Replay a spin payload headlessly")]
struct Cli {
    /// Spin payload JSON file
    payload: PathBuf,

    /// Timing profile
    #[arg(short, long, value_enum, default_value = "normal")]
    profile: Profile,

    /// Win presentation trigger (overrides the config file)
    #[arg(long, value_enum)]
    policy: Option<Policy>,

    /// Presentation config TOML (replaces the profile)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Hidden spare instances per reel for refills
    #[arg(long, default_value_t = 4)]
    spare: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum Profile {
    Normal,
    Turbo,
    Instant,
}

#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    Result,
    SequenceEnd,
    FeatureEnd,
    ResultDataFinalized,
}

impl From<Policy> for TriggerPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Result => Self::Result,
            Policy::SequenceEnd => Self::SequenceEnd,
            Policy::FeatureEnd => Self::FeatureEnd,
            Policy::ResultDataFinalized => Self::ResultDataFinalized,
        }
    }
}

fn load_config(cli: &Cli) -> Result<PresentationConfig> {
    let config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            PresentationConfig::from_toml(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => match cli.profile {
            Profile::Normal => PresentationConfig::normal(),
            Profile::Turbo => PresentationConfig::turbo(),
            Profile::Instant => PresentationConfig::instant(),
        },
    };

    Ok(match cli.policy {
        Some(policy) => config.with_trigger_policy(policy.into()),
        None => config,
    })
}

/// Read and validate the payload once; the grid size sizes the view
fn read_payload(path: &Path) -> Result<(SpinPayload, GridSize)> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload {}", path.display()))?;
    parse_payload_with_size(&json).with_context(|| format!("Invalid payload {}", path.display()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let (payload, size) = read_payload(&cli.payload)?;

    log::info!(
        "[Demo] Spin {}: {} steps on {} grid, win {:.2} / bet {:.2}, {}",
        payload.spin_id,
        payload.steps.len(),
        size,
        payload.total_win,
        payload.total_bet,
        config.trigger_policy
    );

    let view = HeadlessGridView::new(size, cli.spare);
    let facts = Arc::new(FactBus::new());
    facts.subscribe(|fact| match fact.to_json() {
        Ok(line) => println!("{line}"),
        Err(err) => log::warn!("[Demo] Failed to serialize {}: {}", fact.name(), err),
    });

    let controller =
        ResultPresentationController::with_view(Arc::new(view.clone()), facts, config)?;
    let outcome = controller
        .handle_spin_result(
            payload.spin_id,
            payload.steps,
            payload.total_win,
            payload.total_bet,
            payload.final_matrix,
        )
        .await?;

    log::info!(
        "[Demo] Flow {} finished (completed: {}), grid {}",
        outcome.flow_id,
        outcome.completed,
        view.matrix()
    );
    controller.destroy();
    Ok(())
}
