pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod utils;

pub use config::Config;
pub use error::{PredictorError, Result};
pub use models::*;
pub use utils::*;

use anyhow::Context;
use api::FootballDataClient;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;
use utils::data::{load_matches_from_csv, stage_latest_stats, stage_model};
use utils::features::prepare_features;
use utils::split::{complete_rows, latest_team_stats, temporal_split};
use utils::training::{evaluate_holdout, train_and_validate_model, ConfusionMatrix, TrainingReport};

/// Everything a training run produces before it touches the disk
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: TrainedModel,
    pub latest_stats: Vec<LatestTeamStats>,
    pub summary: TrainingSummary,
}

/// Counts and diagnostics reported at the end of a training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub raw_matches: usize,
    pub complete_rows: usize,
    pub conversion_ceiling: f64,
    pub last_match_date: NaiveDate,
    pub cutoff: NaiveDate,
    pub holdout_matches: usize,
    pub report: TrainingReport,
    pub holdout: Option<ConfusionMatrix>,
    pub teams: usize,
}

impl TrainingSummary {
    pub fn format(&self) -> String {
        let mut out = format!(
            "Matches: {} raw, {} with complete features\n\
             Conversion rate ceiling: {:.4}\n\
             Last match: {} | Training cutoff: {} | Holdout matches: {}\n",
            self.raw_matches,
            self.complete_rows,
            self.conversion_ceiling,
            self.last_match_date,
            self.cutoff,
            self.holdout_matches
        );
        out.push_str(&self.report.format());
        out.push('\n');
        if let Some(matrix) = &self.holdout {
            out.push_str(&format!("Accuracy on the last matchday: {:.4}\n", matrix.accuracy()));
            out.push_str(&matrix.format());
        }
        out.push_str(&format!("Teams in stats table: {}", self.teams));
        out
    }
}

/// Feature engineering, temporal split, training and the stats snapshot,
/// all in memory
pub fn train_from_records(records: &[MatchRecord], config: &Config) -> Result<TrainingOutcome> {
    let table = prepare_features(records, &config.features)?;
    let features = table.rows;

    let rows = complete_rows(&features);
    info!(
        "{} of {} matches have complete rolling features",
        rows.len(),
        features.len()
    );
    let complete = rows.len();

    let split = temporal_split(rows, config.training.holdout_days)?;
    info!(
        "Last match {} - training on matches up to {} ({} rows), holding out {}",
        split.last_match_date,
        split.cutoff,
        split.train.len(),
        split.holdout.len()
    );

    let (model, report) = train_and_validate_model(
        &split.train,
        config.training.cv_folds,
        &config.training.classifier,
    )?;

    let holdout = evaluate_holdout(&model, &split.holdout);
    if let Some(matrix) = &holdout {
        info!("Holdout accuracy: {:.4}", matrix.accuracy());
    }

    let latest_stats = latest_team_stats(&features);

    Ok(TrainingOutcome {
        summary: TrainingSummary {
            raw_matches: records.len(),
            complete_rows: complete,
            conversion_ceiling: table.conversion_ceiling,
            last_match_date: split.last_match_date,
            cutoff: split.cutoff,
            holdout_matches: split.holdout.len(),
            report,
            holdout,
            teams: latest_stats.len(),
        },
        model,
        latest_stats,
    })
}

/// Write both artifacts. Neither destination changes unless both staged
/// files were written successfully.
pub fn persist_outcome(
    outcome: &TrainingOutcome,
    model_path: &Path,
    stats_path: &Path,
) -> Result<(PathBuf, PathBuf)> {
    let model = stage_model(&outcome.model, model_path)?;
    let stats = match stage_latest_stats(&outcome.latest_stats, stats_path) {
        Ok(stats) => stats,
        Err(e) => {
            model.discard();
            return Err(e);
        }
    };

    let model_path = model.commit()?;
    let stats_path = stats.commit()?;
    info!(
        "Saved model to {} and team stats to {}",
        model_path.display(),
        stats_path.display()
    );
    Ok((model_path, stats_path))
}

/// Load the raw match history, either from a local CSV or from the season files
pub async fn collect_matches(
    config: &Config,
    input: Option<&Path>,
) -> anyhow::Result<Vec<MatchRecord>> {
    let records = match input {
        Some(path) => load_matches_from_csv(path)
            .with_context(|| format!("Failed to load matches from {}", path.display()))?,
        None => {
            let client = FootballDataClient::new(&config.base_url, &config.league);
            let cache_dir = config.use_cache.then_some(config.cache_dir.as_path());
            client.fetch_seasons(&config.seasons, cache_dir).await
        }
    };

    if records.is_empty() {
        return Err(PredictorError::EmptyHistory.into());
    }
    info!("Collected {} matches", records.len());
    Ok(records)
}

/// Full training run: collect, train, persist
pub async fn run_training(
    config: &Config,
    input: Option<&Path>,
) -> anyhow::Result<TrainingSummary> {
    let records = collect_matches(config, input).await?;
    let outcome = train_from_records(&records, config).context("Training failed")?;
    persist_outcome(&outcome, &config.model_path, &config.stats_path)
        .context("Failed to save artifacts")?;
    Ok(outcome.summary)
}
