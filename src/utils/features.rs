use crate::config::FeatureConfig;
use crate::error::{PredictorError, Result};
use crate::models::{MatchFeatures, MatchRecord, TeamRollingProfile};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Mean of the last `window` values pushed, defined only once the window is full
#[derive(Debug, Clone)]
struct RollingMean {
    window: usize,
    values: VecDeque<f64>,
}

impl RollingMean {
    fn new(window: usize) -> Self {
        Self {
            window,
            values: VecDeque::with_capacity(window + 1),
        }
    }

    fn mean(&self) -> Option<f64> {
        if self.window == 0 || self.values.len() < self.window {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.window as f64)
    }

    fn push(&mut self, value: f64) {
        self.values.push_back(value);
        if self.values.len() > self.window {
            self.values.pop_front();
        }
    }
}

/// A team's trailing series in one role. The "allowed" series hold the
/// opponent's numbers in the same fixtures.
#[derive(Debug, Clone)]
struct RoleHistory {
    shots: RollingMean,
    conversion: RollingMean,
    shots_allowed: RollingMean,
    conversion_allowed: RollingMean,
    corners: RollingMean,
}

impl RoleHistory {
    fn new(window: usize) -> Self {
        Self {
            shots: RollingMean::new(window),
            conversion: RollingMean::new(window),
            shots_allowed: RollingMean::new(window),
            conversion_allowed: RollingMean::new(window),
            corners: RollingMean::new(window),
        }
    }

    fn profile(&self) -> TeamRollingProfile {
        TeamRollingProfile {
            shots_on_target_mean: self.shots.mean(),
            conversion_mean: self.conversion.mean(),
            shots_allowed_mean: self.shots_allowed.mean(),
            conversion_allowed_mean: self.conversion_allowed.mean(),
            corners_mean: self.corners.mean(),
        }
    }

    fn push(
        &mut self,
        shots: u32,
        conversion: f64,
        shots_allowed: u32,
        conversion_allowed: f64,
        corners: u32,
    ) {
        self.shots.push(shots as f64);
        self.conversion.push(conversion);
        self.shots_allowed.push(shots_allowed as f64);
        self.conversion_allowed.push(conversion_allowed);
        self.corners.push(corners as f64);
    }
}

/// Goals per shot on target, with zero shots counted as one
pub fn conversion_rate(goals: u32, shots_on_target: u32) -> f64 {
    goals as f64 / shots_on_target.max(1) as f64
}

/// Quantile with linear interpolation between order statistics.
///
/// Returns `None` for an empty slice. Non-finite values are ignored.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let pos = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// 90th-percentile (by default) ceiling over the pooled home and away conversion rates
pub fn conversion_ceiling(records: &[MatchRecord], q: f64) -> Result<f64> {
    let pooled: Vec<f64> = records
        .iter()
        .map(|r| conversion_rate(r.home_goals, r.home_shots_on_target))
        .chain(
            records
                .iter()
                .map(|r| conversion_rate(r.away_goals, r.away_shots_on_target)),
        )
        .collect();

    quantile(&pooled, q).ok_or(PredictorError::EmptyHistory)
}

/// Engineered rows plus the conversion ceiling they were clipped to
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub rows: Vec<MatchFeatures>,
    pub conversion_ceiling: f64,
}

/// Turn raw match records into engineered feature rows.
///
/// Rows come back sorted by date (stable, so same-day fixtures keep their
/// ingestion order). Every rolling value only sees rows processed before the
/// current one.
pub fn prepare_features(records: &[MatchRecord], config: &FeatureConfig) -> Result<FeatureTable> {
    if records.is_empty() {
        return Err(PredictorError::EmptyHistory);
    }

    let mut ordered: Vec<&MatchRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.date);

    let ceiling = conversion_ceiling(records, config.clip_quantile)?;
    debug!("Conversion rate ceiling (q={}): {:.4}", config.clip_quantile, ceiling);

    let window = config.rolling_window;
    let mut home_histories: HashMap<&str, RoleHistory> = HashMap::new();
    let mut away_histories: HashMap<&str, RoleHistory> = HashMap::new();
    let mut season_home_counts: HashMap<(&str, &str), usize> = HashMap::new();

    let mut rows = Vec::with_capacity(ordered.len());
    for record in ordered {
        let conv_home =
            conversion_rate(record.home_goals, record.home_shots_on_target).clamp(0.0, ceiling);
        let conv_away =
            conversion_rate(record.away_goals, record.away_shots_on_target).clamp(0.0, ceiling);

        let match_number = season_home_counts
            .entry((record.season.as_str(), record.home_team.as_str()))
            .or_insert(0);
        *match_number += 1;
        let match_number = *match_number;

        let home_history = home_histories
            .entry(record.home_team.as_str())
            .or_insert_with(|| RoleHistory::new(window));
        let home_profile = home_history.profile();
        home_history.push(
            record.home_shots_on_target,
            conv_home,
            record.away_shots_on_target,
            conv_away,
            record.home_corners,
        );

        let away_history = away_histories
            .entry(record.away_team.as_str())
            .or_insert_with(|| RoleHistory::new(window));
        let away_profile = away_history.profile();
        away_history.push(
            record.away_shots_on_target,
            conv_away,
            record.home_shots_on_target,
            conv_home,
            record.away_corners,
        );

        rows.push(MatchFeatures {
            record: record.clone(),
            conv_home,
            conv_away,
            match_number,
            is_start_season: match_number <= config.start_season_matches,
            home_profile,
            away_profile,
        });
    }

    Ok(FeatureTable {
        rows,
        conversion_ceiling: ceiling,
    })
}
