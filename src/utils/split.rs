use crate::error::{PredictorError, Result};
use crate::models::{
    FeatureVector, FullTimeResult, LatestTeamStats, MatchFeatures, TeamRollingProfile,
};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

/// A complete feature row ready for the classifier
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub features: FeatureVector,
    pub target: FullTimeResult,
}

/// Keep only rows whose every model feature is defined
pub fn complete_rows(rows: &[MatchFeatures]) -> Vec<TrainingRow> {
    rows.iter()
        .filter_map(|row| {
            Some(TrainingRow {
                date: row.record.date,
                home_team: row.record.home_team.clone(),
                away_team: row.record.away_team.clone(),
                features: row.feature_vector()?,
                target: row.record.result,
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct TemporalSplit {
    pub last_match_date: NaiveDate,
    /// Rows on or before this date train the model
    pub cutoff: NaiveDate,
    pub train: Vec<TrainingRow>,
    pub holdout: Vec<TrainingRow>,
}

/// Hold out every row dated strictly after (last date - `holdout_days`)
pub fn temporal_split(rows: Vec<TrainingRow>, holdout_days: i64) -> Result<TemporalSplit> {
    let last_match_date = rows
        .iter()
        .map(|r| r.date)
        .max()
        .ok_or_else(|| PredictorError::NoTrainingRows("no complete feature rows".to_string()))?;
    let cutoff = last_match_date - Duration::days(holdout_days);

    let (train, holdout): (Vec<_>, Vec<_>) = rows.into_iter().partition(|r| r.date <= cutoff);

    if train.is_empty() {
        return Err(PredictorError::NoTrainingRows(format!(
            "every complete row is dated after the cutoff {}",
            cutoff
        )));
    }

    Ok(TemporalSplit {
        last_match_date,
        cutoff,
        train,
        holdout,
    })
}

/// One snapshot row per team that appears as a home side.
///
/// Home-role fields come from the team's latest home fixture and away-role
/// fields from its latest away fixture. `rows` must be in processing order, as
/// returned by feature engineering.
pub fn latest_team_stats(rows: &[MatchFeatures]) -> Vec<LatestTeamStats> {
    let mut home: BTreeMap<&str, TeamRollingProfile> = BTreeMap::new();
    let mut away: BTreeMap<&str, TeamRollingProfile> = BTreeMap::new();

    for row in rows {
        home.insert(row.record.home_team.as_str(), row.home_profile);
        away.insert(row.record.away_team.as_str(), row.away_profile);
    }

    home.iter()
        .map(|(team, home_profile)| {
            let away_profile = away.get(team).copied().unwrap_or_default();
            LatestTeamStats::from_profiles(team, home_profile, &away_profile)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeatureConfig;
    use crate::models::{MatchRecord, Odds};
    use crate::utils::features::prepare_features;

    fn record(date: NaiveDate, home: &str, away: &str, hst: u32, ast: u32) -> MatchRecord {
        MatchRecord {
            date,
            season: "2324".to_string(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_goals: 1,
            away_goals: 0,
            result: FullTimeResult::Home,
            home_shots_on_target: hst,
            away_shots_on_target: ast,
            home_corners: 4,
            away_corners: 3,
            odds: Some(Odds {
                home: 2.0,
                draw: 3.2,
                away: 3.0,
            }),
        }
    }

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(n)
    }

    fn row(date: NaiveDate) -> TrainingRow {
        TrainingRow {
            date,
            home_team: "A".to_string(),
            away_team: "B".to_string(),
            features: FeatureVector {
                xg_spec_home: 1.0,
                xg_spec_away: 1.0,
                xga_spec_home: 1.0,
                xga_spec_away: 1.0,
                is_start_season: 0.0,
                odds_home: 2.0,
                odds_draw: 3.0,
                odds_away: 4.0,
            },
            target: FullTimeResult::Draw,
        }
    }

    #[test]
    fn test_temporal_split_holds_out_last_three_days() {
        let rows = vec![row(day(0)), row(day(7)), row(day(10)), row(day(11)), row(day(14))];
        let split = temporal_split(rows, 3).unwrap();
        assert_eq!(split.last_match_date, day(14));
        assert_eq!(split.cutoff, day(11));
        assert_eq!(split.train.len(), 4);
        assert_eq!(split.holdout.len(), 1);
        assert!(split.holdout.iter().all(|r| r.date > split.cutoff));
    }

    #[test]
    fn test_temporal_split_requires_rows() {
        assert!(matches!(
            temporal_split(Vec::new(), 3),
            Err(PredictorError::NoTrainingRows(_))
        ));
    }

    #[test]
    fn test_complete_rows_drops_undefined_features() {
        let records: Vec<MatchRecord> =
            (0..8).map(|i| record(day(i * 7), "A", "B", 3, 2)).collect();
        let features = prepare_features(&records, &FeatureConfig::default())
            .unwrap()
            .rows;
        let rows = complete_rows(&features);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].date, day(35));
    }

    #[test]
    fn test_fixture_without_odds_stays_in_rolling_history() {
        let mut records: Vec<MatchRecord> = (0..7)
            .map(|i| record(day(i * 7), "A", "B", 1 + i as u32, 2))
            .collect();
        records[1].odds = None;
        records[6].odds = None;

        let features = prepare_features(&records, &FeatureConfig::default())
            .unwrap()
            .rows;
        assert_eq!(features.len(), 7);
        // Shots 1..=5 over the first five fixtures, the one without odds included
        assert_eq!(features[5].home_profile.shots_on_target_mean, Some(3.0));
        assert_eq!(features[6].home_profile.shots_on_target_mean, Some(4.0));

        let rows = complete_rows(&features);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, day(35));
    }

    #[test]
    fn test_latest_stats_one_row_per_home_team() {
        let mut records = Vec::new();
        for i in 0..8 {
            records.push(record(day(i * 7), "A", "B", 2 + i as u32, 1));
            records.push(record(day(i * 7 + 3), "B", "A", 4, 1 + i as u32));
        }
        records.push(record(day(100), "C", "A", 1, 1));

        let features = prepare_features(&records, &FeatureConfig::default())
            .unwrap()
            .rows;
        let stats = latest_team_stats(&features);
        let teams: Vec<&str> = stats.iter().map(|s| s.team.as_str()).collect();
        assert_eq!(teams, vec!["A", "B", "C"]);

        // A's last home match is its 8th: window covers home matches 3..=7 (shots 4..=8)
        let a = &stats[0];
        assert_eq!(a.hst_mean_h, Some(6.0));
        // A's last away fixture is at C, its 9th away match: the window covers
        // away matches 4..=8 (shots 4..=8)
        assert_eq!(a.ast_mean_a, Some(6.0));

        // C never played before its single home fixture and never away
        let c = &stats[2];
        assert_eq!(c.hst_mean_h, None);
        assert_eq!(c.ast_mean_a, None);
    }
}
