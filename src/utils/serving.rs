use crate::error::{PredictorError, Result};
use crate::models::{FeatureVector, FullTimeResult, LatestTeamStats, Odds, OutcomeProbabilities};
use crate::utils::classifier::TrainedModel;
use crate::utils::data::{load_latest_stats, load_model};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Decimal odds as supplied by a form or JSON client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OddsInput {
    Number(f64),
    Text(String),
}

impl OddsInput {
    fn parse(&self, label: &'static str) -> Result<f64> {
        let invalid = |value: String| PredictorError::InvalidOdds { label, value };
        let value = match self {
            OddsInput::Number(v) => *v,
            OddsInput::Text(s) => s
                .trim()
                .replace(',', ".")
                .parse::<f64>()
                .map_err(|_| invalid(s.clone()))?,
        };
        if !value.is_finite() || value <= 1.0 {
            return Err(invalid(value.to_string()));
        }
        Ok(value)
    }
}

impl From<f64> for OddsInput {
    fn from(value: f64) -> Self {
        OddsInput::Number(value)
    }
}

/// A hypothetical fixture to price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub home_team: String,
    pub away_team: String,
    pub odds_home: OddsInput,
    pub odds_draw: OddsInput,
    pub odds_away: OddsInput,
}

/// A request that passed input validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub home_team: String,
    pub away_team: String,
    pub odds: Odds,
}

impl PredictionRequest {
    /// Check team distinctness and odds format. Runs before any lookup or
    /// feature construction.
    pub fn validate(&self) -> Result<ValidatedRequest> {
        let home_team = self.home_team.trim();
        let away_team = self.away_team.trim();
        if home_team == away_team {
            return Err(PredictorError::SameTeam(home_team.to_string()));
        }

        let odds = Odds {
            home: self.odds_home.parse("home")?,
            draw: self.odds_draw.parse("draw")?,
            away: self.odds_away.parse("away")?,
        };

        Ok(ValidatedRequest {
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            odds,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub home_team: String,
    pub away_team: String,
    pub features: FeatureVector,
    pub probabilities: OutcomeProbabilities,
    pub most_likely: FullTimeResult,
    /// Probability of the most likely outcome
    pub confidence: f64,
}

impl Prediction {
    pub fn format(&self) -> String {
        format!(
            "{} vs {} | {}: {:.1}% | Draw: {:.1}% | {}: {:.1}% | Most likely: {} ({:.1}%)",
            self.home_team,
            self.away_team,
            self.home_team,
            self.probabilities.home * 100.0,
            self.probabilities.draw * 100.0,
            self.away_team,
            self.probabilities.away * 100.0,
            self.most_likely,
            self.confidence * 100.0
        )
    }
}

/// Loaded serving artifacts. Built once at process start and shared read-only.
#[derive(Debug, Clone)]
pub struct Predictor {
    model: TrainedModel,
    stats: HashMap<String, LatestTeamStats>,
    last_update: Option<DateTime<Local>>,
}

impl Predictor {
    pub fn new(model: TrainedModel, stats: Vec<LatestTeamStats>) -> Self {
        Self {
            model,
            stats: stats.into_iter().map(|s| (s.team.clone(), s)).collect(),
            last_update: None,
        }
    }

    /// Load the model and stats table from disk
    pub fn load(model_path: &Path, stats_path: &Path) -> Result<Self> {
        let model = load_model(model_path)?;
        let stats = load_latest_stats(stats_path)?;
        let last_update = std::fs::metadata(stats_path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Local>::from);

        info!(
            "Loaded model ({} training rows) and stats for {} teams",
            model.training_rows,
            stats.len()
        );

        Ok(Self {
            last_update,
            ..Self::new(model, stats)
        })
    }

    /// Modification time of the stats table, when the filesystem reports one
    pub fn last_update(&self) -> Option<DateTime<Local>> {
        self.last_update
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    /// Team names available for prediction, sorted
    pub fn teams(&self) -> Vec<&str> {
        let mut teams: Vec<&str> = self.stats.keys().map(String::as_str).collect();
        teams.sort_unstable();
        teams
    }

    pub fn team_stats(&self, team: &str) -> Result<&LatestTeamStats> {
        self.stats
            .get(team)
            .ok_or_else(|| PredictorError::UnknownTeam(team.to_string()))
    }

    /// Feature vector for a validated request. Season-start is fixed to 0:
    /// predictions assume established, in-season teams.
    pub fn build_features(&self, request: &ValidatedRequest) -> Result<FeatureVector> {
        let home = self.team_stats(&request.home_team)?;
        let away = self.team_stats(&request.away_team)?;

        FeatureVector::from_profiles(
            &home.home_profile(),
            &away.away_profile(),
            false,
            request.odds,
        )
        .map_err(|field| PredictorError::IncompleteProfile {
            team: if field.ends_with("_h") {
                request.home_team.clone()
            } else {
                request.away_team.clone()
            },
            field,
        })
    }

    pub fn predict(&self, request: &PredictionRequest) -> Result<Prediction> {
        let request = request.validate()?;
        let features = self.build_features(&request)?;
        let probabilities = self.model.predict_proba(&features);
        let (most_likely, confidence) = probabilities.most_likely();

        Ok(Prediction {
            home_team: request.home_team,
            away_team: request.away_team,
            features,
            probabilities,
            most_likely,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(home: &str, away: &str, odds_home: OddsInput) -> PredictionRequest {
        PredictionRequest {
            home_team: home.to_string(),
            away_team: away.to_string(),
            odds_home,
            odds_draw: 3.2.into(),
            odds_away: 3.0.into(),
        }
    }

    #[test]
    fn test_same_team_rejected() {
        let err = request("Lens", " Lens ", 2.0.into()).validate().unwrap_err();
        assert!(matches!(err, PredictorError::SameTeam(ref t) if t == "Lens"));
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_malformed_odds_rejected() {
        for bad in ["abc", "", "1.0", "-2", "NaN"] {
            let err = request("Lens", "Lille", OddsInput::Text(bad.to_string()))
                .validate()
                .unwrap_err();
            assert!(
                matches!(err, PredictorError::InvalidOdds { label: "home", .. }),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_odds_accept_text_and_numbers() {
        let validated = request("Lens", "Lille", OddsInput::Text(" 2,10 ".to_string()))
            .validate()
            .unwrap();
        assert!((validated.odds.home - 2.1).abs() < 1e-12);
        assert_eq!(validated.odds.draw, 3.2);

        let json = concat!(
            r#"{"home_team":"Lens","away_team":"Lille","#,
            r#""odds_home":"2.0","odds_draw":3.2,"odds_away":3}"#
        );
        let parsed: PredictionRequest = serde_json::from_str(json).unwrap();
        let validated = parsed.validate().unwrap();
        assert_eq!(validated.odds.away, 3.0);
    }
}
