use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Runtime configuration shared by the training and serving binaries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// football-data.co.uk division code (F1 = Ligue 1)
    pub league: String,
    /// Season tags such as "2324"
    pub seasons: Vec<String>,
    pub base_url: String,
    pub model_path: PathBuf,
    pub stats_path: PathBuf,
    pub cache_dir: PathBuf,
    pub use_cache: bool,
    pub features: FeatureConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub rolling_window: usize,
    pub start_season_matches: usize,
    pub clip_quantile: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Matches dated after (last date - holdout_days) form the holdout
    pub holdout_days: i64,
    pub cv_folds: usize,
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Inverse L2 regularisation strength
    pub c: f64,
    pub max_iter: usize,
    pub learning_rate: f64,
    pub tolerance: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            rolling_window: 5,
            start_season_matches: 5,
            clip_quantile: 0.90,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            learning_rate: 0.5,
            tolerance: 1e-5,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            holdout_days: 3,
            cv_folds: 5,
            classifier: ClassifierConfig::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            league: "F1".to_string(),
            seasons: ["2021", "2122", "2223", "2324", "2425", "2526"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            base_url: "https://www.football-data.co.uk/mmz4281".to_string(),
            model_path: PathBuf::from("models/football_model.json"),
            stats_path: PathBuf::from("data/latest_team_stats.csv"),
            cache_dir: PathBuf::from("cache"),
            use_cache: false,
            features: FeatureConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl Config {
    /// Defaults overridden by environment variables (and a `.env` file if present)
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(league) = var("LEAGUE") {
            self.league = league;
        }
        if let Some(seasons) = var("SEASONS") {
            let parsed = parse_seasons(&seasons);
            if !parsed.is_empty() {
                self.seasons = parsed;
            }
        }
        if let Some(path) = var("MODEL_PATH") {
            self.model_path = PathBuf::from(path);
        }
        if let Some(path) = var("STATS_PATH") {
            self.stats_path = PathBuf::from(path);
        }
        if let Some(dir) = var("CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(flag) = var("USE_CACHE") {
            self.use_cache = flag == "1";
        }
        self
    }
}

/// Splits a comma separated season list, ignoring blanks
pub fn parse_seasons(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.league, "F1");
        assert_eq!(config.seasons.len(), 6);
        assert_eq!(config.features.rolling_window, 5);
        assert_eq!(config.training.holdout_days, 3);
        assert_eq!(config.training.cv_folds, 5);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("LEAGUE", "E0"),
            ("SEASONS", "2324, 2425,,"),
            ("USE_CACHE", "1"),
            ("STATS_PATH", "/tmp/stats.csv"),
        ]
        .into_iter()
        .collect();

        let config = Config::default().with_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.league, "E0");
        assert_eq!(config.seasons, vec!["2324", "2425"]);
        assert!(config.use_cache);
        assert_eq!(config.stats_path, PathBuf::from("/tmp/stats.csv"));
        assert_eq!(config.model_path, PathBuf::from("models/football_model.json"));
    }
}
