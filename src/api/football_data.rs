use crate::error::{PredictorError, Result as PredictorResult};
use crate::models::{FullTimeResult, MatchRecord, Odds};
use crate::utils::data::{load_season_cache, save_season_cache};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// One row of a football-data.co.uk season file, restricted to the columns we use.
///
/// Every field is optional so that blank trailing lines and abandoned fixtures
/// deserialize cleanly and can be skipped.
#[derive(Debug, Deserialize)]
struct FootballDataRow {
    #[serde(rename = "Date", default)]
    date: Option<String>,
    #[serde(default)]
    season: Option<String>,
    #[serde(rename = "HomeTeam", default)]
    home_team: Option<String>,
    #[serde(rename = "AwayTeam", default)]
    away_team: Option<String>,
    #[serde(rename = "FTHG", default)]
    home_goals: Option<f64>,
    #[serde(rename = "FTAG", default)]
    away_goals: Option<f64>,
    #[serde(rename = "FTR", default)]
    result: Option<String>,
    #[serde(rename = "HST", default)]
    home_shots_on_target: Option<f64>,
    #[serde(rename = "AST", default)]
    away_shots_on_target: Option<f64>,
    #[serde(rename = "HC", default)]
    home_corners: Option<f64>,
    #[serde(rename = "AC", default)]
    away_corners: Option<f64>,
    #[serde(rename = "B365H", default)]
    odds_home: Option<f64>,
    #[serde(rename = "B365D", default)]
    odds_draw: Option<f64>,
    #[serde(rename = "B365A", default)]
    odds_away: Option<f64>,
}

impl FootballDataRow {
    fn into_record(self, season_override: Option<&str>) -> Option<MatchRecord> {
        let season = season_override
            .map(str::to_string)
            .or(self.season)
            .filter(|s| !s.trim().is_empty())?;
        let home_team = non_empty(self.home_team)?;
        let away_team = non_empty(self.away_team)?;

        Some(MatchRecord {
            date: parse_match_date(self.date.as_deref()?)?,
            season,
            home_team,
            away_team,
            home_goals: to_count(self.home_goals?)?,
            away_goals: to_count(self.away_goals?)?,
            result: FullTimeResult::from_code(self.result.as_deref()?)?,
            home_shots_on_target: to_count(self.home_shots_on_target?)?,
            away_shots_on_target: to_count(self.away_shots_on_target?)?,
            home_corners: to_count(self.home_corners?)?,
            away_corners: to_count(self.away_corners?)?,
            // Fixtures without odds still feed the rolling history
            odds: match (
                self.odds_home.and_then(finite),
                self.odds_draw.and_then(finite),
                self.odds_away.and_then(finite),
            ) {
                (Some(home), Some(draw), Some(away)) => Some(Odds { home, draw, away }),
                _ => None,
            },
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn to_count(value: f64) -> Option<u32> {
    if value.is_finite() && value >= 0.0 {
        Some(value.round() as u32)
    } else {
        None
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Parse a day-first date ("14/08/2023" or "14/08/23")
pub fn parse_match_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let year_digits = raw.rsplit('/').next().map_or(0, str::len);
    let format = if year_digits == 2 { "%d/%m/%y" } else { "%d/%m/%Y" };
    NaiveDate::parse_from_str(raw, format).ok()
}

/// Parse a season CSV into match records.
///
/// `season` overrides any `season` column in the file; files without either
/// yield no rows. Rows with missing or malformed required fields are skipped.
pub fn parse_matches<R: Read>(
    reader: R,
    season: Option<&str>,
) -> PredictorResult<Vec<MatchRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    if !headers.iter().any(|h| h.trim_start_matches('\u{feff}') == "HomeTeam") {
        return Err(PredictorError::Parse(
            "season file has no HomeTeam column".to_string(),
        ));
    }

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (line, row) in csv_reader.deserialize::<FootballDataRow>().enumerate() {
        match row.ok().and_then(|row| row.into_record(season)) {
            Some(record) => records.push(record),
            None => {
                skipped += 1;
                debug!("Skipping incomplete row {}", line + 2);
            }
        }
    }

    if skipped > 0 {
        debug!("Skipped {} incomplete rows", skipped);
    }

    Ok(records)
}

pub struct FootballDataClient {
    client: reqwest::Client,
    base_url: String,
    league: String,
}

impl FootballDataClient {
    pub fn new(base_url: impl Into<String>, league: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            league: league.into(),
        }
    }

    pub fn season_url(&self, season: &str) -> String {
        format!(
            "{}/{}/{}.csv",
            self.base_url.trim_end_matches('/'),
            season,
            self.league
        )
    }

    /// Download the raw CSV body for one season
    pub async fn fetch_season_csv(&self, season: &str) -> Result<String> {
        let url = self.season_url(season);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("football-data returned {} for {}", response.status(), url);
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;

        // Older season files are Latin-1; fall back to a lossy decode
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Fetch and parse one season, going through the on-disk cache when given
    pub async fn fetch_season(
        &self,
        season: &str,
        cache_dir: Option<&Path>,
    ) -> Result<Vec<MatchRecord>> {
        let cached = match cache_dir {
            Some(dir) => load_season_cache(dir, &self.league, season).unwrap_or_else(|e| {
                warn!("Ignoring unreadable cache for season {}: {}", season, e);
                None
            }),
            None => None,
        };

        let body = match cached {
            Some(body) => {
                debug!("Loaded season {} from cache", season);
                body
            }
            None => {
                let body = self.fetch_season_csv(season).await?;
                if let Some(dir) = cache_dir {
                    if let Err(e) = save_season_cache(dir, &self.league, season, &body) {
                        warn!("Could not cache season {} in {}: {}", season, dir.display(), e);
                    }
                }
                body
            }
        };

        parse_matches(body.as_bytes(), Some(season))
            .with_context(|| format!("Failed to parse season {}", season))
    }

    /// Fetch every requested season. Unavailable seasons are logged and skipped.
    pub async fn fetch_seasons(
        &self,
        seasons: &[String],
        cache_dir: Option<&Path>,
    ) -> Vec<MatchRecord> {
        let mut all = Vec::new();

        for season in seasons {
            match self.fetch_season(season, cache_dir).await {
                Ok(records) => {
                    info!("Season {} ({}): {} matches", season, self.league, records.len());
                    all.extend(records);
                }
                Err(e) => {
                    warn!("Season {} not available, skipping: {:#}", season, e);
                }
            }
        }

        all
    }
}
