use crate::api::football_data::parse_matches;
use crate::error::Result;
use crate::models::{LatestTeamStats, MatchRecord};
use crate::utils::classifier::TrainedModel;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;

fn season_cache_file(cache_dir: &Path, league: &str, season: &str) -> PathBuf {
    cache_dir.join(format!("{}_{}.csv", league, season))
}

/// Save a raw season CSV body to the cache directory
pub fn save_season_cache(cache_dir: &Path, league: &str, season: &str, body: &str) -> Result<()> {
    std::fs::create_dir_all(cache_dir)?;
    std::fs::write(season_cache_file(cache_dir, league, season), body)?;
    Ok(())
}

/// Load a cached season body, `None` if it was never cached
pub fn load_season_cache(cache_dir: &Path, league: &str, season: &str) -> Result<Option<String>> {
    let path = season_cache_file(cache_dir, league, season);
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(std::fs::read_to_string(path)?))
}

/// Load match history from a local CSV carrying a `season` column
pub fn load_matches_from_csv(path: &Path) -> Result<Vec<MatchRecord>> {
    let file = File::open(path)?;
    parse_matches(BufReader::new(file), None)
}

/// An artifact written next to its destination, moved into place on commit
#[derive(Debug)]
pub struct StagedArtifact {
    staging: PathBuf,
    target: PathBuf,
}

impl StagedArtifact {
    fn new(target: &Path) -> Result<Self> {
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut staging = target.as_os_str().to_owned();
        staging.push(".tmp");
        Ok(Self {
            staging: PathBuf::from(staging),
            target: target.to_path_buf(),
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Replace the destination with the staged file
    pub fn commit(self) -> Result<PathBuf> {
        std::fs::rename(&self.staging, &self.target)?;
        debug!("Wrote {}", self.target.display());
        Ok(self.target)
    }

    /// Remove the staged file, leaving the destination untouched
    pub fn discard(self) {
        let _ = std::fs::remove_file(&self.staging);
    }
}

/// Serialize the trained pipeline to a staging file next to `path`
pub fn stage_model(model: &TrainedModel, path: &Path) -> Result<StagedArtifact> {
    let staged = StagedArtifact::new(path)?;
    let json = serde_json::to_string_pretty(model)?;
    std::fs::write(&staged.staging, json)?;
    Ok(staged)
}

/// Load a trained pipeline and verify it matches the current feature schema
pub fn load_model(path: &Path) -> Result<TrainedModel> {
    let json = std::fs::read_to_string(path)?;
    let model: TrainedModel = serde_json::from_str(&json)?;
    model.check_schema()?;
    Ok(model)
}

/// Write the per-team stats table to a staging file next to `path`
pub fn stage_latest_stats(stats: &[LatestTeamStats], path: &Path) -> Result<StagedArtifact> {
    let staged = StagedArtifact::new(path)?;
    let mut writer = csv::Writer::from_path(&staged.staging)?;
    for row in stats {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(staged)
}

pub fn load_latest_stats(path: &Path) -> Result<Vec<LatestTeamStats>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut stats = Vec::new();
    for row in reader.deserialize() {
        stats.push(row?);
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn stats_row(team: &str, hst: Option<f64>) -> LatestTeamStats {
        LatestTeamStats {
            team: team.to_string(),
            hst_mean_h: hst,
            conv_mean_h: Some(0.3),
            hst_allowed_mean_h: Some(4.0),
            conv_allowed_mean_h: Some(0.25),
            ast_mean_a: Some(3.0),
            conv_mean_a: Some(0.2),
            ast_allowed_mean_a: Some(5.0),
            conv_allowed_mean_a: Some(0.35),
            hc_mean_h: Some(5.4),
            ac_mean_a: None,
        }
    }

    #[test]
    fn test_latest_stats_csv_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("latest_team_stats.csv");
        let rows = vec![stats_row("Lens", Some(5.0)), stats_row("Brest", None)];

        let staged = stage_latest_stats(&rows, &path).unwrap();
        assert!(!path.exists());
        staged.commit().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(
            header,
            concat!(
                "Team,HST_mean_h,conv_mean_h,HST_allowed_mean_h,conv_allowed_mean_h,",
                "AST_mean_a,conv_mean_a,AST_allowed_mean_a,conv_allowed_mean_a,",
                "HC_mean_h,AC_mean_a"
            )
        );

        let loaded = load_latest_stats(&path).unwrap();
        assert_eq!(loaded, rows);
    }

    #[test]
    fn test_discarded_artifact_keeps_previous_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latest_team_stats.csv");
        std::fs::write(&path, "previous").unwrap();

        let staged = stage_latest_stats(&[stats_row("Lens", Some(5.0))], &path).unwrap();
        staged.discard();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous");
    }

    #[test]
    fn test_season_cache() {
        let dir = tempdir().unwrap();
        assert_eq!(load_season_cache(dir.path(), "F1", "2324").unwrap(), None);
        save_season_cache(dir.path(), "F1", "2324", "Date,HomeTeam\n").unwrap();
        assert_eq!(
            load_season_cache(dir.path(), "F1", "2324").unwrap().as_deref(),
            Some("Date,HomeTeam\n")
        );
    }

    #[test]
    fn test_load_matches_from_csv() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "Date,season,HomeTeam,AwayTeam,FTHG,FTAG,FTR,HST,AST,HC,AC,B365H,B365D,B365A"
        )
        .unwrap();
        writeln!(file, "18/08/2024,2425,Lens,Brest,2,0,H,5,2,6,3,2.0,3.4,3.8").unwrap();
        let records = load_matches_from_csv(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].home_team, "Lens");
    }
}
