use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Full-time result of a fixture, coded H/D/A in the source data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FullTimeResult {
    #[serde(rename = "H")]
    Home,
    #[serde(rename = "D")]
    Draw,
    #[serde(rename = "A")]
    Away,
}

impl FullTimeResult {
    /// Class order used by the classifier: 0 = home win, 1 = draw, 2 = away win
    pub const ALL: [FullTimeResult; 3] = [
        FullTimeResult::Home,
        FullTimeResult::Draw,
        FullTimeResult::Away,
    ];

    pub fn class_index(self) -> usize {
        match self {
            FullTimeResult::Home => 0,
            FullTimeResult::Draw => 1,
            FullTimeResult::Away => 2,
        }
    }

    pub fn from_class_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "H" => Some(FullTimeResult::Home),
            "D" => Some(FullTimeResult::Draw),
            "A" => Some(FullTimeResult::Away),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            FullTimeResult::Home => "H",
            FullTimeResult::Draw => "D",
            FullTimeResult::Away => "A",
        }
    }
}

impl fmt::Display for FullTimeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FullTimeResult::Home => write!(f, "Home win"),
            FullTimeResult::Draw => write!(f, "Draw"),
            FullTimeResult::Away => write!(f, "Away win"),
        }
    }
}

/// Decimal bookmaker odds for the three outcomes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Odds {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

/// One historical fixture as ingested from a season file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub date: NaiveDate,
    pub season: String,
    pub home_team: String,
    pub away_team: String,
    pub home_goals: u32,
    pub away_goals: u32,
    pub result: FullTimeResult,
    pub home_shots_on_target: u32,
    pub away_shots_on_target: u32,
    pub home_corners: u32,
    pub away_corners: u32,
    /// Bet365 closing odds; `None` when the season file left any of them blank
    pub odds: Option<Odds>,
}

/// Trailing-window averages for one team in one role.
///
/// `None` means the team had fewer prior matches in that role than the window
/// requires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamRollingProfile {
    pub shots_on_target_mean: Option<f64>,
    pub conversion_mean: Option<f64>,
    pub shots_allowed_mean: Option<f64>,
    pub conversion_allowed_mean: Option<f64>,
    pub corners_mean: Option<f64>,
}

impl TeamRollingProfile {
    /// Scoring threat: mean shots on target x mean conversion rate
    pub fn expected_goals(&self) -> Option<f64> {
        Some(self.shots_on_target_mean? * self.conversion_mean?)
    }

    /// Conceding threat: mean shots allowed x mean conversion allowed
    pub fn expected_goals_allowed(&self) -> Option<f64> {
        Some(self.shots_allowed_mean? * self.conversion_allowed_mean?)
    }
}

/// A match record together with every column derived by feature engineering
#[derive(Debug, Clone, PartialEq)]
pub struct MatchFeatures {
    pub record: MatchRecord,
    /// Clipped home conversion rate (goals per shot on target)
    pub conv_home: f64,
    /// Clipped away conversion rate
    pub conv_away: f64,
    /// 1-based count of the home team's home matches this season
    pub match_number: usize,
    pub is_start_season: bool,
    /// Home team's profile in the home role, before this match
    pub home_profile: TeamRollingProfile,
    /// Away team's profile in the away role, before this match
    pub away_profile: TeamRollingProfile,
}

impl MatchFeatures {
    pub fn xg_spec_home(&self) -> Option<f64> {
        self.home_profile.expected_goals()
    }

    pub fn xg_spec_away(&self) -> Option<f64> {
        self.away_profile.expected_goals()
    }

    pub fn xga_spec_home(&self) -> Option<f64> {
        self.home_profile.expected_goals_allowed()
    }

    pub fn xga_spec_away(&self) -> Option<f64> {
        self.away_profile.expected_goals_allowed()
    }

    /// Model input for this row, or `None` if any rolling feature or odds
    /// value is undefined
    pub fn feature_vector(&self) -> Option<FeatureVector> {
        FeatureVector::from_profiles(
            &self.home_profile,
            &self.away_profile,
            self.is_start_season,
            self.record.odds?,
        )
        .ok()
    }
}

/// The classifier's input row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    #[serde(rename = "xG_Spec_H")]
    pub xg_spec_home: f64,
    #[serde(rename = "xG_Spec_A")]
    pub xg_spec_away: f64,
    #[serde(rename = "xGA_Spec_H")]
    pub xga_spec_home: f64,
    #[serde(rename = "xGA_Spec_A")]
    pub xga_spec_away: f64,
    #[serde(rename = "Is_start_season")]
    pub is_start_season: f64,
    #[serde(rename = "B365H")]
    pub odds_home: f64,
    #[serde(rename = "B365D")]
    pub odds_draw: f64,
    #[serde(rename = "B365A")]
    pub odds_away: f64,
}

impl FeatureVector {
    pub const LEN: usize = 8;

    /// Column names in the order of [`FeatureVector::to_array`]
    pub const NAMES: [&'static str; FeatureVector::LEN] = [
        "xG_Spec_H",
        "xG_Spec_A",
        "xGA_Spec_H",
        "xGA_Spec_A",
        "Is_start_season",
        "B365H",
        "B365D",
        "B365A",
    ];

    /// Builds the vector from the home team's home-role profile and the away
    /// team's away-role profile. Training rows and serving requests both go
    /// through here.
    ///
    /// On failure returns the name of the first undefined profile field.
    pub fn from_profiles(
        home: &TeamRollingProfile,
        away: &TeamRollingProfile,
        is_start_season: bool,
        odds: Odds,
    ) -> Result<Self, &'static str> {
        let xg_spec_home = home.expected_goals().ok_or_else(|| {
            missing_field(home.shots_on_target_mean, "HST_mean_h", "conv_mean_h")
        })?;
        let xg_spec_away = away.expected_goals().ok_or_else(|| {
            missing_field(away.shots_on_target_mean, "AST_mean_a", "conv_mean_a")
        })?;
        let xga_spec_home = home.expected_goals_allowed().ok_or_else(|| {
            missing_field(
                home.shots_allowed_mean,
                "HST_allowed_mean_h",
                "conv_allowed_mean_h",
            )
        })?;
        let xga_spec_away = away.expected_goals_allowed().ok_or_else(|| {
            missing_field(
                away.shots_allowed_mean,
                "AST_allowed_mean_a",
                "conv_allowed_mean_a",
            )
        })?;

        Ok(Self {
            xg_spec_home,
            xg_spec_away,
            xga_spec_home,
            xga_spec_away,
            is_start_season: if is_start_season { 1.0 } else { 0.0 },
            odds_home: odds.home,
            odds_draw: odds.draw,
            odds_away: odds.away,
        })
    }

    pub fn to_array(&self) -> [f64; FeatureVector::LEN] {
        [
            self.xg_spec_home,
            self.xg_spec_away,
            self.xga_spec_home,
            self.xga_spec_away,
            self.is_start_season,
            self.odds_home,
            self.odds_draw,
            self.odds_away,
        ]
    }
}

fn missing_field(
    shots: Option<f64>,
    shots_name: &'static str,
    conv_name: &'static str,
) -> &'static str {
    if shots.is_none() {
        shots_name
    } else {
        conv_name
    }
}

/// Serving-time snapshot of a team's most recent rolling profile.
///
/// Field names match the columns of the persisted stats table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestTeamStats {
    #[serde(rename = "Team")]
    pub team: String,
    #[serde(rename = "HST_mean_h")]
    pub hst_mean_h: Option<f64>,
    #[serde(rename = "conv_mean_h")]
    pub conv_mean_h: Option<f64>,
    #[serde(rename = "HST_allowed_mean_h")]
    pub hst_allowed_mean_h: Option<f64>,
    #[serde(rename = "conv_allowed_mean_h")]
    pub conv_allowed_mean_h: Option<f64>,
    #[serde(rename = "AST_mean_a")]
    pub ast_mean_a: Option<f64>,
    #[serde(rename = "conv_mean_a")]
    pub conv_mean_a: Option<f64>,
    #[serde(rename = "AST_allowed_mean_a")]
    pub ast_allowed_mean_a: Option<f64>,
    #[serde(rename = "conv_allowed_mean_a")]
    pub conv_allowed_mean_a: Option<f64>,
    #[serde(rename = "HC_mean_h")]
    pub hc_mean_h: Option<f64>,
    #[serde(rename = "AC_mean_a")]
    pub ac_mean_a: Option<f64>,
}

impl LatestTeamStats {
    pub fn from_profiles(
        team: &str,
        home: &TeamRollingProfile,
        away: &TeamRollingProfile,
    ) -> Self {
        Self {
            team: team.to_string(),
            hst_mean_h: home.shots_on_target_mean,
            conv_mean_h: home.conversion_mean,
            hst_allowed_mean_h: home.shots_allowed_mean,
            conv_allowed_mean_h: home.conversion_allowed_mean,
            ast_mean_a: away.shots_on_target_mean,
            conv_mean_a: away.conversion_mean,
            ast_allowed_mean_a: away.shots_allowed_mean,
            conv_allowed_mean_a: away.conversion_allowed_mean,
            hc_mean_h: home.corners_mean,
            ac_mean_a: away.corners_mean,
        }
    }

    pub fn home_profile(&self) -> TeamRollingProfile {
        TeamRollingProfile {
            shots_on_target_mean: self.hst_mean_h,
            conversion_mean: self.conv_mean_h,
            shots_allowed_mean: self.hst_allowed_mean_h,
            conversion_allowed_mean: self.conv_allowed_mean_h,
            corners_mean: self.hc_mean_h,
        }
    }

    pub fn away_profile(&self) -> TeamRollingProfile {
        TeamRollingProfile {
            shots_on_target_mean: self.ast_mean_a,
            conversion_mean: self.conv_mean_a,
            shots_allowed_mean: self.ast_allowed_mean_a,
            conversion_allowed_mean: self.conv_allowed_mean_a,
            corners_mean: self.ac_mean_a,
        }
    }
}

/// Class probabilities ordered home, draw, away
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeProbabilities {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl OutcomeProbabilities {
    pub fn from_array(probs: [f64; 3]) -> Self {
        Self {
            home: probs[0],
            draw: probs[1],
            away: probs[2],
        }
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.home, self.draw, self.away]
    }

    pub fn sum(&self) -> f64 {
        self.home + self.draw + self.away
    }

    /// Most likely outcome and its probability; ties resolve towards home
    pub fn most_likely(&self) -> (FullTimeResult, f64) {
        let mut best = (FullTimeResult::Home, self.home);
        for (outcome, p) in [
            (FullTimeResult::Draw, self.draw),
            (FullTimeResult::Away, self.away),
        ] {
            if p > best.1 {
                best = (outcome, p);
            }
        }
        best
    }

    /// Format the probabilities as a readable string
    pub fn format(&self) -> String {
        format!(
            "Home: {:.1}% | Draw: {:.1}% | Away: {:.1}%",
            self.home * 100.0,
            self.draw * 100.0,
            self.away * 100.0
        )
    }
}
