use crate::config::ClassifierConfig;
use crate::error::{PredictorError, Result};
use crate::models::{FeatureVector, FullTimeResult};
use crate::utils::classifier::TrainedModel;
use crate::utils::split::TrainingRow;
use serde::Serialize;
use tracing::{info, warn};

/// Cross-validated accuracy summary
#[derive(Debug, Clone, Serialize)]
pub struct CrossValidation {
    pub fold_accuracies: Vec<f64>,
    pub mean: f64,
    /// Population standard deviation across folds
    pub std: f64,
}

impl CrossValidation {
    fn from_scores(fold_accuracies: Vec<f64>) -> Self {
        let n = fold_accuracies.len().max(1) as f64;
        let mean = fold_accuracies.iter().sum::<f64>() / n;
        let var = fold_accuracies.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n;
        Self {
            fold_accuracies,
            mean,
            std: var.sqrt(),
        }
    }

    /// Half-width of the reported confidence band (2 sigma)
    pub fn band(&self) -> f64 {
        self.std * 2.0
    }
}

/// Rows = actual H/D/A, columns = predicted H/D/A
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix(pub [[usize; 3]; 3]);

impl ConfusionMatrix {
    pub fn record(&mut self, actual: FullTimeResult, predicted: FullTimeResult) {
        self.0[actual.class_index()][predicted.class_index()] += 1;
    }

    pub fn total(&self) -> usize {
        self.0.iter().flatten().sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..3).map(|i| self.0[i][i]).sum();
        correct as f64 / total as f64
    }

    /// Format the matrix as a small text table
    pub fn format(&self) -> String {
        let mut out = String::from("actual\\pred     H     D     A\n");
        for (i, result) in FullTimeResult::ALL.iter().enumerate() {
            out.push_str(&format!(
                "{:>11} {:>5} {:>5} {:>5}\n",
                result.code(),
                self.0[i][0],
                self.0[i][1],
                self.0[i][2]
            ));
        }
        out
    }
}

/// Fold assignment for stratified k-fold without shuffling: each class's
/// rows, in order, are cut into `k` contiguous chunks and fold `i` tests on
/// chunk `i` of every class.
pub fn stratified_folds(targets: &[FullTimeResult], k: usize) -> Vec<usize> {
    let mut folds = vec![0usize; targets.len()];
    for class in FullTimeResult::ALL {
        let members: Vec<usize> = targets
            .iter()
            .enumerate()
            .filter(|(_, t)| **t == class)
            .map(|(i, _)| i)
            .collect();
        let m = members.len();
        let base = m / k;
        let extra = m % k;
        let mut start = 0;
        for fold in 0..k {
            let size = base + usize::from(fold < extra);
            for &idx in &members[start..start + size] {
                folds[idx] = fold;
            }
            start += size;
        }
    }
    folds
}

/// k-fold accuracy of a fresh pipeline per fold. Returns `None` when there are
/// fewer rows than folds.
pub fn cross_validate(
    features: &[FeatureVector],
    targets: &[FullTimeResult],
    k: usize,
    config: &ClassifierConfig,
) -> Result<Option<CrossValidation>> {
    if k < 2 || features.len() < k {
        return Ok(None);
    }

    let folds = stratified_folds(targets, k);
    let mut scores = Vec::with_capacity(k);

    for fold in 0..k {
        let mut train_x = Vec::new();
        let mut train_y = Vec::new();
        let mut test = Vec::new();
        for (i, (x, y)) in features.iter().zip(targets).enumerate() {
            if folds[i] == fold {
                test.push((x, *y));
            } else {
                train_x.push(*x);
                train_y.push(*y);
            }
        }
        if test.is_empty() || train_x.is_empty() {
            continue;
        }

        let model = TrainedModel::fit(&train_x, &train_y, config)?;
        let correct = test.iter().filter(|(x, y)| model.predict(x) == *y).count();
        scores.push(correct as f64 / test.len() as f64);
    }

    if scores.is_empty() {
        return Ok(None);
    }
    Ok(Some(CrossValidation::from_scores(scores)))
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub cross_validation: Option<CrossValidation>,
    pub training_matches: usize,
}

impl TrainingReport {
    pub fn format(&self) -> String {
        let mut out = String::from("--- Model Training Report ---\n");
        match &self.cross_validation {
            Some(cv) => {
                out.push_str(&format!("Cross-Validation Mean Accuracy: {:.4}\n", cv.mean));
                out.push_str(&format!("Confidence Interval: +/- {:.4}\n", cv.band()));
            }
            None => out.push_str("Cross-Validation: skipped (not enough rows)\n"),
        }
        out.push_str(&format!("Total Matches in Training: {}\n", self.training_matches));
        out.push_str(&"-".repeat(30));
        out
    }
}

/// Cross-validate as a diagnostic, then fit the pipeline on every training row
pub fn train_and_validate_model(
    rows: &[TrainingRow],
    cv_folds: usize,
    config: &ClassifierConfig,
) -> Result<(TrainedModel, TrainingReport)> {
    if rows.is_empty() {
        return Err(PredictorError::NoTrainingRows(
            "training split is empty".to_string(),
        ));
    }

    let features: Vec<FeatureVector> = rows.iter().map(|r| r.features).collect();
    let targets: Vec<FullTimeResult> = rows.iter().map(|r| r.target).collect();

    let cross_validation = cross_validate(&features, &targets, cv_folds, config)?;
    match &cross_validation {
        Some(cv) => info!(
            "Cross-validation ({} folds): mean accuracy {:.4} +/- {:.4}",
            cv.fold_accuracies.len(),
            cv.mean,
            cv.band()
        ),
        None => warn!(
            "Only {} training rows, skipping {}-fold cross-validation",
            rows.len(),
            cv_folds
        ),
    }

    let model = TrainedModel::fit(&features, &targets, config)?;
    info!("Fitted model on {} matches", rows.len());

    Ok((
        model,
        TrainingReport {
            cross_validation,
            training_matches: rows.len(),
        },
    ))
}

/// Accuracy and confusion matrix on held-out rows; `None` when there are none
pub fn evaluate_holdout(model: &TrainedModel, rows: &[TrainingRow]) -> Option<ConfusionMatrix> {
    if rows.is_empty() {
        return None;
    }
    let mut matrix = ConfusionMatrix::default();
    for row in rows {
        matrix.record(row.target, model.predict(&row.features));
    }
    Some(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(i: usize, target: FullTimeResult) -> TrainingRow {
        let shift = match target {
            FullTimeResult::Home => 1.0,
            FullTimeResult::Draw => 0.0,
            FullTimeResult::Away => -1.0,
        };
        let jitter = (i % 7) as f64 * 0.03;
        TrainingRow {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            home_team: "A".to_string(),
            away_team: "B".to_string(),
            features: FeatureVector {
                xg_spec_home: 1.2 + shift * 0.6 + jitter,
                xg_spec_away: 1.2 - shift * 0.6 - jitter,
                xga_spec_home: 1.0,
                xga_spec_away: 1.0 + jitter,
                is_start_season: (i % 2) as f64,
                odds_home: 2.6 - shift,
                odds_draw: 3.2,
                odds_away: 2.6 + shift,
            },
            target,
        }
    }

    fn rows(n: usize) -> Vec<TrainingRow> {
        (0..n)
            .map(|i| row(i, FullTimeResult::ALL[i % 3]))
            .collect()
    }

    #[test]
    fn test_stratified_folds_balance_classes() {
        let targets: Vec<FullTimeResult> = (0..30).map(|i| FullTimeResult::ALL[i % 3]).collect();
        let folds = stratified_folds(&targets, 5);
        for fold in 0..5 {
            for class in FullTimeResult::ALL {
                let count = folds
                    .iter()
                    .zip(&targets)
                    .filter(|(f, t)| **f == fold && **t == class)
                    .count();
                assert_eq!(count, 2);
            }
        }
    }

    #[test]
    fn test_stratified_folds_uneven_class_sizes() {
        let targets = vec![
            FullTimeResult::Home,
            FullTimeResult::Home,
            FullTimeResult::Home,
            FullTimeResult::Draw,
        ];
        let folds = stratified_folds(&targets, 2);
        assert_eq!(folds, vec![0, 0, 1, 0]);
    }

    #[test]
    fn test_train_and_validate_reports_cv() {
        let data = rows(60);
        let (model, report) =
            train_and_validate_model(&data, 5, &ClassifierConfig::default()).unwrap();
        let cv = report.cross_validation.as_ref().expect("cv should run");
        assert_eq!(cv.fold_accuracies.len(), 5);
        assert!(cv.mean > 0.8);
        assert_eq!(report.training_matches, 60);
        assert_eq!(model.training_rows, 60);
        assert!(report.format().contains("Total Matches in Training: 60"));
    }

    #[test]
    fn test_cv_skipped_with_too_few_rows() {
        let data = rows(3);
        let (_, report) = train_and_validate_model(&data, 5, &ClassifierConfig::default()).unwrap();
        assert!(report.cross_validation.is_none());
    }

    #[test]
    fn test_training_fails_on_zero_rows() {
        let err = train_and_validate_model(&[], 5, &ClassifierConfig::default()).unwrap_err();
        assert!(matches!(err, PredictorError::NoTrainingRows(_)));
    }

    #[test]
    fn test_holdout_confusion_matrix() {
        let data = rows(60);
        let (model, _) = train_and_validate_model(&data, 5, &ClassifierConfig::default()).unwrap();
        let matrix = evaluate_holdout(&model, &data[..9]).unwrap();
        assert_eq!(matrix.total(), 9);
        assert!(matrix.accuracy() > 0.5);
        assert!(evaluate_holdout(&model, &[]).is_none());
    }

    #[test]
    fn test_confusion_matrix_accuracy() {
        let mut m = ConfusionMatrix::default();
        m.record(FullTimeResult::Home, FullTimeResult::Home);
        m.record(FullTimeResult::Draw, FullTimeResult::Home);
        m.record(FullTimeResult::Away, FullTimeResult::Away);
        m.record(FullTimeResult::Away, FullTimeResult::Draw);
        assert_eq!(m.total(), 4);
        assert!((m.accuracy() - 0.5).abs() < 1e-12);
        assert!(m.format().contains("A"));
    }
}
