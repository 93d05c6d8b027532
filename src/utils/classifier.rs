use crate::config::ClassifierConfig;
use crate::error::{PredictorError, Result};
use crate::models::{FeatureVector, FullTimeResult, OutcomeProbabilities};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const FEATURE_COUNT: usize = FeatureVector::LEN;
pub const CLASS_COUNT: usize = 3;

/// Per-column standardisation fitted on training features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: [f64; FEATURE_COUNT],
    pub scale: [f64; FEATURE_COUNT],
}

impl StandardScaler {
    /// Population mean and standard deviation; constant columns get unit scale
    pub fn fit(rows: &[[f64; FEATURE_COUNT]]) -> Self {
        let mut mean = [0.0; FEATURE_COUNT];
        let mut scale = [1.0; FEATURE_COUNT];
        if rows.is_empty() {
            return Self { mean, scale };
        }

        let n = rows.len() as f64;
        for row in rows {
            for j in 0..FEATURE_COUNT {
                mean[j] += row[j];
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut var = [0.0; FEATURE_COUNT];
        for row in rows {
            for j in 0..FEATURE_COUNT {
                let d = row[j] - mean[j];
                var[j] += d * d;
            }
        }
        for j in 0..FEATURE_COUNT {
            let std = (var[j] / n).sqrt();
            scale[j] = if std > 1e-12 { std } else { 1.0 };
        }

        Self { mean, scale }
    }

    pub fn transform(&self, row: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for j in 0..FEATURE_COUNT {
            out[j] = (row[j] - self.mean[j]) / self.scale[j];
        }
        out
    }
}

/// Softmax regression over the three full-time outcomes with an L2 penalty
/// on the weights (intercepts are not penalised)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultinomialLogisticRegression {
    pub coefficients: [[f64; FEATURE_COUNT]; CLASS_COUNT],
    pub intercepts: [f64; CLASS_COUNT],
}

impl MultinomialLogisticRegression {
    fn zeros() -> Self {
        Self {
            coefficients: [[0.0; FEATURE_COUNT]; CLASS_COUNT],
            intercepts: [0.0; CLASS_COUNT],
        }
    }

    /// Full-batch gradient descent with step halving whenever the objective
    /// would increase
    pub fn fit(
        x: &[[f64; FEATURE_COUNT]],
        y: &[usize],
        config: &ClassifierConfig,
    ) -> Result<Self> {
        if x.is_empty() {
            return Err(PredictorError::NoTrainingRows(
                "cannot fit a classifier on zero rows".to_string(),
            ));
        }
        if x.len() != y.len() {
            return Err(PredictorError::Parse(format!(
                "feature rows ({}) and targets ({}) differ in length",
                x.len(),
                y.len()
            )));
        }
        if let Some(bad) = y.iter().find(|&&c| c >= CLASS_COUNT) {
            return Err(PredictorError::Parse(format!("target class {} out of range", bad)));
        }

        let n = x.len() as f64;
        let l2 = 1.0 / (config.c.max(1e-12) * n);
        let mut model = Self::zeros();
        let mut loss = model.objective(x, y, l2);
        let mut lr = config.learning_rate;
        let mut iterations = 0usize;

        for iter in 0..config.max_iter {
            iterations = iter + 1;
            let (grad_w, grad_b) = model.gradient(x, y, l2);

            let max_grad = grad_w
                .iter()
                .flatten()
                .chain(grad_b.iter())
                .fold(0.0_f64, |acc, g| acc.max(g.abs()));
            if max_grad < config.tolerance {
                break;
            }

            loop {
                let candidate = model.step(&grad_w, &grad_b, lr);
                let candidate_loss = candidate.objective(x, y, l2);
                if candidate_loss <= loss || lr < 1e-10 {
                    model = candidate;
                    loss = candidate_loss;
                    break;
                }
                lr *= 0.5;
            }
        }

        debug!(
            "Logistic regression finished after {} iterations (objective {:.5}, step {:.4})",
            iterations, loss, lr
        );
        Ok(model)
    }

    fn step(
        &self,
        grad_w: &[[f64; FEATURE_COUNT]; CLASS_COUNT],
        grad_b: &[f64; CLASS_COUNT],
        lr: f64,
    ) -> Self {
        let mut next = self.clone();
        for k in 0..CLASS_COUNT {
            for j in 0..FEATURE_COUNT {
                next.coefficients[k][j] -= lr * grad_w[k][j];
            }
            next.intercepts[k] -= lr * grad_b[k];
        }
        next
    }

    fn gradient(
        &self,
        x: &[[f64; FEATURE_COUNT]],
        y: &[usize],
        l2: f64,
    ) -> ([[f64; FEATURE_COUNT]; CLASS_COUNT], [f64; CLASS_COUNT]) {
        let mut grad_w = [[0.0; FEATURE_COUNT]; CLASS_COUNT];
        let mut grad_b = [0.0; CLASS_COUNT];
        let n = x.len() as f64;

        for (row, &target) in x.iter().zip(y) {
            let p = self.predict_proba(row);
            for k in 0..CLASS_COUNT {
                let err = p[k] - if k == target { 1.0 } else { 0.0 };
                grad_b[k] += err;
                for j in 0..FEATURE_COUNT {
                    grad_w[k][j] += err * row[j];
                }
            }
        }

        for k in 0..CLASS_COUNT {
            grad_b[k] /= n;
            for j in 0..FEATURE_COUNT {
                grad_w[k][j] = grad_w[k][j] / n + l2 * self.coefficients[k][j];
            }
        }
        (grad_w, grad_b)
    }

    /// Mean cross-entropy plus the L2 term
    fn objective(&self, x: &[[f64; FEATURE_COUNT]], y: &[usize], l2: f64) -> f64 {
        let mut sum = 0.0;
        for (row, &target) in x.iter().zip(y) {
            sum += -self.predict_proba(row)[target].max(1e-300).ln();
        }
        let penalty: f64 = self.coefficients.iter().flatten().map(|w| w * w).sum();
        sum / x.len() as f64 + 0.5 * l2 * penalty
    }

    pub fn predict_proba(&self, row: &[f64; FEATURE_COUNT]) -> [f64; CLASS_COUNT] {
        let mut logits = self.intercepts;
        for k in 0..CLASS_COUNT {
            logits[k] += dot(&self.coefficients[k], row);
        }
        softmax(logits)
    }
}

fn dot(a: &[f64; FEATURE_COUNT], b: &[f64; FEATURE_COUNT]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn softmax(logits: [f64; CLASS_COUNT]) -> [f64; CLASS_COUNT] {
    let mx = logits.iter().fold(f64::NEG_INFINITY, |acc, &l| acc.max(l));
    let mut out = [0.0; CLASS_COUNT];
    let mut den = 0.0;
    for k in 0..CLASS_COUNT {
        out[k] = (logits[k] - mx).exp();
        den += out[k];
    }
    for p in &mut out {
        *p /= den;
    }
    out
}

/// Fitted scaler + classifier, the persisted model artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub feature_names: Vec<String>,
    /// Result codes in class-index order
    pub classes: Vec<String>,
    pub scaler: StandardScaler,
    pub classifier: MultinomialLogisticRegression,
    pub trained_at: DateTime<Utc>,
    pub training_rows: usize,
}

impl TrainedModel {
    pub fn fit(
        features: &[FeatureVector],
        targets: &[FullTimeResult],
        config: &ClassifierConfig,
    ) -> Result<Self> {
        let raw: Vec<[f64; FEATURE_COUNT]> = features.iter().map(FeatureVector::to_array).collect();
        let scaler = StandardScaler::fit(&raw);
        let scaled: Vec<[f64; FEATURE_COUNT]> = raw.iter().map(|r| scaler.transform(r)).collect();
        let y: Vec<usize> = targets.iter().map(|t| t.class_index()).collect();

        let classifier = MultinomialLogisticRegression::fit(&scaled, &y, config)?;

        Ok(Self {
            feature_names: FeatureVector::NAMES.iter().map(|s| s.to_string()).collect(),
            classes: FullTimeResult::ALL.iter().map(|c| c.code().to_string()).collect(),
            scaler,
            classifier,
            trained_at: Utc::now(),
            training_rows: features.len(),
        })
    }

    /// Fails if the artifact was built for a different feature layout
    pub fn check_schema(&self) -> Result<()> {
        let expected: Vec<String> = FeatureVector::NAMES.iter().map(|s| s.to_string()).collect();
        let classes: Vec<String> = FullTimeResult::ALL
            .iter()
            .map(|c| c.code().to_string())
            .collect();
        if self.feature_names != expected {
            return Err(PredictorError::FeatureSchemaMismatch {
                expected,
                found: self.feature_names.clone(),
            });
        }
        if self.classes != classes {
            return Err(PredictorError::FeatureSchemaMismatch {
                expected: classes,
                found: self.classes.clone(),
            });
        }
        Ok(())
    }

    pub fn predict_proba(&self, features: &FeatureVector) -> OutcomeProbabilities {
        let scaled = self.scaler.transform(&features.to_array());
        OutcomeProbabilities::from_array(self.classifier.predict_proba(&scaled))
    }

    pub fn predict(&self, features: &FeatureVector) -> FullTimeResult {
        self.predict_proba(features).most_likely().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(xg_h: f64, xg_a: f64, odds_h: f64, odds_a: f64) -> FeatureVector {
        FeatureVector {
            xg_spec_home: xg_h,
            xg_spec_away: xg_a,
            xga_spec_home: xg_a * 0.8,
            xga_spec_away: xg_h * 0.8,
            is_start_season: 0.0,
            odds_home: odds_h,
            odds_draw: 3.3,
            odds_away: odds_a,
        }
    }

    /// Home favourites win, away favourites lose, balanced games draw
    fn separable_dataset() -> (Vec<FeatureVector>, Vec<FullTimeResult>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..30 {
            let jitter = (i % 5) as f64 * 0.05;
            x.push(vector(2.0 + jitter, 0.6, 1.4 + jitter, 6.0));
            y.push(FullTimeResult::Home);
            x.push(vector(1.1 + jitter, 1.1, 2.8, 2.8 - jitter));
            y.push(FullTimeResult::Draw);
            x.push(vector(0.6, 2.0 + jitter, 6.0, 1.4 + jitter));
            y.push(FullTimeResult::Away);
        }
        (x, y)
    }

    #[test]
    fn test_scaler_standardises_columns() {
        let rows = vec![[1.0; FEATURE_COUNT], [3.0; FEATURE_COUNT]];
        let scaler = StandardScaler::fit(&rows);
        assert_eq!(scaler.mean, [2.0; FEATURE_COUNT]);
        assert_eq!(scaler.scale, [1.0; FEATURE_COUNT]);
        assert_eq!(scaler.transform(&rows[1]), [1.0; FEATURE_COUNT]);

        let constant = vec![[5.0; FEATURE_COUNT]; 4];
        let scaler = StandardScaler::fit(&constant);
        assert_eq!(scaler.scale, [1.0; FEATURE_COUNT]);
        assert_eq!(scaler.transform(&constant[0]), [0.0; FEATURE_COUNT]);
    }

    #[test]
    fn test_fit_learns_separable_outcomes() {
        let (x, y) = separable_dataset();
        let model = TrainedModel::fit(&x, &y, &ClassifierConfig::default()).unwrap();

        let correct = x
            .iter()
            .zip(&y)
            .filter(|(v, t)| model.predict(v) == **t)
            .count();
        assert!(correct as f64 / x.len() as f64 > 0.9, "accuracy {}/{}", correct, x.len());
        assert_eq!(model.training_rows, 90);
        model.check_schema().unwrap();
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = separable_dataset();
        let model = TrainedModel::fit(&x, &y, &ClassifierConfig::default()).unwrap();
        for v in x.iter().chain([vector(50.0, -3.0, 1.01, 400.0)].iter()) {
            let p = model.predict_proba(v);
            assert!((p.sum() - 1.0).abs() < 1e-6);
            for value in p.to_array() {
                assert!((0.0..=1.0).contains(&value));
            }
        }
    }

    #[test]
    fn test_fit_rejects_empty_input() {
        let err = TrainedModel::fit(&[], &[], &ClassifierConfig::default()).unwrap_err();
        assert!(matches!(err, PredictorError::NoTrainingRows(_)));
    }

    #[test]
    fn test_schema_check_detects_drift() {
        let (x, y) = separable_dataset();
        let mut model = TrainedModel::fit(&x, &y, &ClassifierConfig::default()).unwrap();
        model.feature_names.swap(0, 1);
        assert!(matches!(
            model.check_schema(),
            Err(PredictorError::FeatureSchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_model_survives_json_round_trip() {
        let (x, y) = separable_dataset();
        let model = TrainedModel::fit(&x, &y, &ClassifierConfig::default()).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let loaded: TrainedModel = serde_json::from_str(&json).unwrap();
        let p1 = model.predict_proba(&x[0]);
        let p2 = loaded.predict_proba(&x[0]);
        assert!((p1.home - p2.home).abs() < 1e-12);
    }
}
