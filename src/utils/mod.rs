pub mod classifier;
pub mod data;
pub mod features;
pub mod serving;
pub mod split;
pub mod training;

pub use classifier::TrainedModel;
pub use serving::{OddsInput, Prediction, PredictionRequest, Predictor};
