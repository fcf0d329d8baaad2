//! Training configuration.
//!
//! A `TrainingConfig` can be read from a JSON file, every field being optional
//! and falling back to its default:
//!
//! ```json
//! {
//!   "hidden_units": 32,
//!   "optimizer": "adam",
//!   "learning_rate": 0.001,
//!   "batch_size": 60000,
//!   "epochs": 500
//! }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    #[default]
    Sgd,
    Adam,
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerKind::Sgd => write!(f, "sgd"),
            OptimizerKind::Adam => write!(f, "adam"),
        }
    }
}

impl FromStr for OptimizerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sgd" => Ok(OptimizerKind::Sgd),
            "adam" => Ok(OptimizerKind::Adam),
            other => Err(format!("unknown optimizer '{other}', expected sgd or adam")),
        }
    }
}

/// Activation applied after every hidden dense layer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Identity,
    #[default]
    Relu,
}

impl FromStr for Activation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "identity" => Ok(Activation::Identity),
            "relu" => Ok(Activation::Relu),
            other => Err(format!("unknown activation '{other}', expected relu or identity")),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    /// 0 means a single dense layer straight to the classes.
    pub hidden_units: usize,
    pub hidden_activation: Activation,
    pub learning_rate: f32,
    pub optimizer: OptimizerKind,
    pub adam_beta1: f32,
    pub adam_beta2: f32,
    pub adam_epsilon: f32,
    pub batch_size: usize,
    pub epochs: usize,
    /// Seeds weight initialisation and batch shuffling.
    pub seed: u64,
    pub shuffle: bool,
    pub eval_batch_size: usize,
    /// Compute train/test accuracy after every epoch, not only at the end.
    pub eval_every_epoch: bool,
    pub checkpoint_folder: Option<String>,
    pub checkpoint_stride: usize, // every how many epochs do we checkpoint
    pub loss_csv_path: Option<String>,
    pub data_dir: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            hidden_units: 0,
            hidden_activation: Activation::Relu,
            learning_rate: 0.1,
            optimizer: OptimizerKind::Sgd,
            adam_beta1: 0.9,
            adam_beta2: 0.999,
            adam_epsilon: 1e-8,
            batch_size: 128,
            epochs: 10,
            seed: 42,
            shuffle: true,
            eval_batch_size: 1000,
            eval_every_epoch: false,
            checkpoint_folder: None,
            checkpoint_stride: 1,
            loss_csv_path: None,
            data_dir: "data/".to_string(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        if self.eval_batch_size == 0 {
            return Err(Error::Config("eval_batch_size must be at least 1".into()));
        }
        if self.epochs == 0 {
            return Err(Error::Config("epochs must be at least 1".into()));
        }
        if self.checkpoint_stride == 0 {
            return Err(Error::Config("checkpoint_stride must be at least 1".into()));
        }
        for (name, beta) in [("adam_beta1", self.adam_beta1), ("adam_beta2", self.adam_beta2)] {
            if !(0.0..1.0).contains(&beta) {
                return Err(Error::Config(format!("{name} must be in [0, 1), got {beta}")));
            }
        }
        if self.adam_epsilon.is_nan() || self.adam_epsilon <= 0.0 {
            return Err(Error::Config("adam_epsilon must be positive".into()));
        }
        Ok(())
    }
}

/// Read a JSON config file and validate it.
pub fn load_config(path: impl AsRef<Path>) -> Result<TrainingConfig> {
    let contents = fs::read_to_string(path)?;
    let config: TrainingConfig = serde_json::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}
