pub mod batch;
pub mod config;
pub mod encoding;
pub mod error;
pub mod eval;
pub mod layers;
pub mod mnist_dataset;
pub mod model;
pub mod optim;
pub mod run;
pub mod train;

pub use error::{Error, Result};
