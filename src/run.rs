use crate::encoding::{argmax, FeatureEncoder};
use crate::error::{Error, Result};
use crate::mnist_dataset::{MNIST_HEIGHT, MNIST_WIDTH};
use crate::model::{Module, NN};
use ndarray::prelude::*;
use std::fs;

#[derive(Debug, Clone)]
pub struct Prediction {
    pub label: usize,
    pub probabilities: Vec<f32>,
}

/// Classify one raw greyscale image (28x28 bytes, row-major).
pub fn classify_bytes(nn: &NN, image_bytes: &[u8]) -> Result<Prediction> {
    if image_bytes.len() != MNIST_HEIGHT * MNIST_WIDTH {
        return Err(Error::shape(
            "raw image bytes",
            MNIST_HEIGHT * MNIST_WIDTH,
            image_bytes.len(),
        ));
    }

    let grid = Array2::from_shape_vec(
        (MNIST_HEIGHT, MNIST_WIDTH),
        image_bytes.iter().map(|&x| x as f32).collect(),
    )?;
    let input = FeatureEncoder::flatten(grid.view(), 255.0).insert_axis(Axis(0));

    let output = nn.infer(input.view())?;
    let probs = output.row(0);
    Ok(Prediction {
        label: argmax(probs),
        probabilities: probs.to_vec(),
    })
}

/// Run inference using a loaded neural network
pub fn run(checkpoint_path: &str, example_path: &str) -> Result<Prediction> {
    // Load neural network from checkpoint
    let nn = NN::from_checkpoint(checkpoint_path)?;
    log::info!("Loaded checkpoint from: {}", checkpoint_path);

    let image_bytes = fs::read(example_path)?;
    classify_bytes(&nn, &image_bytes)
}
