//! Features and labels.
//!
//! Labels stay integers everywhere; one-hot vectors are derived on demand by
//! the loss.

use crate::error::{Error, Result};
use crate::mnist_dataset::{DataSource, RawSplit, Split};
use ndarray::prelude::*;

/// Flat, normalised samples of one split. Immutable once encoded.
#[derive(Debug, Clone)]
pub struct Dataset {
    features: Array2<f32>, // (nb_samples, nb_features), row-major pixels in [0, 1]
    labels: Vec<u8>,
}

impl Dataset {
    pub fn new(features: Array2<f32>, labels: Vec<u8>, num_classes: usize) -> Result<Dataset> {
        if features.nrows() != labels.len() {
            return Err(Error::shape("dataset rows", labels.len(), features.nrows()));
        }
        check_labels(&labels, num_classes)?;
        Ok(Dataset { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn nb_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn features(&self) -> ArrayView2<'_, f32> {
        self.features.view()
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// Gathers the given rows, in the given order.
    pub fn select(&self, indices: &[usize]) -> (Array2<f32>, Vec<u8>) {
        let features = self.features.select(Axis(0), indices);
        let labels = indices.iter().map(|&i| self.labels[i]).collect();
        (features, labels)
    }
}

/// Flattens image grids into feature rows.
#[derive(Debug, Clone, Copy)]
pub struct FeatureEncoder {
    pub num_classes: usize,
}

impl FeatureEncoder {
    pub fn new(num_classes: usize) -> FeatureEncoder {
        FeatureEncoder { num_classes }
    }

    /// Row-major flattening of one grid, scaled to [0, 1].
    pub fn flatten(image: ArrayView2<'_, f32>, max_intensity: f32) -> Array1<f32> {
        // `iter` walks the logical row-major order whatever the memory layout
        image.iter().map(|&p| p / max_intensity).collect()
    }

    pub fn encode(&self, raw: &RawSplit) -> Result<Dataset> {
        if raw.images.len() != raw.labels.len() {
            return Err(Error::shape(
                "images vs labels",
                raw.labels.len(),
                raw.images.len(),
            ));
        }
        if raw.max_intensity.is_nan() || raw.max_intensity <= 0.0 {
            return Err(Error::Config(format!(
                "max_intensity must be positive, got {}",
                raw.max_intensity
            )));
        }

        let grid = match raw.images.first() {
            Some(img) => img.dim(),
            None => return Err(Error::EmptyDataset),
        };
        let nb_features = grid.0 * grid.1;
        let mut features = Array2::zeros((raw.images.len(), nb_features));
        for (index, (image, mut row)) in raw
            .images
            .iter()
            .zip(features.outer_iter_mut())
            .enumerate()
        {
            if image.dim() != grid {
                return Err(Error::InvalidShape {
                    index,
                    expected: grid,
                    actual: image.dim(),
                });
            }
            row.assign(&FeatureEncoder::flatten(image.view(), raw.max_intensity));
        }

        Dataset::new(features, raw.labels.clone(), self.num_classes)
    }

    pub fn load(&self, source: &dyn DataSource, split: Split) -> Result<Dataset> {
        let raw = source.load(split)?;
        let dataset = self.encode(&raw)?;
        log::info!(
            "[{split:?}] {} samples, {} features",
            dataset.len(),
            dataset.nb_features()
        );
        Ok(dataset)
    }
}

fn check_labels(labels: &[u8], num_classes: usize) -> Result<()> {
    match labels
        .iter()
        .enumerate()
        .find(|(_, &label)| label as usize >= num_classes)
    {
        Some((index, &label)) => Err(Error::LabelRange {
            index,
            label: label as usize,
            num_classes,
        }),
        None => Ok(()),
    }
}

pub fn one_hot(label: usize, num_classes: usize) -> Result<Array1<f32>> {
    if label >= num_classes {
        return Err(Error::ClassRange { label, num_classes });
    }
    let mut v = Array1::zeros(num_classes);
    v[label] = 1.0;
    Ok(v)
}

/// (batch_size, num_classes) one-hot matrix, rows in label order.
pub fn one_hot_batch(labels: &[u8], num_classes: usize) -> Result<Array2<f32>> {
    check_labels(labels, num_classes)?;
    let mut targets = Array2::zeros((labels.len(), num_classes));
    for (i, &label) in labels.iter().enumerate() {
        targets[(i, label as usize)] = 1.0;
    }
    Ok(targets)
}

/// Index of the largest entry; ties go to the lowest index, NaNs never win.
pub fn argmax(values: ArrayView1<'_, f32>) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}
