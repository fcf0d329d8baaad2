use crate::encoding::Dataset;
use crate::error::{Error, Result};
use ndarray::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;

/// One minibatch: feature rows and labels share the same sample order.
#[derive(Debug, Clone)]
pub struct Batch {
    pub features: Array2<f32>, // (batch_size, nb_features)
    pub labels: Vec<u8>,       // (batch_size)
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchSampler {
    pub batch_size: usize,
    pub shuffle: bool,
}

impl BatchSampler {
    pub fn new(batch_size: usize, shuffle: bool) -> Result<BatchSampler> {
        if batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        Ok(BatchSampler {
            batch_size,
            shuffle,
        })
    }

    /// Batches for one pass over `dataset`. A new permutation is drawn on every
    /// call when shuffling; the last batch holds the remainder and is never dropped.
    pub fn epoch<'a, R: Rng + ?Sized>(&self, dataset: &'a Dataset, rng: &mut R) -> EpochBatches<'a> {
        let mut order: Vec<usize> = (0..dataset.len()).collect();
        if self.shuffle {
            order.shuffle(rng);
        }
        EpochBatches {
            dataset,
            order,
            batch_size: self.batch_size,
            pos: 0,
        }
    }

    pub fn nb_batches(&self, nb_samples: usize) -> usize {
        nb_samples.div_ceil(self.batch_size)
    }
}

/// Lazily gathers the batches of one epoch.
pub struct EpochBatches<'a> {
    dataset: &'a Dataset,
    order: Vec<usize>,
    batch_size: usize,
    pos: usize,
}

impl EpochBatches<'_> {
    /// Sample order of the whole epoch.
    pub fn order(&self) -> &[usize] {
        &self.order
    }
}

impl Iterator for EpochBatches<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.pos >= self.order.len() {
            return None;
        }
        let end = (self.pos + self.batch_size).min(self.order.len());
        let (features, labels) = self.dataset.select(&self.order[self.pos..end]);
        self.pos = end;
        Some(Batch { features, labels })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.order.len() - self.pos).div_ceil(self.batch_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for EpochBatches<'_> {}
