use crate::encoding::{argmax, Dataset};
use crate::error::Result;
use crate::model::{Module, NN};
use ndarray::prelude::*;
use rayon::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub correct: usize,
    pub total: usize,
    /// How many samples were predicted as each class.
    pub pred_stats: Vec<u64>,
}

impl Evaluation {
    /// Fraction of correct predictions, 0 for an empty dataset.
    pub fn accuracy(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f32 / self.total as f32
    }
}

/// Argmax label of every row of a probability matrix.
pub fn predict(probs: ArrayView2<'_, f32>) -> Vec<usize> {
    probs.outer_iter().map(argmax).collect()
}

/// Batched accuracy pass. Chunks of `batch_size` rows are evaluated in
/// parallel; counts are summed, so the result does not depend on scheduling.
pub fn evaluate(nn: &NN, dataset: &Dataset, batch_size: usize) -> Result<Evaluation> {
    let num_classes = nn.num_classes().unwrap_or(0);
    let features = dataset.features();
    let labels = dataset.labels();
    let batch_size = batch_size.max(1);

    let chunks: Vec<(ArrayView2<'_, f32>, &[u8])> = features
        .axis_chunks_iter(Axis(0), batch_size)
        .zip(labels.chunks(batch_size))
        .collect();

    let partials = chunks
        .into_par_iter()
        .map(|(x, y)| -> Result<(usize, Vec<u64>)> {
            let probs = nn.infer(x)?;
            let mut stats = vec![0u64; num_classes];
            let mut correct = 0;
            for (pred, &label) in predict(probs.view()).into_iter().zip(y) {
                if let Some(count) = stats.get_mut(pred) {
                    *count += 1;
                }
                if pred == label as usize {
                    correct += 1;
                }
            }
            Ok((correct, stats))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut evaluation = Evaluation {
        correct: 0,
        total: dataset.len(),
        pred_stats: vec![0; num_classes],
    };
    for (correct, stats) in partials {
        evaluation.correct += correct;
        for (total, count) in evaluation.pred_stats.iter_mut().zip(stats) {
            *total += count;
        }
    }
    Ok(evaluation)
}
