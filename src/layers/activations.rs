pub use crate::model::Module;

use crate::error::{Error, Result};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ReluLayer {
    #[serde(skip)]
    last_input: Option<Array2<f32>>,
}

impl ReluLayer {
    pub fn new() -> ReluLayer {
        ReluLayer { last_input: None }
    }
}

impl Module for ReluLayer {
    fn forward(&mut self, input: Array2<f32>) -> Result<Array2<f32>> {
        let out = self.infer(input.view())?;
        self.last_input = Some(input);
        Ok(out)
    }

    fn infer(&self, input: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        Ok(input.mapv(|x| x.max(0.0)))
    }

    /// Subgradient at 0 is taken as 0.
    fn backward(&mut self, dz: Array2<f32>) -> Result<Array2<f32>> {
        let last_input = self.last_input.take().ok_or(Error::BackwardBeforeForward)?;
        if last_input.dim() != dz.dim() {
            return Err(Error::shape("ReLU upstream gradient", last_input.dim(), dz.dim()));
        }
        Ok(last_input.mapv(|x| if x > 0.0 { 1.0 } else { 0.0 }) * dz)
    }

    fn zero_grad(&mut self) {
        self.last_input = None;
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SoftMaxLayer {
    #[serde(skip)]
    last_output: Option<Array2<f32>>,
}

impl SoftMaxLayer {
    pub fn new() -> SoftMaxLayer {
        SoftMaxLayer { last_output: None }
    }
}

/// Row-wise softmax, shifted by the row max so `exp` cannot overflow.
pub fn softmax(input: ArrayView2<'_, f32>) -> Array2<f32> {
    let max = input.fold_axis(Axis(1), f32::NEG_INFINITY, |&a, &b| a.max(b));
    // exp(x - max)
    let mut out = &input - &max.insert_axis(Axis(1));
    out.mapv_inplace(|x| x.exp());

    let sum = out.sum_axis(Axis(1));
    out / &sum.insert_axis(Axis(1))
}

impl Module for SoftMaxLayer {
    fn forward(&mut self, input: Array2<f32>) -> Result<Array2<f32>> {
        let out = self.infer(input.view())?;
        // for backprop
        self.last_output = Some(out.clone());
        Ok(out)
    }

    fn infer(&self, input: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        Ok(softmax(input))
    }

    /// Fused softmax + cross-entropy backward.
    ///
    /// The input is NOT dLoss/dz: it is the one-hot target matrix
    /// (batch_size, K). With a cross-entropy loss the gradient w.r.t. the
    /// logits reduces to (P - Y) / batch_size, which is what gets returned.
    fn backward(&mut self, targets: Array2<f32>) -> Result<Array2<f32>> {
        let last_output = self.last_output.take().ok_or(Error::BackwardBeforeForward)?;
        if last_output.dim() != targets.dim() {
            return Err(Error::shape("softmax targets", last_output.dim(), targets.dim()));
        }
        let batch_size = targets.nrows() as f32;
        Ok((last_output - targets) / batch_size)
    }

    fn zero_grad(&mut self) {
        self.last_output = None;
    }
}
