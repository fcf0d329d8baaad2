pub use crate::layers::activations::{softmax, ReluLayer, SoftMaxLayer};
pub use crate::layers::fc::FcLayer;
pub use crate::model::Module;

use crate::error::Result;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

pub mod activations;
pub mod fc;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum Layer {
    FC(FcLayer),
    ReLU(ReluLayer),
    Softmax(SoftMaxLayer),
}

impl Module for Layer {
    fn forward(&mut self, input: Array2<f32>) -> Result<Array2<f32>> {
        match self {
            Layer::FC(l) => l.forward(input),
            Layer::ReLU(l) => l.forward(input),
            Layer::Softmax(l) => l.forward(input),
        }
    }

    fn infer(&self, input: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        match self {
            Layer::FC(l) => l.infer(input),
            Layer::ReLU(l) => l.infer(input),
            Layer::Softmax(l) => l.infer(input),
        }
    }

    fn backward(&mut self, dz: Array2<f32>) -> Result<Array2<f32>> {
        match self {
            Layer::FC(l) => l.backward(dz),
            Layer::ReLU(l) => l.backward(dz),
            Layer::Softmax(l) => l.backward(dz),
        }
    }

    fn zero_grad(&mut self) {
        match self {
            Layer::FC(l) => l.zero_grad(),
            Layer::ReLU(l) => l.zero_grad(),
            Layer::Softmax(l) => l.zero_grad(),
        }
    }
}
