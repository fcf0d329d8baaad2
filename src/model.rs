use crate::config::Activation;
use crate::error::{Error, Result};
use crate::layers::{FcLayer, Layer, ReluLayer, SoftMaxLayer};
use ndarray::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

pub const CHECKPOINT_VERSION: u32 = 1;

pub trait Module {
    /// Forward pass, caching whatever the backward pass needs.
    /// Input is (batch_size, features).
    fn forward(&mut self, input: Array2<f32>) -> Result<Array2<f32>>;

    /// Forward pass without touching the backprop caches.
    fn infer(&self, input: ArrayView2<'_, f32>) -> Result<Array2<f32>>;

    /// Backward pass
    ///
    /// The `backward` function receives a gradient `dz` which corresponds to dLoss/dz,
    /// where z is the current layer output.
    /// The job of the backward pass is to combine its 'local gradients' - namely dz/dx, dz/dw -
    /// with this incoming gradient - dLoss/dz - using the chain rule.
    /// The backward should:
    /// - return dLoss/dx = dz/dx * dLoss/dz
    /// - fill in the gradients for the layer's own weights dLoss/dw = dz/dw * dLoss/dz
    ///
    /// Note:
    /// - the dz/dx Jacobian matrix is not materialized (too wasteful). Instead, each layer
    ///   directly computes the matrix-vector product of interest.
    /// - the shape of the function output - which corresponds to dLoss/dx - is the same shape
    ///   as the layer inputs.
    /// - the final softmax layer is fused with the cross-entropy loss and receives the
    ///   one-hot targets instead of a gradient.
    fn backward(&mut self, dz: Array2<f32>) -> Result<Array2<f32>>;

    fn zero_grad(&mut self);
}

/// A parameter tensor and its gradient, as handed to the optimizer.
pub struct ParamGrad<'a> {
    pub param: ArrayViewMutD<'a, f32>,
    pub grad: ArrayViewD<'a, f32>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NN {
    pub layers: Vec<Layer>,
}

#[derive(Serialize, Deserialize)]
struct Checkpoint<M> {
    version: u32,
    model: M,
}

impl Module for NN {
    fn forward(&mut self, input: Array2<f32>) -> Result<Array2<f32>> {
        let mut x = input;
        for layer in &mut self.layers {
            x = layer.forward(x)?;
        }
        Ok(x)
    }

    fn infer(&self, input: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        let mut x = input.to_owned();
        for layer in &self.layers {
            x = layer.infer(x.view())?;
        }
        Ok(x)
    }

    fn backward(&mut self, dz: Array2<f32>) -> Result<Array2<f32>> {
        let mut x = dz;
        // Iterate layers in reverse order, mutate each as we go
        for layer in self.layers.iter_mut().rev() {
            x = layer.backward(x)?;
        }
        Ok(x)
    }

    fn zero_grad(&mut self) {
        for layer in &mut self.layers {
            layer.zero_grad();
        }
    }
}

impl NN {
    /// Dense classifier ending in a softmax.
    ///
    /// `hidden_units == 0` gives a single `nb_features -> num_classes` layer,
    /// otherwise `nb_features -> hidden_units -> num_classes` with `activation`
    /// after the hidden layer.
    pub fn dense<R: Rng + ?Sized>(
        nb_features: usize,
        hidden_units: usize,
        num_classes: usize,
        activation: Activation,
        rng: &mut R,
    ) -> NN {
        let mut layers = Vec::new();
        let mut width = nb_features;
        if hidden_units > 0 {
            layers.push(Layer::FC(FcLayer::new(width, hidden_units, rng)));
            match activation {
                Activation::Relu => layers.push(Layer::ReLU(ReluLayer::new())),
                Activation::Identity => (),
            }
            width = hidden_units;
        }
        layers.push(Layer::FC(FcLayer::new(width, num_classes, rng)));
        layers.push(Layer::Softmax(SoftMaxLayer::new()));
        NN { layers }
    }

    fn fc_layers(&self) -> impl Iterator<Item = &FcLayer> {
        self.layers.iter().filter_map(|layer| match layer {
            Layer::FC(l) => Some(l),
            _ => None,
        })
    }

    pub fn input_size(&self) -> Option<usize> {
        self.fc_layers().next().map(|l| l.input_size())
    }

    pub fn num_classes(&self) -> Option<usize> {
        self.fc_layers().last().map(|l| l.output_size())
    }

    pub fn parameter_count(&self) -> usize {
        self.fc_layers().map(|l| l.parameter_count()).sum()
    }

    /// Every trainable tensor with its gradient, in a fixed order: layer by
    /// layer, weights before bias. Fails if a backward pass has not filled
    /// the gradients yet.
    pub fn params_and_grads(&mut self) -> Result<Vec<ParamGrad<'_>>> {
        let mut params = Vec::new();
        for (i, layer) in self.layers.iter_mut().enumerate() {
            if let Layer::FC(fc_layer) = layer {
                params.extend(fc_layer.params_and_grads(i)?);
            }
        }
        Ok(params)
    }

    /// Consecutive dense layers chain and every parameter has its declared shape.
    pub fn check_shapes(&self) -> Result<()> {
        let mut width: Option<usize> = None;
        for fc_layer in self.fc_layers() {
            fc_layer.check_shapes()?;
            if let Some(w) = width {
                if w != fc_layer.input_size() {
                    return Err(Error::shape("dense layer chain", w, fc_layer.input_size()));
                }
            }
            width = Some(fc_layer.output_size());
        }
        Ok(())
    }

    /// Save the neural network to a checkpoint file
    pub fn to_checkpoint(&self, filepath: impl AsRef<Path>) -> Result<()> {
        let file = File::create(filepath)?;
        let mut writer = BufWriter::new(file);
        let checkpoint = Checkpoint {
            version: CHECKPOINT_VERSION,
            model: self,
        };
        serde_json::to_writer(&mut writer, &checkpoint)?;
        writer.flush()?;
        Ok(())
    }

    /// Load a neural network from a checkpoint file
    pub fn from_checkpoint(filepath: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(filepath)?;
        let checkpoint: Checkpoint<NN> = serde_json::from_reader(BufReader::new(file))?;
        if checkpoint.version != CHECKPOINT_VERSION {
            return Err(Error::UnsupportedCheckpoint {
                found: checkpoint.version,
                expected: CHECKPOINT_VERSION,
            });
        }
        checkpoint.model.check_shapes()?;
        Ok(checkpoint.model)
    }
}
