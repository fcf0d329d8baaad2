pub use crate::model::Module;

use crate::error::{Error, Result};
use crate::model::ParamGrad;
use ndarray::prelude::*;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
///  z = a_prev.W + b
pub struct FcLayer {
    input_size: usize,
    output_size: usize,
    //
    pub weights: Array2<f32>, // (input_size, output_size)
    pub bias: Array1<f32>,    //  (output_size)
    // for backprop
    #[serde(skip)]
    last_input: Option<Array2<f32>>, // (batch_size, input_size), this is the prev layer activation
    //
    #[serde(skip)]
    pub w_grad: Option<Array2<f32>>, // (input_size, output_size)
    #[serde(skip)]
    pub b_grad: Option<Array1<f32>>, // (output_size)
}

impl FcLayer {
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, rng: &mut R) -> FcLayer {
        FcLayer {
            input_size,
            output_size,
            weights: FcLayer::init_2d_mat(input_size, output_size, rng),
            bias: Array1::zeros(output_size),
            //
            last_input: None,
            //
            w_grad: None,
            b_grad: None,
        }
    }

    /// Builds a layer around existing parameters.
    pub fn from_parameters(weights: Array2<f32>, bias: Array1<f32>) -> Result<FcLayer> {
        let (input_size, output_size) = weights.dim();
        if bias.len() != output_size {
            return Err(Error::shape("FC bias", output_size, bias.len()));
        }
        Ok(FcLayer {
            input_size,
            output_size,
            weights,
            bias,
            last_input: None,
            w_grad: None,
            b_grad: None,
        })
    }

    fn get_scale(input_size: usize) -> f32 {
        (2.0 / input_size as f32).sqrt()
    }

    fn init_2d_mat<R: Rng + ?Sized>(input_size: usize, output_size: usize, rng: &mut R) -> Array2<f32> {
        Array2::random_using((input_size, output_size), Uniform::new(-1.0f32, 1.0), rng)
            * FcLayer::get_scale(input_size)
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.bias.len()
    }

    /// Stored sizes agree with the parameter arrays (checked after loading a checkpoint).
    pub fn check_shapes(&self) -> Result<()> {
        if self.weights.dim() != (self.input_size, self.output_size) {
            return Err(Error::shape(
                "FC weights",
                (self.input_size, self.output_size),
                self.weights.dim(),
            ));
        }
        if self.bias.len() != self.output_size {
            return Err(Error::shape("FC bias", self.output_size, self.bias.len()));
        }
        Ok(())
    }

    /// Weights then bias, each paired with its gradient from the last backward pass.
    pub fn params_and_grads(&mut self, layer_idx: usize) -> Result<[ParamGrad<'_>; 2]> {
        match (&self.w_grad, &self.b_grad) {
            (Some(w_grad), Some(b_grad)) => Ok([
                ParamGrad {
                    param: self.weights.view_mut().into_dyn(),
                    grad: w_grad.view().into_dyn(),
                },
                ParamGrad {
                    param: self.bias.view_mut().into_dyn(),
                    grad: b_grad.view().into_dyn(),
                },
            ]),
            _ => Err(Error::MissingGradient(layer_idx)),
        }
    }
}

impl Module for FcLayer {
    fn forward(&mut self, input: Array2<f32>) -> Result<Array2<f32>> {
        let out = self.infer(input.view())?;
        // store input for backprop computations
        self.last_input = Some(input);
        Ok(out)
    }

    fn infer(&self, input: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        if input.ncols() != self.input_size {
            return Err(Error::shape("FC input features", self.input_size, input.ncols()));
        }
        // (batch_size, input_size) X (input_size, output_size) = (batch_size, output_size)
        Ok(input.dot(&self.weights) + &self.bias)
    }

    fn backward(&mut self, dz: Array2<f32>) -> Result<Array2<f32>> {
        let last_input = self.last_input.take().ok_or(Error::BackwardBeforeForward)?;
        if dz.dim() != (last_input.nrows(), self.output_size) {
            return Err(Error::shape(
                "FC upstream gradient",
                (last_input.nrows(), self.output_size),
                dz.dim(),
            ));
        }

        // Gradients for this layer weights. The batch mean is already folded
        // into dz by the loss, so no extra division here.
        // w: (batch_size, input_size)^T X (batch_size, output_size) = (input_size, output_size)
        self.w_grad = Some(last_input.t().dot(&dz));
        // b: (batch_size, output_size) summed over batch-axis = (output_size)
        self.b_grad = Some(dz.sum_axis(Axis(0)));

        //  What needs to be passed on to the 'previous' layer in the network
        //  (batch_size, output_size) X (input_size, output_size)^T = (batch_size, input_size)
        Ok(dz.dot(&self.weights.t()))
    }

    fn zero_grad(&mut self) {
        self.w_grad = None;
        self.b_grad = None;
    }
}
