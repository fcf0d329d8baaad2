use crate::config::{OptimizerKind, TrainingConfig};
use crate::encoding::one_hot_batch;
use crate::error::{Error, Result};
use crate::model::ParamGrad;

use ndarray::prelude::*;
use ndarray::Zip;

/// Probabilities are clamped to this before the log.
pub const LOG_EPSILON: f32 = 1e-10;

/// Returns the per-sample losses and the one-hot targets, which the fused
/// softmax backward turns into the logits gradient.
pub type CostFunction = fn(labels: &[u8], actual_y: &Array2<f32>) -> Result<(Array1<f32>, Array2<f32>)>;

pub fn cross_entropy(labels: &[u8], actual_y: &Array2<f32>) -> Result<(Array1<f32>, Array2<f32>)> {
    let (batch_size, num_classes) = actual_y.dim();
    if labels.len() != batch_size {
        return Err(Error::shape("labels vs predictions", batch_size, labels.len()));
    }

    let expected_y = one_hot_batch(labels, num_classes)?;

    // Calculate cross-entropy for each sample in batch: -log(p)
    let log_probs = actual_y.mapv(|p| p.clamp(LOG_EPSILON, 1.0).ln());
    let loss = -(&expected_y * &log_probs).sum_axis(Axis(1));

    Ok((loss, expected_y))
}

pub fn mean_loss(loss: &Array1<f32>) -> f32 {
    loss.mean().unwrap_or(0.0)
}

pub trait Optimizer {
    /// Run one optimization step over every (parameter, gradient) pair.
    /// Note:
    /// - Assumes forward+backward pass have been done.
    /// - Pairs come in the same order on every call; stateful optimizers key their state on it.
    /// - Either every parameter is updated or, on error, none is.
    fn step(&mut self, params: Vec<ParamGrad<'_>>) -> Result<()>;

    /// Forget any accumulated state (moments, step count).
    fn reset(&mut self);

    fn learning_rate(&self) -> f32;
}

fn check_grad_shapes(params: &[ParamGrad<'_>]) -> Result<()> {
    for p in params {
        if p.param.shape() != p.grad.shape() {
            return Err(Error::shape("gradient", p.param.shape(), p.grad.shape()));
        }
    }
    Ok(())
}

pub struct SGD {
    pub learning_rate: f32,
}

impl SGD {
    pub fn new(learning_rate: f32) -> SGD {
        SGD { learning_rate }
    }
}

impl Optimizer for SGD {
    fn step(&mut self, params: Vec<ParamGrad<'_>>) -> Result<()> {
        check_grad_shapes(&params)?;
        let lr = self.learning_rate;
        for ParamGrad { mut param, grad } in params {
            param.zip_mut_with(&grad, |p, &g| *p -= lr * g);
        }
        Ok(())
    }

    fn reset(&mut self) {}

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }
}

#[derive(Clone, Debug)]
pub struct AdamState {
    pub m: ArrayD<f32>, // first moment
    pub v: ArrayD<f32>, // second moment
}

pub struct Adam {
    pub t: i32,
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    /// One entry per parameter tensor, allocated on the first step.
    pub states: Vec<AdamState>,
}

impl Adam {
    pub fn new(learning_rate: f32) -> Self {
        Adam::with_betas(learning_rate, 0.9, 0.999, 1e-8)
    }

    pub fn with_betas(learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam {
            t: 0,
            learning_rate,
            beta1,
            beta2,
            epsilon,
            states: Vec::new(),
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: Vec<ParamGrad<'_>>) -> Result<()> {
        check_grad_shapes(&params)?;

        // Initialize state if first time
        if self.states.is_empty() {
            self.states = params
                .iter()
                .map(|p| AdamState {
                    m: ArrayD::zeros(p.grad.raw_dim()),
                    v: ArrayD::zeros(p.grad.raw_dim()),
                })
                .collect();
        }
        if self.states.len() != params.len() {
            return Err(Error::shape("Adam state slots", self.states.len(), params.len()));
        }
        for (state, p) in self.states.iter().zip(&params) {
            if state.m.shape() != p.param.shape() {
                return Err(Error::shape("Adam state", state.m.shape(), p.param.shape()));
            }
        }

        self.t += 1;
        let t = self.t;
        for (ParamGrad { mut param, grad }, state) in params.into_iter().zip(&mut self.states) {
            update_param(
                &mut param,
                &grad,
                state,
                self.learning_rate,
                self.beta1,
                self.beta2,
                self.epsilon,
                t,
            );
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.t = 0;
        self.states.clear();
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }
}

#[allow(clippy::too_many_arguments)]
fn update_param(
    param: &mut ArrayViewMutD<f32>,
    grad: &ArrayViewD<f32>,
    state: &mut AdamState,
    lr: f32,
    beta1: f32,
    beta2: f32,
    eps: f32,
    t: i32,
) {
    let AdamState { m, v } = state;

    // m = beta1 * m + (1 - beta1) * grad
    m.zip_mut_with(grad, |m_val, g_val| {
        *m_val = beta1 * *m_val + (1.0 - beta1) * g_val;
    });

    // v = beta2 * v + (1 - beta2) * grad^2
    v.zip_mut_with(grad, |v_val, g_val| {
        *v_val = beta2 * *v_val + (1.0 - beta2) * g_val.powi(2);
    });

    // Bias correction
    let m_corr = 1.0 - beta1.powi(t);
    let v_corr = 1.0 - beta2.powi(t);

    // Update weight: w = w - lr * (m / m_corr) / (sqrt(v / v_corr) + eps)
    Zip::from(param).and(&*m).and(&*v).for_each(|p, &mv, &vv| {
        let m_hat = mv / m_corr;
        let v_hat = vv / v_corr;
        *p -= lr * m_hat / (v_hat.sqrt() + eps);
    });
}

pub fn build_optimizer(config: &TrainingConfig) -> Box<dyn Optimizer> {
    match config.optimizer {
        OptimizerKind::Sgd => Box::new(SGD::new(config.learning_rate)),
        OptimizerKind::Adam => Box::new(Adam::with_betas(
            config.learning_rate,
            config.adam_beta1,
            config.adam_beta2,
            config.adam_epsilon,
        )),
    }
}
