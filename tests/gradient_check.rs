//! Compares backprop gradients against central finite differences of the
//! mean cross-entropy loss.

use mnist_dense::config::Activation;
use mnist_dense::layers::Layer;
use mnist_dense::model::{Module, NN};
use mnist_dense::optim::{cross_entropy, mean_loss};
use ndarray::prelude::*;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;

const EPS: f32 = 1e-2;
const TOLERANCE: f32 = 2e-3;

fn batch_loss(nn: &NN, input: &Array2<f32>, labels: &[u8]) -> f32 {
    let probs = nn.infer(input.view()).unwrap();
    let (loss, _) = cross_entropy(labels, &probs).unwrap();
    mean_loss(&loss)
}

fn analytic_grads(nn: &mut NN, input: &Array2<f32>, labels: &[u8]) -> Vec<(Array2<f32>, Array1<f32>)> {
    nn.zero_grad();
    let probs = nn.forward(input.clone()).unwrap();
    let (_, targets) = cross_entropy(labels, &probs).unwrap();
    nn.backward(targets).unwrap();
    nn.layers
        .iter()
        .filter_map(|layer| match layer {
            Layer::FC(fc) => Some((fc.w_grad.clone().unwrap(), fc.b_grad.clone().unwrap())),
            _ => None,
        })
        .collect()
}

/// Central difference after nudging one parameter of the `fc_idx`-th dense layer.
fn numeric_grad(
    nn: &NN,
    input: &Array2<f32>,
    labels: &[u8],
    fc_idx: usize,
    nudge: impl Fn(&mut mnist_dense::layers::FcLayer, f32),
) -> f32 {
    let shifted = |delta: f32| {
        let mut nn = nn.clone();
        let fc = nn
            .layers
            .iter_mut()
            .filter_map(|layer| match layer {
                Layer::FC(fc) => Some(fc),
                _ => None,
            })
            .nth(fc_idx)
            .unwrap();
        nudge(fc, delta);
        batch_loss(&nn, input, labels)
    };
    (shifted(EPS) - shifted(-EPS)) / (2.0 * EPS)
}

fn check_layer(nn: &NN, input: &Array2<f32>, labels: &[u8], fc_idx: usize, grads: &(Array2<f32>, Array1<f32>)) {
    let (w_grad, b_grad) = grads;
    for ((r, c), &analytic) in w_grad.indexed_iter() {
        let numeric = numeric_grad(nn, input, labels, fc_idx, |fc, d| fc.weights[(r, c)] += d);
        assert!(
            (numeric - analytic).abs() < TOLERANCE,
            "layer {fc_idx} weight ({r},{c}): numeric {numeric}, backprop {analytic}"
        );
    }
    for (j, &analytic) in b_grad.indexed_iter() {
        let numeric = numeric_grad(nn, input, labels, fc_idx, |fc, d| fc.bias[j] += d);
        assert!(
            (numeric - analytic).abs() < TOLERANCE,
            "layer {fc_idx} bias {j}: numeric {numeric}, backprop {analytic}"
        );
    }
}

fn setup(activation: Activation) -> (NN, Array2<f32>, Vec<u8>) {
    let mut rng = StdRng::seed_from_u64(3);
    let nn = NN::dense(5, 4, 3, activation, &mut rng);
    let input = Array2::random_using((6, 5), Uniform::new(-1.0f32, 1.0), &mut rng);
    let labels = vec![0, 1, 2, 2, 1, 0];
    (nn, input, labels)
}

#[test]
fn single_layer_gradients_match_finite_differences() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut nn = NN::dense(4, 0, 3, Activation::Relu, &mut rng);
    let input = Array2::random_using((5, 4), Uniform::new(0.0f32, 1.0), &mut rng);
    let labels = vec![2, 0, 1, 1, 0];

    let grads = analytic_grads(&mut nn, &input, &labels);
    assert_eq!(grads.len(), 1);
    check_layer(&nn, &input, &labels, 0, &grads[0]);
}

#[test]
fn hidden_layer_gradients_match_finite_differences() {
    let (mut nn, input, labels) = setup(Activation::Identity);
    let grads = analytic_grads(&mut nn, &input, &labels);
    assert_eq!(grads.len(), 2);
    for (fc_idx, g) in grads.iter().enumerate() {
        check_layer(&nn, &input, &labels, fc_idx, g);
    }
}

#[test]
fn output_layer_gradients_match_through_relu() {
    // Nudging the output layer never moves a hidden unit across the ReLU kink.
    let (mut nn, input, labels) = setup(Activation::Relu);
    let grads = analytic_grads(&mut nn, &input, &labels);
    check_layer(&nn, &input, &labels, 1, &grads[1]);
}
