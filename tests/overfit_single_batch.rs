use mnist_dense::config::Activation;
use mnist_dense::model::{Module, NN};
use mnist_dense::optim::{cross_entropy, mean_loss, Adam, Optimizer};
use ndarray::prelude::*;
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug)]
struct TestDataset {
    pub samples: Vec<(Vec<f32>, u8)>, // input data, label
}

/// Generate a random batch of data.
/// This data has the same shape as flattened greyscale MNIST images.
fn gen_test_batch(batch_size: usize, nb_pixels: usize, nb_classes: u8, seed: u64) -> TestDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let pixels_distrib = Uniform::new(0.0, 1.0);
    let labels_distrib = Uniform::new(0, nb_classes);
    let mut samples = Vec::new();
    for _ in 0..batch_size {
        let input_data: Vec<f32> = (0..nb_pixels).map(|_| rng.sample(pixels_distrib)).collect();
        let label = rng.sample(labels_distrib);
        samples.push((input_data, label));
    }
    TestDataset { samples }
}

fn overfit(mut nn: NN, mut optimizer: impl Optimizer, max_optim_steps: usize) -> Result<(), String> {
    const OVERFITTED_LOSS_VALUE: f32 = 0.1;
    let batch_size: usize = 64;
    let nb_pixels = 28 * 28;
    let test_ds = gen_test_batch(batch_size, nb_pixels, 10, 1234);

    let batch_images: Vec<f32> = test_ds
        .samples
        .iter()
        .flat_map(|(pixels, _)| pixels.clone())
        .collect();
    let batch_images = Array2::from_shape_vec((batch_size, nb_pixels), batch_images)
        .map_err(|e| e.to_string())?;
    let batch_labels: Vec<u8> = test_ds.samples.iter().map(|(_, label)| *label).collect();

    let mut avg_loss: f32 = f32::MAX;
    for optim_step in 1..(max_optim_steps + 1) {
        nn.zero_grad();

        let output = nn.forward(batch_images.clone()).map_err(|e| e.to_string())?;
        let (loss, targets) = cross_entropy(&batch_labels, &output).map_err(|e| e.to_string())?;

        avg_loss = mean_loss(&loss); // batch loss
        if avg_loss < OVERFITTED_LOSS_VALUE {
            println!("Reached loss<{OVERFITTED_LOSS_VALUE} with {optim_step} optimisation steps");
            return Ok(());
        }

        if optim_step % 50 == 0 {
            println!("step {optim_step}, loss {avg_loss}");
        }

        nn.backward(targets).map_err(|e| e.to_string())?;
        optimizer
            .step(nn.params_and_grads().map_err(|e| e.to_string())?)
            .map_err(|e| e.to_string())?;
    }
    Err(format!("Failed to overfit: final loss was {avg_loss}"))
}

#[test]
/// Test that Adam can train a 784->32->10 network to overfit
/// a batch of 64 random images associated to random labels.
fn test_adam_can_overfit_single_batch() -> Result<(), String> {
    let nn = NN::dense(784, 32, 10, Activation::Relu, &mut StdRng::seed_from_u64(0));
    overfit(nn, Adam::new(0.01), 1000)
}

#[test]
/// The single-layer model memorises the batch too:
/// 64 points in 784 dimensions are linearly separable.
fn test_single_layer_can_overfit_single_batch() -> Result<(), String> {
    let nn = NN::dense(784, 0, 10, Activation::Relu, &mut StdRng::seed_from_u64(0));
    overfit(nn, Adam::new(0.01), 1000)
}
