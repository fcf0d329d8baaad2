use mnist_dense::config::{OptimizerKind, TrainingConfig};
use mnist_dense::layers::Layer;
use mnist_dense::mnist_dataset::{InMemorySource, RawSplit};
use mnist_dense::model::NN;
use mnist_dense::train::{train, TrainingReport};
use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 8x8 byte images whose label is the position of the one saturated pixel
/// among the first ten, in row-major order.
fn synthetic_split(nb_samples: usize, seed: u64) -> RawSplit {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut images = Vec::with_capacity(nb_samples);
    let mut labels = Vec::with_capacity(nb_samples);
    for _ in 0..nb_samples {
        let mut image = Array2::<f32>::zeros((8, 8));
        image.mapv_inplace(|_| rng.gen_range(0..64) as f32);
        let label: u8 = rng.gen_range(0..10);
        image[(label as usize / 8, label as usize % 8)] = 255.0;
        images.push(image);
        labels.push(label);
    }
    RawSplit {
        images,
        labels,
        max_intensity: 255.0,
    }
}

fn source() -> InMemorySource {
    InMemorySource {
        train: synthetic_split(300, 1),
        test: synthetic_split(100, 2),
    }
}

fn config(optimizer: OptimizerKind, seed: u64) -> TrainingConfig {
    TrainingConfig {
        hidden_units: 16,
        optimizer,
        learning_rate: match optimizer {
            OptimizerKind::Sgd => 0.5,
            OptimizerKind::Adam => 0.01,
        },
        batch_size: 32,
        epochs: 4,
        seed,
        ..Default::default()
    }
}

fn weights(nn: &NN) -> Vec<Array2<f32>> {
    nn.layers
        .iter()
        .filter_map(|layer| match layer {
            Layer::FC(fc) => Some(fc.weights.clone()),
            _ => None,
        })
        .collect()
}

fn run(config: &TrainingConfig) -> (NN, TrainingReport) {
    train(config, &source()).unwrap()
}

#[test]
fn same_seed_gives_identical_runs() {
    for optimizer in [OptimizerKind::Sgd, OptimizerKind::Adam] {
        let cfg = config(optimizer, 7);
        let (nn_a, report_a) = run(&cfg);
        let (nn_b, report_b) = run(&cfg);

        // 300 samples, batch 32 -> 10 steps per epoch
        assert_eq!(report_a.step_losses.len(), 40);
        assert_eq!(report_a.step_losses, report_b.step_losses);
        assert_eq!(report_a.epoch_losses, report_b.epoch_losses);
        assert_eq!(report_a.test_accuracy, report_b.test_accuracy);
        assert_eq!(weights(&nn_a), weights(&nn_b));
    }
}

#[test]
fn different_seeds_give_different_runs() {
    let (_, report_a) = run(&config(OptimizerKind::Sgd, 7));
    let (_, report_b) = run(&config(OptimizerKind::Sgd, 8));
    assert_ne!(report_a.step_losses, report_b.step_losses);
}

#[test]
fn synthetic_task_is_learned() {
    let cfg = TrainingConfig {
        epochs: 15,
        ..config(OptimizerKind::Adam, 7)
    };
    let (_, report) = run(&cfg);
    let first = report.epoch_losses[0];
    let last = *report.epoch_losses.last().unwrap();
    assert!(last < first, "loss went from {first} to {last}");
    assert!(report.train_accuracy.unwrap() > 0.5);
    assert!(report.test_accuracy.is_some());
}

#[test]
fn shuffle_off_still_reproducible() {
    let cfg = TrainingConfig {
        shuffle: false,
        ..config(OptimizerKind::Sgd, 3)
    };
    let (_, report_a) = run(&cfg);
    let (_, report_b) = run(&cfg);
    assert_eq!(report_a.step_losses, report_b.step_losses);
}
