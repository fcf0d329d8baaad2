//! Full-MNIST training runs. They need the four idx files in `MNIST_DATA_DIR`
//! (default `data/`) and take minutes, so they only run with `--ignored`.

use mnist_dense::config::{OptimizerKind, TrainingConfig};
use mnist_dense::mnist_dataset::MnistSource;
use mnist_dense::train::train;

fn data_dir() -> String {
    std::env::var("MNIST_DATA_DIR").unwrap_or_else(|_| "data/".to_string())
}

#[test]
#[ignore]
fn full_batch_sgd_single_layer() {
    let config = TrainingConfig {
        hidden_units: 0,
        optimizer: OptimizerKind::Sgd,
        learning_rate: 0.1,
        batch_size: 60_000,
        epochs: 500,
        shuffle: true,
        data_dir: data_dir(),
        ..Default::default()
    };
    let source = MnistSource::open(&config.data_dir).unwrap();
    let (_, report) = train(&config, &source).unwrap();

    let losses = &report.epoch_losses;
    assert_eq!(losses.len(), 500);
    assert!((losses[0] - 2.36).abs() < 0.2, "initial loss {}", losses[0]);
    for pair in losses.windows(2) {
        assert!(pair[1] <= pair[0], "loss increased: {} -> {}", pair[0], pair[1]);
    }
    assert!(*losses.last().unwrap() < 0.40);
    assert!(report.train_accuracy.unwrap() > 0.88);
    assert!(report.test_accuracy.unwrap() > 0.88);
}

#[test]
#[ignore]
fn full_batch_adam_hidden_layer() {
    let config = TrainingConfig {
        hidden_units: 32,
        optimizer: OptimizerKind::Adam,
        learning_rate: 0.001,
        batch_size: 60_000,
        epochs: 500,
        data_dir: data_dir(),
        ..Default::default()
    };
    let source = MnistSource::open(&config.data_dir).unwrap();
    let (_, report) = train(&config, &source).unwrap();

    let losses = &report.epoch_losses;
    assert!((losses[0] - 2.36).abs() < 0.3, "initial loss {}", losses[0]);
    assert!(*losses.last().unwrap() < 0.18);
    assert!(report.train_accuracy.unwrap() > 0.94);
    assert!(report.test_accuracy.unwrap() > 0.94);
}
