use mnist_dense::config::{load_config, Activation, OptimizerKind, TrainingConfig};
use mnist_dense::encoding::FeatureEncoder;
use mnist_dense::eval::evaluate;
use mnist_dense::mnist_dataset::{MnistSource, Split, MNIST_CLASSES};
use mnist_dense::model::NN;
use mnist_dense::{run, train};

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a new model
    Train {
        /// JSON config file; the flags below override its values
        #[arg(long)]
        config: Option<String>,
        /// Hidden layer width, 0 for a single dense layer
        #[arg(long)]
        hidden_units: Option<usize>,
        #[arg(long)]
        hidden_activation: Option<Activation>,
        #[arg(long)]
        learning_rate: Option<f32>,
        /// sgd or adam
        #[arg(long)]
        optimizer: Option<OptimizerKind>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        nb_epochs: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        no_shuffle: bool,
        #[arg(long)]
        eval_every_epoch: bool,
        #[arg(long)]
        data_dir: Option<String>,
        #[arg(long)]
        checkpoint_folder: Option<String>,
        #[arg(long)]
        checkpoint_stride: Option<usize>, // Every how many epochs do we checkpoint?
        #[arg(long)]
        loss_csv_path: Option<String>,
    },
    /// Report test accuracy of a checkpoint
    Eval {
        #[arg(long)]
        checkpoint: String,
        #[arg(long, default_value = "data/")]
        data_dir: String,
        #[arg(long, default_value_t = 1000)]
        eval_batch_size: usize,
    },
    /// Run inference on a file
    Run {
        #[arg(long)]
        checkpoint: String,
        #[arg(long)]
        image_path: String,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = dispatch(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn dispatch(command: Commands) -> mnist_dense::Result<()> {
    match command {
        Commands::Train {
            config,
            hidden_units,
            hidden_activation,
            learning_rate,
            optimizer,
            batch_size,
            nb_epochs,
            seed,
            no_shuffle,
            eval_every_epoch,
            data_dir,
            checkpoint_folder,
            checkpoint_stride,
            loss_csv_path,
        } => {
            let mut cfg = match config {
                Some(path) => load_config(path)?,
                None => TrainingConfig::default(),
            };
            if let Some(v) = hidden_units {
                cfg.hidden_units = v;
            }
            if let Some(v) = hidden_activation {
                cfg.hidden_activation = v;
            }
            if let Some(v) = learning_rate {
                cfg.learning_rate = v;
            }
            if let Some(v) = optimizer {
                cfg.optimizer = v;
            }
            if let Some(v) = batch_size {
                cfg.batch_size = v;
            }
            if let Some(v) = nb_epochs {
                cfg.epochs = v;
            }
            if let Some(v) = seed {
                cfg.seed = v;
            }
            if no_shuffle {
                cfg.shuffle = false;
            }
            if eval_every_epoch {
                cfg.eval_every_epoch = true;
            }
            if let Some(v) = data_dir {
                cfg.data_dir = v;
            }
            if checkpoint_folder.is_some() {
                cfg.checkpoint_folder = checkpoint_folder;
            }
            if let Some(v) = checkpoint_stride {
                cfg.checkpoint_stride = v;
            }
            if loss_csv_path.is_some() {
                cfg.loss_csv_path = loss_csv_path;
            }
            cfg.validate()?;

            let source = MnistSource::open(&cfg.data_dir)?;
            let (_nn, report) = train::train(&cfg, &source)?;
            if let Some(last) = report.epoch_losses.last() {
                println!("final loss: {last:.4}");
            }
            if let Some(acc) = report.train_accuracy {
                println!("train accuracy: {acc:.4}");
            }
            if let Some(acc) = report.test_accuracy {
                println!("test accuracy: {acc:.4}");
            }
        }
        Commands::Eval {
            checkpoint,
            data_dir,
            eval_batch_size,
        } => {
            let nn = NN::from_checkpoint(&checkpoint)?;
            let source = MnistSource::open(&data_dir)?;
            let test_dataset = FeatureEncoder::new(MNIST_CLASSES).load(&source, Split::Test)?;
            let evaluation = evaluate(&nn, &test_dataset, eval_batch_size)?;
            println!("test accuracy: {:.4}", evaluation.accuracy());
            println!("predictions per class: {:?}", evaluation.pred_stats);
        }
        Commands::Run {
            checkpoint,
            image_path,
        } => {
            let prediction = run::run(&checkpoint, &image_path)?;
            println!("Prediction: {}", prediction.label);
            println!("Output probabilities: {:?}", prediction.probabilities);
        }
    }
    Ok(())
}
