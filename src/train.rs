use crate::batch::{Batch, BatchSampler};
use crate::config::TrainingConfig;
use crate::encoding::{Dataset, FeatureEncoder};
use crate::error::{Error, Result};
use crate::eval::{evaluate, Evaluation};
use crate::mnist_dataset::{DataSource, Split, MNIST_CLASSES};
use crate::model::{Module, NN};
use crate::optim::{build_optimizer, cross_entropy, mean_loss, CostFunction, Optimizer};

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Where the trainer is in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    Idle,
    IterateBatches { epoch: usize, batch: usize },
    EpochDone { epoch: usize },
}

#[derive(Debug, Clone, Default)]
pub struct TrainingReport {
    /// Mean batch loss of every optimisation step, in order.
    pub step_losses: Vec<f32>,
    /// Sample-weighted mean loss of every epoch.
    pub epoch_losses: Vec<f32>,
    pub train_accuracy: Option<f32>,
    pub test_accuracy: Option<f32>,
}

pub struct Trainer {
    config: TrainingConfig,
    optimizer: Box<dyn Optimizer>,
    cost_function: CostFunction,
    sampler: BatchSampler,
    shuffle_rng: StdRng,
    state: TrainerState,
    optim_step: usize,
    loss_csv: Option<BufWriter<File>>,
}

impl Trainer {
    pub fn new(config: &TrainingConfig) -> Result<Trainer> {
        config.validate()?;
        Ok(Trainer {
            config: config.clone(),
            optimizer: build_optimizer(config),
            cost_function: cross_entropy,
            sampler: BatchSampler::new(config.batch_size, config.shuffle)?,
            // init uses `seed`, shuffling its own stream
            shuffle_rng: StdRng::seed_from_u64(config.seed.wrapping_add(1)),
            state: TrainerState::Idle,
            optim_step: 0,
            loss_csv: None,
        })
    }

    pub fn with_optimizer(mut self, optimizer: Box<dyn Optimizer>) -> Trainer {
        self.optimizer = optimizer;
        self
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn optim_step(&self) -> usize {
        self.optim_step
    }

    /// One forward/backward/update cycle; returns the mean batch loss.
    ///
    /// Any error leaves the parameters as they were before the call.
    pub fn train_step(&mut self, nn: &mut NN, batch: Batch) -> Result<f32> {
        let step = self.optim_step + 1;

        nn.zero_grad();
        let output = nn.forward(batch.features)?; // (batch_size, num_classes)
        let (loss, targets) = (self.cost_function)(&batch.labels, &output)?;
        let avg_loss = mean_loss(&loss);
        if !avg_loss.is_finite() {
            log::warn!("non-finite loss {avg_loss} at step {step}, aborting");
            return Err(Error::NumericInstability {
                step,
                loss: avg_loss,
            });
        }
        nn.backward(targets)?;
        self.optimizer.step(nn.params_and_grads()?)?;

        self.optim_step = step;
        Ok(avg_loss)
    }

    /// One pass over `dataset`; returns the sample-weighted mean loss.
    pub fn train_epoch(
        &mut self,
        nn: &mut NN,
        dataset: &Dataset,
        epoch: usize,
        pb: &ProgressBar,
        report: &mut TrainingReport,
    ) -> Result<f32> {
        let mut loss_sum = 0.0f64;
        let batches = self.sampler.epoch(dataset, &mut self.shuffle_rng);
        for (batch_idx, batch) in batches.enumerate() {
            self.state = TrainerState::IterateBatches {
                epoch,
                batch: batch_idx,
            };
            let batch_len = batch.len();
            let avg_loss = self.train_step(nn, batch)?;
            loss_sum += avg_loss as f64 * batch_len as f64;
            report.step_losses.push(avg_loss);

            if let Some(csv_file) = self.loss_csv.as_mut() {
                writeln!(csv_file, "{},{},{:.6}", self.optim_step, epoch, avg_loss)?;
            }
            pb.inc(1);
        }
        self.state = TrainerState::EpochDone { epoch };

        if dataset.is_empty() {
            return Ok(0.0);
        }
        Ok((loss_sum / dataset.len() as f64) as f32)
    }

    /// Trains for `config.epochs` epochs, then reports train (and test) accuracy.
    pub fn fit(
        &mut self,
        nn: &mut NN,
        train_dataset: &Dataset,
        test_dataset: Option<&Dataset>,
    ) -> Result<TrainingReport> {
        let result = self.run_epochs(nn, train_dataset, test_dataset);
        self.state = TrainerState::Idle;
        result
    }

    fn run_epochs(
        &mut self,
        nn: &mut NN,
        train_dataset: &Dataset,
        test_dataset: Option<&Dataset>,
    ) -> Result<TrainingReport> {
        if let Some(folder) = &self.config.checkpoint_folder {
            fs::create_dir_all(folder)?; // in case the folder does not exist
        }
        if let Some(path) = &self.config.loss_csv_path {
            // Create or truncate CSV file and write header
            let mut csv_file = BufWriter::new(File::create(path)?);
            writeln!(csv_file, "step,epoch,loss")?;
            self.loss_csv = Some(csv_file);
        }

        let nb_batches = self.sampler.nb_batches(train_dataset.len());
        let pb = ProgressBar::new((self.config.epochs * nb_batches) as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut report = TrainingReport::default();
        for epoch in 1..=self.config.epochs {
            let start = Instant::now();
            let epoch_loss = self.train_epoch(nn, train_dataset, epoch, &pb, &mut report)?;
            report.epoch_losses.push(epoch_loss);
            pb.set_message(format!("loss {epoch_loss:.4}"));
            pb.suspend(|| {
                log::info!(
                    "[EPOCH {epoch}/{}] loss: {epoch_loss:.4} ({:.2?})",
                    self.config.epochs,
                    start.elapsed()
                )
            });

            if let Some(csv_file) = self.loss_csv.as_mut() {
                csv_file.flush()?;
            }
            if self.config.eval_every_epoch {
                let train_eval = evaluate(nn, train_dataset, self.config.eval_batch_size)?;
                pb.suspend(|| log::info!("[TRAIN ACC] {:.4}", train_eval.accuracy()));
                if let Some(test_dataset) = test_dataset {
                    let test_eval = evaluate(nn, test_dataset, self.config.eval_batch_size)?;
                    pb.suspend(|| log_evaluation("TEST", &test_eval));
                }
            }
            if let Some(folder) = &self.config.checkpoint_folder {
                if epoch % self.config.checkpoint_stride == 0 {
                    let path = save_model(nn, folder, epoch)?;
                    log::debug!("saved checkpoint {}", path.display());
                }
            }
        }
        pb.finish_and_clear();
        self.loss_csv = None;

        let train_eval = evaluate(nn, train_dataset, self.config.eval_batch_size)?;
        log::info!("[TRAIN ACC] {:.4}", train_eval.accuracy());
        report.train_accuracy = Some(train_eval.accuracy());
        if let Some(test_dataset) = test_dataset {
            let test_eval = evaluate(nn, test_dataset, self.config.eval_batch_size)?;
            log_evaluation("TEST", &test_eval);
            report.test_accuracy = Some(test_eval.accuracy());
        }

        if let Some(folder) = &self.config.checkpoint_folder {
            let path = Path::new(folder).join(format!(
                "final_hidden{}_batch{}_lr{:.4}_{}.json",
                self.config.hidden_units,
                self.config.batch_size,
                self.config.learning_rate,
                self.config.optimizer
            ));
            nn.to_checkpoint(&path)?;
            log::info!("saved final model to {}", path.display());
        }
        Ok(report)
    }
}

fn log_evaluation(name: &str, evaluation: &Evaluation) {
    log::info!("[{name} ACC] {:.4}", evaluation.accuracy());
    log::debug!("[{name} STATS] {:?}", evaluation.pred_stats);
}

fn save_model(nn: &NN, checkpoint_folder: &str, epoch: usize) -> Result<PathBuf> {
    let ckpt_path = Path::new(checkpoint_folder).join(format!("checkpoint_epoch{epoch}.json"));
    nn.to_checkpoint(&ckpt_path)?;
    Ok(ckpt_path)
}

/// Loads both splits, builds the network described by `config` and trains it.
pub fn train(config: &TrainingConfig, source: &dyn DataSource) -> Result<(NN, TrainingReport)> {
    config.validate()?;
    let encoder = FeatureEncoder::new(MNIST_CLASSES);
    let train_dataset = encoder.load(source, Split::Train)?;
    let test_dataset = encoder.load(source, Split::Test)?;
    // checked before any epoch runs
    if test_dataset.nb_features() != train_dataset.nb_features() {
        return Err(Error::shape(
            "test split features",
            train_dataset.nb_features(),
            test_dataset.nb_features(),
        ));
    }

    let mut init_rng = StdRng::seed_from_u64(config.seed);
    let mut nn = NN::dense(
        train_dataset.nb_features(),
        config.hidden_units,
        MNIST_CLASSES,
        config.hidden_activation,
        &mut init_rng,
    );
    log::info!(
        "model: {} hidden units, {} parameters, optimizer {} (lr {})",
        config.hidden_units,
        nn.parameter_count(),
        config.optimizer,
        config.learning_rate
    );

    let mut trainer = Trainer::new(config)?;
    let report = trainer.fit(&mut nn, &train_dataset, Some(&test_dataset))?;
    log::info!("Training completed!");
    Ok((nn, report))
}
