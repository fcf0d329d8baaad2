//! Raw dataset sources.
//!
//! A `DataSource` hands out already decoded images and integer labels; turning
//! them into training features is the job of `encoding`.

use crate::error::{Error, Result};
use mnist::{Mnist, MnistBuilder};
use ndarray::prelude::*;
use std::path::{Path, PathBuf};

pub const MNIST_HEIGHT: usize = 28;
pub const MNIST_WIDTH: usize = 28;
pub const MNIST_CLASSES: usize = 10;
pub const MNIST_TRAIN_LEN: usize = 60_000;
pub const MNIST_TEST_LEN: usize = 10_000;

const MNIST_FILES: [&str; 4] = [
    "train-images-idx3-ubyte",
    "train-labels-idx1-ubyte",
    "t10k-images-idx3-ubyte",
    "t10k-labels-idx1-ubyte",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

/// Images and labels of one split, as supplied by the source.
#[derive(Debug, Clone)]
pub struct RawSplit {
    pub images: Vec<Array2<f32>>, // (height, width) intensity grids
    pub labels: Vec<u8>,
    /// Largest intensity a pixel can take: 255 for byte images, 1 for pre-scaled ones.
    pub max_intensity: f32,
}

pub trait DataSource {
    fn load(&self, split: Split) -> Result<RawSplit>;
}

/// MNIST idx files found in a directory, decoded by the `mnist` crate.
pub struct MnistSource {
    mnist: Mnist,
}

impl MnistSource {
    /// Loads both splits from `data_dir`.
    /// The files must already be there, nothing is downloaded.
    pub fn open(data_dir: &str) -> Result<MnistSource> {
        let root = Path::new(data_dir);
        for name in MNIST_FILES {
            let path: PathBuf = root.join(name);
            if !path.is_file() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("missing MNIST file {}", path.display()),
                )));
            }
        }

        // The builder concatenates base path and file name as-is.
        let base_path = if data_dir.ends_with('/') {
            data_dir.to_string()
        } else {
            format!("{data_dir}/")
        };
        log::debug!("decoding MNIST idx files from {base_path}");
        let mnist = MnistBuilder::new()
            .label_format_digit()
            .base_path(&base_path)
            .training_set_length(MNIST_TRAIN_LEN as u32)
            .validation_set_length(0)
            .test_set_length(MNIST_TEST_LEN as u32)
            .finalize();

        Ok(MnistSource { mnist })
    }
}

impl DataSource for MnistSource {
    fn load(&self, split: Split) -> Result<RawSplit> {
        let (pixels, labels) = match split {
            Split::Train => (&self.mnist.trn_img, &self.mnist.trn_lbl),
            Split::Test => (&self.mnist.tst_img, &self.mnist.tst_lbl),
        };
        let nb_pixels = MNIST_HEIGHT * MNIST_WIDTH;
        if pixels.len() != labels.len() * nb_pixels {
            return Err(Error::shape(
                "MNIST images",
                labels.len() * nb_pixels,
                pixels.len(),
            ));
        }

        let images = pixels
            .chunks_exact(nb_pixels)
            .map(|chunk| {
                Array2::from_shape_vec(
                    (MNIST_HEIGHT, MNIST_WIDTH),
                    chunk.iter().map(|&p| p as f32).collect(),
                )
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(RawSplit {
            images,
            labels: labels.clone(),
            max_intensity: 255.0,
        })
    }
}

/// Splits held in memory, handy for tests and for data decoded elsewhere.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    pub train: RawSplit,
    pub test: RawSplit,
}

impl DataSource for InMemorySource {
    fn load(&self, split: Split) -> Result<RawSplit> {
        Ok(match split {
            Split::Train => self.train.clone(),
            Split::Test => self.test.clone(),
        })
    }
}
