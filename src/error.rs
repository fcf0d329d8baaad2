use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Feature or label dimensions do not line up with the model architecture.
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        actual: String,
    },

    /// Image grids of varying size inside one dataset.
    #[error("invalid image shape at index {index}: expected {expected:?}, got {actual:?}")]
    InvalidShape {
        index: usize,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// No images where a feature matrix is expected.
    #[error("dataset holds no images")]
    EmptyDataset,

    #[error("label {label} at index {index} is outside [0, {num_classes})")]
    LabelRange {
        index: usize,
        label: usize,
        num_classes: usize,
    },

    /// A lone label with no sample position, e.g. when building a one-hot vector.
    #[error("class {label} is outside [0, {num_classes})")]
    ClassRange { label: usize, num_classes: usize },

    #[error("loss became {loss} at step {step}; lower the learning rate")]
    NumericInstability { step: usize, loss: f32 },

    #[error("layer {0} has no gradient, run a backward pass first")]
    MissingGradient(usize),

    #[error("backward pass called without a cached forward pass")]
    BackwardBeforeForward,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unsupported checkpoint version {found} (expected {expected})")]
    UnsupportedCheckpoint { found: u32, expected: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("array shape error: {0}")]
    Array(#[from] ndarray::ShapeError),
}

impl Error {
    pub(crate) fn shape(
        context: &'static str,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Error {
        Error::ShapeMismatch {
            context,
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        }
    }
}
