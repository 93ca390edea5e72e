use thiserror::Error;

/// Main error type for the LatMol system
#[derive(Error, Debug)]
pub enum LmError {
    #[error("Shape error: {0}")]
    Shape(#[from] ShapeError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Decoder error: {0}")]
    Decoder(#[from] DecoderError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Optimizer error: {0}")]
    Optimizer(#[from] OptimizerError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LmError {
    /// True for errors raised while validating run configuration, before any
    /// decoder or oracle work happened.
    pub fn is_config(&self) -> bool {
        matches!(self, LmError::Config(_))
    }
}

/// Latent vector shape errors. Never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("Latent dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Latent coordinate {index} is not finite")]
    NonFinite { index: usize },
}

/// Errors raised by the validity-retry generator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("No valid structure after {attempts} decode attempts")]
    RetryExhausted { attempts: usize },
}

/// Errors surfaced by a decoder implementation
#[derive(Error, Debug)]
pub enum DecoderError {
    #[error("Decoder failed: {message}")]
    Failed { message: String },

    #[error("Token {token} is not in the vocabulary")]
    UnknownToken { token: String },
}

/// Errors raised by property oracles
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Structure could not be interpreted: {smiles}, message: {message}")]
    InvalidStructure { smiles: String, message: String },

    #[error("Property {property} produced a non-finite value for {smiles}")]
    NonFinite { property: String, smiles: String },
}

/// Errors raised by the minimizer and its search strategies
#[derive(Error, Debug)]
pub enum OptimizerError {
    #[error("Invalid search space: {message}")]
    InvalidSearchSpace { message: String },

    #[error("Invalid optimization configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Surrogate model fit failed: {message}")]
    Surrogate { message: String },

    #[error("Objective returned a non-finite value at trial {trial_number}")]
    NonFiniteObjective { trial_number: usize },

    #[error("Search strategy {strategy} produced no suggestion")]
    NoSuggestion { strategy: String },
}

/// Result type alias for LatMol operations
pub type LmResult<T> = Result<T, LmError>;

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::LmError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::LmError::Config(format!($($arg)*))
    };
}
