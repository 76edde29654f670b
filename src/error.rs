//! seqattn error types

/// seqattn result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the attention primitive and the layers built around it.
///
/// Every variant is an input-contract violation by the caller. Nothing is
/// clamped or truncated to make a bad call succeed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two sequence or batch extents that must agree do not
    #[error("shape mismatch for {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        /// Which extent disagreed
        what: &'static str,
        /// Extent required by the other operand
        expected: usize,
        /// Extent actually supplied
        got: usize,
    },

    /// A feature dimension does not match a parameter matrix
    #[error("dimension mismatch for {param}: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Parameter whose input dimension was violated
        param: &'static str,
        /// Dimension the parameter was built for
        expected: usize,
        /// Dimension of the supplied input
        got: usize,
    },

    /// A valid length exceeds the sequence length
    #[error("valid length {valid_len} at index {index} exceeds sequence length {seq_len}")]
    ValidLengthOutOfRange {
        /// Flat index of the offending entry
        index: usize,
        /// The supplied valid length
        valid_len: usize,
        /// Number of key/value positions
        seq_len: usize,
    },

    /// A signed valid length below zero
    #[error("valid length {value} at index {index} is negative")]
    NegativeValidLength {
        /// Flat index of the offending entry
        index: usize,
        /// The supplied value
        value: i64,
    },

    /// Embedding lookup outside the vocabulary
    #[error("token id {token} is out of range for vocabulary of size {vocab_size}")]
    TokenOutOfRange {
        /// The offending id
        token: usize,
        /// Vocabulary size of the embedding table
        vocab_size: usize,
    },

    /// Invalid argument to a constructor or operation
    #[error("invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// Argument name
        arg: &'static str,
        /// Why it's invalid
        reason: String,
    },

    /// Error from an ndarray reshape, stack or concatenate
    #[error("ndarray shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}
