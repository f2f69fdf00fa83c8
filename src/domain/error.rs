// ============================================================
// Layer 3 — Network Errors
// ============================================================
// Typed errors for the library surface. The application and
// CLI layers wrap these in anyhow with extra context.
//
// Runtime tensor failures (device memory, kernel errors) are
// NOT represented here — they surface as Burn panics.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("invalid network parameters: {0}")]
    InvalidParams(String),

    #[error("invalid input shape: {0}")]
    InputShape(String),

    #[error("class index {class_index} out of range for {num_classes} classes")]
    ClassOutOfRange { class_index: usize, num_classes: usize },

    /// The backward pass never reached the pre-classifier features.
    #[error("no gradient was captured at the pre-classifier features")]
    MissingGradient,

    #[error("failed to read tensor data: {0}")]
    TensorData(String),
}
