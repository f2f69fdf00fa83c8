// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs and enums describing the network and its
// explanations. Kept framework-free:
//   - NO Burn types here
//   - NO file I/O
//
// Everything in this layer is unit-testable without a device.

/// Architecture hyperparameters and their validation
pub mod params;

/// Typed library errors
pub mod error;

/// Heatmap normalisation policy and summary statistics
pub mod heatmap;
