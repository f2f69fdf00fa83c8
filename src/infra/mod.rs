// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// File-backed concerns shared by the use cases:
//
//   config_store.rs   — NetworkParams ⇄ JSON, validated on load
//
//   heatmap_writer.rs — Grad-CAM heatmap → CSV for plotting
//
// Model weights are never written here; the network is always
// built fresh from its params.
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Rust Book §12 (I/O and File Handling)

/// Network config load/save
pub mod config_store;

/// Heatmap CSV export
pub mod heatmap_writer;
