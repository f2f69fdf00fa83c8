// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains ALL Burn framework specific code.
// The domain layer describes the network in plain Rust; this
// one turns it into tensors.
//
// What's in this layer:
//
//   stages.rs   — Capability traits for encoder, bottleneck,
//                 decoder and classifier stages, and the
//                 pipeline that pairs encoder k with decoder k
//
//   blocks.rs   — The competitive (maxout) dense, encoder,
//                 decoder and classifier blocks, plus
//                 index-guided max-unpooling
//
//   network.rs  — FastSurferCnn: construction, features,
//                 forward and per-pixel label prediction
//
//   grad_cam.rs — Backward-with-attribution and Grad-CAM
//                 heatmaps (needs an autodiff backend)
//
// Reference: Burn Book §3 (Building Blocks), §5 (Autodiff)
//            Henschel et al. (2020) FastSurfer

/// Stage traits and encoder/decoder pairing
pub mod stages;

/// Competitive dense / encoder / decoder / classifier blocks
pub mod blocks;

/// The FastSurferCNN network
pub mod network;

/// Grad-CAM explanations
pub mod grad_cam;
