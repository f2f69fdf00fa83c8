// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal each.
//
// Rules for this layer:
//   - No tensor math here (that's Layer 5)
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Both use cases are generic over the Burn backend so the CLI
// can pick GPU or CPU and the tests can run on NdArray.

/// Build the network and push random input through it
pub mod smoke_use_case;

/// Grad-CAM on random input with a statistics report
pub mod explain_use_case;
