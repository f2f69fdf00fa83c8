// ============================================================
// Layer 2 — SmokeUseCase
// ============================================================
// Manual sanity check of the architecture:
//
//   Step 1: Validate params           (Layer 3 - domain)
//   Step 2: Build a fresh network     (Layer 5 - ml)
//   Step 3: Feed uniform random input (Layer 5 - ml)
//   Step 4: Report the logits shape
//
// With the default params this is the classic check:
// (1, 7, 256, 256) in → (1, 44, 256, 256) out.

use anyhow::{Context, Result};
use burn::{prelude::*, tensor::Distribution};

use crate::domain::params::NetworkParams;

#[derive(Debug, Clone)]
pub struct SmokeConfig {
    pub params: NetworkParams,
    pub batch:  usize,
    pub height: usize,
    pub width:  usize,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self { params: NetworkParams::default(), batch: 1, height: 256, width: 256 }
    }
}

impl SmokeConfig {
    pub fn input_dims(&self) -> [usize; 4] {
        [self.batch, self.params.num_channels, self.height, self.width]
    }
}

pub struct SmokeUseCase {
    config: SmokeConfig,
}

impl SmokeUseCase {
    pub fn new(config: SmokeConfig) -> Self {
        Self { config }
    }

    /// Returns the logits shape [batch, num_classes, height, width].
    pub fn execute<B: Backend>(&self, device: &B::Device) -> Result<[usize; 4]> {
        let cfg = &self.config;
        let dims = cfg.input_dims();
        cfg.params.check_input(dims).context("Smoke input does not fit the network")?;

        let model = cfg.params.init::<B>(device).context("Cannot build FastSurferCNN")?;
        tracing::info!(
            "Built FastSurferCNN ({} filters, {} classes)",
            cfg.params.num_filters, cfg.params.num_classes
        );

        let input = Tensor::<B, 4>::random(dims, Distribution::Uniform(0.0, 1.0), device);
        tracing::info!("Running forward pass on input {:?}", dims);

        let logits = model.try_forward(input)?;
        Ok(logits.dims())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_small_smoke_run() {
        let config = SmokeConfig {
            params: NetworkParams { num_filters: 4, num_classes: 6, ..Default::default() },
            batch:  2,
            height: 32,
            width:  16,
        };
        let shape = SmokeUseCase::new(config).execute::<NdArray>(&Default::default()).unwrap();
        assert_eq!(shape, [2, 6, 32, 16]);
    }

    #[test]
    fn test_rejects_indivisible_input() {
        let config = SmokeConfig { height: 250, ..Default::default() };
        assert!(SmokeUseCase::new(config).execute::<NdArray>(&Default::default()).is_err());
    }
}
