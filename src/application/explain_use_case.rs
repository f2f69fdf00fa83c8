// ============================================================
// Layer 2 — ExplainUseCase
// ============================================================
// Runs Grad-CAM on random input and summarises the result:
//
//   Step 1: Validate params and class    (Layer 3 - domain)
//   Step 2: Build a fresh network        (Layer 5 - ml)
//   Step 3: Grad-CAM, single or batched  (Layer 5 - ml)
//   Step 4: Heatmap statistics           (Layer 3 - domain)
//   Step 5: Optional CSV of example 0    (Layer 6 - infra)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    tensor::{backend::AutodiffBackend, Distribution},
};
use std::path::PathBuf;

use crate::domain::{
    heatmap::{HeatmapNormalization, HeatmapStats},
    params::NetworkParams,
};
use crate::infra::heatmap_writer::HeatmapWriter;

#[derive(Debug, Clone)]
pub struct ExplainConfig {
    pub params:        NetworkParams,
    pub class_index:   usize,
    pub batch:         usize,
    pub height:        usize,
    pub width:         usize,
    /// Seed the backward pass from the whole batch
    pub batched:       bool,
    pub normalization: HeatmapNormalization,
    pub heatmap_csv:   Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExplainReport {
    /// [batch, height, width]
    pub heatmap_dims:  [usize; 3],
    pub stats:         HeatmapStats,
    /// Pixels whose arg-max label is the explained class
    pub class_pixels:  usize,
}

pub struct ExplainUseCase {
    config: ExplainConfig,
}

impl ExplainUseCase {
    pub fn new(config: ExplainConfig) -> Self {
        Self { config }
    }

    pub fn execute<B: AutodiffBackend>(&self, device: &B::Device) -> Result<ExplainReport> {
        let cfg = &self.config;
        cfg.params.check_class(cfg.class_index)?;

        let model = cfg.params.init::<B>(device).context("Cannot build FastSurferCNN")?;

        let dims = [cfg.batch, cfg.params.num_channels, cfg.height, cfg.width];
        let input = Tensor::<B, 4>::random(dims, Distribution::Uniform(0.0, 1.0), device);

        tracing::info!(
            "Grad-CAM for class {} on input {:?} ({} seed)",
            cfg.class_index, dims, if cfg.batched { "batched" } else { "single" }
        );
        let cam = if cfg.batched {
            model.grad_cam_batch_with(input, cfg.class_index, cfg.normalization)?
        } else {
            model.grad_cam_with(input, cfg.class_index, cfg.normalization)?
        };

        let heatmap_dims = cam.heatmap.dims();
        let [_, height, width] = heatmap_dims;

        let values = cam.heatmap_values()?;
        let stats = HeatmapStats::from_values(&values);
        if stats.is_degenerate() {
            tracing::warn!("{} heatmap values are not finite", stats.non_finite);
        }

        let class_pixels = cam
            .label_values()?
            .into_iter()
            .filter(|&label| label == cfg.class_index as i64)
            .count();

        if let Some(path) = &cfg.heatmap_csv {
            HeatmapWriter::new(path).write(&values[..height * width], height, width)?;
        }

        Ok(ExplainReport { heatmap_dims, stats, class_pixels })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn small_config() -> ExplainConfig {
        ExplainConfig {
            params: NetworkParams { num_filters: 4, num_classes: 3, ..Default::default() },
            class_index:   1,
            batch:         1,
            height:        16,
            width:         16,
            batched:       false,
            normalization: HeatmapNormalization::ZeroWhenFlat,
            heatmap_csv:   None,
        }
    }

    #[test]
    fn test_report_and_csv() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("cam.csv");
        let config = ExplainConfig { heatmap_csv: Some(csv.clone()), ..small_config() };

        let report = ExplainUseCase::new(config).execute::<TestBackend>(&Default::default()).unwrap();
        assert_eq!(report.heatmap_dims, [1, 16, 16]);
        // ZeroWhenFlat never yields non-finite values
        assert_eq!(report.stats.non_finite, 0);
        assert!(report.stats.max <= 1.0);
        assert!(report.class_pixels <= 16 * 16);

        let text = std::fs::read_to_string(csv).unwrap();
        assert_eq!(text.lines().count(), 16);
    }

    #[test]
    fn test_batched_report() {
        let config = ExplainConfig { batched: true, batch: 2, ..small_config() };
        let report = ExplainUseCase::new(config).execute::<TestBackend>(&Default::default()).unwrap();
        assert_eq!(report.heatmap_dims, [2, 16, 16]);
    }

    #[test]
    fn test_rejects_unknown_class() {
        let config = ExplainConfig { class_index: 3, ..small_config() };
        assert!(ExplainUseCase::new(config).execute::<TestBackend>(&Default::default()).is_err());
    }
}
