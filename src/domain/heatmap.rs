// ============================================================
// Layer 3 — Heatmap Domain Types
// ============================================================
// Plain descriptions of how a Grad-CAM heatmap is normalised
// and summarised. No tensors here; the ML layer turns these
// into tensor operations.

use serde::{Deserialize, Serialize};

/// What to do when dividing the heatmap by its maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HeatmapNormalization {
    /// Divide by the maximum. A map with no positive evidence has a
    /// maximum of zero and yields non-finite values.
    #[default]
    DivideByMax,

    /// Same as `DivideByMax`, but a map whose maximum is not
    /// positive comes back as all zeros.
    ZeroWhenFlat,
}

impl HeatmapNormalization {
    /// What to divide a map with maximum `max` by, or None for "zero it".
    pub fn divisor(self, max: f32) -> Option<f32> {
        match self {
            Self::DivideByMax => Some(max),
            Self::ZeroWhenFlat if max > 0.0 => Some(max),
            Self::ZeroWhenFlat => None,
        }
    }
}

/// Summary of a heatmap, for logging and the `explain` command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatmapStats {
    pub min:        f32,
    pub max:        f32,
    pub mean:       f32,
    /// Number of NaN / infinite entries
    pub non_finite: usize,
}

impl HeatmapStats {
    pub fn from_values(values: &[f32]) -> Self {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f64;
        let mut finite = 0usize;

        for &v in values {
            if !v.is_finite() {
                continue;
            }
            min = min.min(v);
            max = max.max(v);
            sum += v as f64;
            finite += 1;
        }

        let mean = if finite > 0 { (sum / finite as f64) as f32 } else { f32::NAN };
        if finite == 0 {
            min = f32::NAN;
            max = f32::NAN;
        }
        Self { min, max, mean, non_finite: values.len() - finite }
    }

    /// True when the map is the documented divide-by-zero case.
    pub fn is_degenerate(&self) -> bool {
        self.non_finite > 0
    }
}
