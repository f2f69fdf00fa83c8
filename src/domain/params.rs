// ============================================================
// Layer 3 — Network Parameters
// ============================================================
// The hyperparameters that fully describe a FastSurferCNN
// architecture. Field names match the keys of the JSON config
// files so a saved config can be read straight back:
//
//   {
//     "num_channels": 7,    ← input slices (thick-slab of 7)
//     "num_filters": 64,    ← same filter count in every block
//     "kernel_h": 5,
//     "kernel_w": 5,
//     "stride_conv": 1,
//     "pool": 2,
//     "stride_pool": 2,
//     "num_classes": 44,
//     "kernel_c": 1,        ← classifier kernel size
//     "input": true         ← first encoder is the input variant
//   }
//
// The value is immutable. Later stages receive an updated COPY
// via with_num_channels() rather than a mutated shared dict.
//
// Reference: Rust Book §5 (Structs), Henschel et al. (2020) FastSurfer

use serde::{Deserialize, Serialize};

use crate::domain::error::NetworkError;

/// Number of pooling stages in the encoder arm.
pub const ENCODER_DEPTH: usize = 4;

/// "Same" padding for a k×k convolution with odd k.
pub fn same_padding(kernel: [usize; 2]) -> (usize, usize) {
    ((kernel[0] - 1) / 2, (kernel[1] - 1) / 2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParams {
    pub num_channels: usize,
    pub num_filters:  usize,
    pub kernel_h:     usize,
    pub kernel_w:     usize,
    pub stride_conv:  usize,
    pub pool:         usize,
    pub stride_pool:  usize,
    pub num_classes:  usize,
    pub kernel_c:     usize,
    pub input:        bool,
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            num_channels: 7,
            num_filters:  64,
            kernel_h:     5,
            kernel_w:     5,
            stride_conv:  1,
            pool:         2,
            stride_pool:  2,
            num_classes:  44,
            kernel_c:     1,
            input:        true,
        }
    }
}

impl NetworkParams {
    /// Copy of these params with a different input channel count.
    ///
    /// Used between stages: after the first encoder every block
    /// sees `num_filters` channels.
    pub fn with_num_channels(self, num_channels: usize) -> Self {
        Self { num_channels, ..self }
    }

    /// Params for every stage after the first encoder.
    pub fn inner_stage(self) -> Self {
        self.with_num_channels(self.num_filters)
    }

    /// Spatial sizes must be divisible by this to survive all
    /// pooling stages and unpool back to the original size.
    /// `None` when `stride_pool^4` does not fit in a usize.
    pub fn spatial_multiple(&self) -> Option<usize> {
        self.stride_pool.checked_pow(ENCODER_DEPTH as u32)
    }

    pub fn validate(&self) -> Result<(), NetworkError> {
        let counts = [
            ("num_channels", self.num_channels),
            ("num_filters",  self.num_filters),
            ("kernel_h",     self.kernel_h),
            ("kernel_w",     self.kernel_w),
            ("stride_conv",  self.stride_conv),
            ("pool",         self.pool),
            ("stride_pool",  self.stride_pool),
            ("num_classes",  self.num_classes),
            ("kernel_c",     self.kernel_c),
        ];
        if let Some((name, _)) = counts.iter().find(|(_, v)| *v == 0) {
            return Err(NetworkError::InvalidParams(format!("{name} must be > 0")));
        }

        // Maxout fuses a block's input with its output, so every
        // convolution has to keep the spatial size.
        if self.kernel_h % 2 == 0 || self.kernel_w % 2 == 0 || self.kernel_c % 2 == 0 {
            return Err(NetworkError::InvalidParams(format!(
                "kernels must be odd, got {}x{} (classifier {})",
                self.kernel_h, self.kernel_w, self.kernel_c
            )));
        }
        if self.stride_conv != 1 {
            return Err(NetworkError::InvalidParams(format!(
                "stride_conv must be 1, got {}",
                self.stride_conv
            )));
        }

        // Unpooling places each value back at its recorded index,
        // which needs non-overlapping windows.
        if self.pool != self.stride_pool {
            return Err(NetworkError::InvalidParams(format!(
                "pool ({}) must equal stride_pool ({})",
                self.pool, self.stride_pool
            )));
        }
        if self.spatial_multiple().is_none() {
            return Err(NetworkError::InvalidParams(format!(
                "stride_pool {} is too large for {} pooling stages",
                self.stride_pool, ENCODER_DEPTH
            )));
        }

        if !self.input && self.num_channels != self.num_filters {
            return Err(NetworkError::InvalidParams(format!(
                "without an input block num_channels ({}) must equal num_filters ({})",
                self.num_channels, self.num_filters
            )));
        }
        Ok(())
    }

    /// Check an input shape `[batch, channels, height, width]`.
    pub fn check_input(&self, dims: [usize; 4]) -> Result<(), NetworkError> {
        let [batch, channels, height, width] = dims;
        if batch == 0 {
            return Err(NetworkError::InputShape("empty batch".to_string()));
        }
        if channels != self.num_channels {
            return Err(NetworkError::InputShape(format!(
                "expected {} channels, got {}",
                self.num_channels, channels
            )));
        }
        let multiple = self.spatial_multiple().ok_or_else(|| {
            NetworkError::InvalidParams(format!("stride_pool {} overflows", self.stride_pool))
        })?;
        if height == 0 || width == 0 || height % multiple != 0 || width % multiple != 0 {
            return Err(NetworkError::InputShape(format!(
                "spatial size {height}x{width} must be a non-zero multiple of {multiple}"
            )));
        }
        Ok(())
    }

    pub fn check_class(&self, class_index: usize) -> Result<(), NetworkError> {
        if class_index >= self.num_classes {
            return Err(NetworkError::ClassOutOfRange {
                class_index,
                num_classes: self.num_classes,
            });
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let p = NetworkParams::default();
        assert!(p.validate().is_ok());
        assert_eq!(p.spatial_multiple(), Some(16));
    }

    #[test]
    fn test_same_padding() {
        assert_eq!(same_padding([5, 5]), (2, 2));
        assert_eq!(same_padding([3, 7]), (1, 3));
        assert_eq!(same_padding([1, 1]), (0, 0));
    }

    #[test]
    fn test_rejects_pool_stride_that_overflows() {
        let p = NetworkParams { pool: 70_000, stride_pool: 70_000, ..Default::default() };
        assert_eq!(p.spatial_multiple(), None);
        assert!(matches!(p.validate(), Err(NetworkError::InvalidParams(_))));
        // Unvalidated params still fail cleanly instead of overflowing
        assert!(matches!(
            p.check_input([1, 7, 256, 256]),
            Err(NetworkError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_inner_stage_copies() {
        let p = NetworkParams::default();
        let inner = p.inner_stage();
        // The original value is untouched
        assert_eq!(p.num_channels, 7);
        assert_eq!(inner.num_channels, inner.num_filters);
        assert_eq!(inner.num_classes, p.num_classes);
    }

    #[test]
    fn test_rejects_overlapping_pool() {
        let p = NetworkParams { pool: 3, ..Default::default() };
        assert!(matches!(p.validate(), Err(NetworkError::InvalidParams(_))));
    }

    #[test]
    fn test_rejects_even_kernel() {
        let p = NetworkParams { kernel_w: 4, ..Default::default() };
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_non_input_block_needs_matching_channels() {
        let p = NetworkParams { input: false, ..Default::default() };
        assert!(p.validate().is_err());
        let p = NetworkParams { input: false, num_channels: 64, ..Default::default() };
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_check_input() {
        let p = NetworkParams::default();
        assert!(p.check_input([1, 7, 256, 256]).is_ok());
        assert!(p.check_input([1, 6, 256, 256]).is_err());
        assert!(p.check_input([1, 7, 100, 256]).is_err());
        assert!(p.check_input([0, 7, 256, 256]).is_err());
    }

    #[test]
    fn test_check_class() {
        let p = NetworkParams::default();
        assert!(p.check_class(43).is_ok());
        assert!(matches!(
            p.check_class(44),
            Err(NetworkError::ClassOutOfRange { class_index: 44, num_classes: 44 })
        ));
    }

    #[test]
    fn test_json_keys() {
        let json = serde_json::to_string(&NetworkParams::default()).unwrap();
        assert!(json.contains("\"num_channels\":7"));
        assert!(json.contains("\"input\":true"));
    }
}
