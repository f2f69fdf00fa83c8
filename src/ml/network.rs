// ============================================================
// Layer 5 — FastSurferCNN Network
// ============================================================
// Owns the nine competitive blocks plus the classifier and
// sequences them into the full forward graph:
//
//   input [B, C_in, H, W]
//     │ encode1 (input block)   ─► skip1, idx1   [B, F, H,    W   ]
//     │ encode2                 ─► skip2, idx2   [B, F, H/2,  W/2 ]
//     │ encode3                 ─► skip3, idx3   [B, F, H/4,  W/4 ]
//     │ encode4                 ─► skip4, idx4   [B, F, H/8,  W/8 ]
//     ▼ bottleneck                               [B, F, H/16, W/16]
//     │ decode4 ◄─ skip4, idx4
//     │ decode3 ◄─ skip3, idx3
//     │ decode2 ◄─ skip2, idx2
//     │ decode1 ◄─ skip1, idx1                   [B, F, H,    W   ]
//     ▼ classifier                               [B, K, H,    W   ]
//
// Grad-CAM entry points live in grad_cam.rs since they need an
// autodiff backend.
//
// Reference: Henschel et al. (2020) FastSurfer — a fast and
//            accurate deep learning based neuroimaging pipeline

use burn::{module::Ignored, prelude::*};

use crate::domain::{error::NetworkError, params::NetworkParams};
use crate::ml::blocks::{
    ClassifierBlock, CompetitiveDecoderBlock, CompetitiveDenseBlock, CompetitiveEncoderBlock,
};
use crate::ml::stages::{run_pipeline, ClassifierStage};

impl NetworkParams {
    /// Validate and build a freshly initialised network.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<FastSurferCnn<B>, NetworkError> {
        self.validate()?;

        // Descending arm
        let encode1 = if self.input {
            CompetitiveEncoderBlock::new_input(self, device)
        } else {
            CompetitiveEncoderBlock::new(self, device)
        };
        let inner = self.inner_stage();
        let encode2 = CompetitiveEncoderBlock::new(&inner, device);
        let encode3 = CompetitiveEncoderBlock::new(&inner, device);
        let encode4 = CompetitiveEncoderBlock::new(&inner, device);
        let bottleneck = CompetitiveDenseBlock::new(&inner, device);

        // Ascending arm
        let decode4 = CompetitiveDecoderBlock::new(&inner, device);
        let decode3 = CompetitiveDecoderBlock::new(&inner, device);
        let decode2 = CompetitiveDecoderBlock::new(&inner, device);
        let decode1 = CompetitiveDecoderBlock::new(&inner, device);

        let classifier = ClassifierBlock::new(&inner, device);

        tracing::debug!(
            "Built FastSurferCNN: {} → {} filters → {} classes, kernel {}x{}, input block: {}",
            self.num_channels, self.num_filters, self.num_classes,
            self.kernel_h, self.kernel_w, self.input,
        );

        Ok(FastSurferCnn {
            encode1, encode2, encode3, encode4,
            bottleneck,
            decode4, decode3, decode2, decode1,
            classifier,
            params: Ignored(*self),
        })
    }
}

#[derive(Module, Debug)]
pub struct FastSurferCnn<B: Backend> {
    pub encode1:    CompetitiveEncoderBlock<B>,
    pub encode2:    CompetitiveEncoderBlock<B>,
    pub encode3:    CompetitiveEncoderBlock<B>,
    pub encode4:    CompetitiveEncoderBlock<B>,
    pub bottleneck: CompetitiveDenseBlock<B>,
    pub decode4:    CompetitiveDecoderBlock<B>,
    pub decode3:    CompetitiveDecoderBlock<B>,
    pub decode2:    CompetitiveDecoderBlock<B>,
    pub decode1:    CompetitiveDecoderBlock<B>,
    pub classifier: ClassifierBlock<B>,
    /// The params the network was built from (not a learnable record)
    pub params:     Ignored<NetworkParams>,
}

impl<B: Backend> FastSurferCnn<B> {
    pub fn params(&self) -> &NetworkParams {
        &self.params.0
    }

    /// Pre-classifier feature map.
    /// input [B, C_in, H, W] → [B, num_filters, H, W]
    pub fn features(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        run_pipeline(
            x,
            [&self.encode1, &self.encode2, &self.encode3, &self.encode4],
            &self.bottleneck,
            [&self.decode1, &self.decode2, &self.decode3, &self.decode4],
        )
    }

    /// input [B, C_in, H, W] → logits [B, num_classes, H, W]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.classifier.classify(self.features(x))
    }

    /// Per-pixel arg-max label map [B, H, W].
    pub fn forward_label(&self, x: Tensor<B, 4>) -> Tensor<B, 3, Int> {
        let logits = self.forward(x);
        let [batch, _, height, width] = logits.dims();
        logits.argmax(1).reshape([batch, height, width])
    }

    /// Recompute the pre-classifier activations A_k for `x`,
    /// cut from the autodiff graph.
    pub fn activation(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.features(x).detach()
    }

    /// `forward` behind an input shape check.
    pub fn try_forward(&self, x: Tensor<B, 4>) -> Result<Tensor<B, 4>, NetworkError> {
        self.params().check_input(x.dims())?;
        Ok(self.forward(x))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    fn small_params() -> NetworkParams {
        NetworkParams {
            num_channels: 7,
            num_filters:  8,
            kernel_h:     3,
            kernel_w:     3,
            num_classes:  5,
            ..Default::default()
        }
    }

    fn random_input(dims: [usize; 4]) -> Tensor<TestBackend, 4> {
        Tensor::random(dims, Distribution::Uniform(0.0, 1.0), &Default::default())
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = small_params().init::<TestBackend>(&device).unwrap();

        let logits = model.forward(random_input([2, 7, 32, 32]));
        assert_eq!(logits.dims(), [2, 5, 32, 32]);
    }

    #[test]
    fn test_features_keep_resolution() {
        let device = Default::default();
        let model = small_params().init::<TestBackend>(&device).unwrap();

        let features = model.features(random_input([1, 7, 16, 48]));
        assert_eq!(features.dims(), [1, 8, 16, 48]);
    }

    #[test]
    fn test_forward_label_range_and_determinism() {
        let device = Default::default();
        let model = small_params().init::<TestBackend>(&device).unwrap();
        let x = random_input([2, 7, 32, 32]);

        let first = model.forward_label(x.clone());
        let second = model.forward_label(x);
        assert_eq!(first.dims(), [2, 32, 32]);

        let first: Vec<i64> = first.into_data().iter::<i64>().collect();
        let second: Vec<i64> = second.into_data().iter::<i64>().collect();
        assert!(first.iter().all(|&l| (0..5).contains(&l)));
        assert_eq!(first, second);
    }

    #[test]
    fn test_non_input_first_stage() {
        let device = Default::default();
        let params = NetworkParams { input: false, num_channels: 8, ..small_params() };
        let model = params.init::<TestBackend>(&device).unwrap();
        assert!(!model.encode1.block.is_input_stage());

        let logits = model.forward(random_input([1, 8, 16, 16]));
        assert_eq!(logits.dims(), [1, 5, 16, 16]);
    }

    #[test]
    fn test_inner_stages_see_filter_channels() {
        let device = Default::default();
        let model = small_params().init::<TestBackend>(&device).unwrap();

        assert_eq!(model.encode1.block.conv0.weight.val().dims(), [8, 7, 3, 3]);
        for conv in [
            &model.encode2.block.conv0,
            &model.bottleneck.conv0,
            &model.decode1.block.conv0,
        ] {
            assert_eq!(conv.weight.val().dims(), [8, 8, 3, 3]);
        }
        assert_eq!(model.classifier.conv.weight.val().dims(), [5, 8, 1, 1]);
    }

    #[test]
    fn test_fresh_networks_differ_in_weights_only() {
        let device = Default::default();
        let a = small_params().init::<TestBackend>(&device).unwrap();
        let b = small_params().init::<TestBackend>(&device).unwrap();

        let wa = a.encode1.block.conv0.weight.val();
        let wb = b.encode1.block.conv0.weight.val();
        assert_eq!(wa.dims(), wb.dims());

        let wa: Vec<f32> = wa.into_data().iter::<f32>().collect();
        let wb: Vec<f32> = wb.into_data().iter::<f32>().collect();
        assert_ne!(wa, wb);

        let x = random_input([1, 7, 16, 16]);
        assert_eq!(a.forward(x.clone()).dims(), b.forward(x).dims());
    }

    #[test]
    fn test_try_forward_rejects_bad_input() {
        let device = Default::default();
        let model = small_params().init::<TestBackend>(&device).unwrap();

        let err = model.try_forward(random_input([1, 7, 20, 32])).unwrap_err();
        assert!(matches!(err, NetworkError::InputShape(_)));
        assert!(model.try_forward(random_input([1, 7, 16, 16])).is_ok());
    }

    #[test]
    fn test_init_rejects_invalid_params() {
        let device = Default::default();
        let params = NetworkParams { stride_pool: 3, ..small_params() };
        assert!(params.init::<TestBackend>(&device).is_err());
    }

    #[test]
    #[ignore = "full-resolution 64-filter forward pass is slow on CPU"]
    fn test_default_config_scenario() {
        let device = Default::default();
        let model = NetworkParams::default().init::<TestBackend>(&device).unwrap();

        let out = model.forward(random_input([1, 7, 256, 256]));
        assert_eq!(out.dims(), [1, 44, 256, 256]);
    }
}
