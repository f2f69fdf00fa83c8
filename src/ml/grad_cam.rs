// ============================================================
// Layer 5 — Grad-CAM Explanations
// ============================================================
// Gradient-weighted class activation mapping on the
// pre-classifier feature map A (shape [B, F, H, W]):
//
//   1. logits = classifier(A), with A cut from the encoder/decoder
//      graph and re-marked as a gradient-tracked leaf
//   2. seed = chosen class logits, reduced to a scalar
//   3. dSeed/dA captured from the backward pass
//   4. alpha_k = mean over (H, W) of dSeed/dA_k
//   5. cam     = ReLU(mean_k(alpha_k · A_k))
//   6. heatmap = cam / max(cam)
//
// Why cut the graph at A?
//   - The gradient we need is dSeed/dA, not dSeed/dweights
//   - Making A a leaf lets Burn hand it back directly via grad()
//   - The encoder/decoder weights get no gradients at all
//
// Each backward pass returns its own gradient set, so there is no
// shared gradient slot to clear or to race on. The captured
// gradient travels back to the caller inside an Attribution.
//
// Reference: Selvaraju et al. (2017) Grad-CAM
//            Burn Book §5 (Autodiff)

use burn::{
    prelude::*,
    tensor::{activation::relu, backend::AutodiffBackend, Element, TensorData},
};

use crate::domain::{error::NetworkError, heatmap::HeatmapNormalization};
use crate::ml::{network::FastSurferCnn, stages::ClassifierStage};

/// Forward pass with the pre-classifier features exposed as a
/// gradient-tracked leaf.
#[derive(Debug, Clone)]
pub struct ExplainedForward<B: AutodiffBackend> {
    /// [B, num_classes, H, W]
    pub logits:   Tensor<B, 4>,
    /// [B, num_filters, H, W]
    pub features: Tensor<B, 4>,
}

/// Which logits start the backward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackwardSeed {
    /// Sum of one example's class map: `logits[index, class, :, :]`
    Example { index: usize, class: usize },

    /// The batched seed: the class slice is summed over its height
    /// axis and each column sum is weighted by that height, i.e.
    /// `H × Σ logits[:, class, :, :]`.
    BatchColumns { class: usize },
}

impl BackwardSeed {
    pub fn class(&self) -> usize {
        match *self {
            Self::Example { class, .. } | Self::BatchColumns { class } => class,
        }
    }

    fn scalar<B: AutodiffBackend>(&self, logits: &Tensor<B, 4>) -> Tensor<B, 1> {
        let [batch, _, height, width] = logits.dims();
        match *self {
            Self::Example { index, class } => logits
                .clone()
                .slice([index..index + 1, class..class + 1, 0..height, 0..width])
                .sum(),
            Self::BatchColumns { class } => {
                let slice = logits.clone().slice([0..batch, class..class + 1, 0..height, 0..width]);
                // [B, 1, 1, W] each entry = H
                let upstream = slice.ones_like().sum_dim(2).detach();
                (slice.sum_dim(2) * upstream).sum()
            }
        }
    }
}

/// Result of one backward-with-attribution pass. All tensors live on
/// the inner (non-autodiff) backend.
#[derive(Debug, Clone)]
pub struct Attribution<B: AutodiffBackend> {
    seed:       BackwardSeed,
    /// [B, num_classes, H, W]
    logits:     Tensor<B::InnerBackend, 4>,
    /// A, [B, num_filters, H, W]
    activation: Tensor<B::InnerBackend, 4>,
    /// dSeed/dA, same shape as `activation`
    gradient:   Tensor<B::InnerBackend, 4>,
}

/// Grad-CAM output.
#[derive(Debug, Clone)]
pub struct GradCam<B: Backend> {
    /// [B, H, W], normalised by its global maximum
    pub heatmap: Tensor<B, 3>,
    /// Arg-max labels of the full logits, [B, H, W]
    pub labels:  Tensor<B, 3, Int>,
}

impl<B: AutodiffBackend> Attribution<B> {
    pub fn seed(&self) -> BackwardSeed {
        self.seed
    }

    pub fn logits(&self) -> &Tensor<B::InnerBackend, 4> {
        &self.logits
    }

    /// The pre-classifier activations A_k (detached).
    pub fn activation(&self) -> &Tensor<B::InnerBackend, 4> {
        &self.activation
    }

    /// dSeed/dA, same shape as the activations.
    pub fn activation_gradient(&self) -> &Tensor<B::InnerBackend, 4> {
        &self.gradient
    }

    /// alpha_k per example: gradient averaged over H and W → [B, F, 1, 1]
    pub fn channel_weights(&self) -> Tensor<B::InnerBackend, 4> {
        self.gradient.clone().mean_dim(3).mean_dim(2)
    }

    pub fn labels(&self) -> Tensor<B::InnerBackend, 3, Int> {
        let [batch, _, height, width] = self.logits.dims();
        self.logits.clone().argmax(1).reshape([batch, height, width])
    }

    /// Heatmap [B, H, W] under the given normalisation policy.
    pub fn heatmap(&self, normalization: HeatmapNormalization) -> Tensor<B::InnerBackend, 3> {
        // [B, F, H, W] * [B, F, 1, 1] broadcasts per example and channel
        let weighted = self.activation.clone() * self.channel_weights();
        let cam = relu(weighted.mean_dim(1));
        let [batch, _, height, width] = cam.dims();
        normalize_heatmap(cam.reshape([batch, height, width]), normalization)
    }

    pub fn grad_cam(&self, normalization: HeatmapNormalization) -> GradCam<B::InnerBackend> {
        GradCam { heatmap: self.heatmap(normalization), labels: self.labels() }
    }
}

impl<B: Backend> GradCam<B> {
    /// Heatmap values in row-major [B, H, W] order.
    pub fn heatmap_values(&self) -> Result<Vec<f32>, NetworkError> {
        read_values(self.heatmap.to_data())
    }

    /// Label values in row-major [B, H, W] order.
    pub fn label_values(&self) -> Result<Vec<i64>, NetworkError> {
        read_values(self.labels.to_data())
    }
}

/// Copy tensor data out as `E`, failing instead of panicking when the
/// stored element type differs.
pub fn read_values<E: Element>(data: TensorData) -> Result<Vec<E>, NetworkError> {
    data.to_vec::<E>()
        .map_err(|err| NetworkError::TensorData(format!("{err:?}")))
}

/// Divide a non-negative map by its global maximum.
pub fn normalize_heatmap<B: Backend>(
    heatmap:       Tensor<B, 3>,
    normalization: HeatmapNormalization,
) -> Tensor<B, 3> {
    let max = heatmap.clone().max().into_scalar().elem::<f32>();
    if max.is_nan() || max <= 0.0 {
        tracing::warn!(
            "Grad-CAM map has no positive evidence (max = {}), policy {:?}",
            max, normalization,
        );
    }
    match normalization.divisor(max) {
        Some(divisor) => heatmap.div_scalar(divisor),
        None => heatmap.zeros_like(),
    }
}

impl<B: AutodiffBackend> FastSurferCnn<B> {
    /// `forward` with the features exposed for gradient capture.
    /// Same logits as `forward`.
    pub fn forward_explained(&self, x: Tensor<B, 4>) -> ExplainedForward<B> {
        let features = self.features(x).detach().require_grad();
        let logits = self.classifier.classify(features.clone());
        ExplainedForward { logits, features }
    }

    /// Run a forward pass, back-propagate `seed` to the features and
    /// return what was captured.
    pub fn attribute(
        &self,
        x:    Tensor<B, 4>,
        seed: BackwardSeed,
    ) -> Result<Attribution<B>, NetworkError> {
        let params = self.params();
        params.check_input(x.dims())?;
        params.check_class(seed.class())?;
        if let BackwardSeed::Example { index, .. } = seed {
            let batch = x.dims()[0];
            if index >= batch {
                return Err(NetworkError::InputShape(format!(
                    "example {index} out of range for batch of {batch}"
                )));
            }
        }

        let ExplainedForward { logits, features } = self.forward_explained(x);
        let grads = seed.scalar(&logits).backward();
        // None if the seed never touched the features
        let gradient = features.grad(&grads).ok_or(NetworkError::MissingGradient)?;

        tracing::debug!("Captured attribution gradient {:?} for {:?}", gradient.dims(), seed);

        Ok(Attribution {
            seed,
            logits: logits.inner(),
            activation: features.inner(),
            gradient,
        })
    }

    /// Grad-CAM for `class_index` seeded from the first example.
    pub fn grad_cam(
        &self,
        x:           Tensor<B, 4>,
        class_index: usize,
    ) -> Result<GradCam<B::InnerBackend>, NetworkError> {
        self.grad_cam_with(x, class_index, HeatmapNormalization::default())
    }

    pub fn grad_cam_with(
        &self,
        x:             Tensor<B, 4>,
        class_index:   usize,
        normalization: HeatmapNormalization,
    ) -> Result<GradCam<B::InnerBackend>, NetworkError> {
        let seed = BackwardSeed::Example { index: 0, class: class_index };
        Ok(self.attribute(x, seed)?.grad_cam(normalization))
    }

    /// Grad-CAM for `class_index` seeded from the whole batch.
    pub fn grad_cam_batch(
        &self,
        x:           Tensor<B, 4>,
        class_index: usize,
    ) -> Result<GradCam<B::InnerBackend>, NetworkError> {
        self.grad_cam_batch_with(x, class_index, HeatmapNormalization::default())
    }

    pub fn grad_cam_batch_with(
        &self,
        x:             Tensor<B, 4>,
        class_index:   usize,
        normalization: HeatmapNormalization,
    ) -> Result<GradCam<B::InnerBackend>, NetworkError> {
        let seed = BackwardSeed::BatchColumns { class: class_index };
        Ok(self.attribute(x, seed)?.grad_cam(normalization))
    }
}
