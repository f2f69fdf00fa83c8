// ============================================================
// Layer 5 — Competitive Blocks (Burn)
// ============================================================
// The building blocks of FastSurferCNN. Instead of concatenating
// feature maps (DenseNet style) every fusion point takes the
// element-wise MAXIMUM of its inputs ("maxout"), so the channel
// count stays at num_filters everywhere:
//
//   CompetitiveDenseBlock
//     x ─► PReLU ─► Conv k×k ─► BN ─┐
//     └──────────────────────────── max ─► x1
//     x1 ─► PReLU ─► Conv k×k ─► BN ─┐
//     └──────────────────────────── max ─► x2
//     x2 ─► PReLU ─► Conv 1×1 ─► BN ─► out
//
//   Encoder = dense block + max-pool that RECORDS the argmax index
//   Decoder = unpool to the recorded index + max with skip + dense block
//
// All convolutions start from Kaiming-normal (fan-out, leaky-ReLU
// gain √2); batch norms start from scale 1, bias 0.
//
// Why maxout instead of concatenation?
//   - The channel count never grows, so every block has the same shape
//   - Each fusion point keeps the stronger response per unit
//   - Skip connections can be fused the same way in the decoder
//
// Reference: Burn Book §3 (Building Blocks)
//            Henschel et al. (2020) FastSurfer
//            Estrada et al. (2018) Competitive Dense Fully Convolutional Networks

use std::f64::consts::SQRT_2;

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, Initializer, PRelu, PReluConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::{module::max_pool2d_with_indices, BasicOps},
};

use crate::domain::params::{same_padding, NetworkParams};
use crate::ml::stages::{
    ClassifierStage, DecoderStage, DenseStage, EncoderOutput, EncoderStage, SkipConnection,
};

fn kaiming_fan_out() -> Initializer {
    Initializer::KaimingNormal { gain: SQRT_2, fan_out_only: true }
}

fn conv2d<B: Backend>(
    channels: [usize; 2],
    kernel:   [usize; 2],
    stride:   usize,
    device:   &B::Device,
) -> Conv2d<B> {
    let (pad_h, pad_w) = same_padding(kernel);
    Conv2dConfig::new(channels, kernel)
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(pad_h, pad_w))
        .with_initializer(kaiming_fan_out())
        .init(device)
}

// ─── CompetitiveDenseBlock ────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct CompetitiveDenseBlock<B: Backend> {
    /// Present only on the input-stage variant: normalises the raw slices
    pub input_norm: Option<BatchNorm<B>>,
    /// k×k, num_channels → num_filters
    pub conv0:      Conv2d<B>,
    /// k×k, num_filters → num_filters
    pub conv1:      Conv2d<B>,
    /// 1×1 channel mixing at the end of the block
    pub conv2:      Conv2d<B>,
    pub bn1:        BatchNorm<B>,
    pub bn2:        BatchNorm<B>,
    pub bn3:        BatchNorm<B>,
    /// One slope shared by every activation in the block
    pub prelu:      PRelu<B>,
}

impl<B: Backend> CompetitiveDenseBlock<B> {
    /// Regular block: its input and output both have `num_filters`
    /// channels so the first maxout can see the raw input.
    pub fn new(params: &NetworkParams, device: &B::Device) -> Self {
        Self::build(params, None, device)
    }

    /// Input-stage block: `num_channels` → `num_filters`. The input
    /// channel count differs, so there is no maxout against `x`.
    pub fn new_input(params: &NetworkParams, device: &B::Device) -> Self {
        let input_norm = BatchNormConfig::new(params.num_channels).init(device);
        Self::build(params, Some(input_norm), device)
    }

    fn build(
        params:     &NetworkParams,
        input_norm: Option<BatchNorm<B>>,
        device:     &B::Device,
    ) -> Self {
        let filters = params.num_filters;
        let kernel  = [params.kernel_h, params.kernel_w];
        let stride  = params.stride_conv;
        Self {
            input_norm,
            conv0: conv2d([params.num_channels, filters], kernel, stride, device),
            conv1: conv2d([filters, filters], kernel, stride, device),
            conv2: conv2d([filters, filters], [1, 1], stride, device),
            bn1:   BatchNormConfig::new(filters).init(device),
            bn2:   BatchNormConfig::new(filters).init(device),
            bn3:   BatchNormConfig::new(filters).init(device),
            prelu: PReluConfig::new().init(device),
        }
    }

    pub fn is_input_stage(&self) -> bool {
        self.input_norm.is_some()
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x1_max = match &self.input_norm {
            Some(bn0) => self.bn1.forward(self.conv0.forward(bn0.forward(x))),
            None => {
                let x1_bn = self.bn1.forward(self.conv0.forward(self.prelu.forward(x.clone())));
                x1_bn.max_pair(x)
            }
        };

        let x2_bn  = self.bn2.forward(self.conv1.forward(self.prelu.forward(x1_max.clone())));
        let x2_max = x2_bn.max_pair(x1_max);

        self.bn3.forward(self.conv2.forward(self.prelu.forward(x2_max)))
    }
}

impl<B: Backend> DenseStage<B> for CompetitiveDenseBlock<B> {
    fn dense(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward(x)
    }
}

// ─── CompetitiveEncoderBlock ──────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct CompetitiveEncoderBlock<B: Backend> {
    pub block:  CompetitiveDenseBlock<B>,
    /// Max-pool window edge
    pub pool:   usize,
    /// Max-pool stride; equals `pool` so windows never overlap
    pub stride: usize,
}

impl<B: Backend> CompetitiveEncoderBlock<B> {
    pub fn new(params: &NetworkParams, device: &B::Device) -> Self {
        Self::wrap(CompetitiveDenseBlock::new(params, device), params)
    }

    pub fn new_input(params: &NetworkParams, device: &B::Device) -> Self {
        Self::wrap(CompetitiveDenseBlock::new_input(params, device), params)
    }

    fn wrap(block: CompetitiveDenseBlock<B>, params: &NetworkParams) -> Self {
        Self { block, pool: params.pool, stride: params.stride_pool }
    }
}

impl<B: Backend> EncoderStage<B> for CompetitiveEncoderBlock<B> {
    fn encode(&self, x: Tensor<B, 4>) -> EncoderOutput<B> {
        let skip = self.block.forward(x);
        // Indices are flat positions within each H×W plane of `skip`
        let (output, indices) = max_pool2d_with_indices(
            skip.clone(),
            [self.pool, self.pool],
            [self.stride, self.stride],
            [0, 0],
            [1, 1],
            false,
        );
        EncoderOutput { output, skip: SkipConnection { skip, indices } }
    }
}

// ─── CompetitiveDecoderBlock ──────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct CompetitiveDecoderBlock<B: Backend> {
    pub block:  CompetitiveDenseBlock<B>,
    /// Upsampling factor, the stride of the matching encoder pool
    pub stride: usize,
}

impl<B: Backend> CompetitiveDecoderBlock<B> {
    pub fn new(params: &NetworkParams, device: &B::Device) -> Self {
        Self { block: CompetitiveDenseBlock::new(params, device), stride: params.stride_pool }
    }
}

impl<B: Backend> DecoderStage<B> for CompetitiveDecoderBlock<B> {
    fn decode(&self, x: Tensor<B, 4>, skip: SkipConnection<B>) -> Tensor<B, 4> {
        // Unpool back to the spatial size of the matching skip
        let [_, _, height, width] = skip.skip.dims();
        let unpooled = max_unpool2d(x, skip.indices, self.stride, [height, width]);
        self.block.forward(unpooled.max_pair(skip.skip))
    }
}

// ─── ClassifierBlock ──────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ClassifierBlock<B: Backend> {
    /// kernel_c × kernel_c, num_filters → num_classes, no norm or activation
    pub conv: Conv2d<B>,
}

impl<B: Backend> ClassifierBlock<B> {
    pub fn new(params: &NetworkParams, device: &B::Device) -> Self {
        let conv = conv2d(
            [params.num_channels, params.num_classes],
            [params.kernel_c, params.kernel_c],
            params.stride_conv,
            device,
        );
        Self { conv }
    }
}

impl<B: Backend> ClassifierStage<B> for ClassifierBlock<B> {
    fn classify(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.conv.forward(x)
    }
}

// ─── Unpooling ────────────────────────────────────────────────────────────────

/// Nearest-neighbour upsampling by an integer factor.
/// [b, c, h, w] → [b, c, h * factor, w * factor]
fn repeat_nearest<B: Backend, K: BasicOps<B>>(x: Tensor<B, 4, K>, factor: usize) -> Tensor<B, 4, K> {
    let x: Tensor<B, 5, K> = x.unsqueeze_dim(3);        // [b, c, h, 1, w]
    let x = x.repeat(&[1, 1, 1, factor, 1]);            // [b, c, h, f, w]
    let x: Tensor<B, 4, K> = x.flatten(2, 3);           // [b, c, h*f, w]
    let x: Tensor<B, 5, K> = x.unsqueeze_dim(4);        // [b, c, h*f, w, 1]
    let x = x.repeat(&[1, 1, 1, 1, factor]);            // [b, c, h*f, w, f]
    x.flatten(3, 4)                                     // [b, c, h*f, w*f]
}

/// Inverse of a non-overlapping max-pool: every value goes back to
/// the flat position recorded in `indices`, everything else is zero.
///
/// Each pooled value is first spread over its whole window; a mask
/// then keeps only the cell whose flat position equals the index.
pub fn max_unpool2d<B: Backend>(
    x:           Tensor<B, 4>,
    indices:     Tensor<B, 4, Int>,
    stride:      usize,
    output_size: [usize; 2],
) -> Tensor<B, 4> {
    let [batch, channels, _, _] = x.dims();
    let [height, width] = output_size;
    let device = x.device();

    let values  = repeat_nearest(x, stride);
    let targets = repeat_nearest(indices, stride);

    let positions = Tensor::<B, 1, Int>::arange(0..(height * width) as i64, &device)
        .reshape([1, 1, height, width])
        .expand([batch, channels, height, width]);

    let mask = targets.equal(positions).float();
    values * mask
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn small_params() -> NetworkParams {
        NetworkParams { num_channels: 3, num_filters: 4, num_classes: 5, ..Default::default() }
    }

    fn values(t: Tensor<TestBackend, 4>) -> Vec<f32> {
        t.into_data().iter::<f32>().collect()
    }

    #[test]
    fn test_unpool_restores_max_positions() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::from_floats(
            [[[
                [1.0, 5.0, 2.0, 0.0],
                [3.0, 4.0, 7.0, 1.0],
                [0.0, 0.0, 9.0, 8.0],
                [6.0, 2.0, 1.0, 1.0],
            ]]],
            &device,
        );

        let (pooled, indices) = max_pool2d_with_indices(x, [2, 2], [2, 2], [0, 0], [1, 1], false);
        let restored = max_unpool2d(pooled, indices, 2, [4, 4]);

        assert_eq!(restored.dims(), [1, 1, 4, 4]);
        assert_eq!(
            values(restored),
            vec![
                0.0, 5.0, 0.0, 0.0,
                0.0, 0.0, 7.0, 0.0,
                0.0, 0.0, 9.0, 0.0,
                6.0, 0.0, 0.0, 0.0,
            ]
        );
    }

    #[test]
    fn test_dense_block_keeps_shape() {
        let device = Default::default();
        let params = small_params().inner_stage();
        let block = CompetitiveDenseBlock::<TestBackend>::new(&params, &device);
        assert!(!block.is_input_stage());

        let x = Tensor::<TestBackend, 4>::ones([2, 4, 16, 16], &device);
        assert_eq!(block.forward(x).dims(), [2, 4, 16, 16]);
    }

    #[test]
    fn test_input_block_maps_channels() {
        let device = Default::default();
        let block = CompetitiveDenseBlock::<TestBackend>::new_input(&small_params(), &device);
        assert!(block.is_input_stage());

        let x = Tensor::<TestBackend, 4>::ones([1, 3, 8, 8], &device);
        assert_eq!(block.forward(x).dims(), [1, 4, 8, 8]);
    }

    #[test]
    fn test_encoder_decoder_round_trip_shapes() {
        let device = Default::default();
        let params = small_params();
        let encoder = CompetitiveEncoderBlock::<TestBackend>::new_input(&params, &device);
        let decoder = CompetitiveDecoderBlock::<TestBackend>::new(&params.inner_stage(), &device);

        let x = Tensor::<TestBackend, 4>::ones([1, 3, 16, 16], &device);
        let out = encoder.encode(x);
        assert_eq!(out.output.dims(), [1, 4, 8, 8]);
        assert_eq!(out.skip.skip.dims(), [1, 4, 16, 16]);
        assert_eq!(out.skip.indices.dims(), [1, 4, 8, 8]);

        let decoded = decoder.decode(out.output, out.skip);
        assert_eq!(decoded.dims(), [1, 4, 16, 16]);
    }

    #[test]
    fn test_classifier_maps_to_classes() {
        let device = Default::default();
        let params = NetworkParams { kernel_c: 3, ..small_params() }.inner_stage();
        let classifier = ClassifierBlock::<TestBackend>::new(&params, &device);

        let x = Tensor::<TestBackend, 4>::ones([2, 4, 8, 8], &device);
        assert_eq!(classifier.classify(x).dims(), [2, 5, 8, 8]);
    }

    #[test]
    fn test_batch_norm_starts_at_identity() {
        let device = Default::default();
        let block = CompetitiveDenseBlock::<TestBackend>::new_input(&small_params(), &device);

        for bn in [&block.bn1, &block.bn2, &block.bn3] {
            let gamma: Vec<f32> = bn.gamma.val().into_data().iter::<f32>().collect();
            let beta: Vec<f32> = bn.beta.val().into_data().iter::<f32>().collect();
            assert!(gamma.iter().all(|&g| g == 1.0));
            assert!(beta.iter().all(|&b| b == 0.0));
        }
    }
}
