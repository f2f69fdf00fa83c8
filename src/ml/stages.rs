// ============================================================
// Layer 5 — Stage Traits and Pipeline Wiring
// ============================================================
// The encoder/bottleneck/decoder/classifier blocks are seen by
// the network only through these traits. Any implementation can
// be plugged in at compile time; the competitive blocks in
// blocks.rs are the ones FastSurferCNN ships with.
//
// Pairing rule wired by run_pipeline():
//
//   encode1 ──────────────────────────────► decode1
//     encode2 ────────────────────────► decode2
//       encode3 ──────────────────► decode3
//         encode4 ────────────► decode4
//                  bottleneck
//
// Each arrow is one SkipConnection (skip tensor + pool indices),
// moved from encoder k into decoder k and dropped afterwards.

use burn::prelude::*;

use crate::domain::params::ENCODER_DEPTH;

/// What an encoder hands to its mirrored decoder.
#[derive(Debug, Clone)]
pub struct SkipConnection<B: Backend> {
    /// Block output before pooling — shape [batch, filters, H, W]
    pub skip: Tensor<B, 4>,

    /// Flat `row * W + col` index of each pooled maximum —
    /// shape [batch, filters, H / stride, W / stride]
    pub indices: Tensor<B, 4, Int>,
}

#[derive(Debug, Clone)]
pub struct EncoderOutput<B: Backend> {
    /// Pooled output fed to the next stage
    pub output: Tensor<B, 4>,
    pub skip:   SkipConnection<B>,
}

pub trait EncoderStage<B: Backend> {
    fn encode(&self, x: Tensor<B, 4>) -> EncoderOutput<B>;
}

/// A block that keeps the spatial size (the bottleneck).
pub trait DenseStage<B: Backend> {
    fn dense(&self, x: Tensor<B, 4>) -> Tensor<B, 4>;
}

pub trait DecoderStage<B: Backend> {
    fn decode(&self, x: Tensor<B, 4>, skip: SkipConnection<B>) -> Tensor<B, 4>;
}

pub trait ClassifierStage<B: Backend> {
    /// features [batch, filters, H, W] → logits [batch, classes, H, W]
    fn classify(&self, x: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// Run encoders, bottleneck and decoders.
///
/// `decoders[k]` consumes the skip connection produced by
/// `encoders[k]`; decoders run from the deepest stage upwards.
pub fn run_pipeline<B: Backend>(
    input:      Tensor<B, 4>,
    encoders:   [&dyn EncoderStage<B>; ENCODER_DEPTH],
    bottleneck: &dyn DenseStage<B>,
    decoders:   [&dyn DecoderStage<B>; ENCODER_DEPTH],
) -> Tensor<B, 4> {
    let mut x = input;
    let mut skips = Vec::with_capacity(ENCODER_DEPTH);

    for (stage, encoder) in encoders.into_iter().enumerate() {
        let out = encoder.encode(x);
        tracing::trace!("encode{} → {:?}", stage + 1, out.output.dims());
        x = out.output;
        skips.push(out.skip);
    }

    x = bottleneck.dense(x);

    for (decoder, skip) in decoders.into_iter().zip(skips).rev() {
        x = decoder.decode(x, skip);
    }
    x
}
