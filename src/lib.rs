//! FastSurferCNN on Burn.
//!
//! A competitive encoder/decoder network for whole-brain
//! segmentation of multi-slice 2D input, plus Grad-CAM
//! explanations of its per-pixel predictions.
//!
//! ```no_run
//! use burn::backend::{Autodiff, NdArray};
//! use burn::tensor::{Distribution, Tensor};
//! use fastsurfer_cnn::domain::params::NetworkParams;
//!
//! type B = Autodiff<NdArray>;
//!
//! let device = Default::default();
//! let model = NetworkParams::default().init::<B>(&device).unwrap();
//! let x = Tensor::<B, 4>::random([1, 7, 256, 256], Distribution::Uniform(0.0, 1.0), &device);
//!
//! let logits = model.forward(x.clone());            // [1, 44, 256, 256]
//! let cam = model.grad_cam(x, 3).unwrap();          // heatmap [1, 256, 256]
//! # let _ = (logits, cam);
//! ```

#![recursion_limit = "256"]

pub mod cli;
pub mod application;
pub mod domain;
pub mod ml;
pub mod infra;

pub use domain::{error::NetworkError, heatmap::HeatmapNormalization, params::NetworkParams};
pub use ml::{
    grad_cam::{Attribution, BackwardSeed, GradCam},
    network::FastSurferCnn,
};
