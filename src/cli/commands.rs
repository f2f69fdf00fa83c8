// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Three subcommands:
//   smoke        — forward pass on random input, print the shape
//   explain      — Grad-CAM on random input, print statistics
//   init-config  — write the default params as JSON
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::{explain_use_case::ExplainConfig, smoke_use_case::SmokeConfig};
use crate::domain::{heatmap::HeatmapNormalization, params::NetworkParams};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the network and run one forward pass on random input
    Smoke(SmokeArgs),

    /// Run Grad-CAM for one class on random input
    Explain(ExplainArgs),

    /// Write the default network config to a JSON file
    InitConfig(InitConfigArgs),
}

/// Input and backend options shared by `smoke` and `explain`.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Network config JSON (defaults to the built-in 7-slice, 44-class setup)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value_t = 1)]
    pub batch: usize,

    /// Must be a multiple of stride_pool^4 (16 by default)
    #[arg(long, default_value_t = 256)]
    pub height: usize,

    #[arg(long, default_value_t = 256)]
    pub width: usize,

    /// Run on the CPU (NdArray) instead of the GPU (WGPU)
    #[arg(long)]
    pub cpu: bool,
}

#[derive(Args, Debug)]
pub struct SmokeArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args, Debug)]
pub struct ExplainArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Class whose evidence is mapped
    #[arg(long)]
    pub class: usize,

    /// Seed the backward pass from the whole batch instead of example 0
    #[arg(long)]
    pub batched: bool,

    /// Return an all-zero map instead of dividing by a zero maximum
    #[arg(long)]
    pub zero_when_flat: bool,

    /// Write the heatmap of example 0 to this CSV file
    #[arg(long)]
    pub heatmap_csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct InitConfigArgs {
    #[arg(long, default_value = "fastsurfer_cnn.json")]
    pub out: PathBuf,
}

impl RunArgs {
    pub fn smoke_config(&self, params: NetworkParams) -> SmokeConfig {
        SmokeConfig { params, batch: self.batch, height: self.height, width: self.width }
    }
}

impl ExplainArgs {
    pub fn explain_config(&self, params: NetworkParams) -> ExplainConfig {
        let normalization = if self.zero_when_flat {
            HeatmapNormalization::ZeroWhenFlat
        } else {
            HeatmapNormalization::DivideByMax
        };
        ExplainConfig {
            params,
            class_index: self.class,
            batch:       self.run.batch,
            height:      self.run.height,
            width:       self.run.width,
            batched:     self.batched,
            normalization,
            heatmap_csv: self.heatmap_csv.clone(),
        }
    }
}
