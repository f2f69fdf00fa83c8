// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap, picks a Burn backend and hands
// off to the use cases in Layer 2. Printing happens only here.
//
// Backends:
//   default  → WGPU (Autodiff<Wgpu> for explain)
//   --cpu    → NdArray (Autodiff<NdArray> for explain)

pub mod commands;

use anyhow::Result;
use burn::backend::{wgpu::WgpuDevice, Autodiff, NdArray, Wgpu};
use clap::Parser;
use commands::{Commands, ExplainArgs, InitConfigArgs, SmokeArgs};

use crate::application::{
    explain_use_case::{ExplainReport, ExplainUseCase},
    smoke_use_case::SmokeUseCase,
};
use crate::domain::params::NetworkParams;
use crate::infra::config_store::ConfigStore;

#[derive(Parser, Debug)]
#[command(
    name = "fastsurfer-cnn",
    version,
    about = "FastSurferCNN segmentation network with Grad-CAM explanations."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Smoke(args)      => run_smoke(args),
            Commands::Explain(args)    => run_explain(args),
            Commands::InitConfig(args) => run_init_config(args),
        }
    }
}

fn run_smoke(args: SmokeArgs) -> Result<()> {
    let params = ConfigStore::load_or_default(args.run.config.as_deref())?;
    let use_case = SmokeUseCase::new(args.run.smoke_config(params));

    let shape = if args.run.cpu {
        use_case.execute::<NdArray>(&Default::default())?
    } else {
        let device = WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        use_case.execute::<Wgpu>(&device)?
    };

    println!("{shape:?}");
    Ok(())
}

fn run_explain(args: ExplainArgs) -> Result<()> {
    let params = ConfigStore::load_or_default(args.run.config.as_deref())?;
    let use_case = ExplainUseCase::new(args.explain_config(params));

    let report = if args.run.cpu {
        use_case.execute::<Autodiff<NdArray>>(&Default::default())?
    } else {
        let device = WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        use_case.execute::<Autodiff<Wgpu>>(&device)?
    };

    print_report(args.class, &report);
    Ok(())
}

fn run_init_config(args: InitConfigArgs) -> Result<()> {
    let store = ConfigStore::new(args.out);
    store.save(&NetworkParams::default())?;
    println!("Wrote default config to '{}'", store.path().display());
    Ok(())
}

fn print_report(class: usize, report: &ExplainReport) {
    let [batch, height, width] = report.heatmap_dims;
    println!("Grad-CAM class {class}: heatmap [{batch}, {height}, {width}]");
    println!(
        "  min={:.4} max={:.4} mean={:.4} non_finite={}",
        report.stats.min, report.stats.max, report.stats.mean, report.stats.non_finite,
    );
    println!("  pixels labelled {class}: {}", report.class_pixels);
}
