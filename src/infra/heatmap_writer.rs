// ============================================================
// Layer 6 — Heatmap Writer
// ============================================================
// Dumps one Grad-CAM heatmap to CSV so it can be plotted or
// overlaid on the input slice with any external tool.
//
// Layout: one CSV row per image row, 6 decimal places:
//
//   0.000000,0.012345,...,0.000000
//   0.000000,0.104200,...,0.000000
//   ...
//
// Non-finite values (the divide-by-zero case) are written as
// `NaN` / `inf` so they stay visible.

use anyhow::{ensure, Context, Result};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

pub struct HeatmapWriter {
    path: PathBuf,
}

impl HeatmapWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a row-major `height × width` map.
    pub fn write(&self, values: &[f32], height: usize, width: usize) -> Result<()> {
        ensure!(
            values.len() == height * width,
            "heatmap has {} values, expected {}x{}",
            values.len(), height, width
        );

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.path)
            .with_context(|| format!("Cannot create '{}'", self.path.display()))?;
        let mut out = BufWriter::new(file);

        for row in values.chunks(width) {
            let line: Vec<String> = row.iter().map(|v| format!("{v:.6}")).collect();
            writeln!(out, "{}", line.join(","))?;
        }
        out.flush()?;

        tracing::info!("Wrote {}x{} heatmap to '{}'", height, width, self.path.display());
        Ok(())
    }
}
