use std::path::{Path, PathBuf};

use anyhow::Context;
use databook_core::IngestionWatermark;
use tokio::fs;

use crate::artifact::write_file_atomic;

/// Per-fiscal-year `progress_fy<Y>.json` files under one state directory.
#[derive(Debug, Clone)]
pub struct WatermarkStore {
    dir: PathBuf,
}

impl WatermarkStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, fiscal_year: i32) -> PathBuf {
        self.dir.join(format!("progress_fy{fiscal_year}.json"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// A missing file is a fresh watermark at zero; an unreadable one is an error.
    pub async fn load(&self, fiscal_year: i32) -> anyhow::Result<IngestionWatermark> {
        let path = self.path_for(fiscal_year);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(IngestionWatermark::default())
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading watermark {}", path.display()))
            }
        };
        serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing watermark {}", path.display()))
    }

    pub async fn save(
        &self,
        fiscal_year: i32,
        watermark: &IngestionWatermark,
    ) -> anyhow::Result<()> {
        let path = self.path_for(fiscal_year);
        let bytes = serde_json::to_vec_pretty(watermark).context("serializing watermark")?;
        write_file_atomic(&path, &bytes).await
    }
}
