use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use databook_adapters::DatasetKind;
use serde::Deserialize;
use tracing::info;

pub const REGISTRY_FILE: &str = "datasets.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatasetRegistry {
    pub datasets: Vec<DatasetEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatasetEntry {
    pub dataset: DatasetKind,
    /// Relative to the workspace root.
    pub path: PathBuf,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl DatasetRegistry {
    /// Every dataset, enabled, under its published file name.
    pub fn builtin() -> Self {
        Self {
            datasets: DatasetKind::ALL
                .into_iter()
                .map(|dataset| DatasetEntry {
                    dataset,
                    path: PathBuf::from(dataset.default_file()),
                    enabled: true,
                })
                .collect(),
        }
    }

    /// `datasets.yaml` under `workspace_root`, or the built-in registry when
    /// the file does not exist.
    pub async fn load(workspace_root: &Path) -> Result<Self> {
        let path = workspace_root.join(REGISTRY_FILE);
        if !tokio::fs::try_exists(&path)
            .await
            .with_context(|| format!("checking {}", path.display()))?
        {
            info!(path = %path.display(), "no dataset registry; using built-in list");
            return Ok(Self::builtin());
        }
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Enabled entries in load order: registry order within the fixed
    /// dataset order.
    pub fn enabled(&self) -> Vec<&DatasetEntry> {
        let mut entries = self.datasets.iter().filter(|d| d.enabled).collect::<Vec<_>>();
        entries.sort_by_key(|d| DatasetKind::ALL.iter().position(|k| *k == d.dataset));
        entries
    }
}
