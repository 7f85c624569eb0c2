//! Tenant-scoped local cache.
//!
//! Layout under the data root:
//! `data/<tenant>/pdfs/<mpn>.pdf`, `data/<tenant>/images/<mpn>.<ext>`,
//! `data/<tenant>/products/<mpn>.json` (pre-parsed datasheet records), and
//! `data/<tenant>/manifest.json` mapping MPN → artifact locations.
//!
//! The pipeline treats the datasheet records as read-only; PDFs, images,
//! and the manifest are written best-effort after successful runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::EnrichConfig;

/// Per-MPN artifact locations recorded in the batch manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datasheet_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    #[serde(default)]
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    entries: BTreeMap<String, ManifestEntry>,
}

/// Filesystem cache scoped to one tenant.
pub struct Store {
    root: PathBuf,
}

impl Store {
    #[must_use]
    pub fn new(config: &EnrichConfig) -> Self {
        Self {
            root: config.data_root().join(config.tenant_name()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn pdf_path(&self, mpn: &str) -> PathBuf {
        self.root.join("pdfs").join(format!("{}.pdf", sanitize(mpn)))
    }

    #[must_use]
    pub fn image_path(&self, mpn: &str, ext: &str) -> PathBuf {
        self.root
            .join("images")
            .join(format!("{}.{ext}", sanitize(mpn)))
    }

    #[must_use]
    pub fn product_json_path(&self, mpn: &str) -> PathBuf {
        self.root
            .join("products")
            .join(format!("{}.json", sanitize(mpn)))
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("manifest.json")
    }

    /// Load the pre-parsed datasheet record for an MPN, if one is cached.
    /// Read errors and malformed JSON degrade to `None` with a warning;
    /// a bad cache entry must not fail the pipeline.
    pub async fn load_datasheet_json(&self, mpn: &str) -> Option<Value> {
        let path = self.product_json_path(mpn);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(_) => return None,
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                debug!(mpn, path = %path.display(), "loaded cached datasheet record");
                Some(value)
            }
            Err(e) => {
                warn!(mpn, path = %path.display(), error = %e, "cached datasheet record is malformed");
                None
            }
        }
    }

    /// Cache a downloaded datasheet PDF. Returns its path.
    pub async fn save_pdf(&self, mpn: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.pdf_path(mpn);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    /// Cache an image download. Returns its path.
    pub async fn save_image(&self, mpn: &str, ext: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.image_path(mpn, ext);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    /// Merge one entry into the batch manifest and persist it.
    pub async fn update_manifest(&self, mpn: &str, entry: ManifestEntry) -> Result<()> {
        let path = self.manifest_path();
        let mut manifest: Manifest = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => Manifest::default(),
        };

        manifest.entries.insert(mpn.to_string(), entry);
        manifest.updated_at = Some(chrono::Utc::now());

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(&manifest).context("serializing manifest")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

/// Keep MPN-derived file names filesystem-safe.
fn sanitize(mpn: &str) -> String {
    mpn.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_in(dir: &Path) -> Store {
        let config = crate::config::EnrichConfig::new("sk", "lk")
            .tenant("acme")
            .data_dir(dir.to_path_buf());
        Store::new(&config)
    }

    #[test]
    fn paths_follow_tenant_layout() {
        let store = store_in(Path::new("/data"));
        assert_eq!(
            store.pdf_path("M1-1120-3"),
            PathBuf::from("/data/acme/pdfs/M1-1120-3.pdf")
        );
        assert_eq!(
            store.product_json_path("M1-1120-3"),
            PathBuf::from("/data/acme/products/M1-1120-3.json")
        );
        assert_eq!(
            store.image_path("M1/odd name", "png"),
            PathBuf::from("/data/acme/images/M1_odd_name.png")
        );
    }

    #[tokio::test]
    async fn datasheet_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        assert!(store.load_datasheet_json("M1-1120-3").await.is_none());

        let path = store.product_json_path("M1-1120-3");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, serde_json::to_vec(&json!({"a": 1})).unwrap())
            .await
            .unwrap();

        let value = store.load_datasheet_json("M1-1120-3").await.unwrap();
        assert_eq!(value["a"], 1);
    }

    #[tokio::test]
    async fn malformed_cache_degrades_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let path = store.product_json_path("BAD");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, b"{not json").await.unwrap();
        assert!(store.load_datasheet_json("BAD").await.is_none());
    }

    #[tokio::test]
    async fn manifest_accumulates_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        store
            .update_manifest(
                "M1-1120-3",
                ManifestEntry {
                    datasheet_url: Some("https://surgepure.com/ds/m1.pdf".into()),
                    ..ManifestEntry::default()
                },
            )
            .await
            .unwrap();
        store
            .update_manifest(
                "M1-1240-3",
                ManifestEntry {
                    pdf_path: Some("pdfs/M1-1240-3.pdf".into()),
                    ..ManifestEntry::default()
                },
            )
            .await
            .unwrap();

        let raw = tokio::fs::read(store.manifest_path()).await.unwrap();
        let manifest: Manifest = serde_json::from_slice(&raw).unwrap();
        assert_eq!(manifest.entries.len(), 2);
        assert!(manifest.updated_at.is_some());
    }

    #[tokio::test]
    async fn save_pdf_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let path = store.save_pdf("M1-1120-3", b"%PDF-1.7").await.unwrap();
        assert!(path.exists());
    }
}
