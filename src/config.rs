use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::data::metadata;
use crate::data::model::Split;

pub const IMAGES_DIR: &str = "images";
pub const METADATA_DIR: &str = "metadata";
pub const METADATA_FILE: &str = "metadata.csv";

// ---------------------------------------------------------------------------
// Dataset layout on disk
// ---------------------------------------------------------------------------

/// Where a dataset lives:
///
/// ```text
/// <root>/images/{train,validation,test}/
/// <root>/metadata/metadata.csv
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub root: PathBuf,
    pub images_dir: PathBuf,
    pub metadata_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_root(root)
    }
}

impl AppConfig {
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        AppConfig {
            images_dir: root.join(IMAGES_DIR),
            metadata_path: root.join(METADATA_DIR).join(METADATA_FILE),
            root,
        }
    }

    /// Create the split directories and a header-only metadata file where missing.
    pub fn ensure_layout(&self) -> Result<()> {
        for split in Split::ALL {
            let dir = self.images_dir.join(split.dir_name());
            fs::create_dir_all(&dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let metadata_dir = self.metadata_dir();
        fs::create_dir_all(metadata_dir)
            .with_context(|| format!("creating {}", metadata_dir.display()))?;

        if metadata::create_empty(&self.metadata_path)
            .with_context(|| format!("creating {}", self.metadata_path.display()))?
        {
            log::info!("Created empty metadata file {}", self.metadata_path.display());
        }
        Ok(())
    }

    fn metadata_dir(&self) -> &Path {
        self.metadata_path.parent().unwrap_or(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn layout_paths_hang_off_the_root() {
        let config = AppConfig::from_root("/data/fundus");
        assert_eq!(config.images_dir, PathBuf::from("/data/fundus/images"));
        assert_eq!(
            config.metadata_path,
            PathBuf::from("/data/fundus/metadata/metadata.csv")
        );
    }

    #[test]
    fn ensure_layout_creates_dirs_and_keeps_existing_metadata() {
        let dir = TempDir::new().expect("tempdir");
        let config = AppConfig::from_root(dir.path());
        config.ensure_layout().expect("first layout");

        for split in ["train", "validation", "test"] {
            assert!(dir.path().join("images").join(split).is_dir());
        }
        assert!(config.metadata_path.is_file());

        fs::write(&config.metadata_path, "filename,label\na.png,normal\n").unwrap();
        config.ensure_layout().expect("second layout");
        assert_eq!(
            fs::read_to_string(&config.metadata_path).unwrap(),
            "filename,label\na.png,normal\n"
        );
    }
}
