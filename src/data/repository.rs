use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageReader, RgbaImage};
use walkdir::WalkDir;

use super::error::{DataError, Result};
use super::model::Split;

/// Extensions (lower-case) recognised as images when listing a split.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff"];

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// PixelBuffer – decoded image ready for upload as a texture
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub rgba: RgbaImage,
}

impl PixelBuffer {
    pub fn size(&self) -> [usize; 2] {
        [self.width as usize, self.height as usize]
    }
}

// ---------------------------------------------------------------------------
// ImageRepository – images/{train,validation,test}/*
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ImageRepository {
    root: PathBuf,
}

impl ImageRepository {
    pub fn new(images_root: impl Into<PathBuf>) -> Self {
        ImageRepository {
            root: images_root.into(),
        }
    }

    pub fn split_dir(&self, split: Split) -> PathBuf {
        self.root.join(split.dir_name())
    }

    pub fn path_of(&self, split: Split, filename: &str) -> PathBuf {
        self.split_dir(split).join(filename)
    }

    /// Image filenames directly inside the split directory, sorted.
    /// A split directory that does not exist yet lists as empty.
    pub fn list(&self, split: Split) -> Result<Vec<String>> {
        let dir = self.split_dir(split);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.clone());
                DataError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() || !is_supported_image(entry.path()) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            } else {
                log::warn!("Skipping non UTF-8 filename {:?}", entry.path());
            }
        }
        names.sort();
        Ok(names)
    }

    /// First split (train, validation, test order) holding `filename`.
    pub fn locate(&self, filename: &str) -> Option<Split> {
        Split::ALL
            .into_iter()
            .find(|&split| self.path_of(split, filename).is_file())
    }

    /// Decode `filename` from whichever split holds it.
    pub fn open(&self, filename: &str) -> Result<PixelBuffer> {
        match self.locate(filename) {
            Some(split) => self.open_in(split, filename),
            None => Err(DataError::NotFound(self.root.join(filename))),
        }
    }

    /// Decode `filename` from a known split. The file handle is closed before
    /// this returns, whether decoding succeeds or not.
    pub fn open_in(&self, split: Split, filename: &str) -> Result<PixelBuffer> {
        let path = self.path_of(split, filename);
        let decoded = {
            let reader = ImageReader::open(&path).map_err(|e| DataError::io(&path, e))?;
            reader
                .with_guessed_format()
                .map_err(|e| DataError::io(&path, e))?
                .decode()
                .map_err(|source| DataError::Decode {
                    path: path.clone(),
                    source,
                })?
        };

        let rgba = decoded.to_rgba8();
        log::debug!(
            "Decoded {} ({}x{})",
            path.display(),
            rgba.width(),
            rgba.height()
        );
        Ok(PixelBuffer {
            filename: filename.to_string(),
            width: rgba.width(),
            height: rgba.height(),
            rgba,
        })
    }

    /// Width and height read from the image header only.
    pub fn dimensions(&self, split: Split, filename: &str) -> Result<(u32, u32)> {
        let path = self.path_of(split, filename);
        ImageReader::open(&path)
            .map_err(|e| DataError::io(&path, e))?
            .with_guessed_format()
            .map_err(|e| DataError::io(&path, e))?
            .into_dimensions()
            .map_err(|source| DataError::Decode { path, source })
    }

    /// Copy an external file into `split` and return the stored filename.
    /// Refuses to overwrite an existing file of the same name.
    pub fn import(&self, source: &Path, split: Split) -> Result<String> {
        let filename = source
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| DataError::NotFound(source.to_path_buf()))?;
        if !source.is_file() {
            return Err(DataError::NotFound(source.to_path_buf()));
        }

        let dest = self.path_of(split, &filename);
        if dest.exists() {
            return Err(DataError::DuplicateRecord(filename));
        }
        let dir = self.split_dir(split);
        fs::create_dir_all(&dir).map_err(|e| DataError::io(&dir, e))?;
        fs::copy(source, &dest).map_err(|e| DataError::io(&dest, e))?;
        log::info!("Copied {} to {}", source.display(), dest.display());
        Ok(filename)
    }

    /// Move a file between split directories.
    pub fn relocate(&self, filename: &str, from: Split, to: Split) -> Result<()> {
        if from == to {
            return Ok(());
        }
        let src = self.path_of(from, filename);
        let dest = self.path_of(to, filename);
        if !src.is_file() {
            return Err(DataError::NotFound(src));
        }
        if dest.exists() {
            return Err(DataError::DuplicateRecord(filename.to_string()));
        }
        let dir = self.split_dir(to);
        fs::create_dir_all(&dir).map_err(|e| DataError::io(&dir, e))?;

        if let Err(e) = fs::rename(&src, &dest) {
            // Cross-device moves cannot rename.
            log::debug!("rename failed ({e}), falling back to copy");
            fs::copy(&src, &dest).map_err(|e| DataError::io(&dest, e))?;
            fs::remove_file(&src).map_err(|e| DataError::io(&src, e))?;
        }
        log::info!("Moved {filename} from {from} to {to}");
        Ok(())
    }

    pub fn delete(&self, split: Split, filename: &str) -> Result<()> {
        let path = self.path_of(split, filename);
        fs::remove_file(&path).map_err(|e| DataError::io(&path, e))
    }
}
