use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// DataError – every failure the data layer can surface to the UI
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DataError {
    /// Malformed metadata: bad header, wrong field count, bad split, duplicate row.
    #[error("metadata parse error at line {line}: {message}")]
    Parse { line: u64, message: String },

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("no record named '{0}' in the dataset")]
    UnknownRecord(String),

    #[error("a record named '{0}' already exists")]
    DuplicateRecord(String),

    #[error("'{0}' is not a plain file name")]
    InvalidFilename(String),

    /// Mutations are refused while the metadata file failed to load.
    #[error("metadata is read-only until it loads cleanly; fix the file and reload")]
    ReadOnly,

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl DataError {
    pub(crate) fn parse(line: u64, message: impl Into<String>) -> Self {
        DataError::Parse {
            line,
            message: message.into(),
        }
    }

    /// Map an I/O error, turning `ErrorKind::NotFound` into [`DataError::NotFound`].
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            DataError::NotFound(path)
        } else {
            DataError::Io { path, source }
        }
    }
}

pub type Result<T, E = DataError> = std::result::Result<T, E>;
