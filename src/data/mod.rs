/// Data layer: records, metadata file, image files, consistency checks.
///
/// Architecture:
/// ```text
///  metadata/metadata.csv         images/{train,validation,test}/*
///        │                                  │
///        ▼                                  ▼
///   ┌──────────┐                    ┌──────────────┐
///   │ metadata │ load/save ⇄ Dataset │  repository  │ list/open → PixelBuffer
///   └──────────┘                    └──────────────┘
///        │                                  │
///        └───────────────┬──────────────────┘
///                        ▼
///                  ┌──────────┐
///                  │ validate │  orphaned records / orphaned files
///                  └──────────┘
///                        │
///                        ▼
///                  ┌──────────┐
///                  │  filter  │  split / label / filename → visible rows
///                  └──────────┘
/// ```

pub mod error;
pub mod filter;
pub mod metadata;
pub mod model;
pub mod repository;
pub mod validate;

pub use error::DataError;
