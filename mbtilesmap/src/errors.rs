use std::path::PathBuf;

use mbtilesmap_tile_utils::TileCoord;

/// Coarse classification of [`MbtError`], used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The catalog configuration is unusable. Fatal, never retried.
    Configuration,
    /// A catalog, a store, or a request identifier does not resolve.
    NotFound,
    /// The store exists, but has no row for the requested coordinate.
    TileMissing,
    /// Grid data in the container cannot be decompressed or parsed.
    CorruptContainer,
    /// Anything else: I/O, `SQLite`, permissions, ...
    Infrastructure,
}

#[derive(thiserror::Error, Debug)]
pub enum MbtError {
    #[error("No catalog root directories are configured")]
    NoCatalogRoots,

    #[error("Catalog root directory {} does not exist", .0.display())]
    RootNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Catalog '{0}' is not configured")]
    CatalogNotFound(String),

    #[error("MBTiles '{id}' not found in catalog '{catalog}' ({})", root.display())]
    StoreNotFound {
        id: String,
        root: PathBuf,
        catalog: String,
    },

    #[error("Tile {coord} not available in {id}")]
    TileMissing { id: String, coord: TileCoord },

    #[error("MBTiles file {file} is corrupted: {reason}")]
    CorruptContainer { file: String, reason: String },

    #[error("Unable to derive a tileset id from {}", .0.display())]
    EmptyStoreId(PathBuf),

    #[error("MBTiles file {0} has no tiles")]
    NoTilesFound(String),

    #[error("MBTile filepath contains unsupported characters: {}", .0.display())]
    UnsupportedCharsInFilepath(PathBuf),

    #[error("Identifier '{0}' may only contain letters, digits, '.', '-' and '_'")]
    InvalidIdentifier(String),

    #[error("'{0}' is not a valid JSONP callback name")]
    InvalidCallback(String),

    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error(transparent)]
    JsonSerdeError(#[from] serde_json::Error),

    #[error("Unable to parse configuration: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error(transparent)]
    UrlError(#[from] url::ParseError),

    #[error("IO error {}: {}", .0, .1.display())]
    IoError(#[source] std::io::Error, PathBuf),

    #[error("Unable to walk directory {}: {}", .1.display(), .0)]
    DirectoryWalking(#[source] walkdir::Error, PathBuf),
}

impl MbtError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoCatalogRoots | Self::RootNotFound(_) | Self::InvalidConfig(_) => {
                ErrorKind::Configuration
            }
            Self::CatalogNotFound(_)
            | Self::StoreNotFound { .. }
            | Self::EmptyStoreId(_)
            | Self::InvalidIdentifier(_)
            | Self::InvalidCallback(_) => ErrorKind::NotFound,
            Self::TileMissing { .. } => ErrorKind::TileMissing,
            Self::CorruptContainer { .. } => ErrorKind::CorruptContainer,
            Self::NoTilesFound(_)
            | Self::UnsupportedCharsInFilepath(_)
            | Self::SqlxError(_)
            | Self::JsonSerdeError(_)
            | Self::YamlError(_)
            | Self::UrlError(_)
            | Self::IoError(..)
            | Self::DirectoryWalking(..) => ErrorKind::Infrastructure,
        }
    }

    /// True for errors a web layer reports as "not found" rather than a server failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound | ErrorKind::TileMissing)
    }

    pub(crate) fn corrupt(file: &str, reason: impl ToString) -> Self {
        Self::CorruptContainer {
            file: file.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type MbtResult<T> = Result<T, MbtError>;

/// A store without tiles has no center and no zoom range, which is not always an error.
pub(crate) fn allow_no_tiles<T>(value: MbtResult<T>) -> MbtResult<Option<T>> {
    match value {
        Ok(v) => Ok(Some(v)),
        Err(MbtError::NoTilesFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
