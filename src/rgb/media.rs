//! Media files attached to assets
//!
//! Files are content-addressed: they are copied into the wallet's media
//! directory under the hex SHA-256 of their contents. The mime type is
//! detected from the contents.

use std::path::{Path, PathBuf};

use file_format::FileFormat;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::database::DbMedia;
use crate::error::Error;

/// Media directory inside the wallet directory
pub const MEDIA_DIR: &str = "media_files";

/// A media file stored by the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    /// Path of the stored copy
    pub file_path: String,
    pub digest: String,
    pub mime: String,
}

/// A media file copied by [`Media::store`]
#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub media: Media,
    /// Set when this call wrote the file, so the caller can roll it back
    pub created: Option<PathBuf>,
}

impl Media {
    /// Copy `file_path` into `media_dir` and describe it
    ///
    /// # Arguments
    ///
    /// * `file_path` - Source file
    /// * `media_dir` - The wallet's media directory
    pub fn store(file_path: &str, media_dir: &Path) -> Result<StoredMedia, Error> {
        let source = Path::new(file_path);
        if !source.is_file() {
            return Err(Error::InvalidFilePath {
                file_path: file_path.to_string(),
            });
        }

        let contents = std::fs::read(source)?;
        if contents.is_empty() {
            return Err(Error::EmptyFile {
                file_path: file_path.to_string(),
            });
        }

        let digest = hex::encode(Sha256::digest(&contents));
        let mime = FileFormat::from_bytes(&contents).media_type().to_string();
        let target = media_dir.join(&digest);
        let created = if target.exists() {
            None
        } else {
            std::fs::write(&target, &contents)?;
            log::debug!("Stored media {} ({}, {} bytes)", digest, mime, contents.len());
            Some(target.clone())
        };

        Ok(StoredMedia {
            media: Self {
                file_path: target.to_string_lossy().to_string(),
                digest,
                mime,
            },
            created,
        })
    }

    pub fn from_db_media(db_media: &DbMedia, media_dir: &Path) -> Self {
        Self {
            file_path: media_dir
                .join(&db_media.digest)
                .to_string_lossy()
                .to_string(),
            digest: db_media.digest.clone(),
            mime: db_media.mime.clone(),
        }
    }
}
