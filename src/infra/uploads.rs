//! Filesystem storage for post images.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use imagesize::{ImageError, ImageType};
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::domain::posts::IMAGE_DIRECTORY;

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error("uploaded file is not a recognised image: {reason}")]
    NotAnImage { reason: &'static str },
    #[error("uploaded file exceeds {limit} bytes")]
    TooLarge { limit: u64 },
}

/// Raster formats accepted for post images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Gif,
    Png,
    Jpeg,
    Webp,
    Bmp,
}

impl ImageFormat {
    /// Extension written to disk; `/media/` derives the content type from it.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Gif => "gif",
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Webp => "webp",
            ImageFormat::Bmp => "bmp",
        }
    }

    fn detect(data: &[u8]) -> Result<Self, UploadStorageError> {
        match imagesize::image_type(data) {
            Ok(ImageType::Gif) => Ok(ImageFormat::Gif),
            Ok(ImageType::Png) => Ok(ImageFormat::Png),
            Ok(ImageType::Jpeg) => Ok(ImageFormat::Jpeg),
            Ok(ImageType::Webp) => Ok(ImageFormat::Webp),
            Ok(ImageType::Bmp) => Ok(ImageFormat::Bmp),
            Ok(_) | Err(ImageError::NotSupported) => Err(UploadStorageError::NotAnImage {
                reason: "unsupported format",
            }),
            Err(ImageError::CorruptedImage) => Err(UploadStorageError::NotAnImage {
                reason: "corrupted image",
            }),
            Err(ImageError::IoError(err)) => Err(UploadStorageError::Io(err)),
        }
    }
}

#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
    max_bytes: u64,
}

impl UploadStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf, max_bytes: u64) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(root.join(IMAGE_DIRECTORY))?;
        Ok(Self { root, max_bytes })
    }

    /// Check that `data` decodes as an accepted image without touching the disk.
    pub fn inspect_image(&self, data: &[u8]) -> Result<ImageFormat, UploadStorageError> {
        if data.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }
        if data.len() as u64 > self.max_bytes {
            return Err(UploadStorageError::TooLarge {
                limit: self.max_bytes,
            });
        }
        let format = ImageFormat::detect(data)?;
        match imagesize::blob_size(data) {
            Ok(size) if size.width > 0 && size.height > 0 => Ok(format),
            Ok(_) => Err(UploadStorageError::NotAnImage {
                reason: "zero dimensions",
            }),
            Err(ImageError::NotSupported) => Err(UploadStorageError::NotAnImage {
                reason: "unsupported format",
            }),
            Err(ImageError::CorruptedImage) => Err(UploadStorageError::NotAnImage {
                reason: "corrupted image",
            }),
            Err(ImageError::IoError(err)) => Err(UploadStorageError::Io(err)),
        }
    }

    /// Validate and persist an image under the posts directory and return its
    /// stored path, e.g. `posts/<uuid>-cat.png`.
    ///
    /// The client's extension is discarded; the detected format names the file.
    pub async fn store_image(
        &self,
        original_name: &str,
        data: Bytes,
    ) -> Result<String, UploadStorageError> {
        let format = self.inspect_image(&data)?;

        let stored_path = build_stored_path(original_name, format);
        let absolute = self.resolve(&stored_path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        if let Err(err) = file.write_all(&data).await {
            drop(file);
            let _ = fs::remove_file(&absolute).await;
            return Err(err.into());
        }
        file.flush().await?;

        Ok(stored_path)
    }

    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Remove the stored payload. Missing files are treated as success.
    pub async fn delete(&self, stored_path: &str) -> Result<(), UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(UploadStorageError::Io(err)),
        }
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

fn build_stored_path(original_name: &str, format: ImageFormat) -> String {
    let identifier = Uuid::new_v4().simple();
    let stem = sanitize_stem(original_name);
    format!(
        "{IMAGE_DIRECTORY}/{identifier}-{stem}.{}",
        format.extension()
    )
}

fn sanitize_stem(original: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("image");
    let base = slugify(stem);
    if base.is_empty() {
        "image".to_string()
    } else {
        base
    }
}
