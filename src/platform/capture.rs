//! Capture adapter
//!
//! Wraps the native image picker. A picked image is downscaled into the
//! capture bounds, stored as a JPEG in the capture cache and returned as a
//! `file://` reference. Cancelling the picker is not an error.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use image::{imageops::FilterType, ImageFormat};
use rfd::FileDialog;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task;
use tracing::info;

use crate::config::{CaptureConfig, APP_DIR_NAME};
use crate::error::CaptureError;
use crate::platform::files;
use crate::state::data::ImageRef;

/// Kind of media the picker offers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Photo,
}

impl MediaType {
    /// File extensions the picker filters on
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            MediaType::Photo => &["jpg", "jpeg", "png", "bmp", "webp"],
        }
    }
}

/// Options passed to the picker on every capture
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOptions {
    pub media_type: MediaType,
    /// Attach the stored JPEG as base64 to the returned reference
    pub include_base64: bool,
    /// Thumbnail bounds (aspect ratio preserved, never upscaled)
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self::from_config(&CaptureConfig::default())
    }
}

impl CaptureOptions {
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            media_type: MediaType::Photo,
            include_base64: config.include_base64,
            max_width: config.max_width,
            max_height: config.max_height,
        }
    }
}

/// Produces an image reference, or nothing when the user cancels
pub trait CaptureAdapter: Send + Sync {
    fn capture(&self, options: &CaptureOptions) -> Result<Option<ImageRef>, CaptureError>;
}

/// Run the (blocking) capture UI off the UI thread
pub async fn capture(
    adapter: Arc<dyn CaptureAdapter>,
    options: CaptureOptions,
) -> Result<Option<ImageRef>, CaptureError> {
    task::spawn_blocking(move || adapter.capture(&options))
        .await
        .map_err(|e| CaptureError::Join(e.to_string()))?
}

/// Capture adapter backed by the native file picker
#[derive(Debug)]
pub struct PickerCapture {
    cache_dir: PathBuf,
    next_id: AtomicU64,
}

impl PickerCapture {
    /// Create an adapter that stores captures in `cache_dir`
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            next_id: AtomicU64::new(0),
        }
    }

    /// Get the capture cache directory
    /// Returns ~/.cache/snap-classifier/captures on Linux
    pub fn default_cache_dir() -> Option<PathBuf> {
        let mut path = dirs_next::cache_dir().or_else(dirs_next::home_dir)?;
        path.push(APP_DIR_NAME);
        path.push("captures");
        Some(path)
    }

    /// Downscale `source` into the option bounds and store it in the cache
    pub fn store(&self, source: &Path, options: &CaptureOptions) -> Result<ImageRef, CaptureError> {
        let img = image::open(source).map_err(|e| CaptureError::Open {
            path: source.to_path_buf(),
            message: e.to_string(),
        })?;

        // Fit into the bounds, never upscale
        let img = if img.width() > options.max_width || img.height() > options.max_height {
            img.resize(options.max_width, options.max_height, FilterType::Lanczos3)
        } else {
            img
        };
        let rgb = img.to_rgb8();

        fs::create_dir_all(&self.cache_dir).map_err(|e| CaptureError::Store {
            path: self.cache_dir.clone(),
            message: e.to_string(),
        })?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let file_name = format!(
            "capture-{}-{}.jpg",
            Utc::now().format("%Y%m%d-%H%M%S%3f"),
            id
        );
        let target = self.cache_dir.join(&file_name);

        rgb.save_with_format(&target, ImageFormat::Jpeg)
            .map_err(|e| CaptureError::Store {
                path: target.clone(),
                message: e.to_string(),
            })?;

        let absolute = fs::canonicalize(&target).map_err(|e| CaptureError::Store {
            path: target.clone(),
            message: e.to_string(),
        })?;
        let uri = files::path_to_uri(&absolute).ok_or_else(|| CaptureError::Store {
            path: absolute.clone(),
            message: "cannot express path as a file URI".to_string(),
        })?;

        let base64 = if options.include_base64 {
            let bytes = fs::read(&absolute).map_err(|e| CaptureError::Store {
                path: absolute.clone(),
                message: e.to_string(),
            })?;
            Some(STANDARD.encode(bytes))
        } else {
            None
        };

        info!(
            "📸 Stored capture {} ({}x{})",
            absolute.display(),
            rgb.width(),
            rgb.height()
        );

        Ok(ImageRef {
            uri,
            file_name: Some(file_name),
            width: rgb.width(),
            height: rgb.height(),
            base64,
        })
    }
}

impl CaptureAdapter for PickerCapture {
    fn capture(&self, options: &CaptureOptions) -> Result<Option<ImageRef>, CaptureError> {
        let picked = FileDialog::new()
            .set_title("Take image")
            .add_filter("Images", options.media_type.extensions())
            .pick_file();

        match picked {
            Some(path) => self.store(&path, options).map(Some),
            None => {
                info!("Capture cancelled");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_source(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join(format!("source-{}x{}.png", width, height));
        RgbImage::from_pixel(width, height, Rgb([10, 200, 30]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_store_fits_into_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), 800, 400);
        let adapter = PickerCapture::new(dir.path().join("captures"));

        let image = adapter.store(&source, &CaptureOptions::default()).unwrap();

        assert_eq!((image.width, image.height), (200, 100));
        assert!(image.uri.starts_with("file://"));
        assert!(image.base64.is_none());

        let stored = image.local_path().unwrap();
        assert!(stored.exists());
        assert_eq!(image::image_dimensions(&stored).unwrap(), (200, 100));
    }

    #[test]
    fn test_store_never_upscales() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), 50, 40);
        let adapter = PickerCapture::new(dir.path().join("captures"));

        let image = adapter.store(&source, &CaptureOptions::default()).unwrap();

        assert_eq!((image.width, image.height), (50, 40));
    }

    #[test]
    fn test_store_gives_each_capture_its_own_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), 20, 20);
        let adapter = PickerCapture::new(dir.path().join("captures"));

        let first = adapter.store(&source, &CaptureOptions::default()).unwrap();
        let second = adapter.store(&source, &CaptureOptions::default()).unwrap();

        assert_ne!(first.uri, second.uri);
    }

    #[test]
    fn test_store_with_inline_base64() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_source(dir.path(), 20, 20);
        let adapter = PickerCapture::new(dir.path().join("captures"));
        let options = CaptureOptions {
            include_base64: true,
            ..CaptureOptions::default()
        };

        let image = adapter.store(&source, &options).unwrap();

        let encoded = image.base64.unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_store_rejects_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("notes.png");
        fs::write(&source, b"definitely not a png").unwrap();
        let adapter = PickerCapture::new(dir.path().join("captures"));

        let err = adapter.store(&source, &CaptureOptions::default()).unwrap_err();
        assert!(matches!(err, CaptureError::Open { .. }));
    }
}
