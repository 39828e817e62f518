use std::path::PathBuf;

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use super::ImageData;
use crate::error::LoadError;

/// Source of decoded images.
///
/// The returned future runs on the cache's single-threaded executor, so it
/// does not need to be `Send`.
pub trait ImageLoader {
    fn load_image(&self, path: &str) -> LocalBoxFuture<'static, Result<ImageData, LoadError>>;
}

/// Loads images from files below `root` and decodes them with `image`.
#[derive(Debug, Clone)]
pub struct FileImageLoader {
    root: PathBuf,
}

impl FileImageLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ImageLoader for FileImageLoader {
    fn load_image(&self, path: &str) -> LocalBoxFuture<'static, Result<ImageData, LoadError>> {
        let full = self.root.join(path);
        let path = path.to_owned();
        async move {
            let bytes = std::fs::read(&full).map_err(|e| LoadError::Io {
                path: path.clone(),
                message: e.to_string(),
            })?;
            let img = image::load_from_memory(&bytes).map_err(|e| LoadError::Decode {
                path: path.clone(),
                message: e.to_string(),
            })?;
            log::trace!("decoded {path}: {}x{}", img.width(), img.height());
            Ok(ImageData::from_image(&img))
        }
        .boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_from_root() {
        let dir = tempfile::tempdir().unwrap();
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        img.save(dir.path().join("tile.png")).unwrap();

        let loader = FileImageLoader::new(dir.path());
        let data = futures::executor::block_on(loader.load_image("tile.png")).unwrap();
        assert_eq!((data.width, data.height), (3, 2));
        assert_eq!(&data.rgba[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FileImageLoader::new(dir.path());
        let err = futures::executor::block_on(loader.load_image("nope.png")).unwrap_err();
        assert!(matches!(err, LoadError::Io { ref path, .. } if path == "nope.png"));
    }

    #[test]
    fn garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.png"), b"not an image").unwrap();
        let loader = FileImageLoader::new(dir.path());
        let err = futures::executor::block_on(loader.load_image("bad.png")).unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }));
    }
}
