use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::AssetError;
use crate::pixels::{BYTES_PER_TEXEL, PixelError, rgba_to_argb_in_place};

/// A decoded image in decoder layout: (A, R, G, B) texels, row 0 at the top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    has_alpha: bool,
    argb: Vec<u8>,
}

impl DecodedImage {
    /// Wrap an ARGB buffer, checking its length against the dimensions.
    pub fn from_argb(
        width: u32,
        height: u32,
        has_alpha: bool,
        argb: Vec<u8>,
    ) -> Result<Self, PixelError> {
        let expected = width as usize * height as usize * BYTES_PER_TEXEL;
        if argb.len() != expected {
            return Err(PixelError::LengthMismatch {
                width,
                height,
                expected,
                actual: argb.len(),
            });
        }
        Ok(Self {
            width,
            height,
            has_alpha,
            argb,
        })
    }

    /// Build from top-down RGBA texels.
    pub fn from_rgba(
        width: u32,
        height: u32,
        has_alpha: bool,
        mut rgba: Vec<u8>,
    ) -> Result<Self, PixelError> {
        rgba_to_argb_in_place(&mut rgba);
        Self::from_argb(width, height, has_alpha, rgba)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    pub fn argb(&self) -> &[u8] {
        &self.argb
    }
}

/// Image decoding collaborator consumed by the resource registry.
pub trait ImageDecoder {
    /// Decode the image registered under `path`.
    fn decode(&self, path: &Path) -> Result<DecodedImage, AssetError>;
}

/// Decodes PNG files below an asset root directory.
#[derive(Debug, Clone)]
pub struct FileDecoder {
    root: PathBuf,
}

impl FileDecoder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ImageDecoder for FileDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage, AssetError> {
        let full = self.root.join(path);
        tracing::debug!(path = %full.display(), "decoding image");

        let img = image::open(&full).map_err(|source| AssetError::Decode {
            path: full.clone(),
            source,
        })?;
        let has_alpha = img.color().has_alpha();
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        Ok(DecodedImage::from_rgba(
            width,
            height,
            has_alpha,
            rgba.into_raw(),
        )?)
    }
}

/// Serves images that already live in memory (baked or generated assets).
#[derive(Debug, Clone, Default)]
pub struct MemoryDecoder {
    images: HashMap<PathBuf, DecodedImage>,
}

impl MemoryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, image: DecodedImage) {
        self.images.insert(path.into(), image);
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl ImageDecoder for MemoryDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage, AssetError> {
        self.images
            .get(path)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_argb_checks_length() {
        assert!(DecodedImage::from_argb(2, 2, true, vec![0; 16]).is_ok());
        assert!(DecodedImage::from_argb(2, 2, true, vec![0; 15]).is_err());
    }

    #[test]
    fn from_rgba_reorders_to_argb() {
        let img = DecodedImage::from_rgba(1, 1, true, vec![10, 20, 30, 40]).unwrap();
        assert_eq!(img.argb(), &[40, 10, 20, 30]);
    }

    #[test]
    fn memory_decoder_roundtrip() {
        let mut dec = MemoryDecoder::new();
        let img = DecodedImage::from_argb(1, 1, false, vec![255, 1, 2, 3]).unwrap();
        dec.insert("a.png", img.clone());
        assert_eq!(dec.decode(Path::new("a.png")).unwrap(), img);
        assert!(matches!(
            dec.decode(Path::new("b.png")),
            Err(AssetError::NotFound(_))
        ));
    }

    #[test]
    fn file_decoder_reads_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut png = image::RgbaImage::new(2, 1);
        png.put_pixel(0, 0, image::Rgba([1, 2, 3, 4]));
        png.put_pixel(1, 0, image::Rgba([5, 6, 7, 8]));
        png.save(dir.path().join("tiles.png")).unwrap();

        let dec = FileDecoder::new(dir.path());
        let img = dec.decode(Path::new("tiles.png")).unwrap();
        assert_eq!((img.width(), img.height()), (2, 1));
        assert!(img.has_alpha());
        assert_eq!(img.argb(), &[4, 1, 2, 3, 8, 5, 6, 7]);
    }

    #[test]
    fn file_decoder_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let dec = FileDecoder::new(dir.path());
        let err = dec.decode(Path::new("missing.png")).unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }));
    }
}
