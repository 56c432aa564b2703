//! Image collaborators for the render core.
//!
//! The render core never touches image files directly. It asks an
//! [`ImageDecoder`] for a [`DecodedImage`] (alpha-first texels, row 0 at the
//! top) and runs the [`pixels`] converter before upload.

mod decode;
pub mod pixels;

use std::path::PathBuf;

pub use decode::{DecodedImage, FileDecoder, ImageDecoder, MemoryDecoder};
pub use pixels::{PixelError, argb_top_down_to_rgba_bottom_up, rgba_bottom_up_to_argb_top_down};

/// Errors from asset operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("asset not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("bad pixel data: {0}")]
    Pixel(#[from] PixelError),
}

pub fn crate_info() -> &'static str {
    "cubebatch-assets v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("assets"));
    }

    #[test]
    fn not_found_message_names_path() {
        let err = AssetError::NotFound(PathBuf::from("stone.png"));
        assert!(err.to_string().contains("stone.png"));
    }
}
