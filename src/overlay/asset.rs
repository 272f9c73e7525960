use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use fast_image_resize as fir;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to open overlay asset {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("overlay asset {path} has no alpha channel ({color:?})")]
    MissingAlpha {
        path: PathBuf,
        color: image::ColorType,
    },
    #[error("overlay asset {path} is empty")]
    Empty { path: PathBuf },
}

/// An RGBA decal, immutable once loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayAsset {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl OverlayAsset {
    pub fn load(path: &Path) -> Result<Self, AssetError> {
        let decoded = image::open(path).map_err(|source| AssetError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let color = decoded.color();
        if !color.has_alpha() {
            return Err(AssetError::MissingAlpha {
                path: path.to_path_buf(),
                color,
            });
        }

        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(AssetError::Empty {
                path: path.to_path_buf(),
            });
        }

        log::info!("loaded overlay asset {} ({width}x{height})", path.display());
        Ok(Self {
            rgba: rgba.into_raw(),
            width,
            height,
        })
    }

    #[cfg(test)]
    pub fn from_rgba(rgba: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(rgba.len(), width as usize * height as usize * 4);
        Self {
            rgba,
            width,
            height,
        }
    }

    /// Scales to `width` x `height` with bilinear filtering, borrowing `self` when the size
    /// already matches.
    ///
    /// Both dimensions must be non-zero.
    pub fn resized(&self, width: u32, height: u32) -> Result<Cow<'_, OverlayAsset>> {
        if width == self.width && height == self.height {
            return Ok(Cow::Borrowed(self));
        }

        let src_image = fir::images::Image::from_vec_u8(
            self.width,
            self.height,
            self.rgba.clone(),
            fir::PixelType::U8x4,
        )?;
        let mut dst_image = fir::images::Image::new(width, height, fir::PixelType::U8x4);
        let mut resizer = fir::Resizer::new();
        let resize_options = fir::ResizeOptions::new()
            .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
        resizer
            .resize(&src_image, &mut dst_image, Some(&resize_options))
            .context("overlay resize failed")?;

        Ok(Cow::Owned(OverlayAsset {
            rgba: dst_image.into_vec(),
            width,
            height,
        }))
    }

    pub(crate) fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * 4;
        let start = y as usize * stride;
        &self.rgba[start..start + stride]
    }
}
