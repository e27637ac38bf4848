//! Texture loading and management

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::{ViewerError, ViewerResult};
use image::imageops::FilterType;
use image::RgbaImage;
use std::path::Path;

/// Number of levels in a full mip chain for the given size
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height);
    if largest == 0 {
        0
    } else {
        u32::BITS - largest.leading_zeros()
    }
}

impl TextureImage {
    /// Decode an image file, flip it vertically and build its mip chain
    pub fn from_file<P: AsRef<Path>>(path: P, filter: TextureFilter) -> ViewerResult<Self> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|source| ViewerError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        // Rows are flipped so that V = 0 is the bottom row, matching the UVs produced
        // by asset flattening.
        Ok(Self::with_mipmaps(img.flipv().to_rgba8(), filter))
    }

    /// Build a full mip chain from a base image
    ///
    /// Each level is downsampled from the previous one with a filter matching `filter`.
    pub fn with_mipmaps(base: RgbaImage, filter: TextureFilter) -> Self {
        let (width, height) = base.dimensions();
        let count = mip_level_count(width, height);
        let filter_type = match filter {
            TextureFilter::Linear => FilterType::Triangle,
            TextureFilter::Nearest => FilterType::Nearest,
        };

        let mut levels = Vec::with_capacity(count as usize);
        let mut previous = base;
        for level in 1..count {
            let next = image::imageops::resize(
                &previous,
                (width >> level).max(1),
                (height >> level).max(1),
                filter_type,
            );
            levels.push(std::mem::replace(&mut previous, next).into_raw());
        }
        if count > 0 {
            levels.push(previous.into_raw());
        }

        Self {
            width,
            height,
            levels,
        }
    }
}

/// A GPU texture bound to a fixed texture unit
pub struct Texture<B: GraphicsBackend> {
    context: RenderContext<B>,
    handle: TextureHandle,
    unit: u32,
    filter: TextureFilter,
    width: u32,
    height: u32,
}

impl<B: GraphicsBackend> Texture<B> {
    /// Upload an image with its mip chain and bind it at `unit`
    pub fn new(
        context: &RenderContext<B>,
        image: &TextureImage,
        unit: u32,
        filter: TextureFilter,
    ) -> BackendResult<Self> {
        let handle = context.borrow_mut().create_texture(image, unit, filter)?;
        Ok(Self {
            context: context.clone(),
            handle,
            unit,
            filter,
            width: image.width,
            height: image.height,
        })
    }

    pub fn from_file<P: AsRef<Path>>(
        context: &RenderContext<B>,
        path: P,
        unit: u32,
        filter: TextureFilter,
    ) -> ViewerResult<Self> {
        let image = TextureImage::from_file(&path, filter)?;
        log::info!(
            "Loaded texture {} ({}x{}, {} levels)",
            path.as_ref().display(),
            image.width,
            image.height,
            image.level_count()
        );
        Ok(Self::new(context, &image, unit, filter)?)
    }

    /// Rebind to the texture's unit
    pub fn bind(&self) {
        self.context.borrow_mut().bind_texture(self.handle, self.unit);
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    pub fn unit(&self) -> u32 {
        self.unit
    }

    pub fn filter(&self) -> TextureFilter {
        self.filter
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl<B: GraphicsBackend> Drop for Texture<B> {
    fn drop(&mut self) {
        let handle = self.handle;
        self.context
            .release("texture", |backend| backend.destroy_texture(handle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_mip_level_count() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(256, 256), 9);
        assert_eq!(mip_level_count(300, 20), 9);
        assert_eq!(mip_level_count(0, 0), 0);
    }

    #[test]
    fn test_mip_chain_sizes() {
        let base = RgbaImage::from_pixel(8, 4, Rgba([10, 20, 30, 255]));
        let image = TextureImage::with_mipmaps(base, TextureFilter::Linear);

        assert_eq!(image.level_count(), 4);
        for (level, pixels) in image.levels.iter().enumerate() {
            let (w, h) = image.level_size(level as u32);
            assert_eq!(pixels.len(), (w * h * 4) as usize, "level {level}");
        }
        assert_eq!(image.level_size(3), (1, 1));
    }

    #[test]
    fn test_nearest_mips_keep_solid_color() {
        let base = RgbaImage::from_pixel(4, 4, Rgba([200, 100, 50, 255]));
        let image = TextureImage::with_mipmaps(base, TextureFilter::Nearest);
        let last = image.levels.last().unwrap();
        assert_eq!(last.as_slice(), &[200, 100, 50, 255]);
    }
}
