//! Palette selection and remapping
//!
//! Quantizers run on worker threads, many at once. They must not keep state between calls,
//! and must give the same output for the same input no matter which thread runs them.

use crate::error::CatResult;
use crate::Error;
use imagequant::Attributes;
use imgref::{Img, ImgRef, ImgVec};
use rgb::RGBA8;

pub use crate::mediancut::MedianCut;

/// Reduces a truecolor frame to at most `max_colors` palette entries.
pub trait Quantizer: Sync {
    /// Returns the palette-indexed pixels and the palette (`len() <= max_colors`)
    fn quantize(&self, image: ImgRef<'_, RGBA8>, max_colors: u16) -> CatResult<(ImgVec<u8>, Vec<RGBA8>)>;
}

/// Which [`Quantizer`] the pipeline builds from [`Settings`][crate::Settings]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum QuantizerKind {
    /// libimagequant (pngquant)
    #[default]
    Liq,
    /// Plain median cut with Floyd-Steinberg dithering
    MedianCut,
}

/// libimagequant: refined median cut and Floyd-Steinberg remapping
pub struct Liq {
    /// 0-1
    pub dithering: f32,
    /// Lower quality, but faster
    pub fast: bool,
}

impl Quantizer for Liq {
    fn quantize(&self, image: ImgRef<'_, RGBA8>, max_colors: u16) -> CatResult<(ImgVec<u8>, Vec<RGBA8>)> {
        let mut liq = Attributes::new();
        if self.fast {
            liq.set_speed(10)?;
        }
        liq.set_max_colors(max_colors.into())?;
        liq.set_quality(0, 100)?;

        let pixels: Vec<RGBA8> = image.pixels().collect();
        let mut img = liq.new_image(pixels, image.width(), image.height(), 0.)?;
        let mut res = liq.quantize(&mut img)?;
        res.set_dithering_level(self.dithering)?;

        let (pal, pal_img) = res.remapped(&mut img)?;
        if pal_img.len() != image.width() * image.height() {
            return Err(Error::WrongSize(format!("remapped {} pixels, expected {}", pal_img.len(), image.width() * image.height())));
        }
        Ok((Img::new(pal_img, image.width(), image.height()), pal))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Smooth gradient with more colors than any palette can hold
    pub(crate) fn gradient(width: usize, height: usize) -> ImgVec<RGBA8> {
        let buf = (0..height).flat_map(|y| (0..width).map(move |x| {
            RGBA8::new((x * 255 / width) as u8, (y * 255 / height) as u8, ((x + y) * 127 / (width + height)) as u8, 255)
        })).collect();
        ImgVec::new(buf, width, height)
    }

    pub(crate) fn check_valid(q: &dyn Quantizer, image: ImgRef<'_, RGBA8>, max_colors: u16) {
        let (indices, pal) = q.quantize(image, max_colors).unwrap();
        assert!(!pal.is_empty());
        assert!(pal.len() <= max_colors.into(), "{} > {max_colors}", pal.len());
        assert_eq!((indices.width(), indices.height()), (image.width(), image.height()));
        assert!(indices.as_ref().pixels().all(|i| usize::from(i) < pal.len()));
    }

    fn liq() -> Liq {
        Liq { dithering: 1., fast: false }
    }

    #[test]
    fn liq_respects_palette_cap() {
        let img = gradient(40, 30);
        for max_colors in [2, 16, 256] {
            check_valid(&liq(), img.as_ref(), max_colors);
        }
    }

    #[test]
    fn liq_is_deterministic_across_threads() {
        let img = gradient(64, 48);
        let here = liq().quantize(img.as_ref(), 32).unwrap();
        let img2 = img.clone();
        let there = std::thread::spawn(move || liq().quantize(img2.as_ref(), 32).unwrap()).join().unwrap();
        assert_eq!(here.0.buf(), there.0.buf());
        assert_eq!(here.1, there.1);
    }

    #[test]
    fn liq_single_color() {
        let color = RGBA8::new(12, 34, 56, 255);
        let img = ImgVec::new(vec![color; 25], 5, 5);
        let (indices, pal) = liq().quantize(img.as_ref(), 2).unwrap();
        assert!(pal.len() <= 2);
        let first = indices.buf()[0];
        assert!(indices.buf().iter().all(|&i| i == first));
        let c = pal[usize::from(first)];
        assert!(c.r.abs_diff(color.r) <= 1 && c.g.abs_diff(color.g) <= 1 && c.b.abs_diff(color.b) <= 1);
    }
}
