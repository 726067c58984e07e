//! Cropping and resizing of composited frames

use crate::error::CatResult;
use crate::Error;
use imgref::{ImgRef, ImgVec};
use rgb::RGBA8;

/// Region of a frame, in pixels
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[must_use]
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// `size`×`size` square at `x`,`y`
    #[must_use]
    pub fn square(x: u32, y: u32, size: u32) -> Self {
        Self::new(x, y, size, size)
    }
}

/// Resampling filter used when resizing
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Filter {
    /// Nearest neighbour; keeps hard pixel edges
    Nearest,
    Triangle,
    CatmullRom,
    Mitchell,
    #[default]
    Lanczos3,
}

impl From<Filter> for resize::Type {
    fn from(f: Filter) -> Self {
        match f {
            Filter::Nearest => Self::Point,
            Filter::Triangle => Self::Triangle,
            Filter::CatmullRom => Self::Catrom,
            Filter::Mitchell => Self::Mitchell,
            Filter::Lanczos3 => Self::Lanczos3,
        }
    }
}

/// What to do with every frame: crop first, then resize.
///
/// The same geometry applies to all frames, so the output size only depends on the canvas size.
#[derive(Debug, Copy, Clone, Default)]
pub struct Geometry {
    pub crop: Option<Rect>,
    /// Resize target. If only one side is set, the other keeps the aspect ratio of the (cropped) frame.
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub filter: Filter,
}

impl Geometry {
    /// Size of frames made from a `width`×`height` canvas.
    ///
    /// Fails if the crop doesn't fit. Nothing is clamped.
    pub fn output_size(&self, width: usize, height: usize) -> CatResult<(usize, usize)> {
        let (width, height) = match self.crop {
            Some(crop) => {
                check_crop(crop, width, height)?;
                (crop.width as usize, crop.height as usize)
            },
            None => (width, height),
        };
        self.resized_size(width, height)
    }

    fn resized_size(&self, width: usize, height: usize) -> CatResult<(usize, usize)> {
        let scaled = |side: usize, num: usize, den: usize| ((side * num + den / 2) / den).max(1);
        let size = match (self.width, self.height) {
            (Some(w), Some(h)) => (w as usize, h as usize),
            (Some(w), None) if width > 0 => (w as usize, scaled(height, w as usize, width)),
            (None, Some(h)) if height > 0 => (scaled(width, h as usize, height), h as usize),
            _ => (width, height),
        };
        if size.0 == 0 || size.1 == 0 {
            return Err(Error::Bounds(format!("Output size {}×{} is empty", size.0, size.1)));
        }
        Ok(size)
    }

    /// Crops and resizes one frame. Safe to call from many threads at once.
    pub fn transform(&self, image: ImgRef<'_, RGBA8>) -> CatResult<ImgVec<RGBA8>> {
        let image = match self.crop {
            Some(crop) => {
                check_crop(crop, image.width(), image.height())?;
                image.sub_image(crop.x as usize, crop.y as usize, crop.width as usize, crop.height as usize)
            },
            None => image,
        };
        let (dst_width, dst_height) = self.resized_size(image.width(), image.height())?;

        let mut contig = Vec::new();
        contig.try_reserve_exact(image.width() * image.height())?;
        contig.extend(image.rows().flat_map(|r| r.iter().copied()));
        if (dst_width, dst_height) == (image.width(), image.height()) {
            return Ok(ImgVec::new(contig, dst_width, dst_height));
        }

        let mut r = resize::new(image.width(), image.height(), dst_width, dst_height, resize::Pixel::RGBA8P, self.filter.into())?;
        let mut dst = Vec::new();
        dst.try_reserve_exact(dst_width * dst_height)?;
        dst.resize(dst_width * dst_height, RGBA8::new(0, 0, 0, 0));
        r.resize(&contig, &mut dst)?;
        Ok(ImgVec::new(dst, dst_width, dst_height))
    }
}

fn check_crop(crop: Rect, width: usize, height: usize) -> CatResult<()> {
    let right = (crop.x as usize).checked_add(crop.width as usize);
    let bottom = (crop.y as usize).checked_add(crop.height as usize);
    if crop.width == 0 || crop.height == 0 {
        return Err(Error::Bounds(format!("Crop {}×{} is empty", crop.width, crop.height)));
    }
    if !right.is_some_and(|r| r <= width) || !bottom.is_some_and(|b| b <= height) {
        return Err(Error::Bounds(format!("Crop {}×{} at {},{} exceeds the {width}×{height} frame",
            crop.width, crop.height, crop.x, crop.y)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(width: usize, height: usize) -> ImgVec<RGBA8> {
        let buf = (0..width * height).map(|i| RGBA8::new(i as u8, (i / width) as u8, 0, 255)).collect();
        ImgVec::new(buf, width, height)
    }

    #[test]
    fn crops_exact_region() {
        let g = Geometry { crop: Some(Rect::new(1, 2, 3, 2)), ..Geometry::default() };
        let src = numbered(6, 5);
        let out = g.transform(src.as_ref()).unwrap();
        assert_eq!((out.width(), out.height()), (3, 2));
        assert_eq!(out.buf()[0], src.buf()[2 * 6 + 1]);
        assert_eq!(out.buf()[5], src.buf()[3 * 6 + 3]);
        assert_eq!(g.output_size(6, 5).unwrap(), (3, 2));
    }

    #[test]
    fn crop_touching_edge_is_fine() {
        let g = Geometry { crop: Some(Rect::square(5, 5, 5)), ..Geometry::default() };
        assert!(g.transform(numbered(10, 10).as_ref()).is_ok());
    }

    #[test]
    fn rejects_crop_out_of_bounds() {
        let src = numbered(10, 10);
        for crop in [Rect::square(6, 0, 5), Rect::square(0, 6, 5), Rect::new(0, 0, 11, 1), Rect::new(u32::MAX, 0, 2, 2)] {
            let g = Geometry { crop: Some(crop), ..Geometry::default() };
            assert!(matches!(g.transform(src.as_ref()), Err(Error::Bounds(_))), "{crop:?}");
            assert!(matches!(g.output_size(10, 10), Err(Error::Bounds(_))), "{crop:?}");
        }
    }

    #[test]
    fn rejects_empty_crop() {
        let g = Geometry { crop: Some(Rect::new(0, 0, 0, 3)), ..Geometry::default() };
        assert!(matches!(g.transform(numbered(4, 4).as_ref()), Err(Error::Bounds(_))));
    }

    #[test]
    fn resizes_to_target() {
        let g = Geometry { width: Some(4), height: Some(3), filter: Filter::Nearest, ..Geometry::default() };
        let out = g.transform(numbered(8, 6).as_ref()).unwrap();
        assert_eq!((out.width(), out.height()), (4, 3));
    }

    #[test]
    fn one_side_keeps_aspect() {
        let g = Geometry { width: Some(50), ..Geometry::default() };
        assert_eq!(g.output_size(200, 100).unwrap(), (50, 25));
        let g = Geometry { height: Some(10), crop: Some(Rect::new(0, 0, 40, 20)), ..Geometry::default() };
        assert_eq!(g.output_size(200, 100).unwrap(), (20, 10));
    }

    #[test]
    fn solid_color_survives_resize() {
        let color = RGBA8::new(30, 60, 90, 255);
        let src = ImgVec::new(vec![color; 16 * 16], 16, 16);
        let g = Geometry { width: Some(5), height: Some(7), ..Geometry::default() };
        let out = g.transform(src.as_ref()).unwrap();
        assert_eq!((out.width(), out.height()), (5, 7));
        assert!(out.as_ref().pixels().all(|px| {
            px.r.abs_diff(color.r) <= 1 && px.g.abs_diff(color.g) <= 1 && px.b.abs_diff(color.b) <= 1
        }));
    }
}
