//! Rebuilds full frames from the deltas stored in the file
//!
//! The canvas is private to the [`Compositor`]. Every frame it yields is a copy,
//! so the canvas can keep changing while workers own earlier snapshots.

use crate::decode::{Animation, RawFrame};
use crate::error::CatResult;
use crate::Error;
use imgref::ImgVec;
use rgb::RGBA8;

/// A fully drawn frame, independent from the canvas it was taken from
pub struct CompositedFrame {
    pub image: ImgVec<RGBA8>,
    /// In 1/100ths of a second
    pub delay: u16,
}

/// Draws frames in file order and yields `(index, snapshot)` for each.
///
/// Stops after the first error.
pub struct Compositor {
    frames: std::vec::IntoIter<RawFrame>,
    canvas: ImgVec<RGBA8>,
    next_index: usize,
    failed: bool,
}

impl Compositor {
    #[must_use]
    pub fn new(animation: Animation) -> Self {
        let Animation { width, height, frames } = animation;
        let (width, height) = (width as usize, height as usize);
        Self {
            frames: frames.into_iter(),
            canvas: ImgVec::new(vec![RGBA8::new(0, 0, 0, 0); width * height], width, height),
            next_index: 0,
            failed: false,
        }
    }

    fn draw(&mut self, frame: &RawFrame) -> CatResult<()> {
        let (left, top) = (frame.left as usize, frame.top as usize);
        let (width, height) = (frame.image.width(), frame.image.height());
        let fits = left.checked_add(width).is_some_and(|right| right <= self.canvas.width())
            && top.checked_add(height).is_some_and(|bottom| bottom <= self.canvas.height());
        if !fits {
            return Err(Error::Geometry(format!(
                "Frame {} at {left},{top} ({width}×{height}) does not fit in the {}×{} canvas",
                self.next_index, self.canvas.width(), self.canvas.height())));
        }

        let mut dst = self.canvas.sub_image_mut(left, top, width, height);
        for (dst_row, src_row) in dst.rows_mut().zip(frame.image.rows()) {
            for (dst_px, &src_px) in dst_row.iter_mut().zip(src_row) {
                *dst_px = source_over(*dst_px, src_px);
            }
        }
        Ok(())
    }
}

impl Iterator for Compositor {
    type Item = CatResult<(usize, CompositedFrame)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let frame = self.frames.next()?;
        if let Err(e) = self.draw(&frame) {
            self.failed = true;
            return Some(Err(e));
        }

        let index = self.next_index;
        self.next_index += 1;
        Some(Ok((index, CompositedFrame {
            image: self.canvas.clone(),
            delay: frame.delay,
        })))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed { (0, Some(0)) } else { self.frames.size_hint() }
    }
}

/// Straight-alpha "over" operator
#[inline]
fn source_over(dst: RGBA8, src: RGBA8) -> RGBA8 {
    match src.a {
        255 => src,
        0 => dst,
        a => {
            let src_a = u32::from(a);
            let dst_a = u32::from(dst.a) * (255 - src_a) / 255;
            let out_a = src_a + dst_a;
            let mix = |s: u8, d: u8| ((u32::from(s) * src_a + u32::from(d) * dst_a + out_a / 2) / out_a) as u8;
            RGBA8::new(mix(src.r, dst.r), mix(src.g, dst.g), mix(src.b, dst.b), out_a as u8)
        },
    }
}
