//! This is for reading an animated GIF into the delta frames it is made of

use crate::error::CatResult;
use crate::Error;
use imgref::ImgVec;
use rgb::RGBA8;
use std::io::Read;

/// One frame as stored in the file: only the rectangle it updates.
pub struct RawFrame {
    /// Pixels of the updated rectangle, fully transparent where the frame leaves the canvas alone
    pub image: ImgVec<RGBA8>,
    /// Position of the rectangle on the canvas
    pub left: u32,
    pub top: u32,
    /// Display time in 1/100ths of a second
    pub delay: u16,
}

/// The whole input, decoded up front
pub struct Animation {
    /// Canvas (logical screen) size
    pub width: u32,
    pub height: u32,
    pub frames: Vec<RawFrame>,
}

/// Reads every frame of the GIF before returning.
///
/// Nothing is returned unless the entire stream decoded cleanly.
pub fn decode<R: Read>(reader: R) -> CatResult<Animation> {
    let mut gif_opts = gif::DecodeOptions::new();
    gif_opts.set_color_output(gif::ColorOutput::RGBA);

    let mut decoder = gif_opts.read_info(reader)?;
    let width = u32::from(decoder.width());
    let height = u32::from(decoder.height());

    let mut frames = Vec::new();
    while let Some(frame) = decoder.read_next_frame()? {
        let (w, h) = (usize::from(frame.width), usize::from(frame.height));
        let pixels: &[RGBA8] = rgb::bytemuck::try_cast_slice(&frame.buffer[..])
            .map_err(|_| Error::WrongSize(format!("Frame {} has a misaligned pixel buffer", frames.len())))?;
        if pixels.len() != w * h {
            return Err(Error::WrongSize(format!("Frame {} has {} pixels, expected {w}×{h}", frames.len(), pixels.len())));
        }
        frames.try_reserve(1)?;
        frames.push(RawFrame {
            image: ImgVec::new(pixels.to_vec(), w, h),
            left: u32::from(frame.left),
            top: u32::from(frame.top),
            delay: frame.delay,
        });
    }

    if frames.is_empty() {
        return Err(Error::NoFrames);
    }
    log::debug!("decoded {} frames on a {width}×{height} canvas", frames.len());

    Ok(Animation { width, height, frames })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    fn gif_with_frame(left: u16, top: u16) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut enc = gif::Encoder::new(&mut out, 4, 4, &[]).unwrap();
            enc.write_frame(&gif::Frame {
                left,
                top,
                width: 2,
                height: 2,
                delay: 9,
                transparent: Some(1),
                palette: Some(vec![10, 20, 30, 0, 0, 0]),
                buffer: Cow::Owned(vec![0, 1, 1, 0]),
                ..gif::Frame::default()
            }).unwrap();
        }
        out
    }

    #[test]
    fn reads_placement_and_delay() {
        let anim = decode(&gif_with_frame(1, 2)[..]).unwrap();
        assert_eq!((anim.width, anim.height), (4, 4));
        assert_eq!(anim.frames.len(), 1);
        let f = &anim.frames[0];
        assert_eq!((f.left, f.top, f.delay), (1, 2, 9));
        assert_eq!((f.image.width(), f.image.height()), (2, 2));
        assert_eq!(f.image.buf()[0], RGBA8::new(10, 20, 30, 255));
        assert_eq!(f.image.buf()[1].a, 0);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(decode(&b"definitely not a gif"[..]), Err(Error::Decode(_))));
    }

    #[test]
    fn rejects_truncated_header() {
        let data = gif_with_frame(0, 0);
        assert!(matches!(decode(&data[..8]), Err(Error::Decode(_))));
    }
}
