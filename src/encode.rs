use crate::error::CatResult;
use crate::Error;
use crate::{OutputSequence, PalettedFrame};
use std::borrow::Cow;
use std::io::Write;

/// Writes the whole sequence as one GIF.
///
/// Every frame gets its own palette. Nothing is retried, and a failed write leaves a truncated stream behind.
pub fn encode<W: Write>(sequence: &OutputSequence, writer: W) -> CatResult<()> {
    let too_large = |_| Error::WrongSize(format!("{}×{} is too large for a GIF", sequence.width, sequence.height));
    let screen_width = u16::try_from(sequence.width).map_err(too_large)?;
    let screen_height = u16::try_from(sequence.height).map_err(too_large)?;

    let mut enc = gif::Encoder::new(writer, screen_width, screen_height, &[])?;
    if sequence.frames.len() > 1 {
        enc.write_extension(gif::ExtensionData::Repetitions(gif::Repeat::Infinite))?;
    }
    for frame in &sequence.frames {
        enc.write_frame(&gif_frame(frame)?)?;
    }
    enc.into_inner().map_err(gif::EncodingError::from)?.flush().map_err(gif::EncodingError::from)?;
    log::debug!("encoded {} frames at {screen_width}×{screen_height}", sequence.frames.len());
    Ok(())
}

fn gif_frame(f: &PalettedFrame) -> CatResult<gif::Frame<'_>> {
    let mut pal_rgb: Vec<u8> = f.palette.iter().flat_map(|c| [c.r, c.g, c.b]).collect();
    // Palette should be power-of-two sized
    let needed_size = 3 * f.palette.len().clamp(2, 256).next_power_of_two();
    pal_rgb.resize(needed_size, 0);

    let image = f.image.as_ref();
    let buffer = if image.width() == image.stride() {
        Cow::Borrowed(&image.buf()[..image.width() * image.height()])
    } else {
        Cow::Owned(image.rows().flat_map(|r| r.iter().copied()).collect())
    };

    Ok(gif::Frame {
        delay: f.delay,
        width: u16::try_from(image.width())?,
        height: u16::try_from(image.height())?,
        palette: Some(pal_rgb),
        buffer,
        ..gif::Frame::default()
    })
}
