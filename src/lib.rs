/*
 gifcrop: crops, resizes and re-quantizes animated GIFs
 © 2026 The gifcrop developers

 This program is free software: you can redistribute it and/or modify
 it under the terms of the GNU Affero General Public License as
 published by the Free Software Foundation, either version 3 of the
 License, or (at your option) any later version.

 This program is distributed in the hope that it will be useful,
 but WITHOUT ANY WARRANTY; without even the implied warranty of
 MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 GNU Affero General Public License for more details.

 You should have received a copy of the GNU Affero General Public License
 along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/
//! Every frame of the input is first drawn onto a canvas, in order, on one thread.
//! Finished frames are then cropped, resized and quantized in parallel,
//! and put back in their original order before anything is written.
//!
//! ```no_run
//! # fn main() -> Result<(), gifcrop::Error> {
//! let settings = gifcrop::Settings {
//!     crop: Some(gifcrop::Rect::square(0, 0, 100)),
//!     ..gifcrop::Settings::default()
//! };
//! let input = std::fs::File::open("in.gif")?;
//! let mut output = Vec::new();
//! gifcrop::transcode(input, &mut output, &settings, &mut gifcrop::progress::NoProgress {})?;
//! # Ok(()) }
//! ```

mod error;
pub use crate::error::*;
pub mod progress;
use crate::progress::*;
mod decode;
pub use crate::decode::{decode, Animation, RawFrame};
mod compose;
pub use crate::compose::{CompositedFrame, Compositor};
mod geometry;
pub use crate::geometry::{Filter, Geometry, Rect};
pub mod quantize;
mod mediancut;
use crate::quantize::{Liq, MedianCut, Quantizer, QuantizerKind};
mod minipool;
mod slots;
pub use crate::slots::ResultSlots;
mod encode;
pub use crate::encode::encode;

pub use imgref::{ImgRef, ImgVec};
pub use rgb::RGBA8;

use std::io::prelude::*;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
use std::thread;

#[derive(Copy, Clone, Debug)]
pub struct Settings {
    /// Region of the canvas to keep. Applied before resizing.
    pub crop: Option<Rect>,
    /// Resize to this width if set
    pub width: Option<u32>,
    /// Resize to this height if set. If only one of width and height is set, aspect ratio is preserved.
    pub height: Option<u32>,
    pub filter: Filter,
    /// 2-256
    pub max_colors: u16,
    /// Worker threads. 0 means one thread per frame.
    pub threads: usize,
    pub quantizer: QuantizerKind,
    /// 0-1. Amount of Floyd-Steinberg error diffusion
    pub dithering: f32,
    /// Lower quality, but faster quantization
    pub fast: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            crop: None,
            width: None,
            height: None,
            filter: Filter::default(),
            max_colors: 256,
            threads: thread::available_parallelism().map_or(1, NonZeroUsize::get),
            quantizer: QuantizerKind::default(),
            dithering: 1.,
            fast: false,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> CatResult<()> {
        if !(2..=256).contains(&self.max_colors) {
            return Err(Error::Settings(format!("palette size must be 2-256, not {}", self.max_colors)));
        }
        if !(0. ..=1.).contains(&self.dithering) {
            return Err(Error::Settings(format!("dithering level must be 0-1, not {}", self.dithering)));
        }
        Ok(())
    }

    #[must_use]
    pub fn geometry(&self) -> Geometry {
        Geometry {
            crop: self.crop,
            width: self.width,
            height: self.height,
            filter: self.filter,
        }
    }

    pub(crate) fn worker_count(&self, frame_count: usize) -> usize {
        match self.threads {
            0 => frame_count,
            n => n.min(frame_count),
        }.max(1)
    }
}

/// A quantized frame, ready to be written
pub struct PalettedFrame {
    /// Indices into `palette`
    pub image: ImgVec<u8>,
    pub palette: Vec<RGBA8>,
    /// In 1/100ths of a second
    pub delay: u16,
}

/// All frames in their original order
pub struct OutputSequence {
    pub width: usize,
    pub height: usize,
    pub frames: Vec<PalettedFrame>,
}

/// Decodes, processes and encodes.
///
/// `writer` is not touched unless all frames have been processed successfully.
pub fn transcode<R: Read, W: Write>(reader: R, writer: W, settings: &Settings, reporter: &mut dyn ProgressReporter) -> CatResult<()> {
    let animation = decode(reader)?;
    let output = process(animation, settings, reporter)?;
    encode(&output, writer)
}

/// Processes frames with the quantizer chosen in `settings`
pub fn process(animation: Animation, settings: &Settings, reporter: &mut dyn ProgressReporter) -> CatResult<OutputSequence> {
    match settings.quantizer {
        QuantizerKind::Liq => process_with(animation, settings, &Liq { dithering: settings.dithering, fast: settings.fast }, reporter),
        QuantizerKind::MedianCut => process_with(animation, settings, &MedianCut { dithering: settings.dithering }, reporter),
    }
}

/// Composites frames on this thread's helper, crops and quantizes them on a pool of workers,
/// and collects them back in order.
///
/// The first error stops everything. No partial result is returned.
///
/// `ProgressReporter.increase()` is called each time a frame is finished, in any order.
pub fn process_with(animation: Animation, settings: &Settings, quantizer: &dyn Quantizer, reporter: &mut dyn ProgressReporter) -> CatResult<OutputSequence> {
    settings.validate()?;
    let frame_count = animation.frames.len();
    if frame_count == 0 {
        return Err(Error::NoFrames);
    }

    let geometry = settings.geometry();
    // same for every frame, so a bad crop fails before any work starts
    let (width, height) = geometry.output_size(animation.width as usize, animation.height as usize)?;
    if width > usize::from(u16::MAX) || height > usize::from(u16::MAX) {
        return Err(Error::WrongSize(format!("Output size {width}×{height} is too large; GIF allows at most 65535×65535")));
    }
    let num_threads = settings.worker_count(frame_count);
    let max_colors = settings.max_colors;
    log::debug!("processing {frame_count} frames into {width}×{height} using {num_threads} threads");

    let cancel = AtomicBool::new(false);
    let (result_tx, result_rx) = crossbeam_channel::unbounded();

    let frames = thread::scope(|scope| {
        let cancel = &cancel;
        let geometry = &geometry;
        let dispatcher = thread::Builder::new().name("compose".into()).spawn_scoped(scope, move || {
            let compose_tx = result_tx.clone();
            minipool::new(num_threads, "frame", cancel, move |jobs| {
                let mut compositor = Compositor::new(animation);
                loop {
                    if cancel.load(SeqCst) {
                        log::debug!("cancelled; not compositing further frames");
                        break;
                    }
                    let Some(composited) = compositor.next() else {
                        break;
                    };
                    match composited {
                        Ok(job) => if jobs.send(job).is_err() {
                            break; // workers have quit
                        },
                        Err(e) => {
                            cancel.store(true, SeqCst);
                            compose_tx.send(Err(e))?;
                            break;
                        },
                    }
                }
                Ok(())
            }, move |(index, frame): (usize, CompositedFrame)| {
                let res = process_frame(frame, geometry, quantizer, max_colors);
                if res.is_err() {
                    cancel.store(true, SeqCst);
                }
                result_tx.send(res.map(|f| (index, f)))?;
                Ok(())
            })
        }).map_err(|_| Error::ThreadSend)?;

        let collected = slots::collect(&result_rx, frame_count, cancel, reporter);
        let dispatched = dispatcher.join().map_err(|_| Error::ThreadSend)?;
        // the reassembler saw errors in the order they happened
        let frames = collected?;
        dispatched?;
        Ok::<_, Error>(frames)
    })?;

    Ok(OutputSequence { width, height, frames })
}

/// What each worker does with one frame
fn process_frame(frame: CompositedFrame, geometry: &Geometry, quantizer: &dyn Quantizer, max_colors: u16) -> CatResult<PalettedFrame> {
    let CompositedFrame { image, delay } = frame;
    let image = geometry.transform(image.as_ref())?;
    let (image, palette) = quantizer.quantize(image.as_ref(), max_colors)?;
    Ok(PalettedFrame { image, palette, delay })
}
