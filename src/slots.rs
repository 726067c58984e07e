//! Puts frames finished by the workers back in their original order

use crate::error::CatResult;
use crate::progress::ProgressReporter;
use crate::Error;
use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicBool, Ordering::SeqCst};

/// One slot per input frame, each filled exactly once
pub struct ResultSlots<T> {
    slots: Vec<Option<T>>,
    filled: usize,
}

impl<T> ResultSlots<T> {
    pub fn new(len: usize) -> Self {
        let mut slots = Vec::with_capacity(len);
        slots.resize_with(len, || None);
        Self { slots, filled: 0 }
    }

    /// Fails if the index is out of range or has already been filled
    pub fn fill(&mut self, index: usize, item: T) -> CatResult<()> {
        let len = self.slots.len();
        let slot = self.slots.get_mut(index).ok_or(Error::FrameIndex(index, len))?;
        if slot.is_some() {
            return Err(Error::DuplicateFrame(index));
        }
        *slot = Some(item);
        self.filled += 1;
        Ok(())
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    /// All items in index order, or `None` if any slot is still empty
    pub fn into_vec(self) -> Option<Vec<T>> {
        self.slots.into_iter().collect()
    }
}

/// Blocks until all `len` frames arrived, or the first error.
///
/// On error the `cancel` flag is raised, and anything that arrives later is dropped.
pub fn collect<T>(results: &Receiver<CatResult<(usize, T)>>, len: usize, cancel: &AtomicBool, reporter: &mut dyn ProgressReporter) -> CatResult<Vec<T>> {
    let res = fill_all(results, len, reporter);
    if res.is_err() {
        cancel.store(true, SeqCst);
    }
    res
}

fn fill_all<T>(results: &Receiver<CatResult<(usize, T)>>, len: usize, reporter: &mut dyn ProgressReporter) -> CatResult<Vec<T>> {
    let mut slots = ResultSlots::new(len);
    while !slots.is_complete() {
        // all senders gone before all frames arrived means a worker died
        let (index, item) = results.recv().map_err(|_| Error::ThreadSend)??;
        slots.fill(index, item)?;
        log::trace!("frame {index} done");
        if !reporter.increase() {
            log::warn!("processing aborted after {} frames", slots.filled);
            return Err(Error::Aborted);
        }
    }
    slots.into_vec().ok_or(Error::ThreadSend)
}
