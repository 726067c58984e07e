//! For tracking processing progress and aborting early

#[cfg(feature = "pbr")]
use pbr::ProgressBar;

/// A trait that is used to report progress to some consumer.
pub trait ProgressReporter: Send {
    /// Called each time a frame has been cropped, resized and quantized.
    ///
    /// Frames complete in any order, so this only counts them.
    ///
    /// This method may return `false` to abort processing.
    fn increase(&mut self) -> bool;

    /// Called once when the output has been written.
    fn done(&mut self, _msg: &str) {}
}

/// No-op progress reporter
pub struct NoProgress {}

impl ProgressReporter for NoProgress {
    fn increase(&mut self) -> bool {
        true
    }
}

/// Implement the progress reporter trait for a progress bar,
/// to make it usable for frame processing reporting.
#[cfg(feature = "pbr")]
impl<T> ProgressReporter for ProgressBar<T> where T: std::io::Write + Send {
    fn increase(&mut self) -> bool {
        self.inc();
        true
    }

    fn done(&mut self, msg: &str) {
        self.finish_print(msg);
    }
}
