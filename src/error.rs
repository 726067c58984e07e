use std::io;
use std::num::TryFromIntError;
use quick_error::quick_error;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        /// Internal error
        ThreadSend {
            display("Internal error; unexpectedly aborted")
        }
        Aborted {
            display("aborted")
        }
        Decode(err: gif::DecodingError) {
            display("GIF decoding error: {}", err)
            source(err)
        }
        NoFrames {
            display("Found no usable frames to process")
        }
        Geometry(msg: String) {
            display("{}", msg)
        }
        Bounds(msg: String) {
            display("{}", msg)
        }
        Settings(msg: String) {
            display("Invalid settings: {}", msg)
        }
        DuplicateFrame(index: usize) {
            display("Frame {} has been delivered more than once", index)
        }
        FrameIndex(index: usize, len: usize) {
            display("Frame index {} is out of range (expected less than {})", index, len)
        }
        Encode(err: gif::EncodingError) {
            display("GIF encoding error: {}", err)
            source(err)
        }
        Io(err: io::Error) {
            from()
            from(_oom: std::collections::TryReserveError) -> (io::ErrorKind::OutOfMemory.into())
            display("I/O: {}", err)
        }
        WrongSize(msg: String) {
            display("{}", msg)
            from(e: TryFromIntError) -> (e.to_string())
            from(e: resize::Error) -> (e.to_string())
        }
        Quant(liq: imagequant::liq_error) {
            from()
            display("pngquant error: {}", liq)
        }
    }
}

pub type CatResult<T, E = Error> = Result<T, E>;

impl From<gif::DecodingError> for Error {
    #[cold]
    fn from(err: gif::DecodingError) -> Self {
        Self::Decode(err)
    }
}

impl From<gif::EncodingError> for Error {
    #[cold]
    fn from(err: gif::EncodingError) -> Self {
        Self::Encode(err)
    }
}

impl<T> From<crossbeam_channel::SendError<T>> for Error {
    #[cold]
    fn from(_: crossbeam_channel::SendError<T>) -> Self {
        Self::ThreadSend
    }
}
