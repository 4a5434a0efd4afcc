use crate::canvas::Canvas;
use crate::Result;

/// A bound decode session for one URL.
///
/// Implementations own bitstream decoding, pixel conversion and scaling;
/// frames handed back are already RGBA at quadrant resolution. One instance
/// corresponds to one worker generation and is dropped on teardown.
pub trait VideoSource: Send {
    /// Nominal frame rate of the source in frames per second, or a value
    /// `<= 0` when the source does not report one.
    fn framerate(&self) -> f64;

    /// Pull the next decoded frame.
    ///
    /// `Ok(Some(data))` carries `quadrant_width * quadrant_height * 4` bytes
    /// of RGBA. `Ok(None)` means no frame was produced this step (e.g. a
    /// non-video packet); the caller just tries again. `Err` is a decode
    /// fault and demotes the owning slot to idle.
    fn next_frame(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Opens decode sessions; shared by all four decoder contexts.
pub trait SourceFactory: Send + Sync {
    fn open(&self, url: &str) -> Result<Box<dyn VideoSource>>;
}

/// The display half of the boundary: receives the composed canvas.
pub trait VideoDisplay: Send {
    fn present(&mut self, canvas: &Canvas) -> Result<()>;
}

/// Creates the display on the compositor thread.
///
/// Creation failure is the one fatal error in the system: without a display
/// target the compositor has no useful function.
pub trait DisplayFactory: Send {
    fn create(&self) -> Result<Box<dyn VideoDisplay>>;
}
