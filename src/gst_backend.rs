//! GStreamer-backed decode and display collaborators.
//!
//! Decoding, scaling and rendering live entirely in GStreamer pipelines;
//! the core engine only ever sees RGBA quadrant frames through the
//! [`VideoSource`]/[`VideoDisplay`] traits.

use gst::prelude::*;
use tracing::{debug, error, info, warn};

use crate::canvas::Canvas;
use crate::config::Config;
use crate::source::{DisplayFactory, SourceFactory, VideoDisplay, VideoSource};
use crate::{Result, WallError};

/// Elements the wall cannot run without.
const REQUIRED_ELEMENTS: &[&str] = &[
    "uridecodebin",
    "videoconvert",
    "videoscale",
    "appsink",
    "appsrc",
    "autovideosink",
];

/// Initialize GStreamer and verify the required elements are installed.
pub fn initialize() -> Result<()> {
    info!("Initializing GStreamer");

    gst::init().map_err(|e| {
        error!("Failed to initialize GStreamer: {}", e);
        WallError::ConfigError(format!("GStreamer initialization failed: {}", e))
    })?;

    let (major, minor, micro, nano) = gst::version();
    info!("GStreamer version: {}.{}.{}.{}", major, minor, micro, nano);

    for name in REQUIRED_ELEMENTS {
        if gst::ElementFactory::find(name).is_none() {
            return Err(WallError::ConfigError(format!(
                "required GStreamer element '{}' is not available",
                name
            )));
        }
    }
    Ok(())
}

/// Opens `uridecodebin ! videoconvert ! videoscale ! appsink` sessions that
/// deliver RGBA frames at quadrant resolution.
pub struct GstSourceFactory {
    width: u32,
    height: u32,
}

impl GstSourceFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            width: config.quadrant_width(),
            height: config.quadrant_height(),
        }
    }
}

impl SourceFactory for GstSourceFactory {
    fn open(&self, url: &str) -> Result<Box<dyn VideoSource>> {
        let open_err = |reason: String| WallError::SourceOpen {
            url: url.to_string(),
            reason,
        };

        let description = format!(
            "uridecodebin uri=\"{}\" ! videoconvert ! videoscale ! \
             video/x-raw,format=RGBA,width={},height={},pixel-aspect-ratio=1/1 ! \
             appsink name=sink sync=false max-buffers=4",
            url, self.width, self.height
        );
        debug!("Opening source pipeline: {}", description);

        let pipeline = gst::parse::launch(&description)
            .map_err(|e| open_err(e.to_string()))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| open_err("not a pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .and_then(|e| e.downcast::<gst_app::AppSink>().ok())
            .ok_or_else(|| open_err("appsink missing from pipeline".to_string()))?;

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| open_err(format!("cannot start pipeline: {}", e)))?;

        // Block until the first sample prerolls so open failures (bad URL,
        // unsupported stream) surface here rather than as decode faults.
        let sample = appsink
            .try_pull_preroll(gst::ClockTime::from_seconds(15))
            .ok_or_else(|| {
                let _ = pipeline.set_state(gst::State::Null);
                open_err("no stream prerolled".to_string())
            })?;

        let framerate = sample
            .caps()
            .and_then(|caps| caps.structure(0))
            .and_then(|s| s.get::<gst::Fraction>("framerate").ok())
            .map(|f| f.numer() as f64 / f.denom().max(1) as f64)
            .unwrap_or(0.0);

        info!("Opened {} at {:.3} fps", url, framerate);
        Ok(Box::new(GstSource {
            pipeline,
            appsink,
            framerate,
            frame_len: self.width as usize * self.height as usize * 4,
        }))
    }
}

struct GstSource {
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
    framerate: f64,
    frame_len: usize,
}

impl VideoSource for GstSource {
    fn framerate(&self) -> f64 {
        self.framerate
    }

    fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let sample = match self
            .appsink
            .try_pull_sample(gst::ClockTime::from_mseconds(100))
        {
            Some(sample) => sample,
            None => {
                if self.appsink.is_eos() {
                    return Err(WallError::Decode("end of stream".to_string()));
                }
                // Pipeline errors surface on the bus, not through appsink.
                if let Some(bus) = self.pipeline.bus() {
                    if let Some(msg) =
                        bus.pop_filtered(&[gst::MessageType::Error])
                    {
                        if let gst::MessageView::Error(err) = msg.view() {
                            return Err(WallError::Decode(err.error().to_string()));
                        }
                    }
                }
                return Ok(None);
            }
        };

        let buffer = sample
            .buffer()
            .ok_or_else(|| WallError::Decode("sample without buffer".to_string()))?;
        let map = buffer
            .map_readable()
            .map_err(|e| WallError::Decode(format!("cannot map buffer: {}", e)))?;

        let data = map.as_slice();
        if data.len() < self.frame_len {
            return Err(WallError::Decode(format!(
                "short frame: {} bytes, expected {}",
                data.len(),
                self.frame_len
            )));
        }
        Ok(Some(data[..self.frame_len].to_vec()))
    }
}

impl Drop for GstSource {
    fn drop(&mut self) {
        debug!("Stopping source pipeline");
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            warn!("Failed to stop source pipeline: {}", e);
        }
    }
}

/// Creates the `appsrc ! videoconvert ! autovideosink` display pipeline on
/// the compositor thread.
pub struct GstDisplayFactory {
    width: u32,
    height: u32,
}

impl GstDisplayFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            width: config.canvas_width,
            height: config.canvas_height,
        }
    }
}

impl DisplayFactory for GstDisplayFactory {
    fn create(&self) -> Result<Box<dyn VideoDisplay>> {
        let description = "appsrc name=src is-live=true format=time do-timestamp=true ! \
             videoconvert ! autovideosink sync=false";
        debug!("Opening display pipeline: {}", description);

        let pipeline = gst::parse::launch(description)
            .map_err(|e| WallError::DisplayInit(e.to_string()))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| WallError::DisplayInit("not a pipeline".to_string()))?;

        let appsrc = pipeline
            .by_name("src")
            .and_then(|e| e.downcast::<gst_app::AppSrc>().ok())
            .ok_or_else(|| WallError::DisplayInit("appsrc missing from pipeline".to_string()))?;

        let video_info =
            gst_video::VideoInfo::builder(gst_video::VideoFormat::Rgba, self.width, self.height)
                .fps(gst::Fraction::new(0, 1))
                .build()
                .map_err(|e| WallError::DisplayInit(format!("bad video info: {}", e)))?;
        let caps = video_info
            .to_caps()
            .map_err(|e| WallError::DisplayInit(format!("bad caps: {}", e)))?;
        appsrc.set_caps(Some(&caps));

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| WallError::DisplayInit(format!("cannot start display: {}", e)))?;

        info!("Display pipeline running at {}x{}", self.width, self.height);
        Ok(Box::new(GstDisplay { pipeline, appsrc }))
    }
}

struct GstDisplay {
    pipeline: gst::Pipeline,
    appsrc: gst_app::AppSrc,
}

impl VideoDisplay for GstDisplay {
    fn present(&mut self, canvas: &Canvas) -> Result<()> {
        let buffer = gst::Buffer::from_mut_slice(canvas.data().to_vec());
        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| WallError::Display(format!("push failed: {:?}", e)))?;
        Ok(())
    }
}

impl Drop for GstDisplay {
    fn drop(&mut self) {
        debug!("Stopping display pipeline");
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            warn!("Failed to stop display pipeline: {}", e);
        }
    }
}
