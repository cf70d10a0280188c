use std::path::Path;

use pidrec_common::config::EncoderDefaults;
use pidrec_common::error::PidrecResult;
use pidrec_platform_core::CaptureSource;

use crate::capture::CaptureStream;
use crate::writer::{MediaWriter, VideoTrackSettings};

pub mod mp4;
#[cfg(target_os = "linux")]
pub mod x11;

pub use mp4::GstMp4Writer;
#[cfg(target_os = "linux")]
pub use x11::GstWindowCapture;

/// Open the platform writer for a source's geometry.
pub fn open_writer(
    output: &Path,
    source: &CaptureSource,
    defaults: &EncoderDefaults,
) -> PidrecResult<Box<dyn MediaWriter>> {
    let settings =
        VideoTrackSettings::from_defaults(source.width, source.height, source.fps(), defaults)?;
    Ok(Box::new(GstMp4Writer::open(output, settings)?))
}

/// Get the platform capture stream for a source.
pub fn open_capture(source: &CaptureSource) -> PidrecResult<Box<dyn CaptureStream>> {
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(GstWindowCapture::new(source)?))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = source;
        Err(pidrec_common::error::PidrecError::unsupported(
            "Window capture is only available on Linux/X11",
        ))
    }
}
