//! Frames delivered by the capture subsystem.

use std::time::Duration;

use pidrec_platform_core::Rect;

/// Per-frame metadata attached by the capture subsystem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Region of the image that holds captured content.
    pub content_rect: Option<Rect>,
    /// Backing scale of the captured display.
    pub scale_factor: f64,
}

/// A timestamped raw image (packed BGRx) plus capture metadata.
///
/// Frames are handed to the intake by value and move into the writer on
/// append; nothing keeps them after that.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Presentation timestamp on the capture clock.
    pub pts: Duration,
    /// Cleared by the capture subsystem for buffers that carry no usable image.
    pub valid: bool,
    /// Attachment metadata. `None` when the capture subsystem attached nothing.
    pub info: Option<FrameInfo>,
    /// Pixel data.
    pub data: Vec<u8>,
}

impl Frame {
    /// A valid frame without attachments.
    pub fn new(pts: Duration, data: Vec<u8>) -> Self {
        Self {
            pts,
            valid: true,
            info: None,
            data,
        }
    }

    /// A frame the capture subsystem flagged as unusable.
    pub fn invalid(pts: Duration) -> Self {
        Self {
            pts,
            valid: false,
            info: None,
            data: Vec::new(),
        }
    }

    pub fn with_info(mut self, info: FrameInfo) -> Self {
        self.info = Some(info);
        self
    }

    /// Attach a full-frame content rectangle.
    pub fn with_content_rect(self, rect: Rect) -> Self {
        self.with_info(FrameInfo {
            content_rect: Some(rect),
            scale_factor: 1.0,
        })
    }

    /// The content rectangle, if the attachment exists and describes a
    /// non-empty region.
    pub fn content_rect(&self) -> Option<Rect> {
        self.info
            .as_ref()?
            .content_rect
            .filter(|rect| !rect.is_empty())
    }
}
