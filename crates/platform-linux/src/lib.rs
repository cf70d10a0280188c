//! pidrec Linux Platform Integration
//!
//! Platform-specific implementations for Linux:
//! - **Display Detection:** Monitor enumeration via `xrandr`
//! - **Window Discovery:** Top-level window enumeration via `wmctrl`
//! - **Source Binding:** Process ID → window → display → [`CaptureSource`]
//! - **Permissions:** Capability detection and user guidance
//!
//! [`CaptureSource`]: pidrec_platform_core::CaptureSource

pub mod display;
pub mod permissions;
pub mod resolver;
pub mod windows;

pub use display::*;
pub use resolver::*;
pub use windows::*;
