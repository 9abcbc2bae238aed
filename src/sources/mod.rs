//! Media source acquisition and ownership
//!
//! - [`DeviceBackend`] is the platform seam: anything that can open a camera
//!   or screen-share handle plugs in here.
//! - [`MediaSourceManager`] exclusively owns every live device handle; the
//!   rest of the studio only ever holds [`SourceId`] references.

pub mod device;
pub mod manager;

pub use device::{
    AcquiredDevice, DeviceBackend, DeviceHandle, MockDevice, MockDeviceBackend, SourceId,
    SourceKind,
};
pub use manager::{MediaSourceInfo, MediaSourceManager};
