//! asi-camera: bindings to the ZWO ASI camera SDK
//!
//! The SDK is a native shared library loaded at runtime. [`init`] locates
//! and binds it once per process; the returned [`AsiSdk`] enumerates
//! cameras and opens them as [`Camera`] handles, which close themselves when
//! dropped. Native records are decoded into owned types in [`records`], and
//! every nonzero SDK status code becomes an [`AsiError`].
//!
//! ```no_run
//! # fn main() -> asi_camera::Result<()> {
//! let sdk = asi_camera::init(None)?;
//! for name in sdk.list_cameras()? {
//!     println!("{name}");
//! }
//! let camera = sdk.open(0)?;
//! camera.set_control_value(asi_camera::ControlType::EXPOSURE, 20_000, false)?;
//! camera.start_exposure(false)?;
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod error;
pub mod ffi;
pub mod library;
pub mod records;
pub mod types;
pub mod validation;

#[cfg(test)]
mod mock;

pub use device::Camera;
pub use error::{check_status, AsiError, Result, SdkErrorKind};
pub use ffi::AsiSdk;
pub use library::{init, try_init, Resolver, ResolverConfig, SdkLoader};
pub use records::{CameraInfo, ControlCaps, ControlMap, DeviceId, SerialNumber, SupportedModes};
pub use types::{
    BayerPattern, CameraMode, ControlType, ControlValue, ExposureStatus, GainOffset,
    GuideDirection, ImageType, Roi, RoiFormat, RoiRequest, StartPosition, TriggerOutputConfig,
    TriggerOutputPin,
};
