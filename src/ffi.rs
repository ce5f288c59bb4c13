//! Native layout of the `ASICamera2` SDK and its bound entry points.
//!
//! The `#[repr(C)]` records mirror the structs in `ASICamera2.h` field by
//! field. [`AsiSdk`] holds one function pointer per entry point; its
//! `pub(crate)` methods are the only place this crate crosses into native
//! code, and each one translates the returned status through
//! [`check_status`].

#![allow(unsafe_code)]

use std::ffi::{c_int, c_long, CStr};
use std::fmt;
use std::path::Path;

use libloading::Library;
use tracing::debug;

use crate::error::{check_status, AsiError, Result};
use crate::types::{
    CameraMode, ControlType, ControlValue, ExposureStatus, GainOffset, GuideDirection, ImageType,
    RoiFormat, StartPosition, TriggerOutputConfig, TriggerOutputPin,
};

/// `ASI_CAMERA_INFO`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AsiCameraInfo {
    /// Model name, NUL padded.
    pub name: [u8; 64],
    /// Camera ID, used by every other call.
    pub camera_id: c_int,
    /// Sensor height in pixels.
    pub max_height: c_long,
    /// Sensor width in pixels.
    pub max_width: c_long,
    /// Nonzero for a color sensor.
    pub is_color_cam: c_int,
    /// Bayer layout of a color sensor.
    pub bayer_pattern: c_int,
    /// Supported binning factors, zero terminated.
    pub supported_bins: [c_int; 16],
    /// Supported image formats, terminated by `ASI_IMG_END`.
    pub supported_video_format: [c_int; 8],
    /// Pixel size in micrometres.
    pub pixel_size: f64,
    /// Nonzero when a mechanical shutter is fitted.
    pub mechanical_shutter: c_int,
    /// Nonzero when an ST4 guide port is fitted.
    pub st4_port: c_int,
    /// Nonzero for a cooled camera.
    pub is_cooler_cam: c_int,
    /// Nonzero when attached to a USB3 host.
    pub is_usb3_host: c_int,
    /// Nonzero for a USB3 camera.
    pub is_usb3_camera: c_int,
    /// Electrons per ADU.
    pub elec_per_adu: f32,
    /// ADC bit depth.
    pub bit_depth: c_int,
    /// Nonzero when the camera supports trigger modes.
    pub is_trigger_cam: c_int,
    /// Reserved.
    pub unused: [u8; 16],
}

impl AsiCameraInfo {
    /// An all-zero record, ready to be filled by the SDK.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            name: [0; 64],
            camera_id: 0,
            max_height: 0,
            max_width: 0,
            is_color_cam: 0,
            bayer_pattern: 0,
            supported_bins: [0; 16],
            supported_video_format: [0; 8],
            pixel_size: 0.0,
            mechanical_shutter: 0,
            st4_port: 0,
            is_cooler_cam: 0,
            is_usb3_host: 0,
            is_usb3_camera: 0,
            elec_per_adu: 0.0,
            bit_depth: 0,
            is_trigger_cam: 0,
            unused: [0; 16],
        }
    }
}

/// `ASI_CONTROL_CAPS`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsiControlCaps {
    /// Control name, NUL padded.
    pub name: [u8; 64],
    /// Control description, NUL padded.
    pub description: [u8; 128],
    /// Largest accepted value.
    pub max_value: c_long,
    /// Smallest accepted value.
    pub min_value: c_long,
    /// Default value.
    pub default_value: c_long,
    /// Nonzero when auto mode is supported.
    pub is_auto_supported: c_int,
    /// Nonzero when the value can be set.
    pub is_writable: c_int,
    /// The `ASI_CONTROL_TYPE` this record describes.
    pub control_type: c_int,
    /// Reserved.
    pub unused: [u8; 32],
}

impl AsiControlCaps {
    /// An all-zero record, ready to be filled by the SDK.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            name: [0; 64],
            description: [0; 128],
            max_value: 0,
            min_value: 0,
            default_value: 0,
            is_auto_supported: 0,
            is_writable: 0,
            control_type: 0,
            unused: [0; 32],
        }
    }
}

/// `ASI_ID`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AsiId {
    /// Identifier bytes, NUL padded.
    pub id: [u8; 8],
}

/// `ASI_SN`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AsiSerialNumber {
    /// Serial number bytes, most significant first.
    pub sn: [u8; 8],
}

/// `ASI_SUPPORTED_MODE`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AsiSupportedMode {
    /// Supported camera modes, terminated by `ASI_MODE_END`.
    pub supported_camera_mode: [c_int; 16],
}

/// Entry points bound from the SDK library.
#[derive(Clone, Copy)]
pub(crate) struct SdkFns {
    pub get_num_of_connected_cameras: unsafe extern "C" fn() -> c_int,
    pub get_camera_property: unsafe extern "C" fn(*mut AsiCameraInfo, c_int) -> c_int,
    pub open_camera: unsafe extern "C" fn(c_int) -> c_int,
    pub init_camera: unsafe extern "C" fn(c_int) -> c_int,
    pub close_camera: unsafe extern "C" fn(c_int) -> c_int,
    pub get_num_of_controls: unsafe extern "C" fn(c_int, *mut c_int) -> c_int,
    pub get_control_caps: unsafe extern "C" fn(c_int, c_int, *mut AsiControlCaps) -> c_int,
    pub get_control_value: unsafe extern "C" fn(c_int, c_int, *mut c_long, *mut c_int) -> c_int,
    pub set_control_value: unsafe extern "C" fn(c_int, c_int, c_long, c_int) -> c_int,
    pub get_roi_format:
        unsafe extern "C" fn(c_int, *mut c_int, *mut c_int, *mut c_int, *mut c_int) -> c_int,
    pub set_roi_format: unsafe extern "C" fn(c_int, c_int, c_int, c_int, c_int) -> c_int,
    pub get_start_pos: unsafe extern "C" fn(c_int, *mut c_int, *mut c_int) -> c_int,
    pub set_start_pos: unsafe extern "C" fn(c_int, c_int, c_int) -> c_int,
    pub get_dropped_frames: unsafe extern "C" fn(c_int, *mut c_int) -> c_int,
    pub enable_dark_subtract: unsafe extern "C" fn(c_int, *const std::ffi::c_char) -> c_int,
    pub disable_dark_subtract: unsafe extern "C" fn(c_int) -> c_int,
    pub start_video_capture: unsafe extern "C" fn(c_int) -> c_int,
    pub stop_video_capture: unsafe extern "C" fn(c_int) -> c_int,
    pub get_video_data: unsafe extern "C" fn(c_int, *mut u8, c_long, c_int) -> c_int,
    pub pulse_guide_on: unsafe extern "C" fn(c_int, c_int) -> c_int,
    pub pulse_guide_off: unsafe extern "C" fn(c_int, c_int) -> c_int,
    pub start_exposure: unsafe extern "C" fn(c_int, c_int) -> c_int,
    pub stop_exposure: unsafe extern "C" fn(c_int) -> c_int,
    pub get_exp_status: unsafe extern "C" fn(c_int, *mut c_int) -> c_int,
    pub get_data_after_exp: unsafe extern "C" fn(c_int, *mut u8, c_long) -> c_int,
    pub get_id: unsafe extern "C" fn(c_int, *mut AsiId) -> c_int,
    pub set_id: unsafe extern "C" fn(c_int, AsiId) -> c_int,
    pub get_gain_offset:
        unsafe extern "C" fn(c_int, *mut c_int, *mut c_int, *mut c_int, *mut c_int) -> c_int,
    pub get_camera_support_mode: unsafe extern "C" fn(c_int, *mut AsiSupportedMode) -> c_int,
    pub get_camera_mode: unsafe extern "C" fn(c_int, *mut c_int) -> c_int,
    pub set_camera_mode: unsafe extern "C" fn(c_int, c_int) -> c_int,
    pub send_soft_trigger: unsafe extern "C" fn(c_int, c_int) -> c_int,
    pub get_serial_number: unsafe extern "C" fn(c_int, *mut AsiSerialNumber) -> c_int,
    pub set_trigger_output_io_conf:
        unsafe extern "C" fn(c_int, c_int, c_int, c_long, c_long) -> c_int,
    pub get_trigger_output_io_conf:
        unsafe extern "C" fn(c_int, c_int, *mut c_int, *mut c_long, *mut c_long) -> c_int,
}

/// Look up one entry point, copying the function pointer out of the symbol.
macro_rules! bind {
    ($library:expr, $name:literal) => {{
        // SAFETY: the field type receiving the pointer is the signature from ASICamera2.h.
        let symbol = unsafe { $library.get(concat!($name, "\0").as_bytes()) }
            .map_err(|source| AsiError::SymbolBinding {
                symbol: $name,
                source,
            })?;
        *symbol
    }};
}

impl SdkFns {
    fn bind(library: &Library) -> Result<Self> {
        Ok(Self {
            get_num_of_connected_cameras: bind!(library, "ASIGetNumOfConnectedCameras"),
            get_camera_property: bind!(library, "ASIGetCameraProperty"),
            open_camera: bind!(library, "ASIOpenCamera"),
            init_camera: bind!(library, "ASIInitCamera"),
            close_camera: bind!(library, "ASICloseCamera"),
            get_num_of_controls: bind!(library, "ASIGetNumOfControls"),
            get_control_caps: bind!(library, "ASIGetControlCaps"),
            get_control_value: bind!(library, "ASIGetControlValue"),
            set_control_value: bind!(library, "ASISetControlValue"),
            get_roi_format: bind!(library, "ASIGetROIFormat"),
            set_roi_format: bind!(library, "ASISetROIFormat"),
            get_start_pos: bind!(library, "ASIGetStartPos"),
            set_start_pos: bind!(library, "ASISetStartPos"),
            get_dropped_frames: bind!(library, "ASIGetDroppedFrames"),
            enable_dark_subtract: bind!(library, "ASIEnableDarkSubtract"),
            disable_dark_subtract: bind!(library, "ASIDisableDarkSubtract"),
            start_video_capture: bind!(library, "ASIStartVideoCapture"),
            stop_video_capture: bind!(library, "ASIStopVideoCapture"),
            get_video_data: bind!(library, "ASIGetVideoData"),
            pulse_guide_on: bind!(library, "ASIPulseGuideOn"),
            pulse_guide_off: bind!(library, "ASIPulseGuideOff"),
            start_exposure: bind!(library, "ASIStartExposure"),
            stop_exposure: bind!(library, "ASIStopExposure"),
            get_exp_status: bind!(library, "ASIGetExpStatus"),
            get_data_after_exp: bind!(library, "ASIGetDataAfterExp"),
            get_id: bind!(library, "ASIGetID"),
            set_id: bind!(library, "ASISetID"),
            get_gain_offset: bind!(library, "ASIGetGainOffset"),
            get_camera_support_mode: bind!(library, "ASIGetCameraSupportMode"),
            get_camera_mode: bind!(library, "ASIGetCameraMode"),
            set_camera_mode: bind!(library, "ASISetCameraMode"),
            send_soft_trigger: bind!(library, "ASISendSoftTrigger"),
            get_serial_number: bind!(library, "ASIGetSerialNumber"),
            set_trigger_output_io_conf: bind!(library, "ASISetTriggerOutputIOConf"),
            get_trigger_output_io_conf: bind!(library, "ASIGetTriggerOutputIOConf"),
        })
    }
}

/// A loaded SDK library with every entry point bound.
pub struct AsiSdk {
    fns: SdkFns,
    // Keeps the code behind `fns` mapped; dropped after `fns`.
    library: Option<Library>,
}

impl fmt::Debug for AsiSdk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsiSdk")
            .field("native", &self.library.is_some())
            .finish_non_exhaustive()
    }
}

impl AsiSdk {
    /// Load the SDK from `path` and bind all entry points.
    ///
    /// `path` may be a bare file name, in which case the platform's dynamic
    /// library search path is used.
    pub fn load(path: &Path) -> Result<Self> {
        // SAFETY: loading runs the SDK's initializers; nothing else is assumed about it.
        let library = unsafe { Library::new(path) }.map_err(|source| AsiError::LibraryLoad {
            path: path.to_path_buf(),
            source,
        })?;
        let fns = SdkFns::bind(&library)?;
        debug!(path = %path.display(), "bound ASI SDK entry points");
        Ok(Self {
            fns,
            library: Some(library),
        })
    }

    #[cfg(test)]
    pub(crate) const fn from_fns(fns: SdkFns) -> Self {
        Self {
            fns,
            library: None,
        }
    }

    // SAFETY (every call below): the pointers were bound with the header
    // signatures, and every pointer argument refers to a live local or a
    // slice whose length is passed alongside it.

    pub(crate) fn num_connected_cameras(&self) -> i32 {
        unsafe { (self.fns.get_num_of_connected_cameras)() }
    }

    pub(crate) fn camera_property(&self, index: i32) -> Result<AsiCameraInfo> {
        let mut info = AsiCameraInfo::zeroed();
        check_status(unsafe { (self.fns.get_camera_property)(&mut info, index) })?;
        Ok(info)
    }

    pub(crate) fn open_camera(&self, id: i32) -> Result<()> {
        check_status(unsafe { (self.fns.open_camera)(id) })
    }

    pub(crate) fn init_camera(&self, id: i32) -> Result<()> {
        check_status(unsafe { (self.fns.init_camera)(id) })
    }

    pub(crate) fn close_camera(&self, id: i32) -> Result<()> {
        check_status(unsafe { (self.fns.close_camera)(id) })
    }

    pub(crate) fn num_controls(&self, id: i32) -> Result<i32> {
        let mut count: c_int = 0;
        check_status(unsafe { (self.fns.get_num_of_controls)(id, &mut count) })?;
        Ok(count)
    }

    pub(crate) fn control_caps(&self, id: i32, control_index: i32) -> Result<AsiControlCaps> {
        let mut caps = AsiControlCaps::zeroed();
        check_status(unsafe { (self.fns.get_control_caps)(id, control_index, &mut caps) })?;
        Ok(caps)
    }

    pub(crate) fn control_value(&self, id: i32, control: ControlType) -> Result<ControlValue> {
        let mut value: c_long = 0;
        let mut auto: c_int = 0;
        check_status(unsafe {
            (self.fns.get_control_value)(id, control.0, &mut value, &mut auto)
        })?;
        Ok(ControlValue {
            value: long_to_i64(value),
            auto: auto != 0,
        })
    }

    pub(crate) fn set_control_value(
        &self,
        id: i32,
        control: ControlType,
        value: i64,
        auto: bool,
    ) -> Result<()> {
        let value = i64_to_long(value, "control value")?;
        check_status(unsafe {
            (self.fns.set_control_value)(id, control.0, value, c_int::from(auto))
        })
    }

    pub(crate) fn roi_format(&self, id: i32) -> Result<RoiFormat> {
        let (mut width, mut height, mut bins, mut image_type): (c_int, c_int, c_int, c_int) =
            (0, 0, 0, 0);
        check_status(unsafe {
            (self.fns.get_roi_format)(id, &mut width, &mut height, &mut bins, &mut image_type)
        })?;
        Ok(RoiFormat::new(width, height, bins, ImageType(image_type)))
    }

    pub(crate) fn set_roi_format(&self, id: i32, format: &RoiFormat) -> Result<()> {
        check_status(unsafe {
            (self.fns.set_roi_format)(
                id,
                format.width,
                format.height,
                format.bins,
                format.image_type.0,
            )
        })
    }

    pub(crate) fn start_pos(&self, id: i32) -> Result<StartPosition> {
        let mut position = StartPosition::default();
        check_status(unsafe { (self.fns.get_start_pos)(id, &mut position.x, &mut position.y) })?;
        Ok(position)
    }

    pub(crate) fn set_start_pos(&self, id: i32, position: StartPosition) -> Result<()> {
        check_status(unsafe { (self.fns.set_start_pos)(id, position.x, position.y) })
    }

    pub(crate) fn dropped_frames(&self, id: i32) -> Result<i32> {
        let mut dropped: c_int = 0;
        check_status(unsafe { (self.fns.get_dropped_frames)(id, &mut dropped) })?;
        Ok(dropped)
    }

    pub(crate) fn enable_dark_subtract(&self, id: i32, path: &CStr) -> Result<()> {
        check_status(unsafe { (self.fns.enable_dark_subtract)(id, path.as_ptr()) })
    }

    pub(crate) fn disable_dark_subtract(&self, id: i32) -> Result<()> {
        check_status(unsafe { (self.fns.disable_dark_subtract)(id) })
    }

    pub(crate) fn start_video_capture(&self, id: i32) -> Result<()> {
        check_status(unsafe { (self.fns.start_video_capture)(id) })
    }

    pub(crate) fn stop_video_capture(&self, id: i32) -> Result<()> {
        check_status(unsafe { (self.fns.stop_video_capture)(id) })
    }

    pub(crate) fn video_data(&self, id: i32, buffer: &mut [u8], timeout_ms: i32) -> Result<()> {
        let size = len_to_long(buffer.len())?;
        check_status(unsafe {
            (self.fns.get_video_data)(id, buffer.as_mut_ptr(), size, timeout_ms)
        })
    }

    pub(crate) fn pulse_guide_on(&self, id: i32, direction: GuideDirection) -> Result<()> {
        check_status(unsafe { (self.fns.pulse_guide_on)(id, direction as c_int) })
    }

    pub(crate) fn pulse_guide_off(&self, id: i32, direction: GuideDirection) -> Result<()> {
        check_status(unsafe { (self.fns.pulse_guide_off)(id, direction as c_int) })
    }

    pub(crate) fn start_exposure(&self, id: i32, dark: bool) -> Result<()> {
        check_status(unsafe { (self.fns.start_exposure)(id, c_int::from(dark)) })
    }

    pub(crate) fn stop_exposure(&self, id: i32) -> Result<()> {
        check_status(unsafe { (self.fns.stop_exposure)(id) })
    }

    pub(crate) fn exposure_status(&self, id: i32) -> Result<ExposureStatus> {
        let mut status: c_int = 0;
        check_status(unsafe { (self.fns.get_exp_status)(id, &mut status) })?;
        Ok(ExposureStatus::from(status))
    }

    pub(crate) fn data_after_exposure(&self, id: i32, buffer: &mut [u8]) -> Result<()> {
        let size = len_to_long(buffer.len())?;
        check_status(unsafe { (self.fns.get_data_after_exp)(id, buffer.as_mut_ptr(), size) })
    }

    pub(crate) fn id(&self, id: i32) -> Result<AsiId> {
        let mut raw = AsiId::default();
        check_status(unsafe { (self.fns.get_id)(id, &mut raw) })?;
        Ok(raw)
    }

    pub(crate) fn set_id(&self, id: i32, raw: AsiId) -> Result<()> {
        check_status(unsafe { (self.fns.set_id)(id, raw) })
    }

    pub(crate) fn gain_offset(&self, id: i32) -> Result<GainOffset> {
        let mut offsets = GainOffset {
            offset_highest_dr: 0,
            offset_unity_gain: 0,
            gain_lowest_rn: 0,
            offset_lowest_rn: 0,
        };
        check_status(unsafe {
            (self.fns.get_gain_offset)(
                id,
                &mut offsets.offset_highest_dr,
                &mut offsets.offset_unity_gain,
                &mut offsets.gain_lowest_rn,
                &mut offsets.offset_lowest_rn,
            )
        })?;
        Ok(offsets)
    }

    pub(crate) fn supported_mode(&self, id: i32) -> Result<AsiSupportedMode> {
        let mut modes = AsiSupportedMode::default();
        check_status(unsafe { (self.fns.get_camera_support_mode)(id, &mut modes) })?;
        Ok(modes)
    }

    pub(crate) fn camera_mode(&self, id: i32) -> Result<CameraMode> {
        let mut mode: c_int = 0;
        check_status(unsafe { (self.fns.get_camera_mode)(id, &mut mode) })?;
        Ok(CameraMode(mode))
    }

    pub(crate) fn set_camera_mode(&self, id: i32, mode: CameraMode) -> Result<()> {
        check_status(unsafe { (self.fns.set_camera_mode)(id, mode.0) })
    }

    pub(crate) fn send_soft_trigger(&self, id: i32, start: bool) -> Result<()> {
        check_status(unsafe { (self.fns.send_soft_trigger)(id, c_int::from(start)) })
    }

    pub(crate) fn serial_number(&self, id: i32) -> Result<AsiSerialNumber> {
        let mut serial = AsiSerialNumber::default();
        check_status(unsafe { (self.fns.get_serial_number)(id, &mut serial) })?;
        Ok(serial)
    }

    pub(crate) fn trigger_output_io_conf(
        &self,
        id: i32,
        pin: TriggerOutputPin,
    ) -> Result<TriggerOutputConfig> {
        let mut pin_high: c_int = 0;
        let mut delay: c_long = 0;
        let mut duration: c_long = 0;
        check_status(unsafe {
            (self.fns.get_trigger_output_io_conf)(
                id,
                pin as c_int,
                &mut pin_high,
                &mut delay,
                &mut duration,
            )
        })?;
        Ok(TriggerOutputConfig {
            pin_high: pin_high != 0,
            delay: long_to_i64(delay),
            duration: long_to_i64(duration),
        })
    }

    pub(crate) fn set_trigger_output_io_conf(
        &self,
        id: i32,
        pin: TriggerOutputPin,
        config: &TriggerOutputConfig,
    ) -> Result<()> {
        let delay = i64_to_long(config.delay, "trigger delay")?;
        let duration = i64_to_long(config.duration, "trigger duration")?;
        check_status(unsafe {
            (self.fns.set_trigger_output_io_conf)(
                id,
                pin as c_int,
                c_int::from(config.pin_high),
                delay,
                duration,
            )
        })
    }
}

// `c_long` is 32 bits on Windows and 64 bits on LP64 targets.
#[allow(clippy::useless_conversion)]
pub(crate) fn long_to_i64(value: c_long) -> i64 {
    i64::from(value)
}

#[allow(clippy::useless_conversion, clippy::unnecessary_fallible_conversions)]
fn i64_to_long(value: i64, what: &str) -> Result<c_long> {
    c_long::try_from(value)
        .map_err(|_| AsiError::InvalidArgument(format!("{what} {value} does not fit in a C long")))
}

fn len_to_long(len: usize) -> Result<c_long> {
    c_long::try_from(len)
        .map_err(|_| AsiError::InvalidArgument(format!("buffer of {len} bytes is too large")))
}
