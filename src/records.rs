//! Decoded SDK records.
//!
//! Each type here is an owned copy of one native record from [`crate::ffi`]:
//! fixed-width text is cut at the first NUL, integer flags become `bool`, and
//! sentinel-terminated arrays become `Vec`s holding only the live entries.
//! All of them serialize to a key-value map using the SDK's field names.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::ffi::{
    long_to_i64, AsiCameraInfo, AsiControlCaps, AsiId, AsiSerialNumber, AsiSupportedMode,
};
use crate::types::{BayerPattern, CameraMode, ControlType, ImageType};

/// Decode a fixed-width NUL-padded text field.
pub fn decode_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&byte| byte == 0).unwrap_or(bytes.len());
    bytes
        .get(..end)
        .map(|text| String::from_utf8_lossy(text).into_owned())
        .unwrap_or_default()
}

/// Encode text into a fixed-width field, truncating at a character boundary
/// and zero-filling the remainder.
pub fn encode_text<const N: usize>(text: &str) -> [u8; N] {
    let mut end = text.len().min(N);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut field = [0u8; N];
    for (slot, byte) in field.iter_mut().zip(text.bytes().take(end)) {
        *slot = byte;
    }
    field
}

/// Entries before the first zero.
fn until_zero(values: &[i32]) -> Vec<i32> {
    values.iter().copied().take_while(|&value| value != 0).collect()
}

/// Entries before the first `-1`.
fn until_end(values: &[i32]) -> Vec<i32> {
    values.iter().copied().take_while(|&value| value != -1).collect()
}

/// Static description of one attached camera.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CameraInfo {
    /// Model name, e.g. `ZWO ASI120MM`.
    pub name: String,
    /// Camera ID used by every per-camera call.
    #[serde(rename = "CameraID")]
    pub camera_id: i32,
    /// Sensor height in pixels.
    pub max_height: i64,
    /// Sensor width in pixels.
    pub max_width: i64,
    /// Whether the sensor has a color filter array.
    pub is_color_cam: bool,
    /// Bayer layout of a color sensor.
    pub bayer_pattern: BayerPattern,
    /// Supported binning factors.
    pub supported_bins: Vec<i32>,
    /// Supported image formats.
    #[serde(rename = "SupportedVideoFormat")]
    pub supported_video_formats: Vec<ImageType>,
    /// Pixel size in micrometres.
    pub pixel_size: f64,
    /// Whether a mechanical shutter is fitted.
    pub mechanical_shutter: bool,
    /// Whether an ST4 guide port is fitted.
    #[serde(rename = "ST4Port")]
    pub st4_port: bool,
    /// Whether the camera is cooled.
    pub is_cooler_cam: bool,
    /// Whether the camera is attached to a USB3 host.
    #[serde(rename = "IsUSB3Host")]
    pub is_usb3_host: bool,
    /// Whether the camera is a USB3 device.
    #[serde(rename = "IsUSB3Camera")]
    pub is_usb3_camera: bool,
    /// Electrons per ADU.
    #[serde(rename = "ElecPerADU")]
    pub elec_per_adu: f32,
    /// ADC bit depth.
    pub bit_depth: i32,
    /// Whether trigger modes are supported.
    pub is_trigger_cam: bool,
}

impl From<&AsiCameraInfo> for CameraInfo {
    fn from(raw: &AsiCameraInfo) -> Self {
        Self {
            name: decode_text(&raw.name),
            camera_id: raw.camera_id,
            max_height: long_to_i64(raw.max_height),
            max_width: long_to_i64(raw.max_width),
            is_color_cam: raw.is_color_cam != 0,
            bayer_pattern: BayerPattern(raw.bayer_pattern),
            supported_bins: until_zero(&raw.supported_bins),
            supported_video_formats: until_end(&raw.supported_video_format)
                .into_iter()
                .map(ImageType)
                .collect(),
            pixel_size: raw.pixel_size,
            mechanical_shutter: raw.mechanical_shutter != 0,
            st4_port: raw.st4_port != 0,
            is_cooler_cam: raw.is_cooler_cam != 0,
            is_usb3_host: raw.is_usb3_host != 0,
            is_usb3_camera: raw.is_usb3_camera != 0,
            elec_per_adu: raw.elec_per_adu,
            bit_depth: raw.bit_depth,
            is_trigger_cam: raw.is_trigger_cam != 0,
        }
    }
}

impl CameraInfo {
    /// Whether `bins` is one of the supported binning factors.
    #[must_use]
    pub fn supports_bin(&self, bins: i32) -> bool {
        self.supported_bins.contains(&bins)
    }
}

/// Description of one tunable control.
///
/// `is_writable` is informational; nothing here refuses to decode or carry
/// a read-only control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ControlCaps {
    /// Control name, e.g. `Exposure`.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Largest accepted value.
    pub max_value: i64,
    /// Smallest accepted value.
    pub min_value: i64,
    /// Default value.
    pub default_value: i64,
    /// Whether auto mode is supported.
    pub is_auto_supported: bool,
    /// Whether the value can be set.
    pub is_writable: bool,
    /// Identifier used to read and write the control.
    pub control_type: ControlType,
}

impl From<&AsiControlCaps> for ControlCaps {
    fn from(raw: &AsiControlCaps) -> Self {
        Self {
            name: decode_text(&raw.name),
            description: decode_text(&raw.description),
            max_value: long_to_i64(raw.max_value),
            min_value: long_to_i64(raw.min_value),
            default_value: long_to_i64(raw.default_value),
            is_auto_supported: raw.is_auto_supported != 0,
            is_writable: raw.is_writable != 0,
            control_type: ControlType(raw.control_type),
        }
    }
}

/// Controls keyed by name.
pub type ControlMap = BTreeMap<String, ControlCaps>;

/// User-settable 8-byte camera identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Width of the native field in bytes.
    pub const WIDTH: usize = 8;

    /// Create an identifier; text beyond [`Self::WIDTH`] bytes is dropped on encode.
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self(text.to_owned())
    }

    /// The identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Native record holding this identifier, truncated or zero-padded.
    #[must_use]
    pub fn to_raw(&self) -> AsiId {
        AsiId {
            id: encode_text(&self.0),
        }
    }
}

impl From<&AsiId> for DeviceId {
    fn from(raw: &AsiId) -> Self {
        Self(decode_text(&raw.id))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Factory-assigned 64-bit serial number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SerialNumber(pub u64);

impl From<&AsiSerialNumber> for SerialNumber {
    fn from(raw: &AsiSerialNumber) -> Self {
        Self(u64::from_be_bytes(raw.sn))
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Serialize for SerialNumber {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Camera modes a device supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SupportedModes {
    /// Supported modes, in SDK order.
    #[serde(rename = "SupportedCameraMode")]
    pub modes: Vec<CameraMode>,
}

impl From<&AsiSupportedMode> for SupportedModes {
    fn from(raw: &AsiSupportedMode) -> Self {
        Self {
            modes: until_end(&raw.supported_camera_mode)
                .into_iter()
                .map(CameraMode)
                .collect(),
        }
    }
}

impl SupportedModes {
    /// Whether `mode` is in the list.
    #[must_use]
    pub fn contains(&self, mode: CameraMode) -> bool {
        self.modes.contains(&mode)
    }
}
