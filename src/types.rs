//! Value types shared by the SDK records and the camera handle.

use std::time::Duration;

use serde::Serialize;

/// Image data format (`ASI_IMG_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ImageType(pub i32);

impl ImageType {
    /// 8-bit raw sensor data.
    pub const RAW8: Self = Self(0);
    /// 24-bit RGB, BGR byte order.
    pub const RGB24: Self = Self(1);
    /// 16-bit raw sensor data.
    pub const RAW16: Self = Self(2);
    /// 8-bit luminance.
    pub const Y8: Self = Self(3);
    /// List terminator.
    pub const END: Self = Self(-1);

    /// Bytes used by one pixel of this format.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self.0 {
            1 => 3,
            2 => 2,
            _ => 1,
        }
    }
}

/// Bayer filter layout of a color sensor (`ASI_BAYER_PATTERN`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BayerPattern(pub i32);

impl BayerPattern {
    /// RGGB.
    pub const RG: Self = Self(0);
    /// BGGR.
    pub const BG: Self = Self(1);
    /// GRBG.
    pub const GR: Self = Self(2);
    /// GBRG.
    pub const GB: Self = Self(3);
}

/// Identifier of a tunable camera parameter (`ASI_CONTROL_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ControlType(pub i32);

impl ControlType {
    /// Sensor gain.
    pub const GAIN: Self = Self(0);
    /// Exposure time in microseconds.
    pub const EXPOSURE: Self = Self(1);
    /// Gamma.
    pub const GAMMA: Self = Self(2);
    /// White balance, red channel.
    pub const WB_R: Self = Self(3);
    /// White balance, blue channel.
    pub const WB_B: Self = Self(4);
    /// Black level offset.
    pub const OFFSET: Self = Self(5);
    /// Older SDK name for [`Self::OFFSET`].
    pub const BRIGHTNESS: Self = Self(5);
    /// USB bandwidth overload.
    pub const BANDWIDTH_OVERLOAD: Self = Self(6);
    /// Overclock.
    pub const OVERCLOCK: Self = Self(7);
    /// Sensor temperature, in tenths of a degree Celsius.
    pub const TEMPERATURE: Self = Self(8);
    /// Image flip.
    pub const FLIP: Self = Self(9);
    /// Maximum gain in auto mode.
    pub const AUTO_MAX_GAIN: Self = Self(10);
    /// Maximum exposure in auto mode, in milliseconds.
    pub const AUTO_MAX_EXP: Self = Self(11);
    /// Target brightness in auto mode.
    pub const AUTO_TARGET_BRIGHTNESS: Self = Self(12);
    /// Hardware binning.
    pub const HARDWARE_BIN: Self = Self(13);
    /// High speed mode.
    pub const HIGH_SPEED_MODE: Self = Self(14);
    /// Cooler power in percent.
    pub const COOLER_POWER_PERC: Self = Self(15);
    /// Target temperature in degrees Celsius.
    pub const TARGET_TEMP: Self = Self(16);
    /// Cooler on/off.
    pub const COOLER_ON: Self = Self(17);
    /// Mono binning for color sensors.
    pub const MONO_BIN: Self = Self(18);
    /// Fan on/off.
    pub const FAN_ON: Self = Self(19);
    /// Pattern adjust.
    pub const PATTERN_ADJUST: Self = Self(20);
}

/// Camera trigger/operating mode (`ASI_CAMERA_MODE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CameraMode(pub i32);

impl CameraMode {
    /// Free running.
    pub const NORMAL: Self = Self(0);
    /// Software edge trigger.
    pub const TRIG_SOFT_EDGE: Self = Self(1);
    /// Rising edge trigger.
    pub const TRIG_RISE_EDGE: Self = Self(2);
    /// Falling edge trigger.
    pub const TRIG_FALL_EDGE: Self = Self(3);
    /// Software level trigger.
    pub const TRIG_SOFT_LEVEL: Self = Self(4);
    /// High level trigger.
    pub const TRIG_HIGH_LEVEL: Self = Self(5);
    /// Low level trigger.
    pub const TRIG_LOW_LEVEL: Self = Self(6);
    /// List terminator.
    pub const END: Self = Self(-1);
}

/// Direction of an ST4 guide pulse (`ASI_GUIDE_DIRECTION`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum GuideDirection {
    /// North.
    North = 0,
    /// South.
    South = 1,
    /// East.
    East = 2,
    /// West.
    West = 3,
}

/// Trigger output pin (`ASI_TRIG_OUTPUT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum TriggerOutputPin {
    /// Pin A.
    PinA = 0,
    /// Pin B.
    PinB = 1,
    /// No pin.
    None = -1,
}

/// State of a single-frame exposure (`ASI_EXPOSURE_STATUS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExposureStatus {
    /// Idle, ready to start an exposure.
    Idle,
    /// Exposure in progress.
    Working,
    /// Exposure finished, data ready for download.
    Success,
    /// Exposure failed, start a new one.
    Failed,
    /// A status value not defined by the SDK headers.
    Unknown(i32),
}

impl From<i32> for ExposureStatus {
    fn from(status: i32) -> Self {
        match status {
            0 => Self::Idle,
            1 => Self::Working,
            2 => Self::Success,
            3 => Self::Failed,
            other => Self::Unknown(other),
        }
    }
}

/// Region of interest size, binning and image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoiFormat {
    /// Width in binned pixels.
    pub width: i32,
    /// Height in binned pixels.
    pub height: i32,
    /// Binning factor.
    pub bins: i32,
    /// Pixel format.
    pub image_type: ImageType,
}

impl RoiFormat {
    /// Create a new ROI format.
    #[must_use]
    pub const fn new(width: i32, height: i32, bins: i32, image_type: ImageType) -> Self {
        Self {
            width,
            height,
            bins,
            image_type,
        }
    }

    /// Number of bytes in one frame of this format.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        let width = usize::try_from(self.width).unwrap_or(0);
        let height = usize::try_from(self.height).unwrap_or(0);
        width * height * self.image_type.bytes_per_pixel()
    }
}

/// ROI origin, in binned pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartPosition {
    /// Horizontal offset.
    pub x: i32,
    /// Vertical offset.
    pub y: i32,
}

/// Current region of interest: origin and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    /// Horizontal offset.
    pub start_x: i32,
    /// Vertical offset.
    pub start_y: i32,
    /// Width in binned pixels.
    pub width: i32,
    /// Height in binned pixels.
    pub height: i32,
}

/// Requested ROI change; `None` fields are derived from the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoiRequest {
    /// Horizontal offset, centred when unset.
    pub start_x: Option<i32>,
    /// Vertical offset, centred when unset.
    pub start_y: Option<i32>,
    /// Width, maximum aligned width when unset.
    pub width: Option<i32>,
    /// Height, maximum aligned height when unset.
    pub height: Option<i32>,
    /// Binning, current binning when unset.
    pub bins: Option<i32>,
    /// Pixel format, current format when unset.
    pub image_type: Option<ImageType>,
}

/// Current value of a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlValue {
    /// Numeric value.
    pub value: i64,
    /// Whether the camera adjusts the control automatically.
    pub auto: bool,
}

/// Recommended gain/offset settings reported by the SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GainOffset {
    /// Offset for the highest dynamic range.
    pub offset_highest_dr: i32,
    /// Offset at unity gain.
    pub offset_unity_gain: i32,
    /// Gain with the lowest read noise.
    pub gain_lowest_rn: i32,
    /// Offset with the lowest read noise.
    pub offset_lowest_rn: i32,
}

/// Output level and timing of a trigger output pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerOutputConfig {
    /// Whether the pin is driven high while active.
    pub pin_high: bool,
    /// Delay before the pulse, in microseconds.
    pub delay: i64,
    /// Pulse duration, in microseconds.
    pub duration: i64,
}

/// Convert an optional timeout to the SDK's millisecond argument (`-1` waits forever).
#[must_use]
pub fn timeout_millis(timeout: Option<Duration>) -> i32 {
    timeout.map_or(-1, |timeout| {
        i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX)
    })
}
