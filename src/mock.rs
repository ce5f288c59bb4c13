//! In-process SDK stand-in for testing without hardware.
//!
//! The entry points below have the native signatures and operate on one
//! process-wide [`MockState`]. Tests that use it must be `#[serial]` and
//! start with [`reset`].

#![allow(unsafe_code)]

use std::ffi::{c_char, c_int, c_long, CStr};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::SdkErrorKind;
use crate::ffi::{
    AsiCameraInfo, AsiControlCaps, AsiId, AsiSdk, AsiSerialNumber, AsiSupportedMode, SdkFns,
};
use crate::records::encode_text;
use crate::types::{CameraMode, ControlType, ExposureStatus, ImageType, RoiFormat, StartPosition};

/// One control of a mock camera.
pub struct MockControl {
    pub caps: AsiControlCaps,
    pub value: c_long,
    pub auto: bool,
}

/// One attached mock camera.
pub struct MockCamera {
    pub info: AsiCameraInfo,
    pub controls: Vec<MockControl>,
    pub open: bool,
    pub roi: RoiFormat,
    pub start: StartPosition,
    pub id: AsiId,
    pub serial: AsiSerialNumber,
    pub modes: AsiSupportedMode,
    pub mode: c_int,
    pub exposure: c_int,
    pub last_exposure_dark: bool,
    pub video: bool,
    pub frames: u32,
    pub dropped: c_int,
    pub dark_file: Option<String>,
    pub guide_pulses: Vec<(c_int, bool)>,
    pub soft_trigger: Option<bool>,
    pub trigger_outputs: [(c_int, c_long, c_long); 2],
}

/// Everything the mock entry points read and write.
pub struct MockState {
    pub cameras: Vec<MockCamera>,
    pub fail_open: bool,
    pub fail_init: bool,
    pub close_calls: usize,
}

static STATE: Mutex<MockState> = Mutex::new(MockState {
    cameras: Vec::new(),
    fail_open: false,
    fail_init: false,
    close_calls: 0,
});

/// Lock the shared mock state.
pub fn state() -> MutexGuard<'static, MockState> {
    STATE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Restore the default two-camera setup.
pub fn reset() {
    let mut state = state();
    state.cameras = vec![asi120mm(), asi294mc()];
    state.fail_open = false;
    state.fail_init = false;
    state.close_calls = 0;
}

/// An SDK handle bound to the mock entry points.
pub fn sdk() -> AsiSdk {
    AsiSdk::from_fns(FNS)
}

fn control(
    name: &str,
    control_type: ControlType,
    (min, max, default): (c_long, c_long, c_long),
    auto_supported: bool,
    writable: bool,
) -> MockControl {
    let mut caps = AsiControlCaps::zeroed();
    caps.name = encode_text(name);
    caps.description = encode_text(&format!("{name} control"));
    caps.min_value = min;
    caps.max_value = max;
    caps.default_value = default;
    caps.is_auto_supported = c_int::from(auto_supported);
    caps.is_writable = c_int::from(writable);
    caps.control_type = control_type.0;
    MockControl {
        caps,
        value: default,
        auto: false,
    }
}

fn terminated<const N: usize>(values: &[c_int], sentinel: c_int) -> [c_int; N] {
    let mut field = [sentinel; N];
    for (slot, value) in field.iter_mut().zip(values) {
        *slot = *value;
    }
    field
}

fn camera(info: AsiCameraInfo, controls: Vec<MockControl>) -> MockCamera {
    let roi = RoiFormat::new(
        i32::try_from(info.max_width).unwrap_or(0),
        i32::try_from(info.max_height).unwrap_or(0),
        1,
        ImageType::RAW8,
    );
    MockCamera {
        info,
        controls,
        open: false,
        roi,
        start: StartPosition::default(),
        id: AsiId::default(),
        serial: AsiSerialNumber::default(),
        modes: AsiSupportedMode {
            supported_camera_mode: terminated(&[CameraMode::NORMAL.0], CameraMode::END.0),
        },
        mode: CameraMode::NORMAL.0,
        exposure: 0,
        last_exposure_dark: false,
        video: false,
        frames: 0,
        dropped: 0,
        dark_file: None,
        guide_pulses: Vec::new(),
        soft_trigger: None,
        trigger_outputs: [(0, 0, 0); 2],
    }
}

fn asi120mm() -> MockCamera {
    let mut info = AsiCameraInfo::zeroed();
    info.name = encode_text("ZWO ASI120MM");
    info.camera_id = 0;
    info.max_width = 1280;
    info.max_height = 960;
    info.supported_bins = terminated(&[1, 2], 0);
    info.supported_video_format = terminated(&[0, 2, 3], ImageType::END.0);
    info.pixel_size = 3.75;
    info.st4_port = 1;
    info.elec_per_adu = 4.0;
    info.bit_depth = 12;

    let mut camera = camera(
        info,
        vec![
            control("Gain", ControlType::GAIN, (0, 100, 50), true, true),
            control("Exposure", ControlType::EXPOSURE, (64, 2_000_000_000, 10_000), true, true),
            control("Offset", ControlType::OFFSET, (0, 100, 8), false, true),
            control("BandWidth", ControlType::BANDWIDTH_OVERLOAD, (40, 100, 50), true, true),
            control("Temperature", ControlType::TEMPERATURE, (-500, 1000, 215), false, false),
            control("Flip", ControlType::FLIP, (0, 3, 0), false, true),
        ],
    );
    camera.id.id = encode_text("guide");
    camera.serial.sn = [0, 0, 1, 2, 3, 4, 5, 6];
    camera
}

fn asi294mc() -> MockCamera {
    let mut info = AsiCameraInfo::zeroed();
    info.name = encode_text("ZWO ASI294MC Pro");
    info.camera_id = 1;
    info.max_width = 4144;
    info.max_height = 2822;
    info.is_color_cam = 1;
    info.supported_bins = terminated(&[1, 2, 3, 4], 0);
    info.supported_video_format = terminated(&[0, 1, 2, 3], ImageType::END.0);
    info.pixel_size = 4.63;
    info.is_cooler_cam = 1;
    info.is_usb3_host = 1;
    info.is_usb3_camera = 1;
    info.elec_per_adu = 3.99;
    info.bit_depth = 14;
    info.is_trigger_cam = 1;

    let mut camera = camera(
        info,
        vec![
            control("Gain", ControlType::GAIN, (0, 570, 200), true, true),
            control("Exposure", ControlType::EXPOSURE, (32, 2_000_000_000, 10_000), true, true),
            control("WB_R", ControlType::WB_R, (1, 99, 52), true, true),
            control("WB_B", ControlType::WB_B, (1, 99, 95), true, true),
            control("TargetTemp", ControlType::TARGET_TEMP, (-40, 30, 0), false, true),
            control("CoolerOn", ControlType::COOLER_ON, (0, 1, 0), false, true),
        ],
    );
    camera.serial.sn = [0x1a, 0x2b, 0x3c, 0x4d, 0x5e, 0x6f, 0x70, 0x81];
    camera.modes.supported_camera_mode = terminated(
        &[
            CameraMode::NORMAL.0,
            CameraMode::TRIG_SOFT_EDGE.0,
            CameraMode::TRIG_RISE_EDGE.0,
        ],
        CameraMode::END.0,
    );
    camera
}

/// Fill `data` with a horizontal gradient, dark on the left.
pub fn fill_gradient(data: &mut [u8], format: &RoiFormat) {
    let bytes_per_pixel = format.image_type.bytes_per_pixel();
    let width = usize::try_from(format.width).unwrap_or(0).max(1);
    let frame = format.buffer_size().min(data.len());
    if let Some(frame) = data.get_mut(..frame) {
        for (index, pixel) in frame.chunks_exact_mut(bytes_per_pixel).enumerate() {
            let x = index % width;
            pixel.fill(u8::try_from(x * 255 / width).unwrap_or(u8::MAX));
        }
    }
}

const OK: c_int = 0;

fn code(kind: SdkErrorKind) -> c_int {
    kind.code()
}

fn lookup(cameras: &mut [MockCamera], id: c_int) -> Option<&mut MockCamera> {
    usize::try_from(id).ok().and_then(|index| cameras.get_mut(index))
}

/// Run `f` on an opened camera, or return the status the SDK would.
fn with_open<F>(id: c_int, f: F) -> c_int
where
    F: FnOnce(&mut MockCamera) -> c_int,
{
    let mut state = state();
    match lookup(&mut state.cameras, id) {
        None => code(SdkErrorKind::InvalidId),
        Some(camera) if !camera.open => code(SdkErrorKind::CameraClosed),
        Some(camera) => f(camera),
    }
}

fn find_control(camera: &mut MockCamera, control_type: c_int) -> Option<&mut MockControl> {
    camera
        .controls
        .iter_mut()
        .find(|control| control.caps.control_type == control_type)
}

fn write_frame(camera: &mut MockCamera, buffer: *mut u8, size: c_long) -> c_int {
    let needed = camera.roi.buffer_size();
    let Ok(size) = usize::try_from(size) else {
        return code(SdkErrorKind::BufferTooSmall);
    };
    if size < needed {
        return code(SdkErrorKind::BufferTooSmall);
    }
    // SAFETY: the caller passes a buffer of `size` writable bytes.
    let data = unsafe { std::slice::from_raw_parts_mut(buffer, size) };
    fill_gradient(data, &camera.roi);
    camera.frames += 1;
    OK
}

unsafe extern "C" fn num_connected_cameras() -> c_int {
    c_int::try_from(state().cameras.len()).unwrap_or(c_int::MAX)
}

unsafe extern "C" fn camera_property(info: *mut AsiCameraInfo, index: c_int) -> c_int {
    let mut state = state();
    match lookup(&mut state.cameras, index) {
        Some(camera) => {
            // SAFETY: the caller passes a live record.
            unsafe { *info = camera.info };
            OK
        }
        None => code(SdkErrorKind::InvalidIndex),
    }
}

unsafe extern "C" fn open_camera(id: c_int) -> c_int {
    let mut state = state();
    if state.fail_open {
        return code(SdkErrorKind::CameraRemoved);
    }
    match lookup(&mut state.cameras, id) {
        Some(camera) => {
            camera.open = true;
            OK
        }
        None => code(SdkErrorKind::InvalidId),
    }
}

unsafe extern "C" fn init_camera(id: c_int) -> c_int {
    if state().fail_init {
        return code(SdkErrorKind::GeneralError);
    }
    with_open(id, |_| OK)
}

unsafe extern "C" fn close_camera(id: c_int) -> c_int {
    let mut state = state();
    state.close_calls += 1;
    match lookup(&mut state.cameras, id) {
        Some(camera) => {
            camera.open = false;
            camera.video = false;
            OK
        }
        None => code(SdkErrorKind::InvalidId),
    }
}

unsafe extern "C" fn num_controls(id: c_int, count: *mut c_int) -> c_int {
    with_open(id, |camera| {
        // SAFETY: out-pointer from the caller.
        unsafe { *count = c_int::try_from(camera.controls.len()).unwrap_or(c_int::MAX) };
        OK
    })
}

unsafe extern "C" fn control_caps(id: c_int, index: c_int, caps: *mut AsiControlCaps) -> c_int {
    with_open(id, |camera| {
        match usize::try_from(index)
            .ok()
            .and_then(|index| camera.controls.get(index))
        {
            Some(control) => {
                // SAFETY: out-pointer from the caller.
                unsafe { *caps = control.caps };
                OK
            }
            None => code(SdkErrorKind::InvalidControlType),
        }
    })
}

unsafe extern "C" fn get_control_value(
    id: c_int,
    control_type: c_int,
    value: *mut c_long,
    auto: *mut c_int,
) -> c_int {
    with_open(id, |camera| match find_control(camera, control_type) {
        Some(control) => {
            // SAFETY: out-pointers from the caller.
            unsafe {
                *value = control.value;
                *auto = c_int::from(control.auto);
            }
            OK
        }
        None => code(SdkErrorKind::InvalidControlType),
    })
}

unsafe extern "C" fn set_control_value(
    id: c_int,
    control_type: c_int,
    value: c_long,
    auto: c_int,
) -> c_int {
    with_open(id, |camera| match find_control(camera, control_type) {
        Some(control) if control.caps.is_writable == 0 => code(SdkErrorKind::GeneralError),
        Some(control) => {
            control.value = value.clamp(control.caps.min_value, control.caps.max_value);
            control.auto = auto != 0 && control.caps.is_auto_supported != 0;
            OK
        }
        None => code(SdkErrorKind::InvalidControlType),
    })
}

unsafe extern "C" fn get_roi_format(
    id: c_int,
    width: *mut c_int,
    height: *mut c_int,
    bins: *mut c_int,
    image_type: *mut c_int,
) -> c_int {
    with_open(id, |camera| {
        // SAFETY: out-pointers from the caller.
        unsafe {
            *width = camera.roi.width;
            *height = camera.roi.height;
            *bins = camera.roi.bins;
            *image_type = camera.roi.image_type.0;
        }
        OK
    })
}

unsafe extern "C" fn set_roi_format(
    id: c_int,
    width: c_int,
    height: c_int,
    bins: c_int,
    image_type: c_int,
) -> c_int {
    with_open(id, |camera| {
        if camera.video {
            return code(SdkErrorKind::VideoModeActive);
        }
        if bins <= 0
            || i64::from(width) * i64::from(bins) > i64::from(camera.info.max_width)
            || i64::from(height) * i64::from(bins) > i64::from(camera.info.max_height)
        {
            return code(SdkErrorKind::InvalidSize);
        }
        if !camera.info.supported_video_format.contains(&image_type) || image_type < 0 {
            return code(SdkErrorKind::InvalidImageType);
        }
        camera.roi = RoiFormat::new(width, height, bins, ImageType(image_type));
        camera.start = StartPosition::default();
        OK
    })
}

unsafe extern "C" fn get_start_pos(id: c_int, x: *mut c_int, y: *mut c_int) -> c_int {
    with_open(id, |camera| {
        // SAFETY: out-pointers from the caller.
        unsafe {
            *x = camera.start.x;
            *y = camera.start.y;
        }
        OK
    })
}

unsafe extern "C" fn set_start_pos(id: c_int, x: c_int, y: c_int) -> c_int {
    with_open(id, |camera| {
        let bins = i64::from(camera.roi.bins.max(1));
        let fits_x = i64::from(x) + i64::from(camera.roi.width)
            <= i64::from(camera.info.max_width) / bins;
        let fits_y = i64::from(y) + i64::from(camera.roi.height)
            <= i64::from(camera.info.max_height) / bins;
        if x < 0 || y < 0 || !fits_x || !fits_y {
            return code(SdkErrorKind::OutOfBoundary);
        }
        camera.start = StartPosition { x, y };
        OK
    })
}

unsafe extern "C" fn dropped_frames(id: c_int, dropped: *mut c_int) -> c_int {
    with_open(id, |camera| {
        // SAFETY: out-pointer from the caller.
        unsafe { *dropped = camera.dropped };
        OK
    })
}

unsafe extern "C" fn enable_dark_subtract(id: c_int, path: *const c_char) -> c_int {
    // SAFETY: the caller passes a NUL-terminated string.
    let path = unsafe { CStr::from_ptr(path) }.to_string_lossy().into_owned();
    with_open(id, |camera| {
        if path.is_empty() {
            return code(SdkErrorKind::InvalidPath);
        }
        camera.dark_file = Some(path);
        OK
    })
}

unsafe extern "C" fn disable_dark_subtract(id: c_int) -> c_int {
    with_open(id, |camera| {
        camera.dark_file = None;
        OK
    })
}

unsafe extern "C" fn start_video_capture(id: c_int) -> c_int {
    with_open(id, |camera| {
        if camera.exposure == 1 {
            return code(SdkErrorKind::ExposureInProgress);
        }
        camera.video = true;
        OK
    })
}

unsafe extern "C" fn stop_video_capture(id: c_int) -> c_int {
    with_open(id, |camera| {
        camera.video = false;
        OK
    })
}

unsafe extern "C" fn get_video_data(
    id: c_int,
    buffer: *mut u8,
    size: c_long,
    wait_ms: c_int,
) -> c_int {
    with_open(id, |camera| {
        if !camera.video {
            return code(SdkErrorKind::InvalidSequence);
        }
        let exposure_us = find_control(camera, ControlType::EXPOSURE.0)
            .map_or(0, |control| i64::from(control.value));
        if wait_ms >= 0 && exposure_us / 1000 > i64::from(wait_ms) {
            return code(SdkErrorKind::Timeout);
        }
        write_frame(camera, buffer, size)
    })
}

unsafe extern "C" fn pulse_guide_on(id: c_int, direction: c_int) -> c_int {
    with_open(id, |camera| {
        camera.guide_pulses.push((direction, true));
        OK
    })
}

unsafe extern "C" fn pulse_guide_off(id: c_int, direction: c_int) -> c_int {
    with_open(id, |camera| {
        camera.guide_pulses.push((direction, false));
        OK
    })
}

// Exposures complete immediately.
unsafe extern "C" fn start_exposure(id: c_int, dark: c_int) -> c_int {
    with_open(id, |camera| {
        if camera.video {
            return code(SdkErrorKind::VideoModeActive);
        }
        camera.last_exposure_dark = dark != 0;
        camera.exposure = 2;
        OK
    })
}

unsafe extern "C" fn stop_exposure(id: c_int) -> c_int {
    with_open(id, |camera| {
        camera.exposure = 0;
        OK
    })
}

unsafe extern "C" fn get_exp_status(id: c_int, status: *mut c_int) -> c_int {
    with_open(id, |camera| {
        // SAFETY: out-pointer from the caller.
        unsafe { *status = camera.exposure };
        OK
    })
}

unsafe extern "C" fn get_data_after_exp(id: c_int, buffer: *mut u8, size: c_long) -> c_int {
    with_open(id, |camera| {
        if ExposureStatus::from(camera.exposure) != ExposureStatus::Success {
            return code(SdkErrorKind::GeneralError);
        }
        let status = write_frame(camera, buffer, size);
        if status == OK {
            camera.exposure = 0;
        }
        status
    })
}

unsafe extern "C" fn get_id(id: c_int, raw: *mut AsiId) -> c_int {
    with_open(id, |camera| {
        // SAFETY: out-pointer from the caller.
        unsafe { *raw = camera.id };
        OK
    })
}

unsafe extern "C" fn set_id(id: c_int, raw: AsiId) -> c_int {
    with_open(id, |camera| {
        camera.id = raw;
        OK
    })
}

unsafe extern "C" fn get_gain_offset(
    id: c_int,
    offset_highest_dr: *mut c_int,
    offset_unity_gain: *mut c_int,
    gain_lowest_rn: *mut c_int,
    offset_lowest_rn: *mut c_int,
) -> c_int {
    with_open(id, |_| {
        // SAFETY: out-pointers from the caller.
        unsafe {
            *offset_highest_dr = 10;
            *offset_unity_gain = 21;
            *gain_lowest_rn = 139;
            *offset_lowest_rn = 30;
        }
        OK
    })
}

unsafe extern "C" fn get_camera_support_mode(id: c_int, modes: *mut AsiSupportedMode) -> c_int {
    with_open(id, |camera| {
        if camera.info.is_trigger_cam == 0 {
            return code(SdkErrorKind::InvalidMode);
        }
        // SAFETY: out-pointer from the caller.
        unsafe { *modes = camera.modes };
        OK
    })
}

unsafe extern "C" fn get_camera_mode(id: c_int, mode: *mut c_int) -> c_int {
    with_open(id, |camera| {
        if camera.info.is_trigger_cam == 0 {
            return code(SdkErrorKind::InvalidMode);
        }
        // SAFETY: out-pointer from the caller.
        unsafe { *mode = camera.mode };
        OK
    })
}

unsafe extern "C" fn set_camera_mode(id: c_int, mode: c_int) -> c_int {
    with_open(id, |camera| {
        if camera.info.is_trigger_cam == 0
            || mode < 0
            || !camera.modes.supported_camera_mode.contains(&mode)
        {
            return code(SdkErrorKind::InvalidMode);
        }
        camera.mode = mode;
        OK
    })
}

unsafe extern "C" fn send_soft_trigger(id: c_int, start: c_int) -> c_int {
    with_open(id, |camera| {
        camera.soft_trigger = Some(start != 0);
        OK
    })
}

unsafe extern "C" fn get_serial_number(id: c_int, serial: *mut AsiSerialNumber) -> c_int {
    with_open(id, |camera| {
        // SAFETY: out-pointer from the caller.
        unsafe { *serial = camera.serial };
        OK
    })
}

unsafe extern "C" fn set_trigger_output_io_conf(
    id: c_int,
    pin: c_int,
    pin_high: c_int,
    delay: c_long,
    duration: c_long,
) -> c_int {
    with_open(id, |camera| {
        match usize::try_from(pin)
            .ok()
            .and_then(|pin| camera.trigger_outputs.get_mut(pin))
        {
            Some(slot) => {
                *slot = (pin_high, delay, duration);
                OK
            }
            None => code(SdkErrorKind::GeneralError),
        }
    })
}

unsafe extern "C" fn get_trigger_output_io_conf(
    id: c_int,
    pin: c_int,
    pin_high: *mut c_int,
    delay: *mut c_long,
    duration: *mut c_long,
) -> c_int {
    with_open(id, |camera| {
        match usize::try_from(pin)
            .ok()
            .and_then(|pin| camera.trigger_outputs.get(pin))
        {
            Some(&(high, pin_delay, pin_duration)) => {
                // SAFETY: out-pointers from the caller.
                unsafe {
                    *pin_high = high;
                    *delay = pin_delay;
                    *duration = pin_duration;
                }
                OK
            }
            None => code(SdkErrorKind::GeneralError),
        }
    })
}

const FNS: SdkFns = SdkFns {
    get_num_of_connected_cameras: num_connected_cameras,
    get_camera_property: camera_property,
    open_camera,
    init_camera,
    close_camera,
    get_num_of_controls: num_controls,
    get_control_caps: control_caps,
    get_control_value,
    set_control_value,
    get_roi_format,
    set_roi_format,
    get_start_pos,
    set_start_pos,
    get_dropped_frames: dropped_frames,
    enable_dark_subtract,
    disable_dark_subtract,
    start_video_capture,
    stop_video_capture,
    get_video_data,
    pulse_guide_on,
    pulse_guide_off,
    start_exposure,
    stop_exposure,
    get_exp_status,
    get_data_after_exp,
    get_id,
    set_id,
    get_gain_offset,
    get_camera_support_mode,
    get_camera_mode,
    set_camera_mode,
    send_soft_trigger,
    get_serial_number,
    set_trigger_output_io_conf,
    get_trigger_output_io_conf,
};

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_gradient_pattern() {
        let format = RoiFormat::new(640, 480, 1, ImageType::RAW8);
        let mut data = vec![0u8; format.buffer_size()];
        fill_gradient(&mut data, &format);

        // Left edge dark, right edge bright.
        assert_eq!(data.first(), Some(&0));
        assert!(data.get(639).is_some_and(|&value| value > 200));
        assert!(data.last().is_some_and(|&value| value > 200));
    }

    #[test]
    fn test_gradient_fills_every_byte_of_a_pixel() {
        let format = RoiFormat::new(64, 2, 1, ImageType::RAW16);
        let mut data = vec![0u8; format.buffer_size()];
        fill_gradient(&mut data, &format);
        assert_eq!(data.get(126), data.get(127));
        assert!(data.get(126).is_some_and(|&value| value > 200));
    }

    #[test]
    #[serial]
    fn test_mock_cameras_enumerate() {
        reset();
        let sdk = sdk();
        assert_eq!(sdk.num_connected_cameras(), 2);
        let info = sdk.camera_property(1).expect("camera 1 should exist");
        assert_eq!(info.camera_id, 1);
        assert_eq!(info.is_trigger_cam, 1);
    }

    #[test]
    #[serial]
    fn test_closed_camera_rejects_calls() {
        reset();
        let err = sdk().num_controls(0).expect_err("camera is not open");
        assert_eq!(err.sdk_kind(), Some(SdkErrorKind::CameraClosed));
    }
}
