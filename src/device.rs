//! Camera enumeration and the open camera handle.

use std::collections::BTreeMap;
use std::ffi::CString;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::error::{AsiError, Result};
use crate::ffi::AsiSdk;
use crate::records::{CameraInfo, ControlCaps, ControlMap, DeviceId, SerialNumber, SupportedModes};
use crate::types::{
    timeout_millis, CameraMode, ControlType, ControlValue, ExposureStatus, GainOffset,
    GuideDirection, ImageType, Roi, RoiFormat, RoiRequest, StartPosition, TriggerOutputConfig,
    TriggerOutputPin,
};
use crate::validation::{plan_roi, validate_roi_format, validate_start_position};

/// Controls that report auto support but must not be switched by [`Camera::auto_exposure`].
const AUTO_EXCLUDED: [&str; 1] = ["BandWidth"];

impl AsiSdk {
    /// Number of connected cameras.
    #[must_use]
    pub fn camera_count(&self) -> i32 {
        self.num_connected_cameras()
    }

    /// Model names of all connected cameras, in index order.
    pub fn list_cameras(&self) -> Result<Vec<String>> {
        (0..self.camera_count())
            .map(|index| self.camera_info(index).map(|info| info.name))
            .collect()
    }

    /// Static description of the camera at `index`.
    pub fn camera_info(&self, index: i32) -> Result<CameraInfo> {
        if !(0..self.camera_count()).contains(&index) {
            return Err(AsiError::CameraNotFound(index));
        }
        let raw = self.camera_property(index)?;
        Ok(CameraInfo::from(&raw))
    }

    /// Open and initialize the camera at `index`.
    ///
    /// If opening or initialization fails the camera is closed again before
    /// the error is returned.
    pub fn open(&self, index: i32) -> Result<Camera<'_>> {
        let info = self.camera_info(index)?;
        let id = info.camera_id;
        if let Err(err) = self.open_camera(id) {
            error!(camera = id, error = %err, "failed to open camera");
            if let Err(close_err) = self.close_camera(id) {
                warn!(camera = id, error = %close_err, "failed to close camera");
            }
            return Err(err);
        }
        let camera = Camera {
            sdk: self,
            info,
            open: true,
            default_timeout: None,
        };
        self.init_camera(id).inspect_err(|err| {
            error!(camera = id, error = %err, "failed to initialize camera");
        })?;
        debug!(camera = id, model = %camera.info.name, "opened camera");
        Ok(camera)
    }

    /// Open the first camera whose model name is `name` or `"ZWO " + name`.
    pub fn open_by_model(&self, name: &str) -> Result<Camera<'_>> {
        let prefixed = format!("ZWO {name}");
        let models = self.list_cameras()?;
        let index = models
            .iter()
            .position(|model| model == name || *model == prefixed)
            .ok_or_else(|| AsiError::ModelNotFound(name.to_owned()))?;
        let index = i32::try_from(index).map_err(|_| AsiError::ModelNotFound(name.to_owned()))?;
        self.open(index)
    }
}

/// An open, initialized camera.
///
/// The camera is closed when the handle is dropped; use [`Camera::close`] to
/// observe a close failure.
#[derive(Debug)]
pub struct Camera<'a> {
    sdk: &'a AsiSdk,
    info: CameraInfo,
    open: bool,
    default_timeout: Option<Duration>,
}

impl Camera<'_> {
    /// The camera ID passed to the SDK.
    #[must_use]
    pub const fn id_number(&self) -> i32 {
        self.info.camera_id
    }

    /// Description captured when the camera was opened.
    #[must_use]
    pub const fn info(&self) -> &CameraInfo {
        &self.info
    }

    /// Timeout used by [`Camera::video_frame`]; `None` waits forever.
    #[must_use]
    pub const fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Set the timeout used by [`Camera::video_frame`].
    pub fn set_default_timeout(&mut self, timeout: Option<Duration>) {
        self.default_timeout = timeout;
    }

    /// Close the camera.
    pub fn close(mut self) -> Result<()> {
        self.open = false;
        self.sdk.close_camera(self.info.camera_id)
    }

    // Controls

    /// Number of controls the camera exposes.
    pub fn num_controls(&self) -> Result<i32> {
        self.sdk.num_controls(self.info.camera_id)
    }

    /// Capabilities of the control at `index` (`0..num_controls()`).
    pub fn control_caps(&self, index: i32) -> Result<ControlCaps> {
        let raw = self.sdk.control_caps(self.info.camera_id, index)?;
        Ok(ControlCaps::from(&raw))
    }

    /// All controls, keyed by name.
    pub fn controls(&self) -> Result<ControlMap> {
        (0..self.num_controls()?)
            .map(|index| self.control_caps(index).map(|caps| (caps.name.clone(), caps)))
            .collect()
    }

    /// Current value of a control.
    pub fn control_value(&self, control: ControlType) -> Result<ControlValue> {
        self.sdk.control_value(self.info.camera_id, control)
    }

    /// Set a control, optionally leaving it under automatic adjustment.
    pub fn set_control_value(&self, control: ControlType, value: i64, auto: bool) -> Result<()> {
        self.sdk
            .set_control_value(self.info.camera_id, control, value, auto)
    }

    /// Current value of every control, keyed by name.
    pub fn control_values(&self) -> Result<BTreeMap<String, i64>> {
        self.controls()?
            .into_iter()
            .map(|(name, caps)| {
                self.control_value(caps.control_type)
                    .map(|current| (name, current.value))
            })
            .collect()
    }

    /// Switch the named controls to automatic mode at their default values.
    ///
    /// Controls that do not exist or do not support auto mode are skipped.
    /// Returns the names of the controls that were switched.
    /// Controls are switched and reported in the order given.
    pub fn auto_exposure(&self, names: &[&str]) -> Result<Vec<String>> {
        let controls = self.controls()?;
        let mut switched = Vec::new();
        for &name in names {
            if AUTO_EXCLUDED.contains(&name) {
                continue;
            }
            let Some(caps) = controls.get(name) else {
                continue;
            };
            if caps.is_auto_supported {
                self.set_control_value(caps.control_type, caps.default_value, true)?;
                switched.push(name.to_owned());
            }
        }
        Ok(switched)
    }

    /// Switch white balance to automatic mode.
    pub fn auto_wb(&self) -> Result<Vec<String>> {
        self.auto_exposure(&["WB_B", "WB_R"])
    }

    // ROI and format

    /// Current ROI size, binning and image type.
    pub fn roi_format(&self) -> Result<RoiFormat> {
        self.sdk.roi_format(self.info.camera_id)
    }

    /// Set ROI size, binning and image type after checking alignment rules.
    pub fn set_roi_format(&self, format: &RoiFormat) -> Result<()> {
        validate_roi_format(&self.info, format)?;
        self.sdk.set_roi_format(self.info.camera_id, format)
    }

    /// Current ROI origin.
    pub fn start_position(&self) -> Result<StartPosition> {
        self.sdk.start_pos(self.info.camera_id)
    }

    /// Move the ROI origin.
    pub fn set_start_position(&self, position: StartPosition) -> Result<()> {
        validate_start_position(position)?;
        self.sdk.set_start_pos(self.info.camera_id, position)
    }

    /// Current ROI origin and size.
    pub fn roi(&self) -> Result<Roi> {
        let format = self.roi_format()?;
        let start = self.start_position()?;
        Ok(Roi {
            start_x: start.x,
            start_y: start.y,
            width: format.width,
            height: format.height,
        })
    }

    /// Change the ROI; unset fields are derived as described on [`RoiRequest`].
    pub fn set_roi(&self, request: &RoiRequest) -> Result<()> {
        let current = self.roi_format()?;
        let (format, start) = plan_roi(&self.info, &current, request)?;
        self.set_roi_format(&format)?;
        self.set_start_position(start)
    }

    /// Current binning factor.
    pub fn bin(&self) -> Result<i32> {
        Ok(self.roi_format()?.bins)
    }

    /// Current image type.
    pub fn image_type(&self) -> Result<ImageType> {
        Ok(self.roi_format()?.image_type)
    }

    /// Change the image type, keeping ROI size and binning.
    pub fn set_image_type(&self, image_type: ImageType) -> Result<()> {
        let format = RoiFormat {
            image_type,
            ..self.roi_format()?
        };
        self.set_roi_format(&format)
    }

    // Capture

    /// Begin a single exposure.
    pub fn start_exposure(&self, dark: bool) -> Result<()> {
        self.sdk.start_exposure(self.info.camera_id, dark)
    }

    /// Abort the current exposure.
    pub fn stop_exposure(&self) -> Result<()> {
        self.sdk.stop_exposure(self.info.camera_id)
    }

    /// State of the current exposure.
    pub fn exposure_status(&self) -> Result<ExposureStatus> {
        self.sdk.exposure_status(self.info.camera_id)
    }

    /// Download a finished exposure into a new buffer sized for the current ROI.
    pub fn data_after_exposure(&self) -> Result<Vec<u8>> {
        let mut buffer = vec![0; self.roi_format()?.buffer_size()];
        self.sdk
            .data_after_exposure(self.info.camera_id, &mut buffer)?;
        Ok(buffer)
    }

    /// Download a finished exposure into `buffer`.
    pub fn data_after_exposure_into(&self, buffer: &mut [u8]) -> Result<()> {
        self.check_buffer(buffer)?;
        self.sdk.data_after_exposure(self.info.camera_id, buffer)
    }

    /// Start continuous capture.
    pub fn start_video_capture(&self) -> Result<()> {
        self.sdk.start_video_capture(self.info.camera_id)
    }

    /// Stop continuous capture.
    pub fn stop_video_capture(&self) -> Result<()> {
        self.sdk.stop_video_capture(self.info.camera_id)
    }

    /// Wait for the next video frame; a `timeout` of `None` waits forever.
    pub fn video_data(&self, timeout: Option<Duration>) -> Result<Vec<u8>> {
        let mut buffer = vec![0; self.roi_format()?.buffer_size()];
        self.sdk
            .video_data(self.info.camera_id, &mut buffer, timeout_millis(timeout))?;
        Ok(buffer)
    }

    /// Wait for the next video frame, writing it into `buffer`.
    pub fn video_data_into(&self, buffer: &mut [u8], timeout: Option<Duration>) -> Result<()> {
        self.check_buffer(buffer)?;
        self.sdk
            .video_data(self.info.camera_id, buffer, timeout_millis(timeout))
    }

    /// Wait for the next video frame using [`Camera::default_timeout`].
    pub fn video_frame(&self) -> Result<Vec<u8>> {
        self.video_data(self.default_timeout)
    }

    /// Frames dropped since video capture started.
    pub fn dropped_frames(&self) -> Result<i32> {
        self.sdk.dropped_frames(self.info.camera_id)
    }

    /// Subtract the dark frame stored in the BMP file at `path`.
    pub fn enable_dark_subtract(&self, path: &Path) -> Result<()> {
        let text = path.to_str().ok_or_else(|| {
            AsiError::InvalidArgument(format!("dark frame path {} is not UTF-8", path.display()))
        })?;
        let path = CString::new(text).map_err(|_| {
            AsiError::InvalidArgument(format!("dark frame path {text} contains a NUL byte"))
        })?;
        self.sdk.enable_dark_subtract(self.info.camera_id, &path)
    }

    /// Stop subtracting the dark frame.
    pub fn disable_dark_subtract(&self) -> Result<()> {
        self.sdk.disable_dark_subtract(self.info.camera_id)
    }

    fn check_buffer(&self, buffer: &[u8]) -> Result<()> {
        let needed = self.roi_format()?.buffer_size();
        if buffer.len() < needed {
            return Err(AsiError::InvalidArgument(format!(
                "Buffer too small: {} bytes, {needed} needed",
                buffer.len()
            )));
        }
        Ok(())
    }

    // Guiding, identity and trigger

    /// Start an ST4 guide pulse.
    pub fn pulse_guide_on(&self, direction: GuideDirection) -> Result<()> {
        self.sdk.pulse_guide_on(self.info.camera_id, direction)
    }

    /// End an ST4 guide pulse.
    pub fn pulse_guide_off(&self, direction: GuideDirection) -> Result<()> {
        self.sdk.pulse_guide_off(self.info.camera_id, direction)
    }

    /// User-assigned identifier stored in the camera.
    pub fn id(&self) -> Result<DeviceId> {
        let raw = self.sdk.id(self.info.camera_id)?;
        Ok(DeviceId::from(&raw))
    }

    /// Store an identifier in the camera; text past 8 bytes is dropped.
    pub fn set_id(&self, text: &str) -> Result<()> {
        self.sdk
            .set_id(self.info.camera_id, DeviceId::new(text).to_raw())
    }

    /// Factory serial number.
    pub fn serial_number(&self) -> Result<SerialNumber> {
        let raw = self.sdk.serial_number(self.info.camera_id)?;
        Ok(SerialNumber::from(&raw))
    }

    /// Recommended gain and offset settings.
    pub fn gain_offset(&self) -> Result<GainOffset> {
        self.sdk.gain_offset(self.info.camera_id)
    }

    /// Camera modes supported by a trigger camera.
    pub fn supported_modes(&self) -> Result<SupportedModes> {
        let raw = self.sdk.supported_mode(self.info.camera_id)?;
        Ok(SupportedModes::from(&raw))
    }

    /// Current camera mode.
    pub fn camera_mode(&self) -> Result<CameraMode> {
        self.sdk.camera_mode(self.info.camera_id)
    }

    /// Change the camera mode.
    pub fn set_camera_mode(&self, mode: CameraMode) -> Result<()> {
        self.sdk.set_camera_mode(self.info.camera_id, mode)
    }

    /// Send a software trigger; `start` false ends a level trigger.
    pub fn send_soft_trigger(&self, start: bool) -> Result<()> {
        self.sdk.send_soft_trigger(self.info.camera_id, start)
    }

    /// Output configuration of a trigger pin.
    pub fn trigger_output_config(&self, pin: TriggerOutputPin) -> Result<TriggerOutputConfig> {
        self.sdk.trigger_output_io_conf(self.info.camera_id, pin)
    }

    /// Configure a trigger output pin.
    pub fn set_trigger_output_config(
        &self,
        pin: TriggerOutputPin,
        config: &TriggerOutputConfig,
    ) -> Result<()> {
        self.sdk
            .set_trigger_output_io_conf(self.info.camera_id, pin, config)
    }
}

impl Drop for Camera<'_> {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        if let Err(err) = self.sdk.close_camera(self.info.camera_id) {
            warn!(camera = self.info.camera_id, error = %err, "failed to close camera");
        }
    }
}
