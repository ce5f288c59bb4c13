//! Local checks on region-of-interest requests.
//!
//! The SDK rejects misaligned ROI sizes with a generic error, so these rules
//! are applied before anything is forwarded. All functions here are pure and
//! work from a decoded [`CameraInfo`].

use crate::error::{AsiError, Result};
use crate::records::CameraInfo;
use crate::types::{RoiFormat, RoiRequest, StartPosition};

/// ROI width must be a multiple of this.
const WIDTH_ALIGNMENT: i32 = 8;

/// ROI height must be a multiple of this.
const HEIGHT_ALIGNMENT: i32 = 2;

/// Models whose ROI area must be a multiple of [`ASI120_AREA_ALIGNMENT`].
const ASI120_MODELS: [&str; 2] = ["ZWO ASI120MM", "ZWO ASI120MC"];

/// Area alignment required by the ASI120 sensors.
const ASI120_AREA_ALIGNMENT: i64 = 1024;

fn invalid(message: &str) -> AsiError {
    AsiError::InvalidArgument(message.to_owned())
}

/// Sensor size after binning by `bins`.
///
/// # Errors
///
/// Returns `InvalidArgument` if `bins` is not positive.
pub fn binned_size(info: &CameraInfo, bins: i32) -> Result<(i32, i32)> {
    if bins <= 0 {
        return Err(invalid(&format!("Illegal value for bins: {bins}")));
    }
    let clamp = |value: i64| i32::try_from(value / i64::from(bins)).unwrap_or(i32::MAX);
    Ok((clamp(info.max_width), clamp(info.max_height)))
}

/// Checks an ROI size against the sensor and the SDK alignment rules.
///
/// # Errors
///
/// Returns `InvalidArgument` if:
/// - width is under 8, wider than the binned sensor, or not a multiple of 8
/// - height is under 2, taller than the binned sensor, or not a multiple of 2
/// - the camera is an ASI120 and width * height is not a multiple of 1024
pub fn validate_roi_format(info: &CameraInfo, format: &RoiFormat) -> Result<()> {
    let (max_width, max_height) = binned_size(info, format.bins)?;

    if format.width < WIDTH_ALIGNMENT {
        return Err(invalid("ROI width too small"));
    }
    if format.width > max_width {
        return Err(invalid("ROI width larger than binned sensor width"));
    }
    if format.width % WIDTH_ALIGNMENT != 0 {
        return Err(invalid("ROI width must be multiple of 8"));
    }

    if format.height < HEIGHT_ALIGNMENT {
        return Err(invalid("ROI height too small"));
    }
    if format.height > max_height {
        return Err(invalid("ROI height larger than binned sensor height"));
    }
    if format.height % HEIGHT_ALIGNMENT != 0 {
        return Err(invalid("ROI height must be multiple of 2"));
    }

    let area = i64::from(format.width) * i64::from(format.height);
    if ASI120_MODELS.contains(&info.name.as_str()) && area % ASI120_AREA_ALIGNMENT != 0 {
        return Err(invalid(&format!(
            "ROI width * height must be multiple of 1024 for {}",
            info.name
        )));
    }

    Ok(())
}

/// Checks that an ROI origin is non-negative.
///
/// # Errors
///
/// Returns `InvalidArgument` if either coordinate is negative.
pub fn validate_start_position(position: StartPosition) -> Result<()> {
    if position.x < 0 {
        return Err(invalid("X start position too small"));
    }
    if position.y < 0 {
        return Err(invalid("Y start position too small"));
    }
    Ok(())
}

/// Offset that centres `size` within `extent`.
fn centred(extent: i32, size: i32) -> i32 {
    let offset = (i64::from(extent) - i64::from(size)) / 2;
    i32::try_from(offset).unwrap_or(if offset < 0 { i32::MIN } else { i32::MAX })
}

/// Resolves an [`RoiRequest`] against the current format.
///
/// Unset binning and image type keep their current values, unset sizes take
/// the largest aligned size of the binned sensor, and unset origins centre
/// the ROI.
///
/// # Errors
///
/// Returns `InvalidArgument` if the binning is unsupported, the size is below
/// the alignment minimum, or the ROI and its origin do not fit on the binned
/// sensor.
pub fn plan_roi(
    info: &CameraInfo,
    current: &RoiFormat,
    request: &RoiRequest,
) -> Result<(RoiFormat, StartPosition)> {
    let bins = match request.bins {
        None => current.bins,
        Some(bins) if info.supports_bin(bins) => bins,
        Some(bins) => return Err(invalid(&format!("Illegal value for bins: {bins}"))),
    };
    let image_type = request.image_type.unwrap_or(current.image_type);
    let (max_width, max_height) = binned_size(info, bins)?;

    let width = request
        .width
        .unwrap_or(max_width - max_width % WIDTH_ALIGNMENT);
    let height = request
        .height
        .unwrap_or(max_height - max_height % HEIGHT_ALIGNMENT);

    if width < WIDTH_ALIGNMENT {
        return Err(invalid("ROI width too small"));
    }
    if height < HEIGHT_ALIGNMENT {
        return Err(invalid("ROI height too small"));
    }

    let start_x = request.start_x.unwrap_or_else(|| centred(max_width, width));
    if i64::from(start_x) + i64::from(width) > i64::from(max_width) {
        return Err(invalid(
            "ROI and start position larger than binned sensor width",
        ));
    }
    let start_y = request.start_y.unwrap_or_else(|| centred(max_height, height));
    if i64::from(start_y) + i64::from(height) > i64::from(max_height) {
        return Err(invalid(
            "ROI and start position larger than binned sensor height",
        ));
    }

    Ok((
        RoiFormat::new(width, height, bins, image_type),
        StartPosition {
            x: start_x,
            y: start_y,
        },
    ))
}
