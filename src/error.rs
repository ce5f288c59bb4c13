//! Error types for SDK resolution, local validation and SDK status codes.

use std::path::PathBuf;

use thiserror::Error;

/// Named failure conditions reported by the ASI SDK through nonzero status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum SdkErrorKind {
    /// No camera connected or index value out of boundary.
    #[error("Invalid index")]
    InvalidIndex,
    /// Invalid camera ID.
    #[error("Invalid ID")]
    InvalidId,
    /// Invalid control type.
    #[error("Invalid control type")]
    InvalidControlType,
    /// Camera was not opened.
    #[error("Camera closed")]
    CameraClosed,
    /// Failed to find the camera, maybe it was removed.
    #[error("Camera removed")]
    CameraRemoved,
    /// Cannot find the path of the file.
    #[error("Invalid path")]
    InvalidPath,
    /// Invalid file format.
    #[error("Invalid file format")]
    InvalidFileFormat,
    /// Wrong video format size.
    #[error("Invalid size")]
    InvalidSize,
    /// Unsupported image format.
    #[error("Invalid image type")]
    InvalidImageType,
    /// The start position is outside the image boundary.
    #[error("Outside of boundary")]
    OutOfBoundary,
    /// The operation timed out.
    #[error("Timeout")]
    Timeout,
    /// Stop capture first.
    #[error("Invalid sequence")]
    InvalidSequence,
    /// Buffer size is not big enough.
    #[error("Buffer too small")]
    BufferTooSmall,
    /// Video mode is active.
    #[error("Video mode active")]
    VideoModeActive,
    /// An exposure is in progress.
    #[error("Exposure in progress")]
    ExposureInProgress,
    /// General error, e.g. a value is out of valid range.
    #[error("General error")]
    GeneralError,
    /// The current mode is wrong.
    #[error("Invalid mode")]
    InvalidMode,
}

/// Status code table, indexed by `code - 1`. Code 0 is success and has no entry.
const STATUS_TABLE: [SdkErrorKind; 17] = [
    SdkErrorKind::InvalidIndex,
    SdkErrorKind::InvalidId,
    SdkErrorKind::InvalidControlType,
    SdkErrorKind::CameraClosed,
    SdkErrorKind::CameraRemoved,
    SdkErrorKind::InvalidPath,
    SdkErrorKind::InvalidFileFormat,
    SdkErrorKind::InvalidSize,
    SdkErrorKind::InvalidImageType,
    SdkErrorKind::OutOfBoundary,
    SdkErrorKind::Timeout,
    SdkErrorKind::InvalidSequence,
    SdkErrorKind::BufferTooSmall,
    SdkErrorKind::VideoModeActive,
    SdkErrorKind::ExposureInProgress,
    SdkErrorKind::GeneralError,
    SdkErrorKind::InvalidMode,
];

impl SdkErrorKind {
    /// Look up the condition for a nonzero SDK status code.
    ///
    /// Returns `None` for `0` (success) and for codes past the end of the table.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        let index = usize::try_from(code).ok()?.checked_sub(1)?;
        STATUS_TABLE.get(index).copied()
    }

    /// The SDK status code for this condition.
    #[must_use]
    pub fn code(self) -> i32 {
        // Position in the table is bounded by its length of 17.
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let code = STATUS_TABLE
            .iter()
            .position(|kind| *kind == self)
            .map_or(0, |index| index as i32 + 1);
        code
    }
}

/// Error type for every operation in this crate.
#[derive(Debug, Error)]
pub enum AsiError {
    /// No candidate location yielded the SDK library.
    #[error("ASI SDK library not found: {0}")]
    LibraryNotFound(String),
    /// A library file was found but the platform loader rejected it.
    #[error("failed to load ASI SDK library {}: {source}", .path.display())]
    LibraryLoad {
        /// The file that failed to load.
        path: PathBuf,
        /// Loader error.
        #[source]
        source: libloading::Error,
    },
    /// The loaded library does not export a required entry point.
    #[error("ASI SDK library is missing entry point {symbol}: {source}")]
    SymbolBinding {
        /// Name of the missing entry point.
        symbol: &'static str,
        /// Loader error.
        #[source]
        source: libloading::Error,
    },
    /// The SDK returned a nonzero status code.
    #[error("{kind} (ASI error code {})", .kind.code())]
    Sdk {
        /// The decoded condition.
        kind: SdkErrorKind,
    },
    /// The SDK returned a status code outside the known table.
    #[error("unknown ASI status code {0}")]
    UnknownStatus(i32),
    /// No connected camera has the requested index.
    #[error("Invalid camera index {0}")]
    CameraNotFound(i32),
    /// No connected camera matches the requested model name.
    #[error("Could not find camera model {0}")]
    ModelNotFound(String),
    /// An argument failed local validation before reaching the SDK.
    #[error("{0}")]
    InvalidArgument(String),
}

impl AsiError {
    /// The SDK condition, if this error came from an SDK status code.
    #[must_use]
    pub const fn sdk_kind(&self) -> Option<SdkErrorKind> {
        match self {
            Self::Sdk { kind } => Some(*kind),
            _ => None,
        }
    }
}

impl From<SdkErrorKind> for AsiError {
    fn from(kind: SdkErrorKind) -> Self {
        Self::Sdk { kind }
    }
}

/// Result type for ASI operations.
pub type Result<T> = std::result::Result<T, AsiError>;

/// Translate an SDK status code into a result.
pub fn check_status(code: i32) -> Result<()> {
    if code == 0 {
        return Ok(());
    }
    SdkErrorKind::from_code(code).map_or(Err(AsiError::UnknownStatus(code)), |kind| {
        Err(AsiError::Sdk { kind })
    })
}
