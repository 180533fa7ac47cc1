//! Error types and result codes.
//!
//! Application-level failures carry positive codes, effect-runtime failures
//! carry the runtime's own (negative) codes. `main` turns the final
//! [`FxError`] into a process exit code.

use crate::buffer::BufferDescriptor;
use thiserror::Error;

/// Device-compute failures reported by the effect runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeviceStatus {
    #[error("device memory error")]
    Memory,
    #[error("device value error")]
    Value,
    #[error("device pitch error")]
    Pitch,
    #[error("device initialization error")]
    Init,
    #[error("device launch error")]
    Launch,
    #[error("device kernel error")]
    Kernel,
    #[error("device driver error")]
    Driver,
    #[error("device operation unsupported")]
    Unsupported,
    #[error("device illegal address")]
    IllegalAddress,
    #[error("unspecified device error")]
    Other,
}

impl DeviceStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::Value => -1001,
            Self::Memory => -1002,
            Self::Pitch => -1012,
            Self::Driver => -1035,
            Self::Init => -1127,
            Self::Kernel => -1209,
            Self::IllegalAddress => -1700,
            Self::Launch => -1719,
            Self::Unsupported => -1801,
            Self::Other => -1999,
        }
    }
}

/// Status codes passed through unchanged from the effect runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RuntimeStatus {
    #[error("An otherwise unspecified error has occurred")]
    General,
    #[error("The requested feature is not yet implemented")]
    Unimplemented,
    #[error("There is not enough memory for the requested operation")]
    Memory,
    #[error("An invalid effect handle has been supplied")]
    Effect,
    #[error("The given parameter selector is not valid in this effect filter")]
    Selector,
    #[error("An image buffer has not been specified")]
    Buffer,
    #[error("An invalid parameter value has been supplied for this effect")]
    Parameter,
    #[error("Some parameters are not appropriately matched")]
    Mismatch,
    #[error("The specified pixel format is not accommodated")]
    PixelFormat,
    #[error("Error while loading the model")]
    Model,
    #[error("Error loading the dynamic library")]
    Library,
    #[error("The effect has not been properly initialized")]
    Initialization,
    #[error("The file could not be found")]
    File,
    #[error("The requested feature was not found")]
    FeatureNotFound,
    #[error("A required parameter was not set")]
    MissingInput,
    #[error("The specified image resolution is not supported")]
    Resolution,
    #[error("The GPU is not supported")]
    UnsupportedGpu,
    #[error("The current GPU is not the one selected")]
    WrongGpu,
    #[error("The currently installed graphics driver is not supported")]
    UnsupportedDriver,
    #[error("{0}")]
    Device(DeviceStatus),
}

impl RuntimeStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::General => -1,
            Self::Unimplemented => -2,
            Self::Memory => -3,
            Self::Effect => -4,
            Self::Selector => -5,
            Self::Buffer => -6,
            Self::Parameter => -7,
            Self::Mismatch => -8,
            Self::PixelFormat => -9,
            Self::Model => -10,
            Self::Library => -11,
            Self::Initialization => -12,
            Self::File => -13,
            Self::FeatureNotFound => -14,
            Self::MissingInput => -15,
            Self::Resolution => -16,
            Self::UnsupportedGpu => -17,
            Self::WrongGpu => -18,
            Self::UnsupportedDriver => -19,
            Self::Device(status) => status.code(),
        }
    }

    /// The runtime's own string table.
    pub fn description(self) -> String {
        self.to_string()
    }
}

/// Failures of a host/device pixel transfer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransferError {
    #[error("no conversion from {src:?} to {dst:?}")]
    FormatMismatch {
        src: BufferDescriptor,
        dst: BufferDescriptor,
    },
    #[error("scratch buffer too small: need {need} bytes, have {have}")]
    CapacityExceeded { need: usize, have: usize },
    #[error("device transfer failed: {0}")]
    Device(RuntimeStatus),
}

impl TransferError {
    pub fn code(&self) -> i32 {
        match self {
            Self::FormatMismatch { .. } => RuntimeStatus::PixelFormat.code(),
            Self::CapacityExceeded { .. } => RuntimeStatus::Memory.code(),
            Self::Device(status) => status.code(),
        }
    }
}

/// Every failure surfaced by the pipeline.
#[derive(Debug, Error)]
pub enum FxError {
    #[error("The user chose to quit the application")]
    Quit,
    #[error("There was a problem with the command-line arguments: {0}")]
    Argument(String),
    #[error("There was a problem reading a file: {0}")]
    Read(String),
    #[error("There was a problem writing a file: {0}")]
    Write(String),
    #[error("{0} has not been specified")]
    MissingParameter(&'static str),
    #[error("{src_width}x{src_height} --> {dst_width}x{dst_height}: different scale for width and height is not supported")]
    ResolutionMismatch {
        src_width: u32,
        src_height: u32,
        dst_width: u32,
        dst_height: u32,
    },
    #[error("Camera does not support {width} x {height} resolution")]
    UnsupportedCameraResolution { width: u32, height: u32 },
    #[error("session buffers are already allocated for {width}x{height}")]
    AlreadyAllocated { width: u32, height: u32 },
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Runtime(#[from] RuntimeStatus),
}

pub type FxResult<T> = std::result::Result<T, FxError>;

impl FxError {
    /// Numeric result code, 0 being success.
    pub fn code(&self) -> i32 {
        match self {
            Self::Quit => 1,
            Self::Argument(_) => 2,
            Self::Read(_) => 3,
            Self::Write(_) => 4,
            Self::MissingParameter(_) => RuntimeStatus::Parameter.code(),
            Self::ResolutionMismatch { .. } => RuntimeStatus::Resolution.code(),
            Self::UnsupportedCameraResolution { .. } => RuntimeStatus::General.code(),
            Self::AlreadyAllocated { .. } => RuntimeStatus::Initialization.code(),
            Self::Transfer(err) => err.code(),
            Self::Runtime(status) => status.code(),
        }
    }

    /// Short human-readable string for the result code.
    pub fn description(&self) -> String {
        const APP_MESSAGES: &[(i32, &str)] = &[
            (1, "The user chose to quit the application"),
            (2, "There was a problem with the command-line arguments"),
            (3, "There was a problem reading a file"),
            (4, "There was a problem writing a file"),
        ];
        let code = self.code();
        if code > 0 {
            return APP_MESSAGES
                .iter()
                .find(|(c, _)| *c == code)
                .map(|(_, msg)| msg.to_string())
                .unwrap_or_else(|| "UNKNOWN ERROR".to_string());
        }
        match self {
            Self::Runtime(status) => status.description(),
            Self::Transfer(TransferError::Device(status)) => status.description(),
            other => other.to_string(),
        }
    }
}
