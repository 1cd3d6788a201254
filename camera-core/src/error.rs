use std::borrow::Cow;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::Display;
use thiserror::Error;

/// Status codes reported across the session boundary.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum ServiceErrorCode {
    #[strum(serialize = "CAMERA_OK")]
    Ok = 0,
    #[strum(serialize = "CAMERA_ALLOC_ERROR")]
    AllocError,
    #[strum(serialize = "CAMERA_INVALID_ARG")]
    InvalidArg,
    #[strum(serialize = "CAMERA_UNSUPPORTED")]
    Unsupported,
    #[strum(serialize = "CAMERA_DEVICE_BUSY")]
    DeviceBusy,
    #[strum(serialize = "CAMERA_DEVICE_CLOSED")]
    DeviceClosed,
    #[strum(serialize = "CAMERA_DEVICE_REQUEST_TIMEOUT")]
    DeviceRequestTimeout,
    #[strum(serialize = "CAMERA_STREAM_BUFFER_LOST")]
    StreamBufferLost,
    #[strum(serialize = "CAMERA_INVALID_SESSION_CFG")]
    InvalidSessionCfg,
    #[strum(serialize = "CAMERA_CAPTURE_LIMIT_EXCEED")]
    CaptureLimitExceed,
    #[strum(serialize = "CAMERA_INVALID_STATE")]
    InvalidState,
    #[strum(serialize = "CAMERA_UNKNOWN_ERROR")]
    UnknownError,
    #[strum(serialize = "CAMERA_DEVICE_PREEMPTED")]
    DevicePreempted,
    #[strum(serialize = "CAMERA_OPERATION_NOT_ALLOWED")]
    OperationNotAllowed,
    #[strum(serialize = "CAMERA_DEVICE_ERROR")]
    DeviceError,
    #[strum(serialize = "CAMERA_NO_PERMISSION")]
    NoPermission,
    #[strum(serialize = "CAMERA_DEVICE_CONFLICT")]
    DeviceConflict,
}

#[derive(Clone, Debug, Error)]
pub enum Error {
    #[error("Allocation failed: {0}")]
    AllocationFailed(Cow<'static, str>),
    #[error("Invalid argument: {0}")]
    InvalidArgument(Cow<'static, str>),
    #[error("Invalid parameter: {0} {1}")]
    InvalidParameter(Cow<'static, str>, Cow<'static, str>),
    #[error("Not found: {0}")]
    NotFound(Cow<'static, str>),
    #[error("Unsupported: {0}")]
    Unsupported(Cow<'static, str>),
    #[error("Device busy: {0}")]
    DeviceBusy(Cow<'static, str>),
    #[error("Device closed: {0}")]
    DeviceClosed(Cow<'static, str>),
    #[error("Device request timeout: {0}")]
    DeviceRequestTimeout(Cow<'static, str>),
    #[error("Stream buffer lost: {0}")]
    StreamBufferLost(Cow<'static, str>),
    #[error("Invalid session config: {0}")]
    InvalidSessionConfig(Cow<'static, str>),
    #[error("Capture limit exceeded: {0}")]
    CaptureLimitExceeded(Cow<'static, str>),
    #[error("Invalid state: {0}")]
    InvalidState(Cow<'static, str>),
    #[error("Device preempted: {0}")]
    DevicePreempted(Cow<'static, str>),
    #[error("Operation not allowed: {0}")]
    OperationNotAllowed(Cow<'static, str>),
    #[error("Device error: {0}")]
    DeviceError(Cow<'static, str>),
    #[error("No permission: {0}")]
    NoPermission(Cow<'static, str>),
    #[error("Device conflict: {0}")]
    DeviceConflict(Cow<'static, str>),
    #[error("Unknown error: {0}")]
    Unknown(Cow<'static, str>),
}

impl Error {
    pub fn code(&self) -> ServiceErrorCode {
        match self {
            Error::AllocationFailed(_) => ServiceErrorCode::AllocError,
            Error::InvalidArgument(_) | Error::InvalidParameter(..) | Error::NotFound(_) => ServiceErrorCode::InvalidArg,
            Error::Unsupported(_) => ServiceErrorCode::Unsupported,
            Error::DeviceBusy(_) => ServiceErrorCode::DeviceBusy,
            Error::DeviceClosed(_) => ServiceErrorCode::DeviceClosed,
            Error::DeviceRequestTimeout(_) => ServiceErrorCode::DeviceRequestTimeout,
            Error::StreamBufferLost(_) => ServiceErrorCode::StreamBufferLost,
            Error::InvalidSessionConfig(_) => ServiceErrorCode::InvalidSessionCfg,
            Error::CaptureLimitExceeded(_) => ServiceErrorCode::CaptureLimitExceed,
            Error::InvalidState(_) => ServiceErrorCode::InvalidState,
            Error::DevicePreempted(_) => ServiceErrorCode::DevicePreempted,
            Error::OperationNotAllowed(_) => ServiceErrorCode::OperationNotAllowed,
            Error::DeviceError(_) => ServiceErrorCode::DeviceError,
            Error::NoPermission(_) => ServiceErrorCode::NoPermission,
            Error::DeviceConflict(_) => ServiceErrorCode::DeviceConflict,
            Error::Unknown(_) => ServiceErrorCode::UnknownError,
        }
    }

    pub fn status(&self) -> i32 {
        self.code().into()
    }
}

/// Integer status of an operation result, `CAMERA_OK` on success.
pub fn status_of<T>(result: &crate::Result<T>) -> i32 {
    match result {
        Ok(_) => ServiceErrorCode::Ok.into(),
        Err(err) => err.status(),
    }
}

#[macro_export]
macro_rules! invalid_state_error {
    ($param:literal) => {
        $crate::error::Error::InvalidState($param.into())
    };
    ($param:expr) => {
        $crate::error::Error::InvalidState(format!("{}", $param).into())
    };
}

#[macro_export]
macro_rules! invalid_arg_error {
    ($param:literal) => {
        $crate::error::Error::InvalidArgument($param.into())
    };
    ($param:expr) => {
        $crate::error::Error::InvalidArgument(format!("{:?}", $param).into())
    };
}

#[macro_export]
macro_rules! invalid_param_error {
    ($param:expr) => {
        $crate::error::Error::InvalidParameter(stringify!($param).into(), format!("{:?}", $param).into())
    };
}

#[macro_export]
macro_rules! session_config_error {
    ($param:literal) => {
        $crate::error::Error::InvalidSessionConfig($param.into())
    };
    ($param:expr) => {
        $crate::error::Error::InvalidSessionConfig(format!("{:?}", $param).into())
    };
}

#[macro_export]
macro_rules! not_allowed_error {
    ($param:literal) => {
        $crate::error::Error::OperationNotAllowed($param.into())
    };
    ($param:expr) => {
        $crate::error::Error::OperationNotAllowed(format!("{:?}", $param).into())
    };
}

#[macro_export]
macro_rules! not_found_error {
    ($param:literal) => {
        $crate::error::Error::NotFound($param.into())
    };
    ($param:expr) => {
        $crate::error::Error::NotFound(format!("{:?}", $param).into())
    };
}

#[macro_export]
macro_rules! unknown_error {
    ($param:literal) => {
        $crate::error::Error::Unknown($param.into())
    };
    ($param:expr) => {
        $crate::error::Error::Unknown(format!("{:?}", $param).into())
    };
}
