use camera_core::{error::Error, Result};
use log::warn;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Status codes returned by the hardware layer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum HdiStatus {
    NoError = 0,
    CameraBusy = -1,
    InsufficientResources = -2,
    InvalidArgument = -3,
    MethodNotSupported = -4,
    CameraClosed = -5,
    DeviceError = -6,
    NoPermission = -7,
    DeviceConflict = -8,
}

impl HdiStatus {
    pub fn into_result(self) -> Result<()> {
        match self {
            HdiStatus::NoError => Ok(()),
            HdiStatus::CameraBusy => Err(Error::DeviceBusy("camera busy".into())),
            HdiStatus::InvalidArgument => Err(Error::InvalidArgument("hdi rejected argument".into())),
            HdiStatus::CameraClosed => Err(Error::DeviceClosed("camera closed".into())),
            status => Err(Error::Unknown(format!("hdi status {:?}", status).into())),
        }
    }
}

/// Translates a raw hardware status into the service taxonomy.
pub fn check_hdi_status(code: i32) -> Result<()> {
    match HdiStatus::try_from(code) {
        Ok(status) => status.into_result(),
        Err(_) => {
            warn!("unrecognized hdi status: {}", code);
            Err(Error::Unknown(format!("hdi status {}", code).into()))
        }
    }
}
