use std::fmt;
use std::io;

use canrx_core::RegistryError;
use canrx_frame::FrameError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const NO_DEVICE: i32 = 20;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::InvalidFilter { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        FrameError::PayloadTooLarge { .. }
        | FrameError::InvalidLength(_)
        | FrameError::InvalidLogLine { .. }
        | FrameError::ConnectionClosed => CliError::new(DATA_INVALID, format!("{context}: {err}")),
    }
}

pub fn registry_error(context: &str, err: RegistryError) -> CliError {
    let code = match err {
        RegistryError::NoDevice(_) | RegistryError::DeviceType(_) => NO_DEVICE,
        RegistryError::Allocation { .. } | RegistryError::NotFound { .. } => FAILURE,
    };
    CliError::new(code, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use canrx_core::InterfaceId;

    use super::*;

    #[test]
    fn maps_frame_errors() {
        let err = "zz:7FF".parse::<canrx_frame::Filter>().unwrap_err();
        assert_eq!(frame_error("filter", err).code, USAGE);

        let err = FrameError::InvalidLength(12);
        assert_eq!(frame_error("read", err).code, DATA_INVALID);

        let err = FrameError::Io(io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(frame_error("open", err).code, USAGE);
    }

    #[test]
    fn maps_registry_errors() {
        let err = registry_error("register", RegistryError::DeviceType(InterfaceId(2)));
        assert_eq!(err.code, NO_DEVICE);
        assert!(err.message.starts_with("register: "));

        let err = registry_error("register", RegistryError::Allocation { limit: 1 });
        assert_eq!(err.code, FAILURE);
    }
}
