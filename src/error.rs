use std::fmt;

/// Convenience alias for the `ueventd` library `Result` type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the `ueventd` library.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    InvalidLen(usize),
    Uevent(String),
    Netlink(String),
    Rules(String),
    DeviceNode(String),
    Autoload(String),
    Firmware(String),
    Coldboot(String),
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(format!("{err}"))
    }
}

impl From<glob::PatternError> for Error {
    fn from(err: glob::PatternError) -> Self {
        Self::Rules(format!("invalid glob pattern: {err}"))
    }
}

impl From<std::ffi::NulError> for Error {
    fn from(err: std::ffi::NulError) -> Self {
        Self::Io(format!("invalid FFI C-String: {err}"))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLen(err) => write!(f, "ueventd invalid length: {err}"),
            Self::Uevent(err) => write!(f, "uevent parse: {err}"),
            Self::Netlink(err) => write!(f, "netlink: {err}"),
            Self::Rules(err) => write!(f, "rules: {err}"),
            Self::DeviceNode(err) => write!(f, "device node: {err}"),
            Self::Autoload(err) => write!(f, "module autoload: {err}"),
            Self::Firmware(err) => write!(f, "firmware: {err}"),
            Self::Coldboot(err) => write!(f, "coldboot: {err}"),
            Self::Io(err) => write!(f, "I/O: {err}"),
        }
    }
}

impl std::error::Error for Error {}
