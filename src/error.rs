//! Error types for device spec decoding and encoding.

use thiserror::Error;

use crate::devices::DeviceKind;

/// Result type alias for device operations.
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Errors produced while dispatching, decoding or encoding a device.
///
/// Every variant is terminal for the device being processed. Nothing is
/// retried and nothing is partially applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The device spec contained no device-type tag.
    #[error("empty option list in device spec")]
    EmptySpec,

    /// The device-type tag is not one of the known devices.
    #[error("unknown device type: {0}")]
    UnknownDeviceType(String),

    /// The option key is not understood by this device.
    #[error("unknown option for {device} devices: {key}")]
    UnknownOption { device: DeviceKind, key: String },

    /// The option value could not be parsed for its key.
    #[error("invalid value for {device} option '{key}': {value:?}")]
    InvalidValue {
        device: DeviceKind,
        key: String,
        value: String,
    },

    /// A required field is unset at encode time.
    #[error("{device} device is missing '{missing}'")]
    IncompleteDevice {
        device: DeviceKind,
        missing: &'static str,
    },

    /// Mutually exclusive options were both given.
    #[error("{device} options {} cannot be set at the same time", .fields.join(" and "))]
    ConflictingOption {
        device: DeviceKind,
        fields: Vec<&'static str>,
    },
}

impl DeviceError {
    pub(crate) fn unknown_option(device: DeviceKind, key: &str) -> Self {
        Self::UnknownOption {
            device,
            key: key.to_string(),
        }
    }

    pub(crate) fn invalid_value(device: DeviceKind, key: &str, value: &str) -> Self {
        Self::InvalidValue {
            device,
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    /// The device kind this error is about, when there is one.
    pub fn device(&self) -> Option<DeviceKind> {
        match self {
            Self::EmptySpec | Self::UnknownDeviceType(_) => None,
            Self::UnknownOption { device, .. }
            | Self::InvalidValue { device, .. }
            | Self::IncompleteDevice { device, .. }
            | Self::ConflictingOption { device, .. } => Some(*device),
        }
    }

    /// Process exit code the CLI uses for this error.
    ///
    /// Malformed specs map to 2, specs that parse but describe an unusable
    /// device map to 3.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::EmptySpec
            | Self::UnknownDeviceType(_)
            | Self::UnknownOption { .. }
            | Self::InvalidValue { .. } => 2,
            Self::IncompleteDevice { .. } | Self::ConflictingOption { .. } => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_device_tag() {
        let err = DeviceError::unknown_option(DeviceKind::VirtioSerial, "logfile");
        assert_eq!(
            err.to_string(),
            "unknown option for virtio-serial devices: logfile"
        );

        let err = DeviceError::ConflictingOption {
            device: DeviceKind::VirtioNet,
            fields: vec!["nat", "fd"],
        };
        assert_eq!(
            err.to_string(),
            "virtio-net options nat and fd cannot be set at the same time"
        );
    }

    #[test]
    fn exit_codes_split_malformed_from_incomplete() {
        assert_eq!(DeviceError::EmptySpec.exit_code(), 2);
        assert_eq!(
            DeviceError::invalid_value(DeviceKind::VirtioVsock, "port", "x").exit_code(),
            2
        );
        let incomplete = DeviceError::IncompleteDevice {
            device: DeviceKind::VirtioBlk,
            missing: "path",
        };
        assert_eq!(incomplete.exit_code(), 3);
        assert_eq!(incomplete.device(), Some(DeviceKind::VirtioBlk));
        assert_eq!(DeviceError::EmptySpec.device(), None);
    }
}
