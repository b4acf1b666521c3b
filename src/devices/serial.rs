//! virtio-serial console that logs guest output to a host file.

use std::path::PathBuf;

use serde::Serialize;

use super::{CmdLine, DeviceKind, DeviceOption, VirtioDevice};
use crate::error::{DeviceError, Result};

/// Serial port whose output is written to `log_file`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VirtioSerial {
    pub log_file: PathBuf,
}

impl VirtioSerial {
    pub fn new(log_file: impl Into<PathBuf>) -> Self {
        Self {
            log_file: log_file.into(),
        }
    }
}

impl VirtioDevice for VirtioSerial {
    fn kind(&self) -> DeviceKind {
        DeviceKind::VirtioSerial
    }

    fn apply_options(&mut self, options: &[DeviceOption]) -> Result<()> {
        for option in options {
            match option.key.as_str() {
                "logFilePath" => self.log_file = PathBuf::from(&option.value),
                key => return Err(DeviceError::unknown_option(self.kind(), key)),
            }
        }
        Ok(())
    }

    fn encode(&self) -> Result<Vec<String>> {
        if self.log_file.as_os_str().is_empty() {
            return Err(DeviceError::IncompleteDevice {
                device: self.kind(),
                missing: "logFilePath",
            });
        }
        Ok(CmdLine::new(self.kind())
            .path_opt("logFilePath", &self.log_file)?
            .finish())
    }
}
