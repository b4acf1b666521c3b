//! virtio-rng entropy source. Takes no options.

use serde::Serialize;

use super::{CmdLine, DeviceKind, DeviceOption, VirtioDevice};
use crate::error::{DeviceError, Result};

/// Feeds host entropy into the guest kernel RNG.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VirtioRng {}

impl VirtioRng {
    pub fn new() -> Self {
        Self {}
    }
}

impl VirtioDevice for VirtioRng {
    fn kind(&self) -> DeviceKind {
        DeviceKind::VirtioRng
    }

    fn apply_options(&mut self, options: &[DeviceOption]) -> Result<()> {
        match options.first() {
            Some(option) => Err(DeviceError::unknown_option(self.kind(), &option.key)),
            None => Ok(()),
        }
    }

    fn encode(&self) -> Result<Vec<String>> {
        Ok(CmdLine::new(self.kind()).finish())
    }
}
