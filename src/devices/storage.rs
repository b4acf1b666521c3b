//! Disk-backed devices: virtio-blk and USB mass storage.
//!
//! Both wrap a [`StorageConfig`] and delegate the shared `path` and `readonly`
//! options to it. The storage config remembers which device owns it so its
//! error messages and encoded tag name the right device.

use std::path::PathBuf;

use serde::Serialize;

use super::{CmdLine, DeviceKind, DeviceOption, VirtioDevice};
use crate::error::{DeviceError, Result};

/// Disk image settings shared by the storage devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageConfig {
    /// Tag of the owning device, used when encoding.
    #[serde(skip)]
    pub device: DeviceKind,
    /// Raw (or ISO, for USB) disk image on the host.
    pub image_path: PathBuf,
    pub read_only: bool,
}

impl StorageConfig {
    fn empty(device: DeviceKind) -> Self {
        Self {
            device,
            image_path: PathBuf::new(),
            read_only: false,
        }
    }

    fn apply_option(&mut self, option: &DeviceOption) -> Result<()> {
        match option.key.as_str() {
            "path" => self.image_path = PathBuf::from(&option.value),
            "readonly" => {
                if !option.is_flag() {
                    return Err(DeviceError::invalid_value(
                        self.device,
                        &option.key,
                        &option.value,
                    ));
                }
                self.read_only = true;
            }
            key => return Err(DeviceError::unknown_option(self.device, key)),
        }
        Ok(())
    }

    fn to_cmdline(&self) -> Result<CmdLine> {
        if self.image_path.as_os_str().is_empty() {
            return Err(DeviceError::IncompleteDevice {
                device: self.device,
                missing: "path",
            });
        }
        let cmdline = CmdLine::new(self.device).path_opt("path", &self.image_path)?;
        Ok(if self.read_only {
            cmdline.flag("readonly")
        } else {
            cmdline
        })
    }
}

// ---------------------------------------------------------------------------
// virtio-blk
// ---------------------------------------------------------------------------

/// A virtio block device backed by a raw disk image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtioBlk {
    #[serde(flatten)]
    pub storage: StorageConfig,
    /// Guest-visible serial string, distinct from the storage device tag.
    pub device_identifier: Option<String>,
}

impl VirtioBlk {
    pub(crate) fn empty() -> Self {
        Self {
            storage: StorageConfig::empty(DeviceKind::VirtioBlk),
            device_identifier: None,
        }
    }

    /// A disk using the raw image at `image_path`.
    pub fn new(image_path: impl Into<PathBuf>) -> Self {
        let mut blk = Self::empty();
        blk.storage.image_path = image_path.into();
        blk
    }

    pub fn set_device_identifier(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.device_identifier = (!id.is_empty()).then_some(id);
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.storage.read_only = read_only;
    }
}

impl VirtioDevice for VirtioBlk {
    fn kind(&self) -> DeviceKind {
        DeviceKind::VirtioBlk
    }

    fn apply_options(&mut self, options: &[DeviceOption]) -> Result<()> {
        for option in options {
            match option.key.as_str() {
                "deviceId" => self.set_device_identifier(option.value.as_str()),
                _ => self.storage.apply_option(option)?,
            }
        }
        Ok(())
    }

    fn encode(&self) -> Result<Vec<String>> {
        let mut cmdline = self.storage.to_cmdline()?;
        if let Some(id) = &self.device_identifier {
            cmdline = cmdline.opt("deviceId", id)?;
        }
        Ok(cmdline.finish())
    }
}

// ---------------------------------------------------------------------------
// usb-mass-storage
// ---------------------------------------------------------------------------

/// A USB disk backed by a raw or ISO image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsbMassStorage {
    #[serde(flatten)]
    pub storage: StorageConfig,
}

impl UsbMassStorage {
    pub(crate) fn empty() -> Self {
        Self {
            storage: StorageConfig::empty(DeviceKind::UsbMassStorage),
        }
    }

    pub fn new(image_path: impl Into<PathBuf>) -> Self {
        let mut usb = Self::empty();
        usb.storage.image_path = image_path.into();
        usb
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.storage.read_only = read_only;
    }
}

impl VirtioDevice for UsbMassStorage {
    fn kind(&self) -> DeviceKind {
        DeviceKind::UsbMassStorage
    }

    fn apply_options(&mut self, options: &[DeviceOption]) -> Result<()> {
        options
            .iter()
            .try_for_each(|option| self.storage.apply_option(option))
    }

    fn encode(&self) -> Result<Vec<String>> {
        Ok(self.storage.to_cmdline()?.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::parse_options;

    #[test]
    fn blk_encodes_path_then_device_id() {
        let mut blk = VirtioBlk::new("/img.raw");
        blk.set_device_identifier("disk0");
        assert_eq!(
            blk.encode().unwrap(),
            ["--device", "virtio-blk,path=/img.raw,deviceId=disk0"]
        );
    }

    #[test]
    fn blk_without_path_is_incomplete() {
        assert_eq!(
            VirtioBlk::empty().encode(),
            Err(DeviceError::IncompleteDevice {
                device: DeviceKind::VirtioBlk,
                missing: "path",
            })
        );
    }

    #[test]
    fn blk_decodes_device_id_in_any_position() {
        let mut blk = VirtioBlk::empty();
        blk.decode(&parse_options("deviceId=root,path=/disk.img")).unwrap();
        assert_eq!(blk, {
            let mut expected = VirtioBlk::new("/disk.img");
            expected.set_device_identifier("root");
            expected
        });
    }

    #[test]
    fn readonly_is_encoded_after_path() {
        let mut blk = VirtioBlk::new("/img.raw");
        blk.set_read_only(true);
        blk.set_device_identifier("ro");
        assert_eq!(
            blk.encode().unwrap()[1],
            "virtio-blk,path=/img.raw,readonly,deviceId=ro"
        );
    }

    #[test]
    fn readonly_takes_no_value() {
        let mut usb = UsbMassStorage::empty();
        let err = usb
            .decode(&parse_options("path=/a.iso,readonly=yes"))
            .unwrap_err();
        assert_eq!(
            err,
            DeviceError::InvalidValue {
                device: DeviceKind::UsbMassStorage,
                key: "readonly".into(),
                value: "yes".into(),
            }
        );
    }

    #[test]
    fn usb_rejects_device_id() {
        let mut usb = UsbMassStorage::empty();
        assert_eq!(
            usb.decode(&parse_options("path=/a.iso,deviceId=x")),
            Err(DeviceError::UnknownOption {
                device: DeviceKind::UsbMassStorage,
                key: "deviceId".into(),
            })
        );
        assert_eq!(usb, UsbMassStorage::empty(), "failed decode must not apply");
    }

    #[test]
    fn usb_encodes_path_only() {
        assert_eq!(
            UsbMassStorage::new("/boot.iso").encode().unwrap(),
            ["--device", "usb-mass-storage,path=/boot.iso"]
        );
    }

    #[test]
    fn comma_in_path_fails_encode() {
        let usb = UsbMassStorage::new("/images/a,readonly");
        assert_eq!(
            usb.encode(),
            Err(DeviceError::InvalidValue {
                device: DeviceKind::UsbMassStorage,
                key: "path".into(),
                value: "/images/a,readonly".into(),
            })
        );
    }

    #[test]
    fn comma_in_device_id_fails_encode() {
        let mut blk = VirtioBlk::new("/img.raw");
        blk.set_device_identifier("disk0,readonly");
        assert_eq!(
            blk.encode(),
            Err(DeviceError::InvalidValue {
                device: DeviceKind::VirtioBlk,
                key: "deviceId".into(),
                value: "disk0,readonly".into(),
            })
        );
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_path_fails_encode() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let blk = VirtioBlk::new(OsStr::from_bytes(b"/img\xff.raw"));
        assert!(matches!(
            blk.encode(),
            Err(DeviceError::InvalidValue { device: DeviceKind::VirtioBlk, ref key, .. }) if key == "path"
        ));
    }

    #[test]
    fn later_path_overwrites_earlier() {
        let mut blk = VirtioBlk::empty();
        blk.decode(&parse_options("path=/first,path=/second")).unwrap();
        assert_eq!(blk.storage.image_path, PathBuf::from("/second"));
    }
}
