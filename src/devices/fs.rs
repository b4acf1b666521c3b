//! virtio-fs directory sharing.
//!
//! The guest mounts a share by its tag:
//!
//! ```text
//! mount -t virtiofs <mountTag> /mnt/point
//! ```

use std::path::PathBuf;

use serde::Serialize;

use super::{CmdLine, DeviceKind, DeviceOption, VirtioDevice};
use crate::error::{DeviceError, Result};

/// A host directory shared with the guest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VirtioFs {
    pub shared_dir: PathBuf,
    pub mount_tag: Option<String>,
}

impl VirtioFs {
    pub fn new(shared_dir: impl Into<PathBuf>, mount_tag: Option<String>) -> Self {
        Self {
            shared_dir: shared_dir.into(),
            mount_tag: mount_tag.filter(|tag| !tag.is_empty()),
        }
    }
}

impl VirtioDevice for VirtioFs {
    fn kind(&self) -> DeviceKind {
        DeviceKind::VirtioFs
    }

    fn apply_options(&mut self, options: &[DeviceOption]) -> Result<()> {
        for option in options {
            match option.key.as_str() {
                "sharedDir" => self.shared_dir = PathBuf::from(&option.value),
                "mountTag" => {
                    self.mount_tag = Some(option.value.clone()).filter(|tag| !tag.is_empty());
                }
                key => return Err(DeviceError::unknown_option(self.kind(), key)),
            }
        }
        Ok(())
    }

    fn encode(&self) -> Result<Vec<String>> {
        if self.shared_dir.as_os_str().is_empty() {
            return Err(DeviceError::IncompleteDevice {
                device: self.kind(),
                missing: "sharedDir",
            });
        }
        let cmdline = CmdLine::new(self.kind()).path_opt("sharedDir", &self.shared_dir)?;
        let cmdline = match &self.mount_tag {
            Some(tag) => cmdline.opt("mountTag", tag)?,
            None => cmdline,
        };
        Ok(cmdline.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::parse_options;

    #[test]
    fn encodes_shared_dir_then_tag() {
        let share = VirtioFs::new("/Users/drew/lobster-drop", Some("lobster-drop".into()));
        assert_eq!(
            share.encode().unwrap(),
            [
                "--device",
                "virtio-fs,sharedDir=/Users/drew/lobster-drop,mountTag=lobster-drop",
            ]
        );
    }

    #[test]
    fn tag_is_optional() {
        let share = VirtioFs::new("/srv/share", None);
        assert_eq!(share.encode().unwrap()[1], "virtio-fs,sharedDir=/srv/share");
    }

    #[test]
    fn decode_accepts_keys_in_any_order() {
        let mut share = VirtioFs::default();
        share
            .decode(&parse_options("mountTag=data,sharedDir=/srv/data"))
            .unwrap();
        assert_eq!(share, VirtioFs::new("/srv/data", Some("data".into())));
    }

    #[test]
    fn missing_shared_dir_is_incomplete() {
        let mut share = VirtioFs::default();
        share.decode(&parse_options("mountTag=data")).unwrap();
        assert_eq!(
            share.encode(),
            Err(DeviceError::IncompleteDevice {
                device: DeviceKind::VirtioFs,
                missing: "sharedDir",
            })
        );
    }

    #[test]
    fn comma_in_shared_dir_fails_encode() {
        let share = VirtioFs::new("/srv,mountTag=evil", None);
        assert_eq!(
            share.encode(),
            Err(DeviceError::InvalidValue {
                device: DeviceKind::VirtioFs,
                key: "sharedDir".into(),
                value: "/srv,mountTag=evil".into(),
            })
        );
    }

    #[test]
    fn comma_in_mount_tag_fails_encode() {
        let share = VirtioFs::new("/srv", Some("data,sharedDir=/etc".into()));
        assert!(matches!(
            share.encode(),
            Err(DeviceError::InvalidValue { ref key, .. }) if key == "mountTag"
        ));
    }

    #[test]
    fn rejects_unknown_key() {
        let mut share = VirtioFs::default();
        assert!(matches!(
            share.decode(&parse_options("sharedDir=/a,readonly")),
            Err(DeviceError::UnknownOption { .. })
        ));
    }
}
