//! Virtual hardware device descriptors for the vfkit launcher.
//!
//! Each device kind is its own value type implementing [`VirtioDevice`]; the
//! closed [`Device`] enum ties them together. Devices are built either through
//! typed constructors or by dispatching a raw spec string such as
//! `virtio-blk,path=/disk.img,deviceId=root`:
//!
//! ```text
//! "virtio-vsock,port=1024,socketURL=/tmp/s.sock"
//!     └─► split_device_spec ─► ("virtio-vsock", [port=1024, socketURL=/tmp/s.sock])
//!             └─► REGISTRY lookup ─► VirtioVsock::default()
//!                     └─► decode(options) ─► encode()
//!                             └─► ["--device", "virtio-vsock,port=1024,socketURL=/tmp/s.sock,listen"]
//! ```
//!
//! Encoded keys follow a fixed per-device order, which other tooling parses.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{DeviceError, Result};

pub mod fs;
pub mod network;
pub mod options;
pub mod rng;
pub mod serial;
pub mod storage;
pub mod vsock;

pub use fs::VirtioFs;
pub use network::{MacAddress, NetworkMode, SocketHandle, VirtioNet};
pub use options::{DeviceOption, parse_options, split_device_spec};
pub use rng::VirtioRng;
pub use serial::VirtioSerial;
pub use storage::{StorageConfig, UsbMassStorage, VirtioBlk};
pub use vsock::{VirtioVsock, VsockDirection};

/// The flag token that precedes every encoded device spec.
pub const DEVICE_FLAG: &str = "--device";

// ---------------------------------------------------------------------------
// Device kinds
// ---------------------------------------------------------------------------

/// Wire tag of a device kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceKind {
    VirtioBlk,
    VirtioFs,
    VirtioNet,
    VirtioRng,
    VirtioSerial,
    VirtioVsock,
    UsbMassStorage,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 7] = [
        DeviceKind::VirtioBlk,
        DeviceKind::VirtioFs,
        DeviceKind::VirtioNet,
        DeviceKind::VirtioRng,
        DeviceKind::VirtioSerial,
        DeviceKind::VirtioVsock,
        DeviceKind::UsbMassStorage,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            DeviceKind::VirtioBlk => "virtio-blk",
            DeviceKind::VirtioFs => "virtio-fs",
            DeviceKind::VirtioNet => "virtio-net",
            DeviceKind::VirtioRng => "virtio-rng",
            DeviceKind::VirtioSerial => "virtio-serial",
            DeviceKind::VirtioVsock => "virtio-vsock",
            DeviceKind::UsbMassStorage => "usb-mass-storage",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ---------------------------------------------------------------------------
// Device contract
// ---------------------------------------------------------------------------

/// Operations shared by every device kind.
pub trait VirtioDevice: Clone {
    fn kind(&self) -> DeviceKind;

    /// Apply `options` in order, mutating `self` as each one is read.
    ///
    /// Callers should go through [`VirtioDevice::decode`], which runs this on
    /// a scratch copy.
    fn apply_options(&mut self, options: &[DeviceOption]) -> Result<()>;

    /// Validate the device and produce its `["--device", "<type>,..."]` pair.
    fn encode(&self) -> Result<Vec<String>>;

    /// Decode `options` into this device. On error `self` is left unchanged.
    fn decode(&mut self, options: &[DeviceOption]) -> Result<()> {
        let mut next = self.clone();
        next.apply_options(options)?;
        *self = next;
        Ok(())
    }
}

/// Builds the comma-joined value token of an encoded device.
///
/// Values may not contain `,`: the tokenizer would read the rest as extra
/// options. A `=` inside a value is fine since only the first one splits.
#[derive(Debug)]
pub(crate) struct CmdLine {
    kind: DeviceKind,
    spec: String,
}

impl CmdLine {
    pub(crate) fn new(kind: DeviceKind) -> Self {
        Self {
            kind,
            spec: kind.tag().to_string(),
        }
    }

    pub(crate) fn opt(mut self, key: &str, value: impl fmt::Display) -> Result<Self> {
        let value = value.to_string();
        if value.contains(',') {
            return Err(DeviceError::invalid_value(self.kind, key, &value));
        }
        self.spec.push(',');
        self.spec.push_str(key);
        self.spec.push('=');
        self.spec.push_str(&value);
        Ok(self)
    }

    /// Like [`CmdLine::opt`], but refuses paths that are not valid UTF-8.
    pub(crate) fn path_opt(self, key: &str, path: &Path) -> Result<Self> {
        match path.to_str() {
            Some(value) => self.opt(key, value),
            None => Err(DeviceError::invalid_value(
                self.kind,
                key,
                &path.to_string_lossy(),
            )),
        }
    }

    pub(crate) fn flag(mut self, key: &str) -> Self {
        self.spec.push(',');
        self.spec.push_str(key);
        self
    }

    pub(crate) fn finish(self) -> Vec<String> {
        vec![DEVICE_FLAG.to_string(), self.spec]
    }
}

// ---------------------------------------------------------------------------
// Device sum type
// ---------------------------------------------------------------------------

/// Any one of the supported virtual devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Device {
    VirtioBlk(VirtioBlk),
    VirtioFs(VirtioFs),
    VirtioNet(VirtioNet),
    VirtioRng(VirtioRng),
    VirtioSerial(VirtioSerial),
    VirtioVsock(VirtioVsock),
    UsbMassStorage(UsbMassStorage),
}

/// Tag to empty-device table used by the dispatcher.
static REGISTRY: [(DeviceKind, fn() -> Device); 7] = [
    (DeviceKind::VirtioBlk, || Device::VirtioBlk(VirtioBlk::empty())),
    (DeviceKind::VirtioFs, || Device::VirtioFs(VirtioFs::default())),
    (DeviceKind::VirtioNet, || Device::VirtioNet(VirtioNet::default())),
    (DeviceKind::VirtioRng, || Device::VirtioRng(VirtioRng::default())),
    (DeviceKind::VirtioSerial, || {
        Device::VirtioSerial(VirtioSerial::default())
    }),
    (DeviceKind::VirtioVsock, || {
        Device::VirtioVsock(VirtioVsock::default())
    }),
    (DeviceKind::UsbMassStorage, || {
        Device::UsbMassStorage(UsbMassStorage::empty())
    }),
];

impl Device {
    /// The zero-value device for `tag`, ready to be decoded into.
    pub fn empty(tag: &str) -> Result<Self> {
        REGISTRY
            .iter()
            .find(|(kind, _)| kind.tag() == tag)
            .map(|(_, ctor)| ctor())
            .ok_or_else(|| DeviceError::UnknownDeviceType(tag.to_string()))
    }

    /// Parse a full device spec such as `virtio-net,nat,mac=...`.
    pub fn from_cmdline(spec: &str) -> Result<Self> {
        let (tag, options) = split_device_spec(spec)?;
        let mut device = Self::empty(tag)?;
        if let Err(e) = device.decode(&options) {
            warn!(device = tag, error = %e, "failed to decode device spec");
            return Err(e);
        }
        debug!(device = tag, options = options.len(), "decoded device spec");
        Ok(device)
    }

    /// Encode several devices into one argument vector, stopping at the first
    /// invalid device.
    pub fn encode_all(devices: &[Device]) -> Result<Vec<String>> {
        let mut args = Vec::with_capacity(devices.len() * 2);
        for device in devices {
            args.extend(device.encode()?);
        }
        Ok(args)
    }
}

macro_rules! for_each_device {
    ($device:expr, $inner:ident => $body:expr) => {
        match $device {
            Device::VirtioBlk($inner) => $body,
            Device::VirtioFs($inner) => $body,
            Device::VirtioNet($inner) => $body,
            Device::VirtioRng($inner) => $body,
            Device::VirtioSerial($inner) => $body,
            Device::VirtioVsock($inner) => $body,
            Device::UsbMassStorage($inner) => $body,
        }
    };
}

impl VirtioDevice for Device {
    fn kind(&self) -> DeviceKind {
        for_each_device!(self, dev => dev.kind())
    }

    fn apply_options(&mut self, options: &[DeviceOption]) -> Result<()> {
        for_each_device!(self, dev => dev.apply_options(options))
    }

    fn encode(&self) -> Result<Vec<String>> {
        let result = for_each_device!(self, dev => dev.encode());
        match &result {
            Ok(args) => debug!(device = %self.kind(), args = ?args, "encoded device"),
            Err(e) => warn!(device = %self.kind(), error = %e, "failed to encode device"),
        }
        result
    }

    fn decode(&mut self, options: &[DeviceOption]) -> Result<()> {
        for_each_device!(self, dev => dev.decode(options))
    }
}

impl FromStr for Device {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_cmdline(s)
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Device {
                fn from(dev: $variant) -> Self {
                    Device::$variant(dev)
                }
            }
        )*
    };
}

impl_from_variant!(
    VirtioBlk,
    VirtioFs,
    VirtioNet,
    VirtioRng,
    VirtioSerial,
    VirtioVsock,
    UsbMassStorage,
);

/// Parse one raw device spec. Shorthand for [`Device::from_cmdline`].
pub fn device_from_cmdline(spec: &str) -> Result<Device> {
    Device::from_cmdline(spec)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
