//! bisque-devices: virtual device descriptors for the vfkit VM launcher.
//!
//! Builds, validates, decodes and encodes the `--device <type>,<key>=<value>,...`
//! arguments understood by vfkit. The launcher itself is out of scope: this
//! crate only produces the argument vector.
//!
//! ```rust
//! use bisque_devices::{Device, VirtioDevice};
//!
//! let disk = Device::from_cmdline("virtio-blk,path=/vm/disk.img,deviceId=root").unwrap();
//! assert_eq!(
//!     disk.encode().unwrap(),
//!     ["--device", "virtio-blk,path=/vm/disk.img,deviceId=root"],
//! );
//! ```

pub mod config;
pub mod devices;
pub mod error;
pub mod logging;

pub use config::LauncherConfig;
pub use devices::{
    DEVICE_FLAG, Device, DeviceKind, DeviceOption, MacAddress, NetworkMode, SocketHandle,
    StorageConfig, UsbMassStorage, VirtioBlk, VirtioDevice, VirtioFs, VirtioNet, VirtioRng,
    VirtioSerial, VirtioVsock, VsockDirection, device_from_cmdline,
};
pub use error::{DeviceError, Result};
