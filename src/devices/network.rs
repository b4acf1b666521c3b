//! virtio-net: NAT networking or a caller-supplied datagram socket.
//!
//! A network device is in exactly one of two modes. NAT lets the hypervisor
//! route guest traffic itself; socket handoff forwards every frame through a
//! connected `SOCK_DGRAM` socket the caller already opened. The socket is only
//! ever referenced by descriptor number: this crate never opens, duplicates or
//! closes it, and the caller must keep it open until the hypervisor has
//! inherited it.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

use super::{CmdLine, DeviceKind, DeviceOption, VirtioDevice};
use crate::error::{DeviceError, Result};

// ---------------------------------------------------------------------------
// MAC address
// ---------------------------------------------------------------------------

/// A 48-bit Ethernet MAC address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid MAC address: {0}")]
pub struct ParseMacError(String);

impl MacAddress {
    pub fn octets(self) -> [u8; 6] {
        self.0
    }
}

fn parse_hex_octet(pair: &str) -> Option<u8> {
    if pair.len() != 2 || !pair.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(pair, 16).ok()
}

impl FromStr for MacAddress {
    type Err = ParseMacError;

    /// Accepts `aa:bb:cc:dd:ee:ff`, `aa-bb-cc-dd-ee-ff` and `aabb.ccdd.eeff`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let err = || ParseMacError(s.to_string());
        if !s.is_ascii() {
            return Err(err());
        }

        let pairs: Vec<&str> = match s.len() {
            17 => {
                let sep = s.as_bytes()[2];
                if sep != b':' && sep != b'-' {
                    return Err(err());
                }
                s.split(sep as char).collect()
            }
            14 => {
                let groups: Vec<&str> = s.split('.').collect();
                if groups.len() != 3 || groups.iter().any(|g| g.len() != 4) {
                    return Err(err());
                }
                groups.iter().flat_map(|g| [&g[..2], &g[2..]]).collect()
            }
            _ => return Err(err()),
        };
        if pairs.len() != 6 {
            return Err(err());
        }

        let mut octets = [0u8; 6];
        for (octet, pair) in octets.iter_mut().zip(&pairs) {
            *octet = parse_hex_octet(pair).ok_or_else(err)?;
        }
        Ok(MacAddress(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({self})")
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Socket handle
// ---------------------------------------------------------------------------

/// Descriptor number of a pre-connected datagram socket owned by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SocketHandle(i32);

impl SocketHandle {
    /// Wrap a raw descriptor number. Negative numbers are not descriptors.
    pub fn from_raw(fd: i32) -> Option<Self> {
        (fd >= 0).then_some(SocketHandle(fd))
    }

    /// Record the descriptor of an open socket without taking ownership.
    #[cfg(unix)]
    pub fn borrowed(socket: &impl std::os::fd::AsRawFd) -> Self {
        SocketHandle(socket.as_raw_fd())
    }

    pub fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// virtio-net
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkMode {
    Nat,
    Socket(SocketHandle),
}

/// A virtio network device.
///
/// An empty device has no mode and fails to encode until either NAT or a
/// socket is chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VirtioNet {
    pub mode: Option<NetworkMode>,
    pub mac_address: Option<MacAddress>,
}

impl VirtioNet {
    /// A NAT network device, optionally with a fixed MAC address.
    pub fn new(mac_address: Option<MacAddress>) -> Self {
        Self {
            mode: Some(NetworkMode::Nat),
            mac_address,
        }
    }

    /// Route traffic through `socket` instead of NAT.
    ///
    /// `socket` must be a connected datagram socket that stays open for as
    /// long as the encoded command line may be used.
    pub fn set_socket(&mut self, socket: SocketHandle) {
        self.mode = Some(NetworkMode::Socket(socket));
    }

    pub fn use_nat(&mut self) {
        self.mode = Some(NetworkMode::Nat);
    }

    pub fn socket(&self) -> Option<SocketHandle> {
        match self.mode {
            Some(NetworkMode::Socket(handle)) => Some(handle),
            _ => None,
        }
    }

    pub fn is_nat(&self) -> bool {
        self.mode == Some(NetworkMode::Nat)
    }
}

impl VirtioDevice for VirtioNet {
    fn kind(&self) -> DeviceKind {
        DeviceKind::VirtioNet
    }

    fn apply_options(&mut self, options: &[DeviceOption]) -> Result<()> {
        let kind = self.kind();
        let conflict = || DeviceError::ConflictingOption {
            device: kind,
            fields: vec!["nat", "fd"],
        };
        let invalid = |option: &DeviceOption| {
            DeviceError::invalid_value(kind, &option.key, &option.value)
        };

        // A mode already on the device counts as seen.
        let mut seen_nat = self.is_nat();
        let mut seen_fd = self.socket().is_some();
        for option in options {
            match option.key.as_str() {
                "nat" => {
                    if !option.is_flag() {
                        return Err(invalid(option));
                    }
                    if seen_fd {
                        return Err(conflict());
                    }
                    seen_nat = true;
                    self.use_nat();
                }
                "fd" => {
                    let handle = option
                        .value
                        .parse::<i32>()
                        .ok()
                        .and_then(SocketHandle::from_raw)
                        .ok_or_else(|| invalid(option))?;
                    if seen_nat {
                        return Err(conflict());
                    }
                    seen_fd = true;
                    self.set_socket(handle);
                }
                "mac" => {
                    let mac = option
                        .value
                        .parse::<MacAddress>()
                        .map_err(|_| invalid(option))?;
                    self.mac_address = Some(mac);
                }
                key => return Err(DeviceError::unknown_option(kind, key)),
            }
        }
        Ok(())
    }

    fn encode(&self) -> Result<Vec<String>> {
        let cmdline = CmdLine::new(self.kind());
        let cmdline = match self.mode {
            Some(NetworkMode::Nat) => cmdline.flag("nat"),
            Some(NetworkMode::Socket(handle)) => cmdline.opt("fd", handle)?,
            None => {
                return Err(DeviceError::IncompleteDevice {
                    device: self.kind(),
                    missing: "nat or fd",
                });
            }
        };
        let cmdline = match self.mac_address {
            Some(mac) => cmdline.opt("mac", mac)?,
            None => cmdline,
        };
        Ok(cmdline.finish())
    }
}
