//! virtio-vsock: host/guest socket channel exposed as a unix socket on the host.

use serde::Serialize;

use super::{CmdLine, DeviceKind, DeviceOption, VirtioDevice};
use crate::error::{DeviceError, Result};

/// Which side accepts vsock connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VsockDirection {
    /// The host listens on the unix socket; the guest connects over vsock.
    #[default]
    ListenOnHost,
    /// The guest listens on the vsock port; the host connects through the socket.
    ConnectFromGuest,
}

impl VsockDirection {
    fn as_flag(self) -> &'static str {
        match self {
            VsockDirection::ListenOnHost => "listen",
            VsockDirection::ConnectFromGuest => "connect",
        }
    }
}

/// A virtio-vsock device. See `vsock(7)` for the port namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VirtioVsock {
    pub port: u32,
    /// Unix socket path on the host side of the channel.
    pub socket_url: String,
    pub direction: VsockDirection,
}

impl VirtioVsock {
    pub fn new(port: u32, socket_url: impl Into<String>, direction: VsockDirection) -> Self {
        Self {
            port,
            socket_url: socket_url.into(),
            direction,
        }
    }
}

impl VirtioDevice for VirtioVsock {
    fn kind(&self) -> DeviceKind {
        DeviceKind::VirtioVsock
    }

    fn apply_options(&mut self, options: &[DeviceOption]) -> Result<()> {
        let kind = self.kind();
        // Specs without listen/connect predate the flag and meant listen.
        self.direction = VsockDirection::ListenOnHost;
        for option in options {
            match option.key.as_str() {
                "socketURL" => self.socket_url = option.value.clone(),
                "port" => {
                    self.port = option.value.parse::<u32>().map_err(|_| {
                        DeviceError::invalid_value(kind, &option.key, &option.value)
                    })?;
                }
                key @ ("listen" | "connect") => {
                    if !option.is_flag() {
                        return Err(DeviceError::invalid_value(kind, key, &option.value));
                    }
                    self.direction = if key == "listen" {
                        VsockDirection::ListenOnHost
                    } else {
                        VsockDirection::ConnectFromGuest
                    };
                }
                key => return Err(DeviceError::unknown_option(kind, key)),
            }
        }
        Ok(())
    }

    fn encode(&self) -> Result<Vec<String>> {
        let missing = if self.port == 0 {
            Some("port")
        } else if self.socket_url.is_empty() {
            Some("socketURL")
        } else {
            None
        };
        if let Some(missing) = missing {
            return Err(DeviceError::IncompleteDevice {
                device: self.kind(),
                missing,
            });
        }

        Ok(CmdLine::new(self.kind())
            .opt("port", self.port)?
            .opt("socketURL", &self.socket_url)?
            .flag(self.direction.as_flag())
            .finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::parse_options;

    fn decoded(opts: &str) -> VirtioVsock {
        let mut vsock = VirtioVsock::default();
        vsock.decode(&parse_options(opts)).unwrap();
        vsock
    }

    #[test]
    fn defaults_to_listen() {
        let vsock = decoded("port=1024,socketURL=/tmp/s.sock");
        assert_eq!(vsock.direction, VsockDirection::ListenOnHost);
        assert_eq!(
            vsock.encode().unwrap(),
            ["--device", "virtio-vsock,port=1024,socketURL=/tmp/s.sock,listen"]
        );
    }

    #[test]
    fn last_direction_flag_wins() {
        assert_eq!(
            decoded("port=1,socketURL=/s,listen,connect").direction,
            VsockDirection::ConnectFromGuest
        );
        assert_eq!(
            decoded("connect,port=1,listen,socketURL=/s").direction,
            VsockDirection::ListenOnHost
        );
    }

    #[test]
    fn redecoding_resets_direction() {
        let mut vsock = VirtioVsock::new(2, "/s", VsockDirection::ConnectFromGuest);
        vsock.decode(&parse_options("port=3")).unwrap();
        assert_eq!(vsock.direction, VsockDirection::ListenOnHost);
        assert_eq!(vsock.socket_url, "/s");
    }

    #[test]
    fn port_must_parse() {
        for bad in ["port=-1", "port=abc", "port=", "port=4294967296"] {
            let mut vsock = VirtioVsock::default();
            assert!(
                matches!(
                    vsock.decode(&parse_options(bad)),
                    Err(DeviceError::InvalidValue { .. })
                ),
                "{bad}"
            );
        }
    }

    #[test]
    fn zero_port_decodes_but_fails_to_encode() {
        let vsock = decoded("port=0,socketURL=/s");
        assert_eq!(
            vsock.encode(),
            Err(DeviceError::IncompleteDevice {
                device: DeviceKind::VirtioVsock,
                missing: "port",
            })
        );
    }

    #[test]
    fn missing_socket_url_fails_to_encode() {
        assert_eq!(
            VirtioVsock::new(1024, "", VsockDirection::ListenOnHost).encode(),
            Err(DeviceError::IncompleteDevice {
                device: DeviceKind::VirtioVsock,
                missing: "socketURL",
            })
        );
    }

    #[test]
    fn connect_encodes_last() {
        let vsock = VirtioVsock::new(2222, "/tmp/guest.sock", VsockDirection::ConnectFromGuest);
        assert_eq!(
            vsock.encode().unwrap()[1],
            "virtio-vsock,port=2222,socketURL=/tmp/guest.sock,connect"
        );
    }

    #[test]
    fn comma_in_socket_url_fails_encode() {
        let vsock = VirtioVsock::new(1024, "/tmp/s.sock,connect", VsockDirection::ListenOnHost);
        assert_eq!(
            vsock.encode(),
            Err(DeviceError::InvalidValue {
                device: DeviceKind::VirtioVsock,
                key: "socketURL".into(),
                value: "/tmp/s.sock,connect".into(),
            })
        );
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut vsock = VirtioVsock::default();
        assert_eq!(
            vsock.decode(&parse_options("port=1,cid=3")),
            Err(DeviceError::UnknownOption {
                device: DeviceKind::VirtioVsock,
                key: "cid".into(),
            })
        );
    }
}
