//! Readiness notification to the process supervisor.
//!
//! Sends `READY=1` over the datagram socket named by `NOTIFY_SOCKET`, the
//! sd_notify protocol. Without a supervisor channel this is a no-op.

use std::ffi::OsStr;
use std::io;

pub const NOTIFY_SOCKET: &str = "NOTIFY_SOCKET";
pub const READY: &str = "READY=1";

/// Result of a readiness notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Sent,
    NoChannel,
    Failed,
}

/// Notify the supervisor named by the environment, if any.
pub fn notify_ready() -> Readiness {
    let channel = std::env::var_os(NOTIFY_SOCKET);
    notify_ready_to(channel.as_deref())
}

/// Notify the supervisor listening on `channel`.
///
/// A send failure is logged and otherwise ignored.
pub fn notify_ready_to(channel: Option<&OsStr>) -> Readiness {
    let Some(channel) = channel.filter(|c| !c.is_empty()) else {
        tracing::debug!("No supervisor channel, skipping readiness notification");
        return Readiness::NoChannel;
    };

    match send(channel) {
        Ok(()) => {
            tracing::info!(channel = %channel.to_string_lossy(), "Readiness sent");
            Readiness::Sent
        }
        Err(e) => {
            tracing::warn!(
                channel = %channel.to_string_lossy(),
                error = %e,
                "Failed to send readiness notification"
            );
            Readiness::Failed
        }
    }
}

#[cfg(unix)]
fn send(channel: &OsStr) -> io::Result<()> {
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::net::UnixDatagram;

    let socket = UnixDatagram::unbound()?;
    let bytes = channel.as_bytes();

    // '@' names a Linux abstract socket.
    if let Some(name) = bytes.strip_prefix(b"@") {
        #[cfg(target_os = "linux")]
        {
            use std::os::linux::net::SocketAddrExt;
            let address = std::os::unix::net::SocketAddr::from_abstract_name(name)?;
            socket.send_to_addr(READY.as_bytes(), &address)?;
            return Ok(());
        }
        #[cfg(not(target_os = "linux"))]
        {
            let _ = name;
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "abstract sockets are Linux-only",
            ));
        }
    }

    socket.send_to(READY.as_bytes(), channel)?;
    Ok(())
}

#[cfg(not(unix))]
fn send(_channel: &OsStr) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "readiness notification needs unix datagram sockets",
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::net::UnixDatagram;

    #[test]
    fn missing_channel_is_a_no_op() {
        assert_eq!(notify_ready_to(None), Readiness::NoChannel);
        assert_eq!(notify_ready_to(Some(OsStr::new(""))), Readiness::NoChannel);
    }

    #[test]
    fn sends_ready_once() {
        let path = std::env::temp_dir().join(format!("notify-{}.sock", uuid::Uuid::new_v4()));
        let supervisor = UnixDatagram::bind(&path).unwrap();

        assert_eq!(notify_ready_to(Some(path.as_os_str())), Readiness::Sent);

        let mut buf = [0u8; 64];
        let n = supervisor.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], READY.as_bytes());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unreachable_channel_only_warns() {
        let path = std::env::temp_dir().join(format!("absent-{}.sock", uuid::Uuid::new_v4()));
        assert_eq!(notify_ready_to(Some(path.as_os_str())), Readiness::Failed);
    }
}
