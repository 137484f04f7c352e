//! Opens the kernel uevent multicast socket and drains pending messages.

use std::{io, mem};

use crate::{uevent::UEVENT_MSG_LEN, Error, Result, Uevent};

/// Netlink multicast group the kernel broadcasts device uevents on.
///
/// This is the only group this crate ever subscribes to — `NETLINK_ROUTE`
/// and other netlink families are out of scope.
pub const UEVENT_NL_GROUP: u32 = 1;

/// Requested kernel socket receive buffer size.
///
/// Matches the original implementation's oversized buffer, sized to absorb
/// a coldboot burst without the kernel dropping multicast messages.
pub const NL_RCVBUF_SIZE: usize = 1024 * 1024;

/// A bound, non-blocking `NETLINK_KOBJECT_UEVENT` socket.
pub struct NetlinkReceiver {
    sock: i32,
}

impl NetlinkReceiver {
    /// Opens and binds the kernel uevent netlink socket.
    ///
    /// The socket is created non-blocking and close-on-exec, bound to pid 0
    /// (let the kernel assign one) and [`UEVENT_NL_GROUP`]. The receive
    /// buffer is requested at [`NL_RCVBUF_SIZE`] via the privileged
    /// `SO_RCVBUFFORCE`, falling back to the unprivileged `SO_RCVBUF` if the
    /// process lacks `CAP_NET_ADMIN`.
    pub fn open() -> Result<Self> {
        // SAFETY: all arguments are valid; the return value is checked below.
        let sock = unsafe {
            libc::socket(
                libc::PF_NETLINK,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC | libc::SOCK_NONBLOCK,
                libc::NETLINK_KOBJECT_UEVENT,
            )
        };

        if sock < 0 {
            let errno = io::Error::last_os_error();
            return Err(Error::Netlink(format!("socket() failed: {errno}")));
        }

        let receiver = Self { sock };
        receiver.set_receive_buffer_size(NL_RCVBUF_SIZE);

        // SAFETY: `sockaddr_nl` is a plain-old-data struct; zeroing it yields
        // a valid value with `nl_pid`/`nl_groups` set below.
        let mut nl: libc::sockaddr_nl = unsafe { mem::zeroed() };
        nl.nl_family = libc::AF_NETLINK as u16;
        nl.nl_pid = 0;
        nl.nl_groups = UEVENT_NL_GROUP;

        // SAFETY: `nl` is a valid, fully-initialized sockaddr_nl and its size
        // matches the third argument.
        let err = unsafe {
            libc::bind(
                sock,
                &nl as *const libc::sockaddr_nl as *const _,
                mem::size_of::<libc::sockaddr_nl>() as u32,
            )
        };

        if err < 0 {
            let errno = io::Error::last_os_error();
            // SAFETY: `sock` is a valid, owned fd about to be discarded.
            unsafe { libc::close(sock) };
            return Err(Error::Netlink(format!("bind() failed: {errno}")));
        }

        Ok(receiver)
    }

    /// Requests a larger kernel receive buffer, logging but not failing on
    /// error — a small buffer only increases the odds of a dropped uevent
    /// under heavy coldboot load, it never breaks correctness.
    fn set_receive_buffer_size(&self, size: usize) {
        let int_size = size as i32;
        // SAFETY: `int_size` lives on the stack for the duration of the call.
        let err = unsafe {
            libc::setsockopt(
                self.sock,
                libc::SOL_SOCKET,
                libc::SO_RCVBUFFORCE,
                &int_size as *const i32 as *const _,
                mem::size_of::<i32>() as u32,
            )
        };

        if err < 0 {
            log::debug!("SO_RCVBUFFORCE failed, falling back to SO_RCVBUF");
            // SAFETY: see above.
            let err = unsafe {
                libc::setsockopt(
                    self.sock,
                    libc::SOL_SOCKET,
                    libc::SO_RCVBUF,
                    &int_size as *const i32 as *const _,
                    mem::size_of::<i32>() as u32,
                )
            };

            if err < 0 {
                let errno = io::Error::last_os_error();
                log::warn!("SO_RCVBUF failed, keeping kernel default: {errno}");
            }
        }
    }

    /// Drains every uevent message currently queued on the socket, invoking
    /// `handler` for each one that parses successfully.
    ///
    /// Returns once a read would block (`EAGAIN`/`EWOULDBLOCK`) — the socket
    /// is non-blocking, so this never waits for a new message to arrive.
    /// Oversized messages are logged and skipped rather than aborting the
    /// drain; a single bad message must not stall the whole queue.
    pub fn drain(&self, mut handler: impl FnMut(&Uevent<'_>)) {
        let mut buf = [0u8; UEVENT_MSG_LEN];

        loop {
            // SAFETY: `buf` outlives the call and is sized as passed.
            let n = unsafe {
                libc::recv(
                    self.sock,
                    buf.as_mut_ptr() as *mut _,
                    buf.len(),
                    0,
                )
            };

            if n < 0 {
                let errno = io::Error::last_os_error();
                if errno.kind() != io::ErrorKind::WouldBlock {
                    log::debug!("recv() on uevent socket failed: {errno}");
                }
                return;
            }

            if n == 0 {
                return;
            }

            match Uevent::parse(&buf[..n as usize]) {
                Ok(event) => handler(&event),
                Err(err) => log::error!("discarding unparsable uevent: {err}"),
            }
        }
    }
}

impl Drop for NetlinkReceiver {
    fn drop(&mut self) {
        // SAFETY: `self.sock` is owned by this struct and not used again.
        unsafe {
            libc::close(self.sock);
        }
    }
}
