//! Kernel glue: a connected socket2 stream as a [`Transport`] and an
//! [`ErrorQueue`].
//!
//! Linux only. The error queue is read with recvmsg(MSG_ERRQUEUE); each
//! record carries one IP_RECVERR / IPV6_RECVERR control message holding a
//! `sock_extended_err`.

use std::io::{self, IoSlice};
use std::mem;
use std::os::fd::AsRawFd;
use std::ptr;
use std::time::Duration;

use socket2::Socket;

use crate::completion::{ErrorQueue, Notification};
use crate::transmit::Transport;

/// `ee_origin` of zero-copy completions (linux/errqueue.h).
pub const SO_EE_ORIGIN_ZEROCOPY: u8 = 5;
/// `ee_code` bit set when the kernel copied instead of pinning.
pub const SO_EE_CODE_ZEROCOPY_COPIED: u8 = 1;

/// Room for a few control messages; u64 words keep cmsghdr aligned.
const CONTROL_WORDS: usize = 128;

/// A connected TCP socket owned by one session. Closed on drop.
pub struct TcpTransport {
    socket: Socket,
}

impl TcpTransport {
    pub fn new(socket: Socket) -> Self {
        Self { socket }
    }

    pub fn socket(&self) -> &Socket {
        &self.socket
    }
}

impl Transport for TcpTransport {
    fn send(&self, buf: &[u8]) -> io::Result<usize> {
        self.socket.send_with_flags(buf, libc::MSG_NOSIGNAL)
    }

    fn send_vectored(&self, bufs: &[IoSlice<'_>], zerocopy: bool) -> io::Result<usize> {
        let mut flags = libc::MSG_NOSIGNAL;
        if zerocopy {
            flags |= libc::MSG_ZEROCOPY;
        }
        self.socket.send_vectored_with_flags(bufs, flags)
    }

    fn enable_zerocopy(&self) -> io::Result<()> {
        let one: libc::c_int = 1;
        let ret = unsafe {
            libc::setsockopt(
                self.socket.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_ZEROCOPY,
                &one as *const _ as *const libc::c_void,
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl ErrorQueue for TcpTransport {
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        // events = 0: POLLERR is always reported and is all we want.
        let mut pfd = libc::pollfd {
            fd: self.socket.as_raw_fd(),
            events: 0,
            revents: 0,
        };
        let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
        let ret = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(pfd.revents & libc::POLLERR != 0)
    }

    fn recv_notification(&self) -> io::Result<Option<Notification>> {
        let mut control = [0u64; CONTROL_WORDS];
        // Safety: an all-zero msghdr is a valid empty header.
        let mut msg: libc::msghdr = unsafe { mem::zeroed() };
        msg.msg_control = control.as_mut_ptr().cast();
        msg.msg_controllen = mem::size_of_val(&control) as _;

        let ret = unsafe {
            libc::recvmsg(
                self.socket.as_raw_fd(),
                &mut msg,
                libc::MSG_ERRQUEUE | libc::MSG_DONTWAIT,
            )
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            return match err.kind() {
                io::ErrorKind::WouldBlock => Ok(None),
                _ => Err(err),
            };
        }

        // Safety: `msg` was filled by recvmsg and `control` outlives the walk.
        // CMSG_NXTHDR bounds every step by msg_controllen.
        unsafe {
            let mut cmsg = libc::CMSG_FIRSTHDR(&msg);
            while !cmsg.is_null() {
                let hdr = &*cmsg;
                if is_recverr(hdr.cmsg_level, hdr.cmsg_type) {
                    let ee = ptr::read_unaligned(
                        libc::CMSG_DATA(cmsg) as *const libc::sock_extended_err,
                    );
                    return Ok(Some(parse_extended_err(&ee)));
                }
                cmsg = libc::CMSG_NXTHDR(&msg, cmsg);
            }
        }
        Ok(Some(Notification::Unrecognized))
    }
}

fn is_recverr(level: libc::c_int, ty: libc::c_int) -> bool {
    (level == libc::SOL_IP && ty == libc::IP_RECVERR)
        || (level == libc::SOL_IPV6 && ty == libc::IPV6_RECVERR)
}

/// Decode an extended error. Zero-copy completions carry the released range
/// in `ee_info..=ee_data`.
pub fn parse_extended_err(ee: &libc::sock_extended_err) -> Notification {
    if ee.ee_origin == SO_EE_ORIGIN_ZEROCOPY && ee.ee_errno == 0 {
        Notification::ZeroCopy {
            lo: ee.ee_info,
            hi: ee.ee_data,
            copied: ee.ee_code & SO_EE_CODE_ZEROCOPY_COPIED != 0,
        }
    } else {
        Notification::Other {
            origin: ee.ee_origin,
            errno: ee.ee_errno,
        }
    }
}
