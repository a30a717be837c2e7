//! Listen-socket construction.
//!
//! Built by hand with `libc` because the standard listener offers no way to
//! choose the accept queue backlog, and the backlog is operator-visible
//! behavior under load (clients see resets when it is too small).

use std::io;
use std::mem;
use std::net::TcpListener as StdTcpListener;
use std::os::unix::io::FromRawFd;

use phishbait_core::error::Result;
use phishbait_core::ProxyError;

/// Create a non-blocking wildcard-v4 listen socket on `port` with the given
/// accept queue `backlog`. `SO_REUSEADDR` is set so restarts do not trip
/// over sockets in TIME_WAIT.
pub fn create_listen_socket(port: u16, backlog: i32) -> Result<StdTcpListener> {
    // SAFETY: plain socket syscalls; the fd ends up owned by the returned
    // listener on every success path and is closed on every failure path.
    unsafe {
        let fd = libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0);
        if fd < 0 {
            return Err(bind_error(port));
        }

        let one: libc::c_int = 1;
        if libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &one as *const _ as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        ) < 0
        {
            let err = bind_error(port);
            libc::close(fd);
            return Err(err);
        }

        let mut addr: libc::sockaddr_in = mem::zeroed();
        addr.sin_family = libc::AF_INET as libc::sa_family_t;
        addr.sin_port = port.to_be();
        addr.sin_addr.s_addr = libc::INADDR_ANY;

        if libc::bind(
            fd,
            &addr as *const _ as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        ) < 0
        {
            let err = bind_error(port);
            libc::close(fd);
            return Err(err);
        }

        if libc::listen(fd, backlog) < 0 {
            let err = ProxyError::Listen(io::Error::last_os_error());
            libc::close(fd);
            return Err(err);
        }

        let listener = StdTcpListener::from_raw_fd(fd);
        listener.set_nonblocking(true)?;
        Ok(listener)
    }
}

fn bind_error(port: u16) -> ProxyError {
    ProxyError::Bind {
        port,
        source: io::Error::last_os_error(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;

    #[test]
    fn test_listen_socket_accepts_connections() {
        let listener = create_listen_socket(0, 128).unwrap();
        let port = listener.local_addr().unwrap().port();
        assert_ne!(port, 0);

        // The listener is non-blocking; flip it back for a plain accept.
        listener.set_nonblocking(false).unwrap();
        let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();
        let (mut accepted, _) = listener.accept().unwrap();

        client.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        accepted.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[test]
    fn test_port_collision_is_reported() {
        let first = create_listen_socket(0, 128).unwrap();
        let port = first.local_addr().unwrap().port();
        let second = create_listen_socket(port, 128);
        assert!(matches!(second, Err(ProxyError::Bind { .. })));
    }
}
