//! TUN device allocation (`spec.md` §6: `/dev/net/tun` with
//! `IFF_TUN | IFF_NO_PI`).
//!
//! These two flags are Linux tun/tap specifics that `libc` does not export
//! (they live in `linux/if_tun.h`, not the POSIX `net/if.h` the crate
//! wraps), so they're defined locally.

use std::ffi::CString;
use std::fs::File;
use std::io;
use std::os::unix::io::FromRawFd;

const IFF_TUN: i16 = 0x0001;
const IFF_NO_PI: i16 = 0x1000;
const TUNSETIFF: libc::c_ulong = 0x4004_54ca;
const IF_NAME_SIZE: usize = 16;

#[repr(C)]
struct TunIfReq {
    name: [u8; IF_NAME_SIZE],
    flags: i16,
    _pad: [u8; 14],
}

/// Open `/dev/net/tun` and bind it to interface `name`, creating it if it
/// does not already exist. The returned `File` is the TUN fd; reads and
/// writes on it carry raw IPv4 datagrams (`IFF_NO_PI` strips the 4-byte
/// protocol-info header the kernel would otherwise prepend).
pub fn allocate_tun(name: &str) -> io::Result<File> {
    if name.len() >= IF_NAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "tun interface name too long",
        ));
    }
    let path = CString::new("/dev/net/tun").unwrap();
    let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDWR) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }

    let mut req = TunIfReq {
        name: [0u8; IF_NAME_SIZE],
        flags: IFF_TUN | IFF_NO_PI,
        _pad: [0u8; 14],
    };
    req.name[..name.len()].copy_from_slice(name.as_bytes());

    let ret = unsafe { libc::ioctl(fd, TUNSETIFF, &req) };
    if ret < 0 {
        let err = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(err);
    }
    Ok(unsafe { File::from_raw_fd(fd) })
}
