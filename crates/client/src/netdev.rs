//! Interface configuration via `SIOC*` ioctls (`kl::netdev` in the
//! reference). A short-lived `AF_INET`/`SOCK_DGRAM` socket is the handle
//! these ioctls are issued against; it carries no traffic of its own.

use std::io;
use std::net::Ipv4Addr;
use std::str::FromStr;

const IF_NAME_SIZE: usize = 16;

#[repr(C)]
struct SockAddrIn {
    family: u16,
    port: u16,
    addr: u32,
    zero: [u8; 8],
}

#[repr(C)]
union IfrIfru {
    addr: SockAddrIn,
    flags: i16,
    mtu: i32,
}

#[repr(C)]
struct IfReq {
    name: [u8; IF_NAME_SIZE],
    ifru: IfrIfru,
}

fn new_ifreq(ifname: &str) -> io::Result<IfReq> {
    if ifname.len() >= IF_NAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "interface name too long",
        ));
    }
    let mut name = [0u8; IF_NAME_SIZE];
    name[..ifname.len()].copy_from_slice(ifname.as_bytes());
    Ok(IfReq {
        name,
        ifru: IfrIfru { mtu: 0 },
    })
}

fn ioctl_socket() -> io::Result<i32> {
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(fd)
}

fn run_ioctl(request: libc::c_ulong, req: &mut IfReq) -> io::Result<()> {
    let fd = ioctl_socket()?;
    let ret = unsafe { libc::ioctl(fd, request, req as *mut IfReq) };
    let err = io::Error::last_os_error();
    unsafe { libc::close(fd) };
    if ret < 0 {
        return Err(err);
    }
    Ok(())
}

fn parse_ipv4(addr: &str) -> io::Result<u32> {
    let parsed = Ipv4Addr::from_str(addr)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("bad address {addr}")))?;
    Ok(u32::from_ne_bytes(parsed.octets()))
}

pub fn set_addr(ifname: &str, addr: &str) -> io::Result<()> {
    let mut req = new_ifreq(ifname)?;
    req.ifru = IfrIfru {
        addr: SockAddrIn {
            family: libc::AF_INET as u16,
            port: 0,
            addr: parse_ipv4(addr)?,
            zero: [0; 8],
        },
    };
    run_ioctl(libc::SIOCSIFADDR, &mut req)
}

pub fn set_netmask(ifname: &str, mask: &str) -> io::Result<()> {
    let mut req = new_ifreq(ifname)?;
    req.ifru = IfrIfru {
        addr: SockAddrIn {
            family: libc::AF_INET as u16,
            port: 0,
            addr: parse_ipv4(mask)?,
            zero: [0; 8],
        },
    };
    run_ioctl(libc::SIOCSIFNETMASK, &mut req)
}

pub fn set_mtu(ifname: &str, mtu: u16) -> io::Result<()> {
    let mut req = new_ifreq(ifname)?;
    req.ifru = IfrIfru { mtu: mtu as i32 };
    run_ioctl(libc::SIOCSIFMTU, &mut req)
}

pub fn interface_up(ifname: &str) -> io::Result<()> {
    let mut req = new_ifreq(ifname)?;
    req.ifru = IfrIfru {
        flags: (libc::IFF_UP | libc::IFF_RUNNING) as i16,
    };
    run_ioctl(libc::SIOCSIFFLAGS, &mut req)
}
