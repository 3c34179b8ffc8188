//! Network interface enumeration and flag queries.

use ::bitflags::bitflags;
use ::std::{
    ffi::CStr,
    mem,
    os::fd::{AsRawFd, FromRawFd, OwnedFd},
    ptr,
};
use ::tap::Pipe;

use crate::errors::{cvt, Context, Result};

bitflags! {
    /// The subset of `SIOCGIFFLAGS` interface flags the prober cares about.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct IfFlags: u32 {
        /// Administratively up.
        const UP = libc::IFF_UP as u32;
        /// Carrier detected; the link layer is operational.
        const RUNNING = libc::IFF_RUNNING as u32;
        const LOOPBACK = libc::IFF_LOOPBACK as u32;
    }
}

/// Address family of an interface address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressFamily {
    Inet,
    Inet6,
    /// Link-layer (`AF_PACKET`) and anything else.
    Other(i32),
}

impl AddressFamily {
    fn from_raw(family: i32) -> Self {
        match family {
            libc::AF_INET => Self::Inet,
            libc::AF_INET6 => Self::Inet6,
            other => Self::Other(other),
        }
    }

    /// Returns `true` for IPv4 and IPv6.
    pub fn is_ip(self) -> bool {
        matches!(self, Self::Inet | Self::Inet6)
    }
}

/// One interface address as reported by `getifaddrs`. Interfaces with several
/// addresses appear once per address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkInterface {
    pub name: String,
    pub flags: IfFlags,
    /// `None` if the entry carries no address at all.
    pub family: Option<AddressFamily>,
}

/// Source of interface information. The prober is generic over this so the
/// selection logic can be exercised without touching the host's network
/// configuration.
pub trait InterfaceProvider {
    /// Enumerate all interface addresses.
    fn interfaces(&self) -> Result<Vec<NetworkInterface>>;

    /// Query the current flags of a single interface.
    fn interface_flags(&self, name: &str) -> Result<IfFlags>;
}

/// [`InterfaceProvider`] backed by the kernel.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemInterfaces;

impl InterfaceProvider for SystemInterfaces {
    fn interfaces(&self) -> Result<Vec<NetworkInterface>> {
        let mut ifap: *mut libc::ifaddrs = ptr::null_mut();
        cvt(unsafe { libc::getifaddrs(&mut ifap) })
            .context("Failed to get network interfaces")
            .function("getifaddrs")?;

        let mut interfaces = Vec::new();
        let mut cursor = ifap;
        while !cursor.is_null() {
            // SAFETY: entries of the list returned by `getifaddrs` stay valid
            // until `freeifaddrs`, and `ifa_name` is always set.
            let ifa = unsafe { &*cursor };
            let name = unsafe { CStr::from_ptr(ifa.ifa_name) }
                .to_string_lossy()
                .into_owned();
            let family = (!ifa.ifa_addr.is_null())
                .then(|| AddressFamily::from_raw(unsafe { (*ifa.ifa_addr).sa_family } as i32));

            interfaces.push(NetworkInterface {
                name,
                flags: IfFlags::from_bits_truncate(ifa.ifa_flags),
                family,
            });
            cursor = ifa.ifa_next;
        }

        unsafe { libc::freeifaddrs(ifap) };
        Ok(interfaces)
    }

    fn interface_flags(&self, name: &str) -> Result<IfFlags> {
        let fd = cvt(unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) })
            .context("Failed to create socket")
            .function("socket")?;
        // SAFETY: `fd` was just returned by `socket` and has no other owner.
        let socket = unsafe { OwnedFd::from_raw_fd(fd) };

        // SAFETY: `ifreq` is plain old data, all zeroes is a valid value.
        let mut ifr: libc::ifreq = unsafe { mem::zeroed() };
        for (dst, src) in ifr
            .ifr_name
            .iter_mut()
            .zip(name.bytes().take(libc::IFNAMSIZ - 1))
        {
            *dst = src as libc::c_char;
        }

        cvt(unsafe { libc::ioctl(socket.as_raw_fd(), libc::SIOCGIFFLAGS as _, &mut ifr) })
            .context(format!("Failed to get interface flags of {name}"))
            .function("ioctl")?;

        // SAFETY: `SIOCGIFFLAGS` fills the flags member of the union.
        let flags = unsafe { ifr.ifr_ifru.ifru_flags };
        (flags as u16 as u32)
            .pipe(IfFlags::from_bits_truncate)
            .pipe(Ok)
    }
}

/// Selects the interface the box is most likely using to reach the network.
///
/// Loopback, interfaces that are down, and entries without an IPv4 or IPv6
/// address are skipped. Of the rest, the first whose name contains one of
/// `name_patterns` wins; enumeration order decides between several matches.
pub fn select_active_adapter<'a, S>(
    interfaces: &'a [NetworkInterface],
    name_patterns: &[S],
) -> Option<&'a NetworkInterface>
where
    S: AsRef<str>,
{
    interfaces.iter().find(|iface| {
        !iface.flags.contains(IfFlags::LOOPBACK)
            && iface.flags.contains(IfFlags::UP)
            && iface.family.map_or(false, AddressFamily::is_ip)
            && name_patterns
                .iter()
                .any(|pattern| iface.name.contains(pattern.as_ref()))
    })
}
