//! IPv4 addresses, prefixes and wildcards.

use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::ParseError;

/// An IPv4 address.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Ip(u32);

impl Ip {
    pub const ZERO: Ip = Ip(0);
    pub const MAX: Ip = Ip(u32::MAX);

    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns bit `i`, counting from the most significant bit.
    pub const fn bit(self, i: u32) -> bool {
        (self.0 >> (31 - i)) & 1 == 1
    }
}

impl From<Ipv4Addr> for Ip {
    fn from(addr: Ipv4Addr) -> Self {
        Ip(u32::from(addr))
    }
}

impl FromStr for Ip {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Ipv4Addr>()
            .map(Ip::from)
            .map_err(|_| ParseError::InvalidIp(s.to_string()))
    }
}

impl Display for Ip {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Ipv4Addr::from(self.0))
    }
}

/// Network mask with the top `len` bits set.
pub const fn network_mask(len: u8) -> u32 {
    if len == 0 {
        0
    } else {
        u32::MAX << (32 - len as u32)
    }
}

/// An IPv4 prefix. The start address never has bits set past the length.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Prefix {
    start: Ip,
    len: u8,
}

impl Prefix {
    pub const ZERO: Prefix = Prefix {
        start: Ip::ZERO,
        len: 0,
    };

    /// Creates a prefix, clearing host bits of `ip`.
    ///
    /// # Panics
    ///
    /// Panics if `len > 32`.
    pub fn new(ip: Ip, len: u8) -> Self {
        assert!(len <= 32, "Prefix length must be in range 0..=32");
        Self {
            start: Ip(ip.0 & network_mask(len)),
            len,
        }
    }

    pub fn start(&self) -> Ip {
        self.start
    }

    pub fn length(&self) -> u8 {
        self.len
    }

    pub fn contains(&self, ip: Ip) -> bool {
        ip.0 & network_mask(self.len) == self.start.0
    }
}

impl FromStr for Prefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ip, len) = s
            .split_once('/')
            .ok_or_else(|| ParseError::InvalidPrefix(s.to_string()))?;
        let ip: Ip = ip.parse()?;
        let len = len
            .parse::<u8>()
            .ok()
            .filter(|&l| l <= 32)
            .ok_or_else(|| ParseError::InvalidPrefixLength(s.to_string(), len.to_string()))?;
        Ok(Prefix::new(ip, len))
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.start, self.len)
    }
}

/// An IPv4 wildcard: a set `mask` bit means the address bit is don't-care.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct IpWildcard {
    ip: Ip,
    mask: u32,
}

impl IpWildcard {
    /// Matches every address.
    pub const ANY: IpWildcard = IpWildcard {
        ip: Ip::ZERO,
        mask: u32::MAX,
    };

    pub const fn new(ip: Ip, mask: u32) -> Self {
        Self {
            ip: Ip(ip.0 & !mask),
            mask,
        }
    }

    pub fn ip(&self) -> Ip {
        self.ip
    }

    /// The don't-care mask.
    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn is_any(&self) -> bool {
        self.mask == u32::MAX
    }

    /// Whether this wildcard matches exactly one address.
    pub fn is_ip(&self) -> bool {
        self.mask == 0
    }

    /// Returns the equivalent prefix, if the don't-care bits are a suffix.
    pub fn to_prefix(&self) -> Option<Prefix> {
        let care = !self.mask;
        let len = care.leading_ones();
        if care.count_ones() == len {
            Some(Prefix::new(self.ip, len as u8))
        } else {
            None
        }
    }

    pub fn contains(&self, ip: Ip) -> bool {
        ip.0 & !self.mask == self.ip.0
    }
}

impl From<Ip> for IpWildcard {
    fn from(ip: Ip) -> Self {
        IpWildcard::new(ip, 0)
    }
}

impl From<Prefix> for IpWildcard {
    fn from(prefix: Prefix) -> Self {
        IpWildcard::new(prefix.start, !network_mask(prefix.len))
    }
}

impl FromStr for IpWildcard {
    type Err = ParseError;

    /// Accepts `a.b.c.d`, `a.b.c.d/len` and `a.b.c.d:m.m.m.m` (don't-care mask).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((ip, mask)) = s.split_once(':') {
            let ip: Ip = ip
                .parse()
                .map_err(|_| ParseError::InvalidWildcard(s.to_string()))?;
            let mask: Ip = mask
                .parse()
                .map_err(|_| ParseError::InvalidWildcard(s.to_string()))?;
            Ok(IpWildcard::new(ip, mask.0))
        } else if s.contains('/') {
            Ok(s.parse::<Prefix>()?.into())
        } else {
            Ok(s.parse::<Ip>()?.into())
        }
    }
}

impl Display for IpWildcard {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_ip() {
            write!(f, "{}", self.ip)
        } else if let Some(prefix) = self.to_prefix() {
            write!(f, "{}", prefix)
        } else {
            write!(f, "{}:{}", self.ip, Ip(self.mask))
        }
    }
}
