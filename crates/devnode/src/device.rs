//! Device identity and open mode.

use std::fmt;
use std::str::FromStr;

use rustix::fs::{Dev, FileType, OFlags, makedev};

use crate::error::ParseError;

const PERMISSION_MASK: u32 = 0o7777;

/// Character or block device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Character,
    Block,
}

impl DeviceType {
    /// `S_IFCHR` or `S_IFBLK`.
    pub const fn mode_bits(self) -> u32 {
        match self {
            Self::Character => libc::S_IFCHR,
            Self::Block => libc::S_IFBLK,
        }
    }

    /// Recover the device type from the file-type bits of a mode.
    pub fn from_mode(mode: u32) -> Option<Self> {
        match mode & libc::S_IFMT {
            libc::S_IFCHR => Some(Self::Character),
            libc::S_IFBLK => Some(Self::Block),
            _ => None,
        }
    }

    pub(crate) fn file_type(self) -> FileType {
        match self {
            Self::Character => FileType::CharacterDevice,
            Self::Block => FileType::BlockDevice,
        }
    }
}

impl FromStr for DeviceType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "character" | "char" | "c" => Ok(Self::Character),
            "block" | "b" => Ok(Self::Block),
            _ => Err(ParseError::DeviceType(s.to_string())),
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Character => f.write_str("c"),
            Self::Block => f.write_str("b"),
        }
    }
}

/// A kernel device, identified by type and major/minor numbers.
///
/// Permission bits are optional. When set, a device directory entry only
/// matches if it carries at least those bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceDescriptor {
    kind: DeviceType,
    permissions: u32,
    major: u32,
    minor: u32,
}

impl DeviceDescriptor {
    pub const fn new(kind: DeviceType, major: u32, minor: u32) -> Self {
        Self {
            kind,
            permissions: 0,
            major,
            minor,
        }
    }

    pub const fn character(major: u32, minor: u32) -> Self {
        Self::new(DeviceType::Character, major, minor)
    }

    pub const fn block(major: u32, minor: u32) -> Self {
        Self::new(DeviceType::Block, major, minor)
    }

    /// Build from a raw mode (`S_IFCHR`/`S_IFBLK` plus permission bits).
    ///
    /// Returns `None` if the mode names any other file type.
    pub fn from_mode(mode: u32, major: u32, minor: u32) -> Option<Self> {
        let kind = DeviceType::from_mode(mode)?;
        Some(Self::new(kind, major, minor).with_permissions(mode))
    }

    #[must_use]
    pub const fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions & PERMISSION_MASK;
        self
    }

    #[inline]
    pub fn kind(&self) -> DeviceType {
        self.kind
    }

    #[inline]
    pub fn major(&self) -> u32 {
        self.major
    }

    #[inline]
    pub fn minor(&self) -> u32 {
        self.minor
    }

    #[inline]
    pub fn permissions(&self) -> u32 {
        self.permissions
    }

    /// Type and permission bits, as passed to `mknod`.
    #[inline]
    pub fn mode(&self) -> u32 {
        self.kind.mode_bits() | self.permissions
    }

    /// Composite device id of (major, minor).
    #[inline]
    pub fn device_id(&self) -> Dev {
        makedev(self.major, self.minor)
    }

    /// Whether a file with this `st_mode` and `st_rdev` is this device.
    ///
    /// The mode test is a mask (`st_mode` carries every requested bit), not an
    /// equality on the file type. `S_IFBLK` is a superset of `S_IFCHR`, so a
    /// character request also accepts a block node with the same id. A block
    /// request never accepts a character node.
    pub fn matches(&self, st_mode: u32, st_rdev: Dev) -> bool {
        let mode = self.mode();
        (st_mode & mode) == mode && st_rdev == self.device_id()
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.kind, self.major, self.minor)
    }
}

/// How the device is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Access {
    #[default]
    Read,
    Write,
    ReadWrite,
}

impl Access {
    pub fn oflags(self) -> OFlags {
        match self {
            Self::Read => OFlags::RDONLY,
            Self::Write => OFlags::WRONLY,
            Self::ReadWrite => OFlags::RDWR,
        }
    }
}

impl FromStr for Access {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" => Ok(Self::Read),
            "w" => Ok(Self::Write),
            "r+" => Ok(Self::ReadWrite),
            _ => Err(ParseError::Access(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustix::fs::{major, minor};

    #[test]
    fn device_id_roundtrips_major_minor() {
        let dev = DeviceDescriptor::character(1, 5);
        assert_eq!(major(dev.device_id()), 1);
        assert_eq!(minor(dev.device_id()), 5);

        // Large minors use the split encoding.
        let dev = DeviceDescriptor::block(259, 70000);
        assert_eq!(major(dev.device_id()), 259);
        assert_eq!(minor(dev.device_id()), 70000);
    }

    #[test]
    fn from_mode_keeps_permissions() {
        let dev = DeviceDescriptor::from_mode(libc::S_IFCHR | 0o640, 1, 3).unwrap();
        assert_eq!(dev.kind(), DeviceType::Character);
        assert_eq!(dev.permissions(), 0o640);
        assert_eq!(dev.mode(), libc::S_IFCHR | 0o640);
    }

    #[test]
    fn from_mode_rejects_non_devices() {
        assert!(DeviceDescriptor::from_mode(libc::S_IFREG, 1, 3).is_none());
        assert!(DeviceDescriptor::from_mode(libc::S_IFDIR, 1, 3).is_none());
        assert!(DeviceDescriptor::from_mode(0, 1, 3).is_none());
    }

    #[test]
    fn matches_type_and_id() {
        let zero = DeviceDescriptor::character(1, 5);
        assert!(zero.matches(libc::S_IFCHR | 0o666, makedev(1, 5)));
        assert!(!zero.matches(libc::S_IFCHR | 0o666, makedev(1, 3)));
        assert!(!zero.matches(libc::S_IFDIR | 0o755, makedev(1, 5)));
    }

    #[test]
    fn character_request_accepts_block_node() {
        // S_IFBLK carries the S_IFCHR bit.
        let zero = DeviceDescriptor::character(1, 5);
        assert!(zero.matches(libc::S_IFBLK | 0o666, makedev(1, 5)));

        let loop0 = DeviceDescriptor::block(7, 0);
        assert!(!loop0.matches(libc::S_IFCHR | 0o666, makedev(7, 0)));
    }

    #[test]
    fn matches_requires_requested_permissions() {
        let dev = DeviceDescriptor::character(1, 5).with_permissions(0o002);
        assert!(dev.matches(libc::S_IFCHR | 0o666, makedev(1, 5)));
        assert!(!dev.matches(libc::S_IFCHR | 0o660, makedev(1, 5)));
    }

    #[test]
    fn parse_device_type() {
        assert_eq!("character".parse(), Ok(DeviceType::Character));
        assert_eq!("block".parse(), Ok(DeviceType::Block));
        assert!("pipe".parse::<DeviceType>().is_err());
    }

    #[test]
    fn parse_access() {
        assert_eq!("r".parse(), Ok(Access::Read));
        assert_eq!("w".parse(), Ok(Access::Write));
        assert_eq!("r+".parse(), Ok(Access::ReadWrite));
        assert_eq!(
            "a".parse::<Access>(),
            Err(ParseError::Access("a".to_string()))
        );
    }

    #[test]
    fn display() {
        assert_eq!(DeviceDescriptor::block(7, 0).to_string(), "b 7:0");
    }
}
