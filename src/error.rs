// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Crate-wide error type. Every public operation returns `Result<T, NanvixError>`;
// server handlers convert a `NanvixError` into a `FAILURE {errno}` reply frame via
// `.errno()` instead of re-deriving the numeric code by hand.

use std::fmt;

/// A POSIX-style error kind, one per condition the wire protocol can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NanvixError {
    /// Bad handle, null buffer, size out of range, malformed name (`EINVAL`).
    InvalidArgument,
    /// Unknown name (`ENOENT`).
    NotFound,
    /// Name/create conflict (`EEXIST`).
    AlreadyExists,
    /// Owner check failed (`EACCES` or `EPERM`, see `PermissionDenied::Access`/`::Owner`).
    PermissionDenied(PermissionKind),
    /// Table full (`ENFILE`, or `ENOENT` for the barrier pool specifically).
    Exhausted(ExhaustedKind),
    /// Size exceeds the backing store (`ENOMEM`).
    NoMemory,
    /// Truncate while mapped (`EBUSY`).
    Busy,
    /// Transient open/resource retry (`EAGAIN`).
    Unavailable,
    /// Offset/size out of region (`ENXIO`).
    Range,
    /// An I/O failure from the underlying simulated NoC transport.
    Io(IoErrorKind),
}

/// Distinguishes the two different "you're not allowed to do that" errnos the
/// source uses: `EACCES` for a mode/open-flags mismatch, `EPERM` for an
/// ownership check (e.g. SHM `unlink` by a non-owner).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionKind {
    Access,
    Owner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustedKind {
    /// A fixed-size table (per-node open table, SHM region table) is full.
    Table,
    /// The barrier pool specifically (source returns `ENOENT`, not `ENFILE`).
    BarrierPool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoErrorKind {
    NotFound,
    AlreadyExists,
    Other,
}

impl NanvixError {
    /// The POSIX errno this error maps to, as a negative value matching the
    /// source's convention of returning `-errno` from every fallible call.
    pub fn errno(&self) -> i32 {
        -self.raw_errno()
    }

    fn raw_errno(&self) -> i32 {
        #[cfg(unix)]
        {
            match self {
                NanvixError::InvalidArgument => libc::EINVAL,
                NanvixError::NotFound => libc::ENOENT,
                NanvixError::AlreadyExists => libc::EEXIST,
                NanvixError::PermissionDenied(PermissionKind::Access) => libc::EACCES,
                NanvixError::PermissionDenied(PermissionKind::Owner) => libc::EPERM,
                NanvixError::Exhausted(ExhaustedKind::Table) => libc::ENFILE,
                NanvixError::Exhausted(ExhaustedKind::BarrierPool) => libc::ENOENT,
                NanvixError::NoMemory => libc::ENOMEM,
                NanvixError::Busy => libc::EBUSY,
                NanvixError::Unavailable => libc::EAGAIN,
                NanvixError::Range => libc::ENXIO,
                NanvixError::Io(_) => libc::EIO,
            }
        }
        #[cfg(not(unix))]
        {
            // Stable, platform-independent fallback values matching glibc's
            // numbering; only the sign and relative ordering are load-bearing
            // on the wire, not the exact numeric constant on non-POSIX hosts.
            match self {
                NanvixError::InvalidArgument => 22,
                NanvixError::NotFound => 2,
                NanvixError::AlreadyExists => 17,
                NanvixError::PermissionDenied(PermissionKind::Access) => 13,
                NanvixError::PermissionDenied(PermissionKind::Owner) => 1,
                NanvixError::Exhausted(ExhaustedKind::Table) => 23,
                NanvixError::Exhausted(ExhaustedKind::BarrierPool) => 2,
                NanvixError::NoMemory => 12,
                NanvixError::Busy => 16,
                NanvixError::Unavailable => 11,
                NanvixError::Range => 6,
                NanvixError::Io(_) => 5,
            }
        }
    }

    /// Decode an errno previously produced by [`errno`](Self::errno) back into
    /// a `NanvixError`. Used by the client side to interpret a `FAILURE` reply.
    pub fn from_errno(errno: i32) -> Self {
        #[cfg(unix)]
        {
            match -errno {
                e if e == libc::EINVAL => NanvixError::InvalidArgument,
                e if e == libc::ENOENT => NanvixError::NotFound,
                e if e == libc::EEXIST => NanvixError::AlreadyExists,
                e if e == libc::EACCES => NanvixError::PermissionDenied(PermissionKind::Access),
                e if e == libc::EPERM => NanvixError::PermissionDenied(PermissionKind::Owner),
                e if e == libc::ENFILE => NanvixError::Exhausted(ExhaustedKind::Table),
                e if e == libc::ENOMEM => NanvixError::NoMemory,
                e if e == libc::EBUSY => NanvixError::Busy,
                e if e == libc::EAGAIN => NanvixError::Unavailable,
                e if e == libc::ENXIO => NanvixError::Range,
                _ => NanvixError::Io(IoErrorKind::Other),
            }
        }
        #[cfg(not(unix))]
        {
            match -errno {
                22 => NanvixError::InvalidArgument,
                2 => NanvixError::NotFound,
                17 => NanvixError::AlreadyExists,
                13 => NanvixError::PermissionDenied(PermissionKind::Access),
                1 => NanvixError::PermissionDenied(PermissionKind::Owner),
                23 => NanvixError::Exhausted(ExhaustedKind::Table),
                12 => NanvixError::NoMemory,
                16 => NanvixError::Busy,
                11 => NanvixError::Unavailable,
                6 => NanvixError::Range,
                _ => NanvixError::Io(IoErrorKind::Other),
            }
        }
    }
}

impl fmt::Display for NanvixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NanvixError::InvalidArgument => write!(f, "invalid argument"),
            NanvixError::NotFound => write!(f, "not found"),
            NanvixError::AlreadyExists => write!(f, "already exists"),
            NanvixError::PermissionDenied(PermissionKind::Access) => write!(f, "permission denied (access)"),
            NanvixError::PermissionDenied(PermissionKind::Owner) => write!(f, "permission denied (not owner)"),
            NanvixError::Exhausted(ExhaustedKind::Table) => write!(f, "table exhausted"),
            NanvixError::Exhausted(ExhaustedKind::BarrierPool) => write!(f, "barrier pool exhausted"),
            NanvixError::NoMemory => write!(f, "no memory"),
            NanvixError::Busy => write!(f, "resource busy"),
            NanvixError::Unavailable => write!(f, "resource temporarily unavailable"),
            NanvixError::Range => write!(f, "offset/size out of range"),
            NanvixError::Io(_) => write!(f, "underlying transport error"),
        }
    }
}

impl std::error::Error for NanvixError {}

impl From<std::io::Error> for NanvixError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => NanvixError::Io(IoErrorKind::NotFound),
            std::io::ErrorKind::AlreadyExists => NanvixError::Io(IoErrorKind::AlreadyExists),
            _ => NanvixError::Io(IoErrorKind::Other),
        }
    }
}

pub type Result<T> = std::result::Result<T, NanvixError>;
