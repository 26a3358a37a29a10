// Author: Lukas Bower
// Purpose: Define the structured request and response envelopes exchanged with the protocol engine.

//! Decoded protocol shapes for the chan-door session layer.
//!
//! The external engine owns byte-level framing and codecs; a [`Session`]
//! only ever sees the envelopes defined here. Version negotiation also stays
//! inside the engine and never reaches the session.
//!
//! [`Session`]: crate::Session

use core::fmt;

use crate::FsError;

/// Maximum I/O payload size reported to clients on open and create.
pub const IOUNIT: u32 = 8192;

/// Qid type bitflags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QidType(u8);

impl QidType {
    /// Directory bit.
    pub const DIRECTORY: Self = Self(0x80);
    /// Regular file.
    pub const FILE: Self = Self(0x00);

    /// Build a type tag from a raw byte.
    #[must_use]
    pub fn from_raw(value: u8) -> Self {
        Self(value)
    }

    /// Check whether the qid represents a directory.
    #[must_use]
    pub fn is_directory(self) -> bool {
        self.0 & Self::DIRECTORY.0 != 0
    }
}

impl From<QidType> for u8 {
    fn from(value: QidType) -> Self {
        value.0
    }
}

/// Server-issued node identifier returned on attach, walk, and open.
///
/// The path field is globally unique and strictly increasing in issuance
/// order; the version field is always zero because no content versioning
/// exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Qid {
    ty: QidType,
    version: u32,
    path: u64,
}

impl Qid {
    /// Construct a new qid.
    #[must_use]
    pub fn new(ty: QidType, version: u32, path: u64) -> Self {
        Self { ty, version, path }
    }

    /// Return the qid type flags.
    #[must_use]
    pub fn ty(&self) -> QidType {
        self.ty
    }

    /// Return the qid version field.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Return the qid path field.
    #[must_use]
    pub fn path(&self) -> u64 {
        self.path
    }
}

/// Base open mode encoded in the low bits of the open mode field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpenModeBase {
    /// Open for reading.
    ReadOnly = 0,
    /// Open for writing.
    WriteOnly = 1,
    /// Open for reading and writing.
    ReadWrite = 2,
    /// Execute traversal; treated as a read for rendezvous leaves.
    Execute = 3,
}

/// Requested open mode as a structured representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    base: OpenModeBase,
    truncate: bool,
    append: bool,
}

impl OpenMode {
    /// Construct a read-only mode descriptor.
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            base: OpenModeBase::ReadOnly,
            truncate: false,
            append: false,
        }
    }

    /// Construct a write-only mode descriptor.
    #[must_use]
    pub fn write_only() -> Self {
        Self {
            base: OpenModeBase::WriteOnly,
            truncate: false,
            append: false,
        }
    }

    /// Construct a read-write mode descriptor.
    #[must_use]
    pub fn read_write() -> Self {
        Self {
            base: OpenModeBase::ReadWrite,
            truncate: false,
            append: false,
        }
    }

    /// Build a mode descriptor from the raw wire byte.
    #[must_use]
    pub fn from_raw(value: u8) -> Self {
        let base = match value & 0x03 {
            0 => OpenModeBase::ReadOnly,
            1 => OpenModeBase::WriteOnly,
            2 => OpenModeBase::ReadWrite,
            _ => OpenModeBase::Execute,
        };
        Self {
            base,
            truncate: value & 0x10 != 0,
            append: value & 0x80 != 0,
        }
    }

    /// Return the base access requested by this mode.
    #[must_use]
    pub fn base(self) -> OpenModeBase {
        self.base
    }

    /// Determine if the mode permits reading.
    #[must_use]
    pub fn allows_read(self) -> bool {
        matches!(
            self.base,
            OpenModeBase::ReadOnly | OpenModeBase::ReadWrite | OpenModeBase::Execute
        )
    }

    /// Determine if the mode permits writing.
    #[must_use]
    pub fn allows_write(self) -> bool {
        matches!(self.base, OpenModeBase::WriteOnly | OpenModeBase::ReadWrite) || self.append
    }

    /// Expose the raw flag representation used on the wire.
    #[must_use]
    pub fn raw(self) -> u8 {
        let mut bits = self.base as u8;
        if self.truncate {
            bits |= 0x10;
        }
        if self.append {
            bits |= 0x80;
        }
        bits
    }
}

impl From<OpenMode> for u8 {
    fn from(value: OpenMode) -> Self {
        value.raw()
    }
}

/// Error codes surfaced to clients, one per [`FsError`] kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Byte operations were attempted on a directory.
    IsADirectory,
    /// Directory operations were attempted on a leaf.
    NotADirectory,
    /// The named entry does not exist.
    NoSuchEntry,
    /// The named entry already exists.
    AlreadyExists,
    /// The operation is forbidden.
    PermissionDenied,
    /// Create was invoked at an unsupported depth.
    InvalidDepth,
    /// The node has no offset state.
    NotSeekable,
    /// The rendezvous channel was closed.
    Io,
    /// The fid is not bound.
    NoSuchFid,
    /// The fid has not been opened.
    NotOpen,
    /// The request kind is not wired up.
    NotImplemented,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::IsADirectory => "IsADirectory",
            Self::NotADirectory => "NotADirectory",
            Self::NoSuchEntry => "NoSuchEntry",
            Self::AlreadyExists => "AlreadyExists",
            Self::PermissionDenied => "PermissionDenied",
            Self::InvalidDepth => "InvalidDepth",
            Self::NotSeekable => "NotSeekable",
            Self::Io => "Io",
            Self::NoSuchFid => "NoSuchFid",
            Self::NotOpen => "NotOpen",
            Self::NotImplemented => "NotImplemented",
        };
        write!(f, "{code}")
    }
}

impl From<&FsError> for ErrorCode {
    fn from(err: &FsError) -> Self {
        match err {
            FsError::IsADirectory => Self::IsADirectory,
            FsError::NotADirectory => Self::NotADirectory,
            FsError::NoSuchEntry(_) => Self::NoSuchEntry,
            FsError::AlreadyExists(_) => Self::AlreadyExists,
            FsError::PermissionDenied(_) => Self::PermissionDenied,
            FsError::InvalidDepth => Self::InvalidDepth,
            FsError::NotSeekable => Self::NotSeekable,
            FsError::Io => Self::Io,
            FsError::NoSuchFid(_) => Self::NoSuchFid,
            FsError::NotOpen(_) => Self::NotOpen,
            FsError::NotImplemented(_) => Self::NotImplemented,
        }
    }
}

/// Request envelope containing a tag and message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request identifier, echoed back by responses.
    pub tag: u16,
    /// The concrete request payload.
    pub body: RequestBody,
}

/// Response envelope containing a tag and message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response identifier (mirrors the request tag).
    pub tag: u16,
    /// The concrete response payload.
    pub body: ResponseBody,
}

/// Request variants handled by the session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// `Tattach` binds a fid to the namespace root.
    Attach {
        /// Fid to bind to the root.
        fid: u32,
        /// User name supplied by the client.
        uname: String,
        /// Attachment name supplied by the client.
        aname: String,
    },
    /// `Tflush` cancels an outstanding request by tag.
    Flush {
        /// Tag of the request to cancel.
        oldtag: u16,
    },
    /// `Twalk` traverses the namespace to produce a new fid.
    Walk {
        /// Source fid for the walk.
        fid: u32,
        /// Destination fid receiving the walk result.
        newfid: u32,
        /// Path components supplied by the client.
        wnames: Vec<String>,
    },
    /// `Topen` opens a fid for subsequent I/O.
    Open {
        /// Fid to open.
        fid: u32,
        /// Requested open mode.
        mode: OpenMode,
    },
    /// `Tcreate` creates a new entry under the fid's directory.
    Create {
        /// Directory fid; rebound to the created entry on success.
        fid: u32,
        /// Name of the entry to create.
        name: String,
        /// Whether a directory was requested.
        directory: bool,
        /// Mode the created entry is opened with.
        mode: OpenMode,
    },
    /// `Tread` reads bytes from an opened fid.
    Read {
        /// Fid to read from.
        fid: u32,
        /// Offset into the node; ignored by rendezvous leaves.
        offset: u64,
        /// Number of bytes requested.
        count: u32,
    },
    /// `Twrite` writes bytes to an opened fid.
    Write {
        /// Fid to write to.
        fid: u32,
        /// Offset into the node; ignored by rendezvous leaves.
        offset: u64,
        /// Payload bytes supplied by the client.
        data: Vec<u8>,
    },
    /// `Tclunk` releases a fid.
    Clunk {
        /// Fid to release.
        fid: u32,
    },
    /// `Tremove` removes the node bound to a fid.
    Remove {
        /// Fid naming the node to remove.
        fid: u32,
    },
    /// `Tstat` queries node metadata.
    Stat {
        /// Fid naming the node to stat.
        fid: u32,
    },
    /// `Twstat` updates node metadata.
    Wstat {
        /// Fid naming the node to update.
        fid: u32,
        /// Serialized metadata supplied by the engine; opaque to the session.
        stat: Vec<u8>,
    },
}

/// Response variants produced by the session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// Response to `Tattach` containing the root qid.
    Attach {
        /// Qid issued for the namespace root.
        qid: Qid,
    },
    /// Response to `Tflush` acknowledging the cancel request.
    Flush,
    /// Response to `Twalk` containing the issued qids.
    Walk {
        /// Qids issued for the walk (exactly one per successful call).
        qids: Vec<Qid>,
    },
    /// Response to `Topen` containing the opened qid and I/O unit.
    Open {
        /// Qid issued for the opened fid.
        qid: Qid,
        /// Maximum I/O payload size.
        iounit: u32,
    },
    /// Response to `Tcreate` containing the created qid and I/O unit.
    Create {
        /// Qid issued for the created entry.
        qid: Qid,
        /// Maximum I/O payload size.
        iounit: u32,
    },
    /// Response to `Tread` containing the payload bytes.
    Read {
        /// Data read from the fid.
        data: Vec<u8>,
    },
    /// Response to `Twrite` containing the delivered count.
    Write {
        /// Number of bytes delivered.
        count: u32,
    },
    /// Response to `Tclunk` acknowledging the release.
    Clunk,
    /// Response to `Tremove` acknowledging the removal.
    Remove,
    /// Response to `Tstat` carrying serialized metadata; opaque to the session.
    Stat {
        /// Serialized metadata for the engine to frame.
        stat: Vec<u8>,
    },
    /// Response to `Twstat` acknowledging the update.
    Wstat,
    /// Error response carrying a code and message.
    Error {
        /// Error code propagated to the client.
        code: ErrorCode,
        /// Human-readable message describing the failure.
        message: String,
    },
}
