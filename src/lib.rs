// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! chan-door serves an in-memory namespace of named rendezvous channels
//! through a 9P-style file protocol. Each leaf in the tree is a zero-buffer
//! synchronous channel: a write parks its caller until a reader on the same
//! leaf picks the message up, which lets two remote clients bridge data
//! through the namespace without intermediate storage.
//!
//! Wire encoding and transport belong to an external protocol engine; this
//! crate owns the decoded side of the seam. The engine hands a [`Session`]
//! structured [`proto::Request`] values and forwards the [`proto::Response`]
//! it gets back, one response per request.
//!
//! # Public Surface
//! * [`Handler`] / [`Stream`] – capability contract for namespace nodes.
//! * [`ChanHandler`] – rendezvous leaf.
//! * [`GatewayHandler`] – flat dynamic directory.
//! * [`QidAllocator`] – shared monotonic qid source.
//! * [`Session`] – per-connection fid table and request dispatch.

use std::sync::{Mutex, MutexGuard};

use thiserror::Error;

mod chan;
mod gateway;
mod handler;
pub mod proto;
mod qid;
mod session;

pub use chan::ChanHandler;
pub use gateway::GatewayHandler;
pub use handler::{Handler, Stream};
pub use qid::QidAllocator;
pub use session::Session;

/// Failures surfaced by namespace handlers and session dispatch.
///
/// Handler-level failures are never retried; the session maps each one 1:1
/// onto a [`proto::ErrorCode`] in the error response. No failure closes the
/// session or the process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FsError {
    /// The node is a directory and cannot be opened as a byte stream.
    #[error("is a directory")]
    IsADirectory,
    /// The node is a leaf and does not support directory operations.
    #[error("not a directory")]
    NotADirectory,
    /// No entry with the given name exists.
    #[error("{0}: no such file or directory")]
    NoSuchEntry(String),
    /// An entry with the given name already exists.
    #[error("{0}: already exists")]
    AlreadyExists(String),
    /// The operation is forbidden.
    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),
    /// Create was invoked with a path that is not exactly one name deep.
    #[error("can only create files at depth=1")]
    InvalidDepth,
    /// Rendezvous channels have no offset state.
    #[error("can't seek")]
    NotSeekable,
    /// The rendezvous channel has been closed.
    #[error("i/o error: channel closed")]
    Io,
    /// The fid is not bound in this session.
    #[error("unknown fid {0}")]
    NoSuchFid(u32),
    /// The fid has not been opened for I/O.
    #[error("fid {0} not open for i/o")]
    NotOpen(u32),
    /// The request kind is an open design item and is not wired up.
    #[error("{0} not implemented")]
    NotImplemented(&'static str),
}

// A poisoned lock only means another thread panicked mid-request; the guarded
// maps stay structurally valid, so recover the guard instead of propagating.
pub(crate) fn lock_unpoisoned<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
