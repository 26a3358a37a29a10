// Author: Lukas Bower
// Purpose: Define the polymorphic node contract shared by namespace leaves and directories.

//! Capability contract for chan-door namespace nodes.
//!
//! Exactly two node shapes exist: the rendezvous leaf
//! ([`ChanHandler`](crate::ChanHandler)) and the flat directory
//! ([`GatewayHandler`](crate::GatewayHandler)). The trait is the whole
//! hierarchy; no deeper class structure is intended.

use std::sync::Arc;

use crate::FsError;

/// An opened byte endpoint bound to a namespace node.
pub trait Stream: Send + Sync {
    /// Read the next message into `buf`, blocking until a writer delivers
    /// one or the endpoint is closed. Returns the number of bytes copied;
    /// bytes beyond the buffer are dropped.
    fn read(&self, buf: &mut [u8]) -> Result<usize, FsError>;

    /// Deliver `data` as one message, blocking until a reader receives it.
    /// Returns the full payload length once delivered.
    fn write(&self, data: &[u8]) -> Result<usize, FsError>;

    /// Reposition the endpoint. Rendezvous endpoints always fail with
    /// [`FsError::NotSeekable`].
    fn seek(&self, offset: u64) -> Result<u64, FsError>;
}

/// Capability set implemented by every namespace node.
pub trait Handler: Send + Sync {
    /// Open the node for reading and writing.
    fn open_rw(&self) -> Result<Arc<dyn Stream>, FsError>;

    /// Open the node for reading.
    fn open_ro(&self) -> Result<Arc<dyn Stream>, FsError>;

    /// Open the node for writing.
    fn open_wo(&self) -> Result<Arc<dyn Stream>, FsError>;

    /// Whether the node is a directory. Side-effect free.
    fn is_dir(&self) -> bool;

    /// List child names. Order is not significant.
    fn list_dir(&self) -> Result<Vec<String>, FsError>;

    /// Resolve a relative path from this node. Zero components is the
    /// identity walk; one component on a directory looks up a child; deeper
    /// walks are unsupported and fail rather than silently succeeding.
    fn walk(&self, parts: &[String]) -> Result<Arc<dyn Handler>, FsError>;

    /// Create a new child. Only valid on a directory with exactly one path
    /// component and `dir == false`.
    fn create(&self, dir: bool, parts: &[String]) -> Result<Arc<dyn Handler>, FsError>;
}
