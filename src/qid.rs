// Author: Lukas Bower
// Purpose: Provide the shared monotonic qid source used by every session.

//! Qid allocation.

use std::sync::atomic::{AtomicU64, Ordering};

use log::trace;

use crate::proto::{Qid, QidType};

/// Monotonic qid source shared by every session.
///
/// Each successful attach, walk, or open consumes one fresh path value even
/// when the same node is revisited; uniqueness is per issuance, not per node
/// identity. Allocation never fails and the 64-bit counter never wraps in
/// practice.
#[derive(Debug, Default)]
pub struct QidAllocator {
    next: AtomicU64,
}

impl QidAllocator {
    /// Create an allocator starting at path zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next qid with the supplied type tag.
    pub fn issue(&self, ty: QidType) -> Qid {
        let path = self.next.fetch_add(1, Ordering::SeqCst);
        trace!("allocated qid={path}");
        Qid::new(ty, 0, path)
    }
}
