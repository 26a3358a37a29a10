// Author: Lukas Bower
// Purpose: Implement the rendezvous-channel leaf node backing chan-door endpoints.

//! Rendezvous leaf node.
//!
//! A [`ChanHandler`] carries exactly one message at a time between a writer
//! and a reader. There is no internal buffering: blocking is the
//! backpressure mechanism, exactly like an unbuffered channel.

use std::sync::{Arc, Mutex};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::handler::{Handler, Stream};
use crate::{lock_unpoisoned, FsError};

/// Leaf node whose contents travel through a zero-capacity rendezvous slot.
///
/// Clones share the same slot, so a handle returned by an identity walk or
/// an open pairs up with every other handle to the same leaf. Closing the
/// slot fails pending and future reads and writes with [`FsError::Io`].
#[derive(Clone)]
pub struct ChanHandler {
    tx: Arc<Mutex<Option<Sender<Vec<u8>>>>>,
    rx: Arc<Mutex<Option<Receiver<Vec<u8>>>>>,
}

impl ChanHandler {
    /// Create a leaf with a fresh rendezvous slot.
    #[must_use]
    pub fn new() -> Self {
        // Capacity zero: a send completes only when paired with a receive.
        let (tx, rx) = bounded(0);
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
            rx: Arc::new(Mutex::new(Some(rx))),
        }
    }

    /// Close the slot. Blocked peers wake with [`FsError::Io`], as do all
    /// later reads and writes.
    pub fn close(&self) {
        lock_unpoisoned(&self.tx).take();
        lock_unpoisoned(&self.rx).take();
    }

    // The channel ends are cloned out of the guard so that a blocked
    // rendezvous never holds the lock; close() stays reachable while a read
    // or write is parked.
    fn sender(&self) -> Result<Sender<Vec<u8>>, FsError> {
        lock_unpoisoned(&self.tx).as_ref().cloned().ok_or(FsError::Io)
    }

    fn receiver(&self) -> Result<Receiver<Vec<u8>>, FsError> {
        lock_unpoisoned(&self.rx).as_ref().cloned().ok_or(FsError::Io)
    }
}

impl Default for ChanHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for ChanHandler {
    fn read(&self, buf: &mut [u8]) -> Result<usize, FsError> {
        let rx = self.receiver()?;
        let msg = rx.recv().map_err(|_| FsError::Io)?;
        let n = msg.len().min(buf.len());
        buf[..n].copy_from_slice(&msg[..n]);
        // Bytes beyond the reader's buffer are dropped, not carried over.
        Ok(n)
    }

    fn write(&self, data: &[u8]) -> Result<usize, FsError> {
        let tx = self.sender()?;
        tx.send(data.to_vec()).map_err(|_| FsError::Io)?;
        // Delivery, not receiver capacity, determines the reported count.
        Ok(data.len())
    }

    fn seek(&self, _offset: u64) -> Result<u64, FsError> {
        Err(FsError::NotSeekable)
    }
}

impl Handler for ChanHandler {
    fn open_rw(&self) -> Result<Arc<dyn Stream>, FsError> {
        Ok(Arc::new(self.clone()))
    }

    fn open_ro(&self) -> Result<Arc<dyn Stream>, FsError> {
        Ok(Arc::new(self.clone()))
    }

    fn open_wo(&self) -> Result<Arc<dyn Stream>, FsError> {
        Ok(Arc::new(self.clone()))
    }

    fn is_dir(&self) -> bool {
        false
    }

    fn list_dir(&self) -> Result<Vec<String>, FsError> {
        Err(FsError::NotADirectory)
    }

    fn walk(&self, parts: &[String]) -> Result<Arc<dyn Handler>, FsError> {
        if parts.is_empty() {
            return Ok(Arc::new(self.clone()));
        }
        Err(FsError::NotADirectory)
    }

    fn create(&self, _dir: bool, _parts: &[String]) -> Result<Arc<dyn Handler>, FsError> {
        Err(FsError::NotADirectory)
    }
}
