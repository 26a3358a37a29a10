// Author: Lukas Bower
// Purpose: Implement the dynamic flat directory that roots the chan-door namespace.

//! Dynamic directory node.
//!
//! The gateway is a flat, growable mapping from name to rendezvous leaf.
//! Entries are added by create and never removed; removal is an open design
//! item. Only depth-1 namespaces exist, so deeper walks must fail.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::chan::ChanHandler;
use crate::handler::{Handler, Stream};
use crate::{lock_unpoisoned, FsError};

/// Directory node mapping names to [`ChanHandler`] leaves.
///
/// Clones share the same map, so the gateway can root any number of
/// concurrent sessions. The map is only reachable through the guarded
/// handler operations.
#[derive(Clone, Default)]
pub struct GatewayHandler {
    children: Arc<Mutex<HashMap<String, Arc<ChanHandler>>>>,
}

impl GatewayHandler {
    /// Create an empty gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Handler for GatewayHandler {
    fn open_rw(&self) -> Result<Arc<dyn Stream>, FsError> {
        Err(FsError::IsADirectory)
    }

    fn open_ro(&self) -> Result<Arc<dyn Stream>, FsError> {
        Err(FsError::IsADirectory)
    }

    fn open_wo(&self) -> Result<Arc<dyn Stream>, FsError> {
        Err(FsError::IsADirectory)
    }

    fn is_dir(&self) -> bool {
        true
    }

    fn list_dir(&self) -> Result<Vec<String>, FsError> {
        let children = lock_unpoisoned(&self.children);
        Ok(children.keys().cloned().collect())
    }

    fn walk(&self, parts: &[String]) -> Result<Arc<dyn Handler>, FsError> {
        match parts {
            [] => Ok(Arc::new(self.clone())),
            [name] => {
                let children = lock_unpoisoned(&self.children);
                children
                    .get(name)
                    .map(|child| child.clone() as Arc<dyn Handler>)
                    .ok_or_else(|| FsError::NoSuchEntry(name.clone()))
            }
            // The namespace is flat; multi-hop walks fail rather than
            // silently resolving.
            _ => Err(FsError::NoSuchEntry(parts.join("/"))),
        }
    }

    fn create(&self, dir: bool, parts: &[String]) -> Result<Arc<dyn Handler>, FsError> {
        let [name] = parts else {
            return Err(FsError::InvalidDepth);
        };
        if dir {
            warn!("refused directory create under gateway: {name}");
            return Err(FsError::PermissionDenied("can't create a directory"));
        }
        let mut children = lock_unpoisoned(&self.children);
        if children.contains_key(name) {
            return Err(FsError::AlreadyExists(name.clone()));
        }
        let chan = Arc::new(ChanHandler::new());
        children.insert(name.clone(), chan.clone());
        debug!("created channel {name}");
        Ok(chan)
    }
}
