// Author: Lukas Bower
// Purpose: Track per-connection fids and dispatch decoded protocol requests onto handlers.

//! Session layer: fid table and request dispatch.
//!
//! The protocol engine decodes one frame at a time per connection and hands
//! the session the structured request; the session resolves the fid, performs
//! the handler operation, and returns exactly one structured response. Fids
//! are private to their session; only the root handler and the qid allocator
//! are shared across sessions.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::handler::{Handler, Stream};
use crate::proto::{
    ErrorCode, OpenMode, OpenModeBase, QidType, Request, RequestBody, Response, ResponseBody,
    IOUNIT,
};
use crate::qid::QidAllocator;
use crate::FsError;

/// Stream state attached to a fid by open or create.
enum OpenStream {
    /// Leaf opened for reading.
    ReadOnly(Arc<dyn Stream>),
    /// Leaf opened for writing.
    WriteOnly(Arc<dyn Stream>),
    /// Leaf opened for both directions.
    ReadWrite(Arc<dyn Stream>),
    /// Directory listing snapshot, one name per line, taken at open time.
    Directory(Vec<u8>),
}

/// Per-fid state: the bound handler plus any opened stream.
struct FileEntry {
    handler: Arc<dyn Handler>,
    open: Option<OpenStream>,
}

impl FileEntry {
    fn unopened(handler: Arc<dyn Handler>) -> Self {
        Self {
            handler,
            open: None,
        }
    }
}

/// One client connection's view of fids bound into the namespace.
pub struct Session {
    root: Arc<dyn Handler>,
    qids: Arc<QidAllocator>,
    fids: HashMap<u32, FileEntry>,
}

impl Session {
    /// Create a session rooted at `root`, drawing qids from the shared
    /// allocator.
    pub fn new(root: Arc<dyn Handler>, qids: Arc<QidAllocator>) -> Self {
        Self {
            root,
            qids,
            fids: HashMap::new(),
        }
    }

    /// Handle one decoded request, producing exactly one response before
    /// returning. A failed request surfaces as an error response and leaves
    /// the session serviceable.
    pub fn handle(&mut self, request: Request) -> Response {
        let body = match self.dispatch(&request.body) {
            Ok(body) => body,
            Err(err) => ResponseBody::Error {
                code: ErrorCode::from(&err),
                message: err.to_string(),
            },
        };
        Response {
            tag: request.tag,
            body,
        }
    }

    fn dispatch(&mut self, body: &RequestBody) -> Result<ResponseBody, FsError> {
        match body {
            RequestBody::Attach { fid, uname, aname } => self.attach(*fid, uname, aname),
            RequestBody::Flush { oldtag } => Ok(self.flush(*oldtag)),
            RequestBody::Walk {
                fid,
                newfid,
                wnames,
            } => self.walk(*fid, *newfid, wnames),
            RequestBody::Open { fid, mode } => self.open(*fid, *mode),
            RequestBody::Create {
                fid,
                name,
                directory,
                mode,
            } => self.create(*fid, name, *directory, *mode),
            RequestBody::Read { fid, offset, count } => self.read(*fid, *offset, *count),
            RequestBody::Write { fid, offset, data } => self.write(*fid, *offset, data),
            RequestBody::Clunk { fid } => Ok(self.clunk(*fid)),
            RequestBody::Remove { fid } => {
                debug!("remove fid={fid}");
                Err(FsError::NotImplemented("remove"))
            }
            RequestBody::Stat { fid } => {
                debug!("stat fid={fid}");
                Err(FsError::NotImplemented("stat"))
            }
            RequestBody::Wstat { fid, .. } => {
                debug!("wstat fid={fid}");
                Err(FsError::NotImplemented("wstat"))
            }
        }
    }

    fn attach(&mut self, fid: u32, uname: &str, aname: &str) -> Result<ResponseBody, FsError> {
        debug!("attach fid={fid} uname={uname} aname={aname}");
        self.fids
            .insert(fid, FileEntry::unopened(self.root.clone()));
        let qid = self.qids.issue(QidType::DIRECTORY);
        Ok(ResponseBody::Attach { qid })
    }

    fn flush(&mut self, oldtag: u16) -> ResponseBody {
        debug!("flush oldtag={oldtag}");
        // Dispatch is synchronous, so nothing can be in flight to cancel;
        // answering success keeps flush harmless.
        ResponseBody::Flush
    }

    fn walk(&mut self, fid: u32, newfid: u32, wnames: &[String]) -> Result<ResponseBody, FsError> {
        debug!("walk fid={fid} newfid={newfid} wnames={wnames:?}");
        let entry = self.fids.get(&fid).ok_or(FsError::NoSuchFid(fid))?;
        let target = entry.handler.walk(wnames)?;
        // One qid per call, naming the terminal node; multi-hop walks never
        // succeed, so intermediate qids cannot arise. On failure newfid is
        // left unbound.
        let ty = if target.is_dir() {
            QidType::DIRECTORY
        } else {
            QidType::FILE
        };
        let qid = self.qids.issue(ty);
        self.fids.insert(newfid, FileEntry::unopened(target));
        Ok(ResponseBody::Walk { qids: vec![qid] })
    }

    fn open(&mut self, fid: u32, mode: OpenMode) -> Result<ResponseBody, FsError> {
        debug!("open fid={fid} mode={:#04x}", mode.raw());
        let entry = self.fids.get_mut(&fid).ok_or(FsError::NoSuchFid(fid))?;
        if entry.handler.is_dir() {
            if mode.allows_write() {
                return Err(FsError::IsADirectory);
            }
            entry.open = Some(OpenStream::Directory(serialize_listing(
                entry.handler.as_ref(),
            )?));
        } else {
            entry.open = Some(open_stream(entry.handler.as_ref(), mode)?);
        }
        // Quirk kept from the original server: the qid type byte mirrors the
        // raw requested mode bits instead of the node kind.
        let qid = self.qids.issue(QidType::from_raw(mode.raw()));
        Ok(ResponseBody::Open { qid, iounit: IOUNIT })
    }

    fn create(
        &mut self,
        fid: u32,
        name: &str,
        directory: bool,
        mode: OpenMode,
    ) -> Result<ResponseBody, FsError> {
        debug!("create fid={fid} name={name} directory={directory}");
        let entry = self.fids.get(&fid).ok_or(FsError::NoSuchFid(fid))?;
        let created = entry.handler.create(directory, &[name.to_owned()])?;
        // Create binds the fid to the new leaf and opens it in one step.
        let open = open_stream(created.as_ref(), mode)?;
        self.fids.insert(
            fid,
            FileEntry {
                handler: created,
                open: Some(open),
            },
        );
        let qid = self.qids.issue(QidType::from_raw(mode.raw()));
        Ok(ResponseBody::Create { qid, iounit: IOUNIT })
    }

    fn read(&mut self, fid: u32, offset: u64, count: u32) -> Result<ResponseBody, FsError> {
        debug!("read fid={fid} offset={offset} count={count}");
        let entry = self.fids.get(&fid).ok_or(FsError::NoSuchFid(fid))?;
        let open = entry.open.as_ref().ok_or(FsError::NotOpen(fid))?;
        let data = match open {
            OpenStream::Directory(listing) => {
                let start = usize::try_from(offset)
                    .unwrap_or(usize::MAX)
                    .min(listing.len());
                let end = start.saturating_add(count as usize).min(listing.len());
                listing[start..end].to_vec()
            }
            OpenStream::ReadOnly(stream) | OpenStream::ReadWrite(stream) => {
                // Rendezvous leaves have no offset; the read blocks until a
                // writer delivers or the channel closes.
                let mut buf = vec![0u8; count.min(IOUNIT) as usize];
                let n = stream.read(&mut buf)?;
                buf.truncate(n);
                buf
            }
            OpenStream::WriteOnly(_) => {
                return Err(FsError::PermissionDenied("fid not open for reading"))
            }
        };
        Ok(ResponseBody::Read { data })
    }

    fn write(&mut self, fid: u32, offset: u64, data: &[u8]) -> Result<ResponseBody, FsError> {
        debug!("write fid={fid} offset={offset} len={}", data.len());
        let entry = self.fids.get(&fid).ok_or(FsError::NoSuchFid(fid))?;
        let open = entry.open.as_ref().ok_or(FsError::NotOpen(fid))?;
        let count = match open {
            OpenStream::Directory(_) => return Err(FsError::IsADirectory),
            OpenStream::WriteOnly(stream) | OpenStream::ReadWrite(stream) => {
                // Offset is ignored: the leaf is a rendezvous, not a file.
                stream.write(data)? as u32
            }
            OpenStream::ReadOnly(_) => {
                return Err(FsError::PermissionDenied("fid not open for writing"))
            }
        };
        Ok(ResponseBody::Write { count })
    }

    fn clunk(&mut self, fid: u32) -> ResponseBody {
        debug!("clunk fid={fid}");
        // Dropping the entry releases the stream handle; the channel itself
        // stays owned by the namespace. Clunking an unknown fid still
        // succeeds.
        self.fids.remove(&fid);
        ResponseBody::Clunk
    }
}

fn open_stream(handler: &dyn Handler, mode: OpenMode) -> Result<OpenStream, FsError> {
    Ok(match mode.base() {
        OpenModeBase::ReadOnly | OpenModeBase::Execute => OpenStream::ReadOnly(handler.open_ro()?),
        OpenModeBase::WriteOnly => OpenStream::WriteOnly(handler.open_wo()?),
        OpenModeBase::ReadWrite => OpenStream::ReadWrite(handler.open_rw()?),
    })
}

// Directory contents are served as a plain sorted name listing; the binary
// directory-entry layout belongs to the engine and is out of scope here.
fn serialize_listing(handler: &dyn Handler) -> Result<Vec<u8>, FsError> {
    let mut names = handler.list_dir()?;
    names.sort();
    let mut listing = names.join("\n").into_bytes();
    if !listing.is_empty() {
        listing.push(b'\n');
    }
    Ok(listing)
}
