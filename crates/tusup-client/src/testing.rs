//! In-memory transport and store for engine and session tests

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use tusup_store::Store;

use crate::protocol::{Metadata, ProtocolError, RemoteStatus, Transport};

/// Shared log of transport and store calls, in the order they happened.
pub type Events = Arc<Mutex<Vec<String>>>;

type PatchHook = Box<dyn Fn(u64, usize, u64) -> Result<u64, ProtocolError>>;
type StatusHook = Box<dyn Fn(&str) -> Result<RemoteStatus, ProtocolError>>;

/// A tus server in a HashMap. Each upload tracks its offset and rejects
/// PATCHes at any other offset with 409.
pub struct FakeServer {
    pub events: Events,
    uploads: Mutex<HashMap<String, (u64, u64)>>,
    next_id: Mutex<u32>,
    patch_hook: Option<PatchHook>,
    status_hook: Option<StatusHook>,
    /// Fail the nth PATCH (0-based) with no response
    pub fail_patch: Option<usize>,
    patches: Mutex<usize>,
}

impl FakeServer {
    pub fn new(events: Events) -> Self {
        Self {
            events,
            uploads: Mutex::new(HashMap::new()),
            next_id: Mutex::new(0),
            patch_hook: None,
            status_hook: None,
            fail_patch: None,
            patches: Mutex::new(0),
        }
    }

    /// Register an existing upload with `offset` of `length` bytes stored.
    pub fn with_upload(self, location: &str, offset: u64, length: u64) -> Self {
        self.uploads
            .lock()
            .unwrap()
            .insert(location.to_string(), (offset, length));
        self
    }

    /// Replace the ack logic: `(sent_offset, chunk_len, total) -> ack`.
    pub fn on_patch(
        mut self,
        hook: impl Fn(u64, usize, u64) -> Result<u64, ProtocolError> + 'static,
    ) -> Self {
        self.patch_hook = Some(Box::new(hook));
        self
    }

    pub fn on_status(
        mut self,
        hook: impl Fn(&str) -> Result<RemoteStatus, ProtocolError> + 'static,
    ) -> Self {
        self.status_hook = Some(Box::new(hook));
        self
    }

    pub fn offset_of(&self, location: &str) -> Option<u64> {
        self.uploads.lock().unwrap().get(location).map(|u| u.0)
    }

    fn log(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Transport for FakeServer {
    fn create(&self, url: &str, total_size: u64, _: &Metadata) -> Result<String, ProtocolError> {
        let mut id = self.next_id.lock().unwrap();
        *id += 1;
        let location = format!("{url}/new{id}");
        self.log(format!("create {total_size}"));
        self.uploads
            .lock()
            .unwrap()
            .insert(location.clone(), (0, total_size));
        Ok(location)
    }

    fn status(&self, location: &str) -> Result<RemoteStatus, ProtocolError> {
        self.log(format!("head {location}"));
        if let Some(hook) = &self.status_hook {
            return hook(location);
        }
        match self.uploads.lock().unwrap().get(location) {
            Some(&(offset, length)) => Ok(RemoteStatus {
                offset,
                length: Some(length),
            }),
            None => Err(ProtocolError::NotFound { status: 404 }),
        }
    }

    fn patch(&self, location: &str, offset: u64, chunk: &[u8]) -> Result<u64, ProtocolError> {
        self.log(format!("patch {offset} {}", chunk.len()));
        let n = {
            let mut patches = self.patches.lock().unwrap();
            *patches += 1;
            *patches - 1
        };
        if self.fail_patch == Some(n) {
            return Err(ProtocolError::Http {
                status: None,
                message: "connection reset".into(),
            });
        }
        let mut uploads = self.uploads.lock().unwrap();
        let upload = uploads
            .get_mut(location)
            .ok_or(ProtocolError::NotFound { status: 404 })?;
        if upload.0 != offset {
            return Err(ProtocolError::OffsetMismatch);
        }
        let acked = match &self.patch_hook {
            Some(hook) => hook(offset, chunk.len(), upload.1)?,
            None => offset + chunk.len() as u64,
        };
        upload.0 = acked;
        Ok(acked)
    }
}

/// Map-backed store that logs writes into the shared event list.
pub struct MemStore {
    pub events: Events,
    map: Mutex<BTreeMap<String, String>>,
    pub fail_set: bool,
}

impl MemStore {
    pub fn new(events: Events) -> Self {
        Self {
            events,
            map: Mutex::new(BTreeMap::new()),
            fail_set: false,
        }
    }

    pub fn with_entry(self, fp: &str, url: &str) -> Self {
        self.map
            .lock()
            .unwrap()
            .insert(fp.to_string(), url.to_string());
        self
    }
}

impl Store for MemStore {
    fn get(&self, fingerprint: &str) -> Option<String> {
        self.map.lock().unwrap().get(fingerprint).cloned()
    }

    fn set(&self, fingerprint: &str, url: &str) -> Result<()> {
        if self.fail_set {
            bail!("read-only store");
        }
        self.events.lock().unwrap().push(format!("set {fingerprint}"));
        self.map
            .lock()
            .unwrap()
            .insert(fingerprint.to_string(), url.to_string());
        Ok(())
    }

    fn delete(&self, fingerprint: &str) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("delete {fingerprint}"));
        self.map.lock().unwrap().remove(fingerprint);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .map
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

pub fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn taken(events: &Events) -> Vec<String> {
    std::mem::take(&mut *events.lock().unwrap())
}
