use crate::clock::{Clock, SystemClock};
use crate::session::{SessionId, SessionPolicy, SessionRecord};
use crate::session_store::{is_valid_user_id, NewSession};
use crate::token::redact;
use crate::{Result, SessionStore};
use async_trait::async_trait;
use log::{debug, trace, warn};
use parking_lot::{const_mutex, Mutex};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tempfile::NamedTempFile;

/// A durable collection of session records.
///
/// Implementations are expected to be quick and local, e.g. a file or a table in an embedded
/// database. [`PersistedStore`] serializes all access to the collection through one value.
pub trait SessionRecords: Debug + Send + Sync {
    /// Load all records of the collection.
    fn load(&self) -> Result<Vec<SessionRecord>>;

    /// Replace the collection with `records`.
    fn save(&self, records: &[SessionRecord]) -> Result;

    /// Load the collection, apply `update` and save the collection again.
    ///
    /// The default implementation does not lock anything. If the underlying collection can be
    /// reached through several values, e.g. a file opened by several stores, implementations must
    /// make the whole sequence atomic across all of them.
    fn update<T>(&self, update: impl FnOnce(&mut Vec<SessionRecord>) -> T) -> Result<T>
    where
        Self: Sized,
    {
        let mut records = self.load()?;
        let result = update(&mut records);
        self.save(&records)?;
        Ok(result)
    }
}

/// Locks of the session files opened by this process, keyed by absolute path.
static FILE_LOCKS: Mutex<BTreeMap<PathBuf, Weak<Mutex<()>>>> = const_mutex(BTreeMap::new());

/// Return the lock shared by all [`JsonFileRecords`] of this process that use the file at `path`.
fn file_lock(path: &Path) -> Arc<Mutex<()>> {
    let key = match (fs::canonicalize(parent_directory(path)), path.file_name()) {
        (Ok(directory), Some(file_name)) => directory.join(file_name),
        _ => path.to_path_buf(),
    };

    let mut locks = FILE_LOCKS.lock();
    locks.retain(|_, lock| lock.strong_count() > 0);
    if let Some(lock) = locks.get(&key).and_then(Weak::upgrade) {
        return lock;
    }
    let lock = Arc::new(Mutex::new(()));
    locks.insert(key, Arc::downgrade(&lock));
    lock
}

fn parent_directory(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Session records stored as a JSON array in a file.
///
/// A missing file is treated as an empty collection.
/// The file is replaced atomically on save by writing a uniquely named sibling file and renaming it.
///
/// Updates are serialized across all values of this type in the process that refer to the same
/// file, such that several stores may share one file. Other processes writing the same file are
/// not coordinated with. The file is identified when the value is created, so its directory
/// should exist by then.
#[derive(Debug, Clone)]
pub struct JsonFileRecords {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl JsonFileRecords {
    /// Store records in the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock = file_lock(&path);
        Self { path, lock }
    }

    /// The path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionRecords for JsonFileRecords {
    fn load(&self) -> Result<Vec<SessionRecord>> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(error) => Err(error.into()),
        }
    }

    fn save(&self, records: &[SessionRecord]) -> Result {
        let mut temporary = NamedTempFile::new_in(parent_directory(&self.path))?;
        serde_json::to_writer(&mut temporary, records)?;
        temporary
            .persist(&self.path)
            .map_err(|error| error.error)?;
        Ok(())
    }

    fn update<T>(&self, update: impl FnOnce(&mut Vec<SessionRecord>) -> T) -> Result<T> {
        let _guard = self.lock.lock();
        let mut records = self.load()?;
        let result = update(&mut records);
        self.save(&records)?;
        Ok(result)
    }
}

/// A session store layer that writes all sessions through to a durable collection.
///
/// Every create and destroy is written through to the collection, and every lookup reloads the
/// collection before searching it, so sessions survive a restart of the process.
/// Lookups check the age of the persisted record against this layer's own policy, independently
/// of any expiry enforced by the wrapped store.
///
/// Durability is best-effort: if the process crashes after the wrapped store created a session,
/// but before the collection was written, the session is lost and the client has to log in again.
#[derive(Debug)]
pub struct PersistedStore<Inner, Records> {
    inner: Inner,
    records: Mutex<Records>,
    policy: SessionPolicy,
    clock: Arc<dyn Clock>,
}

impl<Inner: SessionStore, Records: SessionRecords> PersistedStore<Inner, Records> {
    /// Wrap `inner`, persisting sessions to `records` and expiring them according to `policy` and the system clock.
    pub fn new(inner: Inner, records: Records, policy: SessionPolicy) -> Self {
        Self::new_with_clock(inner, records, policy, Arc::new(SystemClock))
    }

    /// Wrap `inner`, persisting sessions to `records` and expiring them according to `policy` and the given clock.
    pub fn new_with_clock(
        inner: Inner,
        records: Records,
        policy: SessionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner,
            records: Mutex::new(records),
            policy,
            clock,
        }
    }

    /// A reference to the wrapped store.
    pub fn inner(&self) -> &Inner {
        &self.inner
    }

    fn write_through<T>(&self, update: impl FnOnce(&mut Vec<SessionRecord>) -> T) -> Result<T> {
        self.records.lock().update(update)
    }

    fn find(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        let records = self.records.lock().load()?;
        Ok(records.into_iter().find(|record| &record.session_id == id))
    }

    fn remove(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        self.write_through(|all| {
            let position = all.iter().position(|record| &record.session_id == id)?;
            Some(all.remove(position))
        })
    }

    fn is_expired(&self, record: &SessionRecord) -> bool {
        record.is_expired(self.clock.now(), self.policy)
    }
}

#[async_trait]
impl<Inner: SessionStore, Records: SessionRecords> SessionStore for PersistedStore<Inner, Records> {
    async fn create_session(&self, user_id: &str) -> Result<Option<NewSession>> {
        if !is_valid_user_id(user_id) {
            return Ok(None);
        }
        let Some(session) = self.inner.create_session(user_id).await? else {
            return Ok(None);
        };

        let persisted = self.write_through(|all| all.push(session.record.clone()));
        if let Err(error) = persisted {
            warn!("Failed to persist session {}: {error}", redact(&session.token));
            self.inner.take(&session.token).await?;
            return Err(error);
        }

        trace!("Persisted session {}", redact(&session.token));
        Ok(Some(session))
    }

    async fn record(&self, token: &str) -> Result<Option<SessionRecord>> {
        let id = SessionId::from_token(token);
        let Some(record) = self.find(&id)? else {
            return Ok(None);
        };

        if self.is_expired(&record) {
            debug!("Persisted session {} expired", redact(token));
            self.remove(&id)?;
            self.inner.take(token).await?;
            return Ok(None);
        }

        Ok(Some(record))
    }

    async fn take(&self, token: &str) -> Result<Option<SessionRecord>> {
        let removed = self.remove(&SessionId::from_token(token))?;
        self.inner.take(token).await?;
        Ok(removed.filter(|record| !self.is_expired(record)))
    }

    async fn retain(
        &self,
        keep: &(dyn for<'r> Fn(&'r SessionRecord) -> bool + Send + Sync),
    ) -> Result<usize> {
        self.inner.retain(keep).await?;
        self.write_through(|all| {
            let initial_len = all.len();
            all.retain(|record| keep(record));
            initial_len - all.len()
        })
    }
}
