//! Near-real-time view of the node's append-only `debug.log`.
//!
//! Consumers always receive the full current text.  Internally the reader
//! keeps a byte offset and only reads what was appended since the last tick;
//! it starts over from byte 0 whenever the file went missing, shrank, was
//! swapped for a different file, or no longer holds the bytes last read just
//! before the offset.

use std::{
    io::SeekFrom,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant, SystemTime},
};

use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncSeekExt},
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::error::{PollerError, TailError};

/// Shown until the file has been read once.
pub const PLACEHOLDER: &str = "Loading HDDcoin Logs...";

/// Bytes kept from just before the read offset to confirm the file still
/// starts with what was already shown.
const ANCHOR_LEN: usize = 64;

// ── LogSnapshot ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct LogSnapshot {
    pub path:         PathBuf,
    pub contents:     String,
    /// Bumped every time `contents` changes.
    pub revision:     u64,
    pub last_read_at: Option<Instant>,
}

/// How a new snapshot relates to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentChange {
    Unchanged,
    /// Strict extension of the old text.
    Appended,
    Replaced,
}

impl LogSnapshot {
    pub fn placeholder(path: impl Into<PathBuf>) -> Self {
        Self {
            path:         path.into(),
            contents:     PLACEHOLDER.to_owned(),
            revision:     0,
            last_read_at: None,
        }
    }

    pub fn change_from(&self, old: &LogSnapshot) -> ContentChange {
        if self.revision == old.revision || self.contents == old.contents {
            ContentChange::Unchanged
        } else if self.contents.len() > old.contents.len()
            && self.contents.starts_with(old.contents.as_str())
        {
            ContentChange::Appended
        } else {
            ContentChange::Replaced
        }
    }
}

// ── LogReader ────────────────────────────────────────────────────────────────

/// Incremental reader behind `LogTailer`.  Owns the snapshot it refreshes.
#[derive(Debug)]
pub struct LogReader {
    snapshot: LogSnapshot,
    /// File bytes already folded into `contents` (plus `pending`).
    offset:   u64,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending:  Vec<u8>,
    /// Last raw bytes before `offset`.
    anchor:   Vec<u8>,
    identity: Option<FileId>,
    modified: Option<SystemTime>,
    /// `contents` reflects the file rather than the placeholder or a
    /// snapshot carried over from a previous run.
    synced:   bool,
}

impl LogReader {
    #[cfg(test)]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::resume(LogSnapshot::placeholder(path))
    }

    /// Continue from an earlier snapshot; the next read is a full reload but
    /// the old text stays visible until it succeeds.
    pub fn resume(snapshot: LogSnapshot) -> Self {
        Self {
            snapshot,
            offset:   0,
            pending:  Vec::new(),
            anchor:   Vec::new(),
            identity: None,
            modified: None,
            synced:   false,
        }
    }

    /// Re-observe the file.
    ///
    /// An absent file or a read error leaves the previous contents in place.
    pub async fn read_snapshot(&mut self) -> &LogSnapshot {
        match self.refresh().await {
            Ok(true) => {
                self.snapshot.revision += 1;
                debug!(
                    revision = self.snapshot.revision,
                    bytes = self.offset,
                    "log snapshot updated"
                );
            }
            Ok(false) => {}
            Err(e) => warn!("log read failed, keeping previous snapshot: {e}"),
        }
        &self.snapshot
    }

    /// Returns whether `contents` changed.
    async fn refresh(&mut self) -> Result<bool, TailError> {
        let path = self.snapshot.path.clone();
        let read_err = |source: std::io::Error| TailError::Read { path: path.clone(), source };

        let meta = match fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if self.synced {
                    debug!(path = %path.display(), "log file missing, next read reloads");
                }
                self.synced = false;
                self.pending.clear();
                return Ok(false);
            }
            Err(e) => return Err(read_err(e)),
        };
        if !meta.is_file() {
            return Err(read_err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "not a regular file",
            )));
        }

        let len = meta.len();
        let identity = file_identity(&meta);
        let modified = meta.modified().ok();
        let swapped = self.synced && identity != self.identity;
        if self.synced && !swapped && len == self.offset && modified == self.modified {
            self.snapshot.last_read_at = Some(Instant::now());
            return Ok(false);
        }

        let shrank = self.synced && len < self.offset;
        let mut reload = !self.synced || shrank || swapped;

        let mut file = File::open(&path).await.map_err(read_err)?;
        if !reload && !self.anchor.is_empty() {
            let back = self.anchor.len() as u64;
            file.seek(SeekFrom::Start(self.offset - back)).await.map_err(read_err)?;
            let mut seen = vec![0u8; self.anchor.len()];
            file.read_exact(&mut seen).await.map_err(read_err)?;
            reload = seen != self.anchor;
        }
        if reload && self.synced {
            debug!(
                path = %path.display(),
                len,
                offset = self.offset,
                shrank,
                swapped,
                "log file replaced, reloading"
            );
        }

        let start = if reload { 0 } else { self.offset };
        file.seek(SeekFrom::Start(start)).await.map_err(read_err)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await.map_err(read_err)?;

        if reload {
            self.anchor.clear();
        }
        extend_anchor(&mut self.anchor, &buf);
        self.identity = identity;
        self.modified = modified;

        let mut bytes = if reload { Vec::new() } else { std::mem::take(&mut self.pending) };
        bytes.extend_from_slice(&buf);
        let cut = complete_utf8_len(&bytes);
        let text = String::from_utf8_lossy(&bytes[..cut]).into_owned();

        self.pending = bytes[cut..].to_vec();
        self.offset = start + buf.len() as u64;
        self.synced = true;
        self.snapshot.last_read_at = Some(Instant::now());

        if reload {
            let changed = self.snapshot.contents != text;
            self.snapshot.contents = text;
            Ok(changed)
        } else if text.is_empty() {
            Ok(false)
        } else {
            self.snapshot.contents.push_str(&text);
            Ok(true)
        }
    }
}

/// Length of the prefix of `bytes` that does not end inside a multi-byte
/// UTF-8 sequence.  Invalid bytes elsewhere are left to lossy decoding.
fn complete_utf8_len(bytes: &[u8]) -> usize {
    let mut consumed = 0;
    loop {
        match std::str::from_utf8(&bytes[consumed..]) {
            Ok(_) => return bytes.len(),
            Err(e) => match e.error_len() {
                None => return consumed + e.valid_up_to(),
                Some(bad) => consumed += e.valid_up_to() + bad,
            },
        }
    }
}

/// Keep the last `ANCHOR_LEN` bytes of everything read so far.
fn extend_anchor(anchor: &mut Vec<u8>, read: &[u8]) {
    if read.len() >= ANCHOR_LEN {
        anchor.clear();
        anchor.extend_from_slice(&read[read.len() - ANCHOR_LEN..]);
    } else {
        anchor.extend_from_slice(read);
        let excess = anchor.len().saturating_sub(ANCHOR_LEN);
        anchor.drain(..excess);
    }
}

#[cfg(unix)]
type FileId = (u64, u64);

#[cfg(not(unix))]
type FileId = SystemTime;

#[cfg(unix)]
fn file_identity(meta: &std::fs::Metadata) -> Option<FileId> {
    use std::os::unix::fs::MetadataExt;
    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn file_identity(meta: &std::fs::Metadata) -> Option<FileId> {
    meta.created().ok()
}

// ── LogTailer ────────────────────────────────────────────────────────────────

pub struct LogTailer {
    path:     PathBuf,
    state_tx: watch::Sender<LogSnapshot>,
    live:     Arc<AtomicBool>,
    task:     Option<JoinHandle<()>>,
}

impl LogTailer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (state_tx, _) = watch::channel(LogSnapshot::placeholder(path.clone()));
        Self {
            path,
            state_tx,
            live: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file now, then every `interval`.
    ///
    /// Must be called from within a tokio runtime.  Restarts the schedule if
    /// already running.
    pub fn start(&mut self, interval: Duration) -> Result<(), PollerError> {
        if interval.is_zero() {
            return Err(PollerError::ZeroInterval);
        }
        self.stop();

        let live = Arc::new(AtomicBool::new(true));
        self.live = Arc::clone(&live);

        let tx = self.state_tx.clone();
        let mut reader = LogReader::resume(self.state_tx.borrow().clone());

        info!(path = %self.path.display(), ?interval, "log tailer started");
        self.task = Some(tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !live.load(Ordering::Acquire) {
                    break;
                }
                let snapshot = reader.read_snapshot().await;
                if !live.load(Ordering::Acquire) {
                    break;
                }
                tx.send_if_modified(|current| {
                    if current.revision == snapshot.revision {
                        return false;
                    }
                    *current = snapshot.clone();
                    true
                });
            }
        }));
        Ok(())
    }

    /// Cancel the timer.  Idempotent.
    pub fn stop(&mut self) {
        self.live.store(false, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
            info!(path = %self.path.display(), "log tailer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some() && self.live.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> watch::Receiver<LogSnapshot> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> LogSnapshot {
        self.state_tx.borrow().clone()
    }
}

impl Drop for LogTailer {
    fn drop(&mut self) {
        self.stop();
    }
}
