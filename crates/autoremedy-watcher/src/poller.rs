//! Working-tree poller
//!
//! Snapshots file mtimes and sizes under the root on a fixed interval and
//! emits the differences as events. Ignored directory names are never
//! descended into. The first snapshot is a baseline and emits nothing.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Created,
    Modified,
    Removed,
}

/// One observed change under the watched root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub path: PathBuf,
    pub kind: FsEventKind,
    pub is_dir: bool,
}

impl FsEvent {
    pub fn new(path: impl Into<PathBuf>, kind: FsEventKind, is_dir: bool) -> Self {
        Self { path: path.into(), kind, is_dir }
    }

    /// A file modification, the most common event.
    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::new(path, FsEventKind::Modified, false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    modified: Option<SystemTime>,
    len: u64,
    is_dir: bool,
}

type Snapshot = HashMap<PathBuf, Entry>;

pub struct TreePoller {
    root: PathBuf,
    ignored: BTreeSet<String>,
    poll_interval: Duration,
    snapshot: Snapshot,
}

impl TreePoller {
    pub fn new(root: impl Into<PathBuf>, ignored: BTreeSet<String>, poll_interval: Duration) -> Self {
        Self {
            root: root.into(),
            ignored,
            poll_interval,
            snapshot: HashMap::new(),
        }
    }

    /// Record the current tree as the baseline without emitting events.
    pub fn prime(&mut self) {
        self.snapshot = self.scan();
    }

    pub fn tracked(&self) -> usize {
        self.snapshot.len()
    }

    /// Rescan and return every change since the previous scan, ordered by path.
    pub fn poll(&mut self) -> Vec<FsEvent> {
        let current = self.scan();
        let events = diff(&self.snapshot, &current);
        self.snapshot = current;
        events
    }

    fn scan(&self) -> Snapshot {
        WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| !is_ignored_dir(e, &self.ignored))
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let meta = e.metadata().ok()?;
                let entry = Entry {
                    modified: meta.modified().ok(),
                    len: meta.len(),
                    is_dir: meta.is_dir(),
                };
                Some((e.into_path(), entry))
            })
            .collect()
    }

    /// Run the poll loop, sending change events to the channel.
    pub async fn run(mut self, tx: mpsc::Sender<FsEvent>, cancel: CancellationToken) {
        self.prime();
        info!("TreePoller started on {}, tracking {} entries", self.root.display(), self.tracked());
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            for event in self.poll() {
                debug!("{:?} {}", event.kind, event.path.display());
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = tx.send(event) => {
                        if sent.is_err() {
                            info!("TreePoller channel closed, shutting down");
                            return;
                        }
                    }
                }
            }
        }
        info!("TreePoller stopped");
    }
}

fn is_ignored_dir(entry: &DirEntry, ignored: &BTreeSet<String>) -> bool {
    entry.file_type().is_dir()
        && entry.file_name().to_str().is_some_and(|name| ignored.contains(name))
}

fn diff(old: &Snapshot, new: &Snapshot) -> Vec<FsEvent> {
    let mut events: Vec<FsEvent> = new
        .iter()
        .filter_map(|(path, entry)| match old.get(path) {
            None => Some(FsEvent::new(path.clone(), FsEventKind::Created, entry.is_dir)),
            Some(prev) if prev != entry => Some(FsEvent::new(path.clone(), FsEventKind::Modified, entry.is_dir)),
            Some(_) => None,
        })
        .chain(
            old.iter()
                .filter(|(path, _)| !new.contains_key(*path))
                .map(|(path, entry)| FsEvent::new(path.clone(), FsEventKind::Removed, entry.is_dir)),
        )
        .collect();
    events.sort_by(|a, b| a.path.cmp(&b.path));
    events
}

/// Root-relative view of `path`, or `path` itself when it lies outside the root.
pub fn relative_to<'a>(root: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn poller(root: &Path, ignored: &[&str]) -> TreePoller {
        TreePoller::new(
            root,
            ignored.iter().map(|s| s.to_string()).collect(),
            Duration::from_millis(10),
        )
    }

    #[test]
    fn baseline_emits_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.md"), "a").unwrap();
        let mut p = poller(tmp.path(), &[]);
        p.prime();
        assert_eq!(p.tracked(), 1);
        assert!(p.poll().is_empty());
    }

    #[test]
    fn detects_create_modify_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.md");
        let b = tmp.path().join("b.md");
        fs::write(&a, "a").unwrap();
        let mut p = poller(tmp.path(), &[]);
        p.prime();

        fs::write(&a, "a changed").unwrap();
        fs::write(&b, "b").unwrap();
        let events = p.poll();
        assert!(events.contains(&FsEvent::modified(&a)));
        assert!(events.contains(&FsEvent::new(&b, FsEventKind::Created, false)));

        fs::remove_file(&b).unwrap();
        let events = p.poll();
        assert!(events.contains(&FsEvent::new(&b, FsEventKind::Removed, false)));
    }

    #[test]
    fn ignored_directories_are_not_scanned() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("target")).unwrap();
        let mut p = poller(tmp.path(), &["target"]);
        p.prime();

        fs::write(tmp.path().join("target").join("out.bin"), "x").unwrap();
        assert!(p.poll().is_empty());
    }

    #[test]
    fn relative_to_strips_root() {
        assert_eq!(relative_to(Path::new("/repo"), Path::new("/repo/docs/a.md")), Path::new("docs/a.md"));
        assert_eq!(relative_to(Path::new("/repo"), Path::new("/other/a.md")), Path::new("/other/a.md"));
    }
}
