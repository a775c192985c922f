//! Event filter: decides which filesystem events may start an audit cycle.

use crate::poller::{relative_to, FsEvent, FsEventKind};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Component, PathBuf};

/// Why an event was discarded, in the order the checks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    Directory,
    IgnoredDirectory,
    /// The audit log itself. Auditing on it would retrigger forever.
    AuditLog,
    Removed,
}

pub struct EventFilter {
    root: PathBuf,
    ignored: BTreeSet<String>,
    audit_log: PathBuf,
    audit_log_name: Option<OsString>,
}

impl EventFilter {
    pub fn new(root: impl Into<PathBuf>, ignored: BTreeSet<String>, audit_log: impl Into<PathBuf>) -> Self {
        let audit_log = audit_log.into();
        Self {
            root: root.into(),
            ignored,
            audit_log_name: audit_log.file_name().map(|n| n.to_os_string()),
            audit_log,
        }
    }

    /// `None` when the event qualifies.
    pub fn skip_reason(&self, event: &FsEvent) -> Option<Skip> {
        if event.is_dir {
            return Some(Skip::Directory);
        }

        // Components above the root never count, only the part inside the tree.
        let inside = relative_to(&self.root, &event.path);
        let in_ignored_dir = inside.components().any(|c| match c {
            Component::Normal(name) => name.to_str().is_some_and(|n| self.ignored.contains(n)),
            _ => false,
        });
        if in_ignored_dir {
            return Some(Skip::IgnoredDirectory);
        }

        if event.path == self.audit_log
            || (self.audit_log_name.is_some() && event.path.file_name() == self.audit_log_name.as_deref())
        {
            return Some(Skip::AuditLog);
        }

        if event.kind == FsEventKind::Removed {
            return Some(Skip::Removed);
        }

        None
    }

    pub fn accepts(&self, event: &FsEvent) -> bool {
        self.skip_reason(event).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(ignored: &[&str]) -> EventFilter {
        EventFilter::new(
            "/repo",
            ignored.iter().map(|s| s.to_string()).collect(),
            "/repo/audit_results.log",
        )
    }

    #[test]
    fn accepts_plain_file_modification() {
        assert!(filter(&[".git"]).accepts(&FsEvent::modified("/repo/docs/a.md")));
    }

    #[test]
    fn accepts_created_file() {
        let ev = FsEvent::new("/repo/new.md", FsEventKind::Created, false);
        assert!(filter(&[]).accepts(&ev));
    }

    #[test]
    fn rejects_directory_events() {
        let ev = FsEvent::new("/repo/docs", FsEventKind::Modified, true);
        assert_eq!(filter(&[]).skip_reason(&ev), Some(Skip::Directory));
    }

    #[test]
    fn rejects_any_ignored_component() {
        let f = filter(&["node_modules", ".git"]);
        assert_eq!(
            f.skip_reason(&FsEvent::modified("/repo/web/node_modules/pkg/index.js")),
            Some(Skip::IgnoredDirectory)
        );
        assert_eq!(f.skip_reason(&FsEvent::modified("/repo/.git/HEAD")), Some(Skip::IgnoredDirectory));
    }

    #[test]
    fn ignored_name_above_root_does_not_count() {
        let f = EventFilter::new("/home/build/repo", ["build".to_string()].into(), "/home/build/repo/audit_results.log");
        assert!(f.accepts(&FsEvent::modified("/home/build/repo/a.md")));
        assert!(!f.accepts(&FsEvent::modified("/home/build/repo/build/a.md")));
    }

    #[test]
    fn partial_name_is_not_ignored() {
        assert!(filter(&["build"]).accepts(&FsEvent::modified("/repo/builder/a.md")));
    }

    #[test]
    fn rejects_audit_log() {
        let f = filter(&[]);
        assert_eq!(f.skip_reason(&FsEvent::modified("/repo/audit_results.log")), Some(Skip::AuditLog));
        assert_eq!(f.skip_reason(&FsEvent::modified("/repo/sub/audit_results.log")), Some(Skip::AuditLog));
    }

    #[test]
    fn rejects_removals() {
        let ev = FsEvent::new("/repo/a.md", FsEventKind::Removed, false);
        assert_eq!(filter(&[]).skip_reason(&ev), Some(Skip::Removed));
    }
}
