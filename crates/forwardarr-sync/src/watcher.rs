//! Port file watching
//!
//! VPN clients rarely rewrite the port file in place; most write a temporary
//! file and rename it over the old one. Watching the file itself would lose
//! the inotify watch on the first replacement, so [`PortFileWatcher`] watches
//! the containing directory (non-recursively) and leaves filtering by file
//! name to [`is_port_file_update`].
//!
//! ## Architecture
//!
//! ```text
//! inotify / kqueue
//!       │
//!       ▼
//!  PortFileWatcher ──→ events: mpsc<ChangeEvent>  ──┐
//!                  └─→ errors: mpsc<notify::Error> ─┴─→ SyncEngine::run
//! ```
//!
//! Dropping the watcher stops the OS watch and closes both channels, which
//! is how shutdown reaches the engine loop.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::SyncError;

/// Capacity of the event and error channels
const CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// ChangeEvent
// ============================================================================

/// Filesystem change in the watched directory, decoupled from `notify`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A file appeared (created, or moved into the directory)
    Created(PathBuf),
    /// A file's content changed
    Modified(PathBuf),
    /// A file disappeared (removed, or moved out of the directory)
    Deleted(PathBuf),
    /// A file was renamed within the directory
    Renamed {
        /// The original path before the rename
        old: PathBuf,
        /// The new path after the rename
        new: PathBuf,
    },
}

impl ChangeEvent {
    /// Returns the primary path associated with this event
    ///
    /// For rename events, this returns the new (destination) path.
    pub fn path(&self) -> &Path {
        match self {
            ChangeEvent::Created(p) => p,
            ChangeEvent::Modified(p) => p,
            ChangeEvent::Deleted(p) => p,
            ChangeEvent::Renamed { new, .. } => new,
        }
    }
}

/// Whether `event` means the port file now has new content.
///
/// Creation, content changes and renames onto `file_name` count; deletions
/// and renames away from it do not.
pub fn is_port_file_update(event: &ChangeEvent, file_name: &OsStr) -> bool {
    match event {
        ChangeEvent::Created(path) | ChangeEvent::Modified(path) => {
            path.file_name() == Some(file_name)
        }
        ChangeEvent::Renamed { new, .. } => new.file_name() == Some(file_name),
        ChangeEvent::Deleted(_) => false,
    }
}

// ============================================================================
// PortFileWatcher
// ============================================================================

/// Receiving halves of the watcher channels, consumed by the engine
#[derive(Debug)]
pub struct WatchStreams {
    pub events: mpsc::Receiver<ChangeEvent>,
    pub errors: mpsc::Receiver<notify::Error>,
}

/// Watches the directory holding the port file
///
/// ## Usage
///
/// ```ignore
/// let (watcher, streams) = PortFileWatcher::new(Path::new("/tmp/gluetun/forwarded_port"))?;
/// let result = engine.run(streams).await;
/// drop(watcher); // closes the channels; run() returns
/// ```
pub struct PortFileWatcher {
    /// The underlying notify watcher instance
    _watcher: RecommendedWatcher,
    /// Directory being watched
    dir: PathBuf,
}

impl PortFileWatcher {
    /// Starts watching the parent directory of `port_file`.
    ///
    /// The directory must exist; the file itself need not.
    pub fn new(port_file: &Path) -> Result<(Self, WatchStreams), SyncError> {
        let dir = match port_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, events) = mpsc::channel::<ChangeEvent>(CHANNEL_CAPACITY);
        let (error_tx, errors) = mpsc::channel::<notify::Error>(CHANNEL_CAPACITY);

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if let Some(change) = map_notify_event(&event) {
                        if let Err(e) = event_tx.blocking_send(change) {
                            warn!(error = %e, "Failed to send change event (receiver dropped)");
                        }
                    }
                }
                Err(err) => {
                    if let Err(e) = error_tx.blocking_send(err) {
                        warn!(error = %e, "Failed to send watcher error (receiver dropped)");
                    }
                }
            },
            notify::Config::default(),
        )
        .map_err(|source| SyncError::Watch {
            path: dir.clone(),
            source,
        })?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|source| SyncError::Watch {
                path: dir.clone(),
                source,
            })?;

        info!(
            dir = %dir.display(),
            file = %port_file.display(),
            "Watching port file directory"
        );

        Ok((
            Self {
                _watcher: watcher,
                dir,
            },
            WatchStreams { events, errors },
        ))
    }

    /// Directory being watched
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

// ============================================================================
// Event mapping - notify::Event → ChangeEvent
// ============================================================================

/// Converts a `notify::Event` into our internal `ChangeEvent`
///
/// - `Create(*)` -> `Created`
/// - `Modify(Data(*))`, `Modify(Any)`, `Modify(Other)` -> `Modified`
/// - `Modify(Name(Both))` with 2 paths -> `Renamed`
/// - `Modify(Name(To))` -> `Created`, `Modify(Name(From))` -> `Deleted`
/// - `Remove(*)` -> `Deleted`
///
/// Metadata changes and access events are dropped.
fn map_notify_event(event: &notify::Event) -> Option<ChangeEvent> {
    let paths = &event.paths;

    match &event.kind {
        EventKind::Create(_) => Some(ChangeEvent::Created(paths.first()?.clone())),

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if paths.len() >= 2 {
                Some(ChangeEvent::Renamed {
                    old: paths[0].clone(),
                    new: paths[1].clone(),
                })
            } else {
                Some(ChangeEvent::Modified(paths.first()?.clone()))
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            Some(ChangeEvent::Created(paths.first()?.clone()))
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            Some(ChangeEvent::Deleted(paths.first()?.clone()))
        }
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(ChangeEvent::Modified(paths.first()?.clone())),

        EventKind::Remove(_) => Some(ChangeEvent::Deleted(paths.first()?.clone())),

        _ => {
            debug!(kind = ?event.kind, "Ignoring event kind");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn event(kind: EventKind, paths: &[&str]) -> notify::Event {
        notify::Event {
            kind,
            paths: paths.iter().map(|p| PathBuf::from(*p)).collect(),
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_map_create_event() {
        let mapped = map_notify_event(&event(
            EventKind::Create(notify::event::CreateKind::File),
            &["/tmp/gluetun/forwarded_port"],
        ));
        assert_eq!(
            mapped,
            Some(ChangeEvent::Created(PathBuf::from("/tmp/gluetun/forwarded_port")))
        );
    }

    #[test]
    fn test_map_modify_data_event() {
        let mapped = map_notify_event(&event(
            EventKind::Modify(ModifyKind::Data(notify::event::DataChange::Content)),
            &["/a"],
        ));
        assert_eq!(mapped, Some(ChangeEvent::Modified(PathBuf::from("/a"))));
    }

    #[test]
    fn test_map_rename_events() {
        let both = map_notify_event(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/d/port.tmp", "/d/port"],
        ));
        assert_eq!(
            both,
            Some(ChangeEvent::Renamed {
                old: PathBuf::from("/d/port.tmp"),
                new: PathBuf::from("/d/port"),
            })
        );

        let to = map_notify_event(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &["/d/port"],
        ));
        assert_eq!(to, Some(ChangeEvent::Created(PathBuf::from("/d/port"))));

        let from = map_notify_event(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/d/port"],
        ));
        assert_eq!(from, Some(ChangeEvent::Deleted(PathBuf::from("/d/port"))));
    }

    #[test]
    fn test_map_ignores_metadata_and_access() {
        let metadata = event(
            EventKind::Modify(ModifyKind::Metadata(notify::event::MetadataKind::Permissions)),
            &["/a"],
        );
        assert_eq!(map_notify_event(&metadata), None);

        let access = event(
            EventKind::Access(notify::event::AccessKind::Read),
            &["/a"],
        );
        assert_eq!(map_notify_event(&access), None);
    }

    #[test]
    fn test_map_event_without_paths() {
        let empty = event(EventKind::Create(notify::event::CreateKind::File), &[]);
        assert_eq!(map_notify_event(&empty), None);
    }

    #[test]
    fn test_is_port_file_update_filters_by_name() {
        let name = OsStr::new("forwarded_port");

        assert!(is_port_file_update(
            &ChangeEvent::Modified(PathBuf::from("/g/forwarded_port")),
            name
        ));
        assert!(is_port_file_update(
            &ChangeEvent::Created(PathBuf::from("/g/forwarded_port")),
            name
        ));
        assert!(is_port_file_update(
            &ChangeEvent::Renamed {
                old: PathBuf::from("/g/.forwarded_port.swp"),
                new: PathBuf::from("/g/forwarded_port"),
            },
            name
        ));

        assert!(!is_port_file_update(
            &ChangeEvent::Modified(PathBuf::from("/g/other_file")),
            name
        ));
        assert!(!is_port_file_update(
            &ChangeEvent::Deleted(PathBuf::from("/g/forwarded_port")),
            name
        ));
        assert!(!is_port_file_update(
            &ChangeEvent::Renamed {
                old: PathBuf::from("/g/forwarded_port"),
                new: PathBuf::from("/g/forwarded_port.old"),
            },
            name
        ));
    }

    #[test]
    fn test_change_event_path() {
        let renamed = ChangeEvent::Renamed {
            old: PathBuf::from("/old"),
            new: PathBuf::from("/new"),
        };
        assert_eq!(renamed.path(), Path::new("/new"));
        assert_eq!(
            ChangeEvent::Deleted(PathBuf::from("/x")).path(),
            Path::new("/x")
        );
    }

    #[test]
    fn test_watcher_missing_directory() {
        let dir = TempDir::new().unwrap();
        let port_file = dir.path().join("missing").join("forwarded_port");

        let err = PortFileWatcher::new(&port_file).err().unwrap();
        assert!(matches!(err, SyncError::Watch { .. }));
    }

    #[tokio::test]
    async fn test_watcher_reports_port_file_write() {
        let dir = TempDir::new().unwrap();
        let port_file = dir.path().join("forwarded_port");

        let (watcher, mut streams) = PortFileWatcher::new(&port_file).unwrap();
        assert_eq!(watcher.dir(), dir.path());

        std::fs::write(&port_file, "51413\n").unwrap();

        let name = OsStr::new("forwarded_port");
        let seen = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(event) = streams.events.recv().await {
                if is_port_file_update(&event, name) {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false);
        assert!(seen, "no event for port file write");
    }

    #[tokio::test]
    async fn test_dropping_watcher_closes_channels() {
        let dir = TempDir::new().unwrap();
        let (watcher, mut streams) = PortFileWatcher::new(&dir.path().join("port")).unwrap();
        drop(watcher);

        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            while streams.events.recv().await.is_some() {}
            while streams.errors.recv().await.is_some() {}
        })
        .await;
        assert!(closed.is_ok());
    }
}
