//! Configuration file watcher for hot reload.
//!
//! # Design Decisions
//! - The parent directory is watched, not the file: editors and deploy tools
//!   often replace the file, which drops a watch on the old inode
//! - Only events naming the config file trigger a reload
//! - A file that fails to load or validate is logged and skipped; the
//!   running configuration stays in place

use std::path::{Path, PathBuf};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ServiceConfig;

/// Sends a freshly loaded [`ServiceConfig`] whenever the file changes.
pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<ServiceConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end of its updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ServiceConfig>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            updates,
        };
        (watcher, rx)
    }

    /// Start watching. Updates stop when the returned handle is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self { path, updates } = self;
        let target = path.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if touches(&event, &target) => reload(&target, &updates),
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Config watch error"),
        })?;
        watcher.watch(watch_dir(&path), RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), "Config watcher started");
        Ok(watcher)
    }
}

fn watch_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// Whether `event` writes or (re)creates the file at `target`.
fn touches(event: &Event, target: &Path) -> bool {
    let relevant = event.kind.is_modify() || event.kind.is_create();
    relevant
        && event
            .paths
            .iter()
            .any(|p| p.file_name().is_some() && p.file_name() == target.file_name())
}

fn reload(path: &Path, updates: &mpsc::UnboundedSender<ServiceConfig>) {
    match load_config(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "Configuration reloaded");
            if updates.send(config).is_err() {
                tracing::debug!("No receiver for configuration updates");
            }
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to reload config, keeping current configuration");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind};
    use notify::EventKind;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_only_writes_to_the_config_file_count() {
        let target = Path::new("/etc/service/config.toml");
        let write = EventKind::Modify(ModifyKind::Data(DataChange::Any));

        assert!(touches(&event(write, "/etc/service/config.toml"), target));
        assert!(touches(
            &event(EventKind::Create(CreateKind::File), "/etc/service/config.toml"),
            target
        ));
        assert!(!touches(&event(write, "/etc/service/other.toml"), target));
        assert!(!touches(
            &event(EventKind::Access(AccessKind::Any), "/etc/service/config.toml"),
            target
        ));
    }

    #[test]
    fn test_watch_dir_of_bare_file_name() {
        assert_eq!(watch_dir(Path::new("config.toml")), Path::new("."));
        assert_eq!(watch_dir(Path::new("/a/b.toml")), Path::new("/a"));
    }

    #[test]
    fn test_invalid_file_sends_nothing() {
        let path = std::env::temp_dir().join(format!("watcher-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[timeouts]\nrequest_secs = 0\n").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        reload(&path, &tx);
        assert!(rx.try_recv().is_err());

        std::fs::write(&path, "[timeouts]\nrequest_secs = 5\n").unwrap();
        reload(&path, &tx);
        assert_eq!(rx.try_recv().unwrap().timeouts.request_secs, 5);

        let _ = std::fs::remove_file(&path);
    }
}
