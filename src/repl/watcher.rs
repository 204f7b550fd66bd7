use crossbeam_channel::Sender;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Editors often emit several events per save
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

/// Watches score files and forwards notify events to a channel.
///
/// The parent directory is watched rather than the file itself so that
/// editors which save by replacing the file keep triggering reloads.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    files: HashSet<PathBuf>,
    last_reload: HashMap<PathBuf, Instant>,
    debounce: Duration,
}

impl FileWatcher {
    pub fn new(tx: Sender<notify::Result<Event>>) -> notify::Result<Self> {
        let watcher = notify::recommended_watcher(move |res| {
            // The receiver only goes away when the REPL exits
            let _ = tx.send(res);
        })?;

        Ok(Self {
            watcher,
            files: HashSet::new(),
            last_reload: HashMap::new(),
            debounce: DEFAULT_DEBOUNCE,
        })
    }

    /// Start watching a file; returns its canonical path
    pub fn watch<P: AsRef<Path>>(&mut self, path: P) -> notify::Result<PathBuf> {
        let file = path.as_ref().canonicalize()?;
        let dir = file.parent().unwrap_or(Path::new("/")).to_path_buf();
        self.watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        self.files.insert(file.clone());
        Ok(file)
    }

    pub fn unwatch<P: AsRef<Path>>(&mut self, path: P) -> notify::Result<()> {
        let file = path.as_ref().canonicalize()?;
        self.files.remove(&file);
        self.last_reload.remove(&file);
        let dir = file.parent().unwrap_or(Path::new("/"));
        if !self.files.iter().any(|f| f.parent() == Some(dir)) {
            self.watcher.unwatch(dir)?;
        }
        Ok(())
    }

    pub fn watched(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.iter()
    }

    /// Watched files an event asks us to replay, after debouncing
    pub fn files_to_reload(&mut self, event: &Event, now: Instant) -> Vec<PathBuf> {
        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            return Vec::new();
        }

        let mut reload = Vec::new();
        for path in &event.paths {
            let path = path.canonicalize().unwrap_or_else(|_| path.clone());
            if !self.files.contains(&path) || reload.contains(&path) {
                continue;
            }
            let recent = self
                .last_reload
                .get(&path)
                .is_some_and(|last| now.duration_since(*last) < self.debounce);
            if !recent {
                self.last_reload.insert(path.clone(), now);
                reload.push(path);
            }
        }
        reload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    fn scratch_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mml-watch-{}-{}", std::process::id(), name));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("score.mml");
        std::fs::write(&file, "c d e").unwrap();
        file
    }

    #[test]
    fn test_only_watched_files_reload() {
        let (tx, _rx) = unbounded();
        let mut watcher = FileWatcher::new(tx).unwrap();
        let file = watcher.watch(scratch_file("filter")).unwrap();
        let other = file.with_file_name("other.mml");

        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(file.clone())
            .add_path(other);
        assert_eq!(watcher.files_to_reload(&event, Instant::now()), vec![file]);
    }

    #[test]
    fn test_access_events_are_ignored() {
        let (tx, _rx) = unbounded();
        let mut watcher = FileWatcher::new(tx).unwrap();
        let file = watcher.watch(scratch_file("access")).unwrap();

        let event = Event::new(EventKind::Access(AccessKind::Any)).add_path(file);
        assert!(watcher.files_to_reload(&event, Instant::now()).is_empty());
    }

    #[test]
    fn test_debounce() {
        let (tx, _rx) = unbounded();
        let mut watcher = FileWatcher::new(tx).unwrap();
        let file = watcher.watch(scratch_file("debounce")).unwrap();
        let event = Event::new(EventKind::Create(CreateKind::File)).add_path(file.clone());

        let start = Instant::now();
        assert_eq!(watcher.files_to_reload(&event, start).len(), 1);
        assert!(watcher
            .files_to_reload(&event, start + Duration::from_millis(10))
            .is_empty());
        assert_eq!(
            watcher
                .files_to_reload(&event, start + DEFAULT_DEBOUNCE * 2)
                .len(),
            1
        );
    }

    #[test]
    fn test_unwatch() {
        let (tx, _rx) = unbounded();
        let mut watcher = FileWatcher::new(tx).unwrap();
        let file = watcher.watch(scratch_file("unwatch")).unwrap();
        watcher.unwatch(&file).unwrap();
        assert_eq!(watcher.watched().count(), 0);
    }
}
