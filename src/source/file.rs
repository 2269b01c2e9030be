//! File-backed configuration source with hot-reload support.
//!
//! Reads a TOML or JSON file (chosen by extension) and flattens nested
//! tables into dotted key paths, so `[Metrics] HostName = "..."` is served
//! as `Metrics.HostName`. [`FileSource::start_watching`] reloads the file
//! automatically when the filesystem reports a change; [`FileSource::refresh`]
//! does the same on demand.

use crossbeam::channel::{unbounded, Receiver};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

use super::{ChangeToken, ConfigurationSource};

/// Debounce window applied to bursts of filesystem events.
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// A configuration source backed by a single TOML or JSON file.
///
/// The file is read eagerly at [`open`](FileSource::open); a missing or
/// unreadable file is fatal there, since the source would have nothing to
/// serve. Later failures are recoverable: a refresh that cannot read or
/// parse the file keeps the previous snapshot and the source heals on the
/// next successful read.
pub struct FileSource {
    shared: Arc<FileShared>,
    debounce: Duration,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

struct FileShared {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
    watchers: Mutex<Vec<ChangeToken>>,
}

impl FileSource {
    /// Open a configuration file and load its current contents.
    ///
    /// The format is chosen by extension: `.json` parses as JSON, anything
    /// else as TOML.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        // Canonicalize so filesystem events, which report absolute paths,
        // match against the stored path.
        let path = path.canonicalize().unwrap_or(path);
        let entries = read_entries(&path)?;
        info!("Loaded configuration file: {}", path.display());

        Ok(Self {
            shared: Arc::new(FileShared {
                path,
                entries: RwLock::new(entries),
                watchers: Mutex::new(Vec::new()),
            }),
            debounce: DEFAULT_DEBOUNCE,
            watcher: Mutex::new(None),
        })
    }

    /// Replace the debounce window used by [`start_watching`](Self::start_watching).
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Re-read the backing file now.
    ///
    /// Returns `Ok(true)` when the flattened contents changed (watchers
    /// fired), `Ok(false)` when the file was identical. A read or parse
    /// failure leaves the previous snapshot in place.
    pub fn refresh(&self) -> Result<bool> {
        Self::refresh_shared(&self.shared)
    }

    /// Start watching the backing file for changes.
    ///
    /// Spawns a dedicated thread that coalesces bursts of filesystem events
    /// within the debounce window, then refreshes. The watcher stops when
    /// [`stop_watching`](Self::stop_watching) is called or the source is
    /// dropped.
    pub fn start_watching(&self) -> Result<()> {
        let mut slot = self.watcher.lock();
        if slot.is_some() {
            return Err(Error::Source {
                message: "file watcher already started".to_string(),
            });
        }

        let (event_tx, event_rx) = unbounded();
        let mut watcher = RecommendedWatcher::new(
            move |event: notify::Result<Event>| {
                if let Err(e) = event_tx.send(event) {
                    error!("Failed to forward filesystem event: {e}");
                }
            },
            Config::default()
                .with_poll_interval(Duration::from_millis(500))
                .with_compare_contents(true),
        )
        .map_err(|e| Error::Source {
            message: format!("failed to create file watcher: {e}"),
        })?;

        // Watch the parent directory: editors replace files rather than
        // write in place, and events for the replacement arrive on the
        // directory watch.
        let watch_root = self
            .shared
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        watcher
            .watch(watch_root, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Source {
                message: format!("failed to watch {}: {e}", watch_root.display()),
            })?;

        let shared = Arc::clone(&self.shared);
        let debounce = self.debounce;
        std::thread::Builder::new()
            .name("optwatch-file-watch".to_string())
            .spawn(move || Self::watch_loop(&shared, &event_rx, debounce))
            .map_err(|e| Error::Source {
                message: format!("failed to spawn watch thread: {e}"),
            })?;

        *slot = Some(watcher);
        info!("Watching configuration file: {}", self.shared.path.display());
        Ok(())
    }

    /// Stop watching the backing file. Reads and manual refreshes keep
    /// working.
    pub fn stop_watching(&self) {
        if self.watcher.lock().take().is_some() {
            info!(
                "Stopped watching configuration file: {}",
                self.shared.path.display()
            );
        }
    }

    fn watch_loop(shared: &Arc<FileShared>, events: &Receiver<notify::Result<Event>>, debounce: Duration) {
        loop {
            match events.recv() {
                Ok(Ok(event)) => {
                    if !Self::is_relevant(&shared.path, &event) {
                        continue;
                    }
                    if matches!(event.kind, EventKind::Remove(_)) {
                        warn!("Configuration file removed: {}", shared.path.display());
                        continue;
                    }
                    // Editors often save in several steps; coalesce the burst
                    // before reloading.
                    let deadline = Instant::now() + debounce;
                    while events.recv_deadline(deadline).is_ok() {}
                    let _ = Self::refresh_shared(shared);
                }
                Ok(Err(e)) => {
                    error!("File watcher error: {e}");
                }
                Err(_) => {
                    debug!("File watcher channel closed, stopping watch loop");
                    break;
                }
            }
        }
    }

    fn is_relevant(path: &Path, event: &Event) -> bool {
        event.paths.iter().any(|candidate| {
            candidate == path
                || (candidate.file_name() == path.file_name()
                    && candidate.parent() == path.parent())
        })
    }

    fn refresh_shared(shared: &FileShared) -> Result<bool> {
        let next = match read_entries(&shared.path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Configuration refresh failed, keeping previous snapshot: {e}");
                return Err(e);
            }
        };

        let changed = {
            let mut entries = shared.entries.write();
            if *entries == next {
                false
            } else {
                *entries = next;
                true
            }
        };

        if changed {
            debug!("Configuration file changed: {}", shared.path.display());
            // Drain and fire outside the lock; callbacks may re-watch.
            let tokens = std::mem::take(&mut *shared.watchers.lock());
            for token in tokens {
                token.fire();
            }
        }
        Ok(changed)
    }
}

impl ConfigurationSource for FileSource {
    fn get(&self, key: &str) -> Option<String> {
        self.shared.entries.read().get(key).cloned()
    }

    fn watch(&self) -> ChangeToken {
        let token = ChangeToken::new();
        self.shared.watchers.lock().push(token.clone());
        token
    }
}

fn read_entries(path: &Path) -> Result<HashMap<String, String>> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::Source {
        message: format!("failed to read {}: {e}", path.display()),
    })?;

    let mut entries = HashMap::new();
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => {
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            flatten_json(&value, "", &mut entries);
        }
        _ => {
            let value: toml::Value = raw.parse()?;
            flatten_toml(&value, "", &mut entries);
        }
    }
    Ok(entries)
}

fn flatten_toml(value: &toml::Value, prefix: &str, out: &mut HashMap<String, String>) {
    match value {
        toml::Value::Table(table) => {
            for (key, value) in table {
                flatten_toml(value, &join_key(prefix, key), out);
            }
        }
        toml::Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_toml(item, &join_key(prefix, &index.to_string()), out);
            }
        }
        toml::Value::String(text) => {
            out.insert(prefix.to_string(), text.clone());
        }
        scalar => {
            out.insert(prefix.to_string(), scalar.to_string());
        }
    }
}

fn flatten_json(value: &serde_json::Value, prefix: &str, out: &mut HashMap<String, String>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, value) in map {
                flatten_json(value, &join_key(prefix, key), out);
            }
        }
        serde_json::Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_json(item, &join_key(prefix, &index.to_string()), out);
            }
        }
        serde_json::Value::String(text) => {
            out.insert(prefix.to_string(), text.clone());
        }
        // Null means absent, same as a missing key.
        serde_json::Value::Null => {}
        scalar => {
            out.insert(prefix.to_string(), scalar.to_string());
        }
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_open_toml_flattens_nested_tables() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("app.toml");
        fs::write(
            &path,
            r#"
ApplicationVersion = "2.0"
Enabled = true

[Metrics]
HostName = "host-a"
SampleRates = [1, 5]
"#,
        )
        .expect("Failed to write config file");

        let source = FileSource::open(&path).expect("Failed to open source");
        assert_eq!(source.get("ApplicationVersion").as_deref(), Some("2.0"));
        assert_eq!(source.get("Enabled").as_deref(), Some("true"));
        assert_eq!(source.get("Metrics.HostName").as_deref(), Some("host-a"));
        assert_eq!(source.get("Metrics.SampleRates.0").as_deref(), Some("1"));
        assert_eq!(source.get("Metrics.SampleRates.1").as_deref(), Some("5"));
        assert_eq!(source.get("Metrics.Missing"), None);
    }

    #[test]
    fn test_open_json_flattens_nested_objects() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("appsettings.json");
        fs::write(
            &path,
            r#"{"ApplicationVersion": "2.0", "Metrics": {"HostName": "host-a", "Port": 9090}}"#,
        )
        .expect("Failed to write config file");

        let source = FileSource::open(&path).expect("Failed to open source");
        assert_eq!(source.get("ApplicationVersion").as_deref(), Some("2.0"));
        assert_eq!(source.get("Metrics.HostName").as_deref(), Some("host-a"));
        assert_eq!(source.get("Metrics.Port").as_deref(), Some("9090"));
    }

    #[test]
    fn test_open_missing_file_is_fatal() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let result = FileSource::open(dir.path().join("missing.toml"));
        assert!(matches!(result, Err(Error::Source { .. })));
    }

    #[test]
    fn test_refresh_fires_watchers_on_change() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("app.toml");
        fs::write(&path, "[Metrics]\nHostName = \"host-a\"\n").expect("Failed to write");

        let source = FileSource::open(&path).expect("Failed to open source");
        let token = source.watch();

        fs::write(&path, "[Metrics]\nHostName = \"host-b\"\n").expect("Failed to rewrite");
        assert!(source.refresh().expect("Refresh failed"));
        assert!(token.has_fired());
        assert_eq!(source.get("Metrics.HostName").as_deref(), Some("host-b"));
    }

    #[test]
    fn test_refresh_without_change_is_silent() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("app.toml");
        fs::write(&path, "key = \"value\"\n").expect("Failed to write");

        let source = FileSource::open(&path).expect("Failed to open source");
        let token = source.watch();

        assert!(!source.refresh().expect("Refresh failed"));
        assert!(!token.has_fired());
    }

    #[test]
    fn test_refresh_keeps_snapshot_on_parse_error() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("app.toml");
        fs::write(&path, "key = \"value\"\n").expect("Failed to write");

        let source = FileSource::open(&path).expect("Failed to open source");
        fs::write(&path, "key = = garbage").expect("Failed to rewrite");

        assert!(source.refresh().is_err());
        assert_eq!(source.get("key").as_deref(), Some("value"));

        // The source heals once the file parses again.
        fs::write(&path, "key = \"repaired\"\n").expect("Failed to rewrite");
        assert!(source.refresh().expect("Refresh failed"));
        assert_eq!(source.get("key").as_deref(), Some("repaired"));
    }

    #[test]
    fn test_watching_reloads_on_write() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("app.toml");
        fs::write(&path, "[Metrics]\nHostName = \"host-a\"\n").expect("Failed to write");

        let source = FileSource::open(&path)
            .expect("Failed to open source")
            .with_debounce(Duration::from_millis(50));
        source.start_watching().expect("Failed to start watching");
        assert!(source.start_watching().is_err());

        fs::write(&path, "[Metrics]\nHostName = \"host-b\"\n").expect("Failed to rewrite");

        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if source.get("Metrics.HostName").as_deref() == Some("host-b") {
                source.stop_watching();
                return;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        panic!("watcher never observed the rewritten file");
    }
}
