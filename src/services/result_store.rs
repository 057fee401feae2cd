// Result Storage Service
// Keyed store for finished analyses. Injected into the API layer so each
// session or request context owns its own store.

use crate::models::StoredAnalysis;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long a writer waits for another process's lock file.
const LOCK_WAIT: Duration = Duration::from_secs(5);
const LOCK_POLL: Duration = Duration::from_millis(20);
/// Lock files older than this are left over from a crashed writer.
const LOCK_STALE_AFTER: Duration = Duration::from_secs(30);

pub trait ResultStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<StoredAnalysis>, String>;

    fn put(&self, key: &str, value: &StoredAnalysis) -> Result<(), String>;

    /// Store `value` only if `key` is unused, atomically with respect to other
    /// writers. Returns false when the key was already taken.
    fn insert_new(&self, key: &str, value: &StoredAnalysis) -> Result<bool, String>;

    fn contains(&self, key: &str) -> Result<bool, String> {
        Ok(self.get(key)?.is_some())
    }

    /// Stored keys in ascending order.
    fn keys(&self) -> Result<Vec<String>, String>;
}

/// Session-scoped in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, StoredAnalysis>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<StoredAnalysis>, String> {
        let entries = self
            .entries
            .read()
            .map_err(|_| "result store lock poisoned".to_string())?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &StoredAnalysis) -> Result<(), String> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| "result store lock poisoned".to_string())?;
        entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn insert_new(&self, key: &str, value: &StoredAnalysis) -> Result<bool, String> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| "result store lock poisoned".to_string())?;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.clone());
        Ok(true)
    }

    fn keys(&self) -> Result<Vec<String>, String> {
        let entries = self
            .entries
            .read()
            .map_err(|_| "result store lock poisoned".to_string())?;
        Ok(entries.keys().cloned().collect())
    }
}

/// JSON-file store so results survive between CLI invocations.
pub struct FileStore {
    file: PathBuf,
    lock: RwLock<()>,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            file: dir.join("results.json"),
            lock: RwLock::new(()),
        }
    }

    /// Get default data directory
    pub fn default_data_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map(|p| p.join("naijaverify"))
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    /// Exclusive lock shared by every process using this results file.
    fn lock_file(&self) -> Result<LockFile, String> {
        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create data dir: {}", e))?;
        }
        LockFile::acquire(self.file.with_extension("json.lock"))
    }

    fn load(&self) -> Result<BTreeMap<String, StoredAnalysis>, String> {
        if !self.file.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.file)
            .map_err(|e| format!("Failed to read results: {}", e))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content).map_err(|e| format!("Failed to parse results: {}", e))
    }

    fn save(&self, entries: &BTreeMap<String, StoredAnalysis>) -> Result<(), String> {
        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create data dir: {}", e))?;
        }

        let content = serde_json::to_string_pretty(entries)
            .map_err(|e| format!("Failed to serialize results: {}", e))?;

        // Write to a sibling then rename so a crash never leaves half a file.
        let tmp = self.file.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| format!("Failed to write results: {}", e))?;
        fs::rename(&tmp, &self.file).map_err(|e| {
            warn!("[RESULT_STORE] rename failed for {}: {}", self.file.display(), e);
            format!("Failed to write results: {}", e)
        })
    }
}

impl ResultStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<StoredAnalysis>, String> {
        let _guard = self
            .lock
            .read()
            .map_err(|_| "result store lock poisoned".to_string())?;
        Ok(self.load()?.remove(key))
    }

    fn put(&self, key: &str, value: &StoredAnalysis) -> Result<(), String> {
        let _guard = self
            .lock
            .write()
            .map_err(|_| "result store lock poisoned".to_string())?;
        let _file_lock = self.lock_file()?;
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.clone());
        self.save(&entries)?;
        debug!("[RESULT_STORE] stored {} ({} entries)", key, entries.len());
        Ok(())
    }

    fn insert_new(&self, key: &str, value: &StoredAnalysis) -> Result<bool, String> {
        let _guard = self
            .lock
            .write()
            .map_err(|_| "result store lock poisoned".to_string())?;
        let _file_lock = self.lock_file()?;
        let mut entries = self.load()?;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.clone());
        self.save(&entries)?;
        debug!("[RESULT_STORE] stored {} ({} entries)", key, entries.len());
        Ok(true)
    }

    fn keys(&self) -> Result<Vec<String>, String> {
        let _guard = self
            .lock
            .read()
            .map_err(|_| "result store lock poisoned".to_string())?;
        Ok(self.load()?.into_keys().collect())
    }
}

/// `create_new` lock file, removed on drop.
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    fn acquire(path: PathBuf) -> Result<Self, String> {
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path) {
                        warn!("[RESULT_STORE] removing stale lock {}", path.display());
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    if started.elapsed() >= LOCK_WAIT {
                        return Err(format!("Timed out waiting for lock {}", path.display()));
                    }
                    std::thread::sleep(LOCK_POLL);
                }
                Err(e) => return Err(format!("Failed to create lock file: {}", e)),
            }
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.elapsed().ok())
        .map(|age| age > LOCK_STALE_AFTER)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ActionResult, AiOutcome, ContentType, SourceCredibilityResult, UrlActionResult,
        UrlAiAnalysis,
    };

    fn sample(id: &str) -> StoredAnalysis {
        StoredAnalysis {
            id: id.to_string(),
            content_type: ContentType::Url,
            content: "https://punchng.com/a".to_string(),
            created_at: "2024-05-01T10:00:00Z".to_string(),
            result: ActionResult::Url(UrlActionResult {
                score: 85,
                findings: Vec::new(),
                explanation: "ok".to_string(),
                recommended_alternatives: Vec::new(),
                basic_analysis: SourceCredibilityResult {
                    is_credible: true,
                    source_name: Some("Punch Newspapers".to_string()),
                    reliability_score: 85,
                },
                ai_analysis: AiOutcome::Parsed {
                    analysis: UrlAiAnalysis {
                        is_credible_source: true,
                        source_name: Some("Punch".to_string()),
                        reliability_score: 85,
                        issues: Vec::new(),
                        recommended_alternatives: Vec::new(),
                    },
                },
            }),
        }
    }

    #[test]
    fn test_memory_store_get_put() {
        let store = MemoryStore::new();
        assert_eq!(store.get("analysis_1").unwrap(), None);
        store.put("analysis_1", &sample("analysis_1")).unwrap();
        assert_eq!(store.get("analysis_1").unwrap(), Some(sample("analysis_1")));
        assert!(store.contains("analysis_1").unwrap());
        assert!(!store.contains("analysis_2").unwrap());
    }

    #[test]
    fn test_memory_stores_are_isolated() {
        let a = MemoryStore::new();
        let b = MemoryStore::new();
        a.put("analysis_1", &sample("analysis_1")).unwrap();
        assert!(b.get("analysis_1").unwrap().is_none());
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let first = FileStore::new(dir.path().to_path_buf());
        first.put("analysis_10", &sample("analysis_10")).unwrap();
        first.put("analysis_11", &sample("analysis_11")).unwrap();

        let second = FileStore::new(dir.path().to_path_buf());
        assert_eq!(second.get("analysis_10").unwrap(), Some(sample("analysis_10")));
        assert_eq!(second.keys().unwrap(), vec!["analysis_10", "analysis_11"]);
        assert!(second.get("analysis_12").unwrap().is_none());
    }

    #[test]
    fn test_file_store_reports_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        std::fs::write(store.path(), "{not json").unwrap();
        let err = store.get("analysis_1").unwrap_err();
        assert!(err.contains("Failed to parse results"));
    }

    #[test]
    fn test_insert_new_keeps_first_value() {
        let store = MemoryStore::new();
        assert!(store.insert_new("analysis_1", &sample("analysis_1")).unwrap());
        let mut other = sample("analysis_1");
        other.content = "https://guardian.ng/b".to_string();
        assert!(!store.insert_new("analysis_1", &other).unwrap());
        assert_eq!(store.get("analysis_1").unwrap(), Some(sample("analysis_1")));
    }

    #[test]
    fn test_file_store_insert_new_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let first = FileStore::new(dir.path().to_path_buf());
        let second = FileStore::new(dir.path().to_path_buf());
        assert!(first.insert_new("analysis_5", &sample("analysis_5")).unwrap());
        assert!(!second.insert_new("analysis_5", &sample("analysis_5")).unwrap());
        assert!(second.insert_new("analysis_6", &sample("analysis_6")).unwrap());
        assert_eq!(first.keys().unwrap(), vec!["analysis_5", "analysis_6"]);
        // Lock file is released after each write.
        assert!(!dir.path().join("results.json.lock").exists());
    }

    #[test]
    fn test_file_store_concurrent_writers_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let path = dir.path().to_path_buf();
                std::thread::spawn(move || {
                    // Separate instances stand in for separate CLI processes.
                    let store = FileStore::new(path);
                    let id = format!("analysis_{}", i);
                    store.insert_new(&id, &sample(&id)).unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
        let store = FileStore::new(dir.path().to_path_buf());
        assert_eq!(store.keys().unwrap().len(), 8);
    }

    #[test]
    fn test_stale_lock_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        let lock = dir.path().join("results.json.lock");
        std::fs::write(&lock, "").unwrap();
        let old = std::time::SystemTime::now() - Duration::from_secs(120);
        std::fs::File::options()
            .write(true)
            .open(&lock)
            .unwrap()
            .set_modified(old)
            .unwrap();
        assert!(store.insert_new("analysis_1", &sample("analysis_1")).unwrap());
    }
}
