use crate::store::keys;
use crate::store::types::ExpectationRecord;
use crate::{GatewatchError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, trace};

/// A target resolved against the store: the path to use for filesystem
/// access and assessment, and the store key it maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub usable_path: PathBuf,
    pub key: String,
}

/// Durable ordered mapping from canonical path keys to expectation
/// records, loaded once at startup and written at most once at shutdown.
#[derive(Debug)]
pub struct ExpectationStore {
    /// Store file location.
    path: PathBuf,
    /// Records keyed by canonical path spelling, kept sorted so the
    /// serialized file is deterministic and diff-friendly.
    records: BTreeMap<String, ExpectationRecord>,
    /// Prefer `~`-relative keys for paths under the home directory.
    substitute_home: bool,
    /// Injected home directory; resolution is deterministic under test.
    home: Option<PathBuf>,
}

impl ExpectationStore {
    /// Load the store from `path`. A missing file is a first run and
    /// yields an empty store; unreadable or malformed contents are fatal.
    pub fn load(path: &Path, substitute_home: bool, home: Option<PathBuf>) -> Result<Self> {
        let records = match fs::read_to_string(path) {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| GatewatchError::StoreParse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("No store at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(source) => {
                return Err(GatewatchError::StoreRead {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        debug!("Loaded {} expectation(s) from {}", records.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            records,
            substitute_home,
            home,
        })
    }

    /// Serialize the full mapping and atomically replace the store file.
    pub fn save(&self) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|source| GatewatchError::StoreWrite {
            path: self.path.clone(),
            source,
        })?;

        let json = serde_json::to_string_pretty(&self.records)?;

        let mut staged =
            NamedTempFile::new_in(&parent).map_err(|source| GatewatchError::StoreWrite {
                path: self.path.clone(),
                source,
            })?;
        staged
            .write_all(json.as_bytes())
            .and_then(|_| staged.write_all(b"\n"))
            .map_err(|source| GatewatchError::StoreWrite {
                path: self.path.clone(),
                source,
            })?;
        staged
            .persist(&self.path)
            .map_err(|err| GatewatchError::StoreWrite {
                path: self.path.clone(),
                source: err.error,
            })?;

        debug!("Wrote {} expectation(s) to {}", self.records.len(), self.path.display());
        Ok(())
    }

    /// Resolve a target path spelling to the path used for filesystem
    /// access and the store key it belongs under.
    ///
    /// Candidate keys are tried in order: the spelling as given, its
    /// lexical normalization, the home-expanded form, and (with home
    /// substitution on) the `~`-relative form. The first candidate already
    /// tracked wins; otherwise the most portable spelling is proposed as
    /// the key for a brand-new record.
    pub fn resolve(&self, target: &str) -> Result<Resolution> {
        let normalized = keys::lexical_normalize(target);
        let expanded = keys::expand_home(&normalized, self.home.as_deref())?;

        let mut candidates: Vec<String> = vec![
            target.to_string(),
            normalized.clone(),
            expanded.to_string_lossy().into_owned(),
        ];
        let mut proposed = normalized.clone();
        if self.substitute_home {
            if let Some(home) = self.home.as_deref() {
                if let Some(relative) = keys::contract_home(&normalized, home) {
                    candidates.push(relative.clone());
                    proposed = relative;
                }
            }
        }

        for candidate in &candidates {
            if self.records.contains_key(candidate) {
                trace!("Resolved {target:?} to tracked key {candidate:?}");
                return Ok(Resolution {
                    usable_path: expanded,
                    key: candidate.clone(),
                });
            }
        }

        trace!("Resolved {target:?} to new key {proposed:?}");
        Ok(Resolution {
            usable_path: expanded,
            key: proposed,
        })
    }

    pub fn get(&self, key: &str) -> Option<&ExpectationRecord> {
        self.records.get(key)
    }

    pub fn insert(&mut self, key: String, record: ExpectationRecord) -> Option<ExpectationRecord> {
        self.records.insert(key, record)
    }

    pub fn remove(&mut self, key: &str) -> Option<ExpectationRecord> {
        self.records.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.records.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ExpectationRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::OriginatorPattern;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir, substitute_home: bool, home: Option<PathBuf>) -> ExpectationStore {
        ExpectationStore::load(&dir.path().join("expectations.json"), substitute_home, home)
            .unwrap()
    }

    fn record_with(pattern: &str) -> ExpectationRecord {
        ExpectationRecord {
            originator: Some(OriginatorPattern::parse(pattern)),
            ..Default::default()
        }
    }

    #[test]
    fn missing_file_loads_as_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, true, None);
        assert!(store.is_empty());
    }

    #[test]
    fn malformed_file_fails_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("expectations.json");
        fs::write(&path, "{ not json").unwrap();
        let err = ExpectationStore::load(&path, true, None).unwrap_err();
        assert!(matches!(err, GatewatchError::StoreParse { .. }));
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir, true, None);
        store.insert("~/Applications/App.app".to_string(), record_with("id:ABCDEF1234"));
        store.save().unwrap();

        let reloaded = store_in(&dir, true, None);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(
            reloaded.get("~/Applications/App.app"),
            Some(&record_with("id:ABCDEF1234"))
        );
    }

    #[test]
    fn save_is_deterministic_across_runs() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir, true, None);
        store.insert("/b".to_string(), record_with("id:BBBB"));
        store.insert("/a".to_string(), record_with("id:AAAA"));
        store.save().unwrap();
        let first = fs::read_to_string(store.path()).unwrap();
        store.save().unwrap();
        let second = fs::read_to_string(store.path()).unwrap();
        assert_eq!(first, second);
        // BTreeMap ordering puts /a before /b regardless of insert order.
        assert!(first.find("\"/a\"").unwrap() < first.find("\"/b\"").unwrap());
    }

    #[test]
    fn save_leaves_no_staging_files_behind() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir, true, None);
        store.insert("/a".to_string(), record_with("id:AAAA"));
        store.save().unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("expectations.json")]);
    }

    #[test]
    fn resolve_equates_all_spellings_of_a_tracked_path() {
        let dir = TempDir::new().unwrap();
        let home = PathBuf::from("/Users/tester");
        let mut store = store_in(&dir, true, Some(home.clone()));
        store.insert("~/Applications/App.app".to_string(), record_with("id:AAAA"));

        for spelling in [
            "~/Applications/App.app",
            "/Users/tester/Applications/App.app",
            "/Users/tester/./Applications//App.app",
            "/Users/tester/Applications/Utilities/../App.app",
        ] {
            let resolution = store.resolve(spelling).unwrap();
            assert_eq!(resolution.key, "~/Applications/App.app", "spelling {spelling:?}");
            assert_eq!(
                resolution.usable_path,
                PathBuf::from("/Users/tester/Applications/App.app")
            );
        }
    }

    #[test]
    fn resolve_prefers_existing_absolute_key_over_proposing_relative() {
        let dir = TempDir::new().unwrap();
        let home = PathBuf::from("/Users/tester");
        let mut store = store_in(&dir, true, Some(home));
        store.insert(
            "/Users/tester/Applications/App.app".to_string(),
            record_with("id:AAAA"),
        );

        let resolution = store.resolve("~/Applications/App.app").unwrap();
        assert_eq!(resolution.key, "/Users/tester/Applications/App.app");
    }

    #[test]
    fn resolve_proposes_home_relative_key_for_new_paths() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, true, Some(PathBuf::from("/Users/tester")));
        let resolution = store.resolve("/Users/tester/Applications/New.app").unwrap();
        assert_eq!(resolution.key, "~/Applications/New.app");
        assert_eq!(
            resolution.usable_path,
            PathBuf::from("/Users/tester/Applications/New.app")
        );
    }

    #[test]
    fn resolve_without_substitution_proposes_normalized_key() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, false, Some(PathBuf::from("/Users/tester")));
        let resolution = store.resolve("/Users/tester//Applications/New.app").unwrap();
        assert_eq!(resolution.key, "/Users/tester/Applications/New.app");
    }

    #[test]
    fn resolve_outside_home_proposes_normalized_key() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, true, Some(PathBuf::from("/Users/tester")));
        let resolution = store.resolve("/Applications/./Safari.app").unwrap();
        assert_eq!(resolution.key, "/Applications/Safari.app");
    }

    #[test]
    fn resolve_needs_home_only_for_tilde_targets() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, true, None);
        assert!(store.resolve("/Applications/Safari.app").is_ok());
        assert!(matches!(
            store.resolve("~/Applications/App.app").unwrap_err(),
            GatewatchError::HomeDirUnavailable(_)
        ));
    }
}
