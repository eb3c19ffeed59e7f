use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::store::tmp_path;

use super::slot::{FlattenedPedigree, SubjectKey};

/// A stored pedigree together with its validation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPedigree {
    pub subject: SubjectKey,
    pub valid: bool,
    pub pedigree: FlattenedPedigree,
}

/// Read-through store of flattened pedigrees, one per subject.
///
/// With a directory the cache keeps one JSON file per subject and survives
/// across runs; [`PedigreeCache::in_memory`] keeps entries for the life of
/// the value only.
#[derive(Debug, Default)]
pub struct PedigreeCache {
    dir: Option<PathBuf>,
    entries: BTreeMap<SubjectKey, CachedPedigree>,
}

impl PedigreeCache {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Cache backed by `dir`. The directory is created on first store.
    pub fn open<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: Some(dir.as_ref().to_path_buf()),
            entries: BTreeMap::new(),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Return the cached pedigree for `key`, calling `loader` only on a miss.
    ///
    /// Whatever the loader returns is validated and stored, valid or not;
    /// callers decide what to do with an invalid pedigree. A loader error is
    /// returned as-is and nothing is stored.
    pub fn get_or_fetch<F>(&mut self, key: &SubjectKey, loader: F) -> Result<FlattenedPedigree>
    where
        F: FnOnce(&SubjectKey) -> Result<FlattenedPedigree>,
    {
        if let Some(hit) = self.get(key) {
            log::debug!("pedigree cache hit for {}", key);
            return Ok(hit.pedigree.clone());
        }

        log::debug!("pedigree cache miss for {}", key);
        let pedigree = loader(key)?;
        self.store(key, pedigree.clone())?;
        Ok(pedigree)
    }

    /// Look up `key` in memory, then on disk.
    pub fn get(&mut self, key: &SubjectKey) -> Option<&CachedPedigree> {
        if !self.entries.contains_key(key) {
            let from_disk = self.read_file(key)?;
            self.entries.insert(key.clone(), from_disk);
        }
        self.entries.get(key)
    }

    /// Store `pedigree` under `key`. Returns `false` when an identical entry
    /// was already stored, in which case nothing is written.
    pub fn store(&mut self, key: &SubjectKey, pedigree: FlattenedPedigree) -> Result<bool> {
        let valid = match pedigree.check() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("caching invalid pedigree for {}: {}", key, e);
                false
            }
        };
        let entry = CachedPedigree {
            subject: key.clone(),
            valid,
            pedigree,
        };

        if self.get(key) == Some(&entry) {
            return Ok(false);
        }

        if let Some(path) = self.file_path(key) {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            let tmp = tmp_path(&path);
            {
                let mut writer = BufWriter::new(fs::File::create(&tmp)?);
                serde_json::to_writer_pretty(&mut writer, &entry)?;
                writer.flush()?;
            }
            fs::rename(&tmp, &path)?;
        }
        self.entries.insert(key.clone(), entry);
        Ok(true)
    }

    /// Every subject known to the cache, in memory or on disk.
    pub fn subjects(&self) -> Result<Vec<SubjectKey>> {
        let mut subjects: Vec<SubjectKey> = self.entries.keys().cloned().collect();
        if let Some(dir) = self.dir.as_deref().filter(|d| d.is_dir()) {
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                if let Some(cached) = read_entry(&path) {
                    subjects.push(cached.subject);
                }
            }
        }
        subjects.sort();
        subjects.dedup();
        Ok(subjects)
    }

    fn file_path(&self, key: &SubjectKey) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", key.file_stem())))
    }

    fn read_file(&self, key: &SubjectKey) -> Option<CachedPedigree> {
        let path = self.file_path(key)?;
        if !path.is_file() {
            return None;
        }
        // Two subjects can share a file stem; only an exact key is a hit.
        read_entry(&path).filter(|cached| &cached.subject == key)
    }
}

/// Decode one cache file. Unreadable files are a miss, not an error.
fn read_entry(path: &Path) -> Option<CachedPedigree> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            log::warn!("cannot read cached pedigree {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(cached) => Some(cached),
        Err(e) => {
            log::warn!("ignoring corrupt cached pedigree {}: {}", path.display(), e);
            None
        }
    }
}
