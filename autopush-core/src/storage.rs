use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::binding::Binding;

type BindingMap = BTreeMap<u32, Binding>;

/// Binding rows keyed by id, persisted as a single JSON file.
///
/// Writes replace the whole row (last write wins). The file is written to a
/// `.tmp` sibling first and renamed into place, so a crash mid-write leaves
/// a readable copy behind.
///
/// The file may also be edited by another process (the `bind` command).
/// Rows on disk that differ from what this store last wrote are external
/// edits and are merged in before every write and on [`refresh`](Self::refresh).
#[derive(Debug, Clone)]
pub struct BindingStore {
    inner: Arc<RwLock<BindingMap>>,
    path: Option<PathBuf>,
    // Contents of the file as last read or written by this store. Holding
    // the lock serializes writers of the tmp file.
    on_disk: Arc<Mutex<BindingMap>>,
}

impl BindingStore {
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(RwLock::new(BindingMap::new())),
            path: None,
            on_disk: Arc::new(Mutex::new(BindingMap::new())),
        }
    }

    pub async fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let data = read_with_tmp_fallback(&path).await;
        debug!(bindings = data.len(), path = %path.display(), "loaded binding store");
        Self {
            inner: Arc::new(RwLock::new(data.clone())),
            path: Some(path),
            on_disk: Arc::new(Mutex::new(data)),
        }
    }

    pub async fn get(&self, id: u32) -> Option<Binding> {
        self.inner.read().await.get(&id).cloned()
    }

    /// Returns the row for `id`, seeding and persisting one when absent.
    pub async fn get_or_create(&self, id: u32, platform: &str, channel_id: &str) -> Binding {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.get(&id) {
            return existing.clone();
        }
        let seeded = Binding::seeded(id, platform, channel_id);
        inner.insert(id, seeded.clone());
        drop(inner);
        info!(binding = id, "created binding on first poll");
        self.persist().await;
        seeded
    }

    pub async fn upsert(&self, binding: Binding) {
        let mut inner = self.inner.write().await;
        inner.insert(binding.id, binding);
        drop(inner);
        self.persist().await;
    }

    /// All rows, ordered by id ascending.
    pub async fn list(&self) -> Vec<Binding> {
        self.inner.read().await.values().cloned().collect()
    }

    /// Writes a cursor advance for `binding`, unless its id has meanwhile
    /// been bound to another destination. Returns whether the write happened.
    pub async fn advance_cursor(&self, binding: Binding) -> bool {
        let mut inner = self.inner.write().await;
        if let Some(current) = inner.get(&binding.id) {
            if !current.same_destination(&binding.platform, &binding.channel_id) {
                debug!(
                    binding = binding.id,
                    destination = %current.address(),
                    "binding rebound; dropping cursor write"
                );
                return false;
            }
        }
        inner.insert(binding.id, binding);
        drop(inner);
        self.persist().await;
        true
    }

    /// Merges rows changed in the file by another process.
    ///
    /// New ids are adopted, as are rows bound to a different destination than
    /// the one held here. A row for the same destination keeps the in-memory
    /// cursor, which is never older than the file.
    pub async fn refresh(&self) -> usize {
        let Some(path) = &self.path else {
            return 0;
        };
        let mut known = self.on_disk.lock().await;
        let file = read_with_tmp_fallback(path).await;
        let mut inner = self.inner.write().await;
        let adopted = merge_external(&mut inner, &known, &file);
        *known = file;
        adopted
    }

    async fn persist(&self) {
        let Some(path) = &self.path else {
            debug!("binding store is in-memory only; skipping persist");
            return;
        };

        let mut known = self.on_disk.lock().await;
        let file = read_with_tmp_fallback(path).await;
        let (snapshot, bytes) = {
            let mut inner = self.inner.write().await;
            merge_external(&mut inner, &known, &file);
            match serde_json::to_vec_pretty(&*inner) {
                Ok(bytes) => (inner.clone(), bytes),
                Err(e) => {
                    warn!(error = %e, "failed to serialize bindings");
                    return;
                }
            }
        };

        if let Some(parent) = path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        let tmp = path.with_extension("json.tmp");
        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            warn!(error = %e, path = %tmp.display(), "failed to write temp binding store");
            return;
        }
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            warn!(error = %e, path = %path.display(), "failed to persist binding store");
            return;
        }
        *known = snapshot;
    }
}

/// Applies rows of `file` that changed since `known` was written.
fn merge_external(inner: &mut BindingMap, known: &BindingMap, file: &BindingMap) -> usize {
    let mut adopted = 0;
    for (id, row) in file {
        if known.get(id) == Some(row) {
            continue;
        }
        let adopt = match inner.get(id) {
            None => true,
            Some(current) => !current.same_destination(&row.platform, &row.channel_id),
        };
        if adopt {
            info!(binding = id, destination = %row.address(), "picked up binding from disk");
            inner.insert(*id, row.clone());
            adopted += 1;
        }
    }
    adopted
}

async fn read_with_tmp_fallback(path: &Path) -> BindingMap {
    match tokio::fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice::<BindingMap>(&bytes) {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    error = %e,
                    path = %path.display(),
                    "failed to parse binding store, trying tmp fallback"
                );
                let tmp = path.with_extension("json.tmp");
                match tokio::fs::read(&tmp).await {
                    Ok(tmp_bytes) => serde_json::from_slice(&tmp_bytes).unwrap_or_default(),
                    Err(_) => BindingMap::default(),
                }
            }
        },
        Err(_) => BindingMap::default(),
    }
}
