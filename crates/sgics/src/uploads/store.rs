use std::fs;
use std::io;
use std::path::PathBuf;

/// Byte storage behind uploaded documents.
pub trait FileStore: Send + Sync {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError>;
    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError>;
    fn remove(&self, name: &str) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("stored file '{0}' not found")]
    NotFound(String),
    #[error("file store failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Keeps files in a single directory on local disk.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(sanitize_file_name(name))
    }

    fn io_error(path: PathBuf, source: io::Error, name: &str) -> StoreError {
        if source.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound(name.to_string())
        } else {
            StoreError::Io { path, source }
        }
    }
}

impl FileStore for LocalFileStore {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).map_err(|source| StoreError::Io {
            path: self.root.clone(),
            source,
        })?;
        let path = self.path_for(name);
        fs::write(&path, bytes).map_err(|source| StoreError::Io { path, source })
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(name);
        fs::read(&path).map_err(|source| Self::io_error(path, source, name))
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path_for(name);
        fs::remove_file(&path).map_err(|source| Self::io_error(path, source, name))
    }
}

/// Reduce a client-supplied name to a safe single path component.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static SEQUENCE: AtomicUsize = AtomicUsize::new(0);

    pub(crate) fn scratch_dir(label: &str) -> PathBuf {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        std::env::temp_dir().join(format!(
            "sgics-{label}-{}-{stamp}-{}",
            std::process::id(),
            SEQUENCE.fetch_add(1, Ordering::SeqCst)
        ))
    }

    #[test]
    fn sanitize_strips_directories_and_odd_characters() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\ficha médica.pdf"), "ficha_m_dica.pdf");
        assert_eq!(sanitize_file_name("..hidden.png"), "hidden.png");
        assert_eq!(sanitize_file_name("   "), "file");
    }

    #[test]
    fn local_store_round_trips_and_removes() {
        let root = scratch_dir("store");
        let store = LocalFileStore::new(&root);

        store.save("1-ficha.pdf", b"%PDF-1.4").unwrap();
        assert!(root.join("1-ficha.pdf").exists());
        assert_eq!(store.read("1-ficha.pdf").unwrap(), b"%PDF-1.4");

        store.remove("1-ficha.pdf").unwrap();
        assert!(matches!(
            store.read("1-ficha.pdf"),
            Err(StoreError::NotFound(name)) if name == "1-ficha.pdf"
        ));
        assert!(matches!(
            store.remove("1-ficha.pdf"),
            Err(StoreError::NotFound(_))
        ));

        let _ = fs::remove_dir_all(root);
    }
}
