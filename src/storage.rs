use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Storage abstraction for both file system and browser localStorage
pub trait Storage: Send + Sync {
    fn read(&self, key: &str) -> Result<Vec<u8>>;
    fn write(&self, key: &str, data: &[u8]) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn exists(&self, key: &str) -> bool;

    /// Whether the backend can be used at all in the current environment
    fn is_available(&self) -> bool {
        true
    }
}

impl<T: Storage + ?Sized> Storage for Arc<T> {
    fn read(&self, key: &str) -> Result<Vec<u8>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        (**self).write(key, data)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn exists(&self, key: &str) -> bool {
        (**self).exists(key)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

/// In-memory storage, used by tests and short-lived sessions
#[derive(Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Vec<u8>> {
        let data = self
            .data
            .read()
            .map_err(|_| anyhow::anyhow!("Memory storage lock poisoned"))?;
        data.get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Key not found: {}", key))
    }

    fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let mut storage = self
            .data
            .write()
            .map_err(|_| anyhow::anyhow!("Memory storage lock poisoned"))?;
        storage.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut storage = self
            .data
            .write()
            .map_err(|_| anyhow::anyhow!("Memory storage lock poisoned"))?;
        storage.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        self.data
            .read()
            .map(|data| data.contains_key(key))
            .unwrap_or(false)
    }
}

/// File-based storage for CLI
pub struct FileStorage {
    base_dir: PathBuf,
}

impl FileStorage {
    pub fn new(base_dir: &str) -> Result<Self> {
        let path = PathBuf::from(base_dir);
        std::fs::create_dir_all(&path)?;
        Ok(Self { base_dir: path })
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.base_dir.join(key);
        Ok(std::fs::read(path)?)
    }

    fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.base_dir.join(key);
        Ok(std::fs::write(path, data)?)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.base_dir.join(key);
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, key: &str) -> bool {
        self.base_dir.join(key).exists()
    }

    fn is_available(&self) -> bool {
        self.base_dir.is_dir()
    }
}

/// LocalStorage-based storage for WASM
///
/// Values are stored as UTF-8 text so the relay list stays readable
/// from JavaScript under the same key.
#[cfg(target_arch = "wasm32")]
pub struct LocalStorageImpl;

#[cfg(target_arch = "wasm32")]
impl LocalStorageImpl {
    fn local_storage() -> Result<web_sys::Storage> {
        let window = web_sys::window().ok_or(anyhow::anyhow!("No window"))?;
        window
            .local_storage()
            .map_err(|_| anyhow::anyhow!("Failed to get localStorage"))?
            .ok_or(anyhow::anyhow!("localStorage not available"))
    }
}

#[cfg(target_arch = "wasm32")]
impl Storage for LocalStorageImpl {
    fn read(&self, key: &str) -> Result<Vec<u8>> {
        let value = Self::local_storage()?
            .get_item(key)
            .map_err(|_| anyhow::anyhow!("Failed to read from localStorage"))?
            .ok_or(anyhow::anyhow!("Key not found: {}", key))?;

        Ok(value.into_bytes())
    }

    fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(data)?;
        Self::local_storage()?
            .set_item(key, text)
            .map_err(|_| anyhow::anyhow!("Failed to write to localStorage"))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        Self::local_storage()?
            .remove_item(key)
            .map_err(|_| anyhow::anyhow!("Failed to remove from localStorage"))?;
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        Self::local_storage()
            .ok()
            .and_then(|storage| storage.get_item(key).ok().flatten())
            .is_some()
    }

    fn is_available(&self) -> bool {
        Self::local_storage().is_ok()
    }
}
