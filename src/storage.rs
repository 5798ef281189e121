//! Key-value persistence behind the session store.

use std::{
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::fs;

use crate::config::StoreConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub trait KeyValueStore: Send + Sync + 'static {
    /// `Ok(None)` when the key was never written.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, StorageError>> + Send;

    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}

pub async fn load_json<S, T>(store: &S, key: &str) -> Result<Option<T>, StorageError>
where
    S: KeyValueStore,
    T: DeserializeOwned,
{
    match store.get(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

pub async fn save_json<S, T>(store: &S, key: &str, value: &T) -> Result<(), StorageError>
where
    S: KeyValueStore,
    T: Serialize + ?Sized,
{
    let bytes = serde_json::to_vec(value)?;
    store.set(key, bytes).await
}

/// One file per key in a directory: `<key>.json`, or `<key>.json.zst` when compressed.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
    compress: bool,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            compress: false,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(&config.storage_dir).with_compression(config.compress)
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        if self.compress {
            self.dir.join(format!("{key}.json.zst"))
        } else {
            self.dir.join(format!("{key}.json"))
        }
    }
}

impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let data = match fs::read(self.path(key)).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if self.compress {
            Ok(Some(zstd::stream::decode_all(data.as_slice())?))
        } else {
            Ok(Some(data))
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).await?;
        let data = if self.compress {
            // 0 is the default compression level
            zstd::stream::encode_all(value.as_slice(), 0)?
        } else {
            value
        };

        // readers never see a partially written file
        let path = self.path(key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.values.get(key).map(|value| value.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.values.insert(key.to_owned(), value);
        Ok(())
    }
}
