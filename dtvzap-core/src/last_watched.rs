use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::file_util;

/// Persists the index of the channel watched last.
pub trait LastWatchedStore {
    /// Returns 0 when nothing has been stored yet.
    fn get(&self) -> usize;
    fn set(&mut self, channel: usize) -> Result<(), Error>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    channel: usize,
}

impl MemoryStore {
    pub fn new(channel: usize) -> Self {
        MemoryStore { channel }
    }
}

impl LastWatchedStore for MemoryStore {
    fn get(&self) -> usize {
        self.channel
    }

    fn set(&mut self, channel: usize) -> Result<(), Error> {
        self.channel = channel;
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct LastWatched {
    channel: usize,
}

/// Keeps the last watched channel in a JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    channel: usize,
}

impl FileStore {
    pub fn open(path: PathBuf) -> Result<Self, Error> {
        let data: LastWatched = file_util::load_json(&path)?.unwrap_or_default();
        tracing::debug!(?path, data.channel, "Loaded last watched channel");
        Ok(FileStore {
            path,
            channel: data.channel,
        })
    }
}

impl LastWatchedStore for FileStore {
    fn get(&self) -> usize {
        self.channel
    }

    fn set(&mut self, channel: usize) -> Result<(), Error> {
        file_util::save_json(LastWatched { channel }, &self.path)?;
        self.channel = channel;
        Ok(())
    }
}

impl<T: LastWatchedStore + ?Sized> LastWatchedStore for Box<T> {
    fn get(&self) -> usize {
        (**self).get()
    }

    fn set(&mut self, channel: usize) -> Result<(), Error> {
        (**self).set(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;
    use test_log::test;

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::default();
        assert_eq!(store.get(), 0);
        assert_matches!(store.set(5), Ok(()));
        assert_eq!(store.get(), 5);
        assert_eq!(MemoryStore::new(3).get(), 3);
    }

    #[test]
    fn test_file_store() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state").join("last-watched.json");

        let mut store = FileStore::open(path.clone()).unwrap();
        assert_eq!(store.get(), 0);
        assert!(!path.exists());

        assert_matches!(store.set(4), Ok(()));
        assert_eq!(store.get(), 4);
        assert_matches!(std::fs::read_to_string(&path), Ok(json) => {
            assert_eq!(json, r#"{"channel":4}"#);
        });

        let store = FileStore::open(path).unwrap();
        assert_eq!(store.get(), 4);
    }

    #[test]
    fn test_file_store_broken_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("last-watched.json");
        std::fs::write(&path, "{").unwrap();
        assert_matches!(FileStore::open(path), Err(Error::JsonError(_)));
    }

    #[test]
    fn test_boxed_store() {
        let mut store: Box<dyn LastWatchedStore> = Box::new(MemoryStore::default());
        assert_matches!(store.set(2), Ok(()));
        assert_eq!(store.get(), 2);
    }
}
