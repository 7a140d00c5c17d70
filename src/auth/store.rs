//! Cache slots for the last-issued token.
//!
//! Two interchangeable stores: an in-memory slot scoped to the client
//! instance, and a shared on-disk slot (`token.txt`) that independent
//! processes can reuse, guarded by advisory file locks. Caching is an
//! optimization, so every failure on the store path is soft: reads degrade
//! to a miss and writes are logged and dropped.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, warn};

use super::token::Token;

pub const SLOT_FILE_NAME: &str = "token.txt";

pub trait TokenStore: Send + Sync {
    fn read(&self) -> Option<Token>;
    fn write(&self, token: &Token);
}

/// Token slot local to this client instance.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<Token>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryStore {
    fn read(&self) -> Option<Token> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn write(&self, token: &Token) {
        *self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token.clone());
    }
}

/// Shared on-disk token slot.
///
/// The file holds exactly the raw access-token string; its modification time
/// stands in for the token's issue time. Readers take a shared lock, the
/// writer an exclusive one, so a reader never observes a partial write. No
/// lock is ever held across a network call.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    ttl: Duration,
}

impl FileStore {
    pub fn new(directory: &Path, ttl: Duration) -> Self {
        Self {
            path: directory.join(SLOT_FILE_NAME),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_slot(&self) -> std::io::Result<Option<Token>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        fs2::FileExt::lock_shared(&file)?;
        let mut value = String::new();
        let read = file.read_to_string(&mut value);
        let modified = file.metadata().and_then(|meta| meta.modified());
        let _ = fs2::FileExt::unlock(&file);
        read?;
        let issued_at = modified?;
        if value.is_empty() {
            return Ok(None);
        }
        Ok(Some(Token::new(value, issued_at, self.ttl)))
    }

    fn write_slot(&self, token: &Token) -> std::io::Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .open(&self.path)?;
        fs2::FileExt::lock_exclusive(&file)?;
        let written = file
            .set_len(0)
            .and_then(|_| (&file).write_all(token.access_token.as_bytes()))
            .and_then(|_| (&file).flush());
        let _ = fs2::FileExt::unlock(&file);
        written
    }
}

impl TokenStore for FileStore {
    fn read(&self) -> Option<Token> {
        match self.read_slot() {
            Ok(token) => token,
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "token slot unreadable, treating as miss");
                None
            }
        }
    }

    fn write(&self, token: &Token) {
        if let Err(err) = self.write_slot(token) {
            warn!(path = %self.path.display(), error = %err, "failed to persist token slot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn sample_token(value: &str) -> Token {
        Token::new(value.into(), SystemTime::now(), Duration::from_secs(600))
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.read().is_none());
        store.write(&sample_token("abc"));
        assert_eq!(store.read().unwrap().access_token, "abc");
    }

    #[test]
    fn file_store_round_trip_preserves_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), Duration::from_secs(600));
        store.write(&sample_token("eyJ0b2tlbiJ9.segredo==\n com espaços"));
        let token = store.read().unwrap();
        assert_eq!(token.access_token, "eyJ0b2tlbiJ9.segredo==\n com espaços");
        assert_eq!(token.ttl, Duration::from_secs(600));
    }

    #[test]
    fn missing_slot_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), Duration::from_secs(600));
        assert!(store.read().is_none());
    }

    #[test]
    fn empty_slot_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), Duration::from_secs(600));
        std::fs::write(store.path(), b"").unwrap();
        assert!(store.read().is_none());
    }

    #[test]
    fn overwrite_truncates_longer_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), Duration::from_secs(600));
        store.write(&sample_token("a-rather-long-first-token"));
        store.write(&sample_token("short"));
        assert_eq!(store.read().unwrap().access_token, "short");
    }

    #[test]
    fn issue_time_tracks_slot_modification_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), Duration::from_secs(600));
        let before = SystemTime::now() - Duration::from_secs(1);
        store.write(&sample_token("abc"));
        let after = SystemTime::now() + Duration::from_secs(1);
        let issued_at = store.read().unwrap().issued_at;
        assert!(issued_at >= before && issued_at <= after);
    }

    #[test]
    fn readers_never_observe_a_torn_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(FileStore::new(dir.path(), Duration::from_secs(600)));
        let first = "a".repeat(4096);
        let second = "b".repeat(4096);
        store.write(&sample_token(&first));

        let writer = {
            let store = std::sync::Arc::clone(&store);
            let values = [first.clone(), second.clone()];
            std::thread::spawn(move || {
                for round in 0..50 {
                    store.write(&sample_token(&values[round % 2]));
                }
            })
        };
        let reader = {
            let store = std::sync::Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    if let Some(token) = store.read() {
                        let uniform_a = token.access_token.bytes().all(|b| b == b'a');
                        let uniform_b = token.access_token.bytes().all(|b| b == b'b');
                        assert!(
                            uniform_a || uniform_b,
                            "observed a mixed slot value of length {}",
                            token.access_token.len()
                        );
                    }
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();
        let final_value = store.read().unwrap().access_token;
        assert_eq!(final_value, second);
    }
}
