use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::AppResult;
use super::session::SessionToken;

/// Durable single-slot storage for the bearer token.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> AppResult<Option<SessionToken>>;
    fn save(&self, token: &str) -> AppResult<()>;
    fn clear(&self) -> AppResult<()>;
}

pub type SharedTokenStore = Arc<dyn TokenStore>;

/// Token kept in a plain file, one line. A missing or blank file means "no token".
pub struct FileTokenStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileTokenStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf(), lock: RwLock::new(()) }
    }

    pub fn path(&self) -> &Path { &self.path }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> AppResult<Option<SessionToken>> {
        let _g = self.lock.read();
        match std::fs::read_to_string(&self.path) {
            Ok(s) => {
                let t = s.trim();
                Ok(if t.is_empty() { None } else { Some(t.to_string()) })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, token: &str) -> AppResult<()> {
        let _g = self.lock.write();
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        write_private(&self.path, token)?;
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        let _g = self.lock.write();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// Owner-only permissions on unix, including for a file that already existed.
#[cfg(unix)]
fn write_private(path: &Path, token: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let mut file = std::fs::OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(path)?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(token.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, token: &str) -> std::io::Result<()> { std::fs::write(path, token) }

/// Process-local slot, for tests and embedders that persist elsewhere.
#[derive(Default)]
pub struct MemoryTokenStore {
    slot: RwLock<Option<SessionToken>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: &str) -> Self { Self { slot: RwLock::new(Some(token.to_string())) } }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> AppResult<Option<SessionToken>> { Ok(self.slot.read().clone()) }

    fn save(&self, token: &str) -> AppResult<()> {
        *self.slot.write() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        *self.slot.write() = None;
        Ok(())
    }
}
