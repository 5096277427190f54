// access.rs
//! Scoped file-access grants.
//!
//! Sandboxed hosts only allow touching user-picked files between a
//! "begin access" and an "end access" call. The pipeline asks a
//! [`FileAccessProvider`] for a grant before any I/O on a path and holds it
//! in a [`ScopedAccess`] guard, which hands it back on drop.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("no access grant for {0}")]
    Denied(PathBuf),

    #[error("access grant for {0} was revoked")]
    Revoked(PathBuf),
}

/// Opaque token returned by a provider for one path.
#[derive(Debug, PartialEq, Eq)]
pub struct AccessGrant {
    path: PathBuf,
    token: u64,
}

impl AccessGrant {
    pub fn new(path: impl Into<PathBuf>, token: u64) -> Self {
        Self {
            path: path.into(),
            token,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn token(&self) -> u64 {
        self.token
    }
}

pub trait FileAccessProvider: Send + Sync {
    fn acquire(&self, path: &Path) -> Result<AccessGrant, AccessError>;

    fn release(&self, grant: AccessGrant);
}

/// Grants everything. Used when the process is not sandboxed.
#[derive(Debug, Default)]
pub struct Unrestricted {
    next_token: AtomicU64,
}

impl FileAccessProvider for Unrestricted {
    fn acquire(&self, path: &Path) -> Result<AccessGrant, AccessError> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        Ok(AccessGrant::new(path, token))
    }

    fn release(&self, _grant: AccessGrant) {}
}

/// Grants paths under a fixed set of root directories.
#[derive(Debug, Default)]
pub struct RootedAccess {
    roots: Vec<PathBuf>,
    next_token: AtomicU64,
}

impl RootedAccess {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            next_token: AtomicU64::new(0),
        }
    }
}

impl FileAccessProvider for RootedAccess {
    fn acquire(&self, path: &Path) -> Result<AccessGrant, AccessError> {
        if self.roots.iter().any(|root| path.starts_with(root)) {
            let token = self.next_token.fetch_add(1, Ordering::Relaxed);
            Ok(AccessGrant::new(path, token))
        } else {
            Err(AccessError::Denied(path.to_path_buf()))
        }
    }

    fn release(&self, grant: AccessGrant) {
        log::debug!("released access to {}", grant.path().display());
    }
}

/// Holds a grant for as long as it lives.
pub struct ScopedAccess<'a> {
    provider: &'a dyn FileAccessProvider,
    grant: Option<AccessGrant>,
}

impl<'a> ScopedAccess<'a> {
    pub fn begin(provider: &'a dyn FileAccessProvider, path: &Path) -> Result<Self, AccessError> {
        let grant = provider.acquire(path)?;
        Ok(Self {
            provider,
            grant: Some(grant),
        })
    }
}

impl Drop for ScopedAccess<'_> {
    fn drop(&mut self) {
        if let Some(grant) = self.grant.take() {
            self.provider.release(grant);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        released: Mutex<Vec<u64>>,
        inner: Unrestricted,
    }

    impl FileAccessProvider for Recording {
        fn acquire(&self, path: &Path) -> Result<AccessGrant, AccessError> {
            self.inner.acquire(path)
        }

        fn release(&self, grant: AccessGrant) {
            self.released.lock().push(grant.token());
        }
    }

    #[test]
    fn guard_releases_on_drop() {
        let provider = Recording::default();
        {
            let _a = ScopedAccess::begin(&provider, Path::new("/tmp/a.png")).unwrap();
            let _b = ScopedAccess::begin(&provider, Path::new("/tmp/b.png")).unwrap();
        }
        let mut released = provider.released.lock().clone();
        released.sort();
        assert_eq!(released, vec![0, 1]);
    }

    #[test]
    fn guard_releases_on_early_return() {
        fn fails(provider: &dyn FileAccessProvider) -> Result<(), AccessError> {
            let _guard = ScopedAccess::begin(provider, Path::new("/tmp/c.png"))?;
            Err(AccessError::Revoked(PathBuf::from("/tmp/c.png")))
        }
        let provider = Recording::default();
        assert!(fails(&provider).is_err());
        assert_eq!(provider.released.lock().len(), 1);
    }

    #[test]
    fn rooted_access_denies_outside_roots() {
        let provider = RootedAccess::new(["/home/user/Pictures"]);
        assert!(provider.acquire(Path::new("/home/user/Pictures/cat.png")).is_ok());
        assert_eq!(
            provider.acquire(Path::new("/etc/passwd")),
            Err(AccessError::Denied(PathBuf::from("/etc/passwd")))
        );
    }
}
