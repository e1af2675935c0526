use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

pub const SETTINGS_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum LockError {
    Busy {
        path: PathBuf,
        holder: Option<LockHolder>,
    },
    Io(std::io::Error),
}

/// What a held lock file says about its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolder {
    pub pid: Option<u32>,
    pub age: Option<Duration>,
}

impl LockHolder {
    fn read(path: &Path) -> Option<Self> {
        let pid = std::fs::read_to_string(path)
            .ok()
            .and_then(|contents| contents.trim().parse().ok());
        let age = std::fs::metadata(path)
            .and_then(|metadata| metadata.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok());
        if pid.is_none() && age.is_none() {
            None
        } else {
            Some(Self { pid, age })
        }
    }
}

impl std::fmt::Display for LockHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.pid, self.age) {
            (Some(pid), Some(age)) => write!(f, "held by pid {pid} for {}s", age.as_secs()),
            (Some(pid), None) => write!(f, "held by pid {pid}"),
            (None, Some(age)) => write!(f, "held for {}s", age.as_secs()),
            (None, None) => write!(f, "holder unknown"),
        }
    }
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockError::Busy { path, holder } => {
                write!(f, "lock busy: {}", path.display())?;
                if let Some(holder) = holder {
                    write!(f, " ({holder})")?;
                }
                write!(
                    f,
                    "; another install/uninstall is running, or a stale lock file was left \
                     behind and can be deleted"
                )
            }
            LockError::Io(err) => write!(f, "lock I/O error: {}", err),
        }
    }
}

impl std::error::Error for LockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LockError::Busy { .. } => None,
            LockError::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for LockError {
    fn from(value: std::io::Error) -> Self {
        LockError::Io(value)
    }
}

/// Advisory lock held by an exclusive lock file; the file is removed on drop.
/// The file carries the owner's pid so a stale lock can be traced.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    file: File,
}

impl FileLock {
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        let start = Instant::now();
        loop {
            match try_acquire(path)? {
                Some(guard) => {
                    tracing::debug!(lock = %path.display(), "acquired settings lock");
                    return Ok(guard);
                }
                None if start.elapsed() >= timeout => {
                    return Err(LockError::Busy {
                        path: path.to_path_buf(),
                        holder: LockHolder::read(path),
                    });
                }
                None => thread::sleep(Duration::from_millis(10)),
            }
        }
    }

    /// Lock file guarding a document: `<file>.lock` next to it.
    pub fn path_for(document: &Path) -> PathBuf {
        let mut name = document
            .file_name()
            .map(|value| value.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        document.with_file_name(name)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn try_acquire(path: &Path) -> Result<Option<FileLock>, LockError> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => {
            let lock = FileLock {
                path: path.to_path_buf(),
                file,
            };
            writeln!(&lock.file, "{}", std::process::id())?;
            Ok(Some(lock))
        }
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(None),
        Err(err) => Err(LockError::Io(err)),
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use uuid::Uuid;

    use super::{try_acquire, FileLock, LockError};

    fn lock_path() -> PathBuf {
        std::env::temp_dir().join(format!("mood-lifter-lock-test-{}.lock", Uuid::now_v7()))
    }

    #[test]
    fn try_lock_is_non_blocking() {
        let path = lock_path();
        let first = try_acquire(&path)
            .expect("initial lock should not fail")
            .expect("initial lock should succeed");
        let second = try_acquire(&path).expect("second lock call should not fail");
        assert!(second.is_none());
        drop(first);
        assert!(!path.exists());
    }

    #[test]
    fn acquire_times_out_when_held() {
        let path = lock_path();
        let first = try_acquire(&path)
            .expect("initial lock should not fail")
            .expect("initial lock should succeed");
        let err = FileLock::acquire(&path, Duration::from_millis(20))
            .expect_err("lock should time out when already held");
        assert!(err.to_string().contains("lock busy"));
        drop(first);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn busy_error_names_the_holding_pid() {
        let path = lock_path();
        let first = try_acquire(&path)
            .expect("initial lock should not fail")
            .expect("initial lock should succeed");
        let recorded = std::fs::read_to_string(&path).expect("lock file readable");
        assert_eq!(recorded.trim(), std::process::id().to_string());

        let err = FileLock::acquire(&path, Duration::from_millis(20))
            .expect_err("lock should time out when already held");
        let LockError::Busy { holder, .. } = &err else {
            panic!("expected busy, got {err:?}");
        };
        let holder = holder.as_ref().expect("holder should be readable");
        assert_eq!(holder.pid, Some(std::process::id()));
        assert!(err
            .to_string()
            .contains(&format!("held by pid {}", std::process::id())));
        drop(first);
    }

    #[test]
    fn busy_error_survives_a_stale_lock_without_pid() {
        let path = lock_path();
        std::fs::write(&path, "").expect("stale lock file");
        let err = FileLock::acquire(&path, Duration::from_millis(20))
            .expect_err("stale lock should block");
        let message = err.to_string();
        assert!(message.contains("held for"));
        assert!(message.contains("can be deleted"));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn lock_path_sits_next_to_document() {
        let lock = FileLock::path_for(Path::new("/home/dev/.claude/settings.json"));
        assert_eq!(lock, PathBuf::from("/home/dev/.claude/settings.json.lock"));
    }
}
