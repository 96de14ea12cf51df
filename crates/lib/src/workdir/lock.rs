//! Exclusive advisory lock on a work directory.
//!
//! Two pipelines sharing a work directory would race on the checkout, the
//! CMake cache and the install tree. The lock makes the second one fail
//! fast instead.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::WORKDIR_LOCK;

#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
  pub version: u32,
  pub pid: u32,
  pub started_at_unix: u64,
  pub command: String,
  pub workdir: PathBuf,
}

#[derive(Debug, Error)]
pub enum WorkdirLockError {
  #[error(
    "work directory is in use by another process: {command} (PID {pid}, started at Unix time {started_at_unix})\n\
     If no buildstage process is running, remove the lock file:\n  {lock_path}"
  )]
  Contention {
    command: String,
    pid: u32,
    started_at_unix: u64,
    lock_path: PathBuf,
  },

  #[error(
    "work directory is in use (could not read lock metadata)\n\
     If no buildstage process is running, remove the lock file:\n  {lock_path}"
  )]
  ContentionUnknown { lock_path: PathBuf },

  #[error("failed to create work directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to open lock file: {0}")]
  OpenFile(#[source] io::Error),

  #[error("failed to write lock metadata: {0}")]
  WriteMetadata(#[source] io::Error),

  #[error("failed to acquire lock: {0}")]
  LockFailed(#[source] io::Error),
}

/// Held for as long as the work directory is in use; released on drop.
#[derive(Debug)]
pub struct WorkdirLock {
  file: File,
  lock_path: PathBuf,
}

impl WorkdirLock {
  /// Take the lock for `workdir`, creating the directory if needed.
  pub fn acquire(workdir: &Path, command: &str) -> Result<Self, WorkdirLockError> {
    std::fs::create_dir_all(workdir).map_err(WorkdirLockError::CreateDir)?;
    let lock_path = workdir.join(WORKDIR_LOCK);

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(WorkdirLockError::OpenFile)?;

    if let Err(err) = try_lock_exclusive(&file) {
      if err.kind() == io::ErrorKind::WouldBlock || is_lock_violation(&err) {
        return Err(read_contention_error(&lock_path));
      }
      return Err(WorkdirLockError::LockFailed(err));
    }

    write_metadata(&file, command, workdir)?;
    debug!(lock = %lock_path.display(), command, "acquired work directory lock");

    Ok(Self { file, lock_path })
  }

  /// Read the metadata through the held handle.
  pub fn read_metadata(&self) -> io::Result<LockMetadata> {
    use std::io::{Seek, SeekFrom};

    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }
}

fn write_metadata(file: &File, command: &str, workdir: &Path) -> Result<(), WorkdirLockError> {
  let metadata = LockMetadata {
    version: 1,
    pid: std::process::id(),
    started_at_unix: SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default()
      .as_secs(),
    command: command.to_string(),
    workdir: workdir.to_path_buf(),
  };

  file.set_len(0).map_err(WorkdirLockError::WriteMetadata)?;
  let mut writer = io::BufWriter::new(file);
  serde_json::to_writer_pretty(&mut writer, &metadata).map_err(|e| WorkdirLockError::WriteMetadata(io::Error::other(e)))?;
  writer.flush().map_err(WorkdirLockError::WriteMetadata)?;
  Ok(())
}

fn read_contention_error(lock_path: &Path) -> WorkdirLockError {
  let metadata = std::fs::read_to_string(lock_path)
    .ok()
    .and_then(|contents| serde_json::from_str::<LockMetadata>(&contents).ok());

  match metadata {
    Some(metadata) => WorkdirLockError::Contention {
      command: metadata.command,
      pid: metadata.pid,
      started_at_unix: metadata.started_at_unix,
      lock_path: lock_path.to_path_buf(),
    },
    None => WorkdirLockError::ContentionUnknown {
      lock_path: lock_path.to_path_buf(),
    },
  }
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive).map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(unix)]
fn is_lock_violation(_err: &io::Error) -> bool {
  false
}

#[cfg(windows)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;

  // SAFETY: OVERLAPPED is plain data and valid when zeroed; the handle is
  // owned by `file` for the duration of the call.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(
      handle,
      LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
      0,
      1,
      0,
      &mut overlapped,
    )
  };

  if result == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}

#[cfg(windows)]
fn is_lock_violation(err: &io::Error) -> bool {
  use windows_sys::Win32::Foundation::ERROR_LOCK_VIOLATION;
  err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32)
}
