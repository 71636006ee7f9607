// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The local directory served by a storage server.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use dfs_proto::{Command, Path, Storage};
use dfs_rmi::{RpcError, RpcResult, Stub};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Largest single read issued while copying from another server.
pub const COPY_CHUNK: u32 = 1024 * 1024;

fn io_error(path: &Path, err: io::Error) -> RpcError {
    RpcError::Io(format!("{}: {}", path, err))
}

pub struct LocalFiles {
    root: PathBuf,
    io: Mutex<()>,
}

impl LocalFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            io: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn local(&self, path: &Path) -> PathBuf {
        path.components().fold(self.root.clone(), |local, c| local.join(c))
    }

    /// Length of a regular file, `NotFound` for anything else.
    fn file_len(&self, path: &Path) -> RpcResult<u64> {
        match fs::metadata(self.local(path)) {
            Ok(meta) if meta.is_file() => Ok(meta.len()),
            Ok(_) => Err(RpcError::NotFound(format!("{} is a directory", path))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(RpcError::NotFound(format!("{} does not exist", path)))
            }
            Err(e) => Err(io_error(path, e)),
        }
    }

    /// Every regular file beneath the root.
    pub fn list(&self) -> RpcResult<Vec<Path>> {
        let _io = self.io.lock().unwrap();
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| RpcError::Io(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let text = format!("/{}", relative.to_string_lossy());
            match Path::parse(&text) {
                Ok(path) => files.push(path),
                Err(e) => warn!(file = %entry.path().display(), error = %e, "skipping unservable file"),
            }
        }
        Ok(files)
    }

    /// Delete `path` and remove directories it leaves empty, up to the root.
    pub fn remove_and_prune(&self, path: &Path) -> RpcResult<()> {
        self.delete(path)?;
        let _io = self.io.lock().unwrap();
        let mut parent = path.parent();
        while let Some(dir) = parent.filter(|dir| !dir.is_root()) {
            let local = self.local(&dir);
            let empty = fs::read_dir(&local)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if !empty {
                break;
            }
            fs::remove_dir(&local).map_err(|e| io_error(&dir, e))?;
            debug!(path = %dir, "pruned empty directory");
            parent = dir.parent();
        }
        Ok(())
    }

    fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).open(self.local(path))?;
        if offset > file.metadata()?.len() {
            file.set_len(offset)?;
        }
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)
    }
}

impl Storage for LocalFiles {
    fn size(&self, file: &Path) -> RpcResult<u64> {
        let _io = self.io.lock().unwrap();
        self.file_len(file)
    }

    fn read(&self, file: &Path, offset: u64, length: u32) -> RpcResult<Vec<u8>> {
        let _io = self.io.lock().unwrap();
        let len = self.file_len(file)?;
        let end = offset.checked_add(u64::from(length));
        if end.map_or(true, |end| end > len) {
            return Err(RpcError::OutOfBounds(format!(
                "{}: {} bytes at offset {} exceed length {}",
                file, length, offset, len
            )));
        }

        let mut buffer = vec![0; length as usize];
        let mut handle = File::open(self.local(file)).map_err(|e| io_error(file, e))?;
        handle
            .seek(SeekFrom::Start(offset))
            .and_then(|_| handle.read_exact(&mut buffer))
            .map_err(|e| io_error(file, e))?;
        Ok(buffer)
    }

    fn write(&self, file: &Path, offset: u64, data: &[u8]) -> RpcResult<()> {
        let _io = self.io.lock().unwrap();
        self.file_len(file)?;
        if offset.checked_add(data.len() as u64).is_none() {
            return Err(RpcError::OutOfBounds(format!("{}: offset {} overflows", file, offset)));
        }
        self.write_at(file, offset, data).map_err(|e| io_error(file, e))
    }
}

impl Command for LocalFiles {
    fn create(&self, file: &Path) -> RpcResult<bool> {
        let Some(parent) = file.parent() else {
            return Ok(false);
        };
        let _io = self.io.lock().unwrap();
        let local = self.local(file);
        if local.exists() {
            return Ok(false);
        }
        fs::create_dir_all(self.local(&parent)).map_err(|e| io_error(&parent, e))?;
        match OpenOptions::new().write(true).create_new(true).open(&local) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(io_error(file, e)),
        }
    }

    fn delete(&self, path: &Path) -> RpcResult<bool> {
        if path.is_root() {
            return Ok(false);
        }
        let _io = self.io.lock().unwrap();
        let local = self.local(path);
        let removed = match fs::symlink_metadata(&local) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&local),
            Ok(_) => fs::remove_file(&local),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => Err(e),
        };
        removed.map(|()| true).map_err(|e| io_error(path, e))
    }

    fn copy(&self, file: &Path, source: &Stub<dyn Storage>) -> RpcResult<bool> {
        let len = source.size(file)?;
        let mut contents = Vec::with_capacity(len as usize);
        while (contents.len() as u64) < len {
            let offset = contents.len() as u64;
            let chunk = (len - offset).min(u64::from(COPY_CHUNK)) as u32;
            contents.extend(source.read(file, offset, chunk)?);
        }

        let Some(parent) = file.parent() else {
            return Ok(false);
        };
        let _io = self.io.lock().unwrap();
        let local = self.local(file);
        if local.is_dir() {
            fs::remove_dir_all(&local).map_err(|e| io_error(file, e))?;
        }
        fs::create_dir_all(self.local(&parent)).map_err(|e| io_error(&parent, e))?;
        fs::write(&local, &contents).map_err(|e| io_error(file, e))?;
        debug!(path = %file, bytes = len, source = %source, "copied");
        Ok(true)
    }
}
