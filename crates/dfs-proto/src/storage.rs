// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Interfaces exposed by storage servers.
//!
//! Clients use [`Storage`] to move bytes; the naming server uses [`Command`]
//! to create, delete and replicate files.

use dfs_rmi::{Argument, ErrorKind, MethodTable, RemoteInterface, RpcResult, Stub};

use crate::Path;

const DATA_ERRORS: &[ErrorKind] = &[
    ErrorKind::Network,
    ErrorKind::NotFound,
    ErrorKind::OutOfBounds,
    ErrorKind::Io,
];

const COMMAND_ERRORS: &[ErrorKind] = &[ErrorKind::Network, ErrorKind::NotFound, ErrorKind::Io];

pub trait Storage: Send + Sync {
    /// Length of `file` in bytes; `NotFound` for missing files and directories.
    fn size(&self, file: &Path) -> RpcResult<u64>;

    /// Exactly `length` bytes starting at `offset`; `OutOfBounds` if the
    /// range extends past the end of the file.
    fn read(&self, file: &Path, offset: u64, length: u32) -> RpcResult<Vec<u8>>;

    /// Write at `offset`, extending the file with zeros if needed.
    fn write(&self, file: &Path, offset: u64, data: &[u8]) -> RpcResult<()>;
}

pub trait Command: Send + Sync {
    /// Create an empty file and any missing parent directories. False if
    /// the path is the root or already exists.
    fn create(&self, file: &Path) -> RpcResult<bool>;

    /// Delete a file or a directory tree. False for the root or a missing path.
    fn delete(&self, path: &Path) -> RpcResult<bool>;

    /// Replace the local copy of `file` with the one served by `source`.
    fn copy(&self, file: &Path, source: &Stub<dyn Storage>) -> RpcResult<bool>;
}

impl RemoteInterface for dyn Storage {
    const NAME: &'static str = "dfs.Storage";

    fn methods() -> MethodTable<Self> {
        MethodTable::new(Self::NAME)
            .method1("size", DATA_ERRORS, |s: &Self, file: Path| s.size(&file))
            .method3("read", DATA_ERRORS, |s: &Self, file: Path, offset: u64, length: u32| {
                s.read(&file, offset, length)
            })
            .method3("write", DATA_ERRORS, |s: &Self, file: Path, offset: u64, data: Vec<u8>| {
                s.write(&file, offset, &data)
            })
    }
}

impl RemoteInterface for dyn Command {
    const NAME: &'static str = "dfs.Command";

    fn methods() -> MethodTable<Self> {
        MethodTable::new(Self::NAME)
            .method1("create", COMMAND_ERRORS, |c: &Self, file: Path| c.create(&file))
            .method1("delete", COMMAND_ERRORS, |c: &Self, path: Path| c.delete(&path))
            .method2(
                "copy",
                COMMAND_ERRORS,
                |c: &Self, file: Path, source: Stub<dyn Storage>| c.copy(&file, &source),
            )
    }
}

impl Storage for Stub<dyn Storage> {
    fn size(&self, file: &Path) -> RpcResult<u64> {
        self.invoke("size", vec![Argument::of(file.clone())])
    }

    fn read(&self, file: &Path, offset: u64, length: u32) -> RpcResult<Vec<u8>> {
        self.invoke(
            "read",
            vec![
                Argument::of(file.clone()),
                Argument::of(offset),
                Argument::of(length),
            ],
        )
    }

    fn write(&self, file: &Path, offset: u64, data: &[u8]) -> RpcResult<()> {
        self.invoke(
            "write",
            vec![
                Argument::of(file.clone()),
                Argument::of(offset),
                Argument::of(data.to_vec()),
            ],
        )
    }
}

impl Command for Stub<dyn Command> {
    fn create(&self, file: &Path) -> RpcResult<bool> {
        self.invoke("create", vec![Argument::of(file.clone())])
    }

    fn delete(&self, path: &Path) -> RpcResult<bool> {
        self.invoke("delete", vec![Argument::of(path.clone())])
    }

    fn copy(&self, file: &Path, source: &Stub<dyn Storage>) -> RpcResult<bool> {
        self.invoke(
            "copy",
            vec![Argument::of(file.clone()), Argument::of(source.clone())],
        )
    }
}
