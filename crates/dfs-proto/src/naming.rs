// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Interfaces exposed by the naming server.

use dfs_rmi::{Argument, ErrorKind, MethodTable, RemoteInterface, RpcResult, Stub};

use crate::storage::{Command, Storage};
use crate::Path;

/// Well-known port of the client-facing [`Service`] interface
pub const SERVICE_PORT: u16 = 6000;
/// Well-known port of the [`Registration`] interface
pub const REGISTRATION_PORT: u16 = 6001;

const SERVICE_ERRORS: &[ErrorKind] = &[
    ErrorKind::Network,
    ErrorKind::NotFound,
    ErrorKind::IllegalState,
    ErrorKind::IllegalArgument,
];

const REGISTRATION_ERRORS: &[ErrorKind] = &[
    ErrorKind::Network,
    ErrorKind::IllegalState,
    ErrorKind::NullArgument,
];

/// Client view of the namespace.
///
/// Clients are expected to lock a path (shared for reads, exclusive for
/// writes) around any operation on it and to release it with the same mode.
pub trait Service: Send + Sync {
    /// Lock `path`, shared-locking every ancestor first. Blocks until granted.
    fn lock(&self, path: &Path, exclusive: bool) -> RpcResult<()>;

    /// Release a lock taken with [`Service::lock`]. `IllegalArgument` if the
    /// path does not exist or no such lock is held.
    fn unlock(&self, path: &Path, exclusive: bool) -> RpcResult<()>;

    fn is_directory(&self, path: &Path) -> RpcResult<bool>;

    /// Names of the direct children of `directory`, in no particular order.
    fn list(&self, directory: &Path) -> RpcResult<Vec<String>>;

    fn create_file(&self, file: &Path) -> RpcResult<bool>;

    fn create_directory(&self, directory: &Path) -> RpcResult<bool>;

    fn delete(&self, path: &Path) -> RpcResult<bool>;

    /// Data interface of one storage server holding `file`.
    fn get_storage(&self, file: &Path) -> RpcResult<Stub<dyn Storage>>;
}

pub trait Registration: Send + Sync {
    /// Register a storage server and the files it already holds. Returns
    /// the files the namespace already knows about; the storage server
    /// should delete its copies of them.
    fn register(
        &self,
        client: &Stub<dyn Storage>,
        command: &Stub<dyn Command>,
        files: &[Path],
    ) -> RpcResult<Vec<Path>>;
}

impl RemoteInterface for dyn Service {
    const NAME: &'static str = "dfs.Service";

    fn methods() -> MethodTable<Self> {
        MethodTable::new(Self::NAME)
            .method2("lock", SERVICE_ERRORS, |s: &Self, path: Path, exclusive: bool| {
                s.lock(&path, exclusive)
            })
            .method2("unlock", SERVICE_ERRORS, |s: &Self, path: Path, exclusive: bool| {
                s.unlock(&path, exclusive)
            })
            .method1("is_directory", SERVICE_ERRORS, |s: &Self, path: Path| s.is_directory(&path))
            .method1("list", SERVICE_ERRORS, |s: &Self, directory: Path| s.list(&directory))
            .method1("create_file", SERVICE_ERRORS, |s: &Self, file: Path| s.create_file(&file))
            .method1("create_directory", SERVICE_ERRORS, |s: &Self, directory: Path| {
                s.create_directory(&directory)
            })
            .method1("delete", SERVICE_ERRORS, |s: &Self, path: Path| s.delete(&path))
            .method1("get_storage", SERVICE_ERRORS, |s: &Self, file: Path| s.get_storage(&file))
    }
}

impl RemoteInterface for dyn Registration {
    const NAME: &'static str = "dfs.Registration";

    fn methods() -> MethodTable<Self> {
        MethodTable::new(Self::NAME).method3(
            "register",
            REGISTRATION_ERRORS,
            |r: &Self, client: Stub<dyn Storage>, command: Stub<dyn Command>, files: Vec<Path>| {
                r.register(&client, &command, &files)
            },
        )
    }
}

impl Service for Stub<dyn Service> {
    fn lock(&self, path: &Path, exclusive: bool) -> RpcResult<()> {
        self.invoke("lock", vec![Argument::of(path.clone()), Argument::of(exclusive)])
    }

    fn unlock(&self, path: &Path, exclusive: bool) -> RpcResult<()> {
        self.invoke("unlock", vec![Argument::of(path.clone()), Argument::of(exclusive)])
    }

    fn is_directory(&self, path: &Path) -> RpcResult<bool> {
        self.invoke("is_directory", vec![Argument::of(path.clone())])
    }

    fn list(&self, directory: &Path) -> RpcResult<Vec<String>> {
        self.invoke("list", vec![Argument::of(directory.clone())])
    }

    fn create_file(&self, file: &Path) -> RpcResult<bool> {
        self.invoke("create_file", vec![Argument::of(file.clone())])
    }

    fn create_directory(&self, directory: &Path) -> RpcResult<bool> {
        self.invoke("create_directory", vec![Argument::of(directory.clone())])
    }

    fn delete(&self, path: &Path) -> RpcResult<bool> {
        self.invoke("delete", vec![Argument::of(path.clone())])
    }

    fn get_storage(&self, file: &Path) -> RpcResult<Stub<dyn Storage>> {
        self.invoke("get_storage", vec![Argument::of(file.clone())])
    }
}

impl Registration for Stub<dyn Registration> {
    fn register(
        &self,
        client: &Stub<dyn Storage>,
        command: &Stub<dyn Command>,
        files: &[Path],
    ) -> RpcResult<Vec<Path>> {
        self.invoke(
            "register",
            vec![
                Argument::of(client.clone()),
                Argument::of(command.clone()),
                Argument::of(files.to_vec()),
            ],
        )
    }
}

/// Stub for the [`Service`] interface of the naming server on `host`.
pub fn service_stub(host: &str) -> RpcResult<Stub<dyn Service>> {
    Stub::resolve(host, SERVICE_PORT)
}

/// Stub for the [`Registration`] interface of the naming server on `host`.
pub fn registration_stub(host: &str) -> RpcResult<Stub<dyn Registration>> {
    Stub::resolve(host, REGISTRATION_PORT)
}
