// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Naming server behaviour against in-process fake storage servers.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use dfs_naming::{NamingConfig, NamingServer};
use dfs_proto::{Command, Path, Registration, Service, Storage};
use dfs_rmi::{ErrorKind, RpcError, RpcResult, Skeleton, SkeletonConfig, Stub};
use dfs_test_utils::logged_test;

fn p(text: &str) -> Path {
    Path::parse(text).unwrap()
}

fn loopback() -> SkeletonConfig {
    SkeletonConfig::at(SocketAddr::from(([127, 0, 0, 1], 0)))
}

fn wait_for(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(10));
    }
}

#[derive(Default)]
struct FakeStorage {
    files: Mutex<BTreeSet<Path>>,
    deleted: Mutex<Vec<Path>>,
    copied: Mutex<Vec<Path>>,
    refuse_delete: AtomicBool,
}

impl Storage for FakeStorage {
    fn size(&self, file: &Path) -> RpcResult<u64> {
        if self.files.lock().unwrap().contains(file) {
            Ok(0)
        } else {
            Err(RpcError::NotFound(file.to_string()))
        }
    }

    fn read(&self, file: &Path, _offset: u64, length: u32) -> RpcResult<Vec<u8>> {
        self.size(file)?;
        Ok(vec![0; length as usize])
    }

    fn write(&self, file: &Path, _offset: u64, _data: &[u8]) -> RpcResult<()> {
        self.size(file).map(|_| ())
    }
}

impl Command for FakeStorage {
    fn create(&self, file: &Path) -> RpcResult<bool> {
        Ok(self.files.lock().unwrap().insert(file.clone()))
    }

    fn delete(&self, path: &Path) -> RpcResult<bool> {
        if self.refuse_delete.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.files.lock().unwrap().retain(|file| !file.is_subpath_of(path));
        self.deleted.lock().unwrap().push(path.clone());
        Ok(true)
    }

    fn copy(&self, file: &Path, source: &Stub<dyn Storage>) -> RpcResult<bool> {
        source.size(file)?;
        self.files.lock().unwrap().insert(file.clone());
        self.copied.lock().unwrap().push(file.clone());
        Ok(true)
    }
}

struct FakeServer {
    state: Arc<FakeStorage>,
    data: Skeleton<dyn Storage>,
    command: Skeleton<dyn Command>,
}

impl FakeServer {
    fn start() -> Self {
        let state = Arc::new(FakeStorage::default());
        let as_storage: Arc<dyn Storage> = state.clone();
        let as_command: Arc<dyn Command> = state.clone();
        let data = Skeleton::new(as_storage, loopback()).unwrap();
        let command = Skeleton::new(as_command, loopback()).unwrap();
        data.start().unwrap();
        command.start().unwrap();
        Self {
            state,
            data,
            command,
        }
    }

    fn data_stub(&self) -> Stub<dyn Storage> {
        Stub::for_skeleton(&self.data).unwrap()
    }

    fn register(&self, naming: &NamingServer, files: &[&str]) -> RpcResult<Vec<Path>> {
        let files: Vec<Path> = files.iter().map(|f| p(f)).collect();
        self.state.files.lock().unwrap().extend(files.iter().cloned());
        naming.registration_stub().unwrap().register(
            &self.data_stub(),
            &Stub::for_skeleton(&self.command).unwrap(),
            &files,
        )
    }

    fn deleted(&self) -> Vec<Path> {
        self.state.deleted.lock().unwrap().clone()
    }
}

fn naming_with(config: NamingConfig) -> (NamingServer, Stub<dyn Service>) {
    let server = NamingServer::new(&config).unwrap();
    server.start().unwrap();
    let stub = server.service_stub().unwrap();
    (server, stub)
}

fn naming() -> (NamingServer, Stub<dyn Service>) {
    naming_with(NamingConfig::loopback())
}

fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}

fn read_cycle(service: &Stub<dyn Service>, path: &Path) {
    service.lock(path, false).unwrap();
    service.unlock(path, false).unwrap();
}

fn replica_count(naming: &NamingServer, path: &Path) -> usize {
    naming.service().replicas(path).map_or(0, |r| r.len())
}

#[logged_test]
fn test_register_reports_duplicates_and_rejects_reregistration() {
    let (naming, service) = naming();
    let first = FakeServer::start();
    let second = FakeServer::start();

    assert!(first.register(&naming, &["/a/f", "/b"]).unwrap().is_empty());
    let duplicates = second.register(&naming, &["/a/f", "/c", "/", "/b/x"]).unwrap();
    assert_eq!(duplicates, vec![p("/a/f"), p("/b/x")]);

    let again = first.register(&naming, &["/z"]).unwrap_err();
    assert_eq!(again.kind(), ErrorKind::IllegalState);
    assert_eq!(naming.service().registered().len(), 2);
    assert_eq!(service.is_directory(&p("/z")).unwrap_err().kind(), ErrorKind::NotFound);

    assert_eq!(sorted(service.list(&Path::root()).unwrap()), vec!["a", "b", "c"]);
    assert!(service.is_directory(&p("/a")).unwrap());
    assert!(!service.is_directory(&p("/a/f")).unwrap());
    assert_eq!(service.get_storage(&p("/a/f")).unwrap(), first.data_stub());
    assert_eq!(service.get_storage(&p("/c")).unwrap(), second.data_stub());
}

#[test]
fn test_create_requires_a_registered_server() {
    let (_naming, service) = naming();
    assert_eq!(service.create_file(&p("/f")).unwrap_err().kind(), ErrorKind::IllegalState);
    assert_eq!(
        service.create_directory(&p("/d")).unwrap_err().kind(),
        ErrorKind::IllegalState
    );
}

#[logged_test]
fn test_create_list_and_get_storage() {
    let (naming, service) = naming();
    let storage = FakeServer::start();
    storage.register(&naming, &[]).unwrap();

    assert!(service.create_directory(&p("/d")).unwrap());
    assert!(!service.create_directory(&p("/d")).unwrap());
    assert!(service.create_file(&p("/d/f")).unwrap());
    assert!(!service.create_file(&p("/d/f")).unwrap());
    assert!(storage.state.files.lock().unwrap().contains(&p("/d/f")));

    assert!(!service.create_file(&Path::root()).unwrap());
    assert!(!service.create_directory(&Path::root()).unwrap());
    assert_eq!(service.create_file(&p("/missing/f")).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(service.create_file(&p("/d/f/g")).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(
        service.create_directory(&p("/missing/d")).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        service.create_directory(&p("/d/f/d")).unwrap_err().kind(),
        ErrorKind::NotFound
    );

    assert_eq!(service.list(&p("/d")).unwrap(), vec!["f"]);
    assert_eq!(service.list(&p("/d/f")).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(service.list(&p("/nope")).unwrap_err().kind(), ErrorKind::NotFound);

    assert_eq!(service.get_storage(&p("/d/f")).unwrap(), storage.data_stub());
    assert_eq!(service.get_storage(&p("/d")).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(service.get_storage(&p("/d/x")).unwrap_err().kind(), ErrorKind::NotFound);
}

#[logged_test]
fn test_delete_keeps_entry_when_a_replica_refuses() {
    let (naming, service) = naming();
    let storage = FakeServer::start();
    storage.register(&naming, &["/d/f", "/d/g"]).unwrap();

    assert_eq!(service.delete(&Path::root()).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(service.delete(&p("/d/x")).unwrap_err().kind(), ErrorKind::NotFound);

    storage.state.refuse_delete.store(true, Ordering::SeqCst);
    assert!(!service.delete(&p("/d/f")).unwrap());
    assert!(!service.is_directory(&p("/d/f")).unwrap());

    storage.state.refuse_delete.store(false, Ordering::SeqCst);
    assert!(service.delete(&p("/d/f")).unwrap());
    assert_eq!(service.is_directory(&p("/d/f")).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(service.list(&p("/d")).unwrap(), vec!["g"]);
    assert_eq!(storage.deleted(), vec![p("/d/f")]);

    assert!(service.delete(&p("/d")).unwrap());
    assert_eq!(service.is_directory(&p("/d/g")).unwrap_err().kind(), ErrorKind::NotFound);
    assert!(service.list(&Path::root()).unwrap().is_empty());
}

#[test]
fn test_lock_errors() {
    let (naming, service) = naming();
    FakeServer::start().register(&naming, &["/f"]).unwrap();

    assert_eq!(service.lock(&p("/missing"), false).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(
        service.unlock(&p("/missing"), false).unwrap_err().kind(),
        ErrorKind::IllegalArgument
    );
    assert_eq!(service.unlock(&p("/f"), false).unwrap_err().kind(), ErrorKind::IllegalArgument);
    assert_eq!(service.unlock(&p("/f"), true).unwrap_err().kind(), ErrorKind::IllegalArgument);

    service.lock(&p("/f"), false).unwrap();
    service.lock(&p("/f"), false).unwrap();
    service.unlock(&p("/f"), false).unwrap();
    service.unlock(&p("/f"), false).unwrap();
}

#[logged_test]
fn test_exclusive_ancestor_lock_blocks_descendant_readers() {
    let (naming, service) = naming();
    FakeServer::start().register(&naming, &["/d/f"]).unwrap();

    service.lock(&p("/d"), true).unwrap();

    let acquired = Arc::new(AtomicBool::new(false));
    let reader = {
        let service = service.clone();
        let acquired = acquired.clone();
        thread::spawn(move || {
            service.lock(&p("/d/f"), false).unwrap();
            acquired.store(true, Ordering::SeqCst);
            service.unlock(&p("/d/f"), false).unwrap();
        })
    };

    thread::sleep(Duration::from_millis(200));
    assert!(!acquired.load(Ordering::SeqCst));

    service.unlock(&p("/d"), true).unwrap();
    reader.join().unwrap();
    assert!(acquired.load(Ordering::SeqCst));
}

#[logged_test]
fn test_replication_after_threshold_reads() {
    let (naming, service) = naming();
    let first = FakeServer::start();
    let second = FakeServer::start();
    let third = FakeServer::start();
    first.register(&naming, &["/f"]).unwrap();
    second.register(&naming, &[]).unwrap();
    third.register(&naming, &[]).unwrap();
    let file = p("/f");

    for _ in 0..19 {
        read_cycle(&service, &file);
    }
    thread::sleep(Duration::from_millis(100));
    assert_eq!(replica_count(&naming, &file), 1);

    read_cycle(&service, &file);
    wait_for("first replica", || replica_count(&naming, &file) == 2);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(replica_count(&naming, &file), 2);

    let copies: usize = [&second, &third]
        .iter()
        .map(|s| s.state.copied.lock().unwrap().len())
        .sum();
    assert_eq!(copies, 1);
}

#[logged_test]
fn test_exclusive_lock_invalidates_all_but_one_replica() {
    let (naming, service) = naming_with(NamingConfig {
        replication_threshold: 3,
        ..NamingConfig::loopback()
    });
    let servers = [FakeServer::start(), FakeServer::start(), FakeServer::start()];
    servers[0].register(&naming, &["/dir/f"]).unwrap();
    servers[1].register(&naming, &[]).unwrap();
    servers[2].register(&naming, &[]).unwrap();
    let file = p("/dir/f");

    for expected in [2, 3] {
        for _ in 0..3 {
            read_cycle(&service, &file);
        }
        wait_for("replica", || replica_count(&naming, &file) == expected);
    }

    service.lock(&file, true).unwrap();
    assert_eq!(replica_count(&naming, &file), 1);
    let deletes: Vec<usize> = servers.iter().map(|s| s.deleted().len()).collect();
    assert_eq!(deletes.iter().sum::<usize>(), 2);

    let survivor = service.get_storage(&file).unwrap();
    let surviving = servers
        .iter()
        .position(|s| s.data_stub() == survivor)
        .unwrap();
    assert_eq!(deletes[surviving], 0);
    service.unlock(&file, true).unwrap();
}

#[test]
fn test_no_replication_without_spare_servers() {
    let (naming, service) = naming_with(NamingConfig {
        replication_threshold: 2,
        ..NamingConfig::loopback()
    });
    let only = FakeServer::start();
    only.register(&naming, &["/f"]).unwrap();

    for _ in 0..4 {
        read_cycle(&service, &p("/f"));
    }
    thread::sleep(Duration::from_millis(200));
    assert_eq!(replica_count(&naming, &p("/f")), 1);
    assert!(only.state.copied.lock().unwrap().is_empty());
}

#[logged_test]
fn test_replication_resumes_after_restart() {
    let naming = NamingServer::new(&NamingConfig {
        replication_threshold: 2,
        ..NamingConfig::loopback()
    })
    .unwrap();
    naming.start().unwrap();
    naming.stop();
    naming.start().unwrap();
    let service = naming.service_stub().unwrap();

    let first = FakeServer::start();
    let second = FakeServer::start();
    first.register(&naming, &["/f"]).unwrap();
    second.register(&naming, &[]).unwrap();

    for _ in 0..2 {
        read_cycle(&service, &p("/f"));
    }
    wait_for("replica after restart", || replica_count(&naming, &p("/f")) == 2);
    assert_eq!(second.state.copied.lock().unwrap().len(), 1);
}

#[test]
fn test_stopped_server_is_unreachable() {
    let (naming, service) = naming();
    assert!(service.list(&Path::root()).unwrap().is_empty());

    naming.stop();
    assert_eq!(service.list(&Path::root()).unwrap_err().kind(), ErrorKind::Network);
}
