// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Types shared by dfs clients, the naming server and storage servers.

pub mod naming;
pub mod path;
pub mod storage;

pub use naming::{
    registration_stub, service_stub, Registration, Service, REGISTRATION_PORT, SERVICE_PORT,
};
pub use path::{Path, PathError};
pub use storage::{Command, Storage};

#[cfg(test)]
mod tests {
    use super::*;
    use dfs_rmi::{is_remote_interface, RemoteValue};

    #[test]
    fn test_all_interfaces_are_remote() {
        assert!(is_remote_interface::<dyn Storage>());
        assert!(is_remote_interface::<dyn Command>());
        assert!(is_remote_interface::<dyn Service>());
        assert!(is_remote_interface::<dyn Registration>());
    }

    #[test]
    fn test_register_signature_descriptors() {
        let table = <dyn Registration as dfs_rmi::RemoteInterface>::methods();
        let params = [
            <dfs_rmi::Stub<dyn Storage>>::descriptor(),
            <dfs_rmi::Stub<dyn Command>>::descriptor(),
            <Vec<Path>>::descriptor(),
        ];
        assert_eq!(params[2], "list<dfs.Path>");
        assert!(table.resolve("register", &params).is_some());
    }
}
