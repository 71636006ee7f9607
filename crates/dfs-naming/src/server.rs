// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::net::SocketAddr;
use std::sync::Arc;

use dfs_proto::{Registration, Service};
use dfs_rmi::{RpcError, RpcResult, Skeleton, SkeletonConfig, Stub};
use tracing::info;

use crate::config::NamingConfig;
use crate::service::NamingService;

/// The naming service behind its two skeletons.
pub struct NamingServer {
    service: Arc<NamingService>,
    service_skeleton: Skeleton<dyn Service>,
    registration_skeleton: Skeleton<dyn Registration>,
}

impl NamingServer {
    pub fn new(config: &NamingConfig) -> RpcResult<Self> {
        let service = Arc::new(NamingService::new(config)?);

        let as_service: Arc<dyn Service> = service.clone();
        let service_skeleton = Skeleton::new(
            as_service,
            SkeletonConfig::at(config.service_address).pool_size(config.pool_size),
        )?;
        let as_registration: Arc<dyn Registration> = service.clone();
        let registration_skeleton = Skeleton::new(
            as_registration,
            SkeletonConfig::at(config.registration_address).pool_size(config.pool_size),
        )?;

        Ok(Self {
            service,
            service_skeleton,
            registration_skeleton,
        })
    }

    /// Start both interfaces. If either fails to start, neither is left running.
    pub fn start(&self) -> RpcResult<()> {
        self.service
            .start()
            .map_err(|e| RpcError::Network(format!("cannot start replication pool: {}", e)))?;
        self.service_skeleton.start()?;
        if let Err(e) = self.registration_skeleton.start() {
            self.service_skeleton.stop();
            return Err(e);
        }
        info!(
            component = "naming",
            service = ?self.service_skeleton.address(),
            registration = ?self.registration_skeleton.address(),
            "naming server started"
        );
        Ok(())
    }

    pub fn stop(&self) {
        self.service_skeleton.stop();
        self.registration_skeleton.stop();
        self.service.shutdown();
        info!(component = "naming", "naming server stopped");
    }

    pub fn service(&self) -> &Arc<NamingService> {
        &self.service
    }

    pub fn service_address(&self) -> Option<SocketAddr> {
        self.service_skeleton.address()
    }

    pub fn registration_address(&self) -> Option<SocketAddr> {
        self.registration_skeleton.address()
    }

    pub fn service_stub(&self) -> Result<Stub<dyn Service>, RpcError> {
        Stub::for_skeleton(&self.service_skeleton)
    }

    pub fn registration_stub(&self) -> Result<Stub<dyn Registration>, RpcError> {
        Stub::for_skeleton(&self.registration_skeleton)
    }
}
