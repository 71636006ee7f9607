// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Remote method invocation over TCP.
//!
//! A remote interface is an ordinary trait whose trait object type implements
//! [`RemoteInterface`]. The server wraps an implementation in a [`Skeleton`];
//! clients call it through a [`Stub`], which implements the same trait by
//! forwarding every method as one request over one connection.

pub mod caller;
mod dispatch;
pub mod error;
pub mod interface;
pub mod pool;
pub mod skeleton;
pub mod stub;
pub mod value;
pub mod wire;

pub use caller::CallerId;
pub use error::{ErrorKind, RpcError, RpcResult};
pub use interface::{is_remote_interface, MethodTable, RemoteInterface};
pub use pool::WorkerPool;
pub use skeleton::{DefaultHooks, Skeleton, SkeletonConfig, SkeletonHooks};
pub use stub::Stub;
pub use value::{Argument, RemoteValue, ValueError};
