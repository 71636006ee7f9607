// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Client-side proxy for a remote interface.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

use tracing::{debug, trace};

use crate::error::RpcError;
use crate::interface::{ensure_remote_interface, RemoteInterface};
use crate::skeleton::Skeleton;
use crate::value::{Argument, RemoteValue, ValueError};
use crate::wire::{read_frame, write_frame, CallRequest, CallResponse, RemoteRef, Value};

/// Proxy for interface `I` served at a fixed address.
///
/// Remote interfaces implement their trait for `Stub<dyn Trait>` by calling
/// [`Stub::invoke`]. Every call opens a fresh connection; there is no
/// connection reuse and no timeout beyond what TCP itself imposes.
pub struct Stub<I: ?Sized> {
    address: SocketAddr,
    _interface: PhantomData<fn() -> Box<I>>,
}

impl<I: RemoteInterface + ?Sized> Stub<I> {
    pub fn new(address: SocketAddr) -> Result<Self, RpcError> {
        ensure_remote_interface::<I>()?;
        Ok(Self {
            address,
            _interface: PhantomData,
        })
    }

    /// Resolve `host` and build a stub for `host:port`, preferring an IPv4
    /// address when the name has several.
    pub fn resolve(host: &str, port: u16) -> Result<Self, RpcError> {
        let addresses: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| RpcError::Network(format!("cannot resolve {}:{}: {}", host, port, e)))?
            .collect();
        // Skeletons listen on the IPv4 wildcard by default.
        let address = addresses
            .iter()
            .find(|address| address.is_ipv4())
            .or_else(|| addresses.first())
            .copied()
            .ok_or_else(|| RpcError::Network(format!("no addresses for {}:{}", host, port)))?;
        Self::new(address)
    }

    /// Stub for a running or previously started skeleton.
    ///
    /// A skeleton bound to the wildcard address is reached over loopback.
    pub fn for_skeleton(skeleton: &Skeleton<I>) -> Result<Self, RpcError> {
        let mut address = skeleton.address().ok_or_else(|| {
            RpcError::IllegalState(format!("{} skeleton has no address yet", I::NAME))
        })?;
        if address.ip().is_unspecified() {
            let loopback = match address {
                SocketAddr::V4(_) => std::net::Ipv4Addr::LOCALHOST.into(),
                SocketAddr::V6(_) => std::net::Ipv6Addr::LOCALHOST.into(),
            };
            address.set_ip(loopback);
        }
        Self::new(address)
    }

    /// Stub for a skeleton's port reached through an explicit hostname.
    pub fn for_skeleton_at(skeleton: &Skeleton<I>, hostname: &str) -> Result<Self, RpcError> {
        let port = skeleton
            .address()
            .ok_or_else(|| {
                RpcError::IllegalState(format!("{} skeleton has no address yet", I::NAME))
            })?
            .port();
        Self::resolve(hostname, port)
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Perform one remote call.
    ///
    /// Transport failures surface as [`RpcError::Network`]; errors raised by
    /// the remote method come back unchanged.
    pub fn invoke<R: RemoteValue>(&self, method: &str, args: Vec<Argument>) -> Result<R, RpcError> {
        let (arg_types, args): (Vec<_>, Vec<_>) = args
            .into_iter()
            .map(|arg| (arg.descriptor.into_bytes(), arg.value))
            .unzip();
        let request = CallRequest {
            interface: I::NAME.as_bytes().to_vec(),
            method: method.as_bytes().to_vec(),
            args,
            arg_types,
        };

        trace!(interface = I::NAME, method, address = %self.address, "remote call");
        let response = self.round_trip(&request).map_err(|e| {
            debug!(interface = I::NAME, method, address = %self.address, error = %e, "remote call failed");
            e
        })?;

        match response {
            CallResponse::Return(value) => R::from_value(value).map_err(|e| {
                RpcError::Network(format!("{}::{} returned malformed result: {}", I::NAME, method, e))
            }),
            CallResponse::Raise(wire) => Err(RpcError::from_wire(wire)),
        }
    }

    fn round_trip(&self, request: &CallRequest) -> Result<CallResponse, RpcError> {
        let mut stream = TcpStream::connect(self.address)
            .map_err(|e| RpcError::Network(format!("connect to {}: {}", self.address, e)))?;
        write_frame(&mut stream, request).map_err(RpcError::network)?;
        read_frame(&mut stream).map_err(RpcError::network)
    }
}

impl<I: ?Sized> Clone for Stub<I> {
    fn clone(&self) -> Self {
        Self {
            address: self.address,
            _interface: PhantomData,
        }
    }
}

impl<I: RemoteInterface + ?Sized> fmt::Debug for Stub<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stub<{}>({})", I::NAME, self.address)
    }
}

impl<I: RemoteInterface + ?Sized> fmt::Display for Stub<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", I::NAME, self.address)
    }
}

// The interface is part of the type, so equality only needs the address.
impl<I: ?Sized> PartialEq for Stub<I> {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl<I: ?Sized> Eq for Stub<I> {}

impl<I: RemoteInterface + ?Sized> Hash for Stub<I> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        I::NAME.hash(state);
        self.address.hash(state);
    }
}

impl<I: ?Sized> PartialOrd for Stub<I> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<I: ?Sized> Ord for Stub<I> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.address.cmp(&other.address)
    }
}

impl<I: RemoteInterface + ?Sized> RemoteValue for Stub<I> {
    fn descriptor() -> String {
        format!("remote<{}>", I::NAME)
    }

    fn into_value(self) -> Option<Value> {
        Some(Value::Remote(RemoteRef {
            interface: I::NAME.as_bytes().to_vec(),
            address: self.address.to_string().into_bytes(),
        }))
    }

    fn from_value(value: Option<Value>) -> Result<Self, ValueError> {
        let remote = match value {
            Some(Value::Remote(remote)) => remote,
            None => return Err(ValueError::Null),
            other => return Err(ValueError::mismatch::<Self>(other.as_ref())),
        };
        if remote.interface != I::NAME.as_bytes() {
            return Err(ValueError::Mismatch {
                expected: Self::descriptor(),
                found: format!("remote<{}>", String::from_utf8_lossy(&remote.interface)),
            });
        }
        let address = std::str::from_utf8(&remote.address)
            .map_err(ValueError::invalid::<Self>)?
            .parse::<SocketAddr>()
            .map_err(ValueError::invalid::<Self>)?;
        Stub::new(address).map_err(ValueError::invalid::<Self>)
    }
}
