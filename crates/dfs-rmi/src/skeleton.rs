// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Server side of a remote interface: listener, accept thread, worker pool.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::dispatch::Dispatcher;
use crate::error::RpcError;
use crate::interface::{ensure_remote_interface, MethodTable, RemoteInterface};
use crate::pool::WorkerPool;

pub const DEFAULT_POOL_SIZE: usize = 10;

const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SkeletonConfig {
    /// Listen address; an ephemeral port on all interfaces when `None`
    pub address: Option<SocketAddr>,
    pub pool_size: usize,
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            address: None,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl SkeletonConfig {
    pub fn at(address: SocketAddr) -> Self {
        Self {
            address: Some(address),
            ..Self::default()
        }
    }

    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }
}

/// Callbacks for skeleton lifecycle and failures. All methods have defaults.
pub trait SkeletonHooks: Send + Sync + 'static {
    /// Called once when a listener exits. `cause` is `None` for a requested stop.
    fn stopped(&self, cause: Option<&RpcError>) {
        match cause {
            None => debug!("skeleton stopped"),
            Some(cause) => error!(error = %cause, "skeleton stopped on error"),
        }
    }

    /// Accept failed outside of shutdown. Return true to keep listening.
    fn listen_error(&self, _error: &io::Error) -> bool {
        false
    }

    /// A single connection could not be served.
    fn service_error(&self, error: &RpcError) {
        warn!(error = %error, "service error");
    }
}

pub struct DefaultHooks;

impl SkeletonHooks for DefaultHooks {}

struct Listener {
    address: SocketAddr,
    shutdown: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

struct State {
    listener: Option<Listener>,
    last_address: Option<SocketAddr>,
}

pub struct Skeleton<I: RemoteInterface + ?Sized> {
    implementation: Arc<I>,
    methods: Arc<MethodTable<I>>,
    config: SkeletonConfig,
    hooks: Arc<dyn SkeletonHooks>,
    state: Mutex<State>,
}

impl<I: RemoteInterface + ?Sized> Skeleton<I> {
    pub fn new(implementation: Arc<I>, config: SkeletonConfig) -> Result<Self, RpcError> {
        ensure_remote_interface::<I>()?;
        Ok(Self {
            implementation,
            methods: Arc::new(I::methods()),
            state: Mutex::new(State {
                listener: None,
                last_address: config.address,
            }),
            config,
            hooks: Arc::new(DefaultHooks),
        })
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn SkeletonHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Bound address while running; otherwise the last bound or configured one.
    pub fn address(&self) -> Option<SocketAddr> {
        let state = self.state.lock().unwrap();
        state
            .listener
            .as_ref()
            .map(|listener| listener.address)
            .or(state.last_address)
    }

    pub fn is_running(&self) -> bool {
        let state = self.state.lock().unwrap();
        state
            .listener
            .as_ref()
            .is_some_and(|listener| !listener.thread.is_finished())
    }

    /// Bind and start accepting. A stopped skeleton may be started again.
    pub fn start(&self) -> Result<(), RpcError> {
        let mut state = self.state.lock().unwrap();
        if let Some(listener) = &state.listener {
            if !listener.thread.is_finished() {
                return Err(RpcError::AlreadyRunning(format!(
                    "{} skeleton on {}",
                    I::NAME,
                    listener.address
                )));
            }
        }
        if let Some(finished) = state.listener.take() {
            let _ = finished.thread.join();
        }

        let bind_address = self
            .config
            .address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 0)));
        let socket = TcpListener::bind(bind_address)
            .map_err(|e| RpcError::Network(format!("cannot bind {}: {}", bind_address, e)))?;
        let address = socket.local_addr().map_err(RpcError::network)?;

        let pool = WorkerPool::new(&format!("rmi-{}", I::NAME), self.config.pool_size)
            .map_err(|e| RpcError::Network(format!("cannot start worker pool: {}", e)))?;
        let dispatcher = Dispatcher::new(
            self.implementation.clone(),
            self.methods.clone(),
            self.hooks.clone(),
        );
        let shutdown = Arc::new(AtomicBool::new(false));
        let accept_loop = AcceptLoop {
            socket,
            pool,
            dispatcher,
            hooks: self.hooks.clone(),
            shutdown: shutdown.clone(),
        };

        let thread = thread::Builder::new()
            .name(format!("rmi-accept-{}", I::NAME))
            .spawn(move || accept_loop.run())
            .map_err(|e| RpcError::Network(format!("cannot spawn accept thread: {}", e)))?;

        info!(interface = I::NAME, address = %address, "skeleton started");
        state.listener = Some(Listener {
            address,
            shutdown,
            thread,
        });
        state.last_address = Some(address);
        Ok(())
    }

    /// Stop accepting connections. Queued connections are dropped; calls
    /// already executing run to completion. Does nothing if not running.
    pub fn stop(&self) {
        let listener = self.state.lock().unwrap().listener.take();
        if let Some(listener) = listener {
            listener.shutdown.store(true, Ordering::Release);
            if !listener.thread.is_finished() {
                wake(listener.address);
            }
            if listener.thread.join().is_err() {
                error!(interface = I::NAME, "accept thread panicked");
            }
        }
    }
}

/// Unblock an accept thread by connecting to its listener once.
fn wake(address: SocketAddr) {
    let mut target = address;
    if target.ip().is_unspecified() {
        target.set_ip(match target {
            SocketAddr::V4(_) => Ipv4Addr::LOCALHOST.into(),
            SocketAddr::V6(_) => Ipv6Addr::LOCALHOST.into(),
        });
    }
    if let Err(e) = TcpStream::connect_timeout(&target, WAKE_TIMEOUT) {
        warn!(address = %target, error = %e, "cannot wake accept thread");
    }
}

impl<I: RemoteInterface + ?Sized> Drop for Skeleton<I> {
    fn drop(&mut self) {
        self.stop();
    }
}

struct AcceptLoop<I: RemoteInterface + ?Sized> {
    socket: TcpListener,
    pool: WorkerPool,
    dispatcher: Dispatcher<I>,
    hooks: Arc<dyn SkeletonHooks>,
    shutdown: Arc<AtomicBool>,
}

impl<I: RemoteInterface + ?Sized> AcceptLoop<I> {
    fn run(mut self) {
        let cause = loop {
            let accepted = self.socket.accept();
            if self.shutdown.load(Ordering::Acquire) {
                break None;
            }

            match accepted {
                Ok((stream, peer)) => {
                    debug!(interface = I::NAME, peer = %peer, "accepted connection");
                    let dispatcher = self.dispatcher.clone();
                    self.pool.execute(move || dispatcher.serve(stream));
                }
                Err(e) => {
                    if self.hooks.listen_error(&e) {
                        continue;
                    }
                    break Some(RpcError::Network(format!("{}: accept failed: {}", I::NAME, e)));
                }
            }
        };

        self.pool.shutdown_now();
        drop(self.socket);
        self.hooks.stopped(cause.as_ref());
    }
}
