// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-connection request handling.

use std::net::{Shutdown, TcpStream};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::caller::CallerId;
use crate::error::RpcError;
use crate::interface::{CallError, MethodTable, RemoteInterface};
use crate::skeleton::SkeletonHooks;
use crate::value::ValueError;
use crate::wire::{read_frame, write_frame, CallRequest, CallResponse};

pub(crate) struct Dispatcher<I: RemoteInterface + ?Sized> {
    implementation: Arc<I>,
    methods: Arc<MethodTable<I>>,
    hooks: Arc<dyn SkeletonHooks>,
}

impl<I: RemoteInterface + ?Sized> Clone for Dispatcher<I> {
    fn clone(&self) -> Self {
        Self {
            implementation: self.implementation.clone(),
            methods: self.methods.clone(),
            hooks: self.hooks.clone(),
        }
    }
}

impl<I: RemoteInterface + ?Sized> Dispatcher<I> {
    pub(crate) fn new(
        implementation: Arc<I>,
        methods: Arc<MethodTable<I>>,
        hooks: Arc<dyn SkeletonHooks>,
    ) -> Self {
        Self {
            implementation,
            methods,
            hooks,
        }
    }

    /// Serve exactly one request on `stream`, then close it.
    pub(crate) fn serve(&self, mut stream: TcpStream) {
        let request: CallRequest = match read_frame(&mut stream) {
            Ok(request) => request,
            Err(e) => {
                self.hooks
                    .service_error(&RpcError::Network(format!("{}: unreadable request: {}", I::NAME, e)));
                let _ = stream.shutdown(Shutdown::Both);
                return;
            }
        };

        let response = CallerId::scope(|| self.dispatch(request));

        if let Err(e) = write_frame(&mut stream, &response) {
            self.hooks
                .service_error(&RpcError::Network(format!("{}: cannot send response: {}", I::NAME, e)));
        }
        let _ = stream.shutdown(Shutdown::Both);
    }

    pub(crate) fn dispatch(&self, request: CallRequest) -> CallResponse {
        let interface = String::from_utf8_lossy(&request.interface);
        let method = String::from_utf8_lossy(&request.method).into_owned();
        let origin = format!("{}::{}", I::NAME, method);

        if interface != I::NAME {
            let err = RpcError::NoSuchMethod(format!(
                "{}::{} is not declared on {}",
                interface,
                method,
                I::NAME
            ));
            return CallResponse::Raise(err.to_wire(Some(&origin)));
        }

        let arg_types: Vec<String> = request
            .arg_types
            .iter()
            .map(|t| String::from_utf8_lossy(t).into_owned())
            .collect();

        let Some(target) = self.methods.resolve(&method, &arg_types) else {
            let err = RpcError::NoSuchMethod(format!("{}({})", origin, arg_types.join(", ")));
            return CallResponse::Raise(err.to_wire(Some(&origin)));
        };

        trace!(method = %origin, "dispatching");
        match target.call(&self.implementation, request.args) {
            Ok(value) => CallResponse::Return(value),
            Err(CallError::Raised(err)) => {
                debug!(method = %origin, error = %err, "remote method raised");
                CallResponse::Raise(err.to_wire(Some(&origin)))
            }
            Err(CallError::Argument {
                index,
                error: ValueError::Null,
            }) => {
                let err = RpcError::NullArgument(format!("{}: argument {} is null", origin, index));
                CallResponse::Raise(err.to_wire(Some(&origin)))
            }
            Err(defect) => {
                let err = RpcError::Network(format!("{}: cannot invoke: {}", origin, defect));
                self.hooks.service_error(&err);
                CallResponse::Raise(err.to_wire(Some(&origin)))
            }
        }
    }
}
