// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Remote interface descriptors and per-interface method tables.
//!
//! A remote interface is a trait object type (`dyn Storage`, ...) that
//! implements [`RemoteInterface`]. Its [`MethodTable`] is the registry the
//! dispatcher resolves incoming calls against, keyed by method name and the
//! ordered parameter type descriptors.

use std::collections::HashMap;
use std::fmt;

use crate::error::{ErrorKind, RpcError};
use crate::value::{RemoteValue, ValueError};
use crate::wire::Value;

pub trait RemoteInterface: Send + Sync + 'static {
    /// Interface name sent in every request
    const NAME: &'static str;

    fn methods() -> MethodTable<Self>;
}

/// True iff every method of `I` declares [`ErrorKind::Network`] among the
/// errors it may raise.
pub fn is_remote_interface<I: RemoteInterface + ?Sized>() -> bool {
    I::methods()
        .signatures()
        .all(|signature| signature.throws.contains(&ErrorKind::Network))
}

pub(crate) fn ensure_remote_interface<I: RemoteInterface + ?Sized>() -> Result<(), RpcError> {
    if is_remote_interface::<I>() {
        Ok(())
    } else {
        Err(RpcError::NotRemoteInterface(format!(
            "{} has methods that do not declare network failure",
            I::NAME
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub name: &'static str,
    pub params: Vec<String>,
    pub throws: &'static [ErrorKind],
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.params.join(", "))
    }
}

/// Why an invocation did not produce a return value
#[derive(Debug)]
pub enum CallError {
    /// Raised by the method body; goes back to the caller verbatim
    Raised(RpcError),
    Arity { expected: usize, found: usize },
    Argument { index: usize, error: ValueError },
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Raised(err) => write!(f, "{}", err),
            CallError::Arity { expected, found } => {
                write!(f, "expected {} arguments, found {}", expected, found)
            }
            CallError::Argument { index, error } => write!(f, "argument {}: {}", index, error),
        }
    }
}

type Handler<I> = Box<dyn Fn(&I, Vec<Option<Value>>) -> Result<Option<Value>, CallError> + Send + Sync>;

pub struct Method<I: ?Sized> {
    signature: MethodSignature,
    handler: Handler<I>,
}

impl<I: ?Sized> Method<I> {
    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    pub fn call(&self, target: &I, args: Vec<Option<Value>>) -> Result<Option<Value>, CallError> {
        if args.len() != self.signature.params.len() {
            return Err(CallError::Arity {
                expected: self.signature.params.len(),
                found: args.len(),
            });
        }
        (self.handler)(target, args)
    }
}

pub struct MethodTable<I: ?Sized> {
    interface: &'static str,
    methods: HashMap<(String, Vec<String>), Method<I>>,
}

fn decode<T: RemoteValue>(index: usize, value: Option<Value>) -> Result<T, CallError> {
    T::from_value(value).map_err(|error| CallError::Argument { index, error })
}

fn encode<R: RemoteValue>(result: Result<R, RpcError>) -> Result<Option<Value>, CallError> {
    result.map(RemoteValue::into_value).map_err(CallError::Raised)
}

impl<I: ?Sized + 'static> MethodTable<I> {
    pub fn new(interface: &'static str) -> Self {
        MethodTable {
            interface,
            methods: HashMap::new(),
        }
    }

    pub fn interface(&self) -> &'static str {
        self.interface
    }

    fn insert(&mut self, name: &'static str, params: Vec<String>, throws: &'static [ErrorKind], handler: Handler<I>) {
        let signature = MethodSignature {
            name,
            params: params.clone(),
            throws,
        };
        self.methods.insert((name.to_string(), params), Method { signature, handler });
    }

    pub fn method0<R, F>(mut self, name: &'static str, throws: &'static [ErrorKind], f: F) -> Self
    where
        R: RemoteValue,
        F: Fn(&I) -> Result<R, RpcError> + Send + Sync + 'static,
    {
        self.insert(name, vec![], throws, Box::new(move |target: &I, _args: Vec<Option<Value>>| {
            encode(f(target))
        }));
        self
    }

    pub fn method1<A, R, F>(mut self, name: &'static str, throws: &'static [ErrorKind], f: F) -> Self
    where
        A: RemoteValue,
        R: RemoteValue,
        F: Fn(&I, A) -> Result<R, RpcError> + Send + Sync + 'static,
    {
        let handler: Handler<I> = Box::new(move |target: &I, args: Vec<Option<Value>>| {
            let mut args = args.into_iter();
            let a = decode::<A>(0, args.next().flatten())?;
            encode(f(target, a))
        });
        self.insert(name, vec![A::descriptor()], throws, handler);
        self
    }

    pub fn method2<A, B, R, F>(mut self, name: &'static str, throws: &'static [ErrorKind], f: F) -> Self
    where
        A: RemoteValue,
        B: RemoteValue,
        R: RemoteValue,
        F: Fn(&I, A, B) -> Result<R, RpcError> + Send + Sync + 'static,
    {
        let handler: Handler<I> = Box::new(move |target: &I, args: Vec<Option<Value>>| {
            let mut args = args.into_iter();
            let a = decode::<A>(0, args.next().flatten())?;
            let b = decode::<B>(1, args.next().flatten())?;
            encode(f(target, a, b))
        });
        self.insert(name, vec![A::descriptor(), B::descriptor()], throws, handler);
        self
    }

    pub fn method3<A, B, C, R, F>(mut self, name: &'static str, throws: &'static [ErrorKind], f: F) -> Self
    where
        A: RemoteValue,
        B: RemoteValue,
        C: RemoteValue,
        R: RemoteValue,
        F: Fn(&I, A, B, C) -> Result<R, RpcError> + Send + Sync + 'static,
    {
        let handler: Handler<I> = Box::new(move |target: &I, args: Vec<Option<Value>>| {
            let mut args = args.into_iter();
            let a = decode::<A>(0, args.next().flatten())?;
            let b = decode::<B>(1, args.next().flatten())?;
            let c = decode::<C>(2, args.next().flatten())?;
            encode(f(target, a, b, c))
        });
        self.insert(
            name,
            vec![A::descriptor(), B::descriptor(), C::descriptor()],
            throws,
            handler,
        );
        self
    }

    pub fn resolve(&self, name: &str, params: &[String]) -> Option<&Method<I>> {
        self.methods.get(&(name.to_string(), params.to_vec()))
    }

    pub fn signatures(&self) -> impl Iterator<Item = &MethodSignature> {
        self.methods.values().map(Method::signature)
    }
}
