// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Errors that cross the wire.
//!
//! Every remote method returns `Result<_, RpcError>`. A raised error travels
//! as a [`WireError`] and is rebuilt with the same variant and message on the
//! calling side, so callers can match on it as if the call were local.

use thiserror::Error;

use crate::wire::WireError;

/// Wire tag of an [`RpcError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    Network = 1,
    NotRemoteInterface = 2,
    AlreadyRunning = 3,
    NoSuchMethod = 4,
    NullArgument = 5,
    NotFound = 6,
    IllegalState = 7,
    IllegalArgument = 8,
    OutOfBounds = 9,
    Io = 10,
}

impl ErrorKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            1 => ErrorKind::Network,
            2 => ErrorKind::NotRemoteInterface,
            3 => ErrorKind::AlreadyRunning,
            4 => ErrorKind::NoSuchMethod,
            5 => ErrorKind::NullArgument,
            6 => ErrorKind::NotFound,
            7 => ErrorKind::IllegalState,
            8 => ErrorKind::IllegalArgument,
            9 => ErrorKind::OutOfBounds,
            10 => ErrorKind::Io,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// Transport failure, or a call the remote side could not make sense of
    #[error("network error: {0}")]
    Network(String),

    #[error("not a remote interface: {0}")]
    NotRemoteInterface(String),

    #[error("already running: {0}")]
    AlreadyRunning(String),

    #[error("no such method: {0}")]
    NoSuchMethod(String),

    #[error("null argument: {0}")]
    NullArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type RpcResult<T> = Result<T, RpcError>;

impl RpcError {
    pub fn network(err: impl std::fmt::Display) -> Self {
        RpcError::Network(err.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RpcError::Network(_) => ErrorKind::Network,
            RpcError::NotRemoteInterface(_) => ErrorKind::NotRemoteInterface,
            RpcError::AlreadyRunning(_) => ErrorKind::AlreadyRunning,
            RpcError::NoSuchMethod(_) => ErrorKind::NoSuchMethod,
            RpcError::NullArgument(_) => ErrorKind::NullArgument,
            RpcError::NotFound(_) => ErrorKind::NotFound,
            RpcError::IllegalState(_) => ErrorKind::IllegalState,
            RpcError::IllegalArgument(_) => ErrorKind::IllegalArgument,
            RpcError::OutOfBounds(_) => ErrorKind::OutOfBounds,
            RpcError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RpcError::Network(m)
            | RpcError::NotRemoteInterface(m)
            | RpcError::AlreadyRunning(m)
            | RpcError::NoSuchMethod(m)
            | RpcError::NullArgument(m)
            | RpcError::NotFound(m)
            | RpcError::IllegalState(m)
            | RpcError::IllegalArgument(m)
            | RpcError::OutOfBounds(m)
            | RpcError::Io(m) => m,
        }
    }

    pub fn from_parts(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::Network => RpcError::Network(message),
            ErrorKind::NotRemoteInterface => RpcError::NotRemoteInterface(message),
            ErrorKind::AlreadyRunning => RpcError::AlreadyRunning(message),
            ErrorKind::NoSuchMethod => RpcError::NoSuchMethod(message),
            ErrorKind::NullArgument => RpcError::NullArgument(message),
            ErrorKind::NotFound => RpcError::NotFound(message),
            ErrorKind::IllegalState => RpcError::IllegalState(message),
            ErrorKind::IllegalArgument => RpcError::IllegalArgument(message),
            ErrorKind::OutOfBounds => RpcError::OutOfBounds(message),
            ErrorKind::Io => RpcError::Io(message),
        }
    }

    /// Wire form; `origin` names the remote method that raised the error.
    pub fn to_wire(&self, origin: Option<&str>) -> WireError {
        WireError {
            kind: self.kind() as u8,
            message: self.message().as_bytes().to_vec(),
            details: origin.map(|o| o.as_bytes().to_vec()),
        }
    }

    pub fn from_wire(wire: WireError) -> Self {
        let message = String::from_utf8_lossy(&wire.message).into_owned();
        match ErrorKind::from_tag(wire.kind) {
            Some(kind) => RpcError::from_parts(kind, message),
            None => RpcError::Network(format!(
                "remote raised unknown error kind {}: {}",
                wire.kind, message
            )),
        }
    }
}

impl From<std::io::Error> for RpcError {
    fn from(err: std::io::Error) -> Self {
        RpcError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_preserves_kind_and_message() {
        let err = RpcError::NotFound("/a/b".into());
        let wire = err.to_wire(Some("dfs.Service::list"));
        assert_eq!(wire.details.as_deref(), Some(&b"dfs.Service::list"[..]));
        assert_eq!(RpcError::from_wire(wire), err);
    }

    #[test]
    fn test_every_kind_round_trips_through_its_tag() {
        for tag in 1..=10u8 {
            let kind = ErrorKind::from_tag(tag).unwrap();
            assert_eq!(kind as u8, tag);
            assert_eq!(RpcError::from_parts(kind, String::new()).kind(), kind);
        }
        assert_eq!(ErrorKind::from_tag(0), None);
    }

    #[test]
    fn test_unknown_tag_becomes_network_error() {
        let wire = WireError {
            kind: 200,
            message: b"boom".to_vec(),
            details: None,
        };
        assert!(matches!(RpcError::from_wire(wire), RpcError::Network(m) if m.contains("boom")));
    }
}
