// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Request/response envelopes and their framing.
//!
//! A frame is a 4-byte little-endian length followed by the SSZ encoding of
//! one envelope. Each connection carries exactly one request frame and at
//! most one response frame.

use std::io::{self, Read, Write};

use ssz::{Decode, Encode};
use ssz_derive::{Decode, Encode};
use thiserror::Error;

pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Dynamically typed argument or result value
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
#[ssz(enum_behaviour = "union")]
pub enum Value {
    Bool(bool),
    U64(u64),
    Bytes(Vec<u8>),
    Text(Vec<u8>),
    List(Vec<Value>),
    Remote(RemoteRef),
}

impl Value {
    /// Short name used in mismatch errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::U64(_) => "u64",
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "text",
            Value::List(_) => "list",
            Value::Remote(_) => "remote",
        }
    }
}

/// Serialized stub: interface name plus `host:port`
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct RemoteRef {
    pub interface: Vec<u8>,
    pub address: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct CallRequest {
    pub interface: Vec<u8>,
    pub method: Vec<u8>,
    /// `None` is a null argument
    pub args: Vec<Option<Value>>,
    pub arg_types: Vec<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
#[ssz(enum_behaviour = "union")]
pub enum CallResponse {
    Return(Option<Value>),
    Raise(WireError),
}

/// Error carried in a response
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct WireError {
    pub kind: u8,
    pub message: Vec<u8>,
    pub details: Option<Vec<u8>>,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    TooLarge(usize),

    #[error("malformed envelope: {0}")]
    Decode(String),
}

pub fn encode_ssz(data: &impl Encode) -> Vec<u8> {
    data.as_ssz_bytes()
}

pub fn decode_ssz<T: Decode>(data: &[u8]) -> Result<T, ssz::DecodeError> {
    T::from_ssz_bytes(data)
}

pub fn write_frame<W: Write>(writer: &mut W, envelope: &impl Encode) -> Result<(), FrameError> {
    let bytes = encode_ssz(envelope);
    if bytes.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(bytes.len()));
    }
    writer.write_all(&(bytes.len() as u32).to_le_bytes())?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

pub fn read_frame<R: Read, T: Decode>(reader: &mut R) -> Result<T, FrameError> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(len));
    }

    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    decode_ssz(&bytes).map_err(|e| FrameError::Decode(format!("{:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_request() -> CallRequest {
        CallRequest {
            interface: b"dfs.Service".to_vec(),
            method: b"register".to_vec(),
            args: vec![
                Some(Value::Remote(RemoteRef {
                    interface: b"dfs.Storage".to_vec(),
                    address: b"127.0.0.1:7000".to_vec(),
                })),
                None,
                Some(Value::List(vec![
                    Value::Text(b"/a".to_vec()),
                    Value::Text(b"/a/b".to_vec()),
                ])),
            ],
            arg_types: vec![
                b"remote<dfs.Storage>".to_vec(),
                b"remote<dfs.Command>".to_vec(),
                b"list<dfs.Path>".to_vec(),
            ],
        }
    }

    #[test]
    fn test_request_frame_with_nested_and_null_values() {
        let request = sample_request();
        let mut buf = Vec::new();
        write_frame(&mut buf, &request).unwrap();

        assert_eq!(
            u32::from_le_bytes(buf[..4].try_into().unwrap()) as usize,
            buf.len() - 4
        );
        let decoded: CallRequest = read_frame(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_void_return_and_raise_are_distinct() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &CallResponse::Return(None)).unwrap();
        let raise = CallResponse::Raise(WireError {
            kind: 6,
            message: b"missing".to_vec(),
            details: None,
        });
        write_frame(&mut buf, &raise).unwrap();

        let mut cursor = Cursor::new(buf);
        let first: CallResponse = read_frame(&mut cursor).unwrap();
        let second: CallResponse = read_frame(&mut cursor).unwrap();
        assert_eq!(first, CallResponse::Return(None));
        assert_eq!(second, raise);
    }

    #[test]
    fn test_oversized_length_prefix_is_rejected() {
        let mut buf = ((MAX_FRAME_LEN + 1) as u32).to_le_bytes().to_vec();
        buf.extend_from_slice(&[0u8; 16]);
        let result: Result<CallRequest, _> = read_frame(&mut Cursor::new(buf));
        assert!(matches!(result, Err(FrameError::TooLarge(_))));
    }

    #[test]
    fn test_truncated_frame_is_an_io_error() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &sample_request()).unwrap();
        buf.truncate(buf.len() - 3);
        let result: Result<CallRequest, _> = read_frame(&mut Cursor::new(buf));
        assert!(matches!(result, Err(FrameError::Io(_))));
    }

    #[test]
    fn test_garbage_payload_is_a_decode_error() {
        let mut buf = 3u32.to_le_bytes().to_vec();
        buf.extend_from_slice(&[0xff, 0xff, 0xff]);
        let result: Result<CallResponse, _> = read_frame(&mut Cursor::new(buf));
        assert!(matches!(result, Err(FrameError::Decode(_))));
    }
}
