// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol between `ctrlscand` and `ctrlscan-cli`.
//!
//! Wire format: 4-byte big-endian length prefix followed by a JSON payload
//! carrying one tagged `Request` or `Response` variant. This is the daemon's
//! internal control channel -- the same operation surface the excluded HTTP
//! layer would expose, reached instead over a Unix domain socket.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod framing;
mod request;
mod response;

pub use framing::{decode, encode, read_message, read_request, write_message, write_response, ProtocolError};
pub use request::Request;
pub use response::{Response, WorkerStatusWire};
