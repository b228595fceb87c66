/* Copyright (c) 2018 University of Utah
 *
 * Permission to use, copy, modify, and distribute this software for any
 * purpose with or without fee is hereby granted, provided that the above
 * copyright notice and this permission notice appear in all copies.
 *
 * THE SOFTWARE IS PROVIDED "AS IS" AND THE AUTHOR(S) DISCLAIM ALL WARRANTIES
 * WITH REGARD TO THIS SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF
 * MERCHANTABILITY AND FITNESS. IN NO EVENT SHALL AUTHORS BE LIABLE FOR
 * ANY SPECIAL, DIRECT, INDIRECT, OR CONSEQUENTIAL DAMAGES OR ANY DAMAGES
 * WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN
 * ACTION OF CONTRACT, NEGLIGENCE OR OTHER TORTIOUS ACTION, ARISING OUT OF
 * OR IN CONNECTION WITH THE USE OR PERFORMANCE OF THIS SOFTWARE.
 */

//! Crate-local error taxonomy. Every variant here maps to one of the error
//! kinds named in the design: config-invalid, io-bind-failed, connect-failed,
//! busy, protocol-violation, transport-error, scheduler-state.

use std::io;
use std::net::AddrParseError;

use thiserror::Error;

/// Errors raised while loading and validating the on-disk configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    Read { path: String, source: io::Error },

    #[error("failed to parse config file `{path}`: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised by the transfer wire protocol, the client and the receiver.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The remote (or local) receiver is already servicing a transfer, or has
    /// been explicitly paused.
    #[error("server is busy")]
    Busy,

    /// The handshake response was neither `"ok"` nor `"i-am-busy"`.
    #[error("unrecognized server response `{0}`")]
    UnrecognizedResponse(String),

    /// Dialing the remote peer failed.
    #[error("connecting to the server: {0}")]
    ConnectFailed(#[source] io::Error),

    /// A read or write failed mid-stream, after the handshake completed.
    #[error("transport error: {0}")]
    Transport(#[source] io::Error),

    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddrParseError),
}

/// Errors raised by scheduler state transitions.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("scheduler is already stopping")]
    AlreadyStopping,

    #[error("scheduler is not running")]
    NotRunning,
}
