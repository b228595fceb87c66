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

//! Wire types shared by the management API server and client.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::transfer::spec::{TransferResults, TransferSpec};

/// A transfer's lifecycle as seen by the management API. Distinct from
/// [`crate::scheduler::TaskState`], which only distinguishes ready/done at
/// the scheduler level.
///
/// `Unknown` is never assigned to a live transfer; it only arises from
/// parsing an unrecognized `:state` path segment, and filtering the
/// registry by it always yields an empty list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
    Pending,
    Running,
    Completed,
    Unknown,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferState::Pending => "pending",
            TransferState::Running => "running",
            TransferState::Completed => "completed",
            TransferState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl FromStr for TransferState {
    type Err = std::convert::Infallible;

    /// Never fails: an unrecognized string parses to `Unknown` rather than
    /// being rejected, matching the management API's `GET /transfers/:state`
    /// route.
    fn from_str(s: &str) -> Result<TransferState, std::convert::Infallible> {
        Ok(match s {
            "pending" => TransferState::Pending,
            "running" => TransferState::Running,
            "completed" => TransferState::Completed,
            _ => TransferState::Unknown,
        })
    }
}

/// A transfer spec paired with its current state, as returned by
/// `GET /transfers/:state`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub spec: TransferSpec,
    pub state: TransferState,
}

/// The wire shape of a completed transfer's result, returned by the
/// `transfer_results` routes. `serde`'s built-in impls for `Duration`/
/// `SystemTime` serialize as nested `{secs, nanos}` objects; this flattens
/// them to a millisecond count and an RFC3339 timestamp string instead, the
/// shape any external JSON consumer (including `fluxmeshctl`) expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferResultsWire {
    pub ip: IpAddr,
    pub bytes_sent: u32,
    pub checksum: u32,
    pub duration_ms: u64,
    pub time: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rtt_ms: Option<u64>,
}

impl From<TransferResults> for TransferResultsWire {
    fn from(r: TransferResults) -> TransferResultsWire {
        TransferResultsWire {
            ip: r.ip,
            bytes_sent: r.bytes_sent,
            checksum: r.checksum,
            duration_ms: r.duration.as_millis() as u64,
            time: DateTime::<Utc>::from(r.time).to_rfc3339(),
            rtt_ms: r.rtt.map(|d| d.as_millis() as u64),
        }
    }
}

/// A machine-readable error code, returned alongside `msg` on non-200
/// management API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServerErrorCode {
    RegistryFailed,
    InvalidRequest,
    CreateFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    pub code: ServerErrorCode,
    pub msg: String,
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.msg)
    }
}
