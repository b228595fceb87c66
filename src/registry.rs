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

//! The shared, mutex-guarded store of in-flight and completed transfers.
//!
//! Two independent views are kept: a live view over transfers that still
//! have a [`TransferStater`] to poll, and an append-only log of completed
//! results, indexed both chronologically and by peer IP.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use crate::api::types::{Transfer, TransferSpec, TransferState};
use crate::transfer::spec::TransferResults;

/// Polled to learn a live transfer's current lifecycle state. Implemented by
/// [`crate::task::TransferTask`]. The registry polls this until it first
/// observes `Completed`, then latches that value and drops the handle, so a
/// finished task's `Arc` (and everything it transitively holds) can be
/// reclaimed.
pub trait TransferStater: Send + Sync {
    fn transfer_state(&self) -> TransferState;
}

struct LiveTransfer {
    spec: TransferSpec,
    cached: Option<TransferState>,
    stater: Option<Arc<dyn TransferStater>>,
}

impl LiveTransfer {
    fn state(&mut self) -> TransferState {
        if let Some(state) = self.cached {
            return state;
        }

        let state = self
            .stater
            .as_ref()
            .expect("stater dropped before a state was cached")
            .transfer_state();

        if state == TransferState::Completed {
            self.cached = Some(state);
            self.stater = None;
        }

        state
    }
}

/// Thread-safe registry of transfers, shared between the dispatcher, the
/// network listener and the management API server.
pub struct Registry {
    live: Mutex<Vec<LiveTransfer>>,

    results: Mutex<Vec<TransferResults>>,
    results_by_ip: Mutex<HashMap<IpAddr, Vec<TransferResults>>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            live: Mutex::new(Vec::new()),
            results: Mutex::new(Vec::with_capacity(64)),
            results_by_ip: Mutex::new(HashMap::new()),
        }
    }

    /// Adds a transfer to the live view. `stater` is polled, not snapshotted,
    /// so callers typically pass a handle shared with the running task.
    pub fn register_transfer(&self, spec: TransferSpec, stater: Arc<dyn TransferStater>) {
        self.live.lock().expect("registry live-transfers lock poisoned").push(LiveTransfer {
            spec,
            cached: None,
            stater: Some(stater),
        });
    }

    /// Snapshots every live transfer's current spec and state. A transfer
    /// observed as `Completed` is latched from then on, releasing its
    /// `stater` handle.
    pub fn transfers(&self) -> Vec<Transfer> {
        self.live
            .lock()
            .expect("registry live-transfers lock poisoned")
            .iter_mut()
            .map(|t| Transfer {
                spec: t.spec,
                state: t.state(),
            })
            .collect()
    }

    /// Snapshots only the live transfers currently in `state`.
    pub fn transfers_by_state(&self, state: TransferState) -> Vec<Transfer> {
        self.transfers()
            .into_iter()
            .filter(|t| t.state == state)
            .collect()
    }

    /// Appends a completed transfer's results to both the chronological log
    /// and the per-IP index.
    pub fn record_result(&self, results: TransferResults) {
        self.results
            .lock()
            .expect("registry results lock poisoned")
            .push(results);

        self.results_by_ip
            .lock()
            .expect("registry results-by-ip lock poisoned")
            .entry(results.ip)
            .or_insert_with(Vec::new)
            .push(results);
    }

    /// All recorded results, oldest first.
    pub fn transfer_results(&self) -> Vec<TransferResults> {
        self.results
            .lock()
            .expect("registry results lock poisoned")
            .clone()
    }

    /// Recorded results for one peer, oldest first. Empty if `ip` never
    /// completed a transfer.
    pub fn transfer_results_by_ip(&self, ip: IpAddr) -> Vec<TransferResults> {
        self.results_by_ip
            .lock()
            .expect("registry results-by-ip lock poisoned")
            .get(&ip)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for Registry {
    fn default() -> Registry {
        Registry::new()
    }
}
