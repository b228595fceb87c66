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

//! The incoming-transfer side: a busy/paused state machine guarding a single
//! concurrent transfer, and the TCP listener loop that feeds it.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use log::{debug, error, info};

use crate::error::TransferError;
use crate::registry::Registry;
use crate::task::Interruptible;
use crate::transfer::simple::Receiver as WireReceiver;
use crate::transfer::spec::TransferResults;

/// `busy` and `paused` are tracked independently: a transfer already in
/// flight stays `busy` while `interrupt()` sets `paused`, so the two can be
/// true at once.
struct ReceiverState {
    busy: bool,
    paused: bool,
}

/// Accepts at most one transfer at a time. A second arrival while busy is
/// told `"i-am-busy"` and dropped; `interrupt()` puts the receiver into the
/// same rejecting state administratively, until `resume()` is called.
pub struct TransferReceiver {
    state: Mutex<ReceiverState>,
    idle: Condvar,
    wire: WireReceiver,
}

impl TransferReceiver {
    pub fn new() -> TransferReceiver {
        TransferReceiver {
            state: Mutex::new(ReceiverState { busy: false, paused: false }),
            idle: Condvar::new(),
            wire: WireReceiver::new(),
        }
    }

    /// Runs one transfer to completion on the calling thread. Rejects with
    /// `TransferError::Busy` if the receiver is already servicing a transfer
    /// or has been paused, without touching the connection beyond the
    /// handshake's busy token.
    pub fn receive_transfer(&self, conn: &mut TcpStream) -> Result<TransferResults, TransferError> {
        if !self.try_claim() {
            self.wire.handle_busy(conn).map_err(TransferError::Transport)?;
            return Err(TransferError::Busy);
        }

        // Releases the claim on every exit path, including the `?` below, so
        // a peer that errors out mid-handshake can't wedge `interrupt()`.
        let _claim = ClaimGuard(self);

        let peer_ip = conn.peer_addr().map_err(TransferError::Transport)?.ip();
        self.wire.handle_transfer(conn, peer_ip)
    }

    /// Marks the receiver as administratively paused so subsequent arrivals
    /// are rejected as busy until `resume()` is called, then blocks until any
    /// transfer already in flight finishes.
    pub fn interrupt(&self) {
        let mut state = self.state.lock().expect("receiver state lock poisoned");
        debug!("receiver paused");
        state.paused = true;

        while state.busy {
            state = self.idle.wait(state).expect("receiver state lock poisoned");
        }
    }

    /// Clears a prior `interrupt()`. A no-op if not currently paused.
    pub fn resume(&self) {
        let mut state = self.state.lock().expect("receiver state lock poisoned");
        if state.paused {
            debug!("receiver resumed");
            state.paused = false;
        }
    }

    pub fn is_busy(&self) -> bool {
        let state = self.state.lock().expect("receiver state lock poisoned");
        state.busy || state.paused
    }

    fn try_claim(&self) -> bool {
        let mut state = self.state.lock().expect("receiver state lock poisoned");
        if state.busy || state.paused {
            false
        } else {
            state.busy = true;
            true
        }
    }

    fn release(&self) {
        let mut state = self.state.lock().expect("receiver state lock poisoned");
        state.busy = false;
        self.idle.notify_all();
    }
}

struct ClaimGuard<'a>(&'a TransferReceiver);

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

impl Interruptible for TransferReceiver {
    fn interrupt(&self) {
        TransferReceiver::interrupt(self);
    }

    fn resume(&self) {
        TransferReceiver::resume(self);
    }
}

impl Default for TransferReceiver {
    fn default() -> TransferReceiver {
        TransferReceiver::new()
    }
}

/// Drives a `TcpListener` accept loop, spawning one worker thread per
/// incoming connection. Each worker runs a single transfer through `receiver`
/// and, on success, records the result in `registry`.
pub struct Listener {
    receiver: Arc<TransferReceiver>,
    registry: Arc<Registry>,
    stopping: AtomicBool,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Listener {
    pub fn new(receiver: Arc<TransferReceiver>, registry: Arc<Registry>) -> Listener {
        Listener {
            receiver,
            registry,
            stopping: AtomicBool::new(false),
            local_addr: Mutex::new(None),
        }
    }

    /// Binds `addr` and accepts connections until `shutdown()` is called or
    /// `accept()` returns a fatal error. Blocks the calling thread; callers
    /// typically spawn a dedicated thread for this.
    pub fn serve(&self, addr: &str) -> Result<(), TransferError> {
        let listener = TcpListener::bind(addr).map_err(TransferError::Transport)?;
        *self.local_addr.lock().expect("listener addr lock poisoned") = listener.local_addr().ok();

        // A shutdown() racing with bind() may have stored `stopping` before
        // `local_addr` was available to wake a blocked accept(); catch that
        // here so the loop below is never entered in the first place.
        if self.stopping.load(Ordering::SeqCst) {
            debug!("transfer listener shutting down before accept loop started");
            return Ok(());
        }

        info!("listening for transfers on {}", addr);

        for incoming in listener.incoming() {
            if self.stopping.load(Ordering::SeqCst) {
                debug!("transfer listener shutting down");
                break;
            }

            let mut conn = match incoming {
                Ok(conn) => conn,
                Err(e) => {
                    error!("accept failed: {}", e);
                    continue;
                }
            };

            let receiver = self.receiver.clone();
            let registry = self.registry.clone();

            std::thread::Builder::new()
                .name("transfer-worker".into())
                .spawn(move || match receiver.receive_transfer(&mut conn) {
                    Ok(results) => registry.record_result(results),
                    Err(TransferError::Busy) => debug!("rejected transfer: receiver busy"),
                    Err(e) => error!("transfer failed: {}", e),
                })
                .expect("failed to spawn transfer worker thread");
        }

        Ok(())
    }

    /// Stops the accept loop. `std::net::TcpListener` has no portable way to
    /// unblock a concurrent `accept()`, so this sets a flag and then opens a
    /// dummy connection to the listener's own address to wake it; the loop
    /// checks the flag on the next iteration and returns without servicing
    /// that connection.
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        let addr = *self.local_addr.lock().expect("listener addr lock poisoned");
        if let Some(addr) = addr {
            let _ = TcpStream::connect(addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_receiver_is_not_busy() {
        let r = TransferReceiver::new();
        assert!(!r.is_busy());
    }

    #[test]
    fn interrupt_marks_busy_until_resumed() {
        let r = TransferReceiver::new();
        r.interrupt();
        assert!(r.is_busy());
        r.resume();
        assert!(!r.is_busy());
    }

    #[test]
    fn resume_without_interrupt_is_a_noop() {
        let r = TransferReceiver::new();
        r.resume();
        assert!(!r.is_busy());
    }

    #[test]
    fn claim_and_release_round_trip() {
        let r = TransferReceiver::new();
        assert!(r.try_claim());
        assert!(!r.try_claim());
        r.release();
        assert!(r.try_claim());
    }

    #[test]
    fn interrupt_blocks_until_the_in_flight_transfer_releases() {
        use std::time::Duration;

        let r = Arc::new(TransferReceiver::new());
        assert!(r.try_claim());

        let released = Arc::new(AtomicBool::new(false));

        let r2 = r.clone();
        let released2 = released.clone();
        let releaser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            released2.store(true, Ordering::SeqCst);
            r2.release();
        });

        r.interrupt();
        assert!(released.load(Ordering::SeqCst), "interrupt() returned before release()");

        releaser.join().unwrap();
    }
}
