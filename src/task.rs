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

//! The scheduler task that drives one outgoing transfer to completion,
//! retrying on every scheduling round until it succeeds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::error;

use crate::api::types::TransferState;
use crate::client::TransferClient;
use crate::registry::{Registry, TransferStater};
use crate::scheduler::{Task, TaskState};
use crate::transfer::spec::TransferSpec;

/// Pausable during a transfer so the local receiver doesn't also try to
/// service an inbound transfer at the same time. Implemented by
/// [`crate::receiver::TransferReceiver`].
pub trait Interruptible: Send + Sync {
    fn interrupt(&self);
    fn resume(&self);
}

/// One outgoing transfer, rescheduled by the scheduler until it succeeds.
/// Reports its own progress through [`TransferStater`] so the management API
/// can observe it via the registry.
pub struct TransferTask {
    interruptible: Arc<dyn Interruptible>,
    client: Arc<TransferClient>,
    spec: TransferSpec,
    registry: Arc<Registry>,

    priority: i32,
    done: AtomicBool,
    state: Mutex<TransferState>,
}

impl TransferTask {
    pub fn new(
        interruptible: Arc<dyn Interruptible>,
        client: Arc<TransferClient>,
        spec: TransferSpec,
        registry: Arc<Registry>,
        priority: i32,
    ) -> TransferTask {
        TransferTask {
            interruptible,
            client,
            spec,
            registry,
            priority,
            done: AtomicBool::new(false),
            state: Mutex::new(TransferState::Pending),
        }
    }

    fn set_state(&self, state: TransferState) {
        *self.state.lock().expect("transfer task state lock poisoned") = state;
    }
}

impl Task for TransferTask {
    fn run(&self) {
        self.interruptible.interrupt();
        self.set_state(TransferState::Running);

        let result = self.client.transfer(self.spec);

        self.interruptible.resume();

        match result {
            Ok(res) => {
                self.registry.record_result(res);
                self.set_state(TransferState::Completed);
                self.done.store(true, Ordering::SeqCst);
            }
            Err(e) => {
                error!("transfer task will be rescheduled: {}", e);
                self.set_state(TransferState::Pending);
            }
        }
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn state(&self) -> TaskState {
        if self.done.load(Ordering::SeqCst) {
            TaskState::Done
        } else {
            TaskState::Ready
        }
    }
}

impl TransferStater for TransferTask {
    fn transfer_state(&self) -> TransferState {
        *self.state.lock().expect("transfer task state lock poisoned")
    }
}
