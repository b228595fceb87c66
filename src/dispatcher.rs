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

//! Turns a management API transfer request (or a configured remote host)
//! into a scheduled [`TransferTask`].

use std::sync::Arc;

use log::debug;

use crate::api::server::TransferCreator;
use crate::api::types::TransferSpec;
use crate::client::TransferClient;
use crate::registry::Registry;
use crate::scheduler::Scheduler;
use crate::task::{Interruptible, TransferTask};

/// Priority given to transfers created through the management API.
pub const TRANSFER_TASK_PRIORITY: i32 = 5;

/// Priority given to transfers to the hosts configured at startup — these
/// run preferentially over ad hoc ones, since they're the steady-state
/// measurement workload the agent exists to produce.
pub const CONFIGURED_HOST_TASK_PRIORITY: i32 = 10;

pub struct Dispatcher {
    scheduler: Arc<Scheduler>,
    interruptible: Arc<dyn Interruptible>,
    client: Arc<TransferClient>,
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new(
        scheduler: Arc<Scheduler>,
        interruptible: Arc<dyn Interruptible>,
        client: Arc<TransferClient>,
        registry: Arc<Registry>,
    ) -> Dispatcher {
        Dispatcher {
            scheduler,
            interruptible,
            client,
            registry,
        }
    }

    /// Builds and schedules a task for `spec` at the given priority,
    /// registering it with the live-transfers view so the management API can
    /// observe it. The task is shared between the scheduler's run queue and
    /// the registry's live view, not copied: both need to see the same
    /// underlying state.
    pub fn create_with_priority(&self, spec: TransferSpec, priority: i32) {
        debug!(
            "received new transfer task: ip={} port={} size={}",
            spec.ip, spec.port, spec.size
        );

        let task = Arc::new(TransferTask::new(
            self.interruptible.clone(),
            self.client.clone(),
            spec,
            self.registry.clone(),
            priority,
        ));

        self.registry.register_transfer(spec, task.clone());
        self.scheduler.schedule(task);
    }
}

impl TransferCreator for Dispatcher {
    fn create(&self, spec: TransferSpec) {
        self.create_with_priority(spec, TRANSFER_TASK_PRIORITY);
    }
}
