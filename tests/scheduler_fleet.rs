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

//! Multi-agent integration tests driving a real `Scheduler` on its own
//! thread against real loopback receivers, exercising the serialization and
//! cross-direction interlock properties that only show up with more than
//! one transfer in flight at once.

use std::net::{IpAddr, Ipv4Addr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fluxmesh::api::types::TransferState;
use fluxmesh::client::{TcpConnector, TransferClient};
use fluxmesh::dispatcher::Dispatcher;
use fluxmesh::lottery::LotteryTaskSelector;
use fluxmesh::random::PrngRandomSource;
use fluxmesh::receiver::{Listener, TransferReceiver};
use fluxmesh::registry::Registry;
use fluxmesh::scheduler::{RealClock, Scheduler};
use fluxmesh::task::Interruptible;
use fluxmesh::transfer::spec::TransferSpec;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn free_port() -> u16 {
    StdTcpListener::bind((LOCALHOST, 0))
        .expect("failed to bind ephemeral port")
        .local_addr()
        .unwrap()
        .port()
}

fn spawn_receiver(port: u16) -> (Arc<TransferReceiver>, Arc<Registry>) {
    let receiver = Arc::new(TransferReceiver::new());
    let registry = Arc::new(Registry::new());

    let listener = Listener::new(receiver.clone(), registry.clone());
    let addr = format!("127.0.0.1:{}", port);
    std::thread::spawn(move || listener.serve(&addr));

    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if std::net::TcpStream::connect(("127.0.0.1", port)).is_ok() {
            break;
        }
        assert!(Instant::now() < deadline, "receiver on {} never came up", port);
        std::thread::sleep(Duration::from_millis(5));
    }

    (receiver, registry)
}

fn test_scheduler() -> Arc<Scheduler> {
    let rand = Arc::new(PrngRandomSource::new());
    let selector = Box::new(LotteryTaskSelector::new(rand));
    Arc::new(Scheduler::new(selector, Duration::from_millis(1), Arc::new(RealClock)))
}

struct NoopInterruptible;
impl Interruptible for NoopInterruptible {
    fn interrupt(&self) {}
    fn resume(&self) {}
}

fn wait_for<F: Fn() -> bool>(deadline: Duration, cond: F) -> bool {
    let until = Instant::now() + deadline;
    while Instant::now() < until {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// Scenario 4: agent A submits two outbound transfers (to B and to C) at
/// once. They start out pending, pass through running one at a time (never
/// more than one simultaneously, since the scheduler only ever runs one
/// task per round on its own thread), and both eventually complete.
#[test]
fn three_agent_serialization_never_runs_two_tasks_at_once() {
    let port_b = free_port();
    let port_c = free_port();
    let (_recv_b, _reg_b) = spawn_receiver(port_b);
    let (_recv_c, _reg_c) = spawn_receiver(port_c);

    let registry_a = Arc::new(Registry::new());
    let scheduler_a = test_scheduler();
    let client_a = Arc::new(TransferClient::new(Box::new(TcpConnector)));
    let dispatcher_a = Dispatcher::new(
        scheduler_a.clone(),
        Arc::new(NoopInterruptible),
        client_a,
        registry_a.clone(),
    );

    let size = 32 * 1024 * 1024;
    dispatcher_a.create(TransferSpec { ip: LOCALHOST, port: port_b, size });
    dispatcher_a.create(TransferSpec { ip: LOCALHOST, port: port_c, size });

    assert_eq!(registry_a.transfers_by_state(TransferState::Pending).len(), 2);

    let sched_clone = scheduler_a.clone();
    let handle = std::thread::spawn(move || sched_clone.run());

    let mut saw_exactly_one_running = false;
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let running = registry_a.transfers_by_state(TransferState::Running).len();
        assert!(running <= 1, "scheduler ran more than one task at once");
        if running == 1 {
            saw_exactly_one_running = true;
        }

        if registry_a.transfers_by_state(TransferState::Completed).len() == 2 {
            break;
        }
        assert!(Instant::now() < deadline, "transfers never both completed");
        std::thread::sleep(Duration::from_millis(2));
    }

    assert!(saw_exactly_one_running, "never observed a task actually running");

    scheduler_a.stop().unwrap();
    handle.join().unwrap();
}

/// Scenario 5: while A is sending a large transfer to B, a concurrently
/// dispatched transfer from C to A stays pending (rejected as busy and
/// retried by the scheduler) until A's outbound transfer finishes, at which
/// point it completes.
#[test]
fn cross_direction_interlock_defers_inbound_until_outbound_finishes() {
    let port_a = free_port();
    let port_b = free_port();

    let (receiver_a, registry_a) = spawn_receiver(port_a);
    let (_recv_b, _reg_b) = spawn_receiver(port_b);

    // A's own outbound task pauses A's receiver while it runs, exactly like
    // the production agent wires `interruptible` to its own receiver.
    let scheduler_a = test_scheduler();
    let client_a = Arc::new(TransferClient::new(Box::new(TcpConnector)));
    let dispatcher_a = Dispatcher::new(
        scheduler_a.clone(),
        receiver_a.clone(),
        client_a,
        registry_a.clone(),
    );
    dispatcher_a.create(TransferSpec {
        ip: LOCALHOST,
        port: port_b,
        size: 96 * 1024 * 1024,
    });

    let sched_a_clone = scheduler_a.clone();
    let handle_a = std::thread::spawn(move || sched_a_clone.run());

    // C's outbound task targets A; it will be told "busy" and rescheduled
    // for as long as A's own transfer keeps A's receiver paused.
    let registry_c = Arc::new(Registry::new());
    let scheduler_c = test_scheduler();
    let client_c = Arc::new(TransferClient::new(Box::new(TcpConnector)));
    let dispatcher_c = Dispatcher::new(
        scheduler_c.clone(),
        Arc::new(NoopInterruptible),
        client_c,
        registry_c.clone(),
    );
    dispatcher_c.create(TransferSpec {
        ip: LOCALHOST,
        port: port_a,
        size: 4096,
    });

    let sched_c_clone = scheduler_c.clone();
    let handle_c = std::thread::spawn(move || sched_c_clone.run());

    // While A is still busy sending to B, C's transfer must not complete.
    std::thread::sleep(Duration::from_millis(50));
    assert!(
        registry_a.transfers_by_state(TransferState::Completed).is_empty(),
        "A's outbound transfer finished before the interlock could be observed"
    );
    assert!(
        registry_c.transfers_by_state(TransferState::Completed).is_empty(),
        "C's transfer completed while A was still busy sending"
    );

    let a_done = wait_for(Duration::from_secs(15), || {
        registry_a.transfers_by_state(TransferState::Completed).len() == 1
    });
    assert!(a_done, "A's outbound transfer never completed");

    let c_done = wait_for(Duration::from_secs(10), || {
        registry_c.transfers_by_state(TransferState::Completed).len() == 1
    });
    assert!(c_done, "C's transfer never completed after A freed its receiver");

    scheduler_a.stop().unwrap();
    scheduler_c.stop().unwrap();
    handle_a.join().unwrap();
    handle_c.join().unwrap();
}
