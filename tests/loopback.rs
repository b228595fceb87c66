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

//! Loopback integration tests driving a real `TransferReceiver` behind a real
//! `TcpListener`, with a real `TransferClient` dialing over `127.0.0.1`. No
//! fakes: the point is to exercise actual socket timing and the wire
//! protocol end to end.

use std::net::{IpAddr, Ipv4Addr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fluxmesh::client::{TcpConnector, TransferClient};
use fluxmesh::receiver::{Listener, TransferReceiver};
use fluxmesh::registry::Registry;
use fluxmesh::transfer::spec::TransferSpec;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Grabs an ephemeral port by briefly binding to it, then releases it. There
/// is a narrow window where another process could steal it before our
/// `Listener` binds; acceptable for test purposes.
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

    wait_for_port(port);
    (receiver, registry)
}

/// Polls until `port` accepts connections, or panics after a generous
/// timeout. Avoids a fixed sleep racing the listener's bind.
fn wait_for_port(port: u16) {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if std::net::TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return;
        }
        if Instant::now() > deadline {
            panic!("listener on port {} never came up", port);
        }
        std::thread::sleep(Duration::from_millis(5));
    }
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

fn client() -> TransferClient {
    TransferClient::new(Box::new(TcpConnector))
}

/// Scenario 1: a single loopback transfer reports the requested byte count
/// and agreeing checksums on both ends.
#[test]
fn local_loopback_transfer_reports_full_size_and_checksum() {
    let port = free_port();
    let (_receiver, registry) = spawn_receiver(port);

    let spec = TransferSpec {
        ip: LOCALHOST,
        port,
        size: 10 * 1024 * 1024,
    };

    let res = client().transfer(spec).expect("transfer should succeed");

    assert_eq!(res.bytes_sent, spec.size);
    assert!(res.checksum != 0);
    assert!(res.duration.as_nanos() > 0);

    let got = wait_for(Duration::from_secs(2), || {
        !registry.transfer_results().is_empty()
    });
    assert!(got, "receiver never recorded a result");

    let recorded = registry.transfer_results();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].bytes_sent, spec.size);
    assert_eq!(recorded[0].checksum, res.checksum);
}

/// Scenario 1 (edge case): a size not a multiple of 1024 is truncated down,
/// on both the sender's report and the receiver's recorded result.
#[test]
fn sub_block_remainder_is_truncated_on_both_ends() {
    let port = free_port();
    let (_receiver, registry) = spawn_receiver(port);

    let spec = TransferSpec {
        ip: LOCALHOST,
        port,
        size: 1024 * 50 + 777,
    };

    let res = client().transfer(spec).unwrap();
    assert_eq!(res.bytes_sent, 1024 * 50);

    wait_for(Duration::from_secs(2), || !registry.transfer_results().is_empty());
    assert_eq!(registry.transfer_results()[0].bytes_sent, 1024 * 50);
}

/// Scenario 2: a second concurrent transfer against a busy receiver is
/// rejected, while the first one in flight completes normally.
#[test]
fn busy_rejection_leaves_the_in_flight_transfer_unaffected() {
    let port = free_port();
    let (_receiver, registry) = spawn_receiver(port);

    let big_spec = TransferSpec {
        ip: LOCALHOST,
        port,
        size: 128 * 1024 * 1024,
    };

    let first = std::thread::spawn(move || client().transfer(big_spec));

    // Give the first connection time to claim the receiver before the
    // second one dials in.
    std::thread::sleep(Duration::from_millis(50));

    let small_spec = TransferSpec {
        ip: LOCALHOST,
        port,
        size: 4096,
    };
    let second_result = client().transfer(small_spec);

    assert!(matches!(
        second_result,
        Err(fluxmesh::error::TransferError::Busy)
    ));

    let first_result = first.join().unwrap().expect("first transfer should succeed");
    assert_eq!(first_result.bytes_sent, big_spec.size);

    wait_for(Duration::from_secs(2), || registry.transfer_results().len() == 1);
    assert_eq!(registry.transfer_results().len(), 1);
}

/// Scenario 3: `interrupt()` rejects inbound transfers as busy until
/// `resume()` is called, after which a fresh transfer completes.
#[test]
fn pause_resume_round_trip_gates_inbound_transfers() {
    let port = free_port();
    let (receiver, _registry) = spawn_receiver(port);

    receiver.interrupt();

    let spec = TransferSpec {
        ip: LOCALHOST,
        port,
        size: 4096,
    };
    let rejected = client().transfer(spec);
    assert!(matches!(
        rejected,
        Err(fluxmesh::error::TransferError::Busy)
    ));

    receiver.resume();

    let res = client().transfer(spec).expect("transfer should succeed after resume");
    assert_eq!(res.bytes_sent, spec.size);
}
