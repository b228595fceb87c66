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

//! The "simple" wire protocol: a receiver-initiated handshake followed by
//! fixed-block streaming with a running CRC-32/IEEE checksum.
//!
//! Both the handshake tokens and the block size (1024 bytes) are
//! bit-exact and must not change independently on either side, or sender
//! and receiver will disagree on the checksum.

use std::io::{Read, Write};
use std::net::IpAddr;
use std::time::{Instant, SystemTime};

use crc32fast::Hasher;
use log::debug;
use rand::RngCore;

use crate::error::TransferError;
use crate::transfer::spec::{TransferResults, TransferSpec};

const BLOCK_SIZE: usize = 1024;
const HANDSHAKE_OK: &[u8] = b"ok";
const HANDSHAKE_BUSY: &[u8] = b"i-am-busy";
const HANDSHAKE_READ_MAX: usize = 16;

/// The sender side of the protocol. Generates one random block and reuses it
/// for every write — this is intentional: the protocol exercises the
/// channel, not data variety, so checksums must still agree across
/// independently-built sender/receiver implementations.
pub struct Sender;

impl Sender {
    pub fn new() -> Sender {
        Sender
    }

    /// Performs the handshake, then streams `floor(spec.size / 1024)` copies
    /// of one freshly-generated random block. Sub-kilobyte remainders are
    /// silently dropped, matching the reference behaviour: a `spec.size`
    /// that isn't a multiple of 1024 is never rounded up.
    pub fn send_transfer<S: Read + Write>(
        &self,
        spec: &TransferSpec,
        conn: &mut S,
    ) -> Result<TransferResults, TransferError> {
        self.handshake(conn)?;

        let block = random_block(BLOCK_SIZE);
        self.send_data(conn, spec.ip, spec.size, &block)
    }

    fn handshake<S: Read>(&self, conn: &mut S) -> Result<(), TransferError> {
        let mut buf = [0u8; HANDSHAKE_READ_MAX];
        let n = conn.read(&mut buf).map_err(TransferError::Transport)?;
        let msg = &buf[..n];

        if msg == HANDSHAKE_OK {
            Ok(())
        } else if msg == HANDSHAKE_BUSY {
            Err(TransferError::Busy)
        } else {
            Err(TransferError::UnrecognizedResponse(
                String::from_utf8_lossy(msg).into_owned(),
            ))
        }
    }

    fn send_data<S: Write>(
        &self,
        conn: &mut S,
        ip: IpAddr,
        size: u32,
        block: &[u8],
    ) -> Result<TransferResults, TransferError> {
        let packets = size / BLOCK_SIZE as u32;

        let mut hasher = Hasher::new();
        let mut bytes_sent: u32 = 0;

        let start = Instant::now();
        for _ in 0..packets {
            conn.write_all(block).map_err(TransferError::Transport)?;
            bytes_sent += block.len() as u32;
            hasher.update(block);
        }
        let duration = start.elapsed();

        Ok(TransferResults {
            ip,
            bytes_sent,
            checksum: hasher.finalize(),
            duration,
            time: SystemTime::now(),
            rtt: None,
        })
    }
}

impl Default for Sender {
    fn default() -> Sender {
        Sender::new()
    }
}

fn random_block(size: usize) -> Vec<u8> {
    let mut block = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut block);
    block
}

/// The receiver side of the protocol.
pub struct Receiver;

impl Receiver {
    pub fn new() -> Receiver {
        Receiver
    }

    /// Writes the `"ok"` token, then reads until EOF, maintaining a running
    /// CRC-32 updated with the *full* 1024-byte buffer on every iteration —
    /// including the final, possibly short, read. This matches the
    /// reference implementation exactly and is required for checksum
    /// agreement with the sender.
    pub fn handle_transfer<S: Read + Write>(
        &self,
        conn: &mut S,
        peer_ip: IpAddr,
    ) -> Result<TransferResults, TransferError> {
        conn.write_all(HANDSHAKE_OK)
            .map_err(TransferError::Transport)?;

        let mut buffer = [0u8; BLOCK_SIZE];
        let mut hasher = Hasher::new();
        let mut bytes_sent: u32 = 0;

        let start = Instant::now();
        loop {
            match conn.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    bytes_sent += n as u32;
                    hasher.update(&buffer);
                }
                Err(_) => break, // any read error terminates the streaming phase
            }
        }
        let duration = start.elapsed();

        Ok(TransferResults {
            ip: peer_ip,
            bytes_sent,
            checksum: hasher.finalize(),
            duration,
            time: SystemTime::now(),
            rtt: None,
        })
    }

    /// Writes the busy rejection token. Best-effort: write failures are
    /// returned to the caller to log, not propagated as a protocol failure.
    pub fn handle_busy<S: Write>(&self, conn: &mut S) -> std::io::Result<()> {
        debug!("server is busy");
        conn.write_all(HANDSHAKE_BUSY)
    }
}

impl Default for Receiver {
    fn default() -> Receiver {
        Receiver::new()
    }
}
