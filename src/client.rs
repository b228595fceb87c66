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

//! The outgoing side of a transfer: dialing a peer and running the sender
//! half of the wire protocol over the resulting connection.

use std::net::{IpAddr, TcpStream};

use log::info;

use crate::error::TransferError;
use crate::transfer::simple::Sender as WireSender;
use crate::transfer::spec::{TransferResults, TransferSpec};

/// Opens a connection to a peer. Abstracted so tests can substitute an
/// in-memory pipe instead of a real socket.
pub trait Connector: Send + Sync {
    fn connect(&self, ip: IpAddr, port: u16) -> Result<TcpStream, TransferError>;
}

/// Dials peers with `std::net::TcpStream::connect`.
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect(&self, ip: IpAddr, port: u16) -> Result<TcpStream, TransferError> {
        TcpStream::connect((ip, port)).map_err(TransferError::ConnectFailed)
    }
}

/// Runs outgoing transfers: dial, hand off to the wire protocol, log the
/// outcome.
pub struct TransferClient {
    connector: Box<dyn Connector>,
    sender: WireSender,
}

impl TransferClient {
    pub fn new(connector: Box<dyn Connector>) -> TransferClient {
        TransferClient {
            connector,
            sender: WireSender::new(),
        }
    }

    pub fn transfer(&self, spec: TransferSpec) -> Result<TransferResults, TransferError> {
        let mut conn = self.connector.connect(spec.ip, spec.port)?;

        let result = self.sender.send_transfer(&spec, &mut conn);
        if let Ok(res) = &result {
            info!(
                "outgoing transfer to {} completed: {} bytes, checksum {:#x}, took {:?}",
                spec.ip, res.bytes_sent, res.checksum, res.duration
            );
        }

        result
    }
}
