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

//! A blocking client for the management API, used by operator tooling to
//! query and drive a running agent.

use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;

use crate::api::types::{Transfer, TransferResultsWire, TransferSpec, TransferState};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("making request: {0}")]
    Request(#[from] Box<ureq::Error>),

    #[error("reading response: {0}")]
    Io(#[from] std::io::Error),

    #[error("decoding response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Talks to one agent's management API over plain HTTP. Keep-alive is
/// disabled so a stalled peer can't wedge a connection pool; every call pays
/// a fresh handshake in exchange for isolation between requests.
pub struct Client {
    host: String,
    port: u16,
    timeout: Duration,
}

impl Client {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Client {
        Client {
            host: host.into(),
            port,
            timeout,
        }
    }

    pub fn ping(&self) -> Result<(), ClientError> {
        self.get_raw("ping")?;
        Ok(())
    }

    pub fn transfers_by_state(&self, state: TransferState) -> Result<Vec<Transfer>, ClientError> {
        let body = self.get_raw(&format!("transfers/{}", state))?;
        Ok(serde_json::from_str(&body)?)
    }

    pub fn transfer_results(&self) -> Result<Vec<TransferResultsWire>, ClientError> {
        let body = self.get_raw("transfer_results")?;
        Ok(serde_json::from_str(&body)?)
    }

    pub fn transfer_results_by_ip(&self, ip: IpAddr) -> Result<Vec<TransferResultsWire>, ClientError> {
        let body = self.get_raw(&format!("transfer_results/{}", ip))?;
        Ok(serde_json::from_str(&body)?)
    }

    pub fn create_transfer(&self, spec: TransferSpec) -> Result<(), ClientError> {
        let agent = self.agent();
        agent
            .post(&self.route("transfers"))
            .send_json(spec)
            .map_err(Box::new)?;
        Ok(())
    }

    fn get_raw(&self, path: &str) -> Result<String, ClientError> {
        let agent = self.agent();
        let body = agent
            .get(&self.route(path))
            .call()
            .map_err(Box::new)?
            .into_string()?;
        Ok(body)
    }

    fn agent(&self) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout(self.timeout)
            .no_delay(true)
            .build()
    }

    fn route(&self, path: &str) -> String {
        format!("http://{}:{}/{}", self.host, self.port, path)
    }
}
