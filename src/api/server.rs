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

//! A blocking JSON-over-HTTP management server: transfer status, transfer
//! history and ad hoc transfer creation.

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

use log::{error, warn};
use tiny_http::{Header, Method, Response, Server as HttpServer};

use crate::api::types::{ServerError, ServerErrorCode, TransferResultsWire, TransferSpec, TransferState};
use crate::registry::Registry;

pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Accepts a transfer spec posted to the management API and schedules it.
/// Implemented by [`crate::dispatcher::Dispatcher`].
pub trait TransferCreator: Send + Sync {
    fn create(&self, spec: TransferSpec);
}

/// Serves the management API described by the agent's JSON routes. Runs on
/// the calling thread; callers typically spawn a dedicated thread for this.
pub struct Server {
    http: HttpServer,
    registry: Arc<Registry>,
    creator: Arc<dyn TransferCreator>,
}

impl Server {
    pub fn new(
        port: u16,
        registry: Arc<Registry>,
        creator: Arc<dyn TransferCreator>,
    ) -> Result<Server, String> {
        let addr = format!("0.0.0.0:{}", port);
        let http = HttpServer::http(&addr).map_err(|e| format!("binding {}: {}", addr, e))?;

        Ok(Server {
            http,
            registry,
            creator,
        })
    }

    /// Accepts and serves requests until `shutdown()` is called.
    pub fn serve(&self) {
        for mut request in self.http.incoming_requests() {
            let method = request.method().clone();
            let url = request.url().to_string();

            let response = self.route(&method, &url, &mut request);
            if let Err(e) = request.respond(response) {
                error!("failed to write management API response: {}", e);
            }
        }
    }

    /// Unblocks `serve()`'s accept loop so it returns, mirroring
    /// `Server#Close` in the original `api/server.go`.
    pub fn shutdown(&self) {
        self.http.unblock();
    }

    fn route(
        &self,
        method: &Method,
        url: &str,
        request: &mut tiny_http::Request,
    ) -> Response<std::io::Cursor<Vec<u8>>> {
        let segments: Vec<&str> = url.trim_start_matches('/').split('/').collect();

        match (method, segments.as_slice()) {
            (Method::Get, ["ping"]) => text_response(200, ""),
            (Method::Get, ["version"]) => text_response(200, AGENT_VERSION),
            (Method::Get, ["transfers", state]) => self.handle_get_transfers(state),
            (Method::Get, ["transfer_results"]) => {
                let results: Vec<TransferResultsWire> =
                    self.registry.transfer_results().into_iter().map(Into::into).collect();
                json_response(200, &results)
            }
            (Method::Get, ["transfer_results", ip]) => self.handle_get_transfer_results_by_ip(ip),
            (Method::Post, ["transfers"]) => self.handle_post_transfers(request),
            _ => text_response(404, "not found"),
        }
    }

    fn handle_get_transfers(&self, state: &str) -> Response<std::io::Cursor<Vec<u8>>> {
        let state = TransferState::from_str(state).unwrap_or(TransferState::Unknown);
        json_response(200, &self.registry.transfers_by_state(state))
    }

    fn handle_get_transfer_results_by_ip(&self, ip: &str) -> Response<std::io::Cursor<Vec<u8>>> {
        match IpAddr::from_str(ip) {
            Ok(ip) => {
                let results: Vec<TransferResultsWire> = self
                    .registry
                    .transfer_results_by_ip(ip)
                    .into_iter()
                    .map(Into::into)
                    .collect();
                json_response(200, &results)
            }
            Err(e) => error_response(
                ServerErrorCode::InvalidRequest,
                &format!("invalid IP `{}`: {}", ip, e),
            ),
        }
    }

    fn handle_post_transfers(
        &self,
        request: &mut tiny_http::Request,
    ) -> Response<std::io::Cursor<Vec<u8>>> {
        let spec: TransferSpec = match serde_json::from_reader(request.as_reader()) {
            Ok(spec) => spec,
            Err(e) => {
                warn!("rejecting malformed transfer spec: {}", e);
                return error_response(
                    ServerErrorCode::InvalidRequest,
                    &format!("invalid transfer spec: {}", e),
                );
            }
        };

        self.creator.create(spec);
        text_response(200, "")
    }
}

fn text_response(status: u16, body: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body).with_status_code(status)
}

fn json_response<T: serde::Serialize>(status: u16, body: &T) -> Response<std::io::Cursor<Vec<u8>>> {
    match serde_json::to_vec(body) {
        Ok(data) => {
            let header = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                .expect("static header is valid");
            Response::from_data(data)
                .with_status_code(status)
                .with_header(header)
        }
        Err(e) => error_response(ServerErrorCode::RegistryFailed, &e.to_string()),
    }
}

fn error_response(code: ServerErrorCode, msg: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    let status = match code {
        ServerErrorCode::InvalidRequest => 400,
        ServerErrorCode::RegistryFailed | ServerErrorCode::CreateFailed => 500,
    };

    let body = ServerError {
        code,
        msg: msg.to_string(),
    };
    json_response(status, &body)
}
