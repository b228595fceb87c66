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

//! Operator CLI for driving a running agent's management API.

use std::net::IpAddr;
use std::process;
use std::str::FromStr;
use std::time::Duration;

use clap::{Parser, Subcommand};

use fluxmesh::api::client::Client;
use fluxmesh::api::types::{TransferSpec, TransferState};

#[derive(Debug, Parser)]
#[command(name = "fluxmeshctl", about = "Operator CLI for a fluxmesh agent")]
struct Args {
    /// Agent host to connect to.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Agent management API port.
    #[arg(long)]
    port: u16,

    /// Request timeout.
    #[arg(long, default_value = "5")]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check that the agent is reachable.
    Ping,
    /// List transfers in the given state (pending, running or completed).
    Transfers { state: String },
    /// List all completed transfer results.
    Results,
    /// List completed transfer results for one peer IP.
    ResultsByIp { ip: String },
    /// Ask the agent to start a transfer to ip:port of the given size.
    Create { ip: String, port: u16, size: u32 },
}

fn main() {
    let args = Args::parse();
    let client = Client::new(args.host, args.port, Duration::from_secs(args.timeout_secs));

    let result = match args.command {
        Command::Ping => client.ping().map(|_| println!("ok")),
        Command::Transfers { state } => client
            .transfers_by_state(state.parse::<TransferState>().unwrap())
            .map(|transfers| {
                for t in transfers {
                    println!("{}:{} size={} state={}", t.spec.ip, t.spec.port, t.spec.size, t.state);
                }
            }),
        Command::Results => client.transfer_results().map(|results| {
            for r in results {
                println!(
                    "{} bytes_sent={} checksum={:#x} duration_ms={} time={}",
                    r.ip, r.bytes_sent, r.checksum, r.duration_ms, r.time
                );
            }
        }),
        Command::ResultsByIp { ip } => {
            let ip = IpAddr::from_str(&ip).unwrap_or_else(|e| {
                eprintln!("invalid IP `{}`: {}", ip, e);
                process::exit(1);
            });
            client.transfer_results_by_ip(ip).map(|results| {
                for r in results {
                    println!(
                        "{} bytes_sent={} checksum={:#x} duration_ms={} time={}",
                        r.ip, r.bytes_sent, r.checksum, r.duration_ms, r.time
                    );
                }
            })
        }
        Command::Create { ip, port, size } => {
            let ip = IpAddr::from_str(&ip).unwrap_or_else(|e| {
                eprintln!("invalid IP `{}`: {}", ip, e);
                process::exit(1);
            });
            client.create_transfer(TransferSpec { ip, port, size })
        }
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
