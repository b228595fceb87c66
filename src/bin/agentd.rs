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

use std::net::IpAddr;
use std::process;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info, LevelFilter};

use fluxmesh::api::server::Server as ApiServer;
use fluxmesh::cli::Args;
use fluxmesh::client::{TcpConnector, TransferClient};
use fluxmesh::config::Config;
use fluxmesh::dispatcher::{Dispatcher, CONFIGURED_HOST_TASK_PRIORITY};
use fluxmesh::lottery::LotteryTaskSelector;
use fluxmesh::random::CryptoRandomSource;
use fluxmesh::receiver::{Listener, TransferReceiver};
use fluxmesh::registry::Registry;
use fluxmesh::scheduler::{RealClock, Scheduler};
use fluxmesh::transfer::spec::TransferSpec;

fn main() {
    let args = Args::parse();

    let level = if args.debug { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::new().filter_level(level).init();

    let cfg = Config::load(&args.config).unwrap_or_else(|e| {
        error!("loading configuration: {}", e);
        process::exit(1);
    });

    info!("fluxmesh agent starting");

    let registry = Arc::new(Registry::new());
    let receiver = Arc::new(TransferReceiver::new());

    let rand = Arc::new(CryptoRandomSource::new());
    let selector = Box::new(LotteryTaskSelector::new(rand));
    let scheduler = Arc::new(Scheduler::new(
        selector,
        Duration::from_secs(1),
        Arc::new(RealClock),
    ));

    let client = Arc::new(TransferClient::new(Box::new(TcpConnector)));
    let dispatcher = Arc::new(Dispatcher::new(
        scheduler.clone(),
        receiver.clone(),
        client,
        registry.clone(),
    ));

    for remote_host in &cfg.remote_hosts {
        let (host, port) = split_host_port(remote_host).unwrap_or_else(|e| {
            error!("parsing remote host `{}`: {}", remote_host, e);
            process::exit(1);
        });

        dispatcher.create_with_priority(
            TransferSpec {
                ip: host,
                port,
                size: cfg.init_transfer_size,
            },
            CONFIGURED_HOST_TASK_PRIORITY,
        );
    }

    let listener = Arc::new(Listener::new(receiver.clone(), registry.clone()));
    let transfer_addr = format!("0.0.0.0:{}", cfg.transfer_port);
    let listener_for_thread = listener.clone();
    let listener_handle = std::thread::Builder::new()
        .name("transfer-listener".into())
        .spawn(move || {
            if let Err(e) = listener_for_thread.serve(&transfer_addr) {
                error!("transfer listener stopped: {}", e);
                process::exit(1);
            }
        })
        .expect("failed to spawn transfer listener thread");

    let api_server = cfg.management_port.map(|port| {
        let server = Arc::new(
            ApiServer::new(port, registry.clone(), dispatcher.clone()).unwrap_or_else(|e| {
                error!("starting management API: {}", e);
                process::exit(1);
            }),
        );
        let server_for_thread = server.clone();
        let handle = std::thread::Builder::new()
            .name("management-api".into())
            .spawn(move || server_for_thread.serve())
            .expect("failed to spawn management API thread");
        (server, handle)
    });

    let scheduler_for_signal = scheduler.clone();
    let listener_for_signal = listener.clone();
    let api_server_for_signal = api_server.as_ref().map(|(server, _)| server.clone());
    ctrlc::set_handler(move || {
        info!("shutting down fluxmesh agent");
        if let Some(server) = &api_server_for_signal {
            server.shutdown();
        }
        let _ = scheduler_for_signal.stop();
        listener_for_signal.shutdown();
    })
    .expect("failed to install signal handler");

    scheduler.run();

    listener_handle.join().expect("transfer listener thread panicked");
    if let Some((_, handle)) = api_server {
        handle.join().expect("management API thread panicked");
    }

    info!("fluxmesh agent stopped");
}

fn split_host_port(s: &str) -> Result<(IpAddr, u16), String> {
    let (host, port) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("missing port in `{}`", s))?;

    let ip = IpAddr::from_str(host).map_err(|e| format!("invalid host `{}`: {}", host, e))?;
    let port: u16 = port
        .parse()
        .map_err(|e| format!("invalid port `{}`: {}", port, e))?;

    Ok((ip, port))
}
