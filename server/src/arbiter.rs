/*
 * Created on Tue Jul 20 2021
 *
 * This file is a part of Sable
 * Sable is a free and open-source in-memory data structure store that
 * speaks the Redis RESP2 protocol, written by Sayan Nandan ("the Author")
 * with the vision to provide a fast and reliable caching and data
 * structure layer without compromising on simplicity
 *
 * Copyright (c) 2021, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

use crate::config::ConfigSet;
use crate::corestore::Corestore;
use crate::dbnet::{self, Terminator};
use crate::services;
use crate::util::error::SableResult;
use tokio::sync::broadcast;

#[cfg(unix)]
use core::{future::Future, pin::Pin, task::Context, task::Poll};
#[cfg(unix)]
use tokio::signal::unix::{signal as fnsignal, Signal, SignalKind};
#[cfg(unix)]
/// Object to bind to unix-specific signals
pub struct UnixTerminationSignal {
    sigterm: Signal,
}

#[cfg(unix)]
impl UnixTerminationSignal {
    pub fn init() -> SableResult<Self> {
        let sigterm = fnsignal(SignalKind::terminate())
            .map_err(|e| crate::util::error::Error::ioerror_extra(e, "binding to SIGTERM"))?;
        Ok(Self { sigterm })
    }
}

#[cfg(unix)]
impl Future for UnixTerminationSignal {
    type Output = Option<()>;

    fn poll(mut self: Pin<&mut Self>, ctx: &mut Context<'_>) -> Poll<Self::Output> {
        self.sigterm.poll_recv(ctx)
    }
}

/// Start the server and run until a termination signal, a fatal listener
/// error or a client-issued `SHUTDOWN`
pub async fn run(cfg: ConfigSet) -> SableResult<Corestore> {
    // Initialize the broadcast channel
    let (signal, _) = broadcast::channel(1);
    // load the snapshot (if any) before accepting a single connection
    let keyspace = services::restore_data(&cfg.rdb_path());
    let save_points = cfg.save_points.clone();
    let db = Corestore::with_keyspace(cfg, keyspace);

    // initialize the background services
    let bgsave_handle = tokio::spawn(services::bgsave::bgsave_scheduler(
        db.clone(),
        save_points,
        Terminator::new(signal.subscribe()),
    ));
    let expiry_handle = tokio::spawn(services::expiry::expiry_service(
        db.clone(),
        Terminator::new(signal.subscribe()),
    ));

    // bind the ctrlc handler
    let sig = tokio::signal::ctrl_c();
    // a client SHUTDOWN fires the same broadcast we use for shutdown
    let mut shutdown_rx = signal.subscribe();

    let mut server = dbnet::connect(db.clone(), signal.clone()).await?;

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = server.run() => {}
            _ = sig => {}
            _ = shutdown_rx.recv() => {
                log::info!("Shutdown requested by a client");
            }
        }
    }
    #[cfg(unix)]
    {
        let sigterm = UnixTerminationSignal::init()?;
        // apart from CTRL+C, the only other thing we care about is SIGTERM
        tokio::select! {
            _ = server.run() => {},
            _ = sig => {},
            _ = sigterm => {},
            _ = shutdown_rx.recv() => {
                log::info!("Shutdown requested by a client");
            }
        }
    }

    log::info!("Signalling all workers to shut down");
    // drop our copies of the signal and let everyone else exit
    drop(shutdown_rx);
    drop(signal);
    server.base.release_self().await;

    // wait for the background services to terminate
    let _ = expiry_handle.await;
    let _ = bgsave_handle.await;
    Ok(db)
}
