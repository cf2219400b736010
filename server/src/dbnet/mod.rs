/*
 * Created on Sun Jul 11 2021
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

//! # Database networking
//!
//! One logical task per accepted TCP connection, all sharing the
//! [`Corestore`] handle. The listener hands every accepted stream to a
//! [`ConnectionHandler`](connection::ConnectionHandler) task; shutdown is
//! fanned out over a broadcast channel and tracked with an mpsc channel
//! whose closure tells the listener every handler is gone.

pub mod connection;
mod tcp;

pub use tcp::Listener;

use crate::corestore::Corestore;
use crate::util::error::{Error, SableResult};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::{broadcast, mpsc, Semaphore};

/// The hard cap on concurrent connections, whatever the configuration says
pub const MAXIMUM_CONNECTION_LIMIT: usize = 50000;
/// Listen backlog
const TCP_BACKLOG: u32 = 1024;

/// A handle that lets background services wait for the shutdown signal
pub struct Terminator {
    terminated: bool,
    signal: broadcast::Receiver<()>,
}

impl Terminator {
    pub fn new(signal: broadcast::Receiver<()>) -> Self {
        Terminator {
            terminated: false,
            signal,
        }
    }
    pub fn is_termination_signal(&self) -> bool {
        self.terminated
    }
    /// Wait for the shutdown broadcast (or for the sender to go away,
    /// which means the same thing)
    pub async fn receive_signal(&mut self) {
        if self.terminated {
            return;
        }
        let _ = self.signal.recv().await;
        self.terminated = true;
    }
}

/// The base TCP listener
pub struct BaseListener {
    /// An atomic reference to the shared in-memory store
    pub db: Corestore,
    /// The incoming connection listener (binding)
    pub listener: TcpListener,
    /// The maximum number of connections
    pub climit: Arc<Semaphore>,
    /// The shutdown broadcaster
    pub signal: broadcast::Sender<()>,
    // When all `Sender`s are dropped - the `Receiver` gets a `None` value
    // We send a clone of `terminate_tx` to each connection handler
    pub terminate_tx: mpsc::Sender<()>,
    pub terminate_rx: mpsc::Receiver<()>,
}

impl BaseListener {
    pub async fn init(
        db: &Corestore,
        host: IpAddr,
        port: u16,
        climit: Arc<Semaphore>,
        signal: broadcast::Sender<()>,
    ) -> SableResult<Self> {
        let (terminate_tx, terminate_rx) = mpsc::channel(1);
        let addr = SocketAddr::new(host, port);
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(|e| Error::ioerror_extra(e, "creating the listener socket"))?;
        socket
            .set_reuseaddr(true)
            .map_err(|e| Error::ioerror_extra(e, "setting SO_REUSEADDR"))?;
        socket
            .bind(addr)
            .map_err(|e| Error::ioerror_extra(e, format!("binding to port {port}")))?;
        let listener = socket
            .listen(TCP_BACKLOG)
            .map_err(|e| Error::ioerror_extra(e, format!("listening on port {port}")))?;
        Ok(Self {
            db: db.clone(),
            listener,
            climit,
            signal,
            terminate_tx,
            terminate_rx,
        })
    }
    /// Wait until every connection handler has dropped its termination
    /// sender
    pub async fn release_self(self) {
        let Self {
            mut terminate_rx,
            terminate_tx,
            signal,
            ..
        } = self;
        drop(signal);
        drop(terminate_tx);
        let _ = terminate_rx.recv().await;
    }
}

/// Bind the listener and hand back the accept loop driver
pub async fn connect(db: Corestore, signal: broadcast::Sender<()>) -> SableResult<Listener> {
    let cfg = db.config();
    let maxcon = cfg.max_clients.min(MAXIMUM_CONNECTION_LIMIT);
    let climit = Arc::new(Semaphore::new(maxcon));
    let host = cfg.host;
    let port = cfg.port;
    let base = BaseListener::init(&db, host, port, climit, signal).await?;
    log::info!("Server started on sable://{host}:{port}");
    Ok(Listener::new(base))
}
