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

//! # Connection handling
//!
//! A [`Connection`] owns the buffered stream plus the incremental parse
//! buffer; a [`ConnectionHandler`] drives it: read bytes, drain every
//! complete frame (pipelining), execute, reply, flush once per batch.
//! Suspension points exist only at socket reads and writes, never while
//! the keyspace lock is held.

use crate::actions::ActionError;
use crate::corestore::{Corestore, Data};
use crate::protocol::{ParseError, Parser};
use crate::queryengine;
use crate::resp::Response;
use crate::IoResult;
use bytes::{Buf, Bytes, BytesMut};
use std::collections::HashSet;
use std::io::{Error as IoError, ErrorKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{broadcast, Semaphore};
use tokio::time;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(0);

/// A buffered TCP stream plus the append-only parse buffer
pub struct Connection {
    pub stream: BufWriter<TcpStream>,
    pub buffer: BytesMut,
    /// scratch space replies are encoded into before hitting the stream
    out: BytesMut,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Connection {
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(libsable::BUF_CAP),
            out: BytesMut::new(),
        }
    }
    /// Read one chunk off the socket into the parse buffer. `Ok(0)` is EOF
    pub async fn read_some(&mut self) -> IoResult<usize> {
        self.stream.read_buf(&mut self.buffer).await
    }
    pub async fn write_response(&mut self, response: &Response) -> IoResult<()> {
        self.out.clear();
        response.write_to(&mut self.out);
        self.stream.write_all(&self.out).await
    }
    pub async fn write_raw(&mut self, bytes: &[u8]) -> IoResult<()> {
        self.stream.write_all(bytes).await
    }
    pub async fn flush(&mut self) -> IoResult<()> {
        self.stream.flush().await
    }
}

/// Requested by `SHUTDOWN`; decides whether the final save runs
#[derive(Debug, Clone, Copy)]
pub enum ShutdownMode {
    Save,
    NoSave,
}

/// Per-connection command state: identity, subscriptions and the
/// connection-control flags handlers can set
pub struct ClientContext {
    pub id: u64,
    pub subscriptions: HashSet<Data>,
    pub psubscriptions: HashSet<Data>,
    /// enqueue-to-socket half handed to the pub/sub tables
    pub msg_tx: UnboundedSender<Bytes>,
    /// set by `QUIT`: reply, flush, close
    pub quit: bool,
    /// set by `SHUTDOWN`
    pub shutdown: Option<ShutdownMode>,
}

impl ClientContext {
    pub fn new(id: u64, msg_tx: UnboundedSender<Bytes>) -> Self {
        ClientContext {
            id,
            subscriptions: HashSet::new(),
            psubscriptions: HashSet::new(),
            msg_tx,
            quit: false,
            shutdown: None,
        }
    }
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len() + self.psubscriptions.len()
    }
    /// While this is true only the pub/sub commands plus `PING`/`QUIT`
    /// are allowed
    pub fn in_subscriber_mode(&self) -> bool {
        self.subscription_count() > 0
    }
}

enum Flow {
    Continue,
    Close,
}

enum ReadOutcome {
    Data,
    Closed,
}

async fn read_from(con: &mut Connection, idle_timeout: u64) -> IoResult<ReadOutcome> {
    let read = con.read_some();
    let n = if idle_timeout == 0 {
        read.await?
    } else {
        match time::timeout(Duration::from_secs(idle_timeout), read).await {
            Ok(result) => result?,
            Err(_) => {
                log::debug!("Closing idle connection");
                return Ok(ReadOutcome::Closed);
            }
        }
    };
    if n == 0 {
        if con.buffer.is_empty() {
            Ok(ReadOutcome::Closed)
        } else {
            Err(IoError::from(ErrorKind::ConnectionReset))
        }
    } else {
        Ok(ReadOutcome::Data)
    }
}

/// A generic connection handler: one per accepted connection
pub struct ConnectionHandler {
    /// an atomic reference to the shared in-memory store
    db: Corestore,
    /// the connection
    con: Connection,
    /// per-connection command state
    client: ClientContext,
    /// receiving half of the pub/sub message queue
    msg_rx: UnboundedReceiver<Bytes>,
    /// the semaphore used to impose limits on number of connections
    climit: Arc<Semaphore>,
    /// handle for initiating a server-wide shutdown (`SHUTDOWN`)
    signal: broadcast::Sender<()>,
    /// check for termination signals
    termination_signal: broadcast::Receiver<()>,
    /// the sender that we drop when we're done with handling a connection
    /// (used for graceful exit)
    _term_sig_tx: mpsc::Sender<()>,
    /// idle-connection timeout in seconds (0 = none)
    idle_timeout: u64,
}

impl ConnectionHandler {
    pub fn new(
        db: Corestore,
        con: Connection,
        climit: Arc<Semaphore>,
        signal: broadcast::Sender<()>,
        termination_signal: broadcast::Receiver<()>,
        _term_sig_tx: mpsc::Sender<()>,
    ) -> Self {
        let id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed) + 1;
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let idle_timeout = db.config().timeout;
        db.client_connected();
        Self {
            db,
            con,
            client: ClientContext::new(id, msg_tx),
            msg_rx,
            climit,
            signal,
            termination_signal,
            _term_sig_tx,
            idle_timeout,
        }
    }
    pub async fn run(&mut self) -> IoResult<()> {
        log::debug!("ConnectionHandler initialized to handle a remote client");
        let ret = self.run_inner().await;
        // drop whatever subscriptions the client left behind
        self.db.pubsub().drop_client(
            self.client.id,
            &self.client.subscriptions,
            &self.client.psubscriptions,
        );
        ret
    }
    async fn run_inner(&mut self) -> IoResult<()> {
        loop {
            if let Flow::Close = self.drain_frames().await? {
                return Ok(());
            }
            let idle_timeout = self.idle_timeout;
            let Self {
                ref mut con,
                ref mut msg_rx,
                ref mut termination_signal,
                ..
            } = *self;
            tokio::select! {
                ret = read_from(&mut *con, idle_timeout) => match ret? {
                    ReadOutcome::Data => {}
                    ReadOutcome::Closed => return Ok(()),
                },
                msg = msg_rx.recv() => {
                    if let Some(msg) = msg {
                        con.write_raw(&msg).await?;
                        con.flush().await?;
                    }
                }
                _ = termination_signal.recv() => return Ok(()),
            }
        }
    }
    /// Execute every complete frame sitting in the buffer, then flush once
    async fn drain_frames(&mut self) -> IoResult<Flow> {
        let mut wrote = false;
        loop {
            if self.con.buffer.is_empty() {
                break;
            }
            match Parser::parse(&self.con.buffer) {
                Ok((frame, consumed)) => {
                    self.con.buffer.advance(consumed);
                    let cmd = match frame.into_command() {
                        Ok(cmd) => cmd,
                        Err(e) => {
                            // a misaligned stream is unrecoverable
                            self.con.write_response(&Response::Error(e.to_owned())).await?;
                            self.con.flush().await?;
                            return Ok(Flow::Close);
                        }
                    };
                    if cmd.is_empty() {
                        continue;
                    }
                    match queryengine::execute(&self.db, &mut self.client, cmd) {
                        Ok(response) => self.con.write_response(&response).await?,
                        Err(ActionError::ActionError(e)) => {
                            self.con.write_response(&Response::Error(e)).await?
                        }
                        Err(ActionError::IoError(e)) => return Err(e),
                    }
                    wrote = true;
                    if self.client.quit {
                        self.con.flush().await?;
                        return Ok(Flow::Close);
                    }
                    if let Some(mode) = self.client.shutdown.take() {
                        if let ShutdownMode::NoSave = mode {
                            self.db.set_skip_final_save();
                        }
                        self.con.flush().await?;
                        let _ = self.signal.send(());
                        return Ok(Flow::Close);
                    }
                }
                Err(ParseError::NotEnough) => break,
                Err(e) => {
                    self.con
                        .write_response(&Response::Error(e.message().to_owned()))
                        .await?;
                    self.con.flush().await?;
                    return Ok(Flow::Close);
                }
            }
        }
        if wrote {
            self.con.flush().await?;
        }
        Ok(Flow::Continue)
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        // Make sure that the permit is returned to the semaphore
        // in the case that there is a panic inside
        self.climit.add_permits(1);
        self.db.client_disconnected();
    }
}
