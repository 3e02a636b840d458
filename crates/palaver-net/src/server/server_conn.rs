use bytes::Bytes;
use palaver_wire::{reply, Command};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;

use crate::{
    codec::{Frame, RelayTransport},
    NetResult, RelayConn,
};

use super::{room::RelayHandle, session::Session, ClientId};

/// Conn handle result
pub enum HandleResult {
    /// Keep the session running
    Ok,
    /// `/quit` was handled; the session winds down
    Quit,
}

/// Drives one connection: inbound frames on one side, the relayed
/// outbound queue on the other. Every write to the socket happens here,
/// so replies and relayed traffic never interleave mid-line.
pub struct ServerConnCtx<T: RelayTransport> {
    id: ClientId,
    conn: RelayConn<T>,
    session: Session,
    relay: RelayHandle,
    rx: mpsc::Receiver<Bytes>,
    /// Handed to the registry on the first successful `/join`.
    join_tx: Option<mpsc::Sender<Bytes>>,
}

impl<T> ServerConnCtx<T>
where
    T: RelayTransport,
{
    pub(crate) fn new(
        id: ClientId,
        conn: RelayConn<T>,
        relay: RelayHandle,
        tx: mpsc::Sender<Bytes>,
        rx: mpsc::Receiver<Bytes>,
    ) -> Self {
        Self {
            id,
            conn,
            session: Session::new(),
            relay,
            rx,
            join_tx: Some(tx),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs the session until EOF, `/quit`, a fatal framing error, or a
    /// registry-side drop.
    pub(crate) async fn exec(&mut self) -> NetResult<HandleResult> {
        loop {
            tokio::select! {
                frame = self.conn.next() => {
                    match frame {
                        Some(Ok(Frame::Line(line))) => {
                            if let HandleResult::Quit = self.handle_line(&line).await? {
                                return Ok(HandleResult::Quit);
                            }
                        }
                        Some(Ok(Frame::Binary(chunk))) => {
                            self.relay.broadcast(self.id, chunk).await?;
                        }
                        Some(Err(err)) => return Err(err),
                        None => return Ok(HandleResult::Ok),
                    }
                }
                msg = self.rx.recv() => {
                    match msg {
                        Some(bytes) => self.conn.send_bytes(&bytes).await?,
                        // The registry dropped us, usually for falling behind
                        None => return Ok(HandleResult::Ok),
                    }
                }
            }
        }
    }

    async fn handle_line(&mut self, line: &Bytes) -> NetResult<HandleResult> {
        if line.is_empty() {
            return Ok(HandleResult::Ok);
        }

        match Command::parse(line) {
            Command::Join { name, room } => {
                // Registered before membership goes live; a member set
                // never holds an unregistered session.
                self.session.set_identity(name, room);
                self.session.mark_registered();
                self.relay.join(self.id, room, self.join_tx.take()).await?;
                log::info!("client {} joined room {room} as {name}", self.id);
                self.conn.send_bytes(&reply::ok_joined(&name, &room)).await?;
            }
            Command::JoinUsage => {
                self.conn.send_bytes(&reply::err_join_usage()).await?;
            }
            Command::Msg { body } => {
                if !self.session.is_registered() {
                    self.conn.send_bytes(&reply::err_join_first()).await?;
                } else {
                    let msg = reply::chat_line(self.session.name(), body);
                    self.relay.broadcast(self.id, msg).await?;
                }
            }
            Command::File { name, size } => {
                if !self.session.is_registered() {
                    self.conn.send_bytes(&reply::err_join_first()).await?;
                } else {
                    let header = reply::file_header(self.session.name(), name, size);
                    self.relay.broadcast(self.id, header).await?;
                    self.conn.enter_binary_mode(size);
                    log::info!(
                        "client {} relays {size} payload bytes to room {}",
                        self.id,
                        self.session.room()
                    );
                }
            }
            Command::Quit => return Ok(HandleResult::Quit),
            Command::Unknown => {
                self.conn.send_bytes(&reply::err_unknown()).await?;
            }
        }

        Ok(HandleResult::Ok)
    }

    /// Tears the session down: the room gets a farewell notice on an
    /// explicit `/quit`, a silent removal otherwise.
    pub(crate) async fn finish(self, quit: bool) -> NetResult<()> {
        let notice = (quit && self.session.is_registered())
            .then(|| reply::notice_left(self.session.name(), self.session.room()));
        self.relay.leave(self.id, notice).await;
        self.conn.close().await
    }
}
