pub mod room;
pub mod server_conn;
pub mod session;

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use futures::Stream;
use palaver_wire::reply;
use tokio::{net::TcpListener, sync::mpsc};
use tokio_stream::{wrappers::TcpListenerStream, StreamExt};

use crate::{codec::RelayTransport, NetError, NetResult, RelayConn};

use self::{
    room::{Relay, RelayHandle},
    server_conn::{HandleResult, ServerConnCtx},
};

pub use room::RoomRegistry;
pub use session::Session;

pub type ClientId = usize;

/// Tunables for one relay server.
#[derive(Debug, Clone)]
pub struct RelayServerConfig {
    /// Depth of each session's outbound relay queue.
    pub msg_cap: usize,
    /// Depth of the registry actor's inbox.
    pub relay_cap: usize,
    /// Session slots; admissions beyond this are refused.
    pub max_sessions: usize,
}

impl Default for RelayServerConfig {
    fn default() -> Self {
        Self {
            msg_cap: 64,
            relay_cap: 256,
            max_sessions: 1024,
        }
    }
}

/// The relay server: an accept loop in front of the registry actor.
#[derive(Debug)]
pub struct RelayServer {
    cfg: RelayServerConfig,
    relay: Relay,
    next_id: AtomicUsize,
    active: Arc<AtomicUsize>,
}

impl RelayServer {
    pub fn new(cfg: RelayServerConfig) -> Self {
        let relay = Relay::spawn(cfg.relay_cap);
        Self {
            cfg,
            relay,
            next_id: AtomicUsize::new(0),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of sessions currently being served.
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    async fn init_conn<T: RelayTransport>(
        id: ClientId,
        io: T,
        relay: RelayHandle,
        msg_cap: usize,
    ) -> NetResult<()> {
        let conn = RelayConn::new(io)?;
        log::info!("client {id} connected from {}", conn.peer_addr());

        let (tx, rx) = mpsc::channel(msg_cap);
        let mut ctx = ServerConnCtx::new(id, conn, relay, tx, rx);
        let quit = match ctx.exec().await {
            Ok(HandleResult::Quit) => true,
            Ok(HandleResult::Ok) => false,
            Err(err) => {
                log::error!("client {id} failed: {err}");
                false
            }
        };
        ctx.finish(quit).await?;
        log::info!("client {id} disconnected");
        Ok(())
    }

    /// Notice-then-close admission refusal.
    async fn refuse<T: RelayTransport>(io: T) {
        match RelayConn::new(io) {
            Ok(mut conn) => {
                let _ = conn.send_bytes(&reply::err_server_busy()).await;
                let _ = conn.close().await;
            }
            Err(err) => log::error!("refusing connection: {err}"),
        }
    }

    pub async fn serve<T: RelayTransport>(
        &mut self,
        mut io_stream: impl Stream<Item = NetResult<T>> + Unpin,
    ) -> NetResult<()> {
        loop {
            match io_stream.next().await {
                Some(Ok(io)) => {
                    if self.active_sessions() >= self.cfg.max_sessions {
                        log::warn!("session slots exhausted, refusing connection");
                        tokio::spawn(Self::refuse(io));
                        continue;
                    }

                    let id = self.next_id();
                    let relay = self.relay.handle();
                    let msg_cap = self.cfg.msg_cap;
                    let active = self.active.clone();
                    active.fetch_add(1, Ordering::Relaxed);
                    tokio::spawn(async move {
                        if let Err(err) = Self::init_conn(id, io, relay, msg_cap).await {
                            log::error!("client {id}: {err}");
                        }
                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                Some(Err(err)) => {
                    log::error!("Error while accepting connection: {err}");
                }
                None => break,
            }
        }

        Ok(())
    }

    pub async fn serve_tcp(mut self, addr: SocketAddr) -> NetResult<()> {
        let listener = TcpListener::bind(addr).await?;
        log::info!("listening on {}", listener.local_addr()?);
        let stream = TcpListenerStream::new(listener).map(|io| io.map_err(NetError::from));
        self.serve(stream).await
    }
}
