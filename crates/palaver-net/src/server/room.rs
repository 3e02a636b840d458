use bytes::Bytes;
use indexmap::IndexMap;
use palaver_wire::Name;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{NetError, NetResult};

use super::ClientId;

/// The members of one room, keyed by client id.
#[derive(Debug, Default)]
pub struct RoomSet {
    members: IndexMap<ClientId, mpsc::Sender<Bytes>>,
}

impl RoomSet {
    pub fn add(&mut self, key: ClientId, tx: mpsc::Sender<Bytes>) {
        self.members.insert(key, tx);
    }

    pub fn remove(&mut self, key: ClientId) -> Option<mpsc::Sender<Bytes>> {
        self.members.shift_remove(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.members.keys().copied()
    }

    /// Delivers to every member except `src`, returning the ids whose
    /// outbound queue rejected the bytes.
    pub fn broadcast_filter(&self, msg: Bytes, src: ClientId) -> Vec<ClientId> {
        let mut dead = Vec::new();
        for (key, tx) in self.members.iter() {
            if *key == src {
                continue;
            }
            if tx.try_send(msg.clone()).is_err() {
                dead.push(*key);
            }
        }
        dead
    }
}

/// Every room, plus the reverse index used to move and drop members.
///
/// Membership and a session's registration flag change together: a client
/// id is present here exactly while its session is registered and alive.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: IndexMap<Name, RoomSet>,
    by_client: IndexMap<ClientId, Name>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `id` into `room`, leaving its previous room first. A rejoin
    /// without a fresh sender reuses the one already registered.
    pub fn join(&mut self, id: ClientId, room: Name, tx: Option<mpsc::Sender<Bytes>>) {
        let prev = self.remove_membership(id);
        let Some(tx) = tx.or(prev) else {
            // Nothing stored for this client; it is already being torn down.
            return;
        };
        self.rooms.entry(room).or_default().add(id, tx);
        self.by_client.insert(id, room);
    }

    /// Drops `id` from its room. Returns the room it left, if any.
    pub fn leave(&mut self, id: ClientId) -> Option<Name> {
        let room = self.by_client.get(&id).copied()?;
        self.remove_membership(id);
        Some(room)
    }

    pub fn room_of(&self, id: ClientId) -> Option<&Name> {
        self.by_client.get(&id)
    }

    pub fn members(&self, room: &str) -> impl Iterator<Item = ClientId> + '_ {
        self.rooms
            .get(room)
            .into_iter()
            .flat_map(|set| set.ids())
    }

    /// Fans `msg` out to every member of `src`'s room except `src`.
    /// A peer that cannot keep up is dropped from the registry; its
    /// session winds down once its sender is gone.
    pub fn broadcast(&mut self, src: ClientId, msg: Bytes) {
        let Some(room) = self.by_client.get(&src).copied() else {
            return;
        };
        let Some(set) = self.rooms.get(&room) else {
            return;
        };
        for id in set.broadcast_filter(msg, src) {
            log::warn!("dropping client {id}: outbound queue full or closed");
            self.remove_membership(id);
        }
    }

    fn remove_membership(&mut self, id: ClientId) -> Option<mpsc::Sender<Bytes>> {
        let room = self.by_client.shift_remove(&id)?;
        let set = self.rooms.get_mut(&room)?;
        let tx = set.remove(id);
        if set.is_empty() {
            self.rooms.shift_remove(&room);
        }
        tx
    }
}

/// Messages processed by the registry actor.
#[derive(Debug)]
pub enum RoomMsg {
    Join {
        id: ClientId,
        room: Name,
        tx: Option<mpsc::Sender<Bytes>>,
        ack: oneshot::Sender<()>,
    },
    Broadcast {
        src: ClientId,
        msg: Bytes,
    },
    Leave {
        id: ClientId,
        notice: Option<Bytes>,
    },
}

/// Handle used by connection tasks to talk to the registry actor.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<RoomMsg>,
}

impl RelayHandle {
    /// Registers `id` in `room`; resolves once membership is live.
    pub async fn join(
        &self,
        id: ClientId,
        room: Name,
        tx_conn: Option<mpsc::Sender<Bytes>>,
    ) -> NetResult<()> {
        let (ack, joined) = oneshot::channel();
        self.tx
            .send(RoomMsg::Join {
                id,
                room,
                tx: tx_conn,
                ack,
            })
            .await
            .map_err(|_| NetError::RelayClosed)?;
        joined.await.map_err(|_| NetError::RelayClosed)?;
        Ok(())
    }

    pub async fn broadcast(&self, src: ClientId, msg: Bytes) -> NetResult<()> {
        self.tx
            .send(RoomMsg::Broadcast { src, msg })
            .await
            .map_err(|_| NetError::RelayClosed)
    }

    /// Fire-and-forget removal, with an optional farewell notice for the
    /// remaining peers.
    pub async fn leave(&self, id: ClientId, notice: Option<Bytes>) {
        let _ = self.tx.send(RoomMsg::Leave { id, notice }).await;
    }
}

/// The registry actor; sole owner of every room.
#[derive(Debug)]
pub struct Relay {
    kill: JoinHandle<()>,
    tx: mpsc::Sender<RoomMsg>,
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.kill.abort();
    }
}

impl Relay {
    /// Spawns the registry actor with the given inbox depth.
    pub fn spawn(msg_cap: usize) -> Self {
        let (tx, rx) = mpsc::channel(msg_cap);
        let kill = tokio::spawn(Self::exec(rx));
        Self { kill, tx }
    }

    pub fn handle(&self) -> RelayHandle {
        RelayHandle {
            tx: self.tx.clone(),
        }
    }

    /// Internal execution loop; ends when every handle is gone.
    async fn exec(mut rx: mpsc::Receiver<RoomMsg>) {
        let mut registry = RoomRegistry::new();
        while let Some(msg) = rx.recv().await {
            match msg {
                RoomMsg::Join { id, room, tx, ack } => {
                    registry.join(id, room, tx);
                    let _ = ack.send(());
                }
                RoomMsg::Broadcast { src, msg } => {
                    registry.broadcast(src, msg);
                }
                RoomMsg::Leave { id, notice } => {
                    if let Some(notice) = notice {
                        registry.broadcast(id, notice);
                    }
                    registry.leave(id);
                }
            }
        }
    }
}
