//! Builders for every line the relay ever writes.
//!
//! Wire formats are bit-exact contracts; clients pattern-match on them.

use bytes::{BufMut, Bytes, BytesMut};

pub fn ok_joined(name: &str, room: &str) -> Bytes {
    Bytes::from(format!("OK Joined as {name} in room {room}\n"))
}

pub fn err_join_usage() -> Bytes {
    Bytes::from_static(b"ERR Usage: /join <name> <room>\n")
}

pub fn err_join_first() -> Bytes {
    Bytes::from_static(b"ERR Please /join first.\n")
}

pub fn err_unknown() -> Bytes {
    Bytes::from_static(b"ERR Unknown command.\n")
}

pub fn err_server_busy() -> Bytes {
    Bytes::from_static(b"ERR Server busy.\n")
}

/// `[NAME] BODY` broadcast line for a chat message.
pub fn chat_line(name: &str, body: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(name.len() + body.len() + 4);
    buf.put_u8(b'[');
    buf.put_slice(name.as_bytes());
    buf.put_slice(b"] ");
    buf.put_slice(body.as_bytes());
    buf.put_u8(b'\n');
    buf.freeze()
}

/// `FILE SENDER NAME SIZE` header announcing a binary payload.
pub fn file_header(sender: &str, filename: &str, size: u64) -> Bytes {
    Bytes::from(format!("FILE {sender} {filename} {size}\n"))
}

pub fn notice_left(name: &str, room: &str) -> Bytes {
    Bytes::from(format!("NOTICE {name} left room {room}\n"))
}
