pub mod framer;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::NetResult;

pub use framer::{Frame, FrameDecoder, RawEncoder, MAX_LINE_LEN};

/// Byte-stream requirements for a relay connection.
pub trait RelayTransport: AsyncWrite + AsyncRead + Unpin + Send + 'static {
    fn peer_addr(&self) -> NetResult<std::net::SocketAddr>;
    fn local_addr(&self) -> NetResult<std::net::SocketAddr>;
}

impl RelayTransport for tokio::net::TcpStream {
    fn peer_addr(&self) -> NetResult<std::net::SocketAddr> {
        self.peer_addr().map_err(|e| e.into())
    }

    fn local_addr(&self) -> NetResult<std::net::SocketAddr> {
        self.local_addr().map_err(|e| e.into())
    }
}

#[cfg(test)]
impl RelayTransport for turmoil::net::TcpStream {
    fn peer_addr(&self) -> NetResult<std::net::SocketAddr> {
        self.peer_addr().map_err(|e| e.into())
    }

    fn local_addr(&self) -> NetResult<std::net::SocketAddr> {
        self.local_addr().map_err(|e| e.into())
    }
}
