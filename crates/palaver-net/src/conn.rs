use std::{io, net::SocketAddr};

use futures::{SinkExt, Stream, StreamExt};
use tokio::io::{ReadHalf, WriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::{
    codec::{Frame, FrameDecoder, RawEncoder, RelayTransport},
    NetResult,
};

/// A framed relay connection: line/binary frames in, raw bytes out.
pub struct RelayConn<T> {
    r: FramedRead<ReadHalf<T>, FrameDecoder>,
    w: FramedWrite<WriteHalf<T>, RawEncoder>,
    peer_addr: SocketAddr,
}

impl<T> RelayConn<T>
where
    T: RelayTransport,
{
    /// Create a new connection from the `io`
    pub fn new(io: T) -> NetResult<Self> {
        let peer_addr = io.peer_addr()?;
        let (r, w) = tokio::io::split(io);
        Ok(Self {
            r: FramedRead::new(r, FrameDecoder::new()),
            w: FramedWrite::new(w, RawEncoder),
            peer_addr,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Switches the inbound framer into binary mode for `n` bytes.
    pub fn enter_binary_mode(&mut self, n: u64) {
        self.r.decoder_mut().enter_binary_mode(n);
    }

    pub async fn read_frame(&mut self) -> NetResult<Frame> {
        match self.r.next().await {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(e)) => Err(e),
            None => Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
        }
    }

    /// Writes the bytes out fully; partial writes are retried by the
    /// framed write half.
    pub async fn send_bytes(&mut self, data: &[u8]) -> NetResult<()> {
        self.w.send(data).await?;
        Ok(())
    }

    pub async fn close(mut self) -> NetResult<()> {
        self.w.close().await?;
        Ok(())
    }
}

impl<T: RelayTransport> Stream for RelayConn<T> {
    type Item = NetResult<Frame>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.get_mut().r.poll_next_unpin(cx)
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use bytes::Bytes;
    use tokio::io::AsyncWriteExt;
    use turmoil::net::{TcpListener, TcpStream};

    use super::*;

    const PORT: u16 = 3490;

    async fn bind() -> std::result::Result<TcpListener, std::io::Error> {
        TcpListener::bind((IpAddr::from(Ipv4Addr::UNSPECIFIED), PORT)).await
    }

    #[test]
    fn echo_lines() -> anyhow::Result<()> {
        let mut sim = turmoil::Builder::new().build();

        sim.host("server", || async move {
            let listener = bind().await?;

            loop {
                let socket = listener.accept().await?.0;
                let mut conn = RelayConn::new(socket)?;
                while let Ok(Frame::Line(line)) = conn.read_frame().await {
                    conn.send_bytes(&line).await?;
                    conn.send_bytes(b"\n").await?;
                }
            }
        });

        sim.client("client", async move {
            let socket = TcpStream::connect(("server", PORT)).await?;
            let mut conn = RelayConn::new(socket)?;

            // Lines go out in ragged pieces and come back whole
            conn.send_bytes(b"hel").await?;
            conn.send_bytes(b"lo\nwo").await?;
            conn.send_bytes(b"rld\n").await?;

            assert_eq!(conn.read_frame().await?, Frame::Line(Bytes::from_static(b"hello")));
            assert_eq!(conn.read_frame().await?, Frame::Line(Bytes::from_static(b"world")));

            Ok(())
        });

        sim.run().unwrap();

        Ok(())
    }

    #[test]
    fn eof_is_an_error() -> anyhow::Result<()> {
        let mut sim = turmoil::Builder::new().build();

        sim.host("server", || async move {
            let listener = bind().await?;
            loop {
                let (mut socket, _) = listener.accept().await?;
                socket.shutdown().await?;
            }
        });

        sim.client("client", async move {
            let socket = TcpStream::connect(("server", PORT)).await?;
            let mut conn = RelayConn::new(socket)?;
            assert!(conn.read_frame().await.is_err());
            Ok(())
        });

        sim.run().unwrap();

        Ok(())
    }
}
