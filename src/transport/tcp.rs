use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use anyhow::Context;
use bytes::BytesMut;
use log::{debug, info};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::protocol::{LineCodec, Message};
use crate::transport::{Inbound, Outbound};

const READ_CHUNK: usize = 4096;

// Any routable address works; connecting a UDP socket sends nothing.
const ROUTE_TARGET: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(10, 254, 254, 254), 1);

/// The IPv4 address a joiner on the LAN should dial to reach this machine.
/// Falls back to loopback when no route is available.
pub fn local_ipv4() -> Ipv4Addr {
    let routed = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).and_then(|socket| {
        socket.connect(ROUTE_TARGET)?;
        socket.local_addr()
    });
    match routed {
        Ok(addr) => lan_or_loopback(Some(addr.ip())),
        Err(e) => {
            debug!("no LAN route ({}); advertising loopback", e);
            lan_or_loopback(None)
        }
    }
}

fn lan_or_loopback(candidate: Option<IpAddr>) -> Ipv4Addr {
    match candidate {
        Some(IpAddr::V4(ip)) if !ip.is_unspecified() => ip,
        _ => Ipv4Addr::LOCALHOST,
    }
}

/// Listening socket for host mode. Accepting consumes it, so exactly one peer
/// can ever connect.
pub struct HostListener {
    listener: TcpListener,
}

impl HostListener {
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("failed to bind")?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Address to hand to the joiner. A wildcard bind is replaced by the
    /// machine's LAN address.
    pub fn advertised_addr(&self) -> anyhow::Result<SocketAddr> {
        let bound = self.local_addr()?;
        let ip = if bound.ip().is_unspecified() {
            IpAddr::V4(local_ipv4())
        } else {
            bound.ip()
        };
        Ok(SocketAddr::new(ip, bound.port()))
    }

    /// Wait for a single peer, then stop listening.
    pub async fn accept(self) -> anyhow::Result<TcpTransport> {
        let (stream, peer) = self.listener.accept().await.context("accept failed")?;
        info!("peer connected from {}", peer);
        Ok(TcpTransport::new(stream))
    }
}

/// A connected TCP stream carrying newline-delimited JSON messages.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Self {
        // Turn messages are tiny and latency-sensitive.
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed: {}", e);
        }
        Self { stream }
    }

    /// Join mode: dial `addr` once.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await.context("connect failed")?;
        Ok(Self::new(stream))
    }

    pub fn peer_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }

    pub fn into_split(self) -> (TcpInbound, TcpOutbound) {
        let (read, write) = self.stream.into_split();
        (
            TcpInbound {
                read,
                buf: BytesMut::with_capacity(READ_CHUNK),
                codec: LineCodec::new(),
            },
            TcpOutbound {
                write: Some(write),
                codec: LineCodec::new(),
                buf: BytesMut::new(),
            },
        )
    }
}

pub struct TcpInbound {
    read: OwnedReadHalf,
    buf: BytesMut,
    codec: LineCodec,
}

#[async_trait::async_trait]
impl Inbound for TcpInbound {
    async fn recv(&mut self) -> anyhow::Result<Option<Message>> {
        loop {
            if let Some(msg) = self.codec.decode(&mut self.buf)? {
                return Ok(Some(msg));
            }
            self.buf.reserve(READ_CHUNK);
            let n = self
                .read
                .read_buf(&mut self.buf)
                .await
                .context("read error")?;
            if n == 0 {
                if !self.buf.is_empty() {
                    debug!("discarding {} bytes of unterminated frame", self.buf.len());
                }
                return Ok(None);
            }
        }
    }
}

pub struct TcpOutbound {
    write: Option<OwnedWriteHalf>,
    codec: LineCodec,
    buf: BytesMut,
}

#[async_trait::async_trait]
impl Outbound for TcpOutbound {
    async fn send(&mut self, msg: &Message) -> anyhow::Result<()> {
        let write = self
            .write
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("connection is closed"))?;
        self.buf.clear();
        self.codec.encode(msg, &mut self.buf)?;
        write.write_all(&self.buf).await.context("write error")?;
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        if let Some(mut write) = self.write.take() {
            write.shutdown().await.context("shutdown failed")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertises_loopback_without_a_lan_address() {
        assert_eq!(lan_or_loopback(None), Ipv4Addr::LOCALHOST);
        assert_eq!(
            lan_or_loopback(Some(IpAddr::V4(Ipv4Addr::UNSPECIFIED))),
            Ipv4Addr::LOCALHOST
        );
        assert_eq!(
            lan_or_loopback(Some(IpAddr::V6(std::net::Ipv6Addr::LOCALHOST))),
            Ipv4Addr::LOCALHOST
        );
        let lan = Ipv4Addr::new(192, 168, 1, 20);
        assert_eq!(lan_or_loopback(Some(IpAddr::V4(lan))), lan);
        assert!(!local_ipv4().is_unspecified());
    }

    #[tokio::test]
    async fn advertised_addr_replaces_wildcard_only() -> anyhow::Result<()> {
        let listener = HostListener::bind("127.0.0.1:0").await?;
        assert_eq!(listener.advertised_addr()?, listener.local_addr()?);

        let listener = HostListener::bind(("0.0.0.0", 0)).await?;
        let advertised = listener.advertised_addr()?;
        assert!(!advertised.ip().is_unspecified());
        assert_eq!(advertised.port(), listener.local_addr()?.port());
        Ok(())
    }
}
