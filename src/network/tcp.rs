//! TCP transport: a star of connections centred on the coordinator.

use crate::config::GroupConfig;
use crate::error::{NetworkError, Result};
use crate::network::rpc::{decode_message, frame_message, Envelope, HelloRequest, HelloResponse, Message};
use crate::network::transport::Transport;
use crate::types::Rank;
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, trace, warn};

/// Write one length-prefixed frame. Returns the number of payload bytes written.
pub(crate) async fn write_frame<W>(writer: &mut W, msg: &Message, limit: usize) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let framed = frame_message(msg)?;
    let size = framed.len() - 4;
    if size > limit {
        return Err(NetworkError::FrameTooLarge { size, limit }.into());
    }

    writer.write_all(&framed).await.map_err(NetworkError::Io)?;
    writer.flush().await.map_err(NetworkError::Io)?;

    Ok(size)
}

/// Read one length-prefixed frame. Returns `None` on a clean close.
pub(crate) async fn read_frame<R>(reader: &mut R, limit: usize) -> Result<Option<Message>>
where
    R: AsyncRead + Unpin,
{
    // Read message length (4 bytes)
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(NetworkError::Io(e).into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > limit {
        return Err(NetworkError::FrameTooLarge { size: len, limit }.into());
    }

    let mut data = vec![0u8; len];
    match reader.read_exact(&mut data).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(NetworkError::Io(e).into()),
    }

    Ok(Some(decode_message(&data)?))
}

/// Both halves of a connection to one peer.
struct Link {
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
}

impl Link {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        }
    }
}

/// TCP transport for one peer.
///
/// The coordinator holds one link per worker; a worker holds a single link
/// to the coordinator.
pub struct TcpTransport {
    rank: Rank,
    size: usize,
    coordinator: Rank,
    links: HashMap<Rank, Link>,
    max_frame_size: usize,
}

impl TcpTransport {
    /// Join the group described by `config`, listening if this peer is the
    /// coordinator and connecting otherwise.
    pub async fn establish(config: &GroupConfig) -> Result<Self> {
        config.validate()?;

        if config.is_coordinator() {
            let listener = TcpListener::bind(config.coordinator_addr)
                .await
                .map_err(NetworkError::Io)?;
            Self::accept(listener, config).await
        } else {
            Self::connect(config).await
        }
    }

    /// Accept every worker of the group on an already-bound listener.
    pub async fn accept(listener: TcpListener, config: &GroupConfig) -> Result<Self> {
        let limit = config.transport.max_frame_size;
        let expected = config.size - 1;
        let mut links = HashMap::with_capacity(expected);

        info!(
            addr = ?listener.local_addr().ok(),
            workers = expected,
            "Coordinator waiting for workers"
        );

        while links.len() < expected {
            let (mut stream, peer_addr) = listener.accept().await.map_err(NetworkError::Io)?;
            stream.set_nodelay(true).map_err(NetworkError::Io)?;

            // A silent connection must not hold up the rest of the group.
            let hello = match timeout(config.transport.connect_timeout, read_frame(&mut stream, limit)).await {
                Ok(Ok(Some(Message::Hello(hello)))) => hello,
                Ok(Ok(other)) => {
                    warn!(peer = %peer_addr, message = ?other, "Expected hello, dropping connection");
                    continue;
                }
                Ok(Err(e)) => {
                    warn!(peer = %peer_addr, error = %e, "Failed to read hello");
                    continue;
                }
                Err(_) => {
                    warn!(
                        peer = %peer_addr,
                        waited = ?config.transport.connect_timeout,
                        "No hello before timeout, dropping connection"
                    );
                    continue;
                }
            };

            let verdict = Self::admit(&hello, config, |rank| links.contains_key(&rank));
            let accepted = verdict.accepted;
            if let Err(e) = write_frame(&mut stream, &Message::HelloAck(verdict.clone()), limit).await {
                warn!(peer = %peer_addr, error = %e, "Failed to answer hello");
                continue;
            }

            if accepted {
                debug!(peer = %peer_addr, rank = hello.rank, "Worker joined");
                links.insert(hello.rank, Link::new(stream));
            } else {
                warn!(peer = %peer_addr, rank = hello.rank, reason = ?verdict.reason, "Worker rejected");
            }
        }

        info!(rank = config.rank, size = config.size, "All workers connected");

        Ok(Self {
            rank: config.rank,
            size: config.size,
            coordinator: config.coordinator,
            links,
            max_frame_size: limit,
        })
    }

    fn admit(
        hello: &HelloRequest,
        config: &GroupConfig,
        already_joined: impl Fn(Rank) -> bool,
    ) -> HelloResponse {
        if hello.size != config.size {
            return HelloResponse::rejected(format!(
                "group size mismatch: coordinator has {}, worker has {}",
                config.size, hello.size
            ));
        }
        if hello.rank >= config.size || hello.rank == config.coordinator {
            return HelloResponse::rejected(format!("rank {} is not a worker rank", hello.rank));
        }
        if already_joined(hello.rank) {
            return HelloResponse::rejected(format!("rank {} already joined", hello.rank));
        }
        HelloResponse::accepted()
    }

    /// Connect to the coordinator, retrying until the connect timeout.
    pub async fn connect(config: &GroupConfig) -> Result<Self> {
        let limit = config.transport.max_frame_size;
        let addr = config.coordinator_addr;
        let mut stream = Self::connect_with_retry(addr, config).await?;
        stream.set_nodelay(true).map_err(NetworkError::Io)?;

        let hello = Message::Hello(HelloRequest {
            rank: config.rank,
            size: config.size,
        });
        write_frame(&mut stream, &hello, limit).await?;

        match read_frame(&mut stream, limit).await? {
            Some(Message::HelloAck(ack)) if ack.accepted => {}
            Some(Message::HelloAck(ack)) => {
                return Err(NetworkError::Handshake(
                    ack.reason.unwrap_or_else(|| "rejected".to_string()),
                )
                .into());
            }
            Some(other) => {
                return Err(NetworkError::Handshake(format!("unexpected reply {:?}", other)).into());
            }
            None => return Err(NetworkError::ConnectionClosed(config.coordinator).into()),
        }

        info!(rank = config.rank, coordinator = %addr, "Joined group");

        let mut links = HashMap::with_capacity(1);
        links.insert(config.coordinator, Link::new(stream));

        Ok(Self {
            rank: config.rank,
            size: config.size,
            coordinator: config.coordinator,
            links,
            max_frame_size: limit,
        })
    }

    async fn connect_with_retry(addr: SocketAddr, config: &GroupConfig) -> Result<TcpStream> {
        let deadline = Instant::now() + config.transport.connect_timeout;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    debug!(%addr, attempts, "Connected to coordinator");
                    return Ok(stream);
                }
                Err(e) if Instant::now() + config.transport.retry_delay < deadline => {
                    trace!(%addr, attempts, error = %e, "Coordinator not reachable yet");
                    sleep(config.transport.retry_delay).await;
                }
                Err(e) => {
                    return Err(NetworkError::ConnectionFailed {
                        addr: addr.to_string(),
                        reason: format!("{} after {} attempts", e, attempts),
                    }
                    .into());
                }
            }
        }
    }

    fn link(&self, rank: Rank) -> Result<&Link> {
        self.links
            .get(&rank)
            .ok_or_else(|| NetworkError::NoRoute(rank).into())
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn coordinator(&self) -> Rank {
        self.coordinator
    }

    async fn send(&self, to: Rank, envelope: Envelope) -> Result<()> {
        let link = self.link(to)?;
        let mut writer = link.writer.lock().await;
        let op = envelope.op;
        let seq = envelope.seq;

        let written = write_frame(&mut *writer, &Message::Exchange(envelope), self.max_frame_size)
            .await
            .map_err(|e| match e {
                crate::Error::Network(NetworkError::Io(io))
                    if io.kind() == std::io::ErrorKind::BrokenPipe
                        || io.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    NetworkError::ConnectionClosed(to).into()
                }
                other => other,
            })?;

        trace!(from = self.rank, to, %op, seq, bytes = written, "tcp send");
        Ok(())
    }

    async fn recv(&self, from: Rank) -> Result<Envelope> {
        let link = self.link(from)?;
        let mut reader = link.reader.lock().await;

        match read_frame(&mut *reader, self.max_frame_size).await? {
            Some(Message::Exchange(envelope)) => {
                trace!(to = self.rank, from, op = %envelope.op, seq = envelope.seq, "tcp recv");
                Ok(envelope)
            }
            Some(other) => Err(crate::Error::Internal(format!(
                "unexpected message from rank {}: {:?}",
                from, other
            ))),
            None => Err(NetworkError::ConnectionClosed(from).into()),
        }
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut peers: Vec<_> = self.links.keys().copied().collect();
        peers.sort_unstable();
        f.debug_struct("TcpTransport")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .field("coordinator", &self.coordinator)
            .field("peers", &peers)
            .finish()
    }
}
