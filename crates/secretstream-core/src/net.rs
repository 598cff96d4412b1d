//! Dialing and listening.
//!
//! [`Client`] and [`Server`] run the handshake over any tokio byte stream
//! and hand back a [`Connection`]. [`Server::listen`] and [`Client::dial`]
//! do the same over TCP.
//!
//! # Example
//!
//! ```no_run
//! use secretstream_core::{AppKey, Client, Config, Identity, Server};
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//!
//! # async fn run() -> secretstream_core::Result<()> {
//! let config = Config::new(AppKey::new([7u8; 32]));
//! let server = Server::new(Identity::generate(), config.clone());
//! let server_key = server.public_key();
//! let listener = server.listen("127.0.0.1:0").await?;
//! let addr = listener.local_addr()?;
//!
//! tokio::spawn(async move {
//!     let (mut conn, _) = listener.accept().await?;
//!     let mut buf = Vec::new();
//!     conn.read_to_end(&mut buf).await?;
//!     Ok::<_, secretstream_core::Error>(())
//! });
//!
//! let client = Client::new(Identity::generate(), config);
//! let mut conn = client.dial(addr, &server_key).await?;
//! conn.write_all(b"hello").await?;
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

use crate::addr::PeerAddr;
use crate::config::Config;
use crate::conn::Connection;
use crate::error::{Error, Result};
use crate::handshake::{client_handshake, server_handshake};
use crate::identity::Identity;
use secretstream_crypto::signatures::VerifyingKey;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

/// Run `fut`, failing with [`Error::Timeout`] once `limit` elapses.
///
/// # Errors
///
/// Whatever `fut` returns, or [`Error::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::Timeout(limit))?
}

/// Accepting side: authenticates clients with its identity.
#[derive(Debug, Clone)]
pub struct Server {
    identity: Arc<Identity>,
    config: Arc<Config>,
}

impl Server {
    /// Create a server with the given identity and configuration.
    #[must_use]
    pub fn new(identity: Identity, config: Config) -> Self {
        Self {
            identity: Arc::new(identity),
            config: Arc::new(config),
        }
    }

    /// Public key clients must dial
    #[must_use]
    pub fn public_key(&self) -> VerifyingKey {
        self.identity.public_key()
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the server handshake over an accepted transport.
    ///
    /// On failure the transport is dropped, closing it.
    ///
    /// # Errors
    ///
    /// Any handshake error, or [`Error::Timeout`] if the handshake exceeds
    /// the configured deadline.
    pub async fn accept<T>(&self, mut transport: T) -> Result<Connection<T>>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let handshake = server_handshake(&mut transport, &self.identity, &self.config.app_key);
        match with_timeout(self.config.handshake_timeout, handshake).await {
            Ok(keys) => Ok(Connection::with_write_buffer(
                transport,
                keys,
                self.config.write_buffer_size,
            )),
            Err(err) => {
                tracing::debug!("rejected incoming handshake: {}", err);
                Err(err)
            }
        }
    }

    /// Bind a TCP listener.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] if binding fails.
    pub async fn listen<A: ToSocketAddrs>(self, addr: A) -> Result<Listener> {
        let inner = TcpListener::bind(addr).await?;
        tracing::info!(
            addr = %inner.local_addr()?,
            key = %self.identity.addr(),
            "listening"
        );
        Ok(Listener {
            inner,
            server: self,
        })
    }
}

/// TCP listener yielding authenticated connections.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    server: Server,
}

impl Listener {
    /// Wait for the next client and run the handshake with it.
    ///
    /// A failed handshake is returned as an error; the listener stays usable.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] if accepting fails, or any handshake error.
    pub async fn accept(&self) -> Result<(Connection<TcpStream>, SocketAddr)> {
        let (stream, remote) = self.inner.accept().await?;
        stream.set_nodelay(true)?;
        tracing::trace!(%remote, "accepted tcp connection");

        let conn = self.server.accept(stream).await?;
        tracing::debug!(%remote, peer = %conn.remote_addr(), "client authenticated");
        Ok((conn, remote))
    }

    /// Bound socket address
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Server this listener authenticates as
    #[must_use]
    pub fn server(&self) -> &Server {
        &self.server
    }
}

/// Dialing side: proves its identity to servers it already knows.
#[derive(Debug, Clone)]
pub struct Client {
    identity: Arc<Identity>,
    config: Arc<Config>,
}

impl Client {
    /// Create a client with the given identity and configuration.
    #[must_use]
    pub fn new(identity: Identity, config: Config) -> Self {
        Self {
            identity: Arc::new(identity),
            config: Arc::new(config),
        }
    }

    /// Our public key
    #[must_use]
    pub fn public_key(&self) -> VerifyingKey {
        self.identity.public_key()
    }

    /// Run the client handshake over an established transport.
    ///
    /// # Errors
    ///
    /// Any handshake error, or [`Error::Timeout`].
    pub async fn connect<T>(&self, mut transport: T, server: &VerifyingKey) -> Result<Connection<T>>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let handshake =
            client_handshake(&mut transport, &self.identity, &self.config.app_key, server);
        let keys = with_timeout(self.config.handshake_timeout, handshake).await?;
        Ok(Connection::with_write_buffer(
            transport,
            keys,
            self.config.write_buffer_size,
        ))
    }

    /// Connect over TCP and authenticate the server as `server`.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] if the TCP connection fails, or any handshake error.
    pub async fn dial<A: ToSocketAddrs>(
        &self,
        addr: A,
        server: &VerifyingKey,
    ) -> Result<Connection<TcpStream>> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        match self.connect(stream, server).await {
            Ok(conn) => {
                tracing::debug!(peer = %conn.remote_addr(), "connected");
                Ok(conn)
            }
            Err(err) => {
                tracing::debug!(peer = %PeerAddr::new(*server), "handshake failed: {}", err);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AppKey;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn config() -> Config {
        Config::new(AppKey::new([0x11; 32]))
    }

    #[tokio::test]
    async fn test_connect_and_accept_over_duplex() {
        let server = Server::new(Identity::generate(), config());
        let client = Client::new(Identity::generate(), config());
        let (client_io, server_io) = tokio::io::duplex(4096);
        let server_key = server.public_key();

        let (client_conn, server_conn) = tokio::join!(
            client.connect(client_io, &server_key),
            server.accept(server_io)
        );
        let mut client_conn = client_conn.unwrap();
        let mut server_conn = server_conn.unwrap();
        assert_eq!(server_conn.remote_public_key(), &client.public_key());

        client_conn.write_all(b"over duplex").await.unwrap();
        client_conn.close().await.unwrap();
        let mut buf = Vec::new();
        server_conn.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"over duplex");
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let server = Server::new(
            Identity::generate(),
            config().with_handshake_timeout(Duration::from_millis(50)),
        );
        // the peer never sends a hello
        let (_silent, server_io) = tokio::io::duplex(4096);

        let err = server.accept(server_io).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let value = with_timeout(Duration::from_secs(1), async { Ok(5) }).await;
        assert_eq!(value.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_tcp_listener_roundtrip() {
        let server = Server::new(Identity::generate(), config());
        let server_key = server.public_key();
        let listener = server.listen("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            conn.read_exact(&mut buf).await.unwrap();
            conn.write_all(&buf).await.unwrap();
            conn.close().await.unwrap();
        });

        let client = Client::new(Identity::generate(), config());
        let mut conn = client.dial(addr, &server_key).await.unwrap();
        conn.write_all(b"hello").await.unwrap();
        conn.flush().await.unwrap();

        let mut echoed = Vec::new();
        conn.read_to_end(&mut echoed).await.unwrap();
        assert_eq!(echoed, b"hello");
        conn.close().await.unwrap();
        accept.await.unwrap();
    }
}
