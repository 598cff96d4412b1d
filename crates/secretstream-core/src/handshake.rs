//! Secret handshake: four-message mutual authentication.
//!
//! Notation: `K` app key, `a`/`b` client/server ephemeral X25519 keys,
//! `A`/`B` client/server long-term Ed25519 keys (converted to X25519 for key
//! agreement), `H` BLAKE3, `MAC` keyed BLAKE3, `Box` XChaCha20-Poly1305 under
//! a single-use key and the zero nonce.
//!
//! ```text
//! ee = DH(a, b)    es = DH(a, B)    se = DH(A, b)
//!
//! 1. C -> S  hello   MAC(K, a) || a                                    64 bytes
//! 2. S -> C  hello   MAC(K, b) || b                                    64 bytes
//! 3. C -> S  auth    Box(H(K||ee||es), sig_A || A)                    112 bytes
//!                    sig_A = Sign_A(K || B || H(ee))
//! 4. S -> C  accept  Box(H(K||ee||es||se), sig_B)                      80 bytes
//!                    sig_B = Sign_B(K || sig_A || A || H(ee))
//! ```
//!
//! A Hello that does not authenticate under `K` ends the attempt before
//! anything else is sent, so peers outside the network learn nothing. The
//! client's identity only travels encrypted to a key that requires `B`'s
//! secret half, and the accept binds the server's reply to this transcript.
//!
//! Session keys, with `L`/`R` the local/remote long-term keys:
//!
//! ```text
//! secret     = H(H(K || ee || es || se))
//! send key   = H(secret || R)      send nonce = MAC(K, remote ephemeral)[..24]
//! recv key   = H(secret || L)      recv nonce = MAC(K, local ephemeral)[..24]
//! ```

use crate::addr::PeerAddr;
use crate::error::{Error, Result};
use crate::identity::{AppKey, Identity};
use rand_core::{CryptoRng, OsRng, RngCore};
use secretstream_crypto::aead::{AeadKey, Nonce, TAG_SIZE};
use secretstream_crypto::hash::{hash, hash_parts, mac, verify_mac};
use secretstream_crypto::signatures::{Signature, VerifyingKey};
use secretstream_crypto::x25519::{PrivateKey, PublicKey, SharedSecret};
use secretstream_crypto::{ED25519_PUBLIC_KEY_SIZE, ED25519_SIGNATURE_SIZE, X25519_PUBLIC_KEY_SIZE};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use zeroize::Zeroizing;

/// Hello message size (MAC + ephemeral public key)
pub const HELLO_SIZE: usize = 32 + X25519_PUBLIC_KEY_SIZE;

/// Client authenticate message size (signature + public key + tag)
pub const AUTH_SIZE: usize = ED25519_SIGNATURE_SIZE + ED25519_PUBLIC_KEY_SIZE + TAG_SIZE;

/// Server accept message size (signature + tag)
pub const ACCEPT_SIZE: usize = ED25519_SIGNATURE_SIZE + TAG_SIZE;

/// Which side of the handshake this instance plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Initiator, knows the server's public key in advance
    Client,
    /// Responder, learns the client's public key from the auth message
    Server,
}

/// Handshake progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing exchanged yet
    Start,
    /// Client: hello sent, awaiting server hello
    HelloSent,
    /// Server: client hello verified, own hello not yet sent
    HelloReceived,
    /// Both hellos exchanged, `ee` and `es` derived
    SharedSecretDerived,
    /// Client: authenticate sent, awaiting accept
    AuthSent,
    /// Server: client identity verified, accept not yet sent
    AuthVerified,
    /// Handshake complete, session keys available
    Accepted,
    /// A step failed; all secrets have been dropped
    Failed,
}

/// Key and starting nonce for one direction of a box stream.
#[derive(Debug)]
pub struct DirectionKeys {
    /// AEAD key for this direction
    pub key: AeadKey,
    /// First nonce of this direction
    pub nonce: Nonce,
}

/// Output of a successful handshake.
#[derive(Debug)]
pub struct SessionKeys {
    /// Keys for data we send
    pub send: DirectionKeys,
    /// Keys for data we receive
    pub recv: DirectionKeys,
    /// Our long-term public key
    pub local_public: VerifyingKey,
    /// Peer's verified long-term public key
    pub remote_public: VerifyingKey,
}

/// Secret handshake state machine.
///
/// Pure protocol logic with one method per message; [`client_handshake`] and
/// [`server_handshake`] drive it over a transport. Any failure moves the
/// machine to [`HandshakeState::Failed`] and drops every secret it holds.
pub struct Handshake<'a> {
    role: Role,
    state: HandshakeState,
    identity: &'a Identity,
    app_key: &'a AppKey,
    remote_public: Option<VerifyingKey>,
    ephemeral: Option<PrivateKey>,
    local_ephemeral: PublicKey,
    remote_ephemeral: Option<PublicKey>,
    ee: Option<SharedSecret>,
    es: Option<SharedSecret>,
    se: Option<SharedSecret>,
    client_signature: Option<Signature>,
}

impl<'a> Handshake<'a> {
    /// Start a client handshake towards `server_public`.
    pub fn new_client<R: RngCore + CryptoRng>(
        identity: &'a Identity,
        app_key: &'a AppKey,
        server_public: VerifyingKey,
        rng: &mut R,
    ) -> Self {
        Self::new(Role::Client, identity, app_key, Some(server_public), rng)
    }

    /// Start a server handshake.
    pub fn new_server<R: RngCore + CryptoRng>(
        identity: &'a Identity,
        app_key: &'a AppKey,
        rng: &mut R,
    ) -> Self {
        Self::new(Role::Server, identity, app_key, None, rng)
    }

    fn new<R: RngCore + CryptoRng>(
        role: Role,
        identity: &'a Identity,
        app_key: &'a AppKey,
        remote_public: Option<VerifyingKey>,
        rng: &mut R,
    ) -> Self {
        let ephemeral = PrivateKey::generate(rng);
        let local_ephemeral = ephemeral.public_key();

        Self {
            role,
            state: HandshakeState::Start,
            identity,
            app_key,
            remote_public,
            ephemeral: Some(ephemeral),
            local_ephemeral,
            remote_ephemeral: None,
            ee: None,
            es: None,
            se: None,
            client_signature: None,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Role of this side
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Remote long-term key, once known
    #[must_use]
    pub fn remote_public(&self) -> Option<&VerifyingKey> {
        self.remote_public.as_ref()
    }

    /// Build our hello message.
    ///
    /// Client: `Start -> HelloSent`. Server: `HelloReceived -> SharedSecretDerived`.
    ///
    /// # Errors
    ///
    /// [`Error::ProtocolViolation`] when called out of order, or
    /// [`Error::Crypto`] if key agreement hits a low-order point.
    pub fn create_hello(&mut self) -> Result<[u8; HELLO_SIZE]> {
        match (self.role, self.state) {
            (Role::Client, HandshakeState::Start) => {
                self.state = HandshakeState::HelloSent;
            }
            (Role::Server, HandshakeState::HelloReceived) => {
                self.derive_hello_secrets()?;
                self.state = HandshakeState::SharedSecretDerived;
            }
            _ => return Err(self.out_of_order("create hello")),
        }

        let mut msg = [0u8; HELLO_SIZE];
        msg[..32].copy_from_slice(&mac(self.app_key.as_bytes(), self.local_ephemeral.as_bytes()));
        msg[32..].copy_from_slice(self.local_ephemeral.as_bytes());
        tracing::trace!(role = ?self.role, "created hello");
        Ok(msg)
    }

    /// Verify the peer's hello.
    ///
    /// Server: `Start -> HelloReceived`. Client: `HelloSent -> SharedSecretDerived`.
    ///
    /// # Errors
    ///
    /// [`Error::NetworkIsolation`] if the MAC does not verify under our app key.
    pub fn read_hello(&mut self, msg: &[u8; HELLO_SIZE]) -> Result<()> {
        let expected = match self.role {
            Role::Server => HandshakeState::Start,
            Role::Client => HandshakeState::HelloSent,
        };
        if self.state != expected {
            return Err(self.out_of_order("read hello"));
        }

        let (tag, key) = msg.split_at(32);
        let tag: &[u8; 32] = tag.try_into().map_err(|_| self.malformed("hello"))?;
        if !verify_mac(self.app_key.as_bytes(), key, tag) {
            return Err(self.fail(Error::NetworkIsolation));
        }

        let mut remote = [0u8; X25519_PUBLIC_KEY_SIZE];
        remote.copy_from_slice(key);
        self.remote_ephemeral = Some(PublicKey::from_bytes(remote));

        match self.role {
            Role::Server => self.state = HandshakeState::HelloReceived,
            Role::Client => {
                self.derive_hello_secrets()?;
                self.state = HandshakeState::SharedSecretDerived;
            }
        }
        tracing::trace!(role = ?self.role, "verified hello");
        Ok(())
    }

    /// Build the client's authenticate message.
    ///
    /// Client only: `SharedSecretDerived -> AuthSent`.
    ///
    /// # Errors
    ///
    /// [`Error::ProtocolViolation`] when called out of order.
    pub fn create_auth(&mut self) -> Result<[u8; AUTH_SIZE]> {
        if (self.role, self.state) != (Role::Client, HandshakeState::SharedSecretDerived) {
            return Err(self.out_of_order("create auth"));
        }
        let server_public = self.remote_public.ok_or_else(|| self.malformed("server key"))?;

        let ee_hash = self.ee_hash()?;
        let transcript = [
            self.app_key.as_bytes().as_slice(),
            server_public.as_bytes(),
            &ee_hash,
        ]
        .concat();
        let signature = self.identity.sign(&transcript);

        let mut plaintext = [0u8; ED25519_SIGNATURE_SIZE + ED25519_PUBLIC_KEY_SIZE];
        plaintext[..ED25519_SIGNATURE_SIZE].copy_from_slice(signature.as_bytes());
        plaintext[ED25519_SIGNATURE_SIZE..]
            .copy_from_slice(self.identity.public_key().as_bytes());

        let key = self.auth_key()?;
        let sealed = key
            .encrypt(&Nonce::default(), &plaintext, b"")
            .map_err(|e| self.fail(e.into()))?;
        let msg: [u8; AUTH_SIZE] = sealed
            .as_slice()
            .try_into()
            .map_err(|_| self.malformed("auth"))?;

        self.client_signature = Some(signature);
        self.state = HandshakeState::AuthSent;
        tracing::trace!("created client auth");
        Ok(msg)
    }

    /// Open and verify the client's authenticate message.
    ///
    /// Server only: `SharedSecretDerived -> AuthVerified`. On success the
    /// client's long-term key is known.
    ///
    /// # Errors
    ///
    /// [`Error::Authentication`] if the box does not open or the signature is
    /// invalid.
    pub fn read_auth(&mut self, msg: &[u8; AUTH_SIZE]) -> Result<()> {
        if (self.role, self.state) != (Role::Server, HandshakeState::SharedSecretDerived) {
            return Err(self.out_of_order("read auth"));
        }

        let key = self.auth_key()?;
        let plaintext = Zeroizing::new(
            key.decrypt(&Nonce::default(), msg, b"")
                .map_err(|_| self.fail(Error::Authentication("cannot open client auth".into())))?,
        );
        let (sig_bytes, key_bytes) = plaintext.split_at(ED25519_SIGNATURE_SIZE);

        let signature = Signature::from_slice(sig_bytes).map_err(|_| self.malformed("auth"))?;
        let client_public = VerifyingKey::from_slice(key_bytes).map_err(|_| {
            self.fail(Error::Authentication("client public key is invalid".into()))
        })?;

        let ee_hash = self.ee_hash()?;
        let transcript = [
            self.app_key.as_bytes().as_slice(),
            self.identity.public_key().as_bytes(),
            &ee_hash,
        ]
        .concat();
        client_public.verify(&transcript, &signature).map_err(|_| {
            self.fail(Error::Authentication("client signature is invalid".into()))
        })?;

        let se = self
            .ephemeral_secret()?
            .exchange(&client_public.to_x25519())
            .map_err(|e| self.fail(e.into()))?;

        self.se = Some(se);
        self.ephemeral = None;
        self.remote_public = Some(client_public);
        self.client_signature = Some(signature);
        self.state = HandshakeState::AuthVerified;
        tracing::trace!(client = %PeerAddr::new(client_public), "verified client auth");
        Ok(())
    }

    /// Build the server's accept message.
    ///
    /// Server only: `AuthVerified -> Accepted`.
    ///
    /// # Errors
    ///
    /// [`Error::ProtocolViolation`] when called out of order.
    pub fn create_accept(&mut self) -> Result<[u8; ACCEPT_SIZE]> {
        if (self.role, self.state) != (Role::Server, HandshakeState::AuthVerified) {
            return Err(self.out_of_order("create accept"));
        }

        let transcript = self.accept_transcript()?;
        let signature = self.identity.sign(&transcript);

        let key = self.accept_key()?;
        let sealed = key
            .encrypt(&Nonce::default(), signature.as_bytes(), b"")
            .map_err(|e| self.fail(e.into()))?;
        let msg: [u8; ACCEPT_SIZE] = sealed
            .as_slice()
            .try_into()
            .map_err(|_| self.malformed("accept"))?;

        self.state = HandshakeState::Accepted;
        tracing::trace!("created server accept");
        Ok(msg)
    }

    /// Open and verify the server's accept message.
    ///
    /// Client only: `AuthSent -> Accepted`.
    ///
    /// # Errors
    ///
    /// [`Error::Authentication`] if the box does not open or the server's
    /// signature is invalid.
    pub fn read_accept(&mut self, msg: &[u8; ACCEPT_SIZE]) -> Result<()> {
        if (self.role, self.state) != (Role::Client, HandshakeState::AuthSent) {
            return Err(self.out_of_order("read accept"));
        }
        let server_public = self.remote_public.ok_or_else(|| self.malformed("server key"))?;
        let remote_ephemeral = self
            .remote_ephemeral
            .ok_or_else(|| self.malformed("remote ephemeral"))?;

        let se = self
            .identity
            .to_x25519()
            .exchange(&remote_ephemeral)
            .map_err(|e| self.fail(e.into()))?;
        self.se = Some(se);

        let key = self.accept_key()?;
        let plaintext = Zeroizing::new(
            key.decrypt(&Nonce::default(), msg, b"")
                .map_err(|_| self.fail(Error::Authentication("cannot open server accept".into())))?,
        );
        let signature = Signature::from_slice(plaintext.as_slice()).map_err(|_| self.malformed("accept"))?;

        let transcript = self.accept_transcript()?;
        server_public.verify(&transcript, &signature).map_err(|_| {
            self.fail(Error::Authentication("server signature is invalid".into()))
        })?;

        self.state = HandshakeState::Accepted;
        tracing::trace!("verified server accept");
        Ok(())
    }

    /// Derive the session keys of a completed handshake.
    ///
    /// # Errors
    ///
    /// [`Error::ProtocolViolation`] unless the state is `Accepted`.
    pub fn into_session_keys(mut self) -> Result<SessionKeys> {
        if self.state != HandshakeState::Accepted {
            return Err(self.out_of_order("derive session keys"));
        }
        let remote_public = self.remote_public.ok_or_else(|| self.malformed("remote key"))?;
        let remote_ephemeral = self
            .remote_ephemeral
            .ok_or_else(|| self.malformed("remote ephemeral"))?;
        let local_public = self.identity.public_key();

        let inner = Zeroizing::new(self.accept_key_bytes()?);
        let secret = Zeroizing::new(hash(inner.as_slice()));

        let send_key = AeadKey::new(hash_parts(&[secret.as_slice(), remote_public.as_bytes()]));
        let recv_key = AeadKey::new(hash_parts(&[secret.as_slice(), local_public.as_bytes()]));

        let send_nonce = Nonce::from_prefix(&mac(self.app_key.as_bytes(), remote_ephemeral.as_bytes()))
            .ok_or_else(|| self.malformed("nonce"))?;
        let recv_nonce =
            Nonce::from_prefix(&mac(self.app_key.as_bytes(), self.local_ephemeral.as_bytes()))
                .ok_or_else(|| self.malformed("nonce"))?;

        Ok(SessionKeys {
            send: DirectionKeys {
                key: send_key,
                nonce: send_nonce,
            },
            recv: DirectionKeys {
                key: recv_key,
                nonce: recv_nonce,
            },
            local_public,
            remote_public,
        })
    }

    fn derive_hello_secrets(&mut self) -> Result<()> {
        let remote_ephemeral = self
            .remote_ephemeral
            .ok_or_else(|| self.malformed("remote ephemeral"))?;
        let ephemeral = self.ephemeral_secret()?;

        let ee = ephemeral
            .exchange(&remote_ephemeral)
            .map_err(|e| self.fail(e.into()))?;

        let es = match self.role {
            Role::Client => {
                let server_public = self.remote_public.ok_or_else(|| self.malformed("server key"))?;
                ephemeral.exchange(&server_public.to_x25519())
            }
            Role::Server => self.identity.to_x25519().exchange(&remote_ephemeral),
        }
        .map_err(|e| self.fail(e.into()))?;

        self.ee = Some(ee);
        self.es = Some(es);
        // the server still needs `b` for `se`; the client is done with `a`
        if self.role == Role::Client {
            self.ephemeral = None;
        }
        Ok(())
    }

    fn ephemeral_secret(&mut self) -> Result<PrivateKey> {
        match &self.ephemeral {
            Some(secret) => Ok(secret.clone()),
            None => Err(self.malformed("ephemeral key")),
        }
    }

    fn ee_hash(&mut self) -> Result<[u8; 32]> {
        match &self.ee {
            Some(ee) => Ok(hash(ee.as_bytes())),
            None => Err(self.malformed("ee secret")),
        }
    }

    fn auth_key(&mut self) -> Result<AeadKey> {
        match (&self.ee, &self.es) {
            (Some(ee), Some(es)) => Ok(AeadKey::new(hash_parts(&[
                self.app_key.as_bytes().as_slice(),
                ee.as_bytes(),
                es.as_bytes(),
            ]))),
            _ => Err(self.malformed("auth secrets")),
        }
    }

    fn accept_key_bytes(&mut self) -> Result<[u8; 32]> {
        match (&self.ee, &self.es, &self.se) {
            (Some(ee), Some(es), Some(se)) => Ok(hash_parts(&[
                self.app_key.as_bytes().as_slice(),
                ee.as_bytes(),
                es.as_bytes(),
                se.as_bytes(),
            ])),
            _ => Err(self.malformed("accept secrets")),
        }
    }

    fn accept_key(&mut self) -> Result<AeadKey> {
        self.accept_key_bytes().map(AeadKey::new)
    }

    fn accept_transcript(&mut self) -> Result<Vec<u8>> {
        let client_signature = self
            .client_signature
            .ok_or_else(|| self.malformed("client signature"))?;
        let client_public = match self.role {
            Role::Client => self.identity.public_key(),
            Role::Server => self.remote_public.ok_or_else(|| self.malformed("client key"))?,
        };
        let ee_hash = self.ee_hash()?;

        Ok([
            self.app_key.as_bytes().as_slice(),
            client_signature.as_bytes(),
            client_public.as_bytes(),
            &ee_hash,
        ]
        .concat())
    }

    fn out_of_order(&mut self, step: &str) -> Error {
        let err = Error::ProtocolViolation(
            format!("{:?} cannot {step} in state {:?}", self.role, self.state).into(),
        );
        self.fail(err)
    }

    fn malformed(&mut self, what: &str) -> Error {
        self.fail(Error::ProtocolViolation(
            format!("handshake is missing {what}").into(),
        ))
    }

    fn fail(&mut self, err: Error) -> Error {
        tracing::debug!(role = ?self.role, state = ?self.state, "handshake failed: {}", err);
        self.state = HandshakeState::Failed;
        self.ephemeral = None;
        self.ee = None;
        self.es = None;
        self.se = None;
        self.client_signature = None;
        err
    }
}

impl std::fmt::Debug for Handshake<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handshake")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("remote_public", &self.remote_public)
            .finish_non_exhaustive()
    }
}

async fn read_message<S, const N: usize>(stream: &mut S) -> Result<[u8; N]>
where
    S: AsyncRead + Unpin,
{
    let mut msg = [0u8; N];
    stream.read_exact(&mut msg).await?;
    Ok(msg)
}

async fn write_message<S>(stream: &mut S, msg: &[u8]) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(msg).await?;
    stream.flush().await?;
    Ok(())
}

/// Run the client side of the handshake over `stream`.
///
/// The caller must close `stream` if this fails.
///
/// # Errors
///
/// [`Error::NetworkIsolation`] if the server's hello is not authenticated with
/// `app_key`, [`Error::Authentication`] if the server cannot prove it owns
/// `server_public`, [`Error::Transport`] on I/O failure (including the server
/// hanging up on a rejected hello).
pub async fn client_handshake<S>(
    stream: &mut S,
    identity: &Identity,
    app_key: &AppKey,
    server_public: &VerifyingKey,
) -> Result<SessionKeys>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut handshake = Handshake::new_client(identity, app_key, *server_public, &mut OsRng);

    write_message(stream, &handshake.create_hello()?).await?;
    handshake.read_hello(&read_message::<_, HELLO_SIZE>(stream).await?)?;

    write_message(stream, &handshake.create_auth()?).await?;
    handshake.read_accept(&read_message::<_, ACCEPT_SIZE>(stream).await?)?;

    let keys = handshake.into_session_keys()?;
    tracing::debug!(server = %PeerAddr::new(keys.remote_public), "client handshake complete");
    Ok(keys)
}

/// Run the server side of the handshake over `stream`.
///
/// On a hello that fails the app-key check nothing is written. The caller
/// must close `stream` if this fails.
///
/// # Errors
///
/// [`Error::NetworkIsolation`], [`Error::Authentication`] or
/// [`Error::Transport`], as for [`client_handshake`].
pub async fn server_handshake<S>(
    stream: &mut S,
    identity: &Identity,
    app_key: &AppKey,
) -> Result<SessionKeys>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut handshake = Handshake::new_server(identity, app_key, &mut OsRng);

    handshake.read_hello(&read_message::<_, HELLO_SIZE>(stream).await?)?;
    write_message(stream, &handshake.create_hello()?).await?;

    handshake.read_auth(&read_message::<_, AUTH_SIZE>(stream).await?)?;
    write_message(stream, &handshake.create_accept()?).await?;

    let keys = handshake.into_session_keys()?;
    tracing::debug!(client = %PeerAddr::new(keys.remote_public), "server handshake complete");
    Ok(keys)
}
