//! TLS-wrapped byte stream, driven manually over `compio`.
//!
//! The teacher crate has no TLS transport (grounded gap, see
//! `examples/original_source/src/transports/tls/ssl_transport.hpp` and
//! `asio_tls_connecter.cpp`/`asio_tls_listener.cpp` for what the original
//! does with OpenSSL-over-Asio). `compio` has no first-party TLS
//! integration, so this wraps the sans-IO `rustls` crate directly: ciphertext
//! moves over the inner `AsyncRead + AsyncWrite` stream using the same
//! one-shot buffer dance `Engine` already uses for plain TCP
//! (`crate::engine::Engine::poll_read`/`poll_write`), and `rustls::Connection`
//! does all record-layer work synchronously against in-memory buffers.

use std::io;
use std::sync::Arc;

use compio::buf::{BufResult, IoBuf, IoBufMut};
use compio::io::{AsyncRead, AsyncWrite};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, ClientConnection, ServerConfig, ServerConnection};

use zlink_core::options::SocketOptions;

/// Either half of a TLS connection, sans-IO. `ClientConnection` and
/// `ServerConnection` both deref to `rustls::ConnectionCommon`, but keeping
/// them as a named enum avoids requiring callers to reach for the common
/// trait directly.
enum Role {
    Client(ClientConnection),
    Server(ServerConnection),
}

impl Role {
    fn read_tls(&mut self, buf: &mut &[u8]) -> io::Result<usize> {
        match self {
            Role::Client(c) => c.read_tls(buf),
            Role::Server(c) => c.read_tls(buf),
        }
    }

    fn write_tls(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        match self {
            Role::Client(c) => c.write_tls(buf),
            Role::Server(c) => c.write_tls(buf),
        }
    }

    fn process_new_packets(&mut self) -> Result<(), rustls::Error> {
        match self {
            Role::Client(c) => c.process_new_packets().map(|_| ()),
            Role::Server(c) => c.process_new_packets().map(|_| ()),
        }
    }

    fn wants_write(&self) -> bool {
        match self {
            Role::Client(c) => c.wants_write(),
            Role::Server(c) => c.wants_write(),
        }
    }

    fn wants_read(&self) -> bool {
        match self {
            Role::Client(c) => c.wants_read(),
            Role::Server(c) => c.wants_read(),
        }
    }

    fn read_plaintext(&mut self, out: &mut [u8]) -> io::Result<usize> {
        use std::io::Read;
        match self {
            Role::Client(c) => c.reader().read(out),
            Role::Server(c) => c.reader().read(out),
        }
    }

    fn write_plaintext(&mut self, data: &[u8]) -> io::Result<usize> {
        use std::io::Write;
        match self {
            Role::Client(c) => c.writer().write(data),
            Role::Server(c) => c.writer().write(data),
        }
    }
}

/// A TLS-wrapped stream over any `AsyncRead + AsyncWrite` carrier (TCP,
/// and `ws::WsStream` for `wss://`). Implements `AsyncRead`/`AsyncWrite`
/// itself, so `Engine<TlsStream<TcpStream>>` behaves exactly like
/// `Engine<TcpStream>` from the engine's point of view.
pub struct TlsStream<S> {
    inner: S,
    conn: Role,
}

impl<S> TlsStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Complete a client-side TLS handshake over `inner` and return the
    /// wrapped stream, ready for ZMP framing.
    pub async fn connect_client(
        mut inner: S,
        options: &SocketOptions,
    ) -> io::Result<TlsStream<S>> {
        let config = client_config(options)?;
        let hostname = options
            .tls_hostname
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "tls_hostname required"))?;
        let server_name = ServerName::try_from(hostname)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let conn = ClientConnection::new(Arc::new(config), server_name)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let mut stream = TlsStream {
            inner,
            conn: Role::Client(conn),
        };
        stream.complete_handshake().await?;
        Ok(stream)
    }

    /// Complete a server-side TLS handshake over `inner` (listener accept
    /// path).
    pub async fn accept_server(
        mut inner: S,
        options: &SocketOptions,
    ) -> io::Result<TlsStream<S>> {
        let config = server_config(options)?;
        let conn = ServerConnection::new(Arc::new(config))
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let mut stream = TlsStream {
            inner,
            conn: Role::Server(conn),
        };
        stream.complete_handshake().await?;
        Ok(stream)
    }

    async fn complete_handshake(&mut self) -> io::Result<()> {
        loop {
            self.flush_ciphertext().await?;
            if !self.conn.wants_read() && !self.conn.wants_write() {
                return Ok(());
            }
            self.pump_ciphertext_in().await?;
        }
    }

    /// Drain whatever ciphertext rustls has queued for us out over `inner`.
    async fn flush_ciphertext(&mut self) -> io::Result<()> {
        while self.conn.wants_write() {
            let mut out = Vec::new();
            self.conn.write_tls(&mut out)?;
            if out.is_empty() {
                break;
            }
            let BufResult(res, _) = self.inner.write(out).await;
            res?;
        }
        Ok(())
    }

    /// Read one chunk of ciphertext from `inner` and feed it to rustls.
    async fn pump_ciphertext_in(&mut self) -> io::Result<()> {
        let buf = vec![0u8; 16 * 1024];
        let BufResult(res, buf) = self.inner.read(buf).await;
        let n = res?;
        if n == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        let mut slice = &buf[..n];
        while !slice.is_empty() {
            let consumed = self.conn.read_tls(&mut slice)?;
            if consumed == 0 {
                break;
            }
        }
        self.conn
            .process_new_packets()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(())
    }
}

impl<S> AsyncRead for TlsStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn read<B: IoBufMut>(&mut self, mut buf: B) -> BufResult<usize, B> {
        loop {
            let mut scratch = vec![0u8; buf.buf_capacity()];
            match self.conn.read_plaintext(&mut scratch) {
                Ok(0) => {
                    if let Err(e) = self.flush_ciphertext().await {
                        return BufResult(Err(e), buf);
                    }
                    if let Err(e) = self.pump_ciphertext_in().await {
                        return BufResult(Err(e), buf);
                    }
                    continue;
                }
                Ok(n) => {
                    // SAFETY: `n <= scratch.len() <= buf.buf_capacity()`.
                    unsafe {
                        std::ptr::copy_nonoverlapping(scratch.as_ptr(), buf.as_buf_mut_ptr(), n);
                        buf.set_buf_init(n);
                    }
                    return BufResult(Ok(n), buf);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if let Err(e) = self.pump_ciphertext_in().await {
                        return BufResult(Err(e), buf);
                    }
                }
                Err(e) => return BufResult(Err(e), buf),
            }
        }
    }
}

impl<S> AsyncWrite for TlsStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn write<B: IoBuf>(&mut self, buf: B) -> BufResult<usize, B> {
        let slice = buf.as_slice_for_write();
        let res = self.conn.write_plaintext(slice);
        match res {
            Ok(n) => {
                if let Err(e) = self.flush_ciphertext().await {
                    return BufResult(Err(e), buf);
                }
                BufResult(Ok(n), buf)
            }
            Err(e) => BufResult(Err(e), buf),
        }
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.flush_ciphertext().await?;
        self.inner.flush().await
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        if let Role::Client(c) = &mut self.conn {
            c.send_close_notify();
        }
        if let Role::Server(c) = &mut self.conn {
            c.send_close_notify();
        }
        self.flush_ciphertext().await?;
        self.inner.shutdown().await
    }
}

/// `IoBuf` only promises a pointer/len/capacity triad; read the initialized
/// slice off it the same way `Engine`'s direct-write path does via `IoBytes`.
trait AsSliceForWrite {
    fn as_slice_for_write(&self) -> &[u8];
}

impl<B: IoBuf> AsSliceForWrite for B {
    fn as_slice_for_write(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.as_buf_ptr(), self.buf_len()) }
    }
}

fn client_config(options: &SocketOptions) -> io::Result<ClientConfig> {
    let mut roots = rustls::RootCertStore::empty();
    if options.tls_trust_system {
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }
    if let Some(ca) = &options.tls_ca {
        for cert in rustls_pemfile::certs(&mut &ca[..]) {
            let cert = cert.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            roots
                .add(cert)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        }
    }

    let builder = ClientConfig::builder().with_root_certificates(roots);
    let mut config = match (&options.tls_cert, &options.tls_key) {
        (Some(cert), Some(key)) => {
            let chain = parse_cert_chain(cert)?;
            let key = parse_private_key(key)?;
            builder
                .with_client_auth_cert(chain, key)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        }
        _ => builder.with_no_client_auth(),
    };
    if !options.tls_verify {
        config
            .dangerous()
            .set_certificate_verifier(Arc::new(danger::NoVerifier));
    }
    Ok(config)
}

fn server_config(options: &SocketOptions) -> io::Result<ServerConfig> {
    let cert = options
        .tls_cert
        .as_ref()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "tls_cert required"))?;
    let key = options
        .tls_key
        .as_ref()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "tls_key required"))?;
    let chain = parse_cert_chain(cert)?;
    let key = parse_private_key(key)?;

    let builder = if options.tls_require_client_cert {
        let mut roots = rustls::RootCertStore::empty();
        if let Some(ca) = &options.tls_ca {
            for c in rustls_pemfile::certs(&mut &ca[..]) {
                let c = c.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                roots
                    .add(c)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            }
        }
        let verifier = rustls::server::WebPkiClientVerifier::builder(Arc::new(roots))
            .build()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        ServerConfig::builder().with_client_cert_verifier(verifier)
    } else {
        ServerConfig::builder().with_no_client_auth()
    };
    builder
        .with_single_cert(chain, key)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn parse_cert_chain(pem: &[u8]) -> io::Result<Vec<CertificateDer<'static>>> {
    rustls_pemfile::certs(&mut &pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn parse_private_key(pem: &[u8]) -> io::Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut &pem[..])
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "no private key found in PEM"))
}

/// Backing for the `tls_verify = false` option (testing only); accepts any
/// certificate chain unconditionally.
mod danger {
    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::DigitallySignedStruct;

    #[derive(Debug)]
    pub(super) struct NoVerifier;

    impl ServerCertVerifier for NoVerifier {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, rustls::Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
            rustls::crypto::ring::default_provider()
                .signature_verification_algorithms
                .supported_schemes()
        }
    }
}
