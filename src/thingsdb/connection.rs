//! A single authenticated connection to a ThingsDB node.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use super::error::ThingsDbError;
use super::protocol::{Package, Proto};
use super::{tls, QueryClient};

/// Default time allowed for connect, handshake and each request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Byte stream a [`Connection`] runs over.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// Request/response connection to one node.
///
/// Requests are serialised: the transport lock is held from writing the
/// request until the matching response has been read. Server push events
/// arriving in between are logged and dropped.
///
/// An exchange that does not run to completion (timeout, cancelled caller,
/// transport or framing error) may leave the stream mid-package. The
/// connection is then marked broken and every later request fails with
/// [`ThingsDbError::Closed`].
pub struct Connection {
    transport: Mutex<Box<dyn Transport>>,
    next_pid: AtomicU16,
    broken: AtomicBool,
    timeout: Duration,
    peer: String,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("peer", &self.peer).finish_non_exhaustive()
    }
}

impl Connection {
    /// Wrap an already established transport.
    pub fn new<T: Transport + 'static>(transport: T, peer: impl Into<String>) -> Self {
        Self {
            transport: Mutex::new(Box::new(transport)),
            next_pid: AtomicU16::new(0),
            broken: AtomicBool::new(false),
            timeout: DEFAULT_TIMEOUT,
            peer: peer.into(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Open a TLS connection to `host:port`. The connection is not yet authenticated.
    pub async fn connect(
        host: &str,
        port: u16,
        insecure: bool,
        timeout: Duration,
    ) -> Result<Self, ThingsDbError> {
        let peer = format!("{host}:{port}");
        debug!(peer = %peer, insecure, "Opening ThingsDB connection");

        let stream = with_deadline(timeout, TcpStream::connect((host, port)), "connect").await??;
        stream.set_nodelay(true)?;
        let stream = with_deadline(timeout, tls::handshake(stream, host, insecure), "TLS handshake")
            .await??;

        Ok(Self::new(stream, peer).with_timeout(timeout))
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Authenticate with an access token.
    pub async fn authenticate(&self, token: &str) -> Result<(), ThingsDbError> {
        let package = self.request(Proto::ReqAuth, &token).await?;
        match package.proto {
            Proto::ResOk | Proto::ResData => Ok(()),
            other => Err(ThingsDbError::protocol(format!("unexpected auth response {other:?}"))),
        }
    }

    fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    async fn request<T>(&self, proto: Proto, payload: &T) -> Result<Package, ThingsDbError>
    where
        T: serde::Serialize + ?Sized,
    {
        if self.is_broken() {
            return Err(ThingsDbError::Closed);
        }

        let pid = self.next_pid.fetch_add(1, Ordering::Relaxed);
        let outgoing = Package::with_payload(pid, proto, payload)?;

        let mut guard = BrokenOnDrop { flag: &self.broken, armed: true };
        let result = with_deadline(self.timeout, self.exchange(outgoing), "request").await?;
        match &result {
            Ok(_) | Err(ThingsDbError::Server { .. }) => guard.armed = false,
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "ThingsDB exchange failed, marking connection broken")
            }
        }
        result
    }

    async fn exchange(&self, outgoing: Package) -> Result<Package, ThingsDbError> {
        let mut transport = self.transport.lock().await;
        // A request queued behind a failed one must not write to the stream.
        if self.is_broken() {
            return Err(ThingsDbError::Closed);
        }
        outgoing.write_to(&mut **transport).await?;
        trace!(pid = outgoing.pid, proto = ?outgoing.proto, "Sent package");

        loop {
            let incoming = Package::read_from(&mut **transport).await?;

            if incoming.proto.is_event() {
                debug!(peer = %self.peer, proto = ?incoming.proto, "Ignoring ThingsDB event");
                continue;
            }
            if incoming.pid != outgoing.pid {
                warn!(
                    peer = %self.peer,
                    expected = outgoing.pid,
                    received = incoming.pid,
                    "Discarding response for unknown request"
                );
                continue;
            }

            return match incoming.proto {
                Proto::ResError => Err(incoming.server_error()),
                p if p.is_response() => Ok(incoming),
                other => Err(ThingsDbError::protocol(format!(
                    "unexpected package type {other:?} in response"
                ))),
            };
        }
    }
}

#[async_trait]
impl QueryClient for Connection {
    async fn query(&self, scope: &str, code: &str, vars: Value) -> Result<Value, ThingsDbError> {
        let has_vars = vars.as_object().is_some_and(|m| !m.is_empty());
        let package = if has_vars {
            self.request(Proto::ReqQuery, &(scope, code, vars)).await?
        } else {
            self.request(Proto::ReqQuery, &(scope, code)).await?
        };

        match package.proto {
            Proto::ResData => package.value(),
            _ => Ok(Value::Null),
        }
    }
}

/// Marks the connection broken unless disarmed after a clean exchange.
/// Dropping the request future mid-exchange also trips it.
struct BrokenOnDrop<'a> {
    flag: &'a AtomicBool,
    armed: bool,
}

impl Drop for BrokenOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(true, Ordering::Release);
        }
    }
}

async fn with_deadline<F, T>(limit: Duration, fut: F, what: &str) -> Result<T, ThingsDbError>
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        ThingsDbError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("{what} timed out after {}s", limit.as_secs_f64()),
        ))
    })
}
