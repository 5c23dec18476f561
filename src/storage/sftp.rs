use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use ssh2::{ErrorCode, Session, Sftp};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{remote_path, StorageClient, StorageError};
use crate::config::SftpConfig;

// libssh2 status codes
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;
const LIBSSH2_ERROR_SOCKET_TIMEOUT: i32 = -30;
const FX_NO_SUCH_FILE: i32 = 2;
const FX_NO_CONNECTION: i32 = 6;
const FX_CONNECTION_LOST: i32 = 7;
const FX_NO_SUCH_PATH: i32 = 10;

/// SFTP-backed storage with a bounded pool of authenticated sessions.
///
/// libssh2 is blocking, so every operation runs on the blocking thread pool
/// under a wall-clock timeout. The semaphore permit travels with the blocking
/// task and is released only when that task ends, so a timed-out operation
/// still counts against `max_sessions`. Sessions that fail at the transport
/// level are dropped; healthy ones go back to the idle list.
#[derive(Clone)]
pub struct SftpStorage {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: SftpConfig,
    idle: IdlePool<Sftp>,
    sessions: Arc<Semaphore>,
    dir_ready: AtomicBool,
}

impl Inner {
    /// Runs `f` on a pooled or newly dialed session. The session returns to
    /// the pool unless `f` failed at the transport level.
    fn with_session<T>(
        &self,
        fresh: bool,
        f: impl FnOnce(&Sftp) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let sftp = self.idle.take(fresh, || connect(&self.cfg))?;
        let result = f(&sftp);
        match &result {
            Ok(_) | Err(StorageError::NotFound(_)) => self.idle.put(sftp),
            Err(_) => debug!("discarding sftp session after failure"),
        }
        result
    }
}

/// Authenticated sessions waiting for reuse, at most `capacity` of them.
struct IdlePool<T> {
    idle: Mutex<Vec<T>>,
    capacity: usize,
}

impl<T> IdlePool<T> {
    fn new(capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hands out an idle session, or dials one. A `fresh` request follows a
    /// transport failure: the idle sessions are presumed dead as well, so
    /// they are dropped and a new connection is made.
    fn take<E>(&self, fresh: bool, connect: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        if fresh {
            let stale = std::mem::take(&mut *self.lock());
            drop(stale);
        } else if let Some(session) = self.lock().pop() {
            return Ok(session);
        }
        connect()
    }

    fn put(&self, session: T) {
        let mut idle = self.lock();
        if idle.len() < self.capacity {
            idle.push(session);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().len()
    }
}

impl SftpStorage {
    pub fn new(cfg: SftpConfig) -> Self {
        let max_sessions = cfg.max_sessions.max(1);
        Self {
            inner: Arc::new(Inner {
                idle: IdlePool::new(cfg.pool_size),
                sessions: Arc::new(Semaphore::new(max_sessions)),
                dir_ready: AtomicBool::new(false),
                cfg,
            }),
        }
    }

    async fn run<T, F>(&self, op_name: &'static str, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: Fn(&Inner, bool) -> Result<T, StorageError> + Send + Sync + 'static,
    {
        let op = Arc::new(op);
        let timeout = self.inner.cfg.timeout();
        let mut attempt: u32 = 0;

        loop {
            let permit = self
                .inner
                .sessions
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| StorageError::Unavailable("session limiter closed".into()))?;

            let inner = self.inner.clone();
            let op = op.clone();
            let fresh = attempt > 0;
            let task = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                (*op)(&*inner, fresh)
            });

            let outcome = match tokio::time::timeout(timeout, task).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => Err(StorageError::Other(join_err.to_string())),
                Err(_) => Err(StorageError::Timeout(format!(
                    "{} exceeded {}s",
                    op_name,
                    timeout.as_secs()
                ))),
            };

            match outcome {
                Err(e) if e.is_retryable() && attempt < self.inner.cfg.retries => {
                    attempt += 1;
                    warn!(op = op_name, attempt, error = %e, "sftp operation failed, retrying");
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl StorageClient for SftpStorage {
    async fn put_object(&self, name: &str, body: Bytes) -> Result<String, StorageError> {
        let dir = self.inner.cfg.upload_dir.clone();
        let path = remote_path(&dir, name);
        let target = path.clone();
        let size = body.len();

        self.run("put_object", move |inner, fresh| {
            inner.with_session(fresh, |sftp| {
                if !inner.dir_ready.load(Ordering::Acquire) {
                    ensure_dir(sftp, &dir)?;
                    inner.dir_ready.store(true, Ordering::Release);
                }
                let mut file = sftp.create(Path::new(&target)).map_err(classify)?;
                file.write_all(&body).map_err(classify_io)?;
                Ok(())
            })
        })
        .await?;

        info!(path = %path, size, "sftp upload complete");
        Ok(path)
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = remote_path(&self.inner.cfg.upload_dir, key);
        self.run("get_object", move |inner, fresh| {
            inner.with_session(fresh, |sftp| {
                let mut file = sftp.open(Path::new(&path)).map_err(|e| match classify(e) {
                    StorageError::NotFound(_) => StorageError::NotFound(path.clone()),
                    other => other,
                })?;
                let mut buf = Vec::new();
                file.read_to_end(&mut buf).map_err(classify_io)?;
                Ok(Bytes::from(buf))
            })
        })
        .await
    }
}

fn connect(cfg: &SftpConfig) -> Result<Sftp, StorageError> {
    let timeout = cfg.timeout();
    let addr = (cfg.host.as_str(), cfg.port)
        .to_socket_addrs()
        .map_err(|e| StorageError::Unavailable(format!("resolve {}: {}", cfg.host, e)))?
        .next()
        .ok_or_else(|| StorageError::Unavailable(format!("no address for {}", cfg.host)))?;

    let tcp = TcpStream::connect_timeout(&addr, timeout).map_err(classify_io)?;
    tcp.set_read_timeout(Some(timeout)).map_err(classify_io)?;
    tcp.set_write_timeout(Some(timeout)).map_err(classify_io)?;

    let mut session = Session::new().map_err(classify)?;
    session.set_tcp_stream(tcp);
    session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
    session.handshake().map_err(classify)?;
    session
        .userauth_password(&cfg.user, &cfg.password)
        .map_err(|e| StorageError::Unavailable(format!("authentication failed: {}", e)))?;
    if !session.authenticated() {
        return Err(StorageError::Unavailable("authentication rejected".into()));
    }

    let sftp = session.sftp().map_err(classify)?;
    debug!(host = %cfg.host, port = cfg.port, "sftp session established");
    Ok(sftp)
}

fn ensure_dir(sftp: &Sftp, dir: &str) -> Result<(), StorageError> {
    let path = Path::new(dir);
    match sftp.stat(path).map_err(classify) {
        Ok(_) => Ok(()),
        Err(StorageError::NotFound(_)) => {
            info!(dir, "creating upload directory");
            match sftp.mkdir(path, 0o755) {
                Ok(()) => Ok(()),
                // Another session may have created it in the meantime.
                Err(e) => sftp.stat(path).map(|_| ()).map_err(|_| classify(e)),
            }
        }
        Err(e) => Err(e),
    }
}

fn classify(err: ssh2::Error) -> StorageError {
    let msg = err.to_string();
    match err.code() {
        ErrorCode::SFTP(FX_NO_SUCH_FILE) | ErrorCode::SFTP(FX_NO_SUCH_PATH) => {
            StorageError::NotFound(msg)
        }
        ErrorCode::SFTP(FX_NO_CONNECTION) | ErrorCode::SFTP(FX_CONNECTION_LOST) => {
            StorageError::Unavailable(msg)
        }
        ErrorCode::SFTP(_) => StorageError::Other(msg),
        ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT)
        | ErrorCode::Session(LIBSSH2_ERROR_SOCKET_TIMEOUT) => StorageError::Timeout(msg),
        ErrorCode::Session(_) => StorageError::Unavailable(msg),
    }
}

fn classify_io(err: io::Error) -> StorageError {
    match err.kind() {
        io::ErrorKind::NotFound => StorageError::NotFound(err.to_string()),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => StorageError::Timeout(err.to_string()),
        _ => StorageError::Unavailable(err.to_string()),
    }
}
