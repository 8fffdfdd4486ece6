use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{watch, Mutex as AsyncMutex};

use crate::bytes::{generate_share_code, relay_exactly};
use crate::error::RelayError;
use crate::protocol::{decode_payload, read_frame, write_frame, write_json_frame, Opcode};
use crate::utils::{FileRecvRequest, FileRecvResponse, FileSendRequest, FileSendResponse};

/// A sender's socket as parked in the registry. The sender's own handler and
/// the receiver's handler take turns on it through the async lock.
pub type SharedConnection<S> = Arc<AsyncMutex<S>>;

/// One-shot "the receiver is done with this file" signal.
///
/// Firing more than once is a no-op, and waiting after it fired returns
/// straight away.
#[derive(Debug)]
pub struct DoneSignal {
    tx: watch::Sender<bool>,
}

impl DoneSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        DoneSignal { tx }
    }

    /// Returns true only for the call that actually fired it.
    pub fn fire(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // the sender half lives in `self`, so the channel cannot close under us
        let _ = rx.wait_for(|done| *done).await;
    }
}

impl Default for DoneSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered sender waiting for someone to present its share code.
#[derive(Debug)]
pub struct PendingTransfer<C> {
    pub share_code: String,
    pub filename: String,
    pub filesize: u64,
    pub connection: C,
    pub done: DoneSignal,
    claimed: AtomicBool,
}

impl<C> PendingTransfer<C> {
    /// Marks the transfer as engaged by a receiver. Only the first caller
    /// gets `true`; a transfer is streamed to exactly one receiver.
    pub fn claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::AcqRel)
    }
}

/// Share code -> pending transfer.
///
/// Every method holds the lock only for the map access itself, never across
/// socket I/O or the done signal.
pub struct Registry<C> {
    transfers: Mutex<HashMap<String, Arc<PendingTransfer<C>>>>,
}

impl<C> Registry<C> {
    pub fn new() -> Self {
        Registry {
            transfers: Mutex::new(HashMap::new()),
        }
    }

    // Every critical section leaves the map consistent, so a poisoned lock
    // is still safe to use.
    fn transfers(&self) -> MutexGuard<'_, HashMap<String, Arc<PendingTransfer<C>>>> {
        self.transfers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a sender under `requested`, or under a freshly generated
    /// code when `requested` is empty.
    ///
    /// An explicit code that is already registered fails with
    /// [`RelayError::ShareCodeUnavailable`] and leaves the registry as it was.
    pub fn register(
        &self,
        requested: &str,
        filename: String,
        filesize: u64,
        connection: C,
    ) -> Result<Arc<PendingTransfer<C>>, RelayError> {
        let mut transfers = self.transfers();

        let share_code = if requested.is_empty() {
            loop {
                let code = generate_share_code();
                if !transfers.contains_key(&code) {
                    break code;
                }
                debug!("Generated share code {} collided, retrying", code);
            }
        } else if transfers.contains_key(requested) {
            return Err(RelayError::ShareCodeUnavailable(requested.to_string()));
        } else {
            requested.to_string()
        };

        let transfer = Arc::new(PendingTransfer {
            share_code: share_code.clone(),
            filename,
            filesize,
            connection,
            done: DoneSignal::new(),
            claimed: AtomicBool::new(false),
        });
        transfers.insert(share_code, Arc::clone(&transfer));

        Ok(transfer)
    }

    pub fn lookup(&self, share_code: &str) -> Option<Arc<PendingTransfer<C>>> {
        self.transfers().get(share_code).cloned()
    }

    /// Removing a code that is not there is a no-op.
    pub fn remove(&self, share_code: &str) -> Option<Arc<PendingTransfer<C>>> {
        self.transfers().remove(share_code)
    }

    /// Removes `transfer`'s entry, but only if the code still maps to that
    /// very transfer and not to a newer one that reused the code.
    pub fn release(&self, transfer: &Arc<PendingTransfer<C>>) -> bool {
        let mut transfers = self.transfers();
        match transfers.get(&transfer.share_code) {
            Some(current) if Arc::ptr_eq(current, transfer) => {
                transfers.remove(&transfer.share_code);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.transfers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers().is_empty()
    }
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs one client connection from handshake to close.
///
/// The first request after the handshake picks the role: a
/// `file-send-request` parks the connection in the registry until a receiver
/// has consumed the file, a `file-recv-request` looks the code up and streams
/// the sender's bytes over. Any error ends this connection only.
pub async fn handle_new_connection<S>(
    mut stream: S,
    addr: SocketAddr,
    registry: Arc<Registry<SharedConnection<S>>>,
) -> Result<(), RelayError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    read_frame(&mut stream).await?.expect(Opcode::HandshakeRequest)?;
    write_frame(&mut stream, Opcode::HandshakeResponse, &[]).await?;
    debug!("Handshake complete with {}", addr);

    let request = read_frame(&mut stream).await?;
    match request.opcode {
        Opcode::FileSendRequest => {
            let request: FileSendRequest = decode_payload(&request.payload)?;
            serve_sender(stream, addr, &registry, request).await
        }
        Opcode::FileRecvRequest => {
            let request: FileRecvRequest = decode_payload(&request.payload)?;
            serve_receiver(stream, addr, &registry, request).await
        }
        other => Err(RelayError::unexpected("file-send-request or file-recv-request", other)),
    }
}

async fn serve_sender<S>(
    stream: S,
    addr: SocketAddr,
    registry: &Registry<SharedConnection<S>>,
    request: FileSendRequest,
) -> Result<(), RelayError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let connection = Arc::new(AsyncMutex::new(stream));

    // Hold the socket until the sender has its share code, so a fast
    // receiver cannot get `can-start-sending` onto the wire first.
    let mut conn = connection.lock().await;
    let transfer = match registry.register(
        &request.share_code,
        request.filename,
        request.filesize,
        Arc::clone(&connection),
    ) {
        Ok(transfer) => transfer,
        Err(e) => {
            info!("Share code {:?} requested by {} is taken", request.share_code, addr);
            write_frame(&mut *conn, Opcode::ShareCodeUnavailable, &[]).await?;
            return Err(e);
        }
    };
    info!(
        "Registered {:?} ({} bytes) from {} under share code {}",
        transfer.filename, transfer.filesize, addr, transfer.share_code
    );

    let response = FileSendResponse {
        share_code: transfer.share_code.clone(),
    };
    if let Err(e) = write_json_frame(&mut *conn, Opcode::FileSendResponse, &response).await {
        registry.release(&transfer);
        return Err(e);
    }
    drop(conn);

    // Nothing else happens on this connection until a receiver is done.
    // A sender that disconnects here stays registered until a receiver
    // engages it and the relay fails.
    transfer.done.wait().await;
    registry.release(&transfer);

    debug!("Share code {} done, closing sender {}", transfer.share_code, addr);
    let mut conn = connection.lock().await;
    let _ = conn.shutdown().await;
    Ok(())
}

async fn serve_receiver<S>(
    mut stream: S,
    addr: SocketAddr,
    registry: &Registry<SharedConnection<S>>,
    request: FileRecvRequest,
) -> Result<(), RelayError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let share_code = request.share_code;
    let Some(transfer) = registry.lookup(&share_code) else {
        info!("Share code {:?} requested by {} not found", share_code, addr);
        write_frame(&mut stream, Opcode::ShareCodeNotFound, &[]).await?;
        return Err(RelayError::ShareCodeNotFound(share_code));
    };

    let metadata = FileRecvResponse {
        filename: transfer.filename.clone(),
        filesize: transfer.filesize,
    };
    write_json_frame(&mut stream, Opcode::FileRecvResponse, &metadata).await?;

    read_frame(&mut stream).await?.expect(Opcode::ReadyToReceive)?;

    if !transfer.claim() {
        return Err(RelayError::TransferInProgress(share_code));
    }

    // From here on the sender must be released whatever happens.
    let outcome = relay_transfer(&mut stream, &transfer).await;
    transfer.done.fire();
    registry.release(&transfer);

    match &outcome {
        Ok(copied) => info!(
            "Relayed {} bytes for share code {} to {}",
            copied, share_code, addr
        ),
        Err(e) => warn!("Relay for share code {} to {} failed: {}", share_code, addr, e),
    }
    outcome.map(|_| ())
}

async fn relay_transfer<S>(
    receiver: &mut S,
    transfer: &PendingTransfer<SharedConnection<S>>,
) -> Result<u64, RelayError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut sender = transfer.connection.lock().await;
    write_frame(&mut *sender, Opcode::CanStartSending, &[]).await?;
    relay_exactly(receiver, &mut *sender, transfer.filesize).await
}
