use std::error::Error;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};

use crate::error::RelayError;
use crate::relay_utils::{handle_new_connection, Registry, SharedConnection};

/// The registry type the TCP relay runs with.
pub type RelayRegistry = Registry<SharedConnection<TcpStream>>;

/// Run the relay server that pairs senders with receivers by share code.
///
/// # Overview
/// The relay never stores a file. It:
/// 1. Accepts connections from senders and receivers
/// 2. Registers each sender under a share code (its own or a generated one)
/// 3. Lets a receiver that presents the code read the file's metadata
/// 4. Streams exactly the announced number of bytes from sender to receiver
///
/// # Architecture
/// - Main task: accepts TCP connections in a loop
/// - Connection tasks: one per client, running the handshake and then the
///   sender or receiver side of the protocol
/// - Shared registry: the only state connection tasks have in common
///
/// # Arguments
/// * `port` - The port to bind on all interfaces (default 3030)
pub async fn run(port: u16) -> Result<(), Box<dyn Error>> {
    let bind_addr = format!("0.0.0.0:{}", port);
    debug!("Attempting to bind to {}", bind_addr);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| format!("Failed to bind {}: {}", bind_addr, e))?;
    info!("Relay server listening on {}", bind_addr);

    serve(listener, Arc::new(Registry::new())).await;
    Ok(())
}

/// Accept loop. Never returns; a failed accept is logged and skipped.
pub async fn serve(listener: TcpListener, registry: Arc<RelayRegistry>) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Error accepting connection: {}", e);
                continue;
            }
        };
        info!("Client connected: {}", addr);

        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            match handle_new_connection(stream, addr, registry).await {
                Ok(()) => debug!("Connection {} finished", addr),
                // a client that never completes its first frame just goes away
                Err(RelayError::IncompleteFrame) => debug!("Connection {} closed early", addr),
                Err(e) => warn!("Connection {} terminated: {}", addr, e),
            }
        });
    }
}
