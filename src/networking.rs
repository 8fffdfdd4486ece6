use std::error::Error;

use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::RelayError;
use crate::protocol::{decode_payload, read_frame, write_frame, write_json_frame, Opcode};
use crate::utils::{FileRecvRequest, FileRecvResponse, FileSendRequest, FileSendResponse};

/// Connects to the relay and completes the handshake.
pub async fn establish_connection(relay_addr: &str) -> Result<TcpStream, Box<dyn Error>> {
    let mut stream = TcpStream::connect(relay_addr)
        .await
        .map_err(|e| format!("Error connecting with relay at {}: {}", relay_addr, e))?;
    debug!("Connected to relay at {}", relay_addr);

    perform_handshake(&mut stream)
        .await
        .map_err(|e| format!("Couldn't complete handshake: {}", e))?;
    debug!("Handshake complete");

    Ok(stream)
}

pub async fn perform_handshake<S>(stream: &mut S) -> Result<(), RelayError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_frame(stream, Opcode::HandshakeRequest, &[]).await?;
    read_frame(stream).await?.expect(Opcode::HandshakeResponse)?;
    Ok(())
}

/// Announces a file and returns the share code the relay settled on.
pub async fn request_send<S>(stream: &mut S, request: &FileSendRequest) -> Result<FileSendResponse, RelayError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_json_frame(stream, Opcode::FileSendRequest, request).await?;

    let frame = read_frame(stream).await?;
    match frame.opcode {
        Opcode::FileSendResponse => decode_payload(&frame.payload),
        Opcode::ShareCodeUnavailable => Err(RelayError::ShareCodeUnavailable(request.share_code.clone())),
        other => Err(RelayError::unexpected(Opcode::FileSendResponse.name(), other)),
    }
}

/// Asks for the file behind `share_code` and returns its name and size.
pub async fn request_receive<S>(stream: &mut S, share_code: &str) -> Result<FileRecvResponse, RelayError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = FileRecvRequest {
        share_code: share_code.to_string(),
    };
    write_json_frame(stream, Opcode::FileRecvRequest, &request).await?;

    let frame = read_frame(stream).await?;
    match frame.opcode {
        Opcode::FileRecvResponse => decode_payload(&frame.payload),
        Opcode::ShareCodeNotFound => Err(RelayError::ShareCodeNotFound(share_code.to_string())),
        other => Err(RelayError::unexpected(Opcode::FileRecvResponse.name(), other)),
    }
}

/// Blocks until the relay says a receiver is ready for the file.
pub async fn wait_for_receiver<S>(stream: &mut S) -> Result<(), RelayError>
where
    S: AsyncRead + Unpin,
{
    read_frame(stream).await?.expect(Opcode::CanStartSending)?;
    Ok(())
}

pub async fn signal_ready<S>(stream: &mut S) -> Result<(), RelayError>
where
    S: AsyncWrite + Unpin,
{
    write_frame(stream, Opcode::ReadyToReceive, &[]).await
}
