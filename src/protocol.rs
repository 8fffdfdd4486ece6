//! Wire framing shared by the relay and its clients.
//!
//! Every structured message is a frame:
//!
//! ```text
//! +--------+-----------------+-----------------+
//! | opcode | payload length  | payload         |
//! | 1 byte | u16 little-end. | `length` bytes  |
//! +--------+-----------------+-----------------+
//! ```
//!
//! Request and response payloads are JSON objects (see [`crate::utils`]).
//! File bodies never go through this layer; they are streamed raw right
//! after the protocol step that announces them.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::RelayError;

pub const HEADER_LEN: usize = 3;
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Opcodes start at ASCII '0' so a relay can be poked at with netcat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    HandshakeRequest = 48,
    HandshakeResponse = 49,
    FileSendRequest = 50,
    FileSendResponse = 51,
    FileRecvRequest = 52,
    FileRecvResponse = 53,
    // 54 is reserved for text messages, which the relay never handles
    ShareCodeUnavailable = 55,
    ShareCodeNotFound = 56,
    ReadyToReceive = 57,
    CanStartSending = 58,
    Invalid = 59,
}

impl Opcode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Opcodes a client is allowed to send to the relay.
    pub fn is_request(self) -> bool {
        matches!(
            self,
            Opcode::HandshakeRequest
                | Opcode::FileSendRequest
                | Opcode::FileRecvRequest
                | Opcode::ReadyToReceive
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::HandshakeRequest => "handshake-request",
            Opcode::HandshakeResponse => "handshake-response",
            Opcode::FileSendRequest => "file-send-request",
            Opcode::FileSendResponse => "file-send-response",
            Opcode::FileRecvRequest => "file-recv-request",
            Opcode::FileRecvResponse => "file-recv-response",
            Opcode::ShareCodeUnavailable => "share-code-unavailable",
            Opcode::ShareCodeNotFound => "share-code-not-found",
            Opcode::ReadyToReceive => "ready-to-receive",
            Opcode::CanStartSending => "can-start-sending",
            Opcode::Invalid => "invalid",
        }
    }
}

impl From<u8> for Opcode {
    fn from(byte: u8) -> Self {
        match byte {
            48 => Opcode::HandshakeRequest,
            49 => Opcode::HandshakeResponse,
            50 => Opcode::FileSendRequest,
            51 => Opcode::FileSendResponse,
            52 => Opcode::FileRecvRequest,
            53 => Opcode::FileRecvResponse,
            55 => Opcode::ShareCodeUnavailable,
            56 => Opcode::ShareCodeNotFound,
            57 => Opcode::ReadyToReceive,
            58 => Opcode::CanStartSending,
            _ => Opcode::Invalid,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u8())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Returns the payload if this frame carries `expected`, otherwise a
    /// protocol violation naming what arrived instead.
    pub fn expect(self, expected: Opcode) -> Result<Vec<u8>, RelayError> {
        if self.opcode == expected {
            Ok(self.payload)
        } else {
            Err(RelayError::unexpected(expected.name(), self.opcode))
        }
    }
}

/// Lays out `opcode | len (u16 LE) | payload`.
pub fn encode_frame(opcode: Opcode, payload: &[u8]) -> Result<Vec<u8>, RelayError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(RelayError::PayloadTooLarge(payload.len()));
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.push(opcode.as_u8());
    frame.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Reads one frame, keeping on reading until the declared payload length is
/// satisfied or the stream closes.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, RelayError>
where
    R: AsyncRead + Unpin,
{
    let mut opcode = [0u8; 1];
    read_header_part(reader, &mut opcode).await?;

    let mut len = [0u8; 2];
    read_header_part(reader, &mut len).await?;
    let declared = u16::from_le_bytes(len);

    let mut payload = vec![0u8; declared as usize];
    let mut received = 0;
    while received < payload.len() {
        let n = reader.read(&mut payload[received..]).await?;
        if n == 0 {
            return Err(RelayError::FrameMismatch { declared, received });
        }
        received += n;
    }

    Ok(Frame {
        opcode: Opcode::from(opcode[0]),
        payload,
    })
}

async fn read_header_part<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), RelayError>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(RelayError::IncompleteFrame),
        Err(e) => Err(e.into()),
    }
}

pub async fn write_frame<W>(writer: &mut W, opcode: Opcode, payload: &[u8]) -> Result<(), RelayError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(opcode, payload)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Serializes `message` as JSON and sends it as the payload of `opcode`.
pub async fn write_json_frame<W, T>(writer: &mut W, opcode: Opcode, message: &T) -> Result<(), RelayError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(message)?;
    write_frame(writer, opcode, &payload).await
}

/// Unknown fields are ignored, missing required ones are an error.
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, RelayError> {
    Ok(serde_json::from_slice(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{FileRecvRequest, FileSendRequest};
    use tokio::io::duplex;

    #[test]
    fn test_opcode_bytes_are_stable() {
        assert_eq!(Opcode::HandshakeRequest.as_u8(), b'0');
        assert_eq!(Opcode::FileRecvResponse.as_u8(), 53);
        assert_eq!(Opcode::ShareCodeUnavailable.as_u8(), 55);
        assert_eq!(Opcode::CanStartSending.as_u8(), 58);

        for byte in 48u8..=58 {
            let opcode = Opcode::from(byte);
            if byte == 54 {
                assert_eq!(opcode, Opcode::Invalid);
            } else {
                assert_eq!(opcode.as_u8(), byte);
            }
        }
    }

    #[test]
    fn test_unknown_bytes_decode_to_invalid() {
        assert_eq!(Opcode::from(0), Opcode::Invalid);
        assert_eq!(Opcode::from(47), Opcode::Invalid);
        assert_eq!(Opcode::from(59), Opcode::Invalid);
        assert_eq!(Opcode::from(255), Opcode::Invalid);
    }

    #[test]
    fn test_request_class_opcodes() {
        assert!(Opcode::HandshakeRequest.is_request());
        assert!(Opcode::ReadyToReceive.is_request());
        assert!(!Opcode::FileSendResponse.is_request());
        assert!(!Opcode::CanStartSending.is_request());
        assert!(!Opcode::Invalid.is_request());
    }

    #[test]
    fn test_encode_layout() {
        let frame = encode_frame(Opcode::FileSendResponse, b"abc").unwrap();
        assert_eq!(frame, vec![51, 3, 0, b'a', b'b', b'c']);

        let empty = encode_frame(Opcode::HandshakeResponse, &[]).unwrap();
        assert_eq!(empty, vec![49, 0, 0]);
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_PAYLOAD_LEN + 1];
        let err = encode_frame(Opcode::FileSendRequest, &payload).unwrap_err();
        assert!(matches!(err, RelayError::PayloadTooLarge(n) if n == MAX_PAYLOAD_LEN + 1));
    }

    #[tokio::test]
    async fn test_read_frame_round_trip_at_bounds() {
        for len in [0usize, 1, MAX_PAYLOAD_LEN] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let bytes = encode_frame(Opcode::FileRecvRequest, &payload).unwrap();

            let frame = read_frame(&mut &bytes[..]).await.unwrap();
            assert_eq!(frame.opcode, Opcode::FileRecvRequest);
            assert_eq!(frame.payload, payload);
        }
    }

    #[tokio::test]
    async fn test_read_frame_across_partial_reads() {
        // an 8 byte pipe hands the payload over in many small reads
        let (mut client, mut server) = duplex(8);
        let payload = vec![7u8; 1000];
        let expected = payload.clone();

        let writer = tokio::spawn(async move {
            write_frame(&mut client, Opcode::FileSendRequest, &payload).await.unwrap();
        });

        let frame = read_frame(&mut server).await.unwrap();
        writer.await.unwrap();
        assert_eq!(frame.opcode, Opcode::FileSendRequest);
        assert_eq!(frame.payload, expected);
    }

    #[tokio::test]
    async fn test_incomplete_header() {
        let empty: &[u8] = &[];
        assert!(matches!(read_frame(&mut &empty[..]).await, Err(RelayError::IncompleteFrame)));

        let opcode_only: &[u8] = &[48];
        assert!(matches!(read_frame(&mut &opcode_only[..]).await, Err(RelayError::IncompleteFrame)));

        let half_length: &[u8] = &[48, 5];
        assert!(matches!(read_frame(&mut &half_length[..]).await, Err(RelayError::IncompleteFrame)));
    }

    #[tokio::test]
    async fn test_truncated_payload_is_a_mismatch() {
        let bytes: &[u8] = &[50, 10, 0, 1, 2, 3, 4];
        match read_frame(&mut &bytes[..]).await {
            Err(RelayError::FrameMismatch { declared, received }) => {
                assert_eq!(declared, 10);
                assert_eq!(received, 4);
            }
            other => panic!("expected FrameMismatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reads_back_to_back_frames() {
        let mut bytes = encode_frame(Opcode::HandshakeRequest, &[]).unwrap();
        bytes.extend(encode_frame(Opcode::FileRecvRequest, b"{}").unwrap());
        let mut reader = &bytes[..];

        assert_eq!(read_frame(&mut reader).await.unwrap().opcode, Opcode::HandshakeRequest);
        let second = read_frame(&mut reader).await.unwrap();
        assert_eq!(second.opcode, Opcode::FileRecvRequest);
        assert_eq!(second.payload, b"{}");
    }

    #[test]
    fn test_frame_expect() {
        let frame = Frame { opcode: Opcode::CanStartSending, payload: vec![] };
        assert!(frame.clone().expect(Opcode::CanStartSending).is_ok());

        match frame.expect(Opcode::FileSendResponse) {
            Err(RelayError::ProtocolViolation { expected, got }) => {
                assert_eq!(expected, "file-send-response");
                assert_eq!(got, Opcode::CanStartSending);
            }
            other => panic!("expected ProtocolViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_payload_ignores_unknown_fields() {
        let request: FileRecvRequest =
            decode_payload(br#"{"share_code":"ABC123","extra":true}"#).unwrap();
        assert_eq!(request.share_code, "ABC123");
    }

    #[test]
    fn test_decode_payload_requires_fields() {
        let missing = decode_payload::<FileSendRequest>(br#"{"share_code":"x","filename":"a"}"#);
        assert!(matches!(missing, Err(RelayError::MalformedPayload(_))));

        let negative = decode_payload::<FileSendRequest>(br#"{"filename":"a","filesize":-1}"#);
        assert!(matches!(negative, Err(RelayError::MalformedPayload(_))));
    }
}
