//! ThingsDB binary protocol.
//!
//! Every package starts with an 8 byte header followed by a MessagePack
//! payload:
//!
//! ```text
//! +----------------+--------+------+-------+
//! | size (u32, LE) | pid LE | type | check |
//! +----------------+--------+------+-------+
//! ```
//!
//! `check` is the bitwise inverse of `type` and lets the reader detect a
//! desynchronised stream.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::ThingsDbError;

pub const HEADER_SIZE: usize = 8;

/// Upper bound for a single payload; anything larger is treated as a corrupt header.
pub const MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;

/// Package types understood by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Proto {
    OnNodeStatus = 0x00,
    OnWarn = 0x05,
    OnRoomJoin = 0x06,
    OnRoomLeave = 0x07,
    OnRoomEvent = 0x08,
    OnRoomDelete = 0x09,
    ResPing = 0x10,
    ResOk = 0x11,
    ResData = 0x12,
    ResError = 0x13,
    ReqPing = 0x20,
    ReqAuth = 0x21,
    ReqQuery = 0x22,
    ReqRun = 0x25,
    ReqJoin = 0x26,
    ReqLeave = 0x27,
    ReqEmit = 0x28,
}

impl Proto {
    /// Server push packages are not answers to a request.
    pub fn is_event(self) -> bool {
        (self as u8) < 0x10
    }

    pub fn is_response(self) -> bool {
        matches!(self, Proto::ResPing | Proto::ResOk | Proto::ResData | Proto::ResError)
    }
}

impl TryFrom<u8> for Proto {
    type Error = ThingsDbError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let proto = match value {
            0x00 => Proto::OnNodeStatus,
            0x05 => Proto::OnWarn,
            0x06 => Proto::OnRoomJoin,
            0x07 => Proto::OnRoomLeave,
            0x08 => Proto::OnRoomEvent,
            0x09 => Proto::OnRoomDelete,
            0x10 => Proto::ResPing,
            0x11 => Proto::ResOk,
            0x12 => Proto::ResData,
            0x13 => Proto::ResError,
            0x20 => Proto::ReqPing,
            0x21 => Proto::ReqAuth,
            0x22 => Proto::ReqQuery,
            0x25 => Proto::ReqRun,
            0x26 => Proto::ReqJoin,
            0x27 => Proto::ReqLeave,
            0x28 => Proto::ReqEmit,
            other => {
                return Err(ThingsDbError::protocol(format!("unknown package type 0x{other:02x}")))
            }
        };
        Ok(proto)
    }
}

/// Payload of a `RES_ERROR` package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error_msg: String,
    pub error_code: i64,
}

/// A single framed package.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub pid: u16,
    pub proto: Proto,
    pub data: Bytes,
}

impl Package {
    pub fn new(pid: u16, proto: Proto, data: impl Into<Bytes>) -> Self {
        Self { pid, proto, data: data.into() }
    }

    /// Build a package whose payload is `payload` encoded as MessagePack.
    pub fn with_payload<T: Serialize + ?Sized>(
        pid: u16,
        proto: Proto,
        payload: &T,
    ) -> Result<Self, ThingsDbError> {
        let data = rmp_serde::to_vec(payload)?;
        Ok(Self::new(pid, proto, data))
    }

    /// Serialise header and payload into one buffer.
    pub fn encode(&self) -> Result<Bytes, ThingsDbError> {
        let size = u32::try_from(self.data.len())
            .ok()
            .filter(|size| *size <= MAX_PAYLOAD_SIZE)
            .ok_or_else(|| ThingsDbError::protocol("payload exceeds maximum package size"))?;

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.data.len());
        buf.put_u32_le(size);
        buf.put_u16_le(self.pid);
        buf.put_u8(self.proto as u8);
        buf.put_u8(!(self.proto as u8));
        buf.put_slice(&self.data);
        Ok(buf.freeze())
    }

    /// Parse a header, returning `(payload size, pid, type)`.
    pub fn decode_header(header: &[u8; HEADER_SIZE]) -> Result<(u32, u16, Proto), ThingsDbError> {
        let size = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let pid = u16::from_le_bytes([header[4], header[5]]);
        let tp = header[6];

        if header[7] != !tp {
            return Err(ThingsDbError::protocol(format!(
                "invalid check byte 0x{:02x} for package type 0x{:02x}",
                header[7], tp
            )));
        }
        if size > MAX_PAYLOAD_SIZE {
            return Err(ThingsDbError::protocol(format!("package size {size} exceeds limit")));
        }

        Ok((size, pid, Proto::try_from(tp)?))
    }

    pub async fn read_from<R>(reader: &mut R) -> Result<Self, ThingsDbError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut header = [0u8; HEADER_SIZE];
        if let Err(e) = reader.read_exact(&mut header).await {
            return Err(match e.kind() {
                std::io::ErrorKind::UnexpectedEof => ThingsDbError::Closed,
                _ => ThingsDbError::Io(e),
            });
        }

        let (size, pid, proto) = Self::decode_header(&header)?;
        let mut data = vec![0u8; size as usize];
        reader.read_exact(&mut data).await?;

        Ok(Self::new(pid, proto, data))
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), ThingsDbError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        writer.write_all(&self.encode()?).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Decode the payload as a dynamic value. An empty payload is `null`.
    pub fn value(&self) -> Result<Value, ThingsDbError> {
        if self.data.is_empty() {
            return Ok(Value::Null);
        }
        Ok(rmp_serde::from_slice(&self.data)?)
    }

    /// Turn a `RES_ERROR` package into a server error.
    pub fn server_error(&self) -> ThingsDbError {
        match rmp_serde::from_slice::<ErrorPayload>(&self.data) {
            Ok(payload) => {
                ThingsDbError::Server { code: payload.error_code, message: payload.error_msg }
            }
            Err(e) => ThingsDbError::protocol(format!("unreadable error package: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_layout() {
        let package = Package::new(0x0102, Proto::ReqQuery, vec![0xc0]);
        let encoded = package.encode().unwrap();

        assert_eq!(&encoded[..], &[1, 0, 0, 0, 0x02, 0x01, 0x22, 0xdd, 0xc0]);
    }

    #[test]
    fn test_rejects_bad_check_byte() {
        let header = [0, 0, 0, 0, 1, 0, 0x11, 0x11];
        let err = Package::decode_header(&header).unwrap_err();
        assert!(matches!(err, ThingsDbError::Protocol { .. }));
    }

    #[test]
    fn test_rejects_unknown_type() {
        let header = [0, 0, 0, 0, 1, 0, 0x42, !0x42];
        assert!(Package::decode_header(&header).is_err());
    }

    #[test]
    fn test_rejects_oversized_payload() {
        let size = (MAX_PAYLOAD_SIZE + 1).to_le_bytes();
        let header = [size[0], size[1], size[2], size[3], 1, 0, 0x12, !0x12];
        assert!(Package::decode_header(&header).is_err());
    }

    #[test]
    fn test_event_classification() {
        assert!(Proto::OnNodeStatus.is_event());
        assert!(Proto::OnWarn.is_event());
        assert!(!Proto::ResData.is_event());
        assert!(Proto::ResError.is_response());
        assert!(!Proto::ReqAuth.is_response());
    }

    #[test]
    fn test_server_error_payload() {
        let payload = ErrorPayload { error_msg: "access denied".into(), error_code: -56 };
        let package = Package::with_payload(7, Proto::ResError, &payload).unwrap();

        match package.server_error() {
            ThingsDbError::Server { code, message } => {
                assert_eq!(code, -56);
                assert_eq!(message, "access denied");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_payload_is_null() {
        let package = Package::new(1, Proto::ResOk, Vec::new());
        assert_eq!(package.value().unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_stream_framing() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        let sent = Package::with_payload(
            3,
            Proto::ReqQuery,
            &("@thingsdb", "new_token(user);", json!({"user": "42_reader"})),
        )
        .unwrap();
        sent.write_to(&mut client).await.unwrap();

        let received = Package::read_from(&mut server).await.unwrap();
        assert_eq!(received.pid, 3);
        assert_eq!(received.proto, Proto::ReqQuery);
        assert_eq!(
            received.value().unwrap(),
            json!(["@thingsdb", "new_token(user);", {"user": "42_reader"}])
        );
    }

    #[tokio::test]
    async fn test_closed_stream() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        let err = Package::read_from(&mut server).await.unwrap_err();
        assert!(matches!(err, ThingsDbError::Closed));
    }
}
