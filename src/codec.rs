//! Stream framing
//!
//! `FrameCodec` splits a TCP byte stream into fixed-size frames
//! (`FRAME_LEN` bytes: encoded message plus CRC trailer) for use with
//! `tokio_util::codec::{FramedRead, FramedWrite}`. The handshake frame that
//! precedes them is handled by `handshake_frame` / `read_handshake`.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::{Decoder, Encoder};

use crate::checksum::{self, CHECKSUM_LEN};
use crate::error::{AppError, WireError};
use crate::message::{Message, FRAME_LEN, MESSAGE_LEN};
use crate::types::ClientId;

/// Handshake frame length: 4-byte identity plus checksum
pub const HANDSHAKE_LEN: usize = 4 + CHECKSUM_LEN;

/// One frame read off the wire
///
/// The checksum result and the decode result are reported separately so the
/// session can apply its corruption policy.
#[derive(Debug)]
pub struct InboundFrame {
    pub checksum_ok: bool,
    pub received_checksum: u16,
    pub computed_checksum: u16,
    pub message: Result<Message, WireError>,
}

/// Fixed-size frame codec
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = InboundFrame;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < FRAME_LEN {
            src.reserve(FRAME_LEN - src.len());
            return Ok(None);
        }

        let unframed = checksum::unframe(&src[..FRAME_LEN], MESSAGE_LEN);
        let frame = InboundFrame {
            checksum_ok: unframed.ok,
            received_checksum: unframed.received,
            computed_checksum: unframed.computed,
            message: Message::decode(unframed.payload),
        };
        src.advance(FRAME_LEN);
        Ok(Some(frame))
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = AppError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(FRAME_LEN);
        dst.extend_from_slice(&checksum::frame(&item.encode()));
        Ok(())
    }
}

/// Build the handshake frame carrying an assigned identity
///
/// `ClientId::UNASSIGNED` tells the peer it was rejected.
pub fn handshake_frame(id: ClientId) -> Vec<u8> {
    checksum::frame(&id.to_be_bytes())
}

/// Read and verify the handshake frame from the relay
pub async fn read_handshake<R>(reader: &mut R) -> Result<ClientId, AppError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; HANDSHAKE_LEN];
    reader.read_exact(&mut buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            AppError::HandshakeClosed
        } else {
            AppError::Io(e)
        }
    })?;

    let unframed = checksum::unframe(&buf, 4);
    if !unframed.ok {
        return Err(AppError::HandshakeCorrupted);
    }
    let id = ClientId::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if !id.is_assigned() {
        return Err(AppError::Rejected);
    }
    Ok(id)
}
