//! The encrypted, MAC-authenticated framed session.

use crate::{
    decode_frame_size_24, encode_frame_size_24,
    errors::{FrameHeaderError, RlpxError},
    mac::SessionMacs,
    params::{AES_BLOCK_SIZE, DEFAULT_FRAGMENT_SIZE, HEADER_SIZE, MAC_SIZE, MAX_UNCOMPRESSED_SIZE},
    snappy::{snappy_compress, snappy_decompress},
    FrameHeader, HandshakeRole,
};
use aes::{cipher::generic_array::GenericArray, Aes256};
use alloy_primitives::B256;
use ctr::{
    cipher::{KeyIvInit, StreamCipher},
    Ctr64BE,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

type Aes256Ctr = Ctr64BE<Aes256>;

/// The secrets derived from the ECIES handshake, from which a [Session]
/// seeds its ciphers and MAC states. The handshake cryptography itself lives
/// outside this crate; a session begins where the shared secrets end.
#[derive(Debug, Clone)]
pub struct SessionSecrets {
    /// The AES-256-CTR frame encryption key.
    pub aes_secret: B256,
    /// The MAC whitening key.
    pub mac_secret: B256,
    /// The initiator's handshake nonce.
    pub initiator_nonce: B256,
    /// The recipient's handshake nonce.
    pub recipient_nonce: B256,
    /// The raw `auth` packet bytes as sent on the wire.
    pub auth: Vec<u8>,
    /// The raw `ack` packet bytes as sent on the wire.
    pub ack: Vec<u8>,
}

/// A framed RLPx session over a tokio stream.
///
/// Frames are `header(16) || header_mac(16) || body(padded to 16) ||
/// body_mac(16)`. Messages larger than the outbound fragmentation target are
/// split into chunked frames sharing a context id. Every message past the
/// hello exchange is snappy-compressed. A MAC mismatch anywhere is terminal:
/// the session must be dropped, there is no partial-frame recovery.
pub struct Session<T> {
    stream: T,
    role: HandshakeRole,
    ingress_aes: Aes256Ctr,
    egress_aes: Aes256Ctr,
    macs: SessionMacs,
    next_context_id: u64,
    sent_hello: bool,
    received_hello: bool,
}

impl<T> core::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session").field("role", &self.role).finish_non_exhaustive()
    }
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a session over the stream, seeding the MAC pair per the role.
    pub fn new(stream: T, role: HandshakeRole, secrets: &SessionSecrets) -> Self {
        let zero_iv = [0u8; AES_BLOCK_SIZE];
        let macs = SessionMacs::seed(
            role,
            secrets.mac_secret,
            secrets.initiator_nonce,
            secrets.recipient_nonce,
            &secrets.auth,
            &secrets.ack,
        );
        Self {
            stream,
            role,
            ingress_aes: Aes256Ctr::new(
                GenericArray::from_slice(secrets.aes_secret.as_slice()),
                GenericArray::from_slice(&zero_iv),
            ),
            egress_aes: Aes256Ctr::new(
                GenericArray::from_slice(secrets.aes_secret.as_slice()),
                GenericArray::from_slice(&zero_iv),
            ),
            macs,
            next_context_id: 1,
            sent_hello: false,
            received_hello: false,
        }
    }

    /// The role fixed at session creation.
    pub const fn role(&self) -> HandshakeRole {
        self.role
    }

    /// Writes one message, fragmenting and compressing as required.
    pub async fn write_message(&mut self, message: &[u8]) -> Result<(), RlpxError> {
        // The hello exchange travels uncompressed.
        let payload =
            if self.sent_hello { snappy_compress(message)? } else { message.to_vec() };
        self.sent_hello = true;

        if payload.len() <= DEFAULT_FRAGMENT_SIZE {
            let header_data = FrameHeader::encode_header_data(0, None, None)?;
            self.write_frame(&header_data, &payload).await?;
        } else {
            let context_id = self.next_context_id;
            self.next_context_id += 1;

            let mut chunks = payload.chunks(DEFAULT_FRAGMENT_SIZE);
            let first = chunks.next().unwrap_or_default();
            let header_data =
                FrameHeader::encode_header_data(0, Some(context_id), Some(payload.len()))?;
            self.write_frame(&header_data, first).await?;

            for chunk in chunks {
                let header_data =
                    FrameHeader::encode_header_data(0, Some(context_id), None)?;
                self.write_frame(&header_data, chunk).await?;
            }
        }

        self.stream.flush().await?;
        Ok(())
    }

    /// Reads one message, reassembling chunked frames and decompressing past
    /// the hello exchange.
    pub async fn read_message(&mut self) -> Result<Vec<u8>, RlpxError> {
        let (header, mut assembled) = self.read_frame().await?;

        if header.is_chunked {
            if !header.is_first_chunk {
                return Err(RlpxError::UnexpectedContinuationFrame);
            }
            let total = header.total_packet_size;
            while assembled.len() < total {
                let (continuation, chunk) = self.read_frame().await?;
                if continuation.is_first_chunk || continuation.context_id != header.context_id {
                    return Err(RlpxError::UnexpectedContinuationFrame);
                }
                assembled.extend_from_slice(&chunk);
            }
            if assembled.len() != total {
                return Err(FrameHeaderError::FrameSizeExceedsTotalPacketSize.into());
            }
        }

        let message = if self.received_hello {
            snappy_decompress(&assembled)?
        } else {
            assembled
        };
        self.received_hello = true;
        Ok(message)
    }

    /// Writes a single frame.
    async fn write_frame(&mut self, header_data: &[u8], body: &[u8]) -> Result<(), RlpxError> {
        let size = encode_frame_size_24(body.len())?;
        let mut header = [0u8; HEADER_SIZE];
        header[..3].copy_from_slice(&size);
        header[3..].copy_from_slice(header_data);
        self.egress_aes.apply_keystream(&mut header);
        let header_mac = self.macs.egress.update_header(&header);

        let padded_len = body.len().div_ceil(AES_BLOCK_SIZE) * AES_BLOCK_SIZE;
        let mut padded = vec![0u8; padded_len];
        padded[..body.len()].copy_from_slice(body);
        self.egress_aes.apply_keystream(&mut padded);
        let body_mac = self.macs.egress.update_body(&padded);

        trace!(target: "rlpx", frame_size = body.len(), "Writing frame");
        self.stream.write_all(&header).await?;
        self.stream.write_all(&header_mac).await?;
        self.stream.write_all(&padded).await?;
        self.stream.write_all(&body_mac).await?;
        Ok(())
    }

    /// Reads and authenticates a single frame.
    async fn read_frame(&mut self) -> Result<(FrameHeader, Vec<u8>), RlpxError> {
        let mut header = [0u8; HEADER_SIZE];
        self.stream.read_exact(&mut header).await?;
        let mut header_mac = [0u8; MAC_SIZE];
        self.stream.read_exact(&mut header_mac).await?;

        // MACs cover the ciphertext; verify before decrypting.
        if self.macs.ingress.update_header(&header) != header_mac {
            return Err(RlpxError::MacMismatch);
        }
        self.ingress_aes.apply_keystream(&mut header);

        let frame_size = decode_frame_size_24([header[0], header[1], header[2]]);
        let frame_header =
            FrameHeader::decode(frame_size, &header[3..], MAX_UNCOMPRESSED_SIZE)?;

        let padded_len = frame_size.div_ceil(AES_BLOCK_SIZE) * AES_BLOCK_SIZE;
        let mut padded = vec![0u8; padded_len];
        self.stream.read_exact(&mut padded).await?;
        let mut body_mac = [0u8; MAC_SIZE];
        self.stream.read_exact(&mut body_mac).await?;

        if self.macs.ingress.update_body(&padded) != body_mac {
            return Err(RlpxError::MacMismatch);
        }
        self.ingress_aes.apply_keystream(&mut padded);
        padded.truncate(frame_size);

        Ok((frame_header, padded))
    }
}
