//! The 24-bit frame-size codec and the frame header-data codec.
//!
//! After decryption, `header[0..3]` is the frame size as a big-endian 24-bit
//! integer and `header[3..16]` is `rlp([capability_id, context_id,
//! total_packet_size?])` followed by zero padding.

use crate::{
    errors::{FrameError, FrameHeaderDecodeError, FrameHeaderError},
    params::{HEADER_SIZE, MAX_FRAME_SIZE},
};
use alloy_rlp::{Decodable, Encodable, Header as RlpHeader};

/// The number of bytes available for the RLP header extension.
const HEADER_DATA_SIZE: usize = HEADER_SIZE - 3;

/// Encodes a frame size as a 3-byte big-endian integer. Total over
/// `[0, 0xFFFFFF]`; anything larger is rejected.
pub const fn encode_frame_size_24(size: usize) -> Result<[u8; 3], FrameError> {
    if size > MAX_FRAME_SIZE {
        return Err(FrameError::InvalidFrameSize);
    }
    Ok([(size >> 16) as u8, (size >> 8) as u8, size as u8])
}

/// Decodes a 3-byte big-endian frame size. The inverse of
/// [encode_frame_size_24] over the valid domain.
pub const fn decode_frame_size_24(bytes: [u8; 3]) -> usize {
    ((bytes[0] as usize) << 16) | ((bytes[1] as usize) << 8) | bytes[2] as usize
}

/// A decoded frame header with its chunking metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// The size of this frame's body, before padding.
    pub frame_size: usize,
    /// The capability id. Mandatory on the wire, ignored for forward
    /// compatibility.
    pub capability_id: u64,
    /// The multiplexing context id, when present.
    pub context_id: Option<u64>,
    /// The effective total packet size: the advertised value for a chunked
    /// first frame, the frame size otherwise.
    pub total_packet_size: usize,
    /// Whether the frame belongs to a chunked (multi-frame) message.
    pub is_chunked: bool,
    /// Whether the frame opens its message. Continuation frames carry only a
    /// context id.
    pub is_first_chunk: bool,
}

impl FrameHeader {
    /// Decodes the header extension in `header[3..16]` and derives the
    /// chunking metadata.
    pub fn decode(
        frame_size: usize,
        header_data: &[u8],
        max_packet_size: usize,
    ) -> Result<Self, FrameHeaderDecodeError> {
        let mut buf = header_data;
        let rlp_header =
            RlpHeader::decode(&mut buf).map_err(|_| FrameHeaderDecodeError::InvalidHeaderData)?;
        if !rlp_header.list || rlp_header.payload_length > buf.len() {
            return Err(FrameHeaderDecodeError::InvalidHeaderData);
        }
        let mut payload = &buf[..rlp_header.payload_length];

        // The capability id is mandatory; its value is not interpreted.
        let capability_id = u64::decode(&mut payload)
            .map_err(|_| FrameHeaderDecodeError::InvalidHeaderData)?;

        let context_id = if payload.is_empty() {
            None
        } else {
            Some(
                u64::decode(&mut payload)
                    .map_err(|_| FrameHeaderDecodeError::InvalidHeaderData)?,
            )
        };

        let advertised_total = if payload.is_empty() {
            None
        } else {
            Some(
                u64::decode(&mut payload)
                    .map_err(|_| FrameHeaderDecodeError::InvalidHeaderData)? as usize,
            )
        };

        // Any leftover bytes inside the list are an error.
        if !payload.is_empty() {
            return Err(FrameHeaderDecodeError::ExtraHeaderElements);
        }

        if let Some(total) = advertised_total {
            if total == 0 || total > max_packet_size {
                return Err(FrameHeaderError::InvalidTotalPacketSize.into());
            }
            if frame_size > total {
                return Err(FrameHeaderError::FrameSizeExceedsTotalPacketSize.into());
            }
        }

        let is_chunked =
            advertised_total.is_some() || context_id.is_some_and(|context| context != 0);
        let is_first_chunk = advertised_total.is_some() || !is_chunked;

        Ok(Self {
            frame_size,
            capability_id,
            context_id,
            total_packet_size: advertised_total.unwrap_or(frame_size),
            is_chunked,
            is_first_chunk,
        })
    }

    /// Encodes header-extension bytes: the RLP list zero-padded to 13 bytes.
    /// Non-chunked frames must pass [None] for `total_packet_size`;
    /// continuation frames carry only the context id.
    pub fn encode_header_data(
        capability_id: u64,
        context_id: Option<u64>,
        total_packet_size: Option<usize>,
    ) -> Result<[u8; HEADER_DATA_SIZE], FrameError> {
        let mut payload = Vec::with_capacity(HEADER_DATA_SIZE);
        capability_id.encode(&mut payload);
        if let Some(context_id) = context_id {
            context_id.encode(&mut payload);
        }
        if let Some(total) = total_packet_size {
            (total as u64).encode(&mut payload);
        }

        let mut out = Vec::with_capacity(HEADER_DATA_SIZE);
        RlpHeader { list: true, payload_length: payload.len() }.encode(&mut out);
        out.extend_from_slice(&payload);
        if out.len() > HEADER_DATA_SIZE {
            return Err(FrameError::InvalidFrameSize);
        }

        let mut header_data = [0u8; HEADER_DATA_SIZE];
        header_data[..out.len()].copy_from_slice(&out);
        Ok(header_data)
    }
}
