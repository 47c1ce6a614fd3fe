//! Errors for the `guillotine-rlpx` crate. Framing errors are terminal: a
//! session that produced one is torn down, never resynchronized.

use thiserror::Error;

/// An error type for the 24-bit frame-size codec.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The frame size exceeds the 24-bit encoding limit.
    #[error("frame size exceeds the 24-bit limit")]
    InvalidFrameSize,
}

/// An error type for frame-header validation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameHeaderError {
    /// The advertised total packet size is zero or exceeds the cap.
    #[error("invalid total packet size")]
    InvalidTotalPacketSize,
    /// The frame is larger than the advertised total packet size.
    #[error("frame size exceeds total packet size")]
    FrameSizeExceedsTotalPacketSize,
}

/// An error type for decoding the RLP extension in `header[3..16]`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameHeaderDecodeError {
    /// The header-data bytes are not a well-formed RLP list with the
    /// mandatory capability id.
    #[error("malformed frame header data")]
    InvalidHeaderData,
    /// The RLP list carries elements beyond `total_packet_size`.
    #[error("unexpected trailing elements in frame header data")]
    ExtraHeaderElements,
    /// Validation of the decoded fields failed.
    #[error(transparent)]
    Header(#[from] FrameHeaderError),
}

/// An error type for the EIP-8 handshake packet framing.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePacketError {
    /// The packet is shorter than the 2-byte size prefix.
    #[error("handshake packet is missing its size prefix")]
    MissingSizePrefix,
    /// The size prefix advertises an empty ciphertext body.
    #[error("handshake packet has an empty ciphertext body")]
    EmptyCiphertextBody,
    /// The body length does not match the size prefix.
    #[error("handshake packet length does not match its size prefix")]
    InvalidPacketLength,
}

/// An error type for decoding decrypted EIP-8 handshake bodies.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeBodyDecodeError {
    /// The plaintext is not a well-formed RLP list.
    #[error("handshake body is not a well-formed RLP list")]
    InvalidRlpBody,
    /// A mandatory field is absent.
    #[error("handshake body is missing a required field")]
    MissingRequiredField,
    /// The signature field is not 65 bytes.
    #[error("handshake signature has an invalid length")]
    InvalidSignatureLength,
    /// A public-key field is not 64 bytes.
    #[error("handshake public key has an invalid length")]
    InvalidPublicKeyLength,
    /// A nonce field is not 32 bytes.
    #[error("handshake nonce has an invalid length")]
    InvalidNonceLength,
}

/// An error type for the snappy pre-decompression guard.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnappyError {
    /// The compressed payload carries no length varint.
    #[error("snappy payload is missing its length header")]
    MissingLengthHeader,
    /// The length varint exceeds five bytes.
    #[error("snappy length varint is too long")]
    LengthVarintTooLong,
    /// The advertised uncompressed length exceeds the 16 MiB cap.
    #[error("snappy uncompressed length exceeds the cap")]
    UncompressedLengthTooLarge,
    /// The compressed payload itself exceeds the 16 MiB cap.
    #[error("snappy compressed length exceeds the cap")]
    CompressedLengthTooLarge,
    /// Decompression failed after the guard admitted the payload.
    #[error("snappy decompression failed")]
    Decompress,
}

/// The top-level session error. Any variant observed on a live session is
/// unrecoverable; the connection is closed.
#[derive(Error, Debug)]
pub enum RlpxError {
    /// Frame-size codec failure.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// Frame-header validation failure.
    #[error(transparent)]
    FrameHeader(#[from] FrameHeaderError),
    /// Frame-header decode failure.
    #[error(transparent)]
    FrameHeaderDecode(#[from] FrameHeaderDecodeError),
    /// Handshake packet framing failure.
    #[error(transparent)]
    HandshakePacket(#[from] HandshakePacketError),
    /// Handshake body decode failure.
    #[error(transparent)]
    HandshakeBody(#[from] HandshakeBodyDecodeError),
    /// Snappy guard or decompression failure.
    #[error(transparent)]
    Snappy(#[from] SnappyError),
    /// A frame MAC did not verify.
    #[error("frame MAC mismatch")]
    MacMismatch,
    /// A continuation frame arrived outside of its chunked message.
    #[error("unexpected continuation frame")]
    UnexpectedContinuationFrame,
    /// The underlying stream failed.
    #[error("transport i/o error: {0}")]
    Io(#[from] std::io::Error),
}
