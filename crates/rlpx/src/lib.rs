//! RLPx / devp2p transport framing for the execution client.
//!
//! The codecs in this crate are pure and synchronous: the 24-bit frame-size
//! codec, the frame header-data codec with chunking metadata, the EIP-8
//! handshake packet and body codecs, the keccak MAC state pair, and the
//! snappy pre-decompression guard. [Session] composes them into an encrypted,
//! MAC-authenticated framed transport over any tokio stream.

mod errors;
pub use errors::{
    FrameError, FrameHeaderDecodeError, FrameHeaderError, HandshakeBodyDecodeError,
    HandshakePacketError, RlpxError, SnappyError,
};

mod params;
pub use params::{
    AES_BLOCK_SIZE, DEFAULT_FRAGMENT_SIZE, HEADER_SIZE, MAC_SIZE, MAX_FRAME_SIZE,
    MAX_UNCOMPRESSED_SIZE,
};

mod frame;
pub use frame::{decode_frame_size_24, encode_frame_size_24, FrameHeader};

mod handshake;
pub use handshake::{AckBody, AuthBody, HandshakePacket, HandshakeRole};

mod mac;
pub use mac::{MacState, SessionMacs};

mod snappy;
pub use snappy::{snappy_compress, snappy_decompress, SnappyGuard};

mod session;
pub use session::{Session, SessionSecrets};
