//! Framing parameters for the RLPx transport.

/// The size of a frame header in bytes.
pub const HEADER_SIZE: usize = 16;

/// The size of a frame MAC in bytes.
pub const MAC_SIZE: usize = 16;

/// The AES block size; frame bodies are zero-padded to a multiple of this.
pub const AES_BLOCK_SIZE: usize = 16;

/// The largest frame size the 24-bit length encoding can carry.
pub const MAX_FRAME_SIZE: usize = 0xFF_FF_FF;

/// The outbound fragmentation target: larger messages are split into chunked
/// frames of at most this many bytes.
pub const DEFAULT_FRAGMENT_SIZE: usize = 1024;

/// The cap on both compressed and uncompressed snappy payload sizes.
pub const MAX_UNCOMPRESSED_SIZE: usize = 16 * 1024 * 1024;
