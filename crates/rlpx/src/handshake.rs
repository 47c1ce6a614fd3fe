//! EIP-8 handshake packet framing and body codecs.
//!
//! Packets are `size_prefix(2-byte BE) || encrypted_body`. Body decoding is
//! forward-compatible: version mismatches, extra list items, and trailing
//! bytes after the top-level list are all tolerated. Field lengths are not:
//! a signature is 65 bytes, a public key 64, a nonce 32.

use crate::errors::{HandshakeBodyDecodeError, HandshakePacketError};
use alloy_primitives::{Bytes, B256};
use alloy_rlp::{Decodable, Encodable, Header as RlpHeader};

/// The fixed length of a recoverable handshake signature.
const SIGNATURE_LENGTH: usize = 65;

/// The fixed length of an uncompressed public key, sans prefix byte.
const PUBLIC_KEY_LENGTH: usize = 64;

/// The handshake protocol version this client speaks.
const HANDSHAKE_VSN: u64 = 4;

/// The role a peer plays in a session. Fixed at session creation; determines
/// the ingress/egress MAC assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeRole {
    /// The dialing side: sends `auth`, receives `ack`.
    Initiator,
    /// The listening side: receives `auth`, sends `ack`.
    Recipient,
}

/// A size-prefixed handshake packet (`auth` or `ack`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakePacket {
    /// The encrypted packet body.
    pub body: Bytes,
}

impl HandshakePacket {
    /// Decodes a packet, checking the 2-byte big-endian size prefix against
    /// the body.
    pub fn decode(packet: &[u8]) -> Result<Self, HandshakePacketError> {
        if packet.len() < 2 {
            return Err(HandshakePacketError::MissingSizePrefix);
        }
        let size = u16::from_be_bytes([packet[0], packet[1]]) as usize;
        if size == 0 {
            return Err(HandshakePacketError::EmptyCiphertextBody);
        }
        if packet.len() - 2 != size {
            return Err(HandshakePacketError::InvalidPacketLength);
        }
        Ok(Self { body: Bytes::copy_from_slice(&packet[2..]) })
    }

    /// Encodes the packet with its size prefix.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.body.len());
        out.extend_from_slice(&(self.body.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.body);
        out
    }
}

/// The decrypted `auth` body:
/// `[signature, initiator_pubkey, initiator_nonce, auth_vsn, ...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthBody {
    /// The recoverable signature over the static shared secret.
    pub signature: [u8; SIGNATURE_LENGTH],
    /// The initiator's uncompressed static public key.
    pub initiator_pubkey: [u8; PUBLIC_KEY_LENGTH],
    /// The initiator's handshake nonce.
    pub initiator_nonce: B256,
    /// The advertised auth version. Mismatches are tolerated.
    pub auth_vsn: u64,
}

impl AuthBody {
    /// Decodes an `auth` body from decrypted plaintext.
    pub fn decode(plaintext: &[u8]) -> Result<Self, HandshakeBodyDecodeError> {
        let mut fields = BodyFields::open(plaintext)?;
        let signature = fields.fixed::<SIGNATURE_LENGTH>(
            HandshakeBodyDecodeError::InvalidSignatureLength,
        )?;
        let initiator_pubkey =
            fields.fixed::<PUBLIC_KEY_LENGTH>(HandshakeBodyDecodeError::InvalidPublicKeyLength)?;
        let initiator_nonce =
            fields.fixed::<32>(HandshakeBodyDecodeError::InvalidNonceLength)?.into();
        let auth_vsn = fields.version()?;
        Ok(Self { signature, initiator_pubkey, initiator_nonce, auth_vsn })
    }

    /// Encodes the body as the 4-field RLP list.
    pub fn encode(&self) -> Vec<u8> {
        encode_body(&[
            &self.signature[..],
            &self.initiator_pubkey[..],
            self.initiator_nonce.as_slice(),
        ])
    }
}

/// The decrypted `ack` body:
/// `[recipient_ephemeral_pubkey, recipient_nonce, ack_vsn, ...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckBody {
    /// The recipient's uncompressed ephemeral public key.
    pub recipient_ephemeral_pubkey: [u8; PUBLIC_KEY_LENGTH],
    /// The recipient's handshake nonce.
    pub recipient_nonce: B256,
    /// The advertised ack version. Mismatches are tolerated.
    pub ack_vsn: u64,
}

impl AckBody {
    /// Decodes an `ack` body from decrypted plaintext.
    pub fn decode(plaintext: &[u8]) -> Result<Self, HandshakeBodyDecodeError> {
        let mut fields = BodyFields::open(plaintext)?;
        let recipient_ephemeral_pubkey =
            fields.fixed::<PUBLIC_KEY_LENGTH>(HandshakeBodyDecodeError::InvalidPublicKeyLength)?;
        let recipient_nonce =
            fields.fixed::<32>(HandshakeBodyDecodeError::InvalidNonceLength)?.into();
        let ack_vsn = fields.version()?;
        Ok(Self { recipient_ephemeral_pubkey, recipient_nonce, ack_vsn })
    }

    /// Encodes the body as the 3-field RLP list.
    pub fn encode(&self) -> Vec<u8> {
        encode_body(&[&self.recipient_ephemeral_pubkey[..], self.recipient_nonce.as_slice()])
    }
}

/// A cursor over the fields of a handshake body list.
struct BodyFields<'a> {
    payload: &'a [u8],
}

impl<'a> BodyFields<'a> {
    /// Opens the top-level list. Bytes trailing the list are tolerated.
    fn open(plaintext: &'a [u8]) -> Result<Self, HandshakeBodyDecodeError> {
        let mut buf = plaintext;
        let rlp_header =
            RlpHeader::decode(&mut buf).map_err(|_| HandshakeBodyDecodeError::InvalidRlpBody)?;
        if !rlp_header.list || rlp_header.payload_length > buf.len() {
            return Err(HandshakeBodyDecodeError::InvalidRlpBody);
        }
        Ok(Self { payload: &buf[..rlp_header.payload_length] })
    }

    /// Decodes the next field as a byte string of exactly `N` bytes.
    fn fixed<const N: usize>(
        &mut self,
        length_error: HandshakeBodyDecodeError,
    ) -> Result<[u8; N], HandshakeBodyDecodeError> {
        if self.payload.is_empty() {
            return Err(HandshakeBodyDecodeError::MissingRequiredField);
        }
        let bytes = Bytes::decode(&mut self.payload)
            .map_err(|_| HandshakeBodyDecodeError::InvalidRlpBody)?;
        let mut out = [0u8; N];
        if bytes.len() != N {
            return Err(length_error);
        }
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    /// Decodes the version field leniently: any byte-string content is
    /// accepted and folded big-endian, since version mismatches are tolerated.
    fn version(&mut self) -> Result<u64, HandshakeBodyDecodeError> {
        if self.payload.is_empty() {
            return Err(HandshakeBodyDecodeError::MissingRequiredField);
        }
        let bytes = Bytes::decode(&mut self.payload)
            .map_err(|_| HandshakeBodyDecodeError::InvalidRlpBody)?;
        Ok(bytes.iter().fold(0u64, |acc, byte| acc.wrapping_shl(8) | u64::from(*byte)))
    }
}

/// Encodes `fields` plus the version as an RLP list.
fn encode_body(fields: &[&[u8]]) -> Vec<u8> {
    let payload_length =
        fields.iter().map(|field| field.length()).sum::<usize>() + HANDSHAKE_VSN.length();
    let mut out = Vec::with_capacity(payload_length + 3);
    RlpHeader { list: true, payload_length }.encode(&mut out);
    for field in fields {
        field.encode(&mut out);
    }
    HANDSHAKE_VSN.encode(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_size_prefix() {
        let packet = HandshakePacket::decode(&[0x00, 0x03, 0xAA, 0xBB, 0xCC]).unwrap();
        assert_eq!(packet.body.as_ref(), &[0xAA, 0xBB, 0xCC]);

        assert_eq!(
            HandshakePacket::decode(&[0x00, 0x03, 0xAA, 0xBB]),
            Err(HandshakePacketError::InvalidPacketLength)
        );
        assert_eq!(
            HandshakePacket::decode(&[0x00, 0x00]),
            Err(HandshakePacketError::EmptyCiphertextBody)
        );
        assert_eq!(
            HandshakePacket::decode(&[0x00]),
            Err(HandshakePacketError::MissingSizePrefix)
        );
        assert_eq!(HandshakePacket::decode(&[]), Err(HandshakePacketError::MissingSizePrefix));
    }

    #[test]
    fn test_packet_round_trip() {
        let packet = HandshakePacket { body: Bytes::from_static(&[1, 2, 3, 4, 5]) };
        let encoded = packet.encode();
        assert_eq!(&encoded[..2], &[0x00, 0x05]);
        assert_eq!(HandshakePacket::decode(&encoded).unwrap(), packet);
    }

    fn sample_auth() -> AuthBody {
        AuthBody {
            signature: [0x11; 65],
            initiator_pubkey: [0x22; 64],
            initiator_nonce: B256::repeat_byte(0x33),
            auth_vsn: 4,
        }
    }

    #[test]
    fn test_auth_body_round_trip() {
        let auth = sample_auth();
        let decoded = AuthBody::decode(&auth.encode()).unwrap();
        assert_eq!(decoded, auth);
    }

    #[test]
    fn test_ack_body_round_trip() {
        let ack = AckBody {
            recipient_ephemeral_pubkey: [0x44; 64],
            recipient_nonce: B256::repeat_byte(0x55),
            ack_vsn: 4,
        };
        let decoded = AckBody::decode(&ack.encode()).unwrap();
        assert_eq!(decoded, ack);
    }

    #[test]
    fn test_forward_compatibility() {
        // Extra list items and trailing bytes after the list are tolerated,
        // and the recovered required fields are unchanged.
        let auth = sample_auth();

        let mut payload = Vec::new();
        auth.signature.as_slice().encode(&mut payload);
        auth.initiator_pubkey.as_slice().encode(&mut payload);
        auth.initiator_nonce.as_slice().encode(&mut payload);
        // An unknown future version.
        99u64.encode(&mut payload);
        // Two extra items a future protocol version might add.
        b"future-field".as_slice().encode(&mut payload);
        7u64.encode(&mut payload);

        let mut encoded = Vec::new();
        RlpHeader { list: true, payload_length: payload.len() }.encode(&mut encoded);
        encoded.extend_from_slice(&payload);
        // Trailing garbage after the top-level list.
        encoded.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

        let decoded = AuthBody::decode(&encoded).unwrap();
        assert_eq!(decoded.signature, auth.signature);
        assert_eq!(decoded.initiator_pubkey, auth.initiator_pubkey);
        assert_eq!(decoded.initiator_nonce, auth.initiator_nonce);
        assert_eq!(decoded.auth_vsn, 99);
    }

    #[test]
    fn test_strict_field_lengths() {
        let auth = sample_auth();

        // A 64-byte signature.
        let mut payload = Vec::new();
        [0x11u8; 64].as_slice().encode(&mut payload);
        auth.initiator_pubkey.as_slice().encode(&mut payload);
        auth.initiator_nonce.as_slice().encode(&mut payload);
        4u64.encode(&mut payload);
        let mut encoded = Vec::new();
        RlpHeader { list: true, payload_length: payload.len() }.encode(&mut encoded);
        encoded.extend_from_slice(&payload);
        assert_eq!(
            AuthBody::decode(&encoded),
            Err(HandshakeBodyDecodeError::InvalidSignatureLength)
        );

        // A 31-byte nonce.
        let mut payload = Vec::new();
        auth.signature.as_slice().encode(&mut payload);
        auth.initiator_pubkey.as_slice().encode(&mut payload);
        [0x33u8; 31].as_slice().encode(&mut payload);
        4u64.encode(&mut payload);
        let mut encoded = Vec::new();
        RlpHeader { list: true, payload_length: payload.len() }.encode(&mut encoded);
        encoded.extend_from_slice(&payload);
        assert_eq!(
            AuthBody::decode(&encoded),
            Err(HandshakeBodyDecodeError::InvalidNonceLength)
        );

        // A 63-byte ephemeral key in an ack.
        let mut payload = Vec::new();
        [0x44u8; 63].as_slice().encode(&mut payload);
        B256::repeat_byte(0x55).as_slice().encode(&mut payload);
        4u64.encode(&mut payload);
        let mut encoded = Vec::new();
        RlpHeader { list: true, payload_length: payload.len() }.encode(&mut encoded);
        encoded.extend_from_slice(&payload);
        assert_eq!(
            AckBody::decode(&encoded),
            Err(HandshakeBodyDecodeError::InvalidPublicKeyLength)
        );
    }

    #[test]
    fn test_missing_fields() {
        // Only a signature: every later field is missing.
        let mut payload = Vec::new();
        [0x11u8; 65].as_slice().encode(&mut payload);
        let mut encoded = Vec::new();
        RlpHeader { list: true, payload_length: payload.len() }.encode(&mut encoded);
        encoded.extend_from_slice(&payload);
        assert_eq!(
            AuthBody::decode(&encoded),
            Err(HandshakeBodyDecodeError::MissingRequiredField)
        );

        // Not a list at all.
        let mut encoded = Vec::new();
        b"not a list".as_slice().encode(&mut encoded);
        assert_eq!(AuthBody::decode(&encoded), Err(HandshakeBodyDecodeError::InvalidRlpBody));
    }
}
