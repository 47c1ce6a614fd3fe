//! The keccak256 MAC state pair authenticating RLPx frames.

use crate::{params::MAC_SIZE, HandshakeRole};
use aes::{
    cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit},
    Aes256,
};
use alloy_primitives::{Keccak256, B256};

/// One direction's MAC state: a running keccak256 sponge whose per-frame
/// updates are whitened with AES-ECB under the mac secret.
#[derive(Clone)]
pub struct MacState {
    cipher: Aes256,
    hasher: Keccak256,
}

impl core::fmt::Debug for MacState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MacState").finish_non_exhaustive()
    }
}

impl MacState {
    /// Creates a MAC state keyed by the session's mac secret.
    pub fn new(mac_secret: B256) -> Self {
        Self {
            cipher: Aes256::new(GenericArray::from_slice(mac_secret.as_slice())),
            hasher: Keccak256::new(),
        }
    }

    /// Absorbs raw bytes. Used only while seeding from the handshake.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Advances the state over an encrypted frame header, returning the
    /// 16-byte header MAC.
    pub fn update_header(&mut self, header_ciphertext: &[u8; MAC_SIZE]) -> [u8; MAC_SIZE] {
        let mut block = self.whitened_digest();
        for (out, byte) in block.iter_mut().zip(header_ciphertext) {
            *out ^= byte;
        }
        self.hasher.update(block);
        self.digest()
    }

    /// Advances the state over an encrypted frame body, returning the
    /// 16-byte body MAC.
    pub fn update_body(&mut self, body_ciphertext: &[u8]) -> [u8; MAC_SIZE] {
        self.hasher.update(body_ciphertext);
        let digest = self.digest();
        let mut block = self.whitened_digest();
        for (out, byte) in block.iter_mut().zip(&digest) {
            *out ^= byte;
        }
        self.hasher.update(block);
        self.digest()
    }

    /// The current truncated digest.
    pub fn digest(&self) -> [u8; MAC_SIZE] {
        let full = self.hasher.clone().finalize();
        let mut out = [0u8; MAC_SIZE];
        out.copy_from_slice(&full[..MAC_SIZE]);
        out
    }

    /// AES-ECB of the current truncated digest under the mac secret.
    fn whitened_digest(&self) -> [u8; MAC_SIZE] {
        let mut block = GenericArray::clone_from_slice(&self.digest());
        self.cipher.encrypt_block(&mut block);
        block.into()
    }
}

/// The ingress/egress MAC pair of a session.
#[derive(Debug, Clone)]
pub struct SessionMacs {
    /// Authenticates frames this side sends.
    pub egress: MacState,
    /// Authenticates frames this side receives.
    pub ingress: MacState,
}

impl SessionMacs {
    /// Seeds both MAC states from the handshake artifacts.
    ///
    /// The initiator's egress absorbs `mac_secret ⊕ recipient_nonce` then the
    /// `auth` packet, its ingress `mac_secret ⊕ initiator_nonce` then the
    /// `ack` packet. The recipient's assignments are swapped.
    pub fn seed(
        role: HandshakeRole,
        mac_secret: B256,
        initiator_nonce: B256,
        recipient_nonce: B256,
        auth: &[u8],
        ack: &[u8],
    ) -> Self {
        let mut auth_side = MacState::new(mac_secret);
        auth_side.update((mac_secret ^ recipient_nonce).as_slice());
        auth_side.update(auth);

        let mut ack_side = MacState::new(mac_secret);
        ack_side.update((mac_secret ^ initiator_nonce).as_slice());
        ack_side.update(ack);

        match role {
            HandshakeRole::Initiator => Self { egress: auth_side, ingress: ack_side },
            HandshakeRole::Recipient => Self { egress: ack_side, ingress: auth_side },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(role: HandshakeRole) -> SessionMacs {
        SessionMacs::seed(
            role,
            B256::repeat_byte(0x01),
            B256::repeat_byte(0x02),
            B256::repeat_byte(0x03),
            b"auth packet bytes",
            b"ack packet bytes",
        )
    }

    #[test]
    fn test_roles_mirror() {
        let initiator = seeded(HandshakeRole::Initiator);
        let recipient = seeded(HandshakeRole::Recipient);

        assert_eq!(initiator.egress.digest(), recipient.ingress.digest());
        assert_eq!(initiator.ingress.digest(), recipient.egress.digest());
        // The two directions are distinct states.
        assert_ne!(initiator.egress.digest(), initiator.ingress.digest());
    }

    #[test]
    fn test_frame_advance_stays_mirrored() {
        let mut initiator = seeded(HandshakeRole::Initiator);
        let mut recipient = seeded(HandshakeRole::Recipient);

        let header = [0x5A; 16];
        let sent = initiator.egress.update_header(&header);
        let expected = recipient.ingress.update_header(&header);
        assert_eq!(sent, expected);

        let body = vec![0xC3; 48];
        let sent = initiator.egress.update_body(&body);
        let expected = recipient.ingress.update_body(&body);
        assert_eq!(sent, expected);
    }

    #[test]
    fn test_tampered_header_diverges() {
        let mut a = seeded(HandshakeRole::Initiator);
        let mut b = seeded(HandshakeRole::Recipient);

        let mac_a = a.egress.update_header(&[0x00; 16]);
        let mac_b = b.ingress.update_header(&[0x01; 16]);
        assert_ne!(mac_a, mac_b);
    }

    #[test]
    fn test_seed_depends_on_every_input() {
        let base = seeded(HandshakeRole::Initiator);

        let other = SessionMacs::seed(
            HandshakeRole::Initiator,
            B256::repeat_byte(0x01),
            B256::repeat_byte(0x02),
            B256::repeat_byte(0x04),
            b"auth packet bytes",
            b"ack packet bytes",
        );
        assert_ne!(base.egress.digest(), other.egress.digest());
    }
}
