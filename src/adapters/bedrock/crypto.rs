/// Bedrock packet encryption
///
/// After ServerToClientHandshake both sides derive an AES-256 key from an
/// ECDH (P-384) exchange salted by the server. Each direction runs its own
/// CTR keystream and appends an 8-byte checksum bound to a send counter.

use aes::cipher::{KeyIvInit, StreamCipher};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use p384::pkcs8::DecodePublicKey;
use p384::{PublicKey, SecretKey};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::codec::ProtocolError;

type Aes256Ctr = ctr::Ctr32BE<aes::Aes256>;

const CHECKSUM_LEN: usize = 8;

/// Decode base64 in either alphabet, padded or not
pub fn decode_base64(input: &str) -> Result<Vec<u8>, ProtocolError> {
    STANDARD
        .decode(input)
        .or_else(|_| URL_SAFE_NO_PAD.decode(input.trim_end_matches('=')))
        .map_err(|e| ProtocolError::Handshake(format!("bad base64: {e}")))
}

#[derive(Deserialize)]
struct HandshakeHeader {
    x5u: String,
}

#[derive(Deserialize)]
struct HandshakeClaims {
    salt: String,
}

/// What the server sends in its handshake token
pub struct HandshakeParams {
    pub server_key: PublicKey,
    pub salt: Vec<u8>,
}

impl HandshakeParams {
    /// Read the server key and salt out of the handshake JWT.
    ///
    /// The token is signed by the same key it advertises, so the signature
    /// adds nothing for an offline client and is not verified.
    pub fn from_jwt(token: &str) -> Result<Self, ProtocolError> {
        let mut parts = token.split('.');
        let (Some(header), Some(claims)) = (parts.next(), parts.next()) else {
            return Err(ProtocolError::Handshake("malformed handshake token".into()));
        };

        let header: HandshakeHeader = serde_json::from_slice(&decode_base64(header)?)
            .map_err(|e| ProtocolError::Handshake(format!("bad token header: {e}")))?;
        let claims: HandshakeClaims = serde_json::from_slice(&decode_base64(claims)?)
            .map_err(|e| ProtocolError::Handshake(format!("bad token claims: {e}")))?;

        let server_key = PublicKey::from_public_key_der(&decode_base64(&header.x5u)?)
            .map_err(|e| ProtocolError::Handshake(format!("bad server key: {e}")))?;

        Ok(Self {
            server_key,
            salt: decode_base64(&claims.salt)?,
        })
    }
}

/// SHA-256(salt || ECDH shared secret)
pub fn derive_key(secret: &SecretKey, params: &HandshakeParams) -> [u8; 32] {
    let shared = p384::ecdh::diffie_hellman(secret.to_nonzero_scalar(), params.server_key.as_affine());
    let mut hasher = Sha256::new();
    hasher.update(&params.salt);
    hasher.update(shared.raw_secret_bytes());
    hasher.finalize().into()
}

struct Direction {
    cipher: Aes256Ctr,
    counter: u64,
}

/// Both directions of an encrypted session
pub struct PacketCipher {
    key: [u8; 32],
    send: Direction,
    recv: Direction,
}

impl PacketCipher {
    pub fn new(key: [u8; 32]) -> Self {
        let mut iv = [0u8; 16];
        iv[..12].copy_from_slice(&key[..12]);
        iv[15] = 2;

        let direction = || Direction {
            cipher: Aes256Ctr::new(&key.into(), &iv.into()),
            counter: 0,
        };

        Self {
            key,
            send: direction(),
            recv: direction(),
        }
    }

    fn checksum(&self, counter: u64, data: &[u8]) -> [u8; CHECKSUM_LEN] {
        let mut hasher = Sha256::new();
        hasher.update(counter.to_le_bytes());
        hasher.update(data);
        hasher.update(self.key);
        let digest = hasher.finalize();
        let mut out = [0u8; CHECKSUM_LEN];
        out.copy_from_slice(&digest[..CHECKSUM_LEN]);
        out
    }

    /// Append the checksum and encrypt in place
    pub fn encrypt(&mut self, data: &mut Vec<u8>) {
        let checksum = self.checksum(self.send.counter, data);
        self.send.counter += 1;
        data.extend_from_slice(&checksum);
        self.send.cipher.apply_keystream(data);
    }

    /// Decrypt in place, verify and strip the checksum
    pub fn decrypt(&mut self, data: &mut Vec<u8>) -> Result<(), ProtocolError> {
        if data.len() < CHECKSUM_LEN {
            return Err(ProtocolError::UnexpectedEof);
        }
        self.recv.cipher.apply_keystream(data);

        let body_len = data.len() - CHECKSUM_LEN;
        let expected = self.checksum(self.recv.counter, &data[..body_len]);
        self.recv.counter += 1;
        if data[body_len..] != expected {
            return Err(ProtocolError::ChecksumMismatch);
        }
        data.truncate(body_len);
        Ok(())
    }
}
