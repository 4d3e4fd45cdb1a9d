//! Per-packet codec: stream cipher composed with a Snappy-family compressor.
//!
//! `encode` applies the cipher then compresses; `decode` reverses that order.
//! This is the only channel-level transform applied to tunnel payloads —
//! packets are carried as complete IPv4 datagrams with no additional framing
//! (`spec.md` §4.2, §6).

use crate::cipher::Cipher;
use crate::error::CodecError;
use parking_lot::Mutex;

/// A codec bound to one shared secret.
///
/// The cipher instance is shared by `encode` and `decode` (`spec.md` §3:
/// "the cipher is shared by the encode and decode closures"). The pipeline
/// that owns a `Codec` is single-threaded per tunnel, but the mutex keeps the
/// type `Sync` so a relay worker pair can still hand one `Codec` to both
/// loops if a future caller needs that.
pub struct Codec {
    cipher: Mutex<Cipher>,
}

impl Codec {
    /// Construct a codec from a shared secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            cipher: Mutex::new(Cipher::new(secret)),
        }
    }

    /// Encode a plaintext IPv4 datagram for the wire: cipher, then compress.
    pub fn encode(&self, plain: &[u8]) -> Vec<u8> {
        let ciphertext = self.cipher.lock().encrypt(plain);
        let mut encoder = snap::raw::Encoder::new();
        encoder
            .compress_vec(&ciphertext)
            .expect("snap compression of a bounded buffer cannot fail")
    }

    /// Decode a wire payload back into a plaintext IPv4 datagram: decompress,
    /// then decipher.
    pub fn decode(&self, cipher_bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut decoder = snap::raw::Decoder::new();
        let ciphertext = decoder
            .decompress_vec(cipher_bytes)
            .map_err(|e| CodecError::Decompress(e.to_string()))?;
        Ok(self.cipher.lock().decrypt(&ciphertext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plaintext() {
        let codec = Codec::new(b"shared secret");
        let plain = b"\x45\x00\x00\x1ca b c d e f g h".to_vec();
        let encoded = codec.encode(&plain);
        let decoded = codec.decode(&encoded).unwrap();
        assert_eq!(decoded, plain);
    }

    #[test]
    fn zero_length_payload_round_trips() {
        let codec = Codec::new(b"secret");
        let encoded = codec.encode(&[]);
        let decoded = codec.decode(&encoded).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn garbage_input_fails_to_decompress() {
        let codec = Codec::new(b"secret");
        let garbage = vec![0xffu8; 16];
        assert!(matches!(
            codec.decode(&garbage),
            Err(CodecError::Decompress(_))
        ));
    }

    proptest::proptest! {
        #[test]
        fn round_trips_over_arbitrary_input(secret in proptest::collection::vec(proptest::num::u8::ANY, 1..32),
                                             plain in proptest::collection::vec(proptest::num::u8::ANY, 0..2048)) {
            let codec = Codec::new(&secret);
            let encoded = codec.encode(&plain);
            let decoded = codec.decode(&encoded).unwrap();
            proptest::prop_assert_eq!(decoded, plain);
        }
    }
}
