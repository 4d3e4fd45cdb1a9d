//! RC4-family stream cipher.
//!
//! Key schedule and keystream generation follow the classic algorithm
//! byte-for-byte so ciphertext stays compatible with existing peers; see
//! `spec.md` §4.1. A single instance is shared by both tunnel directions
//! (§4.1, §9), so it is not safe to reuse across independent streams.

/// Stateful RC4 cipher instance.
///
/// `encrypt` and `decrypt` are the same operation (XOR with the keystream)
/// and both advance the internal counters, matching
/// `kale::arcfour::Cipher` in the reference implementation.
pub struct Cipher {
    state: [u8; 256],
    i: u8,
    j: u8,
}

impl Cipher {
    /// Derive a cipher instance from a shared-secret key.
    ///
    /// `key` must be non-empty.
    pub fn new(key: &[u8]) -> Self {
        assert!(!key.is_empty(), "RC4 key must not be empty");
        let mut state = [0u8; 256];
        for (i, s) in state.iter_mut().enumerate() {
            *s = i as u8;
        }
        let mut j: u8 = 0;
        for i in 0..256usize {
            j = j
                .wrapping_add(state[i])
                .wrapping_add(key[i % key.len()]);
            state.swap(i, j as usize);
        }
        Self { state, i: 0, j: 0 }
    }

    /// XOR `buf` with the next `buf.len()` keystream bytes, in place.
    #[inline]
    fn apply_keystream(&mut self, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            self.i = self.i.wrapping_add(1);
            self.j = self.j.wrapping_add(self.state[self.i as usize]);
            self.state.swap(self.i as usize, self.j as usize);
            let k = self.state[self.i as usize].wrapping_add(self.state[self.j as usize]);
            *byte ^= self.state[k as usize];
        }
    }

    /// Encrypt `plain` into a freshly-allocated ciphertext of the same length.
    pub fn encrypt(&mut self, plain: &[u8]) -> Vec<u8> {
        let mut out = plain.to_vec();
        self.apply_keystream(&mut out);
        out
    }

    /// Decrypt `cipher_bytes` into a freshly-allocated plaintext of the same
    /// length. Identical to `encrypt` — RC4 is an involution — but kept as a
    /// distinct method so call sites read as encode/decode pairs.
    pub fn decrypt(&mut self, cipher_bytes: &[u8]) -> Vec<u8> {
        self.encrypt(cipher_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_is_identity_with_fresh_instances() {
        let key = [0xFFu8, 0xBB, 0xCC, 0xDD];
        let plain = b"Reorders the elements in the given range...".to_vec();

        let mut enc = Cipher::new(&key);
        let cipher_bytes = enc.encrypt(&plain);

        let mut dec = Cipher::new(&key);
        let round_tripped = dec.decrypt(&cipher_bytes);

        assert_eq!(round_tripped, plain);
    }

    #[test]
    fn shared_instance_decrypts_its_own_stream_in_order() {
        // §4.1: one instance may serve both directions, but only if the
        // byte streams are consumed in the same order they were produced.
        let key = b"shared-secret";
        let mut cipher = Cipher::new(key);

        let a = cipher.encrypt(b"first message");
        let b = cipher.encrypt(b"second message");

        let mut decoder = Cipher::new(key);
        assert_eq!(decoder.decrypt(&a), b"first message");
        assert_eq!(decoder.decrypt(&b), b"second message");
    }

    #[test]
    fn empty_buffer_round_trips() {
        let mut cipher = Cipher::new(b"k");
        assert_eq!(cipher.encrypt(&[]), Vec::<u8>::new());
    }

    proptest::proptest! {
        #[test]
        fn involution_over_arbitrary_input(key in proptest::collection::vec(proptest::num::u8::ANY, 1..32),
                                            plain in proptest::collection::vec(proptest::num::u8::ANY, 0..512)) {
            let mut enc = Cipher::new(&key);
            let cipher_bytes = enc.encrypt(&plain);
            let mut dec = Cipher::new(&key);
            let round_tripped = dec.decrypt(&cipher_bytes);
            proptest::prop_assert_eq!(round_tripped, plain);
        }
    }
}
