//! Per-direction nonce sequences.
//!
//! Each box stream direction starts from a nonce seeded by the handshake and
//! treats it as a 192-bit big-endian counter. Every seal or open advances it by
//! one, so a data frame consumes two values (header, body) and the termination
//! frame one. Sender and receiver advance in lockstep; a dropped or replayed
//! frame shows up as an authentication failure.

use secretstream_crypto::aead::{NONCE_SIZE, Nonce};

/// Monotonic nonce counter for one direction.
#[derive(Debug, Clone)]
pub struct NonceSequence {
    next: Nonce,
}

impl NonceSequence {
    /// Start a sequence at `seed`.
    #[must_use]
    pub fn new(seed: Nonce) -> Self {
        Self { next: seed }
    }

    /// Nonce the next operation will use.
    #[must_use]
    pub fn peek(&self) -> &Nonce {
        &self.next
    }

    /// Return the current nonce and step the counter.
    pub fn advance(&mut self) -> Nonce {
        let current = self.next;
        increment(self.next.as_bytes_mut());
        current
    }
}

/// Add one to a big-endian counter, wrapping at 2^192.
pub fn increment(bytes: &mut [u8; NONCE_SIZE]) {
    for byte in bytes.iter_mut().rev() {
        let (value, carry) = byte.overflowing_add(1);
        *byte = value;
        if !carry {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_returns_seed_first() {
        let seed = Nonce::from_bytes([3u8; NONCE_SIZE]);
        let mut seq = NonceSequence::new(seed);

        assert_eq!(seq.advance(), seed);
        assert_ne!(*seq.peek(), seed);
        assert_eq!(seq.peek().as_bytes()[NONCE_SIZE - 1], 4);
    }

    #[test]
    fn test_increment_carries() {
        let mut bytes = [0u8; NONCE_SIZE];
        bytes[NONCE_SIZE - 1] = 0xFF;
        bytes[NONCE_SIZE - 2] = 0xFF;

        increment(&mut bytes);

        assert_eq!(bytes[NONCE_SIZE - 1], 0);
        assert_eq!(bytes[NONCE_SIZE - 2], 0);
        assert_eq!(bytes[NONCE_SIZE - 3], 1);
    }

    #[test]
    fn test_increment_wraps() {
        let mut bytes = [0xFF; NONCE_SIZE];
        increment(&mut bytes);
        assert_eq!(bytes, [0u8; NONCE_SIZE]);
    }

    #[test]
    fn test_sequence_strictly_increases() {
        let mut bytes = [0u8; NONCE_SIZE];
        bytes[NONCE_SIZE - 1] = 0xF0;
        let mut seq = NonceSequence::new(Nonce::from_bytes(bytes));

        let mut previous = seq.advance();
        for _ in 0..1000 {
            let current = seq.advance();
            assert!(current > previous);
            previous = current;
        }
    }

    #[test]
    fn test_two_sequences_stay_in_lockstep() {
        let seed = Nonce::from_bytes([0x42; NONCE_SIZE]);
        let mut sender = NonceSequence::new(seed);
        let mut receiver = NonceSequence::new(seed);

        for _ in 0..64 {
            assert_eq!(sender.advance(), receiver.advance());
        }
    }
}
