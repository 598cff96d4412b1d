//! Constant-time comparisons.
//!
//! Used wherever received authenticators are compared against computed ones.

use subtle::ConstantTimeEq;

/// Constant-time comparison of byte slices.
///
/// Returns `true` if slices are equal, `false` otherwise.
/// Execution time depends only on slice length, not content.
#[must_use]
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(b).into()
}

/// Timing-safe 32-byte array comparison.
#[must_use]
#[inline(never)]
pub fn verify_32(a: &[u8; 32], b: &[u8; 32]) -> bool {
    ct_eq(a, b)
}

/// Constant-time check that every byte is zero.
#[must_use]
pub fn is_all_zero(data: &[u8]) -> bool {
    let acc = data.iter().fold(0u8, |acc, &b| acc | b);
    acc.ct_eq(&0).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ct_eq() {
        assert!(ct_eq(b"hello", b"hello"));
        assert!(!ct_eq(b"hello", b"world"));
        assert!(!ct_eq(b"hello", b"hello!"));
        assert!(ct_eq(b"", b""));
    }

    #[test]
    fn test_verify_32() {
        let a = [7u8; 32];
        let mut b = a;
        assert!(verify_32(&a, &b));

        b[31] = 8;
        assert!(!verify_32(&a, &b));
    }

    #[test]
    fn test_is_all_zero() {
        assert!(is_all_zero(&[0u8; 18]));
        assert!(is_all_zero(&[]));

        let mut data = [0u8; 18];
        data[17] = 1;
        assert!(!is_all_zero(&data));
    }
}
