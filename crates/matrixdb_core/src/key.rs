//! Map key trait and hashing.

use crate::error::{CoreError, CoreResult};
use matrixdb_codec::Value;

/// A key that can be stored in a persistent map.
///
/// Keys need a total order (bucket skip lists keep entries sorted), a
/// stable byte encoding (keys are persisted inline in entry nodes, and
/// the bucket a key lands in is derived from a hash of these bytes),
/// and a loosely-typed [`Value`] projection for the dictionary view.
///
/// Incomparable keys cannot exist here by construction: the `Ord` bound
/// makes every pair of keys of one map comparable at the type level.
pub trait MapKey: Clone + Ord + Send + Sync + 'static {
    /// Serializes the key to bytes. Must be deterministic: the digit
    /// path of a key is derived from these bytes and persisted into the
    /// trie layout.
    fn encode(&self) -> Vec<u8>;

    /// Deserializes a key from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidKey`] if the bytes are not a valid
    /// encoding of this key type.
    fn decode(bytes: &[u8]) -> CoreResult<Self>;

    /// Projects the key into a dynamic [`Value`].
    fn to_value(&self) -> Value;
}

impl MapKey for i64 {
    fn encode(&self) -> Vec<u8> {
        // Flip the sign bit so the byte order matches numeric order.
        ((*self as u64) ^ (1 << 63)).to_be_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> CoreResult<Self> {
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|_| CoreError::invalid_key("expected 8 bytes for i64"))?;
        Ok((u64::from_be_bytes(arr) ^ (1 << 63)) as i64)
    }

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }
}

impl MapKey for u64 {
    fn encode(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> CoreResult<Self> {
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|_| CoreError::invalid_key("expected 8 bytes for u64"))?;
        Ok(u64::from_be_bytes(arr))
    }

    fn to_value(&self) -> Value {
        Value::Bytes(self.to_be_bytes().to_vec())
    }
}

impl MapKey for String {
    fn encode(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> CoreResult<Self> {
        String::from_utf8(bytes.to_vec())
            .map_err(|_| CoreError::invalid_key("invalid UTF-8 in string key"))
    }

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl MapKey for Vec<u8> {
    fn encode(&self) -> Vec<u8> {
        self.clone()
    }

    fn decode(bytes: &[u8]) -> CoreResult<Self> {
        Ok(bytes.to_vec())
    }

    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

/// Computes the stable 64-bit hash of a key's encoded bytes.
///
/// FNV-1a. The hash feeds the persisted trie layout, so it must never
/// change and must not depend on process-seeded hashers.
#[must_use]
pub fn hash_key(bytes: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Extracts the first `depth` decimal digits of a hash, most
/// significant first.
///
/// The hash is treated as a zero-padded 20-digit decimal number so
/// every hash yields a full path regardless of magnitude.
#[must_use]
pub(crate) fn digit_path(hash: u64, depth: u8) -> Vec<u8> {
    const POW10: [u64; 20] = [
        1,
        10,
        100,
        1_000,
        10_000,
        100_000,
        1_000_000,
        10_000_000,
        100_000_000,
        1_000_000_000,
        10_000_000_000,
        100_000_000_000,
        1_000_000_000_000,
        10_000_000_000_000,
        100_000_000_000_000,
        1_000_000_000_000_000,
        10_000_000_000_000_000,
        100_000_000_000_000_000,
        1_000_000_000_000_000_000,
        10_000_000_000_000_000_000,
    ];

    (0..depth)
        .map(|i| ((hash / POW10[19 - i as usize]) % 10) as u8)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i64_roundtrip_and_order() {
        for v in [i64::MIN, -1, 0, 1, 42, i64::MAX] {
            let bytes = v.encode();
            assert_eq!(i64::decode(&bytes).unwrap(), v);
        }

        // Byte order matches numeric order
        assert!((-5i64).encode() < 3i64.encode());
        assert!(i64::MIN.encode() < 0i64.encode());
        assert!(0i64.encode() < i64::MAX.encode());
    }

    #[test]
    fn u64_roundtrip() {
        for v in [0u64, 1, u64::MAX] {
            assert_eq!(u64::decode(&v.encode()).unwrap(), v);
        }
    }

    #[test]
    fn string_roundtrip() {
        let key = "hello".to_string();
        assert_eq!(String::decode(&key.encode()).unwrap(), key);
    }

    #[test]
    fn string_rejects_bad_utf8() {
        assert!(String::decode(&[0xFF, 0xFE]).is_err());
    }

    #[test]
    fn bytes_roundtrip() {
        let key = vec![1u8, 2, 3];
        assert_eq!(Vec::<u8>::decode(&key.encode()).unwrap(), key);
    }

    #[test]
    fn i64_decode_wrong_len_fails() {
        assert!(i64::decode(&[1, 2, 3]).is_err());
    }

    #[test]
    fn hash_is_stable() {
        // Pinned: this value is part of the persisted layout.
        assert_eq!(hash_key(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(hash_key(b"a"), hash_key(b"a"));
        assert_ne!(hash_key(b"a"), hash_key(b"b"));
    }

    #[test]
    fn digit_path_is_msd_first() {
        // 20-digit rendering of 123 is 00000000000000000123
        let path = digit_path(123, 20);
        assert_eq!(&path[..17], &[0u8; 17]);
        assert_eq!(&path[17..], &[1, 2, 3]);
    }

    #[test]
    fn digit_path_depth_prefix() {
        let full = digit_path(u64::MAX, 20);
        let short = digit_path(u64::MAX, 3);
        assert_eq!(&full[..3], &short[..]);
        assert!(short.iter().all(|d| *d < 10));
    }
}
