//! Multi-algorithm hashing of a byte stream.
//!
//! Expected digests travel with a fetch as a [`HashSpec`]. While the data is
//! streamed through a [`MultiHashReader`] every selected algorithm is updated
//! in one pass; the resulting set must match the expected set exactly.

use std::fmt;
use std::io::{self, Read};

use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use thiserror::Error;

/// Supported digest algorithms.
///
/// Bitmask values are stable and leave room for algorithms this crate does
/// not compute (bit 2 was MD5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HashType {
    /// SHA-1, 20-byte digest.
    Sha1,
    /// SHA-256, 32-byte digest.
    Sha256,
    /// SHA-384, 48-byte digest.
    Sha384,
    /// SHA-512, 64-byte digest.
    Sha512,
}

impl HashType {
    /// Every supported algorithm, in bitmask order.
    pub const ALL: [Self; 4] = [Self::Sha1, Self::Sha256, Self::Sha384, Self::Sha512];

    /// Bit identifying this algorithm in a selection mask.
    #[must_use]
    pub const fn bitmask(self) -> u32 {
        match self {
            Self::Sha1 => 1,
            Self::Sha256 => 4,
            Self::Sha384 => 8,
            Self::Sha512 => 16,
        }
    }

    /// Digest length in bytes.
    #[must_use]
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Lowercase name, as used on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Algorithms selected by `mask`, in bitmask order.
    pub fn from_bitmask(mask: u32) -> impl Iterator<Item = Self> {
        Self::ALL
            .into_iter()
            .filter(move |t| mask & t.bitmask() != 0)
    }
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Errors building a [`HashSpec`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashSpecError {
    /// The same algorithm appeared twice.
    #[error("duplicate {0} digest")]
    DuplicateHashType(HashType),

    /// A digest had the wrong length for its algorithm.
    #[error("{hash_type} digest must be {expected} bytes, got {actual}")]
    WrongDigestLength {
        /// Algorithm of the digest.
        hash_type: HashType,
        /// Length the algorithm produces.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },

    /// A digest was not valid hex.
    #[error("invalid {hash_type} hex digest: {reason}")]
    InvalidHex {
        /// Algorithm of the digest.
        hash_type: HashType,
        /// Decoder message.
        reason: String,
    },
}

/// One digest of one algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashResult {
    /// Algorithm that produced the digest.
    pub hash_type: HashType,
    /// Raw digest bytes.
    pub digest: Vec<u8>,
}

impl HashResult {
    /// Wrap a digest.
    #[must_use]
    pub fn new(hash_type: HashType, digest: Vec<u8>) -> Self {
        Self { hash_type, digest }
    }

    /// Parse a hex digest.
    ///
    /// # Errors
    ///
    /// Returns [`HashSpecError::InvalidHex`] if `hex_str` is not hex.
    pub fn from_hex(hash_type: HashType, hex_str: &str) -> Result<Self, HashSpecError> {
        let digest = hex::decode(hex_str).map_err(|e| HashSpecError::InvalidHex {
            hash_type,
            reason: e.to_string(),
        })?;
        Ok(Self::new(hash_type, digest))
    }

    /// Digest as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.digest)
    }
}

impl fmt::Display for HashResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hash_type, self.to_hex())
    }
}

/// Format a digest list for log and error messages.
pub(crate) fn describe(results: &[HashResult]) -> String {
    if results.is_empty() {
        return "[]".to_string();
    }
    let parts: Vec<String> = results.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}

/// Expected digests for a fetch, at most one per algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HashSpec {
    results: Vec<HashResult>,
}

impl HashSpec {
    /// Build the expected set, ordering digests by algorithm.
    ///
    /// # Errors
    ///
    /// Returns an error if an algorithm appears twice or a digest has the
    /// wrong length.
    pub fn new(mut results: Vec<HashResult>) -> Result<Self, HashSpecError> {
        results.sort_by_key(|r| r.hash_type);
        for pair in results.windows(2) {
            if pair[0].hash_type == pair[1].hash_type {
                return Err(HashSpecError::DuplicateHashType(pair[0].hash_type));
            }
        }
        for result in &results {
            let expected = result.hash_type.digest_len();
            if result.digest.len() != expected {
                return Err(HashSpecError::WrongDigestLength {
                    hash_type: result.hash_type,
                    expected,
                    actual: result.digest.len(),
                });
            }
        }
        Ok(Self { results })
    }

    /// Expected digests, ordered by algorithm.
    #[must_use]
    pub fn results(&self) -> &[HashResult] {
        &self.results
    }

    /// Selection mask covering every expected algorithm.
    #[must_use]
    pub fn bitmask(&self) -> u32 {
        self.results
            .iter()
            .fold(0, |mask, r| mask | r.hash_type.bitmask())
    }

    /// Strict set equality: same algorithms and same digests, nothing extra.
    #[must_use]
    pub fn matches(&self, computed: &[HashResult]) -> bool {
        if computed.len() != self.results.len() {
            return false;
        }
        let mut computed: Vec<&HashResult> = computed.iter().collect();
        computed.sort_by_key(|r| r.hash_type);
        self.results.iter().zip(computed).all(|(a, b)| a == b)
    }
}

enum Hasher {
    Sha1(Sha1),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl Hasher {
    fn new(hash_type: HashType) -> Self {
        match hash_type {
            HashType::Sha1 => Self::Sha1(Sha1::new()),
            HashType::Sha256 => Self::Sha256(Sha256::new()),
            HashType::Sha384 => Self::Sha384(Sha384::new()),
            HashType::Sha512 => Self::Sha512(Sha512::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha1(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Sha384(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha1(h) => h.finalize().to_vec(),
            Self::Sha256(h) => h.finalize().to_vec(),
            Self::Sha384(h) => h.finalize().to_vec(),
            Self::Sha512(h) => h.finalize().to_vec(),
        }
    }
}

/// Reader adapter that hashes everything read through it.
///
/// Bytes pass through unmodified. With an empty mask it is a plain
/// pass-through that only counts bytes.
pub struct MultiHashReader<R> {
    inner: R,
    hashers: Vec<(HashType, Hasher)>,
    bytes_read: u64,
}

impl<R: Read> MultiHashReader<R> {
    /// Wrap `inner`, hashing with every algorithm selected by `mask`.
    pub fn new(inner: R, mask: u32) -> Self {
        let hashers = HashType::from_bitmask(mask)
            .map(|t| (t, Hasher::new(t)))
            .collect();
        Self {
            inner,
            hashers,
            bytes_read: 0,
        }
    }

    /// Number of bytes read so far.
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Drop the inner reader and return one digest per selected algorithm.
    #[must_use]
    pub fn finish(self) -> Vec<HashResult> {
        self.hashers
            .into_iter()
            .map(|(t, h)| HashResult::new(t, h.finalize()))
            .collect()
    }
}

impl<R: Read> Read for MultiHashReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        for (_, hasher) in &mut self.hashers {
            hasher.update(&buf[..n]);
        }
        self.bytes_read += n as u64;
        Ok(n)
    }
}

/// Hash `reader` to the end with every supported algorithm.
///
/// # Errors
///
/// Returns any error from the reader.
pub fn hash_all<R: Read>(reader: R) -> io::Result<Vec<HashResult>> {
    let mask = HashType::ALL.iter().fold(0, |m, t| m | t.bitmask());
    let mut hashing = MultiHashReader::new(reader, mask);
    io::copy(&mut hashing, &mut io::sink())?;
    Ok(hashing.finish())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const HELLO_SHA1: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";
    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_reader_passes_bytes_through() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut reader = MultiHashReader::new(&data[..], HashType::Sha256.bitmask());

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
        assert_eq!(reader.bytes_read(), data.len() as u64);
    }

    #[test]
    fn test_known_digests() {
        let mask = HashType::Sha1.bitmask() | HashType::Sha256.bitmask();
        let mut reader = MultiHashReader::new(&b"hello world"[..], mask);
        io::copy(&mut reader, &mut io::sink()).unwrap();

        let results = reader.finish();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].hash_type, HashType::Sha1);
        assert_eq!(results[0].to_hex(), HELLO_SHA1);
        assert_eq!(results[1].hash_type, HashType::Sha256);
        assert_eq!(results[1].to_hex(), HELLO_SHA256);
    }

    #[test]
    fn test_empty_mask_computes_nothing() {
        let mut reader = MultiHashReader::new(&b"abc"[..], 0);
        io::copy(&mut reader, &mut io::sink()).unwrap();
        assert!(reader.finish().is_empty());
    }

    #[test]
    fn test_hash_all_lengths() {
        let results = hash_all(&b"hello world"[..]).unwrap();
        assert_eq!(results.len(), HashType::ALL.len());
        for r in &results {
            assert_eq!(r.digest.len(), r.hash_type.digest_len());
        }
    }

    #[test]
    fn test_spec_rejects_duplicates() {
        let a = HashResult::from_hex(HashType::Sha256, HELLO_SHA256).unwrap();
        let err = HashSpec::new(vec![a.clone(), a]).unwrap_err();
        assert_eq!(err, HashSpecError::DuplicateHashType(HashType::Sha256));
    }

    #[test]
    fn test_spec_rejects_wrong_length() {
        let short = HashResult::new(HashType::Sha1, vec![0; 4]);
        assert!(matches!(
            HashSpec::new(vec![short]),
            Err(HashSpecError::WrongDigestLength {
                expected: 20,
                actual: 4,
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_hex() {
        assert!(matches!(
            HashResult::from_hex(HashType::Sha1, "not hex"),
            Err(HashSpecError::InvalidHex { .. })
        ));
    }

    #[test]
    fn test_matches_is_strict() {
        let sha1 = HashResult::from_hex(HashType::Sha1, HELLO_SHA1).unwrap();
        let sha256 = HashResult::from_hex(HashType::Sha256, HELLO_SHA256).unwrap();
        let spec = HashSpec::new(vec![sha256.clone(), sha1.clone()]).unwrap();

        assert_eq!(
            spec.bitmask(),
            HashType::Sha1.bitmask() | HashType::Sha256.bitmask()
        );
        // Order of the computed set does not matter.
        assert!(spec.matches(&[sha256.clone(), sha1.clone()]));
        assert!(spec.matches(&[sha1.clone(), sha256.clone()]));
        // Missing algorithm.
        assert!(!spec.matches(&[sha1.clone()]));
        // Differing value.
        let mut wrong = sha256.clone();
        wrong.digest[0] ^= 0xFF;
        assert!(!spec.matches(&[sha1.clone(), wrong]));
        // Extra algorithm.
        let sha512 = HashResult::new(HashType::Sha512, vec![0; 64]);
        assert!(!spec.matches(&[sha1, sha256, sha512]));
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(&[]), "[]");
        let r = HashResult::new(HashType::Sha1, vec![0xAB; 20]);
        assert!(describe(&[r]).starts_with("[sha1:abab"));
    }
}
