//! Block and streaming content digests (C1).
//!
//! Four algorithms are supported: `xxh3-128` (default, fast non-cryptographic
//! hash), `sha-256`, `crc32`, and `crc32c` (Castagnoli). A [`Digest`] is an
//! immutable `(algorithm, bytes)` pair with a canonical `"{algorithm}:{hex}"`
//! string form that parses back to an equal digest.

use std::fmt;
use std::str::FromStr;

use crc::{Crc, CRC_32_ISCSI};
use fulmen_error::{Error, ErrorCode};
use sha2::Digest as _; // bring Sha256::update/finalize into scope
use xxhash_rust::xxh3::Xxh3;

static CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Xxh3_128,
    Sha256,
    Crc32,
    Crc32c,
}

impl Algorithm {
    /// Length, in hex characters, of a digest produced by this algorithm.
    #[must_use]
    pub fn expected_hex_len(self) -> usize {
        match self {
            Algorithm::Xxh3_128 => 32,
            Algorithm::Sha256 => 64,
            Algorithm::Crc32 | Algorithm::Crc32c => 8,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Xxh3_128 => "xxh3-128",
            Algorithm::Sha256 => "sha-256",
            Algorithm::Crc32 => "crc32",
            Algorithm::Crc32c => "crc32c",
        }
    }
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::Xxh3_128
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xxh3-128" => Ok(Algorithm::Xxh3_128),
            "sha-256" => Ok(Algorithm::Sha256),
            "crc32" => Ok(Algorithm::Crc32),
            "crc32c" => Ok(Algorithm::Crc32c),
            other => Err(Error::new(
                ErrorCode::InvalidChecksum,
                format!("unknown digest algorithm '{other}'"),
            )),
        }
    }
}

/// An immutable digest: the algorithm that produced it, plus its raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: Algorithm,
    bytes: Vec<u8>,
}

impl Digest {
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex encoding of the raw digest bytes.
    #[must_use]
    pub fn hex(&self) -> String {
        let mut s = String::with_capacity(self.bytes.len() * 2);
        for b in &self.bytes {
            s.push_str(&format!("{b:02x}"));
        }
        s
    }

    /// Canonical `"{algorithm}:{hex}"` form.
    #[must_use]
    pub fn formatted(&self) -> String {
        format!("{}:{}", self.algorithm, self.hex())
    }

    /// Parse a `"{algorithm}:{hex}"` string back into a `Digest`.
    ///
    /// Fails with [`ErrorCode::InvalidChecksum`] if the separator is
    /// missing, the algorithm is unknown, or the hex length mismatches the
    /// algorithm's expectation.
    pub fn parse(formatted: &str) -> Result<Digest, Error> {
        let (algo_str, hex_str) = formatted.split_once(':').ok_or_else(|| {
            Error::new(
                ErrorCode::InvalidChecksum,
                format!("malformed checksum '{formatted}': missing ':' separator"),
            )
        })?;
        let algorithm = Algorithm::from_str(algo_str)?;
        if hex_str.len() != algorithm.expected_hex_len() {
            return Err(Error::new(
                ErrorCode::InvalidChecksum,
                format!(
                    "malformed checksum '{formatted}': expected {} hex chars for {algorithm}, got {}",
                    algorithm.expected_hex_len(),
                    hex_str.len()
                ),
            ));
        }
        let bytes = decode_hex(hex_str).map_err(|_| {
            Error::new(
                ErrorCode::InvalidChecksum,
                format!("malformed checksum '{formatted}': invalid hex"),
            )
        })?;
        Ok(Digest { algorithm, bytes })
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, ()> {
    if s.len() % 2 != 0 {
        return Err(());
    }
    let mut out = Vec::with_capacity(s.len() / 2);
    let bytes = s.as_bytes();
    for chunk in bytes.chunks(2) {
        let hi = (chunk[0] as char).to_digit(16).ok_or(())?;
        let lo = (chunk[1] as char).to_digit(16).ok_or(())?;
        out.push(((hi << 4) | lo) as u8);
    }
    Ok(out)
}

/// Hash `data` with `algorithm` (defaulting to [`Algorithm::Xxh3_128`]).
#[must_use]
pub fn hash(data: impl AsRef<[u8]>, algorithm: Option<Algorithm>) -> Digest {
    let algorithm = algorithm.unwrap_or_default();
    let bytes = match algorithm {
        Algorithm::Xxh3_128 => {
            let mut hasher = Xxh3::new();
            hasher.update(data.as_ref());
            hasher.digest128().to_be_bytes().to_vec()
        }
        Algorithm::Sha256 => {
            let mut hasher = sha2::Sha256::new();
            hasher.update(data.as_ref());
            hasher.finalize().to_vec()
        }
        Algorithm::Crc32 => crc32fast::hash(data.as_ref()).to_be_bytes().to_vec(),
        Algorithm::Crc32c => CASTAGNOLI.checksum(data.as_ref()).to_be_bytes().to_vec(),
    };
    Digest { algorithm, bytes }
}

/// Equivalent to `hash(input, parsed.algorithm) == parsed`, where `parsed`
/// is the result of [`Digest::parse`]. Returns `false` (rather than
/// propagating an error) if `formatted` does not parse, since this is a
/// boolean predicate over possibly-untrusted input.
#[must_use]
pub fn verify(input: impl AsRef<[u8]>, formatted: &str) -> bool {
    match Digest::parse(formatted) {
        Ok(parsed) => hash(input, Some(parsed.algorithm)) == parsed,
        Err(_) => false,
    }
}

enum Inner {
    Xxh3(Xxh3),
    Sha256(sha2::Sha256),
    Crc32(crc32fast::Hasher),
    Crc32c(crc::Digest<'static, u32>),
}

impl Inner {
    fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Xxh3_128 => Inner::Xxh3(Xxh3::new()),
            Algorithm::Sha256 => Inner::Sha256(sha2::Sha256::new()),
            Algorithm::Crc32 => Inner::Crc32(crc32fast::Hasher::new()),
            Algorithm::Crc32c => Inner::Crc32c(CASTAGNOLI.digest()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Inner::Xxh3(h) => h.update(data),
            Inner::Sha256(h) => sha2::Digest::update(h, data),
            Inner::Crc32(h) => h.update(data),
            Inner::Crc32c(h) => h.update(data),
        }
    }

    fn finalize(self, algorithm: Algorithm) -> Digest {
        let bytes = match self {
            Inner::Xxh3(h) => h.digest128().to_be_bytes().to_vec(),
            Inner::Sha256(h) => sha2::Digest::finalize(h).to_vec(),
            Inner::Crc32(h) => h.finalize().to_be_bytes().to_vec(),
            Inner::Crc32c(h) => h.finalize().to_be_bytes().to_vec(),
        };
        Digest { algorithm, bytes }
    }
}

enum HasherState {
    Fresh(Inner),
    Writing(Inner),
    Sealed,
}

/// Stateful hasher for incremental input. States: `Fresh → Writing →
/// Sealed`. `update` and `digest` are permitted in `Fresh`/`Writing`;
/// calling either on a `Sealed` hasher fails with
/// [`ErrorCode::DigestState`]. `reset` always returns to `Fresh` and is
/// infallible.
pub struct StreamHasher {
    algorithm: Algorithm,
    state: HasherState,
}

impl StreamHasher {
    #[must_use]
    pub fn new(algorithm: Option<Algorithm>) -> Self {
        let algorithm = algorithm.unwrap_or_default();
        StreamHasher {
            algorithm,
            state: HasherState::Fresh(Inner::new(algorithm)),
        }
    }

    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn update(&mut self, data: impl AsRef<[u8]>) -> Result<&mut Self, Error> {
        match std::mem::replace(&mut self.state, HasherState::Sealed) {
            HasherState::Fresh(mut inner) | HasherState::Writing(mut inner) => {
                inner.update(data.as_ref());
                self.state = HasherState::Writing(inner);
                Ok(self)
            }
            HasherState::Sealed => Err(Error::new(
                ErrorCode::DigestState,
                "update called on a sealed StreamHasher; call reset() first",
            )),
        }
    }

    pub fn digest(&mut self) -> Result<Digest, Error> {
        match std::mem::replace(&mut self.state, HasherState::Sealed) {
            HasherState::Fresh(inner) | HasherState::Writing(inner) => {
                Ok(inner.finalize(self.algorithm))
            }
            HasherState::Sealed => Err(Error::new(
                ErrorCode::DigestState,
                "digest called on an already-sealed StreamHasher; call reset() first",
            )),
        }
    }

    #[must_use]
    pub fn reset(&mut self) -> &mut Self {
        self.state = HasherState::Fresh(Inner::new(self.algorithm));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_and_crc32c_fixture_vectors() {
        assert_eq!(hash("123456789", Some(Algorithm::Crc32)).hex(), "cbf43926");
        assert_eq!(hash("123456789", Some(Algorithm::Crc32c)).hex(), "e3069283");
    }

    #[test]
    fn xxh3_empty_input_fixture() {
        assert_eq!(hash("", None).hex(), "99aa06d3014798d86001c324468d497f");
    }

    #[test]
    fn formatted_round_trips_through_parse() {
        for algorithm in [
            Algorithm::Xxh3_128,
            Algorithm::Sha256,
            Algorithm::Crc32,
            Algorithm::Crc32c,
        ] {
            let d = hash(b"round trip me", Some(algorithm));
            let parsed = Digest::parse(&d.formatted()).unwrap();
            assert_eq!(parsed, d);
        }
    }

    proptest::proptest! {
        // For all inputs x and algorithm a: hash(x, a).formatted parses
        // back to a digest equal to hash(x, a).
        #[test]
        fn formatted_round_trips_for_arbitrary_input(data: Vec<u8>, algo_idx in 0u8..4) {
            let algorithm = match algo_idx {
                0 => Algorithm::Xxh3_128,
                1 => Algorithm::Sha256,
                2 => Algorithm::Crc32,
                _ => Algorithm::Crc32c,
            };
            let d = hash(&data, Some(algorithm));
            let parsed = Digest::parse(&d.formatted()).unwrap();
            prop_assert_eq!(parsed, d);
        }
    }

    #[test]
    fn parse_rejects_missing_separator() {
        assert!(Digest::parse("deadbeef").is_err());
    }

    #[test]
    fn parse_rejects_unknown_algorithm() {
        assert!(Digest::parse("md5:deadbeef").is_err());
    }

    #[test]
    fn parse_rejects_wrong_hex_length() {
        assert!(Digest::parse("crc32:deadbeefdead").is_err());
    }

    #[test]
    fn verify_matches_hash_equality() {
        let d = hash(b"hello world", Some(Algorithm::Sha256));
        assert!(verify(b"hello world", &d.formatted()));
        assert!(!verify(b"goodbye world", &d.formatted()));
    }

    #[test]
    fn stream_hasher_state_machine_rejects_sealed_reuse() {
        let mut h = StreamHasher::new(Some(Algorithm::Sha256));
        h.update(b"ab").unwrap();
        h.update(b"cd").unwrap();
        let sealed = h.digest().unwrap();
        assert_eq!(sealed, hash(b"abcd", Some(Algorithm::Sha256)));
        assert!(h.update(b"ef").is_err());
        assert!(h.digest().is_err());
        h.reset();
        h.update(b"abcd").unwrap();
        assert_eq!(h.digest().unwrap(), sealed);
    }

    #[test]
    fn fifty_independent_hashers_do_not_share_state() {
        let results: Vec<Digest> = (0..50)
            .map(|i| {
                let mut h = StreamHasher::new(Some(Algorithm::Xxh3_128));
                h.update(format!("payload-{i}").as_bytes()).unwrap();
                h.digest().unwrap()
            })
            .collect();
        for (i, d) in results.iter().enumerate() {
            assert_eq!(*d, hash(format!("payload-{i}").as_bytes(), Some(Algorithm::Xxh3_128)));
        }
        let unique: std::collections::HashSet<_> = results.iter().map(Digest::hex).collect();
        assert_eq!(unique.len(), 50);
    }
}
