//! Byte sizes with IEC binary suffixes (`Ki`, `Mi`, ... `Ei`).
//!
//! Accepted input: a non-negative integer, optionally followed by exactly
//! one case-sensitive suffix (`10Mi`, `512Ki`, `4096`). Display picks the
//! largest suffix that divides the value evenly, so `1049600` shows as
//! `1025Ki` and `1050623` stays a plain number.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

const KI: u64 = 1024;

/// Largest first so formatting finds the best fit.
const SUFFIXES: [(&str, u64); 6] = [
    ("Ei", KI * KI * KI * KI * KI * KI),
    ("Pi", KI * KI * KI * KI * KI),
    ("Ti", KI * KI * KI * KI),
    ("Gi", KI * KI * KI),
    ("Mi", KI * KI),
    ("Ki", KI),
];

/// A byte count parsed from / displayed as an IEC magnitude.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "RawByteSize")]
pub struct ByteSize(u64);

impl ByteSize {
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn bytes(self) -> u64 {
        self.0
    }
}

impl From<u64> for ByteSize {
    fn from(bytes: u64) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (suffix, unit) in SUFFIXES {
            if self.0 >= unit && self.0 % unit == 0 {
                return write!(f, "{}{suffix}", self.0 / unit);
            }
        }
        write!(f, "{}", self.0)
    }
}

/// Why a byte size string was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseByteSizeError {
    Empty,
    /// Digits missing or not a non-negative integer
    InvalidNumber(String),
    /// Value does not fit in 64 bits once the suffix is applied
    Overflow(String),
}

impl fmt::Display for ParseByteSizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty byte size"),
            Self::InvalidNumber(s) => write!(
                f,
                "invalid byte size {s:?}: expected a non-negative integer with optional Ki/Mi/Gi/Ti/Pi/Ei suffix"
            ),
            Self::Overflow(s) => write!(f, "byte size {s:?} is too large"),
        }
    }
}

impl std::error::Error for ParseByteSizeError {}

impl FromStr for ByteSize {
    type Err = ParseByteSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseByteSizeError::Empty);
        }

        let (digits, unit) = SUFFIXES
            .iter()
            .find_map(|&(suffix, unit)| s.strip_suffix(suffix).map(|d| (d, unit)))
            .unwrap_or((s, 1));

        let n: u64 = digits
            .parse()
            .map_err(|_| ParseByteSizeError::InvalidNumber(s.to_string()))?;
        n.checked_mul(unit)
            .map(Self)
            .ok_or_else(|| ParseByteSizeError::Overflow(s.to_string()))
    }
}

/// Config files may give either `chunk_size = 1048576` or `chunk_size = "1Mi"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawByteSize {
    Bytes(u64),
    Text(String),
}

impl TryFrom<RawByteSize> for ByteSize {
    type Error = ParseByteSizeError;

    fn try_from(raw: RawByteSize) -> Result<Self, Self::Error> {
        match raw {
            RawByteSize::Bytes(n) => Ok(Self(n)),
            RawByteSize::Text(s) => s.parse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<u64, ParseByteSizeError> {
        s.parse::<ByteSize>().map(ByteSize::bytes)
    }

    #[test]
    fn parses_plain_and_suffixed() {
        let cases = [
            ("0", 0),
            ("1", 1),
            ("1023", 1023),
            ("1024", 1024),
            ("1Ki", 1024),
            ("2Ki", 2048),
            ("1Mi", 1_048_576),
            ("1025Ki", 1_049_600),
            ("1Gi", 1_073_741_824),
            ("1048577Ki", 1_073_742_848),
            ("10Mi", 10 * 1024 * 1024),
        ];
        for (input, want) in cases {
            assert_eq!(parse(input), Ok(want), "input {input}");
        }
    }

    #[test]
    fn displays_largest_even_suffix() {
        let cases = [
            (0, "0"),
            (1, "1"),
            (1023, "1023"),
            (1024, "1Ki"),
            (1025, "1025"),
            (1_048_576, "1Mi"),
            (1_049_600, "1025Ki"),
            (1_050_623, "1050623"),
            (1_050_624, "1026Ki"),
            (1_073_741_824, "1Gi"),
            (1_073_741_825, "1073741825"),
            (1_073_742_848, "1048577Ki"),
        ];
        for (bytes, want) in cases {
            assert_eq!(ByteSize::new(bytes).to_string(), want, "bytes {bytes}");
        }
    }

    #[test]
    fn rejects_malformed() {
        for input in ["-1", "-1Ki", "1a", "a", "1024mi", "Mi", "1.5Mi", " 1"] {
            assert!(parse(input).is_err(), "input {input:?} should fail");
        }
        assert_eq!(parse(""), Err(ParseByteSizeError::Empty));
    }

    #[test]
    fn rejects_overflow() {
        assert!(matches!(
            parse("16Ei"),
            Err(ParseByteSizeError::Overflow(_))
        ));
        assert_eq!(parse("15Ei"), Ok(15 * SUFFIXES[0].1));
    }

    #[test]
    fn deserializes_string_or_integer() {
        #[derive(Deserialize)]
        struct Cfg {
            a: ByteSize,
            b: ByteSize,
        }
        let cfg: Cfg = toml::from_str("a = \"10Mi\"\nb = 4096\n").unwrap();
        assert_eq!(cfg.a.bytes(), 10 * 1024 * 1024);
        assert_eq!(cfg.b.bytes(), 4096);
    }

    #[test]
    fn deserialize_rejects_bad_string() {
        #[derive(Debug, Deserialize)]
        struct Cfg {
            #[allow(dead_code)]
            a: ByteSize,
        }
        assert!(toml::from_str::<Cfg>("a = \"ten\"\n").is_err());
    }
}
