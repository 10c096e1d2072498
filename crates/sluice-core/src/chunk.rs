//! Chunk — the unit of data passed from a producer to a sink.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An immutable run of bytes. Cloning shares the payload.
///
/// A chunk has no identity beyond its payload and the order it was
/// written in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Chunk {
    payload: Bytes,
}

impl Chunk {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_bytes(self) -> Bytes {
        self.payload
    }

    /// Cost of this chunk against a channel's capacity.
    pub fn cost(&self, measure: Measure) -> usize {
        match measure {
            Measure::Bytes => self.len(),
            Measure::Chunks => 1,
        }
    }
}

impl AsRef<[u8]> for Chunk {
    fn as_ref(&self) -> &[u8] {
        &self.payload
    }
}

impl From<Bytes> for Chunk {
    fn from(payload: Bytes) -> Self {
        Self { payload }
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(v: Vec<u8>) -> Self {
        Self::new(v)
    }
}

impl From<&'static [u8]> for Chunk {
    fn from(s: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(s))
    }
}

impl From<&'static str> for Chunk {
    fn from(s: &'static str) -> Self {
        Self::new(Bytes::from_static(s.as_bytes()))
    }
}

impl From<String> for Chunk {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}

// ── Measure ───────────────────────────────────────────────────────────────────

/// Unit a channel's capacity is counted in.
///
///   Bytes  — each chunk costs its length
///   Chunks — each chunk costs 1, whatever its size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Measure {
    #[default]
    Bytes,
    Chunks,
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measure::Bytes => f.write_str("bytes"),
            Measure::Chunks => f.write_str("chunks"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown measure {0:?} (expected \"bytes\" or \"chunks\")")]
pub struct ParseMeasureError(String);

impl FromStr for Measure {
    type Err = ParseMeasureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bytes" => Ok(Measure::Bytes),
            "chunks" => Ok(Measure::Chunks),
            _ => Err(ParseMeasureError(s.to_string())),
        }
    }
}
