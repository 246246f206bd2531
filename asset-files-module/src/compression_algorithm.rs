// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Compression algorithms of precompressed file variants and their negotiation via the
//! `Accept-Encoding` HTTP header.

use std::fmt::Display;
use std::str::FromStr;

/// Represents a compression algorithm a precompressed file variant can use.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CompressionAlgorithm {
    /// Brotli compression
    Brotli,
    /// gzip compression
    Gzip,
}

impl CompressionAlgorithm {
    /// All supported algorithms, in the order of server preference.
    pub const ALL: [Self; 2] = [Self::Brotli, Self::Gzip];

    /// Returns the file extension corresponding to the algorithm.
    pub fn ext(&self) -> &'static str {
        match self {
            Self::Brotli => "br",
            Self::Gzip => "gz",
        }
    }

    /// Determines the algorithm corresponding to the file extension if any.
    pub fn from_ext(ext: &str) -> Option<Self> {
        match ext {
            "br" => Some(Self::Brotli),
            "gz" => Some(Self::Gzip),
            _ => None,
        }
    }

    /// Returns the algorithm name as used in `Accept-Encoding` and `Content-Encoding` HTTP
    /// headers.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Brotli => "br",
            Self::Gzip => "gzip",
        }
    }

    /// Determines the algorithm corresponding to a name from `Accept-Encoding` HTTP header.
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("br") || name.eq_ignore_ascii_case("brotli") {
            Some(Self::Brotli)
        } else if name.eq_ignore_ascii_case("gzip") || name.eq_ignore_ascii_case("x-gzip") {
            Some(Self::Gzip)
        } else {
            None
        }
    }

    /// Determines the algorithm from the file name of a precompressed variant, e.g. `app.js.br`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        Self::from_ext(ext)
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = UnsupportedCompressionAlgorithm;

    /// Coverts a file extension into a compression algorithm.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CompressionAlgorithm::from_ext(s).ok_or(UnsupportedCompressionAlgorithm(s.to_owned()))
    }
}

impl Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.name())
    }
}

/// The error type returned by `CompressionAlgorithm::from_str()`
#[derive(Debug, PartialEq, Eq)]
pub struct UnsupportedCompressionAlgorithm(String);

impl Display for UnsupportedCompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "Unsupported compression algorithm: {}", self.0)
    }
}

impl std::error::Error for UnsupportedCompressionAlgorithm {}

/// Parses an encoding specifier from `Accept-Encoding` HTTP header into an
/// algorithm/quality pair.
fn parse_encoding(encoding: &str) -> Option<(&str, u16)> {
    let mut params = encoding.split(';');
    let algorithm = params.next()?.trim();
    if algorithm.is_empty() {
        return None;
    }

    let mut quality = 1000;
    for param in params {
        if let Some((name, value)) = param.split_once('=') {
            if name.trim() == "q" {
                if let Ok(value) = f64::from_str(value.trim()) {
                    quality = (value.clamp(0.0, 1.0) * 1000.0) as u16;
                }
            }
        }
    }
    Some((algorithm, quality))
}

/// Selects the algorithms from `enabled` that the client accepts according to the value of its
/// `Accept-Encoding` header.
///
/// The result keeps the server preference (Brotli before gzip) rather than sorting by quality
/// values, a quality value of zero excludes an algorithm however. A wildcard (`*`) applies to all
/// algorithms not listed explicitly.
pub(crate) fn find_matches(
    requested: &str,
    enabled: &[CompressionAlgorithm],
) -> Vec<CompressionAlgorithm> {
    let requested = requested
        .split(',')
        .filter_map(parse_encoding)
        .collect::<Vec<_>>();
    let wildcard = requested
        .iter()
        .find(|(name, _)| *name == "*")
        .map(|(_, quality)| *quality);

    CompressionAlgorithm::ALL
        .into_iter()
        .filter(|algorithm| enabled.contains(algorithm))
        .filter(|algorithm| {
            requested
                .iter()
                .find(|(name, _)| CompressionAlgorithm::from_name(name) == Some(*algorithm))
                .map(|(_, quality)| *quality)
                .or(wildcard)
                .is_some_and(|quality| quality > 0)
        })
        .collect()
}
