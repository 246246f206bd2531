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

//! Selecting the file to serve for a request

use asset_module_utils::Error;
use http::{header, Request};
use log::{debug, warn};
use regex::{Regex, RegexBuilder};
use std::borrow::Cow;

use crate::compression_algorithm::{find_matches, CompressionAlgorithm};
use crate::configuration::AssetFilesConf;
use crate::index::Lookup;
use crate::metadata::FileEntry;
use crate::path::{decode_path, normalize_path, CandidateList};

/// Paths that look like asset requests: the last segment(s) have a file extension
const ASSET_PATTERN: &str = r"[/]([A-Za-z\s\d~$._-]+\.\w+){1,}$";

/// Dot-prefixed paths, excluded from the fallback when dot files are served
const DOT_FILES_PATTERN: &str = r"/\.\w";

/// The `.well-known` directory, excluded from the fallback when dot files are hidden
const WELL_KNOWN_PATTERN: &str = r"/\.well-known";

/// The file selected for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationResult<'a> {
    /// The file to serve
    pub entry: Cow<'a, FileEntry>,
    /// Set if the client’s `If-None-Match` header matches the file’s `ETag`, a
    /// `304 Not Modified` response should be sent then.
    pub is_conditional_hit: bool,
    /// Set if the file is the single page application fallback rather than a match for the
    /// request path
    pub is_fallback: bool,
}

/// Decides which file (and which compressed variant of it) answers a request.
#[derive(Debug)]
pub struct Negotiator {
    extensions: Vec<String>,
    encodings: Vec<CompressionAlgorithm>,
    fallback: Option<String>,
    ignores: Vec<Regex>,
}

impl Negotiator {
    /// Creates a negotiator from the handler configuration. Fails if one of the configured
    /// ignore patterns isn’t a valid regular expression.
    pub fn new(conf: &AssetFilesConf) -> Result<Self, Error> {
        let mut encodings = Vec::new();
        if conf.brotli {
            encodings.push(CompressionAlgorithm::Brotli);
        }
        if conf.gzip {
            encodings.push(CompressionAlgorithm::Gzip);
        }

        let mut ignores = Vec::new();
        if conf.default_ignores {
            ignores.push(ASSET_PATTERN);
            ignores.push(if conf.dot_files {
                DOT_FILES_PATTERN
            } else {
                WELL_KNOWN_PATTERN
            });
        }
        let mut ignores = ignores
            .into_iter()
            .map(Regex::new)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| Error::InvalidConfiguration(err.to_string()))?;
        for pattern in &conf.ignores {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|err| {
                    Error::InvalidConfiguration(format!("invalid ignore pattern {pattern}: {err}"))
                })?;
            ignores.push(regex);
        }

        Ok(Self {
            extensions: conf.extensions.to_vec(),
            encodings,
            fallback: conf.single.fallback_path(),
            ignores,
        })
    }

    /// Returns `true` if precompressed variants are served, responses depend on the
    /// `Accept-Encoding` header then.
    pub fn compression_enabled(&self) -> bool {
        !self.encodings.is_empty()
    }

    /// Compression algorithms to look for, in order of preference.
    pub fn accepted_encodings(&self, request: &Request<()>) -> Vec<CompressionAlgorithm> {
        if self.encodings.is_empty() {
            return Vec::new();
        }

        request
            .headers()
            .get(header::ACCEPT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .map(|value| find_matches(value, &self.encodings))
            .unwrap_or_default()
    }

    /// Checks whether a decoded request path is excluded from the single page application
    /// fallback.
    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignores.iter().any(|regex| regex.is_match(path))
    }

    /// Produces the lookup candidates for a decoded request path, `None` if the path escapes
    /// the root directory.
    pub fn candidates(&self, path: &str, encodings: &[CompressionAlgorithm]) -> Option<CandidateList> {
        let normalized = normalize_path(path)?;
        Some(CandidateList::new(&normalized, &self.extensions, encodings))
    }

    /// Finds the file for the request. Falls back to the single page application document if
    /// configured and the path isn’t excluded. Returns `None` if the next handler should deal
    /// with the request.
    pub fn negotiate<'a>(
        &self,
        request: &Request<()>,
        lookup: &'a Lookup,
    ) -> Option<NegotiationResult<'a>> {
        let raw_path = request.uri().path();
        let path = decode_path(raw_path);
        let encodings = self.accepted_encodings(request);

        let found = match self.candidates(&path, &encodings) {
            Some(candidates) => lookup.find(&candidates),
            None => {
                warn!("rejecting path outside the root directory: {raw_path}");
                None
            }
        };

        let (entry, is_fallback) = match found {
            Some(entry) => (entry, false),
            None => {
                let fallback = self.fallback.as_deref()?;
                if self.is_ignored(&path) {
                    debug!("no match for {path}, excluded from fallback");
                    return None;
                }
                debug!("no match for {path}, trying fallback {fallback}");
                let candidates = self.candidates(fallback, &encodings)?;
                (lookup.find(&candidates)?, true)
            }
        };

        let is_conditional_hit = request
            .headers()
            .get(header::IF_NONE_MATCH)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| entry.matches_etag(value));

        debug!(
            "resolved {path} to {}{}",
            entry.relative_path,
            if is_fallback { " (fallback)" } else { "" }
        );
        Some(NegotiationResult {
            entry,
            is_conditional_hit,
            is_fallback,
        })
    }
}
