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

//! Request path normalization and the list of file names to look up for a request

use log::debug;
use percent_encoding::percent_decode_str;
use std::borrow::Cow;

use crate::compression_algorithm::CompressionAlgorithm;

/// Name of the document looked up for directory-like paths
const INDEX_NAME: &str = "index";

/// Directory that is never considered hidden despite starting with a dot
const WELL_KNOWN: &str = ".well-known/";

/// Decodes percent-encoded sequences in a request path.
///
/// If the decoded path isn’t valid UTF-8 the raw path is returned unchanged.
pub fn decode_path(raw: &str) -> Cow<'_, str> {
    if !raw.contains('%') {
        return Cow::Borrowed(raw);
    }

    match percent_decode_str(raw).decode_utf8() {
        Ok(decoded) => decoded,
        Err(err) => {
            debug!("failed decoding path {raw}, using it unchanged: {err}");
            Cow::Borrowed(raw)
        }
    }
}

/// Resolves `.` and `..` segments of a decoded path, collapses repeated slashes and drops the
/// trailing slash. The root directory is represented by an empty string, anything else starts
/// with a slash.
///
/// Returns `None` if the path would leave the root directory.
pub fn normalize_path(path: &str) -> Option<String> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            segment if segment.contains('\0') => return None,
            segment => segments.push(segment),
        }
    }

    let mut normalized = String::with_capacity(path.len());
    for segment in segments {
        normalized.push('/');
        normalized.push_str(segment);
    }
    Some(normalized)
}

/// Checks whether a path relative to the root directory refers to a hidden file, meaning that
/// one of its segments starts with a dot. Anything under `.well-known/` is never hidden.
pub fn is_hidden(path: &str) -> bool {
    if path.contains(WELL_KNOWN) {
        return false;
    }
    path.split(['/', '\\'])
        .any(|segment| segment.starts_with('.'))
}

/// Ordered list of paths to look up for a request, most specific first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateList {
    candidates: Vec<String>,
}

impl CandidateList {
    /// Produces the lookup candidates for a normalized request path (see [`normalize_path`]).
    ///
    /// Candidates are grouped by compression: one group for each algorithm in `encodings` (in
    /// the given order), then the uncompressed group. Within a group the path itself is tried
    /// with each suffix, then the directory index document with each suffix. The uncompressed
    /// group starts with the path unchanged, followed by the configured `extensions`.
    pub fn new(path: &str, extensions: &[String], encodings: &[CompressionAlgorithm]) -> Self {
        let extensions = extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.'))
            .filter(|ext| !ext.is_empty())
            .collect::<Vec<_>>();

        let mut candidates = Vec::new();
        let mut push_group = |suffixes: &[String]| {
            if !path.is_empty() {
                for suffix in suffixes {
                    candidates.push(format!("{path}{suffix}"));
                }
            }
            for suffix in suffixes {
                candidates.push(format!("{path}/{INDEX_NAME}{suffix}"));
            }
        };

        for encoding in encodings {
            let mut suffixes = extensions
                .iter()
                .map(|ext| format!(".{ext}.{}", encoding.ext()))
                .collect::<Vec<_>>();
            suffixes.push(format!(".{}", encoding.ext()));
            push_group(&suffixes);
        }

        let mut suffixes = vec![String::new()];
        suffixes.extend(extensions.iter().map(|ext| format!(".{ext}")));
        push_group(&suffixes);

        Self { candidates }
    }

    /// Iterates over the candidates in order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.candidates.iter()
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Returns `true` if there are no candidates.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl<'a> IntoIterator for &'a CandidateList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}
