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

//! File metadata and the response headers derived from it

use httpdate::fmt_http_date;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::compression_algorithm::CompressionAlgorithm;

/// Settings influencing the headers computed for a file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryOptions {
    /// Whether an `ETag` should be computed
    pub etag: bool,
    /// `Cache-Control` header value
    pub cache_control: Option<String>,
}

/// A file that can be served, along with its precomputed header values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path relative to the root directory, starting with a slash and separated by forward
    /// slashes, e.g. `/assets/app.js.br`
    pub relative_path: String,
    /// Location of the file on disk
    pub absolute_path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modification time of the file
    pub modified: SystemTime,
    /// `Last-Modified` header value, e.g. `Fri, 15 May 2015 15:34:21 GMT`
    pub last_modified: String,
    /// `Content-Type` header value, determined from the file name without compression extension
    pub content_type: String,
    /// Compression algorithm if this is a precompressed variant
    pub encoding: Option<CompressionAlgorithm>,
    /// Weak `ETag` header value encoding file size and modification time
    pub etag: Option<String>,
    /// `Cache-Control` header value
    pub cache_control: Option<String>,
}

impl FileEntry {
    /// Computes the entry for a file given its metadata.
    pub fn new(
        relative_path: String,
        absolute_path: PathBuf,
        meta: &Metadata,
        options: &EntryOptions,
    ) -> Self {
        let encoding = CompressionAlgorithm::from_file_name(&relative_path);
        let type_name = match encoding {
            Some(encoding) => relative_path
                .strip_suffix(encoding.ext())
                .and_then(|name| name.strip_suffix('.'))
                .unwrap_or(&relative_path),
            None => &relative_path,
        };
        let content_type = content_type(type_name);

        let size = meta.len();
        let modified = meta.modified().unwrap_or(UNIX_EPOCH);
        let etag = options.etag.then(|| {
            let millis = modified
                .duration_since(UNIX_EPOCH)
                .map_or(0, |duration| duration.as_millis());
            format!("W/\"{size}-{millis}\"")
        });

        Self {
            relative_path,
            absolute_path,
            size,
            modified,
            last_modified: fmt_http_date(modified),
            content_type,
            encoding,
            etag,
            cache_control: options.cache_control.clone(),
        }
    }

    /// Checks the value of an `If-None-Match` header against the entry’s `ETag`. Without an
    /// `ETag` nothing matches.
    pub fn matches_etag(&self, if_none_match: &str) -> bool {
        let Some(etag) = &self.etag else {
            return false;
        };

        let if_none_match = if_none_match.trim();
        if_none_match == "*"
            || if_none_match
                .split(',')
                .map(str::trim)
                .any(|value| value == etag.as_str())
    }
}

/// Guesses the MIME type from a file name. Text types get an explicit UTF-8 character set,
/// unknown types are served as `application/octet-stream`.
pub fn content_type(name: impl AsRef<Path>) -> String {
    let mime = mime_guess::from_path(name).first_or_octet_stream();
    if mime.type_() == mime_guess::mime::TEXT && mime.get_param("charset").is_none() {
        format!("{mime};charset=utf-8")
    } else {
        mime.to_string()
    }
}
