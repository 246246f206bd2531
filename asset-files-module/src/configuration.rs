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

//! Data structures required for `AssetFilesHandler` configuration

use asset_module_utils::OneOrMany;
use clap::Parser;
use serde::de::{Deserializer, Error, Visitor};
use serde::Deserialize;
use std::path::PathBuf;

/// Cache lifetime applied to files under an immutable prefix, one year
pub const IMMUTABLE_MAX_AGE: u64 = 31_536_000;

/// Command line options of the asset files module
#[derive(Debug, Default, Parser)]
pub struct AssetFilesOpt {
    /// The root directory.
    #[clap(short, long)]
    pub root: Option<PathBuf>,

    /// File extension to try when the requested path doesn't exist, e.g. `html` for `/about` to
    /// find `/about.html`. This command line flag can be specified multiple times.
    #[clap(long)]
    pub extension: Option<Vec<String>>,

    /// Serve gzip-compressed variants (`.gz` files) to clients supporting them.
    #[clap(long)]
    pub gzip: Option<bool>,

    /// Serve Brotli-compressed variants (`.br` files) to clients supporting them.
    #[clap(long)]
    pub brotli: Option<bool>,

    /// Send `ETag` headers and respond to matching `If-None-Match` with 304 Not Modified.
    #[clap(long)]
    pub etag: Option<bool>,

    /// Cache lifetime in seconds for the `Cache-Control` header.
    #[clap(long)]
    pub max_age: Option<u64>,

    /// Document to serve for unknown paths (single page application mode), e.g. `index.html`.
    #[clap(long)]
    pub single: Option<String>,

    /// Look up files on disk for every request instead of indexing the root directory on startup.
    #[clap(long)]
    pub dev: Option<bool>,
}

/// Single page application fallback setting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SinglePage {
    /// No fallback, unknown paths are left to the next handler
    #[default]
    Disabled,
    /// Unknown paths are served the root index document
    Index,
    /// Unknown paths are served the named document, e.g. `200.html`
    Document(String),
}

impl SinglePage {
    /// Returns `true` unless the fallback is disabled.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// The request path to resolve instead of an unknown one, e.g. `/` or `/200`. The file
    /// extension of a named document is dropped, it will be found via the extension list.
    pub fn fallback_path(&self) -> Option<String> {
        match self {
            Self::Disabled => None,
            Self::Index => Some("/".to_owned()),
            Self::Document(name) => {
                let name = name.trim_start_matches('/');
                let stem = match name.rfind('.') {
                    Some(index) => &name[..index],
                    None => name,
                };
                Some(format!("/{stem}"))
            }
        }
    }
}

impl<'de> Deserialize<'de> for SinglePage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SinglePageVisitor;

        impl<'de> Visitor<'de> for SinglePageVisitor {
            type Value = SinglePage;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("boolean or document name")
            }

            fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E>
            where
                E: Error,
            {
                Ok(if v {
                    SinglePage::Index
                } else {
                    SinglePage::Disabled
                })
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: Error,
            {
                if v.is_empty() {
                    Ok(SinglePage::Disabled)
                } else {
                    Ok(SinglePage::Document(v.to_owned()))
                }
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: Error,
            {
                Ok(SinglePage::Disabled)
            }
        }

        deserializer.deserialize_any(SinglePageVisitor)
    }
}

/// Configuration file settings of the asset files module
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AssetFilesConf {
    /// The root directory. The handler won't respond to anything if this isn't set.
    pub root: Option<PathBuf>,

    /// File extensions to try for paths without an exact match, in order.
    pub extensions: OneOrMany<String>,

    /// Serve gzip-compressed variants (`.gz` files) to clients supporting them.
    pub gzip: bool,

    /// Serve Brotli-compressed variants (`.br` files) to clients supporting them.
    pub brotli: bool,

    /// Send `ETag` headers and respond to matching `If-None-Match` with 304 Not Modified.
    pub etag: bool,

    /// Cache lifetime in seconds, produces `Cache-Control: public,max-age=N`.
    pub max_age: Option<u64>,

    /// Adds `immutable` to the `Cache-Control` header produced by `max_age`.
    pub immutable: bool,

    /// Single page application fallback for unknown paths.
    pub single: SinglePage,

    /// Serve files and directories with names starting with a dot. Files under `.well-known` are
    /// always served.
    pub dot_files: bool,

    /// Apply the built-in patterns excluding asset-like paths (anything with a file extension) and
    /// dot-prefixed paths from the single page application fallback.
    pub default_ignores: bool,

    /// Additional regular expressions (case-insensitive) excluding request paths from the single
    /// page application fallback.
    pub ignores: OneOrMany<String>,

    /// Look up files on disk for every request instead of indexing the root directory once.
    pub dev: bool,

    /// Request path prefix of content-hashed build output, e.g. `/_app/immutable/`. Matching
    /// files are cached by clients for a year.
    pub immutable_prefix: Option<String>,
}

impl AssetFilesConf {
    /// Merges the command line options into the current configuration. Any command line options
    /// present overwrite existing settings.
    pub fn merge_with_opt(&mut self, opt: AssetFilesOpt) {
        if opt.root.is_some() {
            self.root = opt.root;
        }

        if let Some(extension) = opt.extension {
            self.extensions = extension.into();
        }

        if let Some(gzip) = opt.gzip {
            self.gzip = gzip;
        }

        if let Some(brotli) = opt.brotli {
            self.brotli = brotli;
        }

        if let Some(etag) = opt.etag {
            self.etag = etag;
        }

        if opt.max_age.is_some() {
            self.max_age = opt.max_age;
        }

        if let Some(single) = opt.single {
            self.single = match single.as_str() {
                "" | "false" => SinglePage::Disabled,
                "true" => SinglePage::Index,
                _ => SinglePage::Document(single),
            };
        }

        if let Some(dev) = opt.dev {
            self.dev = dev;
        }
    }

    /// The `Cache-Control` header value resulting from `max_age` and `immutable` settings.
    pub fn cache_control(&self) -> Option<String> {
        let max_age = self.max_age?;
        let mut value = format!("public,max-age={max_age}");
        if self.immutable {
            value.push_str(",immutable");
        } else if max_age == 0 {
            value.push_str(",must-revalidate");
        }
        Some(value)
    }
}

impl Default for AssetFilesConf {
    fn default() -> Self {
        Self {
            root: None,
            extensions: vec!["html".to_owned(), "htm".to_owned()].into(),
            gzip: false,
            brotli: false,
            etag: false,
            max_age: None,
            immutable: false,
            single: SinglePage::Disabled,
            dot_files: false,
            default_ignores: true,
            ignores: Default::default(),
            dev: false,
            immutable_prefix: None,
        }
    }
}
