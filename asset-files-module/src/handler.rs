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

//! The request handler serving files from a root directory.

use asset_module_utils::{Error, RequestFilter, RequestFilterResult, Response};
use async_trait::async_trait;
use http::{header, Method, Request, StatusCode};
use log::debug;
use std::borrow::Cow;

use crate::configuration::{AssetFilesConf, IMMUTABLE_MAX_AGE};
use crate::file_writer::{file_response, open_file};
use crate::index::{Lookup, LookupOptions};
use crate::metadata::{EntryOptions, FileEntry};
use crate::negotiation::Negotiator;
use crate::path::decode_path;
use crate::range::{extract_range, Range};

/// Asset files handler
#[derive(Debug)]
pub struct AssetFilesHandler {
    conf: AssetFilesConf,
    lookup: Option<Lookup>,
    negotiator: Negotiator,
}

impl TryFrom<AssetFilesConf> for AssetFilesHandler {
    type Error = Error;

    fn try_from(mut conf: AssetFilesConf) -> Result<Self, Self::Error> {
        let negotiator = Negotiator::new(&conf)?;

        let lookup = if let Some(root) = conf.root.clone() {
            let root = root.canonicalize().map_err(|err| {
                Error::because(format!("Failed accessing root path {root:?}"), err)
            })?;

            let options = LookupOptions {
                dot_files: conf.dot_files,
                entry: EntryOptions {
                    etag: conf.etag,
                    cache_control: conf.cache_control(),
                },
            };
            let lookup = Lookup::new(root.clone(), options, conf.dev)?;
            conf.root = Some(root);
            Some(lookup)
        } else {
            None
        };

        debug!("Initialized asset files handler, settings: {conf:#?}");
        Ok(Self {
            conf,
            lookup,
            negotiator,
        })
    }
}

impl AssetFilesHandler {
    /// Creates a new handler. This canonicalizes the root directory and, unless in development
    /// mode, indexes all files in it.
    pub fn new(conf: AssetFilesConf) -> Result<Self, Error> {
        conf.try_into()
    }

    /// Provides read-only access to the handler’s configuration.
    pub fn conf(&self) -> &AssetFilesConf {
        &self.conf
    }

    /// The file lookup, `None` if no root directory is configured.
    pub fn lookup(&self) -> Option<&Lookup> {
        self.lookup.as_ref()
    }

    /// `Cache-Control` value overriding the file’s own for requests under the immutable prefix.
    fn immutable_override(&self, path: &str) -> Option<String> {
        let prefix = self.conf.immutable_prefix.as_deref()?;
        path.starts_with(prefix)
            .then(|| format!("public,max-age={IMMUTABLE_MAX_AGE},immutable"))
    }

    async fn send_file(
        &self,
        request: &Request<()>,
        response: &mut Response<'_>,
        entry: &FileEntry,
    ) -> Result<(), Error> {
        let range = extract_range(request, entry);
        let (start, len) = match range {
            Some(Range::OutOfBounds) => {
                debug!("requested bytes range is out of bounds");
                response.set_status(StatusCode::RANGE_NOT_SATISFIABLE);
                response.insert_header(
                    header::CONTENT_RANGE,
                    Range::OutOfBounds.content_range(entry.size),
                )?;
                response.insert_header(header::CONTENT_LENGTH, 0u64)?;
                response.end(None).await?;
                return Ok(());
            }
            Some(Range::Valid(start, end)) => {
                debug!("bytes range requested: {start}-{end}");
                (start, end - start + 1)
            }
            None => (0, entry.size),
        };

        // Open the file before touching the response so that a failure still allows for an
        // error page
        let file = if request.method() == Method::HEAD || len == 0 {
            None
        } else {
            Some(open_file(&entry.absolute_path, start).await?)
        };

        if let Some(range) = range {
            response.set_status(StatusCode::PARTIAL_CONTENT);
            response.insert_header(header::CONTENT_RANGE, range.content_range(entry.size))?;
        } else {
            response.set_status(StatusCode::OK);
        }

        let cache_control = self
            .immutable_override(&decode_path(request.uri().path()))
            .map(Cow::Owned)
            .or_else(|| entry.cache_control.as_deref().map(Cow::Borrowed));

        if self.negotiator.compression_enabled() {
            response.insert_header(header::VARY, "Accept-Encoding")?;
        }
        response.insert_header(header::CONTENT_LENGTH, len)?;
        response.insert_header(header::CONTENT_TYPE, entry.content_type.as_str())?;
        response.insert_header(header::LAST_MODIFIED, entry.last_modified.as_str())?;
        response.insert_header(header::ACCEPT_RANGES, "bytes")?;
        if let Some(encoding) = entry.encoding {
            response.insert_header(header::CONTENT_ENCODING, encoding.name())?;
        }
        if let Some(etag) = &entry.etag {
            response.insert_header(header::ETAG, etag.as_str())?;
        }
        if let Some(cache_control) = cache_control {
            response.insert_header(header::CACHE_CONTROL, &*cache_control)?;
        }

        match file {
            Some(file) => file_response(response, &entry.absolute_path, file, len).await,
            None => {
                response.end(None).await?;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl RequestFilter for AssetFilesHandler {
    async fn request_filter(
        &self,
        request: &Request<()>,
        response: &mut Response<'_>,
    ) -> Result<RequestFilterResult, Error> {
        let Some(lookup) = &self.lookup else {
            return Ok(RequestFilterResult::Unhandled);
        };

        if request.method() != Method::GET && request.method() != Method::HEAD {
            debug!("not handling method {}", request.method());
            return Ok(RequestFilterResult::Unhandled);
        }

        let Some(result) = self.negotiator.negotiate(request, lookup) else {
            debug!("no file found for {}", request.uri().path());
            return Ok(RequestFilterResult::Unhandled);
        };

        if result.is_conditional_hit {
            debug!("If-None-Match check resulted in Not Modified");
            response.set_status(StatusCode::NOT_MODIFIED);
            response.end(None).await?;
            return Ok(RequestFilterResult::ResponseSent);
        }

        self.send_file(request, response, &result.entry).await?;
        Ok(RequestFilterResult::ResponseSent)
    }
}
