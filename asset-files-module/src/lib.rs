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

//! # Asset Files Module
//!
//! This crate serves the output of a web application build: directories of static files,
//! possibly with precompressed variants next to them, and possibly a single page application
//! expecting its entry document for any unknown route.
//!
//! ## Supported functionality
//!
//! * `GET` and `HEAD` requests, other methods are left to the next handler
//! * Extension and directory index resolution: `/about` finds `about.html` or
//!   `about/index.html`
//! * Precompressed variants: `file.js.br` and `file.js.gz` are served instead of `file.js` to
//!   clients accepting these encodings
//! * Single page application fallback, with asset-like paths excluded
//! * `ETag` headers and `If-None-Match` conditional requests
//! * Byte range requests via `Range` and `If-Range` HTTP headers
//! * Production mode (root directory indexed once on startup) and development mode (files looked
//!   up on disk for every request)
//!
//! ## Known limitations
//!
//! * Requests with multiple byte ranges are not supported and will result in the full file being
//!   returned.
//! * Nothing is compressed on the fly, only existing compressed files are served.
//!
//! ## Code example
//!
//! An [`AssetFilesHandler`] is created from its configuration and placed into a
//! [`HandlerChain`](asset_module_utils::HandlerChain). If it doesn't find a file the next handler
//! in the chain gets a chance, the chain responds with `404 Not Found` if nothing matched.
//!
//! ```rust,no_run
//! use asset_files_module::{AssetFilesConf, AssetFilesHandler};
//! use asset_module_utils::{FromYaml, HandlerChain};
//!
//! let conf = AssetFilesConf::from_yaml(
//!     r#"
//!         root: /var/www/html
//!         gzip: true
//!         brotli: true
//!         etag: true
//!         single: true
//!     "#,
//! )
//! .unwrap();
//! let chain = HandlerChain::new().with(AssetFilesHandler::try_from(conf).unwrap());
//!
//! // The transport calls chain.handle(&request, &mut sink) for each request
//! ```
//!
//! A site consisting of several build output directories can be set up via [`Site`]:
//!
//! ```rust,no_run
//! use asset_files_module::{Site, SiteConf};
//! use asset_module_utils::FromYaml;
//!
//! let conf = SiteConf::from_yaml(
//!     r#"
//!         client: build/client
//!         static: build/static
//!         prerendered: build/prerendered
//!     "#,
//! )
//! .unwrap();
//! let chain = Site::try_from(conf).unwrap().into_chain();
//! ```
//!
//! ## Precompressed files
//!
//! With `gzip` and `brotli` settings enabled, a client requesting `/app.js` and sending HTTP
//! header `Accept-Encoding: br, gzip` will receive `app.js.br` or, if that doesn’t exist,
//! `app.js.gz`. The server’s preference decides the order: Brotli is always tried first.
//! Responses get a `Vary: Accept-Encoding` header then.

mod compression_algorithm;
mod configuration;
mod file_writer;
mod handler;
pub mod index;
pub mod metadata;
pub mod negotiation;
pub mod path;
pub mod range;
mod site;
#[cfg(test)]
mod tests;

pub use compression_algorithm::{CompressionAlgorithm, UnsupportedCompressionAlgorithm};
pub use configuration::{AssetFilesConf, AssetFilesOpt, SinglePage, IMMUTABLE_MAX_AGE};
pub use handler::AssetFilesHandler;
pub use site::{Site, SiteConf};
