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

//! # Module helpers
//!
//! This crate contains the plumbing shared by request handlers such as the ones in
//! `asset-files-module`: the [`RequestFilter`] trait, a [`Response`] type buffering status and
//! headers until the first body byte is written, the [`ResponseSink`] trait transports implement
//! and the [`HandlerChain`] trying a list of handlers in order.
//!
//! ```rust
//! use asset_module_utils::{HandlerChain, testing::RecordingSink};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! // A chain without handlers produces 404 Not Found for every request
//! let chain = HandlerChain::new();
//! let request = http::Request::get("/file.txt").body(()).unwrap();
//! let mut sink = RecordingSink::new();
//! chain.handle(&request, &mut sink).await;
//! assert_eq!(sink.status().map(|status| status.as_u16()), Some(404));
//! # });
//! ```

mod chain;
mod deserialize;
mod error;
mod response;
pub mod standard_response;
pub mod testing;

pub use chain::HandlerChain;
pub use deserialize::OneOrMany;
pub use error::Error;
pub use response::{Response, ResponseSink, SinkError};

use async_trait::async_trait;
use http::Request;
use log::trace;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Request filter result indicating how the current request should be processed further
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RequestFilterResult {
    /// Response has been sent, no further handlers should run.
    ResponseSent,

    /// Request filter could not handle this request, next request filter should run if it exists.
    #[default]
    Unhandled,
}

/// Trait to be implemented by request handlers.
///
/// Handlers receive the request head and a [`Response`]. Status and header changes are buffered
/// by the response until the first body write, so a handler returning
/// [`RequestFilterResult::Unhandled`] leaves the response open for the next handler.
#[async_trait]
pub trait RequestFilter: Debug + Send + Sync {
    /// Handles the current request.
    ///
    /// An error should only be returned in exceptional cases, the handler chain will turn it into
    /// a `500 Internal Server Error` response if nothing has been sent yet.
    async fn request_filter(
        &self,
        request: &Request<()>,
        response: &mut Response<'_>,
    ) -> Result<RequestFilterResult, Error>;
}

#[async_trait]
impl<T> RequestFilter for Box<T>
where
    T: RequestFilter + ?Sized,
{
    async fn request_filter(
        &self,
        request: &Request<()>,
        response: &mut Response<'_>,
    ) -> Result<RequestFilterResult, Error> {
        (**self).request_filter(request, response).await
    }
}

/// Trait for configuration structures that can be loaded from YAML files. This trait has a blanket
/// implementation for any structure implementing [`serde::Deserialize`].
pub trait FromYaml {
    /// Loads configuration from a YAML file.
    fn load_from_yaml<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
        Self: Sized;

    /// Loads configuration from a YAML string.
    fn from_yaml<S>(yaml_conf: S) -> Result<Self, Error>
    where
        S: AsRef<str>,
        Self: Sized;
}

impl<D> FromYaml for D
where
    D: DeserializeOwned + Debug + ?Sized,
{
    fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path.as_ref())
            .map_err(|err| Error::because("failed opening configuration file", err))?;
        let reader = BufReader::new(file);

        let conf = serde_yaml::from_reader(reader)?;
        trace!("Loaded configuration file: {conf:#?}");

        Ok(conf)
    }

    fn from_yaml<S: AsRef<str>>(yaml_conf: S) -> Result<Self, Error> {
        let conf = serde_yaml::from_str(yaml_conf.as_ref())?;
        trace!("Loaded configuration: {conf:#?}");

        Ok(conf)
    }
}
