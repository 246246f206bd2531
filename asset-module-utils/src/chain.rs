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

//! Ordered chain of request handlers

use async_trait::async_trait;
use bytes::Bytes;
use http::{header, Request, StatusCode};
use log::{debug, error, warn};

use crate::response::{Response, ResponseSink};
use crate::standard_response::error_response;
use crate::{Error, RequestFilter, RequestFilterResult};

/// A list of handlers tried in order until one of them sends a response.
///
/// A chain is itself a [`RequestFilter`], it returns [`RequestFilterResult::Unhandled`] if none of
/// its handlers produced a response. [`HandlerChain::handle`] is meant to be called by the
/// transport, it will respond with `404 Not Found` if no handler matched and with
/// `500 Internal Server Error` if a handler failed.
#[derive(Debug)]
pub struct HandlerChain {
    handlers: Vec<Box<dyn RequestFilter>>,
    expose_errors: bool,
}

impl Default for HandlerChain {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerChain {
    /// Creates an empty chain. Error details are exposed in responses for debug builds only.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            expose_errors: cfg!(debug_assertions),
        }
    }

    /// Appends a handler to the end of the chain.
    pub fn push(&mut self, handler: impl RequestFilter + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Builder-style version of [`HandlerChain::push`].
    pub fn with(mut self, handler: impl RequestFilter + 'static) -> Self {
        self.push(handler);
        self
    }

    /// Determines whether `500 Internal Server Error` responses contain the error description
    /// rather than a generic page.
    pub fn expose_errors(mut self, expose_errors: bool) -> Self {
        self.expose_errors = expose_errors;
        self
    }

    /// Number of handlers in the chain.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if the chain has no handlers.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs the request through the chain and makes sure that some response is produced.
    pub async fn handle(&self, request: &Request<()>, sink: &mut dyn ResponseSink) {
        let mut response = Response::new(sink);
        match self.request_filter(request, &mut response).await {
            Ok(RequestFilterResult::ResponseSent) => {}
            Ok(RequestFilterResult::Unhandled) => {
                debug!("no handler responded to {}", request.uri().path());
                if let Err(err) = error_response(request, &mut response, StatusCode::NOT_FOUND).await
                {
                    warn!("failed sending Not Found response: {err}");
                }
            }
            Err(err) => self.handle_error(request, &mut response, err).await,
        }
    }

    async fn handle_error(&self, request: &Request<()>, response: &mut Response<'_>, err: Error) {
        if err.is_aborted() {
            debug!("client went away while handling {}", request.uri().path());
            response.close();
            return;
        }

        error!("request handler failed for {}: {err}", request.uri().path());
        if response.is_committed() {
            // Too late for an error page
            response.close();
            return;
        }

        let result = if self.expose_errors {
            text_response(response, StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).await
        } else {
            error_response(request, response, StatusCode::INTERNAL_SERVER_ERROR).await
        };

        if let Err(err) = result {
            warn!("failed sending error response: {err}");
            response.close();
        }
    }
}

/// Responds with a plain text body, discarding any status and headers set previously.
async fn text_response(
    response: &mut Response<'_>,
    status: StatusCode,
    text: String,
) -> Result<(), Error> {
    response.reset();
    response.set_status(status);
    response.insert_header(header::CONTENT_LENGTH, text.len())?;
    response.insert_header(header::CONTENT_TYPE, "text/plain; charset=utf-8")?;
    response.end(Some(Bytes::from(text))).await?;
    Ok(())
}

#[async_trait]
impl RequestFilter for HandlerChain {
    async fn request_filter(
        &self,
        request: &Request<()>,
        response: &mut Response<'_>,
    ) -> Result<RequestFilterResult, Error> {
        for handler in &self.handlers {
            if handler.request_filter(request, response).await? == RequestFilterResult::ResponseSent
            {
                return Ok(RequestFilterResult::ResponseSent);
            }
        }
        Ok(RequestFilterResult::Unhandled)
    }
}
