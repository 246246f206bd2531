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

//! Buffered responses on top of a transport-provided sink

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, IntoHeaderName};
use http::StatusCode;
use log::warn;
use std::fmt::{Debug, Display};
use std::io;

use crate::Error;

/// Errors reported by a [`ResponseSink`]
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The client closed the connection
    #[error("connection aborted by client")]
    Aborted,
    /// The response has already been ended or closed
    #[error("response already finished")]
    Closed,
    /// The transport failed
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The transport side of a response.
///
/// Implementations are provided by whatever server accepts the connections. Writing the body is
/// asynchronous: the future returned by [`ResponseSink::write_body`] should only resolve once the
/// transport can accept more data. This is how backpressure from a slow client reaches the code
/// producing the body.
#[async_trait]
pub trait ResponseSink: Send {
    /// Sends status line and headers. This is called at most once per response.
    async fn write_head(&mut self, status: StatusCode, headers: HeaderMap)
        -> Result<(), SinkError>;

    /// Sends a chunk of the response body, resolving once the sink is writable again. Returns
    /// [`SinkError::Aborted`] if the client went away.
    async fn write_body(&mut self, chunk: Bytes) -> Result<(), SinkError>;

    /// Completes the response.
    async fn finish(&mut self) -> Result<(), SinkError>;

    /// Tears down the connection without completing the response. Must not fail, closing an
    /// already closed connection is a no-op.
    fn close(&mut self);

    /// Returns `true` if the client is known to have closed the connection.
    fn is_aborted(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending,
    Committed,
    Finished,
}

/// A response under construction.
///
/// Status and headers are only kept in memory until the first call to [`Response::write`] or
/// [`Response::end`], at which point they are flushed to the sink. Until then any handler can
/// still replace them.
pub struct Response<'a> {
    sink: &'a mut dyn ResponseSink,
    status: StatusCode,
    headers: HeaderMap,
    state: State,
}

impl Debug for Response<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("state", &self.state)
            .finish()
    }
}

impl<'a> Response<'a> {
    /// Creates a pending `200 OK` response without headers.
    pub fn new(sink: &'a mut dyn ResponseSink) -> Self {
        Self {
            sink,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            state: State::Pending,
        }
    }

    /// The status code that has been set (or sent) for this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Changes the response status. Ignored once the headers have been sent.
    pub fn set_status(&mut self, status: StatusCode) {
        if self.state != State::Pending {
            warn!("ignoring status change to {status}, headers already sent");
            return;
        }
        self.status = status;
    }

    /// Headers that will be sent with the response.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Sets a header, replacing any previous values. Ignored once the headers have been sent.
    pub fn insert_header<N, V>(&mut self, name: N, value: V) -> Result<(), Error>
    where
        N: IntoHeaderName,
        V: TryInto<HeaderValue>,
        V::Error: Display,
    {
        let value = value
            .try_into()
            .map_err(|err| Error::InvalidHeader(err.to_string()))?;
        if self.state != State::Pending {
            warn!("ignoring header change, headers already sent");
            return Ok(());
        }
        self.headers.insert(name, value);
        Ok(())
    }

    /// Removes a header from the pending response.
    pub fn remove_header(&mut self, name: &HeaderName) {
        if self.state == State::Pending {
            self.headers.remove(name);
        }
    }

    /// Discards the pending status and headers, going back to `200 OK` without headers. Does
    /// nothing once the headers have been sent.
    pub fn reset(&mut self) {
        if self.state != State::Pending {
            warn!("ignoring response reset, headers already sent");
            return;
        }
        self.status = StatusCode::OK;
        self.headers.clear();
    }

    /// Returns `true` once the status and headers have been passed on to the sink.
    pub fn is_committed(&self) -> bool {
        self.state != State::Pending
    }

    /// Returns `true` once the response has been ended or closed.
    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    /// Returns `true` if the client went away.
    pub fn is_aborted(&self) -> bool {
        self.sink.is_aborted()
    }

    async fn commit(&mut self) -> Result<(), SinkError> {
        match self.state {
            State::Pending => {
                self.state = State::Committed;
                let headers = std::mem::take(&mut self.headers);
                self.sink.write_head(self.status, headers).await
            }
            State::Committed => Ok(()),
            State::Finished => Err(SinkError::Closed),
        }
    }

    /// Writes a chunk of the body, sending headers first if necessary. The future resolves once
    /// the sink accepted the data.
    pub async fn write(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        self.commit().await?;
        if chunk.is_empty() {
            return Ok(());
        }
        self.sink.write_body(chunk).await
    }

    /// Completes the response, sending headers first if necessary.
    pub async fn end(&mut self, chunk: Option<Bytes>) -> Result<(), SinkError> {
        self.commit().await?;
        if let Some(chunk) = chunk.filter(|chunk| !chunk.is_empty()) {
            self.sink.write_body(chunk).await?;
        }
        self.state = State::Finished;
        self.sink.finish().await
    }

    /// Closes the connection without completing the response.
    pub fn close(&mut self) {
        self.state = State::Finished;
        self.sink.close();
    }
}
