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

//! A [`ResponseSink`] recording everything written to it, for use in tests.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::time::Duration;

use crate::response::{ResponseSink, SinkError};

/// Records the response instead of sending it anywhere.
///
/// It can simulate a slow client (every body write is delayed) and a client going away after a
/// number of body chunks.
#[derive(Debug, Default)]
pub struct RecordingSink {
    status: Option<StatusCode>,
    headers: HeaderMap,
    chunks: Vec<Bytes>,
    finished: bool,
    closed: bool,
    aborted: bool,
    abort_after: Option<usize>,
    write_delay: Option<Duration>,
}

impl RecordingSink {
    /// Creates a sink accepting everything immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the sink report an aborted connection once the given number of body chunks has been
    /// received.
    pub fn abort_after(mut self, chunks: usize) -> Self {
        self.abort_after = Some(chunks);
        self
    }

    /// Delays every body write by the given duration.
    pub fn write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Status code sent, `None` if headers haven't been sent.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Headers sent.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Value of a header sent, `None` if missing or not a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Number of body chunks received.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Complete body received.
    pub fn body(&self) -> Vec<u8> {
        self.chunks.concat()
    }

    /// Complete body received, converted to a string.
    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body()).into_owned()
    }

    /// Returns `true` if the response has been completed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns `true` if the connection has been torn down.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl ResponseSink for RecordingSink {
    async fn write_head(
        &mut self,
        status: StatusCode,
        headers: HeaderMap,
    ) -> Result<(), SinkError> {
        if self.status.is_some() || self.closed {
            return Err(SinkError::Closed);
        }
        self.status = Some(status);
        self.headers = headers;
        Ok(())
    }

    async fn write_body(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        if self.finished || self.closed {
            return Err(SinkError::Closed);
        }
        if self.aborted
            || self
                .abort_after
                .is_some_and(|limit| self.chunks.len() >= limit)
        {
            self.aborted = true;
            return Err(SinkError::Aborted);
        }
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        self.chunks.push(chunk);
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        self.finished = true;
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_aborted(&self) -> bool {
        self.aborted
    }
}
