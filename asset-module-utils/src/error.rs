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

//! Error type shared by the handlers

use std::io;

use crate::response::SinkError;

/// Errors produced while configuring handlers or processing requests
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Filesystem access failed
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted when the error occurred
        context: String,
        /// The underlying I/O error
        source: io::Error,
    },

    /// Configuration could not be parsed
    #[error("failed parsing configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    /// Configuration was parsed but contains unusable values
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A header value could not be represented in HTTP
    #[error("invalid header value: {0}")]
    InvalidHeader(String),

    /// Writing the response failed
    #[error("failed writing response: {0}")]
    Sink(#[from] SinkError),

    /// A request handler failed in an unexpected way
    #[error("{0}")]
    Handler(String),
}

impl Error {
    /// Wraps an I/O error, adding some context.
    pub fn because(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Checks whether the error was caused by the client going away.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Sink(SinkError::Aborted))
    }
}
