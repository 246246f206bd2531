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

//! Standard responses for various conditions

use bytes::Bytes;
use http::{header, Method, Request, StatusCode};
use maud::{html, DOCTYPE};

use crate::response::Response;
use crate::Error;

/// Produces the text of a standard response page for the given status code.
pub fn response_text(status: StatusCode) -> String {
    let status_str = status.as_str();
    let reason = status.canonical_reason().unwrap_or("");
    html! {
        (DOCTYPE)
        html {
            head {
                title {
                    (status_str) " " (reason)
                }
            }

            body {
                center {
                    h1 {
                        (status_str) " " (reason)
                    }
                }
            }
        }
    }
    .into()
}

/// Responds with a standard error page for the given status code. Any status and headers set
/// previously are discarded.
pub async fn error_response(
    request: &Request<()>,
    response: &mut Response<'_>,
    status: StatusCode,
) -> Result<(), Error> {
    let text = response_text(status);

    response.reset();
    response.set_status(status);
    response.insert_header(header::CONTENT_LENGTH, text.len())?;
    response.insert_header(header::CONTENT_TYPE, "text/html; charset=utf-8")?;

    if request.method() == Method::HEAD {
        response.end(None).await?;
    } else {
        response.end(Some(Bytes::from(text))).await?;
    }
    Ok(())
}
