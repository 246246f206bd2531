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

//! Streaming file contents into a response.

use asset_module_utils::{Error, Response};
use bytes::{Bytes, BytesMut};
use log::{debug, error};
use std::cmp::min;
use std::io::{self, ErrorKind, SeekFrom};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;

const BUFFER_SIZE: usize = 64 * 1024;

/// Number of chunks the reader may get ahead of the client
const READ_AHEAD: usize = 4;

/// Opens a file positioned at `start`. This happens before anything is sent, so that failing to
/// access the file still allows for an error response.
pub(crate) async fn open_file(path: &Path, start: u64) -> Result<File, Error> {
    let mut file = File::open(path)
        .await
        .map_err(|err| Error::because(format!("failed opening file {path:?}"), err))?;

    if start != 0 {
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|err| Error::because(format!("failed seeking in file {path:?}"), err))?;
    }
    Ok(file)
}

/// Reads `len` bytes from the file, passing them on in chunks. Stops as soon as the receiving
/// side is gone.
async fn read_file(mut file: File, len: u64, sender: mpsc::Sender<io::Result<Bytes>>) {
    let mut remaining = len;
    while remaining > 0 {
        let mut buf = BytesMut::zeroed(min(remaining, BUFFER_SIZE as u64) as usize);
        let result = match file.read(buf.as_mut()).await {
            Ok(0) => Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("file ended with {remaining} bytes left to be written"),
            )),
            Ok(read) => {
                buf.truncate(read);
                remaining -= read as u64;
                Ok(buf.freeze())
            }
            Err(err) => Err(err),
        };

        let failed = result.is_err();
        if sender.send(result).await.is_err() || failed {
            return;
        }
    }
}

/// Sends `len` bytes of the file as response body and completes the response.
///
/// Reading happens in a separate task which can only get a few chunks ahead of the client, a
/// slow client slows down reading. If the client goes away or a read fails once the headers are
/// out, the connection is closed and reading stops. An error is only returned if nothing has
/// been sent yet.
pub(crate) async fn file_response(
    response: &mut Response<'_>,
    path: &Path,
    file: File,
    len: u64,
) -> Result<(), Error> {
    let (sender, mut receiver) = mpsc::channel(READ_AHEAD);
    let reader = tokio::spawn(read_file(file, len, sender));

    let mut result = Ok(());
    while let Some(chunk) = receiver.recv().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                result = Err(Error::because(format!("failed reading from {path:?}"), err));
                break;
            }
        };
        if let Err(err) = response.write(chunk).await {
            result = Err(err.into());
            break;
        }
    }

    if result.is_err() {
        reader.abort();
    }
    drop(receiver);

    match result {
        Ok(()) => {
            if let Err(err) = response.end(None).await {
                debug!("failed completing response for {path:?}: {err}");
                response.close();
            }
            Ok(())
        }
        Err(err) if !response.is_committed() => Err(err),
        Err(err) => {
            if err.is_aborted() {
                debug!("client went away while sending {path:?}");
            } else {
                error!("failed sending {path:?}: {err}");
            }
            response.close();
            Ok(())
        }
    }
}
