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

#![doc = include_str!("../README.md")]

use asset_files_module::{AssetFilesConf, AssetFilesHandler, AssetFilesOpt, Site, SiteConf};
use asset_module_utils::{Error, FromYaml, HandlerChain, ResponseSink, SinkError};
use async_trait::async_trait;
use bytes::Bytes;
use clap::Parser;
use http::{HeaderMap, Request, StatusCode};
use log::error;
use serde::Deserialize;
use std::path::PathBuf;

/// Resolve request paths through a site configuration
#[derive(Debug, Parser)]
struct Opt {
    /// Configuration file to load
    #[clap(short, long)]
    conf: Option<PathBuf>,

    /// Value of the `Accept-Encoding` header to send
    #[clap(short, long)]
    accept_encoding: Option<String>,

    /// Send `HEAD` requests rather than `GET`
    #[clap(long)]
    head: bool,

    #[clap(flatten)]
    asset_files: AssetFilesOpt,

    /// Request paths to resolve
    #[clap(required = true)]
    paths: Vec<String>,
}

/// The configuration of the inspected site
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Conf {
    site: SiteConf,
    asset_files: AssetFilesConf,
}

/// Keeps the response head, only counts the body
#[derive(Debug, Default)]
struct InspectSink {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body_bytes: usize,
    chunks: usize,
    finished: bool,
    closed: bool,
}

#[async_trait]
impl ResponseSink for InspectSink {
    async fn write_head(
        &mut self,
        status: StatusCode,
        headers: HeaderMap,
    ) -> Result<(), SinkError> {
        self.status = Some(status);
        self.headers = headers;
        Ok(())
    }

    async fn write_body(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        self.body_bytes += chunk.len();
        self.chunks += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        self.finished = true;
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

fn make_chain(conf: Conf) -> Result<HandlerChain, Error> {
    let mut chain = Site::try_from(conf.site)?.into_chain();
    if conf.asset_files.root.is_some() {
        chain.push(AssetFilesHandler::try_from(conf.asset_files)?);
    }
    Ok(chain)
}

fn make_request(opt: &Opt, path: &str) -> Result<Request<()>, http::Error> {
    let mut builder = Request::builder()
        .method(if opt.head { "HEAD" } else { "GET" })
        .uri(path);
    if let Some(accept_encoding) = &opt.accept_encoding {
        builder = builder.header(http::header::ACCEPT_ENCODING, accept_encoding);
    }
    builder.body(())
}

fn print_response(method: &str, path: &str, sink: &InspectSink) {
    match sink.status {
        Some(status) => println!("{method} {path}: {status}"),
        None => println!("{method} {path}: no response"),
    }
    for (name, value) in &sink.headers {
        println!("    {name}: {}", String::from_utf8_lossy(value.as_bytes()));
    }
    println!(
        "    ({} bytes in {} chunks{})",
        sink.body_bytes,
        sink.chunks,
        if sink.closed || !sink.finished {
            ", connection closed"
        } else {
            ""
        }
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let mut opt = Opt::parse();

    let mut conf = match &opt.conf {
        Some(path) => match Conf::load_from_yaml(path) {
            Ok(conf) => conf,
            Err(err) => {
                error!("{err}");
                return;
            }
        },
        None => Conf::default(),
    };
    conf.asset_files
        .merge_with_opt(std::mem::take(&mut opt.asset_files));

    let chain = match make_chain(conf) {
        Ok(chain) => chain,
        Err(err) => {
            error!("{err}");
            return;
        }
    };
    if chain.is_empty() {
        error!("No directories configured, use --conf or --root");
        return;
    }

    let method = if opt.head { "HEAD" } else { "GET" };
    for path in &opt.paths {
        let request = match make_request(&opt, path) {
            Ok(request) => request,
            Err(err) => {
                error!("Invalid request path {path}: {err}");
                continue;
            }
        };

        let mut sink = InspectSink::default();
        chain.handle(&request, &mut sink).await;
        print_response(method, path, &sink);
    }
}
