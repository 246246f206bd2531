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

//! Serving a site made up of several build output directories.

use asset_module_utils::{Error, HandlerChain, RequestFilter};
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::configuration::AssetFilesConf;
use crate::handler::AssetFilesHandler;

/// Directories a site build produces, tried in this order: client build output, static files,
/// prerendered pages.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SiteConf {
    /// Client build output. Files under `/{app_dir}/immutable/` are content-hashed and cached
    /// for a year.
    pub client: Option<PathBuf>,

    /// Static files copied into the site unchanged
    #[serde(rename = "static")]
    pub static_dir: Option<PathBuf>,

    /// Prerendered pages
    pub prerendered: Option<PathBuf>,

    /// Name of the directory holding the client build output
    pub app_dir: String,

    /// Look up files on disk for every request
    pub dev: bool,

    /// Put error descriptions into `500 Internal Server Error` responses. Defaults to `true` in
    /// debug builds.
    pub expose_errors: Option<bool>,
}

impl Default for SiteConf {
    fn default() -> Self {
        Self {
            client: None,
            static_dir: None,
            prerendered: None,
            app_dir: "_app".to_owned(),
            dev: false,
            expose_errors: None,
        }
    }
}

impl SiteConf {
    fn root_conf(&self, root: &Path) -> AssetFilesConf {
        AssetFilesConf {
            root: Some(root.to_path_buf()),
            etag: true,
            gzip: true,
            brotli: true,
            dev: self.dev,
            ..Default::default()
        }
    }

    /// Handler configurations for the configured directories, in lookup order.
    pub fn root_confs(&self) -> Vec<AssetFilesConf> {
        let mut confs = Vec::new();
        if let Some(client) = &self.client {
            let mut conf = self.root_conf(client);
            conf.immutable_prefix = Some(format!("/{}/immutable/", self.app_dir.trim_matches('/')));
            confs.push(conf);
        }
        if let Some(static_dir) = &self.static_dir {
            confs.push(self.root_conf(static_dir));
        }
        if let Some(prerendered) = &self.prerendered {
            confs.push(self.root_conf(prerendered));
        }
        confs
    }
}

/// A handler chain for a site: one [`AssetFilesHandler`] per directory, optionally followed by
/// a handler for dynamic content.
#[derive(Debug)]
pub struct Site {
    chain: HandlerChain,
}

impl TryFrom<SiteConf> for Site {
    type Error = Error;

    fn try_from(conf: SiteConf) -> Result<Self, Self::Error> {
        let mut chain = HandlerChain::new();
        if let Some(expose_errors) = conf.expose_errors {
            chain = chain.expose_errors(expose_errors);
        }

        for root_conf in conf.root_confs() {
            chain.push(AssetFilesHandler::try_from(root_conf)?);
        }

        debug!("Initialized site with {} directories", chain.len());
        Ok(Self { chain })
    }
}

impl Site {
    /// Appends the handler for requests not matching any file.
    pub fn with_dynamic(mut self, handler: impl RequestFilter + 'static) -> Self {
        self.chain.push(handler);
        self
    }

    /// The handler chain, call [`HandlerChain::handle`] on it for each request.
    pub fn chain(&self) -> &HandlerChain {
        &self.chain
    }

    /// Converts the site into its handler chain.
    pub fn into_chain(self) -> HandlerChain {
        self.chain
    }
}
