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

//! Looking up files: the directory index built on startup and live filesystem probing for
//! development

use asset_module_utils::Error;
use log::{debug, info, trace, warn};
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::metadata::{EntryOptions, FileEntry};
use crate::path::{is_hidden, CandidateList};

/// `Cache-Control` header value for files looked up live, these can change at any time
const DEV_CACHE_CONTROL: &str = "no-cache";

/// Settings shared by both lookup modes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LookupOptions {
    /// Serve files with a path segment starting with a dot (`.well-known` is always served)
    pub dot_files: bool,
    /// Settings for the computed file entries
    pub entry: EntryOptions,
}

/// Converts a path relative to the root directory into a lookup key like `/assets/app.js`.
/// Returns `None` for paths that aren’t valid UTF-8.
fn relative_key(relative: &Path) -> Option<String> {
    let mut key = String::new();
    for component in relative.components() {
        key.push('/');
        key.push_str(component.as_os_str().to_str()?);
    }
    Some(key)
}

/// Map of all files under the root directory, built once and never modified afterwards.
#[derive(Debug, Default, Clone)]
pub struct DirectoryIndex {
    files: HashMap<String, FileEntry>,
}

impl DirectoryIndex {
    /// Walks the root directory recursively and records every regular file (symbolic links are
    /// followed). Hidden files are skipped unless `options.dot_files` is set. Entries that cannot
    /// be read are skipped as well.
    pub fn build(root: &Path, options: &LookupOptions) -> Result<Self, Error> {
        let meta = root
            .metadata()
            .map_err(|err| Error::because(format!("failed accessing root {root:?}"), err))?;
        if !meta.is_dir() {
            return Err(Error::InvalidConfiguration(format!(
                "root {root:?} is not a directory"
            )));
        }

        let mut files = HashMap::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping entry while indexing {root:?}: {err}");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Some(key) = entry
                .path()
                .strip_prefix(root)
                .ok()
                .and_then(relative_key)
            else {
                warn!("skipping file with unsupported name: {:?}", entry.path());
                continue;
            };

            if !options.dot_files && is_hidden(&key) {
                trace!("skipping hidden file {key}");
                continue;
            }

            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(err) => {
                    warn!("skipping {key}, failed reading metadata: {err}");
                    continue;
                }
            };

            let file = FileEntry::new(key.clone(), entry.into_path(), &meta, &options.entry);
            files.insert(key, file);
        }

        info!("indexed {} files under {root:?}", files.len());
        Ok(Self { files })
    }

    /// Looks up a single path.
    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.files.get(path)
    }

    /// Returns the first candidate present in the index.
    pub fn find(&self, candidates: &CandidateList) -> Option<&FileEntry> {
        candidates.iter().find_map(|candidate| self.get(candidate))
    }

    /// Number of files in the index.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if the root directory contained no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterates over all indexed paths, in no particular order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

/// Looks up candidates directly on disk for each request, nothing is cached.
#[derive(Debug, Clone)]
pub struct LiveLookup {
    root: PathBuf,
    options: LookupOptions,
}

impl LiveLookup {
    /// Creates a live lookup for the given root directory. Files found get
    /// `Cache-Control: no-cache` regardless of the configured value.
    pub fn new(root: PathBuf, mut options: LookupOptions) -> Self {
        options.entry.cache_control = Some(DEV_CACHE_CONTROL.to_owned());
        Self { root, options }
    }

    /// Maps a candidate path to a location under the root directory. Every segment has to be a
    /// plain file name, anything else could escape the root.
    fn resolve(&self, candidate: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        for segment in candidate.split('/').filter(|segment| !segment.is_empty()) {
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(name)), None) => path.push(name),
                _ => return None,
            }
        }

        path.starts_with(&self.root).then_some(path)
    }

    /// Checks a single candidate. Directories, missing files and files that cannot be accessed
    /// all produce `None`.
    pub fn check(&self, candidate: &str) -> Option<FileEntry> {
        if !self.options.dot_files && is_hidden(candidate) {
            return None;
        }

        let Some(path) = self.resolve(candidate) else {
            warn!("rejecting path outside the root directory: {candidate}");
            return None;
        };

        match path.metadata() {
            Ok(meta) if meta.is_dir() => None,
            Ok(meta) => Some(FileEntry::new(
                candidate.to_owned(),
                path,
                &meta,
                &self.options.entry,
            )),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                debug!("checking {candidate} failed: {err}");
                None
            }
        }
    }

    /// Returns the first candidate existing on disk.
    pub fn find(&self, candidates: &CandidateList) -> Option<FileEntry> {
        candidates.iter().find_map(|candidate| self.check(candidate))
    }
}

/// The lookup mode of a handler
#[derive(Debug)]
pub enum Lookup {
    /// Production mode: files are looked up in an index built on startup
    Indexed(DirectoryIndex),
    /// Development mode: files are looked up on disk for every request
    Live(LiveLookup),
}

impl Lookup {
    /// Builds the lookup for a root directory, indexing it unless `dev` is set.
    pub fn new(root: PathBuf, options: LookupOptions, dev: bool) -> Result<Self, Error> {
        if dev {
            debug!("using live lookup for {root:?}");
            Ok(Self::Live(LiveLookup::new(root, options)))
        } else {
            Ok(Self::Indexed(DirectoryIndex::build(&root, &options)?))
        }
    }

    /// Returns the first candidate that exists.
    pub fn find(&self, candidates: &CandidateList) -> Option<Cow<'_, FileEntry>> {
        match self {
            Self::Indexed(index) => index.find(candidates).map(Cow::Borrowed),
            Self::Live(live) => live.find(candidates).map(Cow::Owned),
        }
    }
}
