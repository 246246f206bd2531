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

//! Deserialization helpers

use serde::Deserialize;
use std::fmt::Debug;
use std::ops::{Deref, DerefMut};

/// Accepted representations of a list in a configuration file
#[derive(Deserialize)]
#[serde(untagged)]
enum ListRepr<T> {
    Many(Vec<T>),
    One(T),
    Empty(()),
}

/// A list that can be written as a single value in configuration files.
///
/// `extensions: html` and `extensions: [html]` produce the same result, a `null` value produces
/// an empty list.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "ListRepr<T>")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct OneOrMany<T> {
    inner: Vec<T>,
}

impl<T> From<ListRepr<T>> for OneOrMany<T> {
    fn from(repr: ListRepr<T>) -> Self {
        let inner = match repr {
            ListRepr::Many(list) => list,
            ListRepr::One(value) => vec![value],
            ListRepr::Empty(()) => Vec::new(),
        };
        Self { inner }
    }
}

impl<T> OneOrMany<T> {
    /// Unwraps the list
    pub fn into_inner(self) -> Vec<T> {
        self.inner
    }
}

impl<T: Debug> Debug for OneOrMany<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self { inner: Vec::new() }
    }
}

impl<T> Deref for OneOrMany<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> DerefMut for OneOrMany<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(inner: Vec<T>) -> Self {
        Self { inner }
    }
}

impl<'a, T> IntoIterator for &'a OneOrMany<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}
