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

use crate::metadata::{content_type, EntryOptions, FileEntry};
use crate::{AssetFilesConf, AssetFilesHandler, Site, SiteConf};

use asset_module_utils::standard_response::response_text;
use asset_module_utils::testing::RecordingSink;
use asset_module_utils::{
    Error, FromYaml, HandlerChain, RequestFilter, RequestFilterResult, Response,
};
use async_trait::async_trait;
use bytes::Bytes;
use const_format::{concatcp, str_repeat};
use http::{header, Request, StatusCode};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use test_log::test;

fn root_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("testdata");
    path.push("root");
    if !filename.is_empty() {
        path.push(filename);
    }
    path
}

fn default_conf() -> String {
    format!(
        "root: {}\netag: true",
        root_path("").into_os_string().into_string().unwrap()
    )
}

fn extended_conf(conf_str: impl AsRef<str>) -> String {
    format!("{}\n{}", default_conf(), conf_str.as_ref())
}

fn dir_conf(dir: &Path, conf_str: &str) -> String {
    format!(
        "root: {}\netag: true\n{conf_str}",
        dir.to_str().unwrap()
    )
}

fn make_chain(conf_str: impl AsRef<str>) -> HandlerChain {
    let conf = AssetFilesConf::from_yaml(conf_str).unwrap();
    HandlerChain::new()
        .expose_errors(false)
        .with(AssetFilesHandler::try_from(conf).unwrap())
}

fn make_request(method: &str, path: &str, headers: &[(&str, &str)]) -> Request<()> {
    let mut builder = Request::builder().method(method).uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(()).unwrap()
}

async fn send(chain: &HandlerChain, request: Request<()>, mut sink: RecordingSink) -> RecordingSink {
    chain.handle(&request, &mut sink).await;
    sink
}

async fn fetch(chain: &HandlerChain, path: &str, headers: &[(&str, &str)]) -> RecordingSink {
    send(chain, make_request("GET", path, headers), RecordingSink::new()).await
}

fn entry(path: &Path) -> FileEntry {
    FileEntry::new(
        String::new(),
        path.to_path_buf(),
        &fs::metadata(path).unwrap(),
        &EntryOptions {
            etag: true,
            cache_control: None,
        },
    )
}

fn assert_status(sink: &RecordingSink, expected: u16) {
    assert_eq!(sink.status().map(|status| status.as_u16()), Some(expected));
}

fn assert_headers(sink: &RecordingSink, expected: Vec<(&str, &str)>) {
    let mut headers: Vec<_> = sink
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_ascii_lowercase(),
                value.to_str().unwrap().to_owned(),
            )
        })
        .collect();
    headers.sort();

    let mut expected: Vec<_> = expected
        .into_iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.to_owned()))
        .collect();
    expected.sort();

    assert_eq!(headers, expected);
}

fn assert_not_found(sink: &RecordingSink) {
    assert_status(sink, 404);
    assert_eq!(sink.body_str(), response_text(StatusCode::NOT_FOUND));
}

#[test(tokio::test)]
async fn unconfigured() {
    let chain = make_chain("root:");
    let sink = fetch(&chain, "/file.txt", &[]).await;
    assert_not_found(&sink);
}

#[test(tokio::test)]
async fn missing_root() {
    let conf = AssetFilesConf::from_yaml("root: /this/directory/does/not/exist").unwrap();
    assert!(AssetFilesHandler::try_from(conf).is_err());
}

#[test(tokio::test)]
async fn text_file() {
    let meta = entry(&root_path("file.txt"));

    let chain = make_chain(default_conf());
    let sink = fetch(&chain, "/file.txt", &[]).await;
    assert_status(&sink, 200);
    assert_headers(
        &sink,
        vec![
            ("Content-Length", "4"),
            ("accept-ranges", "bytes"),
            ("Content-Type", "text/plain;charset=utf-8"),
            ("last-modified", &meta.last_modified),
            ("etag", meta.etag.as_deref().unwrap()),
        ],
    );
    assert_eq!(sink.body_str(), "Hi!\n");
    assert!(sink.is_finished());

    let meta = entry(&root_path("large.txt"));
    let sink = fetch(&chain, "/large.txt", &[]).await;
    assert_status(&sink, 200);
    assert_headers(
        &sink,
        vec![
            ("Content-Length", &meta.size.to_string()),
            ("accept-ranges", "bytes"),
            ("Content-Type", "text/plain;charset=utf-8"),
            ("last-modified", &meta.last_modified),
            ("etag", meta.etag.as_deref().unwrap()),
        ],
    );
    assert_eq!(
        sink.body_str(),
        concatcp!(str_repeat!("0123456789", 10000), "\n")
    );
    assert!(sink.chunk_count() > 1);
}

#[test(tokio::test)]
async fn empty_file() {
    let chain = make_chain(default_conf());
    let sink = fetch(&chain, "/empty.txt", &[]).await;
    assert_status(&sink, 200);
    assert_eq!(sink.header("Content-Length"), Some("0"));
    assert_eq!(sink.body_str(), "");
    assert!(sink.is_finished());

    let sink = fetch(&chain, "/empty.txt", &[("Range", "bytes=0-0")]).await;
    assert_status(&sink, 416);
    assert_eq!(sink.header("Content-Range"), Some("bytes */0"));
}

#[test(tokio::test)]
async fn dir_index_and_extensions() {
    let chain = make_chain(default_conf());

    for (path, expected) in [
        ("/", "<html>Hi!</html>\n"),
        ("/index.html", "<html>Hi!</html>\n"),
        ("/about", "<html>About</html>\n"),
        ("/about/", "<html>About</html>\n"),
        ("/docs", "<html>Docs</html>\n"),
        ("/docs/", "<html>Docs</html>\n"),
        ("/subdir/page", "sub\n"),
    ] {
        let sink = fetch(&chain, path, &[]).await;
        assert_status(&sink, 200);
        assert_eq!(sink.header("Content-Type"), Some("text/html;charset=utf-8"));
        assert_eq!(sink.body_str(), expected, "{path}");
    }

    let sink = fetch(&chain, "/missing", &[]).await;
    assert_not_found(&sink);

    // Only the configured extensions are tried
    let chain = make_chain(extended_conf("extensions: [htm]"));
    let sink = fetch(&chain, "/about", &[]).await;
    assert_not_found(&sink);
    let sink = fetch(&chain, "/subdir/page", &[]).await;
    assert_status(&sink, 200);
}

#[test(tokio::test)]
async fn percent_encoding() {
    let chain = make_chain(default_conf());
    let sink = fetch(&chain, "/file%2Etxt", &[]).await;
    assert_status(&sink, 200);
    assert_eq!(sink.body_str(), "Hi!\n");

    let sink = fetch(&chain, "/%61bout", &[]).await;
    assert_eq!(sink.body_str(), "<html>About</html>\n");
}

#[test(tokio::test)]
async fn precompressed() {
    let meta = entry(&root_path("assets/app.js.br"));
    let js_type = content_type("app.js");

    let chain = make_chain(extended_conf("gzip: true\nbrotli: true"));
    let sink = fetch(&chain, "/assets/app.js", &[("Accept-Encoding", "br, gzip")]).await;
    assert_status(&sink, 200);
    assert_headers(
        &sink,
        vec![
            ("Content-Length", "200"),
            ("Content-Encoding", "br"),
            ("Content-Type", &js_type),
            ("Vary", "Accept-Encoding"),
            ("accept-ranges", "bytes"),
            ("last-modified", &meta.last_modified),
            ("etag", meta.etag.as_deref().unwrap()),
        ],
    );
    assert_eq!(sink.body(), fs::read(root_path("assets/app.js.br")).unwrap());

    let sink = fetch(&chain, "/assets/app.js", &[("Accept-Encoding", "gzip, deflate")]).await;
    assert_eq!(sink.header("Content-Encoding"), Some("gzip"));
    assert_eq!(sink.header("Content-Length"), Some("250"));
    assert_eq!(sink.header("Content-Type"), Some(js_type.as_str()));

    // Client preference doesn't matter, Brotli is tried first
    let sink = fetch(&chain, "/assets/app.js", &[("Accept-Encoding", "gzip;q=1, br;q=0.5")]).await;
    assert_eq!(sink.header("Content-Encoding"), Some("br"));

    let sink = fetch(&chain, "/assets/app.js", &[("Accept-Encoding", "br;q=0, gzip")]).await;
    assert_eq!(sink.header("Content-Encoding"), Some("gzip"));

    let sink = fetch(&chain, "/assets/app.js", &[]).await;
    assert_eq!(sink.header("Content-Encoding"), None);
    assert_eq!(sink.header("Content-Length"), Some("20"));
    assert_eq!(sink.header("Vary"), Some("Accept-Encoding"));
    assert_eq!(sink.body_str(), "console.log(\"app\");\n");

    // Extension resolution also finds compressed documents
    let sink = fetch(&chain, "/", &[("Accept-Encoding", "gzip")]).await;
    assert_eq!(sink.header("Content-Encoding"), Some("gzip"));
    assert_eq!(sink.header("Content-Type"), Some("text/html;charset=utf-8"));
    assert_eq!(sink.header("Content-Length"), Some("32"));

    // Compressed files aren't served unless enabled
    let chain = make_chain(default_conf());
    let sink = fetch(&chain, "/assets/app.js", &[("Accept-Encoding", "br, gzip")]).await;
    assert_eq!(sink.header("Content-Encoding"), None);
    assert_eq!(sink.header("Vary"), None);
    assert_eq!(sink.header("Content-Length"), Some("20"));
}

#[test(tokio::test)]
async fn if_none_match() {
    let meta = entry(&root_path("file.txt"));
    let etag = meta.etag.as_deref().unwrap();

    let chain = make_chain(default_conf());
    let sink = fetch(&chain, "/file.txt", &[("If-None-Match", etag)]).await;
    assert_status(&sink, 304);
    assert_headers(&sink, vec![]);
    assert_eq!(sink.body_str(), "");
    assert!(sink.is_finished());

    // Conditional check wins over the range check
    let sink = fetch(
        &chain,
        "/file.txt",
        &[("If-None-Match", etag), ("Range", "bytes=0-1")],
    )
    .await;
    assert_status(&sink, 304);

    let list = format!("W/\"1-2\", {etag}");
    let sink = fetch(&chain, "/file.txt", &[("If-None-Match", list.as_str())]).await;
    assert_status(&sink, 304);

    let sink = fetch(&chain, "/file.txt", &[("If-None-Match", "*")]).await;
    assert_status(&sink, 304);

    let sink = fetch(&chain, "/file.txt", &[("If-None-Match", "W/\"1-2\"")]).await;
    assert_status(&sink, 200);
    assert_eq!(sink.body_str(), "Hi!\n");

    // Without ETag support nothing is conditional
    let root = root_path("");
    let chain = make_chain(format!("root: {}", root.to_str().unwrap()));
    let sink = fetch(&chain, "/file.txt", &[("If-None-Match", etag)]).await;
    assert_status(&sink, 200);
    assert_eq!(sink.header("ETag"), None);
}

#[test(tokio::test)]
async fn ranges() {
    let meta = entry(&root_path("file.txt"));
    let chain = make_chain(default_conf());

    let sink = fetch(&chain, "/file.txt", &[("Range", "bytes=0-1")]).await;
    assert_status(&sink, 206);
    assert_headers(
        &sink,
        vec![
            ("Content-Length", "2"),
            ("Content-Range", "bytes 0-1/4"),
            ("accept-ranges", "bytes"),
            ("Content-Type", "text/plain;charset=utf-8"),
            ("last-modified", &meta.last_modified),
            ("etag", meta.etag.as_deref().unwrap()),
        ],
    );
    assert_eq!(sink.body_str(), "Hi");

    let sink = fetch(&chain, "/file.txt", &[("Range", "bytes=-2")]).await;
    assert_status(&sink, 206);
    assert_eq!(sink.header("Content-Range"), Some("bytes 2-3/4"));
    assert_eq!(sink.body_str(), "!\n");

    let sink = fetch(&chain, "/file.txt", &[("Range", "bytes=1-")]).await;
    assert_status(&sink, 206);
    assert_eq!(sink.body_str(), "i!\n");

    let sink = fetch(&chain, "/large.txt", &[("Range", "bytes=99995-99999")]).await;
    assert_status(&sink, 206);
    assert_eq!(sink.header("Content-Range"), Some("bytes 99995-99999/100001"));
    assert_eq!(sink.body_str(), "56789");

    let sink = fetch(&chain, "/file.txt", &[("Range", "bytes=10-20")]).await;
    assert_status(&sink, 416);
    assert_eq!(sink.header("Content-Range"), Some("bytes */4"));
    assert_eq!(sink.body_str(), "");

    let sink = fetch(&chain, "/file.txt", &[("Range", "bytes=2-10")]).await;
    assert_status(&sink, 416);

    // Unsupported range formats produce the full file
    let sink = fetch(&chain, "/file.txt", &[("Range", "bytes=0-1,2-3")]).await;
    assert_status(&sink, 200);
    assert_eq!(sink.body_str(), "Hi!\n");

    // If-Range has to match for the range to apply
    let etag = meta.etag.as_deref().unwrap();
    let sink = fetch(
        &chain,
        "/file.txt",
        &[("Range", "bytes=0-1"), ("If-Range", etag)],
    )
    .await;
    assert_status(&sink, 206);

    let sink = fetch(
        &chain,
        "/file.txt",
        &[("Range", "bytes=0-1"), ("If-Range", "W/\"1-2\"")],
    )
    .await;
    assert_status(&sink, 200);
    assert_eq!(sink.body_str(), "Hi!\n");
}

#[test(tokio::test)]
async fn single_page_fallback() {
    let chain = make_chain(extended_conf("single: true"));

    let index = fetch(&chain, "/", &[]).await;
    for path in ["/dashboard", "/users/42/settings", "/route%20with%20spaces"] {
        let sink = fetch(&chain, path, &[]).await;
        assert_status(&sink, 200);
        assert_eq!(sink.headers(), index.headers(), "{path}");
        assert_eq!(sink.body(), index.body(), "{path}");
    }

    // Existing files are served as usual
    let sink = fetch(&chain, "/about", &[]).await;
    assert_eq!(sink.body_str(), "<html>About</html>\n");

    // Asset-like paths don't fall back
    let sink = fetch(&chain, "/logo.png", &[]).await;
    assert_not_found(&sink);
    let sink = fetch(&chain, "/assets/missing.js", &[]).await;
    assert_not_found(&sink);
    let sink = fetch(&chain, "/.well-known/missing", &[]).await;
    assert_not_found(&sink);

    // Conditional requests work for the fallback document
    let etag = index.header("ETag").unwrap().to_owned();
    let sink = fetch(&chain, "/dashboard", &[("If-None-Match", etag.as_str())]).await;
    assert_status(&sink, 304);
}

#[test(tokio::test)]
async fn named_fallback() {
    let chain = make_chain(extended_conf("single: 200.html\nignores: ['^/api/']"));

    let sink = fetch(&chain, "/dashboard", &[]).await;
    assert_status(&sink, 200);
    assert_eq!(sink.body_str(), "<html>Fallback</html>\n");

    let sink = fetch(&chain, "/API/users", &[]).await;
    assert_not_found(&sink);

    let chain = make_chain(extended_conf("single: true\ndefault_ignores: false"));
    let sink = fetch(&chain, "/logo.png", &[]).await;
    assert_status(&sink, 200);
    assert_eq!(sink.body_str(), "<html>Hi!</html>\n");
}

#[test(tokio::test)]
async fn invalid_ignore_pattern() {
    let conf = AssetFilesConf::from_yaml(extended_conf("ignores: ['[unclosed']")).unwrap();
    assert!(AssetFilesHandler::try_from(conf).is_err());
}

#[test(tokio::test)]
async fn traversal() {
    for single in ["false", "true"] {
        let chain = make_chain(extended_conf(format!("single: {single}")));
        for path in [
            "/../Cargo.toml",
            "/%2e%2e/Cargo.toml",
            "/docs/../../Cargo.toml",
            "/..%2fCargo.toml",
            "/%2e%2e%2f%2e%2e%2fCargo.toml",
        ] {
            let sink = fetch(&chain, path, &[]).await;
            assert_not_found(&sink);
        }
    }

    // Dot segments inside the root are fine
    let chain = make_chain(default_conf());
    let sink = fetch(&chain, "/docs/../file.txt", &[]).await;
    assert_status(&sink, 200);
    assert_eq!(sink.body_str(), "Hi!\n");
}

#[test(tokio::test)]
async fn dot_files() {
    for dev in [false, true] {
        let chain = make_chain(extended_conf(format!("dev: {dev}")));
        for path in ["/.env", "/private/.key", "/%2Eenv"] {
            let sink = fetch(&chain, path, &[]).await;
            assert_not_found(&sink);
        }

        let sink = fetch(&chain, "/.well-known/security.txt", &[]).await;
        assert_status(&sink, 200);
        assert_eq!(
            sink.body_str(),
            "Contact: mailto:security@example.com\n"
        );

        let chain = make_chain(extended_conf(format!("dev: {dev}\ndot_files: true")));
        let sink = fetch(&chain, "/.env", &[]).await;
        assert_status(&sink, 200);
        let sink = fetch(&chain, "/private/.key", &[]).await;
        assert_status(&sink, 200);
    }
}

#[test(tokio::test)]
async fn head_request() {
    let chain = make_chain(default_conf());
    let get = fetch(&chain, "/file.txt", &[]).await;
    let head = send(&chain, make_request("HEAD", "/file.txt", &[]), RecordingSink::new()).await;

    assert_status(&head, 200);
    assert_eq!(head.headers(), get.headers());
    assert_eq!(head.body_str(), "");
    assert!(head.is_finished());

    let sink = send(&chain, make_request("HEAD", "/missing", &[]), RecordingSink::new()).await;
    assert_status(&sink, 404);
    assert_eq!(sink.body_str(), "");
}

#[test(tokio::test)]
async fn other_methods() {
    let chain = make_chain(default_conf());
    for method in ["POST", "PUT", "DELETE"] {
        let sink = send(&chain, make_request(method, "/file.txt", &[]), RecordingSink::new()).await;
        assert_not_found(&sink);
    }
}

#[test(tokio::test)]
async fn cache_control() {
    let chain = make_chain(extended_conf("max_age: 60\nimmutable_prefix: /assets/"));

    let sink = fetch(&chain, "/file.txt", &[]).await;
    assert_eq!(sink.header("Cache-Control"), Some("public,max-age=60"));

    let sink = fetch(&chain, "/assets/app.js", &[]).await;
    assert_eq!(
        sink.header("Cache-Control"),
        Some("public,max-age=31536000,immutable")
    );

    let chain = make_chain(extended_conf("max_age: 0"));
    let sink = fetch(&chain, "/file.txt", &[]).await;
    assert_eq!(
        sink.header("Cache-Control"),
        Some("public,max-age=0,must-revalidate")
    );

    let chain = make_chain(extended_conf("max_age: 3600\nimmutable: true"));
    let sink = fetch(&chain, "/file.txt", &[]).await;
    assert_eq!(
        sink.header("Cache-Control"),
        Some("public,max-age=3600,immutable")
    );

    let chain = make_chain(extended_conf("max_age: 3600\ndev: true"));
    let sink = fetch(&chain, "/file.txt", &[]).await;
    assert_eq!(sink.header("Cache-Control"), Some("no-cache"));
}

fn touch(path: &Path, contents: &str, modified: SystemTime) {
    fs::write(path, contents).unwrap();
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(modified)
        .unwrap();
}

#[test(tokio::test)]
async fn production_mode_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.txt");
    let start = SystemTime::now() - Duration::from_secs(3600);
    touch(&path, "first", start);

    let chain = make_chain(dir_conf(dir.path(), ""));
    let first = fetch(&chain, "/data.txt", &[]).await;
    assert_status(&first, 200);

    touch(&path, "later", start + Duration::from_secs(60));
    let second = fetch(&chain, "/data.txt", &[]).await;
    assert_eq!(second.header("ETag"), first.header("ETag"));
    assert_eq!(second.header("Last-Modified"), first.header("Last-Modified"));

    // Files added after indexing are unknown
    fs::write(dir.path().join("new.txt"), "new").unwrap();
    let sink = fetch(&chain, "/new.txt", &[]).await;
    assert_not_found(&sink);
}

#[test(tokio::test)]
async fn dev_mode_live_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.txt");
    let start = SystemTime::now() - Duration::from_secs(3600);
    touch(&path, "first", start);

    let chain = make_chain(dir_conf(dir.path(), "dev: true"));
    let first = fetch(&chain, "/data.txt", &[]).await;
    assert_status(&first, 200);
    assert_eq!(first.body_str(), "first");
    assert_eq!(first.header("Cache-Control"), Some("no-cache"));

    touch(&path, "second!", start + Duration::from_secs(60));
    let second = fetch(&chain, "/data.txt", &[]).await;
    assert_eq!(second.body_str(), "second!");
    assert_ne!(second.header("ETag"), first.header("ETag"));
    assert_ne!(second.header("Last-Modified"), first.header("Last-Modified"));

    fs::write(dir.path().join("new.txt"), "new").unwrap();
    let sink = fetch(&chain, "/new.txt", &[]).await;
    assert_eq!(sink.body_str(), "new");

    fs::remove_file(&path).unwrap();
    let sink = fetch(&chain, "/data.txt", &[]).await;
    assert_not_found(&sink);
}

#[test(tokio::test)]
async fn file_removed_after_indexing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.txt");
    fs::write(&path, "data").unwrap();

    let chain = make_chain(dir_conf(dir.path(), ""));
    fs::remove_file(&path).unwrap();

    let sink = fetch(&chain, "/data.txt", &[]).await;
    assert_status(&sink, 500);
    assert_eq!(
        sink.body_str(),
        response_text(StatusCode::INTERNAL_SERVER_ERROR)
    );
}

#[test(tokio::test)]
async fn file_truncated_after_indexing() {
    let dir = tempfile::tempdir().unwrap();
    let immutable = dir.path().join("_app").join("immutable");
    fs::create_dir_all(&immutable).unwrap();
    let path = immutable.join("start.js.br");
    fs::write(&path, "compressed bytes").unwrap();

    let chain = make_chain(dir_conf(
        dir.path(),
        "brotli: true\nmax_age: 60\nimmutable_prefix: /_app/immutable/",
    ));
    fs::write(&path, "").unwrap();

    let sink = fetch(
        &chain,
        "/_app/immutable/start.js",
        &[("Accept-Encoding", "br")],
    )
    .await;

    // The error page doesn't inherit any of the file's headers
    let text = response_text(StatusCode::INTERNAL_SERVER_ERROR);
    assert_status(&sink, 500);
    assert_headers(
        &sink,
        vec![
            ("Content-Length", &text.len().to_string()),
            ("Content-Type", "text/html; charset=utf-8"),
        ],
    );
    assert_eq!(sink.body_str(), text);
}

#[test(tokio::test)]
async fn client_abort() {
    let chain = make_chain(default_conf());
    let sink = send(
        &chain,
        make_request("GET", "/large.txt", &[]),
        RecordingSink::new().abort_after(1),
    )
    .await;

    assert_status(&sink, 200);
    assert_eq!(sink.chunk_count(), 1);
    assert!(sink.is_closed());
    assert!(!sink.is_finished());
}

#[test(tokio::test)]
async fn slow_client() {
    let chain = make_chain(default_conf());
    let sink = send(
        &chain,
        make_request("GET", "/large.txt", &[]),
        RecordingSink::new().write_delay(Duration::from_millis(10)),
    )
    .await;

    assert_status(&sink, 200);
    assert!(sink.is_finished());
    assert_eq!(
        sink.body_str(),
        concatcp!(str_repeat!("0123456789", 10000), "\n")
    );
}

#[derive(Debug)]
struct Dynamic;

#[async_trait]
impl RequestFilter for Dynamic {
    async fn request_filter(
        &self,
        request: &Request<()>,
        response: &mut Response<'_>,
    ) -> Result<RequestFilterResult, Error> {
        if request.uri().path() == "/fail" {
            return Err(Error::Handler("dynamic handler failed".to_owned()));
        }
        response.insert_header(header::CONTENT_TYPE, "text/plain")?;
        response.end(Some(Bytes::from_static(b"dynamic"))).await?;
        Ok(RequestFilterResult::ResponseSent)
    }
}

#[test(tokio::test)]
async fn fallthrough() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("only-here.txt"), "second root").unwrap();
    fs::write(dir.path().join("file.txt"), "shadowed").unwrap();

    let first = AssetFilesConf::from_yaml(default_conf()).unwrap();
    let second = AssetFilesConf::from_yaml(dir_conf(dir.path(), "")).unwrap();
    let chain = HandlerChain::new()
        .with(AssetFilesHandler::try_from(first).unwrap())
        .with(AssetFilesHandler::try_from(second).unwrap())
        .with(Dynamic);

    let sink = fetch(&chain, "/file.txt", &[]).await;
    assert_eq!(sink.body_str(), "Hi!\n");

    let sink = fetch(&chain, "/only-here.txt", &[]).await;
    assert_eq!(sink.body_str(), "second root");

    let sink = fetch(&chain, "/anything-else", &[]).await;
    assert_status(&sink, 200);
    assert_eq!(sink.body_str(), "dynamic");
}

#[test(tokio::test)]
async fn site() {
    let dir = tempfile::tempdir().unwrap();
    let client = dir.path().join("client");
    let immutable = client.join("_app").join("immutable");
    let static_dir = dir.path().join("static");
    let prerendered = dir.path().join("prerendered");
    fs::create_dir_all(&immutable).unwrap();
    fs::create_dir_all(&static_dir).unwrap();
    fs::create_dir_all(&prerendered).unwrap();
    fs::write(immutable.join("start.abc123.js"), "start").unwrap();
    fs::write(client.join("_app").join("version.json"), "{}").unwrap();
    fs::write(static_dir.join("robots.txt"), "User-agent: *").unwrap();
    fs::write(prerendered.join("about.html"), "<p>about</p>").unwrap();
    fs::write(prerendered.join("robots.txt"), "shadowed").unwrap();

    let conf = SiteConf {
        client: Some(client),
        static_dir: Some(static_dir),
        prerendered: Some(prerendered),
        expose_errors: Some(true),
        ..Default::default()
    };
    let chain = Site::try_from(conf).unwrap().into_chain();

    let sink = fetch(&chain, "/_app/immutable/start.abc123.js", &[]).await;
    assert_eq!(sink.body_str(), "start");
    assert_eq!(
        sink.header("Cache-Control"),
        Some("public,max-age=31536000,immutable")
    );
    assert_eq!(sink.header("Vary"), Some("Accept-Encoding"));
    assert!(sink.header("ETag").is_some());

    let sink = fetch(&chain, "/_app/version.json", &[]).await;
    assert_eq!(sink.body_str(), "{}");
    assert_eq!(sink.header("Cache-Control"), None);

    let sink = fetch(&chain, "/robots.txt", &[]).await;
    assert_eq!(sink.body_str(), "User-agent: *");

    let sink = fetch(&chain, "/about", &[]).await;
    assert_eq!(sink.body_str(), "<p>about</p>");

    let sink = fetch(&chain, "/unknown", &[]).await;
    assert_not_found(&sink);

    let conf = SiteConf {
        prerendered: Some(dir.path().join("prerendered")),
        expose_errors: Some(true),
        ..Default::default()
    };
    let chain = Site::try_from(conf).unwrap().with_dynamic(Dynamic).into_chain();

    let sink = fetch(&chain, "/about", &[]).await;
    assert_eq!(sink.body_str(), "<p>about</p>");

    let sink = fetch(&chain, "/unknown", &[]).await;
    assert_eq!(sink.body_str(), "dynamic");

    let sink = fetch(&chain, "/fail", &[]).await;
    assert_status(&sink, 500);
    assert_eq!(sink.body_str(), "dynamic handler failed");
}
