//! Build server fixtures

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Nightly base path on the build server
pub const BASE_PATH: &str = "/pub/mozilla.org/b2g/nightly/";

/// Build directory matching `flame 1.4 latest`
pub const FLAME_BUILD: &str = "latest-mozilla-b2g30_v1_4-flame";

/// Platform package inside [`FLAME_BUILD`]
pub const FLAME_GECKO: &str = "b2g-30.0.en-US.android-arm.tar.gz";

/// Body served for gaia.zip
pub const GAIA_BODY: &[u8] = b"PK\x03\x04 gaia bundle";

/// Apache-style directory index page
pub fn index_page(dir: &str, entries: &[&str]) -> String {
    let mut html = format!(
        "<html><head><title>Index of {dir}</title></head><body>\n<h1>Index of {dir}</h1>\n<pre><a href=\"?C=N;O=D\">Name</a> <a href=\"?C=M;O=A\">Last modified</a>\n<a href=\"/pub/mozilla.org/b2g/\">Parent Directory</a>\n"
    );
    for entry in entries {
        html.push_str(&format!("<a href=\"{entry}\">{entry}</a>  01-Jun-2014 04:02  -\n"));
    }
    html.push_str("</pre></body></html>\n");
    html
}

/// Platform package body of `len` bytes
pub fn gecko_body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Mount the base listing, the flame build listing and both artifacts
pub async fn mount_flame_build(server: &MockServer, gecko: &[u8]) {
    Mock::given(method("GET"))
        .and(path(BASE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(index_page(
            BASE_PATH,
            &[
                "2014-05-30-04-02-03-mozilla-central-flame/",
                &format!("{FLAME_BUILD}/"),
                "latest-mozilla-b2g30_v1_4-flame-eng/",
                "latest-mozilla-central-hamachi/",
            ],
        )))
        .mount(server)
        .await;

    let build_dir = format!("{BASE_PATH}{FLAME_BUILD}/");
    Mock::given(method("GET"))
        .and(path(build_dir.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(index_page(
            &build_dir,
            &[
                "b2g-30.0.en-US.android-arm.crashreporter-symbols.zip",
                FLAME_GECKO,
                "gaia.zip",
                "sources.xml",
            ],
        )))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{build_dir}gaia.zip").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(GAIA_BODY))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{build_dir}{FLAME_GECKO}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gecko.to_vec()))
        .mount(server)
        .await;
}
