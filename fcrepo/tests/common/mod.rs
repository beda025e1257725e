#![allow(dead_code)]

use fcrepo::{
    api::Endpoint,
    auth::{StaticTokenStore, TokenStore},
    path::RemotePath,
    session::Session,
    Fs,
};
use serde_json::{json, Value};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const BASIC_CONTAINER: &str = "<http://www.w3.org/ns/ldp#BasicContainer>;rel=\"type\"";
pub const NON_RDF_SOURCE: &str = "<http://www.w3.org/ns/ldp#NonRDFSource>;rel=\"type\"";

pub fn fs(server: &MockServer) -> Fs {
    fs_with(server, StaticTokenStore::anonymous())
}

pub fn fs_with<S: TokenStore + 'static>(server: &MockServer, store: S) -> Fs {
    let endpoint = Endpoint::new(&server.uri(), "/rest").unwrap();
    Fs::new(Session::new(endpoint, RemotePath::root()), store).unwrap()
}

pub async fn container(server: &MockServer, at: &str, members: &[&str]) {
    Mock::given(method("HEAD"))
        .and(path(format!("/rest{at}")))
        .respond_with(ResponseTemplate::new(200).insert_header("link", BASIC_CONTAINER))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/rest{at}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(server, at, members)))
        .mount(server)
        .await;
}

pub async fn binary(server: &MockServer, at: &str, filename: &str) {
    Mock::given(method("HEAD"))
        .and(path(format!("/rest{at}")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("link", NON_RDF_SOURCE)
                .insert_header(
                    "content-disposition",
                    format!("attachment; filename=\"{filename}\"").as_str(),
                ),
        )
        .mount(server)
        .await;
}

pub async fn missing(server: &MockServer, at: &str) {
    Mock::given(path(format!("/rest{at}")))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

pub fn listing(server: &MockServer, at: &str, members: &[&str]) -> Value {
    let base = format!("{}/rest", server.uri());
    let id = format!("{base}{at}");
    let members: Vec<Value> = members
        .iter()
        .map(|m| json!({ "@id": format!("{}/{m}", id.trim_end_matches('/')) }))
        .collect();

    json!([{
        "@id": id,
        "http://www.w3.org/ns/ldp#contains": members,
    }])
}
