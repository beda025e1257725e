mod common;

use fcrepo::{acl::Access, path::RemotePath};
use serde_json::json;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

async fn authorization(server: &MockServer, at: &str, target: &str, agent: &str) {
    let base = format!("{}/rest", server.uri());

    Mock::given(method("HEAD"))
        .and(path(format!("/rest{at}")))
        .respond_with(ResponseTemplate::new(200).insert_header("link", common::BASIC_CONTAINER))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/rest{at}")))
        .and(header("accept", "text/turtle"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "<> <http://www.w3.org/ns/auth/acl#accessTo> <{base}{target}> ."
        )))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/rest{at}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "@id": format!("{base}{at}"),
            "http://www.w3.org/ns/auth/acl#accessTo": [{ "@id": format!("{base}{target}") }],
            "http://www.w3.org/ns/auth/acl#agent": [{ "@value": agent }],
            "http://www.w3.org/ns/auth/acl#mode": [
                { "@id": "http://www.w3.org/ns/auth/acl#Read" },
                { "@id": "http://www.w3.org/ns/auth/acl#Write" },
            ],
        }])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn nearest_ancestor_grants_access() {
    let server = MockServer::start().await;
    common::container(&server, "/acl", &["secure"]).await;
    authorization(&server, "/acl/secure", "/secure", "U").await;

    let fs = common::fs(&server);

    let access = fs.access(&RemotePath::normalize("/secure/sub")).await.unwrap();
    assert_eq!(access.len(), 1);
    assert_eq!(access["U"], Access { read: true, write: true });

    assert!(fs.access(&RemotePath::normalize("/public")).await.unwrap().is_empty());

    let tree = serde_json::to_value(fs.acl_tree().await.unwrap()).unwrap();
    assert_eq!(tree["/"]["secure"]["_def"], "/acl/secure");
    assert_eq!(tree["/"]["secure"]["_agents"], json!(["U"]));
}

#[tokio::test]
async fn editing_an_existing_acl_replaces_it() {
    let server = MockServer::start().await;
    common::container(&server, "/acl", &["secure"]).await;
    authorization(&server, "/acl/secure", "/secure", "U").await;

    Mock::given(method("DELETE"))
        .and(path("/rest/acl/secure"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/acl/secure/fcr:tombstone"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/rest/acl/secure"))
        .and(body_string_contains("\"V\""))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let fs = common::fs(&server);
    let doc = fs.read_acl(&RemotePath::normalize("/secure")).await.unwrap();

    assert!(doc.existing);
    assert_eq!(doc.location.as_str(), "/acl/secure");
    assert!(doc.turtle.contains("acl#accessTo"));

    let edited = format!("<> <http://www.w3.org/ns/auth/acl#agent> \"V\" .\n{}", doc.turtle);
    fs.write_acl(&doc, edited).await.unwrap();
}

#[tokio::test]
async fn new_acls_start_from_a_template() {
    let server = MockServer::start().await;
    common::container(&server, "/acl", &[]).await;

    Mock::given(method("PUT"))
        .and(path("/rest/acl/open"))
        .and(header("content-type", "text/turtle"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    common::missing(&server, "/acl/open").await;

    let fs = common::fs(&server);
    let doc = fs.read_acl(&RemotePath::normalize("/open")).await.unwrap();

    assert!(!doc.existing);
    assert_eq!(doc.location.as_str(), "/acl/open");
    assert!(doc
        .turtle
        .contains(&format!("acl:accessTo <{}/rest/open>", server.uri())));

    fs.write_acl(&doc, doc.turtle.clone()).await.unwrap();
}
