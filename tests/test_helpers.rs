// Test helpers for portal tests
// Builds portals that talk to an httpmock server instead of the real site

#![allow(dead_code)]

use disa_patch::config::RetryPolicy;
use disa_patch::{CertificateIdentity, Config};
use httpmock::prelude::*;
use httpmock::Method::HEAD;
use httpmock::Mock;
use serde_json::json;
use std::time::Duration;

pub const LOGIN_PATH: &str = "/PkiLogin/Default.aspx";
pub const LISTING_PATH: &str = "/Service/CollectionInfoService.svc/GetAssetsListingOfCollection";
pub const DETAIL_PATH: &str = "/Metadata.aspx";
pub const DOWNLOAD_PATH: &str = "/Services/Download.ashx";

/// Size every mocked attachment reports, 2 MiB
pub const ATTACHMENT_SIZE: u64 = 2_097_152;

/// Config pointing at `server` with fast retries
pub fn test_config(server: &MockServer) -> Config {
    Config {
        base_url: server.base_url(),
        request_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            retries: 1,
            backoff: Duration::from_millis(1),
        },
        ..Config::default()
    }
}

/// Identity without key material; the mock server speaks plain HTTP
pub fn identity() -> CertificateIdentity {
    CertificateIdentity::from_thumbprint("0123456789ABCDEF")
}

/// Listing response in the service's double-encoded form
pub fn listing_body(total: u32, rows: &[(&str, &str, &str)]) -> String {
    let rows: Vec<_> = rows
        .iter()
        .map(|(id, title, date)| {
            json!({"STANDARDASSETID": id, "TITLE": title, "CREATED_DATE": date, "CATEGORY": "x"})
        })
        .collect();
    let inner = json!({"Total": total, "Rows": rows}).to_string();
    json!({ "d": inner }).to_string()
}

pub fn mock_login(server: &MockServer) -> Mock<'_> {
    server.mock(|when, then| {
        when.method(GET).path(LOGIN_PATH);
        then.status(200)
            .header("set-cookie", "ASP.NET_SessionId=test-session; path=/")
            .body("<html>ok</html>");
    })
}

/// Every listing request (count query included) gets the same rows
pub fn mock_listing<'a>(server: &'a MockServer, total: u32, rows: &[(&str, &str, &str)]) -> Mock<'a> {
    let body = listing_body(total, rows);
    server.mock(|when, then| {
        when.method(POST).path(LISTING_PATH);
        then.status(200)
            .header("content-type", "application/json")
            .body(body);
    })
}

/// Detail page for `asset_id` linking each of `files` through the download handler
pub fn mock_detail<'a>(server: &'a MockServer, asset_id: &str, files: &[&str]) -> Mock<'a> {
    let anchors: String = files
        .iter()
        .map(|f| format!(r#"<li><a href="{DOWNLOAD_PATH}?file={f}&amp;src=1">{f}</a></li>"#))
        .collect();
    let html = format!(
        r#"<html><body><a href="/Default.aspx">Home</a><ul>{anchors}</ul></body></html>"#
    );
    let asset_id = asset_id.to_string();
    server.mock(|when, then| {
        when.method(GET)
            .path(DETAIL_PATH)
            .query_param("id", asset_id.as_str());
        then.status(200)
            .header("content-type", "text/html")
            .body(html);
    })
}

/// Metadata probe answering with an attachment named `file`
pub fn mock_attachment<'a>(server: &'a MockServer, file: &str) -> Mock<'a> {
    let disposition = format!("attachment; filename={file}");
    let file = file.to_string();
    server.mock(|when, then| {
        when.method(HEAD)
            .path(DOWNLOAD_PATH)
            .query_param("file", file.as_str());
        then.status(200)
            .header("content-disposition", disposition)
            .header("content-length", ATTACHMENT_SIZE.to_string());
    })
}

/// Metadata probe answering without a `Content-Disposition` header
pub fn mock_no_attachment<'a>(server: &'a MockServer, file: &str) -> Mock<'a> {
    let file = file.to_string();
    server.mock(|when, then| {
        when.method(HEAD)
            .path(DOWNLOAD_PATH)
            .query_param("file", file.as_str());
        then.status(200).header("content-type", "text/html");
    })
}
