//! Shared wiremock fixtures for integration tests.

#![allow(dead_code)]

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mounts an HTML response at `route` (path only).
pub async fn mount_html(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html; charset=utf-8")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

/// Mounts the gallery document for `gid`, expecting exactly `expected` requests.
pub async fn mount_gallery(server: &MockServer, gid: &str, body: &str, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/gallery.php"))
        .and(query_param("gid", gid))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html; charset=utf-8")
                .set_body_string(body),
        )
        .expect(expected)
        .mount(server)
        .await;
}

/// Mounts a photo page whose main photo points at `src` with `title`.
pub async fn mount_photo_page(server: &MockServer, photo: &str, title: &str, src: &str) {
    mount_html(
        server,
        &format!("/photo/{photo}/"),
        &format!(
            r#"<html><body><div id="slideshow">
               <img id="mainPhoto" title="{title}" src="{src}" alt="">
               </div></body></html>"#
        ),
    )
    .await;
}

/// Mounts a binary payload at `route`.
pub async fn mount_bytes(server: &MockServer, route: &str, bytes: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "image/jpeg")
                .set_body_bytes(bytes.to_vec()),
        )
        .mount(server)
        .await;
}

/// Mounts a robots.txt body.
pub async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Mounts a status-only response at `route`.
pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
