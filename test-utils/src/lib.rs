//! `test-utils` is used for testing `gatehouse-lib`.
//! This crate does not depend on `gatehouse-lib`, so the library can use it as a dev-dependency.
//! Macros are used instead, so that the importer is responsible for providing the dependencies
//! (`wiremock` and `http`).

/// Create a mock web server, which responds with a predefined status when
/// handling a matching request
///
/// Additional arguments are calls on the `wiremock::ResponseTemplate`, e.g.
/// `mock_server!(StatusCode::OK, set_body_string("hello"))`.
#[macro_export]
macro_rules! mock_server {
    ($status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::method("GET")).respond_with(template).mount(&mock_server).await;
        mock_server
    }};
}

/// Like [`mock_server!`], but the server verifies on drop that it received
/// exactly `$calls` requests
#[macro_export]
macro_rules! counting_mock_server {
    ($calls:expr, $status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(template)
            .expect($calls)
            .mount(&mock_server)
            .await;
        mock_server
    }};
}

/// A `http://127.0.0.1:<port>/` URL on which nothing is listening
///
/// The port is obtained from the OS and released again right away.
#[macro_export]
macro_rules! unused_local_url {
    () => {{
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Expected free local port");
        let port = listener.local_addr().expect("Expected bound address").port();
        drop(listener);
        format!("http://127.0.0.1:{port}/")
    }};
}
