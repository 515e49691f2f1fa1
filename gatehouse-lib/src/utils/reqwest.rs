//! Turn the error chain behind a failed reqwest call into a short,
//! human-readable description for [`crate::ErrorKind::Network`].

use std::error::Error;

/// Message patterns and the explanation reported when one of them occurs
/// anywhere in an error's description. The first matching rule wins.
const MESSAGE_RULES: &[(&[&str], &str)] = &[
    (
        &["failed to lookup address", "nodename nor servname", "name resolution"],
        "DNS resolution failed. Check hostname and DNS settings",
    ),
    (
        &["certificate"],
        "TLS certificate error. Check certificate validity",
    ),
    (
        &["handshake", "TLS", "SSL"],
        "TLS handshake failed. Check SSL/TLS configuration",
    ),
    (
        &["Connection refused", "connection refused"],
        "Connection refused. Server is not accepting connections",
    ),
    (
        &["Connection reset", "connection reset"],
        "Connection reset by server",
    ),
    (
        &["No route to host", "no route"],
        "No route to host. Check network routing or firewall configuration",
    ),
    (
        &["Network is unreachable", "network unreachable"],
        "Network unreachable. Check internet connection or VPN settings",
    ),
];

fn match_rules(message: &str) -> Option<&'static str> {
    MESSAGE_RULES
        .iter()
        .find(|(patterns, _)| patterns.iter().any(|pattern| message.contains(pattern)))
        .map(|(_, explanation)| *explanation)
}

/// Analyze the error chain of a reqwest error and return a concise message.
///
/// The chain is walked from the outermost error inwards; I/O and hyper
/// errors are classified by kind, anything else by its message. If nothing
/// matches, reqwest's own categorization is used.
pub(crate) fn analyze_error_chain(error: &reqwest::Error) -> String {
    if error.is_redirect() {
        return "Too many redirects. Check for redirect loops".to_string();
    }

    let mut source = error.source();
    while let Some(err) = source {
        if let Some(io_error) = err.downcast_ref::<std::io::Error>() {
            if let Some(message) = analyze_io_error(io_error) {
                return message.to_string();
            }
        } else if let Some(hyper_error) = err.downcast_ref::<hyper::Error>() {
            if let Some(message) = analyze_hyper_error(hyper_error) {
                return message.to_string();
            }
        }

        if let Some(message) = match_rules(&err.to_string()) {
            return message.to_string();
        }

        source = err.source();
    }

    fallback_reqwest_analysis(error)
}

fn analyze_io_error(io_error: &std::io::Error) -> Option<&'static str> {
    use std::io::ErrorKind;

    let message = match io_error.kind() {
        ErrorKind::ConnectionRefused => "Connection refused. Server is not accepting connections",
        ErrorKind::ConnectionReset => "Connection reset by server",
        ErrorKind::ConnectionAborted => "Connection aborted",
        ErrorKind::NotFound => "DNS resolution failed. Check hostname spelling",
        ErrorKind::PermissionDenied => "Permission denied. Check firewall or proxy settings",
        ErrorKind::NetworkUnreachable => {
            "Network unreachable. Check internet connection or VPN settings"
        }
        ErrorKind::HostUnreachable => "Host unreachable. Check network routing",
        ErrorKind::AddrNotAvailable => {
            "Address not available. Check network interface configuration"
        }
        ErrorKind::BrokenPipe => "Connection broken. Server closed connection unexpectedly",
        ErrorKind::UnexpectedEof => "Connection closed unexpectedly. Server terminated early",
        ErrorKind::InvalidData => "Invalid response data. Server sent malformed response",
        // `Other` wraps resolver and TLS errors; their message decides
        _ => return io_error.get_ref().and_then(|inner| match_rules(&inner.to_string())),
    };
    Some(message)
}

fn analyze_hyper_error(hyper_error: &hyper::Error) -> Option<&'static str> {
    if hyper_error.is_parse_status() {
        Some("Invalid HTTP status code from server")
    } else if hyper_error.is_parse() {
        Some("Invalid HTTP response format. Server may be misconfigured")
    } else if hyper_error.is_incomplete_message() {
        Some("Connection closed before response completed")
    } else if hyper_error.is_closed() {
        Some("Connection was closed unexpectedly")
    } else if hyper_error.is_canceled() {
        Some("Request was canceled")
    } else {
        None
    }
}

/// Fallback analysis using basic reqwest error categorization
fn fallback_reqwest_analysis(error: &reqwest::Error) -> String {
    if error.is_connect() {
        "Connection failed. Check network connectivity and firewall settings".to_string()
    } else if error.is_request() {
        "Request failed. Check URL format and parameters".to_string()
    } else if error.is_body() || error.is_decode() {
        "Response body could not be read. Server returned invalid data".to_string()
    } else {
        format!("Request failed: {error}")
    }
}
