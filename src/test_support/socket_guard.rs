//! Skip wiremock-backed tests where localhost sockets cannot be bound.
//!
//! Also compiled into the integration tests via `tests/support`.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "IDSWEEP_REQUIRE_SOCKET_TESTS";

/// Whether a missing socket should fail the test instead of skipping it.
#[must_use]
pub fn socket_tests_required() -> bool {
    std::env::var(REQUIRE_ENV)
        .is_ok_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

#[track_caller]
#[must_use]
pub fn should_skip_socket_bound_test() -> bool {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return false;
    }

    let location = Location::caller();
    let message = format!(
        "[socket-bound-test] localhost bind failed at {}:{}",
        location.file(),
        location.line()
    );
    assert!(
        !socket_tests_required(),
        "{message}; unset {REQUIRE_ENV} to skip instead"
    );
    eprintln!("{message}; skipping (set {REQUIRE_ENV}=1 to fail instead)");
    true
}

/// Starts a mock server, or returns `None` after logging a skip.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if should_skip_socket_bound_test() {
        None
    } else {
        Some(MockServer::start().await)
    }
}
