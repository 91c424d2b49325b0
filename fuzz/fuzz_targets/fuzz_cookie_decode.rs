#![no_main]

use std::sync::{Arc, OnceLock};

use libfuzzer_sys::fuzz_target;
use opengrasp::security::{AuthMode, SessionRegistry};
use opengrasp::util::SystemClock;

static REGISTRY: OnceLock<SessionRegistry> = OnceLock::new();

fn registry() -> &'static SessionRegistry {
    REGISTRY.get_or_init(|| {
        SessionRegistry::new(
            AuthMode::Token,
            Some("fuzz-token".to_string()),
            None,
            64,
            None,
            Arc::new(SystemClock),
        )
    })
}

// Cookie values arrive from the network; decode must reject garbage
// without panicking, whatever the split/hex/signature shape.
fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = registry().decode(text);
        let _ = registry().session_from_cookie_header(Some(text));
    }
});
