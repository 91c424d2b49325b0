#![no_main]

use libfuzzer_sys::fuzz_target;
use opengrasp::Config;

// Config files are hand-edited; parsing must never panic on any input.
fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = toml::from_str::<Config>(text);
    }
});
