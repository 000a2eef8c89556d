#![no_main]

use libfuzzer_sys::fuzz_target;
use scanline_fountain::config::FountainConfig;
use scanline_fountain::receiver::Receiver;

/// Fuzz the receiver with arbitrary scanned text.
///
/// Input is split on newlines so one run feeds several frames, which
/// exercises session adoption, the orphan buffer and the decoder together.
/// The receiver must never panic, even on garbage.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let cfg = FountainConfig {
        orphan_capacity: 8,
        ..FountainConfig::default()
    };
    let mut rx = Receiver::new(&cfg);
    for line in text.lines() {
        rx.receive(line);
    }
    for _ in rx.drain_events() {}
    let _ = rx.progress();
});
