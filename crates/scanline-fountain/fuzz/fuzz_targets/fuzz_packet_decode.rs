#![no_main]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use libfuzzer_sys::fuzz_target;
use scanline_fountain::wire::{Packet, VarInt};

/// Fuzz both text framings and the VarInt reader.
///
/// Raw bytes are tried as JSON text and, base64-wrapped, as a compact
/// record, so the binary decoder sees arbitrary bodies rather than only
/// strings that happen to be valid base64.
///
/// Parsing must never panic; bad input yields `MalformedPacket`.
fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = Packet::from_text(text);
    }

    let mut compact = String::from("S1");
    URL_SAFE_NO_PAD.encode_string(data, &mut compact);
    if let Ok(packet) = Packet::from_text(&compact) {
        // Whatever parses must re-serialize and parse to the same packet.
        let again = packet.to_compact().and_then(|text| Packet::from_text(&text));
        assert_eq!(again.as_ref(), Ok(&packet));
    }

    let mut buf = data;
    let _ = VarInt::decode(&mut buf);
});
