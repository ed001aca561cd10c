#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Frames arrive as WebSocket text; only valid UTF-8 reaches the decoder
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(frame) = ampere::ocpp::Frame::decode(text) {
            // Anything that decodes must re-encode to a decodable frame
            let _ = ampere::ocpp::Frame::decode(&frame.encode());
        }
    }
});
