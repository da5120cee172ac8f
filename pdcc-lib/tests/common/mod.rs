//! Shared helpers for the decoder integration tests

// Not every test file uses every helper
#[allow(unused_imports)]
pub use pdcc_lib::config::DecoderConfig;
#[allow(unused_imports)]
pub use pdcc_lib::constants::INVALID_PDO_REFERENCE;
#[allow(unused_imports)]
pub use pdcc_lib::decoder::TransactionDecoder;
#[allow(unused_imports)]
pub use pdcc_lib::frame::{Frame, FrameCollector, FrameKind};
#[allow(unused_imports)]
pub use pdcc_lib::header::{ControlMessageType, DataMessageType, Header, MessageType};
#[allow(unused_imports)]
pub use pdcc_lib::line_code::SopKind;
#[allow(unused_imports)]
pub use pdcc_lib::sim::{Corruption, Endpoint, TrafficGenerator};
#[allow(unused_imports)]
pub use std::sync::atomic::AtomicBool;

/// 300 kbit/s captured at 2.4 MHz, 8 samples per bit
#[allow(dead_code)]
pub fn config() -> DecoderConfig {
    DecoderConfig::new(300_000, 2_400_000)
}

#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Decode everything the generator produced with a fresh decoder.
#[allow(dead_code)]
pub fn decode_all(generator: TrafficGenerator, config: DecoderConfig) -> (Vec<Frame>, usize) {
    init_tracing();
    let mut decoder = TransactionDecoder::new(config).expect("Invalid config");
    let mut cursor = generator.into_edge_buffer().expect("Failed to build cursor");
    let mut sink = FrameCollector::new();
    let count = decoder
        .run(&mut cursor, &mut sink, &AtomicBool::new(false))
        .expect("Decoding failed");
    (sink.frames, count)
}

/// Frame kinds in order, for compact sequence assertions.
#[allow(dead_code)]
pub fn kinds(frames: &[Frame]) -> Vec<FrameKind> {
    frames.iter().map(|f| f.kind).collect()
}

/// 5 V / 3 A fixed supply PDO
#[allow(dead_code)]
pub const FIXED_5V_3A: u32 = (100 << 10) | 300;
/// 9 V / 2 A fixed supply PDO
#[allow(dead_code)]
pub const FIXED_9V_2A: u32 = (180 << 10) | 200;
