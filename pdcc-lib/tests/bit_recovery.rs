mod common;
use common::*;

use pdcc_lib::bmc::BitRecoverer;
use pdcc_lib::cursor::{EdgeBuffer, Level};
use pdcc_lib::frame::MarkerKind;

// (bit rate, sample rate), every pair at least 4x oversampled
const RATE_PAIRS: [(u32, u32); 9] = [
    (300_000, 1_200_000),
    (300_000, 1_300_000),
    (300_000, 1_500_000),
    (300_000, 2_000_000),
    (300_000, 2_400_000),
    (300_000, 2_700_000),
    (300_000, 10_000_000),
    (100_000, 500_000),
    (9_600, 1_000_000),
];

const PATTERN: [bool; 10] = [false, true, true, false, true, false, false, true, false, true];

#[test]
fn test_bits_recovered_at_every_rate() {
    for (bit_rate, sample_rate) in RATE_PAIRS {
        let config = DecoderConfig::new(bit_rate, sample_rate);
        assert!(config.validate().is_ok(), "{} bit/s at {} Hz", bit_rate, sample_rate);

        let mut generator = TrafficGenerator::new(&config);
        for bit in PATTERN {
            generator.bit(bit);
        }
        // Closing edge for the last bit
        generator.bit(false);

        // The first bit starts on sample 0
        let mut cursor = generator.into_edge_buffer().unwrap();
        let recoverer = BitRecoverer::new(config.timing());
        let mut sink = FrameCollector::new();
        let decoded: Vec<bool> = PATTERN
            .iter()
            .map(|_| recoverer.read_bit(&mut cursor, &mut sink).unwrap().value)
            .collect();

        assert_eq!(decoded, PATTERN, "{} bit/s at {} Hz", bit_rate, sample_rate);
        assert!(
            sink.markers.iter().all(|(_, kind)| *kind != MarkerKind::Glitch),
            "no glitches at {} bit/s, {} Hz",
            bit_rate,
            sample_rate
        );
    }
}

/// BMC edges for `bits` with `half` samples per half bit, each rounded to the nearest sample.
fn quantized_edges(bits: &[bool], half: f64) -> Vec<u64> {
    let at = |half_bits: usize| (half_bits as f64 * half).round() as u64;
    let mut edges = Vec::new();
    for (k, &bit) in bits.iter().enumerate() {
        edges.push(at(2 * k));
        if bit {
            edges.push(at(2 * k + 1));
        }
    }
    edges.push(at(2 * bits.len()));
    edges
}

#[test]
fn test_bits_recovered_from_quantized_edges() {
    for (bit_rate, sample_rate) in RATE_PAIRS {
        let config = DecoderConfig::new(bit_rate, sample_rate);
        let half = sample_rate as f64 / (2.0 * bit_rate as f64);
        let edges = quantized_edges(&PATTERN, half);
        let mut cursor = EdgeBuffer::new(Level::High, edges).unwrap();
        let recoverer = BitRecoverer::new(config.timing());
        let mut sink = FrameCollector::new();

        let decoded: Vec<bool> = PATTERN
            .iter()
            .map(|_| recoverer.read_bit(&mut cursor, &mut sink).unwrap().value)
            .collect();
        assert_eq!(decoded, PATTERN, "{} bit/s at {} Hz", bit_rate, sample_rate);
    }
}

#[test]
fn test_generator_matches_quantized_edges() {
    for (bit_rate, sample_rate) in RATE_PAIRS {
        let config = DecoderConfig::new(bit_rate, sample_rate);
        let mut generator = TrafficGenerator::new(&config);
        for bit in PATTERN {
            generator.bit(bit);
        }
        // Closing edge
        generator.bit(false);

        let expected = quantized_edges(&PATTERN, config.timing().half_bit_period);
        assert_eq!(
            generator.channel().transitions(),
            expected.as_slice(),
            "{} bit/s at {} Hz",
            bit_rate,
            sample_rate
        );
    }
}

#[test]
fn test_transactions_decode_at_every_rate() {
    for (bit_rate, sample_rate) in RATE_PAIRS {
        let config = DecoderConfig::new(bit_rate, sample_rate);
        let mut generator = TrafficGenerator::new(&config);
        generator.source_capabilities(&[FIXED_5V_3A]);
        generator.ping();
        let (frames, count) = decode_all(generator, config);

        assert_eq!(count, 2, "{} bit/s at {} Hz", bit_rate, sample_rate);
        assert!(
            frames
                .iter()
                .filter(|f| f.kind == FrameKind::Crc32)
                .all(|f| f.data1 == f.data2),
            "CRC mismatch at {} bit/s, {} Hz",
            bit_rate,
            sample_rate
        );
    }
}

#[test]
fn test_undersampled_config_rejected() {
    let config = DecoderConfig::new(300_000, 1_199_999);
    assert!(TransactionDecoder::new(config).is_err());
}
