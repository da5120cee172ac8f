mod common;
use common::*;

use pdcc_lib::pdo::SourcePdo;
use pdcc_lib::vdm::VdmHeader;

#[test]
fn test_ping() {
    let mut generator = TrafficGenerator::new(&config());
    let raw_header = generator.ping();
    let (frames, count) = decode_all(generator, config());

    assert_eq!(count, 1);
    assert_eq!(
        kinds(&frames),
        vec![FrameKind::Preamble, FrameKind::Sop, FrameKind::Header, FrameKind::Crc32, FrameKind::Eop]
    );

    let header_frame = frames[2];
    assert_eq!(header_frame.data1, raw_header as u64);
    assert_eq!(header_frame.data2, SopKind::Sop as u64);
    let header = Header::new(SopKind::Sop, header_frame.data1 as u16);
    assert_eq!(header.data_objects, 0);
    assert_eq!(header.message_type, MessageType::Control(ControlMessageType::Ping));

    assert_eq!(frames[3].data1, frames[3].data2, "CRC should match");
    assert_eq!(frames[4].data1, 1, "EOP should match");
}

#[test]
fn test_source_capabilities_fixed_supply() {
    let mut generator = TrafficGenerator::new(&config());
    generator.source_capabilities(&[FIXED_5V_3A]);
    let (frames, _) = decode_all(generator, config());

    let pdos: Vec<&Frame> = frames
        .iter()
        .filter(|f| f.kind == FrameKind::SourcePowerDataObject)
        .collect();
    assert_eq!(pdos.len(), 1);
    assert_eq!(pdos[0].data2, 1, "1-based position");
    let SourcePdo::Fixed(fixed) = SourcePdo::from(pdos[0].data1 as u32) else {
        panic!("expected a fixed supply PDO");
    };
    assert_eq!(fixed.voltage_mv, 5000);
    assert_eq!(fixed.max_current_ma, 3000);
}

#[test]
fn test_request_resolves_against_previous_capabilities() {
    let mut generator = TrafficGenerator::new(&config());
    generator.source_capabilities(&[FIXED_5V_3A, FIXED_9V_2A]);
    let rdo = (2 << 28) | (150 << 10) | 200;
    generator.request(rdo);
    let (frames, count) = decode_all(generator, config());

    assert_eq!(count, 2);
    let request = frames
        .iter()
        .find(|f| f.kind == FrameKind::RequestDataObject)
        .expect("no request frame");
    assert_eq!(request.data1, rdo as u64);
    assert_eq!(request.data2, FIXED_9V_2A as u64);
}

#[test]
fn test_request_with_dangling_reference() {
    let mut generator = TrafficGenerator::new(&config());
    generator.source_capabilities(&[FIXED_5V_3A]);
    generator.request((4 << 28) | (100 << 10) | 100);
    generator.ping();
    let (frames, count) = decode_all(generator, config());

    assert_eq!(count, 3, "an invalid reference does not stop decoding");
    let request = frames
        .iter()
        .find(|f| f.kind == FrameKind::RequestDataObject)
        .expect("no request frame");
    assert_eq!(request.data2, INVALID_PDO_REFERENCE);
}

#[test]
fn test_vendor_defined() {
    let mut generator = TrafficGenerator::new(&config());
    // Structured Discover Identity REQ to the cable plug
    let vdm_header = (0xFF00 << 16) | (1 << 15) | (1 << 13) | 1;
    generator.vendor_defined(SopKind::SopPrime, vdm_header, &[0x1111_2222, 0x3333_4444]);
    let (frames, _) = decode_all(generator, config());

    assert_eq!(
        kinds(&frames),
        vec![
            FrameKind::Preamble,
            FrameKind::SopPrime,
            FrameKind::Header,
            FrameKind::VdmHeader,
            FrameKind::GenericDataObject,
            FrameKind::GenericDataObject,
            FrameKind::Crc32,
            FrameKind::Eop,
        ]
    );
    assert_eq!(frames[2].data2, SopKind::SopPrime as u64);
    assert_eq!(VdmHeader::from(frames[3].data1 as u32).vid, 0xFF00);
    assert_eq!(frames[5].data1, 0x3333_4444);
    assert_eq!(frames[5].data2, 3);
}

#[test]
fn test_lost_first_preamble_edge() {
    let mut generator = TrafficGenerator::new(&config());
    generator.corrupt_next(Corruption {
        drop_first_preamble_edge: true,
        ..Corruption::default()
    });
    generator.ping();
    let (frames, count) = decode_all(generator, config());

    assert_eq!(count, 1);
    assert_eq!(frames[1].kind, FrameKind::Sop);
}

#[test]
fn test_single_corrupt_sop_symbol_is_tolerated() {
    let mut generator = TrafficGenerator::new(&config());
    generator.corrupt_next(Corruption {
        sop_symbols: Some([0x18, 0x07, 0x18, 0x11]),
        ..Corruption::default()
    });
    generator.ping();
    let (frames, count) = decode_all(generator, config());

    assert_eq!(count, 1);
    assert_eq!(frames[1].kind, FrameKind::Sop);
}

#[test]
fn test_sop_error_restarts_search() {
    let mut generator = TrafficGenerator::new(&config());
    generator.corrupt_next(Corruption {
        sop_symbols: Some([0x07, 0x07, 0x18, 0x11]),
        ..Corruption::default()
    });
    generator.ping();
    generator.ping();
    let (frames, count) = decode_all(generator, config());

    assert_eq!(count, 1, "only the second ping is a complete transaction");
    assert_eq!(
        kinds(&frames),
        vec![
            FrameKind::Preamble,
            FrameKind::SopError,
            FrameKind::Preamble,
            FrameKind::Sop,
            FrameKind::Header,
            FrameKind::Crc32,
            FrameKind::Eop,
        ]
    );
}

#[test]
fn test_crc_mismatch_is_reported_not_fatal() {
    let mut generator = TrafficGenerator::new(&config());
    // Replace the first symbol of the PDO with the symbol for 0xF
    generator.corrupt_next(Corruption {
        payload_symbol: Some((4, 0x1D)),
        ..Corruption::default()
    });
    generator.source_capabilities(&[FIXED_5V_3A]);
    generator.ping();
    let (frames, count) = decode_all(generator, config());

    assert_eq!(count, 2);
    let crcs: Vec<&Frame> = frames.iter().filter(|f| f.kind == FrameKind::Crc32).collect();
    assert_ne!(crcs[0].data1, crcs[0].data2, "corrupted message");
    assert_eq!(crcs[1].data1, crcs[1].data2, "following message");
    let pdo = frames
        .iter()
        .find(|f| f.kind == FrameKind::SourcePowerDataObject)
        .unwrap();
    assert_eq!(pdo.data1 as u32 & 0xF, 0xF, "payload frame still emitted");
}

#[test]
fn test_invalid_symbol_propagates_into_data() {
    let mut generator = TrafficGenerator::new(&config());
    // 0x00 has no data mapping
    generator.corrupt_next(Corruption {
        payload_symbol: Some((4, 0x00)),
        ..Corruption::default()
    });
    generator.source_capabilities(&[FIXED_5V_3A]);
    let (frames, count) = decode_all(generator, config());

    assert_eq!(count, 1);
    let crc = frames.iter().find(|f| f.kind == FrameKind::Crc32).unwrap();
    assert_ne!(crc.data1, crc.data2);
}

#[test]
fn test_eop_error_restarts_search() {
    let mut generator = TrafficGenerator::new(&config());
    generator.corrupt_next(Corruption {
        eop_symbol: Some(0x18),
        ..Corruption::default()
    });
    generator.ping();
    generator.ping();
    let (frames, count) = decode_all(generator, config());

    assert_eq!(count, 1);
    let eops: Vec<u64> = frames
        .iter()
        .filter(|f| f.kind == FrameKind::Eop)
        .map(|f| f.data1)
        .collect();
    assert_eq!(eops, vec![0, 1]);
}

#[test]
fn test_negotiation_sequence() {
    let mut generator = TrafficGenerator::new(&config());
    generator.negotiation(7);
    let (frames, count) = decode_all(generator, config());

    assert_eq!(count, 7);
    let types: Vec<MessageType> = frames
        .iter()
        .filter(|f| f.kind == FrameKind::Header)
        .map(|f| Header::new(SopKind::Sop, f.data1 as u16).message_type)
        .collect();
    assert_eq!(
        types,
        vec![
            MessageType::Data(DataMessageType::SourceCapabilities),
            MessageType::Data(DataMessageType::Request),
            MessageType::Control(ControlMessageType::Accept),
            MessageType::Control(ControlMessageType::PsRdy),
            MessageType::Control(ControlMessageType::Ping),
            MessageType::Data(DataMessageType::SourceCapabilities),
            MessageType::Data(DataMessageType::Request),
        ]
    );
    assert!(
        frames
            .iter()
            .filter(|f| f.kind == FrameKind::Crc32)
            .all(|f| f.data1 == f.data2)
    );
}

#[test]
fn test_message_ids_advance_per_endpoint() {
    let mut generator = TrafficGenerator::new(&config());
    generator.source_capabilities(&[FIXED_5V_3A]);
    generator.request(1 << 28);
    generator.ping();
    let (frames, _) = decode_all(generator, config());

    let ids: Vec<u8> = frames
        .iter()
        .filter(|f| f.kind == FrameKind::Header)
        .map(|f| Header::new(SopKind::Sop, f.data1 as u16).message_id)
        .collect();
    assert_eq!(ids, vec![0, 0, 1], "source and sink count separately");
}

#[test]
fn test_replay_is_idempotent() {
    let mut generator = TrafficGenerator::new(&config());
    generator.negotiation(5);
    let capture = generator.into_capture();

    let mut decoder = TransactionDecoder::new(config()).unwrap();
    let cancel = AtomicBool::new(false);
    let mut first = FrameCollector::new();
    decoder
        .run(&mut capture.clone().into_cursor().unwrap(), &mut first, &cancel)
        .unwrap();
    let mut second = FrameCollector::new();
    decoder
        .run(&mut capture.into_cursor().unwrap(), &mut second, &cancel)
        .unwrap();

    assert_eq!(first.frames, second.frames);
    assert_eq!(first.markers, second.markers);
    assert_eq!(decoder.latest_source_capabilities().len(), 3);
    decoder.reset();
    assert!(decoder.latest_source_capabilities().is_empty());
}

#[test]
fn test_cancellation() {
    let mut generator = TrafficGenerator::new(&config());
    generator.ping();
    let mut cursor = generator.into_edge_buffer().unwrap();
    let mut decoder = TransactionDecoder::new(config()).unwrap();
    let mut sink = FrameCollector::new();

    let result = decoder.run(&mut cursor, &mut sink, &AtomicBool::new(true));
    assert!(matches!(result, Err(pdcc_lib::DecodeError::Cancelled)));
    assert!(sink.frames.is_empty());
}

#[test]
fn test_decode_transaction_summary() {
    let mut generator = TrafficGenerator::new(&config());
    generator.source_capabilities(&[FIXED_5V_3A, FIXED_9V_2A]);
    let mut cursor = generator.into_edge_buffer().unwrap();
    pdcc_lib::bmc::align_to_edge(&mut cursor).unwrap();

    let mut decoder = TransactionDecoder::new(config()).unwrap();
    let mut sink: Vec<Frame> = Vec::new();
    let transaction = decoder.decode_transaction(&mut cursor, &mut sink).unwrap();
    assert_eq!(transaction.sop, SopKind::Sop);
    assert_eq!(transaction.objects, vec![FIXED_5V_3A, FIXED_9V_2A]);
    assert!(transaction.crc.is_valid());
    assert!(transaction.eop);
    assert!(transaction.start_sample < transaction.end_sample);
    assert_eq!(sink.len(), 7);

    let err = decoder.decode_transaction(&mut cursor, &mut sink).unwrap_err();
    assert!(err.is_end_of_capture());
}

#[test]
fn test_empty_capture() {
    let generator = TrafficGenerator::new(&config());
    let (frames, count) = decode_all(generator, config());
    assert_eq!(count, 0);
    assert!(frames.is_empty());
}
