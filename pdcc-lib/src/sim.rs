//! Synthetic CC line traffic, used as the peer the decoder is tested against.

use bytes::{BufMut, BytesMut};
use tracing::trace;

use crate::capture::Capture;
use crate::config::DecoderConfig;
use crate::constants::{
    DATA_OBJECT_SIZE, HEADER_SIZE, IDLE_BITS, KCODES_PER_SOP, PREAMBLE_BITS, SYMBOL_BITS, USB_CRC_POLYNOMIAL,
};
use crate::crc::crc32;
use crate::cursor::{EdgeBuffer, Level};
use crate::error::DecodeError;
use crate::header::{ControlMessageType, DataMessageType, RawHeader};
use crate::line_code::{KCode, SopKind, encode_nibble};

/// Builds a transition list one edge at a time.
#[derive(Debug, Clone)]
pub struct SimulationChannel {
    initial_level: Level,
    level: Level,
    sample: u64,
    transitions: Vec<u64>,
}

impl SimulationChannel {
    pub fn new(initial_level: Level) -> Self {
        Self {
            initial_level,
            level: initial_level,
            sample: 0,
            transitions: Vec::new(),
        }
    }

    pub fn current_sample(&self) -> u64 {
        self.sample
    }

    pub fn current_level(&self) -> Level {
        self.level
    }

    /// Toggle the line at the current sample.
    pub fn transition(&mut self) {
        // Two toggles on one sample cancel out
        if self.transitions.last() == Some(&self.sample) {
            self.transitions.pop();
        } else {
            self.transitions.push(self.sample);
        }
        self.level = self.level.toggled();
    }

    pub fn transition_if_needed(&mut self, level: Level) {
        if self.level != level {
            self.transition();
        }
    }

    pub fn advance(&mut self, samples: u64) {
        self.sample += samples;
    }

    /// Move to `sample`; never moves backwards.
    pub fn advance_to(&mut self, sample: u64) {
        self.sample = self.sample.max(sample);
    }

    pub fn transitions(&self) -> &[u64] {
        &self.transitions
    }

    pub fn into_capture(self, sample_rate_hz: u32) -> Capture {
        Capture::new(sample_rate_hz, self.initial_level, self.transitions)
    }

    pub fn into_edge_buffer(self) -> Result<EdgeBuffer, DecodeError> {
        EdgeBuffer::new(self.initial_level, self.transitions)
    }
}

/// Sender of a message, selecting the header role bits and the ID counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Sink, upstream facing port
    Ufp,
    /// Source, downstream facing port
    Dfp,
    /// Cable plug, on SOP' and SOP''
    Cable,
}

/// Per-endpoint message ID counters, 3 bits each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageIdCounters {
    pub ufp: u8,
    pub dfp: u8,
    pub cable: u8,
}

impl MessageIdCounters {
    /// Current ID for `endpoint`, advancing its counter.
    pub fn next(&mut self, endpoint: Endpoint) -> u8 {
        let counter = match endpoint {
            Endpoint::Ufp => &mut self.ufp,
            Endpoint::Dfp => &mut self.dfp,
            Endpoint::Cable => &mut self.cable,
        };
        let id = *counter;
        *counter = (*counter + 1) % 8;
        id
    }
}

/// Faults injected into the next generated message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Corruption {
    /// Leave out the transition that starts the preamble
    pub drop_first_preamble_edge: bool,
    /// Send these four symbols in place of the SOP K-codes
    pub sop_symbols: Option<[u8; KCODES_PER_SOP]>,
    /// Send `symbol` in place of line symbol `index` of header, objects and CRC
    pub payload_symbol: Option<(usize, u8)>,
    /// Send this symbol in place of the EOP K-code
    pub eop_symbol: Option<u8>,
}

/// Encodes PD messages onto a [`SimulationChannel`].
///
/// Time is counted in half bits at the nominal bit rate and every edge lands on
/// the nearest sample, as a real capture would record it.
#[derive(Debug, Clone)]
pub struct TrafficGenerator {
    channel: SimulationChannel,
    sample_rate_hz: u32,
    half_bit_period: f64,
    // Half bits elapsed since sample 0
    half_bits: u64,
    ids: MessageIdCounters,
    corruption: Corruption,
}

impl TrafficGenerator {
    pub fn new(config: &DecoderConfig) -> Self {
        Self {
            channel: SimulationChannel::new(Level::High),
            sample_rate_hz: config.sample_rate_hz,
            half_bit_period: config.timing().half_bit_period,
            half_bits: 0,
            ids: MessageIdCounters::default(),
            corruption: Corruption::default(),
        }
    }

    pub fn channel(&self) -> &SimulationChannel {
        &self.channel
    }

    pub fn message_ids(&self) -> &MessageIdCounters {
        &self.ids
    }

    pub fn current_sample(&self) -> u64 {
        self.channel.current_sample()
    }

    /// Apply `corruption` to the next message only.
    pub fn corrupt_next(&mut self, corruption: Corruption) {
        self.corruption = corruption;
    }

    pub fn into_capture(self) -> Capture {
        self.channel.into_capture(self.sample_rate_hz)
    }

    pub fn into_edge_buffer(self) -> Result<EdgeBuffer, DecodeError> {
        self.channel.into_edge_buffer()
    }

    /// One BMC bit: an edge at the start, and one mid-bit for a 1.
    pub fn bit(&mut self, value: bool) {
        self.channel.transition();
        self.half_bit(value);
    }

    fn half_bit(&mut self, value: bool) {
        self.advance_half_bits(1);
        if value {
            self.channel.transition();
        }
        self.advance_half_bits(1);
    }

    fn advance_half_bits(&mut self, count: u64) {
        self.half_bits += count;
        self.channel.advance_to((self.half_bits as f64 * self.half_bit_period).round() as u64);
    }

    /// A 5-bit line symbol, least significant bit first.
    pub fn symbol(&mut self, symbol: u8) {
        for i in 0..SYMBOL_BITS {
            self.bit((symbol >> i) & 1 == 1);
        }
    }

    pub fn kcode(&mut self, kcode: KCode) {
        self.symbol(kcode.symbol());
    }

    /// A data byte as two 4b5b symbols, low nibble first.
    pub fn byte(&mut self, byte: u8) {
        self.symbol(encode_nibble(byte));
        self.symbol(encode_nibble(byte >> 4));
    }

    /// 64 alternating bits starting with 0.
    pub fn preamble(&mut self, drop_first_edge: bool) {
        for i in 0..PREAMBLE_BITS {
            let value = i % 2 == 1;
            if i == 0 && drop_first_edge {
                self.half_bit(value);
            } else {
                self.bit(value);
            }
        }
    }

    pub fn sop(&mut self, sop: SopKind) {
        for kcode in sop.kcodes() {
            self.kcode(kcode);
        }
    }

    /// Message header for `endpoint` on `sop`, taking the next message ID.
    pub fn header(&mut self, sop: SopKind, endpoint: Endpoint, message_type: u8, data_objects: u8) -> u16 {
        let from_source = endpoint == Endpoint::Dfp;
        let header = RawHeader::new()
            .with_message_type(message_type)
            .with_port_data_role(sop == SopKind::Sop && from_source)
            .with_spec_revision(2)
            .with_power_role_or_cable_plug(if sop == SopKind::Sop {
                from_source
            } else {
                endpoint == Endpoint::Cable
            })
            .with_message_id(self.ids.next(endpoint))
            .with_data_objects(data_objects);
        header.to_u16()
    }

    /// A complete transaction surrounded by idle line: preamble, SOP, header,
    /// data objects, CRC32, EOP and the closing edge.
    pub fn transaction(&mut self, sop: SopKind, header: u16, objects: &[u32]) {
        let corruption = std::mem::take(&mut self.corruption);
        let start = self.channel.current_sample();

        self.channel.transition_if_needed(Level::High);
        self.advance_half_bits(2 * IDLE_BITS);

        self.preamble(corruption.drop_first_preamble_edge);

        match corruption.sop_symbols {
            Some(symbols) => symbols.into_iter().for_each(|symbol| self.symbol(symbol)),
            None => self.sop(sop),
        }

        let mut payload = BytesMut::with_capacity(HEADER_SIZE + (objects.len() + 1) * DATA_OBJECT_SIZE);
        payload.put_u16_le(header);
        for &object in objects {
            payload.put_u32_le(object);
        }
        let crc = crc32(0, &payload, USB_CRC_POLYNOMIAL);
        payload.put_u32_le(crc);

        let mut symbols: Vec<u8> = payload
            .iter()
            .flat_map(|&byte| [encode_nibble(byte), encode_nibble(byte >> 4)])
            .collect();
        if let Some((index, symbol)) = corruption.payload_symbol {
            if let Some(slot) = symbols.get_mut(index) {
                *slot = symbol;
            }
        }
        for symbol in symbols {
            self.symbol(symbol);
        }

        self.symbol(corruption.eop_symbol.unwrap_or(KCode::Eop.symbol()));

        // Closing edge
        self.channel.transition();
        self.advance_half_bits(2 * IDLE_BITS);

        trace!(
            "Generated {} header 0x{:04X} with {} objects, crc 0x{:08X}, samples {}..{}",
            sop,
            header,
            objects.len(),
            crc,
            start,
            self.channel.current_sample()
        );
    }

    pub fn control(&mut self, sop: SopKind, endpoint: Endpoint, message: ControlMessageType) -> u16 {
        let header = self.header(sop, endpoint, u8::from(message), 0);
        self.transaction(sop, header, &[]);
        header
    }

    pub fn data(&mut self, sop: SopKind, endpoint: Endpoint, message: DataMessageType, objects: &[u32]) -> u16 {
        let header = self.header(sop, endpoint, u8::from(message), objects.len() as u8);
        self.transaction(sop, header, objects);
        header
    }

    pub fn ping(&mut self) -> u16 {
        self.control(SopKind::Sop, Endpoint::Dfp, ControlMessageType::Ping)
    }

    pub fn source_capabilities(&mut self, pdos: &[u32]) -> u16 {
        self.data(SopKind::Sop, Endpoint::Dfp, DataMessageType::SourceCapabilities, pdos)
    }

    pub fn request(&mut self, rdo: u32) -> u16 {
        self.data(SopKind::Sop, Endpoint::Ufp, DataMessageType::Request, &[rdo])
    }

    /// Vendor_Defined message; cable plugs answer on SOP'.
    pub fn vendor_defined(&mut self, sop: SopKind, vdm_header: u32, vdos: &[u32]) -> u16 {
        let endpoint = if sop == SopKind::Sop { Endpoint::Dfp } else { Endpoint::Cable };
        let mut objects = Vec::with_capacity(vdos.len() + 1);
        objects.push(vdm_header);
        objects.extend_from_slice(vdos);
        self.data(sop, endpoint, DataMessageType::VendorDefined, &objects)
    }

    /// A power negotiation: Source_Capabilities, Request, Accept, PS_RDY, then
    /// Pings until `messages` transactions have been written.
    pub fn negotiation(&mut self, messages: usize) {
        const PDOS: [u32; 3] = [
            (1 << 26) | (100 << 10) | 300, // 5 V 3 A, USB comms
            (180 << 10) | 300,             // 9 V 3 A
            (3 << 30) | (110 << 17) | (33 << 8) | 60, // PPS 3.3-11 V 3 A
        ];
        for i in 0..messages {
            match i % 5 {
                0 => {
                    self.source_capabilities(&PDOS);
                }
                1 => {
                    // 9 V at 2 A
                    self.request((2 << 28) | (200 << 10) | 300);
                }
                2 => {
                    self.control(SopKind::Sop, Endpoint::Dfp, ControlMessageType::Accept);
                }
                3 => {
                    self.control(SopKind::Sop, Endpoint::Dfp, ControlMessageType::PsRdy);
                }
                _ => {
                    self.ping();
                }
            }
        }
    }
}
