//! Transaction state machine: Preamble, SOP, Header, payload, CRC32, EOP.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::bmc::align_to_edge;
use crate::config::DecoderConfig;
use crate::crc::RunningCrc;
use crate::cursor::EdgeCursor;
use crate::error::DecodeError;
use crate::frame::{Frame, FrameKind, FrameSink};
use crate::framing::Framer;
use crate::header::Header;
use crate::line_code::SopKind;
use crate::message::MessageInterpreter;
use crate::pdo::SourcePdo;

/// Received and locally computed CRC of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CrcCheck {
    pub received: u32,
    pub computed: u32,
}

impl CrcCheck {
    pub fn is_valid(&self) -> bool {
        self.received == self.computed
    }
}

/// Summary of one fully framed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub sop: SopKind,
    pub header: Header,
    pub objects: Vec<u32>,
    pub crc: CrcCheck,
    pub eop: bool,
    pub start_sample: u64,
    pub end_sample: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    SearchingPreamble,
    AwaitingSop,
    AwaitingHeader { sop: SopKind },
    ReadingPayload { header: Header, remaining: u8 },
    AwaitingCrc { header: Header },
    AwaitingEop { header: Header, crc: CrcCheck },
    Done { header: Header, crc: CrcCheck },
}

/// Data accumulated by the current attempt, discarded on restart.
#[derive(Debug, Default)]
struct Attempt {
    start_sample: u64,
    crc: RunningCrc,
    objects: Vec<u32>,
}

impl Attempt {
    fn restart(&mut self) {
        *self = Self::default();
    }
}

pub struct TransactionDecoder {
    config: DecoderConfig,
    framer: Framer,
    interpreter: MessageInterpreter,
}

impl TransactionDecoder {
    pub fn new(config: DecoderConfig) -> Result<Self, DecodeError> {
        config.validate()?;
        Ok(Self {
            config,
            framer: Framer::new(&config),
            interpreter: MessageInterpreter::new(),
        })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Capabilities of the last Source_Capabilities message, used to resolve Requests.
    pub fn latest_source_capabilities(&self) -> Vec<SourcePdo> {
        self.interpreter.latest_source_capabilities()
    }

    /// Forget remembered capabilities, for an independent replay.
    pub fn reset(&mut self) {
        self.interpreter.clear();
    }

    /// Decode transactions until the capture is exhausted.
    ///
    /// Returns the number of complete transactions. `cancel` is polled between
    /// transactions and while searching for a preamble.
    pub fn run<C, S>(&mut self, cursor: &mut C, sink: &mut S, cancel: &AtomicBool) -> Result<usize, DecodeError>
    where
        C: EdgeCursor + ?Sized,
        S: FrameSink + ?Sized,
    {
        match align_to_edge(cursor) {
            Err(e) if e.is_end_of_capture() => return Ok(0),
            other => other?,
        }

        let mut count = 0;
        loop {
            if cancel.load(Ordering::Relaxed) {
                info!("Decoding cancelled after {} transactions", count);
                return Err(DecodeError::Cancelled);
            }
            let result = self.decode(cursor, sink, Some(cancel));
            sink.commit();
            match result {
                Ok(_) => count += 1,
                Err(e) if e.is_end_of_capture() => {
                    info!("End of capture after {} transactions", count);
                    return Ok(count);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Decode the next transaction, resynchronizing on framing failures.
    ///
    /// The cursor must sit on an edge, see [`align_to_edge`].
    pub fn decode_transaction<C, S>(&mut self, cursor: &mut C, sink: &mut S) -> Result<Transaction, DecodeError>
    where
        C: EdgeCursor + ?Sized,
        S: FrameSink + ?Sized,
    {
        self.decode(cursor, sink, None)
    }

    fn decode<C, S>(
        &mut self,
        cursor: &mut C,
        sink: &mut S,
        cancel: Option<&AtomicBool>,
    ) -> Result<Transaction, DecodeError>
    where
        C: EdgeCursor + ?Sized,
        S: FrameSink + ?Sized,
    {
        let mut attempt = Attempt::default();
        let mut state = State::SearchingPreamble;
        loop {
            state = match state {
                State::SearchingPreamble => {
                    attempt.restart();
                    self.search_preamble(cursor, sink, cancel, &mut attempt)?
                }
                State::AwaitingSop => self.detect_sop(cursor, sink)?,
                State::AwaitingHeader { sop } => self.read_header(cursor, sink, sop, &mut attempt)?,
                State::ReadingPayload { header, remaining } => {
                    self.read_object(cursor, sink, header, remaining, &mut attempt)?
                }
                State::AwaitingCrc { header } => self.read_crc(cursor, sink, header, &attempt)?,
                State::AwaitingEop { header, crc } => self.detect_eop(cursor, sink, header, crc)?,
                State::Done { header, crc } => {
                    let end_sample = cursor.current_sample();
                    // Every packet closes with one more edge
                    match cursor.advance_to_next_edge() {
                        Err(e) if e.is_end_of_capture() => trace!("Capture ends on the trailing edge"),
                        other => other?,
                    }
                    return Ok(Transaction {
                        sop: header.sop,
                        header,
                        objects: attempt.objects,
                        crc,
                        eop: true,
                        start_sample: attempt.start_sample,
                        end_sample,
                    });
                }
            };
        }
    }

    fn search_preamble<C, S>(
        &mut self,
        cursor: &mut C,
        sink: &mut S,
        cancel: Option<&AtomicBool>,
        attempt: &mut Attempt,
    ) -> Result<State, DecodeError>
    where
        C: EdgeCursor + ?Sized,
        S: FrameSink + ?Sized,
    {
        let preamble = self.framer.find_preamble(cursor, sink, cancel)?;
        attempt.start_sample = preamble.start_sample;
        Ok(State::AwaitingSop)
    }

    fn detect_sop<C, S>(&mut self, cursor: &mut C, sink: &mut S) -> Result<State, DecodeError>
    where
        C: EdgeCursor + ?Sized,
        S: FrameSink + ?Sized,
    {
        Ok(match self.framer.detect_sop(cursor, sink)? {
            Some(sop) => State::AwaitingHeader { sop },
            None => {
                debug!("Restarting preamble search after SOP error");
                State::SearchingPreamble
            }
        })
    }

    fn read_header<C, S>(
        &mut self,
        cursor: &mut C,
        sink: &mut S,
        sop: SopKind,
        attempt: &mut Attempt,
    ) -> Result<State, DecodeError>
    where
        C: EdgeCursor + ?Sized,
        S: FrameSink + ?Sized,
    {
        let raw = self.framer.read_u16(cursor, sink, Some(&mut attempt.crc))?;
        sink.add_frame(Frame::new(
            FrameKind::Header,
            raw.value as u64,
            u8::from(sop) as u64,
            raw.start_sample,
            raw.end_sample,
        ));

        let header = Header::new(sop, raw.value);
        self.interpreter.begin(&header);
        Ok(if header.is_control() {
            State::AwaitingCrc { header }
        } else {
            State::ReadingPayload {
                header,
                remaining: header.data_objects,
            }
        })
    }

    fn read_object<C, S>(
        &mut self,
        cursor: &mut C,
        sink: &mut S,
        header: Header,
        remaining: u8,
        attempt: &mut Attempt,
    ) -> Result<State, DecodeError>
    where
        C: EdgeCursor + ?Sized,
        S: FrameSink + ?Sized,
    {
        let object = self.framer.read_u32(cursor, sink, Some(&mut attempt.crc))?;
        let index = attempt.objects.len();
        sink.add_frame(self.interpreter.object_frame(&header, index, object));
        attempt.objects.push(object.value);

        Ok(if remaining > 1 {
            State::ReadingPayload {
                header,
                remaining: remaining - 1,
            }
        } else {
            self.interpreter.finish(&header, &attempt.objects);
            State::AwaitingCrc { header }
        })
    }

    fn read_crc<C, S>(
        &mut self,
        cursor: &mut C,
        sink: &mut S,
        header: Header,
        attempt: &Attempt,
    ) -> Result<State, DecodeError>
    where
        C: EdgeCursor + ?Sized,
        S: FrameSink + ?Sized,
    {
        let received = self.framer.read_u32(cursor, sink, None)?;
        let crc = CrcCheck {
            received: received.value,
            computed: attempt.crc.value(),
        };
        if !crc.is_valid() {
            warn!(
                "CRC mismatch at sample {}: received 0x{:08X}, computed 0x{:08X}",
                received.start_sample, crc.received, crc.computed
            );
        }
        sink.add_frame(Frame::new(
            FrameKind::Crc32,
            crc.received as u64,
            crc.computed as u64,
            received.start_sample,
            received.end_sample,
        ));
        Ok(State::AwaitingEop { header, crc })
    }

    fn detect_eop<C, S>(
        &mut self,
        cursor: &mut C,
        sink: &mut S,
        header: Header,
        crc: CrcCheck,
    ) -> Result<State, DecodeError>
    where
        C: EdgeCursor + ?Sized,
        S: FrameSink + ?Sized,
    {
        Ok(if self.framer.detect_eop(cursor, sink)? {
            State::Done { header, crc }
        } else {
            debug!("Restarting preamble search after EOP error");
            State::SearchingPreamble
        })
    }
}
