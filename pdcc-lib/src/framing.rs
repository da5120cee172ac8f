//! Preamble, SOP and EOP detection plus symbol, byte and data object reads.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace, warn};

use crate::bmc::{BitRecoverer, BmcBit};
use crate::config::DecoderConfig;
use crate::constants::{KCODES_PER_SOP, PREAMBLE_SEARCH_BITS, SYMBOL_BITS};
use crate::crc::RunningCrc;
use crate::cursor::EdgeCursor;
use crate::error::DecodeError;
use crate::frame::{Frame, FrameKind, FrameSink};
use crate::line_code::{KCode, SopKind, assemble_byte, try_decode_symbol, INVALID_NIBBLE};

/// A decoded value with the sample range it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spanned<T> {
    pub value: T,
    pub start_sample: u64,
    pub end_sample: u64,
}

/// Symbol-level reader on top of the bit recoverer.
#[derive(Debug, Clone, Copy)]
pub struct Framer {
    bits: BitRecoverer,
    emit_byte_frames: bool,
}

impl Framer {
    pub fn new(config: &DecoderConfig) -> Self {
        Self {
            bits: BitRecoverer::new(config.timing()),
            emit_byte_frames: config.emit_byte_frames,
        }
    }

    pub fn read_bit<C, S>(&self, cursor: &mut C, sink: &mut S) -> Result<BmcBit, DecodeError>
    where
        C: EdgeCursor + ?Sized,
        S: FrameSink + ?Sized,
    {
        self.bits.read_bit(cursor, sink)
    }

    /// Consume bits until 63 alternating bits starting with 1 have been seen.
    ///
    /// A transmitted preamble is 64 bits starting with 0; searching for its
    /// tail tolerates a lost first edge. Emits the Preamble frame.
    pub fn find_preamble<C, S>(
        &self,
        cursor: &mut C,
        sink: &mut S,
        cancel: Option<&AtomicBool>,
    ) -> Result<Frame, DecodeError>
    where
        C: EdgeCursor + ?Sized,
        S: FrameSink + ?Sized,
    {
        let mut expected = true;
        let mut count = 0;
        let mut start = cursor.current_sample();

        while count < PREAMBLE_SEARCH_BITS {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(DecodeError::Cancelled);
            }
            let bit = self.read_bit(cursor, sink)?;
            if bit.value == expected {
                count += 1;
                expected = !expected;
            } else {
                expected = true;
                count = 0;
                start = cursor.current_sample();
            }
        }

        let frame = Frame::new(FrameKind::Preamble, 1, 0, start, cursor.current_sample());
        debug!("Preamble at samples {}..={}", frame.start_sample, frame.end_sample);
        sink.add_frame(frame);
        Ok(frame)
    }

    /// Read one 5-bit line symbol, least significant bit first.
    pub fn read_symbol<C, S>(&self, cursor: &mut C, sink: &mut S) -> Result<u8, DecodeError>
    where
        C: EdgeCursor + ?Sized,
        S: FrameSink + ?Sized,
    {
        let mut symbol = 0u8;
        for i in 0..SYMBOL_BITS {
            if self.read_bit(cursor, sink)?.value {
                symbol |= 1 << i;
            }
        }
        trace!("Symbol 0x{:02X} ending at sample {}", symbol, cursor.current_sample());
        Ok(symbol)
    }

    /// Read the four SOP K-codes and classify them.
    ///
    /// Emits the matching SOP frame, or a SopError frame and `None` when no
    /// ordered set matches at least three positions.
    pub fn detect_sop<C, S>(&self, cursor: &mut C, sink: &mut S) -> Result<Option<SopKind>, DecodeError>
    where
        C: EdgeCursor + ?Sized,
        S: FrameSink + ?Sized,
    {
        let start = cursor.current_sample();
        let mut symbols = [0u8; KCODES_PER_SOP];
        for symbol in symbols.iter_mut() {
            *symbol = self.read_symbol(cursor, sink)?;
        }
        let end = cursor.current_sample();

        let sop = SopKind::classify(&symbols);
        let kind = match sop {
            Some(sop) => {
                debug!("{} detected, symbols {:02X?}", sop, symbols);
                FrameKind::from(sop)
            }
            None => {
                debug!("No SOP matches symbols {:02X?}", symbols);
                FrameKind::SopError
            }
        };
        sink.add_frame(Frame::new(kind, 1, 0, start, end));
        Ok(sop)
    }

    /// Read one symbol and compare it with the EOP K-code. Emits the EOP frame.
    pub fn detect_eop<C, S>(&self, cursor: &mut C, sink: &mut S) -> Result<bool, DecodeError>
    where
        C: EdgeCursor + ?Sized,
        S: FrameSink + ?Sized,
    {
        let start = cursor.current_sample();
        let symbol = self.read_symbol(cursor, sink)?;
        let matched = symbol == KCode::Eop.symbol();
        if !matched {
            warn!("Expected EOP at sample {}, got symbol 0x{:02X}", start, symbol);
        }
        sink.add_frame(Frame::new(FrameKind::Eop, matched as u64, 0, start, cursor.current_sample()));
        Ok(matched)
    }

    /// Read two symbols as one byte, low nibble first.
    ///
    /// Symbols without a data mapping are logged and folded into the byte as
    /// they are; the CRC decides whether the message is usable.
    pub fn read_byte<C, S>(&self, cursor: &mut C, sink: &mut S) -> Result<u8, DecodeError>
    where
        C: EdgeCursor + ?Sized,
        S: FrameSink + ?Sized,
    {
        let start = cursor.current_sample();
        let low = self.read_nibble(cursor, sink)?;
        let high = self.read_nibble(cursor, sink)?;
        let byte = assemble_byte(low, high);
        if self.emit_byte_frames {
            sink.add_frame(Frame::new(FrameKind::Byte, byte as u64, 0, start, cursor.current_sample()));
        }
        Ok(byte)
    }

    fn read_nibble<C, S>(&self, cursor: &mut C, sink: &mut S) -> Result<u8, DecodeError>
    where
        C: EdgeCursor + ?Sized,
        S: FrameSink + ?Sized,
    {
        let symbol = self.read_symbol(cursor, sink)?;
        Ok(try_decode_symbol(symbol).unwrap_or_else(|| {
            warn!(
                "Invalid 4b5b symbol 0x{:02X} before sample {}",
                symbol,
                cursor.current_sample()
            );
            INVALID_NIBBLE
        }))
    }

    /// Read `N` bytes, feeding them to `crc` when given.
    pub fn read_bytes<const N: usize, C, S>(
        &self,
        cursor: &mut C,
        sink: &mut S,
        crc: Option<&mut RunningCrc>,
    ) -> Result<Spanned<[u8; N]>, DecodeError>
    where
        C: EdgeCursor + ?Sized,
        S: FrameSink + ?Sized,
    {
        let start = cursor.current_sample();
        let mut bytes = [0u8; N];
        for byte in bytes.iter_mut() {
            *byte = self.read_byte(cursor, sink)?;
        }
        if let Some(crc) = crc {
            crc.update(&bytes);
        }
        Ok(Spanned {
            value: bytes,
            start_sample: start,
            end_sample: cursor.current_sample(),
        })
    }

    /// Read the 16-bit little-endian message header.
    pub fn read_u16<C, S>(
        &self,
        cursor: &mut C,
        sink: &mut S,
        crc: Option<&mut RunningCrc>,
    ) -> Result<Spanned<u16>, DecodeError>
    where
        C: EdgeCursor + ?Sized,
        S: FrameSink + ?Sized,
    {
        let read = self.read_bytes::<2, _, _>(cursor, sink, crc)?;
        Ok(Spanned {
            value: u16::from_le_bytes(read.value),
            start_sample: read.start_sample,
            end_sample: read.end_sample,
        })
    }

    /// Read a 32-bit little-endian data object or CRC trailer.
    pub fn read_u32<C, S>(
        &self,
        cursor: &mut C,
        sink: &mut S,
        crc: Option<&mut RunningCrc>,
    ) -> Result<Spanned<u32>, DecodeError>
    where
        C: EdgeCursor + ?Sized,
        S: FrameSink + ?Sized,
    {
        let read = self.read_bytes::<4, _, _>(cursor, sink, crc)?;
        Ok(Spanned {
            value: u32::from_le_bytes(read.value),
            start_sample: read.start_sample,
            end_sample: read.end_sample,
        })
    }
}
