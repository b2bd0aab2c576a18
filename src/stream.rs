//! In-memory stream wrappers for codestream bytes.
//!
//! `OutputStream` grows as the encoder writes; `InputStream` borrows the bytes
//! being decoded. Both use big-endian integers as the codestream syntax does.

use crate::constants::MARKER_START_BYTE;
use crate::error::CodecError;
use crate::marker_code::MarkerCode;

/// A growable sink for an encoded codestream.
#[derive(Debug, Default)]
pub struct OutputStream {
    buffer: Vec<u8>,
}

impl OutputStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current write position, which is also the number of bytes produced.
    pub fn tell(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn write_byte(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn write_marker(&mut self, marker: MarkerCode) {
        self.write_byte(MARKER_START_BYTE);
        self.write_byte(marker.into());
    }

    /// Overwrites a previously reserved 32-bit field, e.g. a length that is
    /// only known once the body has been written.
    pub fn patch_u32(&mut self, position: usize, value: u32) -> Result<(), CodecError> {
        let slot = self
            .buffer
            .get_mut(position..position + 4)
            .ok_or_else(|| CodecError::invalid_argument("patch position outside stream"))?;
        slot.copy_from_slice(&value.to_be_bytes());
        Ok(())
    }
}

/// A read cursor over a borrowed codestream.
#[derive(Debug)]
pub struct InputStream<'a> {
    source: &'a [u8],
    position: usize,
}

impl<'a> InputStream<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            position: 0,
        }
    }

    pub fn tell(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.source.len() - self.position
    }

    pub fn remaining_data(&self) -> &'a [u8] {
        &self.source[self.position..]
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        let value = *self
            .source
            .get(self.position)
            .ok_or(CodecError::NeedMoreData {
                needed: 1,
                available: 0,
            })?;
        self.position += 1;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], CodecError> {
        if count > self.remaining() {
            return Err(CodecError::NeedMoreData {
                needed: count,
                available: self.remaining(),
            });
        }
        let slice = &self.source[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    pub fn skip(&mut self, count: usize) -> Result<(), CodecError> {
        self.read_bytes(count).map(|_| ())
    }

    pub fn peek_marker(&self) -> Result<MarkerCode, CodecError> {
        match self.source.get(self.position..self.position + 2) {
            Some(&[MARKER_START_BYTE, code]) => MarkerCode::parse(code),
            Some(_) => Err(CodecError::invalid_data(format!(
                "expected marker at offset {}",
                self.position
            ))),
            None => Err(CodecError::NeedMoreData {
                needed: 2,
                available: self.remaining(),
            }),
        }
    }

    pub fn read_marker(&mut self) -> Result<MarkerCode, CodecError> {
        if self.read_u8()? != MARKER_START_BYTE {
            return Err(CodecError::invalid_data(format!(
                "expected marker at offset {}",
                self.position - 1
            )));
        }
        MarkerCode::parse(self.read_u8()?)
    }
}
