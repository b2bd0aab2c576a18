//! J2K codestream parser.
//!
//! Handles the main header (SOC, SIZ, COD, QCD, COM) and tile-part headers
//! (SOT ... SOD). Every segment is read through its length field, so a
//! malformed segment cannot run into the next one.

use super::header::{J2kCod, J2kComponentInfo, J2kHeader, J2kQcd, J2kSiz, J2kTilePart};
use crate::error::CodecError;
use crate::marker_code::MarkerCode;
use crate::stream::InputStream;

/// Turns raw marker segments into structured header data.
pub struct J2kParser<'a, 'b> {
    reader: &'b mut InputStream<'a>,
}

impl<'a, 'b> J2kParser<'a, 'b> {
    pub fn new(reader: &'b mut InputStream<'a>) -> Self {
        Self { reader }
    }

    /// Parses from SOC up to, but not including, the first SOT (or EOC).
    pub fn parse_main_header(&mut self) -> Result<J2kHeader, CodecError> {
        if self.reader.read_marker()? != MarkerCode::StartOfCodestream {
            return Err(CodecError::invalid_data("codestream does not start with SOC"));
        }

        let mut siz = None;
        let mut cod = None;
        let mut qcd = None;
        let mut comments = Vec::new();
        let mut skipped = Vec::new();

        loop {
            let marker = self.reader.peek_marker()?;
            if matches!(
                marker,
                MarkerCode::StartOfTile | MarkerCode::EndOfCodestream
            ) {
                break;
            }
            self.reader.skip(2)?;

            // ISO/IEC 15444-1, A.5.1: SIZ immediately follows SOC.
            if siz.is_none() && marker != MarkerCode::ImageAndTileSize {
                return Err(CodecError::invalid_data(format!(
                    "expected SIZ after SOC, found {marker:?}"
                )));
            }

            match marker {
                MarkerCode::ImageAndTileSize => {
                    if siz.is_some() {
                        return Err(CodecError::invalid_data("duplicate SIZ marker"));
                    }
                    siz = Some(self.parse_siz()?);
                }
                MarkerCode::CodingStyleDefault => cod = Some(self.parse_cod()?),
                MarkerCode::QuantizationDefault => qcd = Some(self.parse_qcd()?),
                MarkerCode::Comment => comments.push(self.parse_com()?),
                other if other.has_segment() => {
                    self.read_segment()?;
                    skipped.push(other);
                }
                other => {
                    return Err(CodecError::invalid_data(format!(
                        "unexpected {other:?} in main header"
                    )));
                }
            }
        }

        Ok(J2kHeader {
            siz: siz.ok_or_else(|| CodecError::invalid_data("missing SIZ marker"))?,
            cod: cod.ok_or_else(|| CodecError::invalid_data("missing COD marker"))?,
            qcd: qcd.ok_or_else(|| CodecError::invalid_data("missing QCD marker"))?,
            comments,
            skipped,
        })
    }

    /// Reads the next marker, or `None` at the end of the data.
    pub fn next_marker(&mut self) -> Result<Option<MarkerCode>, CodecError> {
        if self.reader.remaining() == 0 {
            return Ok(None);
        }
        self.reader.read_marker().map(Some)
    }

    /// Parses a tile-part header whose SOT marker has just been read and
    /// returns it together with the tile-part data.
    pub fn parse_tile_part(&mut self) -> Result<(J2kTilePart, &'a [u8]), CodecError> {
        let sot_start = self.reader.tell() - 2;
        let length = self.reader.read_u16()?;
        if length != 10 {
            return Err(CodecError::invalid_data(format!("Lsot is {length}, expected 10")));
        }
        let tile_part = J2kTilePart {
            tile_index: self.reader.read_u16()?,
            length: self.reader.read_u32()?,
            part_index: self.reader.read_u8()?,
            part_count: self.reader.read_u8()?,
        };

        loop {
            match self.reader.read_marker()? {
                MarkerCode::StartOfData => break,
                marker if marker.has_segment() => {
                    self.read_segment()?;
                }
                marker => {
                    return Err(CodecError::invalid_data(format!(
                        "unexpected {marker:?} in tile-part header"
                    )));
                }
            }
        }

        let data_start = self.reader.tell();
        let body_len = if tile_part.length == 0 {
            // Last tile-part: runs up to EOC.
            let rest = self.reader.remaining_data();
            if rest.ends_with(&[0xFF, 0xD9]) {
                rest.len() - 2
            } else {
                rest.len()
            }
        } else {
            let end = sot_start + tile_part.length as usize;
            end.checked_sub(data_start).ok_or_else(|| {
                CodecError::invalid_data(format!(
                    "Psot {} shorter than tile-part header",
                    tile_part.length
                ))
            })?
        };
        let body = self.reader.read_bytes(body_len)?;
        Ok((tile_part, body))
    }

    fn read_segment(&mut self) -> Result<&'a [u8], CodecError> {
        let length = self.reader.read_u16()?;
        if length < 2 {
            return Err(CodecError::invalid_data(format!(
                "marker segment length {length} too small"
            )));
        }
        self.reader.read_bytes(length as usize - 2)
    }

    pub fn parse_siz(&mut self) -> Result<J2kSiz, CodecError> {
        let body = self.read_segment()?;
        let mut segment = InputStream::new(body);

        let mut siz = J2kSiz {
            capabilities: segment.read_u16()?,
            width: segment.read_u32()?,
            height: segment.read_u32()?,
            x_origin: segment.read_u32()?,
            y_origin: segment.read_u32()?,
            tile_width: segment.read_u32()?,
            tile_height: segment.read_u32()?,
            tile_x_origin: segment.read_u32()?,
            tile_y_origin: segment.read_u32()?,
            components: Vec::new(),
        };
        let count = segment.read_u16()? as usize;
        if count == 0 || body.len() != 36 + 3 * count {
            return Err(CodecError::invalid_data(format!(
                "SIZ declares {count} component(s) in {} byte(s)",
                body.len()
            )));
        }
        if siz.width <= siz.x_origin || siz.height <= siz.y_origin {
            return Err(CodecError::invalid_data("SIZ describes an empty image area"));
        }
        if siz.tile_width == 0 || siz.tile_height == 0 {
            return Err(CodecError::invalid_data("SIZ declares an empty tile"));
        }

        for index in 0..count {
            let ssiz = segment.read_u8()?;
            let dx = segment.read_u8()?;
            let dy = segment.read_u8()?;
            if dx == 0 || dy == 0 {
                return Err(CodecError::invalid_data(format!(
                    "component {index} has zero subsampling"
                )));
            }
            siz.components.push(J2kComponentInfo::from_ssiz(ssiz, dx, dy));
        }
        Ok(siz)
    }

    pub fn parse_cod(&mut self) -> Result<J2kCod, CodecError> {
        let body = self.read_segment()?;
        if body.len() < 10 {
            return Err(CodecError::invalid_data("COD segment too short"));
        }
        let mut segment = InputStream::new(body);
        let cod = J2kCod {
            coding_style: segment.read_u8()?,
            progression_order: segment.read_u8()?,
            number_of_layers: segment.read_u16()?,
            mct: segment.read_u8()?,
            decomposition_levels: segment.read_u8()?,
            codeblock_width_exp: segment.read_u8()?,
            codeblock_height_exp: segment.read_u8()?,
            codeblock_style: segment.read_u8()?,
            transformation: segment.read_u8()?,
        };
        // Precinct sizes (Scod bit 0) are not needed by this decoder.
        if cod.number_of_layers == 0 {
            return Err(CodecError::invalid_data("COD declares zero layers"));
        }
        if cod.decomposition_levels > 32 {
            return Err(CodecError::invalid_data(format!(
                "COD declares {} decomposition levels",
                cod.decomposition_levels
            )));
        }
        Ok(cod)
    }

    pub fn parse_qcd(&mut self) -> Result<J2kQcd, CodecError> {
        let body = self.read_segment()?;
        let mut segment = InputStream::new(body);
        let quant_style = segment.read_u8()?;

        let mut exponents = Vec::new();
        if quant_style & 0x1F == 0 {
            // No quantization: 8-bit entries, exponent in the top 5 bits.
            while segment.remaining() > 0 {
                exponents.push(segment.read_u8()? >> 3);
            }
        } else {
            // Scalar derived / expounded: 16-bit entries, exponent in the top 5 bits.
            while segment.remaining() >= 2 {
                exponents.push((segment.read_u16()? >> 11) as u8);
            }
        }
        Ok(J2kQcd {
            quant_style,
            exponents,
        })
    }

    pub fn parse_com(&mut self) -> Result<String, CodecError> {
        let body = self.read_segment()?;
        let mut segment = InputStream::new(body);
        let _registration = segment.read_u16()?;
        Ok(String::from_utf8_lossy(segment.remaining_data()).into_owned())
    }
}
