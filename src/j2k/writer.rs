//! Marker segment writer for the J2K main header and tile-part headers.

use super::header::{J2kCod, J2kQcd, J2kSiz, J2kTilePart};
use crate::constants::COMMENT_REGISTRATION_LATIN;
use crate::error::CodecError;
use crate::marker_code::MarkerCode;
use crate::stream::OutputStream;

/// Emits J2K marker segments into an [`OutputStream`].
pub struct J2kWriter<'a> {
    stream: &'a mut OutputStream,
}

impl<'a> J2kWriter<'a> {
    pub fn new(stream: &'a mut OutputStream) -> Self {
        Self { stream }
    }

    pub fn write_soc(&mut self) {
        self.stream.write_marker(MarkerCode::StartOfCodestream);
    }

    pub fn write_eoc(&mut self) {
        self.stream.write_marker(MarkerCode::EndOfCodestream);
    }

    pub fn write_siz(&mut self, siz: &J2kSiz) -> Result<(), CodecError> {
        if siz.components.is_empty() || siz.components.len() > 16384 {
            return Err(CodecError::invalid_argument("SIZ needs 1..=16384 components"));
        }
        self.stream.write_marker(MarkerCode::ImageAndTileSize);
        // Lsiz = 38 + 3 * Csiz
        self.stream.write_u16(siz.segment_length());
        self.stream.write_u16(siz.capabilities);
        self.stream.write_u32(siz.width);
        self.stream.write_u32(siz.height);
        self.stream.write_u32(siz.x_origin);
        self.stream.write_u32(siz.y_origin);
        self.stream.write_u32(siz.tile_width);
        self.stream.write_u32(siz.tile_height);
        self.stream.write_u32(siz.tile_x_origin);
        self.stream.write_u32(siz.tile_y_origin);
        self.stream.write_u16(siz.components.len() as u16);

        for component in &siz.components {
            self.stream.write_byte(component.ssiz());
            self.stream.write_byte(component.dx);
            self.stream.write_byte(component.dy);
        }
        Ok(())
    }

    pub fn write_cod(&mut self, cod: &J2kCod) {
        self.stream.write_marker(MarkerCode::CodingStyleDefault);
        // Scod (1) + SGcod (4) + SPcod without precincts (5) + Lcod (2)
        self.stream.write_u16(12);
        self.stream.write_byte(cod.coding_style);

        // SGcod
        self.stream.write_byte(cod.progression_order);
        self.stream.write_u16(cod.number_of_layers);
        self.stream.write_byte(cod.mct);

        // SPcod
        self.stream.write_byte(cod.decomposition_levels);
        self.stream.write_byte(cod.codeblock_width_exp);
        self.stream.write_byte(cod.codeblock_height_exp);
        self.stream.write_byte(cod.codeblock_style);
        self.stream.write_byte(cod.transformation);
    }

    pub fn write_qcd(&mut self, qcd: &J2kQcd) -> Result<(), CodecError> {
        // Lqcd (2) + Sqcd (1) + one byte per subband
        let length = 3 + qcd.exponents.len();
        let length = u16::try_from(length)
            .map_err(|_| CodecError::invalid_argument("too many subbands for QCD"))?;
        self.stream.write_marker(MarkerCode::QuantizationDefault);
        self.stream.write_u16(length);
        self.stream.write_byte(qcd.quant_style);
        for &exponent in &qcd.exponents {
            self.stream.write_byte(exponent << 3);
        }
        Ok(())
    }

    pub fn write_com(&mut self, comment: &str) -> Result<(), CodecError> {
        let length = u16::try_from(4 + comment.len())
            .map_err(|_| CodecError::invalid_argument("comment too long for COM"))?;
        self.stream.write_marker(MarkerCode::Comment);
        self.stream.write_u16(length);
        self.stream.write_u16(COMMENT_REGISTRATION_LATIN);
        self.stream.write_bytes(comment.as_bytes());
        Ok(())
    }

    pub fn write_sot(&mut self, tile_part: &J2kTilePart) {
        self.stream.write_marker(MarkerCode::StartOfTile);
        self.stream.write_u16(10); // Lsot
        self.stream.write_u16(tile_part.tile_index);
        self.stream.write_u32(tile_part.length);
        self.stream.write_byte(tile_part.part_index);
        self.stream.write_byte(tile_part.part_count);
    }

    pub fn write_sod(&mut self) {
        self.stream.write_marker(MarkerCode::StartOfData);
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.stream.write_bytes(data);
    }
}

#[cfg(test)]
mod tests {
    use super::super::header::J2kComponentInfo;
    use super::*;

    #[test]
    fn writes_header_sequence() {
        let mut out = OutputStream::new();
        let mut writer = J2kWriter::new(&mut out);

        writer.write_soc();
        let siz = J2kSiz {
            width: 512,
            height: 512,
            tile_width: 512,
            tile_height: 512,
            components: vec![
                J2kComponentInfo {
                    depth: 8,
                    is_signed: false,
                    dx: 1,
                    dy: 1,
                };
                3
            ],
            ..J2kSiz::default()
        };
        writer.write_siz(&siz).unwrap();
        writer.write_cod(&J2kCod {
            number_of_layers: 1,
            decomposition_levels: 5,
            transformation: 1,
            ..J2kCod::default()
        });
        writer
            .write_qcd(&J2kQcd {
                quant_style: 0x40,
                exponents: vec![8, 9, 9, 10],
            })
            .unwrap();
        writer.write_com("hello").unwrap();
        writer.write_sot(&J2kTilePart {
            length: 16,
            part_count: 1,
            ..J2kTilePart::default()
        });
        writer.write_sod();
        writer.write_bytes(&[0x11, 0x22]);
        writer.write_eoc();

        let written = out.as_bytes();
        assert_eq!(&written[..4], &[0xFF, 0x4F, 0xFF, 0x51]);
        // Lsiz for three components
        assert_eq!(&written[4..6], &[0x00, 47]);
        assert!(written.windows(2).any(|w| w == [0xFF, 0x52])); // COD
        assert!(written.windows(2).any(|w| w == [0xFF, 0x5C])); // QCD
        assert!(written.windows(2).any(|w| w == [0xFF, 0x64])); // COM
        assert!(written.windows(2).any(|w| w == [0xFF, 0x90])); // SOT
        assert!(written.windows(2).any(|w| w == [0xFF, 0x93])); // SOD
        assert_eq!(&written[written.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn qcd_stores_exponent_in_high_bits() {
        let mut out = OutputStream::new();
        J2kWriter::new(&mut out)
            .write_qcd(&J2kQcd {
                quant_style: 0x40,
                exponents: vec![8],
            })
            .unwrap();
        assert_eq!(out.as_bytes(), &[0xFF, 0x5C, 0x00, 0x04, 0x40, 0x40]);
    }

    #[test]
    fn siz_requires_components() {
        let mut out = OutputStream::new();
        assert!(J2kWriter::new(&mut out).write_siz(&J2kSiz::default()).is_err());
        assert!(out.is_empty());
    }
}
