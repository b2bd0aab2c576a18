//! JP2 box structure (ISO/IEC 15444-1 Annex I).

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::ColorSpace;
use crate::error::CodecError;
use crate::stream::OutputStream;

pub const JP2_SIGNATURE: &[u8; 12] = b"\x00\x00\x00\x0CjP  \r\n\x87\n";
pub const JP2_BRAND: [u8; 4] = *b"jp2 ";

const COLR_METHOD_ENUMERATED: u8 = 1;
const COLR_METHOD_RESTRICTED_ICC: u8 = 2;
const IHDR_COMPRESSION_JPEG2000: u8 = 7;
const BPC_VARIES: u8 = 0xFF;

/// EnumCS values of the colour specification box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum EnumeratedColorSpace {
    Srgb = 16,
    Greyscale = 17,
    Sycc = 18,
}

impl EnumeratedColorSpace {
    pub fn from_color_space(color_space: ColorSpace) -> Option<Self> {
        match color_space {
            ColorSpace::Srgb => Some(Self::Srgb),
            ColorSpace::Gray => Some(Self::Greyscale),
            ColorSpace::Sycc => Some(Self::Sycc),
            ColorSpace::Unknown | ColorSpace::Unspecified => None,
        }
    }

    pub fn color_space(self) -> ColorSpace {
        match self {
            Self::Srgb => ColorSpace::Srgb,
            Self::Greyscale => ColorSpace::Gray,
            Self::Sycc => ColorSpace::Sycc,
        }
    }
}

pub struct Jp2Box {
    pub length: u64,
    pub box_type: [u8; 4],
    pub data_range: std::ops::Range<usize>,
}

/// Image header box contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jp2ImageHeader {
    pub height: u32,
    pub width: u32,
    pub component_count: u16,
    /// Depth - 1 with the sign in bit 7, or 0xFF when components differ.
    pub bits_per_component: u8,
}

/// Colour information carried by the `colr` box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Jp2Colour {
    Enumerated(u32),
    IccProfile(Vec<u8>),
}

/// What a JP2 file holds, as far as decoding is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jp2File<'a> {
    pub brand: [u8; 4],
    pub image_header: Option<Jp2ImageHeader>,
    pub colour: Option<Jp2Colour>,
    pub codestream: &'a [u8],
}

impl Jp2File<'_> {
    /// Maps the colour box onto a [`ColorSpace`]; unknown or ICC-described
    /// spaces come back as `Unknown`.
    pub fn color_space(&self) -> ColorSpace {
        match &self.colour {
            Some(Jp2Colour::Enumerated(value)) => EnumeratedColorSpace::try_from(*value)
                .map(EnumeratedColorSpace::color_space)
                .unwrap_or(ColorSpace::Unknown),
            Some(Jp2Colour::IccProfile(_)) => ColorSpace::Unknown,
            None => ColorSpace::Unspecified,
        }
    }
}

pub struct Jp2Reader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Jp2Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Walks the top-level boxes (descending into `jp2h`) and returns the
    /// header information plus the contiguous codestream.
    pub fn read(&mut self) -> Result<Jp2File<'a>, CodecError> {
        let data = self.data;
        if !data.starts_with(JP2_SIGNATURE) {
            return Err(CodecError::invalid_data("missing JP2 signature box"));
        }
        self.position = JP2_SIGNATURE.len();

        let mut brand = None;
        let mut image_header = None;
        let mut colour = None;
        let mut codestream = None;

        while let Some(b) = self.read_box()? {
            let payload = &data[b.data_range.clone()];
            match &b.box_type {
                b"ftyp" => {
                    if payload.len() < 8 {
                        return Err(CodecError::invalid_data("ftyp box too short"));
                    }
                    brand = Some([payload[0], payload[1], payload[2], payload[3]]);
                }
                b"jp2h" => {
                    let mut inner = Jp2Reader::new(payload);
                    while let Some(child) = inner.read_box()? {
                        let child_payload = &payload[child.data_range.clone()];
                        match &child.box_type {
                            b"ihdr" => image_header = Some(parse_ihdr(child_payload)?),
                            b"colr" if colour.is_none() => colour = parse_colr(child_payload)?,
                            _ => {}
                        }
                    }
                }
                b"jp2c" => {
                    codestream = Some(payload);
                    break;
                }
                _ => {}
            }
        }

        let brand = brand.ok_or_else(|| CodecError::invalid_data("missing ftyp box"))?;
        let codestream =
            codestream.ok_or_else(|| CodecError::invalid_data("missing jp2c codestream box"))?;
        Ok(Jp2File {
            brand,
            image_header,
            colour,
            codestream,
        })
    }

    pub fn read_box(&mut self) -> Result<Option<Jp2Box>, CodecError> {
        if self.position + 8 > self.data.len() {
            return Ok(None);
        }

        let start_pos = self.position;
        let mut length = u32::from_be_bytes([
            self.data[self.position],
            self.data[self.position + 1],
            self.data[self.position + 2],
            self.data[self.position + 3],
        ]) as u64;

        let box_type = [
            self.data[self.position + 4],
            self.data[self.position + 5],
            self.data[self.position + 6],
            self.data[self.position + 7],
        ];

        self.position += 8;
        let mut header_size = 8;

        if length == 1 {
            // XLBox: 64-bit length follows.
            let bytes = self
                .data
                .get(self.position..self.position + 8)
                .ok_or_else(|| CodecError::invalid_data("truncated XLBox"))?;
            let mut extended = [0u8; 8];
            extended.copy_from_slice(bytes);
            length = u64::from_be_bytes(extended);
            self.position += 8;
            header_size += 8;
        } else if length == 0 {
            // Box extends to the end of the data.
            length = (self.data.len() - start_pos) as u64;
        }

        if length < header_size as u64 {
            return Err(CodecError::invalid_data(format!(
                "box length {length} smaller than its header"
            )));
        }

        let data_start = start_pos + header_size;
        let data_end = usize::try_from(length)
            .ok()
            .and_then(|len| start_pos.checked_add(len))
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                CodecError::invalid_data(format!(
                    "box '{}' runs past the end of the file",
                    String::from_utf8_lossy(&box_type)
                ))
            })?;

        self.position = data_end;

        Ok(Some(Jp2Box {
            length,
            box_type,
            data_range: data_start..data_end,
        }))
    }
}

fn parse_ihdr(payload: &[u8]) -> Result<Jp2ImageHeader, CodecError> {
    if payload.len() != 14 {
        return Err(CodecError::invalid_data(format!(
            "ihdr box has {} bytes, expected 14",
            payload.len()
        )));
    }
    Ok(Jp2ImageHeader {
        height: u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]),
        width: u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]),
        component_count: u16::from_be_bytes([payload[8], payload[9]]),
        bits_per_component: payload[10],
    })
}

fn parse_colr(payload: &[u8]) -> Result<Option<Jp2Colour>, CodecError> {
    if payload.len() < 3 {
        return Err(CodecError::invalid_data("colr box too short"));
    }
    match payload[0] {
        COLR_METHOD_ENUMERATED => {
            let bytes = payload
                .get(3..7)
                .ok_or_else(|| CodecError::invalid_data("colr box missing EnumCS"))?;
            Ok(Some(Jp2Colour::Enumerated(u32::from_be_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3],
            ]))))
        }
        COLR_METHOD_RESTRICTED_ICC => Ok(Some(Jp2Colour::IccProfile(payload[3..].to_vec()))),
        _ => Ok(None),
    }
}

/// Writes the JP2 boxes that precede the codestream, then frames the
/// codestream in a `jp2c` box.
pub struct Jp2Writer<'a> {
    stream: &'a mut OutputStream,
    codestream_box: Option<usize>,
}

impl<'a> Jp2Writer<'a> {
    pub fn new(stream: &'a mut OutputStream) -> Self {
        Self {
            stream,
            codestream_box: None,
        }
    }

    /// Writes signature, ftyp and jp2h (ihdr, optional bpcc, colr).
    pub fn write_header(
        &mut self,
        image_header: &Jp2ImageHeader,
        component_depths: &[u8],
        colour: EnumeratedColorSpace,
    ) {
        self.stream.write_bytes(JP2_SIGNATURE);

        self.stream.write_u32(20);
        self.stream.write_bytes(b"ftyp");
        self.stream.write_bytes(&JP2_BRAND);
        self.stream.write_u32(0); // MinV
        self.stream.write_bytes(&JP2_BRAND); // CL

        let bpcc_len = if image_header.bits_per_component == BPC_VARIES {
            8 + component_depths.len()
        } else {
            0
        };
        // jp2h = header + ihdr (22) + bpcc + colr (15)
        self.stream.write_u32((8 + 22 + bpcc_len + 15) as u32);
        self.stream.write_bytes(b"jp2h");

        self.stream.write_u32(22);
        self.stream.write_bytes(b"ihdr");
        self.stream.write_u32(image_header.height);
        self.stream.write_u32(image_header.width);
        self.stream.write_u16(image_header.component_count);
        self.stream.write_byte(image_header.bits_per_component);
        self.stream.write_byte(IHDR_COMPRESSION_JPEG2000);
        self.stream.write_byte(0); // UnkC
        self.stream.write_byte(0); // IPR

        if bpcc_len > 0 {
            self.stream.write_u32(bpcc_len as u32);
            self.stream.write_bytes(b"bpcc");
            self.stream.write_bytes(component_depths);
        }

        self.stream.write_u32(15);
        self.stream.write_bytes(b"colr");
        self.stream.write_byte(COLR_METHOD_ENUMERATED);
        self.stream.write_byte(0); // PREC
        self.stream.write_byte(0); // APPROX
        self.stream.write_u32(colour.into());
    }

    /// Opens the `jp2c` box; its length is filled in by `end_codestream`.
    pub fn begin_codestream(&mut self) {
        self.codestream_box = Some(self.stream.tell());
        self.stream.write_u32(0);
        self.stream.write_bytes(b"jp2c");
    }

    pub fn stream(&mut self) -> &mut OutputStream {
        self.stream
    }

    pub fn end_codestream(&mut self) -> Result<(), CodecError> {
        let start = self
            .codestream_box
            .take()
            .ok_or_else(|| CodecError::invalid_argument("jp2c box was not opened"))?;
        let length = u32::try_from(self.stream.tell() - start)
            .map_err(|_| CodecError::unsupported("codestream exceeds 4 GiB"))?;
        self.stream.patch_u32(start, length)
    }
}

/// ihdr BPC field for a set of (depth, signed) pairs.
pub fn bits_per_component(components: &[(u8, bool)]) -> u8 {
    let encode = |(depth, signed): (u8, bool)| (depth - 1) | if signed { 0x80 } else { 0 };
    match components.split_first() {
        Some((&first, rest)) if rest.iter().all(|&c| c == first) => encode(first),
        _ => BPC_VARIES,
    }
}
