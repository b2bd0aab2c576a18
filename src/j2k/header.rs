//! Main-header and tile-part header structures of a J2K codestream.

use crate::marker_code::MarkerCode;

/// Per-component entry of the SIZ marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct J2kComponentInfo {
    /// Bit depth (1..=38 in the standard).
    pub depth: u8,
    pub is_signed: bool,
    /// Horizontal subsampling factor (XRsiz).
    pub dx: u8,
    /// Vertical subsampling factor (YRsiz).
    pub dy: u8,
}

impl J2kComponentInfo {
    /// Ssiz byte: depth - 1 with the sign flag in bit 7.
    pub fn ssiz(&self) -> u8 {
        (self.depth - 1) | if self.is_signed { 0x80 } else { 0 }
    }

    pub fn from_ssiz(ssiz: u8, dx: u8, dy: u8) -> Self {
        Self {
            depth: (ssiz & 0x7F) + 1,
            is_signed: ssiz & 0x80 != 0,
            dx,
            dy,
        }
    }
}

/// SIZ: image and tile size on the reference grid.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct J2kSiz {
    /// Rsiz capabilities.
    pub capabilities: u16,
    /// Xsiz: right edge of the image area (exclusive).
    pub width: u32,
    /// Ysiz: bottom edge of the image area (exclusive).
    pub height: u32,
    pub x_origin: u32,
    pub y_origin: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tile_x_origin: u32,
    pub tile_y_origin: u32,
    pub components: Vec<J2kComponentInfo>,
}

impl J2kSiz {
    pub fn segment_length(&self) -> u16 {
        38 + 3 * self.components.len() as u16
    }
}

/// COD: coding style default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct J2kCod {
    pub coding_style: u8,
    /// 0 = LRCP.
    pub progression_order: u8,
    pub number_of_layers: u16,
    pub mct: u8,
    pub decomposition_levels: u8,
    pub codeblock_width_exp: u8,
    pub codeblock_height_exp: u8,
    pub codeblock_style: u8,
    /// 0 = 9-7 irreversible, 1 = 5-3 reversible.
    pub transformation: u8,
}

pub const TRANSFORM_IRREVERSIBLE_97: u8 = 0;
pub const TRANSFORM_REVERSIBLE_53: u8 = 1;

/// QCD: quantization default. Only the reversible (no quantization) style is
/// produced, which carries one exponent byte per subband.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct J2kQcd {
    /// Sqcd: guard bits in the top 3 bits, style in the low 5.
    pub quant_style: u8,
    /// Exponents, one per subband (LL first).
    pub exponents: Vec<u8>,
}

impl J2kQcd {
    pub fn guard_bits(&self) -> u8 {
        self.quant_style >> 5
    }

    pub fn style(&self) -> u8 {
        self.quant_style & 0x1F
    }
}

/// SOT: start of tile-part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct J2kTilePart {
    pub tile_index: u16,
    /// Psot: length from the first byte of SOT to the end of the tile-part
    /// data. Zero means the tile-part runs to EOC.
    pub length: u32,
    pub part_index: u8,
    pub part_count: u8,
}

/// Everything the main header declares.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct J2kHeader {
    pub siz: J2kSiz,
    pub cod: J2kCod,
    pub qcd: J2kQcd,
    pub comments: Vec<String>,
    /// Recognised markers whose segments were skipped.
    pub skipped: Vec<MarkerCode>,
}

impl J2kHeader {
    pub fn component_count(&self) -> usize {
        self.siz.components.len()
    }
}
