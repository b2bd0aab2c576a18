pub const MARKER_START_BYTE: u8 = 0xFF;

pub const MINIMUM_COMPONENT_COUNT: u16 = 1;
pub const MAXIMUM_COMPONENT_COUNT: u16 = 16384;

// Precision accepted by the image builder. The reference codec narrows this to
// MAXIMUM_CODED_PRECISION.
pub const MINIMUM_PRECISION: u8 = 1;
pub const MAXIMUM_PRECISION: u8 = 31;
pub const MAXIMUM_CODED_PRECISION: u8 = 16;

// Resolution levels = decomposition levels + 1 (ISO/IEC 15444-1, A.6.1).
pub const DEFAULT_RESOLUTION_COUNT: u8 = 6;
pub const MAXIMUM_RESOLUTION_COUNT: u8 = 33;

// Code-block size exponents as stored in COD (actual size = 2^(xcb + 2)).
pub const DEFAULT_CODEBLOCK_EXPONENT: u8 = 4;
pub const MAXIMUM_CODEBLOCK_EXPONENT: u8 = 8;

// Largest component plane the reference codec allocates (1 GiB of i32).
pub const MAXIMUM_COMPONENT_SAMPLES: usize = 1 << 28;

pub const GUARD_BITS: u8 = 2;

// SOT (12 bytes including marker) followed by SOD (2 bytes).
pub const TILE_PART_HEADER_SIZE: u32 = 14;

pub const COMMENT_REGISTRATION_LATIN: u16 = 1;

pub const DEFAULT_OUTPUT_BASE_NAME: &str = "testempty2";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
