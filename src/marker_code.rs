use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::CodecError;

/// Marker codes of the JPEG 2000 Part 1 codestream (ISO/IEC 15444-1, Annex A).
///
/// Only the second byte is stored; every marker is preceded by 0xFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum MarkerCode {
    /// SOC: Start of codestream.
    StartOfCodestream = 0x4F,

    /// CAP: Extended capabilities (Part 2 / HTJ2K).
    Capabilities = 0x50,

    /// SIZ: Image and tile size.
    ImageAndTileSize = 0x51,

    /// COD: Coding style default.
    CodingStyleDefault = 0x52,

    /// COC: Coding style component.
    CodingStyleComponent = 0x53,

    /// TLM: Tile-part lengths.
    TilePartLengths = 0x55,

    /// PLM: Packet lengths, main header.
    PacketLengthsMain = 0x57,

    /// PLT: Packet lengths, tile-part header.
    PacketLengthsTilePart = 0x58,

    /// QCD: Quantization default.
    QuantizationDefault = 0x5C,

    /// QCC: Quantization component.
    QuantizationComponent = 0x5D,

    /// RGN: Region of interest.
    RegionOfInterest = 0x5E,

    /// POC: Progression order change.
    ProgressionOrderChange = 0x5F,

    /// PPM: Packed packet headers, main header.
    PackedPacketHeadersMain = 0x60,

    /// PPT: Packed packet headers, tile-part header.
    PackedPacketHeadersTilePart = 0x61,

    /// CRG: Component registration.
    ComponentRegistration = 0x63,

    /// COM: Comment.
    Comment = 0x64,

    /// SOT: Start of tile-part.
    StartOfTile = 0x90,

    /// SOP: Start of packet.
    StartOfPacket = 0x91,

    /// EPH: End of packet header.
    EndOfPacketHeader = 0x92,

    /// SOD: Start of data.
    StartOfData = 0x93,

    /// EOC: End of codestream.
    EndOfCodestream = 0xD9,
}

impl MarkerCode {
    /// Delimiting markers carry no length field.
    pub fn has_segment(self) -> bool {
        !matches!(
            self,
            Self::StartOfCodestream
                | Self::StartOfData
                | Self::EndOfCodestream
                | Self::EndOfPacketHeader
        )
    }

    pub fn parse(value: u8) -> Result<Self, CodecError> {
        Self::try_from(value).map_err(|e| CodecError::UnknownMarker(e.number))
    }
}
