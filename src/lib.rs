//! Round-trip verification harness for JPEG 2000 codestreams.
//!
//! Builds a synthetic image, encodes it through a [`Codec`] collaborator,
//! persists the codestream, reloads it and decodes it again. The crate ships a
//! reference collaborator in [`j2k`].

pub mod codec;
pub mod constants;
pub mod driver;
pub mod error;
pub mod event;
pub mod harness;
pub mod image;
pub mod j2k;
pub mod marker_code;
pub mod persist;
pub mod session;
pub mod stream;

pub use codec::Codec;
pub use error::{CodecError, HarnessError, PersistError};
pub use event::{Event, EventLevel, EventManager};
pub use harness::{ExitPolicy, HarnessConfig, RoundTripReport, RunOutcome};
pub use image::{ComponentParams, Image, ImageComponent};
pub use j2k::J2kCodec;
pub use session::{DecodeParameters, DecodeSession, EncodeParameters, EncodeSession};
pub use stream::{InputStream, OutputStream};

/// Container format of an encoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CodecFormat {
    /// Raw JPEG 2000 codestream (SOC ... EOC).
    #[default]
    J2k,
    /// JP2 box container wrapping a codestream.
    Jp2,
}

const JP2_SIGNATURE_PREFIX: &[u8] = b"\x00\x00\x00\x0CjP  ";
const J2K_SIGNATURE: &[u8] = &[0xFF, 0x4F, 0xFF, 0x51];

impl CodecFormat {
    /// File extension conventionally used for this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::J2k => "j2k",
            Self::Jp2 => "jp2",
        }
    }

    /// Detects the format from the leading magic bytes.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(JP2_SIGNATURE_PREFIX) {
            Some(Self::Jp2)
        } else if data.starts_with(J2K_SIGNATURE) {
            Some(Self::J2k)
        } else {
            None
        }
    }
}

impl std::fmt::Display for CodecFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::J2k => f.write_str("J2K"),
            Self::Jp2 => f.write_str("JP2"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    /// Not known to the producer of the image.
    Unknown,
    /// Not signalled by the container (raw codestreams carry no color space).
    #[default]
    Unspecified,
    Srgb,
    Gray,
    Sycc,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_format_from_magic() {
        assert_eq!(
            CodecFormat::detect(&[0xFF, 0x4F, 0xFF, 0x51, 0x00]),
            Some(CodecFormat::J2k)
        );
        assert_eq!(
            CodecFormat::detect(b"\x00\x00\x00\x0CjP  \r\n\x87\n"),
            Some(CodecFormat::Jp2)
        );
        assert_eq!(CodecFormat::detect(&[0xFF, 0xD8, 0xFF]), None);
        assert_eq!(CodecFormat::detect(&[]), None);
    }

    #[test]
    fn extension_follows_format() {
        assert_eq!(CodecFormat::J2k.extension(), "j2k");
        assert_eq!(CodecFormat::Jp2.extension(), "jp2");
        assert_eq!(CodecFormat::Jp2.to_string(), "JP2");
    }
}
