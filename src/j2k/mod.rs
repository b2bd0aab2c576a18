//! Reference JPEG 2000 codec.
//!
//! Lossless and single-tile: the reversible 5/3 wavelet with a zero-run
//! coefficient code in place of EBCOT. Output uses the standard marker
//! syntax and the JP2 box layout, so headers can be inspected with common
//! tools, but tile data is only readable by this decoder.

pub mod coefficients;
pub mod decoder;
pub mod dwt;
pub mod encoder;
pub mod header;
pub mod jp2;
pub mod parser;
pub mod writer;

pub use decoder::J2kDecoder;
pub use encoder::J2kEncoder;

use crate::CodecFormat;
use crate::codec::Codec;
use crate::constants::VERSION;
use crate::error::CodecError;
use crate::image::Image;
use crate::session::{DecodeSession, EncodeSession};
use crate::stream::{InputStream, OutputStream};

#[derive(Debug, Clone, Copy, Default)]
pub struct J2kCodec;

impl J2kCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for J2kCodec {
    fn version(&self) -> &str {
        VERSION
    }

    fn supports(&self, format: CodecFormat) -> bool {
        matches!(format, CodecFormat::J2k | CodecFormat::Jp2)
    }

    fn encode(
        &self,
        session: &mut EncodeSession,
        stream: &mut OutputStream,
        image: &Image,
    ) -> Result<(), CodecError> {
        J2kEncoder::new(session)?.encode(image, stream)
    }

    fn decode(
        &self,
        session: &mut DecodeSession,
        stream: &mut InputStream<'_>,
    ) -> Result<Image, CodecError> {
        J2kDecoder::new(session)?.decode(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ColorSpace;
    use crate::event::EventLevel;
    use crate::image::ComponentParams;
    use crate::session::{DecodeParameters, EncodeParameters};

    fn encode(image: &Image, params: EncodeParameters) -> Result<Vec<u8>, CodecError> {
        let mut session = EncodeSession::new(params.format);
        session.setup(params, image)?;
        let mut out = OutputStream::new();
        J2kCodec.encode(&mut session, &mut out, image)?;
        Ok(out.into_bytes())
    }

    fn decode(
        bytes: &[u8],
        params: DecodeParameters,
    ) -> (Result<Image, CodecError>, DecodeSession) {
        let mut session = DecodeSession::new(params.format);
        session.setup(params).unwrap();
        let mut input = InputStream::new(bytes);
        let result = J2kCodec.decode(&mut session, &mut input);
        (result, session)
    }

    fn gradient(width: u32, height: u32, precision: u8) -> Image {
        let mut image =
            Image::create(&[ComponentParams::new(width, height, precision)], ColorSpace::Gray)
                .unwrap();
        let max = (1i32 << precision) - 1;
        for (i, sample) in image.components[0].data.iter_mut().enumerate() {
            let (x, y) = (i as i32 % width as i32, i as i32 / width as i32);
            *sample = (x * 7 + y * 13 + (x * y) % 5) % (max + 1);
        }
        image
    }

    #[test]
    fn zero_image_round_trips() {
        let image = Image::create(&[ComponentParams::new(256, 256, 8)], ColorSpace::Gray).unwrap();
        let bytes = encode(&image, EncodeParameters::default()).unwrap();
        let (decoded, session) = decode(&bytes, DecodeParameters::default());
        let decoded = decoded.unwrap();
        assert!(decoded.same_geometry(&image));
        assert_eq!(decoded.components, image.components);
        assert_eq!(decoded.color_space, ColorSpace::Unspecified);
        assert!(session.events().iter().all(|e| e.level == EventLevel::Info));
    }

    #[test]
    fn gradient_is_lossless_at_odd_sizes() {
        for (w, h) in [(37, 29), (64, 2), (2, 50), (255, 3)] {
            let image = gradient(w, h, 10);
            let params = EncodeParameters {
                resolution_count: 2,
                ..EncodeParameters::default()
            };
            let bytes = encode(&image, params).unwrap();
            let decoded = decode(&bytes, DecodeParameters::default()).0.unwrap();
            assert_eq!(decoded.components[0].data, image.components[0].data, "{w}x{h}");
        }
    }

    #[test]
    fn signed_multi_component_jp2_round_trips() {
        let params = [
            ComponentParams::new(40, 24, 12).signed(true),
            ComponentParams::new(40, 24, 8),
            ComponentParams::new(20, 12, 8).subsampling(2, 2),
        ];
        let mut image = Image::create(&params, ColorSpace::Sycc).unwrap();
        for (c, component) in image.components.iter_mut().enumerate() {
            let (min, max) = (component.min_value() as i32, component.max_value() as i32);
            for (i, sample) in component.data.iter_mut().enumerate() {
                *sample = min + ((i as i32 * 31 + c as i32 * 17) % (max - min + 1));
            }
        }

        let encode_params = EncodeParameters {
            format: CodecFormat::Jp2,
            resolution_count: 3,
            ..EncodeParameters::default()
        };
        let bytes = encode(&image, encode_params).unwrap();
        assert_eq!(CodecFormat::detect(&bytes), Some(CodecFormat::Jp2));

        let decode_params = DecodeParameters {
            format: CodecFormat::Jp2,
            ..DecodeParameters::default()
        };
        let decoded = decode(&bytes, decode_params).0.unwrap();
        assert_eq!(decoded.color_space, ColorSpace::Sycc);
        assert_eq!((decoded.x1, decoded.y1), (image.x1, image.y1));
        for (a, b) in decoded.components.iter().zip(&image.components) {
            assert_eq!(a.params(), b.params());
            assert_eq!(a.data, b.data);
        }
    }

    #[test]
    fn reduce_halves_each_level() {
        let image = gradient(100, 60, 8);
        let bytes = encode(&image, EncodeParameters::default()).unwrap();
        let params = DecodeParameters {
            reduce: 2,
            ..DecodeParameters::default()
        };
        let decoded = decode(&bytes, params).0.unwrap();
        assert_eq!((decoded.width(), decoded.height()), (25, 15));
        assert_eq!(decoded.components[0].data.len(), 25 * 15);
    }

    #[test]
    fn reduce_past_levels_is_unsupported() {
        let image = gradient(64, 64, 8);
        let params = EncodeParameters {
            resolution_count: 2,
            ..EncodeParameters::default()
        };
        let bytes = encode(&image, params).unwrap();
        let (result, _) = decode(
            &bytes,
            DecodeParameters {
                reduce: 2,
                ..DecodeParameters::default()
            },
        );
        assert!(matches!(result, Err(CodecError::ParameterValueNotSupported(_))));
    }

    #[test]
    fn extra_layers_only_warn() {
        let image = gradient(32, 32, 8);
        let bytes = encode(&image, EncodeParameters::default()).unwrap();
        let (result, session) = decode(
            &bytes,
            DecodeParameters {
                layers: 5,
                ..DecodeParameters::default()
            },
        );
        assert!(result.is_ok());
        assert!(
            session
                .events()
                .iter()
                .any(|e| e.level == EventLevel::Warning && e.message.contains("layer"))
        );
    }

    #[test]
    fn missing_eoc_warns_but_decodes() {
        let image = gradient(32, 32, 8);
        let mut bytes = encode(&image, EncodeParameters::default()).unwrap();
        bytes.truncate(bytes.len() - 2);
        let (result, session) = decode(&bytes, DecodeParameters::default());
        assert_eq!(result.unwrap().components, image.components);
        assert!(session.events().iter().any(|e| e.message.contains("EOC")));
    }

    #[test]
    fn truncated_tile_part_is_rejected() {
        let image = gradient(32, 32, 8);
        let bytes = encode(&image, EncodeParameters::default()).unwrap();
        let (result, _) = decode(&bytes[..bytes.len() - 10], DecodeParameters::default());
        assert!(result.is_err());
    }

    #[test]
    fn jp2_data_is_rejected_by_j2k_session() {
        let image = gradient(32, 32, 8);
        let params = EncodeParameters {
            format: CodecFormat::Jp2,
            ..EncodeParameters::default()
        };
        let bytes = encode(&image, params).unwrap();
        let (result, _) = decode(&bytes, DecodeParameters::default());
        assert!(matches!(result, Err(CodecError::InvalidData(_))));
    }

    #[test]
    fn irreversible_transform_is_unsupported() {
        let image = gradient(32, 32, 8);
        let mut bytes = encode(&image, EncodeParameters::default()).unwrap();
        // SOC (2) + SIZ (2 + 41) + COD marker (2) + Lcod (2) + Scod..code-block style (9)
        let transformation = 2 + 43 + 2 + 2 + 9;
        assert_eq!(&bytes[45..47], &[0xFF, 0x52]);
        bytes[transformation] = 0;
        let (result, _) = decode(&bytes, DecodeParameters::default());
        assert!(matches!(result, Err(CodecError::ParameterValueNotSupported(_))));
    }

    #[test]
    fn codec_reports_version_and_formats() {
        assert_eq!(J2kCodec.version(), VERSION);
        assert!(J2kCodec.supports(CodecFormat::J2k));
        assert!(J2kCodec.supports(CodecFormat::Jp2));
    }
}
