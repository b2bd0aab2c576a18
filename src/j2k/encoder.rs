//! JPEG 2000 encoder for the reference codec.
//!
//! Produces a single-tile codestream with one tile-part per component. Each
//! tile-part carries the level-shifted samples after a reversible 5/3 DWT,
//! packed with the zero-run code of [`super::coefficients`].

use super::coefficients;
use super::dwt::Dwt53;
use super::header::{
    J2kCod, J2kComponentInfo, J2kQcd, J2kSiz, J2kTilePart, TRANSFORM_REVERSIBLE_53,
};
use super::jp2::{self, EnumeratedColorSpace, Jp2ImageHeader, Jp2Writer};
use super::writer::J2kWriter;
use crate::CodecFormat;
use crate::constants::{
    GUARD_BITS, MAXIMUM_CODED_PRECISION, MAXIMUM_COMPONENT_SAMPLES, TILE_PART_HEADER_SIZE,
};
use crate::error::CodecError;
use crate::image::{Image, ImageComponent, component_extent, sample_range};
use crate::session::{EncodeParameters, EncodeSession};
use crate::stream::OutputStream;

pub struct J2kEncoder<'s> {
    session: &'s mut EncodeSession,
    parameters: EncodeParameters,
}

impl<'s> J2kEncoder<'s> {
    /// Fails with `SessionNotConfigured` until `setup` has been called.
    pub fn new(session: &'s mut EncodeSession) -> Result<Self, CodecError> {
        let parameters = session.parameters()?.clone();
        Ok(Self {
            session,
            parameters,
        })
    }

    pub fn encode(&mut self, image: &Image, stream: &mut OutputStream) -> Result<(), CodecError> {
        self.check_image(image)?;
        let start = stream.tell();

        match self.parameters.format {
            CodecFormat::J2k => self.write_codestream(image, stream)?,
            CodecFormat::Jp2 => {
                let depths: Vec<(u8, bool)> = image
                    .components
                    .iter()
                    .map(|c| (c.precision, c.signed))
                    .collect();
                let header = Jp2ImageHeader {
                    height: image.height(),
                    width: image.width(),
                    component_count: image.component_count() as u16,
                    bits_per_component: jp2::bits_per_component(&depths),
                };
                let bpcc: Vec<u8> = image
                    .components
                    .iter()
                    .map(|c| J2kComponentInfo::from(c).ssiz())
                    .collect();
                let colour = self.container_colour(image);

                let mut writer = Jp2Writer::new(stream);
                writer.write_header(&header, &bpcc, colour);
                writer.begin_codestream();
                self.write_codestream(image, writer.stream())?;
                writer.end_codestream()?;
            }
        }

        self.session.info(format!(
            "{} encoded: {} component(s), {}x{}, {} byte(s)",
            self.parameters.format,
            image.component_count(),
            image.width(),
            image.height(),
            stream.tell() - start
        ));
        Ok(())
    }

    /// Rejects images the codestream syntax or this coder cannot carry.
    fn check_image(&self, image: &Image) -> Result<(), CodecError> {
        if image.components.is_empty() {
            return Err(CodecError::invalid_argument("image has no components"));
        }
        if image.component_count() > u8::MAX as usize {
            return Err(CodecError::unsupported(format!(
                "{} components exceed the tile-part index range",
                image.component_count()
            )));
        }
        if image.x1 <= image.x0 || image.y1 <= image.y0 {
            return Err(CodecError::invalid_argument("image area is empty"));
        }

        let levels = self.parameters.decomposition_levels();
        for (index, component) in image.components.iter().enumerate() {
            if component.precision == 0 || component.precision > MAXIMUM_CODED_PRECISION {
                return Err(CodecError::unsupported(format!(
                    "component {index} precision {} outside 1..={MAXIMUM_CODED_PRECISION}",
                    component.precision
                )));
            }
            if component.dx == 0
                || component.dy == 0
                || component.dx > u8::MAX as u32
                || component.dy > u8::MAX as u32
            {
                return Err(CodecError::unsupported(format!(
                    "component {index} subsampling {}x{} outside 1..=255",
                    component.dx, component.dy
                )));
            }

            let width = component_extent(image.x0, image.x1, component.dx);
            let height = component_extent(image.y0, image.y1, component.dy);
            if (component.width, component.height) != (width, height) {
                return Err(CodecError::invalid_argument(format!(
                    "component {index} is {}x{}, reference grid implies {width}x{height}",
                    component.width, component.height
                )));
            }
            if component.sample_count() > MAXIMUM_COMPONENT_SAMPLES {
                return Err(CodecError::unsupported(format!(
                    "component {index} has {} samples, above {MAXIMUM_COMPONENT_SAMPLES}",
                    component.sample_count()
                )));
            }
            if component.data.len() != component.sample_count() {
                return Err(CodecError::invalid_argument(format!(
                    "component {index} holds {} sample(s), expected {}",
                    component.data.len(),
                    component.sample_count()
                )));
            }

            let (min, max) = sample_range(component.precision, component.signed);
            if let Some(sample) = component
                .data
                .iter()
                .find(|&&s| !(min..=max).contains(&i64::from(s)))
            {
                return Err(CodecError::invalid_argument(format!(
                    "component {index} sample {sample} outside {min}..={max}"
                )));
            }

            let lowest = |extent: u32| extent.checked_shr(u32::from(levels)).unwrap_or(0);
            if lowest(width) == 0 || lowest(height) == 0 {
                return Err(CodecError::unsupported(format!(
                    "number of resolutions ({}) is too high for component {index} ({width}x{height})",
                    self.parameters.resolution_count
                )));
            }
        }
        Ok(())
    }

    fn container_colour(&mut self, image: &Image) -> EnumeratedColorSpace {
        if let Some(colour) = EnumeratedColorSpace::from_color_space(image.color_space) {
            return colour;
        }
        let fallback = if image.component_count() >= 3 {
            EnumeratedColorSpace::Srgb
        } else {
            EnumeratedColorSpace::Greyscale
        };
        self.session.warning(format!(
            "color space {:?} cannot be signalled, writing {fallback:?}",
            image.color_space
        ));
        fallback
    }

    fn write_codestream(
        &self,
        image: &Image,
        stream: &mut OutputStream,
    ) -> Result<(), CodecError> {
        let levels = self.parameters.decomposition_levels();
        let siz = J2kSiz {
            capabilities: 0,
            width: image.x1,
            height: image.y1,
            x_origin: image.x0,
            y_origin: image.y0,
            tile_width: image.width(),
            tile_height: image.height(),
            tile_x_origin: image.x0,
            tile_y_origin: image.y0,
            components: image.components.iter().map(J2kComponentInfo::from).collect(),
        };
        let cod = J2kCod {
            coding_style: 0,
            progression_order: 0,
            number_of_layers: 1,
            mct: 0,
            decomposition_levels: levels,
            codeblock_width_exp: self.parameters.codeblock_width_exp,
            codeblock_height_exp: self.parameters.codeblock_height_exp,
            codeblock_style: 0,
            transformation: TRANSFORM_REVERSIBLE_53,
        };
        let qcd = reversible_qcd(image.components[0].precision, levels);

        let mut writer = J2kWriter::new(stream);
        writer.write_soc();
        writer.write_siz(&siz)?;
        writer.write_cod(&cod);
        writer.write_qcd(&qcd)?;
        if let Some(comment) = &self.parameters.comment {
            writer.write_com(comment)?;
        }

        let part_count = image.component_count() as u8;
        for (index, component) in image.components.iter().enumerate() {
            let body = encode_component(component, levels)?;
            let length = u32::try_from(body.len())
                .ok()
                .and_then(|len| len.checked_add(TILE_PART_HEADER_SIZE))
                .ok_or_else(|| CodecError::unsupported("tile-part exceeds 4 GiB"))?;
            writer.write_sot(&J2kTilePart {
                tile_index: 0,
                length,
                part_index: index as u8,
                part_count,
            });
            writer.write_sod();
            writer.write_bytes(&body);
        }
        writer.write_eoc();
        Ok(())
    }
}

impl From<&ImageComponent> for J2kComponentInfo {
    fn from(component: &ImageComponent) -> Self {
        Self {
            depth: component.precision,
            is_signed: component.signed,
            dx: component.dx as u8,
            dy: component.dy as u8,
        }
    }
}

/// Level shift, transform and pack one component into tile-part data.
fn encode_component(component: &ImageComponent, levels: u8) -> Result<Vec<u8>, CodecError> {
    let shift = if component.signed {
        0
    } else {
        1i32 << (component.precision - 1)
    };

    let mut coefficients = Vec::new();
    coefficients
        .try_reserve_exact(component.data.len())
        .map_err(|_| CodecError::NotEnoughMemory)?;
    coefficients.extend(component.data.iter().map(|&s| s - shift));

    Dwt53::forward_2d(
        &mut coefficients,
        component.width as usize,
        component.height as usize,
        levels,
    );

    let mut body = Vec::new();
    coefficients::pack(&coefficients, &mut body);
    Ok(body)
}

/// QCD without quantization: one exponent per subband, LL first, then
/// HL, LH, HH from the lowest resolution up (ISO/IEC 15444-1, E.1.1.1).
fn reversible_qcd(precision: u8, levels: u8) -> J2kQcd {
    let mut exponents = Vec::with_capacity(1 + 3 * levels as usize);
    exponents.push(precision);
    for _ in 0..levels {
        exponents.extend([precision + 1, precision + 1, precision + 2]);
    }
    J2kQcd {
        quant_style: GUARD_BITS << 5,
        exponents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ColorSpace;
    use crate::image::ComponentParams;

    fn session(params: EncodeParameters, image: &Image) -> EncodeSession {
        let mut session = EncodeSession::new(params.format);
        session.setup(params, image).unwrap();
        session
    }

    #[test]
    fn zero_image_encodes_to_headers_only() {
        let image = Image::create(&[ComponentParams::new(256, 256, 8)], ColorSpace::Gray).unwrap();
        let mut session = session(EncodeParameters::default(), &image);
        let mut out = OutputStream::new();
        J2kEncoder::new(&mut session)
            .unwrap()
            .encode(&image, &mut out)
            .unwrap();

        let bytes = out.as_bytes();
        assert_eq!(&bytes[..4], &[0xFF, 0x4F, 0xFF, 0x51]);
        assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);
        // Zero samples shift to -128, so only the LL band carries data.
        assert!(bytes.len() < 512);
    }

    #[test]
    fn oversized_component_is_declined() {
        let image = Image {
            x0: 0,
            y0: 0,
            x1: 20000,
            y1: 20000,
            color_space: ColorSpace::Gray,
            components: vec![ImageComponent {
                width: 20000,
                height: 20000,
                precision: 8,
                signed: false,
                dx: 1,
                dy: 1,
                x0: 0,
                y0: 0,
                data: Vec::new(),
            }],
        };
        let mut session = session(EncodeParameters::default(), &image);
        let err = J2kEncoder::new(&mut session)
            .unwrap()
            .encode(&image, &mut OutputStream::new())
            .unwrap_err();
        assert!(matches!(err, CodecError::ParameterValueNotSupported(_)));
    }

    #[test]
    fn too_many_resolutions_is_declined() {
        let image = Image::create(&[ComponentParams::new(4, 4, 8)], ColorSpace::Gray).unwrap();
        let mut session = session(EncodeParameters::default(), &image);
        let mut out = OutputStream::new();
        let err = J2kEncoder::new(&mut session)
            .unwrap()
            .encode(&image, &mut out)
            .unwrap_err();
        assert!(matches!(err, CodecError::ParameterValueNotSupported(_)));
        assert!(out.is_empty());
    }

    #[test]
    fn wide_precision_is_declined() {
        let image = Image::create(&[ComponentParams::new(64, 64, 20)], ColorSpace::Gray).unwrap();
        let mut session = session(EncodeParameters::default(), &image);
        let mut out = OutputStream::new();
        assert!(matches!(
            J2kEncoder::new(&mut session)
                .unwrap()
                .encode(&image, &mut out),
            Err(CodecError::ParameterValueNotSupported(_))
        ));
    }

    #[test]
    fn out_of_range_sample_is_rejected() {
        let mut image =
            Image::create(&[ComponentParams::new(64, 64, 8)], ColorSpace::Gray).unwrap();
        image.components[0].data[10] = 300;
        let mut session = session(EncodeParameters::default(), &image);
        let mut out = OutputStream::new();
        assert!(matches!(
            J2kEncoder::new(&mut session)
                .unwrap()
                .encode(&image, &mut out),
            Err(CodecError::InvalidArgument(_))
        ));
    }

    #[test]
    fn encoder_needs_configured_session() {
        let mut session = EncodeSession::new(CodecFormat::J2k);
        assert!(matches!(
            J2kEncoder::new(&mut session),
            Err(CodecError::SessionNotConfigured)
        ));
    }

    #[test]
    fn qcd_has_one_exponent_per_subband() {
        let qcd = reversible_qcd(8, 5);
        assert_eq!(qcd.exponents.len(), 16);
        assert_eq!(qcd.exponents[0], 8);
        assert_eq!(&qcd.exponents[1..4], &[9, 9, 10]);
        assert_eq!(qcd.guard_bits(), GUARD_BITS);
    }

    #[test]
    fn unspecified_colour_falls_back_with_warning() {
        let image =
            Image::create(&[ComponentParams::new(32, 32, 8)], ColorSpace::Unspecified).unwrap();
        let params = EncodeParameters {
            format: CodecFormat::Jp2,
            ..EncodeParameters::default()
        };
        let mut session = session(params, &image);
        let mut out = OutputStream::new();
        J2kEncoder::new(&mut session)
            .unwrap()
            .encode(&image, &mut out)
            .unwrap();
        assert_eq!(CodecFormat::detect(out.as_bytes()), Some(CodecFormat::Jp2));
        assert!(
            session
                .events()
                .iter()
                .any(|e| e.message.contains("cannot be signalled"))
        );
    }
}
