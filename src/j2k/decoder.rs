//! JPEG 2000 decoder for the reference codec.
//!
//! Reads what [`super::encoder::J2kEncoder`] writes: an optional JP2
//! container, the main header, one tile split into one tile-part per
//! component, then EOC.

use super::coefficients;
use super::dwt::Dwt53;
use super::header::{J2kComponentInfo, J2kHeader, TRANSFORM_REVERSIBLE_53};
use super::jp2::{JP2_BRAND, Jp2File, Jp2Reader};
use super::parser::J2kParser;
use crate::{CodecFormat, ColorSpace};
use crate::constants::{MAXIMUM_CODED_PRECISION, MAXIMUM_COMPONENT_SAMPLES};
use crate::error::CodecError;
use crate::image::{Image, ImageComponent, ceil_div, component_extent, sample_range};
use crate::marker_code::MarkerCode;
use crate::session::{DecodeParameters, DecodeSession};
use crate::stream::InputStream;

pub struct J2kDecoder<'s> {
    session: &'s mut DecodeSession,
    parameters: DecodeParameters,
}

impl<'s> J2kDecoder<'s> {
    /// Fails with `SessionNotConfigured` until `setup` has been called.
    pub fn new(session: &'s mut DecodeSession) -> Result<Self, CodecError> {
        let parameters = *session.parameters()?;
        Ok(Self {
            session,
            parameters,
        })
    }

    pub fn decode(&mut self, stream: &mut InputStream<'_>) -> Result<Image, CodecError> {
        let data = stream.remaining_data();
        let detected = CodecFormat::detect(data);
        if detected.is_some_and(|format| format != self.parameters.format) {
            return Err(CodecError::invalid_data(format!(
                "{} decoder given {} data",
                self.parameters.format,
                detected.map_or("unknown".to_string(), |f| f.to_string())
            )));
        }

        let image = match self.parameters.format {
            CodecFormat::J2k => self.decode_codestream(data, ColorSpace::Unspecified)?,
            CodecFormat::Jp2 => {
                let file = Jp2Reader::new(data).read()?;
                if file.brand != JP2_BRAND {
                    self.session.warning(format!(
                        "unexpected JP2 brand '{}'",
                        String::from_utf8_lossy(&file.brand)
                    ));
                }
                let image = self.decode_codestream(file.codestream, file.color_space())?;
                self.check_container(&file, &image);
                image
            }
        };

        stream.skip(data.len())?;
        Ok(image)
    }

    fn decode_codestream(
        &mut self,
        codestream: &[u8],
        color_space: ColorSpace,
    ) -> Result<Image, CodecError> {
        let mut reader = InputStream::new(codestream);
        let mut parser = J2kParser::new(&mut reader);

        let header = parser.parse_main_header()?;
        for comment in &header.comments {
            self.session.info(format!("comment: {comment}"));
        }
        for marker in &header.skipped {
            self.session
                .warning(format!("skipped unsupported marker {marker:?} in main header"));
        }
        self.check_header(&header)?;
        self.session.info(format!(
            "main header decoded: {}x{}, {} component(s), {} decomposition level(s)",
            header.siz.width - header.siz.x_origin,
            header.siz.height - header.siz.y_origin,
            header.component_count(),
            header.cod.decomposition_levels
        ));

        let count = header.component_count();
        let mut bodies: Vec<Option<&[u8]>> = vec![None; count];
        let mut saw_eoc = false;
        while let Some(marker) = parser.next_marker()? {
            match marker {
                MarkerCode::StartOfTile => {
                    let (tile_part, body) = parser.parse_tile_part()?;
                    if tile_part.tile_index != 0 {
                        return Err(CodecError::invalid_data(format!(
                            "tile index {} outside the single tile",
                            tile_part.tile_index
                        )));
                    }
                    let slot = bodies
                        .get_mut(tile_part.part_index as usize)
                        .ok_or_else(|| {
                            CodecError::invalid_data(format!(
                                "tile-part {} for a {count}-component image",
                                tile_part.part_index
                            ))
                        })?;
                    if slot.replace(body).is_some() {
                        return Err(CodecError::invalid_data(format!(
                            "duplicate tile-part {}",
                            tile_part.part_index
                        )));
                    }
                }
                MarkerCode::EndOfCodestream => {
                    saw_eoc = true;
                    break;
                }
                other => {
                    return Err(CodecError::invalid_data(format!(
                        "unexpected {other:?} between tile-parts"
                    )));
                }
            }
        }
        if !saw_eoc {
            self.session.warning("stream does not end with EOC");
        }

        let reduce = self.parameters.reduce;
        let siz = &header.siz;
        let mut components = Vec::new();
        components
            .try_reserve_exact(count)
            .map_err(|_| CodecError::NotEnoughMemory)?;
        for (index, (info, body)) in siz.components.iter().zip(&bodies).enumerate() {
            let body = body.ok_or_else(|| {
                CodecError::invalid_data(format!("component {index} has no tile-part data"))
            })?;
            components.push(decode_component(
                info,
                body,
                (siz.x_origin, siz.y_origin, siz.width, siz.height),
                header.cod.decomposition_levels,
                reduce,
            )?);
        }
        self.session.info(format!("tile 1/1 decoded: {count} component(s)"));

        Ok(Image {
            x0: reduced(siz.x_origin, reduce),
            y0: reduced(siz.y_origin, reduce),
            x1: reduced(siz.width, reduce),
            y1: reduced(siz.height, reduce),
            color_space,
            components,
        })
    }

    fn check_header(&mut self, header: &J2kHeader) -> Result<(), CodecError> {
        let siz = &header.siz;
        let cod = &header.cod;
        if cod.transformation != TRANSFORM_REVERSIBLE_53 {
            return Err(CodecError::unsupported(format!(
                "wavelet transformation {} (only reversible 5/3 is decoded)",
                cod.transformation
            )));
        }
        if header.qcd.style() != 0 {
            return Err(CodecError::unsupported(format!(
                "quantization style {}",
                header.qcd.style()
            )));
        }
        if self.parameters.reduce > cod.decomposition_levels {
            return Err(CodecError::unsupported(format!(
                "cannot reduce by {} with only {} decomposition level(s)",
                self.parameters.reduce, cod.decomposition_levels
            )));
        }
        if self.parameters.layers > cod.number_of_layers {
            self.session.warning(format!(
                "{} layer(s) requested, codestream has {}",
                self.parameters.layers, cod.number_of_layers
            ));
        }
        let tile_right = u64::from(siz.tile_x_origin) + u64::from(siz.tile_width);
        let tile_bottom = u64::from(siz.tile_y_origin) + u64::from(siz.tile_height);
        if siz.tile_x_origin > siz.x_origin
            || siz.tile_y_origin > siz.y_origin
            || tile_right < u64::from(siz.width)
            || tile_bottom < u64::from(siz.height)
        {
            return Err(CodecError::unsupported("codestream uses more than one tile"));
        }
        for (index, info) in siz.components.iter().enumerate() {
            if info.depth > MAXIMUM_CODED_PRECISION {
                return Err(CodecError::unsupported(format!(
                    "component {index} precision {} above {MAXIMUM_CODED_PRECISION}",
                    info.depth
                )));
            }
        }
        Ok(())
    }

    fn check_container(&mut self, file: &Jp2File<'_>, image: &Image) {
        let Some(ihdr) = file.image_header else {
            self.session.warning("JP2 file has no image header box");
            return;
        };
        if self.parameters.reduce == 0
            && (ihdr.width != image.width() || ihdr.height != image.height())
        {
            self.session.warning(format!(
                "ihdr declares {}x{}, codestream has {}x{}",
                ihdr.width,
                ihdr.height,
                image.width(),
                image.height()
            ));
        }
        if ihdr.component_count as usize != image.component_count() {
            self.session.warning(format!(
                "ihdr declares {} component(s), codestream has {}",
                ihdr.component_count,
                image.component_count()
            ));
        }
    }
}

/// Unpacks, inverse-transforms and un-shifts one component.
fn decode_component(
    info: &J2kComponentInfo,
    body: &[u8],
    (x0, y0, x1, y1): (u32, u32, u32, u32),
    levels: u8,
    reduce: u8,
) -> Result<ImageComponent, CodecError> {
    let dx = u32::from(info.dx);
    let dy = u32::from(info.dy);
    let width = component_extent(x0, x1, dx) as usize;
    let height = component_extent(y0, y1, dy) as usize;
    if width == 0 || height == 0 {
        return Err(CodecError::invalid_data(format!(
            "subsampling {dx}x{dy} leaves the component empty"
        )));
    }
    let count = width
        .checked_mul(height)
        .filter(|&count| count <= MAXIMUM_COMPONENT_SAMPLES)
        .ok_or_else(|| {
            CodecError::invalid_data(format!(
                "{width}x{height} component exceeds {MAXIMUM_COMPONENT_SAMPLES} samples"
            ))
        })?;

    let mut coefficients = coefficients::unpack(body, count)?;
    let (out_width, out_height) =
        Dwt53::inverse_2d(&mut coefficients, width, height, levels, reduce)?;

    let shift = if info.is_signed {
        0
    } else {
        1i64 << (info.depth - 1)
    };
    let (min, max) = sample_range(info.depth, info.is_signed);
    let mut data = Vec::new();
    data.try_reserve_exact(out_width * out_height)
        .map_err(|_| CodecError::NotEnoughMemory)?;
    for row in coefficients.chunks(width).take(out_height) {
        data.extend(
            row[..out_width]
                .iter()
                .map(|&c| (i64::from(c) + shift).clamp(min, max) as i32),
        );
    }

    Ok(ImageComponent {
        width: out_width as u32,
        height: out_height as u32,
        precision: info.depth,
        signed: info.is_signed,
        dx,
        dy,
        x0: reduced(ceil_div(x0, dx), reduce),
        y0: reduced(ceil_div(y0, dy), reduce),
        data,
    })
}

/// `ceil(value / 2^levels)`.
fn reduced(value: u32, levels: u8) -> u32 {
    (0..levels).fold(value, |v, _| v.div_ceil(2))
}
