//! Image buffers handed to and produced by a codec.

use crate::ColorSpace;
use crate::constants::{
    MAXIMUM_COMPONENT_COUNT, MAXIMUM_PRECISION, MINIMUM_COMPONENT_COUNT, MINIMUM_PRECISION,
};
use crate::error::CodecError;

/// Geometry and sample format of one component, used to create an [`Image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentParams {
    pub width: u32,
    pub height: u32,
    /// Bits per sample.
    pub precision: u8,
    pub signed: bool,
    /// Horizontal subsampling factor relative to the reference grid.
    pub dx: u32,
    /// Vertical subsampling factor relative to the reference grid.
    pub dy: u32,
    /// Component origin, in component samples.
    pub x0: u32,
    pub y0: u32,
}

impl ComponentParams {
    /// Unsigned, unsubsampled component with its origin at 0,0.
    pub fn new(width: u32, height: u32, precision: u8) -> Self {
        Self {
            width,
            height,
            precision,
            signed: false,
            dx: 1,
            dy: 1,
            x0: 0,
            y0: 0,
        }
    }

    pub fn signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    pub fn subsampling(mut self, dx: u32, dy: u32) -> Self {
        self.dx = dx;
        self.dy = dy;
        self
    }

    pub fn origin(mut self, x0: u32, y0: u32) -> Self {
        self.x0 = x0;
        self.y0 = y0;
        self
    }

    fn validate(&self, index: usize) -> Result<(), CodecError> {
        if self.width == 0 || self.height == 0 {
            return Err(CodecError::invalid_argument(format!(
                "component {index} has empty geometry {}x{}",
                self.width, self.height
            )));
        }
        if self.dx == 0 || self.dy == 0 {
            return Err(CodecError::invalid_argument(format!(
                "component {index} has zero subsampling factor"
            )));
        }
        if !(MINIMUM_PRECISION..=MAXIMUM_PRECISION).contains(&self.precision) {
            return Err(CodecError::invalid_argument(format!(
                "component {index} precision {} outside {MINIMUM_PRECISION}..={MAXIMUM_PRECISION}",
                self.precision
            )));
        }
        Ok(())
    }
}

/// One channel of pixel data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageComponent {
    pub width: u32,
    pub height: u32,
    pub precision: u8,
    pub signed: bool,
    pub dx: u32,
    pub dy: u32,
    pub x0: u32,
    pub y0: u32,
    /// Samples in raster order, `width * height` entries.
    pub data: Vec<i32>,
}

impl ImageComponent {
    pub fn sample_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Smallest sample value representable with this precision and signedness.
    pub fn min_value(&self) -> i64 {
        sample_range(self.precision, self.signed).0
    }

    /// Largest sample value representable with this precision and signedness.
    pub fn max_value(&self) -> i64 {
        sample_range(self.precision, self.signed).1
    }

    pub fn params(&self) -> ComponentParams {
        ComponentParams {
            width: self.width,
            height: self.height,
            precision: self.precision,
            signed: self.signed,
            dx: self.dx,
            dy: self.dy,
            x0: self.x0,
            y0: self.y0,
        }
    }
}

/// A multi-component image placed on the JPEG 2000 reference grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Image area on the reference grid: `[x0, x1) x [y0, y1)`.
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
    pub color_space: ColorSpace,
    pub components: Vec<ImageComponent>,
}

impl Image {
    /// Allocates an image with every sample set to zero.
    pub fn create(params: &[ComponentParams], color_space: ColorSpace) -> Result<Self, CodecError> {
        Self::create_filled(params, color_space, 0)
    }

    /// Allocates an image with one buffer per component, every sample set to
    /// `fill`.
    ///
    /// The reference grid is derived from the first component.
    pub fn create_filled(
        params: &[ComponentParams],
        color_space: ColorSpace,
        fill: i32,
    ) -> Result<Self, CodecError> {
        let count = params.len();
        if count < MINIMUM_COMPONENT_COUNT as usize || count > MAXIMUM_COMPONENT_COUNT as usize {
            return Err(CodecError::invalid_argument(format!(
                "component count {count} outside {MINIMUM_COMPONENT_COUNT}..={MAXIMUM_COMPONENT_COUNT}"
            )));
        }

        let mut components = Vec::new();
        components
            .try_reserve_exact(count)
            .map_err(|_| CodecError::NotEnoughMemory)?;

        for (index, p) in params.iter().enumerate() {
            p.validate(index)?;
            let (min, max) = sample_range(p.precision, p.signed);
            if !(min..=max).contains(&i64::from(fill)) {
                return Err(CodecError::invalid_argument(format!(
                    "fill value {fill} does not fit component {index} ({}-bit {})",
                    p.precision,
                    if p.signed { "signed" } else { "unsigned" }
                )));
            }

            let len = (p.width as usize)
                .checked_mul(p.height as usize)
                .ok_or(CodecError::NotEnoughMemory)?;
            let mut data = Vec::new();
            data.try_reserve_exact(len)
                .map_err(|_| CodecError::NotEnoughMemory)?;
            data.resize(len, fill);

            components.push(ImageComponent {
                width: p.width,
                height: p.height,
                precision: p.precision,
                signed: p.signed,
                dx: p.dx,
                dy: p.dy,
                x0: p.x0,
                y0: p.y0,
                data,
            });
        }

        let first = &params[0];
        let x0 = grid_coordinate(first.x0, first.dx)?;
        let y0 = grid_coordinate(first.y0, first.dy)?;
        let x1 = grid_coordinate(first.width, first.dx)?
            .checked_add(x0)
            .ok_or_else(|| CodecError::invalid_argument("image exceeds the reference grid"))?;
        let y1 = grid_coordinate(first.height, first.dy)?
            .checked_add(y0)
            .ok_or_else(|| CodecError::invalid_argument("image exceeds the reference grid"))?;

        Ok(Self {
            x0,
            y0,
            x1,
            y1,
            color_space,
            components,
        })
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Width of the image area on the reference grid.
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    /// Height of the image area on the reference grid.
    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    /// True when both images have the same component count and every
    /// component has the same dimensions.
    pub fn same_geometry(&self, other: &Image) -> bool {
        self.components.len() == other.components.len()
            && self
                .components
                .iter()
                .zip(&other.components)
                .all(|(a, b)| a.width == b.width && a.height == b.height)
    }
}

fn grid_coordinate(value: u32, factor: u32) -> Result<u32, CodecError> {
    value
        .checked_mul(factor)
        .ok_or_else(|| CodecError::invalid_argument("image exceeds the reference grid"))
}

/// `ceil(a / b)` for the reference-grid arithmetic of ISO/IEC 15444-1, B.2.
pub(crate) fn ceil_div(a: u32, b: u32) -> u32 {
    a.div_ceil(b)
}

/// Extent of a component with subsampling `d` over grid span `[start, end)`.
pub(crate) fn component_extent(start: u32, end: u32, d: u32) -> u32 {
    ceil_div(end, d) - ceil_div(start, d)
}

/// Inclusive sample range of a `precision`-bit component.
pub fn sample_range(precision: u8, signed: bool) -> (i64, i64) {
    if signed {
        let half = 1i64 << (precision - 1);
        (-half, half - 1)
    } else {
        (0, (1i64 << precision) - 1)
    }
}
