//! Reversible 5/3 discrete wavelet transform (ISO/IEC 15444-1, Annex F).
//!
//! Coefficients are kept in the Mallat layout: after each level the low-pass
//! half of a row or column sits first, the high-pass half after it, and the
//! next level works on the top-left low-pass region.
//!
//! The inverse checks every lifting step: coefficients read from a damaged
//! codestream can push a sample out of `i32` range.

use crate::error::CodecError;

pub struct Dwt53;

impl Dwt53 {
    /// Forward 5/3 lifting on one line, in place, then de-interleaved into
    /// low-pass (even) followed by high-pass (odd) samples.
    pub fn forward(x: &mut [i32], scratch: &mut Vec<i32>) {
        let len = x.len();
        if len < 2 {
            return;
        }

        // Prediction: y[2n+1] = x[2n+1] - floor((x[2n] + x[2n+2]) / 2)
        for i in (1..len).step_by(2) {
            let right = if i + 1 < len { x[i + 1] } else { x[i - 1] };
            x[i] -= (x[i - 1] + right) >> 1;
        }
        // Update: y[2n] = x[2n] + floor((y[2n-1] + y[2n+1] + 2) / 4)
        for i in (0..len).step_by(2) {
            let left = if i > 0 { x[i - 1] } else { x[i + 1] };
            let right = if i + 1 < len { x[i + 1] } else { x[i - 1] };
            x[i] += (left + right + 2) >> 2;
        }

        scratch.clear();
        scratch.extend(x.iter().step_by(2));
        scratch.extend(x.iter().skip(1).step_by(2));
        x.copy_from_slice(scratch);
    }

    /// Inverse of [`Dwt53::forward`]. Fails with `InvalidData` when a lifting
    /// step leaves the `i32` range.
    pub fn inverse(x: &mut [i32], scratch: &mut Vec<i32>) -> Result<(), CodecError> {
        let len = x.len();
        if len < 2 {
            return Ok(());
        }

        let low_count = len.div_ceil(2);
        scratch.clear();
        scratch.extend((0..len).map(|i| {
            if i % 2 == 0 {
                x[i / 2]
            } else {
                x[low_count + i / 2]
            }
        }));
        x.copy_from_slice(scratch);

        for i in (0..len).step_by(2) {
            let left = if i > 0 { x[i - 1] } else { x[i + 1] };
            let right = if i + 1 < len { x[i + 1] } else { x[i - 1] };
            let update = (i64::from(left) + i64::from(right) + 2) >> 2;
            x[i] = lifted(i64::from(x[i]) - update)?;
        }
        for i in (1..len).step_by(2) {
            let right = if i + 1 < len { x[i + 1] } else { x[i - 1] };
            let prediction = (i64::from(x[i - 1]) + i64::from(right)) >> 1;
            x[i] = lifted(i64::from(x[i]) + prediction)?;
        }
        Ok(())
    }

    /// Multi-level forward transform of a `width` x `height` plane.
    pub fn forward_2d(data: &mut [i32], width: usize, height: usize, levels: u8) {
        let mut scratch = Vec::new();
        let mut column = Vec::new();
        let (mut w, mut h) = (width, height);
        for _ in 0..levels {
            if w < 2 && h < 2 {
                break;
            }
            for y in 0..h {
                Self::forward(&mut data[y * width..y * width + w], &mut scratch);
            }
            for x in 0..w {
                gather_column(data, width, x, h, &mut column);
                Self::forward(&mut column, &mut scratch);
                scatter_column(data, width, x, &column);
            }
            w = w.div_ceil(2);
            h = h.div_ceil(2);
        }
    }

    /// Multi-level inverse transform that stops `reduce` levels short of full
    /// resolution. Returns the size of the reconstructed top-left region.
    pub fn inverse_2d(
        data: &mut [i32],
        width: usize,
        height: usize,
        levels: u8,
        reduce: u8,
    ) -> Result<(usize, usize), CodecError> {
        let mut sizes = Vec::with_capacity(levels as usize + 1);
        sizes.push((width, height));
        for _ in 0..levels {
            let (w, h) = sizes[sizes.len() - 1];
            sizes.push((w.div_ceil(2), h.div_ceil(2)));
        }

        let mut scratch = Vec::new();
        let mut column = Vec::new();
        for level in (reduce as usize..levels as usize).rev() {
            let (w, h) = sizes[level];
            if w < 2 && h < 2 {
                continue;
            }
            for x in 0..w {
                gather_column(data, width, x, h, &mut column);
                Self::inverse(&mut column, &mut scratch)?;
                scatter_column(data, width, x, &column);
            }
            for y in 0..h {
                Self::inverse(&mut data[y * width..y * width + w], &mut scratch)?;
            }
        }
        Ok(sizes[(reduce as usize).min(levels as usize)])
    }
}

fn lifted(value: i64) -> Result<i32, CodecError> {
    i32::try_from(value)
        .map_err(|_| CodecError::invalid_data("wavelet coefficient out of range"))
}

fn gather_column(data: &[i32], stride: usize, x: usize, height: usize, column: &mut Vec<i32>) {
    column.clear();
    column.extend((0..height).map(|y| data[y * stride + x]));
}

fn scatter_column(data: &mut [i32], stride: usize, x: usize, column: &[i32]) {
    for (y, &value) in column.iter().enumerate() {
        data[y * stride + x] = value;
    }
}
