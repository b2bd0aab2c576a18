//! Zero-run coefficient code used for tile-part data.
//!
//! Each non-zero coefficient is stored as a pair of LEB128 varints: the number
//! of zeros preceding it, then its zigzag-mapped value. Trailing zeros are
//! implied by the sample count, so an all-zero plane packs to nothing.

use crate::error::CodecError;

pub fn pack(coefficients: &[i32], out: &mut Vec<u8>) {
    let mut run: u64 = 0;
    for &value in coefficients {
        if value == 0 {
            run += 1;
            continue;
        }
        write_varint(out, run);
        write_varint(out, u64::from(zigzag(value)));
        run = 0;
    }
}

pub fn unpack(body: &[u8], count: usize) -> Result<Vec<i32>, CodecError> {
    let mut coefficients = Vec::new();
    coefficients
        .try_reserve_exact(count)
        .map_err(|_| CodecError::NotEnoughMemory)?;
    coefficients.resize(count, 0);

    let mut cursor = 0usize;
    let mut index = 0usize;
    while cursor < body.len() {
        let run = read_varint(body, &mut cursor)?;
        let raw = read_varint(body, &mut cursor)?;
        let raw = u32::try_from(raw)
            .map_err(|_| CodecError::invalid_data("coefficient value out of range"))?;
        index = usize::try_from(run)
            .ok()
            .and_then(|run| index.checked_add(run))
            .filter(|&i| i < count)
            .ok_or_else(|| {
                CodecError::invalid_data(format!(
                    "coefficient run overflows {count} sample(s)"
                ))
            })?;
        coefficients[index] = unzigzag(raw);
        index += 1;
    }
    Ok(coefficients)
}

fn zigzag(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

fn unzigzag(raw: u32) -> i32 {
    ((raw >> 1) as i32) ^ -((raw & 1) as i32)
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn read_varint(data: &[u8], cursor: &mut usize) -> Result<u64, CodecError> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *data.get(*cursor).ok_or(CodecError::NeedMoreData {
            needed: 1,
            available: 0,
        })?;
        *cursor += 1;
        if shift > 63 {
            return Err(CodecError::invalid_data("varint too long"));
        }
        value |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_plane_packs_to_nothing() {
        let mut out = Vec::new();
        pack(&[0; 4096], &mut out);
        assert!(out.is_empty());
        assert_eq!(unpack(&out, 4096).unwrap(), vec![0; 4096]);
    }

    #[test]
    fn sparse_values_survive() {
        let mut coefficients = vec![0i32; 300];
        coefficients[0] = -1;
        coefficients[130] = 70000;
        coefficients[299] = i32::MIN;
        let mut out = Vec::new();
        pack(&coefficients, &mut out);
        assert_eq!(unpack(&out, 300).unwrap(), coefficients);
    }

    #[test]
    fn zigzag_is_symmetric_around_zero() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(unzigzag(zigzag(i32::MAX)), i32::MAX);
        assert_eq!(unzigzag(zigzag(i32::MIN)), i32::MIN);
    }

    #[test]
    fn run_past_sample_count_is_rejected() {
        let mut out = Vec::new();
        pack(&[0, 0, 0, 5], &mut out);
        assert!(matches!(unpack(&out, 3), Err(CodecError::InvalidData(_))));
    }

    #[test]
    fn truncated_pair_needs_more_data() {
        let mut out = Vec::new();
        pack(&[0, 300], &mut out);
        out.pop();
        assert!(matches!(
            unpack(&out, 2),
            Err(CodecError::NeedMoreData { .. })
        ));
    }
}
