//! Byte views over element buffers for byte-oriented substrates.
//!
//! Elements travel in native byte order: every rank of a group is assumed
//! to share one architecture, as with MPI's contiguous byte transfers.

use bytemuck::{CheckedBitPattern, NoUninit, checked};
use std::any::type_name;
use std::mem::size_of;

use crate::dist_error::DistError;

/// Byte view of elements about to be sent.
#[inline]
pub fn cast_slice<T: NoUninit>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// Rebuild `n` elements from received bytes.
///
/// Each element is bit-checked, so a byte that is not a valid `T` (say, a
/// `bool` of 2) fails with [`DistError::InvalidElement`].
pub fn decode_elements<T>(bytes: &[u8], n: usize) -> Result<Vec<T>, DistError>
where
    T: CheckedBitPattern,
{
    let width = size_of::<T>();
    let invalid = |index| DistError::InvalidElement {
        type_name: type_name::<T>(),
        index,
    };
    if width == 0 || n.checked_mul(width) != Some(bytes.len()) {
        return Err(invalid(0));
    }
    bytes
        .chunks_exact(width)
        .enumerate()
        .map(|(i, chunk)| checked::try_pod_read_unaligned(chunk).map_err(|_| invalid(i)))
        .collect()
}

/// Copy a received payload into `dst`, rejecting any length mismatch.
pub fn copy_exact(dst: &mut [u8], payload: &[u8], peer: usize) -> Result<(), DistError> {
    if payload.len() != dst.len() {
        return Err(DistError::CommError {
            neighbor: peer,
            reason: format!("expected {} bytes, got {}", dst.len(), payload.len()),
        });
    }
    dst.copy_from_slice(payload);
    Ok(())
}

/// Encode a `u64` control word (sizes, totals) for point-to-point traffic.
#[inline]
pub fn encode_u64(v: u64) -> [u8; 8] {
    v.to_le_bytes()
}

/// Decode a control word produced by [`encode_u64`].
pub fn decode_u64(payload: &[u8], peer: usize) -> Result<u64, DistError> {
    let bytes: [u8; 8] = payload.try_into().map_err(|_| DistError::CommError {
        neighbor: peer,
        reason: format!("expected an 8-byte control word, got {} bytes", payload.len()),
    })?;
    Ok(u64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_exact_rejects_short_payload() {
        let mut dst = [0u8; 4];
        assert!(copy_exact(&mut dst, &[1, 2, 3], 5).is_err());
        copy_exact(&mut dst, &[1, 2, 3, 4], 5).unwrap();
        assert_eq!(dst, [1, 2, 3, 4]);
    }

    #[test]
    fn control_word_is_little_endian() {
        assert_eq!(encode_u64(0x0102), [2, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(decode_u64(&encode_u64(77), 0).unwrap(), 77);
        assert!(decode_u64(&[1, 2], 3).is_err());
    }

    #[test]
    fn element_views_cover_whole_buffer() {
        let v = [1u32, 2, 9];
        let bytes = cast_slice(&v);
        assert_eq!(bytes.len(), 12);
        assert_eq!(decode_elements::<u32>(bytes, 3).unwrap(), v);
        // odd offset: decoding must not depend on the buffer's alignment
        let shifted = [&[0u8][..], bytes].concat();
        assert_eq!(decode_elements::<u32>(&shifted[1..], 3).unwrap(), v);
    }

    #[test]
    fn invalid_bool_bytes_are_rejected() {
        let flags = [true, false, true];
        assert_eq!(cast_slice(&flags), &[1, 0, 1]);
        assert_eq!(decode_elements::<bool>(&[1, 0, 1], 3).unwrap(), flags);
        assert_eq!(
            decode_elements::<bool>(&[1, 2, 0], 3),
            Err(DistError::InvalidElement {
                type_name: "bool",
                index: 1
            })
        );
        assert!(decode_elements::<u16>(&[1, 2, 3], 2).is_err());
    }
}
