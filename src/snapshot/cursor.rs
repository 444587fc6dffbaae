//! Bounds-checked little-endian reads over a borrowed byte buffer

use crate::core::types::{ProcError, ProcResult};

/// Read-only view of a snapshot buffer.
///
/// Every read is checked against the buffer length; an out-of-range read
/// is reported as a malformed snapshot at the offending offset.
#[derive(Debug, Clone, Copy)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ByteCursor { buf }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Borrows `len` bytes starting at `offset`
    pub fn bytes(&self, offset: usize, len: usize) -> ProcResult<&'a [u8]> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| ProcError::malformed(offset, "length overflows"))?;
        self.buf.get(offset..end).ok_or_else(|| {
            ProcError::malformed(
                offset,
                format!("read of {} bytes past end of {}-byte buffer", len, self.buf.len()),
            )
        })
    }

    fn array<const N: usize>(&self, offset: usize) -> ProcResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(offset, N)?);
        Ok(out)
    }

    pub fn u16_at(&self, offset: usize) -> ProcResult<u16> {
        Ok(u16::from_le_bytes(self.array(offset)?))
    }

    pub fn u32_at(&self, offset: usize) -> ProcResult<u32> {
        Ok(u32::from_le_bytes(self.array(offset)?))
    }

    pub fn i32_at(&self, offset: usize) -> ProcResult<i32> {
        Ok(i32::from_le_bytes(self.array(offset)?))
    }

    pub fn u64_at(&self, offset: usize) -> ProcResult<u64> {
        Ok(u64::from_le_bytes(self.array(offset)?))
    }

    /// Reads a pointer-sized unsigned value, widened to `u64`
    pub fn pointer_at(&self, offset: usize, pointer_size: usize) -> ProcResult<u64> {
        match pointer_size {
            4 => Ok(u64::from(self.u32_at(offset)?)),
            8 => self.u64_at(offset),
            other => Err(ProcError::malformed(
                offset,
                format!("unsupported pointer size {}", other),
            )),
        }
    }

    /// Decodes `byte_len` bytes of UTF-16LE; a trailing odd byte is ignored
    pub fn utf16_at(&self, offset: usize, byte_len: usize) -> ProcResult<String> {
        let raw = self.bytes(offset, byte_len)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(String::from_utf16_lossy(&units))
    }
}

/// Decodes a UTF-16LE byte slice, stopping at the first NUL
pub fn decode_utf16_bytes(raw: &[u8]) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_little_endian() {
        let buf = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let cursor = ByteCursor::new(&buf);
        assert_eq!(cursor.u16_at(0).unwrap(), 0x0201);
        assert_eq!(cursor.u32_at(0).unwrap(), 0x04030201);
        assert_eq!(cursor.u64_at(0).unwrap(), 0x0807060504030201);
        assert_eq!(cursor.pointer_at(4, 4).unwrap(), 0x08070605);
    }

    #[test]
    fn test_out_of_bounds_is_malformed() {
        let buf = [0u8; 6];
        let cursor = ByteCursor::new(&buf);
        assert!(cursor.u32_at(2).is_ok());
        let err = cursor.u32_at(3).unwrap_err();
        assert!(matches!(err, ProcError::MalformedSnapshot { offset: 3, .. }));
        assert!(cursor.bytes(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_bad_pointer_size() {
        let buf = [0u8; 16];
        assert!(ByteCursor::new(&buf).pointer_at(0, 2).is_err());
    }

    #[test]
    fn test_utf16_decoding() {
        let raw: Vec<u8> = "cmd.exe"
            .encode_utf16()
            .flat_map(|u| u.to_le_bytes())
            .collect();
        let cursor = ByteCursor::new(&raw);
        assert_eq!(cursor.utf16_at(0, raw.len()).unwrap(), "cmd.exe");
        // odd trailing byte dropped
        assert_eq!(cursor.utf16_at(0, 5).unwrap(), "cm");

        let mut terminated = raw.clone();
        terminated.extend_from_slice(&[0, 0, b'x', 0]);
        assert_eq!(decode_utf16_bytes(&terminated), "cmd.exe");
    }
}
