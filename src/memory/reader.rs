//! Typed reads over a foreign address space

use crate::core::types::{Address, ProcError, ProcResult};

/// A foreign address space that can be read from.
///
/// Implemented by live process handles and by in-memory fakes in tests.
/// A read either fills the whole buffer or fails; partial reads are errors.
pub trait RemoteMemory {
    fn read(&self, address: Address, buffer: &mut [u8]) -> ProcResult<()>;
}

impl<M: RemoteMemory + ?Sized> RemoteMemory for &M {
    fn read(&self, address: Address, buffer: &mut [u8]) -> ProcResult<()> {
        (**self).read(address, buffer)
    }
}

/// Basic little-endian reader over a [`RemoteMemory`]
pub struct MemoryReader<'a, M: ?Sized> {
    memory: &'a M,
}

impl<'a, M: RemoteMemory + ?Sized> MemoryReader<'a, M> {
    pub fn new(memory: &'a M) -> Self {
        MemoryReader { memory }
    }

    /// Read raw bytes from memory
    pub fn read_raw(&self, address: Address, size: usize) -> ProcResult<Vec<u8>> {
        let mut buffer = vec![0u8; size];
        self.memory.read(address, &mut buffer)?;
        Ok(buffer)
    }

    pub fn read_u16(&self, address: Address) -> ProcResult<u16> {
        let mut buffer = [0u8; 2];
        self.memory.read(address, &mut buffer)?;
        Ok(u16::from_le_bytes(buffer))
    }

    pub fn read_u32(&self, address: Address) -> ProcResult<u32> {
        let mut buffer = [0u8; 4];
        self.memory.read(address, &mut buffer)?;
        Ok(u32::from_le_bytes(buffer))
    }

    pub fn read_u64(&self, address: Address) -> ProcResult<u64> {
        let mut buffer = [0u8; 8];
        self.memory.read(address, &mut buffer)?;
        Ok(u64::from_le_bytes(buffer))
    }

    /// Reads a pointer of the target's width (4 or 8 bytes)
    pub fn read_pointer(&self, address: Address, pointer_size: usize) -> ProcResult<Address> {
        match pointer_size {
            4 => self.read_u32(address).map(|v| Address::new(u64::from(v))),
            8 => self.read_u64(address).map(Address::new),
            other => Err(ProcError::read_failed(
                address,
                format!("unsupported pointer size {}", other),
            )),
        }
    }

    /// Reads exactly `byte_len` bytes and decodes them as UTF-16LE.
    ///
    /// The string is not expected to be NUL-terminated; an odd trailing byte is ignored.
    pub fn read_utf16(&self, address: Address, byte_len: usize) -> ProcResult<String> {
        if byte_len == 0 {
            return Ok(String::new());
        }
        let raw = self.read_raw(address, byte_len)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(String::from_utf16_lossy(&units))
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeMemory;
    use super::*;

    #[test]
    fn test_typed_reads() {
        let mut mem = FakeMemory::default();
        mem.map(
            0x1000,
            vec![0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xEF, 0xBE, 0xAD, 0xDE, 0, 0],
        );
        let reader = MemoryReader::new(&mem);
        assert_eq!(reader.read_u16(Address::new(0x1000)).unwrap(), 0x1234);
        assert_eq!(reader.read_u32(Address::new(0x1002)).unwrap(), 0x1234_5678);
        assert_eq!(
            reader.read_pointer(Address::new(0x1006), 4).unwrap(),
            Address::new(0xDEAD_BEEF)
        );
        assert!(reader.read_pointer(Address::new(0x1000), 3).is_err());
    }

    #[test]
    fn test_reads_past_region_fail() {
        let mut mem = FakeMemory::default();
        mem.map(0x1000, vec![0; 4]);
        let reader = MemoryReader::new(&mem);
        assert!(reader.read_u64(Address::new(0x1000)).is_err());
        assert!(reader.read_u16(Address::new(0x0FFF)).is_err());
    }

    #[test]
    fn test_utf16_decoding() {
        let text: Vec<u8> = "cmd /c".encode_utf16().flat_map(u16::to_le_bytes).collect();
        let mut mem = FakeMemory::default();
        mem.map(0x2000, text.clone());
        let reader = MemoryReader::new(&mem);
        assert_eq!(
            reader.read_utf16(Address::new(0x2000), text.len()).unwrap(),
            "cmd /c"
        );
        assert_eq!(reader.read_utf16(Address::new(0x2000), 0).unwrap(), "");
        // an empty read never touches the target
        assert_eq!(mem.reads.get(), 1);
    }
}
