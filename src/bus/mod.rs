#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("bus error")]
    BusError,
}

/// Memory as seen by the CPU. All accesses are big-endian.
pub trait Bus {
    fn read8(&self, addr: u32) -> Result<u8, Error>;

    fn read16(&self, addr: u32) -> Result<u16, Error>;

    fn read32(&self, addr: u32) -> Result<u32, Error>;

    fn write8(&mut self, addr: u32, value: u8) -> Result<(), Error>;

    fn write16(&mut self, addr: u32, value: u16) -> Result<(), Error>;

    fn write32(&mut self, addr: u32, value: u32) -> Result<(), Error>;

    /// Called right before the CPU takes a branch.
    #[inline]
    fn trace_branch(&mut self) {}
}

/// Flat memory starting at address 0, used by the tests.
pub struct TestBus {
    mem: Vec<u8>,
    branches: usize,
}

impl TestBus {
    #[inline]
    pub fn new(size: usize, base: u32, program: &[u8]) -> Self {
        let mut mem = vec![0x00; size];
        let base = base as usize;
        mem[base..base + program.len()].copy_from_slice(program);
        Self { mem, branches: 0 }
    }

    #[inline]
    pub fn branches(&self) -> usize {
        self.branches
    }

    #[inline]
    fn slice<const N: usize>(&self, addr: u32) -> Result<[u8; N], Error> {
        let addr = addr as usize;
        self.mem
            .get(addr..addr + N)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(Error::BusError)
    }

    #[inline]
    fn slice_mut(&mut self, addr: u32, len: usize) -> Result<&mut [u8], Error> {
        let addr = addr as usize;
        self.mem.get_mut(addr..addr + len).ok_or(Error::BusError)
    }
}

impl Bus for TestBus {
    #[inline]
    fn read8(&self, addr: u32) -> Result<u8, Error> {
        Ok(u8::from_be_bytes(self.slice(addr)?))
    }

    #[inline]
    fn read16(&self, addr: u32) -> Result<u16, Error> {
        Ok(u16::from_be_bytes(self.slice(addr)?))
    }

    #[inline]
    fn read32(&self, addr: u32) -> Result<u32, Error> {
        Ok(u32::from_be_bytes(self.slice(addr)?))
    }

    #[inline]
    fn write8(&mut self, addr: u32, value: u8) -> Result<(), Error> {
        self.slice_mut(addr, 1)?.copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    #[inline]
    fn write16(&mut self, addr: u32, value: u16) -> Result<(), Error> {
        self.slice_mut(addr, 2)?.copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    #[inline]
    fn write32(&mut self, addr: u32, value: u32) -> Result<(), Error> {
        self.slice_mut(addr, 4)?.copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    #[inline]
    fn trace_branch(&mut self) {
        self.branches += 1;
    }
}
