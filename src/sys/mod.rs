use crate::{
    bus::{self, Bus},
    cpu::{Cpu, Exception},
};

const ROM_END: usize = 0x0001_0000;
const RAM_END: usize = 0x0100_0000;

/// ROM at `0x000000..0x010000` (read only), RAM up to `0x1000000`.
pub struct Memory {
    rom: Vec<u8>,
    ram: Vec<u8>,
    branches: u64,
}

impl Memory {
    #[inline]
    pub fn new<Rom: AsRef<[u8]>>(rom: Rom) -> Self {
        let mut rom = rom.as_ref().to_vec();
        rom.resize(ROM_END, 0x00);
        Self {
            rom,
            ram: vec![0; RAM_END],
            branches: 0,
        }
    }

    /// Number of branches taken by the CPU so far.
    #[inline]
    pub fn branches(&self) -> u64 {
        self.branches
    }

    #[inline]
    fn read<const N: usize>(&self, addr: u32) -> Result<[u8; N], bus::Error> {
        let addr = addr as usize;
        let mem = if addr + N <= ROM_END {
            &self.rom
        } else if addr >= ROM_END && addr + N <= RAM_END {
            &self.ram
        } else {
            return Err(bus::Error::BusError);
        };
        let mut bytes = [0; N];
        bytes.copy_from_slice(&mem[addr..addr + N]);
        Ok(bytes)
    }

    #[inline]
    fn write(&mut self, addr: u32, bytes: &[u8]) -> Result<(), bus::Error> {
        let addr = addr as usize;
        if addr < ROM_END || addr + bytes.len() > RAM_END {
            return Err(bus::Error::BusError);
        }
        self.ram[addr..addr + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

impl Bus for Memory {
    #[inline]
    fn read8(&self, addr: u32) -> Result<u8, bus::Error> {
        Ok(u8::from_be_bytes(self.read(addr)?))
    }

    #[inline]
    fn read16(&self, addr: u32) -> Result<u16, bus::Error> {
        Ok(u16::from_be_bytes(self.read(addr)?))
    }

    #[inline]
    fn read32(&self, addr: u32) -> Result<u32, bus::Error> {
        Ok(u32::from_be_bytes(self.read(addr)?))
    }

    #[inline]
    fn write8(&mut self, addr: u32, value: u8) -> Result<(), bus::Error> {
        self.write(addr, &value.to_be_bytes())
    }

    #[inline]
    fn write16(&mut self, addr: u32, value: u16) -> Result<(), bus::Error> {
        self.write(addr, &value.to_be_bytes())
    }

    #[inline]
    fn write32(&mut self, addr: u32, value: u32) -> Result<(), bus::Error> {
        self.write(addr, &value.to_be_bytes())
    }

    #[inline]
    fn trace_branch(&mut self) {
        self.branches += 1;
    }
}

pub struct System {
    cpu: Cpu,
    memory: Memory,
}

impl System {
    #[inline]
    pub fn new<Rom: AsRef<[u8]>>(rom: Rom) -> Self {
        Self {
            cpu: Cpu::new(),
            memory: Memory::new(rom),
        }
    }

    #[inline]
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    #[inline]
    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    #[inline]
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    #[inline]
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    #[inline]
    pub fn reset(&mut self) -> Result<(), Exception> {
        let Self { cpu, memory } = self;
        cpu.reset(memory)
    }

    #[inline]
    pub fn step(&mut self) -> Result<(), Exception> {
        let Self { cpu, memory } = self;
        cpu.step(memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rustfmt::skip]
    const ROM: &[u8] = &[
        0x00, 0x10, 0x00, 0x00, // stack $00100000
        0x00, 0x00, 0x04, 0x00, // pc    $00000400
    ];

    fn rom(program: &[u8]) -> Vec<u8> {
        let mut rom = ROM.to_vec();
        rom.resize(0x0400, 0x00);
        rom.extend_from_slice(program);
        rom
    }

    #[test]
    fn runs_from_reset_vector() {
        #[rustfmt::skip]
        let mut sys = System::new(rom(&[
            0xF2, 0x3C, 0x54, 0x00, // FMOVE.D #2.0,FP0
            0x40, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0xF2, 0x27, 0x74, 0x00, // FMOVE.D FP0,-(A7)
            0xF2, 0x9D, 0xFF, 0xFE, // FBNGT.W *
        ]));
        sys.reset().unwrap();
        assert_eq!(sys.cpu().addr(7), 0x0010_0000);
        assert_eq!(sys.cpu().pc(), 0x0400);

        sys.step().unwrap();
        sys.step().unwrap();
        assert_eq!(sys.cpu().addr(7), 0x000F_FFF8);
        assert_eq!(sys.memory().read32(0x000F_FFF8).unwrap(), 0x4000_0000);

        // no condition codes set yet, so "not greater than" is false
        sys.step().unwrap();
        assert_eq!(sys.memory().branches(), 0);
        assert_eq!(sys.cpu().pc(), 0x0414);
    }

    #[test]
    fn rom_is_read_only() {
        let mut sys = System::new(rom(&[
            0xF2, 0x39, 0x60, 0x00, // FMOVE.L FP0,($00000100).L
            0x00, 0x00, 0x01, 0x00,
        ]));
        sys.reset().unwrap();

        assert!(matches!(sys.step(), Err(Exception::BusError(_))));
        assert!(sys.cpu().is_stopped());
    }

    #[test]
    fn unmapped_reads_fail() {
        let memory = Memory::new(ROM);
        assert!(memory.read32(0x00FF_FFFE).is_err());
        assert!(memory.read16(0x0000_FFFF).is_err());
        assert!(memory.read8(0x0001_0000).is_ok());
    }
}
