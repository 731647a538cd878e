use std::fmt;

use super::decoder::EffectiveAddress;
use super::{Cpu, DecodeError, Exception, FpRegister};
use crate::bus::Bus;

/// Operand width of an effective address access.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Width {
    Byte,
    Word,
    Long,
    Quad,
    /// 96-bit extended slot holding a 64-bit value and 32 bits of padding.
    Extended,
}

impl Width {
    #[inline]
    pub fn bytes(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
            Self::Long => 4,
            Self::Quad => 8,
            Self::Extended => 12,
        }
    }

    #[inline]
    pub fn bits(self) -> u32 {
        self.bytes() * 8
    }

    /// Auto-increment step of address register `register`. A7 stays word aligned.
    #[inline]
    fn step(self, register: u8) -> u32 {
        if register == 7 && self == Self::Byte {
            2
        } else {
            self.bytes()
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "load",
            Self::Write => "store",
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Access {
    pub width: Width,
    pub direction: Direction,
}

impl Access {
    #[inline]
    pub const fn read(width: Width) -> Self {
        Self {
            width,
            direction: Direction::Read,
        }
    }

    #[inline]
    pub const fn write(width: Width) -> Self {
        Self {
            width,
            direction: Direction::Write,
        }
    }

    /// Whether `ea` is a legal operand location for this access.
    pub fn supports(self, ea: EffectiveAddress) -> bool {
        use EffectiveAddress::*;

        match (self.width, self.direction, ea) {
            // FMOVEM only moves extended slots through the stack-like modes
            (Width::Extended, Direction::Read, AddressWithPostIncrement(_)) => true,
            (Width::Extended, Direction::Write, AddressWithPreDecrement(_)) => true,
            (Width::Extended, _, _) => false,

            (Width::Quad, _, DataRegister(_) | AddressWithIndex(_)) => false,
            (_, _, DataRegister(_) | AddressWithIndex(_)) => true,

            (
                _,
                _,
                Address(_)
                | AddressWithPostIncrement(_)
                | AddressWithPreDecrement(_)
                | AddressWithDisplacement(_)
                | AbsoluteLong,
            ) => true,

            (Width::Long | Width::Quad, Direction::Read, PcWithDisplacement) => true,
            (_, Direction::Read, Immediate) => true,

            _ => false,
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            Direction::Read => "read",
            Direction::Write => "write",
        };
        write!(f, "{direction} ea {}", self.width.bits())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ComputedEffectiveAddress {
    DataRegister(u8),
    Address(u32),
    Immediate,
}

impl Cpu {
    /// Resolves the EA field in the low 6 bits of IR, consuming extension words and
    /// applying any post-increment/pre-decrement to the address register.
    fn compute_ea(
        &mut self,
        access: Access,
        bus: &mut dyn Bus,
    ) -> Result<ComputedEffectiveAddress, Exception> {
        let field = (self.ir & 0x3F) as u8;
        let unsupported = DecodeError::AddressingMode {
            access,
            mode: field >> 3,
            register: field & 0b111,
            pc: self.ppc,
        };
        let ea = match EffectiveAddress::decode(field) {
            Some(ea) if access.supports(ea) => ea,
            _ => return Err(unsupported.into()),
        };

        match ea {
            EffectiveAddress::DataRegister(register) => {
                Ok(ComputedEffectiveAddress::DataRegister(register))
            }
            EffectiveAddress::Address(register) => Ok(ComputedEffectiveAddress::Address(
                self.addr[register as usize],
            )),
            EffectiveAddress::AddressWithPostIncrement(register) => {
                let addr = self.addr[register as usize];
                self.addr[register as usize] = addr.wrapping_add(access.width.step(register));
                Ok(ComputedEffectiveAddress::Address(addr))
            }
            EffectiveAddress::AddressWithPreDecrement(register) => {
                self.addr[register as usize] =
                    self.addr[register as usize].wrapping_sub(access.width.step(register));
                Ok(ComputedEffectiveAddress::Address(
                    self.addr[register as usize],
                ))
            }
            EffectiveAddress::AddressWithDisplacement(register) => {
                let displacement = ((self.fetch_word(bus)? as i16) as i32) as u32;
                Ok(ComputedEffectiveAddress::Address(
                    self.addr[register as usize].wrapping_add(displacement),
                ))
            }
            EffectiveAddress::AddressWithIndex(register) => {
                let base = self.addr[register as usize];
                let extension = self.fetch_word(bus)?;
                let index = self.index(extension)?;
                Ok(ComputedEffectiveAddress::Address(
                    base.wrapping_add(index),
                ))
            }
            EffectiveAddress::PcWithDisplacement => {
                let pc = self.pc;
                let displacement = ((self.fetch_word(bus)? as i16) as i32) as u32;
                Ok(ComputedEffectiveAddress::Address(
                    pc.wrapping_add(displacement),
                ))
            }
            EffectiveAddress::AbsoluteLong => {
                let high = self.fetch_word(bus)? as u32;
                let low = self.fetch_word(bus)? as u32;
                Ok(ComputedEffectiveAddress::Address((high << 16) | low))
            }
            EffectiveAddress::Immediate => Ok(ComputedEffectiveAddress::Immediate),
            EffectiveAddress::AddressRegister(_)
            | EffectiveAddress::PcWithIndex
            | EffectiveAddress::AbsoluteShort => Err(unsupported.into()),
        }
    }

    /// Index register plus 8-bit displacement from a brief extension word.
    fn index(&self, extension: u16) -> Result<u32, Exception> {
        if (extension & 0x0100) != 0 {
            return Err(DecodeError::IndexFormat {
                extension,
                pc: self.ppc,
            }
            .into());
        }

        let register = ((extension >> 12) & 0b111) as usize;
        let index = if (extension & 0x8000) != 0 {
            self.addr[register]
        } else {
            self.data[register]
        };
        let index = if (extension & 0x0800) != 0 {
            index
        } else {
            ((index as u16) as i16) as i32 as u32
        };
        let scale = (extension >> 9) & 0b11;
        let displacement = ((extension as u8) as i8) as i32 as u32;
        Ok((index << scale).wrapping_add(displacement))
    }

    pub(super) fn read_ea_8(&mut self, bus: &mut dyn Bus) -> Result<u8, Exception> {
        match self.compute_ea(Access::read(Width::Byte), bus)? {
            ComputedEffectiveAddress::DataRegister(register) => {
                Ok(self.data[register as usize] as u8)
            }
            ComputedEffectiveAddress::Address(addr) => Ok(bus.read8(addr)?),
            ComputedEffectiveAddress::Immediate => Ok(self.fetch_word(bus)? as u8),
        }
    }

    pub(super) fn read_ea_16(&mut self, bus: &mut dyn Bus) -> Result<u16, Exception> {
        match self.compute_ea(Access::read(Width::Word), bus)? {
            ComputedEffectiveAddress::DataRegister(register) => {
                Ok(self.data[register as usize] as u16)
            }
            ComputedEffectiveAddress::Address(addr) => Ok(bus.read16(addr)?),
            ComputedEffectiveAddress::Immediate => self.fetch_word(bus),
        }
    }

    pub(super) fn read_ea_32(&mut self, bus: &mut dyn Bus) -> Result<u32, Exception> {
        match self.compute_ea(Access::read(Width::Long), bus)? {
            ComputedEffectiveAddress::DataRegister(register) => Ok(self.data[register as usize]),
            ComputedEffectiveAddress::Address(addr) => Ok(bus.read32(addr)?),
            ComputedEffectiveAddress::Immediate => self.fetch_long(bus),
        }
    }

    pub(super) fn write_ea_32(&mut self, value: u32, bus: &mut dyn Bus) -> Result<(), Exception> {
        match self.compute_ea(Access::write(Width::Long), bus)? {
            ComputedEffectiveAddress::DataRegister(register) => {
                self.data[register as usize] = value;
                Ok(())
            }
            ComputedEffectiveAddress::Address(addr) => Ok(bus.write32(addr, value)?),
            ComputedEffectiveAddress::Immediate => unreachable!(),
        }
    }

    pub(super) fn read_ea_64(&mut self, bus: &mut dyn Bus) -> Result<u64, Exception> {
        let (high, low) = match self.compute_ea(Access::read(Width::Quad), bus)? {
            ComputedEffectiveAddress::Address(addr) => {
                (bus.read32(addr)?, bus.read32(addr.wrapping_add(4))?)
            }
            ComputedEffectiveAddress::Immediate => (self.fetch_long(bus)?, self.fetch_long(bus)?),
            ComputedEffectiveAddress::DataRegister(_) => unreachable!(),
        };
        Ok(((high as u64) << 32) | (low as u64))
    }

    pub(super) fn write_ea_64(&mut self, value: u64, bus: &mut dyn Bus) -> Result<(), Exception> {
        match self.compute_ea(Access::write(Width::Quad), bus)? {
            ComputedEffectiveAddress::Address(addr) => {
                bus.write32(addr, (value >> 32) as u32)?;
                bus.write32(addr.wrapping_add(4), value as u32)?;
                Ok(())
            }
            _ => unreachable!(),
        }
    }

    /// Reads an extended slot: the first 8 bytes are the register bits, the last 4 are ignored.
    pub(super) fn read_ea_extended(&mut self, bus: &mut dyn Bus) -> Result<FpRegister, Exception> {
        match self.compute_ea(Access::read(Width::Extended), bus)? {
            ComputedEffectiveAddress::Address(addr) => {
                let high = bus.read32(addr)? as u64;
                let low = bus.read32(addr.wrapping_add(4))? as u64;
                Ok(FpRegister::from_bits((high << 32) | low))
            }
            _ => unreachable!(),
        }
    }

    /// Writes an extended slot: the register bits followed by 4 bytes of zero padding.
    pub(super) fn write_ea_extended(
        &mut self,
        value: FpRegister,
        bus: &mut dyn Bus,
    ) -> Result<(), Exception> {
        match self.compute_ea(Access::write(Width::Extended), bus)? {
            ComputedEffectiveAddress::Address(addr) => {
                let bits = value.as_bits();
                bus.write32(addr, (bits >> 32) as u32)?;
                bus.write32(addr.wrapping_add(4), bits as u32)?;
                bus.write32(addr.wrapping_add(8), 0)?;
                Ok(())
            }
            _ => unreachable!(),
        }
    }
}
