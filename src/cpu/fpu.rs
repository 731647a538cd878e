use super::condition::Condition;
use super::decoder::{
    Command, ControlRegister, Format, GeneralOp, Opmode, Source, StateFrameOp,
};
use super::ea::Direction;
use super::{Cpu, DecodeError, Exception, FpRegister};
use crate::bus::Bus;

impl Cpu {
    /// Executes an opcode of the primary FPU group (`F200`-`F2FF`).
    ///
    /// IR must already hold the opcode and PC must point just past it.
    pub fn fpu_op0(&mut self, bus: &mut dyn Bus) -> Result<(), Exception> {
        self.ppc = self.pc.wrapping_sub(2);

        let op = GeneralOp::decode(self.ir).ok_or(DecodeError::MainOp {
            op: ((self.ir >> 6) & 0b11) as u8,
            pc: self.ppc,
        })?;

        match op {
            GeneralOp::Command => {
                let w2 = self.fetch_word(bus)?;
                tracing::trace!(
                    pc = format_args!("{:08X}", self.ppc),
                    "fpu {:04X} {:04X}",
                    self.ir,
                    w2
                );
                let command = Command::decode(w2).ok_or(DecodeError::Subop {
                    subop: ((w2 >> 13) & 0b111) as u8,
                    pc: self.ppc,
                })?;

                match command {
                    Command::Arithmetic {
                        source,
                        dst,
                        opmode,
                    } => self.fpgen(source, dst, opmode, bus),
                    Command::MoveToMemory { format, src } => self.fmove_to_memory(format, src, bus),
                    Command::MoveControl { to_memory, select } => {
                        self.fmove_control(to_memory, select, bus)
                    }
                    Command::MoveMultiple {
                        to_memory: true,
                        mode,
                        list,
                    } => self.fmovem_store(mode, list, bus),
                    Command::MoveMultiple {
                        to_memory: false,
                        mode,
                        list,
                    } => self.fmovem_load(mode, list, bus),
                }
            }

            GeneralOp::Branch16 => self.fbcc16(bus),

            GeneralOp::Branch32 => self.fbcc32(bus),
        }
    }

    /// Executes an opcode of the state frame group (`F300`-`F3FF`).
    ///
    /// Only a null frame is ever saved, and restored frames are discarded.
    pub fn fpu_op1(&mut self, bus: &mut dyn Bus) -> Result<(), Exception> {
        self.ppc = self.pc.wrapping_sub(2);

        let op = StateFrameOp::decode(self.ir).ok_or(DecodeError::StateFrame {
            op: ((self.ir >> 6) & 0b11) as u8,
            pc: self.ppc,
        })?;

        match op {
            StateFrameOp::Save => {
                tracing::debug!(pc = format_args!("{:08X}", self.ppc), "FSAVE null frame");
                self.write_ea_32(0x0000_0000, bus)
            }

            StateFrameOp::Restore => {
                let frame = self.read_ea_32(bus)?;
                tracing::debug!(
                    pc = format_args!("{:08X}", self.ppc),
                    "FRESTORE discarding frame {frame:08X}"
                );
                Ok(())
            }
        }
    }

    fn fpgen(
        &mut self,
        source: Source,
        dst: u8,
        opmode: u8,
        bus: &mut dyn Bus,
    ) -> Result<(), Exception> {
        let opmode = Opmode::decode(opmode).ok_or(DecodeError::Opmode {
            opmode,
            pc: self.ppc,
        })?;

        let source = match source {
            Source::Register(register) => self.fp[register as usize].as_f64(),
            Source::Memory(format) => self.load(format, bus)?,
        };

        let dst = dst as usize;
        let destination = self.fp[dst].as_f64();
        let result = FpRegister::from_f64(match opmode {
            Opmode::Move => source,
            Opmode::Sqrt => source.sqrt(),
            Opmode::Abs => source.abs(),
            Opmode::Neg => -source,
            Opmode::Div => destination / source,
            Opmode::Add => destination + source,
            Opmode::Mul => destination * source,
            Opmode::Sub | Opmode::Cmp => destination - source,
            Opmode::Tst => source,
        });

        if opmode.writes_back() {
            self.fp[dst] = result;
        }
        if opmode.sets_condition_codes() {
            self.set_condition_codes(result);
        }
        self.use_cycles(opmode.cycles());
        Ok(())
    }

    /// Reads a source operand of the given memory format, widened to a double.
    fn load(&mut self, format: Format, bus: &mut dyn Bus) -> Result<f64, Exception> {
        match format {
            Format::LongInteger => Ok((self.read_ea_32(bus)? as i32) as f64),
            Format::Single => Ok(f32::from_bits(self.read_ea_32(bus)?) as f64),
            Format::WordInteger => Ok((self.read_ea_16(bus)? as i16) as f64),
            Format::Double => Ok(f64::from_bits(self.read_ea_64(bus)?)),
            Format::ByteInteger => Ok((self.read_ea_8(bus)? as i8) as f64),
            Format::Extended | Format::Packed => Err(DecodeError::UnimplementedFormat {
                format,
                direction: Direction::Read,
                pc: self.ppc,
            }
            .into()),
            Format::PackedDynamic => Err(DecodeError::InvalidSource { pc: self.ppc }.into()),
        }
    }

    fn fmove_to_memory(
        &mut self,
        format: Format,
        src: u8,
        bus: &mut dyn Bus,
    ) -> Result<(), Exception> {
        let value = self.fp[src as usize];
        match format {
            // float to int casts truncate toward zero
            Format::LongInteger => self.write_ea_32((value.as_f64() as i32) as u32, bus)?,
            Format::Single => self.write_ea_32((value.as_f64() as f32).to_bits(), bus)?,
            Format::Double => self.write_ea_64(value.as_bits(), bus)?,
            Format::Extended
            | Format::Packed
            | Format::WordInteger
            | Format::ByteInteger
            | Format::PackedDynamic => {
                return Err(DecodeError::UnimplementedFormat {
                    format,
                    direction: Direction::Write,
                    pc: self.ppc,
                }
                .into())
            }
        }
        self.use_cycles(12);
        Ok(())
    }

    fn fmove_control(
        &mut self,
        to_memory: bool,
        select: u8,
        bus: &mut dyn Bus,
    ) -> Result<(), Exception> {
        let register =
            ControlRegister::decode(select).ok_or(DecodeError::UnknownControlRegister {
                register: select,
                to_memory,
                pc: self.ppc,
            })?;

        if to_memory {
            self.write_ea_32(self.control(register), bus)?;
        } else {
            let value = self.read_ea_32(bus)?;
            self.set_control(register, value);
        }
        self.use_cycles(10);
        Ok(())
    }

    /// FMOVEM registers to memory. Only the static list, pre-decrement form exists;
    /// bit `i` of the list stores FP`i`, lowest bit first.
    fn fmovem_store(&mut self, mode: u8, list: u8, bus: &mut dyn Bus) -> Result<(), Exception> {
        if mode != 0 {
            return Err(DecodeError::FmovemMode { mode, pc: self.ppc }.into());
        }

        for register in 0..8 {
            if (list & (1 << register)) != 0 {
                self.write_ea_extended(self.fp[register], bus)?;
                self.use_cycles(2);
            }
        }
        Ok(())
    }

    /// FMOVEM memory to registers. Only the static list, post-increment form exists;
    /// bit `i` of the list loads FP`7 - i`, lowest bit first.
    fn fmovem_load(&mut self, mode: u8, list: u8, bus: &mut dyn Bus) -> Result<(), Exception> {
        if mode != 2 {
            return Err(DecodeError::FmovemMode { mode, pc: self.ppc }.into());
        }

        for bit in 0..8 {
            if (list & (1 << bit)) != 0 {
                self.fp[7 - bit] = self.read_ea_extended(bus)?;
                self.use_cycles(2);
            }
        }
        Ok(())
    }

    fn condition(&self) -> Result<Condition, Exception> {
        let condition = (self.ir & 0x3F) as u8;
        Ok(Condition::decode(condition).ok_or(DecodeError::UnknownCondition {
            condition,
            pc: self.ppc,
        })?)
    }

    fn fbcc16(&mut self, bus: &mut dyn Bus) -> Result<(), Exception> {
        let condition = self.condition()?;
        let offset = (self.fetch_word(bus)? as i16) as i32;

        if condition.test(self.fpsr) {
            tracing::debug!(
                pc = format_args!("{:08X}", self.ppc),
                "FB{condition:?}.W taken, offset {offset}"
            );
            bus.trace_branch();
            self.branch(offset - 2);
        }
        self.use_cycles(7);
        Ok(())
    }

    fn fbcc32(&mut self, bus: &mut dyn Bus) -> Result<(), Exception> {
        let condition = self.condition()?;
        let offset = self.fetch_long(bus)? as i32;

        if condition.test(self.fpsr) {
            tracing::debug!(
                pc = format_args!("{:08X}", self.ppc),
                "FB{condition:?}.L taken, offset {offset}"
            );
            bus.trace_branch();
            self.branch(offset.wrapping_sub(4));
        }
        self.use_cycles(7);
        Ok(())
    }
}
