use std::{
    collections::HashSet,
    io::{Cursor, Read, Write},
    num::NonZeroUsize,
};

use fpu68k::{
    bus::Bus,
    cpu::{Cpu, FpRegister},
    sys::System,
};
use gdbstub::{
    arch::{Arch, BreakpointKind, RegId, Registers, SingleStepGdbBehavior},
    common::Signal,
    target::{
        ext::{
            base::{
                single_register_access::{SingleRegisterAccess, SingleRegisterAccessOps},
                singlethread::{SingleThreadBase, SingleThreadResume, SingleThreadResumeOps},
                BaseOps,
            },
            breakpoints::{Breakpoints, BreakpointsOps, SwBreakpoint, SwBreakpointOps},
        },
        Target, TargetResult,
    },
};

/// Integer core registers followed by the FPU: fp0-fp7 as raw 64-bit cells, then
/// fpcr, fpsr and fpiar.
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub struct Fpu68kRegs {
    data: [u32; 8],
    addr: [u32; 8],
    sr: u32,
    pc: u32,
    fp: [u64; 8],
    fpcr: u32,
    fpsr: u32,
    fpiar: u32,
}

fn read_u32(reader: &mut Cursor<&[u8]>) -> Result<u32, ()> {
    let mut bytes = [0; 4];
    reader.read_exact(&mut bytes).map_err(|_| ())?;
    Ok(u32::from_le_bytes(bytes))
}

impl Registers for Fpu68kRegs {
    type ProgramCounter = u32;

    #[inline]
    fn pc(&self) -> Self::ProgramCounter {
        self.pc
    }

    #[inline]
    fn gdb_serialize(&self, mut write_byte: impl FnMut(Option<u8>)) {
        for register in self.data.iter().chain(self.addr.iter()) {
            for byte in register.to_le_bytes() {
                write_byte(Some(byte));
            }
        }

        for register in [self.sr, self.pc] {
            for byte in register.to_le_bytes() {
                write_byte(Some(byte));
            }
        }

        for register in self.fp {
            for byte in register.to_le_bytes() {
                write_byte(Some(byte));
            }
        }

        for register in [self.fpcr, self.fpsr, self.fpiar] {
            for byte in register.to_le_bytes() {
                write_byte(Some(byte));
            }
        }
    }

    #[inline]
    fn gdb_deserialize(&mut self, bytes: &[u8]) -> Result<(), ()> {
        let mut reader = Cursor::new(bytes);

        for register in self.data.iter_mut().chain(self.addr.iter_mut()) {
            *register = read_u32(&mut reader)?;
        }
        self.sr = read_u32(&mut reader)?;
        self.pc = read_u32(&mut reader)?;

        for register in self.fp.iter_mut() {
            let mut bytes = [0; 8];
            reader.read_exact(&mut bytes).map_err(|_| ())?;
            *register = u64::from_le_bytes(bytes);
        }

        self.fpcr = read_u32(&mut reader)?;
        self.fpsr = read_u32(&mut reader)?;
        self.fpiar = read_u32(&mut reader)?;
        Ok(())
    }
}

#[derive(Debug)]
pub enum Fpu68kRegId {
    Data(usize),
    Addr(usize),
    Sr,
    Pc,
    Fp(usize),
    Fpcr,
    Fpsr,
    Fpiar,
}

impl RegId for Fpu68kRegId {
    #[inline]
    fn from_raw_id(id: usize) -> Option<(Self, Option<NonZeroUsize>)> {
        let (register, size) = match id {
            0..=7 => (Self::Data(id), 4),
            8..=15 => (Self::Addr(id - 8), 4),
            16 => (Self::Sr, 4),
            17 => (Self::Pc, 4),
            18..=25 => (Self::Fp(id - 18), 8),
            26 => (Self::Fpcr, 4),
            27 => (Self::Fpsr, 4),
            28 => (Self::Fpiar, 4),
            _ => return None,
        };
        Some((register, Some(NonZeroUsize::new(size)?)))
    }
}

#[derive(Debug)]
pub struct Fpu68kBreakpointKind;

impl BreakpointKind for Fpu68kBreakpointKind {
    #[inline]
    fn from_usize(_kind: usize) -> Option<Self> {
        Some(Self)
    }
}

pub struct Fpu68k;

impl Arch for Fpu68k {
    type Usize = u32;
    type Registers = Fpu68kRegs;
    type RegId = Fpu68kRegId;
    type BreakpointKind = Fpu68kBreakpointKind;

    #[inline]
    fn target_description_xml() -> Option<&'static str> {
        None
    }

    #[inline]
    fn single_step_gdb_behavior() -> SingleStepGdbBehavior {
        SingleStepGdbBehavior::Optional
    }
}

pub struct SystemTarget {
    sys: System,
    breakpoints: HashSet<u32>,
}

impl SystemTarget {
    #[inline]
    pub fn new(sys: System) -> Self {
        Self {
            sys,
            breakpoints: HashSet::new(),
        }
    }

    #[inline]
    pub fn cpu(&self) -> &Cpu {
        self.sys.cpu()
    }

    #[inline]
    pub fn system(&self) -> &System {
        &self.sys
    }

    #[inline]
    pub fn system_mut(&mut self) -> &mut System {
        &mut self.sys
    }

    /// Executes one instruction and reports whether PC landed on a breakpoint.
    #[inline]
    pub fn step(&mut self) -> bool {
        let Self { sys, breakpoints } = self;

        // a failed step has already stopped the CPU and been logged
        let _ = sys.step();
        breakpoints.contains(&sys.cpu().pc())
    }
}

impl Target for SystemTarget {
    type Arch = Fpu68k;
    type Error = &'static str;

    #[inline]
    fn base_ops(&mut self) -> BaseOps<'_, Self::Arch, Self::Error> {
        BaseOps::SingleThread(self)
    }

    #[inline]
    fn support_breakpoints(&mut self) -> Option<BreakpointsOps<'_, Self>> {
        Some(self)
    }
}

impl SingleThreadBase for SystemTarget {
    #[inline]
    fn read_registers(
        &mut self,
        regs: &mut <Self::Arch as Arch>::Registers,
    ) -> TargetResult<(), Self> {
        let cpu = self.sys.cpu();
        for register in 0usize..=7 {
            regs.data[register] = cpu.data(register);
            regs.addr[register] = cpu.addr(register);
            regs.fp[register] = cpu.fp(register).as_bits();
        }
        // no integer unit, so there is no status register to report
        regs.sr = 0;
        regs.pc = cpu.pc();
        regs.fpcr = cpu.fpcr();
        regs.fpsr = cpu.fpsr();
        regs.fpiar = cpu.fpiar();
        Ok(())
    }

    #[inline]
    fn write_registers(
        &mut self,
        regs: &<Self::Arch as Arch>::Registers,
    ) -> TargetResult<(), Self> {
        let cpu = self.sys.cpu_mut();
        for register in 0usize..=7 {
            cpu.set_data(register, regs.data[register]);
            cpu.set_addr(register, regs.addr[register]);
            cpu.set_fp(register, FpRegister::from_bits(regs.fp[register]));
        }
        cpu.set_pc(regs.pc);
        cpu.set_fpcr(regs.fpcr);
        cpu.set_fpsr(regs.fpsr);
        cpu.set_fpiar(regs.fpiar);
        Ok(())
    }

    #[inline]
    fn read_addrs(
        &mut self,
        start_addr: <Self::Arch as Arch>::Usize,
        data: &mut [u8],
    ) -> TargetResult<(), Self> {
        let memory = self.sys.memory();
        for (offset, byte) in data.iter_mut().enumerate() {
            let addr = start_addr.wrapping_add(offset as u32);
            *byte = memory.read8(addr).map_err(|_| ())?;
        }
        Ok(())
    }

    #[inline]
    fn write_addrs(
        &mut self,
        start_addr: <Self::Arch as Arch>::Usize,
        data: &[u8],
    ) -> TargetResult<(), Self> {
        let memory = self.sys.memory_mut();
        for (offset, byte) in data.iter().enumerate() {
            let addr = start_addr.wrapping_add(offset as u32);
            memory.write8(addr, *byte).map_err(|_| ())?;
        }
        Ok(())
    }

    #[inline]
    fn support_single_register_access(&mut self) -> Option<SingleRegisterAccessOps<'_, (), Self>> {
        Some(self)
    }

    #[inline]
    fn support_resume(&mut self) -> Option<SingleThreadResumeOps<'_, Self>> {
        Some(self)
    }
}

impl SingleRegisterAccess<()> for SystemTarget {
    #[inline]
    fn read_register(
        &mut self,
        _tid: (),
        reg_id: <Self::Arch as Arch>::RegId,
        mut buf: &mut [u8],
    ) -> TargetResult<usize, Self> {
        let cpu = self.sys.cpu();
        let value = match reg_id {
            Fpu68kRegId::Fp(register) => {
                buf.write_all(&cpu.fp(register).as_bits().to_le_bytes())
                    .map_err(|_| ())?;
                return Ok(8);
            }
            Fpu68kRegId::Data(register) => cpu.data(register),
            Fpu68kRegId::Addr(register) => cpu.addr(register),
            Fpu68kRegId::Sr => 0,
            Fpu68kRegId::Pc => cpu.pc(),
            Fpu68kRegId::Fpcr => cpu.fpcr(),
            Fpu68kRegId::Fpsr => cpu.fpsr(),
            Fpu68kRegId::Fpiar => cpu.fpiar(),
        };
        buf.write_all(&value.to_le_bytes()).map_err(|_| ())?;
        Ok(4)
    }

    #[inline]
    fn write_register(
        &mut self,
        _tid: (),
        reg_id: <Self::Arch as Arch>::RegId,
        val: &[u8],
    ) -> TargetResult<(), Self> {
        let cpu = self.sys.cpu_mut();
        if let Fpu68kRegId::Fp(register) = reg_id {
            let bits = u64::from_le_bytes(val.get(0..8).ok_or(())?.try_into().map_err(|_| ())?);
            cpu.set_fp(register, FpRegister::from_bits(bits));
            return Ok(());
        }

        let value = u32::from_le_bytes(val.get(0..4).ok_or(())?.try_into().map_err(|_| ())?);
        match reg_id {
            Fpu68kRegId::Data(register) => cpu.set_data(register, value),
            Fpu68kRegId::Addr(register) => cpu.set_addr(register, value),
            Fpu68kRegId::Sr | Fpu68kRegId::Fp(_) => {}
            Fpu68kRegId::Pc => cpu.set_pc(value),
            Fpu68kRegId::Fpcr => cpu.set_fpcr(value),
            Fpu68kRegId::Fpsr => cpu.set_fpsr(value),
            Fpu68kRegId::Fpiar => cpu.set_fpiar(value),
        };
        Ok(())
    }
}

impl Breakpoints for SystemTarget {
    #[inline]
    fn support_sw_breakpoint(&mut self) -> Option<SwBreakpointOps<'_, Self>> {
        Some(self)
    }
}

impl SwBreakpoint for SystemTarget {
    #[inline]
    fn add_sw_breakpoint(
        &mut self,
        addr: <Self::Arch as Arch>::Usize,
        _kind: <Self::Arch as Arch>::BreakpointKind,
    ) -> TargetResult<bool, Self> {
        Ok(self.breakpoints.insert(addr))
    }

    #[inline]
    fn remove_sw_breakpoint(
        &mut self,
        addr: <Self::Arch as Arch>::Usize,
        _kind: <Self::Arch as Arch>::BreakpointKind,
    ) -> TargetResult<bool, Self> {
        Ok(self.breakpoints.remove(&addr))
    }
}

impl SingleThreadResume for SystemTarget {
    fn resume(&mut self, signal: Option<Signal>) -> Result<(), Self::Error> {
        if signal.is_some() {
            return Err("no support for resuming from a signal");
        }
        Ok(())
    }
}
