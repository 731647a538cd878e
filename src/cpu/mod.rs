use self::condition::CONDITION_CODE_MASK;
use self::decoder::{ControlRegister, Decoder, Format, Instruction};
use crate::bus::{self, Bus};

pub mod condition;
pub mod decoder;
mod ea;
mod fpu;

pub use self::ea::{Access, Direction, Width};


#[derive(Debug, thiserror::Error)]
pub enum Exception {
    #[error("bus error")]
    BusError(#[from] bus::Error),

    #[error("illegal instruction {0:04x}")]
    IllegalInstruction(u16),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// An instruction encoding outside of what the FPU implements.
///
/// `pc` is the address of the offending instruction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("{access}: unhandled mode {mode}, reg {register} at {pc:08X}")]
    AddressingMode {
        access: Access,
        mode: u8,
        register: u8,
        pc: u32,
    },

    #[error("full format index extension word {extension:04X} unimplemented at {pc:08X}")]
    IndexFormat { extension: u16, pc: u32 },

    #[error("{format} {direction} unimplemented at {pc:08X}")]
    UnimplementedFormat {
        format: Format,
        direction: Direction,
        pc: u32,
    },

    #[error("invalid source specifier at {pc:08X}")]
    InvalidSource { pc: u32 },

    #[error("unknown control register {register}, to memory {to_memory} at {pc:08X}")]
    UnknownControlRegister {
        register: u8,
        to_memory: bool,
        pc: u32,
    },

    #[error("FMOVEM: mode {mode} unimplemented at {pc:08X}")]
    FmovemMode { mode: u8, pc: u32 },

    #[error("unhandled condition {condition:02X} at {pc:08X}")]
    UnknownCondition { condition: u8, pc: u32 },

    #[error("unimplemented opmode {opmode:02X} at {pc:08X}")]
    Opmode { opmode: u8, pc: u32 },

    #[error("unimplemented subop {subop} at {pc:08X}")]
    Subop { subop: u8, pc: u32 },

    #[error("unimplemented main op {op} at {pc:08X}")]
    MainOp { op: u8, pc: u32 },

    #[error("unimplemented state frame op {op} at {pc:08X}")]
    StateFrame { op: u8, pc: u32 },
}

/// A floating-point data register: one 64-bit cell read either as a double or as raw bits.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FpRegister(u64);

impl FpRegister {
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[inline]
    pub fn from_f64(value: f64) -> Self {
        Self(value.to_bits())
    }

    #[inline]
    pub const fn as_bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_f64(self) -> f64 {
        f64::from_bits(self.0)
    }
}

impl From<f64> for FpRegister {
    #[inline]
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

#[derive(Debug)]
pub struct Cpu {
    data: [u32; 8],
    addr: [u32; 8],
    pc: u32,
    ppc: u32, // address of the instruction being executed
    ir: u16,  // instruction register

    fp: [FpRegister; 8],
    fpcr: u32,
    fpsr: u32,
    fpiar: u32,

    cycles: u64,

    decoder: Decoder,

    is_stopped: bool,
}

impl Default for Cpu {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            data: [0; 8],
            addr: [0; 8],
            pc: 0,
            ppc: 0,
            ir: 0,

            fp: [FpRegister::default(); 8],
            fpcr: 0,
            fpsr: 0,
            fpiar: 0,

            cycles: 0,

            decoder: Decoder::new(),

            is_stopped: false,
        }
    }

    /// Loads the initial stack pointer and program counter from the vectors at 0 and 4.
    pub fn reset(&mut self, bus: &mut dyn Bus) -> Result<(), Exception> {
        self.addr[7] = bus.read32(0)?;
        self.pc = bus.read32(4)?;
        self.fp = [FpRegister::default(); 8];
        self.fpcr = 0;
        self.fpsr = 0;
        self.fpiar = 0;
        self.is_stopped = false;
        Ok(())
    }

    #[inline]
    pub fn data(&self, register: usize) -> u32 {
        self.data[register]
    }

    #[inline]
    pub fn set_data(&mut self, register: usize, value: u32) {
        self.data[register] = value
    }

    #[inline]
    pub fn addr(&self, register: usize) -> u32 {
        self.addr[register]
    }

    #[inline]
    pub fn set_addr(&mut self, register: usize, value: u32) {
        self.addr[register] = value
    }

    #[inline]
    pub fn pc(&self) -> u32 {
        self.pc
    }

    #[inline]
    pub fn set_pc(&mut self, value: u32) {
        self.pc = value;
    }

    #[inline]
    pub fn ir(&self) -> u16 {
        self.ir
    }

    #[inline]
    pub fn set_ir(&mut self, opcode: u16) {
        self.ir = opcode;
    }

    #[inline]
    pub fn fp(&self, register: usize) -> FpRegister {
        self.fp[register]
    }

    #[inline]
    pub fn set_fp(&mut self, register: usize, value: impl Into<FpRegister>) {
        self.fp[register] = value.into();
    }

    #[inline]
    pub fn fpcr(&self) -> u32 {
        self.fpcr
    }

    #[inline]
    pub fn set_fpcr(&mut self, value: u32) {
        self.fpcr = value;
    }

    #[inline]
    pub fn fpsr(&self) -> u32 {
        self.fpsr
    }

    #[inline]
    pub fn set_fpsr(&mut self, value: u32) {
        self.fpsr = value;
    }

    #[inline]
    pub fn fpiar(&self) -> u32 {
        self.fpiar
    }

    #[inline]
    pub fn set_fpiar(&mut self, value: u32) {
        self.fpiar = value;
    }

    #[inline]
    fn control(&self, register: ControlRegister) -> u32 {
        match register {
            ControlRegister::Fpiar => self.fpiar,
            ControlRegister::Fpsr => self.fpsr,
            ControlRegister::Fpcr => self.fpcr,
        }
    }

    #[inline]
    fn set_control(&mut self, register: ControlRegister, value: u32) {
        match register {
            ControlRegister::Fpiar => self.fpiar = value,
            ControlRegister::Fpsr => self.fpsr = value,
            ControlRegister::Fpcr => self.fpcr = value,
        }
    }

    /// Total cycles consumed since the CPU was created.
    #[inline]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    #[inline]
    fn use_cycles(&mut self, cycles: u32) {
        self.cycles += cycles as u64;
    }

    /// Replaces the four FPSR condition code bits with the ones describing `value`.
    #[inline]
    fn set_condition_codes(&mut self, value: FpRegister) {
        self.fpsr =
            (self.fpsr & !CONDITION_CODE_MASK) | condition::condition_codes(value.as_bits());
    }

    /// Fetches and executes one instruction. Any exception stops the CPU.
    pub fn step(&mut self, bus: &mut dyn Bus) -> Result<(), Exception> {
        let result = self.decode_execute(bus);
        if let Err(err) = &result {
            tracing::warn!(pc = format_args!("{:08X}", self.ppc), "cpu stopped: {err}");
            self.is_stopped = true;
        }
        result
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.is_stopped
    }

    #[inline]
    fn fetch_word(&mut self, bus: &mut dyn Bus) -> Result<u16, Exception> {
        let value = bus.read16(self.pc)?;
        self.pc = self.pc.wrapping_add(2);
        Ok(value)
    }

    #[inline]
    fn fetch_long(&mut self, bus: &mut dyn Bus) -> Result<u32, Exception> {
        let value = bus.read32(self.pc)?;
        self.pc = self.pc.wrapping_add(4);
        Ok(value)
    }

    #[inline]
    fn branch(&mut self, offset: i32) {
        self.pc = self.pc.wrapping_add(offset as u32);
    }

    fn decode_execute(&mut self, bus: &mut dyn Bus) -> Result<(), Exception> {
        self.ppc = self.pc;
        let opcode = self.fetch_word(bus)?;
        self.ir = opcode;

        match self.decoder.decode(opcode) {
            Instruction::FpuOp0 => self.fpu_op0(bus),
            Instruction::FpuOp1 => self.fpu_op1(bus),
            Instruction::Illegal => Err(Exception::IllegalInstruction(opcode)),
        }
    }
}
