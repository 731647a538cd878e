use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EffectiveAddress {
    DataRegister(u8),
    AddressRegister(u8),
    Address(u8),
    AddressWithPostIncrement(u8),
    AddressWithPreDecrement(u8),
    AddressWithDisplacement(u8),
    AddressWithIndex(u8),
    PcWithDisplacement,
    PcWithIndex,
    AbsoluteShort,
    AbsoluteLong,
    Immediate,
}

impl EffectiveAddress {
    /// Decodes the low 6 bits of an opcode (mode in bits 3-5, register in bits 0-2).
    pub fn decode(field: u8) -> Option<Self> {
        let mode = (field >> 3) & 0b111;
        let register = field & 0b111;
        match mode {
            0b000 => Some(Self::DataRegister(register)),
            0b001 => Some(Self::AddressRegister(register)),
            0b010 => Some(Self::Address(register)),
            0b011 => Some(Self::AddressWithPostIncrement(register)),
            0b100 => Some(Self::AddressWithPreDecrement(register)),
            0b101 => Some(Self::AddressWithDisplacement(register)),
            0b110 => Some(Self::AddressWithIndex(register)),
            0b111 => match register {
                0b000 => Some(Self::AbsoluteShort),
                0b001 => Some(Self::AbsoluteLong),
                0b010 => Some(Self::PcWithDisplacement),
                0b011 => Some(Self::PcWithIndex),
                0b100 => Some(Self::Immediate),
                _ => None,
            },
            _ => unreachable!(),
        }
    }
}

/// Top-level classification of an opcode word.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Instruction {
    Illegal,
    /// `1111 001 0xx xxxxxx`: general FPU operations and FBcc.
    FpuOp0,
    /// `1111 001 1xx xxxxxx`: FSAVE / FRESTORE.
    FpuOp1,
}

lazy_static::lazy_static! {
    static ref TABLE: Vec<Instruction> = init_table();
}

#[derive(Debug)]
pub struct Decoder {
    table: &'static Vec<Instruction>,
}

impl Decoder {
    #[inline]
    pub fn new() -> Self {
        Self { table: &TABLE }
    }

    #[inline]
    pub fn decode(&self, opcode: u16) -> Instruction {
        self.table[opcode as usize]
    }
}

impl Default for Decoder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

fn init_table() -> Vec<Instruction> {
    let mut table = vec![Instruction::Illegal; 65536];
    for opcode in 0..table.len() {
        let opcode = opcode as u16;
        table[opcode as usize] = match (opcode & 0xF000) >> 12 {
            0xF => decode_f(opcode),
            _ => Instruction::Illegal,
        }
    }
    table
}

fn decode_f(opcode: u16) -> Instruction {
    let bit8 = (opcode & 0b0000_0001_0000_0000) >> 8;
    let bits9_11 = (opcode & 0b0000_1110_0000_0000) >> 9;

    // coprocessor id 1 is the FPU
    if bits9_11 != 0b001 {
        return Instruction::Illegal;
    }
    if bit8 == 0 {
        Instruction::FpuOp0
    } else {
        Instruction::FpuOp1
    }
}

/// Operation selected by bits 6-7 of an `FpuOp0` opcode.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GeneralOp {
    /// Followed by a command word.
    Command,
    Branch16,
    Branch32,
}

impl GeneralOp {
    #[inline]
    pub fn decode(opcode: u16) -> Option<Self> {
        match (opcode >> 6) & 0b11 {
            0 => Some(Self::Command),
            2 => Some(Self::Branch16),
            3 => Some(Self::Branch32),
            _ => None,
        }
    }
}

/// Operation selected by bits 6-7 of an `FpuOp1` opcode.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StateFrameOp {
    Save,
    Restore,
}

impl StateFrameOp {
    #[inline]
    pub fn decode(opcode: u16) -> Option<Self> {
        match (opcode >> 6) & 0b11 {
            0 => Some(Self::Save),
            1 => Some(Self::Restore),
            _ => None,
        }
    }
}

/// Data format field found in bits 10-12 of the command word.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Format {
    LongInteger,
    Single,
    Extended,
    Packed,
    WordInteger,
    Double,
    ByteInteger,
    PackedDynamic,
}

impl Format {
    #[inline]
    pub fn decode(bits: u16) -> Self {
        match bits & 0b111 {
            0 => Self::LongInteger,
            1 => Self::Single,
            2 => Self::Extended,
            3 => Self::Packed,
            4 => Self::WordInteger,
            5 => Self::Double,
            6 => Self::ByteInteger,
            7 => Self::PackedDynamic,
            _ => unreachable!(),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LongInteger => "long-word integer",
            Self::Single => "single-precision real",
            Self::Extended => "extended-precision real",
            Self::Packed | Self::PackedDynamic => "packed-decimal real",
            Self::WordInteger => "word integer",
            Self::Double => "double-precision real",
            Self::ByteInteger => "byte integer",
        })
    }
}

/// Arithmetic operation selected by the low 7 bits of the command word.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Opmode {
    Move,
    Sqrt,
    Abs,
    Neg,
    Div,
    Add,
    Mul,
    Sub,
    Cmp,
    Tst,
}

impl Opmode {
    #[inline]
    pub fn decode(opmode: u8) -> Option<Self> {
        match opmode {
            0x00 => Some(Self::Move),
            0x04 => Some(Self::Sqrt),
            0x18 => Some(Self::Abs),
            0x1A => Some(Self::Neg),
            0x20 => Some(Self::Div),
            0x22 => Some(Self::Add),
            0x23 => Some(Self::Mul),
            0x28 => Some(Self::Sub),
            0x38 => Some(Self::Cmp),
            0x3A => Some(Self::Tst),
            _ => None,
        }
    }

    #[inline]
    pub fn cycles(self) -> u32 {
        match self {
            Self::Move => 4,
            Self::Sqrt => 109,
            Self::Abs | Self::Neg => 3,
            Self::Div => 43,
            Self::Add | Self::Sub => 9,
            Self::Mul => 11,
            Self::Cmp | Self::Tst => 7,
        }
    }

    /// FCMP and FTST only update the condition codes.
    #[inline]
    pub fn writes_back(self) -> bool {
        !matches!(self, Self::Cmp | Self::Tst)
    }

    #[inline]
    pub fn sets_condition_codes(self) -> bool {
        // FDIV leaves the condition codes alone
        !matches!(self, Self::Move | Self::Div)
    }
}

/// FPU system control register named by a one-hot selector.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ControlRegister {
    Fpiar,
    Fpsr,
    Fpcr,
}

impl ControlRegister {
    #[inline]
    pub fn decode(select: u8) -> Option<Self> {
        match select {
            1 => Some(Self::Fpiar),
            2 => Some(Self::Fpsr),
            4 => Some(Self::Fpcr),
            _ => None,
        }
    }
}

/// Where the source operand of an arithmetic command comes from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Source {
    Register(u8),
    Memory(Format),
}

/// Decoded command word (the second word of an `FpuOp0` command).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    Arithmetic {
        source: Source,
        dst: u8,
        opmode: u8,
    },
    MoveToMemory {
        format: Format,
        src: u8,
    },
    MoveControl {
        to_memory: bool,
        select: u8,
    },
    MoveMultiple {
        to_memory: bool,
        mode: u8,
        list: u8,
    },
}

impl Command {
    /// Returns `None` for the command classes with no implementation (bits 13-15 == 1).
    pub fn decode(w2: u16) -> Option<Self> {
        let bits0_6 = (w2 & 0b0000_0000_0111_1111) as u8;
        let bits0_7 = (w2 & 0b0000_0000_1111_1111) as u8;
        let bits7_9 = ((w2 & 0b0000_0011_1000_0000) >> 7) as u8;
        let bits10_12 = (w2 & 0b0001_1100_0000_0000) >> 10;
        let bits11_12 = ((w2 & 0b0001_1000_0000_0000) >> 11) as u8;
        let bit13 = (w2 & 0b0010_0000_0000_0000) != 0;
        let bit14 = (w2 & 0b0100_0000_0000_0000) != 0;

        match (w2 >> 13) & 0b111 {
            0b000 | 0b010 => Some(Self::Arithmetic {
                source: if bit14 {
                    Source::Memory(Format::decode(bits10_12))
                } else {
                    Source::Register(bits10_12 as u8)
                },
                dst: bits7_9,
                opmode: bits0_6,
            }),
            0b011 => Some(Self::MoveToMemory {
                format: Format::decode(bits10_12),
                src: bits7_9,
            }),
            0b100 | 0b101 => Some(Self::MoveControl {
                to_memory: bit13,
                select: bits10_12 as u8,
            }),
            0b110 | 0b111 => Some(Self::MoveMultiple {
                to_memory: bit13,
                mode: bits11_12,
                list: bits0_7,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_line_f() {
        let decoder = Decoder::new();
        assert_eq!(Instruction::FpuOp0, decoder.decode(0xF200));
        assert_eq!(Instruction::FpuOp0, decoder.decode(0xF281));
        assert_eq!(Instruction::FpuOp1, decoder.decode(0xF327));
        assert_eq!(Instruction::Illegal, decoder.decode(0xF400));
        assert_eq!(Instruction::Illegal, decoder.decode(0x4E71));
    }

    #[test]
    fn decodes_effective_address_field() {
        assert_eq!(Some(EffectiveAddress::DataRegister(3)), EffectiveAddress::decode(0o03));
        assert_eq!(
            Some(EffectiveAddress::AddressWithPreDecrement(7)),
            EffectiveAddress::decode(0o47)
        );
        assert_eq!(Some(EffectiveAddress::AbsoluteLong), EffectiveAddress::decode(0o71));
        assert_eq!(Some(EffectiveAddress::Immediate), EffectiveAddress::decode(0o74));
        assert_eq!(None, EffectiveAddress::decode(0o75));
    }

    #[test]
    fn decodes_command_classes() {
        // FADD.L D0,FP3
        assert_eq!(
            Some(Command::Arithmetic {
                source: Source::Memory(Format::LongInteger),
                dst: 3,
                opmode: 0x22
            }),
            Command::decode(0x41A2)
        );
        // FSQRT FP1,FP0
        assert_eq!(
            Some(Command::Arithmetic {
                source: Source::Register(1),
                dst: 0,
                opmode: 0x04
            }),
            Command::decode(0x0404)
        );
        // FMOVE.S FP1,<ea>
        assert_eq!(
            Some(Command::MoveToMemory {
                format: Format::Single,
                src: 1
            }),
            Command::decode(0x6480)
        );
        // FMOVE FPSR,<ea>
        assert_eq!(
            Some(Command::MoveControl {
                to_memory: true,
                select: 2
            }),
            Command::decode(0xA800)
        );
        // FMOVEM.X FP0/FP1,-(An)
        assert_eq!(
            Some(Command::MoveMultiple {
                to_memory: true,
                mode: 0,
                list: 0b0000_0011
            }),
            Command::decode(0xE003)
        );
        assert_eq!(None, Command::decode(0x2000));
    }

    #[test]
    fn opmode_table() {
        for opmode in 0..0x80u8 {
            let known = [0x00, 0x04, 0x18, 0x1A, 0x20, 0x22, 0x23, 0x28, 0x38, 0x3A];
            assert_eq!(known.contains(&opmode), Opmode::decode(opmode).is_some());
        }
        assert_eq!(Some(Opmode::Add), Opmode::decode(0x22));
        assert_eq!(9, Opmode::Add.cycles());
    }
}
