/// Condition code bits of the FPSR.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FpsrFlag {
    Nan = 0x0100_0000,
    Infinity = 0x0200_0000,
    Zero = 0x0400_0000,
    Negative = 0x0800_0000,
}

pub const CONDITION_CODE_MASK: u32 = FpsrFlag::Nan as u32
    | FpsrFlag::Infinity as u32
    | FpsrFlag::Zero as u32
    | FpsrFlag::Negative as u32;

const SIGN: u64 = 0x8000_0000_0000_0000;
const MAGNITUDE: u64 = 0x7FFF_FFFF_FFFF_FFFF;
const INFINITY: u64 = 0x7FF0_0000_0000_0000;
const EXPONENT: u64 = 0x7FF0_0000_0000_0000;
const MANTISSA: u64 = 0x000F_FFFF_FFFF_FFFF;

/// Condition code bits describing a double, given as its IEEE-754 bit pattern.
pub fn condition_codes(bits: u64) -> u32 {
    let mut codes = 0;
    if (bits & SIGN) != 0 {
        codes |= FpsrFlag::Negative as u32;
    }
    if (bits & MAGNITUDE) == 0 {
        codes |= FpsrFlag::Zero as u32;
    }
    if (bits & MAGNITUDE) == INFINITY {
        codes |= FpsrFlag::Infinity as u32;
    }
    if (bits & EXPONENT) == EXPONENT && (bits & MANTISSA) != 0 {
        codes |= FpsrFlag::Nan as u32;
    }
    codes
}

/// FPU conditional predicates (the 6-bit condition field of FBcc).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Condition {
    False,
    Equal,
    NotEqual,
    True,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    NotLessOrEqual,
    NotLessThan,
    NotGreaterOrEqual,
    NotGreaterThan,
}

impl Condition {
    pub fn decode(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::False),
            0x01 => Some(Self::Equal),
            0x0E => Some(Self::NotEqual),
            0x0F => Some(Self::True),
            0x12 => Some(Self::GreaterThan),
            0x13 => Some(Self::GreaterOrEqual),
            0x14 => Some(Self::LessThan),
            0x15 => Some(Self::LessOrEqual),
            0x1A => Some(Self::NotLessOrEqual),
            0x1B => Some(Self::NotLessThan),
            0x1C => Some(Self::NotGreaterOrEqual),
            0x1D => Some(Self::NotGreaterThan),
            _ => None,
        }
    }

    /// Evaluates the predicate against the condition code bits of `fpsr`.
    pub fn test(self, fpsr: u32) -> bool {
        let n = (fpsr & FpsrFlag::Negative as u32) != 0;
        let z = (fpsr & FpsrFlag::Zero as u32) != 0;
        let nan = (fpsr & FpsrFlag::Nan as u32) != 0;
        match self {
            Self::False => false,
            Self::Equal => z,
            Self::NotEqual => !z,
            Self::True => true,
            Self::GreaterThan => !(nan || z || n),
            Self::GreaterOrEqual => z || !(nan || n),
            Self::LessThan => n && !(nan || z),
            Self::LessOrEqual => z || (n && !nan),
            Self::NotLessOrEqual => nan || !(n || z),
            Self::NotLessThan => nan || z || !n,
            Self::NotGreaterOrEqual => nan || (n && !z),
            Self::NotGreaterThan => nan || z || n,
        }
    }
}
