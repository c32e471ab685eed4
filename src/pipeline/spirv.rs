//! Minimal SPIR-V word access: just enough to find resource binding decorations and patch their operands in place.

use crate::Error;

pub const SPIRV_MAGIC: u32 = 0x0723_0203;
const HEADER_WORDS: usize = 5;

const OP_DECORATE: u32 = 71;
const OP_FUNCTION: u32 = 54;

pub const DECORATION_BINDING: u32 = 33;
pub const DECORATION_DESCRIPTOR_SET: u32 = 34;

/// Byte order of a SPIR-V module, detected from its magic number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

impl Endianness {
    /// Read the word at `index` (in words, not bytes).
    pub fn read_word(self, code: &[u8], index: usize) -> u32 {
        let offset = index * 4;
        let bytes = [code[offset], code[offset + 1], code[offset + 2], code[offset + 3]];
        match self {
            Endianness::Little => u32::from_le_bytes(bytes),
            Endianness::Big => u32::from_be_bytes(bytes),
        }
    }

    /// Overwrite the word at `index` (in words, not bytes).
    pub fn write_word(self, code: &mut [u8], index: usize, value: u32) {
        let bytes = match self {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        };
        let offset = index * 4;
        code[offset..offset + 4].copy_from_slice(&bytes);
    }
}

/// `OpDecorate %target Binding|DescriptorSet <literal>`, with the word offset of the literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingDecoration {
    pub target: u32,
    pub decoration: u32,
    pub value: u32,
    pub operand_offset: u32,
}

/// A validated view over the words of a SPIR-V module.
#[derive(Debug, Clone, Copy)]
pub struct SpirvModule<'a> {
    code: &'a [u8],
    endianness: Endianness,
}

impl<'a> SpirvModule<'a> {
    /// Check the header of a SPIR-V binary.
    pub fn parse(code: &'a [u8]) -> Result<Self, Error> {
        if code.len() % 4 != 0 {
            return Err(Error::InvalidSpirv("size is not a multiple of the word size"));
        }
        if code.len() < HEADER_WORDS * 4 {
            return Err(Error::InvalidSpirv("module is smaller than the SPIR-V header"));
        }
        let endianness = if Endianness::Little.read_word(code, 0) == SPIRV_MAGIC {
            Endianness::Little
        } else if Endianness::Big.read_word(code, 0) == SPIRV_MAGIC {
            Endianness::Big
        } else {
            return Err(Error::InvalidSpirv("invalid magic number"));
        };
        Ok(Self {
            code,
            endianness,
        })
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Number of words in the module, including the header.
    pub fn num_words(&self) -> usize {
        self.code.len() / 4
    }

    fn word(&self, index: usize) -> u32 {
        self.endianness.read_word(self.code, index)
    }

    /// Collect all `Binding` and `DescriptorSet` decorations, in module order.
    /// Scanning stops at the first function, since decorations must precede all function definitions.
    pub fn binding_decorations(&self) -> Result<Vec<BindingDecoration>, Error> {
        let mut decorations = vec![];
        let mut offset = HEADER_WORDS;
        while offset < self.num_words() {
            let first = self.word(offset);
            let opcode = first & 0xFFFF;
            let word_count = (first >> 16) as usize;
            if word_count == 0 {
                return Err(Error::InvalidSpirv("instruction with zero word count"));
            }
            if offset + word_count > self.num_words() {
                return Err(Error::InvalidSpirv("instruction exceeds module size"));
            }
            if opcode == OP_FUNCTION {
                break;
            }
            if opcode == OP_DECORATE && word_count >= 4 {
                let decoration = self.word(offset + 2);
                if decoration == DECORATION_BINDING || decoration == DECORATION_DESCRIPTOR_SET {
                    decorations.push(BindingDecoration {
                        target: self.word(offset + 1),
                        decoration,
                        value: self.word(offset + 3),
                        operand_offset: (offset + 3) as u32,
                    });
                }
            }
            offset += word_count;
        }
        Ok(decorations)
    }
}
