/// SPIR-V decoration scanner
///
/// Walks the instruction stream once and records, for every resource variable,
/// the word offsets of its `Binding` / `DescriptorSet` decoration literals so
/// the pipeline layout builder can rewrite them in place. Everything else a
/// resource declares comes from spirq.

use rustc_hash::FxHashMap;
use crate::error::{Error, Result};

pub const SPIRV_MAGIC: u32 = 0x0723_0203;
const HEADER_WORDS: usize = 5;

// Opcodes
const OP_NAME: u32 = 5;
const OP_VARIABLE: u32 = 59;
const OP_DECORATE: u32 = 71;

// Decorations
const DECORATION_BINDING: u32 = 33;
const DECORATION_DESCRIPTOR_SET: u32 = 34;

// Storage classes holding descriptors
const STORAGE_UNIFORM_CONSTANT: u32 = 0;
const STORAGE_UNIFORM: u32 = 2;
const STORAGE_STORAGE_BUFFER: u32 = 12;

/// A decoration literal and the index of the word holding it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecorationWord {
    pub value: u32,
    pub offset: usize,
}

/// Resource variable found in the module
#[derive(Debug, Clone)]
pub struct SpirvVariable {
    pub id: u32,
    /// `OpName` of the instance, empty when unnamed
    pub name: String,
    pub storage_class: u32,
    pub binding: Option<DecorationWord>,
    pub descriptor_set: Option<DecorationWord>,
}

/// Resource variables of one SPIR-V module
#[derive(Debug, Clone, Default)]
pub struct SpirvModule {
    pub variables: Vec<SpirvVariable>,
}

#[derive(Default)]
struct Decorations {
    binding: Option<DecorationWord>,
    descriptor_set: Option<DecorationWord>,
}

impl SpirvModule {
    /// Scan `words` (a complete module, header included)
    pub fn parse(words: &[u32]) -> Result<Self> {
        if words.len() < HEADER_WORDS {
            return Err(Error::InvalidResource(format!(
                "SPIR-V module is {} words long, shorter than its header",
                words.len()
            )));
        }
        if words[0] != SPIRV_MAGIC {
            return Err(Error::InvalidResource(format!(
                "Invalid SPIR-V magic number 0x{:08x}",
                words[0]
            )));
        }

        let mut names: FxHashMap<u32, String> = FxHashMap::default();
        let mut decorations: FxHashMap<u32, Decorations> = FxHashMap::default();
        let mut variables: Vec<(u32, u32)> = Vec::new();

        let mut i = HEADER_WORDS;
        while i < words.len() {
            let word_count = (words[i] >> 16) as usize;
            let opcode = words[i] & 0xFFFF;
            if word_count == 0 || i + word_count > words.len() {
                return Err(Error::InvalidResource(format!(
                    "Malformed SPIR-V instruction at word {} (opcode {}, word count {})",
                    i, opcode, word_count
                )));
            }
            let inst = &words[i..i + word_count];

            match opcode {
                OP_NAME if word_count >= 3 => {
                    names.insert(inst[1], decode_string(&inst[2..]));
                }
                OP_DECORATE if word_count >= 4 => {
                    let entry = decorations.entry(inst[1]).or_default();
                    let literal = DecorationWord { value: inst[3], offset: i + 3 };
                    match inst[2] {
                        DECORATION_BINDING => entry.binding = Some(literal),
                        DECORATION_DESCRIPTOR_SET => entry.descriptor_set = Some(literal),
                        _ => {}
                    }
                }
                OP_VARIABLE if word_count >= 4 => {
                    variables.push((inst[2], inst[3]));
                }
                _ => {}
            }

            i += word_count;
        }

        let variables = variables
            .into_iter()
            .filter(|(_, storage_class)| {
                matches!(*storage_class, STORAGE_UNIFORM_CONSTANT | STORAGE_UNIFORM | STORAGE_STORAGE_BUFFER)
            })
            .map(|(id, storage_class)| {
                let decoration = decorations.remove(&id).unwrap_or_default();
                SpirvVariable {
                    id,
                    name: names.remove(&id).unwrap_or_default(),
                    storage_class,
                    binding: decoration.binding,
                    descriptor_set: decoration.descriptor_set,
                }
            })
            .collect();

        Ok(SpirvModule { variables })
    }

    /// Variable declared at (`set`, `binding`)
    pub fn find_by_binding(&self, set: u32, binding: u32) -> Option<&SpirvVariable> {
        self.variables.iter().find(|var| {
            var.binding.map(|b| b.value) == Some(binding)
                && var.descriptor_set.map(|s| s.value).unwrap_or(0) == set
        })
    }

    pub fn find_by_name(&self, name: &str) -> Option<&SpirvVariable> {
        self.variables.iter().find(|var| var.name == name)
    }
}

/// Decode a nul-terminated little-endian literal string
fn decode_string(words: &[u32]) -> String {
    let mut bytes = Vec::with_capacity(words.len() * 4);
    'outer: for word in words {
        for byte in word.to_le_bytes() {
            if byte == 0 {
                break 'outer;
            }
            bytes.push(byte);
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Overwrite one decoration literal
pub fn patch_word(words: &mut [u32], offset: usize, value: u32) -> Result<()> {
    match words.get_mut(offset) {
        Some(word) => {
            *word = value;
            Ok(())
        }
        None => Err(Error::InvalidResource(format!(
            "SPIR-V patch offset {} is outside the {}-word module",
            offset,
            words.len()
        ))),
    }
}

/// Reinterpret SPIR-V bytes as words
pub fn words_from_bytes(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::InvalidResource(format!(
            "SPIR-V byte code size {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytemuck::pod_collect_to_vec::<u8, u32>(bytes))
}

#[cfg(test)]
#[path = "spirv_tests.rs"]
mod tests;
