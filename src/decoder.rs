//! Capstone-based x86-64 instruction decoder.

use capstone::arch::x86::{ArchMode, X86OperandType};
use capstone::arch::ArchOperand;
use capstone::prelude::*;
use capstone::Capstone;

/// Errors raised while constructing a decoder.
///
/// Per-instruction decode failures are not errors: `decode` returns `None`
/// and the caller decides whether to skip a byte or end a block.
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("capstone error: {0}")]
    Capstone(#[from] capstone::Error),
}

/// Mnemonic classification used by the recovery passes.
///
/// Only the control-flow family and the prologue mnemonics are told apart;
/// everything else is `Other`. The conditional jumps are an explicit set
/// rather than a range test over decoder-internal ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MnemonicKind {
    Jmp,
    CondJump,
    Call,
    Ret,
    Push,
    Pop,
    Mov,
    Sub,
    Other,
}

const COND_JUMPS: &[&str] = &[
    "ja", "jae", "jb", "jbe", "jcxz", "jecxz", "jrcxz", "je", "jg", "jge",
    "jl", "jle", "jne", "jno", "jnp", "jns", "jo", "jp", "js",
];

impl MnemonicKind {
    pub fn classify(mnemonic: &str) -> Self {
        match mnemonic {
            "jmp" | "ljmp" => MnemonicKind::Jmp,
            "call" | "lcall" => MnemonicKind::Call,
            "ret" | "retf" => MnemonicKind::Ret,
            "push" => MnemonicKind::Push,
            "pop" => MnemonicKind::Pop,
            "mov" => MnemonicKind::Mov,
            "sub" => MnemonicKind::Sub,
            m if COND_JUMPS.contains(&m) => MnemonicKind::CondJump,
            _ => MnemonicKind::Other,
        }
    }

    /// Instructions that terminate a basic block.
    pub fn is_control_flow(self) -> bool {
        matches!(
            self,
            MnemonicKind::Jmp | MnemonicKind::CondJump | MnemonicKind::Call | MnemonicKind::Ret
        )
    }
}

/// One visible operand of a decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Register operand, by Capstone name (`"rbp"`, `"eax"`, ...).
    Register(String),
    /// Immediate, absolute. Capstone resolves PC-relative branch encodings
    /// against `address + length` before we see them.
    Immediate(u64),
    /// Memory operand. `target` is the absolute effective address for
    /// RIP-relative displacements, `None` for anything register-based.
    Memory { target: Option<u64> },
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub address: u64,
    pub length: usize,
    pub kind: MnemonicKind,
    pub operands: Vec<Operand>,
    /// Canonical text form, e.g. `"mov rbp, rsp"` or `"jne 0x1428"`.
    pub text: String,
}

impl Decoded {
    /// End address of this instruction (exclusive).
    pub fn end_address(&self) -> u64 {
        self.address + self.length as u64
    }

    /// Direct branch target, if the first operand is an immediate.
    ///
    /// Register- and memory-indirect branches yield `None`; the caller
    /// drops the successor and moves on.
    pub fn branch_target(&self) -> Option<u64> {
        match self.operands.first() {
            Some(Operand::Immediate(target)) => Some(*target),
            _ => None,
        }
    }

    pub fn first_register(&self) -> Option<&str> {
        match self.operands.first() {
            Some(Operand::Register(name)) => Some(name.as_str()),
            _ => None,
        }
    }
}

/// A single-instruction x86-64 decoder.
///
/// Wraps one Capstone handle built in detail mode. The handle is stateless
/// between `decode` calls from the caller's perspective.
pub struct InsnDecoder {
    cs: Capstone,
}

impl InsnDecoder {
    pub fn new() -> Result<Self, DecoderError> {
        let cs = Capstone::new()
            .x86()
            .mode(ArchMode::Mode64)
            .detail(true)
            .build()?;
        Ok(InsnDecoder { cs })
    }

    /// Decode the instruction at the start of `data`, reporting addresses
    /// relative to `address`. Returns `None` on any decode failure.
    pub fn decode(&self, data: &[u8], address: u64) -> Option<Decoded> {
        if data.is_empty() {
            return None;
        }

        // One instruction never spans more than 15 bytes on x86-64.
        let window = &data[..data.len().min(16)];
        let insns = self.cs.disasm_count(window, address, 1).ok()?;
        let insn = insns.iter().next()?;

        let mnemonic = insn.mnemonic()?;
        let op_str = insn.op_str().unwrap_or("");
        let kind = MnemonicKind::classify(mnemonic);
        let length = insn.bytes().len();

        let text = if op_str.is_empty() {
            mnemonic.to_string()
        } else {
            format!("{mnemonic} {op_str}")
        };

        let detail = self.cs.insn_detail(insn).ok()?;
        let operands = self.convert_operands(&detail, address, length);

        Some(Decoded { address, length, kind, operands, text })
    }

    fn convert_operands(
        &self,
        detail: &capstone::InsnDetail,
        address: u64,
        length: usize,
    ) -> Vec<Operand> {
        let mut operands = Vec::new();
        for op in detail.arch_detail().operands() {
            let ArchOperand::X86Operand(op) = op else { continue };
            match op.op_type {
                X86OperandType::Reg(reg) => {
                    let name = self.cs.reg_name(reg).unwrap_or_default();
                    operands.push(Operand::Register(name));
                }
                X86OperandType::Imm(value) => {
                    operands.push(Operand::Immediate(value as u64));
                }
                X86OperandType::Mem(mem) => {
                    let base_is_rip = self
                        .cs
                        .reg_name(mem.base())
                        .is_some_and(|name| name == "rip");
                    let target = if base_is_rip {
                        Some((address + length as u64).wrapping_add(mem.disp() as u64))
                    } else {
                        None
                    };
                    operands.push(Operand::Memory { target });
                }
                _ => {}
            }
        }
        operands
    }
}
