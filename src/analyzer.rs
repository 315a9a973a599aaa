//! Function and control-flow recovery over a `.text` section.
//!
//! Two entry-discovery strategies run and their results are unioned:
//! following direct call targets (precise, misses never-called leaves) and
//! recognizing common prologue shapes (noisy, catches the rest). Downstream
//! matching tolerates both failure modes: a false entry scores low and falls
//! out unmatched, a missed entry is simply not reported.

use std::collections::{BTreeSet, VecDeque};

use log::{debug, info};
use rustc_hash::FxHashSet;

use crate::decoder::{Decoded, DecoderError, InsnDecoder, MnemonicKind, Operand};
use crate::{BasicBlockInfo, Fingerprint, FunctionInfo};

/// Recovers functions from one section's bytes.
///
/// `base` is the virtual address of `data[0]` (image base plus the section's
/// virtual address); every recovered address lies in `[base, base + len)`.
pub struct FunctionAnalyzer<'a> {
    data: &'a [u8],
    base: u64,
    decoder: InsnDecoder,
}

impl<'a> FunctionAnalyzer<'a> {
    pub fn new(data: &'a [u8], base: u64) -> Result<Self, DecoderError> {
        Ok(FunctionAnalyzer { data, base, decoder: InsnDecoder::new()? })
    }

    /// Recover all candidate functions, ordered by ascending start address.
    pub fn identify_functions(&self) -> Vec<FunctionInfo> {
        info!("scanning {} bytes at {:#x}", self.data.len(), self.base);

        let mut entries = BTreeSet::new();
        self.collect_call_targets(&mut entries);
        let call_targets = entries.len();
        self.collect_prologues(&mut entries);

        info!(
            "found {} function starts ({} from call targets)",
            entries.len(),
            call_targets
        );

        entries
            .into_iter()
            .map(|entry| self.analyze_function(entry))
            .collect()
    }

    /// Build the function record rooted at `start_address`.
    pub fn analyze_function(&self, start_address: u64) -> FunctionInfo {
        let basic_blocks = self.find_basic_blocks(start_address);

        let instruction_count = basic_blocks.iter().map(|b| b.instruction_count()).sum();
        let end_address = basic_blocks
            .iter()
            .map(|b| b.end_address)
            .max()
            .unwrap_or(start_address);

        FunctionInfo {
            start_address,
            end_address,
            fingerprint: Fingerprint {
                block_count: basic_blocks.len(),
                instruction_count,
            },
            basic_blocks,
            similarity_score: 0.0,
            diff_details: Vec::new(),
        }
    }

    /// Strategy (a): walk straight-line code from the section base and chase
    /// direct `call` targets. Each discovered target is scanned once itself.
    fn collect_call_targets(&self, entries: &mut BTreeSet<u64>) {
        let mut worklist = VecDeque::new();
        let mut scanned = FxHashSet::default();
        worklist.push_back(self.base);

        while let Some(start) = worklist.pop_front() {
            if !scanned.insert(start) {
                continue;
            }

            let mut address = start;
            while let Some(offset) = self.offset_of(address) {
                let Some(insn) = self.decoder.decode(&self.data[offset..], address) else {
                    break;
                };

                match insn.kind {
                    MnemonicKind::Call => {
                        if let Some(target) = insn.branch_target() {
                            if self.contains(target) && entries.insert(target) {
                                worklist.push_back(target);
                            }
                        }
                    }
                    // Control flow leaves the straight-line region.
                    MnemonicKind::Ret | MnemonicKind::Jmp => break,
                    _ => {}
                }

                address = insn.end_address();
            }
        }
    }

    /// Strategy (b): byte-wise scan for prologue shapes. A failed decode at
    /// an offset just moves the scan one byte forward.
    fn collect_prologues(&self, entries: &mut BTreeSet<u64>) {
        for offset in 0..self.data.len().saturating_sub(15) {
            let address = self.base + offset as u64;
            if entries.contains(&address) {
                continue;
            }

            let Some(insn) = self.decoder.decode(&self.data[offset..], address) else {
                continue;
            };

            if self.is_prologue(&insn, offset) {
                debug!("prologue at {:#x}: {}", address, insn.text);
                entries.insert(address);
            }
        }
    }

    fn is_prologue(&self, insn: &Decoded, offset: usize) -> bool {
        match insn.kind {
            MnemonicKind::Push => {
                // push rbp immediately followed by mov rbp, rsp
                if insn.first_register() == Some("rbp") && self.is_frame_setup(offset + insn.length) {
                    return true;
                }
                // or a run of saves: push reg; push reg; ...
                self.count_pushes(offset) >= 2
            }
            // sub rsp, imm
            MnemonicKind::Sub => {
                insn.first_register() == Some("rsp")
                    && matches!(insn.operands.get(1), Some(Operand::Immediate(_)))
            }
            _ => false,
        }
    }

    fn is_frame_setup(&self, offset: usize) -> bool {
        if offset >= self.data.len().saturating_sub(3) {
            return false;
        }
        let address = self.base + offset as u64;
        let Some(next) = self.decoder.decode(&self.data[offset..], address) else {
            return false;
        };

        next.kind == MnemonicKind::Mov
            && next.first_register() == Some("rbp")
            && matches!(next.operands.get(1), Some(Operand::Register(r)) if r == "rsp")
    }

    fn count_pushes(&self, mut offset: usize) -> usize {
        let mut count = 0;
        while offset < self.data.len().saturating_sub(3) && count < 4 {
            let address = self.base + offset as u64;
            let Some(insn) = self.decoder.decode(&self.data[offset..], address) else {
                break;
            };
            if insn.kind != MnemonicKind::Push {
                break;
            }
            count += 1;
            offset += insn.length;
        }
        count
    }

    /// Worklist CFG discovery. Blocks are emitted in DFS-pop order, which the
    /// similarity pass relies on for positional alignment.
    fn find_basic_blocks(&self, start_address: u64) -> Vec<BasicBlockInfo> {
        let mut blocks: Vec<BasicBlockInfo> = Vec::new();
        let mut processed = FxHashSet::default();
        let mut stack = vec![start_address];

        while let Some(block_start) = stack.pop() {
            if !processed.insert(block_start) {
                continue;
            }

            let mut instructions = Vec::new();
            let mut successors = Vec::new();
            let mut address = block_start;

            while let Some(offset) = self.offset_of(address) {
                let Some(insn) = self.decoder.decode(&self.data[offset..], address) else {
                    break;
                };

                instructions.push(insn.text.clone());
                address = insn.end_address();

                if !insn.kind.is_control_flow() {
                    continue;
                }

                match insn.kind {
                    MnemonicKind::Ret => {}
                    MnemonicKind::Call => {
                        // The callee is a separate function; only the
                        // fall-through continues this one.
                        if self.contains(address) {
                            successors.push(address);
                            stack.push(address);
                        }
                    }
                    MnemonicKind::Jmp | MnemonicKind::CondJump => {
                        if let Some(target) = insn.branch_target() {
                            if self.contains(target) {
                                successors.push(target);
                                stack.push(target);
                            }
                        }
                        if insn.kind == MnemonicKind::CondJump && self.contains(address) {
                            successors.push(address);
                            stack.push(address);
                        }
                    }
                    _ => unreachable!("is_control_flow covers exactly these kinds"),
                }
                break;
            }

            if !instructions.is_empty() {
                blocks.push(BasicBlockInfo {
                    start_address: block_start,
                    end_address: address,
                    instructions,
                    successors,
                });
            }
        }

        blocks
    }

    fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.base + self.data.len() as u64
    }

    fn offset_of(&self, address: u64) -> Option<usize> {
        self.contains(address).then(|| (address - self.base) as usize)
    }
}
