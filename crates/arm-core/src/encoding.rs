//! Opcode identifiers and the ordered dispatch entry lists for both encodings.
//!
//! Entry order is significant: when patterns overlap, the earlier entry wins.

use crate::api::VariantSet;

/// Barrel-shifter operation selected by a 2-bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShiftKind {
    /// Logical shift left.
    Lsl,
    /// Logical shift right.
    Lsr,
    /// Arithmetic shift right.
    Asr,
    /// Rotate right (rotate right with extend for an immediate of zero).
    Ror,
}

impl ShiftKind {
    /// Decodes the low two bits of `bits`.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => Self::Lsl,
            1 => Self::Lsr,
            2 => Self::Asr,
            _ => Self::Ror,
        }
    }
}

/// ARM data-processing opcodes (bits 24..21).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum AluOp {
    And,
    Eor,
    Sub,
    Rsb,
    Add,
    Adc,
    Sbc,
    Rsc,
    Tst,
    Teq,
    Cmp,
    Cmn,
    Orr,
    Mov,
    Bic,
    Mvn,
}

impl AluOp {
    /// Every opcode in encoding order.
    pub const ALL: [Self; 16] = [
        Self::And,
        Self::Eor,
        Self::Sub,
        Self::Rsb,
        Self::Add,
        Self::Adc,
        Self::Sbc,
        Self::Rsc,
        Self::Tst,
        Self::Teq,
        Self::Cmp,
        Self::Cmn,
        Self::Orr,
        Self::Mov,
        Self::Bic,
        Self::Mvn,
    ];

    /// Opcode field value.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Opcodes that only update flags and never write a destination.
    #[must_use]
    pub const fn is_compare(self) -> bool {
        matches!(self, Self::Tst | Self::Teq | Self::Cmp | Self::Cmn)
    }
}

/// Thumb format 4 ALU opcodes (bits 9..6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ThumbAluOp {
    And,
    Eor,
    Lsl,
    Lsr,
    Asr,
    Adc,
    Sbc,
    Ror,
    Tst,
    Neg,
    Cmp,
    Cmn,
    Orr,
    Mul,
    Bic,
    Mvn,
}

impl ThumbAluOp {
    /// Every opcode in encoding order.
    pub const ALL: [Self; 16] = [
        Self::And,
        Self::Eor,
        Self::Lsl,
        Self::Lsr,
        Self::Asr,
        Self::Adc,
        Self::Sbc,
        Self::Ror,
        Self::Tst,
        Self::Neg,
        Self::Cmp,
        Self::Cmn,
        Self::Orr,
        Self::Mul,
        Self::Bic,
        Self::Mvn,
    ];
}

/// Width and direction of a Thumb single transfer.
///
/// Declared in the order of the register-offset opcode field (bits 11..9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum TransferKind {
    StoreWord,
    StoreHalf,
    StoreByte,
    LoadSignedByte,
    LoadWord,
    LoadHalf,
    LoadByte,
    LoadSignedHalf,
}

impl TransferKind {
    /// Every kind in register-offset encoding order.
    pub const ALL: [Self; 8] = [
        Self::StoreWord,
        Self::StoreHalf,
        Self::StoreByte,
        Self::LoadSignedByte,
        Self::LoadWord,
        Self::LoadHalf,
        Self::LoadByte,
        Self::LoadSignedHalf,
    ];

    /// Scale applied to a 5-bit immediate offset.
    #[must_use]
    pub const fn immediate_scale(self) -> u32 {
        match self {
            Self::StoreWord | Self::LoadWord => 4,
            Self::StoreHalf | Self::LoadHalf | Self::LoadSignedHalf => 2,
            Self::StoreByte | Self::LoadByte | Self::LoadSignedByte => 1,
        }
    }

    /// Returns true for loads.
    #[must_use]
    pub const fn is_load(self) -> bool {
        matches!(
            self,
            Self::LoadWord
                | Self::LoadHalf
                | Self::LoadByte
                | Self::LoadSignedByte
                | Self::LoadSignedHalf
        )
    }
}

/// Handler selected for a 32-bit ARM instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmOp {
    /// No entry matched.
    Unknown,
    /// Data processing with the given ALU opcode.
    DataProcessing(AluOp),
    /// `MUL`/`MLA`.
    Multiply,
    /// `UMULL`/`UMLAL`/`SMULL`/`SMLAL`.
    MultiplyLong,
    /// `SWP`/`SWPB`.
    Swap,
    /// `LDRH`/`STRH`/`LDRSB`/`LDRSH`.
    HalfwordTransfer,
    /// `LDR`/`STR`/`LDRB`/`STRB`.
    SingleTransfer,
    /// `LDM`/`STM`.
    BlockTransfer,
    /// `B`.
    Branch,
    /// `BL`.
    BranchLink,
    /// `BX`.
    BranchExchange,
    /// `BLX` register form (ARMv5TE).
    BranchLinkExchange,
    /// `MRS`.
    StatusRead,
    /// `MSR` register or immediate form.
    StatusWrite,
    /// `SWI`.
    SoftwareInterrupt,
    /// `CLZ` (ARMv5TE).
    CountLeadingZeros,
    /// `QADD`/`QSUB`/`QDADD`/`QDSUB` (ARMv5TE).
    SaturatingArithmetic,
}

/// Handler selected for a 16-bit Thumb instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThumbOp {
    /// No entry matched.
    Unknown,
    /// `LSL`/`LSR`/`ASR` by immediate.
    ShiftImmediate(ShiftKind),
    /// `ADD Rd, Rs, Rn`.
    AddRegister,
    /// `SUB Rd, Rs, Rn`.
    SubtractRegister,
    /// `ADD Rd, Rs, #imm3`.
    AddImmediate3,
    /// `SUB Rd, Rs, #imm3`.
    SubtractImmediate3,
    /// `MOV Rd, #imm8`.
    MoveImmediate,
    /// `CMP Rd, #imm8`.
    CompareImmediate,
    /// `ADD Rd, #imm8`.
    AddImmediate8,
    /// `SUB Rd, #imm8`.
    SubtractImmediate8,
    /// Register ALU operation.
    Alu(ThumbAluOp),
    /// `ADD` with a high register.
    HighAdd,
    /// `CMP` with a high register.
    HighCompare,
    /// `MOV` with a high register.
    HighMove,
    /// `BX`.
    BranchExchange,
    /// `BLX` register form (ARMv5TE).
    BranchLinkExchange,
    /// `LDR Rd, [PC, #imm]`.
    LoadPcRelative,
    /// Load/store with register offset.
    TransferRegister(TransferKind),
    /// Load/store with immediate offset.
    TransferImmediate(TransferKind),
    /// `STR Rd, [SP, #imm]`.
    StoreSpRelative,
    /// `LDR Rd, [SP, #imm]`.
    LoadSpRelative,
    /// `ADD Rd, PC, #imm`.
    AddressFromPc,
    /// `ADD Rd, SP, #imm`.
    AddressFromSp,
    /// `ADD SP, #±imm`.
    AdjustSp,
    /// `PUSH`.
    Push,
    /// `POP`.
    Pop,
    /// `STMIA Rb!`.
    StoreMultiple,
    /// `LDMIA Rb!`.
    LoadMultiple,
    /// `Bcc`.
    ConditionalBranch,
    /// `SWI`.
    SoftwareInterrupt,
    /// `B`.
    Branch,
    /// First half of `BL`/`BLX`.
    LongBranchPrefix,
    /// Second half of `BL`.
    LongBranchSuffix,
    /// Second half of `BLX` immediate (ARMv5TE).
    LongBranchExchangeSuffix,
}

/// One dispatch rule: instructions with `raw & mask == pattern` run `op`
/// on the listed CPU variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchEntry<Op> {
    /// Bits that must match.
    pub mask: u32,
    /// Required value of the masked bits.
    pub pattern: u32,
    /// Handler selected on a match.
    pub op: Op,
    /// Variants implementing the instruction.
    pub variants: VariantSet,
}

const fn entry<Op>(mask: u32, pattern: u32, op: Op) -> DispatchEntry<Op> {
    DispatchEntry {
        mask,
        pattern,
        op,
        variants: VariantSet::ALL,
    }
}

const fn v5te<Op>(mask: u32, pattern: u32, op: Op) -> DispatchEntry<Op> {
    DispatchEntry {
        mask,
        pattern,
        op,
        variants: VariantSet::V5TE,
    }
}

/// Ordered ARM dispatch entries.
#[must_use]
pub fn arm_dispatch_entries() -> Vec<DispatchEntry<ArmOp>> {
    let mut entries = vec![
        entry(0x0FFF_FFF0, 0x012F_FF10, ArmOp::BranchExchange),
        v5te(0x0FFF_FFF0, 0x012F_FF30, ArmOp::BranchLinkExchange),
        v5te(0x0FFF_0FF0, 0x016F_0F10, ArmOp::CountLeadingZeros),
        v5te(0x0F90_0FF0, 0x0100_0050, ArmOp::SaturatingArithmetic),
        entry(0x0FC0_00F0, 0x0000_0090, ArmOp::Multiply),
        entry(0x0F80_00F0, 0x0080_0090, ArmOp::MultiplyLong),
        entry(0x0FB0_0FF0, 0x0100_0090, ArmOp::Swap),
        entry(0x0E00_00F0, 0x0000_00B0, ArmOp::HalfwordTransfer),
        entry(0x0E10_00F0, 0x0010_00D0, ArmOp::HalfwordTransfer),
        entry(0x0E10_00F0, 0x0010_00F0, ArmOp::HalfwordTransfer),
        entry(0x0FBF_0FFF, 0x010F_0000, ArmOp::StatusRead),
        entry(0x0FB0_FFF0, 0x0120_F000, ArmOp::StatusWrite),
        entry(0x0FB0_F000, 0x0320_F000, ArmOp::StatusWrite),
    ];

    for op in AluOp::ALL {
        let opcode = op.bits() << 21;
        entries.push(entry(0x0FE0_0000, 0x0200_0000 | opcode, ArmOp::DataProcessing(op)));
        entries.push(entry(0x0FE0_0010, opcode, ArmOp::DataProcessing(op)));
        entries.push(entry(0x0FE0_0090, 0x0000_0010 | opcode, ArmOp::DataProcessing(op)));
    }

    entries.extend([
        entry(0x0E00_0000, 0x0400_0000, ArmOp::SingleTransfer),
        entry(0x0E00_0010, 0x0600_0000, ArmOp::SingleTransfer),
        entry(0x0E00_0000, 0x0800_0000, ArmOp::BlockTransfer),
        entry(0x0F00_0000, 0x0A00_0000, ArmOp::Branch),
        entry(0x0F00_0000, 0x0B00_0000, ArmOp::BranchLink),
        entry(0x0F00_0000, 0x0F00_0000, ArmOp::SoftwareInterrupt),
    ]);

    entries
}

/// Ordered Thumb dispatch entries.
#[must_use]
pub fn thumb_dispatch_entries() -> Vec<DispatchEntry<ThumbOp>> {
    let mut entries = vec![
        entry(0xF800, 0x0000, ThumbOp::ShiftImmediate(ShiftKind::Lsl)),
        entry(0xF800, 0x0800, ThumbOp::ShiftImmediate(ShiftKind::Lsr)),
        entry(0xF800, 0x1000, ThumbOp::ShiftImmediate(ShiftKind::Asr)),
        entry(0xFE00, 0x1800, ThumbOp::AddRegister),
        entry(0xFE00, 0x1A00, ThumbOp::SubtractRegister),
        entry(0xFE00, 0x1C00, ThumbOp::AddImmediate3),
        entry(0xFE00, 0x1E00, ThumbOp::SubtractImmediate3),
        entry(0xF800, 0x2000, ThumbOp::MoveImmediate),
        entry(0xF800, 0x2800, ThumbOp::CompareImmediate),
        entry(0xF800, 0x3000, ThumbOp::AddImmediate8),
        entry(0xF800, 0x3800, ThumbOp::SubtractImmediate8),
    ];

    for (index, op) in (0u32..).zip(ThumbAluOp::ALL) {
        entries.push(entry(0xFFC0, 0x4000 | (index << 6), ThumbOp::Alu(op)));
    }

    entries.extend([
        entry(0xFF00, 0x4400, ThumbOp::HighAdd),
        entry(0xFF00, 0x4500, ThumbOp::HighCompare),
        entry(0xFF00, 0x4600, ThumbOp::HighMove),
        entry(0xFF80, 0x4700, ThumbOp::BranchExchange),
        v5te(0xFF80, 0x4780, ThumbOp::BranchLinkExchange),
        entry(0xF800, 0x4800, ThumbOp::LoadPcRelative),
    ]);

    for (index, kind) in (0u32..).zip(TransferKind::ALL) {
        entries.push(entry(0xFE00, 0x5000 | (index << 9), ThumbOp::TransferRegister(kind)));
    }

    entries.extend([
        entry(0xF800, 0x6000, ThumbOp::TransferImmediate(TransferKind::StoreWord)),
        entry(0xF800, 0x6800, ThumbOp::TransferImmediate(TransferKind::LoadWord)),
        entry(0xF800, 0x7000, ThumbOp::TransferImmediate(TransferKind::StoreByte)),
        entry(0xF800, 0x7800, ThumbOp::TransferImmediate(TransferKind::LoadByte)),
        entry(0xF800, 0x8000, ThumbOp::TransferImmediate(TransferKind::StoreHalf)),
        entry(0xF800, 0x8800, ThumbOp::TransferImmediate(TransferKind::LoadHalf)),
        entry(0xF800, 0x9000, ThumbOp::StoreSpRelative),
        entry(0xF800, 0x9800, ThumbOp::LoadSpRelative),
        entry(0xF800, 0xA000, ThumbOp::AddressFromPc),
        entry(0xF800, 0xA800, ThumbOp::AddressFromSp),
        entry(0xFF00, 0xB000, ThumbOp::AdjustSp),
        entry(0xFE00, 0xB400, ThumbOp::Push),
        entry(0xFE00, 0xBC00, ThumbOp::Pop),
        entry(0xF800, 0xC000, ThumbOp::StoreMultiple),
        entry(0xF800, 0xC800, ThumbOp::LoadMultiple),
        entry(0xFF00, 0xDF00, ThumbOp::SoftwareInterrupt),
    ]);

    // Condition 0xE is undefined and 0xF is SWI; neither is a branch.
    for condition in 0u32..0xE {
        entries.push(entry(0xFF00, 0xD000 | (condition << 8), ThumbOp::ConditionalBranch));
    }

    entries.extend([
        entry(0xF800, 0xE000, ThumbOp::Branch),
        v5te(0xF800, 0xE800, ThumbOp::LongBranchExchangeSuffix),
        entry(0xF800, 0xF000, ThumbOp::LongBranchPrefix),
        entry(0xF800, 0xF800, ThumbOp::LongBranchSuffix),
    ]);

    entries
}
