/// Instruction forms and penalties that have fixed cycle costs in the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleCostKind {
    /// ARM instruction whose condition failed.
    ConditionFailed,
    /// Data-processing or Thumb ALU operation.
    DataProcessing,
    /// Extra internal cycle for a register-specified shift amount.
    RegisterShift,
    /// Extra refill cycles whenever an instruction writes PC.
    PipelineRefill,
    /// `MUL` base cost before the multiplier term.
    Multiply,
    /// `MLA` base cost before the multiplier term.
    MultiplyAccumulate,
    /// `UMULL`/`SMULL` base cost before the multiplier term.
    MultiplyLong,
    /// `UMLAL`/`SMLAL` base cost before the multiplier term.
    MultiplyAccumulateLong,
    /// Single load of byte, half-word or word.
    Load,
    /// Single store of byte, half-word or word.
    Store,
    /// Block load base cost before the per-register term.
    BlockLoad,
    /// Block store base cost before the per-register term.
    BlockStore,
    /// `B`, `BL`, `BX`, `BLX` and taken Thumb branches.
    Branch,
    /// First half of the Thumb long branch with link.
    LongBranchPrefix,
    /// `MRS`/`MSR`.
    StatusTransfer,
    /// `SWP`/`SWPB`.
    Swap,
    /// Architectural `SWI` entry performed by the default bus handler.
    SoftwareInterrupt,
    /// `CLZ`.
    CountLeadingZeros,
    /// `QADD`, `QSUB`, `QDADD`, `QDSUB`.
    SaturatingArithmetic,
}

impl CycleCostKind {
    /// Every cost kind, in table order.
    pub const ALL: [Self; 19] = [
        Self::ConditionFailed,
        Self::DataProcessing,
        Self::RegisterShift,
        Self::PipelineRefill,
        Self::Multiply,
        Self::MultiplyAccumulate,
        Self::MultiplyLong,
        Self::MultiplyAccumulateLong,
        Self::Load,
        Self::Store,
        Self::BlockLoad,
        Self::BlockStore,
        Self::Branch,
        Self::LongBranchPrefix,
        Self::StatusTransfer,
        Self::Swap,
        Self::SoftwareInterrupt,
        Self::CountLeadingZeros,
        Self::SaturatingArithmetic,
    ];
}

/// Single source-of-truth cycle-cost table for fixed-cost forms.
pub const CYCLE_COST_TABLE: &[(CycleCostKind, u32)] = &[
    (CycleCostKind::ConditionFailed, 1),
    (CycleCostKind::DataProcessing, 1),
    (CycleCostKind::RegisterShift, 1),
    (CycleCostKind::PipelineRefill, 2),
    (CycleCostKind::Multiply, 1),
    (CycleCostKind::MultiplyAccumulate, 2),
    (CycleCostKind::MultiplyLong, 2),
    (CycleCostKind::MultiplyAccumulateLong, 3),
    (CycleCostKind::Load, 3),
    (CycleCostKind::Store, 2),
    (CycleCostKind::BlockLoad, 2),
    (CycleCostKind::BlockStore, 1),
    (CycleCostKind::Branch, 3),
    (CycleCostKind::LongBranchPrefix, 1),
    (CycleCostKind::StatusTransfer, 1),
    (CycleCostKind::Swap, 4),
    (CycleCostKind::SoftwareInterrupt, 3),
    (CycleCostKind::CountLeadingZeros, 1),
    (CycleCostKind::SaturatingArithmetic, 1),
];

/// Looks up the cycle cost for a cycle-cost kind.
#[must_use]
pub fn cycle_cost(kind: CycleCostKind) -> u32 {
    CYCLE_COST_TABLE
        .iter()
        .find_map(|(entry_kind, cycles)| (*entry_kind == kind).then_some(*cycles))
        .unwrap_or(1)
}

/// Number of significant bytes in a multiplier operand (`1..=4`).
///
/// Signed forms also terminate early on leading ones.
#[must_use]
pub const fn multiplier_bytes(operand: u32, signed: bool) -> u32 {
    let mut bytes = 1;
    while bytes < 4 {
        let upper = operand >> (bytes * 8);
        let all_ones = u32::MAX >> (bytes * 8);
        if upper == 0 || (signed && upper == all_ones) {
            break;
        }
        bytes += 1;
    }
    bytes
}

/// Cost of a multiply: the variant's fixed base plus the wider of the two
/// multiplicands' significant-byte counts.
#[must_use]
pub fn multiply_cycles(base: CycleCostKind, lhs: u32, rhs: u32, signed: bool) -> u32 {
    let bytes = multiplier_bytes(lhs, signed).max(multiplier_bytes(rhs, signed));
    cycle_cost(base) + bytes
}

/// Cost of a block transfer of `count` registers.
#[must_use]
pub fn block_transfer_cycles(load: bool, count: u32, pc_loaded: bool) -> u32 {
    if load {
        let refill = if pc_loaded {
            cycle_cost(CycleCostKind::PipelineRefill)
        } else {
            0
        };
        cycle_cost(CycleCostKind::BlockLoad) + count + refill
    } else {
        cycle_cost(CycleCostKind::BlockStore) + count
    }
}
