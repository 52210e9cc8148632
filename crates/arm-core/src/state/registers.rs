use crate::snapshot::{Persist, SnapshotError, StateReader, StateWriter};

/// Number of architecturally visible general-purpose registers (`R0..R15`).
pub const GENERAL_REGISTER_COUNT: usize = 16;
/// Stack pointer index.
pub const REG_SP: usize = 13;
/// Link register index.
pub const REG_LR: usize = 14;
/// Program counter index.
pub const REG_PC: usize = 15;

/// `CPSR` negative flag.
pub const PSR_N: u32 = 1 << 31;
/// `CPSR` zero flag.
pub const PSR_Z: u32 = 1 << 30;
/// `CPSR` carry/not-borrow flag.
pub const PSR_C: u32 = 1 << 29;
/// `CPSR` signed overflow flag.
pub const PSR_V: u32 = 1 << 28;
/// `CPSR` sticky saturation flag (ARMv5TE).
pub const PSR_Q: u32 = 1 << 27;
/// `CPSR` interrupt-disable bit.
pub const PSR_I: u32 = 1 << 7;
/// `CPSR` fast-interrupt-disable bit.
pub const PSR_F: u32 = 1 << 6;
/// `CPSR` Thumb-state bit.
pub const PSR_T: u32 = 1 << 5;
/// `CPSR` mode field.
pub const PSR_MODE_MASK: u32 = 0x1F;
/// Mode-field bit that is always set on ARMv4 and later.
pub const PSR_MODE_REQUIRED: u32 = 0x10;

/// Number of distinct shadow register sets.
pub const BANK_COUNT: usize = 6;

const BANK_USER: usize = 0;
const BANK_FIQ: usize = 1;
const BANK_SUPERVISOR: usize = 2;
const BANK_ABORT: usize = 3;
const BANK_IRQ: usize = 4;
const BANK_UNDEFINED: usize = 5;

/// Processor operating mode, stored in the low five bits of `CPSR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum Mode {
    /// Unprivileged application mode.
    User = 0x10,
    /// Fast interrupt handler mode.
    FastInterrupt = 0x11,
    /// Interrupt handler mode.
    Interrupt = 0x12,
    /// Supervisor (reset and `SWI`) mode.
    Supervisor = 0x13,
    /// Memory abort mode.
    Abort = 0x17,
    /// Undefined-instruction mode.
    Undefined = 0x1B,
    /// Privileged mode sharing the User register set.
    System = 0x1F,
}

impl Mode {
    /// Every architectural mode.
    pub const ALL: [Self; 7] = [
        Self::User,
        Self::FastInterrupt,
        Self::Interrupt,
        Self::Supervisor,
        Self::Abort,
        Self::Undefined,
        Self::System,
    ];

    /// Decodes a 5-bit mode field.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits & PSR_MODE_MASK {
            0x10 => Some(Self::User),
            0x11 => Some(Self::FastInterrupt),
            0x12 => Some(Self::Interrupt),
            0x13 => Some(Self::Supervisor),
            0x17 => Some(Self::Abort),
            0x1B => Some(Self::Undefined),
            0x1F => Some(Self::System),
            _ => None,
        }
    }

    /// Returns the 5-bit mode field value.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Returns true for modes that own a saved status register.
    #[must_use]
    pub const fn has_spsr(self) -> bool {
        !matches!(self, Self::User | Self::System)
    }

    /// Returns true for every mode except User.
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        !matches!(self, Self::User)
    }

    const fn bank(self) -> usize {
        match self {
            Self::User | Self::System => BANK_USER,
            Self::FastInterrupt => BANK_FIQ,
            Self::Interrupt => BANK_IRQ,
            Self::Supervisor => BANK_SUPERVISOR,
            Self::Abort => BANK_ABORT,
            Self::Undefined => BANK_UNDEFINED,
        }
    }
}

// Unassigned mode encodings fall back to the User set.
const fn bank_for_bits(bits: u32) -> usize {
    match Mode::from_bits(bits) {
        Some(mode) => mode.bank(),
        None => BANK_USER,
    }
}

/// Architectural exceptions and their entry parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exception {
    /// Reset.
    Reset,
    /// Undefined instruction.
    Undefined,
    /// `SWI` instruction.
    SoftwareInterrupt,
    /// Instruction fetch abort.
    PrefetchAbort,
    /// Data access abort.
    DataAbort,
    /// Interrupt line.
    Interrupt,
    /// Fast interrupt line.
    FastInterrupt,
}

impl Exception {
    /// Vector address the exception jumps to.
    #[must_use]
    pub const fn vector(self) -> u32 {
        match self {
            Self::Reset => 0x00,
            Self::Undefined => 0x04,
            Self::SoftwareInterrupt => 0x08,
            Self::PrefetchAbort => 0x0C,
            Self::DataAbort => 0x10,
            Self::Interrupt => 0x18,
            Self::FastInterrupt => 0x1C,
        }
    }

    /// Mode entered by the exception.
    #[must_use]
    pub const fn mode(self) -> Mode {
        match self {
            Self::Reset | Self::SoftwareInterrupt => Mode::Supervisor,
            Self::Undefined => Mode::Undefined,
            Self::PrefetchAbort | Self::DataAbort => Mode::Abort,
            Self::Interrupt => Mode::Interrupt,
            Self::FastInterrupt => Mode::FastInterrupt,
        }
    }

    /// Value added to the next-instruction address to form the saved `LR`.
    #[must_use]
    pub const fn return_offset(self) -> u32 {
        match self {
            Self::Reset | Self::Undefined | Self::SoftwareInterrupt => 0,
            Self::PrefetchAbort | Self::DataAbort | Self::Interrupt | Self::FastInterrupt => 4,
        }
    }

    const fn masks_fast_interrupts(self) -> bool {
        matches!(self, Self::Reset | Self::FastInterrupt)
    }
}

/// Full register file: visible registers, status registers and shadows.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Registers {
    gpr: [u32; GENERAL_REGISTER_COUNT],
    cpsr: u32,
    spsr: u32,
    next_pc: u32,
    /// `R8..R12`: slot 0 is shared by all non-FIQ modes, slot 1 is FIQ-private.
    banked_high: [[u32; 5]; 2],
    banked_sp_lr: [[u32; 2]; BANK_COUNT],
    banked_spsr: [u32; BANK_COUNT],
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            gpr: [0; GENERAL_REGISTER_COUNT],
            cpsr: Mode::Supervisor.bits() | PSR_I | PSR_F,
            spsr: 0,
            next_pc: 0,
            banked_high: [[0; 5]; 2],
            banked_sp_lr: [[0; 2]; BANK_COUNT],
            banked_spsr: [0; BANK_COUNT],
        }
    }
}

impl Registers {
    /// Creates a register file in the given mode, interrupts masked,
    /// about to execute `entry_point` in ARM state.
    #[must_use]
    pub fn with_entry(entry_point: u32, mode: Mode) -> Self {
        let mut regs = Self::default();
        regs.set_cpsr(mode.bits() | PSR_I | PSR_F);
        regs.set_pc(entry_point);
        regs
    }

    /// Reads a general-purpose register.
    ///
    /// # Panics
    ///
    /// Panics when `index` is greater than 15.
    #[must_use]
    pub const fn reg(&self, index: usize) -> u32 {
        self.gpr[index]
    }

    /// Writes a general-purpose register; index 15 goes through [`Self::set_pc`].
    ///
    /// # Panics
    ///
    /// Panics when `index` is greater than 15.
    pub fn set_reg(&mut self, index: usize, value: u32) {
        if index == REG_PC {
            self.set_pc(value);
        } else {
            self.gpr[index] = value;
        }
    }

    /// Reads `R15` (next instruction address plus pipeline offset).
    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.gpr[REG_PC]
    }

    /// Branches to `target`, clearing the alignment bits of the active state.
    pub fn set_pc(&mut self, target: u32) {
        let aligned = if self.thumb() {
            target & !1
        } else {
            target & !3
        };
        self.next_pc = aligned;
        self.gpr[REG_PC] = aligned;
    }

    /// Address the next fetch will read from.
    #[must_use]
    pub const fn next_pc(&self) -> u32 {
        self.next_pc
    }

    /// Consumes one fetch slot: returns the fetch address, advances the
    /// next-instruction address and exposes the prefetch offset in `R15`.
    pub(crate) const fn begin_fetch(&mut self, unit: u32) -> u32 {
        let address = self.next_pc;
        self.next_pc = address.wrapping_add(unit);
        self.gpr[REG_PC] = address.wrapping_add(unit * 2);
        address
    }

    /// Reads `CPSR`.
    #[must_use]
    pub const fn cpsr(&self) -> u32 {
        self.cpsr
    }

    /// Writes `CPSR`, banking registers when the mode field changes.
    pub fn set_cpsr(&mut self, value: u32) {
        let value = value | PSR_MODE_REQUIRED;
        let outgoing = self.cpsr & PSR_MODE_MASK;
        let incoming = value & PSR_MODE_MASK;
        if outgoing != incoming {
            self.switch_bank(bank_for_bits(outgoing), bank_for_bits(incoming));
            tracing::debug!(from = outgoing, to = incoming, "mode switch");
        }
        self.cpsr = value;
    }

    /// Reads the live `SPSR`.
    #[must_use]
    pub const fn spsr(&self) -> u32 {
        self.spsr
    }

    /// Writes the live `SPSR`.
    pub const fn set_spsr(&mut self, value: u32) {
        self.spsr = value;
    }

    /// Decodes the active mode, `None` for unassigned encodings.
    #[must_use]
    pub const fn mode(&self) -> Option<Mode> {
        Mode::from_bits(self.cpsr)
    }

    /// Returns true when the active mode owns an `SPSR`.
    #[must_use]
    pub const fn has_spsr(&self) -> bool {
        match self.mode() {
            Some(mode) => mode.has_spsr(),
            None => false,
        }
    }

    /// Returns true when `CPSR` has any of the bits in `mask` set.
    #[must_use]
    pub const fn flag(&self, mask: u32) -> bool {
        self.cpsr & mask != 0
    }

    /// Sets or clears the `CPSR` bits in `mask` without touching the mode.
    pub const fn set_flag(&mut self, mask: u32, enabled: bool) {
        if enabled {
            self.cpsr |= mask & !PSR_MODE_MASK;
        } else {
            self.cpsr &= !(mask & !PSR_MODE_MASK);
        }
    }

    /// Updates `N` and `Z` from a result.
    pub const fn set_nz(&mut self, result: u32) {
        self.set_flag(PSR_N, result & 0x8000_0000 != 0);
        self.set_flag(PSR_Z, result == 0);
    }

    /// Updates all four condition flags.
    pub const fn set_nzcv(&mut self, result: u32, carry: bool, overflow: bool) {
        self.set_nz(result);
        self.set_flag(PSR_C, carry);
        self.set_flag(PSR_V, overflow);
    }

    /// Returns true when the Thumb state bit is set.
    #[must_use]
    pub const fn thumb(&self) -> bool {
        self.flag(PSR_T)
    }

    /// Returns true when `IRQ` is masked.
    #[must_use]
    pub const fn irq_disabled(&self) -> bool {
        self.flag(PSR_I)
    }

    /// Reads a register through the User-mode view regardless of the active mode.
    ///
    /// # Panics
    ///
    /// Panics when `index` is greater than 15.
    #[must_use]
    pub const fn user_reg(&self, index: usize) -> u32 {
        let bank = bank_for_bits(self.cpsr);
        match index {
            8..=12 if bank == BANK_FIQ => self.banked_high[0][index - 8],
            13 | 14 if bank != BANK_USER => self.banked_sp_lr[BANK_USER][index - 13],
            _ => self.gpr[index],
        }
    }

    /// Writes a register through the User-mode view regardless of the active mode.
    ///
    /// # Panics
    ///
    /// Panics when `index` is greater than 15.
    pub fn set_user_reg(&mut self, index: usize, value: u32) {
        let bank = bank_for_bits(self.cpsr);
        match index {
            8..=12 if bank == BANK_FIQ => self.banked_high[0][index - 8] = value,
            13 | 14 if bank != BANK_USER => self.banked_sp_lr[BANK_USER][index - 13] = value,
            _ => self.set_reg(index, value),
        }
    }

    /// Copies `SPSR` into `CPSR` (exception return).
    ///
    /// Returns false, leaving `CPSR` untouched, in modes without an `SPSR`.
    pub fn restore_cpsr(&mut self) -> bool {
        if !self.has_spsr() {
            tracing::warn!(cpsr = self.cpsr, "exception return without an spsr");
            return false;
        }
        self.set_cpsr(self.spsr);
        tracing::debug!(cpsr = self.cpsr, "exception return");
        true
    }

    /// Performs architectural exception entry.
    pub fn enter_exception(&mut self, exception: Exception) {
        let saved = self.cpsr;
        let link = self.next_pc.wrapping_add(exception.return_offset());
        let mut cpsr = (saved & !(PSR_MODE_MASK | PSR_T)) | exception.mode().bits() | PSR_I;
        if exception.masks_fast_interrupts() {
            cpsr |= PSR_F;
        }
        self.set_cpsr(cpsr);
        self.spsr = saved;
        self.gpr[REG_LR] = link;
        self.set_pc(exception.vector());
        tracing::debug!(?exception, link, "exception entry");
    }

    fn switch_bank(&mut self, from: usize, to: usize) {
        let from_high = usize::from(from == BANK_FIQ);
        let to_high = usize::from(to == BANK_FIQ);

        self.banked_high[from_high].copy_from_slice(&self.gpr[8..13]);
        self.banked_sp_lr[from] = [self.gpr[REG_SP], self.gpr[REG_LR]];
        self.banked_spsr[from] = self.spsr;

        self.gpr[8..13].copy_from_slice(&self.banked_high[to_high]);
        [self.gpr[REG_SP], self.gpr[REG_LR]] = self.banked_sp_lr[to];
        self.spsr = self.banked_spsr[to];
    }
}

impl Persist for Registers {
    fn save_state(&self, writer: &mut StateWriter) {
        writer.write_all(&self.gpr);
        writer.write(self.cpsr);
        writer.write(self.spsr);
        writer.write(self.next_pc);
        for set in &self.banked_high {
            writer.write_all(set);
        }
        for pair in &self.banked_sp_lr {
            writer.write_all(pair);
        }
        writer.write_all(&self.banked_spsr);
    }

    fn load_state(&mut self, reader: &mut StateReader<'_>) -> Result<(), SnapshotError> {
        reader.read_into(&mut self.gpr)?;
        self.cpsr = reader.read()?;
        self.spsr = reader.read()?;
        self.next_pc = reader.read()?;
        for set in &mut self.banked_high {
            reader.read_into(set)?;
        }
        for pair in &mut self.banked_sp_lr {
            reader.read_into(pair)?;
        }
        reader.read_into(&mut self.banked_spsr)
    }
}
