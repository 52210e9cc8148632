//! Arithmetic with flag outputs shared by ARM and Thumb handlers.

/// Result of an adder pass with its carry and signed-overflow outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluOutput {
    /// 32-bit result.
    pub value: u32,
    /// Carry out (not-borrow for subtraction).
    pub carry: bool,
    /// Signed overflow.
    pub overflow: bool,
}

/// `a + b + carry_in`.
#[must_use]
pub const fn add_with_carry(a: u32, b: u32, carry_in: bool) -> AluOutput {
    let wide = a as u64 + b as u64 + carry_in as u64;
    let value = wide as u32;
    AluOutput {
        value,
        carry: wide > u32::MAX as u64,
        overflow: (!(a ^ b) & (a ^ value)) & 0x8000_0000 != 0,
    }
}

/// `a - b - !carry_in`; carry reports "no borrow".
#[must_use]
pub const fn sub_with_carry(a: u32, b: u32, carry_in: bool) -> AluOutput {
    add_with_carry(a, !b, carry_in)
}

/// Clamps a wide signed result to `i32`, reporting whether it saturated.
#[must_use]
pub const fn saturate(value: i64) -> (i32, bool) {
    if value > i32::MAX as i64 {
        (i32::MAX, true)
    } else if value < i32::MIN as i64 {
        (i32::MIN, true)
    } else {
        (value as i32, false)
    }
}
