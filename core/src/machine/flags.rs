//! Flag-computation formulas shared by every arithmetic/logic executor (§4.5, §8).
//!
//! These mirror the boolean expressions in the AVR instruction set reference: each
//! flag is derived from the *bit values* of the two operands and the result, not
//! from re-deriving the carry/borrow chain, so the same formula covers both the
//! no-carry-in and carry-in forms of an operation (ADD/ADC, SUB/SBC) as long as
//! `result` already reflects the carry-in.

use crate::memory::Sreg;

fn bit(byte: u8, n: u32) -> bool {
    (byte >> n) & 1 != 0
}

/// Flags for an addition `d + r (+ carry_in)` that already produced `result`.
pub fn add_flags(d: u8, r: u8, result: u8) -> Sreg {
    let (d3, r3, res3) = (bit(d, 3), bit(r, 3), bit(result, 3));
    let (d7, r7, res7) = (bit(d, 7), bit(r, 7), bit(result, 7));

    let h = (d3 && r3) || (r3 && !res3) || (!res3 && d3);
    let c = (d7 && r7) || (r7 && !res7) || (!res7 && d7);
    let v = (d7 && r7 && !res7) || (!d7 && !r7 && res7);
    let n = res7;
    let z = result == 0;
    let s = n ^ v;

    let mut sreg = Sreg(0);
    sreg.set_h(h);
    sreg.set_c(c);
    sreg.set_v(v);
    sreg.set_n(n);
    sreg.set_z(z);
    sreg.set_s(s);
    sreg
}

/// Flags for a subtraction `d - r (- borrow_in)` that already produced `result`.
pub fn sub_flags(d: u8, r: u8, result: u8) -> Sreg {
    let (d3, r3, res3) = (bit(d, 3), bit(r, 3), bit(result, 3));
    let (d7, r7, res7) = (bit(d, 7), bit(r, 7), bit(result, 7));

    let h = (!d3 && r3) || (r3 && res3) || (res3 && !d3);
    let c = (!d7 && r7) || (r7 && res7) || (res7 && !d7);
    let v = (d7 && !r7 && !res7) || (!d7 && r7 && res7);
    let n = res7;
    let z = result == 0;
    let s = n ^ v;

    let mut sreg = Sreg(0);
    sreg.set_h(h);
    sreg.set_c(c);
    sreg.set_v(v);
    sreg.set_n(n);
    sreg.set_z(z);
    sreg.set_s(s);
    sreg
}

/// Flags for a bitwise-logical result: V is always cleared, C is preserved by the
/// caller (not touched here).
pub fn logic_flags(result: u8) -> (bool, bool, bool, bool) {
    let n = bit(result, 7);
    let z = result == 0;
    let v = false;
    let s = n ^ v;
    (n, z, v, s)
}
