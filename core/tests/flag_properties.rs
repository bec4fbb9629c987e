use avrsim::Machine;

fn image(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// A reference model computed in 16-bit arithmetic, independent of the executor under
/// test, per the invariant in §8: "flags match a reference 8-bit model computed in
/// 16-bit arithmetic."
fn reference_add(d: u8, r: u8) -> (u8, bool, bool, bool, bool, bool, bool) {
    let wide = d as u16 + r as u16;
    let result = wide as u8;
    let h = ((d & 0x0F) + (r & 0x0F)) & 0x10 != 0;
    let c = wide & 0x100 != 0;
    let v = (d as i8).checked_add(r as i8).is_none();
    let n = result & 0x80 != 0;
    let z = result == 0;
    let s = n ^ v;
    (result, h, v, c, n, z, s)
}

fn reference_sub(d: u8, r: u8) -> (u8, bool, bool, bool, bool, bool, bool) {
    let result = d.wrapping_sub(r);
    let h = (d & 0x0F) < (r & 0x0F);
    let c = d < r;
    let v = (d as i8).checked_sub(r as i8).is_none();
    let n = result & 0x80 != 0;
    let z = result == 0;
    let s = n ^ v;
    (result, h, v, c, n, z, s)
}

fn run_add(d: u8, r: u8) -> (u8, avrsim::Sreg) {
    let mut m = Machine::new();
    m.load(&image(&[0b0000_11_0_00000_0001])); // ADD R0,R1
    m.memory.regs[0] = d;
    m.memory.regs[1] = r;
    m.cycle();
    (m.memory.regs[0], m.memory.sreg)
}

fn run_sub(d: u8, r: u8) -> (u8, avrsim::Sreg) {
    let mut m = Machine::new();
    m.load(&image(&[0b0001_10_0_00000_0001])); // SUB R0,R1
    m.memory.regs[0] = d;
    m.memory.regs[1] = r;
    m.cycle();
    (m.memory.regs[0], m.memory.sreg)
}

#[test]
fn add_matches_reference_model_across_sampled_operands() {
    for d in [0u8, 1, 0x0F, 0x10, 0x7F, 0x80, 0xFF, 0x55, 0xAA] {
        for r in [0u8, 1, 0x0F, 0x10, 0x7F, 0x80, 0xFF, 0x55, 0xAA] {
            let (expected, h, v, c, n, z, s) = reference_add(d, r);
            let (result, sreg) = run_add(d, r);
            assert_eq!(result, expected, "ADD {d:#04X}+{r:#04X}");
            assert_eq!(sreg.h(), h, "H flag for {d:#04X}+{r:#04X}");
            assert_eq!(sreg.v(), v, "V flag for {d:#04X}+{r:#04X}");
            assert_eq!(sreg.c(), c, "C flag for {d:#04X}+{r:#04X}");
            assert_eq!(sreg.n(), n, "N flag for {d:#04X}+{r:#04X}");
            assert_eq!(sreg.z(), z, "Z flag for {d:#04X}+{r:#04X}");
            assert_eq!(sreg.s(), s, "S flag for {d:#04X}+{r:#04X}");
        }
    }
}

#[test]
fn sub_matches_reference_model_across_sampled_operands() {
    for d in [0u8, 1, 0x0F, 0x10, 0x7F, 0x80, 0xFF, 0x55, 0xAA] {
        for r in [0u8, 1, 0x0F, 0x10, 0x7F, 0x80, 0xFF, 0x55, 0xAA] {
            let (expected, h, v, c, n, z, s) = reference_sub(d, r);
            let (result, sreg) = run_sub(d, r);
            assert_eq!(result, expected, "SUB {d:#04X}-{r:#04X}");
            assert_eq!(sreg.h(), h, "H flag for {d:#04X}-{r:#04X}");
            assert_eq!(sreg.v(), v, "V flag for {d:#04X}-{r:#04X}");
            assert_eq!(sreg.c(), c, "C flag for {d:#04X}-{r:#04X}");
            assert_eq!(sreg.n(), n, "N flag for {d:#04X}-{r:#04X}");
            assert_eq!(sreg.z(), z, "Z flag for {d:#04X}-{r:#04X}");
            assert_eq!(sreg.s(), s, "S flag for {d:#04X}-{r:#04X}");
        }
    }
}

#[test]
fn inc_sets_overflow_only_at_0x7f() {
    let mut m = Machine::new();
    m.load(&image(&[0b1001_010_00000_0011])); // INC R0
    m.memory.regs[0] = 0x7F;
    m.cycle();
    assert_eq!(m.memory.regs[0], 0x80);
    assert!(m.memory.sreg.v());
    assert!(m.memory.sreg.n());
}

#[test]
fn dec_sets_overflow_only_at_0x80() {
    let mut m = Machine::new();
    m.load(&image(&[0b1001_010_00000_1010])); // DEC R0
    m.memory.regs[0] = 0x80;
    m.cycle();
    assert_eq!(m.memory.regs[0], 0x7F);
    assert!(m.memory.sreg.v());
    assert!(!m.memory.sreg.n());
}

#[test]
fn com_always_sets_carry() {
    let mut m = Machine::new();
    m.load(&image(&[0b1001_010_00000_0000])); // COM R0
    m.memory.regs[0] = 0x00;
    m.cycle();
    assert_eq!(m.memory.regs[0], 0xFF);
    assert!(m.memory.sreg.c());
    assert!(!m.memory.sreg.v());
}
