use avrsim::Machine;

/// Assembles a little-endian FLASH image from raw 16-bit opcodes.
fn image(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

#[test]
fn lpm_little_endian() {
    // LPM R10,Z+ ; LPM R11,Z+
    let mut m = Machine::new();
    m.load(&image(&[0b1001_000_01010_0101, 0b1001_000_01011_0101]));
    m.memory.regs[30] = 0x00;
    m.memory.regs[31] = 0x04; // Z = 1024
    m.memory.set_prog_word(512, 0x4433);

    m.cycle();
    m.cycle();

    assert_eq!(m.memory.regs[10], 0x33);
    assert_eq!(m.memory.regs[11], 0x44);
    let z = u16::from_le_bytes([m.memory.regs[30], m.memory.regs[31]]);
    assert_eq!(z, 1026);
    assert_eq!(m.pc, 2);
}

#[test]
fn rjmp_halt_terminates_after_one_cycle() {
    // RJMP .-0 at address 0: k = -1 relative to the post-increment PC of 1.
    let mut m = Machine::new();
    m.load(&image(&[0b1100_1111_1111_1111]));
    m.run_until_halt();
    assert_eq!(m.pc, 0);
}

#[test]
fn add_flags() {
    // ADD R0,R1
    let mut m = Machine::new();
    m.load(&image(&[0b0000_11_0_00000_0001]));
    m.memory.regs[0] = 0x7F;
    m.memory.regs[1] = 0x01;

    m.cycle();

    assert_eq!(m.memory.regs[0], 0x80);
    let s = m.memory.sreg;
    assert!(s.h());
    assert!(s.v());
    assert!(s.n());
    assert!(!s.z());
    assert!(!s.c());
    assert_eq!(s.s(), s.n() ^ s.v());
    assert!(!s.s());
}

#[test]
fn sbc_zero_preservation() {
    // SBC R0,R1
    let mut m = Machine::new();
    m.load(&image(&[0b0000_10_0_00000_0001]));
    m.memory.regs[0] = 0x10;
    m.memory.regs[1] = 0x10;
    m.memory.sreg.set_c(true);
    m.memory.sreg.set_z(true);

    m.cycle();

    assert_eq!(m.memory.regs[0], 0xFF);
    assert!(!m.memory.sreg.z());
}

#[test]
fn skip_two_word_consumes_both_words() {
    // CPSE R0,R0 ; LDS R1,0x0060 ; NOP
    let mut m = Machine::new();
    m.load(&image(&[
        0b0001_00_0_00000_0000,
        0b1001_000_00001_0000,
        0x0060,
        0b0000_0000_0000_0000,
    ]));
    m.memory.regs[0] = 0;
    m.memory.data_set(0x0060, 0xAB, &mut avrsim::NullPeripheral);
    m.memory.regs[1] = 0;

    m.cycle(); // CPSE sets skip
    m.cycle(); // LDS is skipped, consumes both its words
    m.cycle(); // NOP

    assert_eq!(m.memory.regs[1], 0);
    assert_eq!(m.pc, 4);
}

#[test]
fn stack_push_pop_round_trip() {
    // LDI R16,0xDE ; PUSH R16 ; LDI R16,0x00 ; POP R17
    let mut m = Machine::new();
    m.load(&image(&[
        0b1110_1101_0000_1110,
        0b1001_001_10000_1111,
        0b1110_0000_0000_0000,
        0b1001_000_10001_1111,
    ]));
    let sp_before = m.memory.sp();

    for _ in 0..4 {
        m.cycle();
    }

    assert_eq!(m.memory.regs[17], 0xDE);
    assert_eq!(m.memory.sp(), sp_before);
}
