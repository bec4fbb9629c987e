use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use avrsim::{Machine, NullPeripheral};

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let path = parse_args()?;

    let mut machine =
        Machine::from_image_file(&path).with_context(|| format!("loading {}", path.display()))?;
    machine.run_until_halt();
    dump_state(&mut machine);

    Ok(())
}

fn parse_args() -> anyhow::Result<PathBuf> {
    let mut args = std::env::args_os().skip(1);
    let path = args
        .next()
        .context("usage: avrsim <program-image>")?
        .into();

    if args.next().is_some() {
        anyhow::bail!("usage: avrsim <program-image>");
    }

    Ok(path)
}

/// Dumps every architectural register plus the live stack bytes (§6). No particular
/// layout is required, only that everything listed is present.
fn dump_state(machine: &mut Machine) {
    let regs = machine.memory.regs;
    for (i, chunk) in regs.chunks(8).enumerate() {
        let line: Vec<String> = chunk
            .iter()
            .enumerate()
            .map(|(j, v)| format!("R{:<2}={v:#04X}", i * 8 + j))
            .collect();
        println!("{}", line.join(" "));
    }

    let pair = |lo: usize, hi: usize| u16::from_le_bytes([regs[lo], regs[hi]]);
    println!(
        "X={:#06X} Y={:#06X} Z={:#06X}",
        pair(26, 27),
        pair(28, 29),
        pair(30, 31)
    );
    println!("PC={:#06X} SP={:#06X}", machine.pc, machine.memory.sp());
    println!("SREG={:#04X}", machine.memory.sreg.0);

    let sp = machine.memory.sp();
    let mut peripheral = NullPeripheral;
    print!("stack:");
    for offset in 1..=16u16 {
        let addr = sp.wrapping_add(offset);
        let byte = machine.memory.data_get(addr, &mut peripheral);
        print!(" {byte:#04X}");
    }
    println!();
}
