use std::{collections::BTreeMap, fs::File, io::Write};

use anyhow::{bail, Result};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use serde::{Deserialize, Serialize};

fn main() -> Result<()> {
    // Regenerate if `instructions.json` changes
    println!("cargo:rerun-if-changed=instructions.json");
    println!("cargo:rerun-if-changed=src/fields.rs");

    let mut instructions: Vec<Instruction> =
        serde_json::from_slice(include_bytes!("./instructions.json"))?;

    for instr in &mut instructions {
        instr.validate()?;
    }

    check_for_collisions(&instructions)?;

    // Most-specific (most fixed bits) pattern first, so a linear decision list
    // implements longest-specific-match dispatch correctly.
    instructions.sort_by(|a, b| b.mask().count_ones().cmp(&a.mask().count_ones()));

    let syn_file = build_decoder_file(&instructions)?;
    let mut file = File::create("./src/decode.rs")?;

    write!(file, "{}", prettyplease::unparse(&syn_file))?;

    Ok(())
}

fn build_decoder_file(instructions: &[Instruction]) -> Result<syn::File> {
    Ok(syn::File {
        shebang: None,
        attrs: vec![],
        items: vec![
            syn::parse2(build_enum(instructions))?,
            syn::parse2(build_decode_fn(instructions))?,
            syn::parse2(build_display(instructions))?,
        ],
    })
}

fn build_enum(instructions: &[Instruction]) -> TokenStream {
    let variants = instructions.iter().map(|instr| {
        let id = format_ident!("{}", instr.name);

        if instr.fields.is_empty() {
            quote! { #id }
        } else {
            let members = instr.fields.iter().map(|(letter, kind)| {
                let field = field_ident(letter);
                let ty = kind.rust_type();
                quote! { #field: #ty }
            });
            quote! { #id { #(#members),* } }
        }
    });

    quote! {
        /// A decoded instruction, together with its operands.
        ///
        /// `Unknown` models an opcode with no matching pattern; the cycle driver
        /// treats it as a no-op.
        #[allow(non_camel_case_types)]
        #[derive(Clone, Copy, Debug, Eq, PartialEq)]
        pub enum Instr {
            #(#variants),*,
            Unknown { op: u16 },
        }
    }
}

fn build_decode_fn(instructions: &[Instruction]) -> TokenStream {
    let arms = instructions.iter().map(|instr| {
        let id = format_ident!("{}", instr.name);
        let mask = instr.mask();
        let value = instr.value();

        let construct = if instr.fields.is_empty() {
            quote! { Instr::#id }
        } else {
            let members = instr.fields.iter().map(|(letter, kind)| {
                let field = field_ident(letter);
                let positions = instr.positions_for(letter);
                let extraction = quote! { crate::fields::extract(op, &[#(#positions),*]) };

                let value_expr = match kind {
                    FieldKind::Reg5 | FieldKind::Bit3 | FieldKind::Sreg3 | FieldKind::Io5
                    | FieldKind::Io6 | FieldKind::Disp6 | FieldKind::Imm8 => {
                        quote! { (#extraction) as u8 }
                    }
                    FieldKind::Reg16 => quote! { (#extraction) as u8 + 16 },
                    FieldKind::RegPair => quote! { (#extraction) as u8 * 2 },
                    FieldKind::Signed7 => {
                        quote! { crate::fields::sign_extend(#extraction, 7) as i8 }
                    }
                    FieldKind::Signed12 => {
                        quote! { crate::fields::sign_extend(#extraction, 12) as i16 }
                    }
                };

                quote! { #field: #value_expr }
            });
            quote! { Instr::#id { #(#members),* } }
        };

        quote! {
            if (op & #mask) == #value {
                return #construct;
            }
        }
    });

    quote! {
        /// Decode a 16-bit opcode via longest-specific-match: patterns are tried in
        /// order of decreasing mask specificity, so a more specific pattern always
        /// wins over a more general one it overlaps with. Collisions between patterns
        /// of *equal* specificity are rejected at generation time, not here.
        pub fn decode(op: u16) -> Instr {
            #(#arms)*

            Instr::Unknown { op }
        }
    }
}

fn build_display(instructions: &[Instruction]) -> TokenStream {
    let arms = instructions.iter().map(|instr| {
        let id = format_ident!("{}", instr.name);
        let mnemonic = &instr.mnemonic;

        if instr.fields.is_empty() {
            quote! { Self::#id => write!(f, #mnemonic) }
        } else {
            quote! { Self::#id { .. } => write!(f, #mnemonic) }
        }
    });

    quote! {
        impl std::fmt::Display for Instr {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    #(#arms),*,
                    Self::Unknown { op } => write!(f, "UNKNOWN({op:#06X})"),
                }
            }
        }
    }
}

/// Every pattern must be collision-free: for no 16-bit opcode may two patterns of
/// *equal* mask specificity both match. Unequal specificity is fine (the more
/// specific one wins), which is exactly what lets e.g. `LD Rd,Z` coexist with the
/// more general `LDD Rd,Z+q` pattern it's a special case of.
fn check_for_collisions(instructions: &[Instruction]) -> Result<()> {
    let mut by_specificity: BTreeMap<u32, Vec<(u16, u16)>> = BTreeMap::new();
    for instr in instructions {
        by_specificity
            .entry(instr.mask().count_ones())
            .or_default()
            .push((instr.mask(), instr.value()));
    }

    for op in 0u32..=0xFFFF {
        let op = op as u16;
        let mut max_specificity = None;
        let mut winners = Vec::new();

        for instr in instructions {
            if (op & instr.mask()) == instr.value() {
                let specificity = instr.mask().count_ones();
                match max_specificity {
                    Some(m) if specificity < m => continue,
                    Some(m) if specificity == m => winners.push(instr),
                    _ => {
                        max_specificity = Some(specificity);
                        winners = vec![instr];
                    }
                }
            }
        }

        if winners.len() > 1 {
            let names: Vec<_> = winners.iter().map(|i| i.name.as_str()).collect();
            bail!(
                "decoder collision at opcode {op:#06X}: patterns {} are equally specific",
                names.join(", ")
            );
        }
    }

    Ok(())
}

fn field_ident(letter: &str) -> proc_macro2::Ident {
    format_ident!("{}", letter.to_lowercase())
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
struct Instruction {
    name: String,
    mnemonic: String,
    pattern: String,
    fields: BTreeMap<String, FieldKind>,
}

impl Instruction {
    fn validate(&mut self) -> Result<()> {
        if self.pattern.chars().count() != 16 {
            bail!(
                "instruction {}: pattern must be 16 characters, got {}",
                self.name,
                self.pattern.len()
            );
        }

        let letters: std::collections::BTreeSet<String> = self
            .pattern
            .chars()
            .filter(|c| *c != '0' && *c != '1')
            .map(|c| c.to_string())
            .collect();
        let declared: std::collections::BTreeSet<String> = self.fields.keys().cloned().collect();

        if letters != declared {
            bail!(
                "instruction {}: pattern field letters {letters:?} don't match declared fields {declared:?}",
                self.name
            );
        }

        Ok(())
    }

    /// Positions (bit 15 = leftmost) of every occurrence of `letter`, in the order
    /// encountered scanning the pattern left to right. Since position decreases as
    /// the scan proceeds, this order is exactly MSB-first.
    fn positions_for(&self, letter: &str) -> Vec<u8> {
        let letter = letter.chars().next().unwrap();
        self.pattern
            .chars()
            .enumerate()
            .filter(|(_, c)| *c == letter)
            .map(|(i, _)| (15 - i) as u8)
            .collect()
    }

    fn mask(&self) -> u16 {
        self.pattern.chars().enumerate().fold(0u16, |acc, (i, c)| {
            let bit = 15 - i;
            if c == '0' || c == '1' {
                acc | (1 << bit)
            } else {
                acc
            }
        })
    }

    fn value(&self) -> u16 {
        self.pattern.chars().enumerate().fold(0u16, |acc, (i, c)| {
            let bit = 15 - i;
            if c == '1' {
                acc | (1 << bit)
            } else {
                acc
            }
        })
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
enum FieldKind {
    /// Plain 5-bit register index, 0..=31.
    #[serde(rename = "reg5")]
    Reg5,
    /// 4-bit register index biased into 16..=31 (LDI/SUBI/ANDI/ORI/SBCI/CPI family).
    #[serde(rename = "reg16")]
    Reg16,
    /// 4-bit paired-register base index, doubled (MOVW).
    #[serde(rename = "regpair")]
    RegPair,
    /// 8-bit unsigned immediate.
    #[serde(rename = "imm8")]
    Imm8,
    /// 6-bit unsigned displacement (LDD/STD).
    #[serde(rename = "disp6")]
    Disp6,
    /// 5-bit I/O address (SBI/CBI/SBIC/SBIS).
    #[serde(rename = "io5")]
    Io5,
    /// 6-bit I/O address (IN/OUT).
    #[serde(rename = "io6")]
    Io6,
    /// 3-bit bit index within a byte.
    #[serde(rename = "bit3")]
    Bit3,
    /// 3-bit SREG flag index.
    #[serde(rename = "sreg3")]
    Sreg3,
    /// 7-bit signed PC-relative word offset (BRBS/BRBC).
    #[serde(rename = "signed7")]
    Signed7,
    /// 12-bit signed PC-relative word offset (RJMP/RCALL).
    #[serde(rename = "signed12")]
    Signed12,
}

impl FieldKind {
    fn rust_type(self) -> TokenStream {
        match self {
            FieldKind::Signed7 => quote! { i8 },
            FieldKind::Signed12 => quote! { i16 },
            _ => quote! { u8 },
        }
    }
}
