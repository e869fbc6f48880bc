//! Guest (Gekko/Broadway PowerPC) instruction disassembler.
//!
//! Covers the integer, branch, load/store and floating-point load/store forms that make up the
//! bulk of compiled game code. Encodings outside that set are rendered as `(ill)` with the raw
//! word so a block listing never loses information.

/// Disassemble one instruction word fetched from `address`.
///
/// The result is `mnemonic` or `mnemonic\toperands`. Branch targets are absolute and rendered as
/// `->0xXXXXXXXX`.
pub fn disassemble(inst: u32, address: u32) -> String {
    let Decoded { mnemonic, operands } = decode(inst, address);
    if operands.is_empty() {
        mnemonic
    } else {
        format!("{mnemonic}\t{operands}")
    }
}

struct Decoded {
    mnemonic: String,
    operands: String,
}

impl Decoded {
    fn new(mnemonic: impl Into<String>, operands: impl Into<String>) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            operands: operands.into(),
        }
    }

    fn bare(mnemonic: impl Into<String>) -> Self {
        Self::new(mnemonic, String::new())
    }

    fn illegal(inst: u32) -> Self {
        if inst == 0 {
            Self::bare("---")
        } else {
            Self::new("(ill)", format!("{inst:08x}"))
        }
    }
}

#[inline]
fn opcd(inst: u32) -> u32 {
    inst >> 26
}

#[inline]
fn rd(inst: u32) -> u32 {
    (inst >> 21) & 0x1f
}

#[inline]
fn ra(inst: u32) -> u32 {
    (inst >> 16) & 0x1f
}

#[inline]
fn rb(inst: u32) -> u32 {
    (inst >> 11) & 0x1f
}

#[inline]
fn mb(inst: u32) -> u32 {
    (inst >> 6) & 0x1f
}

#[inline]
fn me(inst: u32) -> u32 {
    (inst >> 1) & 0x1f
}

#[inline]
fn crf_d(inst: u32) -> u32 {
    (inst >> 23) & 0x7
}

#[inline]
fn simm(inst: u32) -> i32 {
    i32::from(inst as u16 as i16)
}

#[inline]
fn uimm(inst: u32) -> u32 {
    inst & 0xffff
}

#[inline]
fn rc(inst: u32) -> &'static str {
    if inst & 1 != 0 {
        "."
    } else {
        ""
    }
}

fn branch_suffix(inst: u32) -> &'static str {
    match inst & 3 {
        0 => "",
        1 => "l",
        2 => "a",
        _ => "la",
    }
}

fn signed_hex(value: i32) -> String {
    if value < 0 {
        format!("-0x{:X}", value.unsigned_abs())
    } else {
        format!("0x{value:X}")
    }
}

fn cr_prefix(crf: u32) -> String {
    if crf == 0 {
        String::new()
    } else {
        format!("cr{crf}, ")
    }
}

/// Mask selected by `rlwinm`-style MB/ME fields (big-endian bit numbering, wrapping).
pub fn rotate_mask(mb: u32, me: u32) -> u32 {
    let begin = u32::MAX >> mb;
    let end = u32::MAX << (31 - me);
    if mb <= me {
        begin & end
    } else {
        begin | end
    }
}

fn decode(inst: u32, address: u32) -> Decoded {
    match opcd(inst) {
        7 => Decoded::new("mulli", format!("r{}, r{}, {}", rd(inst), ra(inst), simm(inst))),
        8 => Decoded::new("subfic", format!("r{}, r{}, {}", rd(inst), ra(inst), simm(inst))),
        10 => cmp_immediate(inst, "cmplwi", uimm(inst).to_string()),
        11 => cmp_immediate(inst, "cmpwi", simm(inst).to_string()),
        12 => Decoded::new("addic", format!("r{}, r{}, {}", rd(inst), ra(inst), simm(inst))),
        13 => Decoded::new("addic.", format!("r{}, r{}, {}", rd(inst), ra(inst), simm(inst))),
        14 => addi(inst),
        15 => addis(inst),
        16 => branch_conditional(inst, address),
        17 if inst & 2 != 0 => Decoded::bare("sc"),
        18 => branch(inst, address),
        19 => opcode19(inst),
        20 => rotate(inst, "rlwimi", format!("{}", rb(inst))),
        21 => rotate(inst, "rlwinm", format!("{}", rb(inst))),
        23 => rotate(inst, "rlwnm", format!("r{}", rb(inst))),
        24 if inst == 0x6000_0000 => Decoded::bare("nop"),
        24 => logical_immediate(inst, "ori"),
        25 => logical_immediate(inst, "oris"),
        26 => logical_immediate(inst, "xori"),
        27 => logical_immediate(inst, "xoris"),
        28 => logical_immediate(inst, "andi."),
        29 => logical_immediate(inst, "andis."),
        31 => opcode31(inst),
        32 => load_store(inst, "lwz", 'r'),
        33 => load_store(inst, "lwzu", 'r'),
        34 => load_store(inst, "lbz", 'r'),
        35 => load_store(inst, "lbzu", 'r'),
        36 => load_store(inst, "stw", 'r'),
        37 => load_store(inst, "stwu", 'r'),
        38 => load_store(inst, "stb", 'r'),
        39 => load_store(inst, "stbu", 'r'),
        40 => load_store(inst, "lhz", 'r'),
        41 => load_store(inst, "lhzu", 'r'),
        42 => load_store(inst, "lha", 'r'),
        43 => load_store(inst, "lhau", 'r'),
        44 => load_store(inst, "sth", 'r'),
        45 => load_store(inst, "sthu", 'r'),
        46 => load_store(inst, "lmw", 'r'),
        47 => load_store(inst, "stmw", 'r'),
        48 => load_store(inst, "lfs", 'f'),
        49 => load_store(inst, "lfsu", 'f'),
        50 => load_store(inst, "lfd", 'f'),
        51 => load_store(inst, "lfdu", 'f'),
        52 => load_store(inst, "stfs", 'f'),
        53 => load_store(inst, "stfsu", 'f'),
        54 => load_store(inst, "stfd", 'f'),
        55 => load_store(inst, "stfdu", 'f'),
        _ => Decoded::illegal(inst),
    }
}

fn cmp_immediate(inst: u32, name: &str, imm: String) -> Decoded {
    // The L bit selects 64-bit compares, which Gekko does not have.
    if inst & (1 << 21) != 0 {
        return Decoded::illegal(inst);
    }
    Decoded::new(name, format!("{}r{}, {imm}", cr_prefix(crf_d(inst)), ra(inst)))
}

fn addi(inst: u32) -> Decoded {
    let (d, a, imm) = (rd(inst), ra(inst), simm(inst));
    if a == 0 {
        Decoded::new("li", format!("r{d}, {imm}"))
    } else if imm < 0 {
        Decoded::new("subi", format!("r{d}, r{a}, {}", imm.unsigned_abs()))
    } else {
        Decoded::new("addi", format!("r{d}, r{a}, {imm}"))
    }
}

fn addis(inst: u32) -> Decoded {
    let (d, a, imm) = (rd(inst), ra(inst), uimm(inst));
    if a == 0 {
        Decoded::new("lis", format!("r{d}, 0x{imm:04X}"))
    } else {
        Decoded::new("addis", format!("r{d}, r{a}, 0x{imm:04X}"))
    }
}

fn logical_immediate(inst: u32, name: &str) -> Decoded {
    Decoded::new(
        name,
        format!("r{}, r{}, 0x{:04X}", ra(inst), rd(inst), uimm(inst)),
    )
}

fn rotate(inst: u32, name: &str, shift: String) -> Decoded {
    let (s, a, b, e) = (rd(inst), ra(inst), mb(inst), me(inst));
    Decoded::new(
        format!("{name}{}", rc(inst)),
        format!("r{a}, r{s}, {shift}, {b}, {e} ({:08x})", rotate_mask(b, e)),
    )
}

fn branch(inst: u32, address: u32) -> Decoded {
    let mut disp = inst & 0x03ff_fffc;
    if disp & 0x0200_0000 != 0 {
        disp |= 0xfc00_0000;
    }
    let target = if inst & 2 != 0 {
        disp
    } else {
        address.wrapping_add(disp)
    };
    Decoded::new(
        format!("b{}", branch_suffix(inst)),
        format!("->0x{target:08X}"),
    )
}

fn branch_conditional(inst: u32, address: u32) -> Decoded {
    let bo = rd(inst);
    let bi = ra(inst);
    let disp = i32::from((inst & 0xfffc) as u16 as i16) as u32;
    let target = if inst & 2 != 0 {
        disp
    } else {
        address.wrapping_add(disp)
    };
    let suffix = branch_suffix(inst);
    let target = format!("->0x{target:08X}");

    match conditional_name(bo, bi) {
        Some((name, cr)) => Decoded::new(format!("{name}{suffix}"), format!("{cr}{target}")),
        None => Decoded::new(format!("bc{suffix}"), format!("{bo}, {bi}, {target}")),
    }
}

/// Simplified mnemonic for a BO/BI pair, plus the `crN, ` operand prefix when needed.
fn conditional_name(bo: u32, bi: u32) -> Option<(&'static str, String)> {
    // Only the common encodings get simplified names; the "y" hint bit is ignored.
    let bo = bo & !1;
    if bo & 0b00100 == 0 {
        // CTR decrement, unconditional on CR.
        return match bo {
            0b10000 => Some(("bdnz", String::new())),
            0b10010 => Some(("bdz", String::new())),
            _ => None,
        };
    }
    if bo & 0b10000 != 0 {
        return Some(("b", String::new()));
    }
    let when_true = bo & 0b01000 != 0;
    let name = match (bi & 3, when_true) {
        (0, true) => "blt",
        (1, true) => "bgt",
        (2, true) => "beq",
        (3, true) => "bso",
        (0, false) => "bge",
        (1, false) => "ble",
        (2, false) => "bne",
        _ => "bns",
    };
    Some((name, cr_prefix(bi >> 2)))
}

fn opcode19(inst: u32) -> Decoded {
    let bo = rd(inst);
    let link = inst & 1 != 0;
    match (inst >> 1) & 0x3ff {
        0 => Decoded::new("mcrf", format!("cr{}, cr{}", crf_d(inst), (inst >> 18) & 7)),
        16 if bo & 0b10100 == 0b10100 => Decoded::bare(if link { "blrl" } else { "blr" }),
        16 => Decoded::new(
            if link { "bclrl" } else { "bclr" },
            format!("{bo}, {}", ra(inst)),
        ),
        50 => Decoded::bare("rfi"),
        150 => Decoded::bare("isync"),
        528 if bo & 0b10100 == 0b10100 => Decoded::bare(if link { "bctrl" } else { "bctr" }),
        528 => Decoded::new(
            if link { "bcctrl" } else { "bcctr" },
            format!("{bo}, {}", ra(inst)),
        ),
        _ => Decoded::illegal(inst),
    }
}

fn opcode31(inst: u32) -> Decoded {
    let (d, a, b) = (rd(inst), ra(inst), rb(inst));
    let dot = rc(inst);
    let xo = (inst >> 1) & 0x3ff;

    let x_form = match xo {
        0 => Some(Decoded::new(
            "cmpw",
            format!("{}r{a}, r{b}", cr_prefix(crf_d(inst))),
        )),
        32 => Some(Decoded::new(
            "cmplw",
            format!("{}r{a}, r{b}", cr_prefix(crf_d(inst))),
        )),
        19 => Some(Decoded::new("mfcr", format!("r{d}"))),
        23 => Some(Decoded::new("lwzx", format!("r{d}, r{a}, r{b}"))),
        24 => Some(Decoded::new(format!("slw{dot}"), format!("r{a}, r{d}, r{b}"))),
        26 => Some(Decoded::new(format!("cntlzw{dot}"), format!("r{a}, r{d}"))),
        28 => Some(Decoded::new(format!("and{dot}"), format!("r{a}, r{d}, r{b}"))),
        54 => Some(Decoded::new("dcbst", format!("r{a}, r{b}"))),
        60 => Some(Decoded::new(format!("andc{dot}"), format!("r{a}, r{d}, r{b}"))),
        83 => Some(Decoded::new("mfmsr", format!("r{d}"))),
        86 => Some(Decoded::new("dcbf", format!("r{a}, r{b}"))),
        87 => Some(Decoded::new("lbzx", format!("r{d}, r{a}, r{b}"))),
        124 => Some(Decoded::new(format!("nor{dot}"), format!("r{a}, r{d}, r{b}"))),
        144 => Some(Decoded::new(
            "mtcrf",
            format!("0x{:02X}, r{d}", (inst >> 12) & 0xff),
        )),
        146 => Some(Decoded::new("mtmsr", format!("r{d}"))),
        151 => Some(Decoded::new("stwx", format!("r{d}, r{a}, r{b}"))),
        215 => Some(Decoded::new("stbx", format!("r{d}, r{a}, r{b}"))),
        279 => Some(Decoded::new("lhzx", format!("r{d}, r{a}, r{b}"))),
        316 => Some(Decoded::new(format!("xor{dot}"), format!("r{a}, r{d}, r{b}"))),
        339 => Some(move_from_spr(inst)),
        407 => Some(Decoded::new("sthx", format!("r{d}, r{a}, r{b}"))),
        444 if d == b => Some(Decoded::new(format!("mr{dot}"), format!("r{a}, r{d}"))),
        444 => Some(Decoded::new(format!("or{dot}"), format!("r{a}, r{d}, r{b}"))),
        467 => Some(move_to_spr(inst)),
        536 => Some(Decoded::new(format!("srw{dot}"), format!("r{a}, r{d}, r{b}"))),
        598 => Some(Decoded::bare("sync")),
        792 => Some(Decoded::new(format!("sraw{dot}"), format!("r{a}, r{d}, r{b}"))),
        824 => Some(Decoded::new(format!("srawi{dot}"), format!("r{a}, r{d}, {b}"))),
        854 => Some(Decoded::bare("eieio")),
        922 => Some(Decoded::new(format!("extsh{dot}"), format!("r{a}, r{d}"))),
        954 => Some(Decoded::new(format!("extsb{dot}"), format!("r{a}, r{d}"))),
        982 => Some(Decoded::new("icbi", format!("r{a}, r{b}"))),
        _ => None,
    };
    if let Some(decoded) = x_form {
        return decoded;
    }

    // XO-form arithmetic: the top bit of the extended opcode is the OE (overflow enable) flag.
    let oe = if xo & 0x200 != 0 { "o" } else { "" };
    let name = match xo & 0x1ff {
        8 => "subfc",
        10 => "addc",
        40 => "subf",
        104 => "neg",
        136 => "subfe",
        138 => "adde",
        202 => "addze",
        235 => "mullw",
        266 => "add",
        459 => "divwu",
        491 => "divw",
        _ => return Decoded::illegal(inst),
    };
    let operands = if name == "neg" || name == "addze" {
        format!("r{d}, r{a}")
    } else {
        format!("r{d}, r{a}, r{b}")
    };
    Decoded::new(format!("{name}{oe}{dot}"), operands)
}

fn spr_number(inst: u32) -> u32 {
    ((inst >> 16) & 0x1f) | (((inst >> 11) & 0x1f) << 5)
}

fn move_from_spr(inst: u32) -> Decoded {
    let d = rd(inst);
    match spr_number(inst) {
        1 => Decoded::new("mfxer", format!("r{d}")),
        8 => Decoded::new("mflr", format!("r{d}")),
        9 => Decoded::new("mfctr", format!("r{d}")),
        spr => Decoded::new("mfspr", format!("r{d}, {spr}")),
    }
}

fn move_to_spr(inst: u32) -> Decoded {
    let s = rd(inst);
    match spr_number(inst) {
        1 => Decoded::new("mtxer", format!("r{s}")),
        8 => Decoded::new("mtlr", format!("r{s}")),
        9 => Decoded::new("mtctr", format!("r{s}")),
        spr => Decoded::new("mtspr", format!("{spr}, r{s}")),
    }
}

fn load_store(inst: u32, name: &str, reg: char) -> Decoded {
    Decoded::new(
        name,
        format!("{reg}{}, {}(r{})", rd(inst), signed_hex(simm(inst)), ra(inst)),
    )
}
