use crate::ir::inst::{InstKind, Program};

/// Print a human-readable listing of a finished program.
pub fn print_program(program: &Program) {
    print!("{}", disassemble_to_string(program));
}

/// Return the listing as a `String` (used by `--ir` and by tests).
pub fn disassemble_to_string(program: &Program) -> String {
    let targets = collect_jump_targets(program);
    let mut out = String::new();

    for (addr, inst) in program.insts.iter().enumerate() {
        let marker = if targets.contains(&addr) { "► " } else { "  " };
        out.push_str(&format!(
            "{:04} {}{}\n",
            addr,
            marker,
            format_inst(&inst.kind)
        ));
    }

    let epilogue_marker = if targets.contains(&program.len()) {
        "► "
    } else {
        "  "
    };
    out.push_str(&format!("{:04} {}EXIT\n", program.len(), epilogue_marker));

    if program.memory_capacity > 0 {
        out.push_str(&format!("; memory {} bytes\n", program.memory_capacity));
    }

    out
}

fn collect_jump_targets(program: &Program) -> Vec<usize> {
    let mut targets = Vec::new();
    for addr in 0..program.len() {
        if let Some(target) = program.jump_target(addr) {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }
    targets
}

fn format_inst(kind: &InstKind) -> String {
    match kind {
        InstKind::PushInt(n) => format!("PUSH_INT    {}", n),
        InstKind::PushStr(s) => format!("PUSH_STR    {:?}", s),
        InstKind::Intrinsic(i) => format!("INTRINSIC   {}", i),
        InstKind::Test { jmp } => format!("TEST        (→ {:04})", jmp),
        InstKind::Else { jmp } => format!("ELSE        (→ {:04})", jmp),
        InstKind::While => "WHILE".to_string(),
        InstKind::End { jmp: Some(jmp) } => format!("END         (→ {:04})", jmp),
        InstKind::End { jmp: None } => "END".to_string(),
        InstKind::FuncSkip { jmp } => format!("FN_SKIP     (→ {:04})", jmp),
        InstKind::FuncEntry => "FN_ENTRY".to_string(),
        InstKind::FuncReturn => "FN_RETURN".to_string(),
        InstKind::FuncCall { target } => format!("FN_CALL     (→ {:04})", target),
        InstKind::MemPush { offset } => format!("MEM_PUSH    +{}", offset),
    }
}
