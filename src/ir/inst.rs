use serde::{Deserialize, Serialize};

use crate::frontend::token::Spanned;

/// The fixed built-in operator set. No user-level definitions; a bare word
/// resolves here before the function/memory/constant namespaces are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intrinsic {
    Plus,
    Minus,
    Times,
    /// Pushes quotient then remainder.
    DivMod,
    Greater,
    Less,
    NotEqual,
    Dup,
    Print,
    /// Raw OS call; the payload is the argument count (0..=6).
    Syscall(u8),
    Load8,
    Store8,
    Load32,
    Store32,
    Load64,
    Store64,
}

impl Intrinsic {
    pub fn from_word(word: &str) -> Option<Intrinsic> {
        match word {
            "+" => Some(Intrinsic::Plus),
            "-" => Some(Intrinsic::Minus),
            "*" => Some(Intrinsic::Times),
            "divmod" => Some(Intrinsic::DivMod),
            ">" => Some(Intrinsic::Greater),
            "<" => Some(Intrinsic::Less),
            "!=" => Some(Intrinsic::NotEqual),
            "dup" => Some(Intrinsic::Dup),
            "print" => Some(Intrinsic::Print),
            "syscall0" => Some(Intrinsic::Syscall(0)),
            "syscall1" => Some(Intrinsic::Syscall(1)),
            "syscall2" => Some(Intrinsic::Syscall(2)),
            "syscall3" => Some(Intrinsic::Syscall(3)),
            "syscall4" => Some(Intrinsic::Syscall(4)),
            "syscall5" => Some(Intrinsic::Syscall(5)),
            "syscall6" => Some(Intrinsic::Syscall(6)),
            "@8" => Some(Intrinsic::Load8),
            "!8" => Some(Intrinsic::Store8),
            "@32" => Some(Intrinsic::Load32),
            "!32" => Some(Intrinsic::Store32),
            "@64" => Some(Intrinsic::Load64),
            "!64" => Some(Intrinsic::Store64),
            _ => None,
        }
    }
}

impl std::fmt::Display for Intrinsic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intrinsic::Plus => write!(f, "+"),
            Intrinsic::Minus => write!(f, "-"),
            Intrinsic::Times => write!(f, "*"),
            Intrinsic::DivMod => write!(f, "divmod"),
            Intrinsic::Greater => write!(f, ">"),
            Intrinsic::Less => write!(f, "<"),
            Intrinsic::NotEqual => write!(f, "!="),
            Intrinsic::Dup => write!(f, "dup"),
            Intrinsic::Print => write!(f, "print"),
            Intrinsic::Syscall(n) => write!(f, "syscall{}", n),
            Intrinsic::Load8 => write!(f, "@8"),
            Intrinsic::Store8 => write!(f, "!8"),
            Intrinsic::Load32 => write!(f, "@32"),
            Intrinsic::Store32 => write!(f, "!32"),
            Intrinsic::Load64 => write!(f, "@64"),
            Intrinsic::Store64 => write!(f, "!64"),
        }
    }
}

/// One instruction of the flat program. The position within `Program` is the
/// address every jump/call field refers to; `len(program)` (one past the end)
/// is a valid target meaning "fall through to the epilogue".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstKind {
    PushInt(i64),
    /// Escapes still undecoded; the code generator interns and decodes.
    PushStr(String),
    Intrinsic(Intrinsic),
    /// Pop one value, branch to `jmp` when it is zero. Used by `if` and `do`.
    Test { jmp: usize },
    /// Unconditional branch closing the true branch of an `if`.
    Else { jmp: usize },
    /// Loop head marker; carries no jump of its own.
    While,
    /// Closes a block. Carries a backward jump only when closing a loop.
    End { jmp: Option<usize> },
    /// Unconditional branch over a function body during linear execution.
    FuncSkip { jmp: usize },
    /// Moves the call-site return address onto the return-address buffer.
    FuncEntry,
    /// Pops the return-address buffer and returns to the call site.
    FuncReturn,
    FuncCall { target: usize },
    /// Pushes the absolute address of a static memory region.
    MemPush { offset: usize },
}

/// An instruction plus the token it came from, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inst {
    pub kind: InstKind,
    pub token: Spanned,
}

/// A finished, fully resolved program. Append-only during parsing; emitted
/// instructions are only ever mutated to fill in a jump address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub insts: Vec<Inst>,
    /// Total bytes reserved by `memory` declarations.
    pub memory_capacity: usize,
}

impl Program {
    pub fn new() -> Self {
        Program {
            insts: Vec::new(),
            memory_capacity: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    /// Every jump/call target of the instruction at `addr`, if any.
    pub fn jump_target(&self, addr: usize) -> Option<usize> {
        match self.insts[addr].kind {
            InstKind::Test { jmp }
            | InstKind::Else { jmp }
            | InstKind::FuncSkip { jmp }
            | InstKind::End { jmp: Some(jmp) } => Some(jmp),
            InstKind::FuncCall { target } => Some(target),
            _ => None,
        }
    }

    /// Checks the jump-bounds invariant: all targets lie in `[0, len]`.
    pub fn check_jump_bounds(&self) -> bool {
        (0..self.len()).all(|addr| match self.jump_target(addr) {
            Some(target) => target <= self.len(),
            None => true,
        })
    }
}

impl Default for Program {
    fn default() -> Self {
        Program::new()
    }
}
