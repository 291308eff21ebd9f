pub mod disasm;
pub mod inst;

pub use inst::{Inst, InstKind, Intrinsic, Program};
