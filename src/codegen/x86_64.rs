use std::collections::HashMap;

use crate::ir::{InstKind, Intrinsic, Program};

/// Bytes reserved for the function return-address buffer.
const RET_STACK_CAPACITY: usize = 8192;

/// Argument registers of the x86-64 Linux syscall convention, in order.
const SYSCALL_ARG_REGS: [&str; 6] = ["rdi", "rsi", "rdx", "r10", "r8", "r9"];

/// Lowers a finished program to NASM x86-64 Linux assembly.
///
/// Never fails: malformed jump addresses are a parser defect, not something
/// reported here. Every program address gets an `addr_N` label so jump and
/// call fields translate directly; `addr_len` is the process-exit epilogue.
///
/// Function calls do not use the machine call stack: the call site pushes its
/// return address on the data stack and jumps, the entry moves it onto a
/// dedicated buffer in `.bss` with its own cursor, and the return pops that
/// buffer and jumps back. This keeps language values and control metadata on
/// separate stacks.
pub struct CodeGenerator {
    out: String,
    strings: Vec<Vec<u8>>,
    string_ids: HashMap<String, usize>,
}

pub fn generate(program: &Program) -> String {
    CodeGenerator::new().generate(program)
}

impl CodeGenerator {
    fn new() -> Self {
        CodeGenerator {
            out: String::new(),
            strings: Vec::new(),
            string_ids: HashMap::new(),
        }
    }

    fn line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn linef(&mut self, text: String) {
        self.out.push_str(&text);
        self.out.push('\n');
    }

    /// Interns a string literal, returning its stable data-section index.
    /// Identical source text maps to the same label.
    fn intern_string(&mut self, text: &str) -> usize {
        if let Some(&id) = self.string_ids.get(text) {
            return id;
        }
        let id = self.strings.len();
        self.strings.push(unescape(text));
        self.string_ids.insert(text.to_string(), id);
        id
    }

    fn generate(mut self, program: &Program) -> String {
        self.line("BITS 64");
        self.line("section .text");
        self.emit_print_routine();
        self.line("global _start");
        self.line("_start:");

        for addr in 0..program.len() {
            self.linef(format!("addr_{}:", addr));
            self.emit_inst(program, addr);
        }

        self.linef(format!("addr_{}:", program.len()));
        self.line("  ;; exit");
        self.line("  mov rax, 0x3c");
        self.line("  mov rdi, 0");
        self.line("  syscall");

        self.emit_data_section();
        self.emit_bss_section(program);
        self.out
    }

    fn emit_inst(&mut self, program: &Program, addr: usize) {
        match &program.insts[addr].kind {
            InstKind::PushInt(n) => {
                self.line("  ;; push int");
                self.linef(format!("  mov rax, {}", n));
                self.line("  push rax");
            }
            InstKind::PushStr(text) => {
                let id = self.intern_string(text);
                let len = self.strings[id].len();
                self.line("  ;; push str");
                self.linef(format!("  mov rax, {}", len));
                self.line("  push rax");
                self.linef(format!("  mov rax, str_{}", id));
                self.line("  push rax");
            }
            InstKind::Intrinsic(intrinsic) => self.emit_intrinsic(*intrinsic),
            InstKind::Test { jmp } => {
                self.line("  ;; test");
                self.line("  pop rax");
                self.line("  test rax, rax");
                self.linef(format!("  jz addr_{}", jmp));
            }
            InstKind::Else { jmp } => {
                self.line("  ;; else");
                self.linef(format!("  jmp addr_{}", jmp));
            }
            InstKind::While => {
                self.line("  ;; while");
            }
            InstKind::End { jmp: Some(jmp) } => {
                self.line("  ;; end");
                self.linef(format!("  jmp addr_{}", jmp));
            }
            InstKind::End { jmp: None } => {
                self.line("  ;; end");
            }
            InstKind::FuncSkip { jmp } => {
                self.line("  ;; fn skip");
                self.linef(format!("  jmp addr_{}", jmp));
            }
            InstKind::FuncEntry => {
                self.line("  ;; fn entry");
                self.line("  pop rax");
                self.line("  mov rbx, [ret_stack_pos]");
                self.line("  mov [ret_stack+rbx], rax");
                self.line("  add rbx, 8");
                self.line("  mov [ret_stack_pos], rbx");
            }
            InstKind::FuncReturn => {
                self.line("  ;; fn return");
                self.line("  mov rbx, [ret_stack_pos]");
                self.line("  sub rbx, 8");
                self.line("  mov [ret_stack_pos], rbx");
                self.line("  mov rax, [ret_stack+rbx]");
                self.line("  jmp rax");
            }
            InstKind::FuncCall { target } => {
                self.line("  ;; fn call");
                self.linef(format!("  mov rax, addr_{}", addr + 1));
                self.line("  push rax");
                self.linef(format!("  jmp addr_{}", target));
            }
            InstKind::MemPush { offset } => {
                self.line("  ;; mem push");
                self.line("  mov rax, mem");
                self.linef(format!("  add rax, {}", offset));
                self.line("  push rax");
            }
        }
    }

    fn emit_intrinsic(&mut self, intrinsic: Intrinsic) {
        match intrinsic {
            Intrinsic::Plus => {
                self.line("  ;; add");
                self.line("  pop rbx");
                self.line("  pop rax");
                self.line("  add rax, rbx");
                self.line("  push rax");
            }
            Intrinsic::Minus => {
                self.line("  ;; sub");
                self.line("  pop rbx");
                self.line("  pop rax");
                self.line("  sub rax, rbx");
                self.line("  push rax");
            }
            Intrinsic::Times => {
                self.line("  ;; mul");
                self.line("  pop rbx");
                self.line("  pop rax");
                self.line("  imul rbx");
                self.line("  push rax");
            }
            Intrinsic::DivMod => {
                self.line("  ;; divmod");
                self.line("  pop rbx");
                self.line("  pop rax");
                self.line("  cqo");
                self.line("  idiv rbx");
                self.line("  push rax");
                self.line("  push rdx");
            }
            Intrinsic::Greater => self.emit_comparison("greater", "cmovg"),
            Intrinsic::Less => self.emit_comparison("less", "cmovl"),
            Intrinsic::NotEqual => self.emit_comparison("not equal", "cmovne"),
            Intrinsic::Dup => {
                self.line("  ;; dup");
                self.line("  pop rax");
                self.line("  push rax");
                self.line("  push rax");
            }
            Intrinsic::Print => {
                self.line("  ;; print");
                self.line("  pop rdi");
                self.line("  call print");
            }
            Intrinsic::Syscall(arity) => {
                self.linef(format!("  ;; syscall{}", arity));
                self.line("  pop rax");
                for reg in SYSCALL_ARG_REGS.iter().take(arity as usize) {
                    self.linef(format!("  pop {}", reg));
                }
                self.line("  syscall");
                self.line("  push rax");
            }
            Intrinsic::Load8 => {
                self.line("  ;; load8");
                self.line("  pop rax");
                self.line("  xor rbx, rbx");
                self.line("  mov bl, [rax]");
                self.line("  push rbx");
            }
            Intrinsic::Store8 => {
                self.line("  ;; store8");
                self.line("  pop rbx");
                self.line("  pop rax");
                self.line("  mov [rax], bl");
            }
            Intrinsic::Load32 => {
                self.line("  ;; load32");
                self.line("  pop rax");
                self.line("  xor rbx, rbx");
                self.line("  mov ebx, [rax]");
                self.line("  push rbx");
            }
            Intrinsic::Store32 => {
                self.line("  ;; store32");
                self.line("  pop rbx");
                self.line("  pop rax");
                self.line("  mov [rax], ebx");
            }
            Intrinsic::Load64 => {
                self.line("  ;; load64");
                self.line("  pop rax");
                self.line("  mov rbx, [rax]");
                self.line("  push rbx");
            }
            Intrinsic::Store64 => {
                self.line("  ;; store64");
                self.line("  pop rbx");
                self.line("  pop rax");
                self.line("  mov [rax], rbx");
            }
        }
    }

    /// Comparisons produce a 0/1 boolean with a conditional move, never a
    /// branch. Top of stack is the right-hand operand.
    fn emit_comparison(&mut self, name: &str, cmov: &str) {
        self.linef(format!("  ;; {}", name));
        self.line("  mov rcx, 0");
        self.line("  mov rdx, 1");
        self.line("  pop rbx");
        self.line("  pop rax");
        self.line("  cmp rax, rbx");
        self.linef(format!("  {} rcx, rdx", cmov));
        self.line("  push rcx");
    }

    /// Unsigned decimal printer, written once per artifact. Takes the value
    /// in rdi, writes digits plus a newline to stdout.
    fn emit_print_routine(&mut self) {
        self.line("print:");
        self.line("  mov r9, -3689348814741910323");
        self.line("  sub rsp, 40");
        self.line("  mov byte [rsp+31], 10");
        self.line("  lea rcx, [rsp+30]");
        self.line(".loop:");
        self.line("  mov rax, rdi");
        self.line("  lea r8, [rsp+32]");
        self.line("  mul r9");
        self.line("  mov rax, rdi");
        self.line("  sub r8, rcx");
        self.line("  shr rdx, 3");
        self.line("  lea rsi, [rdx+rdx*4]");
        self.line("  add rsi, rsi");
        self.line("  sub rax, rsi");
        self.line("  add eax, 48");
        self.line("  mov byte [rcx], al");
        self.line("  mov rax, rdi");
        self.line("  mov rdi, rdx");
        self.line("  mov rdx, rcx");
        self.line("  sub rcx, 1");
        self.line("  cmp rax, 9");
        self.line("  ja .loop");
        self.line("  lea rax, [rsp+32]");
        self.line("  mov edi, 1");
        self.line("  sub rdx, rax");
        self.line("  xor eax, eax");
        self.line("  lea rsi, [rsp+32+rdx]");
        self.line("  mov rdx, r8");
        self.line("  mov rax, 1");
        self.line("  syscall");
        self.line("  add rsp, 40");
        self.line("  ret");
    }

    fn emit_data_section(&mut self) {
        if self.strings.is_empty() {
            return;
        }
        self.line("section .data");
        for (id, bytes) in self.strings.clone().iter().enumerate() {
            if bytes.is_empty() {
                self.linef(format!("str_{}:", id));
            } else {
                let encoded: Vec<String> = bytes.iter().map(|b| b.to_string()).collect();
                self.linef(format!("str_{}: db {}", id, encoded.join(",")));
            }
        }
    }

    fn emit_bss_section(&mut self, program: &Program) {
        self.line("section .bss");
        self.line("ret_stack_pos: resq 1");
        self.linef(format!("ret_stack: resb {}", RET_STACK_CAPACITY));
        if program.memory_capacity > 0 {
            self.linef(format!("mem: resb {}", program.memory_capacity));
        }
    }
}

/// Decodes the backslash escapes the tokenizer left in place. Unknown
/// escapes decode to the escaped character itself.
fn unescape(text: &str) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut chars = text.chars();
    let mut buf = [0u8; 4];

    while let Some(ch) = chars.next() {
        let decoded = if ch == '\\' {
            match chars.next() {
                Some('n') => '\n',
                Some('t') => '\t',
                Some('r') => '\r',
                Some('0') => '\0',
                Some(other) => other,
                None => '\\',
            }
        } else {
            ch
        };
        bytes.extend_from_slice(decoded.encode_utf8(&mut buf).as_bytes());
    }
    bytes
}
