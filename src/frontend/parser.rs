use std::collections::HashMap;
use std::path::Path;

use crate::frontend::lexer;
use crate::frontend::parser_error::ParseError;
use crate::frontend::token::{Keyword, Spanned, Token};
use crate::ir::{Inst, InstKind, Intrinsic, Program};

/// Maximum `include` nesting before the parser gives up. Protects against
/// include cycles without a visited-set.
const MAX_INCLUDE_DEPTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    If,
    Else,
    While,
    Do,
    Def,
}

impl BlockKind {
    fn opener(&self) -> &'static str {
        match self {
            BlockKind::If => "if",
            BlockKind::Else => "else",
            BlockKind::While => "while",
            BlockKind::Do => "do",
            BlockKind::Def => "def",
        }
    }
}

/// One pending block opener: the kind of construct and the address of the
/// instruction it emitted, waiting for its closer to backpatch it.
#[derive(Debug, Clone)]
struct OpenBlock {
    kind: BlockKind,
    addr: usize,
    token: Spanned,
}

/// Single-pass parser and control-flow resolver.
///
/// Consumes tokens left to right, appending to a flat `Program` whose
/// positions are the addresses all jump/call fields refer to. Block openers
/// push their own address onto `blocks`; closers pop and patch. Name lookups
/// go through three disjoint namespaces (functions, memory regions,
/// constants); binding a name in one forbids rebinding it in any of them.
pub struct Parser {
    program: Program,
    blocks: Vec<OpenBlock>,
    functions: HashMap<String, usize>,
    memories: HashMap<String, usize>,
    constants: HashMap<String, i64>,
    include_depth: usize,
}

/// Parses a fully lexed source unit into a finished program.
///
/// `source_dir` is the directory `include` paths are resolved against.
pub fn parse(tokens: &[Spanned], source_dir: &Path) -> Result<Program, ParseError> {
    let mut parser = Parser::new();
    parser.parse_tokens(tokens, source_dir)?;
    parser.finish()
}

impl Parser {
    pub fn new() -> Self {
        Parser {
            program: Program::new(),
            blocks: Vec::new(),
            functions: HashMap::new(),
            memories: HashMap::new(),
            constants: HashMap::new(),
            include_depth: 0,
        }
    }

    /// Consumes the parser, checking that every opened block was closed.
    pub fn finish(self) -> Result<Program, ParseError> {
        if let Some(block) = self.blocks.last() {
            return Err(ParseError::new(
                format!("'{}' without matching 'end'", block.kind.opener()),
                block.token.loc.clone(),
            ));
        }
        Ok(self.program)
    }

    fn emit(&mut self, kind: InstKind, token: &Spanned) -> usize {
        let addr = self.program.len();
        self.program.insts.push(Inst {
            kind,
            token: token.clone(),
        });
        addr
    }

    /// Fills in a previously unknown jump address. Only ever called on
    /// instructions an `OpenBlock` points at.
    fn patch_jump(&mut self, addr: usize, target: usize) {
        match &mut self.program.insts[addr].kind {
            InstKind::Test { jmp } | InstKind::Else { jmp } | InstKind::FuncSkip { jmp } => {
                *jmp = target;
            }
            _ => unreachable!("open block points at a non-branching instruction"),
        }
    }

    fn is_bound(&self, name: &str) -> bool {
        self.functions.contains_key(name)
            || self.memories.contains_key(name)
            || self.constants.contains_key(name)
    }

    pub fn parse_tokens(&mut self, tokens: &[Spanned], dir: &Path) -> Result<(), ParseError> {
        let mut pos = 0;
        while pos < tokens.len() {
            let spanned = &tokens[pos];
            match &spanned.token {
                Token::Integer(n) => {
                    self.emit(InstKind::PushInt(*n), spanned);
                    pos += 1;
                }
                Token::Str(text) => {
                    self.emit(InstKind::PushStr(text.clone()), spanned);
                    pos += 1;
                }
                Token::Word(word) => {
                    self.resolve_word(word, spanned)?;
                    pos += 1;
                }
                Token::Keyword(keyword) => {
                    pos = self.parse_keyword(*keyword, tokens, pos, dir)?;
                }
            }
        }
        Ok(())
    }

    /// Resolution priority: intrinsic, then function, then memory region,
    /// then constant.
    fn resolve_word(&mut self, word: &str, spanned: &Spanned) -> Result<(), ParseError> {
        if let Some(intrinsic) = Intrinsic::from_word(word) {
            self.emit(InstKind::Intrinsic(intrinsic), spanned);
        } else if let Some(&target) = self.functions.get(word) {
            self.emit(InstKind::FuncCall { target }, spanned);
        } else if let Some(&offset) = self.memories.get(word) {
            self.emit(InstKind::MemPush { offset }, spanned);
        } else if let Some(&value) = self.constants.get(word) {
            self.emit(InstKind::PushInt(value), spanned);
        } else {
            return Err(ParseError::new(
                format!("unknown word '{}'", word),
                spanned.loc.clone(),
            ));
        }
        Ok(())
    }

    /// Handles one keyword starting at `pos`; returns the position of the
    /// next unconsumed token.
    fn parse_keyword(
        &mut self,
        keyword: Keyword,
        tokens: &[Spanned],
        pos: usize,
        dir: &Path,
    ) -> Result<usize, ParseError> {
        let spanned = &tokens[pos];
        match keyword {
            Keyword::If => {
                let addr = self.emit(InstKind::Test { jmp: 0 }, spanned);
                self.push_block(BlockKind::If, addr, spanned);
                Ok(pos + 1)
            }
            Keyword::While => {
                let addr = self.emit(InstKind::While, spanned);
                self.push_block(BlockKind::While, addr, spanned);
                Ok(pos + 1)
            }
            Keyword::Do => {
                if !matches!(self.blocks.last(), Some(b) if b.kind == BlockKind::While) {
                    return Err(ParseError::new(
                        "'do' without matching 'while'",
                        spanned.loc.clone(),
                    ));
                }
                let addr = self.emit(InstKind::Test { jmp: 0 }, spanned);
                self.push_block(BlockKind::Do, addr, spanned);
                Ok(pos + 1)
            }
            Keyword::Else => self.parse_else(tokens, pos),
            Keyword::End => self.parse_end(tokens, pos),
            Keyword::Def => self.parse_def(tokens, pos),
            Keyword::Memory => self.parse_memory(tokens, pos),
            Keyword::Const => self.parse_const(tokens, pos),
            Keyword::Include => self.parse_include(tokens, pos, dir),
        }
    }

    fn push_block(&mut self, kind: BlockKind, addr: usize, token: &Spanned) {
        self.blocks.push(OpenBlock {
            kind,
            addr,
            token: token.clone(),
        });
    }

    /// Closes the true branch of an `if`: the test branches just past the
    /// `else` when false, and the `else` itself waits for `end`.
    fn parse_else(&mut self, tokens: &[Spanned], pos: usize) -> Result<usize, ParseError> {
        let spanned = &tokens[pos];
        let block = self.blocks.pop().ok_or_else(|| {
            ParseError::new("'else' without matching 'if'", spanned.loc.clone())
        })?;
        if block.kind != BlockKind::If {
            return Err(ParseError::new(
                format!("'else' cannot close '{}'", block.kind.opener()),
                spanned.loc.clone(),
            ));
        }

        let else_addr = self.emit(InstKind::Else { jmp: 0 }, spanned);
        self.patch_jump(block.addr, else_addr + 1);
        self.push_block(BlockKind::Else, else_addr, spanned);
        Ok(pos + 1)
    }

    fn parse_end(&mut self, tokens: &[Spanned], pos: usize) -> Result<usize, ParseError> {
        let spanned = &tokens[pos];
        let block = self.blocks.pop().ok_or_else(|| {
            ParseError::new("'end' without matching block opener", spanned.loc.clone())
        })?;
        let end_addr = self.program.len();

        match block.kind {
            BlockKind::If => {
                self.emit(InstKind::End { jmp: None }, spanned);
                self.patch_jump(block.addr, end_addr + 1);
            }
            BlockKind::Else => {
                // The unconditional branch lands on this `end`, which emits
                // no branch of its own and falls through.
                self.emit(InstKind::End { jmp: None }, spanned);
                self.patch_jump(block.addr, end_addr);
            }
            BlockKind::Do => {
                let head = match self.blocks.pop() {
                    Some(b) if b.kind == BlockKind::While => b,
                    _ => unreachable!("'do' was only accepted directly under 'while'"),
                };
                self.emit(InstKind::End { jmp: Some(head.addr) }, spanned);
                self.patch_jump(block.addr, end_addr + 1);
            }
            BlockKind::Def => {
                self.emit(InstKind::FuncReturn, spanned);
                self.patch_jump(block.addr, end_addr + 1);
            }
            BlockKind::While => {
                return Err(ParseError::new(
                    "'while' must be closed through 'do'",
                    spanned.loc.clone(),
                ));
            }
        }
        Ok(pos + 1)
    }

    /// `def <name> <body...> end`: emits the skip/entry pair and binds the
    /// name to the entry instruction's address.
    fn parse_def(&mut self, tokens: &[Spanned], pos: usize) -> Result<usize, ParseError> {
        let spanned = &tokens[pos];
        let name_token = tokens.get(pos + 1).ok_or_else(|| {
            ParseError::new("expected function name after 'def'", spanned.loc.clone())
        })?;
        let name = match &name_token.token {
            Token::Word(name) => name.clone(),
            other => {
                return Err(ParseError::new(
                    format!("expected function name after 'def', got '{}'", other),
                    name_token.loc.clone(),
                ));
            }
        };
        self.check_redefinition(&name, name_token)?;

        let skip_addr = self.emit(InstKind::FuncSkip { jmp: 0 }, spanned);
        self.emit(InstKind::FuncEntry, name_token);
        self.functions.insert(name, skip_addr + 1);
        self.push_block(BlockKind::Def, skip_addr, spanned);
        Ok(pos + 2)
    }

    /// `memory <name> <size-expr...> end`: no instruction is emitted; the
    /// name is bound to its offset in the single growable static region.
    fn parse_memory(&mut self, tokens: &[Spanned], pos: usize) -> Result<usize, ParseError> {
        let spanned = &tokens[pos];
        let name_token = tokens.get(pos + 1).ok_or_else(|| {
            ParseError::new("expected memory name after 'memory'", spanned.loc.clone())
        })?;
        let name = match &name_token.token {
            Token::Word(name) => name.clone(),
            other => {
                return Err(ParseError::new(
                    format!("expected memory name after 'memory', got '{}'", other),
                    name_token.loc.clone(),
                ));
            }
        };
        self.check_redefinition(&name, name_token)?;

        let (size, next) = self.eval_const_expr(tokens, pos + 2, "memory size")?;
        if size < 0 {
            return Err(ParseError::new(
                format!("memory size must be non-negative, got {}", size),
                name_token.loc.clone(),
            ));
        }

        self.memories.insert(name, self.program.memory_capacity);
        self.program.memory_capacity += size as usize;
        Ok(next)
    }

    /// `const <name> <expr...> end`: parse-time evaluation, result bound in
    /// the constant namespace.
    fn parse_const(&mut self, tokens: &[Spanned], pos: usize) -> Result<usize, ParseError> {
        let spanned = &tokens[pos];
        let name_token = tokens.get(pos + 1).ok_or_else(|| {
            ParseError::new("expected constant name after 'const'", spanned.loc.clone())
        })?;
        let name = match &name_token.token {
            Token::Word(name) => name.clone(),
            other => {
                return Err(ParseError::new(
                    format!("expected constant name after 'const', got '{}'", other),
                    name_token.loc.clone(),
                ));
            }
        };
        self.check_redefinition(&name, name_token)?;

        let (value, next) = self.eval_const_expr(tokens, pos + 2, "constant")?;
        self.constants.insert(name, value);
        Ok(next)
    }

    /// Left-to-right operand stack over integer literals, previously defined
    /// constants, and `+ - *`. Must reduce to exactly one value at `end`.
    fn eval_const_expr(
        &self,
        tokens: &[Spanned],
        start: usize,
        what: &str,
    ) -> Result<(i64, usize), ParseError> {
        let mut stack: Vec<i64> = Vec::new();
        let mut pos = start;

        loop {
            let spanned = tokens.get(pos).ok_or_else(|| {
                let loc = tokens
                    .last()
                    .map(|s| s.loc.clone())
                    .unwrap_or_else(|| crate::frontend::token::FileLocation::start_of(""));
                ParseError::new(format!("unterminated {} expression, expected 'end'", what), loc)
            })?;

            match &spanned.token {
                Token::Keyword(Keyword::End) => {
                    pos += 1;
                    break;
                }
                Token::Integer(n) => stack.push(*n),
                Token::Word(word) => match word.as_str() {
                    "+" | "-" | "*" => {
                        let b = stack.pop();
                        let a = stack.pop();
                        let (a, b) = match (a, b) {
                            (Some(a), Some(b)) => (a, b),
                            _ => {
                                return Err(ParseError::new(
                                    format!("not enough operands for '{}' in {} expression", word, what),
                                    spanned.loc.clone(),
                                ));
                            }
                        };
                        stack.push(match word.as_str() {
                            "+" => a.wrapping_add(b),
                            "-" => a.wrapping_sub(b),
                            _ => a.wrapping_mul(b),
                        });
                    }
                    _ => {
                        if let Some(&value) = self.constants.get(word.as_str()) {
                            stack.push(value);
                        } else {
                            return Err(ParseError::new(
                                format!("unsupported word '{}' in {} expression", word, what),
                                spanned.loc.clone(),
                            ));
                        }
                    }
                },
                other => {
                    return Err(ParseError::new(
                        format!("unsupported token '{}' in {} expression", other, what),
                        spanned.loc.clone(),
                    ));
                }
            }
            pos += 1;
        }

        if stack.len() != 1 {
            let loc = tokens[pos - 1].loc.clone();
            return Err(ParseError::new(
                format!(
                    "{} expression must reduce to exactly one value, got {}",
                    what,
                    stack.len()
                ),
                loc,
            ));
        }
        Ok((stack[0], pos))
    }

    /// `include "<path>"`: tokenizes and parses the included unit in place,
    /// splicing its instructions at the current address. Paths resolve
    /// relative to the including file's directory.
    fn parse_include(
        &mut self,
        tokens: &[Spanned],
        pos: usize,
        dir: &Path,
    ) -> Result<usize, ParseError> {
        let spanned = &tokens[pos];
        let path_token = tokens.get(pos + 1).ok_or_else(|| {
            ParseError::new("expected path string after 'include'", spanned.loc.clone())
        })?;
        let path = match &path_token.token {
            Token::Str(path) => path.clone(),
            other => {
                return Err(ParseError::new(
                    format!("expected path string after 'include', got '{}'", other),
                    path_token.loc.clone(),
                ));
            }
        };

        if self.include_depth >= MAX_INCLUDE_DEPTH {
            return Err(ParseError::new(
                format!("include depth exceeded (limit {})", MAX_INCLUDE_DEPTH),
                spanned.loc.clone(),
            ));
        }

        let full = dir.join(&path);
        let source = std::fs::read_to_string(&full).map_err(|e| {
            ParseError::new(
                format!("cannot read '{}': {}", full.display(), e),
                path_token.loc.clone(),
            )
        })?;

        let name = full.display().to_string();
        let included = lexer::tokenize(&source, &name).map_err(|e| {
            ParseError::new(format!("in '{}': {}", name, e), path_token.loc.clone())
        })?;

        let included_dir = full.parent().map(Path::to_path_buf).unwrap_or_default();
        self.include_depth += 1;
        let result = self.parse_tokens(&included, &included_dir);
        self.include_depth -= 1;
        result?;

        Ok(pos + 2)
    }

    fn check_redefinition(&self, name: &str, token: &Spanned) -> Result<(), ParseError> {
        if self.is_bound(name) {
            return Err(ParseError::new(
                format!("redefinition of name '{}'", name),
                token.loc.clone(),
            ));
        }
        Ok(())
    }
}

impl Default for Parser {
    fn default() -> Self {
        Parser::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::tokenize;

    fn parse_source(source: &str) -> Result<Program, ParseError> {
        let tokens = tokenize(source, "test").unwrap();
        parse(&tokens, Path::new("."))
    }

    fn kinds(source: &str) -> Vec<InstKind> {
        parse_source(source)
            .unwrap()
            .insts
            .into_iter()
            .map(|i| i.kind)
            .collect()
    }

    #[test]
    fn test_push_and_add() {
        // Scenario A.
        assert_eq!(
            kinds("1 2 +"),
            vec![
                InstKind::PushInt(1),
                InstKind::PushInt(2),
                InstKind::Intrinsic(Intrinsic::Plus),
            ]
        );
    }

    #[test]
    fn test_if_else_end() {
        // Scenario B.
        assert_eq!(
            kinds("if 1 else 0 end"),
            vec![
                InstKind::Test { jmp: 3 },
                InstKind::PushInt(1),
                InstKind::Else { jmp: 4 },
                InstKind::PushInt(0),
                InstKind::End { jmp: None },
            ]
        );
    }

    #[test]
    fn test_if_without_else() {
        assert_eq!(
            kinds("if 1 end"),
            vec![
                InstKind::Test { jmp: 3 },
                InstKind::PushInt(1),
                InstKind::End { jmp: None },
            ]
        );
    }

    #[test]
    fn test_while_do_end() {
        // Scenario C: the `do` exits past the `end`; the `end` loops back to
        // the `while` marker.
        assert_eq!(
            kinds("while dup 0 != do 1 - end"),
            vec![
                InstKind::While,
                InstKind::Intrinsic(Intrinsic::Dup),
                InstKind::PushInt(0),
                InstKind::Intrinsic(Intrinsic::NotEqual),
                InstKind::Test { jmp: 8 },
                InstKind::PushInt(1),
                InstKind::Intrinsic(Intrinsic::Minus),
                InstKind::End { jmp: Some(0) },
            ]
        );
    }

    #[test]
    fn test_nested_if_in_while() {
        let program = parse_source("while 1 do if 2 else 3 end end").unwrap();
        assert!(program.check_jump_bounds());
        // do's test exits past the outer end
        assert_eq!(program.insts[2].kind, InstKind::Test { jmp: 9 });
        // outer end loops back to the while marker
        assert_eq!(program.insts[8].kind, InstKind::End { jmp: Some(0) });
        // inner if branches past the else; the else lands on its end
        assert_eq!(program.insts[3].kind, InstKind::Test { jmp: 6 });
        assert_eq!(program.insts[5].kind, InstKind::Else { jmp: 7 });
    }

    #[test]
    fn test_def_and_call() {
        assert_eq!(
            kinds("def foo 1 end foo"),
            vec![
                InstKind::FuncSkip { jmp: 4 },
                InstKind::FuncEntry,
                InstKind::PushInt(1),
                InstKind::FuncReturn,
                InstKind::FuncCall { target: 1 },
            ]
        );
    }

    #[test]
    fn test_recursive_call() {
        // A function can call itself: the name is bound before the body.
        assert_eq!(
            kinds("def loop loop end"),
            vec![
                InstKind::FuncSkip { jmp: 4 },
                InstKind::FuncEntry,
                InstKind::FuncCall { target: 1 },
                InstKind::FuncReturn,
            ]
        );
    }

    #[test]
    fn test_const_evaluation() {
        // Scenario D: references lower to plain integer pushes.
        assert_eq!(
            kinds("const two 1 1 + end two two +"),
            vec![
                InstKind::PushInt(2),
                InstKind::PushInt(2),
                InstKind::Intrinsic(Intrinsic::Plus),
            ]
        );
    }

    #[test]
    fn test_const_uses_prior_const() {
        assert_eq!(
            kinds("const eight 8 end const sixteen eight 2 * end sixteen"),
            vec![InstKind::PushInt(16)]
        );
    }

    #[test]
    fn test_const_subtraction_order() {
        // Left-to-right: 10 3 - is 7.
        assert_eq!(kinds("const seven 10 3 - end seven"), vec![InstKind::PushInt(7)]);
    }

    #[test]
    fn test_const_too_many_values() {
        let err = parse_source("const x 1 2 end").unwrap_err();
        assert!(err.message.contains("exactly one value"));
    }

    #[test]
    fn test_const_underflow() {
        let err = parse_source("const x 1 + end").unwrap_err();
        assert!(err.message.contains("not enough operands"));
    }

    #[test]
    fn test_const_unknown_word() {
        let err = parse_source("const x nope end").unwrap_err();
        assert!(err.message.contains("unsupported word 'nope'"));
    }

    #[test]
    fn test_const_unterminated() {
        let err = parse_source("const x 1 1 +").unwrap_err();
        assert!(err.message.contains("expected 'end'"));
    }

    #[test]
    fn test_memory_offsets_accumulate() {
        let program = parse_source("memory a 8 end memory b 16 end a b").unwrap();
        assert_eq!(program.memory_capacity, 24);
        assert_eq!(program.insts[0].kind, InstKind::MemPush { offset: 0 });
        assert_eq!(program.insts[1].kind, InstKind::MemPush { offset: 8 });
    }

    #[test]
    fn test_memory_size_expression() {
        let program = parse_source("const cell 8 end memory buf cell 4 * end buf").unwrap();
        assert_eq!(program.memory_capacity, 32);
    }

    #[test]
    fn test_memory_negative_size() {
        let err = parse_source("memory buf 0 1 - end").unwrap_err();
        assert!(err.message.contains("non-negative"));
    }

    #[test]
    fn test_namespace_exclusivity() {
        for source in [
            "def x 1 end const x 2 end",
            "const x 2 end def x 1 end",
            "memory x 8 end const x 2 end",
            "def x 1 end memory x 8 end",
            "const x 1 end const x 2 end",
        ] {
            let err = parse_source(source).unwrap_err();
            assert!(
                err.message.contains("redefinition"),
                "expected redefinition error for {:?}, got: {}",
                source,
                err.message
            );
        }
    }

    #[test]
    fn test_word_resolution_priority() {
        // A function named like nothing else still resolves; intrinsics win
        // over everything (a function cannot shadow 'dup').
        let program = parse_source("def dup 1 end dup").unwrap();
        assert_eq!(
            program.insts.last().unwrap().kind,
            InstKind::Intrinsic(Intrinsic::Dup)
        );
    }

    #[test]
    fn test_unknown_word() {
        let err = parse_source("1 2 frobnicate").unwrap_err();
        assert!(err.message.contains("unknown word 'frobnicate'"));
        assert_eq!(err.loc.col, 4);
    }

    #[test]
    fn test_unbalanced_closers() {
        assert!(parse_source("end").unwrap_err().message.contains("'end'"));
        assert!(parse_source("else").unwrap_err().message.contains("'else'"));
        assert!(parse_source("1 do").unwrap_err().message.contains("'do'"));
    }

    #[test]
    fn test_unclosed_blocks() {
        for source in ["if 1", "while 1 do", "def f 1"] {
            let err = parse_source(source).unwrap_err();
            assert!(
                err.message.contains("without matching 'end'"),
                "source {:?} gave: {}",
                source,
                err.message
            );
        }
    }

    #[test]
    fn test_else_cannot_close_loop() {
        let err = parse_source("while 1 do else end").unwrap_err();
        assert!(err.message.contains("'else'"));
    }

    #[test]
    fn test_while_requires_do() {
        let err = parse_source("while 1 end").unwrap_err();
        assert!(err.message.contains("'do'"));
    }

    #[test]
    fn test_def_name_missing() {
        let err = parse_source("def 1 end").unwrap_err();
        assert!(err.message.contains("expected function name"));
    }

    #[test]
    fn test_include_path_not_string() {
        let err = parse_source("include foo").unwrap_err();
        assert!(err.message.contains("expected path string"));
    }

    #[test]
    fn test_jump_bounds_hold() {
        let sources = [
            "if 1 else 0 end",
            "while dup 0 != do 1 - end",
            "def f if 1 else 2 end end f",
            "if 1 end if 2 end",
        ];
        for source in sources {
            let program = parse_source(source).unwrap();
            assert!(program.check_jump_bounds(), "bounds violated for {:?}", source);
        }
    }

    #[test]
    fn test_determinism() {
        let source = "def f 1 2 + end \"s\" f if 1 else 0 end";
        assert_eq!(parse_source(source).unwrap(), parse_source(source).unwrap());
    }

    mod include_tests {
        use super::*;
        use std::fs;

        fn scratch_dir(tag: &str) -> std::path::PathBuf {
            let dir = std::env::temp_dir().join(format!("tack-parser-{}-{}", tag, std::process::id()));
            fs::create_dir_all(&dir).unwrap();
            dir
        }

        #[test]
        fn test_include_splices_instructions() {
            let dir = scratch_dir("splice");
            fs::write(dir.join("lib.tack"), "const two 2 end def double two * end\n").unwrap();

            let source = "include \"lib.tack\" 21 double";
            let tokens = tokenize(source, "main.tack").unwrap();
            let program = parse(&tokens, &dir).unwrap();

            assert_eq!(
                program.insts.iter().map(|i| i.kind.clone()).collect::<Vec<_>>(),
                vec![
                    InstKind::FuncSkip { jmp: 5 },
                    InstKind::FuncEntry,
                    InstKind::PushInt(2),
                    InstKind::Intrinsic(Intrinsic::Times),
                    InstKind::FuncReturn,
                    InstKind::PushInt(21),
                    InstKind::FuncCall { target: 1 },
                ]
            );
        }

        #[test]
        fn test_include_cycle_hits_depth_limit() {
            // Scenario E: a self-including file fails with the depth error,
            // not stack exhaustion.
            let dir = scratch_dir("cycle");
            fs::write(dir.join("loop.tack"), "include \"loop.tack\"\n").unwrap();

            let tokens = tokenize("include \"loop.tack\"", "main.tack").unwrap();
            let err = parse(&tokens, &dir).unwrap_err();
            assert!(err.message.contains("include depth exceeded"));
        }

        #[test]
        fn test_include_missing_file() {
            let dir = scratch_dir("missing");
            let tokens = tokenize("include \"nope.tack\"", "main.tack").unwrap();
            let err = parse(&tokens, &dir).unwrap_err();
            assert!(err.message.contains("cannot read"));
        }

        #[test]
        fn test_include_reports_nested_lex_error() {
            let dir = scratch_dir("lexfail");
            fs::write(dir.join("bad.tack"), "\"unterminated\n").unwrap();

            let tokens = tokenize("include \"bad.tack\"", "main.tack").unwrap();
            let err = parse(&tokens, &dir).unwrap_err();
            assert!(err.message.contains("unterminated string"));
        }
    }
}
