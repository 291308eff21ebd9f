use serde::{Deserialize, Serialize};

/// Where a token came from: source name plus zero-based row/column.
///
/// Rendered 1-based by `Display` (`name:row:col`), which is the prefix of
/// every user-facing diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLocation {
    pub source: String,
    pub row: usize,
    pub col: usize,
}

impl FileLocation {
    pub fn start_of(source: &str) -> Self {
        FileLocation {
            source: source.to_string(),
            row: 0,
            col: 0,
        }
    }
}

impl std::fmt::Display for FileLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.row + 1, self.col + 1)
    }
}

/// The fixed keyword set. Everything here opens, closes, or introduces a
/// declaration; none of them survive into the instruction stream as words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Keyword {
    If,
    Else,
    End,
    While,
    Do,
    Def,
    Include,
    Memory,
    Const,
}

impl Keyword {
    /// Whole-word membership check. `ifx` is a word, not `if` + `x`.
    pub fn from_word(word: &str) -> Option<Keyword> {
        match word {
            "if" => Some(Keyword::If),
            "else" => Some(Keyword::Else),
            "end" => Some(Keyword::End),
            "while" => Some(Keyword::While),
            "do" => Some(Keyword::Do),
            "def" => Some(Keyword::Def),
            "include" => Some(Keyword::Include),
            "memory" => Some(Keyword::Memory),
            "const" => Some(Keyword::Const),
            _ => None,
        }
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::End => "end",
            Keyword::While => "while",
            Keyword::Do => "do",
            Keyword::Def => "def",
            Keyword::Include => "include",
            Keyword::Memory => "memory",
            Keyword::Const => "const",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Token {
    /// Identifier or operator text not otherwise classified.
    Word(String),
    Keyword(Keyword),
    Integer(i64),
    /// Content with the surrounding quotes stripped; backslash escapes are
    /// kept undecoded (the code generator decodes them).
    Str(String),
}

/// A token annotated with the location of the start of its lexeme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spanned {
    pub token: Token,
    pub loc: FileLocation,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Word(w) => write!(f, "{}", w),
            Token::Keyword(k) => write!(f, "{}", k),
            Token::Integer(n) => write!(f, "{}", n),
            Token::Str(s) => write!(f, "\"{}\"", s),
        }
    }
}
