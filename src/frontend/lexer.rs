use crate::frontend::token::{FileLocation, Keyword, Spanned, Token};

#[derive(Debug)]
pub struct LexError {
    pub message: String,
    pub loc: FileLocation,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.loc, self.message)
    }
}

impl std::error::Error for LexError {}

/// Scanner over one source unit.
///
/// Scanning order at each position (first match wins): whitespace, `#` line
/// comment, integer literal, string literal, word. Words are maximal runs of
/// non-whitespace characters; whether a word is a keyword is decided by set
/// membership over the whole lexeme, never by prefix (so `ifx` stays a word).
///
/// Row and column are zero-based here; `FileLocation`'s `Display` renders
/// them 1-based. Columns count `char`s, not glyphs.
pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    name: String,
    row: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str, name: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            name: name.to_string(),
            row: 0,
            col: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn loc(&self) -> FileLocation {
        FileLocation {
            source: self.name.clone(),
            row: self.row,
            col: self.col,
        }
    }

    fn error(&self, message: impl Into<String>, loc: FileLocation) -> LexError {
        LexError {
            message: message.into(),
            loc,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, LexError> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                match ch {
                    ' ' => self.col += 1,
                    '\n' => {
                        self.col = 0;
                        self.row += 1;
                    }
                    '\r' => self.col = 0,
                    _ => {
                        return Err(self.error(
                            format!("unsupported whitespace character {:?}", ch),
                            self.loc(),
                        ));
                    }
                }
                self.pos += 1;
            } else if ch == '#' {
                // Consumed without advancing the column; the terminating
                // newline resets it anyway.
                while let Some(c) = self.current() {
                    if c == '\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else if ch.is_ascii_digit() {
                tokens.push(self.read_integer()?);
            } else if ch == '"' {
                tokens.push(self.read_string()?);
            } else {
                tokens.push(self.read_word());
            }
        }

        Ok(tokens)
    }

    /// Longest run of decimal digits, parsed as a signed 64-bit integer.
    fn read_integer(&mut self) -> Result<Spanned, LexError> {
        let loc = self.loc();

        let mut digits = String::new();
        while let Some(c) = self.current() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }

        let value: i64 = digits
            .parse()
            .map_err(|_| self.error(format!("malformed integer literal '{}'", digits), loc.clone()))?;

        self.col += digits.chars().count();
        Ok(Spanned {
            token: Token::Integer(value),
            loc,
        })
    }

    /// Double-quoted run on a single line. The stored value has the quotes
    /// stripped and escapes left undecoded; a backslash only prevents the
    /// following character from terminating the literal.
    fn read_string(&mut self) -> Result<Spanned, LexError> {
        let loc = self.loc();
        self.pos += 1; // opening quote
        let mut consumed = 1;

        let mut text = String::new();
        loop {
            match self.current() {
                Some('"') => {
                    self.pos += 1;
                    consumed += 1;
                    break;
                }
                Some('\\') => {
                    self.pos += 1;
                    consumed += 1;
                    match self.current() {
                        Some('\n') | None => {
                            return Err(self.error("unterminated string literal", loc));
                        }
                        Some(c) => {
                            text.push('\\');
                            text.push(c);
                            self.pos += 1;
                            consumed += 1;
                        }
                    }
                }
                Some('\n') | None => {
                    return Err(self.error("unterminated string literal", loc));
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                    consumed += 1;
                }
            }
        }

        self.col += consumed;
        Ok(Spanned {
            token: Token::Str(text),
            loc,
        })
    }

    /// Maximal run of non-whitespace characters, classified as keyword or word.
    fn read_word(&mut self) -> Spanned {
        let loc = self.loc();

        let mut word = String::new();
        while let Some(c) = self.current() {
            if c.is_whitespace() {
                break;
            }
            word.push(c);
            self.pos += 1;
        }

        self.col += word.chars().count();
        let token = match Keyword::from_word(&word) {
            Some(keyword) => Token::Keyword(keyword),
            None => Token::Word(word),
        };
        Spanned { token, loc }
    }
}

/// Convenience wrapper matching the pipeline contract.
pub fn tokenize(source: &str, name: &str) -> Result<Vec<Spanned>, LexError> {
    Lexer::new(source, name).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source, "test")
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_arithmetic() {
        let t = tokens("1 2 +");
        assert_eq!(
            t,
            vec![
                Token::Integer(1),
                Token::Integer(2),
                Token::Word("+".to_string()),
            ]
        );
    }

    #[test]
    fn test_keywords() {
        let t = tokens("if else end while do def include memory const");
        assert_eq!(
            t,
            vec![
                Token::Keyword(Keyword::If),
                Token::Keyword(Keyword::Else),
                Token::Keyword(Keyword::End),
                Token::Keyword(Keyword::While),
                Token::Keyword(Keyword::Do),
                Token::Keyword(Keyword::Def),
                Token::Keyword(Keyword::Include),
                Token::Keyword(Keyword::Memory),
                Token::Keyword(Keyword::Const),
            ]
        );
    }

    #[test]
    fn test_keyword_vs_word_boundary() {
        // Prefix of a keyword is not a keyword.
        let t = tokens("if ifx end endif do2");
        assert_eq!(
            t,
            vec![
                Token::Keyword(Keyword::If),
                Token::Word("ifx".to_string()),
                Token::Keyword(Keyword::End),
                Token::Word("endif".to_string()),
                Token::Word("do2".to_string()),
            ]
        );
    }

    #[test]
    fn test_integer_then_word() {
        // The digit run ends where the digits end; the rest is a word.
        let t = tokens("123abc");
        assert_eq!(
            t,
            vec![Token::Integer(123), Token::Word("abc".to_string())]
        );
    }

    #[test]
    fn test_integer_out_of_range() {
        let err = tokenize("9223372036854775808", "test").unwrap_err();
        assert!(err.message.contains("malformed integer literal"));
    }

    #[test]
    fn test_string_keeps_escapes_raw() {
        let t = tokens(r#""hello\nworld""#);
        assert_eq!(t, vec![Token::Str("hello\\nworld".to_string())]);
    }

    #[test]
    fn test_string_escaped_quote() {
        let t = tokens(r#""say \"hi\"""#);
        assert_eq!(t, vec![Token::Str("say \\\"hi\\\"".to_string())]);
    }

    #[test]
    fn test_unterminated_string_eof() {
        let err = tokenize("\"hello", "test").unwrap_err();
        assert!(err.message.contains("unterminated string"));
    }

    #[test]
    fn test_unterminated_string_newline() {
        let err = tokenize("\"hello\nworld\"", "test").unwrap_err();
        assert!(err.message.contains("unterminated string"));
        assert_eq!(err.loc.row, 0);
        assert_eq!(err.loc.col, 0);
    }

    #[test]
    fn test_tab_rejected() {
        let err = tokenize("1\t2", "test").unwrap_err();
        assert!(err.message.contains("unsupported whitespace"));
    }

    #[test]
    fn test_comment_to_end_of_line() {
        let t = tokens("1 # this is a comment + - *\n2");
        assert_eq!(t, vec![Token::Integer(1), Token::Integer(2)]);
    }

    #[test]
    fn test_comment_glued_to_word() {
        // '#' only starts a comment at the head of a lexeme.
        let t = tokens("abc#def");
        assert_eq!(t, vec![Token::Word("abc#def".to_string())]);
    }

    #[test]
    fn test_locations() {
        let src = "1 22\n \"ab\" x\n";
        let sp = tokenize(src, "test").unwrap();

        macro_rules! at {
            ($i:expr, $tok:expr, $row:expr, $col:expr) => {{
                assert_eq!(sp[$i].token, $tok, "token mismatch at index {}", $i);
                assert_eq!(sp[$i].loc.row, $row, "row mismatch at index {}", $i);
                assert_eq!(sp[$i].loc.col, $col, "col mismatch at index {}", $i);
            }};
        }

        assert_eq!(sp.len(), 4);
        at!(0, Token::Integer(1), 0, 0);
        at!(1, Token::Integer(22), 0, 2);
        at!(2, Token::Str("ab".to_string()), 1, 1);
        at!(3, Token::Word("x".to_string()), 1, 6);
    }

    #[test]
    fn test_carriage_return_resets_column() {
        // '\r' resets the column without advancing the row.
        let sp = tokenize("1\r2", "test").unwrap();
        assert_eq!(sp[1].loc.row, 0);
        assert_eq!(sp[1].loc.col, 0);
    }

    #[test]
    fn test_location_renders_one_based() {
        let sp = tokenize("x", "file.tack").unwrap();
        assert_eq!(sp[0].loc.to_string(), "file.tack:1:1");
    }

    #[test]
    fn test_determinism() {
        let src = "def f 1 2 + end \"s\" f";
        assert_eq!(tokenize(src, "a").unwrap(), tokenize(src, "a").unwrap());
    }
}
