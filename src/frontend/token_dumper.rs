use crate::frontend::token::{Spanned, Token};

pub struct TokenDumper {
    pub color: bool,
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self { color: true }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const GRN: &'static str = "\x1b[32m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";
    const MAG: &'static str = "\x1b[35m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn dump(&self, tokens: &[Spanned]) {
        for s in tokens {
            self.print_one(s);
        }
    }

    fn print_one(&self, s: &Spanned) {
        let kind = self.kind(&s.token);
        let colr = if self.color { self.color(&s.token) } else { "" };
        let reset = if self.color { Self::RESET } else { "" };

        println!(
            "[{:02}:{:02}] {}{:<8} {:?}{}",
            s.loc.row + 1,
            s.loc.col + 1,
            colr,
            kind,
            s.token,
            reset
        );
    }

    fn kind(&self, t: &Token) -> &'static str {
        match t {
            Token::Integer(_) => "INT",
            Token::Str(_) => "STRING",
            Token::Word(_) => "WORD",
            Token::Keyword(_) => "KEYWORD",
        }
    }

    fn color(&self, t: &Token) -> &'static str {
        match t {
            Token::Str(_) => Self::GRN,
            Token::Integer(_) => Self::CYN,
            Token::Word(_) => Self::YEL,
            Token::Keyword(_) => Self::MAG,
        }
    }
}
