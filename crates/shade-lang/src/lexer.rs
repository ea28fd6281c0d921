use std::fmt;

use shade_core::{Position, ShadeError, ShadeResult};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;

/// Source location for error reporting.
///
/// `start`/`end` are character offsets into the whole file, `line`/`column`
/// are 1-based and point at the first character of the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }
}

/// Reserved words of the shading language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Include,
    ShaderType,
    Uniform,
    Varying,
    Const,
    Return,
    Sample,
    If,
    While,
    For,
}

impl Keyword {
    pub fn from_literal(literal: &str) -> Option<Self> {
        let keyword = match literal {
            "#include" => Keyword::Include,
            "#shader_type" => Keyword::ShaderType,
            "uniform" => Keyword::Uniform,
            "varying" => Keyword::Varying,
            "const" => Keyword::Const,
            "return" => Keyword::Return,
            "SAMPLE" => Keyword::Sample,
            "if" => Keyword::If,
            "while" => Keyword::While,
            "for" => Keyword::For,
            _ => return None,
        };
        Some(keyword)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Include => "#include",
            Keyword::ShaderType => "#shader_type",
            Keyword::Uniform => "uniform",
            Keyword::Varying => "varying",
            Keyword::Const => "const",
            Keyword::Return => "return",
            Keyword::Sample => "SAMPLE",
            Keyword::If => "if",
            Keyword::While => "while",
            Keyword::For => "for",
        }
    }
}

/// Token kinds in the shading language.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Punctuation
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Colon,
    SemiColon,

    // Operators
    Minus,
    Plus,
    Star,
    Slash,
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    // Literals
    Number(f64),
    String(String),
    Identifier(String),
    Keyword(Keyword),

    /// A `//` comment; the payload is the trimmed text after the slashes.
    Comment(String),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::LeftBrace => write!(f, "{{"),
            TokenKind::RightBrace => write!(f, "}}"),
            TokenKind::LeftBracket => write!(f, "["),
            TokenKind::RightBracket => write!(f, "]"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::SemiColon => write!(f, ";"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Bang => write!(f, "!"),
            TokenKind::BangEqual => write!(f, "!="),
            TokenKind::Equal => write!(f, "="),
            TokenKind::EqualEqual => write!(f, "=="),
            TokenKind::Less => write!(f, "<"),
            TokenKind::LessEqual => write!(f, "<="),
            TokenKind::Greater => write!(f, ">"),
            TokenKind::GreaterEqual => write!(f, ">="),
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::String(s) => write!(f, "\"{}\"", s),
            TokenKind::Identifier(s) => write!(f, "{}", s),
            TokenKind::Keyword(k) => write!(f, "{}", k.as_str()),
            TokenKind::Comment(c) => write!(f, "// {}", c),
        }
    }
}

/// A token with its kind, source location and the raw text it was scanned from.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub lexeme: String,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, lexeme: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            lexeme: lexeme.into(),
        }
    }
}

/// Line-oriented scanner. Each call to [`Lexer::scan_line`] consumes the next
/// line of the file, so positions stay correct across calls.
pub struct Lexer {
    path: String,
    line: usize,
    offset: usize,
}

impl Lexer {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line: 0,
            offset: 0,
        }
    }

    /// Scan one line of source text. A trailing `\n` or `\r\n` is not scanned
    /// but still counts towards the offsets of the following lines.
    pub fn scan_line(&mut self, text: &str) -> ShadeResult<Vec<Token>> {
        self.line += 1;

        let content = match text.strip_suffix('\n') {
            Some(line) => line.strip_suffix('\r').unwrap_or(line),
            None => text,
        };
        let chars: Vec<char> = content.chars().collect();
        let mut tokens = Vec::new();
        let mut column = 0;

        while column < chars.len() {
            if chars[column].is_whitespace() {
                column += 1;
                continue;
            }

            let position = Position::new(self.line, column + 1);
            let (kind, len) = self.scan_token(&chars[column..], position)?;
            let lexeme: String = chars[column..column + len].iter().collect();
            let span = Span::new(
                self.offset + column,
                self.offset + column + len,
                self.line,
                column + 1,
            );

            tokens.push(Token::new(kind, span, lexeme));
            column += len;
        }

        self.offset += text.chars().count();

        Ok(tokens)
    }

    fn scan_token(&self, rest: &[char], position: Position) -> ShadeResult<(TokenKind, usize)> {
        let ch = rest[0];
        let next = rest.get(1).copied();

        let scanned = match ch {
            '(' => (TokenKind::LeftParen, 1),
            ')' => (TokenKind::RightParen, 1),
            '{' => (TokenKind::LeftBrace, 1),
            '}' => (TokenKind::RightBrace, 1),
            '[' => (TokenKind::LeftBracket, 1),
            ']' => (TokenKind::RightBracket, 1),
            ',' => (TokenKind::Comma, 1),
            '.' => (TokenKind::Dot, 1),
            ':' => (TokenKind::Colon, 1),
            ';' => (TokenKind::SemiColon, 1),
            '-' => (TokenKind::Minus, 1),
            '+' => (TokenKind::Plus, 1),
            '*' => (TokenKind::Star, 1),
            '!' => match next {
                Some('=') => (TokenKind::BangEqual, 2),
                _ => (TokenKind::Bang, 1),
            },
            '=' => match next {
                Some('=') => (TokenKind::EqualEqual, 2),
                _ => (TokenKind::Equal, 1),
            },
            '<' => match next {
                Some('=') => (TokenKind::LessEqual, 2),
                _ => (TokenKind::Less, 1),
            },
            '>' => match next {
                Some('=') => (TokenKind::GreaterEqual, 2),
                _ => (TokenKind::Greater, 1),
            },
            '/' => match next {
                Some('/') => {
                    let text: String = rest[2..].iter().collect();
                    (TokenKind::Comment(text.trim().to_string()), rest.len())
                }
                _ => (TokenKind::Slash, 1),
            },
            '"' => {
                let Some(close) = rest[1..].iter().position(|&c| c == '"') else {
                    let span: String = rest.iter().collect();
                    return Err(ShadeError::lex(
                        format!("unterminated string literal: {}", span),
                        &self.path,
                        position,
                        span,
                    ));
                };
                let literal: String = rest[1..close + 1].iter().collect();
                (TokenKind::String(literal), close + 2)
            }
            c if c.is_ascii_digit() => self.scan_number(rest, position)?,
            c if c.is_alphabetic() || c == '_' => scan_word(rest),
            '#' if next.is_some_and(|c| c.is_alphabetic() || c == '_') => scan_word(rest),
            _ => {
                return Err(ShadeError::lex(
                    format!("unknown token '{}'", ch),
                    &self.path,
                    position,
                    rest.iter().collect::<String>(),
                ));
            }
        };

        Ok(scanned)
    }

    fn scan_number(&self, rest: &[char], position: Position) -> ShadeResult<(TokenKind, usize)> {
        let mut len = rest.iter().take_while(|c| c.is_ascii_digit()).count();

        // fractional part only when a digit follows the dot
        if rest.get(len) == Some(&'.') && rest.get(len + 1).is_some_and(|c| c.is_ascii_digit()) {
            len += 1;
            len += rest[len..].iter().take_while(|c| c.is_ascii_digit()).count();
        }

        let text: String = rest[..len].iter().collect();
        match text.parse::<f64>() {
            Ok(value) => Ok((TokenKind::Number(value), len)),
            Err(_) => Err(ShadeError::lex(
                format!("invalid number: {}", text),
                &self.path,
                position,
                text,
            )),
        }
    }
}

/// Scans an identifier, reclassifying reserved words as keywords.
fn scan_word(rest: &[char]) -> (TokenKind, usize) {
    let len = 1 + rest[1..]
        .iter()
        .take_while(|c| c.is_alphanumeric() || **c == '_')
        .count();
    let word: String = rest[..len].iter().collect();

    match Keyword::from_literal(&word) {
        Some(keyword) => (TokenKind::Keyword(keyword), len),
        None => (TokenKind::Identifier(word), len),
    }
}

/// Tokenize a whole source stream, one line at a time.
///
/// Every line read is a suspension point; the cancellation token is checked
/// before each one.
pub async fn tokenize<R>(
    path: &str,
    mut reader: R,
    cancel: &CancellationToken,
) -> ShadeResult<Vec<Token>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lexer = Lexer::new(path);
    let mut line = String::new();
    let mut tokens = Vec::new();

    loop {
        if cancel.is_cancelled() {
            return Err(ShadeError::Cancelled);
        }

        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }

        tokens.extend(lexer.scan_line(&line)?);
    }

    Ok(tokens)
}

/// Tokenize an in-memory source string.
pub fn tokenize_str(path: &str, source: &str) -> ShadeResult<Vec<Token>> {
    let mut lexer = Lexer::new(path);
    let mut tokens = Vec::new();

    for line in source.split_inclusive('\n') {
        tokens.extend(lexer.scan_line(line)?);
    }

    Ok(tokens)
}
