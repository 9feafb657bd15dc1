//! Configuration tree and its INFO text format.
//!
//! ```text
//! ; comment
//! rule
//! {
//!   id "Simple Rule"
//!   for data
//!   filter
//!   {
//!     type name
//!     name /a
//!     relation is-prefix-of
//!   }
//! }
//! trust-anchor { type any }
//! ```
//!
//! A key and its value share a line; a `{ ... }` block may follow on the
//! same or a later line. Values may be double-quoted, with `\"`, `\\`, `\n`
//! and `\t` escapes. A `;` outside quotes starts a comment.

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSection {
    entries: Vec<ConfigEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub children: ConfigSection,
    /// 1-based source line, 0 for programmatically built entries.
    pub line: usize,
}

impl ConfigSection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str, source_name: &str) -> Result<Self, ConfigError> {
        let tokens = tokenize(text, source_name)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            source_name,
        };
        parser.section(None)
    }

    /// Builder-style append of a leaf entry.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value, ConfigSection::new());
        self
    }

    /// Builder-style append of a nested block.
    pub fn with_child(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        children: ConfigSection,
    ) -> Self {
        self.push(key, value, children);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>, children: ConfigSection) {
        self.entries.push(ConfigEntry {
            key: key.into(),
            value: value.into(),
            children,
            line: 0,
        });
    }

    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConfigEntry> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// First entry with `key` (case-insensitive).
    pub fn get(&self, key: &str) -> Option<&ConfigEntry> {
        self.entries.iter().find(|e| e.key.eq_ignore_ascii_case(key))
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key).map(|e| e.value.as_str())
    }
}

impl<'a> IntoIterator for &'a ConfigSection {
    type Item = &'a ConfigEntry;
    type IntoIter = std::slice::Iter<'a, ConfigEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Word(String),
    Open,
    Close,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    line: usize,
}

fn syntax(source_name: &str, line: usize, message: impl Into<String>) -> ConfigError {
    ConfigError::Syntax {
        source_name: source_name.to_string(),
        line,
        message: message.into(),
    }
}

fn tokenize(text: &str, source_name: &str) -> Result<Vec<Token>, ConfigError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = 1;

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            ';' => {
                while chars.next_if(|&c| c != '\n').is_some() {}
            }
            '{' => {
                chars.next();
                tokens.push(Token { kind: TokenKind::Open, line });
            }
            '}' => {
                chars.next();
                tokens.push(Token { kind: TokenKind::Close, line });
            }
            '"' => {
                let start = line;
                chars.next();
                let mut word = String::new();
                loop {
                    match chars.next() {
                        None => return Err(syntax(source_name, start, "unterminated string")),
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some('n') => word.push('\n'),
                            Some('t') => word.push('\t'),
                            Some(other @ ('"' | '\\')) => word.push(other),
                            Some(other) => {
                                word.push('\\');
                                word.push(other);
                            }
                            None => {
                                return Err(syntax(source_name, start, "unterminated string"))
                            }
                        },
                        Some('\n') => {
                            line += 1;
                            word.push('\n');
                        }
                        Some(other) => word.push(other),
                    }
                }
                tokens.push(Token { kind: TokenKind::Word(word), line: start });
            }
            _ => {
                // Braces only delimit when they start a token, so `<>{1,3}`
                // stays part of a pattern value.
                let mut word = String::new();
                while let Some(c) = chars.next_if(|&c| !c.is_whitespace() && c != ';') {
                    word.push(c);
                }
                tokens.push(Token { kind: TokenKind::Word(word), line });
            }
        }
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    source_name: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    /// Parse entries until the matching `}` (when `opened_at` is set) or the
    /// end of input.
    fn section(&mut self, opened_at: Option<usize>) -> Result<ConfigSection, ConfigError> {
        let mut section = ConfigSection::new();
        loop {
            let Some(token) = self.peek().cloned() else {
                return match opened_at {
                    Some(line) => Err(syntax(self.source_name, line, "unclosed '{'")),
                    None => Ok(section),
                };
            };
            self.pos += 1;
            match token.kind {
                TokenKind::Close => {
                    return match opened_at {
                        Some(_) => Ok(section),
                        None => Err(syntax(self.source_name, token.line, "unmatched '}'")),
                    };
                }
                TokenKind::Open => {
                    return Err(syntax(self.source_name, token.line, "'{' without a key"));
                }
                TokenKind::Word(key) => {
                    let entry = self.entry(key, token.line)?;
                    section.entries.push(entry);
                }
            }
        }
    }

    fn entry(&mut self, key: String, line: usize) -> Result<ConfigEntry, ConfigError> {
        let mut value = String::new();
        if let Some(Token { kind: TokenKind::Word(w), line: l }) = self.peek() {
            if *l == line {
                value = w.clone();
                self.pos += 1;
            }
        }

        let mut children = ConfigSection::new();
        if let Some(Token { kind: TokenKind::Open, line: open_line }) = self.peek() {
            let open_line = *open_line;
            self.pos += 1;
            children = self.section(Some(open_line))?;
        }

        Ok(ConfigEntry {
            key,
            value,
            children,
            line,
        })
    }
}
