//! Component-wise regular expressions over [`Name`]s.
//!
//! Patterns operate on the component sequence, never on the serialized URI:
//!
//! | syntax            | matches                                             |
//! |-------------------|-----------------------------------------------------|
//! | `<>`              | any single component                                |
//! | `<re>`            | one component whose escaped form fully matches `re` |
//! | `[<a><b>]`        | one component out of the set                        |
//! | `[^<a><b>]`       | one component not in the set                        |
//! | `( ... )`         | capturing group, numbered by its opening paren      |
//! | `a \| b`          | alternation (top level or inside a group)           |
//! | `* + ? {n} {n,m}` | repetition of the preceding atom (greedy)           |
//! | `^` / `$`         | anchor at the first / after the last component      |
//!
//! Without anchors a pattern may match any contiguous run of components.
//! A failed match is `None`, never an error; only malformed patterns are
//! errors.

use std::fmt;

use regex::Regex;

use crate::name::{Component, Name, NameError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while compiling a name pattern.
#[derive(Debug, thiserror::Error)]
pub enum RegexError {
    #[error("empty name pattern")]
    Empty,

    #[error("unbalanced '{ch}' at offset {offset} in name pattern")]
    Unbalanced { ch: char, offset: usize },

    #[error("unexpected '{ch}' at offset {offset} in name pattern")]
    Unexpected { ch: char, offset: usize },

    #[error("invalid repetition bounds at offset {0} in name pattern")]
    BadRepeat(usize),

    #[error("invalid component expression '<{expr}>': {source}")]
    Component {
        expr: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors raised while expanding captures through a template.
#[derive(Debug, thiserror::Error)]
pub enum ExpandError {
    #[error("back-reference \\{index} has no matching group (pattern has {groups})")]
    NoSuchGroup { index: usize, groups: usize },

    #[error("malformed expansion template '{0}'")]
    Malformed(String),

    #[error(transparent)]
    Name(#[from] NameError),
}

// ---------------------------------------------------------------------------
// Compiled representation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum ComponentMatcher {
    Any,
    Pattern(Regex),
}

impl ComponentMatcher {
    fn matches(&self, component: &Component) -> bool {
        match self {
            Self::Any => true,
            Self::Pattern(re) => re.is_match(&component.to_escaped()),
        }
    }
}

#[derive(Debug, Clone)]
enum Atom {
    Component(ComponentMatcher),
    Set {
        negated: bool,
        members: Vec<ComponentMatcher>,
    },
    Group {
        index: usize,
        alternatives: Vec<Vec<Piece>>,
    },
}

/// An atom with its repetition bounds.
#[derive(Debug, Clone)]
struct Piece {
    atom: Atom,
    min: usize,
    max: Option<usize>,
}

/// A compiled component-wise name pattern.
#[derive(Debug, Clone)]
pub struct NameRegex {
    source: String,
    anchored_start: bool,
    anchored_end: bool,
    alternatives: Vec<Vec<Piece>>,
    group_count: usize,
}

/// Captured sub-names of a successful match. Group 0 is the whole match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captures {
    groups: Vec<Option<Name>>,
}

impl NameRegex {
    /// Compile a pattern such as `^(<>*)<KEY><>{1,3}$`.
    pub fn compile(pattern: &str) -> Result<Self, RegexError> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(RegexError::Empty);
        }

        let mut body = trimmed;
        let anchored_start = body.starts_with('^');
        if anchored_start {
            body = &body[1..];
        }
        let anchored_end = body.ends_with('$');
        if anchored_end {
            body = &body[..body.len() - 1];
        }

        let mut parser = Parser {
            chars: body.chars().collect(),
            pos: 0,
            groups: 0,
        };
        let alternatives = parser.parse_alternatives(false)?;

        Ok(Self {
            source: trimmed.to_string(),
            anchored_start,
            anchored_end,
            alternatives,
            group_count: parser.groups,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Number of capturing groups, not counting the implicit group 0.
    pub fn group_count(&self) -> usize {
        self.group_count
    }

    pub fn is_match(&self, name: &Name) -> bool {
        self.match_name(name).is_some()
    }

    /// Match `name`, returning the captures of the leftmost match.
    pub fn match_name(&self, name: &Name) -> Option<Captures> {
        let comps = name.components();
        let last_start = if self.anchored_start { 0 } else { comps.len() };
        let matcher = Matcher { comps };

        for start in 0..=last_start {
            let mut spans: Spans = vec![None; self.group_count + 1];
            let mut end_of_match = None;
            let anchored_end = self.anchored_end;
            let matched = matcher.alternatives(
                &self.alternatives,
                start,
                &mut spans,
                &mut |end: usize, _: &mut Spans| {
                    if anchored_end && end != comps.len() {
                        return false;
                    }
                    end_of_match = Some(end);
                    true
                },
            );
            if let (true, Some(end)) = (matched, end_of_match) {
                spans[0] = Some((start, end));
                let groups = spans
                    .into_iter()
                    .map(|span| span.map(|(s, e)| name.sub_name(s, e - s)))
                    .collect();
                return Some(Captures { groups });
            }
        }
        None
    }
}

impl fmt::Display for NameRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Captures {
    /// The sub-name captured by group `index`, if that group participated.
    pub fn get(&self, index: usize) -> Option<&Name> {
        self.groups.get(index).and_then(Option::as_ref)
    }

    /// Number of groups including group 0.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Build a name from `template`, a sequence of back-references (`\1`)
    /// and literal components (`<KEY>`).
    ///
    /// Any run of backslashes before the group number is accepted, since
    /// configuration text often carries them doubled. A group that did not
    /// participate in the match expands to nothing.
    pub fn expand(&self, template: &str) -> Result<Name, ExpandError> {
        let chars: Vec<char> = template.chars().collect();
        let mut out = Name::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                c if c.is_whitespace() => i += 1,
                '\\' => {
                    while i < chars.len() && chars[i] == '\\' {
                        i += 1;
                    }
                    let digits_start = i;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                    let digits: String = chars[digits_start..i].iter().collect();
                    let index: usize = digits
                        .parse()
                        .map_err(|_| ExpandError::Malformed(template.to_string()))?;
                    if index >= self.groups.len() {
                        return Err(ExpandError::NoSuchGroup {
                            index,
                            groups: self.groups.len().saturating_sub(1),
                        });
                    }
                    if let Some(captured) = self.get(index) {
                        out.extend_from(captured);
                    }
                }
                '<' => {
                    let close = chars[i..]
                        .iter()
                        .position(|c| *c == '>')
                        .ok_or_else(|| ExpandError::Malformed(template.to_string()))?;
                    let literal: String = chars[i + 1..i + close].iter().collect();
                    out.push(Component::from_escaped(&literal)?);
                    i += close + 1;
                }
                _ => return Err(ExpandError::Malformed(template.to_string())),
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    chars: Vec<char>,
    pos: usize,
    groups: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    /// Parse `seq ('|' seq)*` up to the end of input or a closing paren,
    /// which is left for the caller.
    fn parse_alternatives(&mut self, in_group: bool) -> Result<Vec<Vec<Piece>>, RegexError> {
        let mut alternatives = Vec::new();
        let mut current = Vec::new();

        loop {
            match self.peek() {
                None => break,
                Some(')') if in_group => break,
                Some(')') => {
                    return Err(RegexError::Unbalanced {
                        ch: ')',
                        offset: self.pos,
                    })
                }
                Some('|') => {
                    self.pos += 1;
                    alternatives.push(std::mem::take(&mut current));
                }
                Some(_) => {
                    let atom = self.parse_atom()?;
                    let (min, max) = self.parse_repeat()?;
                    current.push(Piece { atom, min, max });
                }
            }
        }
        alternatives.push(current);
        Ok(alternatives)
    }

    fn parse_atom(&mut self) -> Result<Atom, RegexError> {
        let start = self.pos;
        match self.bump() {
            Some('<') => Ok(Atom::Component(self.parse_component(start)?)),
            Some('[') => {
                let negated = self.peek() == Some('^');
                if negated {
                    self.pos += 1;
                }
                let mut members = Vec::new();
                loop {
                    let at = self.pos;
                    match self.bump() {
                        Some('<') => members.push(self.parse_component(at)?),
                        Some(']') if !members.is_empty() => break,
                        Some(ch) => return Err(RegexError::Unexpected { ch, offset: at }),
                        None => {
                            return Err(RegexError::Unbalanced {
                                ch: '[',
                                offset: start,
                            })
                        }
                    }
                }
                Ok(Atom::Set { negated, members })
            }
            Some('(') => {
                self.groups += 1;
                let index = self.groups;
                let alternatives = self.parse_alternatives(true)?;
                if self.bump() != Some(')') {
                    return Err(RegexError::Unbalanced {
                        ch: '(',
                        offset: start,
                    });
                }
                Ok(Atom::Group {
                    index,
                    alternatives,
                })
            }
            Some(ch) => Err(RegexError::Unexpected { ch, offset: start }),
            None => Err(RegexError::Empty),
        }
    }

    /// Read a component expression after its opening `<`.
    fn parse_component(&mut self, open: usize) -> Result<ComponentMatcher, RegexError> {
        let mut expr = String::new();
        loop {
            match self.bump() {
                None => return Err(RegexError::Unbalanced { ch: '<', offset: open }),
                Some('>') => break,
                Some('\\') => {
                    expr.push('\\');
                    if let Some(escaped) = self.bump() {
                        expr.push(escaped);
                    }
                }
                Some(c) => expr.push(c),
            }
        }

        if expr.is_empty() {
            return Ok(ComponentMatcher::Any);
        }
        let re = Regex::new(&format!("^(?:{expr})$"))
            .map_err(|source| RegexError::Component { expr, source })?;
        Ok(ComponentMatcher::Pattern(re))
    }

    fn parse_repeat(&mut self) -> Result<(usize, Option<usize>), RegexError> {
        let bounds = match self.peek() {
            Some('*') => (0, None),
            Some('+') => (1, None),
            Some('?') => (0, Some(1)),
            Some('{') => return self.parse_braces(),
            _ => return Ok((1, Some(1))),
        };
        self.pos += 1;
        Ok(bounds)
    }

    fn parse_braces(&mut self) -> Result<(usize, Option<usize>), RegexError> {
        let open = self.pos;
        self.pos += 1;
        let mut body = String::new();
        loop {
            match self.bump() {
                Some('}') => break,
                Some(c) if c.is_ascii_digit() || c == ',' || c == ' ' => body.push(c),
                _ => return Err(RegexError::BadRepeat(open)),
            }
        }

        let parse = |s: &str| -> Result<Option<usize>, RegexError> {
            let s = s.trim();
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse().map(Some).map_err(|_| RegexError::BadRepeat(open))
            }
        };

        let (min, max) = match body.split_once(',') {
            None => {
                let n = parse(&body)?.ok_or(RegexError::BadRepeat(open))?;
                (n, Some(n))
            }
            Some((lo, hi)) => (parse(lo)?.unwrap_or(0), parse(hi)?),
        };
        if max.is_some_and(|max| max < min) {
            return Err(RegexError::BadRepeat(open));
        }
        Ok((min, max))
    }
}

// ---------------------------------------------------------------------------
// Backtracking matcher
// ---------------------------------------------------------------------------

/// Component spans per group, `(start, end)` half-open.
type Spans = Vec<Option<(usize, usize)>>;

/// Continuation invoked with the position reached so far.
type Cont<'k> = dyn FnMut(usize, &mut Spans) -> bool + 'k;

struct Matcher<'n> {
    comps: &'n [Component],
}

impl Matcher<'_> {
    fn alternatives(
        &self,
        alternatives: &[Vec<Piece>],
        pos: usize,
        spans: &mut Spans,
        k: &mut Cont<'_>,
    ) -> bool {
        for seq in alternatives {
            if self.sequence(seq, pos, spans, &mut *k) {
                return true;
            }
        }
        false
    }

    fn sequence(&self, seq: &[Piece], pos: usize, spans: &mut Spans, k: &mut Cont<'_>) -> bool {
        match seq.split_first() {
            None => k(pos, spans),
            Some((piece, rest)) => self.repeat(
                piece,
                0,
                pos,
                spans,
                &mut |next: usize, spans: &mut Spans| self.sequence(rest, next, spans, &mut *k),
            ),
        }
    }

    /// Greedy repetition: try one more iteration first, then stop.
    fn repeat(
        &self,
        piece: &Piece,
        count: usize,
        pos: usize,
        spans: &mut Spans,
        k: &mut Cont<'_>,
    ) -> bool {
        if piece.max.map_or(true, |max| count < max) {
            let matched = self.atom(
                &piece.atom,
                pos,
                spans,
                &mut |next: usize, spans: &mut Spans| {
                    if next == pos {
                        // An empty iteration cannot make progress.
                        return k(next, spans);
                    }
                    self.repeat(piece, count + 1, next, spans, &mut *k)
                },
            );
            if matched {
                return true;
            }
        }
        count >= piece.min && k(pos, spans)
    }

    fn atom(&self, atom: &Atom, pos: usize, spans: &mut Spans, k: &mut Cont<'_>) -> bool {
        match atom {
            Atom::Component(matcher) => match self.comps.get(pos) {
                Some(c) if matcher.matches(c) => k(pos + 1, spans),
                _ => false,
            },
            Atom::Set { negated, members } => match self.comps.get(pos) {
                Some(c) if members.iter().any(|m| m.matches(c)) != *negated => k(pos + 1, spans),
                _ => false,
            },
            Atom::Group {
                index,
                alternatives,
            } => {
                let index = *index;
                self.alternatives(
                    alternatives,
                    pos,
                    spans,
                    &mut |end: usize, spans: &mut Spans| {
                        let previous = spans[index];
                        spans[index] = Some((pos, end));
                        if k(end, spans) {
                            return true;
                        }
                        spans[index] = previous;
                        false
                    },
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    fn re(pattern: &str) -> NameRegex {
        NameRegex::compile(pattern).unwrap()
    }

    #[test]
    fn any_component_sequence() {
        let r = re("^(<>*)$");
        let caps = r.match_name(&name("/a/b/c")).unwrap();
        assert_eq!(caps.get(1), Some(&name("/a/b/c")));
        assert!(r.is_match(&Name::new()));
    }

    #[test]
    fn identity_from_key_name() {
        let r = re("^(<>*)<KEY><>{1,3}$");
        let caps = r.match_name(&name("/A/B/KEY/k1/self/v1")).unwrap();
        assert_eq!(caps.get(1), Some(&name("/A/B")));

        let caps = r.match_name(&name("/A/KEY/k1")).unwrap();
        assert_eq!(caps.get(1), Some(&name("/A")));

        // Four components after KEY exceed the bound.
        assert!(r.match_name(&name("/A/KEY/a/b/c/d")).is_none());
        assert!(r.match_name(&name("/A/B")).is_none());
    }

    #[test]
    fn greedy_group_takes_last_key() {
        let r = re("^(<>*)<KEY><>$");
        let caps = r.match_name(&name("/a/KEY/b/KEY/c")).unwrap();
        assert_eq!(caps.get(1), Some(&name("/a/KEY/b")));
    }

    #[test]
    fn unanchored_pattern_matches_inside() {
        let r = re("<ndn><edu>");
        assert!(r.is_match(&name("/x/ndn/edu/ucla")));
        let caps = r.match_name(&name("/x/ndn/edu/ucla")).unwrap();
        assert_eq!(caps.get(0), Some(&name("/ndn/edu")));
        assert!(!r.is_match(&name("/ndn/x/edu")));
    }

    #[test]
    fn anchors_are_respected() {
        assert!(!re("^<edu>").is_match(&name("/ndn/edu")));
        assert!(re("<edu>$").is_match(&name("/ndn/edu")));
        assert!(!re("<ndn>$").is_match(&name("/ndn/edu")));
    }

    #[test]
    fn component_expressions() {
        let r = re("^<ndn><user[0-9]+><>*$");
        assert!(r.is_match(&name("/ndn/user42/file")));
        assert!(!r.is_match(&name("/ndn/userX/file")));
        // The component expression must match the whole component.
        assert!(!re("^<use>$").is_match(&name("/user")));
    }

    #[test]
    fn sets_and_negated_sets() {
        let r = re("^[<a><b>]<c>$");
        assert!(r.is_match(&name("/a/c")));
        assert!(r.is_match(&name("/b/c")));
        assert!(!r.is_match(&name("/x/c")));

        let n = re("^[^<a><b>]<c>$");
        assert!(n.is_match(&name("/x/c")));
        assert!(!n.is_match(&name("/a/c")));
    }

    #[test]
    fn alternation_and_group_numbering() {
        let r = re("^(<a>|<b><b>)(<>)$");
        let caps = r.match_name(&name("/b/b/z")).unwrap();
        assert_eq!(caps.get(1), Some(&name("/b/b")));
        assert_eq!(caps.get(2), Some(&name("/z")));
        assert_eq!(r.group_count(), 2);

        let top = re("<a>|<b>");
        assert!(top.is_match(&name("/x/b")));
        assert!(!top.is_match(&name("/x/c")));
    }

    #[test]
    fn bounded_repetition() {
        let r = re("^<x>{2,3}$");
        assert!(!r.is_match(&name("/x")));
        assert!(r.is_match(&name("/x/x")));
        assert!(r.is_match(&name("/x/x/x")));
        assert!(!r.is_match(&name("/x/x/x/x")));
        assert!(re("^<x>{2,}$").is_match(&name("/x/x/x/x")));
        assert!(re("^<x>?<y>$").is_match(&name("/y")));
    }

    #[test]
    fn expand_with_backrefs_and_literals() {
        let r = re("^(<>*)<KEY>(<>)$");
        let caps = r.match_name(&name("/A/B/KEY/k1")).unwrap();
        assert_eq!(caps.expand("\\1").unwrap(), name("/A/B"));
        assert_eq!(caps.expand("\\\\1").unwrap(), name("/A/B"));
        assert_eq!(caps.expand("\\1<KEY>\\2").unwrap(), name("/A/B/KEY/k1"));
        assert_eq!(caps.expand("<root>\\2").unwrap(), name("/root/k1"));
        assert!(matches!(
            caps.expand("\\3"),
            Err(ExpandError::NoSuchGroup { index: 3, groups: 2 })
        ));
        assert!(matches!(caps.expand("oops"), Err(ExpandError::Malformed(_))));
    }

    #[test]
    fn malformed_patterns() {
        assert!(matches!(NameRegex::compile(""), Err(RegexError::Empty)));
        assert!(matches!(
            NameRegex::compile("^(<a>"),
            Err(RegexError::Unbalanced { ch: '(', .. })
        ));
        assert!(matches!(
            NameRegex::compile("<a>)"),
            Err(RegexError::Unbalanced { ch: ')', .. })
        ));
        assert!(matches!(
            NameRegex::compile("<a"),
            Err(RegexError::Unbalanced { ch: '<', .. })
        ));
        assert!(matches!(
            NameRegex::compile("<a>{3,1}"),
            Err(RegexError::BadRepeat(_))
        ));
        assert!(matches!(
            NameRegex::compile("<(>"),
            Err(RegexError::Component { .. })
        ));
        assert!(matches!(
            NameRegex::compile("abc"),
            Err(RegexError::Unexpected { ch: 'a', offset: 0 })
        ));
    }
}
