//! Type expressions as written in module manifests.
//!
//! Grammar (whitespace insignificant):
//!
//! ```text
//! expr    := primary ('|' primary)*
//! primary := literal | name ('[' (expr (',' expr)* ','?)? ']')?
//! name    := ident ('.' ident)*
//! literal := 'str' | "str" | number | True | False
//! ```
//!
//! Parsing never fails: text that does not fit the grammar, or that nests
//! brackets deeper than [`MAX_DEPTH`], becomes [`TypeRef::Opaque`] and later
//! serializes as `Unknown`.

use super::serialize::MAX_DEPTH;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal value appearing inside a type expression, e.g. `Literal["a", 1]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LiteralValue {
    Str(String),
    /// Kept as written so `1.50` stays `1.50`.
    Number(String),
    Bool(bool),
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{}", s),
            Self::Number(n) => write!(f, "{}", n),
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
        }
    }
}

/// A type reference: the input of the schema serializer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TypeRef {
    /// `Annotated[base, meta...]`
    Annotated {
        base: Box<TypeRef>,
        metadata: Vec<TypeRef>,
    },
    /// A bare name, resolved against a [`TypeCatalog`](super::TypeCatalog).
    Named(String),
    /// `origin[args...]`; `origin[]` has no args.
    Generic { origin: String, args: Vec<TypeRef> },
    Literal(LiteralValue),
    /// Anything the parser could not make sense of, kept verbatim.
    Opaque(String),
}

impl TypeRef {
    pub fn parse(src: &str) -> Self {
        let mut parser = Parser::new(src);
        match parser.expr() {
            Some(ty) if parser.at_end() => ty,
            _ => TypeRef::Opaque(src.trim().to_string()),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn generic(origin: impl Into<String>, args: Vec<TypeRef>) -> Self {
        TypeRef::Generic {
            origin: origin.into(),
            args,
        }
    }

    /// Text used when this reference appears as `Annotated` metadata.
    /// String literals render without quotes.
    pub fn metadata_text(&self) -> String {
        match self {
            TypeRef::Literal(value) => value.to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Annotated { base, metadata } => {
                write!(f, "Annotated[{}", base)?;
                for m in metadata {
                    write!(f, ", {}", m)?;
                }
                write!(f, "]")
            }
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::Generic { origin, args } => {
                write!(f, "{}[", origin)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, "]")
            }
            TypeRef::Literal(LiteralValue::Str(s)) => write!(f, "'{}'", s),
            TypeRef::Literal(other) => write!(f, "{}", other),
            TypeRef::Opaque(repr) => write!(f, "{}", repr),
        }
    }
}

impl From<String> for TypeRef {
    fn from(s: String) -> Self {
        TypeRef::parse(&s)
    }
}

impl From<&str> for TypeRef {
    fn from(s: &str) -> Self {
        TypeRef::parse(s)
    }
}

impl From<TypeRef> for String {
    fn from(ty: TypeRef) -> Self {
        ty.to_string()
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    /// Open `[` on the current path.
    depth: usize,
}

impl Parser {
    fn new(src: &str) -> Self {
        Self {
            chars: src.chars().collect(),
            pos: 0,
            depth: 0,
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.pos >= self.chars.len()
    }

    fn skip_ws(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Option<TypeRef> {
        let first = self.primary()?;
        if self.peek() != Some('|') {
            return Some(first);
        }
        let mut members = vec![first];
        while self.eat('|') {
            members.push(self.primary()?);
        }
        Some(TypeRef::generic("Union", members))
    }

    fn primary(&mut self) -> Option<TypeRef> {
        match self.peek()? {
            '\'' | '"' => self.string().map(|s| TypeRef::Literal(LiteralValue::Str(s))),
            c if c.is_ascii_digit() || c == '-' => self.number(),
            c if c.is_alphabetic() || c == '_' => {
                let name = self.name();
                match name.as_str() {
                    "True" | "true" => return Some(TypeRef::Literal(LiteralValue::Bool(true))),
                    "False" | "false" => {
                        return Some(TypeRef::Literal(LiteralValue::Bool(false)))
                    }
                    _ => {}
                }
                if !self.eat('[') {
                    return Some(TypeRef::Named(name));
                }
                if self.depth >= MAX_DEPTH {
                    return None;
                }
                self.depth += 1;
                let args = self.args()?;
                self.depth -= 1;
                if is_annotated(&name) {
                    let mut args = args.into_iter();
                    let base = args.next()?;
                    return Some(TypeRef::Annotated {
                        base: Box::new(base),
                        metadata: args.collect(),
                    });
                }
                Some(TypeRef::Generic { origin: name, args })
            }
            _ => None,
        }
    }

    /// Arguments after an opening `[`, consuming the closing `]`.
    fn args(&mut self) -> Option<Vec<TypeRef>> {
        let mut args = Vec::new();
        if self.eat(']') {
            return Some(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(']') {
                return Some(args);
            }
            if !self.eat(',') {
                return None;
            }
            // trailing comma
            if self.eat(']') {
                return Some(args);
            }
        }
    }

    fn name(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            if c.is_alphanumeric() || c == '_' || c == '.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn string(&mut self) -> Option<String> {
        let quote = self.chars[self.pos];
        self.pos += 1;
        let mut out = String::new();
        while let Some(&c) = self.chars.get(self.pos) {
            self.pos += 1;
            match c {
                '\\' => {
                    let escaped = *self.chars.get(self.pos)?;
                    self.pos += 1;
                    out.push(escaped);
                }
                c if c == quote => return Some(out),
                c => out.push(c),
            }
        }
        None
    }

    fn number(&mut self) -> Option<TypeRef> {
        let start = self.pos;
        if self.chars[self.pos] == '-' {
            self.pos += 1;
        }
        while self.pos < self.chars.len()
            && (self.chars[self.pos].is_ascii_digit() || self.chars[self.pos] == '.')
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if text == "-" {
            return None;
        }
        Some(TypeRef::Literal(LiteralValue::Number(text)))
    }
}

fn is_annotated(name: &str) -> bool {
    matches!(
        name,
        "Annotated" | "typing.Annotated" | "typing_extensions.Annotated"
    )
}
