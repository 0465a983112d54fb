//! Protocol-buffer text encoding of a [`ClassDigestCollection`].
//!
//! The writer emits one field per line with two-space indentation per
//! nesting level, in field-number order:
//!
//! ```text
//! classes {
//!   name: "java/lang/Object"
//!   access: 33
//!   methods {
//!     name: "hashCode"
//!     desc: "()I"
//!     owner: "java/lang/Object"
//!     access: 1
//!   }
//! }
//! ```
//!
//! The parser accepts any whitespace, `#` comments, single or double quoted
//! strings and an optional `:` before a nested message, and rejects unknown
//! fields.

use std::fmt::Write as _;

use crate::digest::{ClassDigest, ClassDigestCollection, FieldDigest, MethodDigest};
use crate::error::AnalyzerError;

type Result<T> = std::result::Result<T, AnalyzerError>;

pub fn to_text(collection: &ClassDigestCollection) -> String {
    let mut out = String::new();
    for class in collection {
        open(&mut out, 0, "classes");
        string(&mut out, 1, "name", &class.name);
        integer(&mut out, 1, "access", class.access);
        if let Some(super_class) = &class.super_class {
            string(&mut out, 1, "super_class", super_class);
        }
        for interface in &class.super_interfaces {
            string(&mut out, 1, "super_interfaces", interface);
        }
        for field in &class.fields {
            open(&mut out, 1, "fields");
            string(&mut out, 2, "name", &field.name);
            string(&mut out, 2, "desc", &field.desc);
            string(&mut out, 2, "owner", &field.owner);
            integer(&mut out, 2, "access", field.access);
            close(&mut out, 1);
        }
        for method in &class.methods {
            open(&mut out, 1, "methods");
            string(&mut out, 2, "name", &method.name);
            string(&mut out, 2, "desc", &method.desc);
            string(&mut out, 2, "owner", &method.owner);
            integer(&mut out, 2, "access", method.access);
            for exception in &method.exceptions {
                string(&mut out, 2, "exceptions", exception);
            }
            close(&mut out, 1);
        }
        close(&mut out, 0);
    }
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn open(out: &mut String, depth: usize, key: &str) {
    indent(out, depth);
    out.push_str(key);
    out.push_str(" {\n");
}

fn close(out: &mut String, depth: usize) {
    indent(out, depth);
    out.push_str("}\n");
}

fn integer(out: &mut String, depth: usize, key: &str, value: u16) {
    indent(out, depth);
    let _ = writeln!(out, "{key}: {value}");
}

fn string(out: &mut String, depth: usize, key: &str, value: &str) {
    indent(out, depth);
    out.push_str(key);
    out.push_str(": \"");
    escape_into(out, value);
    out.push_str("\"\n");
}

/// C-style escaping over UTF-8 bytes; anything outside printable ASCII
/// becomes a three-digit octal escape.
pub fn escape_into(out: &mut String, value: &str) {
    for byte in value.bytes() {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\'' => out.push_str("\\'"),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(byte as char),
            _ => {
                let _ = write!(out, "\\{byte:03o}");
            }
        }
    }
}

pub fn parse(text: &str) -> Result<ClassDigestCollection> {
    let mut parser = Parser {
        lexer: Lexer::new(text),
    };
    let mut collection = ClassDigestCollection::default();
    while let Some((pos, token)) = parser.lexer.next()? {
        match token {
            Token::Ident(name) if name == "classes" => {
                parser.open_message()?;
                collection.classes.push(parser.class()?);
            }
            Token::Ident(name) => return Err(unknown_field(pos, "ClassDigestCollection", &name)),
            other => {
                return Err(error(
                    pos,
                    format!("expected a field name, found {}", other.describe()),
                ))
            }
        }
    }
    Ok(collection)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pos {
    line: usize,
    column: usize,
}

fn error(pos: Pos, message: impl Into<String>) -> AnalyzerError {
    AnalyzerError::Parse {
        line: pos.line,
        column: pos.column,
        message: message.into(),
    }
}

fn unknown_field(pos: Pos, message: &str, name: &str) -> AnalyzerError {
    error(pos, format!("unknown field `{name}` in {message}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Int(u64),
    Colon,
    Open,
    Close,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier `{name}`"),
            Token::Str(_) => "a string".to_string(),
            Token::Int(value) => format!("integer {value}"),
            Token::Colon => "`:`".to_string(),
            Token::Open => "`{`".to_string(),
            Token::Close => "`}`".to_string(),
        }
    }
}

struct Lexer<'a> {
    bytes: &'a [u8],
    offset: usize,
    line: usize,
    column: usize,
    peeked: Option<(Pos, Token)>,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            offset: 0,
            line: 1,
            column: 1,
            peeked: None,
        }
    }

    fn pos(&self) -> Pos {
        Pos {
            line: self.line,
            column: self.column,
        }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek_byte()?;
        self.offset += 1;
        if byte == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(byte)
    }

    fn peek(&mut self) -> Result<Option<&(Pos, Token)>> {
        if self.peeked.is_none() {
            self.peeked = self.lex()?;
        }
        Ok(self.peeked.as_ref())
    }

    fn next(&mut self) -> Result<Option<(Pos, Token)>> {
        match self.peeked.take() {
            Some(token) => Ok(Some(token)),
            None => self.lex(),
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(byte) = self.peek_byte() {
            if byte.is_ascii_whitespace() {
                self.bump();
            } else if byte == b'#' {
                while let Some(byte) = self.bump() {
                    if byte == b'\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn lex(&mut self) -> Result<Option<(Pos, Token)>> {
        self.skip_trivia();
        let pos = self.pos();
        let Some(byte) = self.peek_byte() else {
            return Ok(None);
        };
        let token = match byte {
            b':' | b'{' | b'}' => {
                self.bump();
                match byte {
                    b':' => Token::Colon,
                    b'{' => Token::Open,
                    _ => Token::Close,
                }
            }
            b'"' | b'\'' => self.string(pos)?,
            b'0'..=b'9' => self.integer(pos)?,
            b'_' | b'a'..=b'z' | b'A'..=b'Z' => {
                let start = self.offset;
                let is_ident = |b: u8| b == b'_' || b.is_ascii_alphanumeric();
                while self.peek_byte().is_some_and(is_ident) {
                    self.bump();
                }
                let ident = String::from_utf8_lossy(&self.bytes[start..self.offset]);
                Token::Ident(ident.into_owned())
            }
            other => {
                return Err(error(
                    pos,
                    format!("unexpected character `{}`", [other].escape_ascii()),
                ))
            }
        };
        Ok(Some((pos, token)))
    }

    fn integer(&mut self, pos: Pos) -> Result<Token> {
        let mut value = 0u64;
        while let Some(digit @ b'0'..=b'9') = self.peek_byte() {
            self.bump();
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(digit - b'0')))
                .ok_or_else(|| error(pos, "integer out of range"))?;
        }
        Ok(Token::Int(value))
    }

    fn string(&mut self, pos: Pos) -> Result<Token> {
        let quote = self.bump();
        let mut out = Vec::new();
        loop {
            let here = self.pos();
            match self.bump() {
                None | Some(b'\n') => return Err(error(pos, "unterminated string")),
                Some(byte) if Some(byte) == quote => break,
                Some(b'\\') => {
                    let escaped = self
                        .bump()
                        .ok_or_else(|| error(here, "unterminated escape sequence"))?;
                    match escaped {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'"' | b'\'' | b'\\' => out.push(escaped),
                        b'0'..=b'7' => {
                            let mut value = u32::from(escaped - b'0');
                            for _ in 0..2 {
                                match self.peek_byte() {
                                    Some(digit @ b'0'..=b'7') => {
                                        self.bump();
                                        value = value * 8 + u32::from(digit - b'0');
                                    }
                                    _ => break,
                                }
                            }
                            let byte = u8::try_from(value)
                                .map_err(|_| error(here, "octal escape out of range"))?;
                            out.push(byte);
                        }
                        other => {
                            return Err(error(
                                here,
                                format!("unknown escape `\\{}`", [other].escape_ascii()),
                            ))
                        }
                    }
                }
                Some(byte) => out.push(byte),
            }
        }
        String::from_utf8(out)
            .map(Token::Str)
            .map_err(|_| error(pos, "string is not valid UTF-8"))
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl Parser<'_> {
    fn expect_next(&mut self, what: &str) -> Result<(Pos, Token)> {
        let end = self.lexer.pos();
        self.lexer
            .next()?
            .ok_or_else(|| error(end, format!("unexpected end of input, expected {what}")))
    }

    fn colon(&mut self) -> Result<()> {
        match self.expect_next("`:`")? {
            (_, Token::Colon) => Ok(()),
            (pos, other) => Err(error(pos, format!("expected `:`, found {}", other.describe()))),
        }
    }

    fn string(&mut self) -> Result<String> {
        self.colon()?;
        match self.expect_next("a string")? {
            (_, Token::Str(value)) => Ok(value),
            (pos, other) => Err(error(
                pos,
                format!("expected a string, found {}", other.describe()),
            )),
        }
    }

    fn access(&mut self) -> Result<u16> {
        self.colon()?;
        match self.expect_next("an integer")? {
            (pos, Token::Int(value)) => {
                u16::try_from(value).map_err(|_| error(pos, "access flags out of range"))
            }
            (pos, other) => Err(error(
                pos,
                format!("expected an integer, found {}", other.describe()),
            )),
        }
    }

    /// An optional `:` followed by `{`.
    fn open_message(&mut self) -> Result<()> {
        if matches!(self.lexer.peek()?, Some((_, Token::Colon))) {
            self.lexer.next()?;
        }
        match self.expect_next("`{`")? {
            (_, Token::Open) => Ok(()),
            (pos, other) => Err(error(pos, format!("expected `{{`, found {}", other.describe()))),
        }
    }

    /// Reads `name value` pairs until the closing `}`. `field` returns
    /// `false` for names the message does not define.
    fn fields(
        &mut self,
        message: &str,
        mut field: impl FnMut(&mut Self, &str) -> Result<bool>,
    ) -> Result<()> {
        loop {
            match self.expect_next("`}`")? {
                (_, Token::Close) => return Ok(()),
                (pos, Token::Ident(name)) => {
                    if !field(self, &name)? {
                        return Err(unknown_field(pos, message, &name));
                    }
                }
                (pos, other) => {
                    return Err(error(
                        pos,
                        format!("expected a field name, found {}", other.describe()),
                    ))
                }
            }
        }
    }

    fn class(&mut self) -> Result<ClassDigest> {
        let mut class = ClassDigest::default();
        self.fields("ClassDigest", |p, name| {
            match name {
                "name" => class.name = p.string()?,
                "access" => class.access = p.access()?,
                "super_class" => class.super_class = Some(p.string()?),
                "super_interfaces" => class.super_interfaces.push(p.string()?),
                "fields" => {
                    p.open_message()?;
                    class.fields.push(p.field()?);
                }
                "methods" => {
                    p.open_message()?;
                    class.methods.push(p.method()?);
                }
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(class)
    }

    fn field(&mut self) -> Result<FieldDigest> {
        let mut field = FieldDigest::default();
        self.fields("Field", |p, name| {
            match name {
                "name" => field.name = p.string()?,
                "desc" => field.desc = p.string()?,
                "owner" => field.owner = p.string()?,
                "access" => field.access = p.access()?,
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(field)
    }

    fn method(&mut self) -> Result<MethodDigest> {
        let mut method = MethodDigest::default();
        self.fields("Method", |p, name| {
            match name {
                "name" => method.name = p.string()?,
                "desc" => method.desc = p.string()?,
                "owner" => method.owner = p.string()?,
                "access" => method.access = p.access()?,
                "exceptions" => method.exceptions.push(p.string()?),
                _ => return Ok(false),
            }
            Ok(true)
        })?;
        Ok(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> ClassDigestCollection {
        ClassDigestCollection {
            classes: vec![
                ClassDigest {
                    name: "java/lang/Object".into(),
                    access: 33,
                    super_class: None,
                    super_interfaces: vec![],
                    fields: vec![],
                    methods: vec![MethodDigest {
                        name: "wait".into(),
                        desc: "(J)V".into(),
                        owner: "java/lang/Object".into(),
                        access: 17,
                        exceptions: vec!["java/lang/InterruptedException".into()],
                    }],
                },
                ClassDigest {
                    name: "java/util/Map$Entry".into(),
                    access: 1537,
                    super_class: Some("java/lang/Object".into()),
                    super_interfaces: vec!["java/lang/Cloneable".into()],
                    fields: vec![FieldDigest {
                        name: "caf\u{e9}".into(),
                        desc: "I".into(),
                        owner: "java/util/Map$Entry".into(),
                        access: 25,
                    }],
                    methods: vec![],
                },
            ],
        }
    }

    #[test]
    fn writes_one_field_per_line() {
        let text = to_text(&sample());
        let expected = "\
classes {
  name: \"java/lang/Object\"
  access: 33
  methods {
    name: \"wait\"
    desc: \"(J)V\"
    owner: \"java/lang/Object\"
    access: 17
    exceptions: \"java/lang/InterruptedException\"
  }
}
classes {
  name: \"java/util/Map$Entry\"
  access: 1537
  super_class: \"java/lang/Object\"
  super_interfaces: \"java/lang/Cloneable\"
  fields {
    name: \"caf\\303\\251\"
    desc: \"I\"
    owner: \"java/util/Map$Entry\"
    access: 25
  }
}
";
        assert_eq!(text, expected);
    }

    #[test]
    fn parses_what_it_writes() {
        let collection = sample();
        assert_eq!(parse(&to_text(&collection)).unwrap(), collection);
        assert_eq!(parse("").unwrap(), ClassDigestCollection::default());
    }

    #[test]
    fn escapes_quotes_and_control_characters() {
        let mut out = String::new();
        escape_into(&mut out, "a\"b'c\\d\ne\tf\u{1}");
        assert_eq!(out, "a\\\"b\\'c\\\\d\\ne\\tf\\001");
    }

    #[test]
    fn accepts_comments_single_quotes_and_colon_before_messages() {
        let text = "# generated\n\
            classes: { name: 'a/B' access: 1 # trailing\n \
            fields: { name: \"x\" desc: 'I' owner: 'a/B' access: 4 } }";
        let collection = parse(text).unwrap();
        assert_eq!(collection.classes[0].name, "a/B");
        assert_eq!(collection.classes[0].fields[0].access, 4);
    }

    #[test]
    fn reports_position_of_unknown_fields() {
        let err = parse("classes {\n  name: \"a/B\"\n  color: \"red\"\n}\n").unwrap_err();
        match err {
            AnalyzerError::Parse {
                line,
                column,
                message,
            } => {
                assert_eq!((line, column), (3, 3));
                assert_eq!(message, "unknown field `color` in ClassDigest");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_malformed_input() {
        for text in [
            "classes {",
            "classes { name \"a\" }",
            "classes { access: \"1\" }",
            "classes { access: 70000 }",
            "classes { name: \"unterminated }",
            "classes { name: \"\\q\" }",
            "classes { name: \"\\377\" }",
            "widgets { }",
            "classes { fields { bogus: 1 } }",
            "}",
        ] {
            assert!(
                matches!(parse(text), Err(AnalyzerError::Parse { .. })),
                "accepted {text:?}"
            );
        }
    }
}
