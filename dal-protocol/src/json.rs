//! Object-notation (JSON) tokenizer and parser.
//!
//! The server's JSON is slightly looser than RFC 8259: strings may be quoted
//! with either `"` or `'`, and bare words other than `null`/`true`/`false` or
//! numbers are accepted as strings. Objects keep key insertion order; for a
//! repeated key the first occurrence wins.

use crate::error::ParseError;
use indexmap::IndexMap;
use std::iter::Peekable;
use std::str::CharIndices;

/// Deepest nesting of objects and arrays accepted.
pub const MAX_DEPTH: usize = 128;

/// Parsed object-notation value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    /// Numbers keep their source text so no precision is lost.
    Number(String),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up a key if this is an object.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Renders a scalar as a record field value (`Null` becomes "").
    /// Returns `None` for arrays and objects.
    pub fn to_field_string(&self) -> Option<String> {
        match self {
            Value::Null => Some(String::new()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.clone()),
            Value::String(s) => Some(s.clone()),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Short name of the value's shape, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Colon,
    Comma,
    Quoted(String),
    Bare(String),
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::LeftBrace => "'{'".to_string(),
            TokenKind::RightBrace => "'}'".to_string(),
            TokenKind::LeftBracket => "'['".to_string(),
            TokenKind::RightBracket => "']'".to_string(),
            TokenKind::Colon => "':'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Quoted(s) => format!("string {:?}", s),
            TokenKind::Bare(s) => format!("'{}'", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn is_delimiter(c: char) -> bool {
    matches!(c, '{' | '}' | '[' | ']' | ':' | ',' | '"' | '\'' | '\\') || c.is_whitespace()
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        let kind = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '\\' => return Err(ParseError::new(offset, "escape outside of a string")),
            '"' | '\'' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some((pos, ch)) = chars.next() {
                    if ch == c {
                        closed = true;
                        break;
                    }
                    if ch != '\\' {
                        text.push(ch);
                        continue;
                    }
                    let Some((_, esc)) = chars.next() else {
                        break;
                    };
                    match esc {
                        'n' => text.push('\n'),
                        't' => text.push('\t'),
                        'r' => text.push('\r'),
                        'b' => text.push('\u{0008}'),
                        'f' => text.push('\u{000C}'),
                        'u' => text.push(unicode_escape(&mut chars, pos)?),
                        other => text.push(other),
                    }
                }
                if !closed {
                    return Err(ParseError::new(offset, "unterminated string"));
                }
                tokens.push(Token {
                    kind: TokenKind::Quoted(text),
                    offset,
                });
                continue;
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if is_delimiter(ch) {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                tokens.push(Token {
                    kind: TokenKind::Bare(word),
                    offset,
                });
                continue;
            }
        };
        chars.next();
        tokens.push(Token { kind, offset });
    }

    Ok(tokens)
}

fn hex4(chars: &mut Peekable<CharIndices<'_>>, pos: usize) -> Result<u32, ParseError> {
    let mut code = 0u32;
    for _ in 0..4 {
        let digit = chars
            .next()
            .and_then(|(_, h)| h.to_digit(16))
            .ok_or_else(|| ParseError::new(pos, "invalid \\u escape"))?;
        code = code * 16 + digit;
    }
    Ok(code)
}

/// Decodes the digits of a `\uXXXX` escape whose backslash is at `pos`,
/// combining a surrogate pair into one character.
fn unicode_escape(chars: &mut Peekable<CharIndices<'_>>, pos: usize) -> Result<char, ParseError> {
    let code = hex4(chars, pos)?;
    let code = match code {
        0xD800..=0xDBFF => {
            let low = match (chars.next(), chars.next()) {
                (Some((_, '\\')), Some((_, 'u'))) => hex4(chars, pos)?,
                _ => return Err(ParseError::new(pos, "unpaired high surrogate in \\u escape")),
            };
            if !(0xDC00..=0xDFFF).contains(&low) {
                return Err(ParseError::new(pos, "unpaired high surrogate in \\u escape"));
            }
            0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00)
        }
        0xDC00..=0xDFFF => {
            return Err(ParseError::new(pos, "unpaired low surrogate in \\u escape"));
        }
        code => code,
    };
    char::from_u32(code).ok_or_else(|| ParseError::new(pos, "invalid \\u escape"))
}

fn bare_value(word: &str) -> Value {
    match word {
        "null" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        w if looks_numeric(w) => Value::Number(w.to_string()),
        w => Value::String(w.to_string()),
    }
}

fn looks_numeric(word: &str) -> bool {
    let digits = word.strip_prefix('-').unwrap_or(word);
    digits.starts_with(|c: char| c.is_ascii_digit()) && word.parse::<f64>().is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectState {
    LookingForKey,
    LookingForColon,
    LookingForValue,
    LookingForComma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayState {
    LookingForValue,
    LookingForComma,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn next(&mut self) -> Result<Token, ParseError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| ParseError::new(self.end, "unexpected end of input"))?;
        self.pos += 1;
        Ok(token)
    }

    fn unexpected(token: &Token, expected: &str) -> ParseError {
        ParseError::new(
            token.offset,
            format!("expected {}, found {}", expected, token.kind.describe()),
        )
    }

    /// Parses an object or array opened by `token`, bounding the nesting.
    fn parse_container(&mut self, token: &Token) -> Result<Value, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::new(
                token.offset,
                format!("nesting deeper than {} levels", MAX_DEPTH),
            ));
        }
        self.depth += 1;
        let value = match token.kind {
            TokenKind::LeftBrace => self.parse_object(),
            _ => self.parse_array(),
        };
        self.depth -= 1;
        value
    }

    fn parse_value(&mut self, token: Token) -> Result<Value, ParseError> {
        match token.kind {
            TokenKind::LeftBrace | TokenKind::LeftBracket => self.parse_container(&token),
            TokenKind::Quoted(s) => Ok(Value::String(s)),
            TokenKind::Bare(w) => Ok(bare_value(&w)),
            _ => Err(Self::unexpected(&token, "a value")),
        }
    }

    /// Parses the members of an object whose `{` has been consumed.
    fn parse_object(&mut self) -> Result<Value, ParseError> {
        let mut map = IndexMap::new();
        let mut state = ObjectState::LookingForKey;
        let mut key = String::new();

        loop {
            let token = self.next()?;
            state = match state {
                ObjectState::LookingForKey => match token.kind {
                    TokenKind::RightBrace if map.is_empty() => return Ok(Value::Object(map)),
                    TokenKind::Quoted(s) => {
                        key = s;
                        ObjectState::LookingForColon
                    }
                    TokenKind::Bare(w) if w == "null" => {
                        return Err(ParseError::new(token.offset, "null is not a valid key"));
                    }
                    TokenKind::Bare(w) => {
                        key = w;
                        ObjectState::LookingForColon
                    }
                    _ => return Err(Self::unexpected(&token, "a key")),
                },
                ObjectState::LookingForColon => match token.kind {
                    TokenKind::Colon => ObjectState::LookingForValue,
                    _ => return Err(Self::unexpected(&token, "':'")),
                },
                ObjectState::LookingForValue => {
                    let value = self.parse_value(token)?;
                    map.entry(std::mem::take(&mut key)).or_insert(value);
                    ObjectState::LookingForComma
                }
                ObjectState::LookingForComma => match token.kind {
                    TokenKind::Comma => ObjectState::LookingForKey,
                    TokenKind::RightBrace => return Ok(Value::Object(map)),
                    _ => return Err(Self::unexpected(&token, "',' or '}'")),
                },
            };
        }
    }

    /// Parses the items of an array whose `[` has been consumed.
    fn parse_array(&mut self) -> Result<Value, ParseError> {
        let mut items = Vec::new();
        let mut state = ArrayState::LookingForValue;

        loop {
            let token = self.next()?;
            state = match state {
                ArrayState::LookingForValue => {
                    if token.kind == TokenKind::RightBracket && items.is_empty() {
                        return Ok(Value::Array(items));
                    }
                    items.push(self.parse_value(token)?);
                    ArrayState::LookingForComma
                }
                ArrayState::LookingForComma => match token.kind {
                    TokenKind::Comma => ArrayState::LookingForValue,
                    TokenKind::RightBracket => return Ok(Value::Array(items)),
                    _ => return Err(Self::unexpected(&token, "',' or ']'")),
                },
            };
        }
    }
}

/// Parses a document whose root is an object or an array.
pub fn parse(input: &str) -> Result<Value, ParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
        depth: 0,
    };

    let first = parser.next()?;
    let root = match first.kind {
        TokenKind::LeftBrace | TokenKind::LeftBracket => parser.parse_container(&first)?,
        _ => return Err(Parser::unexpected(&first, "'{' or '['")),
    };

    if let Some(extra) = parser.tokens.get(parser.pos) {
        return Err(ParseError::new(
            extra.offset,
            format!("trailing {} after document", extra.kind.describe()),
        ));
    }

    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(value: &Value) -> Vec<&str> {
        value
            .as_object()
            .unwrap()
            .keys()
            .map(|k| k.as_str())
            .collect()
    }

    #[test]
    fn test_parse_preserves_key_order() {
        let value = parse(r#"{"a":1,"b":[1,2,"x"]}"#).unwrap();
        assert_eq!(keys(&value), vec!["a", "b"]);
        assert_eq!(value.get("a"), Some(&Value::Number("1".into())));
        assert_eq!(
            value.get("b"),
            Some(&Value::Array(vec![
                Value::Number("1".into()),
                Value::Number("2".into()),
                Value::String("x".into()),
            ]))
        );
    }

    #[test]
    fn test_bare_null_is_null() {
        let value = parse(r#"{"a":null}"#).unwrap();
        assert_eq!(value.get("a"), Some(&Value::Null));

        let value = parse(r#"{"a":"null"}"#).unwrap();
        assert_eq!(value.get("a"), Some(&Value::String("null".into())));
    }

    #[test]
    fn test_null_key_rejected() {
        let err = parse("{null:1}").unwrap_err();
        assert_eq!(err.offset, 1);
    }

    #[test]
    fn test_duplicate_key_first_wins() {
        let value = parse(r#"{"a":1,"b":2,"a":3}"#).unwrap();
        assert_eq!(keys(&value), vec!["a", "b"]);
        assert_eq!(value.get("a"), Some(&Value::Number("1".into())));
    }

    #[test]
    fn test_single_quotes_and_escapes() {
        let value = parse(r#"{'it\'s':"say \"hi\"\n", "u":"é"}"#).unwrap();
        assert_eq!(value.get("it's"), Some(&Value::String("say \"hi\"\n".into())));
        assert_eq!(value.get("u"), Some(&Value::String("é".into())));
    }

    #[test]
    fn test_surrogate_pair_combined() {
        let value = parse(r#"{"a":"\ud83d\ude00","b":"\u00e9\u4e2d"}"#).unwrap();
        assert_eq!(value.get("a"), Some(&Value::String("\u{1F600}".into())));
        assert_eq!(value.get("b"), Some(&Value::String("é中".into())));
    }

    #[test]
    fn test_lone_surrogate_rejected() {
        let err = parse(r#"{"a":"\ud83d"}"#).unwrap_err();
        assert_eq!(err.offset, 6);
        assert!(err.message.contains("surrogate"));

        assert!(parse(r#"{"a":"\ud83dx"}"#).is_err());
        assert!(parse(r#"{"a":"\ud83d\u0041"}"#).is_err());
        assert!(parse(r#"{"a":"\ude00"}"#).is_err());
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let err = parse(&"[".repeat(100_000)).unwrap_err();
        assert_eq!(err.offset, MAX_DEPTH);
        assert!(err.message.contains("nesting"));

        let deep = format!("{}{}", "[".repeat(100_000), "]".repeat(100_000));
        assert!(parse(&deep).is_err());
    }

    #[test]
    fn test_nesting_at_limit_accepted() {
        let doc = format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(parse(&doc).is_ok());

        let doc = format!(r#"{}{{"a":1}}{}"#, "[".repeat(MAX_DEPTH - 1), "]".repeat(MAX_DEPTH - 1));
        assert!(parse(&doc).is_ok());
    }

    #[test]
    fn test_scalars() {
        let value = parse("[true, false, -1.5e3, word, 0]").unwrap();
        assert_eq!(
            value,
            Value::Array(vec![
                Value::Bool(true),
                Value::Bool(false),
                Value::Number("-1.5e3".into()),
                Value::String("word".into()),
                Value::Number("0".into()),
            ])
        );
    }

    #[test]
    fn test_empty_containers() {
        assert_eq!(parse("{}").unwrap(), Value::Object(IndexMap::new()));
        assert_eq!(parse(" [ ] ").unwrap(), Value::Array(vec![]));
        let nested = parse(r#"{"x":[],"y":{}}"#).unwrap();
        assert_eq!(keys(&nested), vec!["x", "y"]);
    }

    #[test]
    fn test_error_offsets() {
        let err = parse(r#"{"a" 1}"#).unwrap_err();
        assert_eq!(err.offset, 5);
        assert!(err.message.contains("':'"));

        let err = parse(r#"{"a":1,}"#).unwrap_err();
        assert_eq!(err.offset, 7);

        let err = parse(r#"{"a":"unterminated}"#).unwrap_err();
        assert_eq!(err.offset, 5);
    }

    #[test]
    fn test_truncated_input() {
        let err = parse(r#"{"a":[1,2"#).unwrap_err();
        assert_eq!(err.offset, 9);
        assert!(err.message.contains("end of input"));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        let err = parse("{} {}").unwrap_err();
        assert_eq!(err.offset, 3);
    }

    #[test]
    fn test_root_must_be_container() {
        assert!(parse("42").is_err());
        assert!(parse("\"text\"").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_field_string() {
        assert_eq!(Value::Null.to_field_string(), Some(String::new()));
        assert_eq!(Value::Bool(true).to_field_string(), Some("true".into()));
        assert_eq!(Value::Array(vec![]).to_field_string(), None);
    }

    #[test]
    fn test_agrees_with_serde_json_on_plain_documents() {
        let doc = r#"{"RecordMeta":[{"TagName":"Genus"}],"Genus":[{"GenusId":"1","GenusName":"Zea"}]}"#;
        let ours = parse(doc).unwrap();
        let theirs: serde_json::Value = serde_json::from_str(doc).unwrap();

        let ours_keys = keys(&ours);
        let theirs_keys: Vec<&str> = theirs.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(ours_keys.len(), theirs_keys.len());
        for key in theirs_keys {
            assert!(ours_keys.contains(&key));
        }
        assert_eq!(
            ours.get("Genus").and_then(|g| g.as_array()).map(|a| a.len()),
            theirs["Genus"].as_array().map(|a| a.len())
        );
    }
}
