use crate::{
    collection::{OrdMap, OrdSet},
    compare::key_comparator,
    path::{RelativePointer, join},
    text::TextError,
    types::{Type, close, unfold},
    value::{DateTime, Shared, Value},
};
use rustc_hash::FxHashMap;

///
/// Type-directed parsing
///
/// Recursive descent over the surface syntax of `text::print`, driven by
/// the descriptor. Mutable containers are registered under their data
/// path before their contents parse, so alias pointers — including
/// cyclic ones — resolve to the already-created cell and sharing
/// survives the round trip.
///

pub fn parse(input: &str, ty: &Type) -> Result<Value, TextError> {
    let mut parser = Parser::new(input);
    let value = parser.parse_value(ty, &[])?;
    parser.skip_ws();
    if parser.peek().is_some() {
        return Err(parser.fail("unexpected trailing input"));
    }
    Ok(value)
}

struct Parser<'s> {
    src: &'s str,
    pos: usize,
    line: u32,
    col: u32,
    path: Vec<String>,
    registry: FxHashMap<String, Value>,
}

type Mark = (usize, u32, u32);

impl<'s> Parser<'s> {
    fn new(src: &'s str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            col: 1,
            path: Vec::new(),
            registry: FxHashMap::default(),
        }
    }

    ///
    /// CURSOR
    ///

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\r' | '\n')) {
            self.bump();
        }
    }

    fn take_while(&mut self, out: &mut String, keep: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !keep(c) {
                break;
            }
            out.push(c);
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            return true;
        }
        false
    }

    fn expect(&mut self, expected: char) -> Result<(), TextError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.fail(&format!("expected `{expected}`")))
        }
    }

    const fn mark(&self) -> Mark {
        (self.pos, self.line, self.col)
    }

    const fn restore(&mut self, mark: Mark) {
        self.pos = mark.0;
        self.line = mark.1;
        self.col = mark.2;
    }

    ///
    /// ERRORS
    ///

    fn fail(&self, message: &str) -> TextError {
        self.fail_at((self.line, self.col), message)
    }

    fn fail_at(&self, position: (u32, u32), message: &str) -> TextError {
        TextError::Parse {
            message: message.to_string(),
            path: join(&self.path),
            line: position.0,
            col: position.1,
        }
    }

    ///
    /// VALUES
    ///

    fn parse_value<'t>(&mut self, ty: &'t Type, env: &[&'t Type]) -> Result<Value, TextError> {
        let Some((ty, env)) = unfold(ty, env) else {
            return Err(self.fail("degenerate recursive descriptor"));
        };
        self.skip_ws();

        if ty.is_mutable_container() {
            if let Some(value) = self.try_alias(ty)? {
                return Ok(value);
            }
        }

        match ty {
            Type::Never => Err(self.fail("cannot parse a value of .Never")),

            Type::Null => {
                self.keyword("null")?;
                Ok(Value::Null)
            }

            Type::Boolean => {
                let start = (self.line, self.col);
                match self.word().as_str() {
                    "true" => Ok(Value::Boolean(true)),
                    "false" => Ok(Value::Boolean(false)),
                    _ => Err(self.fail_at(start, "expected boolean")),
                }
            }

            Type::Integer => self.parse_integer(),
            Type::Float => self.parse_float(),
            Type::String => self.parse_string().map(Value::String),
            Type::DateTime => self.parse_datetime(),
            Type::Blob => self.parse_blob(),

            Type::Ref(inner) => {
                self.expect('&')?;
                let cell = Shared::new(Value::Null);
                let value = Value::Ref(cell.clone());
                self.register(&value);
                self.path.push("&".to_string());
                let inner_value = self.parse_value(inner, &env);
                self.path.pop();
                *cell.borrow_mut() = inner_value?;
                Ok(value)
            }

            Type::Array(element) => {
                self.expect('[')?;
                let cell = Shared::new(Vec::new());
                let value = Value::Array(cell.clone());
                self.register(&value);
                self.skip_ws();
                if self.eat(']') {
                    return Ok(value);
                }
                let mut index = 0usize;
                loop {
                    self.path.push(index.to_string());
                    let item = self.parse_value(element, &env);
                    self.path.pop();
                    cell.borrow_mut().push(item?);
                    index += 1;
                    self.skip_ws();
                    if self.eat(']') {
                        break;
                    }
                    self.expect(',')?;
                }
                Ok(value)
            }

            Type::Set(element) => {
                self.expect('{')?;
                let closed = close(element, &env);
                let cmp =
                    key_comparator(&closed).map_err(|e| self.fail(&e.to_string()))?;
                let cell = Shared::new(OrdSet::new(cmp));
                let value = Value::Set(cell.clone());
                self.register(&value);
                self.skip_ws();
                if self.eat('}') {
                    return Ok(value);
                }
                let mut index = 0usize;
                loop {
                    self.path.push(index.to_string());
                    let item = self.parse_value(element, &env);
                    self.path.pop();
                    if !cell.borrow_mut().insert(item?) {
                        return Err(self.fail("duplicate set element"));
                    }
                    index += 1;
                    self.skip_ws();
                    if self.eat('}') {
                        break;
                    }
                    self.expect(',')?;
                }
                Ok(value)
            }

            Type::Dict(key_ty, value_ty) => {
                self.expect('{')?;
                let closed = close(key_ty, &env);
                let cmp =
                    key_comparator(&closed).map_err(|e| self.fail(&e.to_string()))?;
                let cell = Shared::new(OrdMap::new(cmp));
                let value = Value::Dict(cell.clone());
                self.register(&value);
                self.skip_ws();
                // the empty dict is spelled `{:}`
                if self.eat(':') {
                    self.expect('}')?;
                    return Ok(value);
                }
                if self.eat('}') {
                    return Err(self.fail("expected `{:}` for an empty dict"));
                }
                let mut index = 0usize;
                loop {
                    self.path.push(index.to_string());
                    self.path.push(".key".to_string());
                    let entry_key = self.parse_value(key_ty, &env);
                    self.path.pop();
                    let entry_key = match entry_key {
                        Ok(k) => k,
                        Err(e) => {
                            self.path.pop();
                            return Err(e);
                        }
                    };
                    self.skip_ws();
                    if let Err(e) = self.expect(':') {
                        self.path.pop();
                        return Err(e);
                    }
                    self.path.push(".value".to_string());
                    let entry_value = self.parse_value(value_ty, &env);
                    self.path.pop();
                    self.path.pop();
                    if cell.borrow_mut().insert(entry_key, entry_value?).is_some() {
                        return Err(self.fail("duplicate dict key"));
                    }
                    index += 1;
                    self.skip_ws();
                    if self.eat('}') {
                        break;
                    }
                    self.expect(',')?;
                }
                Ok(value)
            }

            Type::Struct(fields) => {
                self.expect('(')?;
                let mut values: Vec<Option<Value>> = fields.iter().map(|_| None).collect();
                self.skip_ws();
                if !self.eat(')') {
                    loop {
                        self.skip_ws();
                        let name_start = (self.line, self.col);
                        let name = self.parse_identifier()?;
                        let after_name = (self.line, self.col);
                        self.skip_ws();
                        if !self.eat('=') {
                            return Err(self.fail_at(
                                after_name,
                                &format!("expected `=` after field name `{name}`"),
                            ));
                        }
                        let Some(at) = fields.iter().position(|f| f.name == name) else {
                            return Err(
                                self.fail_at(name_start, &format!("unknown field `{name}`"))
                            );
                        };
                        if values[at].is_some() {
                            return Err(
                                self.fail_at(name_start, &format!("duplicate field `{name}`"))
                            );
                        }
                        self.path.push(format!(".{name}"));
                        let item = self.parse_value(&fields[at].ty, &env);
                        self.path.pop();
                        values[at] = Some(item?);
                        self.skip_ws();
                        if self.eat(')') {
                            break;
                        }
                        self.expect(',')?;
                    }
                }

                let mut entries = Vec::with_capacity(fields.len());
                for (field, slot) in fields.iter().zip(values) {
                    match slot {
                        Some(item) => entries.push((field.name.clone(), item)),
                        None => {
                            return Err(
                                self.fail(&format!("missing field `{}`", field.name))
                            );
                        }
                    }
                }
                Ok(Value::Struct(entries))
            }

            Type::Variant(cases) => {
                self.expect('.')?;
                let tag_start = (self.line, self.col);
                let tag = self.parse_identifier()?;
                let Some(case) = cases.iter().find(|c| c.tag == tag) else {
                    return Err(self.fail_at(tag_start, &format!("unknown variant tag `.{tag}`")));
                };

                let nullary = matches!(unfold(&case.ty, &env), Some((Type::Null, _)));
                if nullary {
                    return Ok(Value::variant(tag, Value::Null));
                }
                self.path.push(".value".to_string());
                let payload = self.parse_value(&case.ty, &env);
                self.path.pop();
                Ok(Value::variant(tag, payload?))
            }

            Type::Function(_) | Type::AsyncFunction(_) => {
                Err(self.fail("cannot parse an opaque function value"))
            }

            // unfold never yields these
            Type::Recursive(_) | Type::Rec(_) => {
                Err(self.fail("unresolved recursive descriptor"))
            }
        }
    }

    ///
    /// TOKENS
    ///

    fn word(&mut self) -> String {
        let mut out = String::new();
        self.take_while(&mut out, |c| c.is_ascii_alphabetic());
        out
    }

    fn keyword(&mut self, expected: &str) -> Result<(), TextError> {
        let start = (self.line, self.col);
        if self.word() == expected {
            Ok(())
        } else {
            Err(self.fail_at(start, &format!("expected {expected}")))
        }
    }

    fn parse_integer(&mut self) -> Result<Value, TextError> {
        let start = (self.line, self.col);
        let mut token = String::new();
        if self.peek() == Some('-') {
            token.push('-');
            self.bump();
        }
        if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            return Err(self.fail("expected integer"));
        }
        self.take_while(&mut token, |c| c.is_ascii_digit());
        token
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| self.fail_at(start, "integer out of range"))
    }

    fn parse_float(&mut self) -> Result<Value, TextError> {
        let start = (self.line, self.col);

        if matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
            return match self.word().as_str() {
                "NaN" => Ok(Value::Float(f64::NAN)),
                "Infinity" => Ok(Value::Float(f64::INFINITY)),
                _ => Err(self.fail_at(start, "expected float")),
            };
        }
        if self.peek() == Some('-') && matches!(self.peek_second(), Some(c) if c.is_ascii_alphabetic())
        {
            self.bump();
            return match self.word().as_str() {
                "Infinity" => Ok(Value::Float(f64::NEG_INFINITY)),
                _ => Err(self.fail_at(start, "expected float")),
            };
        }

        let mut token = String::new();
        if self.peek() == Some('-') {
            token.push('-');
            self.bump();
        }
        if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            return Err(self.fail("expected float"));
        }
        self.take_while(&mut token, |c| c.is_ascii_digit());
        if self.peek() == Some('.') {
            token.push('.');
            self.bump();
            if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                return Err(self.fail("expected digits after `.`"));
            }
            self.take_while(&mut token, |c| c.is_ascii_digit());
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            token.push('e');
            self.bump();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                token.push(sign);
                self.bump();
            }
            if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                return Err(self.fail("expected exponent digits"));
            }
            self.take_while(&mut token, |c| c.is_ascii_digit());
        }

        token
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| self.fail_at(start, "invalid float literal"))
    }

    fn parse_string(&mut self) -> Result<String, TextError> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            let escape_start = (self.line, self.col);
            match self.bump() {
                None => return Err(self.fail("unterminated string")),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some(c @ ('"' | '\\')) => out.push(c),
                    Some(c) => {
                        return Err(self.fail_at(escape_start, &format!("invalid escape `\\{c}`")));
                    }
                    None => return Err(self.fail("unterminated string")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_datetime(&mut self) -> Result<Value, TextError> {
        let start = (self.line, self.col);
        let mut token = String::new();
        self.take_while(&mut token, |c| {
            c.is_ascii_digit() || matches!(c, '-' | ':' | '.' | 'T')
        });
        if token.is_empty() {
            return Err(self.fail("expected datetime"));
        }
        DateTime::parse_text(&token)
            .map(Value::DateTime)
            .map_err(|e| self.fail_at(start, &e.to_string()))
    }

    fn parse_blob(&mut self) -> Result<Value, TextError> {
        let start = (self.line, self.col);
        self.expect('0')?;
        self.expect('x')?;
        let mut token = String::new();
        self.take_while(&mut token, |c| c.is_ascii_hexdigit());
        if token.len() % 2 != 0 {
            return Err(self.fail_at(start, "blob hex must have an even number of digits"));
        }
        hex::decode(&token)
            .map(Value::Blob)
            .map_err(|_| self.fail_at(start, "invalid blob literal"))
    }

    fn parse_identifier(&mut self) -> Result<String, TextError> {
        if self.eat('`') {
            let mut out = String::new();
            loop {
                match self.bump() {
                    None => return Err(self.fail("unterminated quoted identifier")),
                    Some('`') => return Ok(out),
                    Some('\\') => match self.bump() {
                        Some(c @ ('`' | '\\')) => out.push(c),
                        Some(c) => out.push(c),
                        None => return Err(self.fail("unterminated quoted identifier")),
                    },
                    Some(c) => out.push(c),
                }
            }
        }

        if !matches!(self.peek(), Some(c) if c.is_ascii_alphabetic() || c == '_') {
            return Err(self.fail("expected identifier"));
        }
        let mut out = String::new();
        self.take_while(&mut out, |c| c.is_ascii_alphanumeric() || c == '_');
        Ok(out)
    }

    ///
    /// ALIASES
    ///

    fn register(&mut self, value: &Value) {
        self.registry.insert(join(&self.path), value.clone());
    }

    fn try_alias(&mut self, ty: &Type) -> Result<Option<Value>, TextError> {
        let start = self.mark();
        let position = (self.line, self.col);

        if !matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            return Ok(None);
        }
        let mut text = String::new();
        self.take_while(&mut text, |c| c.is_ascii_digit());
        if self.peek() != Some('#') {
            self.restore(start);
            return Ok(None);
        }
        text.push('#');
        self.bump();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, ',' | ')' | ']' | '}' | ':') {
                break;
            }
            text.push(c);
            self.bump();
        }

        let pointer = RelativePointer::parse(&text)
            .map_err(|e| self.fail_at(position, &e.to_string()))?;
        let Some(absolute) = pointer.resolve(&self.path) else {
            return Err(self.fail_at(position, "alias pointer escapes the document root"));
        };
        let Some(value) = self.registry.get(&join(&absolute)) else {
            return Err(self.fail_at(position, &format!("undefined alias reference {text}")));
        };

        let kind_matches = matches!(
            (ty, value),
            (Type::Ref(_), Value::Ref(_))
                | (Type::Array(_), Value::Array(_))
                | (Type::Set(_), Value::Set(_))
                | (Type::Dict(..), Value::Dict(_))
        );
        if !kind_matches {
            return Err(self.fail_at(
                position,
                &format!("alias reference {text} does not name the expected container"),
            ));
        }
        Ok(Some(value.clone()))
    }
}
