// CQL type descriptors as reported by `system_schema.columns.type`.
use std::fmt;
use std::str::FromStr;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ColumnType {
    Ascii,
    BigInt,
    Blob,
    Boolean,
    Counter,
    Date,
    Decimal,
    Double,
    Duration,
    Float,
    Inet,
    Int,
    SmallInt,
    Text,
    Time,
    Timestamp,
    TimeUuid,
    TinyInt,
    Uuid,
    VarInt,
    List(Box<ColumnType>),
    Set(Box<ColumnType>),
    Map(Box<ColumnType>, Box<ColumnType>),
    Tuple(Vec<ColumnType>),
    Frozen(Box<ColumnType>),
    /// User-defined type name or a quoted custom marshal class.
    Custom(String),
}

impl ColumnType {
    pub fn is_collection(&self) -> bool {
        match self {
            ColumnType::List(_) | ColumnType::Set(_) | ColumnType::Map(_, _) => true,
            ColumnType::Frozen(inner) => inner.is_collection(),
            _ => false,
        }
    }

    /// The type with any `frozen<...>` wrapper removed.
    pub fn unfrozen(&self) -> &ColumnType {
        match self {
            ColumnType::Frozen(inner) => inner.unfrozen(),
            other => other,
        }
    }

    fn native(name: &str) -> Option<Self> {
        let ty = match name {
            "ascii" => ColumnType::Ascii,
            "bigint" => ColumnType::BigInt,
            "blob" => ColumnType::Blob,
            "boolean" => ColumnType::Boolean,
            "counter" => ColumnType::Counter,
            "date" => ColumnType::Date,
            "decimal" => ColumnType::Decimal,
            "double" => ColumnType::Double,
            "duration" => ColumnType::Duration,
            "float" => ColumnType::Float,
            "inet" => ColumnType::Inet,
            "int" => ColumnType::Int,
            "smallint" => ColumnType::SmallInt,
            "text" | "varchar" => ColumnType::Text,
            "time" => ColumnType::Time,
            "timestamp" => ColumnType::Timestamp,
            "timeuuid" => ColumnType::TimeUuid,
            "tinyint" => ColumnType::TinyInt,
            "uuid" => ColumnType::Uuid,
            "varint" => ColumnType::VarInt,
            _ => return None,
        };
        Some(ty)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Ascii => "ascii",
            ColumnType::BigInt => "bigint",
            ColumnType::Blob => "blob",
            ColumnType::Boolean => "boolean",
            ColumnType::Counter => "counter",
            ColumnType::Date => "date",
            ColumnType::Decimal => "decimal",
            ColumnType::Double => "double",
            ColumnType::Duration => "duration",
            ColumnType::Float => "float",
            ColumnType::Inet => "inet",
            ColumnType::Int => "int",
            ColumnType::SmallInt => "smallint",
            ColumnType::Text => "text",
            ColumnType::Time => "time",
            ColumnType::Timestamp => "timestamp",
            ColumnType::TimeUuid => "timeuuid",
            ColumnType::TinyInt => "tinyint",
            ColumnType::Uuid => "uuid",
            ColumnType::VarInt => "varint",
            ColumnType::List(inner) => return write!(f, "list<{inner}>"),
            ColumnType::Set(inner) => return write!(f, "set<{inner}>"),
            ColumnType::Map(key, value) => return write!(f, "map<{key}, {value}>"),
            ColumnType::Frozen(inner) => return write!(f, "frozen<{inner}>"),
            ColumnType::Tuple(items) => {
                f.write_str("tuple<")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                return f.write_str(">");
            }
            ColumnType::Custom(name) => name,
        };
        f.write_str(name)
    }
}

impl FromStr for ColumnType {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut parser = TypeParser {
            input: text,
            pos: 0,
        };
        let ty = parser.parse_type()?;
        parser.skip_ws();
        if parser.pos != text.len() {
            return Err(parser.error("trailing characters"));
        }
        Ok(ty)
    }
}

struct TypeParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> TypeParser<'a> {
    fn parse_type(&mut self) -> Result<ColumnType, Error> {
        self.skip_ws();
        if self.rest().starts_with('\'') {
            return self.parse_quoted();
        }
        let name = self.ident();
        if name.is_empty() {
            return Err(self.error("expected a type name"));
        }
        let lowered = name.to_ascii_lowercase();
        let params = if self.peek() == Some('<') {
            self.pos += 1;
            let params = self.parse_params()?;
            Some(params)
        } else {
            None
        };

        match (lowered.as_str(), params) {
            ("list", Some(mut params)) if params.len() == 1 => {
                Ok(ColumnType::List(Box::new(params.remove(0))))
            }
            ("set", Some(mut params)) if params.len() == 1 => {
                Ok(ColumnType::Set(Box::new(params.remove(0))))
            }
            ("frozen", Some(mut params)) if params.len() == 1 => {
                Ok(ColumnType::Frozen(Box::new(params.remove(0))))
            }
            ("map", Some(mut params)) if params.len() == 2 => {
                let value = params.remove(1);
                let key = params.remove(0);
                Ok(ColumnType::Map(Box::new(key), Box::new(value)))
            }
            ("tuple", Some(params)) if !params.is_empty() => Ok(ColumnType::Tuple(params)),
            (name, Some(_)) => Err(self.error(&format!("wrong parameters for {name}"))),
            (_, None) => Ok(ColumnType::native(&lowered)
                .unwrap_or_else(|| ColumnType::Custom(name.to_string()))),
        }
    }

    fn parse_params(&mut self) -> Result<Vec<ColumnType>, Error> {
        let mut params = Vec::new();
        loop {
            params.push(self.parse_type()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('>') => {
                    self.pos += 1;
                    return Ok(params);
                }
                _ => return Err(self.error("unbalanced type parameters")),
            }
        }
    }

    fn parse_quoted(&mut self) -> Result<ColumnType, Error> {
        let start = self.pos + 1;
        match self.input[start..].find('\'') {
            Some(len) => {
                self.pos = start + len + 1;
                Ok(ColumnType::Custom(self.input[start..start + len].to_string()))
            }
            None => Err(self.error("unterminated quoted type")),
        }
    }

    fn ident(&mut self) -> &'a str {
        let input = self.input;
        let start = self.pos;
        let len = self
            .rest()
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
            .unwrap_or(self.rest().len());
        self.pos += len;
        &input[start..self.pos]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn rest(&self) -> &str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn error(&self, message: &str) -> Error {
        Error::new(ErrorKind::Type).with_message(format!(
            "invalid column type {:?} at {}: {message}",
            self.input, self.pos
        ))
    }
}
