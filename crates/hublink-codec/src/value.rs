/// A single decoded argument.
///
/// Counted numeric tokens decode into [`Value::List`]; fixed-width string
/// tokens decode into [`Value::Str`]. This tagged representation lets
/// callback handlers receive an argument list of any shape without dynamic
/// invocation tricks.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Latin-1 character (`c`).
    Char(char),
    /// Signed 8-bit (`b`).
    I8(i8),
    /// Unsigned 8-bit (`B`).
    U8(u8),
    /// Signed 16-bit (`h`).
    I16(i16),
    /// Unsigned 16-bit (`H`).
    U16(u16),
    /// Signed 32-bit (`i`).
    I32(i32),
    /// Unsigned 32-bit (`I`).
    U32(u32),
    /// 32-bit float (`f`).
    F32(f32),
    /// 64-bit float (`d`).
    F64(f64),
    /// Fixed-width string (`s`/`sN`), trailing NUL padding stripped.
    Str(String),
    /// Ordered elements of a counted scalar token.
    List(Vec<Value>),
}

impl Value {
    pub fn as_char(&self) -> Option<char> {
        match self {
            Value::Char(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Value::U8(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Value::U16(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Char(value) => write!(f, "{value}"),
            Value::I8(value) => write!(f, "{value}"),
            Value::U8(value) => write!(f, "{value}"),
            Value::I16(value) => write!(f, "{value}"),
            Value::U16(value) => write!(f, "{value}"),
            Value::I32(value) => write!(f, "{value}"),
            Value::U32(value) => write!(f, "{value}"),
            Value::F32(value) => write!(f, "{value}"),
            Value::F64(value) => write!(f, "{value}"),
            Value::Str(value) => write!(f, "{value}"),
            Value::List(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
        }
    }
}
