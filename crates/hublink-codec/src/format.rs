use crate::error::{CodecError, Result};

/// Scalar type selector, one per format letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Char,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
    Str,
}

impl TypeKind {
    /// Wire width of one scalar of this type, in bytes.
    pub fn width(self) -> usize {
        match self {
            TypeKind::Char | TypeKind::I8 | TypeKind::U8 | TypeKind::Str => 1,
            TypeKind::I16 | TypeKind::U16 => 2,
            TypeKind::I32 | TypeKind::U32 | TypeKind::F32 => 4,
            TypeKind::F64 => 8,
        }
    }

    fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'c' => Some(TypeKind::Char),
            'b' => Some(TypeKind::I8),
            'B' => Some(TypeKind::U8),
            'h' => Some(TypeKind::I16),
            'H' => Some(TypeKind::U16),
            'i' => Some(TypeKind::I32),
            'I' => Some(TypeKind::U32),
            'f' => Some(TypeKind::F32),
            'd' => Some(TypeKind::F64),
            's' => Some(TypeKind::Str),
            _ => None,
        }
    }
}

/// One parsed format token: a type letter plus an optional repeat count.
///
/// `count: None` is a bare scalar. For `s` the count is the fixed string
/// width; a bare `s` is exactly one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TypeKind,
    pub count: Option<usize>,
}

impl Token {
    /// Total wire width of this token, in bytes.
    pub fn width(&self) -> usize {
        self.kind.width() * self.count.unwrap_or(1)
    }
}

/// Parse a space-separated format descriptor into tokens.
///
/// An empty descriptor is valid and yields no tokens (a zero-argument
/// payload).
pub fn parse_format(format: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    for part in format.split_whitespace() {
        let mut chars = part.chars();
        let letter = chars.next().ok_or_else(|| CodecError::InvalidToken {
            token: part.to_string(),
        })?;
        let kind = TypeKind::from_letter(letter).ok_or_else(|| CodecError::InvalidToken {
            token: part.to_string(),
        })?;

        let rest = chars.as_str();
        let count = if rest.is_empty() {
            None
        } else {
            let count = rest
                .parse::<usize>()
                .map_err(|_| CodecError::InvalidToken {
                    token: part.to_string(),
                })?;
            if count == 0 {
                return Err(CodecError::InvalidToken {
                    token: part.to_string(),
                });
            }
            Some(count)
        };

        tokens.push(Token { kind, count });
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_and_counted_tokens() {
        let tokens = parse_format("H B3 s8 c").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token {
                    kind: TypeKind::U16,
                    count: None
                },
                Token {
                    kind: TypeKind::U8,
                    count: Some(3)
                },
                Token {
                    kind: TypeKind::Str,
                    count: Some(8)
                },
                Token {
                    kind: TypeKind::Char,
                    count: None
                },
            ]
        );
    }

    #[test]
    fn empty_format_is_zero_tokens() {
        assert!(parse_format("").unwrap().is_empty());
        assert!(parse_format("   ").unwrap().is_empty());
    }

    #[test]
    fn rejects_unknown_letter() {
        let err = parse_format("H x").unwrap_err();
        assert!(matches!(err, CodecError::InvalidToken { token } if token == "x"));
    }

    #[test]
    fn rejects_bad_count() {
        assert!(parse_format("B0").is_err());
        assert!(parse_format("Bx").is_err());
    }

    #[test]
    fn token_widths() {
        assert_eq!(parse_format("H").unwrap()[0].width(), 2);
        assert_eq!(parse_format("B3").unwrap()[0].width(), 3);
        assert_eq!(parse_format("s8").unwrap()[0].width(), 8);
        assert_eq!(parse_format("d2").unwrap()[0].width(), 16);
    }
}
