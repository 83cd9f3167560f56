use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};
use crate::format::{parse_format, Token, TypeKind};
use crate::value::Value;

/// Pack an argument list into payload bytes per the format descriptor.
///
/// Strings shorter than their declared width are padded with NUL bytes;
/// longer strings are truncated to the declared width. All multi-byte
/// scalars are little-endian.
pub fn pack(values: &[Value], format: &str) -> Result<Bytes> {
    let tokens = parse_format(format)?;
    if tokens.len() != values.len() {
        return Err(CodecError::ArityMismatch {
            expected: tokens.len(),
            got: values.len(),
        });
    }

    let mut buf = BytesMut::with_capacity(tokens.iter().map(Token::width).sum());
    for (index, (token, value)) in tokens.iter().zip(values).enumerate() {
        match (token.kind, token.count) {
            (TypeKind::Str, count) => {
                let text = value.as_str().ok_or(CodecError::TypeMismatch {
                    expected: "string",
                    index,
                })?;
                pack_str(text, count.unwrap_or(1), &mut buf)?;
            }
            (kind, None) => pack_scalar(kind, value, index, &mut buf)?,
            (kind, Some(count)) => {
                let elements = value.as_list().ok_or(CodecError::TypeMismatch {
                    expected: "list",
                    index,
                })?;
                if elements.len() != count {
                    return Err(CodecError::LengthMismatch {
                        expected: count,
                        got: elements.len(),
                    });
                }
                for element in elements {
                    pack_scalar(kind, element, index, &mut buf)?;
                }
            }
        }
    }
    Ok(buf.freeze())
}

/// Unpack payload bytes into an argument list per the format descriptor.
///
/// Purely positional: each token advances the read cursor by its fixed
/// width. Only buffer exhaustion and malformed tokens are detectable; a
/// format that disagrees with the sender's decodes garbage silently.
pub fn unpack(payload: &[u8], format: &str) -> Result<Vec<Value>> {
    let tokens = parse_format(format)?;
    let mut values = Vec::with_capacity(tokens.len());
    let mut offset = 0usize;

    for token in &tokens {
        let width = token.width();
        if payload.len() - offset < width {
            return Err(CodecError::ShortBuffer {
                needed: width,
                remaining: payload.len() - offset,
            });
        }

        let field = &payload[offset..offset + width];
        offset += width;

        let value = match (token.kind, token.count) {
            (TypeKind::Str, _) => {
                let text: String = field.iter().map(|&byte| byte as char).collect();
                Value::Str(text.trim_end_matches('\0').to_string())
            }
            (kind, None) => unpack_scalar(kind, field),
            (kind, Some(count)) => {
                let scalar_width = kind.width();
                let elements = (0..count)
                    .map(|i| unpack_scalar(kind, &field[i * scalar_width..(i + 1) * scalar_width]))
                    .collect();
                Value::List(elements)
            }
        };
        values.push(value);
    }
    Ok(values)
}

fn pack_str(text: &str, width: usize, buf: &mut BytesMut) -> Result<()> {
    let mut written = 0usize;
    for ch in text.chars().take(width) {
        if ch > '\u{FF}' {
            return Err(CodecError::CharOutOfRange { value: ch });
        }
        buf.put_u8(ch as u8);
        written += 1;
    }
    // Absent trailing characters pad with zero bytes, never an error.
    for _ in written..width {
        buf.put_u8(0);
    }
    Ok(())
}

fn pack_scalar(kind: TypeKind, value: &Value, index: usize, buf: &mut BytesMut) -> Result<()> {
    match (kind, value) {
        (TypeKind::Char, Value::Char(ch)) => {
            if *ch > '\u{FF}' {
                return Err(CodecError::CharOutOfRange { value: *ch });
            }
            buf.put_u8(*ch as u8);
        }
        (TypeKind::I8, Value::I8(v)) => buf.put_i8(*v),
        (TypeKind::U8, Value::U8(v)) => buf.put_u8(*v),
        (TypeKind::I16, Value::I16(v)) => buf.put_i16_le(*v),
        (TypeKind::U16, Value::U16(v)) => buf.put_u16_le(*v),
        (TypeKind::I32, Value::I32(v)) => buf.put_i32_le(*v),
        (TypeKind::U32, Value::U32(v)) => buf.put_u32_le(*v),
        (TypeKind::F32, Value::F32(v)) => buf.put_f32_le(*v),
        (TypeKind::F64, Value::F64(v)) => buf.put_f64_le(*v),
        (kind, _) => {
            return Err(CodecError::TypeMismatch {
                expected: scalar_name(kind),
                index,
            })
        }
    }
    Ok(())
}

fn unpack_scalar(kind: TypeKind, field: &[u8]) -> Value {
    match kind {
        TypeKind::Char => Value::Char(field[0] as char),
        TypeKind::I8 => Value::I8(field[0] as i8),
        TypeKind::U8 => Value::U8(field[0]),
        TypeKind::I16 => Value::I16(i16::from_le_bytes(field.try_into().unwrap())),
        TypeKind::U16 => Value::U16(u16::from_le_bytes(field.try_into().unwrap())),
        TypeKind::I32 => Value::I32(i32::from_le_bytes(field.try_into().unwrap())),
        TypeKind::U32 => Value::U32(u32::from_le_bytes(field.try_into().unwrap())),
        TypeKind::F32 => Value::F32(f32::from_le_bytes(field.try_into().unwrap())),
        TypeKind::F64 => Value::F64(f64::from_le_bytes(field.try_into().unwrap())),
        TypeKind::Str => unreachable!("strings are handled by the caller"),
    }
}

fn scalar_name(kind: TypeKind) -> &'static str {
    match kind {
        TypeKind::Char => "char",
        TypeKind::I8 => "i8",
        TypeKind::U8 => "u8",
        TypeKind::I16 => "i16",
        TypeKind::U16 => "u16",
        TypeKind::I32 => "i32",
        TypeKind::U32 => "u32",
        TypeKind::F32 => "f32",
        TypeKind::F64 => "f64",
        TypeKind::Str => "string",
    }
}
