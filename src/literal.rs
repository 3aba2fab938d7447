//! # Literal Converter
//!
//! Maps a raw literal-pool entry ([`PoolValue`]) to the [`Expression`] leaf
//! node it represents. This is the smallest of the decompiler's
//! collaborators but the decompiler's `PushLiteral`/`PushLiteralExtended`
//! handlers depend on it for every constant that isn't pushed as an
//! immediate.

use crate::ast::Expression;
use crate::error::DecompileError;

/// A literal-pool entry as the loader hands it over: tagged by shape, not
/// yet interpreted as AppleScript source text.
#[derive(Clone, Debug, PartialEq)]
pub enum PoolValue {
    /// An AppleEvent four-byte type/enum code, stored as its numeric value.
    Constant(u32),
    /// A fixed-width integer literal.
    Fixnum(i64),
    /// A raw byte string (already-decoded 8-bit text).
    ByteString(Vec<u8>),
    /// UTF-16BE encoded text, as raw bytes.
    Utf16String(Vec<u8>),
    /// A file-alias descriptor payload (see `convert_alias_descriptor`).
    AliasDescriptor(Vec<u8>),
    /// An AppleEvent descriptor's two four-byte code halves (class, id), as
    /// consumed by `MessageSend` to build a command name. Never reached by
    /// [`convert_literal`] directly — only `PushGlobal`/`PushLiteral` feed
    /// the generic converter, while `MessageSend` resolves this variant
    /// itself.
    EventCode(u32, u32),
}

/// Converts a single [`PoolValue`] to the [`Expression`] leaf it denotes.
///
/// Returns `Err` only for a version-3 alias descriptor, whose layout this
/// converter does not attempt to guess (see the spec's literal converter
/// notes and Open Question (c)).
pub fn convert_literal(value: &PoolValue) -> Result<Expression, DecompileError> {
    match value {
        PoolValue::Constant(code) => Ok(Expression::Keyword(code_to_ascii(*code))),
        PoolValue::Fixnum(n) => Ok(Expression::NumberLiteral(*n)),
        PoolValue::ByteString(bytes) => Ok(Expression::StringLiteral(
            String::from_utf8_lossy(bytes).into_owned(),
        )),
        PoolValue::Utf16String(bytes) => Ok(Expression::StringLiteral(decode_utf16_be(bytes))),
        PoolValue::AliasDescriptor(content) => {
            convert_alias_descriptor(content).map(Expression::VarRef)
        }
        PoolValue::EventCode(..) => Err(DecompileError::decode_failure(
            "event-code pool entry used outside MessageSend",
        )),
    }
}

/// Renders a numeric AppleEvent code as the big-endian ASCII text it spells
/// out (e.g. the four-byte code for `'TEXT'` renders back to `"TEXT"`).
/// Leading zero bytes are dropped, matching how a bignum's minimal
/// big-endian byte count naturally omits them.
pub(crate) fn code_to_ascii(code: u32) -> String {
    let bytes = code.to_be_bytes();
    let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[first_nonzero..]).into_owned()
}

fn decode_utf16_be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Extracts the application name embedded in a file-alias descriptor.
///
/// Version-2 aliases (see
/// <https://mac-alias.readthedocs.io/en/latest/alias_fmt.html>) carry the
/// volume/path component list starting at offset 51; the bundle name is the
/// path segment ending in `.app`. Version 3 is a different binary layout
/// this converter does not attempt to guess at (Open Question (c)) and is
/// reported as `NotImplemented`. Any other version falls back to splitting
/// the whole descriptor on `.app/` and taking the basename after the last
/// `:` path separator.
fn convert_alias_descriptor(content: &[u8]) -> Result<String, DecompileError> {
    let version = *content
        .get(7)
        .ok_or_else(|| DecompileError::decode_failure("truncated alias descriptor"))?;
    if version == 2 {
        let tail = content.get(51..).ok_or_else(|| {
            DecompileError::decode_failure("alias descriptor shorter than header")
        })?;
        let text = String::from_utf8_lossy(tail);
        let name = text.split(".app").next().unwrap_or(&text);
        return Ok(name.to_string());
    }
    if version == 3 {
        return Err(DecompileError::not_implemented(
            "version-3 alias descriptor decoding",
        ));
    }
    let text = String::from_utf8_lossy(content);
    let before_app = text.split(".app/").next().unwrap_or(&text);
    let basename = before_app.rsplit(':').next().unwrap_or(before_app);
    Ok(basename.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixnum_round_trips_to_number_literal() {
        let expr = convert_literal(&PoolValue::Fixnum(42)).unwrap();
        assert_eq!(expr, Expression::NumberLiteral(42));
    }

    #[test]
    fn constant_renders_ascii_code() {
        let code = u32::from_be_bytes(*b"TEXT");
        let expr = convert_literal(&PoolValue::Constant(code)).unwrap();
        assert_eq!(expr, Expression::Keyword("TEXT".to_string()));
    }

    #[test]
    fn constant_drops_leading_zero_bytes() {
        let code = u32::from_be_bytes([0, 0, b'h', b'i']);
        let expr = convert_literal(&PoolValue::Constant(code)).unwrap();
        assert_eq!(expr, Expression::Keyword("hi".to_string()));
    }

    #[test]
    fn byte_string_decodes_as_utf8() {
        let expr = convert_literal(&PoolValue::ByteString(b"hello".to_vec())).unwrap();
        assert_eq!(expr, Expression::StringLiteral("hello".to_string()));
    }

    #[test]
    fn utf16_string_decodes() {
        let raw: Vec<u8> = "hi".encode_utf16().flat_map(|u| u.to_be_bytes()).collect();
        let expr = convert_literal(&PoolValue::Utf16String(raw)).unwrap();
        assert_eq!(expr, Expression::StringLiteral("hi".to_string()));
    }

    #[test]
    fn version_two_alias_extracts_app_name() {
        let mut content = vec![0u8; 51];
        content[7] = 2;
        content.extend_from_slice(b"Finder.app/Contents");
        let expr = convert_literal(&PoolValue::AliasDescriptor(content)).unwrap();
        assert_eq!(expr, Expression::VarRef("Finder".to_string()));
    }

    #[test]
    fn version_three_alias_is_not_implemented() {
        let mut content = vec![0u8; 51];
        content[7] = 3;
        let err = convert_literal(&PoolValue::AliasDescriptor(content)).unwrap_err();
        assert_eq!(err.kind, crate::error::DecompileErrorKind::NotImplemented);
    }

    #[test]
    fn version_one_alias_falls_back_to_splitting_on_app_slash() {
        let mut content = vec![0u8; 8];
        content[7] = 1;
        content.extend_from_slice(b"Macintosh HD:Applications:Finder.app/Contents");
        let expr = convert_literal(&PoolValue::AliasDescriptor(content)).unwrap();
        assert_eq!(expr, Expression::VarRef("Finder".to_string()));
    }
}
