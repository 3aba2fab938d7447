//! # Container Loader
//!
//! Realizes the `load(path) -> RootSequence` external interface: the root
//! is an ordered sequence whose entries are either opaque scalars or nested
//! sequences of fields. A function entry is a sequence with at least seven
//! fields, with `name` at offset 0, `args` at offset 2, `literals` at
//! offset 5, and `code` at offset 6.
//!
//! Parsing Apple's real Object Model container is out of scope; this
//! module only defines the shapes ([`RootSequence`], [`RootEntry`],
//! [`RootField`], [`FunctionRecord`]) and a single concrete loader
//! ([`FixtureLoader`]) reading a small self-describing text format, behind
//! the [`Loader`] trait so a real container parser can be substituted
//! without touching the decompiler or driver.

use std::fs;
use std::path::Path;

use crate::error::DecompileError;
use crate::literal::PoolValue;

/// One field inside a root entry's sequence.
#[derive(Clone, Debug, PartialEq)]
pub enum RootField {
    Int(i64),
    Text(String),
    List(Vec<RootField>),
    Bytes(Vec<u8>),
    Literals(Vec<PoolValue>),
}

/// A single root-sequence entry: either a nested sequence of fields or an
/// opaque scalar value.
#[derive(Clone, Debug, PartialEq)]
pub enum RootEntry {
    Scalar(RootField),
    Sequence(Vec<RootField>),
}

impl RootEntry {
    /// Reinterprets a [`RootField::List`] as a nested root entry, the shape
    /// the driver's "force" mode recurses into for script-block entries.
    /// Any other field shape becomes a scalar entry.
    pub fn from_field(field: RootField) -> RootEntry {
        match field {
            RootField::List(fields) => RootEntry::Sequence(fields),
            other => RootEntry::Scalar(other),
        }
    }
}

/// The root container: metadata entries at index 0 and 1, function (or
/// nested script block) entries from index 2 onward.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RootSequence {
    pub entries: Vec<RootEntry>,
}

/// One function record, extracted from a [`RootEntry::Sequence`] with at
/// least seven fields.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionRecord {
    pub name: String,
    pub params: Vec<String>,
    pub literals: Vec<PoolValue>,
    pub code: Vec<u8>,
}

/// Why a root entry could not be read as a [`FunctionRecord`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryRejection {
    /// The entry is a scalar, not a sequence: "not a function".
    NotAFunction,
    /// The entry is a sequence with fewer than seven fields: "maybe
    /// binding".
    MaybeBinding,
}

impl FunctionRecord {
    /// Extracts a function record from a root entry's positional fields, or
    /// reports why the entry isn't one.
    pub fn from_entry(entry: &RootEntry) -> Result<FunctionRecord, EntryRejection> {
        let fields = match entry {
            RootEntry::Sequence(fields) => fields,
            RootEntry::Scalar(_) => return Err(EntryRejection::NotAFunction),
        };
        if fields.len() < 7 {
            return Err(EntryRejection::MaybeBinding);
        }

        let name = match &fields[0] {
            RootField::Text(text) => text.clone(),
            _ => String::new(),
        };
        let params = match &fields[2] {
            RootField::List(items) => items
                .iter()
                .filter_map(|f| match f {
                    RootField::Text(t) => Some(t.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        let literals = match &fields[5] {
            RootField::Literals(values) => values.clone(),
            _ => Vec::new(),
        };
        let code = match &fields[6] {
            RootField::Bytes(bytes) => bytes.clone(),
            _ => Vec::new(),
        };

        Ok(FunctionRecord {
            name,
            params,
            literals,
            code,
        })
    }

    /// The first field, used by the driver to detect script-block entries
    /// (tagged with the numeric value `15`) under `--force`.
    pub fn first_field_tag(entry: &RootEntry) -> Option<i64> {
        match entry {
            RootEntry::Sequence(fields) => match fields.first() {
                Some(RootField::Int(n)) => Some(*n),
                _ => None,
            },
            RootEntry::Scalar(RootField::Int(n)) => Some(*n),
            _ => None,
        }
    }
}

/// `load(path) -> RootSequence`.
pub trait Loader {
    fn load(&self, path: &Path) -> Result<RootSequence, DecompileError>;
}

/// A minimal, intentionally small text-based container format: blank-line
/// separated stanzas, the first two of which are treated as metadata
/// regardless of shape, the rest parsed as `FUNCTION` records.
///
/// ```text
/// META
/// META
/// FUNCTION
/// name=sayHello
/// args=greeting
/// literal=str:Hello
/// code=0500
/// END
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct FixtureLoader;

impl Loader for FixtureLoader {
    fn load(&self, path: &Path) -> Result<RootSequence, DecompileError> {
        let text = fs::read_to_string(path)
            .map_err(|e| DecompileError::decode_failure(format!("{}: {e}", path.display())))?;
        parse_fixture(&text)
    }
}

fn parse_fixture(text: &str) -> Result<RootSequence, DecompileError> {
    let mut entries = Vec::new();
    let mut lines = text.lines().peekable();
    let mut stanza_index = 0usize;

    while let Some(line) = lines.peek() {
        if line.trim().is_empty() {
            lines.next();
            continue;
        }
        let stanza = collect_stanza(&mut lines);
        if stanza_index < 2 {
            entries.push(RootEntry::Scalar(RootField::Text(stanza.join("\n"))));
        } else {
            entries.push(parse_function_stanza(&stanza)?);
        }
        stanza_index += 1;
    }

    Ok(RootSequence { entries })
}

fn collect_stanza<'a, I: Iterator<Item = &'a str>>(
    lines: &mut std::iter::Peekable<I>,
) -> Vec<&'a str> {
    let mut stanza = Vec::new();
    for line in lines.by_ref() {
        if line.trim() == "END" {
            break;
        }
        if line.trim().is_empty() {
            break;
        }
        stanza.push(line);
    }
    stanza
}

fn parse_function_stanza(lines: &[&str]) -> Result<RootEntry, DecompileError> {
    let mut name = String::new();
    let mut args = Vec::new();
    let mut literals = Vec::new();
    let mut code = Vec::new();

    for line in lines {
        if *line == "FUNCTION" {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| DecompileError::decode_failure(format!("malformed line: {line}")))?;
        match key {
            "name" => name = value.to_string(),
            "args" => {
                args = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "literal" => literals.push(parse_literal(value)?),
            "code" => code = parse_hex(value)?,
            _ => {}
        }
    }

    Ok(RootEntry::Sequence(vec![
        RootField::Text(name),
        RootField::Int(0),
        RootField::List(args.into_iter().map(RootField::Text).collect()),
        RootField::Int(0),
        RootField::Int(0),
        RootField::Literals(literals),
        RootField::Bytes(code),
    ]))
}

fn parse_literal(spec: &str) -> Result<PoolValue, DecompileError> {
    let (kind, value) = spec
        .split_once(':')
        .ok_or_else(|| DecompileError::decode_failure(format!("malformed literal: {spec}")))?;
    match kind {
        "const" => {
            let bytes = value.as_bytes();
            let mut code = [0u8; 4];
            for (i, b) in bytes.iter().take(4).enumerate() {
                code[i] = *b;
            }
            Ok(PoolValue::Constant(u32::from_be_bytes(code)))
        }
        "int" => value
            .parse::<i64>()
            .map(PoolValue::Fixnum)
            .map_err(|e| DecompileError::decode_failure(e.to_string())),
        "str" => Ok(PoolValue::ByteString(value.as_bytes().to_vec())),
        "utf16" => Ok(PoolValue::Utf16String(
            value.encode_utf16().flat_map(|u| u.to_be_bytes()).collect(),
        )),
        "alias" => Ok(PoolValue::AliasDescriptor(parse_hex(value)?)),
        other => Err(DecompileError::decode_failure(format!(
            "unknown literal kind: {other}"
        ))),
    }
}

fn parse_hex(value: &str) -> Result<Vec<u8>, DecompileError> {
    let value = value.trim();
    if value.len() % 2 != 0 {
        return Err(DecompileError::decode_failure("odd-length hex string"));
    }
    (0..value.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&value[i..i + 2], 16)
                .map_err(|e| DecompileError::decode_failure(e.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_function_record_from_well_formed_entry() {
        let entry = RootEntry::Sequence(vec![
            RootField::Text("sayHello".to_string()),
            RootField::Int(0),
            RootField::List(vec![RootField::Text("name".to_string())]),
            RootField::Int(0),
            RootField::Int(0),
            RootField::Literals(vec![PoolValue::Fixnum(1)]),
            RootField::Bytes(vec![0x05, 0x00]),
        ]);
        let record = FunctionRecord::from_entry(&entry).unwrap();
        assert_eq!(record.name, "sayHello");
        assert_eq!(record.params, vec!["name".to_string()]);
        assert_eq!(record.code, vec![0x05, 0x00]);
    }

    #[test]
    fn scalar_entry_is_not_a_function() {
        let entry = RootEntry::Scalar(RootField::Int(4));
        assert_eq!(
            FunctionRecord::from_entry(&entry).unwrap_err(),
            EntryRejection::NotAFunction
        );
    }

    #[test]
    fn short_sequence_is_maybe_binding() {
        let entry = RootEntry::Sequence(vec![RootField::Text("x".to_string())]);
        assert_eq!(
            FunctionRecord::from_entry(&entry).unwrap_err(),
            EntryRejection::MaybeBinding
        );
    }

    #[test]
    fn parses_fixture_text_into_function_entries() {
        let text = "META\n\nMETA\n\nFUNCTION\nname=H\nargs=\nliteral=int:2\ncode=0102\nEND\n";
        let root = parse_fixture(text).unwrap();
        assert_eq!(root.entries.len(), 3);
        let record = FunctionRecord::from_entry(&root.entries[2]).unwrap();
        assert_eq!(record.name, "H");
        assert_eq!(record.literals, vec![PoolValue::Fixnum(2)]);
        assert_eq!(record.code, vec![0x01, 0x02]);
    }
}
