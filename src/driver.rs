//! # Driver
//!
//! Walks a loaded [`RootSequence`], decompiling every entry that has the
//! shape of a function record into a [`Handler`] and assembling the results
//! into a [`Script`]. Entries 0 and 1 are always metadata and are skipped;
//! everything from index 2 onward is either a function, a "maybe binding"
//! (too few fields to be one), or — under `--force` — a nested script block
//! to recurse into.

use crate::ast::{Handler, Script};
use crate::decompiler::decompile_handler;
use crate::error::DecompileError;
use crate::loader::{EntryRejection, FunctionRecord, RootEntry, RootSequence};
use crate::opcodes::OpcodeTable;

/// Marks a script-block entry under `--force`: the tag value the driver
/// recurses into, taken from the entry's first field.
const SCRIPT_BLOCK_TAG: i64 = 15;

/// One entry the driver declined to decompile, for `--force`/diagnostic
/// reporting rather than aborting the whole run.
#[derive(Clone, Debug, PartialEq)]
pub enum SkippedEntry {
    NotAFunction,
    MaybeBinding,
    Failed(DecompileError),
}

impl SkippedEntry {
    /// The `--`-prefixed diagnostic line the CLI prints for this entry,
    /// routed through [`DecompileError`]'s `Display` so the `<...>` wording
    /// lives in one place.
    pub fn diagnostic(&self) -> String {
        match self {
            SkippedEntry::NotAFunction => {
                format!("-- {}", DecompileError::malformed_handler("not a function"))
            }
            SkippedEntry::MaybeBinding => {
                format!("-- {}", DecompileError::malformed_handler("maybe binding"))
            }
            SkippedEntry::Failed(err) => format!("-- {err}"),
        }
    }
}

/// One entry's outcome, in encounter order, as an index into either
/// [`DriveResult::script`]'s handlers or [`DriveResult::skipped`]. Kept
/// separate from those two `Vec`s (rather than a single `Vec<Outcome>` owning
/// the `Handler`/`SkippedEntry` values directly) so `DriveResult::script` stays
/// a plain, directly printable [`Script`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriveOutcome {
    Handler(usize),
    Skipped(usize),
}

/// The outcome of driving one [`RootSequence`]: every successfully
/// decompiled handler, collected into a [`Script`]; every entry the driver
/// declined to decompile; and `order`, recording which of the two a given
/// root entry landed in, in encounter order — the interleaving the spec's
/// diagnostic-as-comment design relies on (see §7).
#[derive(Debug, Default)]
pub struct DriveResult {
    pub script: Script,
    pub skipped: Vec<SkippedEntry>,
    pub order: Vec<DriveOutcome>,
}

/// Decompiles every function-shaped entry in `root` starting at index 2.
///
/// Without `force`, the first [`DecompileError`] aborts the whole run.
/// With `force`, a failing handler is recorded as a [`SkippedEntry::Failed`]
/// and the driver continues; entries tagged [`SCRIPT_BLOCK_TAG`] are
/// additionally recursed into as nested root sequences.
pub fn drive(
    root: &RootSequence,
    opcodes: &dyn OpcodeTable,
    emit_comments: bool,
    force: bool,
    debug: bool,
) -> Result<DriveResult, DecompileError> {
    let mut result = DriveResult::default();
    drive_entries(
        &root.entries[2.min(root.entries.len())..],
        opcodes,
        emit_comments,
        force,
        debug,
        &mut result,
    )?;
    Ok(result)
}

#[allow(clippy::too_many_arguments)]
fn drive_entries(
    entries: &[RootEntry],
    opcodes: &dyn OpcodeTable,
    emit_comments: bool,
    force: bool,
    debug: bool,
    result: &mut DriveResult,
) -> Result<(), DecompileError> {
    for entry in entries {
        match FunctionRecord::from_entry(entry) {
            Ok(record) => match decompile_handler(&record, opcodes, emit_comments, debug) {
                Ok(handler) => {
                    result
                        .order
                        .push(DriveOutcome::Handler(result.script.handlers.len()));
                    result.script.handlers.push(handler);
                }
                Err(err) if force => {
                    result
                        .order
                        .push(DriveOutcome::Skipped(result.skipped.len()));
                    result.skipped.push(SkippedEntry::Failed(err));
                }
                Err(err) => return Err(err),
            },
            Err(EntryRejection::NotAFunction) => {
                if force && FunctionRecord::first_field_tag(entry) == Some(SCRIPT_BLOCK_TAG) {
                    if let RootEntry::Sequence(fields) = entry {
                        let nested: Vec<RootEntry> =
                            fields.iter().cloned().map(RootEntry::from_field).collect();
                        drive_entries(&nested, opcodes, emit_comments, force, debug, result)?;
                        continue;
                    }
                }
                result
                    .order
                    .push(DriveOutcome::Skipped(result.skipped.len()));
                result.skipped.push(SkippedEntry::NotAFunction);
            }
            Err(EntryRejection::MaybeBinding) => {
                result
                    .order
                    .push(DriveOutcome::Skipped(result.skipped.len()));
                result.skipped.push(SkippedEntry::MaybeBinding);
            }
        }
    }
    Ok(())
}

/// One line of the per-handler header the CLI interleaves with output
/// (`-- === data offset N ===`, `-- Function name: ...`, `-- Function
/// arguments: ...`).
pub fn handler_header(index: usize, handler: &Handler) -> Vec<String> {
    vec![
        format!("-- === data offset {index} ==="),
        format!("-- Function name: {}", handler.name),
        format!("-- Function arguments: {}", handler.parameters.join(", ")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::PoolValue;
    use crate::opcodes::BuiltinOpcodeTable;

    fn function_entry(name: &str, code: Vec<u8>) -> RootEntry {
        RootEntry::Sequence(vec![
            crate::loader::RootField::Text(name.to_string()),
            crate::loader::RootField::Int(0),
            crate::loader::RootField::List(vec![]),
            crate::loader::RootField::Int(0),
            crate::loader::RootField::Int(0),
            crate::loader::RootField::Literals(Vec::<PoolValue>::new()),
            crate::loader::RootField::Bytes(code),
        ])
    }

    #[test]
    fn skips_metadata_entries_and_decompiles_the_rest() {
        let table = BuiltinOpcodeTable;
        let push_true = crate::opcodes::byte_for_mnemonic("PushTrue").unwrap();
        let ret = crate::opcodes::byte_for_mnemonic("Return").unwrap();
        let root = RootSequence {
            entries: vec![
                RootEntry::Scalar(crate::loader::RootField::Text("meta0".to_string())),
                RootEntry::Scalar(crate::loader::RootField::Text("meta1".to_string())),
                function_entry("sayHi", vec![push_true, ret]),
            ],
        };
        let result = drive(&root, &table, false, false, false).unwrap();
        assert_eq!(result.script.handlers.len(), 1);
        assert_eq!(result.script.handlers[0].name, "sayHi");
        assert!(result.skipped.is_empty());
        assert_eq!(result.order, vec![DriveOutcome::Handler(0)]);
    }

    #[test]
    fn order_interleaves_handlers_and_skipped_entries_as_encountered() {
        let table = BuiltinOpcodeTable;
        let push_true = crate::opcodes::byte_for_mnemonic("PushTrue").unwrap();
        let ret = crate::opcodes::byte_for_mnemonic("Return").unwrap();
        let root = RootSequence {
            entries: vec![
                RootEntry::Scalar(crate::loader::RootField::Int(0)),
                RootEntry::Scalar(crate::loader::RootField::Int(0)),
                RootEntry::Sequence(vec![crate::loader::RootField::Text("x".to_string())]),
                function_entry("first", vec![push_true, ret]),
                RootEntry::Scalar(crate::loader::RootField::Int(4)),
                function_entry("second", vec![push_true, ret]),
            ],
        };
        let result = drive(&root, &table, false, false, false).unwrap();
        assert_eq!(
            result.order,
            vec![
                DriveOutcome::Skipped(0),
                DriveOutcome::Handler(0),
                DriveOutcome::Skipped(1),
                DriveOutcome::Handler(1),
            ]
        );
        assert_eq!(result.skipped, vec![SkippedEntry::MaybeBinding, SkippedEntry::NotAFunction]);
    }

    #[test]
    fn skipped_entry_diagnostics_match_the_dash_dash_prefixed_wording() {
        assert_eq!(SkippedEntry::NotAFunction.diagnostic(), "-- <not a function>");
        assert_eq!(SkippedEntry::MaybeBinding.diagnostic(), "-- <maybe binding>");
        assert_eq!(
            SkippedEntry::Failed(DecompileError::decode_failure("stack underflow")).diagnostic(),
            "-- Failed to decompile: stack underflow"
        );
    }

    #[test]
    fn short_sequence_is_skipped_as_maybe_binding() {
        let table = BuiltinOpcodeTable;
        let root = RootSequence {
            entries: vec![
                RootEntry::Scalar(crate::loader::RootField::Int(0)),
                RootEntry::Scalar(crate::loader::RootField::Int(0)),
                RootEntry::Sequence(vec![crate::loader::RootField::Text("x".to_string())]),
            ],
        };
        let result = drive(&root, &table, false, false, false).unwrap();
        assert!(result.script.handlers.is_empty());
        assert_eq!(result.skipped, vec![SkippedEntry::MaybeBinding]);
    }

    #[test]
    fn non_force_mode_propagates_the_first_failure() {
        let table = BuiltinOpcodeTable;
        let jump = crate::opcodes::byte_for_mnemonic("Jump").unwrap();
        let root = RootSequence {
            entries: vec![
                RootEntry::Scalar(crate::loader::RootField::Int(0)),
                RootEntry::Scalar(crate::loader::RootField::Int(0)),
                function_entry("broken", vec![jump]),
            ],
        };
        assert!(drive(&root, &table, false, false, false).is_err());
    }

    #[test]
    fn force_mode_records_failures_instead_of_aborting() {
        let table = BuiltinOpcodeTable;
        let jump = crate::opcodes::byte_for_mnemonic("Jump").unwrap();
        let root = RootSequence {
            entries: vec![
                RootEntry::Scalar(crate::loader::RootField::Int(0)),
                RootEntry::Scalar(crate::loader::RootField::Int(0)),
                function_entry("broken", vec![jump]),
            ],
        };
        let result = drive(&root, &table, false, true, false).unwrap();
        assert!(result.script.handlers.is_empty());
        assert_eq!(result.skipped.len(), 1);
    }
}
