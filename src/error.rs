//! # Error Handling for the Decompiler
//!
//! This module defines the **error kinds** and **decompile errors** used
//! throughout the stack-machine decompiler.
//!
//! ## Design
//! - [`DecompileErrorKind`] is a compact enumeration of the four *categories*
//!   of failure the decompiler and driver can hit (see the spec's error
//!   handling design): a malformed root entry, a fault part-way through one
//!   handler's instruction stream, an object-specifier sub-operation with no
//!   rule, and an opcode whose mnemonic matches no known category.
//! - [`DecompileError`] pairs a kind with a human-readable message and is the
//!   error type threaded through `Result` across the decompiler.
//!
//! ## Display
//! - Implements [`fmt::Display`] so errors can be rendered directly as the
//!   `--`-prefixed diagnostic lines the driver interleaves with output.
//! - Implements [`std::error::Error`] so it composes with ordinary
//!   `Result`-based control flow.

use std::fmt;

/// Compact enum of the error categories produced while decompiling a
/// single handler or walking the root entry sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecompileErrorKind {
    /// The root entry does not have the shape of a function record.
    MalformedHandler,
    /// An exception occurred partway through one handler's instruction pass
    /// (stack underflow, missing pool index, malformed branch offset, ...).
    DecodeFailure,
    /// An object-specifier sub-operation (or similar uncertain rule) has no
    /// implemented mapping.
    NotImplemented,
    /// An opcode whose mnemonic matches none of the known instruction
    /// categories.
    UnknownOpcode,
}

/// An error produced while decompiling one handler or iterating the root
/// entry sequence.
///
/// Unlike [`DecompileErrorKind`], this carries a descriptive message for
/// diagnostics and user reporting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecompileError {
    pub kind: DecompileErrorKind,
    pub message: String,
}

impl DecompileError {
    pub fn malformed_handler(message: impl Into<String>) -> Self {
        Self {
            kind: DecompileErrorKind::MalformedHandler,
            message: message.into(),
        }
    }

    pub fn decode_failure(message: impl Into<String>) -> Self {
        Self {
            kind: DecompileErrorKind::DecodeFailure,
            message: message.into(),
        }
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self {
            kind: DecompileErrorKind::NotImplemented,
            message: message.into(),
        }
    }

    pub fn unknown_opcode(message: impl Into<String>) -> Self {
        Self {
            kind: DecompileErrorKind::UnknownOpcode,
            message: message.into(),
        }
    }
}

impl fmt::Display for DecompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DecompileErrorKind::MalformedHandler => {
                write!(f, "<{}>", self.message)
            }
            DecompileErrorKind::DecodeFailure => {
                write!(f, "Failed to decompile: {}", self.message)
            }
            DecompileErrorKind::NotImplemented => {
                write!(f, "Warning: {} is not implemented", self.message)
            }
            DecompileErrorKind::UnknownOpcode => {
                write!(f, "<disassembler not implemented> {}", self.message)
            }
        }
    }
}

impl std::error::Error for DecompileError {}
