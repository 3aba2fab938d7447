//! # scpt-decompiler
//!
//! Turns compiled AppleScript bytecode (`.scpt`) back into readable
//! AppleScript source. The pipeline is two phases glued together by the
//! [`driver`]: a [`loader`] hands over an opaque [`loader::RootSequence`],
//! the [`decompiler`] turns each function-shaped entry into an AST
//! [`ast::Handler`] via a stack machine, and the [`printer`] walks the
//! resulting [`ast::Script`] back to source text, with an optional
//! [`analyzer`] rewriting individual expressions along the way.

pub mod analyzer;
pub mod ast;
pub mod decompiler;
pub mod dictionary;
pub mod driver;
pub mod error;
pub mod literal;
pub mod loader;
pub mod opcodes;
pub mod printer;
