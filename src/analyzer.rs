//! # Analyzer Hook
//!
//! The printer's single extension point: for each expression node the
//! printer asks the installed analyzer first, falling back to its own
//! default rendering when the analyzer declines (returns `None`). Two
//! analyzers ship here; a caller picks one by name via [`registry`].
//!
//! A Python-style "dispatch by method name" becomes a capability interface:
//! one optional override method per expression variant, each defaulted to
//! `None` so an analyzer only needs to implement the handful it cares
//! about. [`Self::visit_list`]/[`visit_command_call`]/etc. receive the whole
//! node plus the [`Printer`] so they can recurse through
//! [`Printer::print_expression`] (re-entering analysis on sub-nodes) or fall
//! back to [`Printer::print_expression_default`] for the base rendering.

use crate::ast::{BinaryOpKind, Expression};
use crate::printer::{Context, Printer};

#[allow(unused_variables)]
pub trait Analyzer {
    fn visit_string_literal(&self, printer: &Printer, value: &str, ctx: &Context) -> Option<String> {
        None
    }
    fn visit_number_literal(&self, printer: &Printer, value: i64, ctx: &Context) -> Option<String> {
        None
    }
    fn visit_boolean_literal(&self, printer: &Printer, value: bool, ctx: &Context) -> Option<String> {
        None
    }
    fn visit_date_literal(&self, printer: &Printer, text: &str, ctx: &Context) -> Option<String> {
        None
    }
    fn visit_missing_value(&self, printer: &Printer, ctx: &Context) -> Option<String> {
        None
    }
    fn visit_keyword(&self, printer: &Printer, code: &str, ctx: &Context) -> Option<String> {
        None
    }
    fn visit_var_ref(&self, printer: &Printer, name: &str, ctx: &Context) -> Option<String> {
        None
    }
    fn visit_list(&self, printer: &Printer, expr: &Expression, ctx: &Context) -> Option<String> {
        None
    }
    fn visit_record(&self, printer: &Printer, expr: &Expression, ctx: &Context) -> Option<String> {
        None
    }
    fn visit_element_specifier(&self, printer: &Printer, expr: &Expression, ctx: &Context) -> Option<String> {
        None
    }
    fn visit_binary_op(&self, printer: &Printer, expr: &Expression, ctx: &Context) -> Option<String> {
        None
    }
    fn visit_unary_op(&self, printer: &Printer, expr: &Expression, ctx: &Context) -> Option<String> {
        None
    }
    fn visit_command_call(&self, printer: &Printer, expr: &Expression, ctx: &Context) -> Option<String> {
        None
    }
    fn visit_handler_call(&self, printer: &Printer, expr: &Expression, ctx: &Context) -> Option<String> {
        None
    }
}

/// The base printer's own behavior, i.e. no rewriting at all. Used when no
/// `--analyzer` is requested.
#[derive(Clone, Copy, Debug, Default)]
pub struct BaseAnalyzer;

impl Analyzer for BaseAnalyzer {}

/// Collapses the small handful of string-construction idioms the AppleScript
/// compiler emits for literal text: a printable-ASCII number standing in for
/// a one-character string, a list of one-character strings built up with
/// `&`, an `ASCII character` command call, and a `&`-concatenation of two
/// already-string-shaped operands.
#[derive(Clone, Copy, Debug, Default)]
pub struct NaiveStringAnalyzer;

impl Analyzer for NaiveStringAnalyzer {
    fn visit_number_literal(&self, _printer: &Printer, value: i64, _ctx: &Context) -> Option<String> {
        if (32..=126).contains(&value) {
            Some(format!("\"{}\"", value as u8 as char))
        } else {
            None
        }
    }

    fn visit_list(&self, printer: &Printer, expr: &Expression, ctx: &Context) -> Option<String> {
        let Expression::List(items) = expr else {
            return None;
        };
        if items.is_empty() {
            return None;
        }
        let rendered: Vec<String> = items.iter().map(|e| printer.print_expression(e, ctx)).collect();
        if rendered.iter().all(|e| is_one_char_string_literal(e)) {
            let concatenated: String = rendered.iter().map(|e| &e[1..e.len() - 1]).collect();
            Some(format!("{{ \"{concatenated}\" }}"))
        } else {
            None
        }
    }

    fn visit_command_call(&self, printer: &Printer, expr: &Expression, ctx: &Context) -> Option<String> {
        let rendered = printer.print_expression_default(expr, ctx);
        if rendered.contains("ASCII character") && rendered.contains('"') {
            let mut parts = rendered.splitn(3, '"');
            parts.next();
            if let Some(ch) = parts.next() {
                return Some(format!("\"{ch}\""));
            }
        }
        None
    }

    fn visit_binary_op(&self, printer: &Printer, expr: &Expression, ctx: &Context) -> Option<String> {
        let Expression::BinaryOp { op, left, right } = expr else {
            return None;
        };
        if *op != BinaryOpKind::Concat {
            return None;
        }
        let l = printer.print_expression(left, ctx);
        let r = printer.print_expression(right, ctx);
        if is_plain_string_literal(&l) && is_plain_string_literal(&r) {
            Some(format!("\"{}{}\"", &l[1..l.len() - 1], &r[1..r.len() - 1]))
        } else {
            None
        }
    }
}

fn is_plain_string_literal(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('"') && s.ends_with('"') && !s.contains(" & ")
}

fn is_one_char_string_literal(s: &str) -> bool {
    s.len() == 3 && s.starts_with('"') && s.ends_with('"')
}

/// Decodes a known malware family's string obfuscation: every non-ASCII
/// code point is shifted down by 100 before printing.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShiftDecodeAnalyzer;

impl Analyzer for ShiftDecodeAnalyzer {
    fn visit_string_literal(&self, _printer: &Printer, value: &str, _ctx: &Context) -> Option<String> {
        if value.is_ascii() {
            return None;
        }
        let decoded: String = value
            .chars()
            .map(|c| char::from_u32((c as u32).wrapping_sub(100)).unwrap_or(c))
            .collect();
        Some(format!("\"{decoded}\""))
    }
}

/// Looks up a shipped analyzer by the name passed to `--analyzer`.
pub fn lookup(name: &str) -> Option<Box<dyn Analyzer>> {
    match name {
        "none" | "base" => Some(Box::new(BaseAnalyzer)),
        "naive-string" => Some(Box::new(NaiveStringAnalyzer)),
        "shift100" => Some(Box::new(ShiftDecodeAnalyzer)),
        _ => None,
    }
}
