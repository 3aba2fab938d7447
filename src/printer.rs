//! # Printer
//!
//! A stateless tree walk that renders a [`Script`]/[`Handler`]/[`Statement`]/
//! [`Expression`] back to AppleScript's concrete syntax. Indentation is four
//! spaces per nesting level, applied only to statements — expressions never
//! indent themselves, matching how the decompiler always threads `indent =
//! 0` down through expression recursion.
//!
//! Two pieces of context steer `Keyword` resolution: the current `tell`
//! target and the innermost command being printed. Rather than living as
//! mutable fields on the printer (save/restore around each recursive call),
//! both travel as an explicit, cheaply-cloned [`Context`] value passed down
//! the recursion — the printer itself stays a plain, stateless `&self`
//! collaborator.
//!
//! The [`Analyzer`] hook is consulted before every expression is rendered;
//! see [`crate::analyzer`] for the two shipped implementations.

use crate::analyzer::Analyzer;
use crate::ast::*;
use crate::dictionary::{Dictionary, DEFAULT_TARGET, STANDARD_ADDITIONS};

const INDENT_UNIT: &str = "    ";

/// Threaded printer-local context: the current `tell` recipient and the
/// command whose named parameters are in scope for `Keyword` resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct Context {
    pub target: String,
    pub command: Option<String>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_string(),
            command: None,
        }
    }
}

/// Renders decompiled AST nodes to AppleScript source text.
pub struct Printer<'a> {
    dictionary: &'a dyn Dictionary,
    analyzer: &'a dyn Analyzer,
}

impl<'a> Printer<'a> {
    pub fn new(dictionary: &'a dyn Dictionary, analyzer: &'a dyn Analyzer) -> Self {
        Self {
            dictionary,
            analyzer,
        }
    }

    fn indent(level: usize) -> String {
        INDENT_UNIT.repeat(level)
    }

    /// Renders a whole script: properties, then handlers (blank-line
    /// separated), then any top-level run-section statements.
    pub fn print_script(&self, script: &Script) -> String {
        let ctx = Context::default();
        let mut parts = Vec::new();
        for prop in &script.properties {
            parts.push(self.print_property(prop, 0, &ctx));
        }
        for handler in &script.handlers {
            if !parts.is_empty() {
                parts.push(String::new());
            }
            parts.push(self.print_handler(handler, 0));
        }
        for stmt in &script.body {
            if !parts.is_empty() {
                parts.push(String::new());
            }
            parts.push(self.print_statement(stmt, 0, &ctx));
        }
        parts.join("\n")
    }

    fn print_property(&self, prop: &PropertyDecl, indent: usize, ctx: &Context) -> String {
        format!(
            "{}property {} : {}",
            Self::indent(indent),
            prop.name,
            self.print_expression(&prop.initial_value, ctx)
        )
    }

    pub fn print_handler(&self, handler: &Handler, indent: usize) -> String {
        let ctx = Context::default();
        let params = if handler.parameters.is_empty() {
            String::new()
        } else {
            format!("({})", handler.parameters.join(", "))
        };
        let header = format!("{}on {}{}", Self::indent(indent), handler.name, params);
        let body: Vec<String> = handler
            .body
            .iter()
            .map(|s| self.print_statement(s, indent + 1, &ctx))
            .collect();
        let footer = format!("{}end {}", Self::indent(indent), handler.name);
        if body.is_empty() {
            format!("{header}\n{footer}")
        } else {
            format!("{header}\n{}\n{footer}", body.join("\n"))
        }
    }

    fn print_statement(&self, stmt: &Statement, indent: usize, ctx: &Context) -> String {
        match stmt {
            Statement::Comment(text) => format!("{}-- {text}", Self::indent(indent)),
            Statement::PropertyDecl(p) => self.print_property(p, indent, ctx),
            Statement::Set(s) => format!(
                "{}set {} to {}",
                Self::indent(indent),
                self.print_expression(&s.target.obj, ctx),
                self.print_expression(&s.value, ctx)
            ),
            Statement::VarDecl(v) => {
                let kind = if v.is_global { "global" } else { "local" };
                format!("{}{kind} {}", Self::indent(indent), v.names.join(", "))
            }
            Statement::If(ifs) => self.print_if(ifs, indent, ctx),
            Statement::Repeat(r) => self.print_repeat(r, indent, ctx),
            Statement::Try(t) => self.print_try(t, indent, ctx),
            Statement::Tell(t) => self.print_tell(t, indent, ctx),
            Statement::Return(Some(v)) => {
                format!("{}return {}", Self::indent(indent), self.print_expression(v, ctx))
            }
            Statement::Return(None) => format!("{}return", Self::indent(indent)),
            Statement::ExitRepeat => format!("{}exit repeat", Self::indent(indent)),
            Statement::ExprStmt(e) => {
                format!("{}{}", Self::indent(indent), self.print_expression(e, ctx))
            }
        }
    }

    fn print_if(&self, ifs: &IfStatement, indent: usize, ctx: &Context) -> String {
        let header = format!(
            "{}if {} then",
            Self::indent(indent),
            self.print_expression(&ifs.condition, ctx)
        );
        let then_block = ifs
            .then_block
            .iter()
            .map(|s| self.print_statement(s, indent + 1, ctx))
            .collect::<Vec<_>>()
            .join("\n");
        let footer = format!("{}end if", Self::indent(indent));
        if ifs.else_block.is_empty() {
            format!("{header}\n{then_block}\n{footer}")
        } else {
            let else_block = ifs
                .else_block
                .iter()
                .map(|s| self.print_statement(s, indent + 1, ctx))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "{header}\n{then_block}\n{}else\n{else_block}\n{footer}",
                Self::indent(indent)
            )
        }
    }

    fn print_repeat(&self, r: &RepeatStatement, indent: usize, ctx: &Context) -> String {
        let i = Self::indent(indent);
        let header = match r.kind {
            RepeatKind::Forever => format!("{i}repeat"),
            RepeatKind::While => format!(
                "{i}repeat while {}",
                self.print_expression(r.condition.as_ref().expect("while repeat has a condition"), ctx)
            ),
            RepeatKind::Until => format!(
                "{i}repeat until {}",
                self.print_expression(r.condition.as_ref().expect("until repeat has a condition"), ctx)
            ),
            RepeatKind::Times => format!(
                "{i}repeat {} times",
                self.print_expression(r.times.as_ref().expect("times repeat has a count"), ctx)
            ),
            RepeatKind::WithCounter => {
                let var = r.counter_var.as_deref().unwrap_or_default();
                let from = self.print_expression(r.from_expr.as_ref().expect("with-counter has from"), ctx);
                let to = self.print_expression(r.to_expr.as_ref().expect("with-counter has to"), ctx);
                match &r.by_expr {
                    Some(by) => format!(
                        "{i}repeat with {var} from {from} to {to} by {}",
                        self.print_expression(by, ctx)
                    ),
                    None => format!("{i}repeat with {var} from {from} to {to}"),
                }
            }
            RepeatKind::WithIn => {
                let var = r.counter_var.as_deref().unwrap_or_default();
                let in_src = self.print_expression(r.in_expr.as_ref().expect("with-in has a collection"), ctx);
                format!("{i}repeat with {var} in {in_src}")
            }
        };
        let body = r
            .body
            .iter()
            .map(|s| self.print_statement(s, indent + 1, ctx))
            .collect::<Vec<_>>()
            .join("\n");
        let footer = format!("{i}end repeat");
        if r.body.is_empty() {
            format!("{header}\n{footer}")
        } else {
            format!("{header}\n{body}\n{footer}")
        }
    }

    fn print_try(&self, t: &TryStatement, indent: usize, ctx: &Context) -> String {
        let i = Self::indent(indent);
        let mut parts = vec![format!("{i}try")];
        parts.extend(t.try_block.iter().map(|s| self.print_statement(s, indent + 1, ctx)));
        parts.push(match &t.on_error_var {
            Some(v) => format!("{i}on error {v}"),
            None => format!("{i}on error"),
        });
        parts.extend(t.on_error_block.iter().map(|s| self.print_statement(s, indent + 1, ctx)));
        parts.push(format!("{i}end try"));
        parts.join("\n")
    }

    fn print_tell(&self, t: &TellBlock, indent: usize, ctx: &Context) -> String {
        let target_src = self.print_expression(&t.target, ctx);
        let inner_ctx = Context {
            target: target_src.clone(),
            command: ctx.command.clone(),
        };
        let header = format!("{}tell {target_src}", Self::indent(indent));
        let body = t
            .body
            .iter()
            .map(|s| self.print_statement(s, indent + 1, &inner_ctx))
            .collect::<Vec<_>>()
            .join("\n");
        let footer = format!("{}end tell", Self::indent(indent));
        if t.body.is_empty() {
            format!("{header}\n{footer}")
        } else {
            format!("{header}\n{body}\n{footer}")
        }
    }

    /// Renders a single expression, giving the installed analyzer first
    /// refusal via [`Self::ask_analyzer`].
    pub fn print_expression(&self, expr: &Expression, ctx: &Context) -> String {
        if let Some(rendered) = self.ask_analyzer(expr, ctx) {
            return rendered;
        }
        self.print_expression_default(expr, ctx)
    }

    fn ask_analyzer(&self, expr: &Expression, ctx: &Context) -> Option<String> {
        match expr {
            Expression::StringLiteral(v) => self.analyzer.visit_string_literal(self, v, ctx),
            Expression::NumberLiteral(v) => self.analyzer.visit_number_literal(self, *v, ctx),
            Expression::BooleanLiteral(v) => self.analyzer.visit_boolean_literal(self, *v, ctx),
            Expression::DateLiteral(t) => self.analyzer.visit_date_literal(self, t, ctx),
            Expression::MissingValue => self.analyzer.visit_missing_value(self, ctx),
            Expression::Keyword(c) => self.analyzer.visit_keyword(self, c, ctx),
            Expression::VarRef(n) => self.analyzer.visit_var_ref(self, n, ctx),
            Expression::List(_) => self.analyzer.visit_list(self, expr, ctx),
            Expression::Record(_) => self.analyzer.visit_record(self, expr, ctx),
            Expression::ElementSpecifier(_) => self.analyzer.visit_element_specifier(self, expr, ctx),
            Expression::BinaryOp { .. } => self.analyzer.visit_binary_op(self, expr, ctx),
            Expression::UnaryOp { .. } => self.analyzer.visit_unary_op(self, expr, ctx),
            Expression::CommandCall { .. } => self.analyzer.visit_command_call(self, expr, ctx),
            Expression::HandlerCall { .. } => self.analyzer.visit_handler_call(self, expr, ctx),
        }
    }

    /// The base rendering for one expression, bypassing the analyzer. An
    /// analyzer hook calls this to fall back to default behavior for a node
    /// it declines to rewrite.
    pub fn print_expression_default(&self, expr: &Expression, ctx: &Context) -> String {
        match expr {
            Expression::StringLiteral(v) => print_string_literal(v),
            Expression::NumberLiteral(v) => v.to_string(),
            Expression::BooleanLiteral(v) => if *v { "true" } else { "false" }.to_string(),
            Expression::DateLiteral(text) => format!("date \"{text}\""),
            Expression::MissingValue => "missing value".to_string(),
            Expression::Keyword(code) => self.resolve_keyword(ctx, code),
            Expression::VarRef(name) => name.clone(),
            Expression::List(items) => self.print_list(items, ctx),
            Expression::Record(fields) => self.print_record(fields, ctx),
            Expression::ElementSpecifier(spec) => self.print_element_specifier(spec, ctx),
            Expression::BinaryOp { op, left, right } => self.print_binary_op(*op, left, right, ctx),
            Expression::UnaryOp { op, operand } => self.print_unary_op(*op, operand, ctx),
            Expression::CommandCall {
                command_name,
                target,
                arguments,
            } => self.print_command_call(command_name, target.as_deref(), arguments, ctx),
            Expression::HandlerCall {
                name,
                arguments,
                target,
            } => self.print_handler_call(name, arguments, target.as_deref(), ctx),
        }
    }

    pub fn print_list(&self, items: &[Expression], ctx: &Context) -> String {
        let elems: Vec<String> = items.iter().map(|e| self.print_expression(e, ctx)).collect();
        format!("{{{}}}", elems.join(", "))
    }

    fn print_record(&self, fields: &[RecordField], ctx: &Context) -> String {
        let rendered: Vec<String> = fields
            .iter()
            .map(|f| {
                format!(
                    "{}: {}",
                    self.print_expression(&f.label, ctx),
                    self.print_expression(&f.value, ctx)
                )
            })
            .collect();
        format!("{{{}}}", rendered.join(", "))
    }

    fn print_element_specifier(&self, spec: &ElementSpecifier, ctx: &Context) -> String {
        let container = self.print_expression(&spec.container, ctx);
        let base = match &spec.element_class {
            Some(class) => format!("{class} of {container}"),
            None => container,
        };
        match (&spec.key, &spec.key_kind) {
            (Some(key), Some(kind)) => {
                format!("{base} whose {kind} is {}", self.print_expression(key, ctx))
            }
            _ => base,
        }
    }

    pub fn print_binary_op(
        &self,
        op: BinaryOpKind,
        left: &Expression,
        right: &Expression,
        ctx: &Context,
    ) -> String {
        let l = self.print_expression(left, ctx);
        let r = self.print_expression(right, ctx);
        match op {
            BinaryOpKind::Coerce => format!("({l} as {r})"),
            BinaryOpKind::Thru => format!("{l} thru {r}"),
            // `it's property` / `it item N` prints without the receiver.
            BinaryOpKind::GetIndexed if r == "__it__" || r == "my" => l,
            BinaryOpKind::GetIndexed => format!("{l} {r}"),
            BinaryOpKind::GetProperty if r == "__it__" || r == "my" => l,
            BinaryOpKind::GetProperty => format!("({l} of {r})"),
            BinaryOpKind::Every if l == "__it__" => format!(" every {r}"),
            BinaryOpKind::Every => format!("(every {r} of {l})"),
            _ => format!("{l} {} {r}", binop_symbol(op)),
        }
    }

    pub fn print_unary_op(&self, op: UnaryOpKind, operand: &Expression, ctx: &Context) -> String {
        let o = self.print_expression(operand, ctx);
        match op {
            UnaryOpKind::Neg => format!("-({o})"),
            UnaryOpKind::Not => format!("not ({o})"),
            UnaryOpKind::EndOf => format!("end of ({o})"),
        }
    }

    pub fn print_command_call(
        &self,
        command_name: &str,
        target: Option<&Expression>,
        arguments: &[Expression],
        ctx: &Context,
    ) -> String {
        let mut inner_ctx = ctx.clone();
        if let Some(t) = target {
            inner_ctx.target = self.print_expression(t, ctx);
        }
        let rendered_name = self.resolve_command_name(command_name, &mut inner_ctx);

        let mut args_src: Vec<String> = arguments
            .iter()
            .map(|a| self.print_expression(a, &inner_ctx))
            .collect();
        if matches!(arguments.first(), Some(Expression::VarRef(n)) if n == "__it__") {
            args_src.remove(0);
        }
        let args_str = args_src.join(" ");

        let target_prefix = match target {
            Some(t) => format!("tell application \"{}\" ", self.print_expression(t, ctx)),
            None => String::new(),
        };
        if args_str.is_empty() {
            format!("({target_prefix}{rendered_name})")
        } else {
            format!("({target_prefix}{rendered_name} {args_str})")
        }
    }

    fn print_handler_call(
        &self,
        name: &str,
        arguments: &[Expression],
        target: Option<&Expression>,
        ctx: &Context,
    ) -> String {
        let args_str = arguments
            .iter()
            .map(|a| self.print_expression(a, ctx))
            .collect::<Vec<_>>()
            .join(", ");
        let target_prefix = match target {
            Some(t) => {
                let rendered = self.print_expression(t, ctx);
                if rendered == "my" {
                    format!("{rendered} ")
                } else {
                    format!("{rendered}'s ")
                }
            }
            None => String::new(),
        };
        format!("{target_prefix}{name}({args_str})")
    }

    /// Resolves a command's dictionary entry, narrowing `ctx` to the found
    /// target/command when a match is found so the caller can print
    /// arguments with the right `Keyword` resolution scope. Mirrors
    /// [`Self::resolve_keyword`]'s order: current target's vocabulary,
    /// `StandardAdditions`, the event-code table for the current target,
    /// the event-code table for the default target, then a `core*`/`misc*`
    /// substring fallback.
    fn resolve_command_name(&self, command_name: &str, ctx: &mut Context) -> String {
        if let Some(entry) = self.dictionary.sdef(&ctx.target, command_name) {
            ctx.command = Some(command_name.to_string());
            return entry.name.clone();
        }
        if let Some(entry) = self.dictionary.sdef(STANDARD_ADDITIONS, command_name) {
            ctx.command = Some(command_name.to_string());
            ctx.target = STANDARD_ADDITIONS.to_string();
            return entry.name.clone();
        }
        if let Some(name) = self.dictionary.event_name(&ctx.target, command_name) {
            return name.to_string();
        }
        if let Some(name) = self.dictionary.event_name(DEFAULT_TARGET, command_name) {
            return name.to_string();
        }
        if command_name.len() > 4 {
            if let Some(name) = self.dictionary.event_name(DEFAULT_TARGET, &command_name[4..]) {
                return name.to_string();
            }
        }
        command_name.to_string()
    }

    /// The `Keyword` resolution order (§4.4): current command's named
    /// parameters, current target's vocabulary, `StandardAdditions`, the
    /// event-code table for the current target, the event-code table for
    /// the default target, a `core*`/`misc*` substring fallback, then the
    /// raw code text.
    fn resolve_keyword(&self, ctx: &Context, code: &str) -> String {
        if let Some(cmd) = &ctx.command {
            if let Some(entry) = self.dictionary.sdef(&ctx.target, cmd) {
                if let Some(name) = entry.parameters.get(code) {
                    return name.clone();
                }
            }
        }
        if let Some(entry) = self.dictionary.sdef(STANDARD_ADDITIONS, code) {
            return entry.name.clone();
        }
        if let Some(name) = self.dictionary.event_name(&ctx.target, code) {
            return name.to_string();
        }
        if let Some(name) = self.dictionary.event_name(DEFAULT_TARGET, code) {
            return name.to_string();
        }
        if code.len() > 4 && (code.starts_with("core") || code.starts_with("misc")) {
            if let Some(name) = self.dictionary.event_name(DEFAULT_TARGET, &code[4..]) {
                return name.to_string();
            }
        }
        if let Some(name) = crate::dictionary::fallback_name(code) {
            return name.to_string();
        }
        code.to_string()
    }
}

fn print_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn binop_symbol(op: BinaryOpKind) -> &'static str {
    match op {
        BinaryOpKind::Add => "+",
        BinaryOpKind::Sub => "-",
        BinaryOpKind::Mul => "*",
        BinaryOpKind::Div => "/",
        BinaryOpKind::Mod => "mod",
        BinaryOpKind::Pow => "^",
        BinaryOpKind::Concat => "&",
        BinaryOpKind::Eq => "is",
        BinaryOpKind::Ne => "is not",
        BinaryOpKind::Lt => "<",
        BinaryOpKind::Le => "\u{2264}",
        BinaryOpKind::Gt => ">",
        BinaryOpKind::Ge => "\u{2265}",
        BinaryOpKind::Contains => "contains",
        BinaryOpKind::And => "and",
        BinaryOpKind::Or => "or",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::BaseAnalyzer;
    use crate::dictionary::BuiltinDictionary;

    fn printer() -> Printer<'static> {
        Printer::new(&BuiltinDictionary, &BaseAnalyzer)
    }

    #[test]
    fn prints_handler_with_indentation() {
        let handler = Handler {
            name: "sayHello".to_string(),
            parameters: vec!["name".to_string()],
            body: vec![Statement::Return(Some(Expression::StringLiteral(
                "hi".to_string(),
            )))],
        };
        let out = printer().print_handler(&handler, 0);
        assert_eq!(out, "on sayHello(name)\n    return \"hi\"\nend sayHello");
    }

    #[test]
    fn if_without_else_omits_else_clause() {
        let ctx = Context::default();
        let stmt = IfStatement {
            condition: Expression::BooleanLiteral(true),
            then_block: vec![Statement::ExitRepeat],
            else_block: Vec::new(),
            end_if_pos: 0,
        };
        let out = printer().print_if(&stmt, 0, &ctx);
        assert!(!out.contains("else"));
    }

    #[test]
    fn keyword_resolves_via_event_code_table() {
        let ctx = Context::default();
        let out = printer().print_expression(&Expression::Keyword("coreactv".to_string()), &ctx);
        assert_eq!(out, "activate");
    }

    #[test]
    fn binary_op_of_get_property_renders_parenthesised_of() {
        let ctx = Context::default();
        let expr = Expression::BinaryOp {
            op: BinaryOpKind::GetProperty,
            left: Box::new(Expression::VarRef("doc".to_string())),
            right: Box::new(Expression::Keyword("pnam".to_string())),
        };
        let out = printer().print_expression(&expr, &ctx);
        assert_eq!(out, "(doc of pnam)");
    }

    #[test]
    fn command_call_with_no_target_has_no_prefix() {
        let ctx = Context::default();
        let expr = Expression::CommandCall {
            command_name: "ascrchar".to_string(),
            target: None,
            arguments: vec![Expression::StringLiteral("/".to_string())],
        };
        let out = printer().print_expression(&expr, &ctx);
        assert_eq!(out, "(ASCII character \"/\")");
    }
}
