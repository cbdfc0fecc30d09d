//! Linter for schema modules: resolution problems plus a few style rules.
//!
//! ## Rules
//!
//! - **Parse error**: the module does not match the grammar.
//! - **Unresolved reference**: a type or bound names something not assigned in the module.
//! - **Duplicate name**: a type or value is assigned twice.
//! - **Empty range**: a constraint whose lower bound exceeds its upper bound.
//! - **Recursive type**: an alias cycle, or a type whose every value would contain itself.
//! - **Default mismatch**: a DEFAULT literal that does not fit the component type.
//! - **Naming convention**: type names start upper case, components and values lower case.
//! - **No trailing whitespace**: lines must not end in spaces or tabs.
//!
//! Run via the `lint_schema` binary: `lint_schema schemas/file.asn` or `lint_schema < file.asn`.
//! Exit code 1 if any error-level findings.

use crate::ast::{Literal, Module, Presence, ResolvedModule, TypeSpec};
use crate::parser::parse;

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Identifies which rule produced the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintRule {
    ParseError,
    UnresolvedReference,
    DuplicateName,
    EmptyRange,
    RecursiveType,
    DefaultMismatch,
    NamingConvention,
    NoTrailingWhitespace,
}

/// A single lint message with location. `line` is 0 when no location is known.
#[derive(Debug, Clone)]
pub struct LintMessage {
    pub line: usize,
    pub column: usize,
    pub rule: LintRule,
    pub severity: Severity,
    pub message: String,
}

impl LintMessage {
    fn error(line: usize, rule: LintRule, message: String) -> Self {
        LintMessage {
            line,
            column: 1,
            rule,
            severity: Severity::Error,
            message,
        }
    }

    fn warning(line: usize, rule: LintRule, message: String) -> Self {
        LintMessage {
            severity: Severity::Warning,
            ..LintMessage::error(line, rule, message)
        }
    }
}

/// Run all lint rules on schema source. Returns messages in line order.
pub fn lint(source: &str) -> Vec<LintMessage> {
    let mut out = Vec::new();

    for (i, line) in source.lines().enumerate() {
        if line != line.trim_end() {
            out.push(LintMessage {
                line: i + 1,
                column: line.trim_end().len() + 1,
                rule: LintRule::NoTrailingWhitespace,
                severity: Severity::Warning,
                message: "trailing whitespace not allowed".to_string(),
            });
        }
    }

    match parse(source) {
        Ok(module) => {
            check_names(&module, &mut out);
            check_defaults(&module, &mut out);
            if let Err(e) = ResolvedModule::resolve(module.clone()) {
                out.push(LintMessage::error(locate(&module, &e), classify(&e), e));
            }
        }
        Err(e) => {
            let line = e
                .lines()
                .find_map(|l| l.split("--> ").nth(1))
                .and_then(|loc| loc.split(':').next())
                .and_then(|n| n.trim().parse().ok())
                .unwrap_or(0);
            out.push(LintMessage::error(line, LintRule::ParseError, e));
        }
    }

    out.sort_by_key(|m| m.line);
    out
}

/// Rule for a resolution error message.
fn classify(e: &str) -> LintRule {
    if e.starts_with("Duplicate") {
        LintRule::DuplicateName
    } else if e.contains("empty range") {
        LintRule::EmptyRange
    } else if e.contains("alias cycle") || e.contains("no finite value") {
        LintRule::RecursiveType
    } else {
        LintRule::UnresolvedReference
    }
}

/// Line of the assignment a resolution error names (`Owner: ...` or `... name`).
fn locate(module: &Module, e: &str) -> usize {
    let owner = e.split(':').next().unwrap_or("");
    let last = e.rsplit(' ').next().unwrap_or("");
    module
        .types
        .iter()
        .filter(|t| t.name == owner || t.name == last)
        .map(|t| t.line)
        .chain(module.values.iter().filter(|v| v.name == last).map(|v| v.line))
        .max()
        .unwrap_or(0)
}

fn check_names(module: &Module, out: &mut Vec<LintMessage>) {
    let starts_upper = |s: &str| s.chars().next().map_or(false, |c| c.is_ascii_uppercase());
    for t in &module.types {
        if !starts_upper(&t.name) {
            out.push(LintMessage::warning(
                t.line,
                LintRule::NamingConvention,
                format!("type name {} should start with an upper-case letter", t.name),
            ));
        }
        t.type_spec.walk(&mut |spec| {
            let names: Vec<&str> = match spec {
                TypeSpec::Sequence(s) => s
                    .fields
                    .iter()
                    .chain(s.additions.iter().flat_map(|a| a.fields()))
                    .map(|f| f.name.as_str())
                    .collect(),
                TypeSpec::Choice(c) => c
                    .alternatives
                    .iter()
                    .chain(c.additions.iter())
                    .map(|a| a.name.as_str())
                    .collect(),
                _ => Vec::new(),
            };
            for name in names {
                if starts_upper(name) {
                    out.push(LintMessage::warning(
                        t.line,
                        LintRule::NamingConvention,
                        format!("{}: component name {} should start with a lower-case letter", t.name, name),
                    ));
                }
            }
        });
    }
    for v in &module.values {
        if starts_upper(&v.name) {
            out.push(LintMessage::warning(
                v.line,
                LintRule::NamingConvention,
                format!("value name {} should start with a lower-case letter", v.name),
            ));
        }
    }
}

/// Follow references in the unresolved module; `None` when unknown or cyclic.
fn deref_unresolved<'a>(module: &'a Module, mut spec: &'a TypeSpec) -> Option<&'a TypeSpec> {
    for _ in 0..=module.types.len() {
        match spec {
            TypeSpec::Ref(name) => spec = &module.types.iter().find(|t| &t.name == name)?.type_spec,
            other => return Some(other),
        }
    }
    None
}

fn check_defaults(module: &Module, out: &mut Vec<LintMessage>) {
    for t in &module.types {
        t.type_spec.walk(&mut |spec| {
            let fields: Vec<_> = match spec {
                TypeSpec::Sequence(s) => s
                    .fields
                    .iter()
                    .chain(s.additions.iter().flat_map(|a| a.fields()))
                    .collect(),
                _ => return,
            };
            for f in fields {
                let literal = match &f.presence {
                    Presence::Default(l) => l,
                    _ => continue,
                };
                let fits = match (deref_unresolved(module, &f.type_spec), literal) {
                    (Some(TypeSpec::Boolean), Literal::Bool(_)) => true,
                    (Some(TypeSpec::Integer(range)), Literal::Integer(n)) => {
                        match range.as_ref().and_then(|r| r.bounds()) {
                            Some((lo, hi)) => *n >= lo && hi.map_or(true, |h| *n <= h),
                            None => true,
                        }
                    }
                    (Some(TypeSpec::Enumerated(e)), Literal::Ident(name)) => {
                        e.items.iter().chain(e.additions.iter()).any(|i| i == name)
                    }
                    (Some(TypeSpec::Integer(_)), Literal::Ident(name)) => {
                        module.values.iter().any(|v| &v.name == name)
                    }
                    (None, _) => true,
                    _ => false,
                };
                if !fits {
                    out.push(LintMessage::error(
                        t.line,
                        LintRule::DefaultMismatch,
                        format!("{}: DEFAULT of {} does not fit its type", t.name, f.name),
                    ));
                }
            }
        });
    }
}
