//! Lint schema files: parse and resolution errors, DEFAULT values, naming, trailing whitespace.
//!
//! Usage:
//!   lint_schema [OPTIONS] [FILE.asn ...]
//!   lint_schema < file.asn
//!
//! Options:
//!   --fix, -f    Strip trailing whitespace (files are rewritten; stdin is echoed fixed to stdout)
//!   --human, -H  Human-readable output
//!
//! Exit code 1 if any error-level findings.

use perdsl::lint::{lint, LintMessage, LintRule, Severity};
use std::io::{self, Read, Write};
use std::path::PathBuf;

fn rule_id(rule: LintRule) -> &'static str {
    match rule {
        LintRule::ParseError => "parse-error",
        LintRule::UnresolvedReference => "unresolved-reference",
        LintRule::DuplicateName => "duplicate-name",
        LintRule::EmptyRange => "empty-range",
        LintRule::RecursiveType => "recursive-type",
        LintRule::DefaultMismatch => "default-mismatch",
        LintRule::NamingConvention => "naming-convention",
        LintRule::NoTrailingWhitespace => "no-trailing-whitespace",
    }
}

fn print_message(name: &str, m: &LintMessage, style: OutputStyle) {
    let severity = match m.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };
    let rule = rule_id(m.rule);
    match style {
        OutputStyle::Compact => {
            let summary = m.message.lines().next().unwrap_or("");
            println!("{}:{}:{}: {}: {} [{}]", name, m.line, m.column, severity, summary, rule);
        }
        OutputStyle::Human => {
            println!("{} in {} at {}:{} ({})", severity, name, m.line, m.column, rule);
            println!("    {}", m.message);
        }
    }
}

#[derive(Clone, Copy)]
enum OutputStyle {
    Compact,
    Human,
}

fn strip_trailing_whitespace(src: &str) -> String {
    let mut out: String = src.lines().map(str::trim_end).collect::<Vec<_>>().join("\n");
    if src.ends_with('\n') {
        out.push('\n');
    }
    out
}

enum Input {
    Stdin,
    File(PathBuf),
}

impl Input {
    fn name(&self) -> String {
        match self {
            Input::Stdin => "<stdin>".to_string(),
            Input::File(path) => path.display().to_string(),
        }
    }

    /// Source to lint. With `fix` a file is rewritten first; stdin is echoed fixed and not linted.
    fn source(&self, fix: bool) -> io::Result<Option<String>> {
        let src = match self {
            Input::Stdin => {
                let mut src = String::new();
                io::stdin().read_to_string(&mut src)?;
                if fix {
                    io::stdout().write_all(strip_trailing_whitespace(&src).as_bytes())?;
                    return Ok(None);
                }
                src
            }
            Input::File(path) => {
                let src = std::fs::read_to_string(path)?;
                if !fix {
                    return Ok(Some(src));
                }
                let fixed = strip_trailing_whitespace(&src);
                if fixed != src {
                    std::fs::write(path, &fixed)?;
                    eprintln!("{}: fixed", path.display());
                }
                fixed
            }
        };
        Ok(Some(src))
    }
}

#[derive(Default)]
struct Tally {
    errors: usize,
    warnings: usize,
}

impl Tally {
    /// Print one input's findings; true when any is an error.
    fn report(&mut self, name: &str, messages: &[LintMessage], style: OutputStyle) -> bool {
        for m in messages {
            match m.severity {
                Severity::Error => self.errors += 1,
                Severity::Warning => self.warnings += 1,
            }
            print_message(name, m, style);
        }
        messages.iter().any(|m| m.severity == Severity::Error)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut fix = false;
    let mut style = OutputStyle::Compact;
    let mut inputs = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--fix" | "-f" => fix = true,
            "--human" | "-H" => style = OutputStyle::Human,
            _ => inputs.push(Input::File(PathBuf::from(arg))),
        }
    }
    if inputs.is_empty() {
        inputs.push(Input::Stdin);
    }

    let mut tally = Tally::default();
    let mut failed = false;
    for input in &inputs {
        match input.source(fix) {
            Ok(Some(src)) => failed |= tally.report(&input.name(), &lint(&src), style),
            Ok(None) => {}
            Err(e) => {
                eprintln!("{}: {}", input.name(), e);
                failed = true;
            }
        }
    }

    if tally.errors > 0 || tally.warnings > 0 {
        eprintln!("lint: {} error(s), {} warning(s)", tally.errors, tally.warnings);
    }
    if failed {
        std::process::exit(1);
    }
    Ok(())
}
