//! Format decoded values for display, walking the schema so components come out in
//! declaration order with enumeration and arm names.

use crate::ast::{Addition, ResolvedModule, TypeSpec};
use crate::value::Value;

fn hex_string(b: &[u8]) -> String {
    b.iter().map(|x| format!("{:02x}", x)).collect::<Vec<_>>().join(" ")
}

/// Multi-line dump of `v` as a value of `type_name`.
pub fn dump_value(resolved: &ResolvedModule, type_name: &str, v: &Value) -> String {
    match resolved.get_type(type_name) {
        Some(t) => format!("{} ::= {}", type_name, value_to_dump(resolved, &t.type_spec, v, 0)),
        None => format!("{} ::= {}", type_name, value_to_dump_untyped(v, 0)),
    }
}

/// One line for a leaf, or a block for SEQUENCE / CHOICE / SEQUENCE OF.
pub fn value_to_dump(resolved: &ResolvedModule, spec: &TypeSpec, v: &Value, indent: usize) -> String {
    let spec = match resolved.deref(spec) {
        Some(s) => s,
        None => return value_to_dump_untyped(v, indent),
    };
    let pad = "  ".repeat(indent);
    match (spec, v) {
        (TypeSpec::Sequence(s), Value::Sequence(m)) => {
            let mut lines = vec!["{".to_string()];
            let fields = s
                .fields
                .iter()
                .chain(s.additions.iter().flat_map(Addition::fields));
            for f in fields {
                if let Some(val) = m.get(&f.name) {
                    let sub = value_to_dump(resolved, &f.type_spec, val, indent + 1);
                    lines.push(format!("{}  {} {}", pad, f.name, sub));
                }
            }
            lines.push(format!("{}}}", pad));
            lines.join("\n")
        }
        (TypeSpec::Choice(c), Value::Choice { arm, value }) => {
            let alt = c
                .alternatives
                .iter()
                .chain(c.additions.iter())
                .find(|a| &a.name == arm);
            let sub = match alt {
                Some(a) => value_to_dump(resolved, &a.type_spec, value, indent),
                None => value_to_dump_untyped(value, indent),
            };
            format!("{} : {}", arm, sub)
        }
        (TypeSpec::SequenceOf { element, .. }, Value::List(items)) => {
            if items.is_empty() {
                return "{}".to_string();
            }
            let mut lines = vec!["{".to_string()];
            for (i, item) in items.iter().enumerate() {
                let sub = value_to_dump(resolved, element, item, indent + 1);
                lines.push(format!("{}  [{}] {}", pad, i, sub));
            }
            lines.push(format!("{}}}", pad));
            lines.join("\n")
        }
        _ => value_to_dump_untyped(v, indent),
    }
}

fn value_to_dump_untyped(v: &Value, indent: usize) -> String {
    let pad = "  ".repeat(indent);
    match v {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Integer(n) => n.to_string(),
        Value::Enumerated(name) => name.clone(),
        Value::BitString(b) => b.to_string(),
        Value::OctetString(b) => format!("hex({})", hex_string(b)),
        Value::Opaque(b) => format!("opaque({})", hex_string(b)),
        Value::Choice { arm, value } => format!("{} : {}", arm, value_to_dump_untyped(value, indent)),
        Value::Sequence(m) => {
            let mut keys: Vec<_> = m.keys().collect();
            keys.sort();
            let mut lines = vec!["{".to_string()];
            for k in keys {
                lines.push(format!("{}  {} {}", pad, k, value_to_dump_untyped(&m[k], indent + 1)));
            }
            lines.push(format!("{}}}", pad));
            lines.join("\n")
        }
        Value::List(items) => {
            let parts: Vec<String> = items.iter().map(|i| value_to_dump_untyped(i, indent + 1)).collect();
            format!("{{ {} }}", parts.join(", "))
        }
    }
}

/// First line of the dump (for one-line summaries).
pub fn value_summary_line(resolved: &ResolvedModule, type_name: &str, v: &Value) -> String {
    let full = dump_value(resolved, type_name, v);
    full.lines().next().map(|s| s.trim().to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::value::BitString;

    fn resolved(src: &str) -> ResolvedModule {
        ResolvedModule::resolve(parse(src).unwrap()).unwrap()
    }

    #[test]
    fn components_in_declaration_order() {
        let r = resolved(
            "M ::= SEQUENCE { zeta INTEGER (0..7), alpha BOOLEAN, id BIT STRING (SIZE(8)) OPTIONAL }",
        );
        let v = Value::sequence([
            ("alpha", Value::Bool(true)),
            ("zeta", Value::Integer(5)),
            ("id", Value::BitString(BitString::from_u64(0xa5, 8))),
        ]);
        let text = dump_value(&r, "M", &v);
        assert_eq!(text, "M ::= {\n  zeta 5\n  alpha TRUE\n  id 'A5'H\n}");
        assert_eq!(value_summary_line(&r, "M", &v), "M ::= {");
    }

    #[test]
    fn choice_and_list() {
        let r = resolved("C ::= CHOICE { a SEQUENCE (SIZE(0..4)) OF INTEGER (0..9), b NULL }");
        let v = Value::choice("a", Value::List(vec![Value::Integer(1), Value::Integer(2)]));
        assert_eq!(dump_value(&r, "C", &v), "C ::= a : {\n  [0] 1\n  [1] 2\n}");
        let v = Value::choice("extension#0", Value::Opaque(vec![0xde, 0xad]));
        assert_eq!(dump_value(&r, "C", &v), "C ::= extension#0 : opaque(de ad)");
    }
}
