//! Parse schema source into AST using PEST.

use crate::ast::*;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct SchemaParser;

/// Parse schema source into AST.
pub fn parse(source: &str) -> Result<Module, String> {
    let pairs = SchemaParser::parse(Rule::module, source)
        .map_err(|e| format!("Parse error: {}", e))?;
    let pair = pairs.into_iter().next().ok_or("Empty parse")?;
    build_module(pair)
}

fn build_module(pair: Pair<Rule>) -> Result<Module, String> {
    let mut name = None;
    let mut values = Vec::new();
    let mut types = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::module_header => {
                name = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::ident)
                    .map(|p| p.as_str().to_string());
            }
            Rule::value_assignment => values.push(build_value_assignment(inner)?),
            Rule::type_assignment => types.push(build_type_assignment(inner)?),
            _ => {}
        }
    }

    Ok(Module { name, values, types })
}

fn build_value_assignment(pair: Pair<Rule>) -> Result<ValueAssignment, String> {
    let line = pair.as_span().start_pos().line_col().0;
    let mut name = None;
    let mut value = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = Some(inner.as_str().to_string()),
            Rule::number => value = Some(parse_number(inner.as_str())?),
            _ => {}
        }
    }
    Ok(ValueAssignment {
        name: name.ok_or("value assignment: missing name")?,
        value: value.ok_or("value assignment: missing value")?,
        line,
    })
}

fn build_type_assignment(pair: Pair<Rule>) -> Result<TypeAssignment, String> {
    let line = pair.as_span().start_pos().line_col().0;
    let mut name = None;
    let mut type_spec = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = Some(inner.as_str().to_string()),
            Rule::type_spec => type_spec = Some(build_type_spec(inner)?),
            _ => {}
        }
    }
    let name: String = name.ok_or("type assignment: missing name")?;
    let type_spec = type_spec.ok_or_else(|| format!("{}: missing type", name))?;
    Ok(TypeAssignment { name, type_spec, line })
}

fn build_type_spec(pair: Pair<Rule>) -> Result<TypeSpec, String> {
    let inner = pair.into_inner().next().ok_or("empty type")?;
    match inner.as_rule() {
        Rule::null_type => Ok(TypeSpec::Null),
        Rule::boolean_type => Ok(TypeSpec::Boolean),
        Rule::integer_type => {
            let range = inner
                .into_inner()
                .find(|p| p.as_rule() == Rule::range)
                .map(build_range)
                .transpose()?;
            Ok(TypeSpec::Integer(range))
        }
        Rule::bit_string_type => {
            let size = inner
                .into_inner()
                .find(|p| p.as_rule() == Rule::size_constraint)
                .map(build_size_constraint)
                .transpose()?;
            Ok(TypeSpec::BitString(size))
        }
        Rule::octet_string_type => {
            let mut size = None;
            let mut containing = None;
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::size_constraint => size = Some(build_size_constraint(part)?),
                    Rule::containing => {
                        containing = part
                            .into_inner()
                            .find(|p| p.as_rule() == Rule::type_ref)
                            .map(|p| p.as_str().to_string());
                    }
                    _ => {}
                }
            }
            Ok(TypeSpec::OctetString { size, containing })
        }
        Rule::enumerated_type => build_enumerated(inner).map(TypeSpec::Enumerated),
        Rule::sequence_type => build_sequence(inner).map(TypeSpec::Sequence),
        Rule::choice_type => build_choice(inner).map(TypeSpec::Choice),
        Rule::sequence_of_type => {
            let mut size = None;
            let mut element = None;
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::size_constraint => size = Some(build_size_constraint(part)?),
                    Rule::type_spec => element = Some(build_type_spec(part)?),
                    _ => {}
                }
            }
            let element = element.ok_or("SEQUENCE OF: missing element type")?;
            Ok(TypeSpec::SequenceOf {
                size,
                element: Box::new(element),
            })
        }
        Rule::type_ref => Ok(TypeSpec::Ref(inner.as_str().trim().to_string())),
        r => Err(format!("unexpected type rule {:?}", r)),
    }
}

fn build_size_constraint(pair: Pair<Rule>) -> Result<Range, String> {
    let range = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::range)
        .ok_or("SIZE: missing range")?;
    build_range(range)
}

fn build_range(pair: Pair<Rule>) -> Result<Range, String> {
    let mut lo = None;
    let mut hi = None;
    let mut has_upper = false;
    let mut extensible = false;
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::lower_bound => lo = Some(build_bound(part)?),
            Rule::upper_bound => {
                has_upper = true;
                let b = part.into_inner().next().ok_or("range: empty upper bound")?;
                hi = match b.as_rule() {
                    Rule::kw_max => None,
                    _ => Some(bound_from(b)?),
                };
            }
            Rule::extension_mark => extensible = true,
            _ => {}
        }
    }
    let lo = lo.ok_or("range: missing lower bound")?;
    if !has_upper {
        hi = Some(lo.clone());
    }
    Ok(Range { lo, hi, extensible })
}

fn build_bound(pair: Pair<Rule>) -> Result<Bound, String> {
    let b = pair.into_inner().next().ok_or("empty bound")?;
    bound_from(b)
}

fn bound_from(pair: Pair<Rule>) -> Result<Bound, String> {
    match pair.as_rule() {
        Rule::number => Ok(Bound::Value(parse_number(pair.as_str())?)),
        Rule::value_ref => Ok(Bound::Ref(pair.as_str().trim().to_string())),
        r => Err(format!("unexpected bound {:?}", r)),
    }
}

fn build_enumerated(pair: Pair<Rule>) -> Result<Enumerated, String> {
    let mut items = Vec::new();
    let mut additions = Vec::new();
    let mut extensible = false;
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::extension_marker => {
                if extensible {
                    return Err("ENUMERATED: more than one extension marker".to_string());
                }
                extensible = true;
            }
            Rule::enum_name => {
                let name = part
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::ident)
                    .map(|p| p.as_str().to_string())
                    .ok_or("ENUMERATED: missing item name")?;
                if extensible {
                    additions.push(name);
                } else {
                    items.push(name);
                }
            }
            _ => {}
        }
    }
    if items.is_empty() {
        return Err("ENUMERATED: no root items".to_string());
    }
    Ok(Enumerated {
        items,
        extensible,
        additions,
    })
}

#[derive(PartialEq)]
enum Section {
    Root,
    Extension,
    RootAfterExtension,
}

fn build_sequence(pair: Pair<Rule>) -> Result<Sequence, String> {
    let mut fields = Vec::new();
    let mut additions = Vec::new();
    let mut section = Section::Root;
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::extension_marker => {
                section = match section {
                    Section::Root => Section::Extension,
                    Section::Extension => Section::RootAfterExtension,
                    Section::RootAfterExtension => {
                        return Err("SEQUENCE: more than two extension markers".to_string())
                    }
                };
            }
            Rule::field => {
                let field = build_field(part)?;
                if section == Section::Extension {
                    additions.push(Addition::Single(field));
                } else {
                    fields.push(field);
                }
            }
            Rule::extension_group => {
                if section != Section::Extension {
                    return Err("SEQUENCE: extension group outside the extension section".to_string());
                }
                let group = part
                    .into_inner()
                    .filter(|p| p.as_rule() == Rule::field)
                    .map(build_field)
                    .collect::<Result<Vec<_>, _>>()?;
                additions.push(Addition::Group(group));
            }
            _ => {}
        }
    }
    Ok(Sequence {
        fields,
        extensible: section != Section::Root,
        additions,
    })
}

fn build_choice(pair: Pair<Rule>) -> Result<Choice, String> {
    let mut alternatives = Vec::new();
    let mut additions = Vec::new();
    let mut extensible = false;
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::extension_marker => {
                if extensible {
                    return Err("CHOICE: more than one extension marker".to_string());
                }
                extensible = true;
            }
            Rule::field => {
                let alt = build_alternative(part)?;
                if extensible {
                    additions.push(alt);
                } else {
                    alternatives.push(alt);
                }
            }
            Rule::extension_group => {
                if !extensible {
                    return Err("CHOICE: extension group before the extension marker".to_string());
                }
                for f in part.into_inner().filter(|p| p.as_rule() == Rule::field) {
                    additions.push(build_alternative(f)?);
                }
            }
            _ => {}
        }
    }
    if alternatives.is_empty() {
        return Err("CHOICE: no root alternatives".to_string());
    }
    Ok(Choice {
        alternatives,
        extensible,
        additions,
    })
}

fn build_alternative(pair: Pair<Rule>) -> Result<Alternative, String> {
    let field = build_field(pair)?;
    if field.presence != Presence::Mandatory {
        return Err(format!("CHOICE alternative {} cannot be OPTIONAL or DEFAULT", field.name));
    }
    Ok(Alternative {
        name: field.name,
        type_spec: field.type_spec,
    })
}

fn build_field(pair: Pair<Rule>) -> Result<Field, String> {
    let mut name = None;
    let mut type_spec = None;
    let mut presence = Presence::Mandatory;
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::ident => name = Some(part.as_str().to_string()),
            Rule::type_spec => type_spec = Some(build_type_spec(part)?),
            Rule::kw_optional => presence = Presence::Optional,
            Rule::default_value => {
                let lit = part
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::literal)
                    .ok_or("DEFAULT: missing value")?;
                presence = Presence::Default(parse_literal(lit)?);
            }
            _ => {}
        }
    }
    let name: String = name.ok_or("field: missing name")?;
    let type_spec = type_spec.ok_or_else(|| format!("field {}: missing type", name))?;
    Ok(Field {
        name,
        type_spec,
        presence,
    })
}

fn parse_literal(pair: Pair<Rule>) -> Result<Literal, String> {
    let inner = pair.into_inner().next().ok_or("empty literal")?;
    match inner.as_rule() {
        Rule::number => Ok(Literal::Integer(parse_number(inner.as_str())?)),
        Rule::kw_true => Ok(Literal::Bool(true)),
        Rule::kw_false => Ok(Literal::Bool(false)),
        _ => Ok(Literal::Ident(inner.as_str().to_string())),
    }
}

fn parse_number(s: &str) -> Result<i64, String> {
    s.trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid number {}: {}", s, e))
}
