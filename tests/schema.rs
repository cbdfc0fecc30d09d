//! Schema language tests: syntax (parse success/failure) and semantics (resolve, references).

use perdsl::ast::{Addition, Bound, Literal, Presence, Range, TypeSpec};
use perdsl::{parse, ResolvedModule};

// ==================== Syntax: valid modules ====================

#[test]
fn parse_empty_module() {
    let m = parse("").expect("empty module can parse");
    assert!(m.name.is_none());
    assert!(m.types.is_empty());
    assert!(m.values.is_empty());
}

#[test]
fn parse_module_header_and_end() {
    let src = r#"
My-Module DEFINITIONS AUTOMATIC TAGS ::= BEGIN
A ::= NULL
END
"#;
    let m = parse(src).expect("parse");
    assert_eq!(m.name.as_deref(), Some("My-Module"));
    assert_eq!(m.types.len(), 1);
    assert_eq!(m.types[0].line, 3);
}

#[test]
fn parse_all_leaf_types() {
    let src = r#"
N ::= NULL
B ::= BOOLEAN
I ::= INTEGER
R ::= INTEGER (0..7)
S ::= INTEGER (1..MAX)
X ::= INTEGER (0..15, ...)
E ::= ENUMERATED { a, b, c }
BS ::= BIT STRING (SIZE (24))
OS ::= OCTET STRING
OC ::= OCTET STRING (CONTAINING N)
"#;
    let m = parse(src).expect("parse");
    let kinds: Vec<&str> = m.types.iter().map(|t| t.type_spec.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            "NULL",
            "BOOLEAN",
            "INTEGER",
            "INTEGER",
            "INTEGER",
            "INTEGER",
            "ENUMERATED",
            "BIT STRING",
            "OCTET STRING",
            "OCTET STRING"
        ]
    );
    assert_eq!(m.types[2].type_spec, TypeSpec::Integer(None));
    assert_eq!(
        m.types[4].type_spec,
        TypeSpec::Integer(Some(Range {
            lo: Bound::Value(1),
            hi: None,
            extensible: false
        }))
    );
    match &m.types[5].type_spec {
        TypeSpec::Integer(Some(r)) => assert!(r.extensible),
        other => panic!("unexpected {:?}", other),
    }
    match &m.types[7].type_spec {
        TypeSpec::BitString(Some(r)) => assert_eq!(r.bounds(), Some((24, Some(24)))),
        other => panic!("unexpected {:?}", other),
    }
    match &m.types[9].type_spec {
        TypeSpec::OctetString { containing, .. } => assert_eq!(containing.as_deref(), Some("N")),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn parse_comments() {
    let src = r#"
-- line comment
A ::= INTEGER (0..3) -- trailing --
/* block
   comment */
B ::= BOOLEAN
"#;
    let m = parse(src).expect("parse");
    assert_eq!(m.types.len(), 2);
}

#[test]
fn parse_sequence_with_optional_default_and_extensions() {
    let src = r#"
S ::= SEQUENCE {
    a INTEGER (0..7),
    b BOOLEAN OPTIONAL,
    c INTEGER (0..3) DEFAULT 2,
    ...,
    [[ d BOOLEAN, e INTEGER (0..1) OPTIONAL ]],
    f NULL
}
"#;
    let m = parse(src).expect("parse");
    let s = match &m.types[0].type_spec {
        TypeSpec::Sequence(s) => s,
        other => panic!("unexpected {:?}", other),
    };
    assert!(s.extensible);
    assert_eq!(s.fields.len(), 3);
    assert_eq!(s.fields[1].presence, Presence::Optional);
    assert_eq!(s.fields[2].presence, Presence::Default(Literal::Integer(2)));
    assert!(s.fields[2].has_presence_bit());
    assert_eq!(s.additions.len(), 2);
    match &s.additions[0] {
        Addition::Group(fields) => assert_eq!(fields.len(), 2),
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(&s.additions[1], Addition::Single(f) if f.name == "f"));
}

#[test]
fn parse_root_components_after_second_marker() {
    let src = "S ::= SEQUENCE { a BOOLEAN, ..., [[ b BOOLEAN ]], ..., c NULL }";
    let m = parse(src).expect("parse");
    match &m.types[0].type_spec {
        TypeSpec::Sequence(s) => {
            let names: Vec<&str> = s.fields.iter().map(|f| f.name.as_str()).collect();
            assert_eq!(names, vec!["a", "c"]);
            assert_eq!(s.additions.len(), 1);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn parse_choice_with_extension_arms() {
    let src = "C ::= CHOICE { a NULL, b BOOLEAN, ..., c INTEGER (0..9) }";
    let m = parse(src).expect("parse");
    match &m.types[0].type_spec {
        TypeSpec::Choice(c) => {
            assert_eq!(c.alternatives.len(), 2);
            assert!(c.extensible);
            assert_eq!(c.find("c"), Some((0, true)));
            assert_eq!(c.find("b"), Some((1, false)));
            assert_eq!(c.find("z"), None);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn parse_sequence_of_and_nested_types() {
    let src = "L ::= SEQUENCE (SIZE (1..maxN)) OF SEQUENCE { x CHOICE { a NULL, b NULL } }";
    let m = parse(src).expect("parse");
    match &m.types[0].type_spec {
        TypeSpec::SequenceOf { size: Some(r), element } => {
            assert_eq!(r.hi, Some(Bound::Ref("maxN".to_string())));
            assert_eq!(element.kind(), "SEQUENCE");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn parse_enumerated_with_extension() {
    let m = parse("E ::= ENUMERATED { a, b(5), ..., c }").expect("parse");
    match &m.types[0].type_spec {
        TypeSpec::Enumerated(e) => {
            assert_eq!(e.items, vec!["a", "b"]);
            assert!(e.extensible);
            assert_eq!(e.additions, vec!["c"]);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn parse_value_assignment() {
    let m = parse("maxN INTEGER ::= 16\nneg INTEGER ::= -3").expect("parse");
    assert_eq!(m.values.len(), 2);
    assert_eq!(m.values[0].value, 16);
    assert_eq!(m.values[1].value, -3);
    assert_eq!(m.values[1].line, 2);
}

// ==================== Syntax: invalid modules ====================

#[test]
fn parse_rejects_malformed_source() {
    for src in [
        "A ::= SEQUENCE {",
        "A ::= INTEGER (0..)",
        "A ::= ",
        "::= NULL",
        "A ::= CHOICE { }",
        "A ::= ENUMERATED { }",
        "A ::= SEQUENCE { x }",
    ] {
        assert!(parse(src).is_err(), "should reject {:?}", src);
    }
}

#[test]
fn parse_rejects_structural_misuse() {
    assert!(parse("A ::= CHOICE { a NULL OPTIONAL }").is_err());
    assert!(parse("A ::= CHOICE { ..., a NULL }").is_err());
    assert!(parse("A ::= SEQUENCE { [[ a NULL ]] }").is_err());
    assert!(parse("A ::= SEQUENCE { a NULL, ..., ..., ... }").is_err());
    assert!(parse("A ::= ENUMERATED { a, ..., b, ... }").is_err());
}

// ==================== Semantics: resolve ====================

#[test]
fn resolve_substitutes_value_bounds() {
    let src = "maxN INTEGER ::= 8\nL ::= SEQUENCE (SIZE (1..maxN)) OF INTEGER (0..maxN)";
    let r = ResolvedModule::resolve(parse(src).unwrap()).expect("resolve");
    assert_eq!(r.value("maxN"), Some(8));
    match &r.get_type("L").unwrap().type_spec {
        TypeSpec::SequenceOf { size: Some(size), element } => {
            assert_eq!(size.bounds(), Some((1, Some(8))));
            assert_eq!(element.ranges().and_then(|r| r.bounds()), Some((0, Some(8))));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn resolve_follows_aliases() {
    let src = "A ::= B\nB ::= C\nC ::= BOOLEAN";
    let r = ResolvedModule::resolve(parse(src).unwrap()).expect("resolve");
    let a = &r.get_type("A").unwrap().type_spec;
    assert_eq!(r.deref(a), Some(&TypeSpec::Boolean));
}

#[test]
fn resolve_allows_recursion_through_structures() {
    let src = "Tree ::= SEQUENCE { children SEQUENCE (SIZE (0..4)) OF Tree }";
    assert!(ResolvedModule::resolve(parse(src).unwrap()).is_ok());
}

#[test]
fn resolve_allows_recursion_with_an_exit() {
    for src in [
        "T ::= SEQUENCE { next T OPTIONAL }",
        "T ::= SEQUENCE { next T DEFAULT 0 }",
        "C ::= CHOICE { leaf NULL, node SEQUENCE { left C, right C } }",
        "L ::= SEQUENCE (SIZE (0..2)) OF L",
        "L ::= SEQUENCE (SIZE (1..2, ...)) OF L",
        "A ::= SEQUENCE { b B }\nB ::= SEQUENCE { a A OPTIONAL }",
    ] {
        assert!(ResolvedModule::resolve(parse(src).unwrap()).is_ok(), "{:?}", src);
    }
}

#[test]
fn resolve_errors() {
    let cases = [
        ("A ::= Missing", "unknown type Missing"),
        ("A ::= INTEGER (0..maxX)", "unknown value maxX"),
        ("A ::= NULL\nA ::= BOOLEAN", "Duplicate type name: A"),
        ("n INTEGER ::= 1\nn INTEGER ::= 2", "Duplicate value name: n"),
        ("A ::= INTEGER (5..1)", "empty range 5..1"),
        ("A ::= B\nB ::= A", "alias cycle"),
        ("A ::= OCTET STRING (CONTAINING Nope)", "unknown contained type Nope"),
        ("L ::= SEQUENCE (SIZE (1)) OF L", "L: no finite value"),
        ("T ::= SEQUENCE { flag BOOLEAN, next T }", "T: no finite value"),
        ("C ::= CHOICE { a C, ..., b C }", "C: no finite value"),
        ("A ::= SEQUENCE { b B }\nB ::= SEQUENCE { a A }", "A: no finite value"),
    ];
    for (src, expected) in cases {
        let err = ResolvedModule::resolve(parse(src).unwrap()).unwrap_err();
        assert!(err.contains(expected), "{:?}: got {:?}", src, err);
    }
}

#[test]
fn rrc_schema_resolves() {
    let src = include_str!("../schemas/nr_rrc_ul_dcch.asn");
    let r = ResolvedModule::resolve(parse(src).expect("parse")).expect("resolve");
    assert_eq!(r.module.name.as_deref(), Some("NR-RRC-Definitions"));
    assert_eq!(r.value("maxNrofS-NSSAI"), Some(8));
    match &r.get_type("UL-DCCH-MessageType").unwrap().type_spec {
        TypeSpec::Choice(c) => match &c.alternatives[0].type_spec {
            TypeSpec::Choice(c1) => {
                assert_eq!(c1.alternatives.len(), 16);
                assert_eq!(c1.find("rrcSetupComplete"), Some((2, false)));
            }
            other => panic!("unexpected {:?}", other),
        },
        other => panic!("unexpected {:?}", other),
    }
}
