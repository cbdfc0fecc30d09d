//! Abstract syntax tree for the ASN.1 schema subset.

use std::collections::{HashMap, HashSet};

/// Parsed schema module: value constants plus type assignments, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: Option<String>,
    pub values: Vec<ValueAssignment>,
    pub types: Vec<TypeAssignment>,
}

/// `maxFoo INTEGER ::= 16`
#[derive(Debug, Clone, PartialEq)]
pub struct ValueAssignment {
    pub name: String,
    pub value: i64,
    pub line: usize,
}

/// `Name ::= Type`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAssignment {
    pub name: String,
    pub type_spec: TypeSpec,
    /// 1-based source line of the assignment (for lint and error messages).
    pub line: usize,
}

/// Bound of a range: literal or reference to a value assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    Value(i64),
    Ref(String),
}

impl Bound {
    pub fn value(&self) -> Option<i64> {
        match self {
            Bound::Value(v) => Some(*v),
            Bound::Ref(_) => None,
        }
    }
}

/// Value or size range. `hi == None` means `MAX` (no upper bound).
/// A single value `(n)` has `hi == Some(lo)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub lo: Bound,
    pub hi: Option<Bound>,
    pub extensible: bool,
}

impl Range {
    /// Concrete bounds, once references are resolved.
    pub fn bounds(&self) -> Option<(i64, Option<i64>)> {
        let lo = self.lo.value()?;
        let hi = match &self.hi {
            Some(b) => Some(b.value()?),
            None => None,
        };
        Some((lo, hi))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    Null,
    Boolean,
    /// `INTEGER`, `INTEGER (lo..hi)`, `INTEGER (lo..MAX)`, optionally extensible.
    Integer(Option<Range>),
    Enumerated(Enumerated),
    BitString(Option<Range>),
    OctetString {
        size: Option<Range>,
        /// `(CONTAINING T)`: carried as plain octets, the inner type is informational.
        containing: Option<String>,
    },
    Sequence(Sequence),
    SequenceOf {
        size: Option<Range>,
        element: Box<TypeSpec>,
    },
    Choice(Choice),
    /// Reference to another type assignment.
    Ref(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enumerated {
    pub items: Vec<String>,
    pub extensible: bool,
    pub additions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    /// Root components in declaration order.
    pub fields: Vec<Field>,
    pub extensible: bool,
    /// Extension additions in declaration order; one presence bit each in the extension bitmap.
    pub additions: Vec<Addition>,
}

/// Extension addition of a SEQUENCE.
#[derive(Debug, Clone, PartialEq)]
pub enum Addition {
    /// `[[ a A OPTIONAL, b B ]]`: members share one open type, led by their own presence bits.
    Group(Vec<Field>),
    /// A bare component after `...`: the open type holds the component encoding directly.
    Single(Field),
}

impl Addition {
    pub fn fields(&self) -> &[Field] {
        match self {
            Addition::Group(fields) => fields,
            Addition::Single(f) => std::slice::from_ref(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub type_spec: TypeSpec,
    pub presence: Presence,
}

impl Field {
    /// OPTIONAL and DEFAULT components both own a presence bit.
    pub fn has_presence_bit(&self) -> bool {
        !matches!(self.presence, Presence::Mandatory)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Presence {
    Mandatory,
    Optional,
    Default(Literal),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Bool(bool),
    Ident(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub alternatives: Vec<Alternative>,
    pub extensible: bool,
    pub additions: Vec<Alternative>,
}

impl Choice {
    /// Position and extension flag of an arm by name.
    pub fn find(&self, name: &str) -> Option<(usize, bool)> {
        if let Some(i) = self.alternatives.iter().position(|a| a.name == name) {
            return Some((i, false));
        }
        self.additions
            .iter()
            .position(|a| a.name == name)
            .map(|i| (i, true))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub name: String,
    pub type_spec: TypeSpec,
}

impl TypeSpec {
    /// Visit this type and every type nested in it (not following references).
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a TypeSpec)) {
        f(self);
        match self {
            TypeSpec::Sequence(s) => {
                for field in &s.fields {
                    field.type_spec.walk(f);
                }
                for add in &s.additions {
                    for field in add.fields() {
                        field.type_spec.walk(f);
                    }
                }
            }
            TypeSpec::Choice(c) => {
                for alt in c.alternatives.iter().chain(c.additions.iter()) {
                    alt.type_spec.walk(f);
                }
            }
            TypeSpec::SequenceOf { element, .. } => element.walk(f),
            _ => {}
        }
    }

    fn walk_mut(&mut self, f: &mut dyn FnMut(&mut TypeSpec) -> Result<(), String>) -> Result<(), String> {
        f(self)?;
        match self {
            TypeSpec::Sequence(s) => {
                for field in &mut s.fields {
                    field.type_spec.walk_mut(f)?;
                }
                for add in &mut s.additions {
                    match add {
                        Addition::Group(fields) => {
                            for field in fields {
                                field.type_spec.walk_mut(f)?;
                            }
                        }
                        Addition::Single(field) => field.type_spec.walk_mut(f)?,
                    }
                }
            }
            TypeSpec::Choice(c) => {
                for alt in c.alternatives.iter_mut().chain(c.additions.iter_mut()) {
                    alt.type_spec.walk_mut(f)?;
                }
            }
            TypeSpec::SequenceOf { element, .. } => element.walk_mut(f)?,
            _ => {}
        }
        Ok(())
    }

    /// Ranges attached to this node (value range or size range).
    pub fn ranges(&self) -> Option<&Range> {
        match self {
            TypeSpec::Integer(r) | TypeSpec::BitString(r) => r.as_ref(),
            TypeSpec::OctetString { size, .. } | TypeSpec::SequenceOf { size, .. } => size.as_ref(),
            _ => None,
        }
    }

    fn ranges_mut(&mut self) -> Option<&mut Range> {
        match self {
            TypeSpec::Integer(r) | TypeSpec::BitString(r) => r.as_mut(),
            TypeSpec::OctetString { size, .. } | TypeSpec::SequenceOf { size, .. } => size.as_mut(),
            _ => None,
        }
    }

    /// Short ASN.1 keyword for messages.
    pub fn kind(&self) -> &'static str {
        match self {
            TypeSpec::Null => "NULL",
            TypeSpec::Boolean => "BOOLEAN",
            TypeSpec::Integer(_) => "INTEGER",
            TypeSpec::Enumerated(_) => "ENUMERATED",
            TypeSpec::BitString(_) => "BIT STRING",
            TypeSpec::OctetString { .. } => "OCTET STRING",
            TypeSpec::Sequence(_) => "SEQUENCE",
            TypeSpec::SequenceOf { .. } => "SEQUENCE OF",
            TypeSpec::Choice(_) => "CHOICE",
            TypeSpec::Ref(_) => "reference",
        }
    }
}

/// Module with name lookup tables; every bound is concrete and every reference exists.
#[derive(Debug, Clone)]
pub struct ResolvedModule {
    pub module: Module,
    types_by_name: HashMap<String, usize>,
    values_by_name: HashMap<String, i64>,
}

impl ResolvedModule {
    pub fn resolve(mut module: Module) -> Result<Self, String> {
        let mut values_by_name = HashMap::new();
        for v in &module.values {
            if values_by_name.insert(v.name.clone(), v.value).is_some() {
                return Err(format!("Duplicate value name: {}", v.name));
            }
        }
        let mut types_by_name = HashMap::new();
        for (i, t) in module.types.iter().enumerate() {
            if types_by_name.insert(t.name.clone(), i).is_some() {
                return Err(format!("Duplicate type name: {}", t.name));
            }
        }

        for t in &mut module.types {
            let owner = t.name.clone();
            t.type_spec.walk_mut(&mut |spec| {
                match spec {
                    TypeSpec::Ref(name) if !types_by_name.contains_key(name.as_str()) => {
                        return Err(format!("{}: unknown type {}", owner, name));
                    }
                    TypeSpec::OctetString { containing: Some(name), .. }
                        if !types_by_name.contains_key(name.as_str()) =>
                    {
                        return Err(format!("{}: unknown contained type {}", owner, name));
                    }
                    _ => {}
                }
                if let Some(range) = spec.ranges_mut() {
                    substitute(&mut range.lo, &values_by_name, &owner)?;
                    if let Some(hi) = range.hi.as_mut() {
                        substitute(hi, &values_by_name, &owner)?;
                    }
                    if let Some((lo, Some(hi))) = range.bounds() {
                        if lo > hi {
                            return Err(format!("{}: empty range {}..{}", owner, lo, hi));
                        }
                    }
                }
                Ok(())
            })?;
        }

        let resolved = ResolvedModule {
            module,
            types_by_name,
            values_by_name,
        };
        for t in &resolved.module.types {
            resolved.check_alias_cycle(&t.name)?;
        }
        resolved.check_finite()?;
        Ok(resolved)
    }

    pub fn get_type(&self, name: &str) -> Option<&TypeAssignment> {
        self.types_by_name
            .get(name)
            .map(|&i| &self.module.types[i])
    }

    pub fn value(&self, name: &str) -> Option<i64> {
        self.values_by_name.get(name).copied()
    }

    /// Follow `A ::= B` aliases to the first structural type.
    pub fn deref<'a>(&'a self, spec: &'a TypeSpec) -> Option<&'a TypeSpec> {
        let mut cur = spec;
        let mut hops = 0;
        while let TypeSpec::Ref(name) = cur {
            cur = &self.get_type(name)?.type_spec;
            hops += 1;
            if hops > self.module.types.len() {
                return None;
            }
        }
        Some(cur)
    }

    fn check_alias_cycle(&self, start: &str) -> Result<(), String> {
        let mut seen = HashSet::new();
        let mut name = start;
        while let Some(t) = self.get_type(name) {
            if !seen.insert(name) {
                return Err(format!("Type {} is an alias cycle", start));
            }
            match &t.type_spec {
                TypeSpec::Ref(next) => name = next.as_str(),
                _ => return Ok(()),
            }
        }
        Ok(())
    }

    /// Reject types with no finite value: each of their values would contain another one
    /// through a mandatory component, a SEQUENCE OF that cannot be empty, or every CHOICE arm.
    fn check_finite(&self) -> Result<(), String> {
        let mut finite = vec![false; self.module.types.len()];
        loop {
            let mut changed = false;
            for (i, t) in self.module.types.iter().enumerate() {
                if !finite[i] && self.has_finite_value(&t.type_spec, &finite) {
                    finite[i] = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        match finite.iter().position(|&ok| !ok) {
            Some(i) => Err(format!(
                "{}: no finite value, recursive through mandatory components",
                self.module.types[i].name
            )),
            None => Ok(()),
        }
    }

    fn has_finite_value(&self, spec: &TypeSpec, finite: &[bool]) -> bool {
        match spec {
            TypeSpec::Ref(name) => self.types_by_name.get(name.as_str()).map_or(false, |&i| finite[i]),
            TypeSpec::Sequence(s) => s
                .fields
                .iter()
                .filter(|f| !f.has_presence_bit())
                .all(|f| self.has_finite_value(&f.type_spec, finite)),
            TypeSpec::SequenceOf { size, element } => {
                let may_be_empty = match size {
                    None => true,
                    Some(r) => r.extensible || r.bounds().map_or(true, |(lo, _)| lo <= 0),
                };
                may_be_empty || self.has_finite_value(element, finite)
            }
            TypeSpec::Choice(c) => c
                .alternatives
                .iter()
                .chain(c.additions.iter())
                .any(|a| self.has_finite_value(&a.type_spec, finite)),
            _ => true,
        }
    }
}

fn substitute(b: &mut Bound, values: &HashMap<String, i64>, owner: &str) -> Result<(), String> {
    if let Bound::Ref(name) = b {
        let v = values
            .get(name.as_str())
            .ok_or_else(|| format!("{}: unknown value {}", owner, name))?;
        *b = Bound::Value(*v);
    }
    Ok(())
}
