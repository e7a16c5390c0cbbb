use std::fmt;

use chrono::{DateTime, Utc};

use chronicle_core::MessageKind;

use crate::error::StoreError;
use crate::record::format_timestamp;

/// Record fields a criteria constraint may target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CriteriaField {
    Id,
    SourceId,
    SourceType,
    TypeName,
    FullName,
    Namespace,
    AssemblyName,
    Kind,
    CreationDate,
    Payload,
}

impl fmt::Display for CriteriaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CriteriaField::Id => "id",
            CriteriaField::SourceId => "source_id",
            CriteriaField::SourceType => "source_type",
            CriteriaField::TypeName => "type_name",
            CriteriaField::FullName => "full_name",
            CriteriaField::Namespace => "namespace",
            CriteriaField::AssemblyName => "assembly_name",
            CriteriaField::Kind => "kind",
            CriteriaField::CreationDate => "creation_date",
            CriteriaField::Payload => "payload",
        };
        f.write_str(name)
    }
}

/// One named constraint. Constraints on a criteria combine with AND.
#[derive(Clone, Debug)]
pub enum Constraint {
    /// Field value must be one of `values`.
    InSet {
        field: CriteriaField,
        values: Vec<String>,
    },
    /// Field value must fall inside the (inclusive) range.
    DateRange {
        field: CriteriaField,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
}

/// Structured filter for selecting event records.
///
/// An empty criteria matches every event in the log. Commands are never
/// matched regardless of criteria.
#[derive(Clone, Debug, Default)]
pub struct Criteria {
    constraints: Vec<Constraint>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source_id_in<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.in_set(CriteriaField::SourceId, ids)
    }

    pub fn source_type_in<I, S>(self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.in_set(CriteriaField::SourceType, types)
    }

    pub fn type_name_in<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.in_set(CriteriaField::TypeName, names)
    }

    pub fn created_between(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.constraints.push(Constraint::DateRange {
            field: CriteriaField::CreationDate,
            from,
            to,
        });
        self
    }

    /// Attach an arbitrary constraint. Translation decides whether the
    /// field/operator combination is supported.
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    fn in_set<I, S>(mut self, field: CriteriaField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints.push(Constraint::InSet {
            field,
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }
}

/// Store-level columns a translated clause may reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    Kind,
    SourceId,
    SourceType,
    TypeName,
    FullName,
    Namespace,
    AssemblyName,
    CreationDate,
}

impl Column {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Column::Kind => "kind",
            Column::SourceId => "source_id",
            Column::SourceType => "source_type",
            Column::TypeName => "type_name",
            Column::FullName => "full_name",
            Column::Namespace => "namespace",
            Column::AssemblyName => "assembly_name",
            Column::CreationDate => "creation_date",
        }
    }
}

/// One conjunct of a translated filter.
#[derive(Clone, Debug, PartialEq)]
pub enum Clause {
    Eq { column: Column, value: String },
    InSet { column: Column, values: Vec<String> },
    Range {
        column: Column,
        from: Option<String>,
        to: Option<String>,
    },
}

/// A criteria translated into store terms: a conjunction of column clauses.
/// Carries no SQL; the session layer renders it for its backend.
#[derive(Clone, Debug)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }
}

/// Translate a criteria into a store filter.
///
/// The `kind == "Event"` conjunct is always present, so commands sharing the
/// table are never matched. Unsupported field/operator combinations are an
/// error, never silently dropped. Pure; performs no I/O.
pub fn translate(criteria: &Criteria) -> Result<Filter, StoreError> {
    let mut clauses = vec![Clause::Eq {
        column: Column::Kind,
        value: MessageKind::Event.to_string(),
    }];

    for constraint in criteria.constraints() {
        match constraint {
            Constraint::InSet { field, values } => {
                // An empty membership set means the constraint was never
                // really given; skipping it matches the original behavior
                // callers expect from optional id lists.
                if values.is_empty() {
                    continue;
                }
                let column = match field {
                    CriteriaField::SourceId => Column::SourceId,
                    CriteriaField::SourceType => Column::SourceType,
                    CriteriaField::TypeName => Column::TypeName,
                    CriteriaField::FullName => Column::FullName,
                    CriteriaField::Namespace => Column::Namespace,
                    CriteriaField::AssemblyName => Column::AssemblyName,
                    CriteriaField::Kind => {
                        return Err(StoreError::Translation(
                            "kind is filtered implicitly and cannot be constrained".into(),
                        ))
                    }
                    CriteriaField::CreationDate => {
                        return Err(StoreError::Translation(
                            "creation_date supports range constraints only".into(),
                        ))
                    }
                    CriteriaField::Id | CriteriaField::Payload => {
                        return Err(StoreError::Translation(format!(
                            "membership constraint not supported on {field}"
                        )))
                    }
                };
                clauses.push(Clause::InSet {
                    column,
                    values: values.clone(),
                });
            }
            Constraint::DateRange { field, from, to } => {
                if *field != CriteriaField::CreationDate {
                    return Err(StoreError::Translation(format!(
                        "range constraint not supported on {field}"
                    )));
                }
                if from.is_none() && to.is_none() {
                    continue;
                }
                clauses.push(Clause::Range {
                    column: Column::CreationDate,
                    from: (*from).map(format_timestamp),
                    to: (*to).map(format_timestamp),
                });
            }
        }
    }

    Ok(Filter { clauses })
}
