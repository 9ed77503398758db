//! Filter parsing and document matching.
//!
//! A `Query` is parsed once from a filter document and can then be evaluated against any
//! number of documents. Parsing rejects malformed filters so that handlers can report them
//! as per-item errors before touching storage.
use bson::{Bson, Document};
use std::cmp::Ordering;

use crate::coll::error::ErrorCode;
use crate::{Error, Result};

/// A parsed filter document.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    clauses: Vec<Clause>,
}

#[derive(Debug, Clone, PartialEq)]
enum Clause {
    Field { path: String, predicates: Vec<Predicate> },
    And(Vec<Query>),
    Or(Vec<Query>),
    Nor(Vec<Query>),
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Eq(Bson),
    Ne(Bson),
    Gt(Bson),
    Gte(Bson),
    Lt(Bson),
    Lte(Bson),
    In(Vec<Bson>),
    Nin(Vec<Bson>),
    Exists(bool),
}

impl Query {
    /// Parses a filter document, rejecting unknown operators and malformed operands.
    pub fn parse(filter: &Document) -> Result<Query> {
        let mut clauses = Vec::with_capacity(filter.len());

        for (key, value) in filter.iter() {
            if key.starts_with('$') {
                match key.as_str() {
                    "$and" => clauses.push(Clause::And(Query::parse_list(key, value)?)),
                    "$or" => clauses.push(Clause::Or(Query::parse_list(key, value)?)),
                    "$nor" => clauses.push(Clause::Nor(Query::parse_list(key, value)?)),
                    "$comment" => (),
                    _ => return Err(bad_value(format!("unknown top level operator: {}", key))),
                }
            } else {
                clauses.push(Clause::Field {
                    path: key.to_owned(),
                    predicates: Query::parse_predicates(value)?,
                });
            }
        }

        Ok(Query { clauses: clauses })
    }

    fn parse_list(op: &str, value: &Bson) -> Result<Vec<Query>> {
        let list = match *value {
            Bson::Array(ref list) if !list.is_empty() => list,
            _ => return Err(bad_value(format!("{} must be a nonempty array", op))),
        };

        list.iter()
            .map(|entry| match *entry {
                Bson::Document(ref doc) => Query::parse(doc),
                _ => Err(bad_value(format!("{} entries need to be full objects", op))),
            })
            .collect()
    }

    fn parse_predicates(value: &Bson) -> Result<Vec<Predicate>> {
        let operators = match *value {
            Bson::Document(ref doc) if is_operator_document(doc) => doc,
            ref other => return Ok(vec![Predicate::Eq(other.clone())]),
        };

        let mut predicates = Vec::with_capacity(operators.len());

        for (op, operand) in operators.iter() {
            let predicate = match op.as_str() {
                "$eq" => Predicate::Eq(operand.clone()),
                "$ne" => Predicate::Ne(operand.clone()),
                "$gt" => Predicate::Gt(operand.clone()),
                "$gte" => Predicate::Gte(operand.clone()),
                "$lt" => Predicate::Lt(operand.clone()),
                "$lte" => Predicate::Lte(operand.clone()),
                "$in" => Predicate::In(array_operand(op, operand)?),
                "$nin" => Predicate::Nin(array_operand(op, operand)?),
                "$exists" => Predicate::Exists(truthy(operand)),
                _ => return Err(bad_value(format!("unknown operator: {}", op))),
            };
            predicates.push(predicate);
        }

        Ok(predicates)
    }

    /// Returns true if the filter has no clauses and so matches every document.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.clauses.iter().all(|clause| clause.matches(document))
    }

    /// The `path: value` pairs the filter pins by equality, used to seed upserted documents.
    pub fn equality_fields(&self) -> Vec<(String, Bson)> {
        let mut fields = Vec::new();
        self.collect_equality_fields(&mut fields);
        fields
    }

    fn collect_equality_fields(&self, fields: &mut Vec<(String, Bson)>) {
        for clause in &self.clauses {
            match *clause {
                Clause::Field { ref path, ref predicates } => {
                    for predicate in predicates {
                        if let Predicate::Eq(ref value) = *predicate {
                            if let Bson::RegExp(..) = *value {
                                continue;
                            }
                            fields.push((path.to_owned(), value.clone()));
                        }
                    }
                }
                Clause::And(ref queries) => {
                    for query in queries {
                        query.collect_equality_fields(fields);
                    }
                }
                Clause::Or(ref queries) if queries.len() == 1 => {
                    queries[0].collect_equality_fields(fields);
                }
                _ => (),
            }
        }
    }

    /// The equality value the filter requires for `_id`, if any.
    pub fn id_equality(&self) -> Option<Bson> {
        self.equality_fields()
            .into_iter()
            .find(|&(ref path, _)| path == "_id")
            .map(|(_, value)| value)
    }
}

impl Clause {
    fn matches(&self, document: &Document) -> bool {
        match *self {
            Clause::Field { ref path, ref predicates } => {
                let value = lookup(document, path);
                predicates.iter().all(|predicate| predicate.matches(value))
            }
            Clause::And(ref queries) => queries.iter().all(|q| q.matches(document)),
            Clause::Or(ref queries) => queries.iter().any(|q| q.matches(document)),
            Clause::Nor(ref queries) => !queries.iter().any(|q| q.matches(document)),
        }
    }
}

impl Predicate {
    fn matches(&self, value: Option<&Bson>) -> bool {
        match *self {
            Predicate::Eq(ref expected) => equals_or_contains(value, expected),
            Predicate::Ne(ref expected) => !equals_or_contains(value, expected),
            Predicate::Gt(ref bound) => compares(value, bound, |o| o == Ordering::Greater),
            Predicate::Gte(ref bound) => compares(value, bound, |o| o != Ordering::Less),
            Predicate::Lt(ref bound) => compares(value, bound, |o| o == Ordering::Less),
            Predicate::Lte(ref bound) => compares(value, bound, |o| o != Ordering::Greater),
            Predicate::In(ref list) => list.iter().any(|e| equals_or_contains(value, e)),
            Predicate::Nin(ref list) => !list.iter().any(|e| equals_or_contains(value, e)),
            Predicate::Exists(expected) => value.is_some() == expected,
        }
    }
}

fn bad_value(message: String) -> Error {
    Error::write(ErrorCode::BadValue, message)
}

fn is_operator_document(doc: &Document) -> bool {
    doc.keys().next().map_or(false, |key| key.starts_with('$'))
}

fn array_operand(op: &str, operand: &Bson) -> Result<Vec<Bson>> {
    match *operand {
        Bson::Array(ref list) => Ok(list.clone()),
        _ => Err(bad_value(format!("{} needs an array", op))),
    }
}

fn truthy(value: &Bson) -> bool {
    match *value {
        Bson::Boolean(b) => b,
        Bson::I32(n) => n != 0,
        Bson::I64(n) => n != 0,
        Bson::FloatingPoint(f) => f != 0.0,
        Bson::Null => false,
        _ => true,
    }
}

fn equals_or_contains(value: Option<&Bson>, expected: &Bson) -> bool {
    match value {
        None => *expected == Bson::Null,
        Some(&Bson::Array(ref elements)) => {
            values_equal(&Bson::Array(elements.clone()), expected) ||
            elements.iter().any(|e| values_equal(e, expected))
        }
        Some(actual) => values_equal(actual, expected),
    }
}

fn compares<F: Fn(Ordering) -> bool>(value: Option<&Bson>, bound: &Bson, accept: F) -> bool {
    match value {
        None => false,
        Some(&Bson::Array(ref elements)) => {
            elements.iter().any(|e| compare(e, bound).map_or(false, &accept))
        }
        Some(actual) => compare(actual, bound).map_or(false, &accept),
    }
}

/// Resolves a dotted path such as `a.b.0.c` inside a document.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match *current {
            Bson::Document(ref doc) => doc.get(segment)?,
            Bson::Array(ref elements) => elements.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

fn as_i64(value: &Bson) -> Option<i64> {
    match *value {
        Bson::I32(n) => Some(i64::from(n)),
        Bson::I64(n) => Some(n),
        _ => None,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match *value {
        Bson::I32(n) => Some(f64::from(n)),
        Bson::I64(n) => Some(n as f64),
        Bson::FloatingPoint(f) => Some(f),
        _ => None,
    }
}

// Integers compare exactly; a double on either side compares as f64.
fn compare_numbers(a: &Bson, b: &Bson) -> Option<Option<Ordering>> {
    if let (Some(x), Some(y)) = (as_i64(a), as_i64(b)) {
        return Some(Some(x.cmp(&y)));
    }

    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => Some(x.partial_cmp(&y)),
        _ => None,
    }
}

/// Equality with numeric values compared across their concrete types.
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    match compare_numbers(a, b) {
        Some(ordering) => ordering == Some(Ordering::Equal),
        None => a == b,
    }
}

/// Orders two values of the same kind. Values of different kinds do not compare.
pub fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let Some(ordering) = compare_numbers(a, b) {
        return ordering;
    }

    match (a, b) {
        (&Bson::String(ref x), &Bson::String(ref y)) => Some(x.cmp(y)),
        (&Bson::Boolean(x), &Bson::Boolean(y)) => Some(x.cmp(&y)),
        (&Bson::UtcDatetime(ref x), &Bson::UtcDatetime(ref y)) => Some(x.cmp(y)),
        (&Bson::ObjectId(ref x), &Bson::ObjectId(ref y)) => Some(x.bytes().cmp(&y.bytes())),
        (&Bson::Null, &Bson::Null) => Some(Ordering::Equal),
        _ => None,
    }
}
