use bson::Document;
use std::iter::Enumerate;
use std::slice;

use super::options::WriteModel;
use crate::common::Namespace;

/// A client-submitted sequence of writes against one namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub namespace: Namespace,
    /// If true, execution stops at the first failed item.
    pub ordered: bool,
    /// The request's `writeConcern` document, if one was sent.
    pub write_concern: Option<Document>,
    pub items: Vec<WriteModel>,
}

/// A borrowed write item together with its position in the request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchItemRef<'a> {
    pub index: usize,
    pub model: &'a WriteModel,
}

/// Iterates a request's items in index order.
pub struct BatchItems<'a> {
    inner: Enumerate<slice::Iter<'a, WriteModel>>,
}

impl WriteRequest {
    /// Creates an ordered request with no explicit write concern.
    pub fn new(namespace: Namespace, items: Vec<WriteModel>) -> WriteRequest {
        WriteRequest {
            namespace: namespace,
            ordered: true,
            write_concern: None,
            items: items,
        }
    }

    pub fn ordered(mut self, ordered: bool) -> WriteRequest {
        self.ordered = ordered;
        self
    }

    pub fn write_concern(mut self, write_concern: Document) -> WriteRequest {
        self.write_concern = Some(write_concern);
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> BatchItems {
        BatchItems { inner: self.items.iter().enumerate() }
    }

    /// Counts the items of each kind as (inserts, updates, deletes).
    pub fn kind_counts(&self) -> (usize, usize, usize) {
        self.items.iter().fold((0, 0, 0), |(i, u, d), model| match *model {
            WriteModel::Insert { .. } => (i + 1, u, d),
            WriteModel::Update { .. } => (i, u + 1, d),
            WriteModel::Delete { .. } => (i, u, d + 1),
        })
    }
}

impl<'a> Iterator for BatchItems<'a> {
    type Item = BatchItemRef<'a>;

    fn next(&mut self) -> Option<BatchItemRef<'a>> {
        self.inner.next().map(|(index, model)| BatchItemRef {
            index: index,
            model: model,
        })
    }
}
