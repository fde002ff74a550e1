use mongodb::bson::{doc, to_document, Document};
use serde::Serialize;

/// Accumulated state of a chained query. Filters AND together; `all`
/// switches updates and deletes to their multi-document forms.
#[derive(Debug, Default, Clone)]
pub(crate) struct QueryBuilder {
    pub filters: Vec<Document>,
    pub all: bool,
    pub upsert: bool,
    pub select: Option<Document>,
    pub sort: Document,
    pub skip: u32,
    pub limit: u32,
    pub visible_fields: Vec<String>,
}

impl QueryBuilder {
    /// The combined filter document; an empty chain matches everything.
    pub fn filter_doc(&self) -> Document {
        if self.filters.is_empty() {
            doc! {}
        } else {
            doc! {"$and": &self.filters}
        }
    }
}

/// Materialized query results with a few conveniences on top of `Vec`.
#[derive(Debug)]
pub struct QuerySet<M> {
    items: Vec<M>,
}

impl<M> QuerySet<M> {
    pub(crate) fn new(items: Vec<M>) -> QuerySet<M> {
        QuerySet { items }
    }

    /// The first result, if any.
    pub fn first(mut self) -> Option<M> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.remove(0))
        }
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<M> {
        self.items
    }
}

impl<M: Serialize> QuerySet<M> {
    /// Drops results whose fields all match `criteria`. This runs on the
    /// already-fetched set; use [`Model::exclude`] to filter server-side.
    ///
    /// [`Model::exclude`]: crate::Model::exclude
    pub fn exclude(self, criteria: Document) -> QuerySet<M> {
        let items = self
            .items
            .into_iter()
            .filter(|item| match to_document(item) {
                Ok(doc) => !criteria
                    .iter()
                    .all(|(key, value)| doc.get(key) == Some(value)),
                Err(_) => true,
            })
            .collect();
        QuerySet { items }
    }
}

impl<M> IntoIterator for QuerySet<M> {
    type Item = M;
    type IntoIter = std::vec::IntoIter<M>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, Serialize, PartialEq)]
    struct Row {
        name: String,
        age: i32,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                name: "a".to_string(),
                age: 1,
            },
            Row {
                name: "b".to_string(),
                age: 2,
            },
            Row {
                name: "c".to_string(),
                age: 2,
            },
        ]
    }

    #[test]
    fn exclude_drops_full_matches() {
        let qs = QuerySet::new(rows()).exclude(doc! {"age": 2});
        let names: Vec<String> = qs.into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn exclude_requires_all_criteria() {
        let qs = QuerySet::new(rows()).exclude(doc! {"age": 2, "name": "b"});
        assert_eq!(qs.count(), 2);
    }

    #[test]
    fn first_and_empty() {
        assert_eq!(QuerySet::new(rows()).first().map(|r| r.name), Some("a".to_string()));
        assert!(QuerySet::<Row>::new(vec![]).first().is_none());
        assert!(QuerySet::<Row>::new(vec![]).is_empty());
    }

    #[test]
    fn builder_filter_doc() {
        let mut qb = QueryBuilder::default();
        assert_eq!(qb.filter_doc(), doc! {});
        qb.filters.push(doc! {"a": 1});
        qb.filters.push(doc! {"b": 2});
        assert_eq!(qb.filter_doc(), doc! {"$and": [{"a": 1}, {"b": 2}]});
    }
}
