use tracing::debug;

use crate::models::Document;
use crate::paging::{PageOutcome, PageRequest};
use crate::relation::{self, Relation};
use crate::shape::{self, Shape};
use crate::store::{DocumentStore, Filter, FindQuery, Sort};
use crate::{Collection, StoreError};

/// A read-side query: base match and sort, relations to attach, output shape.
#[derive(Debug, Clone)]
pub struct Pipeline {
    collection: Collection,
    filter: Filter,
    sort: Option<Sort>,
    relations: Vec<Relation>,
    shape: Shape,
}

impl Pipeline {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filter: Filter::all(),
            sort: None,
            relations: Vec::new(),
            shape: Shape::new(),
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn relate(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    /// Every matching row.
    pub fn run(&self, store: &dyn DocumentStore) -> Result<Vec<Document>, StoreError> {
        self.execute(store, self.base_query())
    }

    /// One page of rows, classified as rows / empty / exhausted.
    ///
    /// Without an unwind the window is pushed down to the base query, so only
    /// the page's base rows are joined. With an unwind one base row can become
    /// many output rows, so the window is cut from the expanded output instead.
    pub fn run_page(&self, store: &dyn DocumentStore, page: PageRequest) -> Result<PageOutcome<Document>, StoreError> {
        let rows = if self.shape.unwinds() {
            page.window(self.run(store)?)
        } else {
            let query = self.base_query().skip(page.skip()).limit(page.limit());
            self.execute(store, query)?
        };

        debug!(
            "{} page {} (limit {}): {} rows",
            self.collection,
            page.page(),
            page.limit(),
            rows.len()
        );
        Ok(page.outcome(rows))
    }

    fn base_query(&self) -> FindQuery {
        let query = FindQuery::new(self.filter.clone());
        match &self.sort {
            Some(sort) => query.sort(sort.clone()),
            None => query,
        }
    }

    fn execute(&self, store: &dyn DocumentStore, query: FindQuery) -> Result<Vec<Document>, StoreError> {
        let base = store.find(self.collection, &query)?;
        let joined = relation::resolve(store, base, &self.relations)?;
        Ok(shape::apply(joined, &self.shape))
    }
}
