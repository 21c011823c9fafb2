//! Example fixture data
//!
//! The catalog is the immutable table the movie producers read from. It is
//! injected through [`RuntimeConfig`](crate::RuntimeConfig) rather than held in
//! global state, so tests and config files can swap it out.

use serde::{Deserialize, Serialize};

use crate::errors::{RuntimeError, RuntimeResult};

/// A named category and the items listed under it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub items: Vec<String>,
}

impl Category {
    pub fn new<S: Into<String>>(name: S, items: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            items: items.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ordered category table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub categories: Vec<Category>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::movies()
    }
}

impl Catalog {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// The movie table used by every tutorial example
    pub fn movies() -> Self {
        Self::new(vec![
            Category::new("Action", ["300", "Sin City"]),
            Category::new("Drama", ["Eyes Wide Shut", "Saving Private Ryan"]),
            Category::new("Horror", ["The Ring", "The Conjuring"]),
        ])
    }

    /// Category names in table order
    pub fn category_names(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.name.clone()).collect()
    }

    /// Items of `category`; an unknown category has none
    pub fn items_in(&self, category: &str) -> &[String] {
        self.categories
            .iter()
            .find(|c| c.name == category)
            .map(|c| c.items.as_slice())
            .unwrap_or_default()
    }

    pub fn validate(&self) -> RuntimeResult<()> {
        for (i, category) in self.categories.iter().enumerate() {
            if category.name.trim().is_empty() {
                return Err(RuntimeError::Config(format!(
                    "catalog category #{} has an empty name",
                    i
                )));
            }
            if self.categories[..i].iter().any(|c| c.name == category.name) {
                return Err(RuntimeError::Config(format!(
                    "catalog category '{}' is listed twice",
                    category.name
                )));
            }
        }
        Ok(())
    }
}
