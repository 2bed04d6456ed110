//! Catalog search: filtering, sorting and paging.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use modreg_catalog::{Module, ModuleStatus, ModuleType, ReviewStatus};

use crate::config::SearchConfig;

/// Sort key for search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Most installed first
    #[default]
    Installs,
    /// Highest rated first
    Rating,
    /// Most recently updated first
    Newest,
    /// Alphabetical
    Name,
}

/// Search criteria. Every populated field must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    /// Case-insensitive substring of name or description
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default, rename = "type")]
    pub module_type: Option<ModuleType>,
    #[serde(default)]
    pub author_id: Option<String>,
    /// Modules must carry all of these tags
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub review_status: Option<ReviewStatus>,
    #[serde(default)]
    pub status: Option<ModuleStatus>,
    #[serde(default)]
    pub sort: SortBy,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl SearchFilters {
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, module: &Module) -> bool {
        if let Some(query) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let query = query.to_lowercase();
            if !module.name.to_lowercase().contains(&query)
                && !module.description.to_lowercase().contains(&query)
            {
                return false;
            }
        }
        if self
            .module_type
            .as_ref()
            .is_some_and(|t| *t != module.module_type)
        {
            return false;
        }
        if self
            .author_id
            .as_ref()
            .is_some_and(|a| *a != module.author.id)
        {
            return false;
        }
        if !self.tags.is_subset(&module.metadata.tags) {
            return false;
        }
        if self
            .review_status
            .is_some_and(|s| s != module.review_status)
        {
            return false;
        }
        if self.status.is_some_and(|s| s != module.status) {
            return false;
        }
        true
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub modules: Vec<Module>,
    /// Matches before paging
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

/// Filter, sort and page `modules`.
pub fn search(modules: Vec<Module>, filters: &SearchFilters, config: &SearchConfig) -> SearchPage {
    let mut matched: Vec<Module> = modules.into_iter().filter(|m| filters.matches(m)).collect();
    matched.sort_by(|a, b| compare(a, b, filters.sort));

    let total = matched.len();
    let limit = filters
        .limit
        .unwrap_or(config.default_limit)
        .clamp(1, config.max_limit.max(1));
    let modules = matched
        .into_iter()
        .skip(filters.offset)
        .take(limit)
        .collect();

    SearchPage {
        modules,
        total,
        offset: filters.offset,
        limit,
    }
}

fn compare(a: &Module, b: &Module, sort: SortBy) -> Ordering {
    let primary = match sort {
        SortBy::Installs => b.install_count.cmp(&a.install_count),
        SortBy::Rating => b
            .rating
            .total_cmp(&a.rating)
            .then_with(|| b.rating_count.cmp(&a.rating_count)),
        SortBy::Newest => b.updated_at.cmp(&a.updated_at),
        SortBy::Name => Ordering::Equal,
    };
    // Name then id keep paging stable
    primary
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}
