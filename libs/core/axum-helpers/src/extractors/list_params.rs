use database::repository::{Filters, ListQuery, OrderBy, RepositoryError};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::errors::AppError;

/// Listing query string: `?filter={"status":"ready"}&order_by=-created_at&limit=20&cursor=...`
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// JSON filter document, e.g. `{"tags":["work"],"created_at":{"gte":"2024-01-01T00:00:00Z"}}`
    pub filter: Option<String>,
    /// Comma-separated fields, `-` prefix for descending
    pub order_by: Option<String>,
    /// Page size, clamped to 1..=200 (default 50)
    pub limit: Option<u64>,
    /// `next_cursor` of the previous page
    pub cursor: Option<String>,
}

impl ListParams {
    pub fn into_list_query(self) -> Result<ListQuery, AppError> {
        let filters = match self.filter.as_deref().map(str::trim) {
            None | Some("") => Filters::new(),
            Some(raw) => {
                let doc: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
                    RepositoryError::InvalidFilter(format!("filter is not JSON: {}", e))
                })?;
                Filters::from_json(&doc)?
            }
        };

        let order_by = self
            .order_by
            .as_deref()
            .map(OrderBy::parse_list)
            .unwrap_or_default();

        let mut query = ListQuery::new()
            .with_filters(filters)
            .with_order(order_by)
            .with_cursor(self.cursor.filter(|c| !c.is_empty()));
        if let Some(limit) = self.limit {
            query = query.with_limit(limit);
        }
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_params_use_defaults() {
        let query = ListParams::default().into_list_query().unwrap();
        assert!(query.filters.is_empty());
        assert!(query.uses_default_order());
        assert!(query.cursor.is_none());
    }

    #[test]
    fn test_filter_and_order_are_parsed() {
        let params = ListParams {
            filter: Some(r#"{"status":"ready","tags":["work"]}"#.to_string()),
            order_by: Some("-updated_at,title".to_string()),
            limit: Some(10),
            cursor: Some(String::new()),
        };
        let query = params.into_list_query().unwrap();
        assert!(!query.filters.is_empty());
        assert_eq!(query.order_by.len(), 2);
        assert_eq!(query.effective_limit(), 10);
        assert!(query.cursor.is_none());
    }

    #[test]
    fn test_non_json_filter_is_invalid_filter() {
        let params = ListParams {
            filter: Some("status=ready".to_string()),
            ..Default::default()
        };
        let err = params.into_list_query().unwrap_err();
        assert!(matches!(
            err,
            AppError::Repository(RepositoryError::InvalidFilter(_))
        ));
    }
}
