use crate::{
    error::{ApiError, Result},
    models::{
        RecommendationQuery, RecommendationsResponse, TargetKey, DEFAULT_LIMIT, MAX_LIMIT,
    },
    services::{catalog::EntityCatalog, store::RecommendationStore},
};
use std::sync::Arc;
use tracing::debug;

/// Serves stored recommendation lists to API clients. Never writes.
#[derive(Clone)]
pub struct RecommendationService {
    store: RecommendationStore,
    catalog: Arc<dyn EntityCatalog>,
}

impl RecommendationService {
    pub fn new(store: RecommendationStore, catalog: Arc<dyn EntityCatalog>) -> Self {
        Self { store, catalog }
    }

    /// Looks up every stored list for the requested target, truncated to `limit`.
    pub async fn fetch(&self, query: &RecommendationQuery) -> Result<RecommendationsResponse> {
        let target = resolve_target(query)?;
        let limit = resolve_limit(query.limit)?;

        if !self.catalog.exists(target.target_type, target.id).await? {
            return Err(ApiError::NotFound(format!(
                "{} not found",
                target.target_type.label()
            )));
        }

        let target_key = target.to_string();
        let mut recommendations = self
            .store
            .find(&target_key, query.model.as_deref())
            .await?;

        if recommendations.is_empty() {
            return Err(ApiError::NoRecommendations);
        }

        for record in &mut recommendations {
            record.items.truncate(limit);
        }

        debug!(
            "Serving {} model(s) for {} with limit {}",
            recommendations.len(),
            target_key,
            limit
        );

        Ok(RecommendationsResponse {
            target_type: target.target_type,
            target_id: target.id,
            target_key,
            model: query.model.clone(),
            limit,
            recommendations,
        })
    }
}

/// Exactly one of `user_id` / `item_id` must be present.
fn resolve_target(query: &RecommendationQuery) -> Result<TargetKey> {
    match (query.user_id, query.item_id) {
        (Some(user_id), None) => Ok(TargetKey::user(user_id)),
        (None, Some(item_id)) => Ok(TargetKey::item(item_id)),
        (None, None) => Err(ApiError::InvalidRequest(
            "Provide either user_id or item_id".to_string(),
        )),
        (Some(_), Some(_)) => Err(ApiError::InvalidRequest(
            "Provide only one of user_id or item_id".to_string(),
        )),
    }
}

fn resolve_limit(limit: Option<i64>) -> Result<usize> {
    match limit {
        None => Ok(DEFAULT_LIMIT),
        Some(limit) if (1..=MAX_LIMIT as i64).contains(&limit) => Ok(limit as usize),
        Some(limit) => Err(ApiError::InvalidRequest(format!(
            "limit must be between 1 and {}, got {}",
            MAX_LIMIT, limit
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(user_id: Option<i64>, item_id: Option<i64>) -> RecommendationQuery {
        RecommendationQuery {
            user_id,
            item_id,
            ..Default::default()
        }
    }

    #[test]
    fn target_requires_exactly_one_id() {
        assert_eq!(
            resolve_target(&query(Some(3), None)).unwrap(),
            TargetKey::user(3)
        );
        assert_eq!(
            resolve_target(&query(None, Some(4))).unwrap(),
            TargetKey::item(4)
        );
        assert!(matches!(
            resolve_target(&query(None, None)),
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(matches!(
            resolve_target(&query(Some(1), Some(2))),
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[test]
    fn limit_defaults_and_bounds() {
        assert_eq!(resolve_limit(None).unwrap(), DEFAULT_LIMIT);
        assert_eq!(resolve_limit(Some(1)).unwrap(), 1);
        assert_eq!(resolve_limit(Some(100)).unwrap(), 100);
        assert!(resolve_limit(Some(0)).is_err());
        assert!(resolve_limit(Some(-3)).is_err());
        assert!(resolve_limit(Some(101)).is_err());
    }
}
