//! Profile search

use std::sync::Arc;

use crate::db::repositories::ProfileRepository;
use crate::models::Profile;
use crate::services::ServiceError;

pub const DEFAULT_SEARCH_LIMIT: i64 = 20;

pub struct SearchService {
    profiles: Arc<dyn ProfileRepository>,
    limit: i64,
}

impl SearchService {
    pub fn new(profiles: Arc<dyn ProfileRepository>) -> Self {
        Self {
            profiles,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Case-insensitive substring match on username or full name. A blank
    /// query matches nothing and does not touch the store.
    pub async fn search(&self, query: &str) -> Result<Vec<Profile>, ServiceError> {
        let term = query.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }
        let results = self.profiles.search(term, self.limit).await?;
        tracing::debug!(term, hits = results.len(), "profile search");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_profile, insert_user, setup_pool};
    use crate::db::repositories::SqlxProfileRepository;

    #[tokio::test]
    async fn test_search_matches_and_misses() {
        let pool = setup_pool().await;
        let a = insert_user(&pool, "a@example.com").await;
        insert_profile(&pool, a, "Traveller").await;
        let service = SearchService::new(SqlxProfileRepository::boxed(pool));

        let hits = service.search("  travel ").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(service.search("nobody-here").await.unwrap().is_empty());
        assert!(service.search("   ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_respects_limit() {
        let pool = setup_pool().await;
        for i in 0..5 {
            let id = insert_user(&pool, &format!("u{}@example.com", i)).await;
            insert_profile(&pool, id, &format!("user{}", i)).await;
        }
        let service = SearchService::new(SqlxProfileRepository::boxed(pool)).with_limit(3);
        assert_eq!(service.search("user").await.unwrap().len(), 3);
    }
}
