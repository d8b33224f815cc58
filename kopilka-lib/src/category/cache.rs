use std::sync::Arc;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use kopilka_repo::category_repo::{Category, CategoryRepo, CategoryRepoError};

struct Snapshot {
    categories: Vec<Category>,
    fetched_at: Instant,
}

/// Read-through cache in front of the category repo. Categories change
/// rarely (only through `create_category`), so listings are served from a
/// snapshot that expires after `ttl`.
pub struct CategoryCache {
    repo: Arc<dyn CategoryRepo>,
    ttl: Duration,
    snapshot: RwLock<Option<Snapshot>>,
}

impl CategoryCache {
    pub fn new(repo: Arc<dyn CategoryRepo>, ttl: Duration) -> CategoryCache {
        CategoryCache {
            repo,
            ttl,
            snapshot: RwLock::new(None),
        }
    }

    pub async fn get(&self) -> Result<Vec<Category>, CategoryRepoError> {
        {
            let guard = self.snapshot.read().unwrap();
            if let Some(snapshot) = guard.as_ref() {
                if snapshot.fetched_at.elapsed() < self.ttl {
                    return Ok(snapshot.categories.clone());
                }
            }
        }

        // Lock is not held across the repo call. Concurrent refreshes just
        // overwrite each other with equally fresh data.
        let categories = self.repo.get_categories().await?;
        let mut guard = self.snapshot.write().unwrap();
        *guard = Some(Snapshot {
            categories: categories.clone(),
            fetched_at: Instant::now(),
        });
        Ok(categories)
    }

    pub async fn create_category(&self, name: &str) -> Result<Category, CategoryRepoError> {
        let category = self.repo.create_category(name).await?;
        self.invalidate();
        Ok(category)
    }

    pub fn invalidate(&self) {
        let mut guard = self.snapshot.write().unwrap();
        *guard = None;
    }
}
