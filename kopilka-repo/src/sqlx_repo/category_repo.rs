use crate::category_repo::CategoryRepoError::{CategoryExists, CategoryNotFound};
use crate::category_repo::{Category, CategoryRepo, CategoryRepoError};
use crate::sqlx_repo::SQLxRepo;
use anyhow::Context;
use async_trait::async_trait;
use sqlx::Postgres;
use tracing::instrument;

#[derive(sqlx::FromRow)]
struct CategoryEntry {
    id: i32,
    name: String,
}

impl From<CategoryEntry> for Category {
    fn from(entry: CategoryEntry) -> Self {
        Category {
            id: entry.id,
            name: entry.name,
        }
    }
}

#[async_trait]
impl CategoryRepo for SQLxRepo {
    #[instrument(skip(self))]
    async fn get_categories(&self) -> Result<Vec<Category>, CategoryRepoError> {
        let entries =
            sqlx::query_as::<Postgres, CategoryEntry>("SELECT * FROM categories ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .context("Unable to get categories")?;
        Ok(entries.into_iter().map(Category::from).collect())
    }

    #[instrument(skip(self))]
    async fn get_category(&self, category_id: i32) -> Result<Category, CategoryRepoError> {
        let entry =
            sqlx::query_as::<Postgres, CategoryEntry>("SELECT * FROM categories WHERE id = $1")
                .bind(category_id)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("Unable to get category {}", category_id))?
                .ok_or(CategoryNotFound(category_id))?;
        Ok(entry.into())
    }

    #[instrument(skip(self))]
    async fn create_category(&self, name: &str) -> Result<Category, CategoryRepoError> {
        let entry = sqlx::query_as::<Postgres, CategoryEntry>(
            "INSERT INTO categories(name) VALUES ($1) RETURNING *",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                CategoryExists(name.to_owned())
            }
            _ => CategoryRepoError::Other(
                anyhow::Error::new(e).context("Unable to insert category"),
            ),
        })?;
        Ok(entry.into())
    }
}
