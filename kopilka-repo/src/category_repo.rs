use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[async_trait]
pub trait CategoryRepo: Sync + Send {
    async fn get_categories(&self) -> Result<Vec<Category>, CategoryRepoError>;
    async fn get_category(&self, category_id: i32) -> Result<Category, CategoryRepoError>;
    async fn create_category(&self, name: &str) -> Result<Category, CategoryRepoError>;
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct Category {
    pub id: i32,
    pub name: String,
}

#[derive(Error, Debug)]
pub enum CategoryRepoError {
    #[error("Category with id {0} not found")]
    CategoryNotFound(i32),
    #[error("Category {0} already exists")]
    CategoryExists(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
