use crate::category_repo::CategoryRepoError::{CategoryExists, CategoryNotFound};
use crate::category_repo::{Category, CategoryRepo, CategoryRepoError};
use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

struct State {
    categories: Vec<Category>,
    next_id: i32,
}

pub struct MemCategoryRepo {
    state: RwLock<State>,
}

impl MemCategoryRepo {
    pub fn new() -> MemCategoryRepo {
        let state = State {
            categories: Vec::new(),
            next_id: 1,
        };
        MemCategoryRepo {
            state: RwLock::new(state),
        }
    }

    fn read_lock(&self) -> Result<RwLockReadGuard<State>, anyhow::Error> {
        self.state
            .read()
            .map_err(|_| anyhow!("Unable to acquire lock"))
    }

    fn write_lock(&self) -> Result<RwLockWriteGuard<State>, anyhow::Error> {
        self.state
            .write()
            .map_err(|_| anyhow!("Unable to acquire lock"))
    }
}

#[async_trait]
impl CategoryRepo for MemCategoryRepo {
    async fn get_categories(&self) -> Result<Vec<Category>, CategoryRepoError> {
        let read_guard = self.read_lock()?;
        Ok(read_guard.categories.clone())
    }

    async fn get_category(&self, category_id: i32) -> Result<Category, CategoryRepoError> {
        let read_guard = self.read_lock()?;

        read_guard
            .categories
            .iter()
            .find(|c| c.id == category_id)
            .cloned()
            .ok_or(CategoryNotFound(category_id))
    }

    async fn create_category(&self, name: &str) -> Result<Category, CategoryRepoError> {
        let mut write_guard = self.write_lock()?;

        if write_guard.categories.iter().any(|c| c.name == name) {
            return Err(CategoryExists(name.to_owned()));
        }

        let id = write_guard.next_id;
        write_guard.next_id += 1;

        let category = Category {
            id,
            name: name.to_owned(),
        };
        write_guard.categories.push(category.clone());
        Ok(category)
    }
}
