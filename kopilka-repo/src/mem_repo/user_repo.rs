use crate::user_repo::UserRepoError::{EmailTaken, UserNotFound, UsernameTaken};
use crate::user_repo::{NewUser, User, UserId, UserRepo, UserRepoError};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

struct State {
    users: HashMap<UserId, User>,
    next_id: UserId,
}

pub struct MemUserRepo {
    state: RwLock<State>,
}

impl MemUserRepo {
    pub fn new() -> MemUserRepo {
        let state = State {
            users: HashMap::new(),
            next_id: 1,
        };
        MemUserRepo {
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
impl UserRepo for MemUserRepo {
    async fn get_user(&self, user_id: UserId) -> Result<User, UserRepoError> {
        let read_guard = self.read_lock()?;

        read_guard
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| UserNotFound(user_id.to_string()))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, UserRepoError> {
        let read_guard = self.read_lock()?;

        read_guard
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| UserNotFound(username.to_owned()))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, UserRepoError> {
        let read_guard = self.read_lock()?;

        read_guard
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| UserNotFound(email.to_owned()))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, UserRepoError> {
        let mut write_guard = self.write_lock()?;

        if write_guard
            .users
            .values()
            .any(|u| u.username == new_user.username)
        {
            return Err(UsernameTaken(new_user.username));
        }
        if write_guard.users.values().any(|u| u.email == new_user.email) {
            return Err(EmailTaken(new_user.email));
        }

        let id = write_guard.next_id;
        write_guard.next_id += 1;

        let user = User {
            id,
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            created_at: Utc::now().naive_utc(),
        };
        write_guard.users.insert(id, user.clone());

        Ok(user)
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        username: Option<String>,
        email: Option<String>,
    ) -> Result<User, UserRepoError> {
        let mut write_guard = self.write_lock()?;

        if let Some(username) = &username {
            if write_guard
                .users
                .values()
                .any(|u| u.id != user_id && &u.username == username)
            {
                return Err(UsernameTaken(username.clone()));
            }
        }
        if let Some(email) = &email {
            if write_guard
                .users
                .values()
                .any(|u| u.id != user_id && &u.email == email)
            {
                return Err(EmailTaken(email.clone()));
            }
        }

        let Some(user) = write_guard.users.get_mut(&user_id) else {
            return Err(UserNotFound(user_id.to_string()));
        };
        if let Some(username) = username {
            user.username = username;
        }
        if let Some(email) = email {
            user.email = email;
        }
        Ok(user.clone())
    }

    async fn update_password_hash(
        &self,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<(), UserRepoError> {
        let mut write_guard = self.write_lock()?;

        match write_guard.users.get_mut(&user_id) {
            Some(user) => {
                user.password_hash = password_hash.to_owned();
                Ok(())
            }
            None => Err(UserNotFound(user_id.to_string())),
        }
    }

    async fn delete_user(&self, user_id: UserId) -> Result<(), UserRepoError> {
        let mut write_guard = self.write_lock()?;

        if write_guard.users.remove(&user_id).is_some() {
            Ok(())
        } else {
            Err(UserNotFound(user_id.to_string()))
        }
    }
}
