use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo::{StoreError, UserStore};
use super::repo_types::{NewUser, User, UserChanges, UserFilter};

/// Vec-backed store with the same uniqueness rules as the `users` table.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    /// Inserts a fully formed record, e.g. one with a backdated registration date.
    pub async fn insert(&self, user: User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        users.push(user);
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            registration_date: OffsetDateTime::now_utc(),
        };
        self.insert(created.clone()).await?;
        Ok(created)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        if let Some(email) = &changes.email {
            if users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::DuplicateEmail);
            }
        }
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() < before)
    }

    async fn list(
        &self,
        filter: &UserFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().await;
        let mut matching: Vec<User> = users.iter().filter(|u| filter.matches(u)).cloned().collect();
        matching.sort_by(|a, b| {
            a.registration_date
                .cmp(&b.registration_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self, filter: &UserFilter) -> Result<i64, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().filter(|u| filter.matches(u)).count() as i64)
    }

    async fn registered_since(&self, since: OffsetDateTime) -> Result<Vec<Uuid>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .filter(|u| u.registration_date >= since)
            .map(|u| u.id)
            .collect())
    }
}
