//! User records and the identity store they live in.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::Role;

/// Persisted user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Empty until first saved.
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    /// Stored avatar filename.
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("email already registered: {0}")]
    EmailTaken(String),
}

/// Key-value style user repository.
pub trait IdentityStore: Send + Sync {
    fn find_by_id(&self, id: &str) -> Option<UserRecord>;

    fn find_by_email(&self, email: &str) -> Option<UserRecord>;

    fn exists_by_email(&self, email: &str) -> bool;

    fn exists_by_id(&self, id: &str) -> bool {
        self.find_by_id(id).is_some()
    }

    /// Insert or update `record`, assigning an id if it has none.
    ///
    /// Fails if the email belongs to a different user.
    fn save(&self, record: UserRecord) -> Result<UserRecord, StoreError>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    users: DashMap<String, UserRecord>,
    /// email -> id
    emails: DashMap<String, String>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn remove(&self, id: &str) -> Option<UserRecord> {
        let (_, record) = self.users.remove(id)?;
        self.emails.remove_if(&record.email, |_, owner| owner == id);
        Some(record)
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn find_by_id(&self, id: &str) -> Option<UserRecord> {
        self.users.get(id).map(|r| r.value().clone())
    }

    fn find_by_email(&self, email: &str) -> Option<UserRecord> {
        let id = self.emails.get(email)?.value().clone();
        self.find_by_id(&id)
    }

    fn exists_by_email(&self, email: &str) -> bool {
        self.emails.contains_key(email)
    }

    fn exists_by_id(&self, id: &str) -> bool {
        self.users.contains_key(id)
    }

    fn save(&self, mut record: UserRecord) -> Result<UserRecord, StoreError> {
        if record.id.is_empty() {
            record.id = Uuid::new_v4().simple().to_string();
        }

        // Claiming the email under the shard lock makes concurrent
        // registrations of one address resolve to a single winner.
        match self.emails.entry(record.email.clone()) {
            Entry::Occupied(owner) if owner.get() != &record.id => {
                return Err(StoreError::EmailTaken(record.email));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(record.id.clone());
            }
        }

        if let Some(previous) = self.users.insert(record.id.clone(), record.clone()) {
            if previous.email != record.email {
                self.emails.remove_if(&previous.email, |_, owner| owner == &record.id);
            }
        }

        Ok(record)
    }
}
