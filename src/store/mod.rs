//! Collaborators the gatekeeping core consumes: user records, password
//! hashing, and avatar file storage.

pub mod avatar;
pub mod hasher;
pub mod identity;

pub use avatar::AvatarStore;
pub use hasher::{Argon2Hasher, CredentialHasher, HashError};
pub use identity::{IdentityStore, MemoryIdentityStore, StoreError, UserRecord};
