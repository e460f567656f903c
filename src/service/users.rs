//! Registration, profile, and avatar operations.

use std::sync::Arc;

use crate::auth::Role;
use crate::error::ServiceError;
use crate::observability::metrics;
use crate::security::upload::{file_extension, FileValidator};
use crate::service::types::{AvatarUpload, RegisterRequest, UpdateProfileRequest, UserResponse};
use crate::store::{AvatarStore, CredentialHasher, IdentityStore, UserRecord};

pub struct UserService {
    users: Arc<dyn IdentityStore>,
    hasher: Arc<dyn CredentialHasher>,
    validator: FileValidator,
    avatars: AvatarStore,
}

impl UserService {
    pub fn new(
        users: Arc<dyn IdentityStore>,
        hasher: Arc<dyn CredentialHasher>,
        validator: FileValidator,
        avatars: AvatarStore,
    ) -> Self {
        Self {
            users,
            hasher,
            validator,
            avatars,
        }
    }

    /// Create an account. Only sellers may attach an avatar.
    pub async fn register(
        &self,
        request: RegisterRequest,
        avatar: Option<AvatarUpload>,
    ) -> Result<UserResponse, ServiceError> {
        tracing::info!(email = %request.email, role = %request.role, "Registering user");

        if self.users.exists_by_email(&request.email) {
            tracing::warn!(email = %request.email, "Registration failed: email already exists");
            return Err(ServiceError::EmailTaken);
        }

        if avatar.is_some() && request.role != Role::Seller {
            tracing::warn!(email = %request.email, "Registration failed: only sellers can upload avatars");
            return Err(ServiceError::AvatarNotAllowed);
        }

        let hasher = Arc::clone(&self.hasher);
        let password = request.password;
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password)).await??;

        let avatar = match avatar {
            Some(upload) => Some(self.store_avatar(&upload).await?),
            None => None,
        };

        let record = UserRecord {
            id: String::new(),
            name: request.name,
            email: request.email,
            password_hash,
            role: request.role,
            avatar: avatar.clone(),
        };

        let saved = match self.users.save(record) {
            Ok(saved) => saved,
            Err(e) => {
                // Lost a race with a concurrent registration of the same email.
                if let Some(filename) = &avatar {
                    self.avatars.delete(filename).await;
                }
                return Err(e.into());
            }
        };

        tracing::info!(user_id = %saved.id, role = %saved.role, "User registered");
        Ok(UserResponse::from(&saved))
    }

    pub fn get_profile(&self, user_id: &str) -> Result<UserResponse, ServiceError> {
        let user = self.find(user_id)?;
        Ok(UserResponse::from(&user))
    }

    /// Blank or missing names leave the profile unchanged.
    pub fn update_profile(
        &self,
        user_id: &str,
        request: UpdateProfileRequest,
    ) -> Result<UserResponse, ServiceError> {
        let mut user = self.find(user_id)?;

        if let Some(name) = request.name.filter(|n| !n.trim().is_empty()) {
            user.name = name;
        }

        let saved = self.users.save(user)?;
        tracing::info!(user_id = %user_id, "Profile updated");
        Ok(UserResponse::from(&saved))
    }

    /// Replace a seller's avatar. The previous file is removed once the new
    /// one is stored and recorded.
    pub async fn update_avatar(
        &self,
        user_id: &str,
        upload: AvatarUpload,
    ) -> Result<UserResponse, ServiceError> {
        let mut user = self.find(user_id)?;

        if user.role != Role::Seller {
            tracing::warn!(user_id = %user_id, "Avatar update failed: user is not a seller");
            return Err(ServiceError::AvatarNotAllowed);
        }

        let filename = self.store_avatar(&upload).await?;
        let previous = user.avatar.replace(filename.clone());

        let saved = match self.users.save(user) {
            Ok(saved) => saved,
            Err(e) => {
                self.avatars.delete(&filename).await;
                return Err(e.into());
            }
        };

        if let Some(previous) = previous {
            self.avatars.delete(&previous).await;
        }

        tracing::info!(user_id = %user_id, filename = %filename, "Avatar updated");
        Ok(UserResponse::from(&saved))
    }

    fn find(&self, user_id: &str) -> Result<UserRecord, ServiceError> {
        self.users.find_by_id(user_id).ok_or_else(|| {
            tracing::warn!(user_id = %user_id, "User not found");
            ServiceError::UserNotFound
        })
    }

    /// Validate, then persist under the declared (lowercased) extension.
    async fn store_avatar(&self, upload: &AvatarUpload) -> Result<String, ServiceError> {
        let outcome = self
            .validator
            .validate(&upload.bytes, &upload.filename, &upload.content_type);

        if let Err(reason) = outcome.into_result() {
            metrics::record_upload(reason.as_str());
            return Err(reason.into());
        }
        metrics::record_upload("accepted");

        let extension = file_extension(&upload.filename);
        let filename = self.avatars.store(&upload.bytes, &extension).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to store avatar file");
            metrics::record_upload("storage_error");
            ServiceError::Storage(e)
        })?;
        Ok(filename)
    }
}
