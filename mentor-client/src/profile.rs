use mentor_types::{ChangePasswordRequest, MessageResponse, UpdateProfileRequest, User};
use reqwest::multipart::{Form, Part};

use crate::api::ApiClient;
use crate::error::ApiError;

/// Profile endpoints; the signed-in user in the auth cache is kept in sync.
#[derive(Debug, Clone)]
pub struct ProfileService {
    client: ApiClient,
}

impl ProfileService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn update_profile(&self, request: &UpdateProfileRequest) -> Result<User, ApiError> {
        let user: User = self.client.put("/profile", request).await?;
        self.client.auth().replace_user(user.clone());
        self.client.notifier().success("Profile updated.");
        Ok(user)
    }

    pub async fn change_password(&self, request: &ChangePasswordRequest) -> Result<String, ApiError> {
        let response: MessageResponse = self.client.put("/profile/password", request).await?;
        self.client.notifier().success(response.message.clone());
        Ok(response.message)
    }

    /// Upload a new picture as multipart field `file`.
    pub async fn upload_picture(
        &self,
        file_name: impl Into<String>,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<User, ApiError> {
        // Rejected locally, so the client's reaction step never sees it.
        let part = match Part::bytes(bytes).file_name(file_name.into()).mime_str(mime) {
            Ok(part) => part,
            Err(e) => {
                let message = format!("Unsupported image type '{mime}'.");
                if !self.client.is_silent() {
                    self.client.notifier().error(message.clone());
                }
                return Err(ApiError::Validation {
                    message: format!("{message} ({e})"),
                    field_errors: Vec::new(),
                });
            }
        };
        let form = Form::new().part("file", part);

        let user: User = self.client.post_multipart("/profile/picture", form).await?;
        self.client.auth().replace_user(user.clone());
        self.client.notifier().success("Profile picture updated.");
        Ok(user)
    }

    /// Deletes the account and drops the local session.
    pub async fn delete_account(&self) -> Result<String, ApiError> {
        let response: MessageResponse = self.client.delete("/profile").await?;
        self.client.auth().clear();
        self.client.notifier().success(response.message.clone());
        Ok(response.message)
    }
}
