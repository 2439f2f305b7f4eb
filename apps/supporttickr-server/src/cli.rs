use std::sync::Arc;

use anyhow::{Context, Result};

use supporttickr_db::EntityStore;
use supporttickr_db::models::{User, user::avatar_initials};
use supporttickr_db::store::UserPatch;
use supporttickr_db::StoreError;

use crate::services::short_id;

/// Creates the named admin account, or resets its password and name if the
/// email is already taken.
pub async fn seed_admin(
    store: &Arc<dyn EntityStore>,
    email: &str,
    password: &str,
    name: &str,
) -> Result<()> {
    let password_hash =
        bcrypt::hash(password, bcrypt::DEFAULT_COST).context("Failed to hash password")?;

    match store.get_user_by_email(email).await {
        Ok(existing) => {
            let patch = UserPatch {
                name: Some(name.to_string()),
                role: Some("admin".to_string()),
                avatar: Some(avatar_initials(name)),
                password_hash: Some(password_hash),
                ..Default::default()
            };
            store
                .update_user(&existing.id, &patch)
                .await
                .context("Failed to update existing admin")?;
            println!("Admin '{email}' already existed; password reset.");
        }
        Err(StoreError::NotFound(_)) => {
            let user = User {
                id: short_id("user"),
                avatar: avatar_initials(name),
                name: name.to_string(),
                email: email.to_string(),
                password_hash,
                role: "admin".to_string(),
                organization_id: None,
            };
            store.create_user(&user).await.context("Failed to create admin")?;
            println!("Admin '{email}' created.");
        }
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
