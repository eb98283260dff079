use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::settings;
use crate::store::{self, fields, keys, Document, DocumentStore, Filter};
use crate::types::{now_rfc3339, CreateUserRequest, Role, UpdateUserRequest, User};

/// Create the caller's profile after Cognito signup.
///
/// Users who ask to teach start as unapproved instructors, unless the platform
/// has closed instructor applications.
pub async fn create_profile(
    store: &dyn DocumentStore,
    user_id: &str,
    req: CreateUserRequest,
) -> Result<User, AppError> {
    if req.name.trim().is_empty() || req.email.trim().is_empty() {
        return Err(AppError::BadRequest("name and email are required".to_string()));
    }

    let applications_open = settings::platform_config(store)
        .await?
        .allow_instructor_applications;
    let role = if req.wants_to_teach && applications_open {
        Role::Instructor
    } else {
        Role::Student
    };

    let user = User {
        user_id: user_id.to_string(),
        name: req.name,
        email: req.email,
        role,
        is_approved: false,
        active_role: Role::Student,
        bio: req.bio,
        avatar_url: req.avatar_url,
        created_at: now_rfc3339(),
    };

    let written = store
        .put_if_absent(&keys::user(user_id), store::encode(&user)?)
        .await?;
    if !written {
        return Err(AppError::Conflict("Profile already exists".to_string()));
    }

    tracing::info!("Created {} profile {}", user.role.as_str(), user_id);
    Ok(user)
}

pub async fn get_user(store: &dyn DocumentStore, user_id: &str) -> Result<User, AppError> {
    store::load(store, &keys::user(user_id))
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

async fn patch_user(
    store: &dyn DocumentStore,
    user_id: &str,
    patch: Document,
) -> Result<User, AppError> {
    let doc = store
        .update(&keys::user(user_id), patch)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(store::decode(doc)?)
}

pub async fn update_profile(
    store: &dyn DocumentStore,
    user_id: &str,
    req: UpdateUserRequest,
) -> Result<User, AppError> {
    let mut patch = Document::new();
    if let Some(name) = req.name {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest("name cannot be empty".to_string()));
        }
        patch.insert("name".to_string(), Value::String(name));
    }
    if let Some(bio) = req.bio {
        patch.insert("bio".to_string(), Value::String(bio));
    }
    if let Some(avatar_url) = req.avatar_url {
        patch.insert("avatar_url".to_string(), Value::String(avatar_url));
    }

    if patch.is_empty() {
        return get_user(store, user_id).await;
    }
    patch_user(store, user_id, patch).await
}

/// Roles the user may act as.
pub fn available_roles(user: &User) -> Vec<Role> {
    let mut roles = vec![Role::Student];
    if (user.role == Role::Instructor && user.is_approved) || user.role == Role::Admin {
        roles.push(Role::Instructor);
    }
    if user.role == Role::Admin {
        roles.push(Role::Admin);
    }
    roles
}

/// Switch the active role. A role outside [`available_roles`] leaves the user
/// unchanged.
pub async fn switch_role(
    store: &dyn DocumentStore,
    user_id: &str,
    target: Role,
) -> Result<User, AppError> {
    let user = get_user(store, user_id).await?;
    if !available_roles(&user).contains(&target) {
        tracing::debug!("Ignoring switch of {} to unavailable role {}", user_id, target.as_str());
        return Ok(user);
    }
    if user.active_role == target {
        return Ok(user);
    }
    patch_user(store, user_id, fields([("active_role", json!(target))])).await
}

pub async fn apply_as_instructor(store: &dyn DocumentStore, user_id: &str) -> Result<User, AppError> {
    let user = get_user(store, user_id).await?;
    match user.role {
        Role::Instructor | Role::Admin => {
            return Err(AppError::Conflict(
                "User is already an instructor".to_string(),
            ))
        }
        Role::Student => {}
    }
    if !settings::platform_config(store)
        .await?
        .allow_instructor_applications
    {
        return Err(AppError::Forbidden(
            "Instructor applications are closed".to_string(),
        ));
    }

    patch_user(
        store,
        user_id,
        fields([("role", json!(Role::Instructor)), ("is_approved", json!(false))]),
    )
    .await
}

// ========== ADMIN ==========

pub async fn list_users(store: &dyn DocumentStore, role: Option<Role>) -> Result<Vec<User>, AppError> {
    let filters: Vec<Filter> = role
        .map(|r| vec![Filter::eq("role", r.as_str())])
        .unwrap_or_default();
    let mut users: Vec<User> = store::scan_as(store, &filters).await?;
    users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(users)
}

/// Overwrite a user's role. The active role falls back to student when the
/// new role no longer covers it.
pub async fn set_role(store: &dyn DocumentStore, target_id: &str, role: Role) -> Result<User, AppError> {
    let mut user = get_user(store, target_id).await?;
    user.role = role;
    let mut patch = fields([("role", json!(role))]);
    if !available_roles(&user).contains(&user.active_role) {
        patch.insert("active_role".to_string(), json!(Role::Student));
    }
    let updated = patch_user(store, target_id, patch).await?;
    tracing::info!("Role of {} set to {}", target_id, role.as_str());
    Ok(updated)
}

pub async fn approve_instructor(store: &dyn DocumentStore, target_id: &str) -> Result<User, AppError> {
    let user = get_user(store, target_id).await?;
    if user.role != Role::Instructor {
        return Err(AppError::Conflict(
            "Only instructor applicants can be approved".to_string(),
        ));
    }
    patch_user(store, target_id, fields([("is_approved", json!(true))])).await
}

/// Remove the identity from Cognito (when a pool is configured) and then the
/// profile document.
pub async fn delete_user(
    store: &dyn DocumentStore,
    cognito: Option<(&CognitoClient, &str)>,
    target_id: &str,
) -> Result<(), AppError> {
    get_user(store, target_id).await?;

    if let Some((client, pool_id)) = cognito {
        let result = client
            .admin_delete_user()
            .user_pool_id(pool_id)
            .username(target_id)
            .send()
            .await;
        if let Err(err) = result {
            let not_found = err
                .as_service_error()
                .is_some_and(|e| e.is_user_not_found_exception());
            if !not_found {
                return Err(AppError::Identity(format!("{}", err)));
            }
            tracing::warn!("Cognito user {} already gone", target_id);
        }
    } else {
        tracing::warn!("No Cognito pool configured, deleting profile {} only", target_id);
    }

    store.delete(&keys::user(target_id)).await?;
    tracing::info!("Deleted user {}", target_id);
    Ok(())
}
