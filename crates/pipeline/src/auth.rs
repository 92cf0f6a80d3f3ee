use nile_storage::{RecordStore, RecordStoreExt, User};

use crate::error::PipelineError;

/// Look up a user by exact username and password.
///
/// Passwords are stored and compared as plain text. Returns `None` when no
/// user matches.
pub async fn authenticate(
    store: &dyn RecordStore,
    username: &str,
    password: &str,
) -> Result<Option<User>, PipelineError> {
    let user = store
        .list_as::<User>()
        .await?
        .into_iter()
        .find(|u| u.username == username && u.password == password);
    match &user {
        Some(u) => tracing::info!(username, user_id = u.id, "login succeeded"),
        None => tracing::warn!(username, "login failed"),
    }
    Ok(user)
}
