use serde::Serialize;
use sqlx::FromRow;

/// Public profile shape, used when displaying comment/post authors.
///
/// Accounts are provisioned by the external identity service; this API only
/// reads them (author display, FK integrity, admin flag). Private columns
/// (email, admin flag) never leave the database through this view.
#[derive(Debug, Serialize, FromRow)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub profile_picture: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
