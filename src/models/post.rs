use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'posts' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub category_id: Option<i64>,
    pub title: String,
    pub content: String,
    pub slug: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a new post.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title length must be between 1 and 200 chars"
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 100000,
        message = "Content length must be between 1 and 100000 chars"
    ))]
    pub content: String,

    pub category_id: Option<i64>,
}

/// DTO for updating a post. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category_id: Option<i64>,
}

/// Query parameters for listing posts.
///
/// Offset pagination plus the filters the dashboard search uses. All
/// filters are ANDed together; `search_term` matches title or content
/// case-insensitively.
#[derive(Debug, Deserialize)]
pub struct PostListParams {
    pub start_index: Option<i64>,
    pub limit: Option<i64>,

    /// Sort order by updated_at: 'asc' or 'desc' (default).
    pub order: Option<String>,

    pub user_id: Option<i64>,
    pub category: Option<i64>,
    pub slug: Option<String>,
    pub post_id: Option<i64>,
    pub search_term: Option<String>,
}

/// One page of posts plus the aggregate counts the dashboard shows.
#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub posts: Vec<Post>,
    pub total_posts: i64,
    pub last_month_posts: i64,
}
