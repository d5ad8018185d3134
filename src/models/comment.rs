use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Display tier derived from the distinct like count.
/// Carries no authorization weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "comment_rank", rename_all = "lowercase")]
pub enum Rank {
    Normal,
    Fan,
    Superfan,
    God,
}

impl Rank {
    /// Pure threshold table. Must be applied inside the same transaction
    /// that mutates the likes set, so the stored rank never goes stale.
    pub fn from_like_count(likes: i64) -> Self {
        if likes >= 50 {
            Rank::God
        } else if likes >= 10 {
            Rank::Superfan
        } else if likes >= 3 {
            Rank::Fan
        } else {
            Rank::Normal
        }
    }
}

/// Represents the 'comments' table in the database.
///
/// Replies are stored flat with a `parent_id` back-reference; nesting is
/// reconstructed at query time. `number_of_likes` / `number_of_dislikes`
/// mirror the cardinality of the comment_likes / comment_dislikes tables.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub number_of_likes: i32,
    pub number_of_dislikes: i32,
    pub rank: Rank,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a top-level comment.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    pub post_id: i64,

    #[validate(length(
        min = 1,
        max = 1000,
        message = "Comment must be between 1 and 1000 characters"
    ))]
    pub content: String,
}

/// DTO for replying to an existing comment.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReplyRequest {
    pub post_id: i64,
    pub parent_id: i64,

    #[validate(length(
        min = 1,
        max = 1000,
        message = "Comment must be between 1 and 1000 characters"
    ))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EditCommentRequest {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Comment must be between 1 and 1000 characters"
    ))]
    pub content: String,
}

/// DTO for displaying a comment with author info.
#[derive(Debug, Serialize, FromRow)]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub username: String,
    pub parent_id: Option<i64>,
    pub content: String,
    pub number_of_likes: i32,
    pub number_of_dislikes: i32,
    pub rank: Rank,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A top-level comment grouped with its replies for display.
#[derive(Debug, Serialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: CommentView,
    pub replies: Vec<CommentView>,
}

/// Query parameters for the admin comment listing.
#[derive(Debug, Deserialize)]
pub struct CommentListParams {
    pub start_index: Option<i64>,
    pub limit: Option<i64>,
}

/// Admin listing: one page plus aggregate counts.
#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<CommentView>,
    pub total_comments: i64,
    pub last_month_comments: i64,
}
