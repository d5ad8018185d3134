use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::comment::{
        Comment, CommentListParams, CommentListResponse, CommentThread, CommentView,
        CreateCommentRequest, CreateReplyRequest, EditCommentRequest, Rank,
    },
    utils::{html::clean_html, jwt::Claims},
};

const DEFAULT_PAGE_SIZE: i64 = 9;
const MAX_PAGE_SIZE: i64 = 100;

const COMMENT_VIEW_COLUMNS: &str = "c.id, c.post_id, c.user_id, u.username, c.parent_id, \
     c.content, c.number_of_likes, c.number_of_dislikes, c.rank, c.created_at, c.updated_at";

/// Sanitizes incoming comment text and rejects effectively-empty content.
fn sanitize_content(raw: &str) -> Result<String, AppError> {
    let cleaned = clean_html(raw);
    if cleaned.trim().is_empty() {
        return Err(AppError::BadRequest("Comment content is required".to_string()));
    }
    Ok(cleaned)
}

/// A token can reference an account the identity service never provisioned
/// here; the users FK then rejects the insert, which is an absent actor,
/// not a server fault.
fn map_author_fk_violation(e: sqlx::Error) -> AppError {
    if e.to_string().contains("foreign key constraint") || e.to_string().contains("23503") {
        AppError::NotFound("User not found".to_string())
    } else {
        AppError::from(e)
    }
}

/// Create a new top-level comment on a post.
pub async fn create_comment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = claims.user_id()?;
    let content = sanitize_content(&payload.content)?;

    let post_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE id = $1")
        .bind(payload.post_id)
        .fetch_optional(&pool)
        .await?;
    if post_exists.is_none() {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    let comment = sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (post_id, user_id, content)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(payload.post_id)
    .bind(user_id)
    .bind(content)
    .fetch_one(&pool)
    .await
    .map_err(map_author_fk_violation)?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// Create a reply to an existing comment.
///
/// The parent must be an existing comment on the same post; replies are
/// stored flat with a `parent_id` back-reference.
pub async fn create_reply(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateReplyRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = claims.user_id()?;
    let content = sanitize_content(&payload.content)?;

    let parent: Option<i64> =
        sqlx::query_scalar("SELECT id FROM comments WHERE id = $1 AND post_id = $2")
            .bind(payload.parent_id)
            .bind(payload.post_id)
            .fetch_optional(&pool)
            .await?;
    if parent.is_none() {
        return Err(AppError::NotFound("Parent comment not found".to_string()));
    }

    let reply = sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (post_id, user_id, parent_id, content)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(payload.post_id)
    .bind(user_id)
    .bind(payload.parent_id)
    .bind(content)
    .fetch_one(&pool)
    .await
    .map_err(map_author_fk_violation)?;

    Ok((StatusCode::CREATED, Json(reply)))
}

/// Edit a comment's content. Author or admin only.
pub async fn edit_comment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<i64>,
    Json(payload): Json<EditCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let user_id = claims.user_id()?;
    let content = sanitize_content(&payload.content)?;

    let author_id: Option<i64> = sqlx::query_scalar("SELECT user_id FROM comments WHERE id = $1")
        .bind(comment_id)
        .fetch_optional(&pool)
        .await?;
    let author_id = author_id.ok_or(AppError::NotFound("Comment not found".to_string()))?;

    if author_id != user_id && !claims.is_admin {
        return Err(AppError::Forbidden(
            "You are not allowed to edit this comment".to_string(),
        ));
    }

    let updated = sqlx::query_as::<_, Comment>(
        r#"
        UPDATE comments
        SET content = $1, updated_at = NOW()
        WHERE id = $2
        RETURNING *
        "#,
    )
    .bind(content)
    .bind(comment_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(updated))
}

/// Delete a comment. Author or admin only.
///
/// Replies are retained as orphans: their `parent_id` keeps pointing at the
/// deleted comment, so they stay reachable via the replies listing but no
/// longer appear grouped under a surviving thread.
pub async fn delete_comment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let author_id: Option<i64> = sqlx::query_scalar("SELECT user_id FROM comments WHERE id = $1")
        .bind(comment_id)
        .fetch_optional(&pool)
        .await?;
    let author_id = author_id.ok_or(AppError::NotFound("Comment not found".to_string()))?;

    if author_id != user_id && !claims.is_admin {
        return Err(AppError::Forbidden(
            "You are not allowed to delete this comment".to_string(),
        ));
    }

    sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(comment_id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Membership kind for the vote toggle below.
#[derive(Clone, Copy)]
enum Vote {
    Like,
    Dislike,
}

impl Vote {
    fn table(self) -> &'static str {
        match self {
            Vote::Like => "comment_likes",
            Vote::Dislike => "comment_dislikes",
        }
    }

    fn opposite(self) -> Vote {
        match self {
            Vote::Like => Vote::Dislike,
            Vote::Dislike => Vote::Like,
        }
    }
}

/// Applies a like/dislike toggle for one user on one comment.
///
/// The whole read-toggle-recount-update sequence runs inside a single
/// transaction holding a row lock on the comment, so concurrent toggles on
/// the same comment serialize and counters never drift from the sets.
async fn toggle_vote(
    pool: &PgPool,
    comment_id: i64,
    user_id: i64,
    vote: Vote,
) -> Result<(Comment, bool), AppError> {
    let mut tx = pool.begin().await?;

    let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM comments WHERE id = $1 FOR UPDATE")
        .bind(comment_id)
        .fetch_optional(&mut *tx)
        .await?;
    if locked.is_none() {
        return Err(AppError::NotFound("Comment not found".to_string()));
    }

    let existing: Option<i32> = sqlx::query_scalar(&format!(
        "SELECT 1 FROM {} WHERE comment_id = $1 AND user_id = $2",
        vote.table()
    ))
    .bind(comment_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let active = if existing.is_some() {
        // Toggle off.
        sqlx::query(&format!(
            "DELETE FROM {} WHERE comment_id = $1 AND user_id = $2",
            vote.table()
        ))
        .bind(comment_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        false
    } else {
        // A user sits in at most one of the two sets.
        sqlx::query(&format!(
            "DELETE FROM {} WHERE comment_id = $1 AND user_id = $2",
            vote.opposite().table()
        ))
        .bind(comment_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            "INSERT INTO {} (comment_id, user_id) VALUES ($1, $2)",
            vote.table()
        ))
        .bind(comment_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        true
    };

    let likes: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM comment_likes WHERE comment_id = $1")
            .bind(comment_id)
            .fetch_one(&mut *tx)
            .await?;
    let dislikes: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM comment_dislikes WHERE comment_id = $1")
            .bind(comment_id)
            .fetch_one(&mut *tx)
            .await?;

    // Rank is recomputed from the like count before the row is persisted.
    let rank = Rank::from_like_count(likes);

    let updated = sqlx::query_as::<_, Comment>(
        r#"
        UPDATE comments
        SET number_of_likes = $1, number_of_dislikes = $2, rank = $3, updated_at = NOW()
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(likes as i32)
    .bind(dislikes as i32)
    .bind(rank)
    .bind(comment_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok((updated, active))
}

/// Toggle a like on a comment.
pub async fn like_comment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let (comment, liked) = toggle_vote(&pool, comment_id, user_id, Vote::Like).await?;

    Ok(Json(serde_json::json!({ "comment": comment, "liked": liked })))
}

/// Toggle a dislike on a comment.
pub async fn dislike_comment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let (comment, disliked) = toggle_vote(&pool, comment_id, user_id, Vote::Dislike).await?;

    Ok(Json(serde_json::json!({ "comment": comment, "disliked": disliked })))
}

/// List a post's top-level comments (newest first), each with its replies
/// (oldest first). Public.
pub async fn get_post_comments(
    State(pool): State<PgPool>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let top_level = sqlx::query_as::<_, CommentView>(&format!(
        r#"
        SELECT {COMMENT_VIEW_COLUMNS}
        FROM comments c
        JOIN users u ON c.user_id = u.id
        WHERE c.post_id = $1 AND c.parent_id IS NULL
        ORDER BY c.created_at DESC, c.id DESC
        "#
    ))
    .bind(post_id)
    .fetch_all(&pool)
    .await?;

    let replies = sqlx::query_as::<_, CommentView>(&format!(
        r#"
        SELECT {COMMENT_VIEW_COLUMNS}
        FROM comments c
        JOIN users u ON c.user_id = u.id
        WHERE c.post_id = $1 AND c.parent_id IS NOT NULL
        ORDER BY c.created_at ASC, c.id ASC
        "#
    ))
    .bind(post_id)
    .fetch_all(&pool)
    .await?;

    // Group replies under their parents; orphans (deleted parent) stay out
    // of the threaded view but remain reachable via get_comment_replies.
    let mut by_parent: HashMap<i64, Vec<CommentView>> = HashMap::new();
    for reply in replies {
        if let Some(parent_id) = reply.parent_id {
            by_parent.entry(parent_id).or_default().push(reply);
        }
    }

    let threads: Vec<CommentThread> = top_level
        .into_iter()
        .map(|comment| CommentThread {
            replies: by_parent.remove(&comment.id).unwrap_or_default(),
            comment,
        })
        .collect();

    Ok(Json(threads))
}

/// List the replies of a comment, oldest first. Public.
///
/// Deliberately does not require the parent to still exist, so orphaned
/// replies stay reachable after their parent was deleted.
pub async fn get_comment_replies(
    State(pool): State<PgPool>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let replies = sqlx::query_as::<_, CommentView>(&format!(
        r#"
        SELECT {COMMENT_VIEW_COLUMNS}
        FROM comments c
        JOIN users u ON c.user_id = u.id
        WHERE c.parent_id = $1
        ORDER BY c.created_at ASC, c.id ASC
        "#
    ))
    .bind(comment_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(replies))
}

/// Paginated listing across all comments, newest-updated first.
/// Admin only; feeds the dashboard table and its aggregate counters.
pub async fn get_comments(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<CommentListParams>,
) -> Result<impl IntoResponse, AppError> {
    if !claims.is_admin {
        return Err(AppError::Forbidden(
            "You are not allowed to see all comments".to_string(),
        ));
    }

    let start_index = params.start_index.unwrap_or(0).max(0);
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let comments = sqlx::query_as::<_, CommentView>(&format!(
        r#"
        SELECT {COMMENT_VIEW_COLUMNS}
        FROM comments c
        JOIN users u ON c.user_id = u.id
        ORDER BY c.updated_at DESC, c.id DESC
        OFFSET $1 LIMIT $2
        "#
    ))
    .bind(start_index)
    .bind(limit)
    .fetch_all(&pool)
    .await?;

    let total_comments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments")
        .fetch_one(&pool)
        .await?;

    let last_month_comments: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM comments WHERE created_at >= NOW() - INTERVAL '30 days'",
    )
    .fetch_one(&pool)
    .await?;

    Ok(Json(CommentListResponse {
        comments,
        total_comments,
        last_month_comments,
    }))
}
