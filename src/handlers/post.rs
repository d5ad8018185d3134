use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::post::{CreatePostRequest, Post, PostListParams, PostListResponse, UpdatePostRequest},
    utils::{html::clean_html, jwt::Claims, slug::slugify},
};

const DEFAULT_PAGE_SIZE: i64 = 9;
const MAX_PAGE_SIZE: i64 = 100;

/// Create a new post.
/// Admin only: regular users comment, they do not publish.
pub async fn create_post(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !claims.is_admin {
        return Err(AppError::Forbidden(
            "You are not allowed to create a post".to_string(),
        ));
    }
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let user_id = claims.user_id()?;
    let content = clean_html(&payload.content);
    let slug = slugify(&payload.title);
    if slug.is_empty() {
        return Err(AppError::BadRequest(
            "Title must contain at least one alphanumeric character".to_string(),
        ));
    }

    if let Some(category_id) = payload.category_id {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM categories WHERE id = $1")
            .bind(category_id)
            .fetch_optional(&pool)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound("Category not found".to_string()));
        }
    }

    let post = sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (user_id, category_id, title, content, slug)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(payload.category_id)
    .bind(&payload.title)
    .bind(content)
    .bind(&slug)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict(format!("A post with slug '{}' already exists", slug))
        } else {
            tracing::error!("Failed to create post: {:?}", e);
            AppError::from(e)
        }
    })?;

    Ok((StatusCode::CREATED, Json(post)))
}

/// Update a post. Author or admin only.
pub async fn update_post(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let author_id: Option<i64> = sqlx::query_scalar("SELECT user_id FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(&pool)
        .await?;
    let author_id = author_id.ok_or(AppError::NotFound("Post not found".to_string()))?;

    if author_id != user_id && !claims.is_admin {
        return Err(AppError::Forbidden(
            "You are not allowed to update this post".to_string(),
        ));
    }

    if payload.title.is_none() && payload.content.is_none() && payload.category_id.is_none() {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
            .bind(post_id)
            .fetch_one(&pool)
            .await?;
        return Ok(Json(post));
    }

    if let Some(category_id) = payload.category_id {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM categories WHERE id = $1")
            .bind(category_id)
            .fetch_optional(&pool)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound("Category not found".to_string()));
        }
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE posts SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = &payload.title {
        if title.trim().is_empty() {
            return Err(AppError::BadRequest("Title is required".to_string()));
        }
        separated.push("title = ");
        separated.push_bind_unseparated(title.clone());
    }

    if let Some(content) = &payload.content {
        separated.push("content = ");
        separated.push_bind_unseparated(clean_html(content));
    }

    if let Some(category_id) = payload.category_id {
        separated.push("category_id = ");
        separated.push_bind_unseparated(category_id);
    }

    separated.push("updated_at = NOW()");

    builder.push(" WHERE id = ");
    builder.push_bind(post_id);
    builder.push(" RETURNING *");

    let post = builder
        .build_query_as::<Post>()
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update post: {:?}", e);
            AppError::from(e)
        })?;

    Ok(Json(post))
}

/// Delete a post. Author or admin only.
/// Comments on the post go with it (FK cascade).
pub async fn delete_post(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let author_id: Option<i64> = sqlx::query_scalar("SELECT user_id FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(&pool)
        .await?;
    let author_id = author_id.ok_or(AppError::NotFound("Post not found".to_string()))?;

    if author_id != user_id && !claims.is_admin {
        return Err(AppError::Forbidden(
            "You are not allowed to delete this post".to_string(),
        ));
    }

    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(post_id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Pushes the listing filters shared by the page query and the count query.
fn push_post_filters(builder: &mut QueryBuilder<Postgres>, params: &PostListParams) {
    if let Some(user_id) = params.user_id {
        builder.push(" AND user_id = ");
        builder.push_bind(user_id);
    }
    if let Some(category) = params.category {
        builder.push(" AND category_id = ");
        builder.push_bind(category);
    }
    if let Some(slug) = &params.slug {
        builder.push(" AND slug = ");
        builder.push_bind(slug.clone());
    }
    if let Some(post_id) = params.post_id {
        builder.push(" AND id = ");
        builder.push_bind(post_id);
    }
    if let Some(term) = &params.search_term {
        let pattern = format!("%{}%", term);
        builder.push(" AND (title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR content ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

/// List posts with filters and offset pagination. Public.
///
/// Returns one page ordered by updated_at (descending unless order=asc),
/// the total count matching the filters, and the count of posts created in
/// the last 30 days.
pub async fn get_posts(
    State(pool): State<PgPool>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let start_index = params.start_index.unwrap_or(0).max(0);
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let ascending = params.order.as_deref() == Some("asc");

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM posts WHERE 1 = 1");
    push_post_filters(&mut builder, &params);
    builder.push(if ascending {
        " ORDER BY updated_at ASC, id ASC"
    } else {
        " ORDER BY updated_at DESC, id DESC"
    });
    builder.push(" OFFSET ");
    builder.push_bind(start_index);
    builder.push(" LIMIT ");
    builder.push_bind(limit);

    let posts = builder.build_query_as::<Post>().fetch_all(&pool).await?;

    let mut count_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM posts WHERE 1 = 1");
    push_post_filters(&mut count_builder, &params);
    let total_posts: i64 = count_builder
        .build_query_scalar()
        .fetch_one(&pool)
        .await?;

    let last_month_posts: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM posts WHERE created_at >= NOW() - INTERVAL '30 days'",
    )
    .fetch_one(&pool)
    .await?;

    Ok(Json(PostListResponse {
        posts,
        total_posts,
        last_month_posts,
    }))
}
