use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::category::{Category, CategoryRequest},
    utils::{jwt::Claims, slug::slugify},
};

fn require_admin(claims: &Claims, action: &str) -> Result<(), AppError> {
    if claims.is_admin {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "You are not allowed to {action} categories"
        )))
    }
}

/// Create a category. Admin only.
pub async fn create_category(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&claims, "create")?;
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let slug = slugify(&payload.name);
    if slug.is_empty() {
        return Err(AppError::BadRequest("Category name is required".to_string()));
    }

    let category = sqlx::query_as::<_, Category>(
        r#"
        INSERT INTO categories (name, slug, description)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(&payload.name)
    .bind(&slug)
    .bind(payload.description.unwrap_or_default())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict(format!("Category '{}' already exists", payload.name))
        } else {
            AppError::from(e)
        }
    })?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// List all categories, name ascending. Public.
pub async fn get_categories(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let categories =
        sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name ASC")
            .fetch_all(&pool)
            .await?;

    Ok(Json(categories))
}

/// Update a category's name/description. Admin only. Re-derives the slug.
pub async fn update_category(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(category_id): Path<i64>,
    Json(payload): Json<CategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&claims, "update")?;
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let slug = slugify(&payload.name);
    if slug.is_empty() {
        return Err(AppError::BadRequest("Category name is required".to_string()));
    }

    let category = sqlx::query_as::<_, Category>(
        r#"
        UPDATE categories
        SET name = $1, slug = $2, description = $3
        WHERE id = $4
        RETURNING *
        "#,
    )
    .bind(&payload.name)
    .bind(&slug)
    .bind(payload.description.unwrap_or_default())
    .bind(category_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Category not found".to_string()))?;

    Ok(Json(category))
}

/// Delete a category. Admin only.
/// Posts in the category fall back to uncategorized (FK SET NULL).
pub async fn delete_category(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(category_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&claims, "delete")?;

    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(category_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Category not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
