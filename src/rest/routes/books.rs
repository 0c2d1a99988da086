// rest/routes/books.rs — owner-scoped catalog CRUD.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::rest::error::ApiError;
use crate::rest::extract::CurrentUser;
use crate::storage::{BookFilter, BookRow};
use crate::AppContext;

const DEFAULT_LIMIT: i64 = 100;

/// Create/replace payload — PUT takes the same full shape as POST.
#[derive(Debug, Deserialize)]
pub struct BookPayload {
    pub title: String,
    pub author: String,
    pub year: Option<i64>,
    pub description: Option<String>,
}

impl BookPayload {
    fn validate(&self) -> Result<(), ApiError> {
        let title_len = self.title.chars().count();
        if title_len < 1 || title_len > 200 {
            return Err(ApiError::Validation(
                "title must be 1-200 characters".to_string(),
            ));
        }
        let author_len = self.author.chars().count();
        if author_len < 1 || author_len > 100 {
            return Err(ApiError::Validation(
                "author must be 1-100 characters".to_string(),
            ));
        }
        if let Some(year) = self.year {
            if !(1000..=2100).contains(&year) {
                return Err(ApiError::Validation(
                    "year must be between 1000 and 2100".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub year: Option<i64>,
    pub description: Option<String>,
    pub created_at: String,
}

impl From<BookRow> for BookResponse {
    fn from(row: BookRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            author: row.author,
            year: row.year,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListBooksQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub author: Option<String>,
    pub title: Option<String>,
}

impl From<ListBooksQuery> for BookFilter {
    fn from(q: ListBooksQuery) -> Self {
        Self {
            author: q.author,
            title: q.title,
            skip: q.skip.unwrap_or(0).max(0),
            limit: q.limit.unwrap_or(DEFAULT_LIMIT).max(0),
        }
    }
}

pub async fn create_book(
    State(ctx): State<Arc<AppContext>>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<BookPayload>,
) -> Result<Json<BookResponse>, ApiError> {
    body.validate()?;
    let book = ctx
        .storage
        .create_book(
            user.id,
            &body.title,
            &body.author,
            body.year,
            body.description.as_deref(),
        )
        .await?;
    Ok(Json(book.into()))
}

pub async fn list_books(
    State(ctx): State<Arc<AppContext>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListBooksQuery>,
) -> Result<Json<Vec<BookResponse>>, ApiError> {
    let books = ctx.storage.list_books(user.id, &query.into()).await?;
    Ok(Json(books.into_iter().map(BookResponse::from).collect()))
}

pub async fn get_book(
    State(ctx): State<Arc<AppContext>>,
    CurrentUser(user): CurrentUser,
    Path(book_id): Path<i64>,
) -> Result<Json<BookResponse>, ApiError> {
    let book = ctx
        .storage
        .get_book(user.id, book_id)
        .await?
        .ok_or(ApiError::NotFound("Book not found"))?;
    Ok(Json(book.into()))
}

pub async fn update_book(
    State(ctx): State<Arc<AppContext>>,
    CurrentUser(user): CurrentUser,
    Path(book_id): Path<i64>,
    Json(body): Json<BookPayload>,
) -> Result<Json<BookResponse>, ApiError> {
    body.validate()?;
    let book = ctx
        .storage
        .update_book(
            user.id,
            book_id,
            &body.title,
            &body.author,
            body.year,
            body.description.as_deref(),
        )
        .await?
        .ok_or(ApiError::NotFound("Book not found"))?;
    Ok(Json(book.into()))
}

pub async fn delete_book(
    State(ctx): State<Arc<AppContext>>,
    CurrentUser(user): CurrentUser,
    Path(book_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    if !ctx.storage.delete_book(user.id, book_id).await? {
        return Err(ApiError::NotFound("Book not found"));
    }
    Ok(Json(json!({ "message": "Book deleted successfully" })))
}
