//! Book endpoints.
//!
//! Create and update accept multipart bodies so the thumbnail file rides
//! along with the fields. Listing is readable anonymously; mutation
//! requires the creator or an admin.

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::extract::multipart::Field;
use axum::http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use shelfmark_auth::middleware::{AdminAuth, BearerAuth, OptionalBearerAuth};
use shelfmark_core::{
    ApiError, Book, BookListQuery, BookSort, PageParams, Paginated, SortOrder,
};
use shelfmark_postgres::BookStats;

use crate::error::{AppError, AppResult};
use crate::services::{BookPatch, NewBook, ThumbnailUpload};
use crate::state::AppState;

use super::MessageResponse;

// =============================================================================
// Query Parameters
// =============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct BookListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub author: Option<String>,
    pub min_rating: Option<f32>,
    pub max_rating: Option<f32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl BookListParams {
    fn into_query(self) -> Result<BookListQuery, AppError> {
        let sort_by = match self.sort_by.as_deref() {
            None | Some("") => BookSort::default(),
            Some(raw) => BookSort::parse(raw).ok_or_else(|| {
                AppError(ApiError::validation_with_details(
                    "Invalid list parameters",
                    serde_json::json!({
                        "sortBy": "must be one of created_at, title, author, rating"
                    }),
                ))
            })?,
        };
        let sort_order = match self.sort_order.as_deref() {
            None | Some("") => SortOrder::default(),
            Some("asc") => SortOrder::Asc,
            Some("desc") => SortOrder::Desc,
            Some(_) => {
                return Err(AppError(ApiError::validation_with_details(
                    "Invalid list parameters",
                    serde_json::json!({ "sortOrder": "must be asc or desc" }),
                )));
            }
        };
        if let (Some(min), Some(max)) = (self.min_rating, self.max_rating)
            && min > max
        {
            return Err(AppError(ApiError::validation_with_details(
                "Invalid list parameters",
                serde_json::json!({ "minRating": "must not exceed maxRating" }),
            )));
        }
        Ok(BookListQuery {
            params: PageParams::new(self.page, self.limit),
            search: self.search.filter(|s| !s.trim().is_empty()),
            author: self.author.filter(|s| !s.trim().is_empty()),
            min_rating: self.min_rating,
            max_rating: self.max_rating,
            sort_by,
            sort_order,
        })
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /books`
pub async fn list_books(
    State(state): State<AppState>,
    OptionalBearerAuth(_current): OptionalBearerAuth,
    Query(params): Query<BookListParams>,
) -> AppResult<Json<Paginated<Book>>> {
    let query = params.into_query()?;
    let page = state.books.list(&query).await?;
    Ok(Json(page))
}

/// `GET /books/{id}`
pub async fn get_book(
    State(state): State<AppState>,
    OptionalBearerAuth(_current): OptionalBearerAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Book>> {
    let book = state.books.get(id).await?;
    Ok(Json(book))
}

/// `POST /books` (multipart)
pub async fn create_book(
    State(state): State<AppState>,
    BearerAuth(current): BearerAuth,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<Book>)> {
    let form = parse_book_form(&mut multipart).await?;
    let input = NewBook {
        title: form.title.unwrap_or_default(),
        author: form.author.unwrap_or_default(),
        description: form.description.unwrap_or_default(),
        rating: form.rating,
        thumbnail: form.thumbnail,
    };
    let book = state.books.create(current.id(), input).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// `PATCH /books/{id}` (multipart, owner or admin)
pub async fn update_book(
    State(state): State<AppState>,
    BearerAuth(current): BearerAuth,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<Json<Book>> {
    let form = parse_book_form(&mut multipart).await?;
    let patch = BookPatch {
        title: form.title,
        author: form.author,
        description: form.description,
        rating: form.rating,
        thumbnail: form.thumbnail,
    };
    let book = state
        .books
        .update(id, current.id(), current.is_admin(), patch)
        .await?;
    Ok(Json(book))
}

/// `DELETE /books/{id}` (owner or admin)
pub async fn delete_book(
    State(state): State<AppState>,
    BearerAuth(current): BearerAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    state
        .books
        .delete(id, current.id(), current.is_admin())
        .await?;
    Ok(Json(MessageResponse {
        message: "Book deleted",
    }))
}

/// `GET /books/stats` (admin)
pub async fn book_stats(
    State(state): State<AppState>,
    AdminAuth(_current): AdminAuth,
) -> AppResult<Json<BookStats>> {
    let stats = state.books.stats().await?;
    Ok(Json(stats))
}

// =============================================================================
// Multipart Parsing
// =============================================================================

#[derive(Default)]
struct BookForm {
    title: Option<String>,
    author: Option<String>,
    description: Option<String>,
    rating: Option<f32>,
    thumbnail: Option<ThumbnailUpload>,
}

async fn parse_book_form(multipart: &mut Multipart) -> Result<BookForm, AppError> {
    let mut form = BookForm::default();
    while let Some(field) = multipart.next_field().await.map_err(malformed_body)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => form.title = Some(text_field(field).await?),
            "author" => form.author = Some(text_field(field).await?),
            "description" => form.description = Some(text_field(field).await?),
            "rating" => {
                let raw = text_field(field).await?;
                let raw = raw.trim();
                if !raw.is_empty() {
                    form.rating = Some(raw.parse::<f32>().map_err(|_| {
                        AppError(ApiError::validation_with_details(
                            "Invalid book fields",
                            serde_json::json!({ "rating": "must be a number" }),
                        ))
                    })?);
                }
            }
            "thumbnail" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(malformed_body)?.to_vec();
                if !bytes.is_empty() {
                    form.thumbnail = Some(ThumbnailUpload { file_name, bytes });
                }
            }
            _ => {
                tracing::debug!(field = %name, "Ignoring unknown multipart field");
            }
        }
    }
    Ok(form)
}

async fn text_field(field: Field<'_>) -> Result<String, AppError> {
    field.text().await.map_err(malformed_body)
}

fn malformed_body(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError(ApiError::validation(format!("Malformed multipart body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_defaults() {
        let query = BookListParams::default().into_query().unwrap();
        assert_eq!(query.params.page, 1);
        assert_eq!(query.params.limit, 10);
        assert_eq!(query.sort_by, BookSort::CreatedAt);
        assert_eq!(query.sort_order, SortOrder::Desc);
    }

    #[test]
    fn test_list_params_rejects_unknown_sort() {
        let params = BookListParams {
            sort_by: Some("password_hash".to_string()),
            ..BookListParams::default()
        };
        let err = params.into_query().unwrap_err();
        assert_eq!(err.0.status_code(), 400);
    }

    #[test]
    fn test_list_params_rejects_inverted_rating_range() {
        let params = BookListParams {
            min_rating: Some(4.0),
            max_rating: Some(2.0),
            ..BookListParams::default()
        };
        assert!(params.into_query().is_err());
    }

    #[test]
    fn test_blank_filters_are_dropped() {
        let params = BookListParams {
            search: Some("  ".to_string()),
            author: Some(String::new()),
            ..BookListParams::default()
        };
        let query = params.into_query().unwrap();
        assert!(query.search.is_none());
        assert!(query.author.is_none());
    }

    #[test]
    fn test_camel_case_sort_accepted() {
        let params = BookListParams {
            sort_by: Some("createdAt".to_string()),
            sort_order: Some("asc".to_string()),
            ..BookListParams::default()
        };
        let query = params.into_query().unwrap();
        assert_eq!(query.sort_by, BookSort::CreatedAt);
        assert_eq!(query.sort_order, SortOrder::Asc);
    }
}
