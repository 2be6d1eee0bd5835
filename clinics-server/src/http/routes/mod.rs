//! Route handlers organized by resource

pub mod clinics;
pub mod dentists;
pub mod health;

use axum::http::header::LINK;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use clinics_core::{CursorPage, PageRequest};
use serde::{Deserialize, Serialize};

use super::error::ApiError;

pub const PAGE_LIMIT: HeaderName = HeaderName::from_static("x-page-limit");
pub const NEXT_CURSOR: HeaderName = HeaderName::from_static("x-next-cursor");

/// Raw `limit` and `cursor` query parameters
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<String>,
    pub cursor: Option<String>,
}

impl PageParams {
    pub fn request(&self) -> Result<PageRequest, ApiError> {
        Ok(PageRequest::parse(
            self.limit.as_deref(),
            self.cursor.as_deref(),
        )?)
    }
}

/// Items as the JSON body, paging state in headers. The next cursor header
/// is empty on the last page, and `Link: <...>; rel="next"` is only sent
/// when another page follows. `path` is the full request path.
pub fn page_response<T: Serialize>(
    page: CursorPage<T>,
    request: &PageRequest,
    path: &str,
) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(PAGE_LIMIT, HeaderValue::from(request.limit()));
    headers.insert(NEXT_CURSOR, HeaderValue::from_static(""));

    if let Some(cursor) = page.next_cursor {
        let link = format!(
            "<{}?limit={}&cursor={}>; rel=\"next\"",
            path,
            request.limit(),
            cursor
        );
        if let (Ok(next), Ok(link)) = (
            HeaderValue::from_str(&cursor.to_string()),
            HeaderValue::from_str(&link),
        ) {
            headers.insert(NEXT_CURSOR, next);
            headers.insert(LINK, link);
        }
    }

    (headers, Json(page.items)).into_response()
}
