use actix_web::{get, web, HttpResponse, Responder, Scope};
use serde_json::json;

use crate::error::ApiError;

mod cache;

pub use cache::CategoryCache;

pub fn category_service() -> Scope {
    web::scope("/categories").service(get_all_categories)
}

#[get("")]
pub async fn get_all_categories(
    category_cache: web::Data<CategoryCache>,
) -> Result<impl Responder, ApiError> {
    let categories = category_cache.get().await?;
    Ok(HttpResponse::Ok().json(json!({
        "count": categories.len(),
        "categories": categories,
    })))
}
