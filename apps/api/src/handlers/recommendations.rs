use crate::{error::ApiError, models::RecommendationQuery, services::RecommendationService};
use actix_web::{get, web, HttpResponse};
use log::debug;

pub fn recommendations_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(|err, _req| {
        ApiError::InvalidRequest(err.to_string()).into()
    }))
    .service(get_recommendations);
}

/// Get stored recommendations for exactly one user or item.
///
/// Query parameters: `user_id` or `item_id`, optional `model` filter and
/// `limit` (1..=100, default 10) applied per model.
#[get("/recommendations")]
pub async fn get_recommendations(
    params: web::Query<RecommendationQuery>,
    recommendation_service: web::Data<RecommendationService>,
) -> Result<HttpResponse, ApiError> {
    debug!("Recommendation lookup: {:?}", params);

    let response = recommendation_service.fetch(&params).await?;

    Ok(HttpResponse::Ok().json(response))
}
