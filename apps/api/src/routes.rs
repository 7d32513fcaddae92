use actix_web::{web, HttpResponse, Scope};
use serde_json::json;

use crate::handlers::{health_check, recommendations_config};

/// Configure all routes for the API
pub fn api_routes() -> Scope {
    web::scope("/api")
        .service(health_check)
        .configure(recommendations_config)
}

/// Landing route at `/`
pub fn root_route() -> actix_web::Resource {
    web::resource("/").route(web::get().to(|| async {
        HttpResponse::Ok().json(json!({ "message": "Recommender API" }))
    }))
}
