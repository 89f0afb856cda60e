use crate::{models::HealthResponse, services::RecommendationService};
use actix_web::{get, web, HttpResponse};

#[get("/health")]
pub async fn health_check(service: web::Data<RecommendationService>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        items: service.item_count(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
