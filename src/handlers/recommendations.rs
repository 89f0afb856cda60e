use crate::{
    config::Config,
    error::ApiError,
    models::{CompleteLookQuery, SimilarQuery},
    services::RecommendationService,
};
use actix_web::{web, HttpResponse};
use tracing::info;

pub fn recommendations_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/recommend")
            .service(web::resource("/similar").route(web::get().to(similar)))
            .service(web::resource("/complete-look").route(web::get().to(complete_look))),
    );
}

/// Items most similar to `item_id`, diversified with MMR.
pub async fn similar(
    query: web::Query<SimilarQuery>,
    service: web::Data<RecommendationService>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    if query.item_id.trim().is_empty() {
        return Err(ApiError::InvalidInput("item_id cannot be empty".to_string()));
    }
    let k = query.k.unwrap_or(config.default_k as i64);

    let recommendations = service.similar(&query.item_id, k, query.lambda)?;
    info!(
        item_id = %query.item_id,
        k,
        returned = recommendations.len(),
        "similar"
    );

    Ok(HttpResponse::Ok().json(recommendations))
}

/// Items from `target_category` that pair with `seed_item_id`.
pub async fn complete_look(
    query: web::Query<CompleteLookQuery>,
    service: web::Data<RecommendationService>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    if query.seed_item_id.trim().is_empty() {
        return Err(ApiError::InvalidInput(
            "seed_item_id cannot be empty".to_string(),
        ));
    }
    let k = query.k.unwrap_or(config.default_k as i64);
    let target_category = query
        .target_category
        .unwrap_or_else(|| config.default_target_category.clone());

    let recommendations =
        service.complete_look(&query.seed_item_id, &target_category, k, query.lambda)?;
    info!(
        seed_item_id = %query.seed_item_id,
        target_category = %target_category,
        k,
        returned = recommendations.len(),
        "complete-look"
    );

    Ok(HttpResponse::Ok().json(recommendations))
}
