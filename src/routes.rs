use actix_web::web;

use crate::{
    error::ApiError,
    handlers::{health_check, recommendations_config},
};

/// Malformed query strings get the same JSON error body as every other 400.
fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| ApiError::InvalidInput(err.to_string()).into())
}

/// Configure all routes for the API
pub fn api_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(query_config())
        .service(health_check)
        .configure(recommendations_config);
}
