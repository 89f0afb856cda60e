use crate::{
    config::Config,
    routes::api_routes,
    services::{load_serving_context, RecommendationService, ServingContext},
};
use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use log::info;
use std::net::TcpListener;

pub struct Application {
    port: u16,
    host: String,
    config: Config,
}

impl Application {
    /// Create a new application instance
    pub fn new(config: &Config) -> Self {
        Self {
            port: config.port,
            host: config.host.clone(),
            config: config.clone(),
        }
    }

    /// Load the artifacts and run the server. A snapshot that fails to load
    /// aborts startup.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("Loading artifacts from {}", self.config.data_dir.display());
        let context = load_serving_context(&self.config.data_dir).with_context(|| {
            format!(
                "Failed to load serving artifacts from {}",
                self.config.data_dir.display()
            )
        })?;

        let bind_address = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&bind_address)
            .with_context(|| format!("Failed to bind {}", bind_address))?;
        info!("Starting server at http://{}", bind_address);

        self.run_with_listener(listener, context).await
    }

    /// Run the server on an already bound listener.
    /// This is useful for testing where we want to use a random port
    pub async fn run_with_listener(
        &self,
        listener: TcpListener,
        context: ServingContext,
    ) -> anyhow::Result<()> {
        let recommendation_service = web::Data::new(
            RecommendationService::from_config(context, &self.config)
                .context("Failed to initialize recommendation service")?,
        );
        let config = web::Data::new(self.config.clone());

        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header();

            App::new()
                .wrap(cors)
                .wrap(Logger::default())
                .app_data(recommendation_service.clone())
                .app_data(config.clone())
                .configure(api_routes)
        })
        .listen(listener)?
        .run()
        .await?;

        Ok(())
    }
}
