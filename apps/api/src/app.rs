use crate::{
    config::Config,
    error::Result,
    routes::{api_routes, root_route},
    services::{RecommendationService, RecommendationStore, SqlCatalog},
};
use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use log::info;
use std::{net::TcpListener, sync::Arc};

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

    /// Build and run the server
    pub async fn run(&self) -> Result<()> {
        let bind_address = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&bind_address)?;
        info!("Starting server at http://{}", bind_address);

        self.run_with_listener(listener).await
    }

    /// Run the server with a specific TCP listener
    /// This is useful for testing where we want to use a random port
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        info!(
            "Opening recommendation store at {}",
            self.config.database_path.display()
        );
        let store = RecommendationStore::connect(&self.config.database_path).await?;
        store.ensure_schema().await?;

        let catalog = Arc::new(SqlCatalog::new(store.pool().clone()));
        let recommendation_service =
            web::Data::new(RecommendationService::new(store, catalog));

        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header();

            App::new()
                .wrap(cors)
                .wrap(Logger::default())
                .app_data(recommendation_service.clone())
                .service(api_routes())
                .service(root_route())
        })
        .listen(listener)?
        .run()
        .await?;

        Ok(())
    }
}
