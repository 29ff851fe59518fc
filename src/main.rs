use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use clap::Parser;
use log::info;

use tweet_feed::config::{init_logging, Settings};
use tweet_feed::db::{self, ScyllaStore};
use tweet_feed::handlers;
use tweet_feed::memory::MemoryStore;
use tweet_feed::store::SharedStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let settings = Settings::parse();
    init_logging(settings.log_level);

    info!("Starting tweet feed...");
    let store: SharedStore = if settings.in_memory {
        info!("Using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let session = db::create_session(&settings.scylla.nodes, &settings.scylla.keyspace)
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        Arc::new(ScyllaStore::new(session))
    };

    info!(
        "Listening on {} with {} workers",
        settings.bind,
        settings.workers()
    );
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(store.clone()))
            .configure(handlers::configure)
    })
    .workers(settings.workers())
    .bind(settings.bind)?
    .run()
    .await
}
