use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;

use auction_users::{
    config::{self, DatabaseSettings, JwtConfig},
    handlers,
    repository::UserRepository,
    store::MongoUserStore,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let jwt = JwtConfig::from_env().map_err(startup_error)?;
    let settings = DatabaseSettings::from_env().map_err(startup_error)?;
    let port = config::get_port().map_err(startup_error)?;

    let database = config::init_database(&settings)
        .await
        .map_err(startup_error)?;

    let store = MongoUserStore::new(&database);
    store.ensure_indexes().await.map_err(startup_error)?;

    let repository = web::Data::new(UserRepository::new(store));
    let jwt = web::Data::new(jwt);

    log::info!("Listening on 127.0.0.1:{}", port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(repository.clone())
            .app_data(jwt.clone())
            .service(
                web::scope("/api/v1/user").configure(handlers::user::configure::<MongoUserStore>),
            )
    })
    .bind(("127.0.0.1", port))?
    .run()
    .await
}

fn startup_error(err: impl std::fmt::Display) -> std::io::Error {
    log::error!("Startup failed: {}", err);
    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
}
