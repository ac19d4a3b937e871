pub mod auth;
pub mod config;
pub mod err;
pub mod models;
pub mod store;
pub mod students;

use axum::{routing::delete, routing::get, routing::post, routing::put, Router};

use std::sync::Arc;
use std::time::Duration;

use axum::handler::Handler;
use axum::http::Uri;
use axum::Extension;
use serde::Serialize;

use crate::auth::TokenKeys;
use crate::err::{Error, Fine, Made, Maybe, Nothing};
use crate::store::StudentStore;

pub type Payload<T> = axum::response::Result<Maybe<T>, Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Fine(value))
}

pub fn creates<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok(Made(value))
}

pub fn breaks<V>(err: Error) -> Payload<V>
where
    V: Serialize,
{
    Ok(Nothing(err))
}

fn routes() -> Router {
    Router::new()
        .route("/students/register", post(auth::register_student))
        .route("/students/login", post(auth::login_student))
        .route("/students/search", get(students::search_student))
        .route("/students/update", put(students::update_student))
        .route("/students/delete", delete(students::delete_student))
        .fallback(err::handler404.into_service())
}

fn app(store: StudentStore, keys: Arc<TokenKeys>) -> Router {
    routes().layer(Extension(store)).layer(Extension(keys))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let settings = config::load_settings()?;

    let pool = store::connect(&settings.database_url).await?;
    store::prepare_schema(&pool).await?;

    let store = StudentStore::new(pool, Duration::from_millis(settings.store_timeout_ms));
    let keys = Arc::new(TokenKeys::from_secret(
        &settings.token_secret,
        settings.token_ttl_secs,
    ));

    let app = app(store, keys);

    log::info!(
        "Starting StudentBase HTTP Server on http://{}",
        settings.bind_addr
    );
    axum::Server::bind(&settings.bind_addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}
