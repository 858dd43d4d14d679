//! News service: binary entrypoint.
//! Boots the Axum HTTP server with the news pipeline wired in.

use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    news_genie::init_tracing();

    let router = news_genie::app()
        .await
        .map_err(shuttle_runtime::Error::Custom)?;

    Ok(router.into())
}
