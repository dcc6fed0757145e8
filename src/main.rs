use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the Consult application
///
/// Loads `.env`, resolves the core configuration once, optionally seeds the in-process store,
/// and serves the REST API with OpenAPI/Swagger documentation.
///
/// # Environment Variables
/// - `CONSULT_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CONSULT_SEED_FILE`: Optional JSON file of raw knowledge records to preload
/// - `CONSULT_NO_ORG_PLACEHOLDERS`: Comma-separated values meaning "no organisation"
/// - `CONSULT_UNKNOWN_ORG_LABEL`: Label for fragments with no resolvable owner
/// - `CONSULT_MAX_SHARE_TRIPLES`: Upper bound on triples per share
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, startup or serving fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("consult=info".parse()?)
                .add_directive("consult_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("CONSULT_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let state = api_rest::state_from_env()?;
    let rest_app = api_rest::router(state);

    tracing::info!("++ Starting Consult REST on {}", rest_addr);

    let rest_server = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
        axum::serve(listener, rest_app).await?;
        Ok::<(), anyhow::Error>(())
    });

    rest_server.await??;

    Ok(())
}
