use advisor::app::App;
use advisor::cli::Args;
use advisor::logging::setup_logging;
use clap::Parser;
use figment::providers::Env;
use figment::value::UncasedStr;
use std::process::ExitCode;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config and set up logging before App::new() so startup logs are
    // never silently dropped while the rest of the app is still wiring up.
    let early_config = figment::Figment::new()
        .merge(Env::raw().map(|k| {
            if k == UncasedStr::new("RAILWAY_DEPLOYMENT_DRAINING_SECONDS") {
                "SHUTDOWN_TIMEOUT".into()
            } else {
                k.into()
            }
        }))
        .extract::<advisor::config::Config>()
        .expect("failed to load config for logging setup");
    setup_logging(&early_config, args.tracing);

    let mut app = match App::new().await {
        Ok(app) => app,
        Err(error) => {
            tracing::error!(%error, "failed to initialize application");
            return ExitCode::FAILURE;
        }
    };

    info!(services = ?args.services, "services configuration loaded");
    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = if cfg!(debug_assertions) { "development" } else { "production" },
        "starting advisor"
    );

    if let Err(error) = app.setup_services(&args.services) {
        tracing::error!(%error, "failed to set up services");
        return ExitCode::FAILURE;
    }

    app.start_services();
    app.run().await
}
