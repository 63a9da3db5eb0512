use clap::Parser;
use std::process::ExitCode;

use klokku_core::app::App;
use klokku_core::cli::Args;
use klokku_core::logging;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut app = match App::new().await {
        Ok(app) => app,
        Err(e) => {
            eprintln!("failed to initialize application: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    logging::setup_logging(app.config(), args.tracing);

    app.setup_services();
    app.start_services();
    app.run().await
}
