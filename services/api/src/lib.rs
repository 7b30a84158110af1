mod cli;
mod infra;
mod preview;
mod routes;
mod server;

use inspection_service::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
