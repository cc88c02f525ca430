//! Migration CLI for the Blogly schema.

use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter("info,sea_orm_migration=debug")
        .init();

    cli::run_cli(migration::Migrator).await;
}
