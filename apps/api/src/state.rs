use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::llm_client::Inference;

/// Shared application state, cloned per request and per spawned
/// candidate-evaluation task. Everything inside is cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub s3: aws_sdk_s3::Client,
    pub infer: Arc<dyn Inference>,
    pub config: Config,
}
