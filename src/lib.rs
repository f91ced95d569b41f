pub mod config;
pub mod error;
pub mod llm;
pub mod mail;
pub mod pipeline;
pub mod render;
pub mod routes;
pub mod telemetry;

use std::sync::Arc;

pub use config::Config;
pub use pipeline::LeadPipeline;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<LeadPipeline>,
}

impl AppState {
    pub fn new(config: Config, pipeline: LeadPipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        }
    }
}
