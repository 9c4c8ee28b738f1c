pub mod config;
pub mod jobs;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod telemetry;
pub mod utils;

pub use config::Config;
pub use jobs::{AsyncRecomputeTrigger, JobQueue, RecomputeWorker};
pub use services::{RankingService, SponsorSelectionService};
