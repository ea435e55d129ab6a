#![forbid(unsafe_code)]

pub mod app_services;
pub mod attempt;
pub mod config;
pub mod error;
pub mod leaderboard_service;
pub mod retry;

pub use quiz_core::Clock;

pub use app_services::AppServices;
pub use attempt::{AttemptService, SessionController, SubmitOutcome};
pub use config::AttemptConfig;
pub use error::{AppServicesError, AttemptError, LeaderboardError};
pub use leaderboard_service::{
    DEFAULT_TOP_SCORES, LeaderboardService, PlatformOverview, QuizLeaderboard,
};
pub use retry::RetryConfig;
