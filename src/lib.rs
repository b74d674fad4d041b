//! GeeksforGeeks プロフィールスクレイパー
//!
//! - 共有ブラウザ接続1本を多数の並行リクエストで多重利用
//! - 接続はリクエスト数の閾値と健全性確認に基づいて自動リサイクル
//! - 接続喪失は有界リトライで回復し、呼び出し元には表面化しない
//!
//! # サービス使用例
//!
//! ```rust,ignore
//! use gfg_scraper_service::{ScrapeKind, ScrapeRequest, ScraperConfig, ScraperService};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ScraperConfig::from_env().unwrap();
//!     let mut service = ScraperService::new(config);
//!
//!     let request = ScrapeRequest::new("some_user", ScrapeKind::Stats);
//!     let payload = service.call(request).await.unwrap();
//!     println!("{}", serde_json::to_string_pretty(&payload).unwrap());
//!
//!     service.shutdown().await;
//! }
//! ```
//!
//! # SVGカード使用例
//!
//! ```rust,ignore
//! use gfg_scraper_service::{render_stats_card, ScrapePayload};
//!
//! fn to_card(payload: &ScrapePayload) -> Option<String> {
//!     match payload {
//!         ScrapePayload::Stats(stats) => Some(render_stats_card(stats)),
//!         _ => None,
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod gfg;
pub mod retry;
pub mod service;
pub mod session;
pub mod supervisor;
pub mod svg;
pub mod traits;

// 主要な型をリエクスポート
pub use config::{BrowserEndpoint, ScraperConfig};
pub use error::{FailureKind, ScraperError};
pub use gfg::{
    DifficultyCounts, DifficultyStats, GfgScraper, ProblemList, ScrapeKind, ScrapePayload,
    ScrapeRequest, UserProfile,
};
pub use service::ScraperService;
pub use session::Session;
pub use supervisor::{BrowserSupervisor, ConnectStrategy, LaunchStrategy};
pub use svg::render_stats_card;
pub use traits::ConnectionStrategy;
