use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;
use tracing::info;

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::gfg::{GfgScraper, ScrapePayload, ScrapeRequest};
use crate::supervisor::BrowserSupervisor;

/// tower::Serviceを実装したスクレイパーサービス
///
/// プロセスで1つ構築し、ハンドラにはcloneを渡す。共有ブラウザ接続の
/// 所有はSupervisorにあり、本サービスはその参照を持ち回るだけ
#[derive(Clone)]
pub struct ScraperService {
    scraper: Arc<GfgScraper>,
}

impl ScraperService {
    pub fn new(config: ScraperConfig) -> Self {
        let supervisor = Arc::new(BrowserSupervisor::from_config(&config));
        Self {
            scraper: Arc::new(GfgScraper::new(supervisor, config)),
        }
    }

    /// 共有ブラウザ接続を閉じる。プロセス終了時に一度呼ぶ
    pub async fn shutdown(&self) {
        self.scraper.supervisor().shutdown().await;
    }
}

impl Service<ScrapeRequest> for ScraperService {
    type Response = ScrapePayload;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ScrapeRequest) -> Self::Future {
        info!(
            "スクレイピングリクエスト受信: username={}, kind={:?}",
            req.username, req.kind
        );

        let scraper = self.scraper.clone();
        Box::pin(async move { scraper.scrape(&req).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfg::ScrapeKind;

    #[test]
    fn test_scrape_request_builder() {
        let req = ScrapeRequest::new("alice", ScrapeKind::Problems);
        assert_eq!(req.username, "alice");
        assert_eq!(req.kind, ScrapeKind::Problems);
    }

    #[test]
    fn test_service_is_cloneable() {
        let service = ScraperService::new(ScraperConfig::default());
        let _clone = service.clone();
    }
}
