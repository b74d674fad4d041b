use gfg_scraper_service::{ScrapeKind, ScrapeRequest, ScraperConfig, ScraperService};
use tower::Service;

#[tokio::main]
async fn main() {
    // ログ設定
    tracing_subscriber::fmt()
        .with_env_filter("info,gfg_scraper_service=debug")
        .init();

    // 対象ユーザー名は環境変数から取得
    let username = std::env::var("GFG_USERNAME").expect("GFG_USERNAME environment variable not set");

    let config = ScraperConfig::from_env().expect("設定が不正です");
    let mut service = ScraperService::new(config);

    println!("=== GFG Profile Scrape Test ===");

    let request = ScrapeRequest::new(&username, ScrapeKind::Profile);
    match service.call(request).await {
        Ok(payload) => {
            println!("成功!");
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).unwrap_or_default()
            );
        }
        Err(e) => {
            eprintln!("エラー: {}", e);
        }
    }

    service.shutdown().await;
}
