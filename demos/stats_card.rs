use gfg_scraper_service::{
    render_stats_card, ScrapeKind, ScrapePayload, ScrapeRequest, ScraperConfig, ScraperService,
};
use tower::Service;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("info,gfg_scraper_service=debug")
        .init();

    let username = std::env::var("GFG_USERNAME").expect("GFG_USERNAME environment variable not set");

    let config = ScraperConfig::from_env().expect("設定が不正です");
    let mut service = ScraperService::new(config);

    println!("=== GFG Stats Card Test ===");

    let request = ScrapeRequest::new(&username, ScrapeKind::Stats);
    match service.call(request).await {
        Ok(ScrapePayload::Stats(stats)) => {
            let svg = render_stats_card(&stats);
            let path = format!("./{}_stats.svg", username);
            match std::fs::write(&path, svg) {
                Ok(_) => println!("成功! SVG保存先: {}", path),
                Err(e) => eprintln!("SVG書き込みエラー: {}", e),
            }
        }
        Ok(other) => {
            eprintln!("想定外のペイロード: {:?}", other);
        }
        Err(e) => {
            eprintln!("エラー: {}", e);
        }
    }

    service.shutdown().await;
}
