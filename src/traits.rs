use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::handler::Handler;

use crate::error::ScraperError;

/// ブラウザ接続の確立方法（ローカル起動 / リモート接続）
///
/// Supervisorはこのトレイト越しに接続を張り直すため、
/// 再生成のコードパスは接続方法に依存しない。
#[async_trait]
pub trait ConnectionStrategy: Send + Sync {
    /// 戦略名（ログ用）
    fn name(&self) -> &'static str;

    /// ブラウザ接続とイベントハンドラを確立する
    async fn establish(&self) -> Result<(Browser, Handler), ScraperError>;
}
