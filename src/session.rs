//! リクエスト単位の分離セッション
//!
//! 共有ブラウザ上に独立したブラウザコンテキストとページを1組開く。
//! コンテキストが分かれているためリクエスト間でCookie等の状態は漏れない。

use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::Page;
use tracing::debug;

use crate::error::{classify_cdp, ScraperError};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 1リクエスト分のブラウザコンテキスト+ページ
///
/// 所有者のスクレイプ操作が終わったら、成功・失敗を問わず
/// `close()` で必ず解放すること。クローズ時のエラーは握りつぶす
pub struct Session {
    context_id: BrowserContextId,
    page: Page,
}

impl Session {
    /// 現在の接続上に分離コンテキストとページを開く
    pub async fn open(browser: &Browser) -> Result<Self, ScraperError> {
        let resp = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| classify_cdp(e, ScraperError::BrowserInit))?;
        let context_id = resp.result.browser_context_id.clone();

        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(ScraperError::BrowserInit)?;

        let page = match browser.new_page(params).await {
            Ok(page) => page,
            Err(e) => {
                // ページが開けなかったコンテキストは残さない
                Self::dispose_context(browser, context_id).await;
                return Err(classify_cdp(e, ScraperError::BrowserInit));
            }
        };

        if let Err(e) = page.set_user_agent(USER_AGENT).await {
            debug!("Failed to set user agent (ignored): {}", e);
        }

        Ok(Self { context_id, page })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// ページとコンテキストを解放する。どの経路でも一度だけ呼ばれ、
    /// クローズ時のエラーが操作本体の結果を上書きすることはない
    pub async fn close(self, browser: &Browser) {
        if let Err(e) = self.page.close().await {
            debug!("Page close error (ignored): {}", e);
        }
        Self::dispose_context(browser, self.context_id).await;
    }

    async fn dispose_context(browser: &Browser, context_id: BrowserContextId) {
        let params = DisposeBrowserContextParams::new(context_id);
        if let Err(e) = browser.execute(params).await {
            debug!("Browser context dispose error (ignored): {}", e);
        }
    }
}
