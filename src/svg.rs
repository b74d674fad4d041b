//! 統計カードのSVGレンダラ
//!
//! 難易度別統計ペイロードからの純粋な変換。ブラウザにもSupervisorにも
//! 依存しない。

use crate::gfg::DifficultyStats;

const CARD_WIDTH: u32 = 380;
const CARD_HEIGHT: u32 = 220;

/// 難易度別統計からプロフィールカードSVGを生成する
pub fn render_stats_card(stats: &DifficultyStats) -> String {
    let user_name = escape(&stats.user_name);
    let profile_url = format!(
        "https://www.geeksforgeeks.org/profile/{}?tab=activity",
        user_name
    );

    let cells = [
        ("School", stats.counts.school, "#28a745"),
        ("Basic", stats.counts.basic, "#17a2b8"),
        ("Easy", stats.counts.easy, "#007bff"),
        ("Medium", stats.counts.medium, "#ffc107"),
        ("Hard", stats.counts.hard, "#dc3545"),
    ];

    let mut grid = String::new();
    for (i, (label, count, color)) in cells.iter().enumerate() {
        let x = 20 + i as u32 * 68;
        grid.push_str(&format!(
            r##"<g transform="translate({x},125)">
  <rect width="60" height="50" rx="6" fill="#ffffff"/>
  <text x="30" y="20" class="difficulty" text-anchor="middle">{label}</text>
  <text x="30" y="42" class="counts" fill="{color}" text-anchor="middle">{count}</text>
</g>
"##,
        ));
    }

    format!(
        r##"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg">
<style>
svg {{ font-family: 'Segoe UI', -apple-system, sans-serif; }}
.header {{ font-size: 18px; font-weight: 700; fill: #f8f9fa; }}
.subheader {{ font-size: 13px; fill: #adb5bd; }}
.total {{ font-size: 36px; font-weight: 800; fill: #00d4aa; }}
.difficulty {{ font-size: 11px; fill: #495057; font-weight: 600; text-transform: uppercase; }}
.counts {{ font-size: 18px; font-weight: 700; }}
.username {{ font-size: 12px; fill: #6c757d; }}
</style>
<rect width="{w}" height="{h}" rx="12" fill="#0f1419" stroke="#1e2530"/>
<text x="25" y="38" class="header">GeeksforGeeks</text>
<text x="25" y="56" class="subheader">Problems Solved</text>
<text x="25" y="95" class="total">{total}</text>
<a href="{url}"><text x="25" y="115" class="username">@{name}</text></a>
{grid}</svg>
"##,
        w = CARD_WIDTH,
        h = CARD_HEIGHT,
        total = stats.total_problems_solved,
        url = profile_url,
        name = user_name,
        grid = grid,
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
