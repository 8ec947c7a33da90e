pub const BADGE_TEXT: &str = "Made on ZAPT";
pub const BADGE_LINK: &str = "https://www.zapt.ai";

/// Static footer line.
pub fn render_badge() -> String {
    format!("{} · {}", BADGE_TEXT, BADGE_LINK)
}
