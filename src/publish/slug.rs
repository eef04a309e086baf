//! Pack slug generation and reference parsing.

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use url::Url;

/// Validity pattern for any slug accepted from user input.
static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[a-z0-9_]{1,64}$").expect("slug pattern is valid"));

/// Hosts recognized in pack share links.
const SHARE_HOSTS: &[&str] = &["t.me", "telegram.me", "telegram.dog"];

/// Derive a slug from a display title with a fixed numeric suffix.
///
/// Lowercases the title, strips everything outside `[a-z0-9]`, truncates to
/// 40 characters, then appends `_<suffix>_by_<handle>`. The shape is part of
/// the platform contract; generated slugs must stay interoperable with packs
/// named by earlier deployments.
pub fn slug_from_title(title: &str, suffix: u16, bot_handle: &str) -> String {
    let mut base: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();
    base.truncate(40);
    format!("{base}_{suffix}_by_{bot_handle}")
}

/// Derive a slug from a display title with a random suffix in 0..1000.
pub fn generate_slug(title: &str, bot_handle: &str) -> String {
    let suffix = rand::thread_rng().gen_range(0..1000);
    slug_from_title(title, suffix, bot_handle)
}

/// Whether `input` is a well-formed pack slug.
pub fn is_valid_slug(input: &str) -> bool {
    SLUG_RE.is_match(input)
}

/// Extract a pack slug from user input: either a bare slug or a share URL
/// of the form `https://t.me/addstickers/<slug>` (host aliases tolerated).
pub fn extract_pack_ref(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if is_valid_slug(trimmed) {
        return Some(trimmed.to_string());
    }

    let url = Url::parse(trimmed).ok()?;
    let host = url.host_str()?.trim_start_matches("www.");
    if !SHARE_HOSTS.contains(&host) {
        return None;
    }

    let mut segments = url.path_segments()?;
    if segments.next()? != "addstickers" {
        return None;
    }
    let slug = segments.next()?;
    if is_valid_slug(slug) {
        Some(slug.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_from_title_strips_and_lowercases() {
        assert_eq!(
            slug_from_title("My Cool Pack!!", 42, "stickerbot"),
            "mycoolpack_42_by_stickerbot"
        );
    }

    #[test]
    fn test_slug_from_title_truncates_long_titles() {
        let title = "a".repeat(120);
        let slug = slug_from_title(&title, 7, "stickerbot");
        assert_eq!(slug, format!("{}_7_by_stickerbot", "a".repeat(40)));
        assert!(is_valid_slug(&slug));
    }

    #[test]
    fn test_slug_from_title_keeps_digits() {
        assert_eq!(
            slug_from_title("Top 10 Cats", 0, "stickerbot"),
            "top10cats_0_by_stickerbot"
        );
    }

    #[test]
    fn test_generated_slug_is_always_valid() {
        for _ in 0..50 {
            assert!(is_valid_slug(&generate_slug("Weird – Tîtle ☃", "stickerbot")));
        }
    }

    #[test]
    fn test_is_valid_slug_rejects_bad_input() {
        assert!(is_valid_slug("mypack_42_by_stickerbot"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("Has-Caps"));
        assert!(!is_valid_slug("spaces here"));
        assert!(!is_valid_slug(&"x".repeat(65)));
    }

    #[test]
    fn test_extract_pack_ref_accepts_bare_slug() {
        assert_eq!(
            extract_pack_ref("  mypack_1_by_bot  ").as_deref(),
            Some("mypack_1_by_bot")
        );
    }

    #[test]
    fn test_extract_pack_ref_accepts_share_urls() {
        for host in ["t.me", "telegram.me", "telegram.dog", "www.t.me"] {
            let input = format!("https://{host}/addstickers/mypack_1_by_bot");
            assert_eq!(
                extract_pack_ref(&input).as_deref(),
                Some("mypack_1_by_bot"),
                "host {host}"
            );
        }
    }

    #[test]
    fn test_extract_pack_ref_rejects_other_urls() {
        assert_eq!(extract_pack_ref("https://example.com/addstickers/p_1_by_b"), None);
        assert_eq!(extract_pack_ref("https://t.me/joinchat/abc"), None);
        assert_eq!(extract_pack_ref("https://t.me/addstickers/Bad-Slug"), None);
        assert_eq!(extract_pack_ref("not a slug at all!"), None);
    }
}
