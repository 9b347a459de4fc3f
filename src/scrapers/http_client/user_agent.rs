//! User agent selection.

use rand::seq::IndexedRandom;

/// Sent unless the config says otherwise.
pub const USER_AGENT: &str = concat!("oalc-creator/", env!("CARGO_PKG_VERSION"));

/// Config value that picks one of [`BROWSER_USER_AGENTS`] at random.
pub const IMPERSONATE: &str = "impersonate";

const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
];

/// The user agent for a `user_agent` config value: the crate's own when
/// unset, a random browser one for `"impersonate"`, else the value itself.
pub fn resolve_user_agent(configured: Option<&str>) -> String {
    match configured {
        None => USER_AGENT.to_string(),
        Some(IMPERSONATE) => BROWSER_USER_AGENTS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(USER_AGENT)
            .to_string(),
        Some(custom) => custom.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names_the_crate() {
        assert!(resolve_user_agent(None).starts_with("oalc-creator/"));
    }

    #[test]
    fn test_impersonate_picks_a_browser() {
        let ua = resolve_user_agent(Some("impersonate"));
        assert!(BROWSER_USER_AGENTS.contains(&ua.as_str()));
    }

    #[test]
    fn test_custom_is_kept() {
        assert_eq!(resolve_user_agent(Some("LegalBot/1.0")), "LegalBot/1.0");
    }
}
