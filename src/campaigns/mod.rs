//! Campaign links: short tracked URLs that attribute visits to a source.

pub mod handlers;

use rand::distributions::Uniform;
use rand::Rng;
use serde::Serialize;

use crate::db::models::CampaignLink;

pub const CODE_LEN: usize = 8;
const CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Random lowercase alphanumeric link code.
pub fn generate_code() -> String {
    let dist = Uniform::from(0..CODE_ALPHABET.len());
    rand::thread_rng()
        .sample_iter(dist)
        .take(CODE_LEN)
        .map(|i| CODE_ALPHABET[i] as char)
        .collect()
}

/// Public redirect URL for a campaign code.
pub fn campaign_url(public_base_url: &str, code: &str) -> String {
    format!("{}/c/{}", public_base_url.trim_end_matches('/'), code)
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignLinkView {
    #[serde(flatten)]
    pub link: CampaignLink,
    pub url: String,
}

impl CampaignLinkView {
    pub fn new(link: CampaignLink, public_base_url: &str) -> Self {
        let url = campaign_url(public_base_url, &link.code);
        Self { link, url }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashSet;
    use uuid::Uuid;

    #[test]
    fn codes_are_short_lowercase_alphanumeric() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn codes_do_not_repeat_in_practice() {
        let codes: HashSet<String> = (0..1000).map(|_| generate_code()).collect();
        assert_eq!(codes.len(), 1000);
    }

    #[test]
    fn view_includes_redirect_url() {
        let link = CampaignLink {
            id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            code: "spring24".into(),
            name: "Spring flyer".into(),
            source: Some("flyer".into()),
            medium: None,
            clicks: 3,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(CampaignLinkView::new(link, "https://bitereserve.com/")).unwrap();
        assert_eq!(json["url"], "https://bitereserve.com/c/spring24");
        assert_eq!(json["clicks"], 3);
        assert_eq!(json["name"], "Spring flyer");
    }
}
