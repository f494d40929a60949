//! Query construction and organic-result selection for resource discovery.

use url::Url;

use duediligence_shared::SearchHit;

/// Host of the video service whose links count as channel videos.
const VIDEO_HOST: &str = "youtube.com";

/// Domain the social insights search is restricted to.
pub const SOCIAL_DOMAIN: &str = "linkedin.com";

/// Query used to find the company's official website.
pub fn website_query(company: &str) -> String {
    format!("{company} official website")
}

/// Query used to find the company's official video channel.
pub fn channel_query(company: &str) -> String {
    format!("{company} YouTube channel official")
}

/// Query restricted to the professional-network domain.
pub fn social_query(company: &str) -> String {
    format!("{company} site:{SOCIAL_DOMAIN}")
}

/// The first organic result's link, if any result carries one.
pub fn first_organic_link(hits: &[SearchHit]) -> Option<String> {
    hits.first()
        .map(|hit| hit.link.trim())
        .filter(|link| !link.is_empty())
        .map(String::from)
}

/// Up to `max` result links hosted on the video service, in result order.
pub fn video_links(hits: &[SearchHit], max: usize) -> Vec<String> {
    hits.iter()
        .filter(|hit| is_video_link(&hit.link))
        .map(|hit| hit.link.clone())
        .take(max)
        .collect()
}

/// Whether a link points at the video service (the bare domain or any subdomain).
pub fn is_video_link(link: &str) -> bool {
    let Ok(url) = Url::parse(link) else {
        return false;
    };
    match url.host_str() {
        Some(host) => host == VIDEO_HOST || host.ends_with(&format!(".{VIDEO_HOST}")),
        None => false,
    }
}
