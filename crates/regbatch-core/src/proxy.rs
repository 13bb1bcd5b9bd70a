//! Dispatch URL resolution

use crate::config::RunConfig;

/// `<proxy_base><percent-encoded target>`
#[must_use]
pub fn proxied_url(proxy_base: &str, target_url: &str) -> String {
    format!("{proxy_base}{}", urlencoding::encode(target_url))
}

/// URL the request is actually sent to.
#[must_use]
pub fn dispatch_url(config: &RunConfig) -> String {
    if config.use_proxy {
        proxied_url(&config.proxy_base, &config.target_url)
    } else {
        config.target_url.clone()
    }
}
