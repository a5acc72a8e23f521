use std::net::IpAddr;
use thiserror::Error;
use url::{Host, Url};

#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("URL is empty")]
    Empty,
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (allowed: {1})")]
    UnsupportedScheme(String, &'static str),
    #[error("URL has no host")]
    MissingHost,
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(IpAddr),
    #[error("Localhost not allowed")]
    Localhost,
}

const FEED_SCHEMES: &[&str] = &["http", "https"];
const PROXY_SCHEMES: &[&str] = &["http", "https"];

/// Validate a link before subscribing to it.
///
/// Only http(s) URLs with a public host pass. `localhost`, loopback,
/// private, link-local and unspecified addresses are rejected so a feed
/// cannot be pointed at the machine or network running the puller.
///
/// # Errors
///
/// Returns the first [`UrlValidationError`] that applies.
pub fn validate_feed_url(input: &str) -> Result<Url, UrlValidationError> {
    let url = parse_with_scheme(input, FEED_SCHEMES, "http, https")?;

    match url.host() {
        None => Err(UrlValidationError::MissingHost),
        Some(Host::Domain(domain)) if domain.eq_ignore_ascii_case("localhost") => {
            Err(UrlValidationError::Localhost)
        }
        Some(Host::Domain(_)) => Ok(url),
        Some(Host::Ipv4(ip)) => check_ip(IpAddr::V4(ip)).map(|_| url),
        Some(Host::Ipv6(ip)) => check_ip(IpAddr::V6(ip)).map(|_| url),
    }
}

/// Validate a per-feed proxy URL. Proxies are usually local, so no host
/// restrictions apply.
pub fn validate_proxy_url(input: &str) -> Result<Url, UrlValidationError> {
    let url = parse_with_scheme(input, PROXY_SCHEMES, "http, https")?;
    if url.host().is_none() {
        return Err(UrlValidationError::MissingHost);
    }
    Ok(url)
}

fn parse_with_scheme(
    input: &str,
    allowed: &[&str],
    allowed_label: &'static str,
) -> Result<Url, UrlValidationError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(UrlValidationError::Empty);
    }
    let url = Url::parse(input)?;
    if !allowed.contains(&url.scheme()) {
        return Err(UrlValidationError::UnsupportedScheme(
            url.scheme().to_owned(),
            allowed_label,
        ));
    }
    Ok(url)
}

fn check_ip(ip: IpAddr) -> Result<(), UrlValidationError> {
    if ip.is_loopback() {
        return Err(UrlValidationError::Localhost);
    }
    let private = match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            // fc00::/7 unique local, fe80::/10 link-local
            v6.is_unspecified() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    };
    if private {
        return Err(UrlValidationError::PrivateIp(ip));
    }
    Ok(())
}
