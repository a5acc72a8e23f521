//! Input validation shared by the CLI commands.
//!
//! Feed links are restricted to public http(s) hosts before they are stored,
//! and per-feed proxies to the schemes `reqwest` can route through.
//!
//! ```
//! use feedpull::util::{validate_feed_url, validate_proxy_url};
//!
//! assert!(validate_feed_url("https://example.com/feed.xml").is_ok());
//! assert!(validate_feed_url("http://192.168.1.1/feed").is_err());
//! assert!(validate_proxy_url("http://127.0.0.1:3128").is_ok());
//! assert!(validate_proxy_url("socks5://127.0.0.1:1080").is_err());
//! ```

mod url;

pub use self::url::{validate_feed_url, validate_proxy_url, UrlValidationError};
