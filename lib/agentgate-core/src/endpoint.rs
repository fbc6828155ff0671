//! Endpoint resolution against a [`PeerAddress`].
//!
//! Paths are joined the way a file system path would be: duplicate separators
//! collapse, `.` segments vanish and `..` pops the previous segment. Whether
//! either side starts or ends with `/` does not matter.
//!
//! ```
//! use agentgate_core::{PeerAddress, endpoint};
//!
//! let peer = PeerAddress::parse("https://a.b/api/").expect("valid peer");
//! assert_eq!(endpoint::resolve(&peer, "/v1/pods").as_str(), "https://a.b/api/v1/pods");
//! assert_eq!(endpoint::resolve_stream(&peer, "/logs").as_str(), "wss://a.b/api/logs");
//! ```

use url::Url;

use crate::PeerAddress;

/// Join two paths into one normalized absolute path.
///
/// The result always starts with `/` and never ends with one, except for
/// the root path itself.
#[must_use]
pub fn join_path(base: &str, relative: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in base.split('/').chain(relative.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    let mut joined = String::with_capacity(base.len() + relative.len() + 1);
    for segment in segments {
        joined.push('/');
        joined.push_str(segment);
    }
    joined
}

/// Split a relative path into its path and embedded query.
///
/// `/pods?watch=true` yields `("/pods", Some("watch=true"))`. A trailing
/// fragment is discarded.
#[must_use]
pub fn split_query(relative: &str) -> (&str, Option<&str>) {
    let relative = relative.split_once('#').map_or(relative, |(head, _)| head);
    match relative.split_once('?') {
        Some((path, query)) => (path, Some(query).filter(|q| !q.is_empty())),
        None => (relative, None),
    }
}

/// Absolute request/response URL for `relative` on `peer`.
///
/// Any query embedded in `relative` is kept.
#[must_use]
pub fn resolve(peer: &PeerAddress, relative: &str) -> Url {
    build(peer.origin().clone(), peer.base_path(), relative)
}

/// Absolute upgrade URL for `relative` on `peer`.
///
/// `http` peers map to `ws`, `https` peers to `wss`; the path is joined as in
/// [`resolve`].
#[must_use]
pub fn resolve_stream(peer: &PeerAddress, relative: &str) -> Url {
    build(peer.stream_origin().clone(), peer.base_path(), relative)
}

fn build(mut url: Url, base_path: &str, relative: &str) -> Url {
    let (path, query) = split_query(relative);
    url.set_path(&join_path(base_path, path));
    url.set_query(query);
    url
}
