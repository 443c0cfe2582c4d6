//! Share links: a page URL carrying `?v=<video id>` opens that video.

use url::Url;

const PARAM: &str = "v";

/// The video id in `link`'s `v` query parameter, if any.
pub fn video_id_from_link(link: &str) -> Option<String> {
  let url = Url::parse(link).ok()?;
  url.query_pairs().find(|(k, _)| k == PARAM).map(|(_, v)| v.into_owned()).filter(|v| !v.is_empty())
}

/// `base` with `v` set to `video_id`, replacing any previous value and
/// keeping other parameters.
pub fn with_video_param(base: &Url, video_id: &str) -> Url {
  let mut url = without_video_param(base);
  url.query_pairs_mut().append_pair(PARAM, video_id);
  url
}

/// `base` without the `v` parameter; the query disappears when nothing else is left.
pub fn without_video_param(base: &Url) -> Url {
  let kept: Vec<(String, String)> =
    base.query_pairs().filter(|(k, _)| k != PARAM).map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
  let mut url = base.clone();
  if kept.is_empty() {
    url.set_query(None);
  } else {
    url.query_pairs_mut().clear().extend_pairs(kept);
  }
  url
}
