use std::fs;
use std::path::Path;
use url::Url;

pub fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

/// `path` appended under the base URL's own path, so `http://host/shop` + `/health`
/// is `http://host/shop/health`. Query and fragment of the base are dropped.
pub fn endpoint_url(base: &Url, path: &str) -> Url {
    let prefix = base.path().trim_end_matches('/');
    let mut url = base.clone();
    url.set_path(&format!("{}/{}", prefix, path.trim_start_matches('/')));
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// Shorten long payloads for log lines and test names.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str("...");
    out
}
