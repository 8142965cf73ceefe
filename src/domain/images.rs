//! Image references embedded in draft markup.

use std::{cell::RefCell, rc::Rc};

use lol_html::{RewriteStrSettings, element, rewrite_str};
use url::Url;

use super::error::DomainError;

const OBJECT_STORE_HOST_SUFFIX: &str = ".amazonaws.com";
const LOCAL_PLACEHOLDER_SCHEME: &str = "blob:";

/// Collect the object keys of every `<img>` in `html`.
///
/// Object-store URLs are reduced to their key; other sources are kept as-is.
/// Local `blob:` placeholders (images still uploading) are dropped.
pub fn image_keys(html: &str) -> Result<Vec<String>, DomainError> {
    let sources = Rc::new(RefCell::new(Vec::<String>::new()));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("img", {
                let sources = Rc::clone(&sources);
                move |el| {
                    if let Some(src) = el.get_attribute("src") {
                        sources.borrow_mut().push(src);
                    }
                    Ok(())
                }
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| DomainError::validation(format!("content markup is not scannable: {err}")))?;

    let sources = sources.take();
    Ok(sources
        .iter()
        .map(|src| object_key(src))
        .filter(|key| !key.is_empty() && !key.starts_with(LOCAL_PLACEHOLDER_SCHEME))
        .collect())
}

/// Reduce an object-store URL to its key.
///
/// `https://bucket.s3.region.amazonaws.com/posts/d1/image_0.png?X-Amz=..`
/// becomes `posts/d1/image_0.png`.
pub fn object_key(src: &str) -> String {
    let src = src.trim();
    if src.starts_with(LOCAL_PLACEHOLDER_SCHEME) {
        return src.to_string();
    }

    match Url::parse(src) {
        Ok(url)
            if matches!(url.scheme(), "http" | "https")
                && url
                    .host_str()
                    .is_some_and(|host| host.ends_with(OBJECT_STORE_HOST_SUFFIX)) =>
        {
            url.path().trim_start_matches('/').to_string()
        }
        _ => src.to_string(),
    }
}
