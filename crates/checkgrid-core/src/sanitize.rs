use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Mutex;

use ammonia::Builder;
use lru::LruCache;
use once_cell::sync::Lazy;
use scraper::Html;

const ALLOWED_TAGS: [&str; 11] = [
    "a", "b", "br", "em", "i", "li", "ol", "p", "span", "strong", "ul",
];
const LINK_REL: &str = "noopener noreferrer";
const CACHE_CAPACITY: usize = 256;
const MAX_CLEAN_PASSES: usize = 4;

type Cache = Mutex<LruCache<String, String>>;

// Reloads sanitize the same question cells over and over.
static SANITIZE_CACHE: Lazy<Cache> = Lazy::new(|| {
    let capacity = NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
    Mutex::new(LruCache::new(capacity))
});

/// Restricts rich-text question content to the inline formatting subset.
///
/// Disallowed elements are unwrapped rather than dropped, every attribute
/// other than `href`/`target` on anchors is removed, and anchors always carry
/// `rel="noopener noreferrer"` plus `target="_blank"` unless a target was
/// given. Applying it twice yields the same string as applying it once.
pub fn sanitize(html: &str) -> String {
    if let Ok(mut cache) = SANITIZE_CACHE.lock() {
        if let Some(cached) = cache.get(html) {
            return cached.clone();
        }
    }

    let out = ensure_anchor_targets(&clean_to_fixpoint(html));

    if let Ok(mut cache) = SANITIZE_CACHE.lock() {
        cache.put(html.to_string(), out.clone());
    }
    out
}

/// Text content of an HTML fragment with surrounding whitespace removed.
///
/// This is the normalised form used to match answers to questions.
pub fn plain_text(html: &str) -> String {
    if !html.contains('<') && !html.contains('&') {
        return html.trim().to_string();
    }
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    text.trim().to_string()
}

/// Unwrapping can leave nestings the parser rebuilds differently on the
/// next read (`<p>` inside `<p>`, `<li>` inside `<li>`, nested anchors), so
/// the cleaner runs until its output is stable.
fn clean_to_fixpoint(html: &str) -> String {
    let builder = sanitizer();
    let mut out = builder.clean(html).to_string();
    for _ in 1..MAX_CLEAN_PASSES {
        let next = builder.clean(&out).to_string();
        if next == out {
            break;
        }
        out = next;
    }
    out
}

fn sanitizer() -> Builder<'static> {
    let tags: HashSet<&'static str> = ALLOWED_TAGS.iter().copied().collect();

    let mut tag_attributes = HashMap::new();
    // `rel` is owned by `link_rel` and must not be allow-listed.
    tag_attributes.insert("a", ["href", "target"].iter().copied().collect());

    let mut builder = Builder::new();
    builder
        .tags(tags)
        .clean_content_tags(HashSet::new())
        .generic_attributes(HashSet::new())
        .tag_attributes(tag_attributes)
        .link_rel(Some(LINK_REL));
    builder
}

/// Adds `target="_blank"` to serialized anchors that have no target.
///
/// Scans the serializer's output by byte, relying on it double-quoting every
/// attribute value and escaping `"` inside values.
///
/// The attribute goes first so that a second sanitizing pass, which keeps
/// attribute order and re-appends `rel`, reproduces the same markup.
fn ensure_anchor_targets(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(pos) = rest.find("<a") {
        let after = &rest[pos + 2..];
        out.push_str(&rest[..pos + 2]);
        rest = after;
        if !(after.starts_with(' ') || after.starts_with('>')) {
            continue;
        }
        let tag_end = start_tag_end(after);
        if !has_attribute(&after[..tag_end], "target") {
            out.push_str(" target=\"_blank\"");
        }
        out.push_str(&after[..tag_end]);
        rest = &after[tag_end..];
    }
    out.push_str(rest);
    out
}

fn start_tag_end(tag: &str) -> usize {
    let mut in_quotes = false;
    for (idx, byte) in tag.bytes().enumerate() {
        match byte {
            b'"' => in_quotes = !in_quotes,
            b'>' if !in_quotes => return idx,
            _ => {}
        }
    }
    tag.len()
}

fn has_attribute(tag_body: &str, wanted: &str) -> bool {
    let bytes = tag_body.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() {
        while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
            idx += 1;
        }
        let name_start = idx;
        while idx < bytes.len()
            && !bytes[idx].is_ascii_whitespace()
            && bytes[idx] != b'='
            && bytes[idx] != b'/'
        {
            idx += 1;
        }
        if tag_body[name_start..idx].eq_ignore_ascii_case(wanted) {
            return true;
        }
        if idx < bytes.len() && bytes[idx] == b'=' {
            idx += 1;
            if idx < bytes.len() && bytes[idx] == b'"' {
                idx += 1;
                while idx < bytes.len() && bytes[idx] != b'"' {
                    idx += 1;
                }
            }
        }
        idx += 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(sanitize("Do the thing"), "Do the thing");
    }

    #[test]
    fn disallowed_elements_are_unwrapped() {
        assert_eq!(
            sanitize("<div><h1>Title</h1><b>bold</b></div>"),
            "Title<b>bold</b>"
        );
    }

    #[test]
    fn script_tags_never_survive() {
        let out = sanitize("Hi<script>alert(1)</script><img src=x onerror=alert(2)>");
        assert!(!out.to_ascii_lowercase().contains("<script"));
        assert!(!out.contains("onerror"));
        assert!(!out.contains("<img"));
    }

    #[test]
    fn anchors_gain_target_and_rel() {
        assert_eq!(
            sanitize("<a href=\"x\">link</a>"),
            "<a target=\"_blank\" href=\"x\" rel=\"noopener noreferrer\">link</a>"
        );
    }

    #[test]
    fn existing_target_is_kept_and_rel_overwritten() {
        let out = sanitize("<a href=\"x\" target=\"_self\" rel=\"opener\">link</a>");
        assert!(out.contains("target=\"_self\""));
        assert!(!out.contains("_blank"));
        assert!(out.contains("rel=\"noopener noreferrer\""));
        assert!(!out.contains("\"opener\""));
    }

    #[test]
    fn attributes_are_stripped_from_other_tags() {
        assert_eq!(
            sanitize("<span style=\"color:red\" class=\"x\">red</span>"),
            "<span>red</span>"
        );
    }

    #[test]
    fn sanitizing_twice_is_stable() {
        let inputs = [
            "<a href=\"https://example.com/?a=1&b=2\" title=\"t\">go</a> now",
            "<ul><li><a>bare</a></li></ul>",
            "<p>one<br>two</p><table><tr><td>x</td></tr></table>",
            "<a href='q\"<a >'>tricky</a>",
            "<p><button><p>x</p></button></p>",
            "<p><marquee><p>y</p></marquee></p>",
            "<ul><li><button><li>x</li></button></li></ul>",
            "<ul><li><li>x</li></li></ul>",
            "<a href=\"a\"><object><a href=\"b\">inner</a></object></a>",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "input: {}", input);
        }
    }

    #[test]
    fn plain_text_strips_markup_and_entities() {
        assert_eq!(
            plain_text("  <b>Read</b> the <a href=\"x\">HSE&nbsp;guide</a> "),
            "Read the HSE\u{a0}guide"
        );
        assert_eq!(plain_text("Tom &amp; Jerry"), "Tom & Jerry");
    }
}
