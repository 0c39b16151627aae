use serde_json::{Map, Value};
use tracing::warn;

use pulsepoint_common::{ExtraPayload, NormalizedItem};

/// Convert one raw item from `source` into the canonical result shape.
///
/// Field mapping is source-specific with a documented generic probe order
/// for unrecognized sources (`snippet` → `description` → `abstract` for body
/// text, `url` → `link` for the URL). Absent fields become empty strings.
/// Returns `None` for items that are not objects; those are skipped with a
/// warning, never fatal.
pub fn normalize(source: &str, raw: &Value) -> Option<NormalizedItem> {
    let Some(obj) = raw.as_object() else {
        warn!(source, "Skipping malformed item (not an object)");
        return None;
    };

    let (title, snippet, url) = match source {
        "wikipedia" => (field(obj, "title"), field(obj, "summary"), field(obj, "url")),
        "news_everything" | "news_top_headlines" => (
            field(obj, "title"),
            field(obj, "description"),
            field(obj, "url"),
        ),
        "web_search" => (field(obj, "title"), field(obj, "snippet"), field(obj, "link")),
        "semantic_scholar" => (
            field(obj, "title"),
            field(obj, "abstract"),
            field(obj, "url"),
        ),
        "wolfram_alpha" => (field(obj, "title"), field(obj, "snippet"), String::new()),
        _ => (
            field(obj, "title"),
            probe(obj, &["snippet", "description", "abstract"]),
            probe(obj, &["url", "link"]),
        ),
    };

    Some(NormalizedItem {
        title,
        snippet,
        url,
        extra: extra_payload(obj),
    })
}

fn field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn probe(obj: &Map<String, Value>, keys: &[&str]) -> String {
    for key in keys {
        if let Some(value) = obj.get(*key).and_then(Value::as_str) {
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    String::new()
}

/// Pull structured extras out of a raw item: geocoordinates if present,
/// otherwise a theme list.
fn extra_payload(obj: &Map<String, Value>) -> Option<ExtraPayload> {
    let coord = |keys: [&str; 2]| {
        keys.iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_f64))
    };
    if let (Some(lat), Some(lng)) = (coord(["lat", "latitude"]), coord(["lng", "longitude"])) {
        return Some(ExtraPayload::Geo { lat, lng });
    }

    let themes: Vec<String> = obj
        .get("themes")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if !themes.is_empty() {
        return Some(ExtraPayload::Themes { themes });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wikipedia_mapping() {
        let raw = json!({"title": "Rust", "summary": "A language.", "url": "https://w/Rust"});
        let item = normalize("wikipedia", &raw).unwrap();
        assert_eq!(item.title, "Rust");
        assert_eq!(item.snippet, "A language.");
        assert_eq!(item.url, "https://w/Rust");
    }

    #[test]
    fn news_mapping_uses_description() {
        let raw = json!({"title": "t", "description": "d", "url": "u", "publishedAt": "x"});
        let item = normalize("news_everything", &raw).unwrap();
        assert_eq!(item.snippet, "d");
        let item = normalize("news_top_headlines", &raw).unwrap();
        assert_eq!(item.snippet, "d");
    }

    #[test]
    fn web_search_mapping_uses_link() {
        let raw = json!({"title": "t", "snippet": "s", "link": "https://example.com"});
        let item = normalize("web_search", &raw).unwrap();
        assert_eq!(item.url, "https://example.com");
    }

    #[test]
    fn wolfram_has_no_url() {
        let raw = json!({"title": "Result", "snippet": "42", "url": "ignored"});
        let item = normalize("wolfram_alpha", &raw).unwrap();
        assert_eq!(item.url, "");
        assert_eq!(item.snippet, "42");
    }

    #[test]
    fn unknown_source_probes_generic_fields() {
        let raw = json!({"title": "t", "abstract": "body", "link": "l"});
        let item = normalize("mystery_source", &raw).unwrap();
        assert_eq!(item.snippet, "body");
        assert_eq!(item.url, "l");

        // snippet takes priority over abstract
        let raw = json!({"snippet": "s", "abstract": "a"});
        let item = normalize("mystery_source", &raw).unwrap();
        assert_eq!(item.snippet, "s");
    }

    #[test]
    fn missing_fields_become_empty_strings() {
        let item = normalize("wikipedia", &json!({})).unwrap();
        assert_eq!(item.title, "");
        assert_eq!(item.snippet, "");
        assert_eq!(item.url, "");
        assert!(item.extra.is_none());
    }

    #[test]
    fn non_object_items_are_skipped() {
        assert!(normalize("wikipedia", &json!("just a string")).is_none());
        assert!(normalize("wikipedia", &json!(42)).is_none());
        assert!(normalize("wikipedia", &json!(null)).is_none());
    }

    #[test]
    fn geo_extra_is_extracted() {
        let raw = json!({"title": "place", "latitude": 51.5, "longitude": -0.1});
        let item = normalize("mystery_source", &raw).unwrap();
        assert_eq!(
            item.extra,
            Some(ExtraPayload::Geo { lat: 51.5, lng: -0.1 })
        );
    }

    #[test]
    fn themes_extra_is_extracted() {
        let raw = json!({"title": "t", "themes": ["a", "b"]});
        let item = normalize("mystery_source", &raw).unwrap();
        assert_eq!(
            item.extra,
            Some(ExtraPayload::Themes { themes: vec!["a".to_string(), "b".to_string()] })
        );
    }
}
