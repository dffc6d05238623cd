//! M3U playlist parsing.
//!
//! The format is consumed permissively: `#EXTINF` lines carry metadata
//! (display name after the last comma, optional `group-title="..."`
//! attribute), every following non-comment line is a playback URL for
//! that metadata.  Malformed input degrades to fewer entries, never to
//! an error.

use serde::{Deserialize, Serialize};

/// Display name used before the first `#EXTINF` line is seen.
pub const DEFAULT_NAME: &str = "Unknown";
/// Group label used before the first `#EXTINF` line is seen.
pub const DEFAULT_GROUP: &str = "Uncategorized";
/// Group label for `#EXTINF` lines without a `group-title` attribute.
pub const UNGROUPED: &str = "All";

/// One playable channel entry.  Immutable after parse; a reload
/// replaces the whole catalog rather than mutating entries.
///
/// `url` doubles as the navigation key — the engine locates "currently
/// playing" by URL equality, so two entries sharing a URL are
/// indistinguishable to zapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Sequential display id, assigned 1-based in emission order.
    pub id: String,
    pub name: String,
    pub group: String,
    pub url: String,
}

/// Parse M3U text into an ordered channel list.
///
/// Metadata is carried forward: a stray URL with no preceding
/// `#EXTINF` reuses the last-seen (or default) name/group, and an
/// `#EXTINF` with no URL before the next one emits nothing.
pub fn parse_m3u(content: &str) -> Vec<Channel> {
    let mut channels = Vec::new();
    let mut name = DEFAULT_NAME.to_string();
    let mut group = DEFAULT_GROUP.to_string();
    let mut counter = 1usize;

    for line in content.lines() {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix("#EXTINF") {
            // Name is everything after the last comma; a comma-less
            // line keeps the previous name.
            if let Some(comma) = rest.rfind(',') {
                name = rest[comma + 1..].trim().to_string();
            }
            group = extract_group_title(rest)
                .unwrap_or_else(|| UNGROUPED.to_string());
            continue;
        }

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        channels.push(Channel {
            id: counter.to_string(),
            name: name.clone(),
            group: group.clone(),
            url: line.to_string(),
        });
        counter += 1;
    }

    channels
}

/// Extract the quoted `group-title` attribute value, verbatim (no
/// unescaping).
fn extract_group_title(line: &str) -> Option<String> {
    let start = line.find("group-title=\"")?;
    let rest = &line[start + "group-title=\"".len()..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// Serialize a channel list back to M3U.  Re-parsing the output yields
/// the same catalog (ids, names, groups, urls, order).
pub fn to_m3u(channels: &[Channel]) -> String {
    let mut out = String::from("#EXTM3U\n");
    for ch in channels {
        out.push_str(&format!(
            "#EXTINF:-1 group-title=\"{}\",{}\n{}\n",
            ch.group, ch.name, ch.url
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let content = "#EXTINF:-1 group-title=\"News\",Channel A\nhttp://x/1\n#EXTINF:-1,Channel B\nhttp://x/2\n";
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 2);
        assert_eq!(
            channels[0],
            Channel {
                id: "1".into(),
                name: "Channel A".into(),
                group: "News".into(),
                url: "http://x/1".into(),
            }
        );
        assert_eq!(channels[1].id, "2");
        assert_eq!(channels[1].name, "Channel B");
        assert_eq!(channels[1].group, UNGROUPED);
        assert_eq!(channels[1].url, "http://x/2");
    }

    #[test]
    fn test_empty_and_markerless_input() {
        assert!(parse_m3u("").is_empty());
        assert!(parse_m3u("#EXTM3U\n# a comment\n").is_empty());
    }

    #[test]
    fn test_stray_url_uses_defaults() {
        let channels = parse_m3u("http://x/solo\n");
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, DEFAULT_NAME);
        assert_eq!(channels[0].group, DEFAULT_GROUP);
    }

    #[test]
    fn test_metadata_without_url_is_overwritten() {
        let content = "#EXTINF:-1,Skipped\n#EXTINF:-1,Kept\nhttp://x/1\n";
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "Kept");
    }

    #[test]
    fn test_one_metadata_many_urls() {
        // Multi-URL entries all inherit the most recent metadata.
        let content = "#EXTINF:-1 group-title=\"Mirrors\",Same\nhttp://a\nhttp://b\n";
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].name, "Same");
        assert_eq!(channels[1].name, "Same");
        assert_eq!(channels[1].id, "2");
    }

    #[test]
    fn test_comma_less_extinf_retains_previous_name() {
        let content = "#EXTINF:-1,First\nhttp://x/1\n#EXTINF:-1\nhttp://x/2\n";
        let channels = parse_m3u(content);
        assert_eq!(channels[1].name, "First");
        assert_eq!(channels[1].group, UNGROUPED);
    }

    #[test]
    fn test_group_title_taken_verbatim() {
        let content = "#EXTINF:-1 group-title=\"A &amp; B\",C\nhttp://x\n";
        assert_eq!(parse_m3u(content)[0].group, "A &amp; B");
    }

    #[test]
    fn test_reserialize_roundtrip() {
        let content = "#EXTINF:-1 group-title=\"News\",Channel A\nhttp://x/1\nhttp://x/1b\n#EXTINF:-1,Channel B\nhttp://x/2\n";
        let first = parse_m3u(content);
        let second = parse_m3u(&to_m3u(&first));
        assert_eq!(first, second);
    }
}
