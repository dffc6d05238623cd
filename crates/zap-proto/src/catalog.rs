//! Channel catalog: the full ordered channel list plus its derived
//! views.
//!
//! Two derived views exist and are mutually exclusive:
//! - group browsing: the sub-list of the selected group, groups in
//!   first-appearance order;
//! - search: a flat, case-insensitive substring filter on channel
//!   names across the whole catalog.
//!
//! Navigation (zap, numeric entry) always runs over the **full**
//! catalog, never the view.

use crate::playlist::Channel;

/// Which of the two browsing views is active.  A tagged variant rather
/// than two flags, so "searching with a group filter" cannot be
/// expressed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Grouped,
    /// Non-empty search query.
    Filtered(String),
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    channels: Vec<Channel>,
    /// Group label → indices into `channels`, in first-appearance
    /// order of the label.  Recomputed on every catalog replacement.
    groups: Vec<(String, Vec<usize>)>,
    mode: ViewMode,
    selected_group: Option<String>,
}

impl Catalog {
    /// Replace the catalog wholesale (playlist reload).  Clears any
    /// active search; keeps the selected group unless the new catalog
    /// no longer contains it.
    pub fn set_channels(&mut self, channels: Vec<Channel>) {
        self.channels = channels;
        self.groups = partition_groups(&self.channels);
        self.mode = ViewMode::Grouped;
        if let Some(sel) = &self.selected_group {
            if !self.groups.iter().any(|(g, _)| g == sel) {
                self.selected_group = None;
            }
        }
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    // ── view mode ─────────────────────────────────────────────────────────────

    /// Set the search query.  Empty switches back to group browsing.
    pub fn set_query(&mut self, query: &str) {
        self.mode = if query.is_empty() {
            ViewMode::Grouped
        } else {
            ViewMode::Filtered(query.to_string())
        };
    }

    pub fn query(&self) -> Option<&str> {
        match &self.mode {
            ViewMode::Grouped => None,
            ViewMode::Filtered(q) => Some(q),
        }
    }

    pub fn is_searching(&self) -> bool {
        matches!(self.mode, ViewMode::Filtered(_))
    }

    // ── groups ────────────────────────────────────────────────────────────────

    pub fn groups(&self) -> &[(String, Vec<usize>)] {
        &self.groups
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(g, _)| g.as_str())
    }

    pub fn selected_group(&self) -> Option<&str> {
        self.selected_group.as_deref()
    }

    pub fn select_group(&mut self, name: &str) {
        if self.groups.iter().any(|(g, _)| g == name) {
            self.selected_group = Some(name.to_string());
        }
    }

    /// Startup group selection: if none is selected yet, prefer the
    /// group whose trimmed label equals `preferred` case-insensitively,
    /// else the first group in partition order.
    pub fn ensure_group_selected(&mut self, preferred: &str) {
        if self.selected_group.is_some() || self.groups.is_empty() {
            return;
        }
        let preferred = self
            .groups
            .iter()
            .find(|(g, _)| g.trim().eq_ignore_ascii_case(preferred.trim()))
            .or_else(|| self.groups.first())
            .map(|(g, _)| g.clone());
        self.selected_group = preferred;
    }

    // ── views ─────────────────────────────────────────────────────────────────

    /// The channels the menu shows right now: the flat filtered view
    /// while searching, else the selected group's sub-list.
    pub fn visible(&self) -> Vec<&Channel> {
        match &self.mode {
            ViewMode::Filtered(q) => {
                let needle = q.to_lowercase();
                self.channels
                    .iter()
                    .filter(|c| c.name.to_lowercase().contains(&needle))
                    .collect()
            }
            ViewMode::Grouped => match &self.selected_group {
                Some(sel) => self
                    .groups
                    .iter()
                    .find(|(g, _)| g == sel)
                    .map(|(_, idxs)| idxs.iter().map(|&i| &self.channels[i]).collect())
                    .unwrap_or_default(),
                None => Vec::new(),
            },
        }
    }

    /// Index of `url` within the current visible view, for
    /// scroll-to-selection.  Not-found is a valid answer.
    pub fn position_in_visible(&self, url: &str) -> Option<usize> {
        self.visible().iter().position(|c| c.url == url)
    }

    // ── navigation over the full catalog ──────────────────────────────────────

    pub fn find_by_url(&self, url: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.url == url)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id.trim() == id.trim())
    }

    fn position_of(&self, url: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.url == url)
    }

    /// Successor of the channel at `current_url` in full-catalog order,
    /// wrapping at the end.  An unknown (or absent) current URL starts
    /// from the top.
    pub fn zap_next(&self, current_url: Option<&str>) -> Option<&Channel> {
        if self.channels.is_empty() {
            return None;
        }
        let idx = match current_url.and_then(|u| self.position_of(u)) {
            Some(i) if i + 1 < self.channels.len() => i + 1,
            Some(_) => 0,
            None => 0,
        };
        Some(&self.channels[idx])
    }

    /// Predecessor with wraparound; an unknown current URL lands on the
    /// last channel.
    pub fn zap_prev(&self, current_url: Option<&str>) -> Option<&Channel> {
        if self.channels.is_empty() {
            return None;
        }
        let idx = match current_url.and_then(|u| self.position_of(u)) {
            Some(0) | None => self.channels.len() - 1,
            Some(i) => i - 1,
        };
        Some(&self.channels[idx])
    }

    /// Interpret a digit buffer as a 1-based index into the full
    /// catalog.  Zero, junk, or out-of-range resolves to nothing.
    pub fn resolve_number(&self, buffer: &str) -> Option<&Channel> {
        let n: usize = buffer.parse().ok()?;
        if n == 0 || n > self.channels.len() {
            return None;
        }
        Some(&self.channels[n - 1])
    }
}

fn partition_groups(channels: &[Channel]) -> Vec<(String, Vec<usize>)> {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (i, ch) in channels.iter().enumerate() {
        match groups.iter_mut().find(|(g, _)| *g == ch.group) {
            Some((_, idxs)) => idxs.push(i),
            None => groups.push((ch.group.clone(), vec![i])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(id: usize, name: &str, group: &str) -> Channel {
        Channel {
            id: id.to_string(),
            name: name.into(),
            group: group.into(),
            url: format!("http://x/{id}"),
        }
    }

    fn catalog() -> Catalog {
        let mut c = Catalog::default();
        c.set_channels(vec![
            ch(1, "News One", "News"),
            ch(2, "Movie Max", "Movies"),
            ch(3, "News Two", "News"),
            ch(4, "Kids Fun", "Kids"),
        ]);
        c
    }

    #[test]
    fn test_partition_first_appearance_order() {
        let c = catalog();
        let names: Vec<&str> = c.group_names().collect();
        assert_eq!(names, ["News", "Movies", "Kids"]);

        // Re-setting the same channels yields the same order.
        let mut c2 = catalog();
        c2.set_channels(catalog().channels().to_vec());
        let names2: Vec<&str> = c2.group_names().collect();
        assert_eq!(names, names2);
    }

    #[test]
    fn test_filtered_view_is_order_preserving_subsequence() {
        let mut c = catalog();
        c.set_query("news");
        let v: Vec<&str> = c.visible().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(v, ["News One", "News Two"]);

        c.set_query("zzz");
        assert!(c.visible().is_empty());

        // Empty query goes back to group browsing, not a flat list.
        c.set_query("");
        assert!(!c.is_searching());
    }

    #[test]
    fn test_grouped_view_uses_selected_group() {
        let mut c = catalog();
        c.select_group("News");
        let v: Vec<&str> = c.visible().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(v, ["1", "3"]);
    }

    #[test]
    fn test_selecting_unknown_group_is_ignored() {
        let mut c = catalog();
        c.select_group("Nope");
        assert_eq!(c.selected_group(), None);
    }

    #[test]
    fn test_ensure_group_selected_prefers_label() {
        let mut c = catalog();
        c.ensure_group_selected(" movies ");
        assert_eq!(c.selected_group(), Some("Movies"));

        let mut c = catalog();
        c.ensure_group_selected("Sports");
        assert_eq!(c.selected_group(), Some("News"));
    }

    #[test]
    fn test_reload_keeps_valid_group_drops_missing() {
        let mut c = catalog();
        c.select_group("Kids");
        c.set_channels(vec![ch(1, "A", "Kids")]);
        assert_eq!(c.selected_group(), Some("Kids"));

        c.set_channels(vec![ch(1, "A", "Other")]);
        assert_eq!(c.selected_group(), None);
    }

    #[test]
    fn test_zap_wraparound_cycle() {
        let c = catalog();
        // N applications of zap_next return to the start.
        let mut url = c.channels()[1].url.clone();
        let start = url.clone();
        for _ in 0..c.len() {
            url = c.zap_next(Some(&url)).unwrap().url.clone();
        }
        assert_eq!(url, start);
    }

    #[test]
    fn test_zap_prev_inverts_next() {
        let c = catalog();
        for ch in c.channels() {
            let next = c.zap_next(Some(&ch.url)).unwrap().url.clone();
            let back = c.zap_prev(Some(&next)).unwrap();
            assert_eq!(back.url, ch.url);
        }
    }

    #[test]
    fn test_zap_from_unknown_url() {
        let c = catalog();
        assert_eq!(c.zap_next(Some("http://gone")).unwrap().id, "1");
        assert_eq!(c.zap_prev(Some("http://gone")).unwrap().id, "4");
        assert_eq!(c.zap_next(None).unwrap().id, "1");
    }

    #[test]
    fn test_zap_empty_catalog_is_noop() {
        let c = Catalog::default();
        assert!(c.zap_next(None).is_none());
        assert!(c.zap_prev(Some("http://x/1")).is_none());
    }

    #[test]
    fn test_resolve_number() {
        let c = catalog();
        assert_eq!(c.resolve_number("2").unwrap().id, "2");
        assert!(c.resolve_number("0").is_none());
        assert!(c.resolve_number("").is_none());
        assert!(c.resolve_number("5").is_none());
        assert!(c.resolve_number("-1").is_none());
        assert!(c.resolve_number("12abc").is_none());
    }

    #[test]
    fn test_position_in_visible_tolerates_absence() {
        let mut c = catalog();
        c.select_group("News");
        assert_eq!(c.position_in_visible("http://x/3"), Some(1));
        // Channel 2 is in Movies, not the visible News list.
        assert_eq!(c.position_in_visible("http://x/2"), None);

        c.set_query("kids");
        assert_eq!(c.position_in_visible("http://x/4"), Some(0));
    }
}
