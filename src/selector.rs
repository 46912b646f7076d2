use crate::extractor::{MediaMetadata, StreamFormat};

/// Quality/container constraints applied to the extractor's candidate list.
/// Fixed at deploy time.
#[derive(Debug, Clone, Copy)]
pub struct FormatPolicy {
    pub preferred_container: &'static str,
    pub max_height: Option<u32>,
}

impl FormatPolicy {
    /// The extractor-side fallback chain equivalent to this policy, used when
    /// the extractor performs its own best-download selection.
    pub fn download_selector(&self) -> String {
        let ext = self.preferred_container;
        match self.max_height {
            Some(limit) => format!("best[ext={ext}][height<={limit}]/best[ext={ext}]/best"),
            None => format!("best[ext={ext}]/best"),
        }
    }
}

#[derive(Debug)]
pub enum Selection<'a> {
    /// The extractor's own top-level resolved URL.
    Default(&'a str),
    /// A candidate picked from the format list.
    Candidate(&'a StreamFormat),
}

impl Selection<'_> {
    pub fn fetch_url(&self) -> Option<&str> {
        match self {
            Selection::Default(url) => Some(url),
            Selection::Candidate(format) => format.url.as_deref(),
        }
    }
}

/// Picks the single best candidate, or `None` when nothing is usable.
///
/// Candidates are scanned in reverse of the supplied order: the extractor
/// lists fresher/higher-quality variants later, so the last matching entry
/// wins. The first pass requires the preferred container and a present fetch
/// URL; the second pass drops the container requirement. With
/// `prefer_default` set (Direct-Link mode) a top-level resolved URL
/// short-circuits both passes.
pub fn select_format<'a>(
    metadata: &'a MediaMetadata,
    policy: &FormatPolicy,
    prefer_default: bool,
) -> Option<Selection<'a>> {
    if prefer_default && let Some(url) = metadata.default_url.as_deref() {
        return Some(Selection::Default(url));
    }

    let candidates = bounded_candidates(&metadata.formats, policy.max_height);

    candidates
        .iter()
        .rev()
        .find(|format| format.container == policy.preferred_container && format.url.is_some())
        .or_else(|| candidates.iter().rev().find(|format| format.url.is_some()))
        .copied()
        .map(Selection::Candidate)
}

/// Height-bounded view of the candidate list. Entries of unknown height pass
/// the bound; a bound that empties the list degrades to the unfiltered list
/// instead of failing outright.
fn bounded_candidates(formats: &[StreamFormat], max_height: Option<u32>) -> Vec<&StreamFormat> {
    let all: Vec<&StreamFormat> = formats.iter().collect();
    let Some(limit) = max_height else {
        return all;
    };

    let within: Vec<&StreamFormat> = all
        .iter()
        .copied()
        .filter(|format| format.height.is_none_or(|height| height <= limit))
        .collect();

    if within.is_empty() { all } else { within }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(container: &str, url: Option<&str>) -> StreamFormat {
        StreamFormat {
            container: container.to_string(),
            height: None,
            url: url.map(str::to_string),
        }
    }

    fn format_at(container: &str, height: u32, url: &str) -> StreamFormat {
        StreamFormat {
            container: container.to_string(),
            height: Some(height),
            url: Some(url.to_string()),
        }
    }

    fn metadata(formats: Vec<StreamFormat>) -> MediaMetadata {
        MediaMetadata {
            title: "Clip".to_string(),
            duration: 42,
            thumbnail: None,
            description: None,
            uploader: None,
            default_url: None,
            formats,
        }
    }

    const POLICY: FormatPolicy = FormatPolicy {
        preferred_container: "mp4",
        max_height: None,
    };

    #[test]
    fn picks_last_preferred_entry_with_url_skipping_urlless_ones() {
        let meta = metadata(vec![
            format("webm", Some("u1")),
            format("mp4", Some("u2")),
            format("mp4", None),
        ]);

        let selection = select_format(&meta, &POLICY, false).unwrap();
        assert_eq!(selection.fetch_url(), Some("u2"));
    }

    #[test]
    fn falls_back_to_last_entry_with_any_url() {
        let meta = metadata(vec![
            format("webm", Some("u1")),
            format("mp4", Some("u2")),
            format("mp4", None),
        ]);
        let policy = FormatPolicy {
            preferred_container: "avi",
            max_height: None,
        };

        let selection = select_format(&meta, &policy, false).unwrap();
        assert_eq!(selection.fetch_url(), Some("u2"));
    }

    #[test]
    fn later_match_beats_earlier_match() {
        let meta = metadata(vec![
            format("mp4", Some("old")),
            format("webm", Some("mid")),
            format("mp4", Some("fresh")),
        ]);

        let selection = select_format(&meta, &POLICY, false).unwrap();
        assert_eq!(selection.fetch_url(), Some("fresh"));
    }

    #[test]
    fn no_formats_and_no_default_is_no_candidate() {
        let meta = metadata(vec![]);
        assert!(select_format(&meta, &POLICY, false).is_none());
        assert!(select_format(&meta, &POLICY, true).is_none());
    }

    #[test]
    fn urlless_formats_only_is_no_candidate() {
        let meta = metadata(vec![format("mp4", None), format("webm", None)]);
        assert!(select_format(&meta, &POLICY, false).is_none());
    }

    #[test]
    fn default_url_short_circuits_in_direct_link_mode() {
        let mut meta = metadata(vec![format("mp4", Some("u2"))]);
        meta.default_url = Some("https://cdn.example.test/best.mp4".to_string());

        let selection = select_format(&meta, &POLICY, true).unwrap();
        assert_eq!(
            selection.fetch_url(),
            Some("https://cdn.example.test/best.mp4")
        );
    }

    #[test]
    fn default_url_is_ignored_without_prefer_default() {
        let mut meta = metadata(vec![format("mp4", Some("u2"))]);
        meta.default_url = Some("https://cdn.example.test/best.mp4".to_string());

        let selection = select_format(&meta, &POLICY, false).unwrap();
        assert_eq!(selection.fetch_url(), Some("u2"));
    }

    #[test]
    fn height_bound_filters_before_scanning() {
        let meta = metadata(vec![
            format_at("mp4", 480, "small"),
            format_at("mp4", 1080, "big"),
        ]);
        let policy = FormatPolicy {
            preferred_container: "mp4",
            max_height: Some(720),
        };

        let selection = select_format(&meta, &policy, false).unwrap();
        assert_eq!(selection.fetch_url(), Some("small"));
    }

    #[test]
    fn unknown_height_passes_the_bound() {
        let meta = metadata(vec![format_at("mp4", 1080, "big"), format("mp4", Some("u"))]);
        let policy = FormatPolicy {
            preferred_container: "mp4",
            max_height: Some(720),
        };

        let selection = select_format(&meta, &policy, false).unwrap();
        assert_eq!(selection.fetch_url(), Some("u"));
    }

    #[test]
    fn bound_that_empties_the_set_degrades_to_unfiltered() {
        let meta = metadata(vec![
            format_at("mp4", 1080, "big"),
            format_at("mp4", 2160, "bigger"),
        ]);
        let policy = FormatPolicy {
            preferred_container: "mp4",
            max_height: Some(720),
        };

        let selection = select_format(&meta, &policy, false).unwrap();
        assert_eq!(selection.fetch_url(), Some("bigger"));
    }

    #[test]
    fn download_selector_renders_the_fallback_chain() {
        let policy = FormatPolicy {
            preferred_container: "mp4",
            max_height: Some(720),
        };
        assert_eq!(
            policy.download_selector(),
            "best[ext=mp4][height<=720]/best[ext=mp4]/best"
        );

        assert_eq!(POLICY.download_selector(), "best[ext=mp4]/best");
    }
}
