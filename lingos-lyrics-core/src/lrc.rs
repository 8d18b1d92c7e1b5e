use crate::error::{CoreError, Result};

/// Timestamps closer than this (in milliseconds) belong to the same entry.
///
/// Lyric and translation files often disagree by a few milliseconds for the
/// same line.
pub const MERGE_TOLERANCE_MS: u64 = 3;

/// Maximum number of lines an entry holds: the original line and its translation.
pub const MAX_LINES_PER_ENTRY: usize = 2;

/// LRC metadata from ID tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LrcMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub author: Option<String>,
    pub offset: i64, // milliseconds, can be negative
}

/// One timestamped lyric line, optionally paired with its translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricEntry {
    pub start_millis: u64,
    /// `lines[0]` is the original line, `lines[1]` the translation if any
    pub lines: Vec<String>,
}

impl LyricEntry {
    #[must_use]
    pub fn new<I, S>(start_millis: u64, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            start_millis,
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// The original-language line, if present and non-empty
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        self.lines
            .first()
            .map(String::as_str)
            .filter(|line| !line.is_empty())
    }

    /// The secondary (translated) line
    #[must_use]
    pub fn translation(&self) -> Option<&str> {
        self.lines.get(1).map(String::as_str)
    }
}

/// All timed lyric entries for one song, sorted by start time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LyricTrack {
    pub metadata: LrcMetadata,
    pub entries: Vec<LyricEntry>,
}

impl LyricTrack {
    /// Wrap entries that are already sorted by `start_millis`
    #[must_use]
    pub fn new(entries: Vec<LyricEntry>) -> Self {
        Self {
            metadata: LrcMetadata::default(),
            entries,
        }
    }

    /// Parse LRC text into a track. Lines without a timestamp are ignored.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        Self::build(input.lines())
    }

    /// Parse LRC text, failing when it contains no timed lyric lines
    ///
    /// # Errors
    ///
    /// Returns `CoreError::LrcParseError` if no line carries a usable timestamp.
    pub fn parse_timed(input: &str) -> Result<Self> {
        let track = Self::parse(input);
        if track.is_empty() {
            return Err(CoreError::LrcParseError {
                reason: "no timed lyric lines".to_string(),
            });
        }
        Ok(track)
    }

    /// Build a track from raw lyric lines.
    ///
    /// Lines sharing a timestamp (within [`MERGE_TOLERANCE_MS`]) are merged into
    /// one entry, which is how translations get paired with their original line.
    pub fn build<I>(lines: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut track = Self::default();

        for raw in lines {
            let line = raw.as_ref().trim();
            if line.is_empty() {
                continue;
            }

            if let Some((tag, value)) = parse_id_tag(line) {
                match tag.to_lowercase().as_str() {
                    "ti" => track.metadata.title = Some(value),
                    "ar" => track.metadata.artist = Some(value),
                    "al" => track.metadata.album = Some(value),
                    "au" => track.metadata.author = Some(value),
                    "offset" => {
                        if let Ok(offset) = value.parse::<i64>() {
                            track.metadata.offset = offset;
                        }
                    }
                    _ => {} // Ignore unknown tags
                }
                continue;
            }

            let Some((timestamps, text)) = split_timestamps(line) else {
                continue;
            };

            if text.is_empty() || text == "//" {
                continue;
            }

            for start_millis in timestamps {
                track.insert(start_millis, text);
            }
        }

        if track.metadata.offset != 0 {
            let offset = track.metadata.offset;
            for entry in &mut track.entries {
                entry.start_millis = apply_offset(entry.start_millis, offset);
            }
        }

        track
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entry(&self, index: usize) -> Option<&LyricEntry> {
        self.entries.get(index)
    }

    /// Find the active entry index for a playback position.
    ///
    /// Positions at or past the last entry resolve to the last entry. When the
    /// search misses (unsorted entries, or a position before the first entry)
    /// the first entry is returned.
    #[must_use]
    pub fn active_index(&self, position_ms: u64) -> Option<usize> {
        let last = self.entries.len().checked_sub(1)?;
        if position_ms >= self.entries[last].start_millis {
            return Some(last);
        }

        let mut low = 0;
        let mut high = last;
        while low <= high {
            let mid = low + (high - low) / 2;
            if mid == high {
                return Some(mid);
            }

            let start = self.entries[mid].start_millis;
            let next_start = self.entries[mid + 1].start_millis;
            if (start..next_start).contains(&position_ms) {
                return Some(mid);
            }

            if position_ms < start {
                if mid == 0 {
                    break;
                }
                high = mid - 1;
            } else {
                low = mid + 1;
            }
        }

        Some(0)
    }

    /// The next non-empty original line after `index`.
    ///
    /// Entries without an original line are skipped rather than reported.
    #[must_use]
    pub fn next_primary_after(&self, index: usize) -> Option<&str> {
        self.entries
            .iter()
            .skip(index.saturating_add(1))
            .find_map(LyricEntry::primary)
    }

    /// Serialize back to LRC text. Offsets are already applied to the entries.
    #[must_use]
    pub fn to_lrc(&self) -> String {
        use std::fmt::Write;

        let mut output = String::new();

        if let Some(ref title) = self.metadata.title {
            let _ = writeln!(output, "[ti:{title}]");
        }
        if let Some(ref artist) = self.metadata.artist {
            let _ = writeln!(output, "[ar:{artist}]");
        }
        if let Some(ref album) = self.metadata.album {
            let _ = writeln!(output, "[al:{album}]");
        }
        if let Some(ref author) = self.metadata.author {
            let _ = writeln!(output, "[au:{author}]");
        }

        for entry in &self.entries {
            let timestamp = format_timestamp(entry.start_millis);
            for line in &entry.lines {
                let _ = writeln!(output, "[{timestamp}]{line}");
            }
        }

        output
    }

    /// Insert a line, merging with an entry whose timestamp is within tolerance
    fn insert(&mut self, start_millis: u64, text: &str) {
        match self.find_near(start_millis) {
            Ok(index) => {
                let entry = &mut self.entries[index];
                // Some files reuse the first lyric's timestamp for a credits line
                if entry.lines.len() >= MAX_LINES_PER_ENTRY {
                    entry.lines.clear();
                }
                entry.lines.push(text.to_string());
            }
            Err(position) => {
                self.entries
                    .insert(position, LyricEntry::new(start_millis, [text]));
            }
        }
    }

    /// Binary search for an entry within tolerance; `Err` holds the insertion point
    fn find_near(&self, millis: u64) -> std::result::Result<usize, usize> {
        let mut low = 0;
        let mut high = self.entries.len();

        while low < high {
            let mid = low + (high - low) / 2;
            let start = self.entries[mid].start_millis;
            if start.abs_diff(millis) <= MERGE_TOLERANCE_MS {
                return Ok(mid);
            }
            if millis < start {
                high = mid;
            } else {
                low = mid + 1;
            }
        }

        Err(low)
    }
}

/// Parse an ID tag like [ti:Title] or [offset:500]
fn parse_id_tag(line: &str) -> Option<(String, String)> {
    let content = line.strip_prefix('[')?;
    let end = content.find(']')?;
    let (tag, value) = content[..end].split_once(':')?;

    if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    Some((tag.to_string(), value.trim().to_string()))
}

/// Split leading timestamp tags off a line: `[00:05.00][00:15.00]text`
fn split_timestamps(line: &str) -> Option<(Vec<u64>, &str)> {
    let mut remaining = line;
    let mut timestamps = Vec::new();

    while let Some(rest) = remaining.strip_prefix('[') {
        let Some(end) = rest.find(']') else {
            break;
        };
        let Some(millis) = parse_timestamp(&rest[..end]) else {
            break;
        };
        timestamps.push(millis);
        remaining = &rest[end + 1..];
    }

    if timestamps.is_empty() {
        return None;
    }

    Some((timestamps, remaining.trim()))
}

/// Parse `mm:ss.cc`, `mm:ss:cc`, `mm:ss.mmm` or `mm:ss` into milliseconds
fn parse_timestamp(s: &str) -> Option<u64> {
    let (minutes, rest) = s.trim().split_once(':')?;

    let (seconds, fraction) = match rest.find(|c: char| c == '.' || c == ':') {
        Some(i) => (&rest[..i], Some(&rest[i + 1..])),
        None => (rest, None),
    };

    let minutes = parse_digits(minutes)?;
    let seconds = parse_digits(seconds)?;
    let fraction_ms = match fraction {
        Some(fraction) => parse_fraction_ms(fraction)?,
        None => 0,
    };

    minutes
        .checked_mul(60_000)?
        .checked_add(seconds.checked_mul(1000)?)?
        .checked_add(fraction_ms)
}

fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Fractional seconds: one digit is tenths, two are centiseconds, three or more milliseconds
fn parse_fraction_ms(s: &str) -> Option<u64> {
    let value = parse_digits(s)?;
    match s.len() {
        1 => Some(value * 100),
        2 => Some(value * 10),
        3 => Some(value),
        _ => parse_digits(&s[..3]),
    }
}

/// Format milliseconds as an LRC timestamp, keeping millisecond precision when needed
fn format_timestamp(millis: u64) -> String {
    let minutes = millis / 60_000;
    let seconds = (millis % 60_000) / 1000;
    let fraction = millis % 1000;

    if fraction % 10 == 0 {
        format!("{minutes:02}:{seconds:02}.{:02}", fraction / 10)
    } else {
        format!("{minutes:02}:{seconds:02}.{fraction:03}")
    }
}

/// Apply a millisecond offset (can be negative), saturating at zero
const fn apply_offset(millis: u64, offset_ms: i64) -> u64 {
    if offset_ms >= 0 {
        millis.saturating_add(offset_ms.unsigned_abs())
    } else {
        millis.saturating_sub(offset_ms.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_track() -> LyricTrack {
        LyricTrack::new(vec![
            LyricEntry::new(0, ["A"]),
            LyricEntry::new(5000, ["B"]),
            LyricEntry::new(10000, ["C"]),
        ])
    }

    #[test]
    fn test_parse_simple_line() {
        let track = LyricTrack::parse("[00:12.34]Hello world");
        assert_eq!(track.len(), 1);
        assert_eq!(track.entries[0].start_millis, 12340);
        assert_eq!(track.entries[0].lines, vec!["Hello world"]);
    }

    #[test]
    fn test_timestamp_arithmetic() {
        let track = LyricTrack::parse("[02:03.45]line");
        assert_eq!(track.entries[0].start_millis, 2 * 60_000 + 3 * 1000 + 450);
    }

    #[test]
    fn test_skips_empty_and_slash_lines() {
        let input = "[00:01.00]\n[00:02.00]//\n[00:03.00]   \n[00:04.00]kept";
        let track = LyricTrack::parse(input);
        assert_eq!(track.len(), 1);
        assert_eq!(track.entries[0].start_millis, 4000);
    }

    #[test]
    fn test_lines_without_timestamp_ignored() {
        let track = LyricTrack::parse("plain text\n[00:01.00]timed");
        assert_eq!(track.len(), 1);
        assert_eq!(track.entries[0].lines, vec!["timed"]);
    }

    #[test]
    fn test_merge_within_tolerance() {
        let track = LyricTrack::build(["[00:01.00]original", "[00:01.002]translation"]);
        assert_eq!(track.len(), 1);
        assert_eq!(track.entries[0].lines, vec!["original", "translation"]);
    }

    #[test]
    fn test_no_merge_outside_tolerance() {
        let track = LyricTrack::build(["[00:01.00]first", "[00:01.01]second"]);
        assert_eq!(track.len(), 2);
        assert_eq!(track.entries[0].start_millis, 1000);
        assert_eq!(track.entries[1].start_millis, 1010);
    }

    #[test]
    fn test_translation_block_pairs_with_lyrics() {
        // Lyrics and translations arrive as two consecutive blocks
        let lines = [
            "[00:01.00]one",
            "[00:02.00]two",
            "[00:03.00]three",
            "[00:01.00]uno",
            "[00:02.00]dos",
            "[00:03.00]tres",
        ];
        let track = LyricTrack::build(lines);
        assert_eq!(track.len(), 3);
        assert_eq!(track.entries[1].lines, vec!["two", "dos"]);
        assert_eq!(track.entries[2].translation(), Some("tres"));
    }

    #[test]
    fn test_third_line_replaces_full_entry() {
        let lines = [
            "[00:00.00]Song - Singer",
            "[00:00.00]first lyric",
            "[00:00.00]first translation",
        ];
        let track = LyricTrack::build(lines);
        assert_eq!(track.len(), 1);
        assert_eq!(track.entries[0].lines, vec!["first translation"]);
    }

    #[test]
    fn test_out_of_order_lines_inserted_sorted() {
        let track = LyricTrack::build(["[00:10.00]c", "[00:00.00]a", "[00:05.00]b"]);
        let starts: Vec<_> = track.entries.iter().map(|e| e.start_millis).collect();
        assert_eq!(starts, vec![0, 5000, 10000]);
    }

    #[test]
    fn test_parse_id_tags() {
        let input = r#"
[ti:Song Title]
[ar:Artist Name]
[al:Album Name]
[00:05.00]Lyrics here
"#;
        let track = LyricTrack::parse(input);
        assert_eq!(track.metadata.title.as_deref(), Some("Song Title"));
        assert_eq!(track.metadata.artist.as_deref(), Some("Artist Name"));
        assert_eq!(track.metadata.album.as_deref(), Some("Album Name"));
        assert_eq!(track.len(), 1);
    }

    #[test]
    fn test_parse_offset() {
        let track = LyricTrack::parse("[offset:500]\n[00:10.00]Test");
        assert_eq!(track.entries[0].start_millis, 10500);

        let track = LyricTrack::parse("[offset:-500]\n[00:10.00]Test");
        assert_eq!(track.entries[0].start_millis, 9500);
    }

    #[test]
    fn test_parse_multi_timestamp_line() {
        let track = LyricTrack::parse("[00:05.00][00:15.00]Repeated lyric");
        assert_eq!(track.len(), 2);
        assert_eq!(track.entries[0].start_millis, 5000);
        assert_eq!(track.entries[1].start_millis, 15000);
        assert_eq!(track.entries[1].lines, vec!["Repeated lyric"]);
    }

    #[test]
    fn test_alternative_timestamp_formats() {
        assert_eq!(parse_timestamp("00:12:34"), Some(12340));
        assert_eq!(parse_timestamp("00:12.345"), Some(12345));
        assert_eq!(parse_timestamp("01:02"), Some(62000));
        assert_eq!(parse_timestamp("00:12.5"), Some(12500));
        assert_eq!(parse_timestamp("ab:12.00"), None);
        assert_eq!(parse_timestamp("00:12."), None);
    }

    #[test]
    fn test_parse_timed_rejects_untimed_text() {
        assert!(LyricTrack::parse_timed("[ti:Only tags]\nno timestamps").is_err());
        assert!(LyricTrack::parse_timed("[00:01.00]ok").is_ok());
    }

    #[test]
    fn test_active_index_empty_track() {
        assert_eq!(LyricTrack::default().active_index(1234), None);
    }

    #[test]
    fn test_active_index_sequence() {
        let track = sample_track();
        let indices: Vec<_> = [0, 4999, 5000, 12000]
            .into_iter()
            .map(|p| track.active_index(p))
            .collect();
        assert_eq!(indices, vec![Some(0), Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn test_active_index_at_and_after_last() {
        let track = sample_track();
        assert_eq!(track.active_index(10000), Some(2));
        assert_eq!(track.active_index(u64::MAX), Some(2));
    }

    #[test]
    fn test_active_index_before_first_entry_falls_back_to_zero() {
        let track = LyricTrack::new(vec![
            LyricEntry::new(3000, ["a"]),
            LyricEntry::new(6000, ["b"]),
            LyricEntry::new(9000, ["c"]),
            LyricEntry::new(12000, ["d"]),
        ]);
        assert_eq!(track.active_index(1000), Some(0));
    }

    #[test]
    fn test_active_index_unsorted_input_terminates() {
        let track = LyricTrack::new(vec![
            LyricEntry::new(9000, ["a"]),
            LyricEntry::new(1000, ["b"]),
            LyricEntry::new(5000, ["c"]),
            LyricEntry::new(20000, ["d"]),
        ]);
        let index = track.active_index(7000);
        assert!(index.is_some());
    }

    #[test]
    fn test_next_primary_skips_entries_without_original_line() {
        let track = LyricTrack::new(vec![
            LyricEntry::new(0, ["first"]),
            LyricEntry::new(1000, Vec::<String>::new()),
            LyricEntry::new(2000, ["", "translation only"]),
            LyricEntry::new(3000, ["fourth"]),
        ]);
        assert_eq!(track.next_primary_after(0), Some("fourth"));
        assert_eq!(track.next_primary_after(3), None);
    }

    #[test]
    fn test_to_lrc_round_trip() {
        let input = r#"
[ti:Title]
[00:01.00]one
[00:01.00]uno
[00:02.345]two
"#;
        let track = LyricTrack::parse(input);
        let reparsed = LyricTrack::parse(&track.to_lrc());
        assert_eq!(reparsed, track);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(12340), "00:12.34");
        assert_eq!(format_timestamp(90_000), "01:30.00");
        assert_eq!(format_timestamp(2345), "00:02.345");
    }

    proptest! {
        #[test]
        fn active_index_brackets_position(
            starts in proptest::collection::btree_set(0u64..600_000, 1..64),
            offset in 0u64..700_000,
        ) {
            let starts: Vec<u64> = starts.into_iter().collect();
            let track = LyricTrack::new(
                starts.iter().map(|&start| LyricEntry::new(start, ["x"])).collect(),
            );
            let position = starts[0] + offset;
            let index = track.active_index(position).unwrap();

            prop_assert!(track.entries[index].start_millis <= position);
            prop_assert!(
                index == starts.len() - 1 || position < track.entries[index + 1].start_millis
            );
        }

        #[test]
        fn build_keeps_entries_sorted(millis in proptest::collection::vec(0u64..100_000, 0..48)) {
            let lines: Vec<String> = millis
                .iter()
                .map(|ms| format!("[{}]line", format_timestamp(*ms)))
                .collect();
            let track = LyricTrack::build(&lines);

            prop_assert!(track.entries.windows(2).all(|w| w[0].start_millis < w[1].start_millis));
            prop_assert!(track.entries.iter().all(|e| e.lines.len() <= MAX_LINES_PER_ENTRY));
        }
    }
}
