//! # Lexer
//!
//! Turns one raw lyric track into timed entries. This is the first stage of
//! the parse pipeline; it never fails, anything it cannot read is dropped.
//!
//! ## Grammars
//!
//! ### Time tag
//! `[` `min:`? `sec` (`.` | `:` `fraction`)? `]`, all parts decimal digits.
//! The fraction is a decimal fraction of a second: `.1` = 100 ms, `.19` =
//! 190 ms, `.881` = 881 ms. Digits past milliseconds are truncated.
//!
//! ### Plain track
//! ```text
//! [00:14.881][01:20.000]same text for both timestamps
//! [00:18.619]next line
//! ```
//! Every leading tag yields one entry carrying the text after the last tag.
//! When no line of a non-blank track carries a tag the track is unsynced and
//! every non-blank line becomes an entry at time 0.
//!
//! ### Word-level track
//! ```text
//! [00:22.190]<0,190>你<190,196>微<387,199>笑
//! [00:27.104]<27104,199>I <27303,233>see
//! ```
//! One leading tag anchors the line, followed by `<start,duration>word`
//! tokens. Token starts may be absolute or relative to the anchor: a line
//! whose first start lies closer to zero than to the anchor is relative.

use crate::model::Word;

/// One timestamped line of a plain track
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEntry {
    pub time: i64,
    pub text: String,
}

/// A tokenized plain track
#[derive(Debug, Clone, PartialEq)]
pub struct PlainTrack {
    /// False when no line carried a time tag
    pub synced: bool,
    pub entries: Vec<TimedEntry>,
}

impl PlainTrack {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A tokenized word-level line
#[derive(Debug, Clone, PartialEq)]
pub struct WordLine {
    /// Anchor time from the leading tag
    pub time: i64,
    pub words: Vec<Word>,
}

impl WordLine {
    pub fn duration(&self) -> i64 {
        self.words
            .iter()
            .fold(0, |total: i64, w| total.saturating_add(w.duration))
    }

    pub fn text(&self) -> String {
        self.words.iter().map(|w| w.text.as_str()).collect()
    }
}

/// Byte cursor over a single physical line
struct Scanner<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.position += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn eat_any(&mut self, options: &[char]) -> bool {
        options.iter().any(|&c| self.eat(c))
    }

    fn digits(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let len = rest.bytes().take_while(u8::is_ascii_digit).count();
        if len == 0 {
            return None;
        }
        self.position += len;
        Some(&rest[..len])
    }

    /// Text up to (not including) the next `<`
    fn until_token(&mut self) -> &'a str {
        let rest = self.rest();
        let len = rest.find('<').unwrap_or(rest.len());
        self.position += len;
        &rest[..len]
    }
}

fn number(digits: &str) -> i64 {
    digits.parse().unwrap_or(0)
}

/// Milliseconds encoded by the fraction digits after the seconds separator
fn fraction_ms(digits: &str) -> i64 {
    let mut ms = 0;
    let mut scale = 100;
    for b in digits.bytes().take(3) {
        ms += i64::from(b - b'0') * scale;
        scale /= 10;
    }
    ms
}

/// Parse a time tag at the start of `input`.
///
/// Returns the time in ms and the number of bytes consumed.
///
/// # Example
/// ```
/// use lyric_sync::lexer::parse_time_tag;
///
/// assert_eq!(parse_time_tag("[00:14.881]text"), Some((14_881, 11)));
/// assert_eq!(parse_time_tag("[01:02.5]"), Some((62_500, 9)));
/// assert_eq!(parse_time_tag("[ar:Someone]"), None);
/// ```
pub fn parse_time_tag(input: &str) -> Option<(i64, usize)> {
    let mut s = Scanner::new(input);
    if !s.eat('[') {
        return None;
    }
    let first = s.digits()?;

    let (minutes, seconds, fraction) = if s.eat(':') {
        let seconds = s.digits()?;
        let fraction = if s.eat_any(&['.', ':']) {
            Some(s.digits()?)
        } else {
            None
        };
        (number(first), number(seconds), fraction)
    } else if s.eat('.') {
        (0, number(first), Some(s.digits()?))
    } else {
        (0, number(first), None)
    };

    if !s.eat(']') {
        return None;
    }

    let ms = minutes
        .saturating_mul(60_000)
        .saturating_add(seconds.saturating_mul(1000))
        .saturating_add(fraction.map(fraction_ms).unwrap_or(0));
    Some((ms, s.position))
}

/// A `<start,duration>word` token
#[derive(Debug, Clone, PartialEq)]
pub struct WordToken<'a> {
    pub start: i64,
    pub duration: i64,
    pub text: &'a str,
}

/// Parse a word token at the start of `input`.
///
/// Returns the token and the number of bytes consumed.
pub fn parse_word_token(input: &str) -> Option<(WordToken<'_>, usize)> {
    let mut s = Scanner::new(input);
    if !s.eat('<') {
        return None;
    }
    let start = number(s.digits()?);
    if !s.eat(',') {
        return None;
    }
    let duration = number(s.digits()?);
    if !s.eat('>') {
        return None;
    }
    let text = s.until_token();
    Some((
        WordToken {
            start,
            duration,
            text,
        },
        s.position,
    ))
}

/// Split a token's text on internal whitespace.
///
/// Some sources put whole phrases into one token; each sub-word gets an even
/// share of the duration (the remainder goes to the last one). Every sub-word
/// but the last is followed by a space, and the token's own leading/trailing
/// whitespace is kept on the first/last sub-word.
pub fn split_token(token: &WordToken<'_>) -> Vec<Word> {
    let parts: Vec<&str> = token.text.split_whitespace().collect();
    if parts.is_empty() {
        return Vec::new();
    }

    let count = parts.len() as i64;
    let share = token.duration / count;
    let leading = token.text.starts_with(char::is_whitespace);
    let trailing = token.text.ends_with(char::is_whitespace);

    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let i = i as i64;
            let last = i == count - 1;
            let mut text = String::with_capacity(part.len() + 2);
            if i == 0 && leading {
                text.push(' ');
            }
            text.push_str(part);
            if !last || trailing {
                text.push(' ');
            }
            let duration = if last {
                token.duration - share * (count - 1)
            } else {
                share
            };
            Word::new(token.start.saturating_add(share * i), duration, text)
        })
        .collect()
}

/// Tokenize a plain line-synced (or unsynced) track
pub fn tokenize_plain(source: &str) -> PlainTrack {
    let mut entries = Vec::new();

    for line in source.lines() {
        let mut rest = line.trim();
        let mut timestamps = Vec::new();
        while let Some((time, consumed)) = parse_time_tag(rest) {
            timestamps.push(time);
            rest = rest[consumed..].trim();
        }
        for time in timestamps {
            entries.push(TimedEntry {
                time,
                text: rest.to_string(),
            });
        }
    }

    if entries.is_empty() && !source.trim().is_empty() {
        return PlainTrack {
            synced: false,
            entries: source
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(|l| TimedEntry {
                    time: 0,
                    text: l.to_string(),
                })
                .collect(),
        };
    }

    entries.sort_by_key(|e| e.time);
    PlainTrack {
        synced: true,
        entries,
    }
}

/// Tokenize a word-level track into anchored lines
pub fn tokenize_dynamic(source: &str) -> Vec<WordLine> {
    let mut lines = Vec::new();

    for line in source.trim().lines() {
        let line = line.trim();
        let Some((anchor, consumed)) = parse_time_tag(line) else {
            continue;
        };

        let mut rest = &line[consumed..];
        let mut words = Vec::new();
        while let Some((token, consumed)) = parse_word_token(rest) {
            words.extend(split_token(&token));
            rest = &rest[consumed..];
        }

        let relative = words
            .first()
            .is_some_and(|w| w.time < anchor.saturating_sub(w.time));
        if relative {
            for word in &mut words {
                word.time = word.time.saturating_add(anchor);
            }
        }

        lines.push(WordLine {
            time: anchor,
            words,
        });
    }

    lines.sort_by_key(|l| l.time);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_tag_variants() {
        assert_eq!(parse_time_tag("[00:01.000]"), Some((1000, 11)));
        assert_eq!(parse_time_tag("[00:22.19]"), Some((22_190, 10)));
        assert_eq!(parse_time_tag("[02:05]"), Some((125_000, 7)));
        assert_eq!(parse_time_tag("[01:02:03]"), Some((62_030, 10)));
        assert_eq!(parse_time_tag("[12.5]"), Some((12_500, 6)));
        assert_eq!(parse_time_tag("[7]"), Some((7000, 3)));
        assert_eq!(parse_time_tag("[00:01.88129]"), Some((1881, 13)));
    }

    #[test]
    fn test_time_tag_rejects_malformed() {
        assert_eq!(parse_time_tag("[00:]"), None);
        assert_eq!(parse_time_tag("[00:01"), None);
        assert_eq!(parse_time_tag("[ti:Title]"), None);
        assert_eq!(parse_time_tag("00:01.00]"), None);
        assert_eq!(parse_time_tag("[00:01.]"), None);
    }

    #[test]
    fn test_plain_multiple_tags() {
        let track = tokenize_plain("[00:05.00][00:01.00]chorus\n[00:03.00]verse");
        assert!(track.synced);
        let times: Vec<_> = track.entries.iter().map(|e| e.time).collect();
        assert_eq!(times, vec![1000, 3000, 5000]);
        assert_eq!(track.entries[0].text, "chorus");
        assert_eq!(track.entries[2].text, "chorus");
    }

    #[test]
    fn test_plain_drops_untagged_lines() {
        let track = tokenize_plain("[ar:Someone]\n[00:01.00] a \nstray text");
        assert!(track.synced);
        assert_eq!(
            track.entries,
            vec![TimedEntry {
                time: 1000,
                text: "a".to_string()
            }]
        );
    }

    #[test]
    fn test_plain_unsynced() {
        let track = tokenize_plain("first line\n\n  second line  \n");
        assert!(!track.synced);
        assert_eq!(track.entries.len(), 2);
        assert!(track.entries.iter().all(|e| e.time == 0));
        assert_eq!(track.entries[1].text, "second line");
    }

    #[test]
    fn test_plain_blank_is_synced_and_empty() {
        let track = tokenize_plain("  \n ");
        assert!(track.synced);
        assert!(track.is_empty());
    }

    #[test]
    fn test_word_token() {
        let (token, consumed) = parse_word_token("<376,233>我<609,237>好").unwrap();
        assert_eq!(token.start, 376);
        assert_eq!(token.duration, 233);
        assert_eq!(token.text, "我");
        assert_eq!(consumed, "<376,233>我".len());
        assert!(parse_word_token("<1,x>a").is_none());
    }

    #[test]
    fn test_split_token_phrase() {
        let token = WordToken {
            start: 1000,
            duration: 1000,
            text: " hold on tight ",
        };
        let words = split_token(&token);
        let texts: Vec<_> = words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec![" hold ", "on ", "tight "]);
        assert_eq!(words[0].time, 1000);
        assert_eq!(words[1].time, 1333);
        assert_eq!(words[2].time, 1666);
        assert_eq!(words.iter().map(|w| w.duration).sum::<i64>(), 1000);
    }

    #[test]
    fn test_split_token_whitespace_only() {
        let token = WordToken {
            start: 0,
            duration: 300,
            text: "   ",
        };
        assert!(split_token(&token).is_empty());
    }

    #[test]
    fn test_dynamic_relative_times_are_anchored() {
        let lines = tokenize_dynamic("[00:14.881]<0,375>当<376,233>我");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].time, 14_881);
        assert_eq!(lines[0].words[0].time, 14_881);
        assert_eq!(lines[0].words[1].time, 15_257);
        assert_eq!(lines[0].duration(), 608);
        assert_eq!(lines[0].text(), "当我");
    }

    #[test]
    fn test_dynamic_absolute_times_kept() {
        let lines = tokenize_dynamic("[00:10.000]<10000,500>I <10500,400>see");
        assert_eq!(lines[0].words[0].time, 10_000);
        assert_eq!(lines[0].words[1].time, 10_500);
        assert_eq!(lines[0].text(), "I see");
    }

    #[test]
    fn test_dynamic_relative_times_under_one_second() {
        let lines = tokenize_dynamic("[00:00.800]<0,300>a<300,300>b\n[00:10.000]<0,300>c");
        let times: Vec<Vec<i64>> = lines
            .iter()
            .map(|l| l.words.iter().map(|w| w.time).collect())
            .collect();
        assert_eq!(times, vec![vec![800, 1100], vec![10_000]]);
    }

    #[test]
    fn test_dynamic_extreme_numbers_saturate() {
        let lines = tokenize_dynamic("[00:01.000]<9223372036854775807,10>a b");
        let times: Vec<_> = lines[0].words.iter().map(|w| w.time).collect();
        assert_eq!(times, vec![i64::MAX, i64::MAX]);
        assert_eq!(lines[0].words[1].end_time(), i64::MAX);

        let lines = tokenize_dynamic(
            "[00:01.000]<1000,9000000000000000000>a<2000,9000000000000000000>b",
        );
        assert_eq!(lines[0].duration(), i64::MAX);
    }

    #[test]
    fn test_dynamic_sorted_and_untagged_skipped() {
        let lines = tokenize_dynamic("[00:05.000]<5000,10>b\nnoise\n[00:01.000]<1000,10>a");
        let times: Vec<_> = lines.iter().map(|l| l.time).collect();
        assert_eq!(times, vec![1000, 5000]);
    }
}
