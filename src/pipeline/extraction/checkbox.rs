//! Checkbox / selection detection over OCR markdown.
//!
//! Certificates render tick boxes in many ways: `[x]` next to the label,
//! a mark in the neighbouring table cell, a bold label followed by a
//! mark, or just prose ("Hearing checked"). Each rendering is one
//! [`SelectionMatcher`]; the [`SelectionDetector`] runs them in priority
//! order and the first `Some` decides. A positive decision is then
//! vetoed if an empty box `[ ]` sits next to the same label.

use std::sync::LazyLock;

use regex::{Match, Regex};

use super::table::{self, TableRow};

/// Characters allowed between a label and its mark.
const SEPARATORS: &str = r"[ \t:*=\-–]*";

/// Bare tick glyphs accepted without brackets.
const TICK_GLYPHS: &str = "✓✔√☑✅";

static BRACKET_AFTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^{SEPARATORS}\[([^\[\]\n]{{0,5}})\]")).unwrap());

static BRACKET_BEFORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\[([^\[\]\n]{{0,5}})\]{SEPARATORS}$")).unwrap());

static GLYPH_AFTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^{SEPARATORS}[{TICK_GLYPHS}]")).unwrap());

static GLYPH_BEFORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"[{TICK_GLYPHS}]{SEPARATORS}$")).unwrap());

/// Table cells, HTML table tags and pipes bound a text segment.
static SEGMENT_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?t(?:d|h|r|able)[^>]*>|\|").unwrap());

static BOLD_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*\s*$").unwrap());

static BOLD_CLOSE_MARK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*:?\s*\*\*[ \t:]*(\S+)").unwrap());

static KEYWORD_AFTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<gap>[ \t:,\-]*(?:\w+[ \t:,\-]+)?)(?:checked|ticked|selected|marked)\b")
        .unwrap()
});

static KEYWORD_BEFORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:checked|ticked|selected|marked)(?:[ \t]+as)?[ \t:,\-]*$").unwrap()
});

static NEGATING_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:not|no|with)\b").unwrap());

static EMPTY_MARK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\[\s*\]|☐|□)$").unwrap());

static FILLED_MARK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)^(?:\[\s*[^\s\[\]]\s*\]|[{TICK_GLYPHS}]|x|yes|y|done)$")).unwrap()
});

static MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>|\*\*").unwrap());

static CROSSED_OUT_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(?:crossed\s+out|crossing\s+(?:it\s+)?out|struck\s+(?:through|out)|strike-?through|large\s+["“]?x["”]?(?:\W|$))"#,
    )
    .unwrap()
});

static STRIKETHROUGH_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)~~\s*(un)?fit\s*~~").unwrap());

static FIT_WORD: LazyLock<LabelPattern> =
    LazyLock::new(|| LabelPattern::build("FIT", false).unwrap());

static UNFIT_WORD: LazyLock<LabelPattern> =
    LazyLock::new(|| LabelPattern::build("UNFIT", false).unwrap());

static DEFAULT_DETECTOR: LazyLock<SelectionDetector> = LazyLock::new(SelectionDetector::new);

// ---------------------------------------------------------------------------
// Label patterns
// ---------------------------------------------------------------------------

/// A compiled, case-insensitive matcher for one label.
///
/// Whitespace and hyphens between words are interchangeable, `&` also
/// matches `&amp;` and `and`, commas are optional and a trailing plural
/// `s` is tolerated.
#[derive(Debug, Clone)]
pub struct LabelPattern {
    label: String,
    regex: Regex,
}

impl LabelPattern {
    /// `None` for an empty label.
    pub fn new(label: &str) -> Option<Self> {
        Self::build(label, true)
    }

    fn build(label: &str, allow_plural: bool) -> Option<Self> {
        let trimmed = label.trim();
        let phrase = phrase_source(trimmed)?;

        let mut source = String::from("(?i)");
        if trimmed.chars().next().is_some_and(is_word_char) {
            source.push_str(r"\b");
        }
        source.push_str(&phrase);
        if allow_plural && trimmed.chars().last().is_some_and(char::is_alphabetic) {
            source.push_str("s?");
        }
        if trimmed.chars().last().is_some_and(is_word_char) {
            source.push_str(r"\b");
        }

        let regex = Regex::new(&source).ok()?;
        Some(Self {
            label: trimmed.to_string(),
            regex,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Occurrences not glued to a preceding word on the same line, so
    /// "Unfit" inside "Temporarily Unfit" is not an occurrence of UNFIT.
    pub fn occurrences<'t>(&'t self, text: &'t str) -> impl Iterator<Item = Match<'t>> + 't {
        self.regex
            .find_iter(text)
            .filter(move |m| !word_before(text, m.start()))
    }

    /// Occurrences with no neighbouring word on either side.
    pub fn standalone<'t>(&'t self, text: &'t str) -> impl Iterator<Item = Match<'t>> + 't {
        self.occurrences(text)
            .filter(move |m| !word_after(text, m.end()))
    }

    /// Whether `cell` holds this label as a standalone phrase.
    pub fn in_cell(&self, cell: &str) -> bool {
        self.standalone(cell).next().is_some()
    }

    fn fitness_word(&self) -> Option<FitnessWord> {
        match self.label.to_ascii_uppercase().as_str() {
            "FIT" => Some(FitnessWord::Fit),
            "UNFIT" => Some(FitnessWord::Unfit),
            _ => None,
        }
    }
}

/// Regex source for a label phrase, without flags or word boundaries.
/// Words may be separated by spaces, tabs or hyphens.
pub(crate) fn phrase_source(label: &str) -> Option<String> {
    let tokens: Vec<String> = label
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|t| !t.is_empty())
        .map(token_source)
        .collect();
    (!tokens.is_empty()).then(|| tokens.join(r"[-\t ]*"))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn token_source(token: &str) -> String {
    let mut source = String::new();
    for c in token.chars() {
        match c {
            '&' => source.push_str("(?:&amp;|&|and)"),
            ',' => source.push_str(",?"),
            _ => source.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    source
}

/// Previous non-blank character on the same line is part of a word.
fn word_before(text: &str, at: usize) -> bool {
    text[..at]
        .chars()
        .rev()
        .take_while(|c| *c != '\n')
        .find(|c| !matches!(*c, ' ' | '\t'))
        .is_some_and(char::is_alphanumeric)
}

/// Next non-blank character on the same line is part of a word.
fn word_after(text: &str, at: usize) -> bool {
    text[at..]
        .chars()
        .take_while(|c| *c != '\n')
        .find(|c| !matches!(*c, ' ' | '\t'))
        .is_some_and(char::is_alphanumeric)
}

// ---------------------------------------------------------------------------
// Marks
// ---------------------------------------------------------------------------

/// Classify a stand-alone mark such as a table cell: `Some(true)` for a
/// tick (`[x]`, `✓`, `X`, `Yes`), `Some(false)` for an empty box or "No",
/// `None` when the text is not a mark at all.
pub fn classify_mark(cell: &str) -> Option<bool> {
    let text = MARKUP.replace_all(cell, "");
    let text = text.trim();
    if EMPTY_MARK.is_match(text) || text.eq_ignore_ascii_case("no") || text.eq_ignore_ascii_case("n") {
        Some(false)
    } else if FILLED_MARK.is_match(text) {
        Some(true)
    } else {
        None
    }
}

fn bracket_state(inner: &str) -> Option<bool> {
    let inner = inner.trim();
    match inner.chars().count() {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

/// Filled and empty marks seen next to a label across the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct MarkTally {
    filled: bool,
    empty: bool,
}

impl MarkTally {
    fn record(&mut self, state: Option<bool>) {
        match state {
            Some(true) => self.filled = true,
            Some(false) => self.empty = true,
            None => {}
        }
    }

    fn decision(&self) -> Option<bool> {
        if self.filled {
            Some(true)
        } else if self.empty {
            Some(false)
        } else {
            None
        }
    }
}

fn segments(text: &str) -> impl Iterator<Item = &str> {
    text.lines().flat_map(|line| SEGMENT_BOUNDARY.split(line))
}

/// A segment whose first token is a mark ("- [x] Bloods", "✓ Exit")
/// carries marks before labels; otherwise marks follow labels.
fn mark_first(segment: &str) -> bool {
    let rest = segment.trim_start_matches(|c: char| {
        c.is_whitespace() || matches!(c, '-' | '*' | '+' | '•' | '>')
    });
    rest.starts_with('[') || rest.starts_with(|c: char| TICK_GLYPHS.contains(c))
}

fn bracket_tally(text: &str, label: &LabelPattern) -> MarkTally {
    let mut tally = MarkTally::default();
    for segment in segments(text) {
        let before_label = mark_first(segment);
        for m in label.occurrences(segment) {
            let state = if before_label {
                if word_after(segment, m.end()) {
                    None
                } else {
                    BRACKET_BEFORE
                        .captures(&segment[..m.start()])
                        .and_then(|c| c.get(1))
                        .and_then(|inner| bracket_state(inner.as_str()))
                }
            } else {
                BRACKET_AFTER
                    .captures(&segment[m.end()..])
                    .and_then(|c| c.get(1))
                    .and_then(|inner| bracket_state(inner.as_str()))
            };
            tally.record(state);
        }
    }
    tally
}

fn row_tally(rows: &[TableRow], label: &LabelPattern) -> MarkTally {
    let mut tally = MarkTally::default();
    for row in rows {
        let marks_lead = row.cells.first().is_some_and(|c| classify_mark(c).is_some());
        for (i, cell) in row.cells.iter().enumerate() {
            if !label.in_cell(cell) {
                continue;
            }
            let neighbour = if marks_lead {
                i.checked_sub(1).and_then(|j| row.cells.get(j))
            } else {
                row.cells.get(i + 1)
            };
            tally.record(neighbour.and_then(|c| classify_mark(c)));
        }
    }
    tally
}

// ---------------------------------------------------------------------------
// Matchers
// ---------------------------------------------------------------------------

/// One detection strategy. `None` means "no opinion", letting the next
/// matcher in the chain decide.
pub trait SelectionMatcher: Send + Sync {
    fn name(&self) -> &'static str;

    fn try_match(&self, text: &str, label: &LabelPattern) -> Option<bool>;
}

/// `Label [x]`, `Label: [ ]`, `- [x] Label`.
pub struct BracketAdjacency;

impl SelectionMatcher for BracketAdjacency {
    fn name(&self) -> &'static str {
        "bracket_adjacency"
    }

    fn try_match(&self, text: &str, label: &LabelPattern) -> Option<bool> {
        bracket_tally(text, label).decision()
    }
}

/// `<td>Label</td><td>[x]</td>`.
pub struct HtmlTableRow;

impl SelectionMatcher for HtmlTableRow {
    fn name(&self) -> &'static str {
        "html_table_row"
    }

    fn try_match(&self, text: &str, label: &LabelPattern) -> Option<bool> {
        row_tally(&table::html_rows(text), label).decision()
    }
}

/// `| Label | [x] |`.
pub struct PipeTableRow;

impl SelectionMatcher for PipeTableRow {
    fn name(&self) -> &'static str {
        "pipe_table_row"
    }

    fn try_match(&self, text: &str, label: &LabelPattern) -> Option<bool> {
        row_tally(&table::pipe_rows(text), label).decision()
    }
}

/// `**Label**: X`, `**Label:** Yes`.
pub struct BoldLabel;

impl SelectionMatcher for BoldLabel {
    fn name(&self) -> &'static str {
        "bold_label"
    }

    fn try_match(&self, text: &str, label: &LabelPattern) -> Option<bool> {
        let mut tally = MarkTally::default();
        for line in text.lines() {
            for m in label.occurrences(line) {
                if !BOLD_OPEN.is_match(&line[..m.start()]) {
                    continue;
                }
                let state = BOLD_CLOSE_MARK
                    .captures(&line[m.end()..])
                    .and_then(|c| c.get(1))
                    .and_then(|mark| classify_mark(mark.as_str()));
                tally.record(state);
            }
        }
        tally.decision()
    }
}

/// FIT / UNFIT struck out in prose. Negates only the word that is named.
pub struct StruckThrough;

impl SelectionMatcher for StruckThrough {
    fn name(&self) -> &'static str {
        "crossed_out"
    }

    fn try_match(&self, text: &str, label: &LabelPattern) -> Option<bool> {
        let word = label.fitness_word()?;
        match (crossed_out_word(text)?, word) {
            (CrossedOut::Fit, FitnessWord::Fit)
            | (CrossedOut::Unnamed, FitnessWord::Fit)
            | (CrossedOut::Unfit, FitnessWord::Unfit) => Some(false),
            _ => None,
        }
    }
}

/// "Hearing checked", "selected: Periodical".
pub struct KeywordAdjacency;

impl SelectionMatcher for KeywordAdjacency {
    fn name(&self) -> &'static str {
        "keyword_adjacency"
    }

    fn try_match(&self, text: &str, label: &LabelPattern) -> Option<bool> {
        for line in text.lines() {
            let after = label.occurrences(line).any(|m| {
                KEYWORD_AFTER
                    .captures(&line[m.end()..])
                    .and_then(|c| c.name("gap"))
                    .is_some_and(|gap| !NEGATING_GAP.is_match(gap.as_str()))
            });
            // The keyword itself is the preceding word, so raw matches are used.
            let before = label.regex.find_iter(line).any(|m| {
                !word_after(line, m.end()) && KEYWORD_BEFORE.is_match(&line[..m.start()])
            });
            if after || before {
                return Some(true);
            }
        }
        None
    }
}

/// `Label ✓` or `✓ Label` without brackets.
pub struct BareGlyph;

impl SelectionMatcher for BareGlyph {
    fn name(&self) -> &'static str {
        "bare_glyph"
    }

    fn try_match(&self, text: &str, label: &LabelPattern) -> Option<bool> {
        for segment in segments(text) {
            let before_label = mark_first(segment);
            for m in label.occurrences(segment) {
                let ticked = if before_label {
                    !word_after(segment, m.end()) && GLYPH_BEFORE.is_match(&segment[..m.start()])
                } else {
                    GLYPH_AFTER.is_match(&segment[m.end()..])
                };
                if ticked {
                    return Some(true);
                }
            }
        }
        None
    }
}

/// An empty box next to the label, in any of the bracket or table shapes.
fn empty_box_near(text: &str, label: &LabelPattern) -> bool {
    bracket_tally(text, label).empty
        || row_tally(&table::html_rows(text), label).empty
        || row_tally(&table::pipe_rows(text), label).empty
}

// ---------------------------------------------------------------------------
// Crossed-out fitness words
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FitnessWord {
    Fit,
    Unfit,
}

/// Which fitness word a strike-out cue refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossedOut {
    Fit,
    Unfit,
    /// A cue is present but names neither word.
    Unnamed,
}

fn gap(start: usize, end: usize, at: usize) -> usize {
    if start >= at {
        start - at
    } else {
        at.saturating_sub(end)
    }
}

/// Look for `~~FIT~~` or a prose cue ("crossed out", "struck through",
/// `large "X"`). The fitness word nearest the cue on its line is the one
/// struck out.
pub fn crossed_out_word(text: &str) -> Option<CrossedOut> {
    if let Some(c) = STRIKETHROUGH_WORD.captures(text) {
        return Some(if c.get(1).is_some() {
            CrossedOut::Unfit
        } else {
            CrossedOut::Fit
        });
    }

    let cue = CROSSED_OUT_CUE.find(text)?;
    let line_start = text[..cue.start()].rfind('\n').map_or(0, |i| i + 1);
    let line_end = text[cue.end()..]
        .find('\n')
        .map_or(text.len(), |i| cue.end() + i);
    let line = &text[line_start..line_end];
    let cue_at = cue.start() - line_start;

    // Raw matches: prose such as "the word FIT" precedes the word with text.
    let nearest_fit = FIT_WORD
        .regex
        .find_iter(line)
        .filter(|m| !line[m.end()..].trim_start().to_lowercase().starts_with("with"))
        .map(|m| gap(m.start(), m.end(), cue_at))
        .min();
    let nearest_unfit = UNFIT_WORD
        .regex
        .find_iter(line)
        .filter(|m| !line[..m.start()].trim_end().to_lowercase().ends_with("temporarily"))
        .filter(|m| !line[..m.start()].trim_end().to_lowercase().ends_with("temporary"))
        .map(|m| gap(m.start(), m.end(), cue_at))
        .min();

    Some(match (nearest_fit, nearest_unfit) {
        (Some(f), Some(u)) if u < f => CrossedOut::Unfit,
        (Some(_), _) => CrossedOut::Fit,
        (None, Some(_)) => CrossedOut::Unfit,
        (None, None) => CrossedOut::Unnamed,
    })
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Ordered matcher chain plus the empty-box veto.
pub struct SelectionDetector {
    matchers: Vec<Box<dyn SelectionMatcher>>,
    debug: bool,
}

impl Default for SelectionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionDetector {
    pub fn new() -> Self {
        Self::with_matchers(vec![
            Box::new(BracketAdjacency),
            Box::new(HtmlTableRow),
            Box::new(PipeTableRow),
            Box::new(BoldLabel),
            Box::new(StruckThrough),
            Box::new(KeywordAdjacency),
            Box::new(BareGlyph),
        ])
    }

    pub fn with_matchers(matchers: Vec<Box<dyn SelectionMatcher>>) -> Self {
        Self {
            matchers,
            debug: false,
        }
    }

    /// Log each decision at debug level. Never changes the outcome.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Decision of the first matcher with an opinion, after the veto.
    /// `None` when no matcher recognised the label.
    pub fn decide(&self, text: &str, label: &LabelPattern) -> Option<bool> {
        for matcher in &self.matchers {
            let Some(selected) = matcher.try_match(text, label) else {
                continue;
            };
            if selected && empty_box_near(text, label) {
                if self.debug {
                    tracing::debug!(
                        label = label.label(),
                        matcher = matcher.name(),
                        "empty box vetoed selection"
                    );
                }
                return Some(false);
            }
            if self.debug {
                tracing::debug!(label = label.label(), matcher = matcher.name(), selected, "selection matched");
            }
            return Some(selected);
        }
        if self.debug {
            tracing::debug!(label = label.label(), "no selection pattern matched");
        }
        None
    }

    pub fn is_selected(&self, text: &str, label: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        match LabelPattern::new(label) {
            Some(pattern) => self.decide(text, &pattern).unwrap_or(false),
            None => false,
        }
    }
}

/// Whether `label`'s option is ticked in `text`, using the default chain.
pub fn is_selected(text: &str, label: &str) -> bool {
    DEFAULT_DETECTOR.is_selected(text, label)
}

/// True when any of `labels` is ticked.
pub fn any_selected(text: &str, labels: &[&str]) -> bool {
    labels.iter().any(|l| is_selected(text, l))
}
