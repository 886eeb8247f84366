//! Line-oriented import of questions pasted from a document.
//!
//! ```text
//! [PG] What is 2+2?
//! A. 3
//! B. 4 *
//! C. 5
//!
//! [ESSAY] Explain why the sky is blue.
//! KEY: Rayleigh scattering
//! POINTS: 10
//! ```
//!
//! Markers and key prefixes are case-insensitive. The parser never fails:
//! anything it can't make sense of is skipped, so callers should compare
//! [`ImportReport::markers_seen`] against the number of questions they got
//! back and run [`validate_question_set`] before publishing a set.

use log::debug;

use crate::quiz::{Question, QuestionId, QuestionKind};

const MULTIPLE_CHOICE_MARKERS: [&str; 3] = ["PG", "MC", "PILGAN"];
const ESSAY_MARKERS: [&str; 2] = ["ESSAY", "ESAI"];
const ANSWER_KEY_PREFIXES: [&str; 3] = ["KUNCI", "KEY", "JAWABAN"];
const POINTS_PREFIXES: [&str; 3] = ["POIN", "POINTS", "SKOR"];
const CORRECT_MARK: char = '*';
const BYTE_ORDER_MARK: char = '\u{feff}';

/// Parsed questions plus the numbers an authoring flow needs to spot losses.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImportReport {
    pub questions: Vec<Question>,
    /// Question markers encountered, whether or not they produced a question.
    pub markers_seen: usize,
    /// Questions that were opened but discarded by the flush rule.
    pub dropped: usize,
    /// Non-empty lines that appeared while no question was open.
    pub stray_lines: usize,
}

impl ImportReport {
    pub fn is_complete(&self) -> bool {
        self.dropped == 0 && self.questions.len() == self.markers_seen
    }
}

/// The import entry point used by the authoring UI. Pure, never fails.
pub fn parse_questions_from_text(text: &str) -> Vec<Question> {
    parse_with_report(text).questions
}

pub fn parse_with_report(text: &str) -> ImportReport {
    let mut report = ImportReport::default();
    let mut current: Option<Draft> = None;

    for line in text.lines() {
        // Word processors like to prepend a byte order mark
        let line = line.trim_matches(|c: char| c.is_whitespace() || c == BYTE_ORDER_MARK);
        if line.is_empty() {
            continue;
        }

        if let Some((kind, rest)) = parse_marker(line) {
            flush(current.take(), &mut report);
            report.markers_seen += 1;
            current = Some(Draft::new(kind, rest));
            continue;
        }

        let Some(draft) = current.as_mut() else {
            debug!("Skipping line outside of any question: {:?}", line);
            report.stray_lines += 1;
            continue;
        };

        if draft.kind == QuestionKind::MultipleChoice {
            if let Some(option) = parse_option(line) {
                draft.push_option(option);
                continue;
            }
        }

        if draft.kind == QuestionKind::Essay {
            if let Some(key) = strip_labeled(line, &ANSWER_KEY_PREFIXES) {
                draft.answer_key = Some(key.to_string());
                continue;
            }
        }

        if let Some(raw) = strip_labeled(line, &POINTS_PREFIXES) {
            match raw.parse::<u32>() {
                Ok(points) if points > 0 => draft.points = Some(points),
                _ => debug!("Ignoring invalid points value {:?}", raw),
            }
            continue;
        }

        draft.push_prompt(line);
    }

    flush(current, &mut report);
    report
}

/// Problems that make a parsed set unfit to be used as a test.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum QuestionIssue {
    EmptySet,
    MissingCorrectOption { id: QuestionId },
    TooFewOptions { id: QuestionId, found: usize },
    CorrectIndexOutOfRange { id: QuestionId, index: usize },
}

pub fn validate_question_set(questions: &[Question]) -> Vec<QuestionIssue> {
    if questions.is_empty() {
        return vec![QuestionIssue::EmptySet];
    }

    let mut issues = Vec::new();
    for question in questions
        .iter()
        .filter(|q| q.kind == QuestionKind::MultipleChoice)
    {
        if question.options.len() < 2 {
            issues.push(QuestionIssue::TooFewOptions {
                id: question.id.clone(),
                found: question.options.len(),
            });
        }
        match question.correct_option_index {
            None => issues.push(QuestionIssue::MissingCorrectOption {
                id: question.id.clone(),
            }),
            Some(index) if index >= question.options.len() => {
                issues.push(QuestionIssue::CorrectIndexOutOfRange {
                    id: question.id.clone(),
                    index,
                })
            }
            Some(_) => {}
        }
    }
    issues
}

struct Draft {
    kind: QuestionKind,
    prompt: String,
    options: Vec<String>,
    correct_option_index: Option<usize>,
    answer_key: Option<String>,
    points: Option<u32>,
}

impl Draft {
    fn new(kind: QuestionKind, first_fragment: &str) -> Self {
        let mut draft = Self {
            kind,
            prompt: String::new(),
            options: Vec::new(),
            correct_option_index: None,
            answer_key: None,
            points: None,
        };
        draft.push_prompt(first_fragment);
        draft
    }

    fn push_prompt(&mut self, fragment: &str) {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return;
        }
        if !self.prompt.is_empty() {
            self.prompt.push(' ');
        }
        self.prompt.push_str(fragment);
    }

    fn push_option(&mut self, text: &str) {
        // Last marked option wins if the author starred more than one
        if let Some(unmarked) = text.strip_suffix(CORRECT_MARK) {
            self.correct_option_index = Some(self.options.len());
            self.options.push(unmarked.trim_end().to_string());
        } else {
            self.options.push(text.to_string());
        }
    }

    fn into_question(self, order: usize) -> Option<Question> {
        if self.prompt.is_empty() {
            return None;
        }
        let id = QuestionId::new(format!("q{}", order));
        let question = match self.kind {
            QuestionKind::MultipleChoice => {
                if self.options.is_empty() {
                    return None;
                }
                Question::multiple_choice(id, self.prompt, self.options, self.correct_option_index)
            }
            QuestionKind::Essay => Question::essay(id, self.prompt, self.answer_key),
        };
        let points = self.points.unwrap_or(question.points);
        Some(question.with_order(order).with_points(points))
    }
}

fn flush(draft: Option<Draft>, report: &mut ImportReport) {
    let Some(draft) = draft else {
        return;
    };
    let kind = draft.kind;
    match draft.into_question(report.questions.len() + 1) {
        Some(question) => report.questions.push(question),
        None => {
            debug!("Dropping incomplete {:?} question", kind);
            report.dropped += 1;
        }
    }
}

/// `[TAG] optional text` with a known tag.
fn parse_marker(line: &str) -> Option<(QuestionKind, &str)> {
    let rest = line.strip_prefix('[')?;
    let (tag, tail) = rest.split_once(']')?;
    let tag = tag.trim().to_ascii_uppercase();

    let kind = if MULTIPLE_CHOICE_MARKERS.contains(&tag.as_str()) {
        QuestionKind::MultipleChoice
    } else if ESSAY_MARKERS.contains(&tag.as_str()) {
        QuestionKind::Essay
    } else {
        return None;
    };
    Some((kind, tail.trim()))
}

/// `A.`, `B)` ... `D.` followed by the option text.
fn parse_option(line: &str) -> Option<&str> {
    let mut chars = line.chars();
    let letter = chars.next()?;
    let separator = chars.next()?;
    if !('A'..='D').contains(&letter) || !matches!(separator, '.' | ')') {
        return None;
    }
    let text = line[2..].trim();
    if text.is_empty() {
        return None;
    }
    Some(text)
}

/// `LABEL: value` for any of the given labels, compared case-insensitively.
fn strip_labeled<'a>(line: &'a str, labels: &[&str]) -> Option<&'a str> {
    let (label, value) = line.split_once(':')?;
    let label = label.trim();
    labels
        .iter()
        .any(|l| l.eq_ignore_ascii_case(label))
        .then(|| value.trim())
}
