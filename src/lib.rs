//! Adaptive assessment engine: question import, mixed-type scoring and the
//! A → B → C remediation ladder.

pub mod quiz;

pub use quiz::parser::parse_questions_from_text;
