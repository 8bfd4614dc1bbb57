//! Lexical uncertainty check shared by fact extraction and reply composition.
//!
//! A message that hedges ("red or blue", "maybe Lisbon") is never mined for facts
//! and gets a clarification reply instead of a generated one.

use regex_lite::Regex;

const AMBIGUITY_PATTERN: &str = r"(?i)\b(or|maybe|possibly)\b";

pub fn is_ambiguous(message: &str) -> bool {
    Regex::new(AMBIGUITY_PATTERN).is_ok_and(|re| re.is_match(message))
}
