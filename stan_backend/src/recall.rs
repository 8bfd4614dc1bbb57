//! Direct answers for "what's my X?" questions about facts we don't have.

use std::collections::BTreeMap;

use regex_lite::Regex;

const WHAT_IS_MY_PATTERN: &str =
    r"(?i)\bwhat(?:'s|’s|\s+is)\s+my\s+(name|favou?rite\s+colou?r|pet|hobby|location)\b";
const WHERE_DO_I_LIVE_PATTERN: &str = r"(?i)\bwhere\s+do\s+i\s+live\b";

/// The canonical fact key a recall question asks about, if any.
pub fn asked_fact_key(message: &str) -> Option<&'static str> {
    if Regex::new(WHERE_DO_I_LIVE_PATTERN).is_ok_and(|re| re.is_match(message)) {
        return Some("location");
    }
    let re = Regex::new(WHAT_IS_MY_PATTERN).ok()?;
    let captures = re.captures(message)?;
    let subject = captures.get(1)?.as_str().to_lowercase();
    let key = if subject == "name" {
        "name"
    } else if subject.starts_with("fav") {
        "favorite_color"
    } else if subject == "pet" {
        "pet"
    } else if subject == "hobby" {
        "hobby"
    } else {
        "location"
    };
    Some(key)
}

/// Related keys count too: `first_name` answers a name question, `pet_name` a pet one.
fn is_known(facts: &BTreeMap<String, String>, key: &str) -> bool {
    facts.keys().any(|stored| match key {
        "name" => stored.ends_with("name") && !stored.starts_with("pet"),
        _ => stored.contains(key),
    })
}

/// A fixed reply when the user asks about a fact that isn't stored.
pub fn unknown_fact_reply(message: &str, facts: &BTreeMap<String, String>) -> Option<String> {
    let key = asked_fact_key(message)?;
    if is_known(facts, key) {
        return None;
    }
    let reply = match key {
        "name" => "I don't actually know your name yet. What should I call you?".to_string(),
        "location" => "You haven't told me where you live yet. Where are you based?".to_string(),
        "favorite_color" => {
            "I don't know your favorite color yet. What is it?".to_string()
        }
        other => format!("I don't know your {} yet. Want to tell me?", other),
    };
    Some(reply)
}
