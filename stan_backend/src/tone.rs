/// Emotional register used to steer the reply prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Empathetic,
    Cheerful,
    Calm,
    Sarcastic,
    Friendly,
}

impl Tone {
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Empathetic => "empathetic",
            Tone::Cheerful => "cheerful",
            Tone::Calm => "calm",
            Tone::Sarcastic => "sarcastic",
            Tone::Friendly => "friendly",
        }
    }

    pub fn guidance(self) -> &'static str {
        match self {
            Tone::Empathetic => "Be gentle and supportive; acknowledge how they feel before anything else.",
            Tone::Cheerful => "Match their good mood with upbeat, playful energy.",
            Tone::Calm => "Stay calm and steady; de-escalate without lecturing.",
            Tone::Sarcastic => "Use light, witty sarcasm and keep it good-natured.",
            Tone::Friendly => "Be warm, casual and conversational.",
        }
    }
}

const SAD_WORDS: &[&str] = &[
    "sad", "sadness", "unhappy", "depressed", "lonely", "upset", "crying", "cry", "heartbroken",
    "miserable",
];
const HAPPY_WORDS: &[&str] = &[
    "happy", "glad", "excited", "great", "awesome", "amazing", "thrilled", "yay",
];
const ANGRY_WORDS: &[&str] = &[
    "angry", "mad", "furious", "annoyed", "irritated", "hate", "pissed",
];
const HUMOR_WORDS: &[&str] = &["joke", "jokes", "funny", "lol", "haha", "lmao", "laugh"];

/// Classify a message by keyword. Sadness beats happiness beats anger beats humor.
pub fn detect_tone(message: &str) -> Tone {
    let lower = message.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|word| !word.is_empty())
        .collect();
    let has_any = |set: &[&str]| {
        words
            .iter()
            .any(|word| set.iter().any(|keyword| keyword == word))
    };

    if has_any(SAD_WORDS) {
        Tone::Empathetic
    } else if has_any(HAPPY_WORDS) {
        Tone::Cheerful
    } else if has_any(ANGRY_WORDS) {
        Tone::Calm
    } else if has_any(HUMOR_WORDS) {
        Tone::Sarcastic
    } else {
        Tone::Friendly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_each_tone() {
        assert_eq!(detect_tone("I feel so sad today"), Tone::Empathetic);
        assert_eq!(detect_tone("I'm so happy!"), Tone::Cheerful);
        assert_eq!(detect_tone("this makes me so angry"), Tone::Calm);
        assert_eq!(detect_tone("tell me a joke"), Tone::Sarcastic);
        assert_eq!(detect_tone("hello"), Tone::Friendly);
    }

    #[test]
    fn earlier_sets_take_priority() {
        assert_eq!(detect_tone("happy but also a bit sad"), Tone::Empathetic);
        assert_eq!(detect_tone("ANGRY yet HAPPY"), Tone::Cheerful);
        assert_eq!(detect_tone("so mad, tell me a joke"), Tone::Calm);
    }

    #[test]
    fn matches_whole_words_only() {
        assert_eq!(detect_tone("I made a sandwich"), Tone::Friendly);
        assert_eq!(detect_tone(""), Tone::Friendly);
    }
}
