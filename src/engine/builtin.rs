//! Canned replies used when nothing in the configuration applies.
//!
//! Keyword checks are literal substrings of the lowercased text, tried in a
//! fixed order; the first hit wins and the echo reply catches the rest, so
//! these functions never return empty text.

use super::random::RandomSource;

const JOKES: [&str; 4] = [
    "Why don't scientists trust atoms? Because they make up everything!",
    "Why did the scarecrow win an award? Because he was outstanding in his field!",
    "What do you call a fake noodle? An impasta!",
    "Why don't skeletons fight each other? They don't have the guts!",
];

const WEATHER: &str = "I'm a mock API, so I can't provide real weather data. But I can tell you it's always sunny in \
                       the world of mock responses!";

const STREAMING: &str = "This response is being streamed token by token from your mock OpenAI server. Each word \
                         appears with a slight delay to simulate real streaming behavior.";

const NEWS: &str = "Here are some mock news headlines: 'AI Continues to Advance', 'Mock APIs Prove Useful for \
                    Development', 'Developers Love Testing with Fake Data'.";

/// Chat surface. `last` is the text of the final message, `None` for an empty conversation.
pub(crate) fn chat_reply(last: Option<&str>, random: &dyn RandomSource) -> String {
    let Some(last) = last else {
        return "Hello! How can I help you today?".to_string();
    };
    let lower = last.to_lowercase();

    if lower.contains("joke") {
        return joke(random).to_string();
    }
    if lower.contains("weather") {
        return WEATHER.to_string();
    }
    if lower.contains("hello") || lower.contains("hi") {
        return "Hello! I'm a mock OpenAI API. How can I assist you today?".to_string();
    }
    if lower.contains("streaming") {
        return STREAMING.to_string();
    }

    format!("This is a mock response to your message: '{last}'. The chat completions API is working correctly!")
}

/// Responses surface default text for `input`.
pub(crate) fn responses_reply(input: &str, random: &dyn RandomSource) -> String {
    let lower = input.to_lowercase();

    if lower.contains("joke") {
        return joke(random).to_string();
    }
    if lower.contains("weather") {
        return WEATHER.to_string();
    }
    if lower.contains("news") || lower.contains("latest") {
        return NEWS.to_string();
    }
    if lower.contains("hello") || lower.contains("hi") {
        return "Hello! I'm a mock OpenAI Responses API. How can I help you today?".to_string();
    }

    format!("This is a mock response to your input: '{input}'. The Responses API is working correctly!")
}

fn joke(random: &dyn RandomSource) -> &'static str {
    JOKES[random.below(JOKES.len() as u64) as usize]
}

#[cfg(test)]
pub(crate) fn is_joke(text: &str) -> bool {
    JOKES.contains(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SeededRandom;

    #[test]
    fn keyword_order_is_fixed() {
        let random = SeededRandom::new(1);

        assert!(is_joke(&chat_reply(Some("Tell me a JOKE about the weather"), &random)));
        assert_eq!(chat_reply(Some("weather, hello"), &random), WEATHER);
        assert!(chat_reply(Some("Hi"), &random).starts_with("Hello! I'm a mock OpenAI API."));
        assert_eq!(chat_reply(Some("explain streaming"), &random), STREAMING);
        assert_eq!(chat_reply(None, &random), "Hello! How can I help you today?");
    }

    #[test]
    fn echo_keeps_original_casing() {
        let random = SeededRandom::new(1);

        assert_eq!(
            chat_reply(Some("Quux?"), &random),
            "This is a mock response to your message: 'Quux?'. The chat completions API is working correctly!"
        );
        assert_eq!(
            responses_reply("Quux", &random),
            "This is a mock response to your input: 'Quux'. The Responses API is working correctly!"
        );
    }

    #[test]
    fn responses_knows_about_news() {
        let random = SeededRandom::new(1);
        assert_eq!(responses_reply("latest updates", &random), NEWS);
        assert!(responses_reply("hello", &random).contains("Responses API"));
    }

    #[test]
    fn every_joke_is_reachable() {
        let random = SeededRandom::new(5);
        let seen: std::collections::HashSet<String> = (0..200).map(|_| chat_reply(Some("joke"), &random)).collect();
        assert_eq!(seen.len(), JOKES.len());
    }
}
