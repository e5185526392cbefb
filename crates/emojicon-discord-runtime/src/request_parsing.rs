//! Argument parsing for mention-style render requests.

use std::sync::OnceLock;

use emojicon_render::{ImageSource, ImageSourceKind, PaletteResolver};
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArguments {
    pub source: ImageSource,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

fn direct_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^<?https?:")
            .unwrap_or_else(|error| panic!("direct url pattern must compile: {error}"))
    })
}

/// Builds the matcher for messages that start by mentioning the bot.
pub fn mention_pattern(bot_user_id: u64) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"^<@!?{bot_user_id}>"))
}

/// Resolves the image source and raw dimension arguments of a request.
///
/// The first whitespace-separated word is the mention and is skipped. An
/// attachment wins over any argument; otherwise the first argument is tried
/// as a direct URL, then as a palette token. Returns `None` when no source
/// could be found, which callers answer with the help payload.
pub fn parse_arguments(
    content: &str,
    attachment_url: Option<&str>,
    palette: &dyn PaletteResolver,
) -> Option<ParsedArguments> {
    let mut args = content.split_whitespace().skip(1);
    let source = match attachment_url {
        Some(url) => ImageSource {
            url: url.to_string(),
            kind: ImageSourceKind::Attachment,
        },
        None => {
            let first = args.next()?;
            if direct_url_pattern().is_match(first) {
                ImageSource {
                    url: strip_angle_brackets(first).to_string(),
                    kind: ImageSourceKind::DirectUrl,
                }
            } else {
                ImageSource {
                    url: palette.resolve_token(first)?,
                    kind: ImageSourceKind::Token,
                }
            }
        }
    };
    let width = args.next().and_then(parse_leading_int);
    let height = args.next().and_then(parse_leading_int);
    Some(ParsedArguments {
        source,
        width,
        height,
    })
}

fn strip_angle_brackets(raw: &str) -> &str {
    let raw = raw.strip_prefix('<').unwrap_or(raw);
    raw.strip_suffix('>').unwrap_or(raw)
}

/// Reads an optional sign followed by decimal digits from the start of `raw`,
/// ignoring anything after them. Out-of-range values saturate.
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    let raw = raw.trim_start();
    let (negative, unsigned) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        _ => (false, raw),
    };
    let digits_len = unsigned
        .bytes()
        .take_while(|byte| byte.is_ascii_digit())
        .count();
    if digits_len == 0 {
        return None;
    }
    let digits = &unsigned[..digits_len];
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}
