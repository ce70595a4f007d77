//! Chunk-level text normalisation applied before phonemisation.
//!
//! Rewrites the handful of patterns espeak-ng reads badly for Kokoro voices:
//! typographic quotes, CJK punctuation, honorifics, years and clock times,
//! money, decimals, numeric ranges and dotted acronyms.

use fancy_regex::{Captures, Regex};
use once_cell::sync::Lazy;

// Plain patterns without look-around use the `regex` crate.
static RE_ODD_SPACE: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"[^\S \n]").unwrap());
static RE_MULTI_SPACE: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"  +").unwrap());
static RE_BLANK_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?<=\n) +(?=\n)").unwrap());

static RE_DOCTOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bD[Rr]\.(?= [A-Z])").unwrap());
static RE_MISTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:Mr\.|MR\.(?= [A-Z]))").unwrap());
static RE_MISS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:Ms\.|MS\.(?= [A-Z]))").unwrap());
static RE_MRS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:Mrs\.|MRS\.(?= [A-Z]))").unwrap());
static RE_ETC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\betc\.(?! [A-Z])").unwrap());
static RE_YEAH: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"(?i)\b(y)eah?\b").unwrap());

static RE_SPLIT_NUM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d*\.\d+|\b\d{4}s?\b|(?<!:)\b(?:[1-9]|1[0-2]):[0-5]\d\b(?!:)").unwrap()
});
static RE_THOUSANDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?<=\d),(?=\d)").unwrap());
static RE_MONEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)[$£]\d+(?:\.\d+)?(?: hundred| thousand| (?:[bm]|tr)illion)*\b|[$£]\d+\.\d\d?\b",
    )
    .unwrap()
});
static RE_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d*\.\d+").unwrap());
static RE_RANGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?<=\d)-(?=\d)").unwrap());
static RE_DIGIT_S: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?<=\d)S").unwrap());
static RE_CAPS_PLURAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?<=[BCDFGHJ-NP-TV-Z])'?s\b").unwrap());
static RE_X_PLURAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?<=X')S\b").unwrap());
static RE_DOTTED_ACRONYM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:[A-Za-z]\.){2,} [a-z]").unwrap());
static RE_INNER_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?<=[A-Z])\.(?=[A-Z])").unwrap());

/// Years read as pairs ("1984" → "19 84"), clock times as "h mm".
fn split_num(caps: &Captures) -> String {
    let num = &caps[0];
    if num.contains('.') {
        return num.to_string();
    }
    if let Some((h, m)) = num.split_once(':') {
        let (h, m): (u32, u32) = (h.parse().unwrap_or(0), m.parse().unwrap_or(0));
        return match m {
            0 => format!("{h} o'clock"),
            1..=9 => format!("{h} oh {m}"),
            _ => format!("{h} {m}"),
        };
    }

    let year: u32 = num[..4].parse().unwrap_or(0);
    if year < 1100 || year % 1000 < 10 {
        return num.to_string();
    }
    let left = &num[..2];
    let right: u32 = num[2..4].parse().unwrap_or(0);
    let s = if num.ends_with('s') { "s" } else { "" };
    if (100..=999).contains(&(year % 1000)) {
        if right == 0 {
            return format!("{left} hundred{s}");
        }
        if right < 10 {
            return format!("{left} oh {right}{s}");
        }
    }
    format!("{left} {right}{s}")
}

/// "$5" → "5 dollars", "£3.5" → "3 pounds and 50 pence".
fn flip_money(caps: &Captures) -> String {
    let m = &caps[0];
    let dollars = m.starts_with('$');
    let bill = if dollars { "dollar" } else { "pound" };
    let amount = &m[m.char_indices().nth(1).map_or(m.len(), |(i, _)| i)..];

    if amount.chars().last().is_some_and(char::is_alphabetic) {
        return format!("{amount} {bill}s");
    }
    let Some((whole, frac)) = amount.split_once('.') else {
        let s = if amount == "1" { "" } else { "s" };
        return format!("{amount} {bill}{s}");
    };

    let s = if whole == "1" { "" } else { "s" };
    let cents: u32 = format!("{frac:0<2}").parse().unwrap_or(0);
    let coins = match (dollars, cents == 1) {
        (true, true) => "cent",
        (true, false) => "cents",
        (false, true) => "penny",
        (false, false) => "pence",
    };
    format!("{whole} {bill}{s} and {cents} {coins}")
}

/// "3.14" → "3 point 1 4".
fn point_num(caps: &Captures) -> String {
    let (whole, frac) = caps[0].split_once('.').unwrap_or((&caps[0], ""));
    let digits: Vec<String> = frac.chars().map(String::from).collect();
    format!("{whole} point {}", digits.join(" "))
}

/// Normalise one chunk of user text for the phonemiser.
///
/// The window splits text on `.` before synthesis, so the rules that match a
/// period (honorifics, `etc.`, decimals, cents, dotted acronyms) only fire for
/// callers passing whole sentences to [`KokoroOnnx::synthesize`].
///
/// [`KokoroOnnx::synthesize`]: crate::model::KokoroOnnx::synthesize
pub fn normalize(text: &str) -> String {
    let mut t = text
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['«', '\u{201C}', '»', '\u{201D}'], "\"")
        .replace('(', "«")
        .replace(')', "»");
    for (from, to) in ['、', '。', '！', '，', '：', '；', '？'].into_iter().zip([",", ".", "!", ",", ":", ";", "?"]) {
        t = t.replace(from, &format!("{to} "));
    }

    let t = RE_ODD_SPACE.replace_all(&t, " ");
    let t = RE_MULTI_SPACE.replace_all(&t, " ");
    let t = RE_BLANK_LINE.replace_all(&t, "");
    let t = RE_DOCTOR.replace_all(&t, "Doctor");
    let t = RE_MISTER.replace_all(&t, "Mister");
    let t = RE_MISS.replace_all(&t, "Miss");
    let t = RE_MRS.replace_all(&t, "Mrs");
    let t = RE_ETC.replace_all(&t, "etc");
    let t = RE_YEAH.replace_all(&t, "${1}e'a");
    let t = RE_SPLIT_NUM.replace_all(&t, split_num);
    let t = RE_THOUSANDS.replace_all(&t, "");
    let t = RE_MONEY.replace_all(&t, flip_money);
    let t = RE_DECIMAL.replace_all(&t, point_num);
    let t = RE_RANGE.replace_all(&t, " to ");
    let t = RE_DIGIT_S.replace_all(&t, " S");
    let t = RE_CAPS_PLURAL.replace_all(&t, "'S");
    let t = RE_X_PLURAL.replace_all(&t, "s");
    let t = RE_DOTTED_ACRONYM.replace_all(&t, |c: &Captures| c[0].replace('.', "-"));
    let t = RE_INNER_DOT.replace_all(&t, "-");

    t.trim().to_string()
}
