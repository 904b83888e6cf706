//! Named clean rules.

use std::sync::LazyLock;

use recmap_model::{CleanRule, Value};
use regex::Regex;

static ROMAN_NUMERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(IV|V|I{1,3})\b").expect("Invalid roman numeral regex"));
static TNM_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\A[cpyra]*[TNM]").expect("Invalid TNM prefix regex"));
static ICD_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A[A-Z][0-9]{2}").expect("Invalid ICD code regex"));

/// Applies clean rules in sequence. Non-text scalars pass through.
pub(crate) fn apply_rules(value: Value, rules: &[CleanRule]) -> Value {
    rules.iter().fold(value, |value, rule| apply_rule(value, *rule))
}

fn apply_rule(value: Value, rule: CleanRule) -> Value {
    match value {
        Value::Text(text) => clean_text(&text, rule),
        Value::List(items) => Value::List(
            items
                .into_iter()
                .map(|item| apply_rule(item, rule))
                .collect(),
        ),
        Value::Integer(number) if rule != CleanRule::Itself => {
            clean_text(&number.to_string(), rule)
        }
        other => other,
    }
}

fn clean_text(text: &str, rule: CleanRule) -> Value {
    let cleaned = match rule {
        CleanRule::Itself => text.to_string(),
        CleanRule::Upcase => text.to_uppercase(),
        CleanRule::Downcase => text.to_lowercase(),
        CleanRule::Name => clean_name(text),
        CleanRule::NhsNumber => text.chars().filter(char::is_ascii_digit).collect(),
        CleanRule::Postcode => clean_postcode(text),
        CleanRule::Sex => clean_sex(text),
        CleanRule::Code => code_tokens(text).join(" "),
        CleanRule::CodeIcd => clean_code_icd(text),
        CleanRule::Roman5 => clean_roman5(text),
        CleanRule::TnmCategory => clean_tnm_category(text),
        CleanRule::XmlSafe => text.chars().filter(|ch| is_xml_char(*ch)).collect(),
    };
    Value::Text(cleaned)
}

fn clean_name(text: &str) -> String {
    let kept: String = text
        .to_uppercase()
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || ch == '-' || ch == '\'' {
                ch
            } else {
                ' '
            }
        })
        .collect();
    squash(&kept)
}

fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Formats a UK postcode as `OUTWARD INWARD`. Strings that cannot be a
/// postcode are returned upper-cased without spaces.
fn clean_postcode(text: &str) -> String {
    let compact: String = text
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_uppercase())
        .collect();
    if (5..=7).contains(&compact.len()) {
        let (outward, inward) = compact.split_at(compact.len() - 3);
        format!("{outward} {inward}")
    } else {
        compact
    }
}

/// Normalizes sex to the NHS data dictionary codes `1` (male) and `2` (female).
fn clean_sex(text: &str) -> String {
    let upper = text.trim().to_uppercase();
    match upper.as_str() {
        "1" | "M" | "MALE" => "1".to_string(),
        "2" | "F" | "FEMALE" => "2".to_string(),
        "0" | "U" | "UNKNOWN" | "NOT KNOWN" => "0".to_string(),
        "9" | "NOT SPECIFIED" => "9".to_string(),
        _ => upper,
    }
}

fn code_tokens(text: &str) -> Vec<String> {
    text.split(|ch: char| ch.is_whitespace() || ch == ',' || ch == ';')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .map(|ch| ch.to_ascii_uppercase())
                .collect::<String>()
        })
        .filter(|token| !token.is_empty())
        .collect()
}

/// Keeps tokens shaped like ICD-10 codes, truncated to four characters.
fn clean_code_icd(text: &str) -> String {
    let mut codes: Vec<String> = Vec::new();
    for token in code_tokens(text) {
        if !ICD_CODE.is_match(&token) {
            continue;
        }
        let code: String = token.chars().take(4).collect();
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes.join(" ")
}

fn clean_roman5(text: &str) -> String {
    ROMAN_NUMERAL
        .replace_all(text, |caps: &regex::Captures<'_>| {
            match caps[1].to_uppercase().as_str() {
                "I" => "1",
                "II" => "2",
                "III" => "3",
                "IV" => "4",
                _ => "5",
            }
            .to_string()
        })
        .into_owned()
}

/// `T2A` -> `2a`, `pNX` -> `X`: drop the category prefix, keep `X` upper case.
fn clean_tnm_category(text: &str) -> String {
    let trimmed = text.trim();
    let stripped = TNM_PREFIX.replace(trimmed, "");
    stripped
        .chars()
        .map(|ch| {
            if ch.eq_ignore_ascii_case(&'x') {
                'X'
            } else {
                ch.to_ascii_lowercase()
            }
        })
        .collect()
}

fn is_xml_char(ch: char) -> bool {
    matches!(ch, '\t' | '\n' | '\r')
        || ('\u{20}'..='\u{D7FF}').contains(&ch)
        || ('\u{E000}'..='\u{FFFD}').contains(&ch)
        || ('\u{10000}'..='\u{10FFFF}').contains(&ch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(text: &str, rule: CleanRule) -> String {
        apply_rules(Value::from(text), &[rule]).to_string()
    }

    #[test]
    fn name_is_upcased_and_squashed() {
        assert_eq!(clean("  o'brien,  mary-jane ", CleanRule::Name), "O'BRIEN MARY-JANE");
    }

    #[test]
    fn nhsnumber_keeps_digits() {
        assert_eq!(clean("943 476 5919", CleanRule::NhsNumber), "9434765919");
    }

    #[test]
    fn postcode_is_normalized() {
        assert_eq!(clean("cb30ds", CleanRule::Postcode), "CB3 0DS");
        assert_eq!(clean(" CB3  0DS ", CleanRule::Postcode), "CB3 0DS");
        assert_eq!(clean("sw1a1aa", CleanRule::Postcode), "SW1A 1AA");
        assert_eq!(clean("xx", CleanRule::Postcode), "XX");
    }

    #[test]
    fn sex_is_coded() {
        assert_eq!(clean("Male", CleanRule::Sex), "1");
        assert_eq!(clean("f", CleanRule::Sex), "2");
        assert_eq!(clean("other", CleanRule::Sex), "OTHER");
    }

    #[test]
    fn codes_are_tokenized() {
        assert_eq!(clean("c50.9, c44.1;z51", CleanRule::Code), "C509 C441 Z51");
        assert_eq!(clean("C50.9 C50.91 X 12", CleanRule::CodeIcd), "C509");
    }

    #[test]
    fn roman_numerals_become_digits() {
        assert_eq!(clean("Stage IV", CleanRule::Roman5), "Stage 4");
        assert_eq!(clean("grade ii", CleanRule::Roman5), "grade 2");
        assert_eq!(clean("VIVID", CleanRule::Roman5), "VIVID");
    }

    #[test]
    fn tnm_category_drops_prefix() {
        assert_eq!(clean("T2A", CleanRule::TnmCategory), "2a");
        assert_eq!(clean("pNX", CleanRule::TnmCategory), "X");
        assert_eq!(clean("1b", CleanRule::TnmCategory), "1b");
    }

    #[test]
    fn xmlsafe_drops_control_characters() {
        assert_eq!(clean("a\u{1}b\tc", CleanRule::XmlSafe), "ab\tc");
    }

    #[test]
    fn rules_run_in_sequence() {
        let value = apply_rules(
            Value::from(" Hello "),
            &[CleanRule::Upcase, CleanRule::Downcase],
        );
        assert_eq!(value, Value::from(" hello "));
    }
}
