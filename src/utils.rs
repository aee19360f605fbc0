//! Text, price, and attribute normalization shared by adapters.

use serde_json::{Map, Value};

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_inline_whitespace<T: AsRef<str>>(text: T) -> String {
    let mut normalized = String::new();
    let mut seen_space = false;
    for ch in text.as_ref().chars() {
        if ch.is_whitespace() {
            if !seen_space {
                normalized.push(' ');
                seen_space = true;
            }
        } else {
            normalized.push(ch);
            seen_space = false;
        }
    }
    normalized.trim().to_string()
}

/// Replace `<...>` markup with spaces; an unterminated `<` is kept as text.
pub fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) if close > 1 => {
                out.push(' ');
                rest = &rest[open + close + 1..];
            }
            _ => {
                out.push('<');
                rest = &rest[open + 1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Strip markup, collapse whitespace, and map blank results to `None`.
pub fn normalize_text(raw: Option<&str>) -> Option<String> {
    let normalized = normalize_inline_whitespace(strip_tags(raw?));
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Trim a raw scalar and map blanks (and pandas-style `nan`) to `None`.
pub fn clean_value(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") || trimmed == "\\N" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

const CURRENCY_SYMBOLS: [(char, &str); 4] =
    [('$', "USD"), ('€', "EUR"), ('£', "GBP"), ('¥', "JPY")];
const CURRENCY_CODES: [&str; 6] = ["USD", "EUR", "GBP", "JPY", "CHF", "CAD"];

/// Parse strings like `$1,299.99`, `€ 12,50`, or `12.5` into `(amount, currency)`.
///
/// The separator that appears last is treated as the decimal point when it is
/// followed by one or two digits; other separators are thousands marks.
pub fn parse_price_currency(raw: Option<&str>) -> (Option<f64>, Option<String>) {
    let Some(raw) = raw else {
        return (None, None);
    };
    let currency = detect_currency(raw);

    let Some(start) = raw.find(|ch: char| ch.is_ascii_digit()) else {
        return (None, currency);
    };
    let number: String = raw[start..]
        .chars()
        .take_while(|ch| ch.is_ascii_digit() || *ch == '.' || *ch == ',')
        .collect();
    let number = number.trim_end_matches(['.', ',']);

    let decimal_sep = number.rfind(['.', ',']).filter(|pos| {
        let tail = &number[pos + 1..];
        (1..=2).contains(&tail.len())
            || (number.as_bytes()[*pos] == b'.' && !number[..*pos].contains('.'))
    });
    let mut canonical = String::with_capacity(number.len());
    for (idx, ch) in number.char_indices() {
        if ch.is_ascii_digit() {
            canonical.push(ch);
        } else if Some(idx) == decimal_sep {
            canonical.push('.');
        }
    }
    (canonical.parse::<f64>().ok(), currency)
}

fn detect_currency(raw: &str) -> Option<String> {
    for (symbol, code) in CURRENCY_SYMBOLS {
        if raw.contains(symbol) {
            return Some(code.to_string());
        }
    }
    let upper = raw.to_ascii_uppercase();
    CURRENCY_CODES
        .iter()
        .find(|code| upper.contains(*code))
        .map(|code| (*code).to_string())
}

/// Serialize leftover raw columns into the opaque `attrs` JSON text.
///
/// Keys keep source column order; blank values are omitted.
pub fn attrs_json<'a, I>(pairs: I) -> Result<String, serde_json::Error>
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    let mut map = Map::new();
    for (key, value) in pairs {
        if let Some(value) = clean_value(value) {
            map.insert(key.to_string(), Value::String(value));
        }
    }
    serde_json::to_string(&Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_inline_whitespace_collapses_runs() {
        let input = "Alpha\n\n  Beta\tGamma";
        assert_eq!(normalize_inline_whitespace(input), "Alpha Beta Gamma");
    }

    #[test]
    fn normalize_text_strips_markup_and_blanks() {
        assert_eq!(
            normalize_text(Some("<b>Sony</b>  Bravia<br/>40\"")).as_deref(),
            Some("Sony Bravia 40\"")
        );
        assert_eq!(normalize_text(Some("  <p> </p> ")), None);
        assert_eq!(normalize_text(None), None);
        assert_eq!(normalize_text(Some("a < b")).as_deref(), Some("a < b"));
    }

    #[test]
    fn prices_parse_with_symbols_and_separators() {
        assert_eq!(
            parse_price_currency(Some("$1,299.99")),
            (Some(1299.99), Some("USD".into()))
        );
        assert_eq!(
            parse_price_currency(Some("€ 12,50")),
            (Some(12.5), Some("EUR".into()))
        );
        assert_eq!(parse_price_currency(Some("12.5")), (Some(12.5), None));
        assert_eq!(parse_price_currency(Some("1.299,00 EUR")).0, Some(1299.0));
        assert_eq!(parse_price_currency(Some("1,000")).0, Some(1000.0));
        assert_eq!(parse_price_currency(Some("n/a")), (None, None));
        assert_eq!(parse_price_currency(None), (None, None));
    }

    #[test]
    fn attrs_keep_order_and_skip_blanks() {
        let json = attrs_json([("zeta", Some("1")), ("alpha", Some(" ")), ("mid", Some("x"))])
            .unwrap();
        assert_eq!(json, r#"{"zeta":"1","mid":"x"}"#);
        assert_eq!(attrs_json(Vec::<(&str, Option<&str>)>::new()).unwrap(), "{}");
    }
}
