//! ISBN normalization and check-digit helpers.
//!
//! Instance splitting keys off the ISBNs of a record's 020 fields. Raw values
//! look like `0-19-852663-6`, `9780306406157 (pbk.)` or `0306406152 : $25.00`;
//! this module reduces them to bare numbers plus an optional qualifier and
//! computes the corrected ISBN-13 (EAN-13) form.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref QUALIFIER: Regex = Regex::new(r"\(([^)]*)\)").expect("valid regex");
}

/// Strips hyphens and spaces.
fn normalize(isbn: &str) -> String {
    isbn.replace(['-', ' '], "")
}

/// Splits a raw 020$a value into its number and qualifier.
///
/// The number is the leading run of digits, hyphens, spaces and `X`; the
/// qualifier is the first parenthesised text, with trailing punctuation
/// dropped (`(pbk.)` gives `pbk`). Returns `None` if the number is not 10 or 13
/// characters long once normalized.
#[must_use]
pub fn parse_isbn(raw: &str) -> Option<(String, Option<String>)> {
    let number: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '-' | ' ' | 'X' | 'x'))
        .filter(|c| !matches!(c, '-' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if !matches!(number.len(), 10 | 13) || number[..number.len() - 1].contains('X') {
        return None;
    }

    let qualifier = QUALIFIER
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().trim_end_matches(['.', ';', ':', ',']).trim().to_string())
        .filter(|q| !q.is_empty());

    Some((number, qualifier))
}

/// Normalizes raw ISBN strings into a sorted, de-duplicated set of
/// `(number, qualifier)` pairs.
///
/// Sorting makes downstream entity ids independent of input order. Values that
/// do not look like an ISBN at all are dropped.
pub fn isbn_list<'a, I>(raw: I) -> BTreeSet<(String, Option<String>)>
where
    I: IntoIterator<Item = &'a str>,
{
    raw.into_iter().filter_map(parse_isbn).collect()
}

/// Returns the ISBN-13 form of `number` with a corrected check digit.
///
/// ISBN-10 input gains the `978` prefix. Input of any other length, or with
/// characters other than ASCII, is returned normalized but otherwise unchanged.
///
/// # Examples
///
/// ```
/// use marc2bf::isbn::compute_ean13_check;
///
/// assert_eq!(compute_ean13_check("0198526636"), "9780198526636");
/// assert_eq!(compute_ean13_check("9780306406150"), "9780306406157");
/// ```
#[must_use]
pub fn compute_ean13_check(number: &str) -> String {
    let clean = normalize(number);
    if !clean.is_ascii() {
        return clean;
    }
    let stem = match clean.len() {
        10 => format!("978{}", &clean[..9]),
        13 => clean[..12].to_string(),
        _ => return clean,
    };
    match ean13_check_digit(&stem) {
        Some(check) => format!("{stem}{check}"),
        None => clean,
    }
}

/// EAN-13 check digit for a 12-digit stem.
fn ean13_check_digit(stem: &str) -> Option<char> {
    let mut sum = 0;
    for (i, ch) in stem.chars().enumerate() {
        let digit = ch.to_digit(10)?;
        sum += if i % 2 == 0 { digit } else { digit * 3 };
    }
    char::from_digit((10 - sum % 10) % 10, 10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_isbn() {
        assert_eq!(
            parse_isbn("0-19-852663-6"),
            Some(("0198526636".to_string(), None))
        );
        assert_eq!(
            parse_isbn("0306406152 (pbk.)"),
            Some(("0306406152".to_string(), Some("pbk".to_string())))
        );
        assert_eq!(
            parse_isbn("080442957x : $25.00"),
            Some(("080442957X".to_string(), None))
        );
        assert_eq!(parse_isbn("not an isbn"), None);
        assert_eq!(parse_isbn("12345"), None);
    }

    #[test]
    fn test_isbn_list_sorts_and_dedups() {
        let list = isbn_list(["9780306406157", "0-19-852663-6", "0198526636"]);
        let numbers: Vec<_> = list.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(numbers, vec!["0198526636", "9780306406157"]);
    }

    #[test]
    fn test_compute_ean13_check() {
        assert_eq!(compute_ean13_check("0-19-852663-6"), "9780198526636");
        assert_eq!(compute_ean13_check("0306406152"), "9780306406157");
        assert_eq!(compute_ean13_check("9780306406157"), "9780306406157");
        assert_eq!(compute_ean13_check("080442957X"), "9780804429573");
    }

    #[test]
    fn test_compute_ean13_check_leaves_non_ascii_alone() {
        assert_eq!(compute_ean13_check("12345678é"), "12345678é");
        assert_eq!(compute_ean13_check("978-030640615é"), "978030640615é");
    }

    #[test]
    fn test_wrong_check_digit_is_kept_and_corrected() {
        let list = isbn_list(["9780306406150"]);
        let (number, _) = list.iter().next().unwrap();
        assert_eq!(compute_ean13_check(number), "9780306406157");
    }

    proptest! {
        #[test]
        fn isbn_list_ignores_input_order(mut values in prop::collection::vec(
            prop::sample::select(vec![
                "0-19-852663-6",
                "0306406152 (pbk.)",
                "9780306406157",
                "080442957X (hardcover)",
                "bogus",
            ]),
            0..8,
        ), seed in any::<u64>()) {
            let forward = isbn_list(values.iter().copied());
            let len = values.len();
            if len > 1 {
                let k = usize::try_from(seed % (len as u64)).unwrap();
                values.rotate_left(k);
                values.reverse();
            }
            let shuffled = isbn_list(values.iter().copied());
            prop_assert_eq!(forward, shuffled);
        }
    }
}
