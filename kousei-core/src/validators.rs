// File: kousei-core/src/validators.rs
//! Checksum validation for number formats the security guards look for.
//!
//! Pattern matching alone produces too many false positives for card and national ID
//! numbers, so candidate spans are confirmed with their check-digit algorithms.
//!
//! License: MIT OR APACHE 2.0

/// Collects the ASCII and fullwidth digits of `s`, ignoring spaces and hyphens.
/// Returns `None` if any other character is present.
pub fn normalized_digits(s: &str) -> Option<Vec<u32>> {
    let mut digits = Vec::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '0'..='9' => digits.push(c as u32 - '0' as u32),
            '０'..='９' => digits.push(c as u32 - '０' as u32),
            ' ' | '-' | '－' => {}
            _ => return None,
        }
    }
    Some(digits)
}

/// Luhn (mod 10) checksum over a digit sequence.
pub fn is_valid_luhn(digits: &[u32]) -> bool {
    if digits.len() < 2 {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// A payment card candidate: 13 to 19 digits, separators allowed, Luhn-valid.
pub fn is_valid_credit_card(candidate: &str) -> bool {
    let Some(digits) = normalized_digits(candidate) else { return false };
    (13..=19).contains(&digits.len()) && is_valid_luhn(&digits)
}

fn is_card_digit(c: char) -> bool {
    c.is_ascii_digit() || ('０'..='９').contains(&c)
}

fn is_card_separator(c: char) -> bool {
    matches!(c, ' ' | '-' | '－')
}

/// Byte ranges of every Luhn-valid card number in `text`.
///
/// The text is split into runs of digits and separators with no length cap. Inside each
/// run, windows aligned to digit groups are tried from each group onward, longest first,
/// so a card followed or preceded by unrelated numbers in the same run is still found.
pub fn find_card_numbers(text: &str) -> Vec<(usize, usize)> {
    let mut found = Vec::new();
    let mut groups: Vec<(usize, usize)> = Vec::new();
    for (i, c) in text.char_indices() {
        if is_card_digit(c) {
            let end = i + c.len_utf8();
            match groups.last_mut() {
                Some(last) if last.1 == i => last.1 = end,
                _ => groups.push((i, end)),
            }
        } else if !is_card_separator(c) {
            scan_card_run(text, &groups, &mut found);
            groups.clear();
        }
    }
    scan_card_run(text, &groups, &mut found);
    found
}

fn scan_card_run(text: &str, groups: &[(usize, usize)], found: &mut Vec<(usize, usize)>) {
    let mut i = 0;
    while i < groups.len() {
        let mut digits = 0;
        let mut longest = None;
        for (j, group) in groups.iter().enumerate().skip(i) {
            digits += text[group.0..group.1].chars().count();
            if digits > 19 {
                break;
            }
            if is_valid_credit_card(&text[groups[i].0..group.1]) {
                longest = Some(j);
            }
        }
        match longest {
            Some(j) => {
                found.push((groups[i].0, groups[j].1));
                i = j + 1;
            }
            None => i += 1,
        }
    }
}

/// Japanese Individual Number (My Number): 12 digits, the last being a check digit.
///
/// Weights run 2..=7 then 2..=6 from the digit left of the check digit; the check digit
/// is `11 - (sum % 11)`, or 0 when the remainder is 0 or 1.
pub fn is_valid_my_number(candidate: &str) -> bool {
    let Some(digits) = normalized_digits(candidate) else { return false };
    if digits.len() != 12 {
        return false;
    }
    let (body, check) = digits.split_at(11);
    let sum: u32 = body
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &p)| {
            let n = i as u32 + 1;
            let q = if n <= 6 { n + 1 } else { n - 5 };
            p * q
        })
        .sum();
    let remainder = sum % 11;
    let expected = if remainder <= 1 { 0 } else { 11 - remainder };
    check[0] == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luhn_known_numbers() {
        assert!(is_valid_credit_card("4111111111111111"));
        assert!(is_valid_credit_card("4111-1111-1111-1111"));
        assert!(is_valid_credit_card("５５５５５５５５５５５５４４４４"));
        assert!(!is_valid_credit_card("4111111111111112"));
        assert!(!is_valid_credit_card("411111111111"));
        assert!(!is_valid_credit_card("4111x11111111111"));
    }

    #[test]
    fn test_card_found_next_to_other_numbers() {
        let text = "カード 4111111111111111 1234567890123456 です";
        let start = text.find('4').unwrap_or_default();
        assert_eq!(find_card_numbers(text), vec![(start, start + 16)]);

        let grouped = "4111 1111 1111 1111 2024 0101 9999";
        assert_eq!(find_card_numbers(grouped), vec![(0, "4111 1111 1111 1111".len())]);

        let trailing = "2024 0101 4111-1111-1111-1111";
        let spans = find_card_numbers(trailing);
        assert_eq!(spans.len(), 1);
        assert_eq!(&trailing[spans[0].0..spans[0].1], "4111-1111-1111-1111");
    }

    #[test]
    fn test_card_search_without_cards() {
        assert!(find_card_numbers("注文番号は4111111111111112です").is_empty());
        assert!(find_card_numbers("2024 0101 9999").is_empty());
        assert!(find_card_numbers("").is_empty());
    }

    #[test]
    fn test_my_number_check_digit() {
        assert!(is_valid_my_number("123456789018"));
        assert!(is_valid_my_number("1234-5678-9018"));
        assert!(!is_valid_my_number("123456789012"));
        assert!(!is_valid_my_number("12345678901"));
    }
}
