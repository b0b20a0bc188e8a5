use chrono::{Datelike, NaiveDate};

const ROMAN_MONTHS: [&str; 12] = [
    "I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X", "XI", "XII",
];

/// Uppercase Roman numeral for a month number (1-12).
pub fn roman_month(month: u32) -> &'static str {
    ROMAN_MONTHS[(month.clamp(1, 12) - 1) as usize]
}

/// Two-letter code taken from the leading letters of the purpose's words.
pub fn purpose_initials(purpose: &str) -> String {
    let upper = purpose.to_uppercase();

    let mut initials: String = upper
        .split_whitespace()
        .filter_map(|word| word.chars().find(|c| c.is_alphabetic()))
        .take(2)
        .collect();

    if initials.chars().count() < 2 {
        initials = upper.chars().filter(|c| c.is_alphabetic()).take(2).collect();
    }
    while initials.chars().count() < 2 {
        initials.push('X');
    }
    initials
}

/// Display code of a letter-number request: `{id}/SPP-{initials}/{month}/{year}`.
pub fn format_letter_number(id: i32, submitted_on: NaiveDate, purpose: &str) -> String {
    format!(
        "{}/SPP-{}/{}/{}",
        id,
        purpose_initials(purpose),
        roman_month(submitted_on.month()),
        submitted_on.year()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn formats_two_word_purpose() {
        assert_eq!(
            format_letter_number(7, date(2024, 9, 21), "Surat Penawaran"),
            "7/SPP-SP/IX/2024"
        );
    }

    #[test]
    fn empty_purpose_pads_with_x() {
        assert_eq!(format_letter_number(3, date(2024, 1, 5), ""), "3/SPP-XX/I/2024");
    }

    #[test]
    fn single_word_reuses_its_letters() {
        assert_eq!(purpose_initials("undangan"), "UN");
        assert_eq!(purpose_initials("a"), "AX");
    }

    #[test]
    fn skips_leading_non_letters_in_words() {
        assert_eq!(purpose_initials("(rapat) 2024 koordinasi"), "RK");
        assert_eq!(purpose_initials("123 456"), "XX");
    }

    #[test]
    fn only_first_two_words_count() {
        assert_eq!(purpose_initials("surat keputusan direksi"), "SK");
    }

    #[test]
    fn every_month_has_a_numeral() {
        let all: Vec<&str> = (1..=12).map(roman_month).collect();
        assert_eq!(all[3], "IV");
        assert_eq!(all[11], "XII");
        assert_eq!(format_letter_number(12, date(2023, 12, 31), "Nota Dinas"), "12/SPP-ND/XII/2023");
    }
}
