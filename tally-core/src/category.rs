//! Deterministic category inference from free-text descriptions.
//!
//! No LLM needed: keyword tables cover the common phrasings. Longest
//! matching keyword wins; anything unmatched lands in "Other".

use crate::operation::TxKind;

/// Label used when no keyword matches.
pub const DEFAULT_CATEGORY: &str = "Other";

const EXPENSE_KEYWORDS: &[(&str, &str)] = &[
    // Food
    ("lunch", "Food"),
    ("dinner", "Food"),
    ("breakfast", "Food"),
    ("food", "Food"),
    ("restaurant", "Food"),
    ("groceries", "Food"),
    ("grocery", "Food"),
    ("market", "Food"),
    ("supermarket", "Food"),
    ("pizza", "Food"),
    ("burger", "Food"),
    ("coffee", "Food"),
    ("cafe", "Food"),
    ("snack", "Food"),
    // Transport
    ("uber", "Transport"),
    ("taxi", "Transport"),
    ("bus", "Transport"),
    ("train", "Transport"),
    ("fuel", "Transport"),
    ("gasoline", "Transport"),
    ("gas", "Transport"),
    ("parking", "Transport"),
    ("toll", "Transport"),
    ("tires", "Transport"),
    ("mechanic", "Transport"),
    ("car", "Transport"),
    // Health
    ("pharmacy", "Health"),
    ("medicine", "Health"),
    ("doctor", "Health"),
    ("dentist", "Health"),
    ("hospital", "Health"),
    ("therapy", "Health"),
    ("gym", "Health"),
    // Leisure
    ("movie", "Leisure"),
    ("cinema", "Leisure"),
    ("netflix", "Leisure"),
    ("spotify", "Leisure"),
    ("game", "Leisure"),
    ("concert", "Leisure"),
    ("bar", "Leisure"),
    ("party", "Leisure"),
    ("trip", "Leisure"),
    ("travel", "Leisure"),
    ("hotel", "Leisure"),
    // Clothing
    ("clothes", "Clothing"),
    ("clothing", "Clothing"),
    ("shirt", "Clothing"),
    ("shoes", "Clothing"),
    ("sneakers", "Clothing"),
    ("pants", "Clothing"),
    ("dress", "Clothing"),
    ("jacket", "Clothing"),
    // Housing
    ("rent", "Housing"),
    ("electricity", "Housing"),
    ("water bill", "Housing"),
    ("internet", "Housing"),
    ("phone bill", "Housing"),
    ("condo", "Housing"),
];

const INCOME_KEYWORDS: &[(&str, &str)] = &[
    ("salary", "Salary"),
    ("wage", "Salary"),
    ("paycheck", "Salary"),
    ("payroll", "Salary"),
    ("freelance", "Freelance"),
    ("gig", "Freelance"),
    ("client", "Freelance"),
    ("consulting", "Freelance"),
    ("commission", "Freelance"),
];

/// Infer a default category label for a description. Total function:
/// every input (including the empty string) maps to one non-empty label.
pub fn infer(description: &str, kind: TxKind) -> &'static str {
    let text = normalize(description);
    let table = match kind {
        TxKind::Expense => EXPENSE_KEYWORDS,
        TxKind::Income => INCOME_KEYWORDS,
    };

    let mut best: Option<(&str, &str)> = None;
    for &(keyword, label) in table {
        if text.contains(keyword) && best.is_none_or(|(k, _)| keyword.len() > k.len()) {
            best = Some((keyword, label));
        }
    }
    best.map(|(_, label)| label).unwrap_or(DEFAULT_CATEGORY)
}

/// Lowercase and fold common diacritics so accented spellings still match.
fn normalize(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .map(fold_diacritic)
        .collect()
}

fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expense_keywords() {
        assert_eq!(infer("lunch at the corner place", TxKind::Expense), "Food");
        assert_eq!(infer("Uber to the airport", TxKind::Expense), "Transport");
        assert_eq!(infer("new running shoes", TxKind::Expense), "Clothing");
        assert_eq!(infer("monthly rent", TxKind::Expense), "Housing");
    }

    #[test]
    fn test_income_keywords() {
        assert_eq!(infer("July salary", TxKind::Income), "Salary");
        assert_eq!(infer("freelance project payout", TxKind::Income), "Freelance");
    }

    #[test]
    fn test_longest_match_wins() {
        // "gas" and "gasoline" both match; the longer keyword decides.
        assert_eq!(infer("gasoline refill", TxKind::Expense), "Transport");
        // "business trip" contains both "bus" and "trip"; "trip" is longer.
        assert_eq!(infer("business trip", TxKind::Expense), "Leisure");
    }

    #[test]
    fn test_unmatched_and_empty_default_to_other() {
        assert_eq!(infer("mysterious purchase", TxKind::Expense), DEFAULT_CATEGORY);
        assert_eq!(infer("", TxKind::Expense), DEFAULT_CATEGORY);
        assert_eq!(infer("", TxKind::Income), DEFAULT_CATEGORY);
    }

    #[test]
    fn test_case_and_diacritics_are_folded() {
        assert_eq!(infer("CAFÉ con leche", TxKind::Expense), "Food");
        assert_eq!(infer("LUNCH", TxKind::Expense), "Food");
    }

    #[test]
    fn test_inference_is_idempotent() {
        let first = infer("dinner with friends", TxKind::Expense);
        let second = infer("dinner with friends", TxKind::Expense);
        assert_eq!(first, second);
    }
}
