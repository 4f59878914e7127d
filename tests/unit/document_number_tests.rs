// Unit tests for document number minting.
//
// Tests verify:
// 1. Format: PFX/YYYY/MON/DD/N for documents, LOT/YYYY/MM/DD/N for lots
// 2. Gap-filling: the least absent positive integer is chosen
// 3. Daily reset: numbering restarts at 1 each day
// 4. Concurrent mints on one snapshot collide and resolve by remint

use std::collections::HashSet;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Date prefix for business documents: PFX/YYYY/MON/DD
fn document_date_prefix(prefix: &str, year: i32, month: u32, day: u32) -> String {
    format!(
        "{}/{}/{}/{:02}",
        prefix,
        year,
        MONTH_ABBREVIATIONS[(month - 1) as usize],
        day
    )
}

/// Date prefix for lots: LOT/YYYY/MM/DD
fn lot_date_prefix(year: i32, month: u32, day: u32) -> String {
    format!("LOT/{}/{:02}/{:02}", year, month, day)
}

/// Least absent positive integer under the prefix (matches production logic)
fn next_in_sequence<'a>(existing: impl IntoIterator<Item = &'a str>, date_prefix: &str) -> i32 {
    let used: HashSet<i32> = existing
        .into_iter()
        .filter_map(|number| number.strip_prefix(date_prefix))
        .filter_map(|rest| rest.strip_prefix('/'))
        .filter(|tail| !tail.contains('/'))
        .filter_map(|tail| tail.parse::<i32>().ok())
        .filter(|n| *n > 0)
        .collect();

    let mut candidate = 1;
    while used.contains(&candidate) {
        candidate += 1;
    }
    candidate
}

/// Mint against a set of issued numbers, enforcing the unique index:
/// a duplicate insert is rejected and the caller remints.
fn mint_with_unique_index(issued: &mut HashSet<String>, date_prefix: &str) -> String {
    loop {
        let n = next_in_sequence(issued.iter().map(|s| s.as_str()), date_prefix);
        let number = format!("{}/{}", date_prefix, n);
        if issued.insert(number.clone()) {
            return number;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: document formats match the published examples
    #[test]
    fn test_document_number_formats() {
        assert_eq!(document_date_prefix("GRN", 2025, 7, 20), "GRN/2025/JUL/20");
        assert_eq!(document_date_prefix("SO", 2025, 7, 20), "SO/2025/JUL/20");
        assert_eq!(document_date_prefix("SC", 2025, 7, 21), "SC/2025/JUL/21");
        assert_eq!(document_date_prefix("PO", 2025, 12, 3), "PO/2025/DEC/03");
    }

    /// Test: lot numbers keep the numeric month
    #[test]
    fn test_lot_number_format() {
        assert_eq!(lot_date_prefix(2025, 7, 20), "LOT/2025/07/20");
        assert_eq!(lot_date_prefix(2026, 1, 5), "LOT/2026/01/05");
    }

    /// Test: scenario - GRN/2025/JUL/20/1 and /3 exist, next mint fills /2
    #[test]
    fn test_gap_fill_returns_least_absent() {
        // Arrange
        let existing = ["GRN/2025/JUL/20/1", "GRN/2025/JUL/20/3"];

        // Act
        let next = next_in_sequence(existing, "GRN/2025/JUL/20");

        // Assert
        assert_eq!(next, 2);
    }

    /// Test: contiguous numbers extend the sequence
    #[test]
    fn test_contiguous_numbers_extend() {
        let existing = [
            "SO/2025/JUL/20/1",
            "SO/2025/JUL/20/2",
            "SO/2025/JUL/20/3",
        ];
        assert_eq!(next_in_sequence(existing, "SO/2025/JUL/20"), 4);
    }

    /// Test: numbers from other days never influence today's sequence
    #[test]
    fn test_daily_reset() {
        let existing = [
            "GRN/2025/JUL/19/1",
            "GRN/2025/JUL/19/2",
            "GRN/2025/JUN/20/1",
        ];
        assert_eq!(next_in_sequence(existing, "GRN/2025/JUL/20"), 1);
    }

    /// Test: malformed trailing components are skipped, not fatal
    #[test]
    fn test_malformed_numbers_ignored() {
        let existing = [
            "GRN/2025/JUL/20/abc",
            "GRN/2025/JUL/20/1/extra",
            "GRN/2025/JUL/20/0",
            "GRN/2025/JUL/20/2",
        ];
        assert_eq!(next_in_sequence(existing, "GRN/2025/JUL/20"), 1);
    }

    /// Test: two mints that read the same snapshot pick the same number;
    /// the unique index rejects the loser, whose remint picks the next gap
    #[test]
    fn test_concurrent_mints_resolve_by_remint() {
        // Arrange: both writers see one existing number
        let snapshot = ["SC/2025/JUL/21/1"];
        let first_pick = next_in_sequence(snapshot, "SC/2025/JUL/21");
        let second_pick = next_in_sequence(snapshot, "SC/2025/JUL/21");
        assert_eq!(first_pick, second_pick, "same snapshot, same pick");

        // Act: both insert against the unique index
        let mut issued: HashSet<String> =
            snapshot.iter().map(|s| s.to_string()).collect();
        let winner = mint_with_unique_index(&mut issued, "SC/2025/JUL/21");
        let loser = mint_with_unique_index(&mut issued, "SC/2025/JUL/21");

        // Assert: no duplicates issued
        assert_eq!(winner, "SC/2025/JUL/21/2");
        assert_eq!(loser, "SC/2025/JUL/21/3");
        assert_eq!(issued.len(), 3);
    }

    /// Test: mint never issues a duplicate over many sequential mints
    #[test]
    fn test_sequential_mints_are_unique() {
        let mut issued: HashSet<String> = HashSet::new();

        for _ in 0..50 {
            mint_with_unique_index(&mut issued, "LOT/2025/07/20");
        }

        assert_eq!(issued.len(), 50);
        // With no deletions the sequence is dense from 1 to 50
        for n in 1..=50 {
            assert!(issued.contains(&format!("LOT/2025/07/20/{}", n)));
        }
    }

    /// Test: a deleted number is reused by the next mint
    #[test]
    fn test_deleted_number_is_reused() {
        let mut issued: HashSet<String> = HashSet::new();
        for _ in 0..5 {
            mint_with_unique_index(&mut issued, "GRN/2025/JUL/20");
        }

        // Delete GRN/2025/JUL/20/2 (document removed, number freed)
        issued.remove("GRN/2025/JUL/20/2");

        let reminted = mint_with_unique_index(&mut issued, "GRN/2025/JUL/20");
        assert_eq!(reminted, "GRN/2025/JUL/20/2");
    }
}
