// =============================================================================
// Group Averages
// =============================================================================
//
// Cross-sectional means over a grouping key, typically sector. Groups are
// formed from whatever symbols actually carry a value; empty groups do not
// appear in the output.
// =============================================================================

use std::collections::BTreeMap;

/// Mean of a per-symbol metric inside one group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupAverage {
    pub group: String,
    pub mean: f64,
    pub members: usize,
}

/// Average `values` by the key `grouping` assigns each symbol.
///
/// Non-finite values are skipped so a single bad quote cannot poison a
/// whole sector's mean. Output is sorted by group name.
pub fn group_averages<F>(values: &[(String, f64)], grouping: F) -> Vec<GroupAverage>
where
    F: Fn(&str) -> String,
{
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for (symbol, value) in values {
        if !value.is_finite() {
            continue;
        }
        let key = grouping(symbol);
        let entry = sums.entry(key).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }

    sums.into_iter()
        .map(|(group, (sum, members))| GroupAverage {
            group,
            mean: sum / members as f64,
            members,
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn sector_of(symbol: &str) -> String {
        match symbol {
            "AAPL" | "MSFT" => "Technology".to_string(),
            "JPM" => "Financial Services".to_string(),
            _ => "Unknown".to_string(),
        }
    }

    #[test]
    fn means_by_sector() {
        let values = vec![
            ("AAPL".to_string(), 2.0),
            ("MSFT".to_string(), 4.0),
            ("JPM".to_string(), -1.0),
        ];

        let groups = group_averages(&values, sector_of);
        assert_eq!(
            groups,
            vec![
                GroupAverage {
                    group: "Financial Services".to_string(),
                    mean: -1.0,
                    members: 1,
                },
                GroupAverage {
                    group: "Technology".to_string(),
                    mean: 3.0,
                    members: 2,
                },
            ]
        );
    }

    #[test]
    fn empty_groups_are_omitted() {
        let values = vec![("AAPL".to_string(), 1.5)];
        let groups = group_averages(&values, sector_of);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].group, "Technology");
    }

    #[test]
    fn non_finite_values_are_skipped() {
        let values = vec![
            ("AAPL".to_string(), f64::NAN),
            ("MSFT".to_string(), 6.0),
        ];

        let groups = group_averages(&values, sector_of);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members, 1);
        assert!((groups[0].mean - 6.0).abs() < 1e-12);
    }

    #[test]
    fn no_values_no_groups() {
        let groups = group_averages(&[], sector_of);
        assert!(groups.is_empty());
    }
}
