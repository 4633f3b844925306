//! Grouping and summing of record subsets
//!
//! Every drill-down level of every report is built from [`group_by`]: sort
//! the subset on the level key, chunk contiguous equal keys, sum the amount
//! (null counts as zero), then order the groups by total descending with the
//! key ascending as tie-break.

use std::cmp::Ordering;

/// One group of a partitioned subset
#[derive(Debug, Clone)]
pub struct Group<'a, K, T> {
    pub key: K,
    pub total: f64,
    pub members: Vec<&'a T>,
}

impl<K, T> Group<'_, K, T> {
    /// First member; groups are never empty
    pub fn first(&self) -> &T {
        self.members[0]
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Partition `records` by `key`, summing `amount` per group
pub fn group_by<'a, T, K, FK, FA>(records: &'a [T], key: FK, amount: FA) -> Vec<Group<'a, K, T>>
where
    K: Ord + Clone,
    FK: Fn(&T) -> K,
    FA: Fn(&T) -> Option<f64>,
{
    let mut sorted: Vec<(K, &T)> = records.iter().map(|r| (key(r), r)).collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut groups: Vec<Group<'a, K, T>> = sorted
        .chunk_by(|a, b| a.0 == b.0)
        .map(|chunk| Group {
            key: chunk[0].0.clone(),
            total: chunk.iter().map(|(_, r)| amount(r).unwrap_or(0.0)).sum(),
            members: chunk.iter().map(|(_, r)| *r).collect(),
        })
        .collect();

    groups.sort_by(|a, b| by_total_desc(a.total, b.total).then_with(|| a.key.cmp(&b.key)));
    groups
}

/// Descending order on amounts
pub fn by_total_desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

/// Share of `part` in `whole` as a percentage, zero when `whole` is zero
pub fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        zona: &'static str,
        total: Option<f64>,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { zona: "Norte", total: Some(100.0) },
            Row { zona: "Sul", total: Some(30.0) },
            Row { zona: "Norte", total: Some(50.0) },
        ]
    }

    #[test]
    fn test_groups_and_sums_by_key() {
        let rows = rows();
        let groups = group_by(&rows, |r| r.zona, |r| r.total);

        let summary: Vec<(&str, f64, usize)> =
            groups.iter().map(|g| (g.key, g.total, g.len())).collect();
        assert_eq!(summary, vec![("Norte", 150.0, 2), ("Sul", 30.0, 1)]);
    }

    #[test]
    fn test_partition_is_complete_and_conserves_sum() {
        let mut rows = rows();
        rows.push(Row { zona: "Leste", total: None });
        rows.push(Row { zona: "Oeste", total: Some(7.5) });

        let groups = group_by(&rows, |r| r.zona, |r| r.total);
        let members: usize = groups.iter().map(|g| g.len()).sum();
        let sum: f64 = groups.iter().map(|g| g.total).sum();

        assert_eq!(members, rows.len());
        assert_eq!(sum, 187.5);
    }

    #[test]
    fn test_ties_break_on_key_ascending() {
        let rows = vec![
            Row { zona: "Sul", total: Some(10.0) },
            Row { zona: "Leste", total: Some(10.0) },
            Row { zona: "Norte", total: Some(20.0) },
        ];
        let groups = group_by(&rows, |r| r.zona, |r| r.total);
        let keys: Vec<&str> = groups.iter().map(|g| g.key).collect();
        assert_eq!(keys, vec!["Norte", "Leste", "Sul"]);
    }

    #[test]
    fn test_empty_input_has_no_groups() {
        let rows: Vec<Row> = vec![];
        assert!(group_by(&rows, |r| r.zona, |r| r.total).is_empty());
    }

    #[test]
    fn test_percent_of_zero_is_zero() {
        assert_eq!(percent(5.0, 0.0), 0.0);
        assert_eq!(percent(25.0, 200.0), 12.5);
    }
}
