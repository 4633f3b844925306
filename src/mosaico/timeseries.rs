//! Per-year totals of a section, optionally deflated

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::rollup::group_by;
use crate::core::store::Execucao;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeseriesPoint {
    pub year: i32,
    pub orcado: f64,
    pub empenhado: f64,
}

/// Sum orcado and empenhado per year, oldest year first
///
/// With `deflators`, each year's values are brought to the price level of
/// the newest indexed year. Years without an index are left as they are.
pub fn build(records: &[Execucao], deflators: Option<&BTreeMap<i32, f64>>) -> Vec<TimeseriesPoint> {
    let mut points: Vec<TimeseriesPoint> = group_by(records, |e| e.year, |e| e.orcado_atualizado)
        .into_iter()
        .map(|group| TimeseriesPoint {
            year: group.key,
            orcado: group.total,
            empenhado: group
                .members
                .iter()
                .map(|e| e.empenhado_liquido.unwrap_or(0.0))
                .sum(),
        })
        .collect();
    points.sort_by_key(|p| p.year);

    if let Some(deflators) = deflators {
        deflate(&mut points, deflators);
    }
    points
}

fn deflate(points: &mut [TimeseriesPoint], deflators: &BTreeMap<i32, f64>) {
    let Some((_, &reference)) = deflators.iter().next_back() else {
        return;
    };
    for point in points {
        match deflators.get(&point.year) {
            Some(&index) if index != 0.0 => {
                let factor = reference / index;
                point.orcado *= factor;
                point.empenhado *= factor;
            }
            _ => tracing::debug!(year = point.year, "no deflator index, keeping nominal values"),
        }
    }
}
