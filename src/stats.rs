use crate::record::{DataSource, Record};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCount {
    pub value: String,
    pub count: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub offline: usize,
    pub lms: usize,
    pub group_field: String,
    pub groups: Vec<GroupCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRate {
    pub total: usize,
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    pub excused: usize,
    pub rate: f64,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

pub fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(part as f64 * 100.0 / total as f64)
}

/// Records without a value for `group_field` are counted under `""`.
pub fn summarize(records: &[Record], group_field: &str) -> Summary {
    let total = records.len();
    let lms = records
        .iter()
        .filter(|r| r.data_source == DataSource::Lms)
        .count();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for r in records {
        *counts.entry(r.text(group_field).unwrap_or_default()).or_default() += 1;
    }
    let mut groups: Vec<GroupCount> = counts
        .into_iter()
        .map(|(value, count)| GroupCount {
            value,
            count,
            percent: percent(count, total),
        })
        .collect();
    groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));

    Summary {
        total,
        offline: total - lms,
        lms,
        group_field: group_field.to_string(),
        groups,
    }
}

/// Present and late both count as attended.
pub fn attendance_rate(records: &[Record]) -> AttendanceRate {
    let mut out = AttendanceRate {
        total: records.len(),
        present: 0,
        late: 0,
        absent: 0,
        excused: 0,
        rate: 0.0,
    };
    for r in records {
        match r.text("status").as_deref() {
            Some("present") => out.present += 1,
            Some("late") => out.late += 1,
            Some("absent") => out.absent += 1,
            Some("excused") => out.excused += 1,
            _ => {}
        }
    }
    out.rate = percent(out.present + out.late, out.total);
    out
}
