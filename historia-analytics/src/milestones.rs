//! Switch and intolerance counts plus EDSS milestone intervals.

use chrono::{DateTime, Datelike, Utc};

use historia_core::{
    DisplayRecord, MilestoneInterval, MilestoneSummary, Severidad, NINGUNO, SIN_DMT,
};

/// Single pass over a chronologically ordered timeline.
pub fn aggregate_milestones(records: &[DisplayRecord]) -> MilestoneSummary {
    MilestoneSummary {
        switches: count_switches(records),
        intolerancias: count_intolerances(records),
        intervalos: segment_intervals(records),
    }
}

/// Consecutive changes of DMT. Stopping therapy (a change into "Sin DMT") is
/// not a switch.
pub fn count_switches(records: &[DisplayRecord]) -> u32 {
    records
        .windows(2)
        .filter(|pair| pair[1].dmt != pair[0].dmt && pair[1].dmt != SIN_DMT)
        .count() as u32
}

pub fn count_intolerances(records: &[DisplayRecord]) -> u32 {
    records.iter().filter(|record| !record.tolerancia).count() as u32
}

/// Split the timeline at every EDSS change. Each closed interval lists the
/// DMTs seen since it opened.
pub fn segment_intervals(records: &[DisplayRecord]) -> Vec<MilestoneInterval> {
    let Some((first, rest)) = records.split_first() else {
        return Vec::new();
    };

    let mut intervals = Vec::new();
    let mut current_edss = first.edss;
    let mut started_at = first.timeline_instant();
    let mut active = ActiveTherapies::starting_with(&first.dmt);

    for record in rest {
        if record.edss != current_edss {
            let reached_at = record.timeline_instant();
            intervals.push(MilestoneInterval {
                cambio: format!(
                    "EDSS {} → {}",
                    format_edss(current_edss),
                    format_edss(record.edss)
                ),
                tiempo: format!("{} meses", diff_months(started_at, reached_at)),
                medicacion: active.describe(),
                severidad: Severidad::from_change(current_edss, record.edss),
            });
            current_edss = record.edss;
            started_at = reached_at;
            active = ActiveTherapies::starting_with(&record.dmt);
        } else {
            active.add(&record.dmt);
        }
    }

    intervals
}

/// Whole calendar months from `start` to `end`, never negative.
pub fn diff_months(start: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
    let months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    months.max(0) as u32
}

/// EDSS as a browser would print the number: `2`, `2.5`.
fn format_edss(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

/// DMT labels in first-seen order.
struct ActiveTherapies(Vec<String>);

impl ActiveTherapies {
    fn starting_with(dmt: &str) -> Self {
        Self(vec![dmt.to_string()])
    }

    fn add(&mut self, dmt: &str) {
        if !self.0.iter().any(|seen| seen == dmt) {
            self.0.push(dmt.to_string());
        }
    }

    fn describe(&self) -> String {
        let names: Vec<&str> = self
            .0
            .iter()
            .map(String::as_str)
            .filter(|name| *name != SIN_DMT)
            .collect();
        if names.is_empty() {
            NINGUNO.to_string()
        } else {
            names.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use historia_core::SIN_DATO;

    fn row(dmt: &str, edss: f64, year: i32, month: u32) -> DisplayRecord {
        DisplayRecord {
            id: format!("{year}-{month}"),
            dmt: dmt.to_string(),
            dmt_original: dmt.to_string(),
            dmt_full: dmt.to_string(),
            esquema: SIN_DATO.to_string(),
            fecha: SIN_DATO.to_string(),
            fecha_raw: None,
            occurred_at: Some(Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap()),
            edss,
            tolerancia: true,
            soporte: Vec::new(),
        }
    }

    fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn transition_into_no_dmt_is_not_a_switch() {
        let records = vec![
            row("A", 2.0, 2020, 1),
            row("A", 2.0, 2020, 2),
            row("B", 2.0, 2020, 3),
            row(SIN_DMT, 2.0, 2020, 4),
            row("C", 2.0, 2020, 5),
        ];
        assert_eq!(count_switches(&records), 2);
    }

    #[test]
    fn counts_intolerance_reports() {
        let mut records = vec![row("A", 2.0, 2020, 1), row("A", 2.0, 2020, 2)];
        records[1].tolerancia = false;
        assert_eq!(count_intolerances(&records), 1);
    }

    #[test]
    fn intervals_close_on_every_edss_change() {
        let records = vec![
            row("A", 2.0, 2021, 1),
            row("A", 2.0, 2021, 2),
            row("B", 2.5, 2021, 3),
            row("B", 2.5, 2021, 4),
            row("B", 2.0, 2021, 5),
        ];
        let intervals = segment_intervals(&records);

        assert_eq!(
            intervals,
            vec![
                MilestoneInterval {
                    cambio: "EDSS 2 → 2.5".to_string(),
                    tiempo: "2 meses".to_string(),
                    medicacion: "A".to_string(),
                    severidad: Severidad::Empeoro,
                },
                MilestoneInterval {
                    cambio: "EDSS 2.5 → 2".to_string(),
                    tiempo: "2 meses".to_string(),
                    medicacion: "B".to_string(),
                    severidad: Severidad::Mejoro,
                },
            ]
        );
    }

    #[test]
    fn interval_accumulates_therapies_and_hides_placeholder() {
        let records = vec![
            row(SIN_DMT, 1.0, 2020, 1),
            row("A", 1.0, 2020, 6),
            row("B", 1.0, 2020, 9),
            row("B", 3.0, 2021, 2),
            row(SIN_DMT, 3.0, 2021, 3),
            row(SIN_DMT, 3.5, 2021, 4),
        ];
        let intervals = segment_intervals(&records);
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].medicacion, "A, B");
        assert_eq!(intervals[0].tiempo, "13 meses");
        assert_eq!(intervals[1].medicacion, "B");
        assert_eq!(intervals[1].cambio, "EDSS 3 → 3.5");
    }

    #[test]
    fn interval_without_therapy_reads_ninguno() {
        let records = vec![row(SIN_DMT, 0.0, 2020, 1), row(SIN_DMT, 1.5, 2020, 3)];
        let intervals = segment_intervals(&records);
        assert_eq!(intervals[0].medicacion, NINGUNO);
        assert_eq!(intervals[0].cambio, "EDSS 0 → 1.5");
    }

    #[test]
    fn constant_edss_has_no_intervals() {
        let records = vec![row("A", 4.0, 2020, 1), row("B", 4.0, 2022, 1)];
        assert!(segment_intervals(&records).is_empty());
        assert!(segment_intervals(&[]).is_empty());
    }

    #[test]
    fn month_difference_is_calendar_based_and_clamped() {
        assert_eq!(diff_months(utc(2023, 1, 1), utc(2023, 8, 15)), 7);
        assert_eq!(diff_months(utc(2023, 1, 31), utc(2023, 2, 1)), 1);
        assert_eq!(diff_months(utc(2022, 11, 1), utc(2023, 2, 1)), 3);
        assert_eq!(diff_months(utc(2023, 8, 1), utc(2023, 1, 1)), 0);
        assert_eq!(diff_months(utc(2024, 1, 1), utc(2020, 1, 1)), 0);
    }
}
