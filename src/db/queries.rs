use crate::db::Database;
use crate::error::{Result, SimError};
use crate::models::{CropResult, ResultId, RunResults};
use chrono::NaiveDate;
use rusqlite::{params, Row};
use std::collections::BTreeMap;
use tracing::warn;

/// One stored run, without its results.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub id: i64,
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub created_at: String,
}

// Run Queries

impl Database {
    /// Stores a complete run in one transaction and returns its id.
    pub fn save_run(
        &self,
        name: &str,
        start: NaiveDate,
        end: NaiveDate,
        results: &RunResults,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO runs (name, start_date, end_date) VALUES (?1, ?2, ?3)",
                params![name, start.to_string(), end.to_string()],
            )?;
            let run_id = tx.last_insert_rowid();

            {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO crop_results
                        (run_id, position, crop_id, custom_id, harvest_date, results)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                )?;
                for (position, record) in results.crop_results.iter().enumerate() {
                    stmt.execute(params![
                        run_id,
                        position as i64,
                        record.crop_id,
                        record.custom_id,
                        record.date.map(|d| d.to_string()),
                        serde_json::to_string(&record.results)?,
                    ])?;
                }

                let mut stmt = tx.prepare(
                    "INSERT INTO general_results (run_id, result_id, date, value) VALUES (?1, ?2, ?3, ?4)",
                )?;
                for (id, series) in &results.general_results {
                    for point in series {
                        stmt.execute(params![run_id, id.as_str(), point.date.to_string(), point.value])?;
                    }
                }
            }

            tx.commit()?;
            Ok(run_id)
        })
    }

    pub fn list_runs(&self) -> Result<Vec<RunSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM runs ORDER BY id DESC")?;
            let runs = stmt
                .query_map([], row_to_run_summary)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(runs)
        })
    }

    pub fn get_run(&self, run_id: i64) -> Result<Option<RunSummary>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT * FROM runs WHERE id = ?1", [run_id], row_to_run_summary)
                .optional()
                .map_err(Into::into)
        })
    }

    /// Loads everything stored for a run. Rows naming an unknown output are
    /// skipped.
    pub fn load_run_results(&self, run_id: i64) -> Result<RunResults> {
        if self.get_run(run_id)?.is_none() {
            return Err(SimError::NotFound(format!("run {}", run_id)));
        }

        self.with_conn(|conn| {
            let mut results = RunResults::default();

            let mut stmt = conn.prepare(
                "SELECT * FROM crop_results WHERE run_id = ?1 ORDER BY position",
            )?;
            results.crop_results = stmt
                .query_map([run_id], row_to_crop_result)?
                .filter_map(|r| r.ok())
                .collect();

            let mut stmt = conn.prepare(
                "SELECT result_id, date, value FROM general_results WHERE run_id = ?1 ORDER BY result_id, date",
            )?;
            let rows = stmt.query_map([run_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                ))
            })?;
            for (name, date, value) in rows.filter_map(|r| r.ok()) {
                let Some(id) = ResultId::from_short_name(&name) else {
                    warn!(result_id = %name, "Unknown result id in database, skipping");
                    continue;
                };
                match date.parse::<NaiveDate>() {
                    Ok(date) => results.push(id, date, value),
                    Err(_) => warn!(%date, "Invalid date in general_results, skipping"),
                }
            }

            Ok(results)
        })
    }

    pub fn delete_run(&self, run_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM runs WHERE id = ?1", [run_id])?;
            Ok(())
        })
    }
}

fn parse_date(column: &str, value: &str) -> rusqlite::Result<NaiveDate> {
    value.parse::<NaiveDate>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("{}: {}", column, e).into(),
        )
    })
}

fn row_to_run_summary(row: &Row) -> rusqlite::Result<RunSummary> {
    let start: String = row.get("start_date")?;
    let end: String = row.get("end_date")?;
    Ok(RunSummary {
        id: row.get("id")?,
        name: row.get("name")?,
        start: parse_date("start_date", &start)?,
        end: parse_date("end_date", &end)?,
        created_at: row.get("created_at")?,
    })
}

fn row_to_crop_result(row: &Row) -> rusqlite::Result<CropResult> {
    let harvest_date: Option<String> = row.get("harvest_date")?;
    let raw: String = row.get("results")?;

    let results: BTreeMap<String, f64> = serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(error = %e, "Unreadable crop result values in database, ignoring");
        BTreeMap::new()
    });
    let results = results
        .into_iter()
        .filter_map(|(name, value)| match ResultId::from_short_name(&name) {
            Some(id) => Some((id, value)),
            None => {
                warn!(result_id = %name, "Unknown result id in database, skipping");
                None
            }
        })
        .collect();

    Ok(CropResult {
        crop_id: row.get("crop_id")?,
        custom_id: row.get("custom_id")?,
        date: harvest_date
            .as_deref()
            .map(|d| parse_date("harvest_date", d))
            .transpose()?,
        results,
    })
}

trait OptionalExt<T> {
    fn optional(self) -> rusqlite::Result<Option<T>>;
}

impl<T> OptionalExt<T> for rusqlite::Result<T> {
    fn optional(self) -> rusqlite::Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_results() -> RunResults {
        let mut record = CropResult::new("WW", 7);
        record.date = Some(d(2021, 7, 20));
        record.set(ResultId::PrimaryYield, 8123.5);
        record.set(ResultId::SumFertiliser, 140.0);

        let mut results = RunResults {
            crop_results: vec![record, CropResult::new("SM", 8)],
            ..RunResults::default()
        };
        results.push(ResultId::MonthlyPrecip, d(2021, 1, 31), 48.2);
        results.push(ResultId::MonthlyPrecip, d(2021, 2, 28), 31.0);
        results.push(ResultId::YearlyNLeaching, d(2021, 12, 31), 22.4);
        results
    }

    #[test]
    fn saved_run_loads_back() {
        let db = Database::open_in_memory().unwrap();
        let results = sample_results();
        let id = db.save_run("test", d(2021, 1, 1), d(2021, 12, 31), &results).unwrap();

        let loaded = db.load_run_results(id).unwrap();
        assert_eq!(loaded, results);

        let summary = db.get_run(id).unwrap().unwrap();
        assert_eq!(summary.name, "test");
        assert_eq!(summary.end, d(2021, 12, 31));
    }

    #[test]
    fn unknown_run_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_run(42).unwrap().is_none());
        assert!(matches!(db.load_run_results(42), Err(SimError::NotFound(_))));
    }

    #[test]
    fn unknown_result_ids_are_skipped() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .save_run("test", d(2021, 1, 1), d(2021, 1, 31), &RunResults::default())
            .unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO general_results (run_id, result_id, date, value) VALUES (?1, 'bogus', '2021-01-31', 1.0)",
                [id],
            )?;
            Ok(())
        })
        .unwrap();
        assert!(db.load_run_results(id).unwrap().general_results.is_empty());
    }

    #[test]
    fn runs_list_newest_first_and_delete_cascades() {
        let db = Database::open_in_memory().unwrap();
        let first = db.save_run("a", d(2020, 1, 1), d(2020, 12, 31), &sample_results()).unwrap();
        let second = db.save_run("b", d(2021, 1, 1), d(2021, 12, 31), &sample_results()).unwrap();

        let ids: Vec<_> = db.list_runs().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second, first]);

        db.delete_run(first).unwrap();
        let remaining: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM crop_results", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(remaining, 2);
    }
}
