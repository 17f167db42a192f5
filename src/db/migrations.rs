use crate::db::Database;
use crate::error::Result;

const MIGRATIONS: &[&str] = &[
    // Migration 1: run storage
    r#"
    CREATE TABLE IF NOT EXISTS runs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS crop_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        crop_id TEXT NOT NULL,
        custom_id INTEGER NOT NULL,
        harvest_date TEXT,
        results TEXT NOT NULL,
        UNIQUE(run_id, position)
    );

    CREATE TABLE IF NOT EXISTS general_results (
        run_id INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
        result_id TEXT NOT NULL,
        date TEXT NOT NULL,
        value REAL NOT NULL,
        PRIMARY KEY (run_id, result_id, date)
    );
    "#,
    // Migration 2: indexes
    r#"
    CREATE INDEX IF NOT EXISTS idx_crop_results_run_id
        ON crop_results(run_id);
    CREATE INDEX IF NOT EXISTS idx_crop_results_crop_id
        ON crop_results(crop_id);
    CREATE INDEX IF NOT EXISTS idx_general_results_result_id
        ON general_results(run_id, result_id);
    "#,
];

pub fn run(db: &Database) -> Result<()> {
    db.with_conn_mut(|conn| {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;

        let current_version: i32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            let version = (i + 1) as i32;
            if version > current_version {
                tracing::info!("Applying migration {}", version);
                let tx = conn.transaction()?;
                tx.execute_batch(migration)?;
                tx.execute("INSERT INTO schema_migrations (version) VALUES (?1)", [version])?;
                tx.commit()?;
            }
        }

        Ok(())
    })
}
