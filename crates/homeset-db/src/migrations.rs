use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Homes DB: running migration v1 (homes table)");
        let tx = conn.unchecked_transaction()?;
        // IF NOT EXISTS adopts databases written before versioning existed.
        tx.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS homes (
                player_uuid TEXT NOT NULL,
                home_name   TEXT NOT NULL,
                world_name  TEXT NOT NULL,
                x           REAL NOT NULL,
                y           REAL NOT NULL,
                z           REAL NOT NULL,
                yaw         REAL NOT NULL,
                pitch       REAL NOT NULL,
                PRIMARY KEY (player_uuid, home_name)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        tx.commit()?;
    }

    if version < 2 {
        info!("Homes DB: running migration v2 (shared homes)");
        let tx = conn.unchecked_transaction()?;
        if !has_column(&tx, "homes", "shared")? {
            tx.execute_batch("ALTER TABLE homes ADD COLUMN shared INTEGER NOT NULL DEFAULT 0;")?;
        }
        tx.execute_batch(
            "
            CREATE INDEX IF NOT EXISTS idx_homes_shared_name
                ON homes(home_name COLLATE NOCASE) WHERE shared = 1;

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        [table, column],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}
