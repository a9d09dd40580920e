use crate::Database;
use crate::models::HomeRow;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use homeset_types::models::{Home, HomeName, Location};

const HOME_COLUMNS: &str =
    "player_uuid, home_name, world_name, x, y, z, yaw, pitch, shared";

impl Database {
    // -- Writes --

    /// Upsert the pose of (owner, name). An existing row keeps its shared
    /// flag; a new row starts out personal.
    pub fn save_home(&self, owner: Uuid, name: &HomeName, location: &Location) -> Result<()> {
        self.with_conn(|conn| upsert_home(conn, owner, name, location))
    }

    /// Upsert the pose and set the shared flag in one transaction.
    pub fn save_home_as(
        &self,
        owner: Uuid,
        name: &HomeName,
        location: &Location,
        shared: bool,
    ) -> Result<()> {
        self.with_tx(|tx| {
            upsert_home(tx, owner, name, location)?;
            update_shared(tx, owner, name, shared)
        })
    }

    /// Flip the shared flag only. Missing rows are silently ignored.
    pub fn set_shared(&self, owner: Uuid, name: &HomeName, shared: bool) -> Result<()> {
        self.with_conn(|conn| update_shared(conn, owner, name, shared))
    }

    /// Returns true if a row was removed.
    pub fn delete_home(&self, owner: Uuid, name: &HomeName) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM homes WHERE player_uuid = ?1 AND home_name = ?2",
                (owner.to_string(), name.as_str()),
            )?;
            Ok(removed > 0)
        })
    }

    // -- Lookups --

    pub fn find_personal(&self, owner: Uuid, name: &HomeName) -> Result<Option<Home>> {
        let row = self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM homes WHERE player_uuid = ?1 AND home_name = ?2",
                HOME_COLUMNS
            );
            Ok(conn
                .query_row(&sql, (owner.to_string(), name.as_str()), map_home_row)
                .optional()?)
        })?;

        row.map(HomeRow::into_home).transpose()
    }

    /// Case-insensitive lookup over every shared home. Legacy duplicates
    /// resolve to the lowest owner id.
    pub fn find_shared(&self, name: &HomeName) -> Result<Option<Home>> {
        let row = self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM homes
                 WHERE shared = 1 AND home_name = ?1 COLLATE NOCASE
                 ORDER BY player_uuid ASC
                 LIMIT 1",
                HOME_COLUMNS
            );
            Ok(conn.query_row(&sql, [name.as_str()], map_home_row).optional()?)
        })?;

        row.map(HomeRow::into_home).transpose()
    }

    pub fn home_exists(&self, owner: Uuid, name: &HomeName) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM homes WHERE player_uuid = ?1 AND home_name = ?2",
                    (owner.to_string(), name.as_str()),
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn count_homes(&self, owner: Uuid) -> Result<u32> {
        self.with_conn(|conn| {
            let count: u32 = conn.query_row(
                "SELECT COUNT(*) FROM homes WHERE player_uuid = ?1",
                [owner.to_string()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn list_personal(&self, owner: Uuid) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT home_name FROM homes
                 WHERE player_uuid = ?1
                 ORDER BY home_name COLLATE NOCASE",
            )?;
            let names = stmt
                .query_map([owner.to_string()], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(names)
        })
    }

    /// Shared names across all owners, one entry per case-insensitive name.
    pub fn list_shared(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT MIN(home_name) FROM homes
                 WHERE shared = 1
                 GROUP BY lower(home_name)
                 ORDER BY lower(home_name)",
            )?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(names)
        })
    }

    /// True iff an owner other than `owner` already shares a home with this
    /// (case-insensitive) name.
    pub fn is_shared_name_taken(&self, owner: Uuid, name: &HomeName) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM homes
                     WHERE shared = 1
                       AND home_name = ?1 COLLATE NOCASE
                       AND player_uuid != ?2
                     LIMIT 1",
                    (name.as_str(), owner.to_string()),
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }
}

fn upsert_home(conn: &Connection, owner: Uuid, name: &HomeName, location: &Location) -> Result<()> {
    conn.execute(
        "INSERT INTO homes (player_uuid, home_name, world_name, x, y, z, yaw, pitch)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(player_uuid, home_name) DO UPDATE SET
             world_name = excluded.world_name,
             x = excluded.x,
             y = excluded.y,
             z = excluded.z,
             yaw = excluded.yaw,
             pitch = excluded.pitch",
        rusqlite::params![
            owner.to_string(),
            name.as_str(),
            location.world,
            location.x,
            location.y,
            location.z,
            f64::from(location.yaw),
            f64::from(location.pitch),
        ],
    )?;
    Ok(())
}

fn update_shared(conn: &Connection, owner: Uuid, name: &HomeName, shared: bool) -> Result<()> {
    conn.execute(
        "UPDATE homes SET shared = ?1 WHERE player_uuid = ?2 AND home_name = ?3",
        (shared, owner.to_string(), name.as_str()),
    )?;
    Ok(())
}

fn map_home_row(row: &Row<'_>) -> rusqlite::Result<HomeRow> {
    Ok(HomeRow {
        player_uuid: row.get(0)?,
        home_name: row.get(1)?,
        world_name: row.get(2)?,
        x: row.get(3)?,
        y: row.get(4)?,
        z: row.get(5)?,
        yaw: row.get::<_, f64>(6)? as f32,
        pitch: row.get::<_, f64>(7)? as f32,
        shared: row.get(8)?,
    })
}
