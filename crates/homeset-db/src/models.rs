//! Database row types. These map directly to SQLite rows and stay
//! separate from the homeset-types model so the DB layer can read legacy
//! data before it is validated.

use anyhow::{Context, Result};
use uuid::Uuid;

use homeset_types::models::{Home, HomeName, Location};

pub struct HomeRow {
    pub player_uuid: String,
    pub home_name: String,
    pub world_name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub shared: bool,
}

impl HomeRow {
    pub fn into_home(self) -> Result<Home> {
        let owner: Uuid = self
            .player_uuid
            .parse()
            .with_context(|| format!("bad owner id in homes table: {}", self.player_uuid))?;
        let name = HomeName::parse(&self.home_name)?;

        Ok(Home {
            owner,
            name,
            location: Location {
                world: self.world_name,
                x: self.x,
                y: self.y,
                z: self.z,
                yaw: self.yaw,
                pitch: self.pitch,
            },
            shared: self.shared,
        })
    }
}
