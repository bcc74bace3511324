use std::{net, time};

use serde::Deserialize;

#[derive(Deserialize)]
pub struct Config {
    pub db: Db,
    pub http: Http,
    pub jwt: Jwt,
    #[serde(default)]
    pub schedule: Schedule,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase", tag = "driver")]
pub enum Db {
    Postgres { url: String },
    Memory,
}

#[derive(Deserialize)]
pub struct Http {
    pub server: Server,
    pub cors: Cors,
}

#[derive(Deserialize)]
pub struct Server {
    pub addr: net::SocketAddr,
}

#[derive(Deserialize)]
pub struct Cors {
    pub allowed_origins: Vec<String>,
}

#[derive(Deserialize)]
pub struct Jwt {
    pub secret: String,
    #[serde(with = "humantime_serde")]
    pub expiration_time: time::Duration,
}

#[derive(Default, Deserialize)]
pub struct Schedule {
    #[serde(default)]
    pub overlap_policy: OverlapPolicy,
}

/// What to do when a new or patched shift overlaps another shift of the same
/// employee on the same day. Double-booking is accepted behavior in existing
/// deployments, so `Allow` is the default.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    #[default]
    Allow,
    Reject,
    Warn,
}
