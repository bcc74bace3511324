pub mod mem;
pub mod pg;
pub mod shift;
pub mod user;

use std::{
    collections::HashMap, error::Error as StdError, fmt, sync::Arc,
};

use async_trait::async_trait;
use derive_more::From;

use crate::config;

pub use self::{shift::Shift, user::User};

pub async fn connect(
    config: config::Db,
) -> Result<(Client, Option<pg::Connection>), StoreError> {
    match config {
        config::Db::Postgres { url } => {
            let (store, connection) = pg::connect(&url).await?;
            Ok((Client::new(Arc::new(store)), Some(connection)))
        }
        config::Db::Memory => {
            Ok((Client::new(Arc::new(mem::Mem::default())), None))
        }
    }
}

/// Repository over the two persisted collections (`users`, `shifts`).
///
/// All invariants live here: username uniqueness, canonical day format on
/// writes, the overlap policy, and the employee-name join. The underlying
/// [`Store`] provides single-record CRUD primitives and nothing else.
#[derive(Clone)]
pub struct Client(Arc<dyn Store>);

impl Client {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self(store)
    }
}

/// Single-record CRUD primitives of the underlying store. Every operation
/// is atomic with respect to one record; there are no multi-record
/// transactions.
#[async_trait]
pub trait Store: Send + Sync {
    async fn write_user(&self, user: &User) -> Result<(), StoreError>;

    async fn get_user_by_id(
        &self,
        id: user::Id,
    ) -> Result<Option<User>, StoreError>;

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, StoreError>;

    /// All users in insertion order, optionally narrowed to one role.
    async fn get_users(
        &self,
        role: Option<user::Role>,
    ) -> Result<Vec<User>, StoreError>;

    async fn get_users_by_ids(
        &self,
        ids: &[user::Id],
    ) -> Result<HashMap<user::Id, User>, StoreError>;

    async fn write_shift(&self, shift: &Shift) -> Result<(), StoreError>;

    async fn get_shift_by_id(
        &self,
        id: shift::Id,
    ) -> Result<Option<Shift>, StoreError>;

    /// Returns whether a record was actually removed.
    async fn delete_shift(&self, id: shift::Id) -> Result<bool, StoreError>;

    async fn get_shifts_by_employee(
        &self,
        employee_id: user::Id,
    ) -> Result<Vec<Shift>, StoreError>;

    async fn get_shifts_by_day(
        &self,
        day: &str,
    ) -> Result<Vec<Shift>, StoreError>;

    /// Inclusive lexical bounds over canonical day keys, ascending by day.
    async fn get_shifts_by_range(
        &self,
        start_day: &str,
        end_day: &str,
    ) -> Result<Vec<Shift>, StoreError>;

    async fn get_all_shifts(&self) -> Result<Vec<Shift>, StoreError>;
}

#[derive(Debug, From)]
pub enum StoreError {
    Postgres(tokio_postgres::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres(e) => write!(f, "postgres: {e}"),
        }
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Postgres(e) => Some(e),
        }
    }
}

#[derive(Debug, From)]
pub enum Error {
    #[from]
    Store(StoreError),
    DuplicateUsername,
    InvalidCredentials,
    Overlap,
    ShiftNotFound,
    UserNotFound,
    Validation(&'static str),
}
