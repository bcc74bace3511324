use std::{collections::HashMap, error::Error as StdError};

use derive_more::Display;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};
use uuid::Uuid;

use super::{Client, Error};

#[derive(Clone, Debug)]
pub struct User {
    pub id: Id,
    pub name: String,
    pub username: String,
    /// Stored and compared verbatim.
    /// TODO: Use a real hash function.
    pub password: String,
    pub role: Role,
    pub avatar_url: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    Hash,
    PartialEq,
    Serialize,
)]
pub struct Id(Uuid);

impl Id {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<u128> for Id {
    fn from(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl FromSql<'_> for Id {
    accepts!(UUID);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Uuid::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for Id {
    accepts!(UUID);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Manager,
    Employee,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manager => "manager",
            Self::Employee => "employee",
        }
    }
}

impl FromSql<'_> for Role {
    accepts!(TEXT);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        match String::from_sql(ty, raw)?.as_str() {
            "manager" => Ok(Self::Manager),
            "employee" => Ok(Self::Employee),
            _ => Err("invalid role".into()),
        }
    }
}

impl ToSql for Role {
    accepts!(TEXT);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.as_str().to_sql(ty, out)
    }
}

pub struct NewUser {
    pub name: String,
    pub username: String,
    pub password: String,
    pub role: Role,
    pub avatar_url: Option<String>,
}

#[derive(Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub avatar_url: Option<String>,
}

impl Client {
    pub async fn create_user(&self, new: NewUser) -> Result<Id, Error> {
        if self.0.get_user_by_username(&new.username).await?.is_some() {
            return Err(Error::DuplicateUsername);
        }

        let user = User {
            id: Id::new(),
            name: new.name,
            username: new.username,
            password: new.password,
            role: new.role,
            avatar_url: new.avatar_url,
            created_at: OffsetDateTime::now_utc(),
        };
        self.0.write_user(&user).await?;

        Ok(user.id)
    }

    pub async fn update_user(
        &self,
        id: Id,
        patch: UserPatch,
    ) -> Result<Id, Error> {
        let mut user = self
            .0
            .get_user_by_id(id)
            .await?
            .ok_or(Error::UserNotFound)?;

        if let Some(username) = patch.username {
            if username != user.username
                && self
                    .0
                    .get_user_by_username(&username)
                    .await?
                    .is_some_and(|other| other.id != id)
            {
                return Err(Error::DuplicateUsername);
            }
            user.username = username;
        }
        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(password) = patch.password {
            user.password = password;
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(avatar_url) = patch.avatar_url {
            user.avatar_url = Some(avatar_url);
        }

        self.0.write_user(&user).await?;

        Ok(id)
    }

    pub async fn get_user_by_id(
        &self,
        id: Id,
    ) -> Result<Option<User>, Error> {
        Ok(self.0.get_user_by_id(id).await?)
    }

    pub async fn get_users(
        &self,
        role: Option<Role>,
    ) -> Result<Vec<User>, Error> {
        Ok(self.0.get_users(role).await?)
    }

    pub async fn get_users_by_ids(
        &self,
        ids: &[Id],
    ) -> Result<HashMap<Id, User>, Error> {
        Ok(self.0.get_users_by_ids(ids).await?)
    }

    /// Exact string equality against the stored password.
    /// TODO: Compare against a real password hash.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<User, Error> {
        self.0
            .get_user_by_username(username)
            .await?
            .filter(|u| u.password == password)
            .ok_or(Error::InvalidCredentials)
    }
}
