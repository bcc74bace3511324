use std::error::Error as StdError;

use derive_more::Display;
use itertools::Itertools as _;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};
use uuid::Uuid;

use crate::{config::OverlapPolicy, schedule};

use super::{user, Client, Error};

#[derive(Clone, Debug)]
pub struct Shift {
    pub id: Id,
    /// No referential integrity: the referenced user may be gone.
    pub employee_id: user::Id,
    /// Canonical `YYYY-MM-DD`; enforced on every write.
    pub day: String,
    pub start_time: String,
    pub end_time: String,
    pub task: String,
    pub created_at: OffsetDateTime,
}

/// A shift joined with its employee's display name. `None` means the
/// reference is dangling; flat listings substitute a placeholder, grouped
/// views drop the shift.
#[derive(Clone, Debug)]
pub struct ShiftWithEmployee {
    pub shift: Shift,
    pub employee_name: Option<String>,
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

pub struct NewShift {
    pub employee_id: user::Id,
    pub day: String,
    pub start_time: String,
    pub end_time: String,
    pub task: String,
}

#[derive(Default)]
pub struct ShiftPatch {
    pub employee_id: Option<user::Id>,
    pub day: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub task: Option<String>,
}

fn validate_day(day: &str) -> Result<(), Error> {
    schedule::parse_day_key(day)
        .map(drop)
        .map_err(|_| Error::Validation("day must be in YYYY-MM-DD format"))
}

fn validate_time(time: &str) -> Result<(), Error> {
    let bytes = time.as_bytes();
    let shape_ok = bytes.len() == 5
        && bytes[2] == b':'
        && [0, 1, 3, 4].iter().all(|&i| bytes[i].is_ascii_digit());
    let in_range = shape_ok
        && time[0..2].parse::<u8>().is_ok_and(|h| h < 24)
        && time[3..5].parse::<u8>().is_ok_and(|m| m < 60);
    if in_range {
        Ok(())
    } else {
        Err(Error::Validation("time must be in HH:MM 24-hour format"))
    }
}

impl Client {
    /// No existence check on `employee_id`; a shift may be scheduled for a
    /// user the store no longer knows about.
    pub async fn create_shift(
        &self,
        new: NewShift,
        policy: OverlapPolicy,
    ) -> Result<Id, Error> {
        validate_day(&new.day)?;
        validate_time(&new.start_time)?;
        validate_time(&new.end_time)?;
        self.check_overlap(
            policy,
            None,
            new.employee_id,
            &new.day,
            &new.start_time,
            &new.end_time,
        )
        .await?;

        let shift = Shift {
            id: Id::new(),
            employee_id: new.employee_id,
            day: new.day,
            start_time: new.start_time,
            end_time: new.end_time,
            task: new.task,
            created_at: OffsetDateTime::now_utc(),
        };
        self.0.write_shift(&shift).await?;

        Ok(shift.id)
    }

    pub async fn update_shift(
        &self,
        id: Id,
        patch: ShiftPatch,
        policy: OverlapPolicy,
    ) -> Result<Id, Error> {
        let mut shift = self
            .0
            .get_shift_by_id(id)
            .await?
            .ok_or(Error::ShiftNotFound)?;

        if let Some(day) = patch.day {
            validate_day(&day)?;
            shift.day = day;
        }
        if let Some(start_time) = patch.start_time {
            validate_time(&start_time)?;
            shift.start_time = start_time;
        }
        if let Some(end_time) = patch.end_time {
            validate_time(&end_time)?;
            shift.end_time = end_time;
        }
        if let Some(employee_id) = patch.employee_id {
            shift.employee_id = employee_id;
        }
        if let Some(task) = patch.task {
            shift.task = task;
        }

        self.check_overlap(
            policy,
            Some(id),
            shift.employee_id,
            &shift.day,
            &shift.start_time,
            &shift.end_time,
        )
        .await?;

        self.0.write_shift(&shift).await?;

        Ok(id)
    }

    /// Deleting an absent id is an error, not a no-op.
    pub async fn delete_shift(&self, id: Id) -> Result<(), Error> {
        if self.0.delete_shift(id).await? {
            Ok(())
        } else {
            Err(Error::ShiftNotFound)
        }
    }

    pub async fn get_shift_by_id(&self, id: Id) -> Result<Shift, Error> {
        self.0
            .get_shift_by_id(id)
            .await?
            .ok_or(Error::ShiftNotFound)
    }

    pub async fn get_shifts(&self) -> Result<Vec<Shift>, Error> {
        Ok(self.0.get_all_shifts().await?)
    }

    pub async fn get_shifts_by_employee(
        &self,
        employee_id: user::Id,
    ) -> Result<Vec<Shift>, Error> {
        Ok(self.0.get_shifts_by_employee(employee_id).await?)
    }

    pub async fn get_shifts_by_day(
        &self,
        day: &str,
    ) -> Result<Vec<Shift>, Error> {
        Ok(self.0.get_shifts_by_day(day).await?)
    }

    /// Inclusive range over canonical day keys, joined with employee names.
    /// Records whose day fails canonical validation are pending migration
    /// and never appear in range results.
    pub async fn get_shifts_by_date_range(
        &self,
        start_day: &str,
        end_day: &str,
    ) -> Result<Vec<ShiftWithEmployee>, Error> {
        let shifts = self
            .0
            .get_shifts_by_range(start_day, end_day)
            .await?
            .into_iter()
            .filter(|s| schedule::parse_day_key(&s.day).is_ok())
            .collect::<Vec<_>>();

        let employee_ids = shifts
            .iter()
            .map(|s| s.employee_id)
            .unique()
            .collect::<Vec<_>>();
        let users = self.0.get_users_by_ids(&employee_ids).await?;

        Ok(shifts
            .into_iter()
            .map(|shift| {
                let employee_name =
                    users.get(&shift.employee_id).map(|u| u.name.clone());
                ShiftWithEmployee {
                    shift,
                    employee_name,
                }
            })
            .collect())
    }

    /// Deletes shifts stored with a non-canonical day (the legacy
    /// `DD.MM.YYYY` form). Returns how many records were removed.
    pub async fn migrate_day_formats(&self) -> Result<usize, Error> {
        let mut deleted = 0;
        for shift in self.0.get_all_shifts().await? {
            if schedule::parse_day_key(&shift.day).is_err()
                && self.0.delete_shift(shift.id).await?
            {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn check_overlap(
        &self,
        policy: OverlapPolicy,
        skip: Option<Id>,
        employee_id: user::Id,
        day: &str,
        start_time: &str,
        end_time: &str,
    ) -> Result<(), Error> {
        if policy == OverlapPolicy::Allow {
            return Ok(());
        }

        let clashes = self
            .0
            .get_shifts_by_employee(employee_id)
            .await?
            .into_iter()
            .filter(|s| skip.map_or(true, |id| s.id != id))
            .any(|s| {
                s.day == day
                    && s.start_time.as_str() < end_time
                    && start_time < s.end_time.as_str()
            });
        if !clashes {
            return Ok(());
        }

        match policy {
            OverlapPolicy::Reject => Err(Error::Overlap),
            OverlapPolicy::Warn => {
                tracing::warn!(
                    %employee_id,
                    day,
                    start_time,
                    end_time,
                    "shift overlaps an existing shift",
                );
                Ok(())
            }
            OverlapPolicy::Allow => Ok(()),
        }
    }
}
