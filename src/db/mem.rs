//! In-memory store. Backs the `memory` config driver and the test suite;
//! records live in insertion order, which is the order reads report.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;

use super::{shift, user, Shift, Store, StoreError, User};

#[derive(Default)]
pub struct Mem {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    shifts: Vec<Shift>,
}

impl Mem {
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Store for Mem {
    async fn write_user(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.lock();
        match inner.users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => *existing = user.clone(),
            None => inner.users.push(user.clone()),
        }
        Ok(())
    }

    async fn get_user_by_id(
        &self,
        id: user::Id,
    ) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn get_users(
        &self,
        role: Option<user::Role>,
    ) -> Result<Vec<User>, StoreError> {
        Ok(self
            .lock()
            .users
            .iter()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .cloned()
            .collect())
    }

    async fn get_users_by_ids(
        &self,
        ids: &[user::Id],
    ) -> Result<HashMap<user::Id, User>, StoreError> {
        Ok(self
            .lock()
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .map(|u| (u.id, u.clone()))
            .collect())
    }

    async fn write_shift(&self, shift: &Shift) -> Result<(), StoreError> {
        let mut inner = self.lock();
        match inner.shifts.iter_mut().find(|s| s.id == shift.id) {
            Some(existing) => *existing = shift.clone(),
            None => inner.shifts.push(shift.clone()),
        }
        Ok(())
    }

    async fn get_shift_by_id(
        &self,
        id: shift::Id,
    ) -> Result<Option<Shift>, StoreError> {
        Ok(self.lock().shifts.iter().find(|s| s.id == id).cloned())
    }

    async fn delete_shift(&self, id: shift::Id) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let before = inner.shifts.len();
        inner.shifts.retain(|s| s.id != id);
        Ok(inner.shifts.len() < before)
    }

    async fn get_shifts_by_employee(
        &self,
        employee_id: user::Id,
    ) -> Result<Vec<Shift>, StoreError> {
        Ok(self
            .lock()
            .shifts
            .iter()
            .filter(|s| s.employee_id == employee_id)
            .cloned()
            .collect())
    }

    async fn get_shifts_by_day(
        &self,
        day: &str,
    ) -> Result<Vec<Shift>, StoreError> {
        Ok(self
            .lock()
            .shifts
            .iter()
            .filter(|s| s.day == day)
            .cloned()
            .collect())
    }

    async fn get_shifts_by_range(
        &self,
        start_day: &str,
        end_day: &str,
    ) -> Result<Vec<Shift>, StoreError> {
        let mut shifts = self
            .lock()
            .shifts
            .iter()
            .filter(|s| {
                s.day.as_str() >= start_day && s.day.as_str() <= end_day
            })
            .cloned()
            .collect::<Vec<_>>();
        shifts.sort_by(|a, b| a.day.cmp(&b.day));
        Ok(shifts)
    }

    async fn get_all_shifts(&self) -> Result<Vec<Shift>, StoreError> {
        Ok(self.lock().shifts.clone())
    }
}
