use std::collections::HashMap;

use async_trait::async_trait;
use tokio_postgres::{tls::NoTlsStream, NoTls, Row, Socket};

use super::{shift, user, Shift, Store, StoreError, User};

pub type Connection = tokio_postgres::Connection<Socket, NoTlsStream>;

pub async fn connect(url: &str) -> Result<(Pg, Connection), StoreError> {
    let (client, connection) = tokio_postgres::connect(url, NoTls).await?;
    Ok((Pg(client), connection))
}

pub struct Pg(tokio_postgres::Client);

const USER_COLUMNS: &str =
    "id, name, username, password, role, avatar_url, created_at";

const SHIFT_COLUMNS: &str =
    "id, employee_id, day, start_time, end_time, task, created_at";

fn user_from_row(row: &Row) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        username: row.get("username"),
        password: row.get("password"),
        role: row.get("role"),
        avatar_url: row.get("avatar_url"),
        created_at: row.get("created_at"),
    }
}

fn shift_from_row(row: &Row) -> Shift {
    Shift {
        id: row.get("id"),
        employee_id: row.get("employee_id"),
        day: row.get("day"),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        task: row.get("task"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl Store for Pg {
    async fn write_user(&self, user: &User) -> Result<(), StoreError> {
        const SQL: &str = "\
            INSERT INTO users (id, name, username, password, role, \
                               avatar_url, created_at) \
            VALUES ($1, $2, $3, $4, $5, $6, $7) \
            ON CONFLICT (id) DO UPDATE \
            SET name = EXCLUDED.name, \
                username = EXCLUDED.username, \
                password = EXCLUDED.password, \
                role = EXCLUDED.role, \
                avatar_url = EXCLUDED.avatar_url";

        self.0
            .execute(
                SQL,
                &[
                    &user.id,
                    &user.name,
                    &user.username,
                    &user.password,
                    &user.role,
                    &user.avatar_url,
                    &user.created_at,
                ],
            )
            .await
            .map(drop)
            .map_err(Into::into)
    }

    async fn get_user_by_id(
        &self,
        id: user::Id,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 LIMIT 1"
        );
        Ok(self
            .0
            .query_opt(&sql, &[&id])
            .await?
            .map(|row| user_from_row(&row)))
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 LIMIT 1"
        );
        Ok(self
            .0
            .query_opt(&sql, &[&username])
            .await?
            .map(|row| user_from_row(&row)))
    }

    async fn get_users(
        &self,
        role: Option<user::Role>,
    ) -> Result<Vec<User>, StoreError> {
        let rows = match role {
            Some(role) => {
                let sql = format!(
                    "SELECT {USER_COLUMNS} FROM users \
                     WHERE role = $1 \
                     ORDER BY created_at, id"
                );
                self.0.query(&sql, &[&role]).await?
            }
            None => {
                let sql = format!(
                    "SELECT {USER_COLUMNS} FROM users \
                     ORDER BY created_at, id"
                );
                self.0.query(&sql, &[]).await?
            }
        };
        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn get_users_by_ids(
        &self,
        ids: &[user::Id],
    ) -> Result<HashMap<user::Id, User>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE id IN (SELECT unnest($1::UUID[]))"
        );
        Ok(self
            .0
            .query(&sql, &[&ids])
            .await?
            .into_iter()
            .map(|row| {
                let user = user_from_row(&row);
                (user.id, user)
            })
            .collect())
    }

    async fn write_shift(&self, shift: &Shift) -> Result<(), StoreError> {
        const SQL: &str = "\
            INSERT INTO shifts (id, employee_id, day, start_time, \
                                end_time, task, created_at) \
            VALUES ($1, $2, $3, $4, $5, $6, $7) \
            ON CONFLICT (id) DO UPDATE \
            SET employee_id = EXCLUDED.employee_id, \
                day = EXCLUDED.day, \
                start_time = EXCLUDED.start_time, \
                end_time = EXCLUDED.end_time, \
                task = EXCLUDED.task";

        self.0
            .execute(
                SQL,
                &[
                    &shift.id,
                    &shift.employee_id,
                    &shift.day,
                    &shift.start_time,
                    &shift.end_time,
                    &shift.task,
                    &shift.created_at,
                ],
            )
            .await
            .map(drop)
            .map_err(Into::into)
    }

    async fn get_shift_by_id(
        &self,
        id: shift::Id,
    ) -> Result<Option<Shift>, StoreError> {
        let sql = format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = $1 LIMIT 1"
        );
        Ok(self
            .0
            .query_opt(&sql, &[&id])
            .await?
            .map(|row| shift_from_row(&row)))
    }

    async fn delete_shift(&self, id: shift::Id) -> Result<bool, StoreError> {
        const SQL: &str = "DELETE FROM shifts WHERE id = $1";
        Ok(self.0.execute(SQL, &[&id]).await? > 0)
    }

    async fn get_shifts_by_employee(
        &self,
        employee_id: user::Id,
    ) -> Result<Vec<Shift>, StoreError> {
        let sql = format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts \
             WHERE employee_id = $1 \
             ORDER BY created_at, id"
        );
        Ok(self
            .0
            .query(&sql, &[&employee_id])
            .await?
            .iter()
            .map(shift_from_row)
            .collect())
    }

    async fn get_shifts_by_day(
        &self,
        day: &str,
    ) -> Result<Vec<Shift>, StoreError> {
        let sql = format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts \
             WHERE day = $1 \
             ORDER BY created_at, id"
        );
        Ok(self
            .0
            .query(&sql, &[&day])
            .await?
            .iter()
            .map(shift_from_row)
            .collect())
    }

    async fn get_shifts_by_range(
        &self,
        start_day: &str,
        end_day: &str,
    ) -> Result<Vec<Shift>, StoreError> {
        // Lexical comparison on TEXT columns; correct because day keys are
        // canonical YYYY-MM-DD.
        let sql = format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts \
             WHERE day >= $1 AND day <= $2 \
             ORDER BY day, created_at, id"
        );
        Ok(self
            .0
            .query(&sql, &[&start_day, &end_day])
            .await?
            .iter()
            .map(shift_from_row)
            .collect())
    }

    async fn get_all_shifts(&self) -> Result<Vec<Shift>, StoreError> {
        let sql = format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts ORDER BY created_at, id"
        );
        Ok(self
            .0
            .query(&sql, &[])
            .await?
            .iter()
            .map(shift_from_row)
            .collect())
    }
}
