use serde::{Deserialize, Serialize};

use crate::{api, db};

pub use crate::db::shift::Id;

/// Substituted for the employee name in flat listings when the shift's
/// employee reference does not resolve.
pub const UNKNOWN_EMPLOYEE: &str = "Unknown Member";

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    pub id: Id,
    pub employee_id: api::user::Id,
    pub employee_name: String,
    pub day: String,
    pub start_time: String,
    pub end_time: String,
    pub task: String,
}

impl From<db::shift::ShiftWithEmployee> for Shift {
    fn from(joined: db::shift::ShiftWithEmployee) -> Self {
        Self {
            id: joined.shift.id,
            employee_id: joined.shift.employee_id,
            employee_name: joined
                .employee_name
                .unwrap_or_else(|| UNKNOWN_EMPLOYEE.to_string()),
            day: joined.shift.day,
            start_time: joined.shift.start_time,
            end_time: joined.shift.end_time,
            task: joined.shift.task,
        }
    }
}
