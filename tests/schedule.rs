pub mod common;

use shiftboard::{
    config::OverlapPolicy,
    db::{
        shift::{NewShift, Shift, ShiftWithEmployee},
        user::{self, NewUser, Role},
    },
    schedule,
};
use time::{macros::date, OffsetDateTime, Weekday};

fn new_shift(employee_id: user::Id, day: &str, task: &str) -> NewShift {
    NewShift {
        employee_id,
        day: day.to_string(),
        start_time: "09:00".to_string(),
        end_time: "17:00".to_string(),
        task: task.to_string(),
    }
}

#[tokio::test]
async fn week_view_matches_the_reference_scenario() {
    let (db_client, _) = common::mem_client();
    let manager = db_client
        .create_user(NewUser {
            name: "Ivan Manager".to_string(),
            username: "manager".to_string(),
            password: "p".to_string(),
            role: Role::Manager,
            avatar_url: None,
        })
        .await
        .expect("failed to create the manager");
    db_client
        .create_shift(
            new_shift(manager, "2025-07-14", "X"),
            OverlapPolicy::Allow,
        )
        .await
        .expect("failed to create a shift");

    let identity = db_client
        .authenticate("manager", "p")
        .await
        .expect("login failed");
    assert_eq!(identity.role, Role::Manager);

    // 2025-07-16 is a Wednesday.
    let view = schedule::week_view(&db_client, date!(2025 - 07 - 16), 0)
        .await
        .expect("failed to build the week view");

    assert_eq!(view.start, "2025-07-14");
    assert_eq!(view.end, "2025-07-20");
    assert_eq!(view.days.len(), 7);
    assert_eq!(
        view.days.iter().map(|d| d.day_key.as_str()).collect::<Vec<_>>(),
        [
            "2025-07-14",
            "2025-07-15",
            "2025-07-16",
            "2025-07-17",
            "2025-07-18",
            "2025-07-19",
            "2025-07-20",
        ],
    );
    assert_eq!(view.days[0].label, "Monday, 14 July");

    assert_eq!(view.days_with_shifts.len(), 1);
    assert_eq!(view.days_with_shifts[0].day_key, "2025-07-14");
    assert_eq!(view.days_with_shifts[0].shifts.len(), 1);
    assert_eq!(view.days_with_shifts[0].shifts[0].task, "X");
    assert_eq!(
        view.days_with_shifts[0].shifts[0].employee_name,
        "Ivan Manager",
    );
}

#[tokio::test]
async fn dangling_references_never_reach_the_view() {
    let (db_client, _) = common::mem_client();
    db_client
        .create_shift(
            new_shift(user::Id::from(0xdead), "2025-07-15", "Ghost duty"),
            OverlapPolicy::Allow,
        )
        .await
        .expect("failed to create a shift");

    let view = schedule::week_view(&db_client, date!(2025 - 07 - 16), 0)
        .await
        .expect("failed to build the week view");

    assert_eq!(view.days.len(), 7);
    assert!(view.days_with_shifts.is_empty());
    assert!(view.days.iter().all(|d| d.shifts.is_empty()));
}

#[tokio::test]
async fn offsets_select_adjacent_weeks() {
    let (db_client, _) = common::mem_client();
    let alice = db_client
        .create_user(NewUser {
            name: "Alice".to_string(),
            username: "alice".to_string(),
            password: "x".to_string(),
            role: Role::Employee,
            avatar_url: None,
        })
        .await
        .expect("failed to create alice");
    db_client
        .create_shift(
            new_shift(alice, "2025-07-21", "Next week"),
            OverlapPolicy::Allow,
        )
        .await
        .expect("failed to create a shift");

    let today = date!(2025 - 07 - 16);

    let current = schedule::week_view(&db_client, today, 0)
        .await
        .expect("failed to build the current week");
    assert!(current.days_with_shifts.is_empty());

    let next = schedule::week_view(&db_client, today, 1)
        .await
        .expect("failed to build the next week");
    assert_eq!(next.start, "2025-07-21");
    assert_eq!(next.days_with_shifts.len(), 1);
    assert_eq!(next.days_with_shifts[0].shifts[0].task, "Next week");
}

#[test]
fn grouping_keys_are_the_raw_day_strings() {
    let joined = |day: &str, task: &str| ShiftWithEmployee {
        shift: Shift {
            id: shiftboard::db::shift::Id::new(),
            employee_id: user::Id::from(1),
            day: day.to_string(),
            start_time: "09:00".to_string(),
            end_time: "17:00".to_string(),
            task: task.to_string(),
            created_at: OffsetDateTime::now_utc(),
        },
        employee_name: Some("Alice".to_string()),
    };

    let grouped = schedule::group_by_day(vec![
        joined("2025-07-14", "A"),
        joined("2025-07-14", "B"),
        joined("2025-07-15", "C"),
    ]);

    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped["2025-07-14"].len(), 2);
    assert_eq!(grouped["2025-07-15"].len(), 1);
}

#[tokio::test]
async fn week_endpoint_serves_seven_days() {
    let server = common::spawn().await;
    common::seed_user(&server, "Ivan Manager", "manager", "p", Role::Manager)
        .await;
    let (client, _) = common::Client::new(&server)
        .login("manager", "p")
        .await
        .expect("login failed");

    let view = client.week(0).await.expect("failed to get the week view");

    let days = view["days"].as_array().expect("days must be an array");
    assert_eq!(days.len(), 7);
    let first_key = days[0]["dayKey"].as_str().expect("dayKey must be set");
    let first = schedule::parse_day_key(first_key)
        .expect("dayKey must be canonical");
    assert_eq!(first.weekday(), Weekday::Monday);
    assert!(view["daysWithShifts"].is_array());
}
