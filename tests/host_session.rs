use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};

use lessonbook::clock::FixedClock;
use lessonbook::engine::{Engine, InMemoryStore};
use lessonbook::host::{handle_line, run};

// Tuesday 2030-01-01 noon; 2030-01-07 is the following Monday.
fn engine() -> Engine {
    let now = Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap();
    Engine::new(Arc::new(InMemoryStore::new()), Arc::new(FixedClock::new(now)))
}

async fn call(engine: &Engine, cmd: Value) -> Value {
    let out = handle_line(engine, &cmd.to_string()).await;
    serde_json::from_str(&out).unwrap()
}

async fn ok(engine: &Engine, cmd: Value) -> Value {
    let reply = call(engine, cmd.clone()).await;
    assert_eq!(reply["ok"], true, "{cmd} failed: {reply}");
    reply["data"].clone()
}

async fn err_kind(engine: &Engine, cmd: Value) -> String {
    let reply = call(engine, cmd.clone()).await;
    assert_eq!(reply["ok"], false, "{cmd} unexpectedly succeeded: {reply}");
    assert!(reply["error"]["message"].as_str().is_some_and(|m| !m.is_empty()));
    reply["error"]["kind"].as_str().unwrap().to_string()
}

async fn setup(engine: &Engine) -> (String, String) {
    let coach = ok(
        engine,
        json!({
            "op": "create_instructor",
            "instructor": {
                "name": "Mia",
                "expertise": ["freestyle"],
                "working_hours": [
                    {"day": "monday", "start": "13:00", "end": "17:00"},
                    {"day": "monday", "start": "09:00", "end": "12:00"}
                ]
            }
        }),
    )
    .await;
    assert_eq!(coach["working_hours"][0]["start"], "09:00");

    let student = ok(
        engine,
        json!({
            "op": "create_student",
            "student": {
                "name": "Leo",
                "preferred_styles": ["freestyle"],
                "lesson_preference": "both_prefer_private"
            }
        }),
    )
    .await;
    (
        coach["id"].as_str().unwrap().to_string(),
        student["id"].as_str().unwrap().to_string(),
    )
}

fn lesson(coach: &str, student: &str, start: &str, end: &str) -> Value {
    json!({
        "instructor_id": coach,
        "student_ids": [student],
        "style": "freestyle",
        "lesson_type": "private",
        "start_time": start,
        "end_time": end
    })
}

#[tokio::test]
async fn booking_session() {
    let engine = engine();
    let (coach, student) = setup(&engine).await;

    ok(
        &engine,
        json!({"op": "admit_lesson", "lesson": lesson(&coach, &student, "2030-01-07T10:00:00Z", "2030-01-07T11:00:00Z")}),
    )
    .await;

    let free = ok(&engine, json!({"op": "available_hours", "instructor_id": coach, "date": "2030-01-07"})).await;
    assert_eq!(
        free,
        json!([
            {"start": "09:00", "end": "10:00"},
            {"start": "11:00", "end": "12:00"},
            {"start": "13:00", "end": "17:00"}
        ])
    );

    let request = ok(
        &engine,
        json!({"op": "admit_request", "request": lesson(&coach, &student, "2030-01-07T14:00:00Z", "2030-01-07T15:00:00Z")}),
    )
    .await;
    assert_eq!(request["status"], "pending");
    assert_eq!(request["can_approve"], true);
    let request_id = request["id"].as_str().unwrap().to_string();

    let week = ok(&engine, json!({"op": "weekly_availability", "date": "2030-01-09"})).await;
    assert_eq!(week[0]["days"][1]["day"], "monday");
    assert_eq!(
        week[0]["days"][1]["slots"],
        json!([
            {"start": "09:00", "end": "10:00"},
            {"start": "11:00", "end": "12:00"},
            {"start": "13:00", "end": "14:00"},
            {"start": "15:00", "end": "17:00"}
        ])
    );

    let decided = ok(&engine, json!({"op": "decide_request", "id": request_id, "approve": true})).await;
    assert_eq!(decided["status"], "approved");
    assert_eq!(decided["lesson"]["start_time"], "2030-01-07T14:00:00Z");

    let shown = ok(&engine, json!({"op": "get_request", "id": request_id})).await;
    assert_eq!(shown["status"], "approved");
    assert_eq!(shown["can_approve"], false);

    let lessons = ok(&engine, json!({"op": "lessons_for_student", "student_id": student})).await;
    assert_eq!(lessons.as_array().unwrap().len(), 2);

    assert_eq!(
        err_kind(&engine, json!({"op": "decide_request", "id": request_id, "approve": false})).await,
        "conflict"
    );
}

#[tokio::test]
async fn stale_request_shows_cannot_approve() {
    let engine = engine();
    let (coach, student) = setup(&engine).await;
    let request = ok(
        &engine,
        json!({"op": "admit_request", "request": lesson(&coach, &student, "2030-01-07T10:00:00Z", "2030-01-07T11:00:00Z")}),
    )
    .await;

    ok(
        &engine,
        json!({"op": "update_instructor", "id": coach, "patch": {"expertise": ["butterfly"]}}),
    )
    .await;

    let listed = ok(&engine, json!({"op": "list_requests", "status": "pending"})).await;
    assert_eq!(listed[0]["id"], request["id"]);
    assert_eq!(listed[0]["can_approve"], false);
    assert_eq!(
        err_kind(&engine, json!({"op": "decide_request", "id": request["id"], "approve": true})).await,
        "validation"
    );
}

#[tokio::test]
async fn errors_are_classified() {
    let engine = engine();
    let (coach, student) = setup(&engine).await;

    assert_eq!(err_kind(&engine, json!({"op": "teleport"})).await, "invalid_command");
    assert_eq!(
        err_kind(&engine, json!({"op": "get_lesson", "id": "01ARZ3NDEKTSV4RRFFQ69G5FAV"})).await,
        "not_found"
    );
    assert_eq!(
        err_kind(&engine, json!({"op": "weekly_availability", "date": "2030-01-02"})).await,
        "validation"
    );
    assert_eq!(
        err_kind(
            &engine,
            json!({"op": "admit_lesson", "lesson": lesson(&coach, &student, "2030-01-07T12:00:00Z", "2030-01-07T13:00:00Z")})
        )
        .await,
        "validation"
    );
}

#[tokio::test]
async fn pure_slot_commands() {
    let engine = engine();
    let sorted = ok(
        &engine,
        json!({"op": "validate_availability", "working_hours": [
            {"day": "tuesday", "start": "10:00", "end": "11:00"},
            {"day": "monday", "start": "10:00", "end": "11:00"}
        ]}),
    )
    .await;
    assert_eq!(sorted[0]["day"], "monday");

    assert_eq!(
        err_kind(
            &engine,
            json!({"op": "validate_availability", "working_hours": [
                {"day": "monday", "start": "09:00", "end": "10:01"},
                {"day": "monday", "start": "10:00", "end": "11:00"}
            ]})
        )
        .await,
        "validation"
    );

    let free = ok(
        &engine,
        json!({"op": "free_slots", "day": "monday",
            "working_hours": [{"day": "monday", "start": "09:00", "end": "17:00"}],
            "busy": [{"start": "10:00", "end": "11:00"}, {"start": "16:30", "end": "18:00"}]}),
    )
    .await;
    assert_eq!(free, json!([{"start": "09:00", "end": "10:00"}, {"start": "11:00", "end": "17:00"}]));
}

#[tokio::test]
async fn run_answers_each_line() {
    let engine = engine();
    let input = b"{\"op\":\"list_instructors\"}\n\n{\"op\":\"bogus\"}\n";
    let mut output = Vec::new();
    run(&engine, &input[..], &mut output).await.unwrap();

    let text = String::from_utf8(output).unwrap();
    let replies: Vec<Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0], json!({"ok": true, "data": []}));
    assert_eq!(replies[1]["error"]["kind"], "invalid_command");
}
