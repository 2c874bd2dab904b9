use futures::future::join_all;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error};

use crate::command::{Command, parse_command};
use crate::engine::{
    Decision, Engine, EngineError, ValidationError, free_slots, validate_and_sort_availability,
};
use crate::model::*;
use crate::observability::{COMMANDS_TOTAL, outcome};

/// A lesson request as shown to hosts, with whether approving it would succeed now.
#[derive(Debug, Clone, Serialize)]
pub struct RequestView {
    #[serde(flatten)]
    pub request: LessonRequest,
    pub can_approve: bool,
}

impl RequestView {
    /// The one place a revalidation error is reduced to a flag.
    pub async fn build(engine: &Engine, request: LessonRequest) -> Self {
        let can_approve = request.is_pending() && engine.revalidate_request(request.id).await.is_ok();
        Self { request, can_approve }
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value, EngineError> {
    serde_json::to_value(value).map_err(|e| EngineError::Storage(format!("encode response: {e}")))
}

/// Run one command against the engine.
pub async fn execute(engine: &Engine, cmd: Command) -> Result<Value, EngineError> {
    match cmd {
        Command::CreateInstructor { instructor } => to_json(engine.create_instructor(instructor).await?),
        Command::UpdateInstructor { id, patch } => to_json(engine.update_instructor(id, patch).await?),
        Command::DeleteInstructor { id } => {
            engine.delete_instructor(id).await?;
            Ok(json!({ "deleted": id }))
        }
        Command::GetInstructor { id } => to_json(engine.get_instructor(id).await?),
        Command::ListInstructors => to_json(engine.list_instructors().await?),
        Command::CreateStudent { student } => to_json(engine.create_student(student).await?),
        Command::UpdateStudent { id, patch } => to_json(engine.update_student(id, patch).await?),
        Command::DeleteStudent { id } => {
            engine.delete_student(id).await?;
            Ok(json!({ "deleted": id }))
        }
        Command::GetStudent { id } => to_json(engine.get_student(id).await?),
        Command::ValidateAvailability { working_hours } => {
            to_json(validate_and_sort_availability(working_hours)?)
        }
        Command::FreeSlots { day, working_hours, busy } => {
            let working = validate_and_sort_availability(working_hours)?;
            if let Some(bad) = busy.iter().find(|b| b.start >= b.end) {
                return Err(ValidationError::InvalidRange { day, start: bad.start, end: bad.end }.into());
            }
            to_json(free_slots(day, &working, &busy))
        }
        Command::AvailableHours { instructor_id, date } => {
            to_json(engine.available_hours_for_instructor(instructor_id, date).await?)
        }
        Command::WeeklyAvailability { date, instructor_ids, styles } => to_json(
            engine
                .weekly_availability(date, instructor_ids.as_deref(), &styles)
                .await?,
        ),
        Command::AdmitLesson { lesson } => to_json(engine.admit_lesson(lesson).await?),
        Command::UpdateLesson { id, patch } => to_json(engine.update_lesson(id, patch).await?),
        Command::DeleteLesson { id } => {
            engine.delete_lesson(id).await?;
            Ok(json!({ "deleted": id }))
        }
        Command::GetLesson { id } => to_json(engine.get_lesson(id).await?),
        Command::LessonsForInstructor { instructor_id } => {
            to_json(engine.lessons_for_instructor(instructor_id).await?)
        }
        Command::LessonsForStudent { student_id } => {
            to_json(engine.lessons_for_student(student_id).await?)
        }
        Command::AdmitRequest { request } => {
            let request = engine.admit_request(request).await?;
            to_json(RequestView::build(engine, request).await)
        }
        Command::DecideRequest { id, approve } => match engine.decide_request(id, approve).await? {
            Decision::Approved(lesson) => Ok(json!({ "status": RequestStatus::Approved, "lesson": to_json(lesson)? })),
            Decision::Rejected => Ok(json!({ "status": RequestStatus::Rejected })),
        },
        Command::DeleteRequest { id } => {
            engine.delete_request(id).await?;
            Ok(json!({ "deleted": id }))
        }
        Command::GetRequest { id } => {
            let request = engine.get_request(id).await?;
            to_json(RequestView::build(engine, request).await)
        }
        Command::ListRequests { status } => {
            let requests = engine.list_requests(status).await?;
            let views = join_all(requests.into_iter().map(|r| RequestView::build(engine, r))).await;
            to_json(views)
        }
    }
}

fn render_error(kind: &str, message: String) -> String {
    json!({ "ok": false, "error": { "kind": kind, "message": message } }).to_string()
}

/// Parse, execute and render one JSON command line.
///
/// Success is `{"ok":true,"data":...}`; failure is `{"ok":false,"error":{"kind","message"}}`
/// where kind is `invalid_command`, `validation`, `not_found`, `conflict` or `internal`.
pub async fn handle_line(engine: &Engine, line: &str) -> String {
    let cmd = match parse_command(line) {
        Ok(cmd) => cmd,
        Err(e) => {
            metrics::counter!(COMMANDS_TOTAL, "command" => "unknown", "outcome" => "invalid_command")
                .increment(1);
            debug!("unparseable command: {e}");
            return render_error("invalid_command", e.to_string());
        }
    };

    let label = cmd.label();
    let result = execute(engine, cmd).await;
    metrics::counter!(COMMANDS_TOTAL, "command" => label, "outcome" => outcome(&result)).increment(1);
    match result {
        Ok(data) => json!({ "ok": true, "data": data }).to_string(),
        Err(e) => {
            if matches!(e, EngineError::Storage(_)) {
                error!("{label} failed: {e}");
            } else {
                debug!("{label} refused: {e}");
            }
            render_error(e.kind(), e.to_string())
        }
    }
}

/// Serve JSON-lines commands from `reader` until EOF, one response line per command.
pub async fn run<R, W>(engine: &Engine, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut response = handle_line(engine, line).await;
        response.push('\n');
        writer.write_all(response.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
