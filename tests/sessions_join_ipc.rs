use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_trainingd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn trainingd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn create(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    collection: &str,
    draft: serde_json::Value,
) -> String {
    let result = request_ok(
        stdin,
        reader,
        id,
        "records.create",
        json!({ "collection": collection, "draft": draft }),
    );
    result
        .get("record")
        .and_then(|r| r.get("id"))
        .and_then(|v| v.as_str())
        .expect("created id")
        .to_string()
}

#[test]
fn sessions_carry_joined_course_and_venue() {
    let workspace = temp_dir("trainingd-sessions-join");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "tenant",
        "tenant.select",
        json!({ "organizationId": "org_acme" }),
    );

    let course_id = create(
        &mut stdin,
        &mut reader,
        "c1",
        "courses",
        json!({ "name": "Safety 101", "code": "S101" }),
    );
    let venue_id = create(
        &mut stdin,
        &mut reader,
        "v1",
        "venues",
        json!({ "name": "Main hall", "city": "Ghent" }),
    );
    let joined_id = create(
        &mut stdin,
        &mut reader,
        "s1",
        "sessions",
        json!({
            "title": "Morning block",
            "course_id": course_id,
            "venue_id": venue_id,
            "start_date": "2026-03-02"
        }),
    );
    let orphan_id = create(
        &mut stdin,
        &mut reader,
        "s2",
        "sessions",
        json!({
            "title": "Orphan block",
            "course_id": "crs_missing",
            "start_date": "2026-03-03"
        }),
    );

    let bad_date = request(
        &mut stdin,
        &mut reader,
        "s3",
        "records.create",
        json!({
            "collection": "sessions",
            "draft": { "course_id": course_id, "start_date": "03/02/2026" }
        }),
    );
    assert_eq!(error_code(&bad_date), "validation_failed");

    let detail = request_ok(
        &mut stdin,
        &mut reader,
        "g1",
        "records.get",
        json!({ "collection": "sessions", "id": joined_id }),
    );
    let record = detail.get("record").cloned().expect("record");
    assert_eq!(
        record
            .get("course")
            .and_then(|c| c.get("name"))
            .and_then(|v| v.as_str()),
        Some("Safety 101")
    );
    assert_eq!(
        record
            .get("venue")
            .and_then(|c| c.get("city"))
            .and_then(|v| v.as_str()),
        Some("Ghent")
    );
    assert!(record.get("instructor").is_none());

    let orphan = request_ok(
        &mut stdin,
        &mut reader,
        "g2",
        "records.get",
        json!({ "collection": "sessions", "id": orphan_id }),
    );
    let orphan = orphan.get("record").cloned().expect("record");
    assert!(orphan.get("course").is_none());
    assert_eq!(
        orphan.get("course_id").and_then(|v| v.as_str()),
        Some("crs_missing")
    );

    // Search reaches into the joined course name.
    let by_course = request_ok(
        &mut stdin,
        &mut reader,
        "l1",
        "records.list",
        json!({ "collection": "sessions", "searchText": "SAFETY" }),
    );
    let rows = by_course
        .get("rows")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id").and_then(|v| v.as_str()), Some(joined_id.as_str()));

    let sorted = request_ok(
        &mut stdin,
        &mut reader,
        "l2",
        "records.list",
        json!({
            "collection": "sessions",
            "sort": { "key": "course.name", "direction": "asc" }
        }),
    );
    let ids: Vec<&str> = sorted
        .get("rows")
        .and_then(|v| v.as_array())
        .map(|rows| rows.iter().filter_map(|r| r.get("id")?.as_str()).collect())
        .unwrap_or_default();
    assert_eq!(ids, vec![joined_id.as_str(), orphan_id.as_str()], "missing relation sorts last");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn attendance_rate_and_status_summary() {
    let workspace = temp_dir("trainingd-attendance-stats");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "tenant",
        "tenant.select",
        json!({ "organizationId": "org_acme" }),
    );

    let course_id = create(
        &mut stdin,
        &mut reader,
        "c1",
        "courses",
        json!({ "name": "First aid", "code": "FA1" }),
    );
    let session_id = create(
        &mut stdin,
        &mut reader,
        "s1",
        "sessions",
        json!({ "course_id": course_id, "start_date": "2026-04-01" }),
    );
    let other_session = create(
        &mut stdin,
        &mut reader,
        "s2",
        "sessions",
        json!({ "course_id": course_id, "start_date": "2026-04-08" }),
    );
    for (i, status) in ["present", "late", "absent", "present"].iter().enumerate() {
        let learner = create(
            &mut stdin,
            &mut reader,
            &format!("lrn{}", i),
            "learners",
            json!({ "first_name": format!("L{}", i), "last_name": "Test" }),
        );
        let _ = create(
            &mut stdin,
            &mut reader,
            &format!("att{}", i),
            "attendance",
            json!({ "session_id": session_id, "learner_id": learner, "status": status }),
        );
    }
    let _ = create(
        &mut stdin,
        &mut reader,
        "att-other",
        "attendance",
        json!({ "session_id": other_session, "learner_id": "lrn_x", "status": "absent" }),
    );

    let rate = request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "stats.attendanceRate",
        json!({ "sessionId": session_id }),
    );
    let attendance = rate.get("attendance").cloned().expect("attendance");
    assert_eq!(attendance.get("total").and_then(|v| v.as_u64()), Some(4));
    assert_eq!(attendance.get("present").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(attendance.get("late").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(attendance.get("rate").and_then(|v| v.as_f64()), Some(75.0));

    let overall = request_ok(
        &mut stdin,
        &mut reader,
        "r2",
        "stats.attendanceRate",
        json!({}),
    );
    assert_eq!(
        overall
            .get("attendance")
            .and_then(|a| a.get("rate"))
            .and_then(|v| v.as_f64()),
        Some(60.0)
    );

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "sum",
        "stats.summary",
        json!({ "collection": "attendance" }),
    );
    let summary = summary.get("summary").cloned().expect("summary");
    assert_eq!(summary.get("total").and_then(|v| v.as_u64()), Some(5));
    assert_eq!(summary.get("offline").and_then(|v| v.as_u64()), Some(5));
    assert_eq!(summary.get("groupField").and_then(|v| v.as_str()), Some("status"));
    let groups = summary
        .get("groups")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let first = &groups[0];
    assert_eq!(first.get("count").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(first.get("percent").and_then(|v| v.as_f64()), Some(40.0));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
