use lumen_common::{ChannelKind, ScheduleRecord};
use serde_json::Value;
use tracing::{info, warn};

use crate::app::App;
use crate::http::{ParseError, Request, Response};

/// Routes one raw request buffer to a command and produces the response.
/// Every outcome maps to exactly one response; the caller closes the
/// connection afterwards regardless.
pub fn handle(raw: &[u8], app: &mut App) -> Response {
    let request = match Request::parse(raw) {
        Ok(request) => request,
        Err(ParseError::MalformedRequestLine) => {
            return Response::bad_request("Bad Request - Malformed Request Line")
        }
        Err(_) => return Response::bad_request("Bad Request - Invalid Headers"),
    };

    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/warm/on") => switch(app, ChannelKind::Warm, true, &request),
        ("GET", "/warm/off") => switch(app, ChannelKind::Warm, false, &request),
        ("GET", "/natural/on") => switch(app, ChannelKind::Natural, true, &request),
        ("GET", "/natural/off") => switch(app, ChannelKind::Natural, false, &request),
        ("GET", "/warm/brightness") => brightness(app, ChannelKind::Warm, &request),
        ("GET", "/natural/brightness") => brightness(app, ChannelKind::Natural, &request),
        ("GET", "/schedules") => list_schedules(app),
        ("GET", "/time") => report_time(app),
        ("GET", "/sync") => force_sync(app),
        ("POST", "/set_schedule") => set_schedule(app, &request),
        _ => unhandled(&request),
    }
}

fn unhandled(request: &Request) -> Response {
    Response::not_found(format!(
        "Endpoint not found for method {} and path {}.",
        request.method, request.path
    ))
}

fn switch(app: &mut App, kind: ChannelKind, on: bool, request: &Request) -> Response {
    let channel = app.channel_mut(kind);
    let ok = if on { channel.on() } else { channel.off() };
    if !ok {
        // An uninitialized channel behaves like a route that does not exist.
        return unhandled(request);
    }
    Response::ok(format!("{} {}", kind.label(), if on { "ON" } else { "OFF" }))
}

fn brightness(app: &mut App, kind: ChannelKind, request: &Request) -> Response {
    let Some(level_raw) = request.query_param("level") else {
        return Response::bad_request("Missing 'level' parameter. Use ?level=0-100");
    };
    let level = match level_raw.parse::<i64>() {
        Ok(level) if (0..=100).contains(&level) => level,
        _ => return Response::bad_request("Invalid brightness value. Use ?level=0-100"),
    };

    if !app.channel_mut(kind).set_brightness(level) {
        return Response::bad_request("Invalid brightness value. Use ?level=0-100");
    }
    Response::ok(format!("{} brightness set to {level}%", kind.label()))
}

fn list_schedules(app: &App) -> Response {
    match serde_json::to_string(app.store.records()) {
        Ok(json) => Response::json(json),
        Err(err) => {
            warn!("schedule serialization failed: {err}");
            Response::server_error("Failed to serialize schedules")
        }
    }
}

fn report_time(app: &App) -> Response {
    if app.clock.is_synced() {
        Response::ok(app.clock.format_time())
    } else {
        Response::ok("Time not synchronized yet")
    }
}

fn force_sync(app: &mut App) -> Response {
    if app.clock.sync(&app.config.ntp_servers) {
        Response::ok(format!("Time synced: {}", app.clock.format_time()))
    } else {
        Response::server_error("Failed to sync time")
    }
}

fn set_schedule(app: &mut App, request: &Request) -> Response {
    let content_length = match request.content_length() {
        Ok(Some(length)) if length > 0 => length,
        Ok(_) => {
            return Response::bad_request("Content-Length header missing or zero for POST")
        }
        Err(_) => return Response::bad_request("Invalid Content-Length"),
    };

    // Only bytes that arrived in the first read are available; bodies split
    // across reads are not supported.
    let end = content_length.min(request.body.len());
    let payload = &request.body.as_bytes()[..end];
    if payload.is_empty() {
        return Response::bad_request("Empty JSON payload");
    }

    let value: Value = match serde_json::from_slice(payload) {
        Ok(value) => value,
        Err(err) => return Response::bad_request(format!("Invalid JSON format: {err}")),
    };
    if !value.is_array() {
        return Response::bad_request("Payload must be a JSON array of schedules.");
    }
    let records: Vec<ScheduleRecord> = match serde_json::from_value(value) {
        Ok(records) => records,
        Err(err) => return Response::bad_request(format!("Invalid JSON format: {err}")),
    };

    info!("received {} schedules", records.len());
    app.store.replace(records);
    if let Err(err) = app.store.save() {
        warn!("failed to persist schedules: {err:#}");
    }
    // New schedules take effect before the response goes out, not on the
    // next periodic tick.
    app.evaluate_and_apply();
    Response::ok("Schedules updated successfully.")
}
