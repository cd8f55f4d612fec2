//! Behavioural tests for key-value requests against a serving daemon.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Value, json};

use crate::protocol::{ErrorCode, Status};

use super::support::{self, TestWorld};

type StepResult = Result<(), String>;

#[fixture]
fn world() -> RefCell<TestWorld> {
    support::world()
}

#[given("a serving daemon")]
fn given_serving(world: &RefCell<TestWorld>) -> StepResult {
    world.borrow_mut().start_serving()
}

#[when("the client puts \"{value}\" under \"{key}\" in database \"{database}\"")]
fn when_put(world: &RefCell<TestWorld>, value: String, key: String, database: String) {
    world.borrow_mut().request(
        "PUT",
        Some(&database),
        json!({ "key": key, "value": value }),
    );
}

#[when("the client puts \"{value}\" under \"{key}\" in the default database")]
fn when_put_default(world: &RefCell<TestWorld>, value: String, key: String) {
    world
        .borrow_mut()
        .request("PUT", None, json!({ "key": key, "value": value }));
}

#[when("the client gets \"{key}\" from database \"{database}\"")]
fn when_get(world: &RefCell<TestWorld>, key: String, database: String) {
    world
        .borrow_mut()
        .request("GET", Some(&database), json!({ "key": key }));
}

#[when("the client drops database \"{database}\"")]
fn when_drop(world: &RefCell<TestWorld>, database: String) {
    world
        .borrow_mut()
        .request("DROP", Some(&database), Value::Null);
}

#[when("the client lists the databases")]
fn when_list(world: &RefCell<TestWorld>) {
    world.borrow_mut().request("LIST", None, Value::Null);
}

#[when("the client sends PING")]
fn when_ping(world: &RefCell<TestWorld>) {
    world.borrow_mut().request("PING", None, Value::Null);
}

#[when("the client sends the command \"{command}\"")]
fn when_command(world: &RefCell<TestWorld>, command: String) {
    world.borrow_mut().request(&command, None, Value::Null);
}

#[when("the client sends a single-frame request")]
fn when_single_frame(world: &RefCell<TestWorld>) {
    world.borrow_mut().send_raw(r#"[{"command": "GET"}]"#);
}

#[then("the response succeeds")]
fn then_succeeds(world: &RefCell<TestWorld>) {
    let world = world.borrow();
    let response = world.last_response();
    assert!(response.is_success(), "unexpected failure: {response:?}");
    assert_eq!(response.header.error_code, ErrorCode::None);
}

#[then("the response fails with {code}")]
fn then_fails_with(world: &RefCell<TestWorld>, code: String) -> StepResult {
    let expected = parse_error_code(&code)?;
    let world = world.borrow();
    let response = world.last_response();
    assert_eq!(response.header.status, Status::Failure);
    assert_eq!(response.header.error_code, expected);
    assert!(!response.header.error_message.is_empty());
    Ok(())
}

#[then("the response value is \"{value}\"")]
fn then_value(world: &RefCell<TestWorld>, value: String) {
    let world = world.borrow();
    assert_eq!(
        world.last_response().content.get("value"),
        Some(&Value::String(value))
    );
}

#[then("the listed databases are \"{names}\"")]
fn then_listed(world: &RefCell<TestWorld>, names: String) {
    let expected: Vec<&str> = names.split(',').map(str::trim).collect();
    let world = world.borrow();
    assert_eq!(
        world.last_response().content.get("databases"),
        Some(&json!(expected))
    );
}

#[scenario(path = "tests/features/key_value_requests.feature")]
fn key_value_requests(world: RefCell<TestWorld>) {
    let _ = world;
}

fn parse_error_code(name: &str) -> Result<ErrorCode, String> {
    Ok(match name {
        "NOT_FOUND" => ErrorCode::NotFound,
        "INVALID_ARGUMENTS" => ErrorCode::InvalidArguments,
        "REQUEST_ERROR" => ErrorCode::RequestError,
        "UNKNOWN_COMMAND" => ErrorCode::UnknownCommand,
        "STORAGE_ERROR" => ErrorCode::StorageError,
        "IN_USE" => ErrorCode::InUse,
        "INTERNAL_ERROR" => ErrorCode::InternalError,
        other => return Err(format!("unknown error code '{other}'")),
    })
}
