//! Tests for autoremedy-core: state labels, run outcomes, errors

use autoremedy_core::*;

// ===========================================================================
// State
// ===========================================================================

#[test]
fn reserved_states_have_expected_labels() {
    assert_eq!(State::INITIAL.as_str(), "INITIAL");
    assert_eq!(State::DONE.as_str(), "DONE");
    assert_eq!(State::ERROR.as_str(), "ERROR");
}

#[test]
fn only_done_and_error_are_terminal() {
    assert!(State::DONE.is_terminal());
    assert!(State::ERROR.is_terminal());
    assert!(!State::INITIAL.is_terminal());
    assert!(!State::from_static("APPENDING").is_terminal());
}

#[test]
fn owned_and_static_labels_compare_equal() {
    assert_eq!(State::new("DONE"), State::DONE);
    assert!(State::new(String::from("ERROR")).is_terminal());
    let s: State = "FIXING".into();
    assert_eq!(s, State::new("FIXING"));
}

#[test]
fn state_display() {
    assert_eq!(format!("{}", State::from_static("FIXING")), "FIXING");
}

#[test]
fn state_serializes_as_plain_string() {
    let json = serde_json::to_string(&State::DONE).unwrap();
    assert_eq!(json, "\"DONE\"");
    let back: State = serde_json::from_str("\"ERROR\"").unwrap();
    assert_eq!(back, State::ERROR);
}

// ===========================================================================
// Halt / RunOutcome
// ===========================================================================

#[test]
fn halt_converts_to_matching_error() {
    let err = Halt::NoHandler { state: State::from_static("STUCK") }.into_error("FooBot");
    assert!(matches!(err, Error::NoHandlerForState { ref state, .. } if state == "STUCK"));

    let err = Halt::TransitionLimit { limit: 5 }.into_error("FooBot");
    assert_eq!(err.to_string(), "transition limit exceeded in FooBot after 5 transitions");
}

#[test]
fn run_outcome_json_omits_absent_halt() {
    let outcome = RunOutcome { final_state: State::DONE, transitions: 1, halt: None };
    assert!(outcome.is_done());
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["final_state"], "DONE");
    assert!(json.get("halt").is_none());
}

#[test]
fn run_outcome_json_tags_halt_reason() {
    let outcome = RunOutcome {
        final_state: State::ERROR,
        transitions: 1000,
        halt: Some(Halt::TransitionLimit { limit: 1000 }),
    };
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["halt"]["reason"], "transition_limit");
    assert_eq!(json["halt"]["limit"], 1000);
}

// ===========================================================================
// Error
// ===========================================================================

#[test]
fn error_display_messages() {
    assert_eq!(
        Error::invalid_input("file path cannot be empty").to_string(),
        "invalid input: file path cannot be empty"
    );
    let err = Error::SubprocessFailure { code: Some(2), stderr: "boom".into() };
    assert_eq!(err.to_string(), "audit script failed (exit code Some(2)): boom");
}

#[test]
fn io_error_converts() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err: Error = io.into();
    assert!(matches!(err, Error::Io(_)));
    assert!(err.to_string().contains("gone"));
}

#[test]
fn only_missing_bots_is_fatal() {
    assert!(Error::NoBotsRegistered.is_fatal());
    assert!(!Error::invalid_input("x").is_fatal());
    assert!(!Error::PathExtraction("line".into()).is_fatal());
}
