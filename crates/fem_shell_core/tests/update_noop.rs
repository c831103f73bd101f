use fem_shell_core::{update, AppState, Msg};

#[test]
fn tick_is_noop() {
    let state = AppState::new();
    let (next, effects) = update(state.clone(), Msg::Tick);

    assert_eq!(state, next);
    assert!(effects.is_empty());
}

#[test]
fn notice_only_appends_a_line() {
    let state = AppState::new();
    let (mut next, effects) = update(state, Msg::Notice("hello".to_string()));

    assert!(effects.is_empty());
    assert_eq!(next.log_text(), "-- hello\n");
    assert!(next.consume_dirty());
    assert!(!next.consume_dirty());
}
