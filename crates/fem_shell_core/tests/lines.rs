use fem_shell_core::{LineAssembler, LogLine, Origin};
use pretty_assertions::assert_eq;

#[test]
fn partial_fragments_join_into_one_line() {
    let mut assembler = LineAssembler::new();

    assert!(assembler.push(Origin::Stdout, "iter").is_empty());
    assert!(assembler.push(Origin::Stdout, "ation 1 ").is_empty());
    let lines = assembler.push(Origin::Stdout, "converged\n");

    assert_eq!(lines, vec![LogLine::new(Origin::Stdout, "iteration 1 converged")]);
    assert!(assembler.is_empty());
}

#[test]
fn one_fragment_may_hold_many_lines() {
    let mut assembler = LineAssembler::new();
    let lines = assembler.push(Origin::Stdout, "a\r\nb\n\nc");

    assert_eq!(
        lines,
        vec![
            LogLine::new(Origin::Stdout, "a"),
            LogLine::new(Origin::Stdout, "b"),
            LogLine::new(Origin::Stdout, ""),
        ]
    );
    assert_eq!(assembler.flush(), vec![LogLine::new(Origin::Stdout, "c")]);
}

#[test]
fn switching_origin_completes_the_pending_line() {
    let mut assembler = LineAssembler::new();
    assert!(assembler.push(Origin::Stdout, "progress 50%").is_empty());
    let err = assembler.push(Origin::Stderr, "warning: mesh\n");
    let fault = assembler.push(Origin::Runner, "computation fault: boom\n");

    assert_eq!(
        err,
        vec![
            LogLine::new(Origin::Stdout, "progress 50%"),
            LogLine::new(Origin::Stderr, "warning: mesh"),
        ]
    );
    assert_eq!(fault, vec![LogLine::runner("computation fault: boom")]);
    assert!(assembler.is_empty());
}

#[test]
fn same_origin_keeps_extending_the_pending_line() {
    let mut assembler = LineAssembler::new();
    assembler.push(Origin::Stderr, "warning: ");
    assert!(assembler.push(Origin::Stderr, "").is_empty());
    let err = assembler.push(Origin::Stderr, "slow\nnext");

    assert_eq!(err, vec![LogLine::new(Origin::Stderr, "warning: slow")]);
    assert_eq!(assembler.flush(), vec![LogLine::new(Origin::Stderr, "next")]);
}

#[test]
fn display_prefixes_non_stdout_lines() {
    assert_eq!(LogLine::new(Origin::Stdout, "x").display(), "x");
    assert_eq!(LogLine::new(Origin::Stderr, "x").display(), "! x");
    assert_eq!(LogLine::runner("x").display(), "-- x");
}
