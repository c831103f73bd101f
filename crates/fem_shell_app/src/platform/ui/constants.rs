pub const APP_TITLE: &str = "FEM Solver Shell";

pub const HELP_LINES: &[&str] = &[
    "Commands:",
    "  open <path>   load an input file (alias: load)",
    "  run           execute the solver on the loaded input (alias: execute)",
    "  abort         stop the running solver at its next safe point",
    "  save <path>   write the log to a file",
    "  status        show the loaded input and current job",
    "  help          show this list",
    "  quit          abort any running job and exit (alias: exit)",
];
