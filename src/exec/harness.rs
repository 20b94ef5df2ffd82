// src/exec/harness.rs

//! Result-capture harness appended to generated programs.

/// File the harness writes the captured value to, next to the program.
pub const RESULT_FILE: &str = "result.json";

const HARNESS: &str = r#"

# --- solvedag result capture ---
import json as _solvedag_json
import os as _solvedag_os
if "result" in globals():
    _solvedag_path = _solvedag_os.path.join(
        _solvedag_os.path.dirname(_solvedag_os.path.abspath(__file__)), "result.json"
    )
    with open(_solvedag_path, "w") as _solvedag_file:
        _solvedag_json.dump({"result": result}, _solvedag_file, default=str)
"#;

/// The program as written to disk: the source followed by the harness.
pub fn instrument(program: &str) -> String {
    let mut source = program.trim_end().to_string();
    source.push_str(HARNESS);
    source
}
