//! JSON output for the CLI
//!
//! One JSON object per invocation, written to stdout by the binary:
//! - `{"status":"ok","data":...}`
//! - `{"status":"error","code":...,"message":...}`

use std::io::{self, Write};

use serde_json::{json, Value};

use super::errors::CliResult;

/// Write a success response
pub fn write_response<W: Write>(out: &mut W, data: Value) -> CliResult<()> {
    write_line(out, &json!({
        "status": "ok",
        "data": data
    }))
}

/// Write an error response
pub fn write_error<W: Write>(out: &mut W, code: &str, message: &str) -> CliResult<()> {
    write_line(out, &json!({
        "status": "error",
        "code": code,
        "message": message
    }))
}

fn write_line<W: Write>(out: &mut W, response: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *out, response).map_err(io::Error::from)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
