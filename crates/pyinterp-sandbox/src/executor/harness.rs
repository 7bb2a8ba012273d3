//! Bootstrap program run by the child interpreter, and parsing of the
//! envelope it reports back.
//!
//! The child reads `{"code": ..., "bindings": {...}}` from stdin, executes the
//! code in a fresh namespace with stdout/stderr redirected into buffers, and
//! writes a single line `SENTINEL + json` to the real stdout before exiting.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Prefix of the envelope line. Anything the snippet manages to write
/// outside the redirected buffers lands before or after it.
pub const SENTINEL: &str = "\u{1e}PYINTERP_ENVELOPE\u{1e}";

/// Python source passed to `python -c`.
pub const HARNESS: &str = r#"
import contextlib
import io
import json
import os
import sys
import types

SENTINEL = "\x1ePYINTERP_ENVELOPE\x1e"
_HIDDEN = (types.ModuleType, types.FunctionType, types.BuiltinFunctionType, type)


def _clean(text):
    # Lone surrogates survive json.dumps as escapes no strict decoder accepts.
    return text.encode("utf-8", "backslashreplace").decode("utf-8")


def _text(value):
    try:
        return _clean(str(value))
    except BaseException:
        try:
            return _clean(repr(value))
        except BaseException:
            return "<unprintable %s>" % type(value).__name__


def _visible(namespace):
    out = {}
    for name, value in namespace.items():
        if not isinstance(name, str):
            continue
        if name.startswith("__") and name.endswith("__"):
            continue
        if isinstance(value, _HIDDEN):
            continue
        out[_clean(name)] = _text(value)
    return out


def _main():
    real_stdout = sys.stdout
    request = json.loads(sys.stdin.read())
    sys.stdin = io.StringIO("")

    namespace = dict(request.get("bindings") or {})
    namespace.setdefault("__name__", "__main__")
    out, err = io.StringIO(), io.StringIO()
    envelope = {"ok": True}
    try:
        with contextlib.redirect_stdout(out), contextlib.redirect_stderr(err):
            exec(compile(request["code"], "<snippet>", "exec"), namespace)
    except BaseException as exc:
        detail = _text(exc)
        name = type(exc).__name__
        envelope = {"ok": False, "error": "%s: %s" % (name, detail) if detail else name}

    envelope["stdout"] = _clean(out.getvalue())
    envelope["stderr"] = _clean(err.getvalue())
    if envelope["ok"]:
        if "result" in namespace:
            envelope["result"] = _text(namespace["result"])
        envelope["bindings"] = _visible(namespace)

    real_stdout.write(SENTINEL + json.dumps(envelope) + "\n")
    real_stdout.flush()
    sys.stderr.flush()
    os._exit(0)


_main()
"#;

/// What the harness reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Envelope {
    pub ok: bool,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub bindings: BTreeMap<String, String>,
}

/// Raw process stdout split around the envelope line.
#[derive(Debug, PartialEq, Eq)]
pub struct SplitOutput<'a> {
    /// JSON text after the last sentinel, up to end of line.
    pub envelope: Option<&'a str>,
    /// Everything else the process wrote to fd 1.
    pub stray: String,
}

pub fn split_output(raw: &str) -> SplitOutput<'_> {
    let Some(start) = raw.rfind(SENTINEL) else {
        return SplitOutput {
            envelope: None,
            stray: raw.to_string(),
        };
    };
    let body_start = start + SENTINEL.len();
    let body_end = raw[body_start..]
        .find('\n')
        .map(|i| body_start + i)
        .unwrap_or(raw.len());
    let after = raw.get(body_end + 1..).unwrap_or("");
    SplitOutput {
        envelope: Some(&raw[body_start..body_end]),
        stray: format!("{}{}", &raw[..start], after),
    }
}

pub fn parse_envelope(json: &str) -> Result<Envelope, serde_json::Error> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_and_rust_agree_on_sentinel() {
        assert!(HARNESS.contains(r#"SENTINEL = "\x1ePYINTERP_ENVELOPE\x1e""#));
        assert!(SENTINEL.starts_with('\u{1e}'));
    }

    #[test]
    fn test_split_without_envelope() {
        let split = split_output("Fatal Python error\n");
        assert_eq!(split.envelope, None);
        assert_eq!(split.stray, "Fatal Python error\n");
    }

    #[test]
    fn test_split_keeps_text_around_envelope() {
        let raw = format!("from fd\n{}{{\"ok\": true}}\nlate\n", SENTINEL);
        let split = split_output(&raw);
        assert_eq!(split.envelope, Some("{\"ok\": true}"));
        assert_eq!(split.stray, "from fd\nlate\n");
    }

    #[test]
    fn test_split_uses_last_sentinel() {
        let raw = format!("{}fake\n{}{{\"ok\": false}}\n", SENTINEL, SENTINEL);
        let split = split_output(&raw);
        assert_eq!(split.envelope, Some("{\"ok\": false}"));
        assert!(split.stray.contains("fake"));
    }

    #[test]
    fn test_parse_success_envelope() {
        let env = parse_envelope(
            r#"{"ok": true, "stdout": "hi\n", "stderr": "", "result": "4", "bindings": {"result": "4"}}"#,
        )
        .unwrap();
        assert!(env.ok);
        assert_eq!(env.result.as_deref(), Some("4"));
        assert_eq!(env.bindings.get("result").map(String::as_str), Some("4"));
    }

    #[test]
    fn test_parse_failure_envelope_without_bindings() {
        let env = parse_envelope(
            r#"{"ok": false, "error": "ZeroDivisionError: division by zero", "stdout": "before\n", "stderr": ""}"#,
        )
        .unwrap();
        assert!(!env.ok);
        assert_eq!(env.error.as_deref(), Some("ZeroDivisionError: division by zero"));
        assert_eq!(env.stdout, "before\n");
        assert!(env.bindings.is_empty());
    }
}
