// src/sandbox/mod.rs
//! In-process execution of untrusted program text.
//!
//! Every call to [`execute`] builds a brand new interpreter context, so nothing defined by
//! one program (globals, prototype patches) is visible to the next.

mod harness;
pub mod value;

use boa_engine::{js_string, Context, JsError, JsNativeError, JsObject, JsResult, JsValue};
use serde::{Deserialize, Serialize};

use crate::models::{RunRequest, RunResponse, TestResult};
use harness::Harness;
pub use value::{deep_equal, Value};

pub const NO_ENTRY_POINT: &str =
    "No callable entry point: declare function solution(...) or assign a function to module.exports";

/// Interpreter limits applied to each fresh context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxLimits {
    pub loop_iteration_limit: u64,
    pub recursion_limit: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            loop_iteration_limit: 100_000_000,
            recursion_limit: 512,
        }
    }
}

/// Loads the program once and runs every case against it.
pub fn execute(request: &RunRequest, limits: &SandboxLimits) -> RunResponse {
    let mut context = Context::default();
    context
        .runtime_limits_mut()
        .set_loop_iteration_limit(limits.loop_iteration_limit);
    context
        .runtime_limits_mut()
        .set_recursion_limit(limits.recursion_limit);

    let harness = match Harness::install(&mut context) {
        Ok(harness) => harness,
        Err(e) => {
            let message = error_message(e, &mut context);
            log::error!("Failed to install sandbox harness: {}", message);
            return RunResponse::failure(format!("Sandbox setup failed: {}", message));
        }
    };

    let entry = match harness.load(&request.code, &mut context) {
        Ok(value) => match value.as_callable() {
            Some(function) => function.clone(),
            None => {
                return RunResponse::Failure {
                    error: NO_ENTRY_POINT.to_string(),
                    logs: harness.logs(&mut context),
                };
            }
        },
        Err(e) => {
            let error = error_message(e, &mut context);
            log::debug!("Program failed to load: {}", error);
            return RunResponse::Failure {
                error,
                logs: harness.logs(&mut context),
            };
        }
    };

    let results = request
        .cases
        .iter()
        .map(|case| {
            let result = run_case(&entry, &harness, case, &mut context);
            log::debug!("{} -> pass={}", result.name, result.pass);
            result
        })
        .collect();

    RunResponse::Success {
        results,
        logs: harness.logs(&mut context),
    }
}

fn run_case(
    entry: &JsObject,
    harness: &Harness,
    case: &crate::models::Case,
    context: &mut Context,
) -> TestResult {
    let outcome = invoke(entry, &case.args, context)
        .and_then(|returned| to_value(&returned, harness, context));

    match outcome {
        Ok(actual) => {
            let expected = case.expected.as_ref().map_or(Value::Undefined, Value::from);
            if deep_equal(&actual, &expected) {
                TestResult::passed(&case.name)
            } else {
                TestResult::mismatch(&case.name, expected.render(), actual.render())
            }
        }
        Err(e) => TestResult::errored(&case.name, error_message(e, context)),
    }
}

fn invoke(entry: &JsObject, args: &[serde_json::Value], context: &mut Context) -> JsResult<JsValue> {
    let args = args
        .iter()
        .map(|arg| JsValue::from_json(arg, context))
        .collect::<JsResult<Vec<_>>>()?;
    entry.call(&JsValue::undefined(), &args, context)
}

/// Deepest result nesting converted before the case is failed.
pub const MAX_RESULT_DEPTH: usize = value::MAX_DEPTH;
/// Most array elements and object properties converted for one result.
pub const MAX_RESULT_ELEMENTS: u64 = 250_000;

const RESULT_TOO_DEEP: &str = "Result too deeply nested";
const RESULT_TOO_LARGE: &str = "Result too large";

/// Converts an engine value into the tagged [`Value`].
///
/// Fails the case instead of converting results deeper than [`MAX_RESULT_DEPTH`] or with
/// more than [`MAX_RESULT_ELEMENTS`] members.
fn to_value(value: &JsValue, harness: &Harness, context: &mut Context) -> JsResult<Value> {
    let mut walker = Walker {
        harness,
        seen: Vec::new(),
        cyclic: false,
        remaining: MAX_RESULT_ELEMENTS,
    };
    let converted = walker.walk(value, 0, context)?;
    if walker.cyclic {
        return Ok(Value::Opaque(plain_string(value, context)));
    }
    Ok(converted)
}

struct Walker<'h> {
    harness: &'h Harness,
    seen: Vec<JsObject>,
    cyclic: bool,
    remaining: u64,
}

impl Walker<'_> {
    /// Applies `toJSON` and unboxes primitive wrappers, as `JSON.stringify` does, then converts.
    fn walk(&mut self, value: &JsValue, depth: usize, context: &mut Context) -> JsResult<Value> {
        if depth > MAX_RESULT_DEPTH {
            return Err(JsNativeError::range().with_message(RESULT_TOO_DEEP).into());
        }
        if let Some(object) = value.as_object() {
            if !object.is_callable() {
                if let Some(replacement) = self.harness.json_form(value, context)? {
                    return self.convert(&replacement, depth, context);
                }
            }
        }
        self.convert(value, depth, context)
    }

    fn convert(&mut self, value: &JsValue, depth: usize, context: &mut Context) -> JsResult<Value> {
        if value.is_undefined() {
            return Ok(Value::Undefined);
        }
        if value.is_null() {
            return Ok(Value::Null);
        }
        if let Some(b) = value.as_boolean() {
            return Ok(Value::Bool(b));
        }
        if let Some(n) = value.as_number() {
            return Ok(Value::Number(n));
        }
        if let Some(s) = value.as_string() {
            return Ok(Value::String(s.to_std_string_escaped()));
        }
        let Some(object) = value.as_object() else {
            // Symbols and bigints.
            return Ok(Value::Opaque(plain_string(value, context)));
        };
        if object.is_callable() {
            return Ok(Value::Opaque(plain_string(value, context)));
        }
        if self.seen.iter().any(|open| JsObject::equals(open, object)) {
            self.cyclic = true;
            return Ok(Value::Opaque("[Circular]".to_string()));
        }

        self.seen.push(object.clone());
        let converted = if object.is_array() {
            self.walk_array(object, depth, context)
        } else {
            self.walk_object(value, object, depth, context)
        };
        self.seen.pop();
        converted
    }

    fn claim(&mut self, count: u64) -> JsResult<()> {
        if count > self.remaining {
            return Err(JsNativeError::range().with_message(RESULT_TOO_LARGE).into());
        }
        self.remaining -= count;
        Ok(())
    }

    fn walk_array(&mut self, array: &JsObject, depth: usize, context: &mut Context) -> JsResult<Value> {
        let length = array.get(js_string!("length"), context)?.to_length(context)?;
        self.claim(length)?;
        let mut items = Vec::new();
        for index in 0..length {
            let item = array.get(index as u32, context)?;
            items.push(self.walk(&item, depth + 1, context)?);
        }
        Ok(Value::Array(items))
    }

    fn walk_object(
        &mut self,
        value: &JsValue,
        object: &JsObject,
        depth: usize,
        context: &mut Context,
    ) -> JsResult<Value> {
        let keys = self.harness.keys(value, context)?;
        self.claim(keys.len() as u64)?;
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let item = object.get(boa_engine::JsString::from(key.as_str()), context)?;
            let item = self.walk(&item, depth + 1, context)?;
            entries.push((key, item));
        }
        Ok(Value::Object(entries))
    }
}

/// `String(value)`, falling back to the engine's debug display when conversion throws.
fn plain_string(value: &JsValue, context: &mut Context) -> String {
    match value.to_string(context) {
        Ok(text) => text.to_std_string_escaped(),
        Err(_) => value.display().to_string(),
    }
}

/// The thrown error's `message` when it has a non-empty one, else its string conversion.
fn error_message(error: JsError, context: &mut Context) -> String {
    if let Some(thrown) = error.as_opaque() {
        if let Some(object) = thrown.as_object() {
            if let Ok(message) = object.get(js_string!("message"), context) {
                if let Some(text) = message.as_string() {
                    let text = text.to_std_string_escaped();
                    if !text.is_empty() {
                        return text;
                    }
                }
            }
        }
        return plain_string(thrown, context);
    }

    match error.try_native(context) {
        Ok(native) if !native.message().is_empty() => native.message().to_string(),
        Ok(native) => native.to_string(),
        Err(_) => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Case;
    use serde_json::json;

    fn case(name: &str, args: serde_json::Value, expected: serde_json::Value) -> Case {
        Case {
            name: name.to_string(),
            args: args.as_array().cloned().unwrap_or_default(),
            expected: Some(expected),
        }
    }

    fn run(code: &str, cases: Vec<Case>) -> RunResponse {
        execute(
            &RunRequest {
                code: code.to_string(),
                cases,
            },
            &SandboxLimits::default(),
        )
    }

    fn unwrap_success(response: RunResponse) -> (Vec<TestResult>, Vec<String>) {
        match response {
            RunResponse::Success { results, logs } => (results, logs),
            RunResponse::Failure { error, .. } => panic!("unexpected load failure: {error}"),
        }
    }

    #[test]
    fn test_square_root_passes() {
        let (results, logs) = unwrap_success(run(
            "function solution(n){ return Math.sqrt(n); }",
            vec![case("sqrt 9", json!([9]), json!(3))],
        ));
        assert_eq!(results, vec![TestResult::passed("sqrt 9")]);
        assert!(logs.is_empty());
    }

    #[test]
    fn test_exact_numeric_mismatch() {
        let (results, _) = unwrap_success(run(
            "function solution(n){ return Math.sqrt(n); }",
            vec![case("sqrt 2", json!([2]), json!(1.41421356237))],
        ));
        assert_eq!(
            results,
            vec![TestResult {
                name: "sqrt 2".into(),
                pass: false,
                error: Some("Output mismatch.".into()),
                expected: Some("1.41421356237".into()),
                actual: Some("1.4142135623730951".into()),
            }]
        );
    }

    #[test]
    fn test_console_output_is_captured() {
        let (results, logs) = unwrap_success(run(
            r#"function solution(){ console.log("hi"); return 1; }"#,
            vec![case("log", json!([]), json!(1))],
        ));
        assert!(results[0].pass);
        assert_eq!(logs, vec!["hi".to_string()]);
    }

    #[test]
    fn test_console_formats_arguments() {
        let code = r#"
            function solution() {
                var loop = {};
                loop.self = loop;
                console.info("n", 1, { a: [1, "x"] }, null);
                console.warn(undefined);
                console.error(loop);
                return 0;
            }
        "#;
        let (_, logs) = unwrap_success(run(code, vec![case("fmt", json!([]), json!(0))]));
        assert_eq!(
            logs,
            vec![
                r#"n 1 {"a":[1,"x"]} null"#.to_string(),
                "undefined".to_string(),
                "[object Object]".to_string(),
            ]
        );
    }

    #[test]
    fn test_syntax_error_is_load_failure() {
        match run("const x = ;", vec![case("any", json!([]), json!(null))]) {
            RunResponse::Failure { error, .. } => assert!(!error.is_empty()),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_logs_before_load_failure_are_kept() {
        let response = run(
            r#"console.log("starting"); throw new Error("nope");"#,
            vec![case("any", json!([]), json!(null))],
        );
        assert_eq!(
            response,
            RunResponse::Failure {
                error: "nope".into(),
                logs: vec!["starting".into()],
            }
        );
    }

    #[test]
    fn test_missing_entry_point() {
        let response = run("var answer = 42;", vec![]);
        assert_eq!(response, RunResponse::Failure {
            error: NO_ENTRY_POINT.into(),
            logs: vec![],
        });
    }

    #[test]
    fn test_module_exports_entry_point() {
        let (results, _) = unwrap_success(run(
            "module.exports = function (a, b) { return a + b; };",
            vec![case("add", json!([2, 3]), json!(5))],
        ));
        assert!(results[0].pass);

        let (results, _) = unwrap_success(run(
            "exports.helper = 1; module.exports = (s) => s.toUpperCase();",
            vec![case("upper", json!(["abc"]), json!("ABC"))],
        ));
        assert!(results[0].pass);
    }

    #[test]
    fn test_throwing_case_does_not_abort_batch() {
        let code = r#"
            function solution(n) {
                if (n === 2) { throw new TypeError("two is not allowed"); }
                if (n === 3) { throw "plain string"; }
                return n * 10;
            }
        "#;
        let (results, _) = unwrap_success(run(
            code,
            vec![
                case("one", json!([1]), json!(10)),
                case("two", json!([2]), json!(20)),
                case("three", json!([3]), json!(30)),
                case("four", json!([4]), json!(41)),
                case("five", json!([5]), json!(50)),
            ],
        ));

        assert_eq!(results.len(), 5);
        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["one", "two", "three", "four", "five"]);
        assert!(results[0].pass);
        assert_eq!(results[1], TestResult::errored("two", "two is not allowed"));
        assert_eq!(results[2], TestResult::errored("three", "plain string"));
        assert_eq!(results[3].error.as_deref(), Some("Output mismatch."));
        assert!(results[4].pass);
    }

    #[test]
    fn test_mapping_key_order_is_ignored() {
        let (results, _) = unwrap_success(run(
            "function solution(){ return { a: 1, b: [1, 2] }; }",
            vec![case("obj", json!([]), json!({"b": [1, 2], "a": 1}))],
        ));
        assert!(results[0].pass);
    }

    #[test]
    fn test_array_is_not_a_mapping() {
        let (results, _) = unwrap_success(run(
            "function solution(){ return [1, 2]; }",
            vec![case("shape", json!([]), json!({"0": 1, "1": 2}))],
        ));
        assert!(!results[0].pass);
        assert_eq!(results[0].actual.as_deref(), Some("[1,2]"));
        assert_eq!(results[0].expected.as_deref(), Some(r#"{"0":1,"1":2}"#));
    }

    #[test]
    fn test_undefined_and_function_results_render() {
        let (results, _) = unwrap_success(run(
            "function solution(kind){ if (kind === 'u') return undefined; return function(){}; }",
            vec![
                case("undefined", json!(["u"]), json!(null)),
                case("function", json!(["f"]), json!(null)),
            ],
        ));
        assert_eq!(results[0].actual.as_deref(), Some("undefined"));
        assert!(!results[1].pass);
        assert!(results[1].actual.as_deref().unwrap_or_default().contains("function"));
    }

    #[test]
    fn test_cyclic_result_falls_back_to_string() {
        let (results, _) = unwrap_success(run(
            "function solution(){ var o = {}; o.o = o; return o; }",
            vec![case("cycle", json!([]), json!({}))],
        ));
        assert!(!results[0].pass);
        assert_eq!(results[0].actual.as_deref(), Some("[object Object]"));
    }

    #[test]
    fn test_deeply_nested_result_fails_only_its_case() {
        let code = r#"
            function solution(x) {
                if (x === 0) return 0;
                var o = [];
                for (var i = 0; i < 200000; i++) { o = [o]; }
                return o;
            }
        "#;
        let (results, _) = unwrap_success(run(
            code,
            vec![case("deep", json!([1]), json!(0)), case("after", json!([0]), json!(0))],
        ));
        assert_eq!(
            results,
            vec![
                TestResult::errored("deep", RESULT_TOO_DEEP),
                TestResult::passed("after"),
            ]
        );
    }

    #[test]
    fn test_nesting_at_the_limit_still_compares() {
        let code = format!(
            "function solution(){{ var o = 1; for (var i = 0; i < {}; i++) {{ o = [o]; }} return o; }}",
            MAX_RESULT_DEPTH
        );
        let mut expected = json!(1);
        for _ in 0..MAX_RESULT_DEPTH {
            expected = json!([expected]);
        }
        let (results, _) = unwrap_success(run(&code, vec![case("limit", json!([]), expected)]));
        assert_eq!(results, vec![TestResult::passed("limit")]);
    }

    #[test]
    fn test_huge_array_length_fails_only_its_case() {
        let code = r#"
            function solution(x) {
                if (x === 0) return 0;
                var a = [];
                a.length = 4294967295;
                return a;
            }
        "#;
        let (results, _) = unwrap_success(run(
            code,
            vec![case("sparse", json!([1]), json!([])), case("after", json!([0]), json!(0))],
        ));
        assert_eq!(
            results,
            vec![
                TestResult::errored("sparse", RESULT_TOO_LARGE),
                TestResult::passed("after"),
            ]
        );
    }

    #[test]
    fn test_throwing_getter_in_result_fails_only_its_case() {
        let code = r#"
            function solution(x) {
                if (x === 0) return 0;
                return { ok: 1, get boom() { throw new Error("getter exploded"); } };
            }
        "#;
        let (results, _) = unwrap_success(run(
            code,
            vec![case("getter", json!([1]), json!({})), case("after", json!([0]), json!(0))],
        ));
        assert_eq!(
            results,
            vec![
                TestResult::errored("getter", "getter exploded"),
                TestResult::passed("after"),
            ]
        );
    }

    #[test]
    fn test_results_follow_json_serialization() {
        let code = r#"
            function solution(kind) {
                if (kind === "date") return new Date(0);
                if (kind === "number") return new Number(5);
                if (kind === "custom") return { toJSON: function () { return { v: 1 }; } };
                if (kind === "map") return new Map([["a", 1]]);
                return [new String("s"), new Boolean(false), { when: new Date(0) }];
            }
        "#;
        let (results, _) = unwrap_success(run(
            code,
            vec![
                case("date", json!(["date"]), json!("1970-01-01T00:00:00.000Z")),
                case("number", json!(["number"]), json!(5)),
                case("custom", json!(["custom"]), json!({"v": 1})),
                case("map", json!(["map"]), json!({})),
                case(
                    "nested",
                    json!(["nested"]),
                    json!(["s", false, {"when": "1970-01-01T00:00:00.000Z"}]),
                ),
                case("shown", json!(["date"]), json!(0)),
            ],
        ));
        assert!(results[..5].iter().all(|r| r.pass), "{results:?}");
        assert_eq!(results[5].actual.as_deref(), Some("1970-01-01T00:00:00.000Z"));
    }

    #[test]
    fn test_nan_result_equals_nothing_from_json() {
        let (results, _) = unwrap_success(run(
            "function solution(){ return NaN; }",
            vec![case("nan", json!([]), json!(null))],
        ));
        assert!(!results[0].pass);
        assert_eq!(results[0].actual.as_deref(), Some("null"));
    }

    #[test]
    fn test_arguments_are_spread_positionally() {
        let (results, _) = unwrap_success(run(
            "function solution(a, b, c){ return [c, b, a]; }",
            vec![case("spread", json!([1, "two", {"three": 3}]), json!([{"three": 3}, "two", 1]))],
        ));
        assert!(results[0].pass);
    }

    #[test]
    fn test_globals_do_not_leak_between_runs() {
        let (first, _) = unwrap_success(run(
            "globalThis.leaked = 7; Array.prototype.sum = function(){ return 1; }; function solution(){ return 1; }",
            vec![case("first", json!([]), json!(1))],
        ));
        assert!(first[0].pass);

        let (second, _) = unwrap_success(run(
            "function solution(){ return [typeof leaked, typeof [].sum]; }",
            vec![case("second", json!([]), json!(["undefined", "undefined"]))],
        ));
        assert!(second[0].pass);
    }

    #[test]
    fn test_no_host_bindings_are_exposed() {
        let (results, _) = unwrap_success(run(
            "function solution(){ return [typeof require, typeof process, typeof fetch, typeof setTimeout]; }",
            vec![case("ambient", json!([]), json!(["undefined", "undefined", "undefined", "undefined"]))],
        ));
        assert!(results[0].pass);
    }

    #[test]
    fn test_loop_limit_is_reported_per_case() {
        let limits = SandboxLimits {
            loop_iteration_limit: 10_000,
            recursion_limit: 512,
        };
        let response = execute(
            &RunRequest {
                code: "function solution(spin){ while (spin) {} return 1; }".into(),
                cases: vec![case("spin", json!([true]), json!(1)), case("stop", json!([false]), json!(1))],
            },
            &limits,
        );
        let (results, _) = unwrap_success(response);
        assert!(!results[0].pass);
        assert!(results[0].error.is_some());
        assert!(results[1].pass);
    }
}
