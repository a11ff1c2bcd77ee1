// src/sandbox/harness.rs
use boa_engine::{js_string, Context, JsObject, JsResult, JsString, JsValue, Source};

/// Script evaluated once per fresh context before any user code.
///
/// It returns a private object (never bound to a global) holding the log buffer, the
/// capturing console and a loader that compiles the program text as the body of a function
/// whose only parameters are `module`, `exports` and `console`. Built-ins are captured up
/// front so user code that reassigns globals cannot change how results are read back.
const HARNESS_SOURCE: &str = r#"
(function () {
    var stringify = JSON.stringify;
    var keysOf = Object.keys;
    var toText = String;
    var FunctionCtor = Function;
    var apply = Reflect.apply;
    var unboxers = [Number.prototype.valueOf, String.prototype.valueOf, Boolean.prototype.valueOf];
    var logs = [];

    function show(value) {
        if (typeof value === "string") {
            return value;
        }
        try {
            var text = stringify(value);
            if (text !== undefined) {
                return text;
            }
        } catch (e) {}
        try {
            return toText(value);
        } catch (e) {
            return "[unprintable]";
        }
    }

    function record() {
        var line = "";
        for (var i = 0; i < arguments.length; i++) {
            line += (i > 0 ? " " : "") + show(arguments[i]);
        }
        logs[logs.length] = line;
    }

    var console = { log: record, info: record, warn: record, error: record, debug: record };

    return {
        logs: logs,
        keys: function (value) {
            return keysOf(value);
        },
        jsonForm: function (value) {
            var toJSON = value.toJSON;
            if (typeof toJSON === "function") {
                return { value: apply(toJSON, value, [""]) };
            }
            for (var i = 0; i < unboxers.length; i++) {
                try {
                    return { value: apply(unboxers[i], value, []) };
                } catch (e) {}
            }
            return null;
        },
        load: function (code) {
            var module = { exports: {} };
            var factory = new FunctionCtor(
                "module",
                "exports",
                "console",
                code + "\n;return typeof solution !== \"undefined\" ? solution : module.exports;"
            );
            return factory(module, module.exports, console);
        }
    };
})()
"#;

/// Handle to the harness object living inside one context.
pub struct Harness {
    object: JsObject,
}

impl Harness {
    pub fn install(context: &mut Context) -> JsResult<Self> {
        let value = context.eval(Source::from_bytes(HARNESS_SOURCE))?;
        let object = value
            .as_object()
            .cloned()
            .ok_or_else(|| boa_engine::JsNativeError::typ().with_message("harness did not return an object"))?;
        Ok(Self { object })
    }

    /// Evaluates the program text and returns the resolved entry point candidate.
    pub fn load(&self, code: &str, context: &mut Context) -> JsResult<JsValue> {
        self.call("load", &[JsValue::from(JsString::from(code))], context)
    }

    /// `Object.keys(value)` as Rust strings.
    pub fn keys(&self, value: &JsValue, context: &mut Context) -> JsResult<Vec<String>> {
        let keys = self.call("keys", &[value.clone()], context)?;
        read_strings(&keys, context)
    }

    /// What `JSON.stringify` serializes in place of `value`: the `toJSON` result, or the
    /// primitive inside a `Number`, `String` or `Boolean` wrapper. `None` when the object
    /// is serialized as itself.
    pub fn json_form(&self, value: &JsValue, context: &mut Context) -> JsResult<Option<JsValue>> {
        let form = self.call("jsonForm", &[value.clone()], context)?;
        match form.as_object() {
            Some(wrapper) => Ok(Some(wrapper.get(js_string!("value"), context)?)),
            None => Ok(None),
        }
    }

    /// Lines captured so far, in call order.
    pub fn logs(&self, context: &mut Context) -> Vec<String> {
        self.object
            .get(js_string!("logs"), context)
            .and_then(|logs| read_strings(&logs, context))
            .unwrap_or_default()
    }

    fn call(&self, name: &str, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
        let function = self.object.get(JsString::from(name), context)?;
        let function = function.as_callable().ok_or_else(|| {
            boa_engine::JsNativeError::typ().with_message(format!("harness member `{}` is not callable", name))
        })?;
        function.call(&JsValue::undefined(), args, context)
    }
}

fn read_strings(array: &JsValue, context: &mut Context) -> JsResult<Vec<String>> {
    let Some(object) = array.as_object() else {
        return Ok(Vec::new());
    };
    let length = object.get(js_string!("length"), context)?.to_length(context)?;
    let mut out = Vec::new();
    for index in 0..length {
        let item = object.get(index as u32, context)?;
        out.push(item.to_string(context)?.to_std_string_escaped());
    }
    Ok(out)
}
