// SPDX-License-Identifier: MIT OR Apache-2.0
//! Condition and action expressions.
//!
//! Both languages are a single call, `NAME(arg, arg, ...)`, with no nesting
//! and no operators. Arguments are split on commas and trimmed; a double
//! quoted argument may contain commas and parentheses.
//!
//! Function names resolve through closed tables ([`CONDITIONS`], [`ACTIONS`])
//! whose arity is checked before the function runs.

use super::storage::Storage;
use serde_json::{Number, Value};
use thiserror::Error;

/// Error while parsing or evaluating one expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    /// Not of the form `NAME(args)`
    #[error("Malformed expression '{expr}': {reason}")]
    Malformed {
        /// Offending source text
        expr: String,
        /// What is wrong with it
        reason: &'static str,
    },

    /// Name not present in the function table
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("{function} expects {expected} argument(s), got {found}")]
    Arity {
        /// Function name
        function: &'static str,
        /// Human-readable expected count
        expected: String,
        /// Actual count
        found: usize,
    },

    /// Value is not `true`/`false`
    #[error("{function}: '{value}' is not a boolean")]
    NotBoolean {
        /// Function name
        function: &'static str,
        /// Offending value
        value: String,
    },

    /// Value is not numeric
    #[error("{function}: '{value}' is not a number")]
    NotNumber {
        /// Function name
        function: &'static str,
        /// Offending value
        value: String,
    },

    /// Storage key argument is empty
    #[error("{function}: empty storage key")]
    EmptyKey {
        /// Function name
        function: &'static str,
    },
}

/// A parsed call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call<'a> {
    /// Function name
    pub name: &'a str,
    /// Trimmed arguments
    pub args: Vec<&'a str>,
}

fn malformed(expr: &str, reason: &'static str) -> ExprError {
    ExprError::Malformed {
        expr: expr.to_string(),
        reason,
    }
}

/// Parse `NAME(arg, ...)`
pub fn parse_call(source: &str) -> Result<Call<'_>, ExprError> {
    let src = source.trim();
    let open = src
        .find('(')
        .ok_or_else(|| malformed(src, "expected NAME(...)"))?;
    let name = src[..open].trim();
    if name.is_empty() {
        return Err(malformed(src, "missing function name"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(malformed(src, "invalid function name"));
    }
    if !src.ends_with(')') {
        return Err(malformed(src, "missing closing parenthesis"));
    }

    let inner = &src[open + 1..src.len() - 1];
    let args = split_args(inner).ok_or_else(|| malformed(src, "nested or unbalanced parentheses"))?;
    Ok(Call { name, args })
}

/// Comma-split outside double quotes. Returns `None` on a bare parenthesis or
/// an unterminated quote.
fn split_args(inner: &str) -> Option<Vec<&str>> {
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }

    let mut args = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, c) in inner.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' | ')' if !in_quotes => return None,
            ',' if !in_quotes => {
                args.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if in_quotes {
        return None;
    }
    args.push(inner[start..].trim());
    Some(args)
}

/// Strip one pair of surrounding double quotes
pub fn unquote(arg: &str) -> &str {
    arg.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(arg)
}

/// JSON number for `n`, integral values stored as integers
pub fn number_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

/// Interpret a literal argument: quoted string, bool, number, or bare string
pub fn literal(arg: &str) -> Value {
    let arg = arg.trim();
    if arg.len() >= 2 && arg.starts_with('"') && arg.ends_with('"') {
        return Value::String(unquote(arg).to_string());
    }
    match arg {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => match arg.parse::<f64>() {
            Ok(n) if n.is_finite() => number_value(n),
            _ => Value::String(arg.to_string()),
        },
    }
}

/// Numeric view of a value, accepting numeric strings
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Truthiness used by `IS`, `ISNOT`, `ALL` and `ANY`
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty() && s != "false",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Text form of a value as substituted into strings
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Storage value at `arg` if present, else the literal
fn resolve(storage: &Storage, arg: &str) -> Value {
    storage.get(arg).cloned().unwrap_or_else(|| literal(arg))
}

/// Storage truthiness at `arg`; literals are honored, missing keys are false
fn resolve_truthy(storage: &Storage, arg: &str) -> bool {
    match storage.get(arg) {
        Some(value) => truthy(value),
        None => match literal(arg) {
            v @ (Value::Bool(_) | Value::Number(_)) => truthy(&v),
            _ => false,
        },
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => display_value(a) == display_value(b),
    }
}

fn numeric_pair(function: &'static str, storage: &Storage, args: &[&str]) -> Result<(f64, f64), ExprError> {
    let mut nums = [0.0; 2];
    for (slot, arg) in nums.iter_mut().zip(args) {
        let value = resolve(storage, arg);
        *slot = as_number(&value).ok_or_else(|| ExprError::NotNumber {
            function,
            value: display_value(&value),
        })?;
    }
    Ok((nums[0], nums[1]))
}

/// Accepted argument counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly `n`
    Exact(usize),
    /// `n` or more
    AtLeast(usize),
}

impl Arity {
    fn check(self, function: &'static str, found: usize) -> Result<(), ExprError> {
        let ok = match self {
            Self::Exact(n) => found == n,
            Self::AtLeast(n) => found >= n,
        };
        if ok {
            return Ok(());
        }
        let expected = match self {
            Self::Exact(n) => n.to_string(),
            Self::AtLeast(n) => format!("at least {n}"),
        };
        Err(ExprError::Arity {
            function,
            expected,
            found,
        })
    }
}

type ConditionImpl = fn(&'static str, &Storage, &[&str]) -> Result<bool, ExprError>;
type ActionImpl = fn(&'static str, &mut Storage, &[&str]) -> Result<Option<Value>, ExprError>;

/// Entry of the condition function table
pub struct ConditionFn {
    /// Function name
    pub name: &'static str,
    /// Accepted argument counts
    pub arity: Arity,
    eval: ConditionImpl,
}

/// Entry of the action function table
pub struct ActionFn {
    /// Function name
    pub name: &'static str,
    /// Accepted argument counts
    pub arity: Arity,
    run: ActionImpl,
}

/// Condition functions
pub const CONDITIONS: &[ConditionFn] = &[
    ConditionFn { name: "IS", arity: Arity::Exact(1), eval: |_, s, a| Ok(resolve_truthy(s, a[0])) },
    ConditionFn { name: "ISNOT", arity: Arity::Exact(1), eval: |_, s, a| Ok(!resolve_truthy(s, a[0])) },
    ConditionFn {
        name: "EQ",
        arity: Arity::Exact(2),
        eval: |_, s, a| Ok(values_equal(&resolve(s, a[0]), &resolve(s, a[1]))),
    },
    ConditionFn {
        name: "NEQ",
        arity: Arity::Exact(2),
        eval: |_, s, a| Ok(!values_equal(&resolve(s, a[0]), &resolve(s, a[1]))),
    },
    ConditionFn { name: "GT", arity: Arity::Exact(2), eval: |f, s, a| numeric_pair(f, s, a).map(|(x, y)| x > y) },
    ConditionFn { name: "GTE", arity: Arity::Exact(2), eval: |f, s, a| numeric_pair(f, s, a).map(|(x, y)| x >= y) },
    ConditionFn { name: "LT", arity: Arity::Exact(2), eval: |f, s, a| numeric_pair(f, s, a).map(|(x, y)| x < y) },
    ConditionFn { name: "LTE", arity: Arity::Exact(2), eval: |f, s, a| numeric_pair(f, s, a).map(|(x, y)| x <= y) },
    ConditionFn {
        name: "ALL",
        arity: Arity::AtLeast(1),
        eval: |_, s, a| Ok(a.iter().all(|arg| resolve_truthy(s, arg))),
    },
    ConditionFn {
        name: "ANY",
        arity: Arity::AtLeast(1),
        eval: |_, s, a| Ok(a.iter().any(|arg| resolve_truthy(s, arg))),
    },
];

fn key_arg(function: &'static str, arg: &str) -> Result<(), ExprError> {
    if arg.is_empty() {
        Err(ExprError::EmptyKey { function })
    } else {
        Ok(())
    }
}

fn set_bool(function: &'static str, storage: &mut Storage, args: &[&str]) -> Result<Option<Value>, ExprError> {
    key_arg(function, args[0])?;
    let value = match args[1] {
        "true" => true,
        "false" => false,
        other => {
            return Err(ExprError::NotBoolean {
                function,
                value: other.to_string(),
            })
        }
    };
    storage.set(args[0], Value::Bool(value));
    Ok(None)
}

fn set_num(function: &'static str, storage: &mut Storage, args: &[&str]) -> Result<Option<Value>, ExprError> {
    key_arg(function, args[0])?;
    let n = args[1]
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ExprError::NotNumber {
            function,
            value: args[1].to_string(),
        })?;
    storage.set(args[0], number_value(n));
    Ok(None)
}

fn set_str(function: &'static str, storage: &mut Storage, args: &[&str]) -> Result<Option<Value>, ExprError> {
    key_arg(function, args[0])?;
    storage.set(args[0], Value::String(unquote(args[1]).to_string()));
    Ok(None)
}

fn modify(function: &'static str, storage: &mut Storage, args: &[&str]) -> Result<Option<Value>, ExprError> {
    key_arg(function, args[0])?;
    let current = storage.get(args[0]).cloned().unwrap_or(Value::Null);
    let base = as_number(&current).ok_or_else(|| ExprError::NotNumber {
        function,
        value: display_value(&current),
    })?;
    let delta_value = resolve(storage, args[1]);
    let delta = as_number(&delta_value).ok_or_else(|| ExprError::NotNumber {
        function,
        value: display_value(&delta_value),
    })?;
    storage.set(args[0], number_value(base + delta));
    Ok(None)
}

/// Action functions
pub const ACTIONS: &[ActionFn] = &[
    ActionFn {
        name: "GET",
        arity: Arity::Exact(1),
        run: |f, s, a| {
            key_arg(f, a[0])?;
            Ok(Some(s.get(a[0]).cloned().unwrap_or(Value::Null)))
        },
    },
    ActionFn { name: "SET_BOOL", arity: Arity::Exact(2), run: set_bool },
    ActionFn { name: "SET_NUM", arity: Arity::Exact(2), run: set_num },
    ActionFn { name: "SET_STR", arity: Arity::Exact(2), run: set_str },
    ActionFn { name: "MOD", arity: Arity::Exact(2), run: modify },
];

/// Look up a condition function by name
pub fn condition_fn(name: &str) -> Option<&'static ConditionFn> {
    CONDITIONS.iter().find(|f| f.name == name)
}

/// Look up an action function by name
pub fn action_fn(name: &str) -> Option<&'static ActionFn> {
    ACTIONS.iter().find(|f| f.name == name)
}

/// Evaluate a condition. `""` and `"true"` are true, `"false"` is false.
pub fn eval_condition(expr: &str, storage: &Storage) -> Result<bool, ExprError> {
    match expr.trim() {
        "" | "true" => return Ok(true),
        "false" => return Ok(false),
        _ => {}
    }
    let call = parse_call(expr)?;
    let function = condition_fn(call.name).ok_or_else(|| ExprError::UnknownFunction(call.name.to_string()))?;
    function.arity.check(function.name, call.args.len())?;
    (function.eval)(function.name, storage, &call.args)
}

/// Execute one action line. `GET` returns the value read.
pub fn exec_action(line: &str, storage: &mut Storage) -> Result<Option<Value>, ExprError> {
    let call = parse_call(line)?;
    let function = action_fn(call.name).ok_or_else(|| ExprError::UnknownFunction(call.name.to_string()))?;
    function.arity.check(function.name, call.args.len())?;
    (function.run)(function.name, storage, &call.args)
}

/// Execute every non-blank line in order. Failing lines are skipped and
/// reported with their 1-based line number; later lines still run.
pub fn run_script(script: &str, storage: &mut Storage) -> Vec<(usize, ExprError)> {
    script
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(i, line)| exec_action(line, storage).err().map(|e| (i + 1, e)))
        .collect()
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Replace every `@key` token with `lookup(key)`. Unknown keys are left as
/// written; trailing dots are treated as punctuation. Replaced text is not
/// scanned again.
pub fn substitute(text: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find('@') {
        out.push_str(&rest[..at]);
        let after = &rest[at + 1..];
        let token_len = after.find(|c: char| !is_key_char(c)).unwrap_or(after.len());
        let key = after[..token_len].trim_end_matches('.');

        match (!key.is_empty()).then(|| lookup(key)).flatten() {
            Some(value) => {
                out.push_str(&value);
                rest = &after[key.len()..];
            }
            None => {
                out.push('@');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn storage(value: Value) -> Storage {
        Storage::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_call() {
        let call = parse_call("  EQ( a , b )").unwrap();
        assert_eq!(call.name, "EQ");
        assert_eq!(call.args, vec!["a", "b"]);
        assert!(parse_call("IS()").unwrap().args.is_empty());
        assert_eq!(parse_call(r#"SET_STR(x, "a, (b)")"#).unwrap().args, vec!["x", r#""a, (b)""#]);
    }

    #[test]
    fn test_parse_call_malformed() {
        for bad in ["EQ(a, b", "EQ a b", "(a)", "EQ(GT(a, b), c)", "E Q(a)", r#"SET_STR(x, "oops)"#] {
            assert!(matches!(parse_call(bad), Err(ExprError::Malformed { .. })), "{bad}");
        }
    }

    #[test]
    fn test_condition_literals() {
        let s = Storage::new();
        assert_eq!(eval_condition("", &s), Ok(true));
        assert_eq!(eval_condition(" true ", &s), Ok(true));
        assert_eq!(eval_condition("false", &s), Ok(false));
    }

    #[test]
    fn test_comparisons() {
        let s = storage(json!({"a": 5, "b": 5}));
        assert_eq!(eval_condition("EQ(a,b)", &s), Ok(true));
        assert_eq!(eval_condition("NEQ(a,b)", &s), Ok(false));
        assert_eq!(eval_condition("GTE(a, 5)", &s), Ok(true));

        let s = storage(json!({"a": 3, "b": 5, "name": "Aria"}));
        assert_eq!(eval_condition("GT(a,b)", &s), Ok(false));
        assert_eq!(eval_condition("LT(a,b)", &s), Ok(true));
        assert_eq!(eval_condition("LTE(a,3)", &s), Ok(true));
        assert_eq!(eval_condition(r#"EQ(name, "Aria")"#, &s), Ok(true));
        assert_eq!(eval_condition("EQ(a, 3.0)", &s), Ok(true));
        assert!(matches!(eval_condition("GT(name, 1)", &s), Err(ExprError::NotNumber { .. })));
    }

    #[test]
    fn test_truthiness_functions() {
        let s = storage(json!({"yes": true, "no": false, "n": 0, "text": "hi", "deep": {"flag": true}}));
        assert_eq!(eval_condition("IS(yes)", &s), Ok(true));
        assert_eq!(eval_condition("ISNOT(no)", &s), Ok(true));
        assert_eq!(eval_condition("IS(missing)", &s), Ok(false));
        assert_eq!(eval_condition("IS(deep.flag)", &s), Ok(true));
        assert_eq!(eval_condition("ALL(yes, text)", &s), Ok(true));
        assert_eq!(eval_condition("ALL(yes, n)", &s), Ok(false));
        assert_eq!(eval_condition("ANY(no, n, text)", &s), Ok(true));
        assert_eq!(eval_condition("ANY(no, missing)", &s), Ok(false));
        assert_eq!(eval_condition("IS(true)", &s), Ok(true));
    }

    #[test]
    fn test_unknown_and_arity_errors() {
        let s = Storage::new();
        assert_eq!(eval_condition("FOO(x)", &s), Err(ExprError::UnknownFunction("FOO".into())));
        assert!(matches!(eval_condition("EQ(a)", &s), Err(ExprError::Arity { .. })));
        assert!(matches!(eval_condition("ALL()", &s), Err(ExprError::Arity { .. })));
        assert!(matches!(eval_condition("garbage", &s), Err(ExprError::Malformed { .. })));
    }

    #[test]
    fn test_actions() {
        let mut s = storage(json!({"score": 5}));
        exec_action("MOD(score, 10)", &mut s).unwrap();
        assert_eq!(s.get("score"), Some(&json!(15)));

        exec_action("SET_BOOL(flag, true)", &mut s).unwrap();
        assert_eq!(s.get("flag"), Some(&json!(true)));

        let err = exec_action("SET_BOOL(flag, maybe)", &mut s).unwrap_err();
        assert!(matches!(err, ExprError::NotBoolean { .. }));
        assert_eq!(s.get("flag"), Some(&json!(true)));

        exec_action("SET_NUM(hp, 2.5)", &mut s).unwrap();
        assert_eq!(s.get("hp"), Some(&json!(2.5)));
        assert!(exec_action("SET_NUM(hp, lots)", &mut s).is_err());

        exec_action(r#"SET_STR(player.name, "Bram, the Bold")"#, &mut s).unwrap();
        assert_eq!(s.get("player.name"), Some(&json!("Bram, the Bold")));

        assert_eq!(exec_action("GET(score)", &mut s), Ok(Some(json!(15))));
        assert_eq!(exec_action("GET(nothing)", &mut s), Ok(Some(Value::Null)));
    }

    #[test]
    fn test_mod_errors() {
        let mut s = storage(json!({"name": "x", "n": 1, "step": 4}));
        assert!(matches!(exec_action("MOD(name, 1)", &mut s), Err(ExprError::NotNumber { .. })));
        assert!(matches!(exec_action("MOD(missing, 1)", &mut s), Err(ExprError::NotNumber { .. })));
        assert!(matches!(exec_action("MOD(n, name)", &mut s), Err(ExprError::NotNumber { .. })));
        exec_action("MOD(n, step)", &mut s).unwrap();
        assert_eq!(s.get("n"), Some(&json!(5)));
        exec_action("MOD(n, -0.5)", &mut s).unwrap();
        assert_eq!(s.get("n"), Some(&json!(4.5)));
    }

    #[test]
    fn test_run_script_continues_after_error() {
        let mut s = Storage::new();
        let errors = run_script("SET_NUM(a, 1)\n\nBAD(x)\nSET_NUM(b, 2)", &mut s);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, 3);
        assert_eq!(s.get("a"), Some(&json!(1)));
        assert_eq!(s.get("b"), Some(&json!(2)));
    }

    #[test]
    fn test_substitute() {
        let lookup = |key: &str| match key {
            "name" => Some("Aria".to_string()),
            "p.hp" => Some("7".to_string()),
            "loop" => Some("@name".to_string()),
            _ => None,
        };
        assert_eq!(substitute("Hi @name.", lookup), "Hi Aria.");
        assert_eq!(substitute("HP @p.hp/10", lookup), "HP 7/10");
        assert_eq!(substitute("@unknown stays", lookup), "@unknown stays");
        assert_eq!(substitute("mail@ x", lookup), "mail@ x");
        assert_eq!(substitute("@loop", lookup), "@name");
        assert_eq!(substitute("@name@name", lookup), "AriaAria");
    }

    #[test]
    fn test_number_value() {
        assert_eq!(number_value(15.0), json!(15));
        assert_eq!(number_value(-2.0), json!(-2));
        assert_eq!(number_value(0.25), json!(0.25));
    }
}
