//! Safe boolean condition evaluator for flow transitions (§4.C).
//!
//! Conditions are small expressions over a context mapping:
//! comparisons (`== != < <= > >= in is is not`), boolean composition
//! (`and or not`), literals, dotted paths, and `map[key]` subscripts.
//! Parsing or evaluation never raises — every error collapses to `false`
//! with a warning, per (P5) "condition evaluation is total".

use serde_json::Value;
use std::fmt;

use crate::path;

/// The sentinel produced when a dotted path or subscript does not resolve.
/// Compares unequal to every concrete value, is falsy, and has special
/// `in`-membership semantics (`Missing(k) in map` iff `map` has key `k`).
#[derive(Debug, Clone, PartialEq)]
pub struct Missing(pub String);

#[derive(Debug, Clone, PartialEq)]
enum EvalValue {
    Value(Value),
    Missing(Missing),
}

impl EvalValue {
    fn truthy(&self) -> bool {
        match self {
            EvalValue::Missing(_) => false,
            EvalValue::Value(v) => json_truthy(v),
        }
    }
}

fn json_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Evaluate `condition` against `context`. Never panics; returns `false` on
/// any parse or evaluation error (logged as a warning).
pub fn evaluate(condition: &str, context: &Value) -> bool {
    let condition = condition.trim();
    if condition.is_empty() {
        return false;
    }
    match parse_and_eval(condition, context) {
        Ok(v) => v.truthy(),
        Err(e) => {
            tracing::warn!(condition = condition, error = %e, "condition evaluation failed");
            false
        }
    }
}

#[derive(Debug)]
struct EvalError(String);

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for EvalError {}

fn err(msg: impl Into<String>) -> EvalError {
    EvalError(msg.into())
}

fn parse_and_eval(condition: &str, context: &Value) -> Result<EvalValue, EvalError> {
    let tokens = lex(condition)?;
    let mut parser = Parser { tokens, pos: 0 };
    let node = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(err(format!("trailing input at token {}", parser.pos)));
    }
    eval_node(&node, context)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Lexer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Op(String),
    LBracket,
    RBracket,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
}

fn lex(input: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '{' => {
                tokens.push(Token::LBrace);
                i += 1;
            }
            '}' => {
                tokens.push(Token::RBrace);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            '.' if !chars.get(i + 1).map(|c| c.is_ascii_digit()).unwrap_or(false) => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    s.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(err("unterminated string literal"));
                }
                i += 1;
                tokens.push(Token::Str(s));
            }
            '=' | '!' | '<' | '>' => {
                let mut op = String::new();
                op.push(c);
                i += 1;
                if i < chars.len() && chars[i] == '=' {
                    op.push('=');
                    i += 1;
                }
                if op == "=" {
                    return Err(err("use '==' for equality"));
                }
                tokens.push(Token::Op(op));
            }
            _ if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).map(|c| c.is_ascii_digit()).unwrap_or(false)) => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n: f64 = text
                    .parse()
                    .map_err(|_| err(format!("invalid number literal '{text}'")))?;
                tokens.push(Token::Number(n));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Ident(text));
            }
            _ => return Err(err(format!("unexpected character '{c}'"))),
        }
    }
    Ok(tokens)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AST
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
enum Node {
    Name(String),
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Not(Box<Node>),
    And(Vec<Node>),
    Or(Vec<Node>),
    Compare(Box<Node>, Vec<(CompareOp, Node)>),
    Attribute(Box<Node>, String),
    Subscript(Box<Node>, Box<Node>),
    List(Vec<Node>),
    Map(Vec<(Node, Node)>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CompareOp {
    Eq,
    NotEq,
    Gt,
    GtE,
    Lt,
    LtE,
    In,
    NotIn,
    Is,
    IsNot,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat_ident(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(w)) if w.eq_ignore_ascii_case(word)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Node, EvalError> {
        let mut values = vec![self.parse_and()?];
        while self.eat_ident("or") {
            values.push(self.parse_and()?);
        }
        Ok(if values.len() == 1 {
            values.pop().unwrap()
        } else {
            Node::Or(values)
        })
    }

    fn parse_and(&mut self) -> Result<Node, EvalError> {
        let mut values = vec![self.parse_not()?];
        while self.eat_ident("and") {
            values.push(self.parse_not()?);
        }
        Ok(if values.len() == 1 {
            values.pop().unwrap()
        } else {
            Node::And(values)
        })
    }

    fn parse_not(&mut self) -> Result<Node, EvalError> {
        if self.eat_ident("not") {
            return Ok(Node::Not(Box::new(self.parse_not()?)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Node, EvalError> {
        let left = self.parse_atom_chain()?;
        let mut ops = Vec::new();
        loop {
            let op = match self.peek() {
                Some(Token::Op(s)) => match s.as_str() {
                    "==" => CompareOp::Eq,
                    "!=" => CompareOp::NotEq,
                    ">" => CompareOp::Gt,
                    ">=" => CompareOp::GtE,
                    "<" => CompareOp::Lt,
                    "<=" => CompareOp::LtE,
                    _ => break,
                },
                Some(Token::Ident(w)) if w.eq_ignore_ascii_case("in") => CompareOp::In,
                Some(Token::Ident(w)) if w.eq_ignore_ascii_case("is") => {
                    self.pos += 1;
                    if self.eat_ident("not") {
                        ops.push((CompareOp::IsNot, self.parse_atom_chain()?));
                        continue;
                    }
                    ops.push((CompareOp::Is, self.parse_atom_chain()?));
                    continue;
                }
                Some(Token::Ident(w)) if w.eq_ignore_ascii_case("not") => {
                    // lookahead for "not in"
                    let save = self.pos;
                    self.pos += 1;
                    if self.eat_ident("in") {
                        ops.push((CompareOp::NotIn, self.parse_atom_chain()?));
                        continue;
                    }
                    self.pos = save;
                    break;
                }
                _ => break,
            };
            self.pos += 1;
            ops.push((op, self.parse_atom_chain()?));
        }
        if ops.is_empty() {
            Ok(left)
        } else {
            Ok(Node::Compare(Box::new(left), ops))
        }
    }

    fn parse_atom_chain(&mut self) -> Result<Node, EvalError> {
        let mut node = self.parse_atom()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.advance() {
                        Some(Token::Ident(name)) => {
                            node = Node::Attribute(Box::new(node), name);
                        }
                        _ => return Err(err("expected identifier after '.'")),
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let key = self.parse_or()?;
                    match self.advance() {
                        Some(Token::RBracket) => {}
                        _ => return Err(err("expected ']'")),
                    }
                    node = Node::Subscript(Box::new(node), Box::new(key));
                }
                _ => break,
            }
        }
        Ok(node)
    }

    fn parse_atom(&mut self) -> Result<Node, EvalError> {
        match self.advance() {
            Some(Token::Ident(w)) => match w.to_lowercase().as_str() {
                "true" => Ok(Node::Bool(true)),
                "false" => Ok(Node::Bool(false)),
                "null" | "none" => Ok(Node::Null),
                _ => Ok(Node::Name(w)),
            },
            Some(Token::Number(n)) => Ok(Node::Number(n)),
            Some(Token::Str(s)) => Ok(Node::Str(s)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(err("expected ')'")),
                }
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                if !matches!(self.peek(), Some(Token::RBracket)) {
                    loop {
                        items.push(self.parse_or()?);
                        if matches!(self.peek(), Some(Token::Comma)) {
                            self.pos += 1;
                            continue;
                        }
                        break;
                    }
                }
                match self.advance() {
                    Some(Token::RBracket) => Ok(Node::List(items)),
                    _ => Err(err("expected ']'")),
                }
            }
            Some(Token::LBrace) => {
                let mut items = Vec::new();
                if !matches!(self.peek(), Some(Token::RBrace)) {
                    loop {
                        let key = self.parse_or()?;
                        match self.advance() {
                            Some(Token::Colon) => {}
                            _ => return Err(err("expected ':' in map literal")),
                        }
                        let value = self.parse_or()?;
                        items.push((key, value));
                        if matches!(self.peek(), Some(Token::Comma)) {
                            self.pos += 1;
                            continue;
                        }
                        break;
                    }
                }
                match self.advance() {
                    Some(Token::RBrace) => Ok(Node::Map(items)),
                    _ => Err(err("expected '}'")),
                }
            }
            other => Err(err(format!("unexpected token: {other:?}"))),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Evaluation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn eval_node(node: &Node, context: &Value) -> Result<EvalValue, EvalError> {
    match node {
        Node::Bool(b) => Ok(EvalValue::Value(Value::Bool(*b))),
        Node::Null => Ok(EvalValue::Value(Value::Null)),
        Node::Number(n) => Ok(EvalValue::Value(
            serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        )),
        Node::Str(s) => Ok(EvalValue::Value(Value::String(s.clone()))),
        Node::Name(name) => {
            if name == "context" || name == "stateData" {
                return Ok(EvalValue::Value(context.clone()));
            }
            match path::resolve_path(context, name) {
                Some(v) => Ok(EvalValue::Value(v.clone())),
                None => Ok(EvalValue::Missing(Missing(name.clone()))),
            }
        }
        Node::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for i in items {
                out.push(as_value(eval_node(i, context)?));
            }
            Ok(EvalValue::Value(Value::Array(out)))
        }
        Node::Map(pairs) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in pairs {
                let key = match eval_node(k, context)? {
                    EvalValue::Value(Value::String(s)) => s,
                    other => value_to_display(&as_value(other)),
                };
                obj.insert(key, as_value(eval_node(v, context)?));
            }
            Ok(EvalValue::Value(Value::Object(obj)))
        }
        Node::Not(inner) => {
            let v = eval_node(inner, context)?;
            Ok(EvalValue::Value(Value::Bool(!v.truthy())))
        }
        Node::And(items) => {
            let mut last = EvalValue::Value(Value::Bool(true));
            for i in items {
                last = eval_node(i, context)?;
                if !last.truthy() {
                    return Ok(EvalValue::Value(Value::Bool(false)));
                }
            }
            Ok(EvalValue::Value(Value::Bool(true)))
        }
        Node::Or(items) => {
            for i in items {
                let v = eval_node(i, context)?;
                if v.truthy() {
                    return Ok(EvalValue::Value(Value::Bool(true)));
                }
            }
            Ok(EvalValue::Value(Value::Bool(false)))
        }
        Node::Attribute(base, attr) => {
            let base_val = eval_node(base, context)?;
            match base_val {
                EvalValue::Missing(m) => {
                    let candidate = format!("{}.{}", m.0, attr);
                    match path::resolve_path(context, &candidate) {
                        Some(v) => Ok(EvalValue::Value(v.clone())),
                        None => Ok(EvalValue::Missing(Missing(candidate))),
                    }
                }
                EvalValue::Value(v) => match v.as_object().and_then(|o| {
                    crate::path::resolve_key(o, attr).map(|k| o.get(k).unwrap().clone())
                }) {
                    Some(value) => Ok(EvalValue::Value(value)),
                    None => Ok(EvalValue::Missing(Missing(attr.clone()))),
                },
            }
        }
        Node::Subscript(base, key) => {
            let base_val = eval_node(base, context)?;
            let key_val = eval_node(key, context)?;
            if let EvalValue::Missing(m) = base_val {
                return Ok(EvalValue::Missing(m));
            }
            if let EvalValue::Missing(m) = key_val {
                return Ok(EvalValue::Missing(m));
            }
            let base_val = as_value(base_val);
            let key_val = as_value(key_val);
            match (&base_val, &key_val) {
                (Value::Object(o), Value::String(k)) => match crate::path::resolve_key(o, k) {
                    Some(rk) => Ok(EvalValue::Value(o.get(rk).unwrap().clone())),
                    None => Ok(EvalValue::Missing(Missing(k.clone()))),
                },
                (Value::Array(a), Value::Number(n)) => {
                    let idx = n.as_i64().unwrap_or(-1);
                    if idx >= 0 && (idx as usize) < a.len() {
                        Ok(EvalValue::Value(a[idx as usize].clone()))
                    } else {
                        Ok(EvalValue::Missing(Missing(value_to_display(&key_val))))
                    }
                }
                _ => Ok(EvalValue::Missing(Missing(value_to_display(&key_val)))),
            }
        }
        Node::Compare(left, ops) => {
            let mut current = eval_node(left, context)?;
            for (op, rhs_node) in ops {
                let rhs = eval_node(rhs_node, context)?;
                let passed = compare(&current, &rhs, *op, context);
                if !passed {
                    return Ok(EvalValue::Value(Value::Bool(false)));
                }
                current = rhs;
            }
            Ok(EvalValue::Value(Value::Bool(true)))
        }
    }
}

fn as_value(v: EvalValue) -> Value {
    match v {
        EvalValue::Value(v) => v,
        EvalValue::Missing(_) => Value::Null,
    }
}

fn value_to_display(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compare(left: &EvalValue, right: &EvalValue, op: CompareOp, _context: &Value) -> bool {
    // `Missing(k) in map` / `not in` is true iff `map` has key `k`.
    if matches!(op, CompareOp::In | CompareOp::NotIn) {
        if let (EvalValue::Missing(m), EvalValue::Value(Value::Object(o))) = (left, right) {
            let contains = crate::path::contains_key(o, &m.0);
            return if op == CompareOp::In { contains } else { !contains };
        }
    }

    let lv = match left {
        EvalValue::Missing(_) => Value::Null,
        EvalValue::Value(v) => v.clone(),
    };
    let rv = match right {
        EvalValue::Missing(_) => Value::Null,
        EvalValue::Value(v) => v.clone(),
    };
    let left_is_missing = matches!(left, EvalValue::Missing(_));
    let right_is_missing = matches!(right, EvalValue::Missing(_));

    match op {
        CompareOp::Eq => {
            if left_is_missing || right_is_missing {
                // Missing compares unequal to any concrete value, equal only
                // if both sides are missing the same path isn't guaranteed —
                // treat Missing == Missing as true (both resolve to "absent").
                return left_is_missing && right_is_missing;
            }
            values_equal(&lv, &rv)
        }
        CompareOp::NotEq => {
            if left_is_missing || right_is_missing {
                return !(left_is_missing && right_is_missing);
            }
            !values_equal(&lv, &rv)
        }
        CompareOp::Is => left_is_missing == right_is_missing && values_equal(&lv, &rv),
        CompareOp::IsNot => !(left_is_missing == right_is_missing && values_equal(&lv, &rv)),
        CompareOp::Gt | CompareOp::GtE | CompareOp::Lt | CompareOp::LtE => {
            if left_is_missing || right_is_missing {
                return false;
            }
            numeric_compare(&lv, &rv, op)
        }
        CompareOp::In => {
            if left_is_missing || right_is_missing {
                return false;
            }
            membership(&lv, &rv)
        }
        CompareOp::NotIn => {
            if left_is_missing || right_is_missing {
                return false;
            }
            !membership(&lv, &rv)
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn numeric_compare(a: &Value, b: &Value, op: CompareOp) -> bool {
    let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) else {
        if let (Value::String(x), Value::String(y)) = (a, b) {
            return match op {
                CompareOp::Gt => x > y,
                CompareOp::GtE => x >= y,
                CompareOp::Lt => x < y,
                CompareOp::LtE => x <= y,
                _ => false,
            };
        }
        return false;
    };
    match op {
        CompareOp::Gt => x > y,
        CompareOp::GtE => x >= y,
        CompareOp::Lt => x < y,
        CompareOp::LtE => x <= y,
        _ => false,
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn membership(needle: &Value, haystack: &Value) -> bool {
    match haystack {
        Value::Array(items) => items.iter().any(|i| values_equal(i, needle)),
        Value::String(s) => match needle {
            Value::String(n) => s.contains(n.as_str()),
            _ => false,
        },
        Value::Object(o) => match needle {
            Value::String(k) => crate::path::contains_key(o, k),
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn simple_equality() {
        assert!(evaluate("amount == 200", &json!({"amount": 200})));
        assert!(!evaluate("amount == 200", &json!({"amount": 300})));
    }

    #[test]
    fn boolean_and_or() {
        let ctx = json!({"amount": 250, "max_amount": 600});
        assert!(evaluate("amount >= 200 and amount <= max_amount", &ctx));
        let ctx2 = json!({"amount": 700, "max_amount": 600});
        assert!(!evaluate("amount >= 200 and amount <= max_amount", &ctx2));
    }

    #[test]
    fn membership_in_state_data() {
        let ctx = json!({"stateData": {"carrier_id": "telcel"}});
        assert!(evaluate("carrier_id in stateData", &ctx));
    }

    #[test]
    fn missing_path_is_false_comparison() {
        let ctx = json!({"user": {"name": "ana"}});
        assert!(!evaluate("user.age > 18", &ctx));
    }

    #[test]
    fn missing_membership_checks_key_presence() {
        let ctx = json!({"recipient_id": "rec_1"});
        assert!(evaluate("recipient_id in context", &ctx));
        assert!(!evaluate("phone_number in context", &ctx));
    }

    #[test]
    fn camel_snake_fallback_in_path() {
        let ctx = json!({"recipientId": "rec_9"});
        assert!(evaluate("recipient_id == 'rec_9'", &ctx));
    }

    #[test]
    fn not_operator() {
        assert!(evaluate("not (amount > 100)", &json!({"amount": 50})));
        assert!(!evaluate("not (amount > 100)", &json!({"amount": 500})));
    }

    #[test]
    fn malformed_condition_is_false_not_panic() {
        assert!(!evaluate("amount >>> 100", &json!({"amount": 10})));
        assert!(!evaluate("(((", &json!({})));
    }

    #[test]
    fn empty_condition_is_false() {
        assert!(!evaluate("", &json!({})));
        assert!(!evaluate("   ", &json!({})));
    }

    #[test]
    fn is_and_is_not() {
        assert!(evaluate("value is null", &json!({"value": null})));
        assert!(evaluate("value is not null", &json!({"value": 5})));
    }

    #[test]
    fn string_literal_comparison() {
        assert!(evaluate("status == 'approved'", &json!({"status": "approved"})));
    }

    #[test]
    fn list_membership() {
        assert!(evaluate("status in ['approved', 'pending']", &json!({"status": "pending"})));
        assert!(!evaluate("status in ['approved']", &json!({"status": "denied"})));
    }

    #[test]
    fn subscript_access() {
        let ctx = json!({"stateData": {"carrier_id": "telcel"}});
        assert!(evaluate("stateData['carrier_id'] == 'telcel'", &ctx));
    }
}
