// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Small string-template engine for resource names and workload monitors.
//!
//! The syntax is the `{{ ... }}` action syntax used by chart templates:
//!
//! - field paths: `{{ .name }}`, `{{ .Values.replicas }}`, `{{ . }}`
//! - literals: `"text"`, `` `raw` ``, `42`, `1.5`, `true`, `false`, `nil`
//! - function calls and pipelines: `{{ .Values.size | default 1 | add 2 }}`
//! - parenthesized sub-expressions: `{{ add (mul .Values.a 2) 1 }}`
//! - conditionals: `{{ if ... }} ... {{ else if ... }} ... {{ else }} ... {{ end }}`
//! - whitespace trimming markers `{{-` and `-}}`, and `{{/* comments */}}`
//!
//! Missing fields evaluate to `nil`, which renders as an empty string.
//!
//! # Example
//!
//! ```rust
//! use cozystack_operator::template::render;
//! use serde_json::json;
//!
//! let out = render("{{ .name }}-{{ .kind }}", &json!({"name": "db1", "kind": "postgres"})).unwrap();
//! assert_eq!(out, "db1-postgres");
//! ```

use serde_json::{Number, Value};
use thiserror::Error;

/// Errors produced while parsing or executing a template.
#[derive(Debug, Error, PartialEq)]
pub enum TemplateError {
    #[error("unclosed action at byte {0}")]
    UnclosedAction(usize),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unexpected character {0:?} in action")]
    UnexpectedChar(char),

    #[error("invalid number {0:?}")]
    InvalidNumber(String),

    #[error("unexpected token {0} in action")]
    UnexpectedToken(String),

    #[error("empty command in pipeline")]
    EmptyCommand,

    #[error("unbalanced parentheses")]
    UnbalancedParens,

    #[error("unexpected `{0}` action")]
    UnexpectedKeyword(String),

    #[error("`if` without matching `end`")]
    MissingEnd,

    #[error("function {0:?} not defined")]
    UnknownFunction(String),

    #[error("wrong number of args for {name}: want {want}, got {got}")]
    Arity {
        name: String,
        want: &'static str,
        got: usize,
    },

    #[error("can't give argument to non-function {0}")]
    NotAFunction(String),

    #[error("invalid argument for {name}: {reason}")]
    InvalidArgument { name: String, reason: String },
}

type Result<T> = std::result::Result<T, TemplateError>;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(Vec<String>),
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Pipe,
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Field(path) => write!(f, ".{}", path.join(".")),
            Token::Ident(name) => write!(f, "{name}"),
            Token::Str(s) => write!(f, "{s:?}"),
            Token::Int(i) => write!(f, "{i}"),
            Token::Float(x) => write!(f, "{x}"),
            Token::Pipe => write!(f, "|"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
        }
    }
}

#[derive(Debug, Clone)]
enum Operand {
    Field(Vec<String>),
    Function(String),
    Literal(Value),
    Sub(Pipeline),
}

#[derive(Debug, Clone)]
struct Command(Vec<Operand>);

type Pipeline = Vec<Command>;

#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Action(Pipeline),
    If {
        cond: Pipeline,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

enum Segment {
    Text(String),
    Action(String),
}

enum Stop {
    Eof,
    Else(Vec<Token>),
    End,
}

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    /// Parses a template.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed actions or unbalanced control structures.
    pub fn parse(source: &str) -> Result<Self> {
        let segments = split_segments(source)?;
        let mut pos = 0;
        let (nodes, stop) = parse_block(&segments, &mut pos)?;
        match stop {
            Stop::Eof => Ok(Self { nodes }),
            Stop::Else(_) => Err(TemplateError::UnexpectedKeyword("else".into())),
            Stop::End => Err(TemplateError::UnexpectedKeyword("end".into())),
        }
    }

    /// Executes the template against `data`.
    ///
    /// # Errors
    ///
    /// Returns an error when a function is unknown or receives bad arguments.
    pub fn execute(&self, data: &Value) -> Result<String> {
        let mut out = String::new();
        exec_nodes(&self.nodes, data, &mut out)?;
        Ok(out)
    }
}

/// Renders `source` against `data`, trimming surrounding whitespace.
///
/// Strings without `{{` are returned unchanged.
///
/// # Errors
///
/// Returns an error when the template cannot be parsed or executed.
pub fn render(source: &str, data: &Value) -> Result<String> {
    if !source.contains("{{") {
        return Ok(source.to_string());
    }
    let rendered = Template::parse(source)?.execute(data)?;
    Ok(rendered.trim().to_string())
}

/// Evaluates a condition template. Empty conditions are true; otherwise the
/// rendered output must be `true`, `1` or `yes` (case-insensitive).
///
/// # Errors
///
/// Returns an error when the condition cannot be rendered.
pub fn evaluate_condition(condition: &str, data: &Value) -> Result<bool> {
    if condition.trim().is_empty() {
        return Ok(true);
    }
    let rendered = render(condition, data)?.to_lowercase();
    Ok(matches!(rendered.trim(), "true" | "1" | "yes"))
}

// ============================================================================
// Lexing
// ============================================================================

fn split_segments(source: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut rest = source;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let trim_left = after.starts_with('-') && after[1..].starts_with(char::is_whitespace);

        let text = &rest[..start];
        let text = if trim_left { text.trim_end() } else { text };
        if !text.is_empty() {
            segments.push(Segment::Text(text.to_string()));
        }

        let end = after
            .find("}}")
            .ok_or(TemplateError::UnclosedAction(offset + start))?;
        let mut body = &after[usize::from(trim_left).min(end)..end];
        let trim_right = body.ends_with('-') && body[..body.len() - 1].ends_with(char::is_whitespace);
        if trim_right {
            body = &body[..body.len() - 1];
        }

        let body = body.trim();
        if !(body.starts_with("/*") && body.ends_with("*/")) {
            segments.push(Segment::Action(body.to_string()));
        }

        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
        if trim_right {
            let trimmed = rest.trim_start();
            offset += rest.len() - trimmed.len();
            rest = trimmed;
        }
    }

    if !rest.is_empty() {
        segments.push(Segment::Text(rest.to_string()));
    }
    Ok(segments)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '"' => {
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(TemplateError::UnterminatedString),
                        Some('"') => break,
                        Some('\\') => {
                            let escaped = match chars.get(i + 1) {
                                Some('n') => '\n',
                                Some('t') => '\t',
                                Some(other) => *other,
                                None => return Err(TemplateError::UnterminatedString),
                            };
                            value.push(escaped);
                            i += 2;
                        }
                        Some(other) => {
                            value.push(*other);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(value));
                i += 1;
            }
            '`' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == '`')
                    .ok_or(TemplateError::UnterminatedString)?;
                tokens.push(Token::Str(chars[start..start + end].iter().collect()));
                i = start + end + 1;
            }
            '.' => {
                let mut path = Vec::new();
                i += 1;
                loop {
                    let start = i;
                    while i < chars.len() && is_ident_char(chars[i]) {
                        i += 1;
                    }
                    if i > start {
                        path.push(chars[start..i].iter().collect());
                    }
                    if i + 1 < chars.len() && chars[i] == '.' && is_ident_char(chars[i + 1]) {
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Field(path));
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                if let Ok(int) = literal.parse::<i64>() {
                    tokens.push(Token::Int(int));
                } else if let Ok(float) = literal.parse::<f64>() {
                    tokens.push(Token::Float(float));
                } else {
                    return Err(TemplateError::InvalidNumber(literal));
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(TemplateError::UnexpectedChar(other)),
        }
    }
    Ok(tokens)
}

// ============================================================================
// Parsing
// ============================================================================

fn parse_pipeline(tokens: &[Token], pos: &mut usize, nested: bool) -> Result<Pipeline> {
    let mut commands = Vec::new();
    let mut current: Vec<Operand> = Vec::new();

    while let Some(token) = tokens.get(*pos) {
        match token {
            Token::Pipe => {
                if current.is_empty() {
                    return Err(TemplateError::EmptyCommand);
                }
                commands.push(Command(std::mem::take(&mut current)));
                *pos += 1;
            }
            Token::RParen if nested => break,
            Token::RParen => return Err(TemplateError::UnbalancedParens),
            Token::LParen => {
                *pos += 1;
                let sub = parse_pipeline(tokens, pos, true)?;
                if tokens.get(*pos) != Some(&Token::RParen) {
                    return Err(TemplateError::UnbalancedParens);
                }
                *pos += 1;
                current.push(Operand::Sub(sub));
            }
            Token::Field(path) => {
                current.push(Operand::Field(path.clone()));
                *pos += 1;
            }
            Token::Ident(name) => {
                current.push(match name.as_str() {
                    "true" => Operand::Literal(Value::Bool(true)),
                    "false" => Operand::Literal(Value::Bool(false)),
                    "nil" => Operand::Literal(Value::Null),
                    "if" | "else" | "end" => {
                        return Err(TemplateError::UnexpectedToken(name.clone()))
                    }
                    _ => Operand::Function(name.clone()),
                });
                *pos += 1;
            }
            Token::Str(s) => {
                current.push(Operand::Literal(Value::String(s.clone())));
                *pos += 1;
            }
            Token::Int(i) => {
                current.push(Operand::Literal(Value::from(*i)));
                *pos += 1;
            }
            Token::Float(x) => {
                current.push(Operand::Literal(float_value(*x)));
                *pos += 1;
            }
        }
    }

    if current.is_empty() {
        return Err(TemplateError::EmptyCommand);
    }
    commands.push(Command(current));
    Ok(commands)
}

fn parse_full_pipeline(tokens: &[Token]) -> Result<Pipeline> {
    let mut pos = 0;
    let pipeline = parse_pipeline(tokens, &mut pos, false)?;
    match tokens.get(pos) {
        None => Ok(pipeline),
        Some(token) => Err(TemplateError::UnexpectedToken(token.to_string())),
    }
}

fn parse_block(segments: &[Segment], pos: &mut usize) -> Result<(Vec<Node>, Stop)> {
    let mut nodes = Vec::new();

    while let Some(segment) = segments.get(*pos) {
        *pos += 1;
        match segment {
            Segment::Text(text) => nodes.push(Node::Text(text.clone())),
            Segment::Action(body) => {
                let tokens = tokenize(body)?;
                match tokens.first() {
                    None => {}
                    Some(Token::Ident(keyword)) if keyword == "if" => {
                        let cond = parse_full_pipeline(&tokens[1..])?;
                        nodes.push(parse_if(cond, segments, pos)?);
                    }
                    Some(Token::Ident(keyword)) if keyword == "else" => {
                        return Ok((nodes, Stop::Else(tokens[1..].to_vec())));
                    }
                    Some(Token::Ident(keyword)) if keyword == "end" => {
                        if tokens.len() > 1 {
                            return Err(TemplateError::UnexpectedToken(tokens[1].to_string()));
                        }
                        return Ok((nodes, Stop::End));
                    }
                    Some(_) => nodes.push(Node::Action(parse_full_pipeline(&tokens)?)),
                }
            }
        }
    }
    Ok((nodes, Stop::Eof))
}

fn parse_if(cond: Pipeline, segments: &[Segment], pos: &mut usize) -> Result<Node> {
    let (then, stop) = parse_block(segments, pos)?;
    let otherwise = match stop {
        Stop::End => Vec::new(),
        Stop::Eof => return Err(TemplateError::MissingEnd),
        Stop::Else(rest) => match rest.first() {
            Some(Token::Ident(keyword)) if keyword == "if" => {
                let nested = parse_full_pipeline(&rest[1..])?;
                vec![parse_if(nested, segments, pos)?]
            }
            Some(token) => return Err(TemplateError::UnexpectedToken(token.to_string())),
            None => match parse_block(segments, pos)? {
                (nodes, Stop::End) => nodes,
                (_, Stop::Eof) => return Err(TemplateError::MissingEnd),
                (_, Stop::Else(_)) => return Err(TemplateError::UnexpectedKeyword("else".into())),
            },
        },
    };
    Ok(Node::If {
        cond,
        then,
        otherwise,
    })
}

// ============================================================================
// Execution
// ============================================================================

fn exec_nodes(nodes: &[Node], data: &Value, out: &mut String) -> Result<()> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Action(pipeline) => out.push_str(&to_text(&eval_pipeline(pipeline, data)?)),
            Node::If {
                cond,
                then,
                otherwise,
            } => {
                if is_truthy(&eval_pipeline(cond, data)?) {
                    exec_nodes(then, data, out)?;
                } else {
                    exec_nodes(otherwise, data, out)?;
                }
            }
        }
    }
    Ok(())
}

fn eval_pipeline(pipeline: &Pipeline, data: &Value) -> Result<Value> {
    let mut piped: Option<Value> = None;
    for command in pipeline {
        piped = Some(eval_command(command, data, piped)?);
    }
    Ok(piped.unwrap_or(Value::Null))
}

fn eval_command(command: &Command, data: &Value, piped: Option<Value>) -> Result<Value> {
    let Some((first, rest)) = command.0.split_first() else {
        return Err(TemplateError::EmptyCommand);
    };
    match first {
        Operand::Function(name) => {
            let mut args = rest
                .iter()
                .map(|operand| eval_operand(operand, data))
                .collect::<Result<Vec<_>>>()?;
            if let Some(value) = piped {
                args.push(value);
            }
            call(name, args)
        }
        other => {
            if !rest.is_empty() || piped.is_some() {
                return Err(TemplateError::NotAFunction(describe(other)));
            }
            eval_operand(other, data)
        }
    }
}

fn eval_operand(operand: &Operand, data: &Value) -> Result<Value> {
    match operand {
        Operand::Field(path) => Ok(lookup(data, path)),
        Operand::Function(name) => call(name, Vec::new()),
        Operand::Literal(value) => Ok(value.clone()),
        Operand::Sub(pipeline) => eval_pipeline(pipeline, data),
    }
}

fn describe(operand: &Operand) -> String {
    match operand {
        Operand::Field(path) => format!(".{}", path.join(".")),
        Operand::Function(name) => name.clone(),
        Operand::Literal(value) => value.to_string(),
        Operand::Sub(_) => "(...)".to_string(),
    }
}

fn lookup(data: &Value, path: &[String]) -> Value {
    let mut current = data;
    for segment in path {
        match current.get(segment) {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    current.clone()
}

fn float_value(x: f64) -> Value {
    Number::from_f64(x).map_or(Value::Null, Value::Number)
}

/// Renders a value the way template output prints it.
fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{f:.0}"),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn is_empty_value(value: &Value) -> bool {
    matches!(value, Value::Null) || matches!(value, Value::String(s) if s.is_empty())
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn to_int(name: &str, value: &Value) -> Result<i64> {
    let invalid = || TemplateError::InvalidArgument {
        name: name.to_string(),
        reason: format!("{value} is not an integer"),
    };
    match value {
        Value::Null => Ok(0),
        Value::Bool(b) => Ok(i64::from(*b)),
        #[allow(clippy::cast_possible_truncation)]
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(invalid),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn arity(name: &str, args: &[Value], want: &'static str, ok: bool) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(TemplateError::Arity {
            name: name.to_string(),
            want,
            got: args.len(),
        })
    }
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start && c.is_alphabetic() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = c.is_whitespace();
    }
    out
}

fn printf(format: &str, args: &[Value]) -> Result<String> {
    let mut out = String::new();
    let mut args = args.iter();
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some(verb @ ('s' | 'v' | 'd')) => match args.next() {
                Some(arg) if verb == 'd' => out.push_str(&to_int("printf", arg)?.to_string()),
                Some(arg) => out.push_str(&to_text(arg)),
                None => out.push_str(&format!("%!{verb}(MISSING)")),
            },
            Some(other) => out.push_str(&format!("%!{other}(BADVERB)")),
            None => out.push('%'),
        }
    }
    Ok(out)
}

fn slice(name: &str, args: &[Value]) -> Result<Value> {
    let start = usize::try_from(to_int(name, &args[1])?.max(0)).unwrap_or(0);
    let end = match args.get(2) {
        Some(v) => Some(usize::try_from(to_int(name, v)?.max(0)).unwrap_or(0)),
        None => None,
    };
    match &args[0] {
        Value::Array(items) => {
            let end = end.unwrap_or(items.len()).min(items.len());
            Ok(Value::Array(
                items.get(start.min(end)..end).unwrap_or_default().to_vec(),
            ))
        }
        other => {
            let chars: Vec<char> = to_text(other).chars().collect();
            let end = end.unwrap_or(chars.len()).min(chars.len());
            Ok(Value::String(
                chars.get(start.min(end)..end).unwrap_or_default().iter().collect(),
            ))
        }
    }
}

fn call(name: &str, args: Vec<Value>) -> Result<Value> {
    let n = args.len();
    let int_binary = |op: fn(i64, i64) -> Option<i64>| -> Result<Value> {
        arity(name, &args, "2", n == 2)?;
        let a = to_int(name, &args[0])?;
        let b = to_int(name, &args[1])?;
        op(a, b)
            .map(Value::from)
            .ok_or_else(|| TemplateError::InvalidArgument {
                name: name.to_string(),
                reason: "integer overflow".into(),
            })
    };

    match name {
        "add" => int_binary(i64::checked_add),
        "sub" => int_binary(i64::checked_sub),
        "mul" => int_binary(i64::checked_mul),
        "div" => int_binary(|a, b| Some(a.checked_div(b).unwrap_or(0))),
        "add1" | "sub1" => {
            arity(name, &args, "1", n == 1)?;
            let a = to_int(name, &args[0])?;
            let delta = if name == "add1" { 1 } else { -1 };
            Ok(Value::from(a.saturating_add(delta)))
        }
        "upper" | "lower" | "title" | "trim" => {
            arity(name, &args, "1", n == 1)?;
            let s = to_text(&args[0]);
            Ok(Value::String(match name {
                "upper" => s.to_uppercase(),
                "lower" => s.to_lowercase(),
                "title" => title_case(&s),
                _ => s.trim().to_string(),
            }))
        }
        "trimAll" => {
            arity(name, &args, "2", n == 2)?;
            let cutset: Vec<char> = to_text(&args[0]).chars().collect();
            Ok(Value::String(
                to_text(&args[1]).trim_matches(cutset.as_slice()).to_string(),
            ))
        }
        "trimPrefix" | "trimSuffix" => {
            arity(name, &args, "2", n == 2)?;
            let affix = to_text(&args[0]);
            let s = to_text(&args[1]);
            let trimmed = if name == "trimPrefix" {
                s.strip_prefix(affix.as_str())
            } else {
                s.strip_suffix(affix.as_str())
            };
            Ok(Value::String(trimmed.unwrap_or(&s).to_string()))
        }
        "replace" => {
            arity(name, &args, "3 or 4", n == 3 || n == 4)?;
            let old = to_text(&args[0]);
            let new = to_text(&args[1]);
            let (count, s) = if n == 4 {
                (to_int(name, &args[2])?, to_text(&args[3]))
            } else {
                (-1, to_text(&args[2]))
            };
            Ok(Value::String(match usize::try_from(count) {
                Ok(limit) => s.replacen(&old, &new, limit),
                Err(_) => s.replace(&old, &new),
            }))
        }
        "default" => {
            arity(name, &args, "2", n == 2)?;
            let mut args = args;
            let value = args.pop().unwrap_or(Value::Null);
            let fallback = args.pop().unwrap_or(Value::Null);
            Ok(if is_empty_value(&value) { fallback } else { value })
        }
        "empty" => {
            arity(name, &args, "1", n == 1)?;
            Ok(Value::Bool(is_empty_value(&args[0])))
        }
        "not" => {
            arity(name, &args, "1", n == 1)?;
            Ok(Value::Bool(!is_truthy(&args[0])))
        }
        "eq" => {
            arity(name, &args, "at least 2", n >= 2)?;
            Ok(Value::Bool(
                args[1..].iter().any(|other| values_equal(&args[0], other)),
            ))
        }
        "ne" => {
            arity(name, &args, "2", n == 2)?;
            Ok(Value::Bool(!values_equal(&args[0], &args[1])))
        }
        "and" => {
            arity(name, &args, "at least 1", n >= 1)?;
            let last = args.len() - 1;
            Ok(args
                .iter()
                .find(|v| !is_truthy(v))
                .unwrap_or(&args[last])
                .clone())
        }
        "or" => {
            arity(name, &args, "at least 1", n >= 1)?;
            let last = args.len() - 1;
            Ok(args
                .iter()
                .find(|v| is_truthy(v))
                .unwrap_or(&args[last])
                .clone())
        }
        "printf" => {
            arity(name, &args, "at least 1", n >= 1)?;
            Ok(Value::String(printf(&to_text(&args[0]), &args[1..])?))
        }
        "slice" => {
            arity(name, &args, "2 or 3", n == 2 || n == 3)?;
            slice(name, &args)
        }
        _ => Err(TemplateError::UnknownFunction(name.to_string())),
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod template_tests;
