//! Sandboxed template expansion for fixture files.
//!
//! Fixture text is expanded once per file, before any format-specific parsing.
//! The directive syntax mirrors embedded-Ruby templates, but only a small,
//! side-effect free language is evaluated:
//!
//! ```text
//! <% for i in 1..3 %>
//! site_<%= i %>:
//!   id: <%= i %>
//!   name: Site <%= i * 10 %>
//!   created_on: <%= today %>
//! <% end %>
//! ```
//!
//! - `<%= expr %>` writes the value of `expr`: integers, quoted strings,
//!   variables, the `today`/`now` built-ins, `+ - *` and parentheses.
//! - `<% for VAR in A..B %>` (inclusive) or `A...B` (exclusive), also written
//!   `<% (A..B).each do |VAR| %>`, repeats its body until `<% end %>`.
//! - `<%# ... %>` is a comment, `<%%` is a literal `<%`, and a tag closed with
//!   `-%>` swallows the newline that follows it.

use chrono::Local;
use std::collections::HashMap;
use std::fmt;

/// Upper bound on loop iterations, per loop and across the whole template.
const MAX_LOOP_ITERATIONS: i64 = 1_000_000;

/// Error raised while parsing or evaluating a template.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("template error on line {line}: {message}")]
pub struct TemplateError {
    /// 1-based line of the tag that failed
    pub line: usize,
    pub message: String,
}

impl TemplateError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// A value produced by a template expression.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateValue {
    Int(i64),
    Str(String),
}

impl fmt::Display for TemplateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for TemplateValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for TemplateValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Variables visible to every template. Empty by default.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    vars: HashMap<String, TemplateValue>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a variable.
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<TemplateValue>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&TemplateValue> {
        self.vars.get(name)
    }
}

/// Expand every directive in `source`.
pub fn render(source: &str, context: &TemplateContext) -> Result<String, TemplateError> {
    if !source.contains("<%") {
        return Ok(source.to_string());
    }

    let nodes = parse(source)?;
    let mut out = String::with_capacity(source.len());
    let mut scope = Scope {
        context,
        locals: Vec::new(),
        budget: MAX_LOOP_ITERATIONS,
    };
    eval_nodes(&nodes, &mut scope, &mut out)?;
    Ok(out)
}

// ============================================================================
// Parsing
// ============================================================================

#[derive(Debug)]
enum Node {
    Text(String),
    Output { expr: String, line: usize },
    Loop(Loop),
}

#[derive(Debug)]
struct Loop {
    var: String,
    start: String,
    end: String,
    inclusive: bool,
    line: usize,
    body: Vec<Node>,
}

fn parse(source: &str) -> Result<Vec<Node>, TemplateError> {
    let mut root: Vec<Node> = Vec::new();
    // Loops still waiting for their `<% end %>`, innermost last.
    let mut open: Vec<Loop> = Vec::new();
    let mut text = String::new();
    let mut rest = source;
    let mut line = 1;

    while let Some(start) = rest.find("<%") {
        text.push_str(&rest[..start]);
        line += count_lines(&rest[..start]);
        let after = &rest[start + 2..];

        if let Some(escaped) = after.strip_prefix('%') {
            text.push_str("<%");
            rest = escaped;
            continue;
        }

        let close = after
            .find("%>")
            .ok_or_else(|| TemplateError::new(line, "unterminated <% tag"))?;
        let mut tag = &after[..close];
        let mut remaining = &after[close + 2..];
        let tag_line = line;
        line += count_lines(tag);

        if let Some(trimmed) = tag.strip_suffix('-') {
            tag = trimmed;
            if let Some(r) = remaining.strip_prefix("\r\n").or_else(|| remaining.strip_prefix('\n')) {
                remaining = r;
                line += 1;
            }
        }
        rest = remaining;

        let nodes = match open.last_mut() {
            Some(header) => &mut header.body,
            None => &mut root,
        };
        if !text.is_empty() {
            nodes.push(Node::Text(std::mem::take(&mut text)));
        }

        if let Some(expr) = tag.strip_prefix('=') {
            nodes.push(Node::Output {
                expr: expr.trim().to_string(),
                line: tag_line,
            });
        } else if tag.starts_with('#') {
            // comment
        } else {
            let statement = tag.trim();
            if statement == "end" {
                let Some(finished) = open.pop() else {
                    return Err(TemplateError::new(tag_line, "<% end %> without an open loop"));
                };
                match open.last_mut() {
                    Some(parent) => parent.body.push(Node::Loop(finished)),
                    None => root.push(Node::Loop(finished)),
                }
            } else {
                open.push(parse_loop_header(statement, tag_line)?);
            }
        }
    }
    text.push_str(rest);

    if let Some(unclosed) = open.last() {
        return Err(TemplateError::new(
            unclosed.line,
            "loop is missing its closing <% end %>",
        ));
    }

    if !text.is_empty() {
        root.push(Node::Text(text));
    }
    Ok(root)
}

fn count_lines(s: &str) -> usize {
    s.bytes().filter(|&b| b == b'\n').count()
}

/// Parse `for i in A..B` or `(A..B).each do |i|`.
fn parse_loop_header(statement: &str, line: usize) -> Result<Loop, TemplateError> {
    let unsupported = || TemplateError::new(line, format!("unsupported statement: {statement}"));

    let (var, range) = if let Some(body) = statement.strip_prefix("for ") {
        let (var, range) = body.split_once(" in ").ok_or_else(unsupported)?;
        (var.trim(), range.trim())
    } else if let Some((range, binding)) = statement.split_once(".each do") {
        let var = binding
            .trim()
            .strip_prefix('|')
            .and_then(|b| b.strip_suffix('|'))
            .ok_or_else(unsupported)?;
        (var.trim(), range.trim())
    } else {
        return Err(unsupported());
    };

    if !is_identifier(var) {
        return Err(TemplateError::new(line, format!("invalid loop variable: {var}")));
    }

    let range = range
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .unwrap_or(range);
    let (start, end, inclusive) = if let Some((start, end)) = range.split_once("...") {
        (start, end, false)
    } else if let Some((start, end)) = range.split_once("..") {
        (start, end, true)
    } else {
        return Err(TemplateError::new(line, format!("expected a range, found: {range}")));
    };

    Ok(Loop {
        var: var.to_string(),
        start: start.trim().to_string(),
        end: end.trim().to_string(),
        inclusive,
        line,
        body: Vec::new(),
    })
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ============================================================================
// Evaluation
// ============================================================================

struct Scope<'a> {
    context: &'a TemplateContext,
    locals: Vec<(String, TemplateValue)>,
    /// Loop iterations left for the rest of the template.
    budget: i64,
}

impl Scope<'_> {
    fn lookup(&self, name: &str) -> Option<TemplateValue> {
        self.locals
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .or_else(|| self.context.get(name).cloned())
            .or_else(|| builtin(name))
    }
}

fn builtin(name: &str) -> Option<TemplateValue> {
    match name {
        "today" => Some(TemplateValue::Str(
            Local::now().date_naive().format("%Y-%m-%d").to_string(),
        )),
        "now" => Some(TemplateValue::Str(
            Local::now().naive_local().format("%Y-%m-%d %H:%M:%S").to_string(),
        )),
        _ => None,
    }
}

fn eval_nodes(nodes: &[Node], scope: &mut Scope<'_>, out: &mut String) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Output { expr, line } => {
                let value = eval_expr(expr, scope).map_err(|m| TemplateError::new(*line, m))?;
                out.push_str(&value.to_string());
            }
            Node::Loop(lp) => {
                let bound = |expr: &str| match eval_expr(expr, scope) {
                    Ok(TemplateValue::Int(i)) => Ok(i),
                    Ok(other) => Err(TemplateError::new(
                        lp.line,
                        format!("range bound must be an integer, found '{other}'"),
                    )),
                    Err(m) => Err(TemplateError::new(lp.line, m)),
                };
                let start = bound(&lp.start)?;
                let end = bound(&lp.end)?;
                let last = if lp.inclusive {
                    end
                } else {
                    match end.checked_sub(1) {
                        Some(last) => last,
                        // Nothing lies below i64::MIN.
                        None => continue,
                    }
                };
                if last.saturating_sub(start) >= MAX_LOOP_ITERATIONS {
                    return Err(TemplateError::new(
                        lp.line,
                        format!("loop over {start}..{end} exceeds {MAX_LOOP_ITERATIONS} iterations"),
                    ));
                }

                for i in start..=last {
                    scope.budget -= 1;
                    if scope.budget < 0 {
                        return Err(TemplateError::new(
                            lp.line,
                            format!("template exceeds {MAX_LOOP_ITERATIONS} loop iterations in total"),
                        ));
                    }
                    scope.locals.push((lp.var.clone(), TemplateValue::Int(i)));
                    let result = eval_nodes(&lp.body, scope, out);
                    scope.locals.pop();
                    result?;
                }
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Str(String),
    Ident(String),
    Op(char),
    Open,
    Close,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '0'..='9' => {
                let begin = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
                    i += 1;
                }
                let digits: String = chars[begin..i].iter().filter(|&&d| d != '_').collect();
                let n = digits
                    .parse()
                    .map_err(|_| format!("integer literal out of range: {digits}"))?;
                tokens.push(Token::Int(n));
            }
            '"' | '\'' => {
                let quote = c;
                i += 1;
                let mut s = String::new();
                loop {
                    match chars.get(i) {
                        None => return Err(format!("unterminated string in: {expr}")),
                        Some(&ch) if ch == quote => break,
                        Some('\\') if quote == '"' => {
                            i += 1;
                            match chars.get(i) {
                                Some('n') => s.push('\n'),
                                Some('t') => s.push('\t'),
                                Some(&other) => s.push(other),
                                None => return Err(format!("unterminated string in: {expr}")),
                            }
                        }
                        Some(&ch) => s.push(ch),
                    }
                    i += 1;
                }
                i += 1;
                tokens.push(Token::Str(s));
            }
            '+' | '-' | '*' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let begin = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[begin..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{other}' in: {expr}")),
        }
    }
    Ok(tokens)
}

struct ExprParser<'s, 'a> {
    tokens: Vec<Token>,
    pos: usize,
    scope: &'s Scope<'a>,
}

fn eval_expr(expr: &str, scope: &Scope<'_>) -> Result<TemplateValue, String> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        scope,
    };
    let value = parser.sum()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!("unexpected trailing input in: {expr}"));
    }
    Ok(value)
}

impl ExprParser<'_, '_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn sum(&mut self) -> Result<TemplateValue, String> {
        let mut left = self.product()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let right = self.product()?;
            left = apply(op, left, right)?;
        }
        Ok(left)
    }

    fn product(&mut self) -> Result<TemplateValue, String> {
        let mut left = self.factor()?;
        while let Some(Token::Op('*')) = self.peek() {
            self.pos += 1;
            let right = self.factor()?;
            left = apply('*', left, right)?;
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<TemplateValue, String> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| "unexpected end of expression".to_string())?;
        self.pos += 1;

        match token {
            Token::Int(i) => Ok(TemplateValue::Int(i)),
            Token::Str(s) => Ok(TemplateValue::Str(s)),
            Token::Ident(name) => self
                .scope
                .lookup(&name)
                .ok_or_else(|| format!("undefined variable '{name}'")),
            Token::Op('-') => match self.factor()? {
                TemplateValue::Int(i) => i
                    .checked_neg()
                    .map(TemplateValue::Int)
                    .ok_or_else(|| "integer overflow".to_string()),
                TemplateValue::Str(s) => Err(format!("cannot negate '{s}'")),
            },
            Token::Open => {
                let value = self.sum()?;
                match self.tokens.get(self.pos) {
                    Some(Token::Close) => {
                        self.pos += 1;
                        Ok(value)
                    }
                    _ => Err("missing ')'".to_string()),
                }
            }
            other => Err(format!("unexpected token {other:?}")),
        }
    }
}

fn apply(op: char, left: TemplateValue, right: TemplateValue) -> Result<TemplateValue, String> {
    use TemplateValue::{Int, Str};

    let overflow = || "integer overflow".to_string();
    match (op, left, right) {
        ('+', Int(a), Int(b)) => a.checked_add(b).map(Int).ok_or_else(overflow),
        ('-', Int(a), Int(b)) => a.checked_sub(b).map(Int).ok_or_else(overflow),
        ('*', Int(a), Int(b)) => a.checked_mul(b).map(Int).ok_or_else(overflow),
        ('+', a, b) => Ok(Str(format!("{a}{b}"))),
        (op, a, b) => Err(format!("cannot apply '{op}' to '{a}' and '{b}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(source: &str) -> String {
        render(source, &TemplateContext::new()).unwrap()
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(expand("id: 1\nname: plain\n"), "id: 1\nname: plain\n");
    }

    #[test]
    fn test_output_expressions() {
        assert_eq!(expand("<%= 1 + 2 * 3 %>"), "7");
        assert_eq!(expand("<%= (1 + 2) * 3 %>"), "9");
        assert_eq!(expand("<%= 'guy_' + 4 %>"), "guy_4");
        assert_eq!(expand("<%= -5 + 2 %>"), "-3");
    }

    #[test]
    fn test_loop_repeats_body() {
        let source = "<% for i in 1..3 -%>\nfix_<%= i %>:\n  id: <%= i %>\n<% end -%>\n";
        assert_eq!(
            expand(source),
            "fix_1:\n  id: 1\nfix_2:\n  id: 2\nfix_3:\n  id: 3\n"
        );
    }

    #[test]
    fn test_exclusive_range_and_each_syntax() {
        assert_eq!(expand("<% for i in 0...3 %><%= i %><% end %>"), "012");
        assert_eq!(expand("<% (1..2).each do |n| %>[<%= n %>]<% end %>"), "[1][2]");
    }

    #[test]
    fn test_nested_loops_shadow_outer() {
        let out = expand("<% for i in 1..2 %><% for j in 1..2 %><%= i * 10 + j %>,<% end %><% end %>");
        assert_eq!(out, "11,12,21,22,");
    }

    #[test]
    fn test_without_trim_keeps_newline() {
        assert_eq!(expand("<% for i in 1..1 %>\nx\n<% end %>\n"), "\nx\n\n");
    }

    #[test]
    fn test_comment_and_escape() {
        assert_eq!(expand("a<%# ignored %>b<%% c"), "ab<% c");
    }

    #[test]
    fn test_context_variables() {
        let ctx = TemplateContext::new().with_var("count", 2i64).with_var("prefix", "site");
        let out = render("<% for i in 1..count %><%= prefix + i %> <% end %>", &ctx).unwrap();
        assert_eq!(out, "site1 site2 ");
    }

    #[test]
    fn test_today_builtin() {
        let out = expand("<%= today %>");
        assert!(chrono::NaiveDate::parse_from_str(&out, "%Y-%m-%d").is_ok());
    }

    #[test]
    fn test_errors_report_line() {
        let ctx = TemplateContext::new();
        let err = render("a\nb\n<%= missing %>", &ctx).unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("undefined variable 'missing'"));

        let err = render("<% for i in 1..2 %>\nno end", &ctx).unwrap_err();
        assert_eq!(err.line, 1);

        assert!(render("<% end %>", &ctx).is_err());
        assert!(render("<%= 1 ", &ctx).is_err());
        assert!(render("<% system('rm -rf /') %>", &ctx).is_err());
    }

    #[test]
    fn test_huge_loop_rejected() {
        let err = render("<% for i in 0..10000000 %>x<% end %>", &TemplateContext::new()).unwrap_err();
        assert!(err.message.contains("exceeds"));
    }

    #[test]
    fn test_exclusive_range_ending_at_minimum_is_empty() {
        let ctx = TemplateContext::new();
        let out = render("a<% for i in 0...(0 - 9223372036854775807 - 1) %>x<% end %>b", &ctx);
        assert_eq!(out.unwrap(), "ab");
    }

    #[test]
    fn test_nested_loops_share_iteration_budget() {
        let source = "<% for i in 1..1000 %><% for j in 1..1000 %><% for k in 1..1000 %>\
                      <% end %><% end %><% end %>";
        let err = render(source, &TemplateContext::new()).unwrap_err();
        assert!(err.message.contains("in total"));
    }
}
