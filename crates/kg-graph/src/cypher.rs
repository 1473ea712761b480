//! Parser for the Cypher subset understood by the in-memory store.
//!
//! Supported shape:
//!
//! ```text
//! MATCH <path> [, <path>]* [WHERE <cond> [AND <cond>]*]
//!   ( RETURN [DISTINCT] <item> [AS alias] [, ...] [LIMIT n]
//!   | [DETACH] DELETE var [, var]* )
//! ```
//!
//! Paths are node patterns `(v:Label {key: 'value'})` joined by `-[r:TYPE|OTHER]->`,
//! `<-[...]-` or `-[...]-`. Return items are `v`, `v.prop`, `count(v)`, `count(*)`,
//! `labels(v)`, `type(r)`, `properties(v)` and `keys(v)`. Anything else is a syntax error.

use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CypherError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("unsupported clause: {0}")]
    Unsupported(String),
    #[error("variable `{0}` not defined")]
    UndefinedVariable(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Colon,
    Comma,
    Dot,
    Dash,
    Arrow,
    LArrow,
    Eq,
    Neq,
    Star,
    Pipe,
    Ident(String),
    Str(String),
    Int(i64),
}

fn tokenize(input: &str) -> Result<Vec<Token>, CypherError> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            ';' if chars[i + 1..].iter().all(|c| c.is_whitespace()) => break,
            '(' => {
                out.push(Token::LParen);
                i += 1;
            }
            ')' => {
                out.push(Token::RParen);
                i += 1;
            }
            '[' => {
                out.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                out.push(Token::RBracket);
                i += 1;
            }
            '{' => {
                out.push(Token::LBrace);
                i += 1;
            }
            '}' => {
                out.push(Token::RBrace);
                i += 1;
            }
            ':' => {
                out.push(Token::Colon);
                i += 1;
            }
            ',' => {
                out.push(Token::Comma);
                i += 1;
            }
            '.' => {
                out.push(Token::Dot);
                i += 1;
            }
            '*' => {
                out.push(Token::Star);
                i += 1;
            }
            '|' => {
                out.push(Token::Pipe);
                i += 1;
            }
            '=' => {
                out.push(Token::Eq);
                i += 1;
            }
            '-' if chars.get(i + 1) == Some(&'>') => {
                out.push(Token::Arrow);
                i += 2;
            }
            '-' => {
                out.push(Token::Dash);
                i += 1;
            }
            '<' if chars.get(i + 1) == Some(&'-') => {
                out.push(Token::LArrow);
                i += 2;
            }
            '<' if chars.get(i + 1) == Some(&'>') => {
                out.push(Token::Neq);
                i += 2;
            }
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(CypherError::Syntax("unterminated string".to_string()))
                        }
                        Some('\\') => {
                            if let Some(next) = chars.get(i + 1) {
                                s.push(*next);
                            }
                            i += 2;
                        }
                        Some(ch) if *ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            s.push(*ch);
                            i += 1;
                        }
                    }
                }
                out.push(Token::Str(s));
            }
            '`' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|ch| *ch == '`')
                    .ok_or_else(|| CypherError::Syntax("unterminated identifier".to_string()))?;
                out.push(Token::Ident(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<i64>()
                    .map_err(|e| CypherError::Syntax(format!("invalid number {}: {}", text, e)))?;
                out.push(Token::Int(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                out.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(CypherError::Syntax(format!(
                    "unexpected character '{}'",
                    other
                )))
            }
        }
    }
    Ok(out)
}

/// Parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub patterns: Vec<PathPattern>,
    pub conditions: Vec<Condition>,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Return {
        distinct: bool,
        items: Vec<ReturnItem>,
        limit: Option<usize>,
    },
    Delete {
        detach: bool,
        variables: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathPattern {
    pub start: NodePattern,
    pub hops: Vec<(RelPattern, NodePattern)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodePattern {
    pub variable: Option<String>,
    pub label: Option<String>,
    pub properties: Vec<(String, Value)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Either,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelPattern {
    pub variable: Option<String>,
    /// Accepted types; empty accepts any.
    pub kinds: Vec<String>,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Neq,
    Contains,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub variable: String,
    pub property: String,
    pub op: Comparison,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Variable(String),
    Property(String, String),
    /// `count(v)`; `None` is `count(*)`.
    Count(Option<String>),
    Labels(String),
    Type(String),
    Properties(String),
    Keys(String),
}

impl Expr {
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Expr::Count(_))
    }

    fn variable(&self) -> Option<&str> {
        match self {
            Expr::Variable(v)
            | Expr::Property(v, _)
            | Expr::Labels(v)
            | Expr::Type(v)
            | Expr::Properties(v)
            | Expr::Keys(v) => Some(v),
            Expr::Count(v) => v.as_deref(),
        }
    }

    /// Default column name, as a Cypher server would report it.
    fn column_name(&self) -> String {
        match self {
            Expr::Variable(v) => v.clone(),
            Expr::Property(v, p) => format!("{}.{}", v, p),
            Expr::Count(Some(v)) => format!("count({})", v),
            Expr::Count(None) => "count(*)".to_string(),
            Expr::Labels(v) => format!("labels({})", v),
            Expr::Type(v) => format!("type({})", v),
            Expr::Properties(v) => format!("properties({})", v),
            Expr::Keys(v) => format!("keys({})", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnItem {
    pub expr: Expr,
    /// Output column name (alias or default name).
    pub column: String,
}

/// Parse one statement.
pub fn parse(input: &str) -> Result<Statement, CypherError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(CypherError::Syntax("empty query".to_string()));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let stmt = parser.statement()?;
    if let Some(tok) = parser.peek() {
        return Err(CypherError::Syntax(format!(
            "unexpected trailing input at {:?}",
            tok
        )));
    }
    check_variables(&stmt)?;
    Ok(stmt)
}

fn check_variables(stmt: &Statement) -> Result<(), CypherError> {
    let mut defined: HashSet<&str> = HashSet::new();
    for path in &stmt.patterns {
        if let Some(v) = &path.start.variable {
            defined.insert(v);
        }
        for (rel, node) in &path.hops {
            if let Some(v) = &rel.variable {
                defined.insert(v);
            }
            if let Some(v) = &node.variable {
                defined.insert(v);
            }
        }
    }
    let check = |v: &str| {
        if defined.contains(v) {
            Ok(())
        } else {
            Err(CypherError::UndefinedVariable(v.to_string()))
        }
    };
    for cond in &stmt.conditions {
        check(&cond.variable)?;
    }
    match &stmt.action {
        Action::Return { items, .. } => {
            for item in items {
                if let Some(v) = item.expr.variable() {
                    check(v)?;
                }
            }
        }
        Action::Delete { variables, .. } => {
            for v in variables {
                check(v)?;
            }
        }
    }
    Ok(())
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expect(&mut self, expected: Token) -> Result<(), CypherError> {
        match self.next() {
            Some(ref tok) if *tok == expected => Ok(()),
            Some(tok) => Err(CypherError::Syntax(format!(
                "expected {:?}, found {:?}",
                expected, tok
            ))),
            None => Err(CypherError::Syntax(format!(
                "expected {:?}, found end of input",
                expected
            ))),
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), CypherError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            match self.peek() {
                Some(Token::Ident(s)) => Err(CypherError::Unsupported(s.to_uppercase())),
                other => Err(CypherError::Syntax(format!(
                    "expected {}, found {:?}",
                    keyword, other
                ))),
            }
        }
    }

    fn ident(&mut self) -> Result<String, CypherError> {
        match self.next() {
            Some(Token::Ident(s)) => Ok(s),
            other => Err(CypherError::Syntax(format!(
                "expected identifier, found {:?}",
                other
            ))),
        }
    }

    fn literal(&mut self) -> Result<Value, CypherError> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Value::String(s)),
            Some(Token::Int(n)) => Ok(Value::from(n)),
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("null") => Ok(Value::Null),
            other => Err(CypherError::Syntax(format!(
                "expected literal, found {:?}",
                other
            ))),
        }
    }

    fn statement(&mut self) -> Result<Statement, CypherError> {
        self.expect_keyword("MATCH")?;
        let mut patterns = vec![self.path()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            patterns.push(self.path()?);
        }

        let mut conditions = Vec::new();
        if self.eat_keyword("WHERE") {
            conditions.push(self.condition()?);
            while self.eat_keyword("AND") {
                conditions.push(self.condition()?);
            }
        }

        let action = if self.eat_keyword("RETURN") {
            self.return_clause()?
        } else if self.eat_keyword("DETACH") {
            self.expect_keyword("DELETE")?;
            Action::Delete {
                detach: true,
                variables: self.variable_list()?,
            }
        } else if self.eat_keyword("DELETE") {
            Action::Delete {
                detach: false,
                variables: self.variable_list()?,
            }
        } else {
            match self.peek() {
                Some(Token::Ident(s)) => return Err(CypherError::Unsupported(s.to_uppercase())),
                other => {
                    return Err(CypherError::Syntax(format!(
                        "expected RETURN or DELETE, found {:?}",
                        other
                    )))
                }
            }
        };

        Ok(Statement {
            patterns,
            conditions,
            action,
        })
    }

    fn variable_list(&mut self) -> Result<Vec<String>, CypherError> {
        let mut vars = vec![self.ident()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            vars.push(self.ident()?);
        }
        Ok(vars)
    }

    fn path(&mut self) -> Result<PathPattern, CypherError> {
        let start = self.node()?;
        let mut hops = Vec::new();
        while matches!(self.peek(), Some(Token::Dash) | Some(Token::LArrow)) {
            let rel = self.relationship()?;
            let node = self.node()?;
            hops.push((rel, node));
        }
        Ok(PathPattern { start, hops })
    }

    fn node(&mut self) -> Result<NodePattern, CypherError> {
        self.expect(Token::LParen)?;
        let variable = match self.peek() {
            Some(Token::Ident(_)) => Some(self.ident()?),
            _ => None,
        };
        let label = if self.peek() == Some(&Token::Colon) {
            self.pos += 1;
            Some(self.ident()?)
        } else {
            None
        };
        let properties = if self.peek() == Some(&Token::LBrace) {
            self.property_map()?
        } else {
            Vec::new()
        };
        self.expect(Token::RParen)?;
        Ok(NodePattern {
            variable,
            label,
            properties,
        })
    }

    fn property_map(&mut self) -> Result<Vec<(String, Value)>, CypherError> {
        self.expect(Token::LBrace)?;
        let mut props = Vec::new();
        if self.peek() == Some(&Token::RBrace) {
            self.pos += 1;
            return Ok(props);
        }
        loop {
            let key = self.ident()?;
            self.expect(Token::Colon)?;
            props.push((key, self.literal()?));
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBrace) => break,
                other => {
                    return Err(CypherError::Syntax(format!(
                        "expected ',' or '}}' in property map, found {:?}",
                        other
                    )))
                }
            }
        }
        Ok(props)
    }

    fn relationship(&mut self) -> Result<RelPattern, CypherError> {
        let incoming = match self.next() {
            Some(Token::LArrow) => true,
            Some(Token::Dash) => false,
            other => {
                return Err(CypherError::Syntax(format!(
                    "expected relationship, found {:?}",
                    other
                )))
            }
        };

        let mut variable = None;
        let mut kinds = Vec::new();
        if self.peek() == Some(&Token::LBracket) {
            self.pos += 1;
            if let Some(Token::Ident(_)) = self.peek() {
                variable = Some(self.ident()?);
            }
            if self.peek() == Some(&Token::Colon) {
                self.pos += 1;
                kinds.push(self.ident()?);
                while self.peek() == Some(&Token::Pipe) {
                    self.pos += 1;
                    if self.peek() == Some(&Token::Colon) {
                        self.pos += 1;
                    }
                    kinds.push(self.ident()?);
                }
            }
            if self.peek() == Some(&Token::Star) {
                return Err(CypherError::Unsupported(
                    "variable-length relationship".to_string(),
                ));
            }
            self.expect(Token::RBracket)?;
        }

        let direction = match (incoming, self.next()) {
            (true, Some(Token::Dash)) => Direction::Incoming,
            (false, Some(Token::Arrow)) => Direction::Outgoing,
            (false, Some(Token::Dash)) => Direction::Either,
            (_, other) => {
                return Err(CypherError::Syntax(format!(
                    "malformed relationship pattern near {:?}",
                    other
                )))
            }
        };

        Ok(RelPattern {
            variable,
            kinds,
            direction,
        })
    }

    fn condition(&mut self) -> Result<Condition, CypherError> {
        let variable = self.ident()?;
        self.expect(Token::Dot)?;
        let property = self.ident()?;
        let op = match self.next() {
            Some(Token::Eq) => Comparison::Eq,
            Some(Token::Neq) => Comparison::Neq,
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("CONTAINS") => Comparison::Contains,
            other => {
                return Err(CypherError::Syntax(format!(
                    "unsupported comparison {:?}",
                    other
                )))
            }
        };
        let value = self.literal()?;
        Ok(Condition {
            variable,
            property,
            op,
            value,
        })
    }

    fn return_clause(&mut self) -> Result<Action, CypherError> {
        let distinct = self.eat_keyword("DISTINCT");
        let mut items = vec![self.return_item()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            items.push(self.return_item()?);
        }
        let limit = if self.eat_keyword("LIMIT") {
            match self.next() {
                Some(Token::Int(n)) if n >= 0 => Some(n as usize),
                other => {
                    return Err(CypherError::Syntax(format!(
                        "expected LIMIT count, found {:?}",
                        other
                    )))
                }
            }
        } else {
            None
        };
        Ok(Action::Return {
            distinct,
            items,
            limit,
        })
    }

    fn return_item(&mut self) -> Result<ReturnItem, CypherError> {
        let name = self.ident()?;
        let expr = match self.peek() {
            Some(Token::Dot) => {
                self.pos += 1;
                Expr::Property(name, self.ident()?)
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let expr = match name.to_ascii_lowercase().as_str() {
                    "count" if self.peek() == Some(&Token::Star) => {
                        self.pos += 1;
                        Expr::Count(None)
                    }
                    "count" => Expr::Count(Some(self.ident()?)),
                    "labels" => Expr::Labels(self.ident()?),
                    "type" => Expr::Type(self.ident()?),
                    "properties" => Expr::Properties(self.ident()?),
                    "keys" => Expr::Keys(self.ident()?),
                    other => return Err(CypherError::Unsupported(format!("function {}", other))),
                };
                self.expect(Token::RParen)?;
                expr
            }
            _ => Expr::Variable(name),
        };
        let column = if self.eat_keyword("AS") {
            self.ident()?
        } else {
            expr.column_name()
        };
        Ok(ReturnItem { expr, column })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_path_with_property_filter() {
        let stmt =
            parse("MATCH (p:Person {id: 'John'})-[:TITLE]->(t:Title) RETURN t.id").unwrap();
        assert_eq!(stmt.patterns.len(), 1);
        let path = &stmt.patterns[0];
        assert_eq!(path.start.label.as_deref(), Some("Person"));
        assert_eq!(
            path.start.properties,
            vec![("id".to_string(), Value::String("John".to_string()))]
        );
        assert_eq!(path.hops[0].0.kinds, vec!["TITLE".to_string()]);
        assert_eq!(path.hops[0].0.direction, Direction::Outgoing);
        match &stmt.action {
            Action::Return { items, .. } => assert_eq!(items[0].column, "t.id"),
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn parses_detach_delete() {
        let stmt = parse("MATCH (n) DETACH DELETE n").unwrap();
        assert_eq!(
            stmt.action,
            Action::Delete {
                detach: true,
                variables: vec!["n".to_string()]
            }
        );
    }

    #[test]
    fn parses_aliases_and_functions() {
        let stmt = parse("MATCH (n)-[r]-(m) RETURN count(n) AS node_count, type(r), labels(m) LIMIT 5")
            .unwrap();
        match stmt.action {
            Action::Return { items, limit, .. } => {
                assert_eq!(items[0].column, "node_count");
                assert_eq!(items[1].column, "type(r)");
                assert_eq!(items[2].column, "labels(m)");
                assert_eq!(limit, Some(5));
            }
            other => panic!("unexpected action {:?}", other),
        }
        assert_eq!(stmt.patterns[0].hops[0].0.direction, Direction::Either);
    }

    #[test]
    fn parses_incoming_and_alternative_types() {
        let stmt = parse("MATCH (t:Title)<-[:TITLE|GROUP]-(p) RETURN p.id").unwrap();
        let rel = &stmt.patterns[0].hops[0].0;
        assert_eq!(rel.direction, Direction::Incoming);
        assert_eq!(rel.kinds, vec!["TITLE".to_string(), "GROUP".to_string()]);
    }

    #[test]
    fn rejects_unknown_variables_and_clauses() {
        assert_eq!(
            parse("MATCH (p:Person) RETURN q.id"),
            Err(CypherError::UndefinedVariable("q".to_string()))
        );
        assert!(matches!(
            parse("MATCH (p:Person) RETURN p.id ORDER BY p.id"),
            Err(CypherError::Syntax(_))
        ));
        assert!(matches!(
            parse("CREATE (p:Person)"),
            Err(CypherError::Unsupported(_))
        ));
        assert!(matches!(
            parse("This is not a query"),
            Err(CypherError::Unsupported(_))
        ));
    }
}
