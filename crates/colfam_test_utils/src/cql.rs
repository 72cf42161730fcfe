//! Parser for the CQL subset the mapper emits.
//!
//! Values only ever arrive as bound `?` placeholders, except inside table
//! options and replication maps, which are literals.

use colfam_model::{ClusteringOrder, IndexKind, IndexTarget};
use colfam_protocol::{ColumnType, Value};
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ParseError(pub String);

type Result<T> = std::result::Result<T, ParseError>;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Bare identifier or keyword, case-folded
    Word(String),
    /// Double-quoted identifier, case preserved
    Quoted(String),
    Str(String),
    Number(String),
    Symbol(char),
    Placeholder,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '"' | '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some(q) if q == c => {
                            if chars.peek() == Some(&c) {
                                chars.next();
                                text.push(c);
                            } else {
                                break;
                            }
                        }
                        Some(other) => text.push(other),
                        None => return Err(ParseError(format!("unterminated {} literal", c))),
                    }
                }
                tokens.push(if c == '"' { Token::Quoted(text) } else { Token::Str(text) });
            }
            '?' => {
                chars.next();
                tokens.push(Token::Placeholder);
            }
            c if c.is_ascii_digit() || (c == '-' && matches!(tokens.last(), Some(Token::Symbol('=' | ':' | ',')))) => {
                let mut text = String::new();
                text.push(c);
                chars.next();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '.' {
                        text.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Number(text));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut text = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        text.push(d.to_ascii_lowercase());
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(text));
            }
            '(' | ')' | ',' | '=' | '+' | '-' | '*' | '.' | '<' | '>' | '[' | ']' | '{' | '}' | ':' | ';' => {
                chars.next();
                tokens.push(Token::Symbol(c));
            }
            other => return Err(ParseError(format!("unexpected character '{}'", other))),
        }
    }
    Ok(tokens)
}

/// Keyspace-qualified table reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedName {
    pub keyspace: String,
    pub name: String,
}

/// Literal in an option or replication map.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    Number(String),
    Map(BTreeMap<String, String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetClause {
    Set(String, Value),
    Add(String, Value),
    Subtract(String, Value),
    Prepend(String, Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteClause {
    Column(String),
    MapKey(String, Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cql {
    CreateKeyspace {
        name: String,
        replication: BTreeMap<String, String>,
    },
    DropKeyspace {
        name: String,
    },
    CreateTable {
        table: QualifiedName,
        columns: Vec<ColumnDef>,
        partition: Vec<String>,
        clustering: Vec<String>,
        orders: BTreeMap<String, ClusteringOrder>,
        options: Vec<(String, Literal)>,
    },
    AlterAdd {
        table: QualifiedName,
        column: ColumnDef,
    },
    AlterOptions {
        table: QualifiedName,
        options: Vec<(String, Literal)>,
    },
    CreateIndex {
        table: QualifiedName,
        name: String,
        target: IndexTarget,
    },
    DropTable {
        table: QualifiedName,
    },
    Insert {
        table: QualifiedName,
        values: Vec<(String, Value)>,
        if_not_exists: bool,
        ttl: Option<u32>,
        timestamp: Option<i64>,
    },
    Update {
        table: QualifiedName,
        clauses: Vec<SetClause>,
        predicate: Vec<(String, Value)>,
        ttl: Option<u32>,
        timestamp: Option<i64>,
    },
    Delete {
        table: QualifiedName,
        targets: Vec<DeleteClause>,
        predicate: Vec<(String, Value)>,
        timestamp: Option<i64>,
    },
    Select {
        table: QualifiedName,
        predicate: Vec<(String, Value)>,
        limit: Option<usize>,
    },
    /// Writes applied together; `timestamp` is the batch-level one
    Batch {
        statements: Vec<Cql>,
        timestamp: Option<i64>,
    },
}

/// Parse one statement, consuming `values` for its placeholders.
pub fn parse(query: &str, values: &[Value]) -> Result<Cql> {
    let mut parser = Parser {
        tokens: tokenize(query)?.into(),
        values: values.iter().cloned().collect(),
    };
    let statement = parser.statement()?;
    parser.accept_symbol(';');
    if let Some(token) = parser.tokens.front() {
        return Err(ParseError(format!("unexpected trailing {:?}", token)));
    }
    if !parser.values.is_empty() {
        return Err(ParseError(format!("{} unused bound values", parser.values.len())));
    }
    Ok(statement)
}

fn member_timestamp(statement: &Cql) -> Option<i64> {
    match statement {
        Cql::Insert { timestamp, .. } | Cql::Update { timestamp, .. } | Cql::Delete { timestamp, .. } => *timestamp,
        _ => None,
    }
}

struct Parser {
    tokens: VecDeque<Token>,
    values: VecDeque<Value>,
}

impl Parser {
    fn statement(&mut self) -> Result<Cql> {
        match self.word()?.as_str() {
            "create" => match self.word()?.as_str() {
                "keyspace" => self.create_keyspace(),
                "table" => self.create_table(),
                "index" => self.create_index(),
                other => Err(ParseError(format!("unsupported CREATE {}", other))),
            },
            "drop" => match self.word()?.as_str() {
                "keyspace" => {
                    self.if_exists()?;
                    Ok(Cql::DropKeyspace {
                        name: self.identifier()?,
                    })
                }
                "table" => {
                    self.if_exists()?;
                    Ok(Cql::DropTable {
                        table: self.qualified_name()?,
                    })
                }
                other => Err(ParseError(format!("unsupported DROP {}", other))),
            },
            "alter" => {
                self.expect_word("table")?;
                let table = self.qualified_name()?;
                match self.word()?.as_str() {
                    "add" => Ok(Cql::AlterAdd {
                        table,
                        column: self.column_def()?,
                    }),
                    "with" => Ok(Cql::AlterOptions {
                        table,
                        options: self.options()?,
                    }),
                    other => Err(ParseError(format!("unsupported ALTER TABLE ... {}", other))),
                }
            }
            "insert" => self.insert(),
            "update" => self.update(),
            "delete" => self.delete(),
            "select" => self.select(),
            "begin" => self.batch(),
            other => Err(ParseError(format!("unsupported statement '{}'", other))),
        }
    }

    fn batch(&mut self) -> Result<Cql> {
        if !self.accept_word("unlogged") {
            self.accept_word("counter");
        }
        self.expect_word("batch")?;
        let (ttl, timestamp) = self.using()?;
        if ttl.is_some() {
            return Err(ParseError("a batch does not accept a TTL".into()));
        }

        let mut statements = Vec::new();
        while !self.accept_word("apply") {
            let member = match self.word()?.as_str() {
                "insert" => self.insert()?,
                "update" => self.update()?,
                "delete" => self.delete()?,
                other => return Err(ParseError(format!("'{}' is not allowed in a batch", other))),
            };
            if timestamp.is_some() && member_timestamp(&member).is_some() {
                return Err(ParseError(
                    "timestamp must be set either on the batch or on its statements".into(),
                ));
            }
            statements.push(member);
            self.accept_symbol(';');
        }
        self.expect_word("batch")?;
        Ok(Cql::Batch { statements, timestamp })
    }

    fn create_keyspace(&mut self) -> Result<Cql> {
        self.if_not_exists()?;
        let name = self.identifier()?;
        self.expect_word("with")?;
        self.expect_word("replication")?;
        self.expect_symbol('=')?;
        let replication = match self.literal()? {
            Literal::Map(map) => map,
            other => return Err(ParseError(format!("expected replication map, got {:?}", other))),
        };
        if self.accept_word("and") {
            self.expect_word("durable_writes")?;
            self.expect_symbol('=')?;
            self.word()?;
        }
        Ok(Cql::CreateKeyspace { name, replication })
    }

    fn create_table(&mut self) -> Result<Cql> {
        self.if_not_exists()?;
        let table = self.qualified_name()?;
        self.expect_symbol('(')?;

        let mut columns = Vec::new();
        let mut partition = Vec::new();
        let mut clustering = Vec::new();
        loop {
            if self.accept_word("primary") {
                self.expect_word("key")?;
                self.expect_symbol('(')?;
                if self.accept_symbol('(') {
                    partition = self.identifier_list()?;
                    self.expect_symbol(')')?;
                } else {
                    partition.push(self.identifier()?);
                }
                while self.accept_symbol(',') {
                    clustering.push(self.identifier()?);
                }
                self.expect_symbol(')')?;
            } else {
                columns.push(self.column_def()?);
            }
            if !self.accept_symbol(',') {
                break;
            }
        }
        self.expect_symbol(')')?;

        let mut orders = BTreeMap::new();
        let mut options = Vec::new();
        if self.accept_word("with") {
            loop {
                if self.accept_word("clustering") {
                    self.expect_word("order")?;
                    self.expect_word("by")?;
                    self.expect_symbol('(')?;
                    loop {
                        let column = self.identifier()?;
                        let order = match self.word()?.as_str() {
                            "asc" => ClusteringOrder::Asc,
                            "desc" => ClusteringOrder::Desc,
                            other => return Err(ParseError(format!("bad clustering order '{}'", other))),
                        };
                        orders.insert(column, order);
                        if !self.accept_symbol(',') {
                            break;
                        }
                    }
                    self.expect_symbol(')')?;
                } else {
                    options.push(self.option()?);
                }
                if !self.accept_word("and") {
                    break;
                }
            }
        }

        Ok(Cql::CreateTable {
            table,
            columns,
            partition,
            clustering,
            orders,
            options,
        })
    }

    fn create_index(&mut self) -> Result<Cql> {
        self.if_not_exists()?;
        let name = self.identifier()?;
        self.expect_word("on")?;
        let table = self.qualified_name()?;
        self.expect_symbol('(')?;
        let target = match self.tokens.pop_front() {
            Some(Token::Word(kind)) if self.peek_symbol('(') => {
                self.expect_symbol('(')?;
                let column = self.identifier()?;
                self.expect_symbol(')')?;
                let kind: IndexKind = kind.parse().map_err(|e| ParseError(format!("{}", e)))?;
                IndexTarget::new(column, kind)
            }
            Some(Token::Word(column)) | Some(Token::Quoted(column)) => IndexTarget::new(column, IndexKind::Simple),
            other => return Err(ParseError(format!("expected index target, got {:?}", other))),
        };
        self.expect_symbol(')')?;
        Ok(Cql::CreateIndex { table, name, target })
    }

    fn insert(&mut self) -> Result<Cql> {
        self.expect_word("into")?;
        let table = self.qualified_name()?;
        self.expect_symbol('(')?;
        let columns = self.identifier_list()?;
        self.expect_symbol(')')?;
        self.expect_word("values")?;
        self.expect_symbol('(')?;
        let mut values = Vec::new();
        for column in columns {
            if !values.is_empty() {
                self.expect_symbol(',')?;
            }
            values.push((column, self.bound()?));
        }
        self.expect_symbol(')')?;
        let if_not_exists = if self.accept_word("if") {
            self.expect_word("not")?;
            self.expect_word("exists")?;
            true
        } else {
            false
        };
        let (ttl, timestamp) = self.using()?;
        Ok(Cql::Insert {
            table,
            values,
            if_not_exists,
            ttl,
            timestamp,
        })
    }

    fn update(&mut self) -> Result<Cql> {
        let table = self.qualified_name()?;
        let (ttl, timestamp) = self.using()?;
        self.expect_word("set")?;
        let mut clauses = Vec::new();
        loop {
            let column = self.identifier()?;
            self.expect_symbol('=')?;
            let clause = if self.peek_placeholder() {
                let value = self.bound()?;
                if self.accept_symbol('+') {
                    self.expect_identifier(&column)?;
                    SetClause::Prepend(column, value)
                } else {
                    SetClause::Set(column, value)
                }
            } else {
                self.expect_identifier(&column)?;
                if self.accept_symbol('+') {
                    SetClause::Add(column, self.bound()?)
                } else {
                    self.expect_symbol('-')?;
                    SetClause::Subtract(column, self.bound()?)
                }
            };
            clauses.push(clause);
            if !self.accept_symbol(',') {
                break;
            }
        }
        let predicate = self.where_clause()?;
        Ok(Cql::Update {
            table,
            clauses,
            predicate,
            ttl,
            timestamp,
        })
    }

    fn delete(&mut self) -> Result<Cql> {
        let mut targets = Vec::new();
        if !self.accept_word("from") {
            loop {
                let column = self.identifier()?;
                if self.accept_symbol('[') {
                    let key = self.bound()?;
                    self.expect_symbol(']')?;
                    targets.push(DeleteClause::MapKey(column, key));
                } else {
                    targets.push(DeleteClause::Column(column));
                }
                if !self.accept_symbol(',') {
                    break;
                }
            }
            self.expect_word("from")?;
        }
        let table = self.qualified_name()?;
        let (ttl, timestamp) = self.using()?;
        if ttl.is_some() {
            return Err(ParseError("DELETE does not accept a TTL".into()));
        }
        let predicate = self.where_clause()?;
        Ok(Cql::Delete {
            table,
            targets,
            predicate,
            timestamp,
        })
    }

    fn select(&mut self) -> Result<Cql> {
        self.expect_symbol('*')?;
        self.expect_word("from")?;
        let table = self.qualified_name()?;
        let predicate = if self.peek_word("where") {
            self.where_clause()?
        } else {
            Vec::new()
        };
        let limit = if self.accept_word("limit") {
            match self.tokens.pop_front() {
                Some(Token::Number(n)) => Some(n.parse().map_err(|_| ParseError(format!("bad limit '{}'", n)))?),
                other => return Err(ParseError(format!("expected limit, got {:?}", other))),
            }
        } else {
            None
        };
        Ok(Cql::Select { table, predicate, limit })
    }

    fn where_clause(&mut self) -> Result<Vec<(String, Value)>> {
        self.expect_word("where")?;
        let mut terms = Vec::new();
        loop {
            let column = self.identifier()?;
            self.expect_symbol('=')?;
            terms.push((column, self.bound()?));
            if !self.accept_word("and") {
                break;
            }
        }
        Ok(terms)
    }

    /// `USING TTL n AND TIMESTAMP t`.
    fn using(&mut self) -> Result<(Option<u32>, Option<i64>)> {
        if !self.accept_word("using") {
            return Ok((None, None));
        }
        let mut ttl = None;
        let mut timestamp = None;
        loop {
            let kind = self.word()?;
            let number = match self.tokens.pop_front() {
                Some(Token::Number(n)) => n,
                other => return Err(ParseError(format!("expected number after {}, got {:?}", kind, other))),
            };
            match kind.as_str() {
                "ttl" => {
                    ttl = Some(number.parse().map_err(|_| ParseError(format!("bad ttl '{}'", number)))?)
                }
                "timestamp" => {
                    timestamp = Some(
                        number
                            .parse()
                            .map_err(|_| ParseError(format!("bad timestamp '{}'", number)))?,
                    )
                }
                other => return Err(ParseError(format!("unexpected USING {}", other))),
            }
            if !self.accept_word("and") {
                break;
            }
        }
        Ok((ttl, timestamp))
    }

    fn column_def(&mut self) -> Result<ColumnDef> {
        let name = self.identifier()?;
        let mut type_text = String::new();
        let mut depth = 0usize;
        loop {
            match self.tokens.front() {
                Some(Token::Word(w)) if depth == 0 && w == "static" => break,
                Some(Token::Symbol(',')) | Some(Token::Symbol(')')) if depth == 0 => break,
                None => break,
                _ => {}
            }
            match self.tokens.pop_front() {
                Some(Token::Word(w)) => type_text.push_str(&w),
                Some(Token::Symbol(c)) => {
                    match c {
                        '<' => depth += 1,
                        '>' => depth = depth.saturating_sub(1),
                        _ => {}
                    }
                    type_text.push(c);
                }
                other => return Err(ParseError(format!("unexpected {:?} in type of '{}'", other, name))),
            }
        }
        let column_type: ColumnType = type_text
            .parse()
            .map_err(|e| ParseError(format!("bad type for '{}': {}", name, e)))?;
        let is_static = self.accept_word("static");
        Ok(ColumnDef {
            name,
            column_type,
            is_static,
        })
    }

    fn options(&mut self) -> Result<Vec<(String, Literal)>> {
        let mut options = vec![self.option()?];
        while self.accept_word("and") {
            options.push(self.option()?);
        }
        Ok(options)
    }

    fn option(&mut self) -> Result<(String, Literal)> {
        let name = self.word()?;
        self.expect_symbol('=')?;
        Ok((name, self.literal()?))
    }

    fn literal(&mut self) -> Result<Literal> {
        match self.tokens.pop_front() {
            Some(Token::Str(s)) => Ok(Literal::Text(s)),
            Some(Token::Number(n)) => Ok(Literal::Number(n)),
            Some(Token::Word(w)) => Ok(Literal::Text(w)),
            Some(Token::Symbol('{')) => {
                let mut map = BTreeMap::new();
                if self.accept_symbol('}') {
                    return Ok(Literal::Map(map));
                }
                loop {
                    let key = match self.literal()? {
                        Literal::Text(s) | Literal::Number(s) => s,
                        Literal::Map(_) => return Err(ParseError("map keys must be scalars".into())),
                    };
                    self.expect_symbol(':')?;
                    let value = match self.literal()? {
                        Literal::Text(s) | Literal::Number(s) => s,
                        Literal::Map(_) => return Err(ParseError("nested maps are not supported".into())),
                    };
                    map.insert(key, value);
                    if !self.accept_symbol(',') {
                        break;
                    }
                }
                self.expect_symbol('}')?;
                Ok(Literal::Map(map))
            }
            other => Err(ParseError(format!("expected literal, got {:?}", other))),
        }
    }

    fn bound(&mut self) -> Result<Value> {
        match self.tokens.pop_front() {
            Some(Token::Placeholder) => self
                .values
                .pop_front()
                .ok_or_else(|| ParseError("not enough bound values".into())),
            other => Err(ParseError(format!("expected placeholder, got {:?}", other))),
        }
    }

    fn qualified_name(&mut self) -> Result<QualifiedName> {
        let keyspace = self.identifier()?;
        self.expect_symbol('.')?;
        let name = self.identifier()?;
        Ok(QualifiedName { keyspace, name })
    }

    fn identifier_list(&mut self) -> Result<Vec<String>> {
        let mut names = vec![self.identifier()?];
        while self.accept_symbol(',') {
            names.push(self.identifier()?);
        }
        Ok(names)
    }

    fn identifier(&mut self) -> Result<String> {
        match self.tokens.pop_front() {
            Some(Token::Word(w)) | Some(Token::Quoted(w)) => Ok(w),
            other => Err(ParseError(format!("expected identifier, got {:?}", other))),
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> Result<()> {
        let found = self.identifier()?;
        if found != expected {
            return Err(ParseError(format!("expected column '{}', got '{}'", expected, found)));
        }
        Ok(())
    }

    fn word(&mut self) -> Result<String> {
        match self.tokens.pop_front() {
            Some(Token::Word(w)) => Ok(w),
            other => Err(ParseError(format!("expected keyword, got {:?}", other))),
        }
    }

    fn expect_word(&mut self, expected: &str) -> Result<()> {
        let found = self.word()?;
        if found != expected {
            return Err(ParseError(format!("expected '{}', got '{}'", expected, found)));
        }
        Ok(())
    }

    fn accept_word(&mut self, expected: &str) -> bool {
        if self.peek_word(expected) {
            self.tokens.pop_front();
            true
        } else {
            false
        }
    }

    fn peek_word(&self, expected: &str) -> bool {
        matches!(self.tokens.front(), Some(Token::Word(w)) if w == expected)
    }

    fn if_not_exists(&mut self) -> Result<()> {
        if self.accept_word("if") {
            self.expect_word("not")?;
            self.expect_word("exists")?;
        }
        Ok(())
    }

    fn if_exists(&mut self) -> Result<()> {
        if self.accept_word("if") {
            self.expect_word("exists")?;
        }
        Ok(())
    }

    fn expect_symbol(&mut self, expected: char) -> Result<()> {
        match self.tokens.pop_front() {
            Some(Token::Symbol(c)) if c == expected => Ok(()),
            other => Err(ParseError(format!("expected '{}', got {:?}", expected, other))),
        }
    }

    fn accept_symbol(&mut self, expected: char) -> bool {
        if self.peek_symbol(expected) {
            self.tokens.pop_front();
            true
        } else {
            false
        }
    }

    fn peek_symbol(&self, expected: char) -> bool {
        matches!(self.tokens.front(), Some(Token::Symbol(c)) if *c == expected)
    }

    fn peek_placeholder(&self) -> bool {
        matches!(self.tokens.front(), Some(Token::Placeholder))
    }
}
