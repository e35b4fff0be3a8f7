// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Recursive-descent parser for the query language
//!
//! Expressions use standard precedence climbing. The parser reports the
//! first problem it finds, naming the offending token and the expected
//! construct, with the token's line/column position.

use super::ast::*;
use super::lexer::{tokenize, Token, TokenKind};
use crate::catalog::{ConstraintKind, ScalarType};
use crate::error::{GrafitoError, Result};
use crate::storage::EntityKind;
use log::debug;

/// Parse a single statement
pub fn parse_statement(input: &str) -> Result<Statement> {
    let tokens = tokenize(input)?;
    let mut parser = Parser::new(tokens);
    let statement = parser.statement()?;
    // Trailing semicolons are permitted on single statements.
    while parser.at(TokenKind::Semicolon) {
        parser.advance();
    }
    parser.expect(TokenKind::Eof, "end of statement")?;
    debug!("parsed statement: {statement:?}");
    Ok(statement)
}

/// Parse a script of semicolon-separated statements
pub fn parse_script(input: &str) -> Result<Vec<Statement>> {
    let tokens = tokenize(input)?;
    let mut parser = Parser::new(tokens);
    let mut statements = Vec::new();
    loop {
        while parser.at(TokenKind::Semicolon) {
            parser.advance();
        }
        if parser.at(TokenKind::Eof) {
            break;
        }
        statements.push(parser.statement()?);
        if !parser.at(TokenKind::Semicolon) && !parser.at(TokenKind::Eof) {
            return Err(parser.unexpected("';' between statements"));
        }
    }
    Ok(statements)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> TokenKind {
        self.current().kind
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    fn peek_kind(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, expected: &str) -> GrafitoError {
        let token = self.current();
        let found = if token.kind == TokenKind::Eof {
            "end of input".to_string()
        } else {
            format!("'{}'", token.text)
        };
        GrafitoError::parse(
            token.pos.line,
            token.pos.column,
            format!("expected {expected}, found {found}"),
        )
    }

    /// A name position: identifiers, and keywords used as names
    /// (`n.type`, `:Order`, …)
    fn name(&mut self, what: &str) -> Result<String> {
        let token = self.current().clone();
        let is_wordlike = token.kind == TokenKind::Identifier
            || (!token.text.is_empty()
                && token
                    .text
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_'));
        if is_wordlike && token.kind != TokenKind::Eof {
            self.advance();
            Ok(token.text)
        } else {
            Err(self.unexpected(what))
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn statement(&mut self) -> Result<Statement> {
        match self.kind() {
            TokenKind::Show => self.show_statement(),
            TokenKind::Drop => self.drop_statement(),
            TokenKind::Create
                if matches!(
                    self.peek_kind(1),
                    TokenKind::Index | TokenKind::Constraint | TokenKind::Unique
                ) =>
            {
                self.ddl_create_statement()
            }
            _ => Ok(Statement::Query(self.query()?)),
        }
    }

    fn show_statement(&mut self) -> Result<Statement> {
        self.expect(TokenKind::Show, "SHOW")?;
        match self.kind() {
            TokenKind::Indexes | TokenKind::Index => {
                self.advance();
                Ok(Statement::ShowIndexes)
            }
            TokenKind::Constraints | TokenKind::Constraint => {
                self.advance();
                Ok(Statement::ShowConstraints)
            }
            _ => Err(self.unexpected("INDEXES or CONSTRAINTS")),
        }
    }

    fn drop_statement(&mut self) -> Result<Statement> {
        self.expect(TokenKind::Drop, "DROP")?;
        match self.kind() {
            TokenKind::Index => {
                self.advance();
                let name = self.name("index name")?;
                let if_exists = self.if_exists()?;
                Ok(Statement::DropIndex { name, if_exists })
            }
            TokenKind::Constraint => {
                self.advance();
                let name = self.name("constraint name")?;
                let if_exists = self.if_exists()?;
                Ok(Statement::DropConstraint { name, if_exists })
            }
            _ => Err(self.unexpected("INDEX or CONSTRAINT")),
        }
    }

    fn if_exists(&mut self) -> Result<bool> {
        if self.eat(TokenKind::If) {
            self.expect(TokenKind::Exists, "EXISTS")?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn if_not_exists(&mut self) -> Result<bool> {
        if self.eat(TokenKind::If) {
            self.expect(TokenKind::Not, "NOT")?;
            self.expect(TokenKind::Exists, "EXISTS")?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// `CREATE [UNIQUE] INDEX …` / `CREATE CONSTRAINT …`
    fn ddl_create_statement(&mut self) -> Result<Statement> {
        self.expect(TokenKind::Create, "CREATE")?;
        let unique = self.eat(TokenKind::Unique);
        if unique || self.at(TokenKind::Index) {
            self.expect(TokenKind::Index, "INDEX")?;
            let name = if self.at(TokenKind::Identifier) {
                Some(self.name("index name")?)
            } else {
                None
            };
            let if_not_exists = self.if_not_exists()?;
            self.expect(TokenKind::For, "FOR")?;
            let (entity, variable, label_or_type) = self.ddl_entity_pattern()?;
            self.expect(TokenKind::On, "ON")?;
            let property = self.ddl_property(&variable)?;
            Ok(Statement::CreateIndex {
                name,
                entity,
                label_or_type,
                property,
                unique,
                if_not_exists,
            })
        } else {
            self.expect(TokenKind::Constraint, "CONSTRAINT")?;
            let name = if self.at(TokenKind::Identifier) {
                Some(self.name("constraint name")?)
            } else {
                None
            };
            let if_not_exists = self.if_not_exists()?;
            self.expect(TokenKind::For, "FOR")?;
            let (entity, variable, label_or_type) = self.ddl_entity_pattern()?;
            self.expect(TokenKind::Require, "REQUIRE")?;
            let bound = self.name("variable")?;
            if bound != variable {
                return Err(self.unexpected(&format!("variable '{variable}'")));
            }
            self.expect(TokenKind::Dot, "'.'")?;
            let property = self.name("property name")?;
            self.expect(TokenKind::Is, "IS")?;
            let (kind, value_type) = match self.kind() {
                TokenKind::Unique => {
                    self.advance();
                    (ConstraintKind::Uniqueness, None)
                }
                TokenKind::Not => {
                    self.advance();
                    self.expect(TokenKind::Null, "NULL")?;
                    (ConstraintKind::Existence, None)
                }
                TokenKind::Colon => {
                    // IS :: <TYPE>
                    self.advance();
                    self.expect(TokenKind::Colon, "'::'")?;
                    let type_name = self.name("scalar type")?;
                    let value_type = ScalarType::parse(&type_name)
                        .ok_or_else(|| self.unexpected("STRING, INTEGER, FLOAT, BOOLEAN, LIST or MAP"))?;
                    (ConstraintKind::Type, Some(value_type))
                }
                _ => return Err(self.unexpected("UNIQUE, NOT NULL or '::'")),
            };
            Ok(Statement::CreateConstraint {
                name,
                kind,
                entity,
                label_or_type,
                property,
                value_type,
                if_not_exists,
            })
        }
    }

    /// `(n:Label)` or `()-[r:TYPE]-()` in DDL positions
    fn ddl_entity_pattern(&mut self) -> Result<(EntityKind, String, String)> {
        self.expect(TokenKind::LParen, "'('")?;
        if self.eat(TokenKind::RParen) {
            // relationship form
            self.expect(TokenKind::Dash, "'-'")?;
            self.expect(TokenKind::LBracket, "'['")?;
            let variable = self.name("variable")?;
            self.expect(TokenKind::Colon, "':'")?;
            let rel_type = self.name("relationship type")?;
            self.expect(TokenKind::RBracket, "']'")?;
            if !self.eat(TokenKind::Arrow) {
                self.expect(TokenKind::Dash, "'-'")?;
            }
            self.expect(TokenKind::LParen, "'('")?;
            self.expect(TokenKind::RParen, "')'")?;
            Ok((EntityKind::Relationship, variable, rel_type))
        } else {
            let variable = self.name("variable")?;
            self.expect(TokenKind::Colon, "':'")?;
            let label = self.name("label")?;
            self.expect(TokenKind::RParen, "')'")?;
            Ok((EntityKind::Node, variable, label))
        }
    }

    /// `(n.prop)` or `n.prop` after ON
    fn ddl_property(&mut self, variable: &str) -> Result<String> {
        let parenthesized = self.eat(TokenKind::LParen);
        let bound = self.name("variable")?;
        if bound != variable {
            return Err(self.unexpected(&format!("variable '{variable}'")));
        }
        self.expect(TokenKind::Dot, "'.'")?;
        let property = self.name("property name")?;
        if parenthesized {
            self.expect(TokenKind::RParen, "')'")?;
        }
        Ok(property)
    }

    // ------------------------------------------------------------------
    // Queries and clauses
    // ------------------------------------------------------------------

    fn query(&mut self) -> Result<Query> {
        let mut clauses = Vec::new();
        loop {
            match self.kind() {
                TokenKind::Match => clauses.push(self.match_clause(false)?),
                TokenKind::Optional => {
                    self.advance();
                    self.expect(TokenKind::Match, "MATCH after OPTIONAL")?;
                    clauses.push(self.match_body(true)?);
                }
                TokenKind::Create => clauses.push(self.create_clause()?),
                TokenKind::Merge => clauses.push(self.merge_clause()?),
                TokenKind::Set => clauses.push(self.set_clause()?),
                TokenKind::Remove => clauses.push(self.remove_clause()?),
                TokenKind::Delete => clauses.push(self.delete_clause(false)?),
                TokenKind::Detach => {
                    self.advance();
                    self.expect(TokenKind::Delete, "DELETE after DETACH")?;
                    clauses.push(self.delete_body(true)?);
                }
                TokenKind::With => clauses.push(self.with_clause()?),
                TokenKind::Unwind => clauses.push(self.unwind_clause()?),
                TokenKind::Return => clauses.push(self.return_clause()?),
                TokenKind::Call => clauses.push(self.call_clause()?),
                _ => break,
            }
        }
        if clauses.is_empty() {
            return Err(self.unexpected("a query clause"));
        }
        let union = if self.eat(TokenKind::Union) {
            let all = self.eat(TokenKind::All);
            if self.at(TokenKind::Eof) || self.at(TokenKind::Semicolon) {
                return Err(self.unexpected("a query after UNION"));
            }
            Some(Box::new(UnionPart {
                all,
                query: self.query()?,
            }))
        } else {
            None
        };
        Ok(Query { clauses, union })
    }

    fn match_clause(&mut self, optional: bool) -> Result<Clause> {
        self.expect(TokenKind::Match, "MATCH")?;
        self.match_body(optional)
    }

    fn match_body(&mut self, optional: bool) -> Result<Clause> {
        let patterns = self.pattern_list()?;
        let where_clause = if self.eat(TokenKind::Where) {
            Some(self.expression()?)
        } else {
            None
        };
        Ok(Clause::Match {
            optional,
            patterns,
            where_clause,
        })
    }

    fn create_clause(&mut self) -> Result<Clause> {
        self.expect(TokenKind::Create, "CREATE")?;
        Ok(Clause::Create {
            patterns: self.pattern_list()?,
        })
    }

    fn merge_clause(&mut self) -> Result<Clause> {
        self.expect(TokenKind::Merge, "MERGE")?;
        let pattern = self.pattern()?;
        let mut on_create = Vec::new();
        let mut on_match = Vec::new();
        while self.at(TokenKind::On) {
            self.advance();
            match self.kind() {
                TokenKind::Create => {
                    self.advance();
                    self.expect(TokenKind::Set, "SET after ON CREATE")?;
                    on_create.extend(self.set_items()?);
                }
                TokenKind::Match => {
                    self.advance();
                    self.expect(TokenKind::Set, "SET after ON MATCH")?;
                    on_match.extend(self.set_items()?);
                }
                _ => return Err(self.unexpected("CREATE or MATCH after ON")),
            }
        }
        Ok(Clause::Merge {
            pattern,
            on_create,
            on_match,
        })
    }

    fn set_clause(&mut self) -> Result<Clause> {
        self.expect(TokenKind::Set, "SET")?;
        Ok(Clause::Set {
            items: self.set_items()?,
        })
    }

    fn set_items(&mut self) -> Result<Vec<SetItem>> {
        let mut items = vec![self.set_item()?];
        while self.eat(TokenKind::Comma) {
            items.push(self.set_item()?);
        }
        Ok(items)
    }

    fn set_item(&mut self) -> Result<SetItem> {
        let variable = self.name("variable")?;
        match self.kind() {
            TokenKind::Dot => {
                self.advance();
                let property = self.name("property name")?;
                self.expect(TokenKind::Eq, "'='")?;
                let value = self.expression()?;
                Ok(SetItem::Property {
                    variable,
                    property,
                    value,
                })
            }
            TokenKind::Colon => {
                let mut labels = Vec::new();
                while self.eat(TokenKind::Colon) {
                    labels.push(self.name("label")?);
                }
                Ok(SetItem::Labels { variable, labels })
            }
            TokenKind::Eq => {
                self.advance();
                let value = self.expression()?;
                Ok(SetItem::Variable {
                    variable,
                    value,
                    merge: false,
                })
            }
            TokenKind::PlusEq => {
                self.advance();
                let value = self.expression()?;
                Ok(SetItem::Variable {
                    variable,
                    value,
                    merge: true,
                })
            }
            _ => Err(self.unexpected("'.', ':', '=' or '+=' in SET item")),
        }
    }

    fn remove_clause(&mut self) -> Result<Clause> {
        self.expect(TokenKind::Remove, "REMOVE")?;
        let mut items = vec![self.remove_item()?];
        while self.eat(TokenKind::Comma) {
            items.push(self.remove_item()?);
        }
        Ok(Clause::Remove { items })
    }

    fn remove_item(&mut self) -> Result<RemoveItem> {
        let variable = self.name("variable")?;
        match self.kind() {
            TokenKind::Dot => {
                self.advance();
                let property = self.name("property name")?;
                Ok(RemoveItem::Property { variable, property })
            }
            TokenKind::Colon => {
                let mut labels = Vec::new();
                while self.eat(TokenKind::Colon) {
                    labels.push(self.name("label")?);
                }
                Ok(RemoveItem::Labels { variable, labels })
            }
            _ => Err(self.unexpected("'.' or ':' in REMOVE item")),
        }
    }

    fn delete_clause(&mut self, detach: bool) -> Result<Clause> {
        self.expect(TokenKind::Delete, "DELETE")?;
        self.delete_body(detach)
    }

    fn delete_body(&mut self, detach: bool) -> Result<Clause> {
        let mut exprs = vec![self.expression()?];
        while self.eat(TokenKind::Comma) {
            exprs.push(self.expression()?);
        }
        Ok(Clause::Delete { detach, exprs })
    }

    fn with_clause(&mut self) -> Result<Clause> {
        self.expect(TokenKind::With, "WITH")?;
        let projection = self.projection()?;
        let where_clause = if self.eat(TokenKind::Where) {
            Some(self.expression()?)
        } else {
            None
        };
        Ok(Clause::With {
            projection,
            where_clause,
        })
    }

    fn unwind_clause(&mut self) -> Result<Clause> {
        self.expect(TokenKind::Unwind, "UNWIND")?;
        let expr = self.expression()?;
        self.expect(TokenKind::As, "AS")?;
        let alias = self.name("alias")?;
        Ok(Clause::Unwind { expr, alias })
    }

    fn return_clause(&mut self) -> Result<Clause> {
        self.expect(TokenKind::Return, "RETURN")?;
        Ok(Clause::Return {
            projection: self.projection()?,
        })
    }

    fn call_clause(&mut self) -> Result<Clause> {
        self.expect(TokenKind::Call, "CALL")?;
        let procedure = self.dotted_name()?;
        self.expect(TokenKind::LParen, "'(' after procedure name")?;
        let mut args = Vec::new();
        if !self.at(TokenKind::RParen) {
            args.push(self.expression()?);
            while self.eat(TokenKind::Comma) {
                args.push(self.expression()?);
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        let yield_items = if self.eat(TokenKind::Yield) {
            let mut items = vec![self.yield_item()?];
            while self.eat(TokenKind::Comma) {
                items.push(self.yield_item()?);
            }
            Some(items)
        } else {
            None
        };
        let where_clause = if yield_items.is_some() && self.eat(TokenKind::Where) {
            Some(self.expression()?)
        } else {
            None
        };
        Ok(Clause::Call {
            procedure,
            args,
            yield_items,
            where_clause,
        })
    }

    fn yield_item(&mut self) -> Result<YieldItem> {
        let column = self.name("yield column")?;
        let alias = if self.eat(TokenKind::As) {
            Some(self.name("alias")?)
        } else {
            None
        };
        Ok(YieldItem { column, alias })
    }

    fn dotted_name(&mut self) -> Result<String> {
        let mut name = self.name("procedure name")?;
        while self.at(TokenKind::Dot) {
            self.advance();
            name.push('.');
            name.push_str(&self.name("name segment")?);
        }
        Ok(name)
    }

    fn projection(&mut self) -> Result<Projection> {
        let distinct = self.eat(TokenKind::Distinct);
        let mut star = false;
        let mut items = Vec::new();
        if self.at(TokenKind::Star) {
            self.advance();
            star = true;
        } else {
            items.push(self.projection_item()?);
        }
        while self.eat(TokenKind::Comma) {
            items.push(self.projection_item()?);
        }
        let mut order_by = Vec::new();
        if self.eat(TokenKind::Order) {
            self.expect(TokenKind::By, "BY after ORDER")?;
            loop {
                let expr = self.expression()?;
                let ascending = if self.eat(TokenKind::Desc) {
                    false
                } else {
                    self.eat(TokenKind::Asc);
                    true
                };
                order_by.push(OrderItem { expr, ascending });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        let skip = if self.eat(TokenKind::Skip) {
            Some(self.expression()?)
        } else {
            None
        };
        let limit = if self.eat(TokenKind::Limit) {
            Some(self.expression()?)
        } else {
            None
        };
        Ok(Projection {
            distinct,
            star,
            items,
            order_by,
            skip,
            limit,
        })
    }

    fn projection_item(&mut self) -> Result<ProjectionItem> {
        let expr = self.expression()?;
        let alias = if self.eat(TokenKind::As) {
            Some(self.name("alias")?)
        } else {
            None
        };
        Ok(ProjectionItem { expr, alias })
    }

    // ------------------------------------------------------------------
    // Patterns
    // ------------------------------------------------------------------

    fn pattern_list(&mut self) -> Result<Vec<Pattern>> {
        let mut patterns = vec![self.pattern()?];
        while self.eat(TokenKind::Comma) {
            patterns.push(self.pattern()?);
        }
        Ok(patterns)
    }

    fn pattern(&mut self) -> Result<Pattern> {
        // `p = …` path binding
        let path_variable = if self.at(TokenKind::Identifier)
            && self.peek_kind(1) == TokenKind::Eq
            && !self.is_shortest_head(0)
        {
            let name = self.name("path variable")?;
            self.expect(TokenKind::Eq, "'='")?;
            Some(name)
        } else {
            None
        };

        let shortest = if self.is_shortest_head(0) {
            let head = self.advance().text.to_ascii_lowercase();
            self.expect(TokenKind::LParen, "'(' after path function")?;
            Some(if head == "shortestpath" {
                ShortestKind::Shortest
            } else {
                ShortestKind::AllShortest
            })
        } else {
            None
        };

        let start = self.node_pattern()?;
        let mut segments = Vec::new();
        while self.at(TokenKind::Dash) || self.at(TokenKind::LeftArrow) || self.at(TokenKind::Arrow)
        {
            let rel = self.rel_pattern()?;
            let node = self.node_pattern()?;
            segments.push((rel, node));
        }

        if shortest.is_some() {
            self.expect(TokenKind::RParen, "')' closing path function")?;
        }

        Ok(Pattern {
            path_variable,
            shortest,
            start,
            segments,
        })
    }

    fn is_shortest_head(&self, offset: usize) -> bool {
        if self.peek_kind(offset) != TokenKind::Identifier
            || self.peek_kind(offset + 1) != TokenKind::LParen
        {
            return false;
        }
        let text = &self.tokens[self.pos + offset].text.to_ascii_lowercase();
        text == "shortestpath" || text == "allshortestpaths"
    }

    fn node_pattern(&mut self) -> Result<NodePattern> {
        self.expect(TokenKind::LParen, "'(' starting node pattern")?;
        let mut node = NodePattern::default();
        if self.at(TokenKind::Identifier) {
            node.variable = Some(self.advance().text);
        }
        while self.eat(TokenKind::Colon) {
            node.labels.push(self.name("label")?);
        }
        if self.at(TokenKind::LBrace) {
            node.properties = self.property_map()?;
        }
        self.expect(TokenKind::RParen, "')' closing node pattern")?;
        Ok(node)
    }

    fn rel_pattern(&mut self) -> Result<RelPattern> {
        let incoming = self.eat(TokenKind::LeftArrow);
        if !incoming {
            self.expect(TokenKind::Dash, "'-' starting relationship pattern")?;
        }

        let mut rel = RelPattern {
            variable: None,
            types: Vec::new(),
            properties: Vec::new(),
            direction: PatternDirection::Undirected,
            length: None,
        };

        if self.eat(TokenKind::LBracket) {
            if self.at(TokenKind::Identifier) {
                rel.variable = Some(self.advance().text);
            }
            if self.eat(TokenKind::Colon) {
                rel.types.push(self.name("relationship type")?);
                while self.eat(TokenKind::Pipe) {
                    self.eat(TokenKind::Colon);
                    rel.types.push(self.name("relationship type")?);
                }
            }
            if self.eat(TokenKind::Star) {
                let min = if self.at(TokenKind::Integer) {
                    Some(self.integer_value()?)
                } else {
                    None
                };
                let max = if self.eat(TokenKind::DotDot) {
                    if self.at(TokenKind::Integer) {
                        Some(self.integer_value()?)
                    } else {
                        None
                    }
                } else {
                    // `*3` means exactly three hops
                    min
                };
                rel.length = Some((min, max));
            }
            if self.at(TokenKind::LBrace) {
                rel.properties = self.property_map()?;
            }
            self.expect(TokenKind::RBracket, "']' closing relationship pattern")?;
        }

        if incoming {
            self.expect(TokenKind::Dash, "'-' after relationship")?;
            rel.direction = PatternDirection::Incoming;
        } else if self.eat(TokenKind::Arrow) {
            rel.direction = PatternDirection::Outgoing;
        } else {
            self.expect(TokenKind::Dash, "'-' or '->' after relationship")?;
            rel.direction = PatternDirection::Undirected;
        }
        Ok(rel)
    }

    fn integer_value(&mut self) -> Result<usize> {
        let token = self.expect(TokenKind::Integer, "an integer")?;
        token.text.parse().map_err(|_| {
            GrafitoError::parse(
                token.pos.line,
                token.pos.column,
                format!("integer out of range: {}", token.text),
            )
        })
    }

    fn property_map(&mut self) -> Result<Vec<(String, Expr)>> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut entries = Vec::new();
        if !self.at(TokenKind::RBrace) {
            loop {
                let key = self.map_key()?;
                self.expect(TokenKind::Colon, "':' after property name")?;
                let value = self.expression()?;
                entries.push((key, value));
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(entries)
    }

    fn map_key(&mut self) -> Result<String> {
        if self.at(TokenKind::StringLiteral) {
            Ok(self.advance().text)
        } else {
            self.name("property name")
        }
    }

    // ------------------------------------------------------------------
    // Expressions (precedence climbing)
    // ------------------------------------------------------------------

    fn expression(&mut self) -> Result<Expr> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.xor_expr()?;
        while self.eat(TokenKind::Or) {
            let rhs = self.xor_expr()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn xor_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.and_expr()?;
        while self.eat(TokenKind::Xor) {
            let rhs = self.and_expr()?;
            lhs = Expr::Binary(BinaryOp::Xor, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.not_expr()?;
        while self.eat(TokenKind::And) {
            let rhs = self.not_expr()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr> {
        if self.eat(TokenKind::Not) {
            let inner = self.not_expr()?;
            Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)))
        } else {
            self.comparison()
        }
    }

    /// Comparisons chain: `1 < x <= 10` is the conjunction of the
    /// adjacent pairs.
    fn comparison(&mut self) -> Result<Expr> {
        let first = self.additive()?;
        let mut operands = vec![first];
        let mut operators: Vec<BinaryOp> = Vec::new();
        loop {
            let op = match self.kind() {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::Neq => BinaryOp::Neq,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Lte => BinaryOp::Lte,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Gte => BinaryOp::Gte,
                TokenKind::In => BinaryOp::In,
                TokenKind::RegexMatch => BinaryOp::RegexMatch,
                TokenKind::Contains => BinaryOp::Contains,
                TokenKind::Starts => {
                    self.advance();
                    self.expect(TokenKind::With, "WITH after STARTS")?;
                    let rhs = self.additive()?;
                    operators.push(BinaryOp::StartsWith);
                    operands.push(rhs);
                    continue;
                }
                TokenKind::Ends => {
                    self.advance();
                    self.expect(TokenKind::With, "WITH after ENDS")?;
                    let rhs = self.additive()?;
                    operators.push(BinaryOp::EndsWith);
                    operands.push(rhs);
                    continue;
                }
                TokenKind::Is => {
                    self.advance();
                    let negated = self.eat(TokenKind::Not);
                    self.expect(TokenKind::Null, "NULL after IS")?;
                    let subject = operands.pop().expect("comparison operand");
                    operands.push(Expr::IsNull(Box::new(subject), negated));
                    continue;
                }
                _ => break,
            };
            self.advance();
            operators.push(op);
            operands.push(self.additive()?);
        }
        if operators.is_empty() {
            return Ok(operands.pop().expect("comparison operand"));
        }
        let mut result: Option<Expr> = None;
        for (i, op) in operators.iter().enumerate() {
            let pair = Expr::Binary(
                *op,
                Box::new(operands[i].clone()),
                Box::new(operands[i + 1].clone()),
            );
            result = Some(match result {
                None => pair,
                Some(acc) => Expr::Binary(BinaryOp::And, Box::new(acc), Box::new(pair)),
            });
        }
        Ok(result.expect("at least one comparison"))
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Dash => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.power()?;
        loop {
            let op = match self.kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.power()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn power(&mut self) -> Result<Expr> {
        let lhs = self.unary()?;
        if self.eat(TokenKind::Caret) {
            // right-associative
            let rhs = self.power()?;
            Ok(Expr::Binary(BinaryOp::Pow, Box::new(lhs), Box::new(rhs)))
        } else {
            Ok(lhs)
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        match self.kind() {
            TokenKind::Dash => {
                self.advance();
                let inner = self.unary()?;
                Ok(Expr::Unary(UnaryOp::Minus, Box::new(inner)))
            }
            TokenKind::Plus => {
                self.advance();
                let inner = self.unary()?;
                Ok(Expr::Unary(UnaryOp::Plus, Box::new(inner)))
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.atom()?;
        loop {
            match self.kind() {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.name("property name")?;
                    expr = Expr::Property(Box::new(expr), property);
                }
                TokenKind::LBracket => {
                    self.advance();
                    // `[expr]`, `[from..to]`, `[..to]`, `[from..]`, `[..]`
                    let from = if self.at(TokenKind::DotDot) {
                        None
                    } else {
                        Some(Box::new(self.expression()?))
                    };
                    if self.eat(TokenKind::DotDot) {
                        let to = if self.at(TokenKind::RBracket) {
                            None
                        } else {
                            Some(Box::new(self.expression()?))
                        };
                        self.expect(TokenKind::RBracket, "']'")?;
                        expr = Expr::Slice(Box::new(expr), from, to);
                    } else {
                        self.expect(TokenKind::RBracket, "']'")?;
                        let index = from.ok_or_else(|| self.unexpected("an index expression"))?;
                        expr = Expr::Index(Box::new(expr), index);
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn atom(&mut self) -> Result<Expr> {
        match self.kind() {
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Null)
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            TokenKind::Integer => {
                let token = self.advance();
                token.text.parse::<i64>().map(Expr::Integer).map_err(|_| {
                    GrafitoError::parse(
                        token.pos.line,
                        token.pos.column,
                        format!("integer out of range: {}", token.text),
                    )
                })
            }
            TokenKind::Float => {
                let token = self.advance();
                token.text.parse::<f64>().map(Expr::Float).map_err(|_| {
                    GrafitoError::parse(
                        token.pos.line,
                        token.pos.column,
                        format!("malformed float: {}", token.text),
                    )
                })
            }
            TokenKind::StringLiteral => Ok(Expr::Str(self.advance().text)),
            TokenKind::Parameter => Ok(Expr::Parameter(self.advance().text)),
            TokenKind::Case => self.case_expr(),
            TokenKind::Exists => self.exists_expr(),
            TokenKind::LBracket => self.bracket_expr(),
            TokenKind::LBrace => {
                let entries = self.property_map()?;
                Ok(Expr::Map(entries))
            }
            TokenKind::LParen => self.paren_or_pattern(),
            TokenKind::Identifier => self.identifier_expr(),
            // COUNT/ALL and friends can begin expressions in some
            // contexts; a bare keyword here is an error.
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn case_expr(&mut self) -> Result<Expr> {
        self.expect(TokenKind::Case, "CASE")?;
        let operand = if self.at(TokenKind::When) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        let mut branches = Vec::new();
        while self.eat(TokenKind::When) {
            let when = self.expression()?;
            self.expect(TokenKind::Then, "THEN")?;
            let then = self.expression()?;
            branches.push((when, then));
        }
        if branches.is_empty() {
            return Err(self.unexpected("WHEN"));
        }
        let else_expr = if self.eat(TokenKind::Else) {
            Some(Box::new(self.expression()?))
        } else {
            None
        };
        self.expect(TokenKind::End, "END")?;
        Ok(Expr::Case {
            operand,
            branches,
            else_expr,
        })
    }

    fn exists_expr(&mut self) -> Result<Expr> {
        self.expect(TokenKind::Exists, "EXISTS")?;
        match self.kind() {
            TokenKind::LBrace => {
                self.advance();
                self.eat(TokenKind::Match);
                let pattern = self.pattern()?;
                self.expect(TokenKind::RBrace, "'}'")?;
                Ok(Expr::Exists(Box::new(pattern)))
            }
            TokenKind::LParen => {
                self.advance();
                let pattern = self.pattern()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(Expr::Exists(Box::new(pattern)))
            }
            _ => Err(self.unexpected("'{' or '(' after EXISTS")),
        }
    }

    /// `[…]` is a list literal, a list comprehension, or a pattern
    /// comprehension.
    fn bracket_expr(&mut self) -> Result<Expr> {
        // Pattern comprehension: [ (a)-[:R]->(b) … | expr ]
        if self.peek_kind(1) == TokenKind::LParen {
            let saved = self.pos;
            self.advance(); // '['
            if let Ok(pattern) = self.pattern() {
                if !pattern.segments.is_empty()
                    && matches!(self.kind(), TokenKind::Where | TokenKind::Pipe)
                {
                    let filter = if self.eat(TokenKind::Where) {
                        Some(Box::new(self.expression()?))
                    } else {
                        None
                    };
                    self.expect(TokenKind::Pipe, "'|' in pattern comprehension")?;
                    let map = Box::new(self.expression()?);
                    self.expect(TokenKind::RBracket, "']'")?;
                    return Ok(Expr::PatternComprehension {
                        pattern: Box::new(pattern),
                        filter,
                        map,
                    });
                }
            }
            self.pos = saved;
        }
        // List comprehension: [ x IN list … ]
        if self.peek_kind(1) == TokenKind::Identifier && self.peek_kind(2) == TokenKind::In {
            self.advance(); // '['
            let variable = self.name("comprehension variable")?;
            self.expect(TokenKind::In, "IN")?;
            let list = Box::new(self.expression()?);
            let filter = if self.eat(TokenKind::Where) {
                Some(Box::new(self.expression()?))
            } else {
                None
            };
            let map = if self.eat(TokenKind::Pipe) {
                Some(Box::new(self.expression()?))
            } else {
                None
            };
            self.expect(TokenKind::RBracket, "']'")?;
            return Ok(Expr::ListComprehension {
                variable,
                list,
                filter,
                map,
            });
        }
        // Plain list literal
        self.expect(TokenKind::LBracket, "'['")?;
        let mut items = Vec::new();
        if !self.at(TokenKind::RBracket) {
            items.push(self.expression()?);
            while self.eat(TokenKind::Comma) {
                items.push(self.expression()?);
            }
        }
        self.expect(TokenKind::RBracket, "']'")?;
        Ok(Expr::List(items))
    }

    /// `(` begins either a parenthesized expression or a pattern used as
    /// a predicate.
    fn paren_or_pattern(&mut self) -> Result<Expr> {
        let saved = self.pos;
        if let Ok(pattern) = self.pattern() {
            if !pattern.segments.is_empty() {
                return Ok(Expr::PatternPredicate(Box::new(pattern)));
            }
        }
        self.pos = saved;
        self.expect(TokenKind::LParen, "'('")?;
        let inner = self.expression()?;
        self.expect(TokenKind::RParen, "')'")?;
        Ok(inner)
    }

    fn identifier_expr(&mut self) -> Result<Expr> {
        // Dotted function names: scan `ident (. ident)*` and check for a
        // trailing '('. Without one, only the first identifier is
        // consumed and `.` chains resolve as property access.
        let wordlike = |offset: usize| {
            self.tokens
                .get(self.pos + offset)
                .is_some_and(|t| {
                    t.kind != TokenKind::Eof
                        && !t.text.is_empty()
                        && t.text.chars().all(|c| c.is_alphanumeric() || c == '_')
                })
        };
        let mut lookahead = 0;
        while self.peek_kind(lookahead + 1) == TokenKind::Dot && wordlike(lookahead + 2) {
            lookahead += 2;
        }
        let is_call = self.peek_kind(lookahead + 1) == TokenKind::LParen;

        if is_call {
            let mut name = self.name("function name")?;
            while self.at(TokenKind::Dot) {
                self.advance();
                name.push('.');
                name.push_str(&self.name("name segment")?);
            }
            self.expect(TokenKind::LParen, "'('")?;
            if name.eq_ignore_ascii_case("count") && self.at(TokenKind::Star) {
                self.advance();
                self.expect(TokenKind::RParen, "')'")?;
                return Ok(Expr::CountStar);
            }
            let distinct = self.eat(TokenKind::Distinct);
            let mut args = Vec::new();
            if !self.at(TokenKind::RParen) {
                args.push(self.expression()?);
                while self.eat(TokenKind::Comma) {
                    args.push(self.expression()?);
                }
            }
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(Expr::FunctionCall {
                name,
                args,
                distinct,
            });
        }

        let token = self.expect(TokenKind::Identifier, "an identifier")?;
        Ok(Expr::Variable(token.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Statement {
        parse_statement(input).expect("statement parses")
    }

    #[test]
    fn test_match_return() {
        let stmt = parse("MATCH (n:Person) RETURN n.name AS name");
        let Statement::Query(query) = stmt else {
            panic!("expected query");
        };
        assert_eq!(query.clauses.len(), 2);
        let Clause::Match { patterns, .. } = &query.clauses[0] else {
            panic!("expected MATCH");
        };
        assert_eq!(patterns[0].start.labels, vec!["Person"]);
    }

    #[test]
    fn test_variable_length_pattern() {
        let stmt = parse("MATCH (a)-[r:KNOWS*1..3]->(b) RETURN b");
        let Statement::Query(query) = stmt else {
            panic!("expected query");
        };
        let Clause::Match { patterns, .. } = &query.clauses[0] else {
            panic!("expected MATCH");
        };
        let (rel, _) = &patterns[0].segments[0];
        assert_eq!(rel.length, Some((Some(1), Some(3))));
        assert_eq!(rel.types, vec!["KNOWS"]);
    }

    #[test]
    fn test_merge_with_actions() {
        let stmt = parse(
            "MERGE (n:User {id: 1}) ON CREATE SET n.created = true ON MATCH SET n.seen = true",
        );
        let Statement::Query(query) = stmt else {
            panic!("expected query");
        };
        let Clause::Merge {
            on_create,
            on_match,
            ..
        } = &query.clauses[0]
        else {
            panic!("expected MERGE");
        };
        assert_eq!(on_create.len(), 1);
        assert_eq!(on_match.len(), 1);
    }

    #[test]
    fn test_shortest_path_head() {
        let stmt = parse("MATCH p = shortestPath((a)-[*]->(b)) RETURN p");
        let Statement::Query(query) = stmt else {
            panic!("expected query");
        };
        let Clause::Match { patterns, .. } = &query.clauses[0] else {
            panic!("expected MATCH");
        };
        assert_eq!(patterns[0].shortest, Some(ShortestKind::Shortest));
        assert_eq!(patterns[0].path_variable.as_deref(), Some("p"));
    }

    #[test]
    fn test_union() {
        let stmt = parse("RETURN 1 AS x UNION RETURN 2 AS x");
        let Statement::Query(query) = stmt else {
            panic!("expected query");
        };
        let union = query.union.expect("union part");
        assert!(!union.all);
    }

    #[test]
    fn test_incomplete_union_is_error() {
        assert!(parse_statement("RETURN 1 UNION").is_err());
    }

    #[test]
    fn test_create_index_ddl() {
        let stmt = parse("CREATE INDEX FOR (n:Person) ON (n.name)");
        assert_eq!(
            stmt,
            Statement::CreateIndex {
                name: None,
                entity: EntityKind::Node,
                label_or_type: "Person".to_string(),
                property: "name".to_string(),
                unique: false,
                if_not_exists: false,
            }
        );
    }

    #[test]
    fn test_create_constraint_ddl() {
        let stmt =
            parse("CREATE CONSTRAINT user_email IF NOT EXISTS FOR (u:User) REQUIRE u.email IS UNIQUE");
        let Statement::CreateConstraint {
            name,
            kind,
            if_not_exists,
            ..
        } = stmt
        else {
            panic!("expected constraint");
        };
        assert_eq!(name.as_deref(), Some("user_email"));
        assert_eq!(kind, ConstraintKind::Uniqueness);
        assert!(if_not_exists);
    }

    #[test]
    fn test_type_constraint_ddl() {
        let stmt = parse("CREATE CONSTRAINT FOR (p:Person) REQUIRE p.age IS :: INTEGER");
        let Statement::CreateConstraint {
            kind, value_type, ..
        } = stmt
        else {
            panic!("expected constraint");
        };
        assert_eq!(kind, ConstraintKind::Type);
        assert_eq!(value_type, Some(ScalarType::Integer));
    }

    #[test]
    fn test_chained_comparison() {
        let stmt = parse("RETURN 1 < 2 < 3 AS ok");
        let Statement::Query(query) = stmt else {
            panic!("expected query");
        };
        let Clause::Return { projection } = &query.clauses[0] else {
            panic!("expected RETURN");
        };
        // (1 < 2) AND (2 < 3)
        let Expr::Binary(BinaryOp::And, _, _) = &projection.items[0].expr else {
            panic!("chained comparison should desugar to AND");
        };
    }

    #[test]
    fn test_list_comprehension() {
        let stmt = parse("RETURN [x IN [1,2,3] WHERE x > 1 | x * 10] AS xs");
        let Statement::Query(query) = stmt else {
            panic!("expected query");
        };
        let Clause::Return { projection } = &query.clauses[0] else {
            panic!("expected RETURN");
        };
        assert!(matches!(
            &projection.items[0].expr,
            Expr::ListComprehension { .. }
        ));
    }

    #[test]
    fn test_call_yield() {
        let stmt = parse("CALL db.vector.search('idx', [1.0, 0.0], 5) YIELD node, score RETURN node");
        let Statement::Query(query) = stmt else {
            panic!("expected query");
        };
        let Clause::Call {
            procedure,
            args,
            yield_items,
            ..
        } = &query.clauses[0]
        else {
            panic!("expected CALL");
        };
        assert_eq!(procedure, "db.vector.search");
        assert_eq!(args.len(), 3);
        assert_eq!(yield_items.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_error_location() {
        let err = parse_statement("MATCH (n RETURN n").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("line 1"), "{text}");
        assert!(text.contains("RETURN"), "{text}");
    }

    #[test]
    fn test_keyword_as_property_name() {
        let stmt = parse("MATCH (n) RETURN n.type, n.end");
        let Statement::Query(query) = stmt else {
            panic!("expected query");
        };
        let Clause::Return { projection } = &query.clauses[0] else {
            panic!("expected RETURN");
        };
        assert_eq!(projection.items.len(), 2);
    }
}
