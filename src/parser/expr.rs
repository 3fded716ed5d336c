// パス: src/parser/expr.rs
// 役割: 式の Pratt 解析（前置・中置・呼出・添字）を `Parser` に実装する
// 意図: 優先順位付きの式解析ロジックを専用モジュールに切り分ける
// 関連ファイル: src/parser/program.rs, src/parser/mod.rs, src/ast.rs

use super::*;
use crate::ast::Expression;

impl<'a> Parser<'a> {
    pub(super) fn parse_expression(&mut self, precedence: Precedence) -> Option<Expression> {
        let entry = self.depth;
        let expr = self.parse_nested_expression(precedence);
        self.depth = entry;
        expr
    }

    /// 前置式と、それに続く中置・呼出・添字の連鎖。連鎖 1 回ごとに木が 1 段深くなる。
    fn parse_nested_expression(&mut self, precedence: Precedence) -> Option<Expression> {
        self.descend()?;
        let mut left = self.parse_prefix()?;
        while !self.peek_is(TokenKind::SEMICOLON) && precedence < self.peek_precedence() {
            self.descend()?;
            left = match self.peek.kind {
                TokenKind::PLUS
                | TokenKind::MINUS
                | TokenKind::ASTERISK
                | TokenKind::SLASH
                | TokenKind::EQ
                | TokenKind::NOTEQ
                | TokenKind::LT
                | TokenKind::GT => {
                    self.next_token();
                    self.parse_infix(left)?
                }
                TokenKind::LPAREN => {
                    self.next_token();
                    let args = self.parse_expression_list(TokenKind::RPAREN)?;
                    Expression::Call {
                        function: Box::new(left),
                        args,
                    }
                }
                TokenKind::LBRACKET => {
                    self.next_token();
                    self.parse_index(left)?
                }
                _ => return Some(left),
            };
        }
        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<Expression> {
        match self.cur.kind {
            TokenKind::IDENT => Some(Expression::Identifier(self.cur_identifier())),
            TokenKind::INT => self.parse_integer_literal(),
            TokenKind::STRING => Some(Expression::StringLiteral(self.cur.value.clone())),
            TokenKind::TRUE => Some(Expression::Boolean(true)),
            TokenKind::FALSE => Some(Expression::Boolean(false)),
            TokenKind::BANG | TokenKind::MINUS => {
                let op = self.cur.value.clone();
                self.next_token();
                let right = self.parse_expression(Precedence::Prefix)?;
                Some(Expression::Prefix {
                    op,
                    right: Box::new(right),
                })
            }
            TokenKind::LPAREN => {
                self.next_token();
                let expr = self.parse_expression(Precedence::Lowest)?;
                self.expect_peek(TokenKind::RPAREN)?;
                Some(expr)
            }
            TokenKind::IF => self.parse_if(),
            TokenKind::FUNCTION => self.parse_function_literal(),
            TokenKind::LBRACKET => {
                let items = self.parse_expression_list(TokenKind::RBRACKET)?;
                Some(Expression::ArrayLiteral(items))
            }
            TokenKind::LBRACE => self.parse_hash_literal(),
            _ => {
                self.no_prefix_parse_fn_error();
                None
            }
        }
    }

    fn parse_integer_literal(&mut self) -> Option<Expression> {
        match self.cur.value.parse::<i64>() {
            Ok(v) => Some(Expression::IntegerLiteral(v)),
            Err(_) => {
                let msg = format!("could not parse {:?} as integer", self.cur.value);
                self.push_error("PAR003", msg);
                None
            }
        }
    }

    fn parse_infix(&mut self, left: Expression) -> Option<Expression> {
        let op = self.cur.value.clone();
        let precedence = self.cur_precedence();
        self.next_token();
        let right = self.parse_expression(precedence)?;
        Some(Expression::Infix {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_index(&mut self, left: Expression) -> Option<Expression> {
        self.next_token();
        let index = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::RBRACKET)?;
        Some(Expression::Index {
            left: Box::new(left),
            index: Box::new(index),
        })
    }

    fn parse_if(&mut self) -> Option<Expression> {
        self.expect_peek(TokenKind::LPAREN)?;
        self.next_token();
        let cond = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::RPAREN)?;
        self.expect_peek(TokenKind::LBRACE)?;
        let consequence = self.parse_block_statement();
        let alternative = if self.peek_is(TokenKind::ELSE) {
            self.next_token();
            self.expect_peek(TokenKind::LBRACE)?;
            Some(self.parse_block_statement())
        } else {
            None
        };
        Some(Expression::If {
            cond: Box::new(cond),
            consequence,
            alternative,
        })
    }

    fn parse_function_literal(&mut self) -> Option<Expression> {
        self.expect_peek(TokenKind::LPAREN)?;
        let mut params = Vec::new();
        if self.peek_is(TokenKind::RPAREN) {
            self.next_token();
        } else {
            self.expect_peek(TokenKind::IDENT)?;
            params.push(self.cur_identifier());
            while self.peek_is(TokenKind::COMMA) {
                self.next_token();
                self.expect_peek(TokenKind::IDENT)?;
                params.push(self.cur_identifier());
            }
            self.expect_peek(TokenKind::RPAREN)?;
        }
        self.expect_peek(TokenKind::LBRACE)?;
        let body = self.parse_block_statement();
        Some(Expression::FunctionLiteral {
            params,
            body,
            name: None,
        })
    }

    /// `(a, b)` や `[a, b]` のようなカンマ区切りの式列を `end` まで解析する。
    fn parse_expression_list(&mut self, end: TokenKind) -> Option<Vec<Expression>> {
        let mut items = Vec::new();
        if self.peek_is(end) {
            self.next_token();
            return Some(items);
        }
        self.next_token();
        items.push(self.parse_expression(Precedence::Lowest)?);
        while self.peek_is(TokenKind::COMMA) {
            self.next_token();
            self.next_token();
            items.push(self.parse_expression(Precedence::Lowest)?);
        }
        self.expect_peek(end)?;
        Some(items)
    }

    fn parse_hash_literal(&mut self) -> Option<Expression> {
        let mut pairs = Vec::new();
        while !self.peek_is(TokenKind::RBRACE) {
            self.next_token();
            let key = self.parse_expression(Precedence::Lowest)?;
            self.expect_peek(TokenKind::COLON)?;
            self.next_token();
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));
            if !self.peek_is(TokenKind::RBRACE) {
                self.expect_peek(TokenKind::COMMA)?;
            }
        }
        self.expect_peek(TokenKind::RBRACE)?;
        Some(Expression::HashLiteral(pairs))
    }
}
