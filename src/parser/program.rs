// パス: src/parser/program.rs
// 役割: プログラム全体・文・ブロックの構文解析ルーチンを実装する
// 意図: 文レベルの解析ロジックを式の Pratt 解析から分離し可読性を高める
// 関連ファイル: src/parser/expr.rs, src/parser/mod.rs, src/ast.rs

use super::*;
use crate::ast::{BlockStatement, Expression, Statement};

impl<'a> Parser<'a> {
    /// 入力末尾までの文を解析する。失敗した文は読み飛ばしてエラーのみ残す。
    pub fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();
        while !self.cur_is(TokenKind::EOF) && !self.too_deep {
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
            self.next_token();
        }
        Program { statements }
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        match self.cur.kind {
            TokenKind::LET => self.parse_let_statement(),
            TokenKind::RETURN => self.parse_return_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let_statement(&mut self) -> Option<Statement> {
        self.expect_peek(TokenKind::IDENT)?;
        let name = self.cur_identifier();
        self.expect_peek(TokenKind::ASSIGN)?;
        self.next_token();
        let mut value = self.parse_expression(Precedence::Lowest)?;
        if let Expression::FunctionLiteral { name: fn_name, .. } = &mut value {
            *fn_name = Some(name.name.clone());
        }
        if self.peek_is(TokenKind::SEMICOLON) {
            self.next_token();
        }
        Some(Statement::Let { name, value })
    }

    fn parse_return_statement(&mut self) -> Option<Statement> {
        self.next_token();
        let value = self.parse_expression(Precedence::Lowest)?;
        if self.peek_is(TokenKind::SEMICOLON) {
            self.next_token();
        }
        Some(Statement::Return { value })
    }

    fn parse_expression_statement(&mut self) -> Option<Statement> {
        let expr = self.parse_expression(Precedence::Lowest);
        // 失敗時もセミコロンは消費し、同じ位置でエラーを重ねない
        if self.peek_is(TokenKind::SEMICOLON) {
            self.next_token();
        }
        Some(Statement::Expression { expr: expr? })
    }

    /// `{` の位置から対応する `}` までの文を解析する。
    pub(super) fn parse_block_statement(&mut self) -> BlockStatement {
        let mut statements = Vec::new();
        self.next_token();
        while !self.cur_is(TokenKind::RBRACE) && !self.cur_is(TokenKind::EOF) && !self.too_deep {
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
            self.next_token();
        }
        BlockStatement { statements }
    }
}
