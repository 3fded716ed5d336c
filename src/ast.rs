//! 抽象構文木（AST）
//!
//! 目的:
//! - 構文解析結果をコンパイラへ渡すための中立的な表現に落とし込む。
//!
//! 設計ノート:
//! - `Display` は演算の結合を明示する括弧付きの正準形を出力する（パーサのテストで利用）。
//! - 識別子のみ位置情報を保持し、未定義変数のコンパイルエラーで参照する。

use std::fmt;

/// ソース上の位置（1-origin の行・列とバイトオフセット）。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Span {
    pub pos: usize,
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn new(pos: usize, line: usize, col: usize) -> Self {
        Self { pos, line, col }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

// 文ノード
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    Let { name: Identifier, value: Expression },
    Return { value: Expression },
    Expression { expr: Expression },
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct BlockStatement {
    pub statements: Vec<Statement>,
}

// 式ノード
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expression {
    Identifier(Identifier),
    IntegerLiteral(i64),
    StringLiteral(String),
    Boolean(bool),
    Prefix {
        op: String,
        right: Box<Expression>,
    },
    Infix {
        op: String,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    If {
        cond: Box<Expression>,
        consequence: BlockStatement,
        alternative: Option<BlockStatement>,
    },
    FunctionLiteral {
        params: Vec<Identifier>,
        body: BlockStatement,
        name: Option<String>,
    },
    Call {
        function: Box<Expression>,
        args: Vec<Expression>,
    },
    ArrayLiteral(Vec<Expression>),
    Index {
        left: Box<Expression>,
        index: Box<Expression>,
    },
    HashLiteral(Vec<(Expression, Expression)>),
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

fn join<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Let { name, value } => write!(f, "let {name} = {value};"),
            Statement::Return { value } => write!(f, "return {value};"),
            Statement::Expression { expr } => write!(f, "{expr}"),
        }
    }
}

impl fmt::Display for BlockStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for s in &self.statements {
            write!(f, "{s}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for s in &self.statements {
            write!(f, "{s}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(id) => write!(f, "{id}"),
            Expression::IntegerLiteral(v) => write!(f, "{v}"),
            Expression::StringLiteral(s) => f.write_str(s),
            Expression::Boolean(b) => write!(f, "{b}"),
            Expression::Prefix { op, right } => write!(f, "({op}{right})"),
            Expression::Infix { op, left, right } => write!(f, "({left} {op} {right})"),
            Expression::If {
                cond,
                consequence,
                alternative,
            } => {
                write!(f, "if{cond} {consequence}")?;
                if let Some(alt) = alternative {
                    write!(f, "else {alt}")?;
                }
                Ok(())
            }
            Expression::FunctionLiteral { params, body, name } => {
                let label = name.as_deref().map(|n| format!("<{n}>")).unwrap_or_default();
                write!(f, "fn{label}({}) {body}", join(params, ", "))
            }
            Expression::Call { function, args } => write!(f, "{function}({})", join(args, ", ")),
            Expression::ArrayLiteral(items) => write!(f, "[{}]", join(items, ", ")),
            Expression::Index { left, index } => write!(f, "({left}[{index}])"),
            Expression::HashLiteral(pairs) => {
                let parts: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}:{v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}
