//! Custom row queries
//!
//! A small boolean language over annotation columns, compiled once against
//! a [`ColumnCatalog`] and then evaluated per row without re-parsing.
//!
//! ```text
//! expr    := or
//! or      := and (("||" | "or") and)*
//! and     := unary (("&&" | "and") unary)*
//! unary   := ("!" | "not") unary | "(" expr ")" | compare
//! compare := operand ("==" | "=" | "!=" | "<" | "<=" | ">" | ">=") operand
//!          | operand ("=~" | "!~") string
//! operand := column | `quoted column` | "string" | 'string' | number
//! ```
//!
//! Comparisons are numeric when both sides parse as finite numbers and
//! textual when neither does. A number compared with non-numeric text is
//! only ever unequal. `=~` is a regex search compiled at query compile time.
//! Parentheses and negations nest at most [`MAX_DEPTH`] levels.
//!
//! ## Example
//!
//! ```rust,ignore
//! let compiler = QueryCompiler::new(store.catalog());
//! let query = compiler.compile(r#"type == "Stop" && `RS#` == "-" "#)?;
//! let mask = query.run(&store);
//! ```

use crate::mask::InclusionMask;
use crate::schema::ColumnCatalog;
use crate::store::TabularStore;
use regex::Regex;
use std::cmp::Ordering;
use thiserror::Error;

/// Compile-time query failures, with byte offsets into the query text
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("empty query")]
    Empty,

    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unterminated string starting at {pos}")]
    UnterminatedString { pos: usize },

    #[error("unexpected {found} at {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("unexpected end of query")]
    UnexpectedEnd,

    #[error("unknown column '{name}' at {pos}")]
    UnknownColumn { name: String, pos: usize },

    #[error("invalid regex '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("query nested too deeply at {pos}")]
    TooDeep { pos: usize },
}

/// Deepest allowed nesting of parentheses and negations
pub const MAX_DEPTH: usize = 128;

// === Lexer ===

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(String),
    Cmp(CmpOp),
    Match { negate: bool },
    And,
    Or,
    Not,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("column '{}'", s),
            Token::Str(s) => format!("string \"{}\"", s),
            Token::Num(s) => format!("number {}", s),
            Token::Cmp(op) => format!("operator {}", op.symbol()),
            Token::Match { negate: false } => "operator =~".to_string(),
            Token::Match { negate: true } => "operator !~".to_string(),
            Token::And => "'&&'".to_string(),
            Token::Or => "'||'".to_string(),
            Token::Not => "'!'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

#[inline]
fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

#[inline]
fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '#' | '.')
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, QueryError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let peek = |i: usize| chars.get(i).map(|&(_, c)| c);

    while i < chars.len() {
        let (pos, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // two-character operators first
        let two = (c, peek(i + 1));
        let op = match two {
            ('=', Some('=')) => Some((Token::Cmp(CmpOp::Eq), 2)),
            ('!', Some('=')) => Some((Token::Cmp(CmpOp::Ne), 2)),
            ('<', Some('=')) => Some((Token::Cmp(CmpOp::Le), 2)),
            ('>', Some('=')) => Some((Token::Cmp(CmpOp::Ge), 2)),
            ('=', Some('~')) => Some((Token::Match { negate: false }, 2)),
            ('!', Some('~')) => Some((Token::Match { negate: true }, 2)),
            ('&', Some('&')) => Some((Token::And, 2)),
            ('|', Some('|')) => Some((Token::Or, 2)),
            ('=', _) => Some((Token::Cmp(CmpOp::Eq), 1)),
            ('<', _) => Some((Token::Cmp(CmpOp::Lt), 1)),
            ('>', _) => Some((Token::Cmp(CmpOp::Gt), 1)),
            ('!', _) => Some((Token::Not, 1)),
            ('(', _) => Some((Token::LParen, 1)),
            (')', _) => Some((Token::RParen, 1)),
            _ => None,
        };
        if let Some((token, width)) = op {
            tokens.push((token, pos));
            i += width;
            continue;
        }

        match c {
            '"' | '\'' | '`' => {
                let quote = c;
                let mut text = String::new();
                let mut j = i + 1;
                let mut closed = false;
                while j < chars.len() {
                    let ch = chars[j].1;
                    if ch == '\\' && j + 1 < chars.len() {
                        text.push(chars[j + 1].1);
                        j += 2;
                        continue;
                    }
                    if ch == quote {
                        closed = true;
                        break;
                    }
                    text.push(ch);
                    j += 1;
                }
                if !closed {
                    return Err(QueryError::UnterminatedString { pos });
                }
                let token = if quote == '`' {
                    Token::Ident(text)
                } else {
                    Token::Str(text)
                };
                tokens.push((token, pos));
                i = j + 1;
            }
            c if c.is_ascii_digit()
                || (c == '-' && peek(i + 1).is_some_and(|n| n.is_ascii_digit() || n == '.'))
                || (c == '.' && peek(i + 1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                let mut j = i + 1;
                while j < chars.len() && (chars[j].1.is_ascii_digit() || chars[j].1 == '.') {
                    j += 1;
                }
                let end = chars.get(j).map(|&(p, _)| p).unwrap_or(input.len());
                tokens.push((Token::Num(input[pos..end].to_string()), pos));
                i = j;
            }
            c if is_ident_start(c) => {
                let mut j = i + 1;
                while j < chars.len() && is_ident_char(chars[j].1) {
                    j += 1;
                }
                let end = chars.get(j).map(|&(p, _)| p).unwrap_or(input.len());
                let word = &input[pos..end];
                let token = match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(word.to_string()),
                };
                tokens.push((token, pos));
                i = j;
            }
            _ => return Err(QueryError::UnexpectedChar { ch: c, pos }),
        }
    }

    Ok(tokens)
}

// === AST ===

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    /// `None` means the operands are not comparable; only `!=` holds
    #[inline]
    fn test(&self, ord: Option<Ordering>) -> bool {
        let Some(ord) = ord else {
            return *self == CmpOp::Ne;
        };
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
        }
    }
}

/// Literal with its numeric reading parsed once
#[derive(Debug, Clone, PartialEq)]
struct Literal {
    text: String,
    number: Option<f64>,
}

impl Literal {
    fn new(text: String) -> Self {
        let number = parse_number(&text);
        Self { text, number }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Column(usize),
    Literal(Literal),
}

#[derive(Debug, Clone)]
enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Cmp {
        lhs: Operand,
        op: CmpOp,
        rhs: Operand,
    },
    Match {
        operand: Operand,
        regex: Regex,
        negate: bool,
    },
}

// === Parser ===

struct Parser<'a> {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
    catalog: &'a ColumnCatalog,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Result<(Token, usize), QueryError> {
        let item = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(QueryError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(item)
    }

    /// Descend one nesting level, opened by the token at the cursor
    fn enter(&mut self) -> Result<(), QueryError> {
        let pos = self.tokens.get(self.pos).map(|&(_, p)| p).unwrap_or(0);
        if self.depth >= MAX_DEPTH {
            return Err(QueryError::TooDeep { pos });
        }
        self.depth += 1;
        self.pos += 1;
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Expr, QueryError> {
        let first = self.parse_and()?;
        if self.peek() != Some(&Token::Or) {
            return Ok(first);
        }
        let mut terms = vec![first];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            terms.push(self.parse_and()?);
        }
        Ok(Expr::Or(terms))
    }

    fn parse_and(&mut self) -> Result<Expr, QueryError> {
        let first = self.parse_unary()?;
        if self.peek() != Some(&Token::And) {
            return Ok(first);
        }
        let mut terms = vec![first];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            terms.push(self.parse_unary()?);
        }
        Ok(Expr::And(terms))
    }

    fn parse_unary(&mut self) -> Result<Expr, QueryError> {
        match self.peek() {
            Some(Token::Not) => {
                self.enter()?;
                let inner = self.parse_unary()?;
                self.depth -= 1;
                Ok(Expr::Not(Box::new(inner)))
            }
            Some(Token::LParen) => {
                self.enter()?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                match self.next()? {
                    (Token::RParen, _) => Ok(inner),
                    (other, pos) => Err(QueryError::UnexpectedToken {
                        found: other.describe(),
                        pos,
                    }),
                }
            }
            _ => self.parse_compare(),
        }
    }

    fn parse_compare(&mut self) -> Result<Expr, QueryError> {
        let lhs = self.parse_operand()?;
        match self.next()? {
            (Token::Cmp(op), _) => {
                let rhs = self.parse_operand()?;
                Ok(Expr::Cmp { lhs, op, rhs })
            }
            (Token::Match { negate }, _) => match self.next()? {
                (Token::Str(pattern), _) => {
                    let regex = Regex::new(&pattern).map_err(|e| QueryError::InvalidRegex {
                        pattern: pattern.clone(),
                        message: e.to_string(),
                    })?;
                    Ok(Expr::Match {
                        operand: lhs,
                        regex,
                        negate,
                    })
                }
                (other, pos) => Err(QueryError::UnexpectedToken {
                    found: other.describe(),
                    pos,
                }),
            },
            (other, pos) => Err(QueryError::UnexpectedToken {
                found: other.describe(),
                pos,
            }),
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, QueryError> {
        match self.next()? {
            (Token::Ident(name), pos) => self
                .catalog
                .offset(&name)
                .map(Operand::Column)
                .ok_or(QueryError::UnknownColumn { name, pos }),
            (Token::Str(text), _) | (Token::Num(text), _) => {
                Ok(Operand::Literal(Literal::new(text)))
            }
            (other, pos) => Err(QueryError::UnexpectedToken {
                found: other.describe(),
                pos,
            }),
        }
    }
}

// === Compiled form ===

/// Compiles query text against one column catalog
pub struct QueryCompiler<'a> {
    catalog: &'a ColumnCatalog,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(catalog: &'a ColumnCatalog) -> Self {
        Self { catalog }
    }

    pub fn compile(&self, text: &str) -> Result<CompiledQuery, QueryError> {
        let tokens = tokenize(text)?;
        if tokens.is_empty() {
            return Err(QueryError::Empty);
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
            catalog: self.catalog,
        };
        let expr = parser.parse_or()?;
        if let Some((token, pos)) = parser.tokens.get(parser.pos) {
            return Err(QueryError::UnexpectedToken {
                found: token.describe(),
                pos: *pos,
            });
        }

        Ok(CompiledQuery {
            expr,
            source: text.to_string(),
        })
    }

    /// Compile and evaluate over every row of `store`
    pub fn compile_and_run(
        store: &TabularStore,
        text: &str,
    ) -> Result<(CompiledQuery, InclusionMask), QueryError> {
        let query = QueryCompiler::new(store.catalog()).compile(text)?;
        let mask = query.run(store);
        Ok((query, mask))
    }
}

/// A query resolved to column offsets, ready for per-row evaluation
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    expr: Expr,
    source: String,
}

impl CompiledQuery {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against one annotation row
    pub fn evaluate(&self, row: &[String]) -> bool {
        eval(&self.expr, row)
    }

    pub fn run(&self, store: &TabularStore) -> InclusionMask {
        let rows = store.rows();
        InclusionMask::from_predicate(store.mask_len(), |r| self.evaluate(&rows[r]))
    }
}

fn eval(expr: &Expr, row: &[String]) -> bool {
    match expr {
        Expr::And(terms) => terms.iter().all(|e| eval(e, row)),
        Expr::Or(terms) => terms.iter().any(|e| eval(e, row)),
        Expr::Not(e) => !eval(e, row),
        Expr::Cmp { lhs, op, rhs } => {
            let (Some(l), Some(r)) = (resolve(lhs, row), resolve(rhs, row)) else {
                return false;
            };
            op.test(compare(&l, &r))
        }
        Expr::Match {
            operand,
            regex,
            negate,
        } => match resolve(operand, row) {
            Some(v) => regex.is_match(v.text) != *negate,
            None => false,
        },
    }
}

struct Value<'a> {
    text: &'a str,
    number: Option<f64>,
}

#[inline]
fn resolve<'a>(operand: &'a Operand, row: &'a [String]) -> Option<Value<'a>> {
    match operand {
        Operand::Column(c) => row.get(*c).map(|s| Value {
            text: s.as_str(),
            number: parse_number(s),
        }),
        Operand::Literal(lit) => Some(Value {
            text: &lit.text,
            number: lit.number,
        }),
    }
}

/// Finite numbers only; "NaN" and "inf" stay text
#[inline]
fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

#[inline]
fn compare(l: &Value<'_>, r: &Value<'_>) -> Option<Ordering> {
    match (l.number, r.number) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        (None, None) => Some(l.text.cmp(r.text)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VarSiftConfig;

    fn catalog() -> ColumnCatalog {
        ColumnCatalog::new(
            ["Chr", "refseq", "type", "RS#", "CDPred_score", "Var Count"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            "Comments",
        )
        .unwrap()
    }

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn compile(text: &str) -> Result<CompiledQuery, QueryError> {
        let catalog = catalog();
        QueryCompiler::new(&catalog).compile(text)
    }

    #[test]
    fn test_string_equality() {
        let q = compile(r#"type == "Stop""#).unwrap();
        assert!(q.evaluate(&row(&["chr1", "A", "Stop", "-", "1", "0"])));
        assert!(!q.evaluate(&row(&["chr1", "A", "NC", "-", "1", "0"])));
    }

    #[test]
    fn test_numeric_comparison() {
        let q = compile("CDPred_score >= 2.5").unwrap();
        assert!(q.evaluate(&row(&["chr1", "A", "Stop", "-", "10", "0"])));
        assert!(q.evaluate(&row(&["chr1", "A", "Stop", "-", "2.50", "0"])));
        // textual comparison would say "10" < "2.5"
        assert!(!q.evaluate(&row(&["chr1", "A", "Stop", "-", "-3", "0"])));
    }

    #[test]
    fn test_logic_and_precedence() {
        let q = compile(r#"type == "Stop" || type == "NC" && `RS#` == "-""#).unwrap();
        // && binds tighter than ||
        assert!(q.evaluate(&row(&["chr1", "A", "Stop", "rs1", "0", "0"])));
        assert!(!q.evaluate(&row(&["chr1", "A", "NC", "rs1", "0", "0"])));
        assert!(q.evaluate(&row(&["chr1", "A", "NC", "-", "0", "0"])));

        let q = compile(r#"not (type = 'Stop' or Chr == "chr2")"#).unwrap();
        assert!(q.evaluate(&row(&["chr1", "A", "NC", "-", "0", "0"])));
        assert!(!q.evaluate(&row(&["chr2", "A", "NC", "-", "0", "0"])));
    }

    #[test]
    fn test_identifier_with_hash_and_quoted_identifier() {
        assert!(compile(r#"RS# != "-""#).is_ok());
        assert!(compile("`Var Count` > 1").is_ok());
    }

    #[test]
    fn test_column_to_column() {
        let q = compile("Chr == refseq").unwrap();
        assert!(q.evaluate(&row(&["x", "x", "", "", "", ""])));
        assert!(!q.evaluate(&row(&["x", "y", "", "", "", ""])));
    }

    #[test]
    fn test_regex_match() {
        let q = compile(r#"refseq =~ "^BRCA[12]$""#).unwrap();
        assert!(q.evaluate(&row(&["chr1", "BRCA2", "", "", "", ""])));
        assert!(!q.evaluate(&row(&["chr1", "BRCA3", "", "", "", ""])));

        let q = compile(r#"refseq !~ "^BRCA""#).unwrap();
        assert!(q.evaluate(&row(&["chr1", "TP53", "", "", "", ""])));
    }

    #[test]
    fn test_unknown_column() {
        let err = compile(r#"gene == "BRCA1""#).unwrap_err();
        assert_eq!(
            err,
            QueryError::UnknownColumn {
                name: "gene".to_string(),
                pos: 0
            }
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(compile("").unwrap_err(), QueryError::Empty);
        assert_eq!(compile("type ==").unwrap_err(), QueryError::UnexpectedEnd);
        assert!(matches!(
            compile(r#"type == "Stop"#).unwrap_err(),
            QueryError::UnterminatedString { pos: 8 }
        ));
        assert!(matches!(
            compile("type == 1 1").unwrap_err(),
            QueryError::UnexpectedToken { pos: 10, .. }
        ));
        assert!(matches!(
            compile("type $ 1").unwrap_err(),
            QueryError::UnexpectedChar { ch: '$', pos: 5 }
        ));
        assert!(matches!(
            compile("(type == 1").unwrap_err(),
            QueryError::UnexpectedEnd
        ));
        assert!(matches!(
            compile(r#"refseq =~ "(""#).unwrap_err(),
            QueryError::InvalidRegex { .. }
        ));
        assert!(matches!(
            compile("refseq =~ 5").unwrap_err(),
            QueryError::UnexpectedToken { .. }
        ));
    }

    #[test]
    fn test_non_finite_cells_are_not_numbers() {
        for cell in ["NaN", "inf", "-infinity"] {
            let r = row(&["chr1", "A", "Stop", "-", cell, "0"]);
            assert!(!compile("CDPred_score == 5").unwrap().evaluate(&r));
            assert!(!compile("CDPred_score >= 1000").unwrap().evaluate(&r));
            assert!(!compile("CDPred_score <= 5").unwrap().evaluate(&r));
            assert!(compile("CDPred_score != 5").unwrap().evaluate(&r));
        }
        let r = row(&["chr1", "A", "Stop", "-", "NaN", "0"]);
        assert!(compile(r#"CDPred_score == "NaN""#).unwrap().evaluate(&r));
    }

    #[test]
    fn test_number_against_text() {
        let q = compile("type < 5").unwrap();
        assert!(!q.evaluate(&row(&["chr1", "A", "Stop", "-", "1", "0"])));
        let q = compile("type != 5").unwrap();
        assert!(q.evaluate(&row(&["chr1", "A", "Stop", "-", "1", "0"])));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}type == \"x\"", "(".repeat(20_000));
        assert!(matches!(compile(&deep), Err(QueryError::TooDeep { .. })));

        let negations = "!".repeat(200_000);
        assert!(matches!(
            compile(&negations),
            Err(QueryError::TooDeep { pos: MAX_DEPTH })
        ));

        let nested = format!(
            "{}type == \"Stop\"{}",
            "(".repeat(MAX_DEPTH),
            ")".repeat(MAX_DEPTH)
        );
        let q = compile(&nested).unwrap();
        assert!(q.evaluate(&row(&["chr1", "A", "Stop", "-", "1", "0"])));
    }

    #[test]
    fn test_long_chains_stay_flat() {
        let and_chain = vec![r#"type == "Stop""#; 100_000].join(" && ");
        let q = compile(&and_chain).unwrap();
        assert!(q.evaluate(&row(&["chr1", "A", "Stop", "-", "1", "0"])));
        assert!(!q.evaluate(&row(&["chr1", "A", "NC", "-", "1", "0"])));

        let or_chain = vec![r#"type == "x""#; 100_000].join(" || ");
        let q = compile(&format!("{} || Chr == \"chr1\"", or_chain)).unwrap();
        assert!(q.evaluate(&row(&["chr1", "A", "Stop", "-", "1", "0"])));
    }

    #[test]
    fn test_run_over_store() {
        let text = "Chr\ttype\nchr1\tStop\nchr2\tNC\nchr3\tStop\n";
        let store = TabularStore::parse(text, &VarSiftConfig::default()).unwrap();
        let (query, mask) = QueryCompiler::compile_and_run(&store, r#"type == "Stop""#).unwrap();

        assert_eq!(query.source(), r#"type == "Stop""#);
        assert_eq!(mask.len(), 3);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![0, 2]);
    }
}
