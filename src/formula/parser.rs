//! Expression parser for formula rows.
//!
//! Grammar:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | primary
//! primary := NUMBER | '[' LABEL ']' | IDENT '(' expr (',' expr)* ')' | '(' expr ')'
//! ```

use super::FormulaError;
use std::fmt;

/// Deepest expression tree the parser accepts. Evaluation and drop recurse
/// over the tree, so this also bounds their stack use.
pub const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Max,
    Min,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "max" => Some(Function::Max),
            "min" => Some(Function::Min),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Ref(String),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Labels referenced by this expression, in order of appearance.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'e>(&'e self, out: &mut Vec<&'e str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Ref(label) => out.push(label),
            Expr::Neg(inner) => inner.collect_references(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_references(out);
                rhs.collect_references(out);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_references(out);
                }
            }
        }
    }

    pub fn eval<F>(&self, resolve: &F) -> Result<f64, FormulaError>
    where
        F: Fn(&str) -> f64,
    {
        let value = match self {
            Expr::Number(n) => *n,
            Expr::Ref(label) => resolve(label),
            Expr::Neg(inner) => -inner.eval(resolve)?,
            Expr::Binary { op, lhs, rhs } => {
                let l = lhs.eval(resolve)?;
                let r = rhs.eval(resolve)?;
                match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => {
                        if r == 0.0 {
                            return Err(FormulaError::DivisionByZero);
                        }
                        l / r
                    }
                }
            }
            Expr::Call { function, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.eval(resolve)?);
                }
                match function {
                    Function::Max => values.into_iter().fold(f64::NEG_INFINITY, f64::max),
                    Function::Min => values.into_iter().fold(f64::INFINITY, f64::min),
                }
            }
        };

        if !value.is_finite() {
            return Err(FormulaError::NonFinite);
        }
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ref(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Ref(label) => write!(f, "[{}]", label),
            Token::Ident(name) => write!(f, "{}", name),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' | '-' | '*' | '/' | '(' | ')' | ',' => {
                chars.next();
                let token = match ch {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    _ => Token::Comma,
                };
                tokens.push((pos, token));
            }
            '[' => {
                chars.next();
                let mut label = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    label.push(c);
                }
                if !closed {
                    return Err(FormulaError::UnterminatedReference { position: pos });
                }
                let label = label.trim();
                if label.is_empty() {
                    return Err(FormulaError::EmptyReference { position: pos });
                }
                tokens.push((pos, Token::Ref(label.to_string())));
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut literal = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        literal.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| FormulaError::InvalidNumber(literal.clone()))?;
                tokens.push((pos, Token::Number(value)));
            }
            c if c.is_alphabetic() => {
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push((pos, Token::Ident(name)));
            }
            other => {
                return Err(FormulaError::UnexpectedCharacter {
                    character: other,
                    position: pos,
                })
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    cursor: usize,
    /// Current recursion depth through `unary` and bracketed sub-expressions.
    depth: usize,
}

/// A parsed sub-expression together with the height of its tree.
type Parsed = (Expr, usize);

fn grown(height: usize) -> Result<usize, FormulaError> {
    if height > MAX_NESTING {
        return Err(FormulaError::NestingTooDeep { limit: MAX_NESTING });
    }
    Ok(height)
}

impl Parser {
    fn enter(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(FormulaError::NestingTooDeep { limit: MAX_NESTING });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(_, t)| t)
    }

    fn advance(&mut self) -> Option<(usize, Token)> {
        let next = self.tokens.get(self.cursor).cloned();
        if next.is_some() {
            self.cursor += 1;
        }
        next
    }

    fn expect(&mut self, expected: Token) -> Result<(), FormulaError> {
        match self.advance() {
            Some((_, token)) if token == expected => Ok(()),
            Some((position, token)) => Err(FormulaError::UnexpectedToken {
                found: token.to_string(),
                position,
            }),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }

    fn expr(&mut self) -> Result<Parsed, FormulaError> {
        let (mut lhs, mut height) = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let (rhs, rhs_height) = self.term()?;
            height = grown(height.max(rhs_height) + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok((lhs, height))
    }

    fn term(&mut self) -> Result<Parsed, FormulaError> {
        let (mut lhs, mut height) = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let (rhs, rhs_height) = self.unary()?;
            height = grown(height.max(rhs_height) + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok((lhs, height))
    }

    fn unary(&mut self) -> Result<Parsed, FormulaError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                self.enter()?;
                let (inner, height) = self.unary()?;
                self.leave();
                Ok((Expr::Neg(Box::new(inner)), grown(height + 1)?))
            }
            Some(Token::Plus) => {
                self.advance();
                self.enter()?;
                let parsed = self.unary()?;
                self.leave();
                Ok(parsed)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Parsed, FormulaError> {
        match self.advance() {
            Some((_, Token::Number(n))) => Ok((Expr::Number(n), 1)),
            Some((_, Token::Ref(label))) => Ok((Expr::Ref(label), 1)),
            Some((_, Token::LParen)) => {
                self.enter()?;
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                self.leave();
                Ok(inner)
            }
            Some((_, Token::Ident(name))) => {
                let function = Function::from_name(&name)
                    .ok_or_else(|| FormulaError::UnknownFunction(name.clone()))?;
                self.expect(Token::LParen)?;
                if self.peek() == Some(&Token::RParen) {
                    return Err(FormulaError::MissingArguments(name));
                }
                self.enter()?;
                let (first, mut height) = self.expr()?;
                let mut args = vec![first];
                while self.peek() == Some(&Token::Comma) {
                    self.advance();
                    let (arg, arg_height) = self.expr()?;
                    height = height.max(arg_height);
                    args.push(arg);
                }
                self.expect(Token::RParen)?;
                self.leave();
                Ok((Expr::Call { function, args }, grown(height + 1)?))
            }
            Some((position, token)) => Err(FormulaError::UnexpectedToken {
                found: token.to_string(),
                position,
            }),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }
}

pub fn parse(source: &str) -> Result<Expr, FormulaError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(FormulaError::EmptyExpression);
    }

    let mut parser = Parser {
        tokens,
        cursor: 0,
        depth: 0,
    };
    let (expr, _) = parser.expr()?;

    if let Some((position, token)) = parser.advance() {
        return Err(FormulaError::UnexpectedToken {
            found: token.to_string(),
            position,
        });
    }

    Ok(expr)
}
