//! Pratt parser for substituted formulas and the `interp` entry point.
//!
//! The parser accepts closed arithmetic: numbers, the builtin constants and
//! functions, operators and parentheses. Variable names are expected to have
//! been replaced by values before text reaches this module.

use bumpalo::Bump;

use crate::Real;
use crate::error::{ExprError, Result};
use crate::eval::eval_ast;
use crate::lexer::{Lexer, Token};
use crate::types::{AstExpr, LogicalOperator, TokenKind};

/// Bounds applied while parsing one formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    /// Longest accepted input, in bytes.
    pub max_len: usize,
    /// Deepest accepted nesting of sub-expressions.
    pub max_depth: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_len: 10_000,
            max_depth: 500,
        }
    }
}

/// Token binding powers for the Pratt parser
#[derive(Debug, Clone, Copy)]
struct BindingPower {
    left: u8,
    right: u8,
}

impl BindingPower {
    const fn new(left: u8, right: u8) -> Self {
        Self { left, right }
    }

    // For left-associative operators, right binding power is left + 1
    const fn left_assoc(power: u8) -> Self {
        Self::new(power, power + 1)
    }

    // For right-associative operators, right binding power is same as left
    const fn right_assoc(power: u8) -> Self {
        Self::new(power, power)
    }
}

const PREFIX_BINDING_POWER: u8 = 14; // lower than ^ so -2^2 == -(2^2)

struct PrattParser<'input, 'arena> {
    lexer: Lexer<'input>,
    current: Option<Token>,
    arena: &'arena Bump,
    depth: usize,
    max_depth: usize,
}

impl<'input, 'arena> PrattParser<'input, 'arena> {
    fn new(input: &'input str, arena: &'arena Bump, max_depth: usize) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            arena,
            depth: 0,
            max_depth,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.current.as_ref()
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.current.take();
        self.current = self.lexer.next_token();
        tok
    }

    fn peek_is(&self, kind: TokenKind, text: &str) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == kind && t.text.as_deref() == Some(text))
    }

    fn describe(tok: &Token) -> String {
        tok.text.clone().unwrap_or_else(|| "unknown".to_string())
    }

    fn tokenizer_error(tok: &Token) -> ExprError {
        ExprError::Tokenizer(format!(
            "unexpected '{}' at position {}",
            Self::describe(tok),
            tok.position
        ))
    }

    fn infix_binding_power(op: &str) -> Option<BindingPower> {
        match op {
            "||" => Some(BindingPower::left_assoc(2)),
            "&&" => Some(BindingPower::left_assoc(3)),
            "==" | "!=" | "<" | ">" | "<=" | ">=" => Some(BindingPower::left_assoc(7)),
            "+" | "-" => Some(BindingPower::left_assoc(9)),
            "*" | "/" | "%" => Some(BindingPower::left_assoc(10)),
            "^" => Some(BindingPower::right_assoc(15)),
            "**" => Some(BindingPower::right_assoc(16)),
            _ => None,
        }
    }

    fn alloc_name(&self, name: &str) -> &'arena str {
        self.arena.alloc_str(name)
    }

    fn node(&self, name: &str, args: &[AstExpr<'arena>]) -> AstExpr<'arena> {
        AstExpr::Function {
            name: self.alloc_name(name),
            namespace: None,
            args: self.arena.alloc_slice_copy(args),
        }
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<AstExpr<'arena>> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ExprError::RecursionLimit(format!(
                "Expression too complex: exceeded maximum nesting depth of {}",
                self.max_depth
            )));
        }

        let mut lhs = self.parse_prefix_or_primary()?;

        loop {
            let op = match self.peek() {
                Some(tok) if tok.kind == TokenKind::Operator => Self::describe(tok),
                Some(tok) if tok.kind == TokenKind::Error => return Err(Self::tokenizer_error(tok)),
                _ => break,
            };
            let Some(bp) = Self::infix_binding_power(&op) else {
                break;
            };
            if bp.left < min_bp {
                break;
            }
            self.next();

            if self.peek().is_none() {
                return Err(ExprError::Syntax(format!(
                    "Expected expression after '{op}' but found end of input"
                )));
            }
            let rhs = self.parse_expr_bp(bp.right)?;

            lhs = match op.as_str() {
                "&&" | "||" => {
                    let op = if op == "&&" {
                        LogicalOperator::And
                    } else {
                        LogicalOperator::Or
                    };
                    AstExpr::LogicalOp {
                        op,
                        left: self.arena.alloc(lhs),
                        right: self.arena.alloc(rhs),
                    }
                }
                _ => self.node(&op, &[lhs, rhs]),
            };
        }

        self.depth -= 1;
        Ok(lhs)
    }

    fn parse_prefix_or_primary(&mut self) -> Result<AstExpr<'arena>> {
        let prefix = match self.peek() {
            Some(tok) if tok.kind == TokenKind::Operator => match tok.text.as_deref() {
                Some("-") => Some("neg"),
                Some("!") => Some("not"),
                Some("+") => Some("+"),
                _ => None,
            },
            _ => None,
        };

        let Some(prefix) = prefix else {
            return self.parse_primary();
        };
        let op_tok = self.next();
        if self.peek().is_none() {
            let position = op_tok.map(|t| t.position).unwrap_or(0);
            return Err(ExprError::Syntax(format!(
                "Expected expression after prefix operator at position {position}"
            )));
        }
        let rhs = self.parse_expr_bp(PREFIX_BINDING_POWER)?;
        if prefix == "+" {
            // Unary + is a no-op
            return Ok(rhs);
        }
        Ok(self.node(prefix, &[rhs]))
    }

    fn parse_primary(&mut self) -> Result<AstExpr<'arena>> {
        let Some(tok) = self.next() else {
            return Err(ExprError::Syntax("Unexpected end of input".to_string()));
        };

        match tok.kind {
            TokenKind::Number => Ok(AstExpr::Constant(tok.value.unwrap_or(0.0))),
            TokenKind::Variable => {
                let name = tok.text.unwrap_or_default();
                self.parse_name(&name)
            }
            TokenKind::Open => self.parse_parenthesized(tok.position),
            TokenKind::Close => Err(ExprError::Syntax(format!(
                "Unexpected closing parenthesis at position {}",
                tok.position
            ))),
            TokenKind::Error => Err(Self::tokenizer_error(&tok)),
            TokenKind::Operator | TokenKind::Separator => Err(ExprError::Syntax(format!(
                "Unexpected token at position {}: '{}'",
                tok.position,
                Self::describe(&tok)
            ))),
        }
    }

    /// A name, optionally qualified (`math.sqrt`) and optionally called.
    fn parse_name(&mut self, first: &str) -> Result<AstExpr<'arena>> {
        let mut namespace = None;
        let mut name = self.alloc_name(first);

        if self.peek_is(TokenKind::Operator, ".") {
            let dot = self.next();
            match self.next() {
                Some(attr) if attr.kind == TokenKind::Variable => {
                    namespace = Some(name);
                    name = self.alloc_name(attr.text.as_deref().unwrap_or_default());
                }
                _ => {
                    return Err(ExprError::Syntax(format!(
                        "Expected attribute name after '.' at position {}",
                        dot.map(|t| t.position).unwrap_or(0)
                    )));
                }
            }
        }

        if self.peek_is(TokenKind::Open, "(") {
            let args = self.parse_call_arguments()?;
            return Ok(AstExpr::Function {
                name,
                namespace,
                args,
            });
        }

        Ok(match namespace {
            Some(base) => AstExpr::Attribute { base, attr: name },
            None => AstExpr::Variable(name),
        })
    }

    fn parse_call_arguments(&mut self) -> Result<&'arena [AstExpr<'arena>]> {
        let open_position = self.next().map(|t| t.position).unwrap_or(0); // consume '('
        let mut args = bumpalo::collections::Vec::new_in(self.arena);

        if self.peek().is_some_and(|t| t.kind == TokenKind::Close) {
            self.next();
            return Ok(args.into_bump_slice());
        }

        loop {
            args.push(self.parse_expr_bp(0)?);
            match self.next() {
                Some(tok) if tok.kind == TokenKind::Separator => continue,
                Some(tok) if tok.kind == TokenKind::Close => break,
                Some(tok) => {
                    return Err(ExprError::Syntax(format!(
                        "Expected ',' or ')' but found '{}' at position {} in function call",
                        Self::describe(&tok),
                        tok.position
                    )));
                }
                None => {
                    return Err(ExprError::UnmatchedParenthesis {
                        position: open_position,
                        found: "(".to_string(),
                    });
                }
            }
        }

        Ok(args.into_bump_slice())
    }

    fn parse_parenthesized(&mut self, open_position: usize) -> Result<AstExpr<'arena>> {
        let expr = self.parse_expr_bp(0)?;
        match self.next() {
            Some(tok) if tok.kind == TokenKind::Close => Ok(expr),
            Some(tok) => Err(ExprError::Syntax(format!(
                "Expected closing parenthesis ')' but found '{}' at position {} (opening at position {})",
                Self::describe(&tok),
                tok.position,
                open_position
            ))),
            None => Err(ExprError::UnmatchedParenthesis {
                position: open_position,
                found: "(".to_string(),
            }),
        }
    }

    fn parse(&mut self) -> Result<AstExpr<'arena>> {
        self.depth = 0;
        let expr = self.parse_expr_bp(0)?;

        if let Some(tok) = self.peek() {
            return Err(match tok.kind {
                TokenKind::Error => Self::tokenizer_error(tok),
                TokenKind::Close => ExprError::Syntax(format!(
                    "Unexpected closing parenthesis at position {}: check for balanced parentheses",
                    tok.position
                )),
                _ => ExprError::Syntax(format!(
                    "Unexpected token at position {}: '{}'",
                    tok.position,
                    Self::describe(tok)
                )),
            });
        }

        Ok(expr)
    }
}

/// Parse an expression string into an arena-allocated AST with default limits.
pub fn parse_expression<'arena>(input: &str, arena: &'arena Bump) -> Result<AstExpr<'arena>> {
    parse_expression_with_limits(input, arena, &ParseLimits::default())
}

/// Parse an expression string into an arena-allocated AST.
pub fn parse_expression_with_limits<'arena>(
    input: &str,
    arena: &'arena Bump,
    limits: &ParseLimits,
) -> Result<AstExpr<'arena>> {
    if input.len() > limits.max_len {
        return Err(ExprError::TooLong {
            len: input.len(),
            max: limits.max_len,
        });
    }
    PrattParser::new(input, arena, limits.max_depth).parse()
}

/// Parse and evaluate a closed arithmetic expression.
///
/// The raw value is returned: `1/0` yields infinity and `0/0` NaN. Callers
/// that require a finite result check it themselves.
///
/// ```
/// use fiche_rs::engine::interp;
///
/// assert_eq!(interp("2 + 3 * 4").unwrap(), 14.0);
/// assert_eq!(interp("math.pow(2, 10)").unwrap(), 1024.0);
/// assert_eq!(interp("3 > 2 && 1 < 0").unwrap(), 0.0);
/// ```
pub fn interp(input: &str) -> Result<Real> {
    interp_with_limits(input, &ParseLimits::default())
}

/// [`interp`] with explicit parse limits.
pub fn interp_with_limits(input: &str, limits: &ParseLimits) -> Result<Real> {
    let arena = Bump::new();
    let ast = parse_expression_with_limits(input, &arena, limits)?;
    eval_ast(&ast)
}
