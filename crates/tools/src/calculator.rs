//! Calculator tool: evaluates arithmetic expressions.
//!
//! Supports `+`, `-`, `*`, `/`, `%`, `^` (right-associative), parentheses,
//! unary minus, and decimal numbers. Recursive descent over a token list.

use serde_json::Value;
use unison_core::error::ToolError;
use unison_core::tool::{ParamMap, ParamType, Tool, ToolParameter};

pub struct Calculator {
    params: Vec<ToolParameter>,
}

impl Calculator {
    pub fn new() -> Self {
        Self {
            params: vec![ToolParameter::new(
                "expression",
                "The arithmetic expression to evaluate, e.g. '(2 + 3) * 4'",
                ParamType::String,
            )],
        }
    }
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for Calculator {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports + - * / % ^, parentheses, and decimals."
    }

    fn parameters(&self) -> &[ToolParameter] {
        &self.params
    }

    fn run(&mut self, args: &ParamMap) -> Result<Value, ToolError> {
        let expr = args
            .get("expression")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("'expression' must be a string".into()))?;

        let value = evaluate(expr).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().to_string(),
            reason: format!("cannot evaluate '{expr}': {e}"),
            source: Some(Box::new(e)),
        })?;

        // Integral results render without a trailing `.0`.
        if value.fract() == 0.0 && value.abs() < 1e15 {
            Ok(Value::from(value as i64))
        } else {
            Ok(Value::from(value))
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalcError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unexpected token {0:?}")]
    UnexpectedToken(String),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NonFinite,

    #[error("expression nests deeper than {} levels", MAX_DEPTH)]
    TooDeep,
}

/// Nesting limit for parentheses, unary minus, and exponents.
pub const MAX_DEPTH: usize = 64;

/// Evaluate an arithmetic expression string.
pub fn evaluate(expr: &str) -> Result<f64, CalcError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(tok) = parser.peek() {
        return Err(CalcError::UnexpectedToken(format!("{tok:?}")));
    }
    if !value.is_finite() {
        return Err(CalcError::NonFinite);
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Op(char),
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>, CalcError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '+' | '-' | '*' | '/' | '%' | '^' => tokens.push(Token::Op(c)),
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, d)) = chars.peek() {
                    if !(d.is_ascii_digit() || d == '.') {
                        break;
                    }
                    end = i + d.len_utf8();
                    chars.next();
                }
                let text = &input[start..end];
                let n = text
                    .parse()
                    .map_err(|_| CalcError::InvalidNumber(text.to_string()))?;
                tokens.push(Token::Num(n));
            }
            c => return Err(CalcError::UnexpectedChar(c)),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    // expr = term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, CalcError> {
        let mut left = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            self.bump();
            let right = self.term()?;
            left = if op == '+' { left + right } else { left - right };
        }
        Ok(left)
    }

    // term = unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64, CalcError> {
        let mut left = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/' | '%'))) = self.peek() {
            self.bump();
            let right = self.unary()?;
            left = match op {
                '*' => left * right,
                _ if right == 0.0 => return Err(CalcError::DivisionByZero),
                '/' => left / right,
                _ => left % right,
            };
        }
        Ok(left)
    }

    // unary = '-' unary | power
    //
    // Every recursive path passes through here, so this is where nesting
    // is counted.
    fn unary(&mut self) -> Result<f64, CalcError> {
        if self.depth >= MAX_DEPTH {
            return Err(CalcError::TooDeep);
        }
        self.depth += 1;
        let value = if let Some(Token::Op('-')) = self.peek() {
            self.bump();
            self.unary().map(|v| -v)
        } else {
            self.power()
        };
        self.depth -= 1;
        value
    }

    // power = primary ('^' unary)?
    fn power(&mut self) -> Result<f64, CalcError> {
        let base = self.primary()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.bump();
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    // primary = NUMBER | '(' expr ')'
    fn primary(&mut self) -> Result<f64, CalcError> {
        match self.bump() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::Open) => {
                let value = self.expr()?;
                match self.bump() {
                    Some(Token::Close) => Ok(value),
                    Some(tok) => Err(CalcError::UnexpectedToken(format!("{tok:?}"))),
                    None => Err(CalcError::UnexpectedEnd),
                }
            }
            Some(tok) => Err(CalcError::UnexpectedToken(format!("{tok:?}"))),
            None => Err(CalcError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> ParamMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn precedence_and_parentheses() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("((1 + 2) * (3 + 4))").unwrap(), 21.0);
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), 512.0);
        assert_eq!(evaluate("-2 ^ 2").unwrap(), -4.0);
        assert_eq!(evaluate("2 ^ -1").unwrap(), 0.5);
    }

    #[test]
    fn modulo_and_division() {
        assert_eq!(evaluate("10 % 4").unwrap(), 2.0);
        assert_eq!(evaluate("10 / 4").unwrap(), 2.5);
        assert_eq!(evaluate("1 / 0"), Err(CalcError::DivisionByZero));
        assert_eq!(evaluate("1 % 0"), Err(CalcError::DivisionByZero));
    }

    #[test]
    fn malformed_input() {
        assert_eq!(evaluate("2 +"), Err(CalcError::UnexpectedEnd));
        assert_eq!(evaluate(""), Err(CalcError::UnexpectedEnd));
        assert_eq!(evaluate("2 $ 3"), Err(CalcError::UnexpectedChar('$')));
        assert!(matches!(evaluate("1.2.3"), Err(CalcError::InvalidNumber(_))));
        assert!(matches!(evaluate("(1 + 2"), Err(CalcError::UnexpectedEnd)));
        assert!(matches!(evaluate("1 2"), Err(CalcError::UnexpectedToken(_))));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let parens = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert_eq!(evaluate(&parens), Err(CalcError::TooDeep));
        let minus = format!("{}1", "-".repeat(10_000));
        assert_eq!(evaluate(&minus), Err(CalcError::TooDeep));
        let powers = format!("2{}", "^2".repeat(10_000));
        assert_eq!(evaluate(&powers), Err(CalcError::TooDeep));

        let shallow = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(evaluate(&shallow).unwrap(), 1.0);

        let mut tool = Calculator::new();
        let result = tool.execute(&args(json!({"expression": parens})));
        assert!(!result.success);
        assert!(result.error.unwrap().contains("nests deeper"));
    }

    #[test]
    fn tool_returns_integers_without_fraction() {
        let mut tool = Calculator::new();
        let result = tool.execute(&args(json!({"expression": "10 / 2"})));
        assert!(result.success);
        assert_eq!(result.text().as_deref(), Some("5"));
    }

    #[test]
    fn tool_returns_decimals() {
        let mut tool = Calculator::new();
        let result = tool.execute(&args(json!({"expression": "10 / 3"})));
        assert!(result.text().unwrap().starts_with("3.333"));
    }

    #[test]
    fn tool_reports_evaluation_error() {
        let mut tool = Calculator::new();
        let result = tool.execute(&args(json!({"expression": "1 / 0"})));
        assert!(!result.success);
        assert!(result.error.unwrap().contains("calculator"));
    }

    #[test]
    fn tool_requires_expression() {
        let mut tool = Calculator::new();
        let result = tool.execute(&ParamMap::new());
        assert!(!result.success);
        assert!(result.error.unwrap().contains("'expression'"));
    }
}
