//! Evaluation of action filter formulas such as `(A or B) and not C`.
//!
//! Formula ids are runs of uppercase letters; `and`, `or` and `not` bind in
//! the usual order (`not` tightest, `or` loosest).

use std::collections::HashMap;
use thiserror::Error;

/// Deepest nesting of `not` and parentheses a formula may use.
const MAX_DEPTH: usize = 128;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("formula references unknown condition '{0}'")]
    UnknownId(String),

    #[error("invalid formula '{formula}': {reason}")]
    Syntax { formula: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Id(String),
    And,
    Or,
    Not,
    Open,
    Close,
}

/// Evaluates `formula` with each formula id replaced by its condition result.
pub fn evaluate(formula: &str, values: &HashMap<String, bool>) -> Result<bool, FormulaError> {
    let tokens = tokenize(formula)?;
    let mut parser = Parser {
        formula,
        tokens,
        pos: 0,
        depth: 0,
        values,
    };
    let result = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.syntax("unexpected trailing input"));
    }
    Ok(result)
}

fn tokenize(formula: &str) -> Result<Vec<Token>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = formula.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '(' => {
                tokens.push(Token::Open);
                chars.next();
            }
            ')' => {
                tokens.push(Token::Close);
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if !c.is_ascii_alphabetic() {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                let token = if word.chars().all(|c| c.is_ascii_uppercase()) {
                    Token::Id(word)
                } else {
                    match word.to_ascii_lowercase().as_str() {
                        "and" => Token::And,
                        "or" => Token::Or,
                        "not" => Token::Not,
                        _ => {
                            return Err(FormulaError::Syntax {
                                formula: formula.to_string(),
                                reason: format!("unknown word '{}'", word),
                            })
                        }
                    }
                };
                tokens.push(token);
            }
            other => {
                return Err(FormulaError::Syntax {
                    formula: formula.to_string(),
                    reason: format!("unexpected character '{}'", other),
                })
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    formula: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    values: &'a HashMap<String, bool>,
}

impl Parser<'_> {
    fn syntax(&self, reason: &str) -> FormulaError {
        FormulaError::Syntax {
            formula: self.formula.to_string(),
            reason: reason.to_string(),
        }
    }

    fn next_if(&mut self, expected: &Token) -> bool {
        if self.tokens.get(self.pos) == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or_expr(&mut self) -> Result<bool, FormulaError> {
        let mut result = self.and_expr()?;
        while self.next_if(&Token::Or) {
            let rhs = self.and_expr()?;
            result = result || rhs;
        }
        Ok(result)
    }

    fn and_expr(&mut self) -> Result<bool, FormulaError> {
        let mut result = self.not_expr()?;
        while self.next_if(&Token::And) {
            let rhs = self.not_expr()?;
            result = result && rhs;
        }
        Ok(result)
    }

    fn descend(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.syntax("nested too deeply"));
        }
        Ok(())
    }

    fn not_expr(&mut self) -> Result<bool, FormulaError> {
        if self.next_if(&Token::Not) {
            self.descend()?;
            let result = !self.not_expr()?;
            self.depth -= 1;
            return Ok(result);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<bool, FormulaError> {
        match self.tokens.get(self.pos).cloned() {
            Some(Token::Id(id)) => {
                self.pos += 1;
                self.values
                    .get(&id)
                    .copied()
                    .ok_or(FormulaError::UnknownId(id))
            }
            Some(Token::Open) => {
                self.pos += 1;
                self.descend()?;
                let result = self.or_expr()?;
                if !self.next_if(&Token::Close) {
                    return Err(self.syntax("missing ')'"));
                }
                self.depth -= 1;
                Ok(result)
            }
            Some(_) => Err(self.syntax("expected a condition or '('")),
            None => Err(self.syntax("unexpected end of formula")),
        }
    }
}
