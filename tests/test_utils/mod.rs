#![allow(dead_code)]

use std::rc::Rc;

use exprflow::{
    Ast, Bindings, CompileError, ExpressionCompiler, NodeKind, NumberFn, ValuesFn,
};

/// Arithmetic over numbers, names, `+ - * / ^`, parentheses and one-argument functions.
#[derive(Default)]
pub struct Arith;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(String),
    Ident(String),
    Op(char),
    Open,
    Close,
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>, CompileError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some(&(i, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut s = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if !(c.is_ascii_digit() || c == '.') {
                    break;
                }
                s.push(c);
                chars.next();
            }
            tokens.push((i, Token::Number(s)));
        } else if c.is_alphabetic() || c == '_' {
            let mut s = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if !(c.is_alphanumeric() || c == '_') {
                    break;
                }
                s.push(c);
                chars.next();
            }
            tokens.push((i, Token::Ident(s)));
        } else {
            let token = match c {
                '+' | '-' | '*' | '/' | '^' => Token::Op(c),
                '(' => Token::Open,
                ')' => Token::Close,
                _ => return Err(CompileError::new(i, format!("unexpected `{c}`"))),
            };
            tokens.push((i, token));
            chars.next();
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }
    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(i, _)| *i)
    }
    fn error(&self, message: &str) -> CompileError {
        CompileError::new(self.position(), message)
    }
    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        t
    }

    fn binary(
        &mut self,
        ops: &[char],
        operand: fn(&mut Self) -> Result<Ast, CompileError>,
    ) -> Result<Ast, CompileError> {
        let mut lhs = operand(self)?;
        while let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            if !ops.contains(&op) {
                break;
            }
            self.pos += 1;
            let rhs = operand(self)?;
            lhs = node(NodeKind::Operator(op.into()), format!("#{op}#"), vec![lhs, rhs]);
        }
        Ok(lhs)
    }
    fn sum(&mut self) -> Result<Ast, CompileError> {
        self.binary(&['+', '-'], Self::product)
    }
    fn product(&mut self) -> Result<Ast, CompileError> {
        self.binary(&['*', '/'], Self::power)
    }
    fn power(&mut self) -> Result<Ast, CompileError> {
        let base = self.unary()?;
        if self.peek() == Some(&Token::Op('^')) {
            self.pos += 1;
            let exp = self.power()?;
            return Ok(node(NodeKind::Operator("^".into()), "#^#", vec![base, exp]));
        }
        Ok(base)
    }
    fn unary(&mut self) -> Result<Ast, CompileError> {
        if self.peek() == Some(&Token::Op('-')) {
            self.pos += 1;
            let operand = self.unary()?;
            return Ok(node(NodeKind::Operator("neg".into()), "-#", vec![operand]));
        }
        self.primary()
    }
    fn group(&mut self) -> Result<Ast, CompileError> {
        let inner = self.sum()?;
        match self.next() {
            Some(Token::Close) => Ok(inner),
            _ => Err(self.error("expected `)`")),
        }
    }
    fn primary(&mut self) -> Result<Ast, CompileError> {
        match self.next() {
            Some(Token::Number(n)) => {
                if n.parse::<f64>().is_err() {
                    return Err(self.error("bad number"));
                }
                Ok(node(NodeKind::Literal(n.clone()), n, vec![]))
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::Open) {
                    self.pos += 1;
                    let arg = self.group()?;
                    let template = format!("{name}(#)");
                    Ok(node(NodeKind::Func(name), template, vec![arg]))
                } else {
                    Ok(node(NodeKind::Name(name.clone()), name, vec![]))
                }
            }
            Some(Token::Open) => {
                let inner = self.group()?;
                Ok(node(NodeKind::Group, "(#)", vec![inner]))
            }
            _ => Err(self.error("expected a value")),
        }
    }
}

fn node(kind: NodeKind, template: impl Into<String>, children: Vec<Ast>) -> Ast {
    Ast {
        id: 0,
        kind,
        template: template.into(),
        children,
    }
}

fn number_ids(ast: &mut Ast, next: &mut usize) {
    ast.id = *next;
    *next += 1;
    for child in &mut ast.children {
        number_ids(child, next);
    }
}

fn eval(ast: &Ast, bindings: &Bindings, values: &mut [f64]) -> Result<f64, CompileError> {
    let args = ast
        .children
        .iter()
        .map(|c| eval(c, bindings, values))
        .collect::<Result<Vec<_>, _>>()?;
    let value = match &ast.kind {
        NodeKind::Literal(text) => text.parse().unwrap_or(f64::NAN),
        NodeKind::Name(name) => *bindings
            .get(name)
            .ok_or_else(|| CompileError::new(ast.id, format!("`{name}` is not bound")))?,
        NodeKind::Group => args[0],
        NodeKind::Func(f) => match f.as_str() {
            "sqrt" => args[0].sqrt(),
            "abs" => args[0].abs(),
            "sin" => args[0].sin(),
            "cos" => args[0].cos(),
            "ln" => args[0].ln(),
            _ => return Err(CompileError::new(ast.id, format!("unknown function `{f}`"))),
        },
        NodeKind::Operator(op) => match (op.as_str(), &args[..]) {
            ("neg", [a]) => -a,
            ("+", [a, b]) => a + b,
            ("-", [a, b]) => a - b,
            ("*", [a, b]) => a * b,
            ("/", [a, b]) => a / b,
            ("^", [a, b]) => a.powf(*b),
            _ => return Err(CompileError::new(ast.id, format!("bad operator `{op}`"))),
        },
    };
    values[ast.id] = value;
    Ok(value)
}

impl ExpressionCompiler for Arith {
    fn parse(&self, text: &str) -> Result<Ast, CompileError> {
        let tokens = tokenize(text)?;
        let mut p = Parser {
            tokens,
            pos: 0,
            end: text.len(),
        };
        let mut ast = p.sum()?;
        if p.peek().is_some() {
            return Err(p.error("unexpected token"));
        }
        number_ids(&mut ast, &mut 0);
        Ok(ast)
    }

    fn echo(&self, text: &str) -> Result<String, CompileError> {
        Ok(self.parse(text)?.render_text())
    }

    fn compile_number(&self, text: &str) -> Result<NumberFn, CompileError> {
        let ast = self.parse(text)?;
        if let Some(name) = ast.walk().find_map(Ast::name) {
            return Err(CompileError::new(0, format!("`{name}` is not a number")));
        }
        let values = self.values_from_ast(&ast)?;
        Ok(Box::new(move || Ok(values(&Bindings::new())?[0])))
    }

    fn values_from_ast(&self, ast: &Ast) -> Result<ValuesFn, CompileError> {
        let ast = ast.clone();
        Ok(Rc::new(move |bindings: &Bindings| {
            let mut values = vec![f64::NAN; ast.node_count()];
            eval(&ast, bindings, &mut values)?;
            Ok(values)
        }))
    }
}

pub fn arith() -> Rc<dyn ExpressionCompiler> {
    Rc::new(Arith)
}
