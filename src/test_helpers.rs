use std::{cell::Cell, rc::Rc};

use crate::{Ast, Bindings, CompileError, ExpressionCompiler, NodeKind, NumberFn, ValuesFn};

/// Compiler for sums of names and numbers, such as `a + 2 + b`.
#[derive(Default)]
pub struct SumCompiler {
    pub echo_calls: Cell<usize>,
}

impl SumCompiler {
    fn terms(text: &str) -> Result<Vec<&str>, CompileError> {
        let mut terms = Vec::new();
        let mut position = 0;
        for term in text.split('+') {
            let term = term.trim();
            let valid = !term.is_empty()
                && (term.parse::<f64>().is_ok()
                    || term.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
            if !valid {
                return Err(CompileError::new(position, "bad term"));
            }
            terms.push(term);
            position += term.len() + 1;
        }
        Ok(terms)
    }
    fn leaf(id: usize, term: &str) -> Ast {
        let kind = if term.parse::<f64>().is_ok() {
            NodeKind::Literal(term.into())
        } else {
            NodeKind::Name(term.into())
        };
        Ast::leaf(id, kind, term)
    }
}

impl ExpressionCompiler for SumCompiler {
    fn parse(&self, text: &str) -> Result<Ast, CompileError> {
        let terms = Self::terms(text)?;
        if let [term] = terms[..] {
            return Ok(Self::leaf(0, term));
        }
        Ok(Ast {
            id: 0,
            kind: NodeKind::Operator("+".into()),
            template: vec!["#"; terms.len()].join("+"),
            children: terms
                .iter()
                .enumerate()
                .map(|(i, term)| Self::leaf(i + 1, term))
                .collect(),
        })
    }

    fn echo(&self, text: &str) -> Result<String, CompileError> {
        self.echo_calls.set(self.echo_calls.get() + 1);
        Ok(Self::terms(text)?.join("+"))
    }

    fn compile_number(&self, text: &str) -> Result<NumberFn, CompileError> {
        let value = text
            .trim()
            .parse::<f64>()
            .map_err(|e| CompileError::new(0, e.to_string()))?;
        Ok(Box::new(move || Ok(value)))
    }

    fn values_from_ast(&self, ast: &Ast) -> Result<ValuesFn, CompileError> {
        let ast = ast.clone();
        Ok(Rc::new(move |bindings: &Bindings| {
            let mut values = vec![0.0; ast.node_count()];
            let mut total = 0.0;
            for node in ast.walk().skip(usize::from(!ast.children.is_empty())) {
                let value = match &node.kind {
                    NodeKind::Name(key) => *bindings
                        .get(key)
                        .ok_or_else(|| CompileError::new(node.id, format!("unbound {key}")))?,
                    NodeKind::Literal(text) => text.parse().unwrap_or(f64::NAN),
                    _ => 0.0,
                };
                values[node.id] = value;
                total += value;
            }
            values[0] = total;
            Ok(values)
        }))
    }
}
