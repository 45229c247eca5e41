/// Kind of an expression tree node, with its key or text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Name(String),
    Literal(String),
    Func(String),
    Operator(String),
    Group,
}

/// Parsed expression tree.
///
/// `template` holds the source text of the node with one `#` per child, in order.
/// `id` indexes the vector produced by a values function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ast {
    pub id: usize,
    pub kind: NodeKind,
    pub template: String,
    pub children: Vec<Ast>,
}

impl Ast {
    pub fn leaf(id: usize, kind: NodeKind, template: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            template: template.into(),
            children: Vec::new(),
        }
    }

    /// Key of a `Name` node.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Name(key) => Some(key),
            _ => None,
        }
    }

    /// Depth-first pre-order traversal.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// Number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        self.walk().count()
    }

    /// Rebuild the source text by substituting each child for its `#` placeholder.
    ///
    /// Placeholders without a matching child are dropped.
    pub fn render_text(&self) -> String {
        let mut s = String::new();
        self.render_to(&mut s);
        s
    }
    fn render_to(&self, s: &mut String) {
        for (i, piece) in self.template.split('#').enumerate() {
            s.push_str(piece);
            if let Some(child) = self.children.get(i) {
                child.render_to(s);
            }
        }
    }
}

pub struct Walk<'a> {
    stack: Vec<&'a Ast>,
}
impl<'a> Iterator for Walk<'a> {
    type Item = &'a Ast;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(id: usize, key: &str) -> Ast {
        Ast::leaf(id, NodeKind::Name(key.into()), key)
    }

    fn sample() -> Ast {
        // (x + 1) * x
        let group = Ast {
            id: 1,
            kind: NodeKind::Group,
            template: "(#)".into(),
            children: vec![Ast {
                id: 2,
                kind: NodeKind::Operator("+".into()),
                template: "# + #".into(),
                children: vec![name(3, "x"), Ast::leaf(4, NodeKind::Literal("1".into()), "1")],
            }],
        };
        Ast {
            id: 0,
            kind: NodeKind::Operator("*".into()),
            template: "#*#".into(),
            children: vec![group, name(5, "x")],
        }
    }

    #[test]
    fn walk_is_pre_order() {
        let ids: Vec<_> = sample().walk().map(|n| n.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn walk_finds_names() {
        let ast = sample();
        let names: Vec<_> = ast.walk().filter_map(Ast::name).collect();
        assert_eq!(names, vec!["x", "x"]);
        assert_eq!(ast.node_count(), 6);
    }

    #[test]
    fn render_text_fills_placeholders() {
        assert_eq!(sample().render_text(), "(x + 1)*x");
    }

    #[test]
    fn render_text_drops_unmatched_placeholders() {
        let ast = Ast {
            id: 0,
            kind: NodeKind::Func("max".into()),
            template: "max(#, #)".into(),
            children: vec![name(1, "a")],
        };
        assert_eq!(ast.render_text(), "max(a, )");
    }
}
