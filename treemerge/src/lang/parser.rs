//! Recursive-descent parser for the demo grammar.
//!
//! The parser accepts a small class-based subset: an optional package
//! declaration, imports, classes with field and method members, statement
//! blocks, and an expression language with calls, binary operators and the
//! conditional operator. All declaration texts are canonicalized during
//! parsing so that printing is independent of input formatting.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::lang::ast::{JavaKind, JavaNode};
use crate::lang::lexer::{tokenize, Token, TokenKind};
use crate::lang::printer::expr_to_string;

/// Declaration modifiers recognized in front of classes and members.
const MODIFIERS: &[&str] = &[
    "public",
    "private",
    "protected",
    "static",
    "final",
    "abstract",
    "synchronized",
];

/// Binary operator precedence levels, loosest first.
const BINARY_LEVELS: &[&[&str]] = &[
    &["||"],
    &["&&"],
    &["==", "!="],
    &["<", ">", "<=", ">="],
    &["+", "-"],
    &["*", "/", "%"],
];

/// Parses a source file into a compilation unit.
pub fn parse_file(path: &Path) -> Result<JavaNode> {
    let source = fs::read_to_string(path)?;
    parse_str(&source)
}

/// Parses source text into a compilation unit.
///
/// Empty input parses to an empty compilation unit.
pub fn parse_str(source: &str) -> Result<JavaNode> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_unit()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn line(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn err(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            line: self.line(),
            message: message.into(),
        }
    }

    fn at_ident(&self, text: &str) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == TokenKind::Ident && t.text == text)
    }

    fn at_punct(&self, text: &str) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == TokenKind::Punct && t.text == text)
    }

    fn eat_punct(&mut self, text: &str) -> bool {
        if self.at_punct(text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, text: &str) -> Result<()> {
        if self.eat_punct(text) {
            Ok(())
        } else {
            Err(self.err(format!(
                "expected '{}', found '{}'",
                text,
                self.peek().map(|t| t.text.as_str()).unwrap_or("end of file")
            )))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Ident => Ok(self.advance().unwrap().text),
            _ => Err(self.err("expected identifier")),
        }
    }

    fn parse_unit(&mut self) -> Result<JavaNode> {
        let mut children = Vec::new();

        if self.at_ident("package") {
            self.advance();
            let name = self.parse_qualified_name()?;
            self.expect_punct(";")?;
            children.push(JavaNode::new(JavaKind::Package { name }));
        }

        let mut imports = Vec::new();
        while self.at_ident("import") {
            self.advance();
            let path = self.parse_import_path()?;
            self.expect_punct(";")?;
            imports.push(JavaNode::new(JavaKind::Import { path }));
        }
        children.push(JavaNode::with_children(JavaKind::ImportSection, imports));

        while self.peek().is_some() {
            children.push(self.parse_class()?);
        }

        Ok(JavaNode::with_children(JavaKind::CompilationUnit, children))
    }

    fn parse_qualified_name(&mut self) -> Result<String> {
        let mut name = self.expect_ident()?;
        while self.at_punct(".") {
            // Stop before `.*`, which only import paths accept.
            if self.peek_at(1).is_some_and(|t| t.text == "*") {
                break;
            }
            self.advance();
            name.push('.');
            name.push_str(&self.expect_ident()?);
        }
        Ok(name)
    }

    fn parse_import_path(&mut self) -> Result<String> {
        let mut path = self.expect_ident()?;
        while self.eat_punct(".") {
            path.push('.');
            if self.eat_punct("*") {
                path.push('*');
                break;
            }
            path.push_str(&self.expect_ident()?);
        }
        Ok(path)
    }

    fn parse_modifiers(&mut self) -> Vec<String> {
        let mut mods = Vec::new();
        while let Some(t) = self.peek() {
            if t.kind == TokenKind::Ident && MODIFIERS.contains(&t.text.as_str()) {
                mods.push(self.advance().unwrap().text);
            } else {
                break;
            }
        }
        mods
    }

    fn parse_class(&mut self) -> Result<JavaNode> {
        let mods = self.parse_modifiers();
        if !self.at_ident("class") {
            return Err(self.err("expected 'class'"));
        }
        self.advance();
        let name = self.expect_ident()?;

        let mut header = String::new();
        for m in &mods {
            header.push_str(m);
            header.push(' ');
        }
        header.push_str("class ");
        header.push_str(&name);

        if self.at_ident("extends") {
            self.advance();
            let superclass = self.parse_qualified_name()?;
            header.push_str(" extends ");
            header.push_str(&superclass);
        }
        if self.at_ident("implements") {
            self.advance();
            let mut interfaces = vec![self.parse_qualified_name()?];
            while self.eat_punct(",") {
                interfaces.push(self.parse_qualified_name()?);
            }
            header.push_str(" implements ");
            header.push_str(&interfaces.join(", "));
        }

        self.expect_punct("{")?;
        let mut members = Vec::new();
        while !self.at_punct("}") {
            if self.peek().is_none() {
                return Err(self.err("unterminated class body"));
            }
            members.push(self.parse_member(&name)?);
        }
        self.expect_punct("}")?;

        Ok(JavaNode::with_children(
            JavaKind::Class { name, header },
            members,
        ))
    }

    fn parse_member(&mut self, class_name: &str) -> Result<JavaNode> {
        let mods = self.parse_modifiers();
        let mods_prefix = if mods.is_empty() {
            String::new()
        } else {
            format!("{} ", mods.join(" "))
        };

        // Constructor: the class name directly followed by a parameter list.
        if self.at_ident(class_name) && self.peek_at(1).is_some_and(|t| t.text == "(") {
            let name = self.expect_ident()?;
            let params = self.parse_params()?;
            let signature = format!("{}{}({})", mods_prefix, name, params);
            let body = self.parse_block()?;
            return Ok(JavaNode::with_children(
                JavaKind::Method { signature },
                vec![body],
            ));
        }

        let ty = self.parse_type()?;
        let name = self.expect_ident()?;

        if self.at_punct("(") {
            let params = self.parse_params()?;
            let signature = format!("{}{} {}({})", mods_prefix, ty, name, params);
            let body = self.parse_block()?;
            Ok(JavaNode::with_children(
                JavaKind::Method { signature },
                vec![body],
            ))
        } else {
            let mut decl = format!("{}{} {}", mods_prefix, ty, name);
            if self.eat_punct("=") {
                let init = self.parse_expr()?;
                decl.push_str(" = ");
                decl.push_str(&expr_to_string(&init));
            }
            self.expect_punct(";")?;
            decl.push(';');
            Ok(JavaNode::new(JavaKind::Field { decl }))
        }
    }

    fn parse_type(&mut self) -> Result<String> {
        let mut ty = self.parse_qualified_name()?;
        while self.at_punct("[") {
            self.advance();
            self.expect_punct("]")?;
            ty.push_str("[]");
        }
        Ok(ty)
    }

    fn parse_params(&mut self) -> Result<String> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.at_punct(")") {
            let ty = self.parse_type()?;
            let name = self.expect_ident()?;
            params.push(format!("{} {}", ty, name));
            if !self.at_punct(")") {
                self.expect_punct(",")?;
            }
        }
        self.expect_punct(")")?;
        Ok(params.join(", "))
    }

    fn parse_block(&mut self) -> Result<JavaNode> {
        self.expect_punct("{")?;
        let mut statements = Vec::new();
        while !self.at_punct("}") {
            if self.peek().is_none() {
                return Err(self.err("unterminated block"));
            }
            statements.push(self.parse_statement()?);
        }
        self.expect_punct("}")?;
        Ok(JavaNode::with_children(JavaKind::Block, statements))
    }

    fn parse_statement(&mut self) -> Result<JavaNode> {
        if self.at_ident("return") {
            self.advance();
            if self.eat_punct(";") {
                return Ok(JavaNode::new(JavaKind::Return));
            }
            let expr = self.parse_expr()?;
            self.expect_punct(";")?;
            return Ok(JavaNode::with_children(JavaKind::Return, vec![expr]));
        }

        // Local variable declaration: a type followed by a name and '='.
        let checkpoint = self.pos;
        if self.peek().is_some_and(|t| t.kind == TokenKind::Ident) {
            if let Ok(ty) = self.parse_type() {
                if self.peek().is_some_and(|t| t.kind == TokenKind::Ident) {
                    let name = self.expect_ident()?;
                    if self.eat_punct("=") {
                        let init = self.parse_expr()?;
                        self.expect_punct(";")?;
                        return Ok(JavaNode::with_children(
                            JavaKind::VarDecl { ty, name },
                            vec![init],
                        ));
                    }
                    return Err(self.err("expected '=' in variable declaration"));
                }
            }
            self.pos = checkpoint;

            // Assignment: a qualified name followed by '='.
            if let Ok(lhs) = self.parse_qualified_name() {
                if self.eat_punct("=") {
                    let rhs = self.parse_expr()?;
                    self.expect_punct(";")?;
                    return Ok(JavaNode::with_children(
                        JavaKind::Assign { lhs },
                        vec![rhs],
                    ));
                }
            }
            self.pos = checkpoint;
        }

        let expr = self.parse_expr()?;
        self.expect_punct(";")?;
        Ok(JavaNode::with_children(JavaKind::ExprStmt, vec![expr]))
    }

    fn parse_expr(&mut self) -> Result<JavaNode> {
        let cond = self.parse_binary(0)?;
        if self.eat_punct("?") {
            let then = self.parse_expr()?;
            self.expect_punct(":")?;
            let otherwise = self.parse_expr()?;
            return Ok(JavaNode::with_children(
                JavaKind::Ternary,
                vec![cond, then, otherwise],
            ));
        }
        Ok(cond)
    }

    fn parse_binary(&mut self, level: usize) -> Result<JavaNode> {
        if level == BINARY_LEVELS.len() {
            return self.parse_primary();
        }

        let mut lhs = self.parse_binary(level + 1)?;
        loop {
            let op = match self.peek() {
                Some(t)
                    if t.kind == TokenKind::Punct
                        && BINARY_LEVELS[level].contains(&t.text.as_str()) =>
                {
                    self.advance().unwrap().text
                }
                _ => break,
            };
            let rhs = self.parse_binary(level + 1)?;
            lhs = JavaNode::with_children(JavaKind::Binary { op }, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<JavaNode> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Number => {
                let text = self.advance().unwrap().text;
                Ok(JavaNode::new(JavaKind::Literal { text }))
            }
            Some(t) if t.kind == TokenKind::Str => {
                let text = self.advance().unwrap().text;
                Ok(JavaNode::new(JavaKind::Literal { text }))
            }
            Some(t) if t.kind == TokenKind::Punct && t.text == "-" => {
                self.advance();
                match self.peek() {
                    Some(t) if t.kind == TokenKind::Number => {
                        let text = self.advance().unwrap().text;
                        Ok(JavaNode::new(JavaKind::Literal {
                            text: format!("-{}", text),
                        }))
                    }
                    _ => Err(self.err("expected number after unary '-'")),
                }
            }
            Some(t) if t.kind == TokenKind::Punct && t.text == "(" => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect_punct(")")?;
                Ok(JavaNode::with_children(JavaKind::Paren, vec![inner]))
            }
            Some(t) if t.kind == TokenKind::Ident => {
                if t.text == "true" || t.text == "false" || t.text == "null" {
                    let text = self.advance().unwrap().text;
                    return Ok(JavaNode::new(JavaKind::Literal { text }));
                }
                let name = self.parse_qualified_name()?;
                if self.at_punct("(") {
                    self.advance();
                    let mut args = Vec::new();
                    while !self.at_punct(")") {
                        args.push(self.parse_expr()?);
                        if !self.at_punct(")") {
                            self.expect_punct(",")?;
                        }
                    }
                    self.expect_punct(")")?;
                    Ok(JavaNode::with_children(JavaKind::Call { name }, args))
                } else {
                    Ok(JavaNode::new(JavaKind::Ident { name }))
                }
            }
            _ => Err(self.err("expected expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::printer::print;
    use crate::tree::GrammarNode;

    #[test]
    fn test_parse_empty_file() {
        let unit = parse_str("").unwrap();
        assert_eq!(unit.kind(), &JavaKind::CompilationUnit);
        // Only the empty import section.
        assert_eq!(unit.children().len(), 1);
        assert_eq!(print(&unit), "");
    }

    #[test]
    fn test_parse_and_print_canonical() {
        let source = "\
package demo;
import java.util.List;

public class Bag {
    private int n = 0;

    public int size() {
        return n;
    }
}
";
        let unit = parse_str(source).unwrap();
        assert_eq!(print(&unit), source);
    }

    #[test]
    fn test_formatting_is_normalized() {
        let messy = "package demo;import a.B;class C{int x=1;void f(){x=x+1;}}";
        let canonical = "\
package demo;
import a.B;

class C {
    int x = 1;

    void f() {
        x = x + 1;
    }
}
";
        let unit = parse_str(messy).unwrap();
        assert_eq!(print(&unit), canonical);
    }

    #[test]
    fn test_parse_expressions() {
        let unit = parse_str("class C { void f() { x = a + b * c; y = p ? q : r; } }").unwrap();
        let class = &unit.children()[1];
        let method = &class.children()[0];
        let block = &method.children()[0];
        assert_eq!(block.children().len(), 2);

        let assign = &block.children()[0];
        assert_eq!(assign.kind(), &JavaKind::Assign { lhs: "x".into() });
        // Precedence: a + (b * c)
        let rhs = &assign.children()[0];
        assert_eq!(rhs.kind(), &JavaKind::Binary { op: "+".into() });
        assert_eq!(
            rhs.children()[1].kind(),
            &JavaKind::Binary { op: "*".into() }
        );

        let ternary = &block.children()[1].children()[0];
        assert_eq!(ternary.kind(), &JavaKind::Ternary);
    }

    #[test]
    fn test_parse_constructor_and_calls() {
        let source = "\
class Bag {
    Bag(int capacity) {
        init(capacity, true);
    }
}
";
        let unit = parse_str(source).unwrap();
        let class = &unit.children()[1];
        let ctor = &class.children()[0];
        assert_eq!(
            ctor.kind(),
            &JavaKind::Method {
                signature: "Bag(int capacity)".into()
            }
        );
        assert_eq!(print(&unit), source);
    }

    #[test]
    fn test_parse_star_import() {
        let unit = parse_str("import java.util.*;\nclass C {\n}\n").unwrap();
        let imports = &unit.children()[0];
        assert_eq!(
            imports.children()[0].kind(),
            &JavaKind::Import {
                path: "java.util.*".into()
            }
        );
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = parse_str("class C {\n    int x =\n}").unwrap_err();
        match err {
            Error::Parse { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }
}
