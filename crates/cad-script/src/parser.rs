use crate::ScriptError;
use crate::ast::{Arg, BinaryOp, Expr, Item, Program, Statement, UnaryOp};
use crate::lexer::{Token, TokenKind};

/// Deepest expression tree the parser accepts. Keeps evaluation recursion
/// bounded for hostile input.
const MAX_NESTING: usize = 128;

#[derive(Debug)]
pub(crate) struct Parser {
    tokens: Vec<Token>,
    index: usize,
    depth: usize,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            index: 0,
            depth: 0,
        }
    }

    pub(crate) fn parse_program(&mut self) -> Result<Program, ScriptError> {
        if self.check_kind(&TokenKind::Eof) {
            let token = self.peek();
            return Err(ScriptError::at("empty program", token.line, token.column));
        }

        let mut statements = Vec::new();
        while !self.check_kind(&TokenKind::Eof) {
            if self.match_kind(&TokenKind::Semicolon) {
                continue;
            }
            statements.push(self.parse_statement()?);
            self.end_statement()?;
        }

        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> Result<Statement, ScriptError> {
        let token = self.peek().clone();

        let item = if self.check_ident("use") && self.peek_n_is(1, &TokenKind::Ident(String::new()))
        {
            self.advance();
            let module = self.consume_ident("expected module name after 'use'")?;
            Item::Use(module)
        } else if self.next_is_assignment() {
            let name = self.consume_ident("expected assignment target")?;
            self.expect_kind(TokenKind::Eq, "expected '=' in assignment")?;
            let expr = self.parse_expression()?;
            Item::Assignment { name, expr }
        } else {
            Item::Expr(self.parse_expression()?)
        };

        Ok(Statement {
            item,
            line: token.line,
            column: token.column,
        })
    }

    /// A statement ends at `;`, end of input, or a new line.
    fn end_statement(&mut self) -> Result<(), ScriptError> {
        if self.match_kind(&TokenKind::Semicolon) || self.check_kind(&TokenKind::Eof) {
            return Ok(());
        }
        let previous_line = self.tokens[self.index.saturating_sub(1)].line;
        let token = self.peek();
        if token.line > previous_line {
            return Ok(());
        }
        Err(ScriptError::at(
            format!("unexpected {}", token.kind.describe()),
            token.line,
            token.column,
        ))
    }

    fn parse_expression(&mut self) -> Result<Expr, ScriptError> {
        let base = self.depth;
        self.enter()?;
        let expr = self.parse_pipe()?;
        self.depth = base;
        Ok(expr)
    }

    fn enter(&mut self) -> Result<(), ScriptError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            let token = self.peek();
            return Err(ScriptError::at(
                "expression nested too deeply",
                token.line,
                token.column,
            ));
        }
        Ok(())
    }

    fn parse_pipe(&mut self) -> Result<Expr, ScriptError> {
        let base = self.depth;
        let mut expr = self.parse_add_sub()?;
        while self.match_kind(&TokenKind::Pipe) {
            self.enter()?;
            let name = self.consume_ident("expected function name after '|>'")?;
            self.expect_kind(TokenKind::LParen, "expected '(' after pipe stage name")?;
            let mut args = vec![Arg::positional(expr)];
            args.extend(self.parse_args("expected ')' after pipe stage arguments")?);
            expr = Expr::Call { name, args };
        }

        self.depth = base;
        Ok(expr)
    }

    fn parse_add_sub(&mut self) -> Result<Expr, ScriptError> {
        let base = self.depth;
        let mut expr = self.parse_mul_div()?;

        loop {
            let op = if self.match_kind(&TokenKind::Plus) {
                BinaryOp::Add
            } else if self.match_kind(&TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                self.depth = base;
                return Ok(expr);
            };
            self.enter()?;
            let rhs = self.parse_mul_div()?;
            expr = Expr::Binary {
                lhs: Box::new(expr),
                op,
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_mul_div(&mut self) -> Result<Expr, ScriptError> {
        let base = self.depth;
        let mut expr = self.parse_unary()?;

        loop {
            let op = if self.match_kind(&TokenKind::Star) {
                BinaryOp::Mul
            } else if self.match_kind(&TokenKind::Slash) {
                BinaryOp::Div
            } else if self.match_kind(&TokenKind::Amp) {
                BinaryOp::And
            } else {
                self.depth = base;
                return Ok(expr);
            };
            self.enter()?;
            let rhs = self.parse_unary()?;
            expr = Expr::Binary {
                lhs: Box::new(expr),
                op,
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ScriptError> {
        if self.match_kind(&TokenKind::Minus) {
            let base = self.depth;
            self.enter()?;
            let expr = self.parse_unary()?;
            self.depth = base;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(expr),
            });
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ScriptError> {
        let base = self.depth;
        let mut expr = self.parse_primary()?;
        while self.match_kind(&TokenKind::Dot) {
            self.enter()?;
            let method = self.consume_ident("expected method name after '.'")?;
            self.expect_kind(TokenKind::LParen, "expected '(' after method name")?;
            let args = self.parse_args("expected ')' after method arguments")?;
            expr = Expr::MethodCall {
                receiver: Box::new(expr),
                method,
                args,
            };
        }
        self.depth = base;
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ScriptError> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Number(value) => {
                self.advance();
                Ok(Expr::Number(*value))
            }
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                if self.match_kind(&TokenKind::LParen) {
                    let args = self.parse_args("expected ')' after call arguments")?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_kind(TokenKind::RParen, "expected ')' to close group")?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.check_kind(&TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expression()?);
                        if !self.match_kind(&TokenKind::Comma)
                            || self.check_kind(&TokenKind::RBracket)
                        {
                            break;
                        }
                    }
                }
                self.expect_kind(TokenKind::RBracket, "expected ']' to close list")?;
                Ok(Expr::List(items))
            }
            _ => Err(ScriptError::at(
                "expected expression",
                token.line,
                token.column,
            )),
        }
    }

    /// Parses `arg, arg, ...)` after the opening parenthesis. Trailing commas
    /// are allowed.
    fn parse_args(&mut self, close_message: &str) -> Result<Vec<Arg>, ScriptError> {
        let mut args = Vec::new();
        if !self.check_kind(&TokenKind::RParen) {
            loop {
                args.push(self.parse_arg()?);
                if !self.match_kind(&TokenKind::Comma) || self.check_kind(&TokenKind::RParen) {
                    break;
                }
            }
        }
        self.expect_kind(TokenKind::RParen, close_message)?;
        Ok(args)
    }

    fn parse_arg(&mut self) -> Result<Arg, ScriptError> {
        if self.next_is_assignment() {
            let name = self.consume_ident("expected argument name")?;
            self.expect_kind(TokenKind::Eq, "expected '=' after argument name")?;
            let value = self.parse_expression()?;
            return Ok(Arg {
                name: Some(name),
                value,
            });
        }
        Ok(Arg::positional(self.parse_expression()?))
    }

    fn next_is_assignment(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Ident(_)) && self.peek_n_is(1, &TokenKind::Eq)
    }

    fn consume_ident(&mut self, message: &str) -> Result<String, ScriptError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(ScriptError::at(message, token.line, token.column)),
        }
    }

    fn expect_kind(&mut self, expected: TokenKind, message: &str) -> Result<(), ScriptError> {
        if self.match_kind(&expected) {
            Ok(())
        } else {
            let token = self.peek();
            Err(ScriptError::at(message, token.line, token.column))
        }
    }

    fn check_ident(&self, text: &str) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Ident(name) if name == text
        )
    }

    fn match_kind(&mut self, expected: &TokenKind) -> bool {
        if self.check_kind(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check_kind(&self, expected: &TokenKind) -> bool {
        same_variant(self.peek_kind(), expected)
    }

    fn peek_n_is(&self, n: usize, expected: &TokenKind) -> bool {
        self.tokens
            .get(self.index + n)
            .map(|token| same_variant(&token.kind, expected))
            .unwrap_or(false)
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.index]
    }

    fn advance(&mut self) {
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
    }
}

fn same_variant(a: &TokenKind, b: &TokenKind) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

#[cfg(test)]
mod tests {
    use crate::ast::{Arg, BinaryOp, Expr, Item};
    use crate::parse_program;

    #[test]
    fn parses_use_and_model_assignment() {
        let program = parse_program("use cad\nmodel = sphere(r=8)").expect("program should parse");
        assert_eq!(program.statements.len(), 2);
        assert_eq!(program.statements[0].item, Item::Use("cad".into()));
        assert_eq!(program.imports().collect::<Vec<_>>(), vec!["cad"]);
        assert!(program.binds("model"));

        match &program.statements[1].item {
            Item::Assignment { name, expr } => {
                assert_eq!(name, "model");
                assert_eq!(
                    expr,
                    &Expr::Call {
                        name: "sphere".into(),
                        args: vec![Arg {
                            name: Some("r".into()),
                            value: Expr::Number(8.0),
                        }],
                    }
                );
            }
            other => panic!("expected assignment, got {other:?}"),
        }
        assert_eq!(program.statements[1].line, 2);
    }

    #[test]
    fn method_calls_bind_tighter_than_operators() {
        let program = parse_program("a - b.extrude(5)").expect("program should parse");
        match &program.statements[0].item {
            Item::Expr(Expr::Binary { op, rhs, .. }) => {
                assert_eq!(*op, BinaryOp::Sub);
                assert!(matches!(**rhs, Expr::MethodCall { ref method, .. } if method == "extrude"));
            }
            other => panic!("expected binary expression, got {other:?}"),
        }
    }

    #[test]
    fn grouped_difference_then_method() {
        let program =
            parse_program("(circle(r=10) - circle(r=5)).extrude(5)").expect("program should parse");
        match &program.statements[0].item {
            Item::Expr(Expr::MethodCall {
                receiver, method, ..
            }) => {
                assert_eq!(method, "extrude");
                assert!(matches!(
                    **receiver,
                    Expr::Binary {
                        op: BinaryOp::Sub,
                        ..
                    }
                ));
            }
            other => panic!("expected method call, got {other:?}"),
        }
    }

    #[test]
    fn parses_pipe_operator_into_nested_calls() {
        let program = parse_program("sphere(5) |> union(cube(2))").expect("pipe should parse");
        match &program.statements[0].item {
            Item::Expr(Expr::Call { name, args }) => {
                assert_eq!(name, "union");
                assert_eq!(args.len(), 2);
                assert!(matches!(&args[0].value, Expr::Call { name, .. } if name == "sphere"));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn parses_nested_lists_with_trailing_commas() {
        let program = parse_program("pts = [[0, 0], [1, 0], [0, 1],]").expect("list should parse");
        match &program.statements[0].item {
            Item::Assignment {
                expr: Expr::List(items),
                ..
            } => assert_eq!(items.len(), 3),
            other => panic!("expected list assignment, got {other:?}"),
        }
    }

    #[test]
    fn semicolons_and_newlines_separate_statements() {
        let program = parse_program("a = 1; b = 2\nc = a + b;").expect("program should parse");
        assert_eq!(program.statements.len(), 3);
    }

    #[test]
    fn two_expressions_on_one_line_are_rejected() {
        let err = parse_program("a = 1 b = 2").expect_err("should fail");
        assert_eq!(err.to_string(), "unexpected 'b' at line 1, column 7");
    }

    #[test]
    fn dangling_assignment_reports_position() {
        let err = parse_program("use cad\nmodel = ").expect_err("should fail");
        assert_eq!(err.to_string(), "expected expression at line 2, column 9");
    }

    #[test]
    fn empty_program_is_rejected() {
        let err = parse_program("  // nothing here\n").expect_err("should fail");
        assert!(err.to_string().starts_with("empty program"));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let source = format!("model = {}1{}", "(".repeat(500), ")".repeat(500));
        let err = parse_program(&source).expect_err("should fail");
        assert!(err.to_string().starts_with("expression nested too deeply"));

        let chain = format!("model = a{}", ".move(1)".repeat(500));
        assert!(parse_program(&chain).is_err());

        let sum = format!("model = 1{}", " + 1".repeat(500));
        assert!(parse_program(&sum).is_err());
    }

    #[test]
    fn moderate_nesting_is_accepted() {
        let source = format!("model = {}1{}", "(".repeat(20), ")".repeat(20));
        assert!(parse_program(&source).is_ok());
    }

    #[test]
    fn unclosed_call_reports_error() {
        let err = parse_program("model = sphere(8").expect_err("should fail");
        assert_eq!(
            err.to_string(),
            "expected ')' after call arguments at line 1, column 17"
        );
    }
}
